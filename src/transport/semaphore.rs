//! Named POSIX semaphores used as the handshake signals
//!
//! nix does not wrap `sem_open` and friends, so this is a thin safe wrapper over libc.

use std::ffi::CString;
use std::io;
use std::ptr::NonNull;
use std::time::Duration;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A named counting semaphore shared between processes
#[derive(Debug)]
pub struct NamedSemaphore {
    sem: NonNull<libc::sem_t>,
    name: String,
}

// sem_t operations are thread-safe by POSIX contract.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL"))
}

impl NamedSemaphore {
    /// Create a fresh semaphore with a count of zero, replacing any stale one.
    pub fn create(name: &str) -> io::Result<Self> {
        Self::unlink(name)?;
        let c_name = c_name(name)?;
        let mode: libc::c_uint = 0o644;
        let initial: libc::c_uint = 0;
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                mode,
                initial,
            )
        };
        Self::from_raw(sem, name)
    }

    /// Open an existing semaphore. Never creates one.
    pub fn open(name: &str) -> io::Result<Self> {
        let c_name = c_name(name)?;
        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
        Self::from_raw(sem, name)
    }

    fn from_raw(sem: *mut libc::sem_t, name: &str) -> io::Result<Self> {
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        let sem = NonNull::new(sem).ok_or_else(io::Error::last_os_error)?;
        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    /// Remove the name from the system. A missing name is not an error.
    pub fn unlink(name: &str) -> io::Result<()> {
        let c_name = c_name(name)?;
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } == -1 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::NotFound {
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raise the signal once.
    pub fn post(&self) -> io::Result<()> {
        if unsafe { libc::sem_post(self.sem.as_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Non-blocking take. Returns `false` when the signal is not raised.
    pub fn try_wait(&self) -> io::Result<bool> {
        loop {
            if unsafe { libc::sem_trywait(self.sem.as_ptr()) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(err),
            }
        }
    }

    /// Blocking take bounded by an absolute `CLOCK_REALTIME` deadline.
    /// Returns `false` once the deadline has passed.
    pub fn wait_until(&self, deadline: &libc::timespec) -> io::Result<bool> {
        loop {
            if unsafe { libc::sem_timedwait(self.sem.as_ptr(), deadline) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(err),
            }
        }
    }

    /// Take every pending post without blocking. Returns how many were drained.
    pub fn drain(&self) -> io::Result<usize> {
        let mut drained = 0;
        while self.try_wait()? {
            drained += 1;
        }
        Ok(drained)
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem.as_ptr());
        }
    }
}

/// Absolute `CLOCK_REALTIME` deadline `timeout` from now, as `sem_timedwait` expects.
pub fn deadline_after(timeout: Duration) -> io::Result<libc::timespec> {
    let mut now: libc::timespec = unsafe { std::mem::zeroed() };
    if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } == -1 {
        return Err(io::Error::last_os_error());
    }

    let nanos = now.tv_nsec as i64 + i64::from(timeout.subsec_nanos());
    let secs = timeout.as_secs() as i64 + nanos / NANOS_PER_SEC;
    now.tv_sec += secs as libc::time_t;
    now.tv_nsec = (nanos % NANOS_PER_SEC) as _;
    Ok(now)
}
