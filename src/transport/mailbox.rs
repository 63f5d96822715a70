//! Layout and access of the shared mailbox region
//!
//! The region is a single `#[repr(C)]` record mapped by both processes. Text fields are
//! fixed-width, NUL-terminated and always bounded on write. Sequence numbers pair every
//! response with the request it answers so a late response cannot be misread as the
//! answer to a newer command.
//!
//! ```text
//! +-------------+--------------+-----------+-------------+---------------------+
//! | request_seq | response_seq | command   | response    | monitoring snapshot |
//! | u64         | u64          | [u8; 256] | [u8; 4096]  | 4 x f64, i32, u8, ..|
//! +-------------+--------------+-----------+-------------+---------------------+
//! ```

use std::mem::size_of;
use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;
use std::ptr::{self, NonNull};

use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap, shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use super::error::{TransportError, TransportResult};

/// Capacity of the command text field, including the terminator
pub const COMMAND_CAPACITY: usize = 256;

/// Capacity of the response text field, including the terminator
pub const RESPONSE_CAPACITY: usize = 4096;

/// Capacity of the last-update timestamp text field
pub const TIMESTAMP_CAPACITY: usize = 64;

#[repr(C)]
struct MonitoringRecord {
    temperature: f64,
    current: f64,
    power: f64,
    voltage: f64,
    active_alarms_count: i32,
    service_enabled: u8,
    last_update: [u8; TIMESTAMP_CAPACITY],
}

#[repr(C)]
struct MailboxRecord {
    request_seq: u64,
    response_seq: u64,
    command: [u8; COMMAND_CAPACITY],
    response: [u8; RESPONSE_CAPACITY],
    monitoring: MonitoringRecord,
}

const RECORD_SIZE: usize = size_of::<MailboxRecord>();

/// Monitoring summary published next to the command/response fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitoringSnapshot {
    pub temperature: f64,
    pub current: f64,
    pub power: f64,
    pub voltage: f64,
    pub active_alarms_count: i32,
    pub service_enabled: bool,
    /// Wall-clock time of the last sensor tick, formatted `HH:MM:SS`
    pub last_update: String,
}

/// Copy `text` into a fixed-width field, truncating so a terminator always fits.
///
/// Truncation never splits a UTF-8 sequence; the remainder of the field is zeroed.
pub fn write_bounded(field: &mut [u8], text: &str) {
    let Some(limit) = field.len().checked_sub(1) else {
        return;
    };

    let mut end = text.len().min(limit);
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    field[..end].copy_from_slice(&text.as_bytes()[..end]);
    field[end..].fill(0);
}

/// Read a fixed-width field up to its first terminator.
pub fn read_bounded(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// A mapping of the mailbox region into this process
#[derive(Debug)]
pub struct SharedRegion {
    record: NonNull<MailboxRecord>,
    name: String,
    _fd: OwnedFd,
}

// Concurrent access is coordinated by the handshake signals.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create the region from scratch, removing a stale one left by a crashed server.
    pub fn create(name: &str) -> TransportResult<Self> {
        Self::unlink(name);

        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::from_bits_truncate(0o666),
        )
        .map_err(|e| TransportError::create(name, e))?;

        ftruncate(&fd, RECORD_SIZE as libc::off_t).map_err(|e| TransportError::create(name, e))?;

        let region = Self::map(name, fd).map_err(|e| TransportError::create(name, e))?;
        region.reset();
        Ok(region)
    }

    /// Attach to a region created by a running server.
    pub fn attach(name: &str) -> TransportResult<Self> {
        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty())
            .map_err(|e| TransportError::attach(name, e))?;
        Self::map(name, fd).map_err(|e| TransportError::attach(name, e))
    }

    fn map(name: &str, fd: OwnedFd) -> nix::Result<Self> {
        let length = NonZeroUsize::new(RECORD_SIZE).ok_or(nix::errno::Errno::EINVAL)?;
        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &fd,
                0,
            )?
        };

        Ok(Self {
            record: ptr.cast(),
            name: name.to_string(),
            _fd: fd,
        })
    }

    /// Remove the region's name. Missing names are ignored.
    pub fn unlink(name: &str) {
        let _ = shm_unlink(name);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn raw(&self) -> *mut MailboxRecord {
        self.record.as_ptr()
    }

    fn reset(&self) {
        unsafe { ptr::write_bytes(self.raw().cast::<u8>(), 0, RECORD_SIZE) }
    }

    pub fn write_command(&self, text: &str) {
        unsafe { write_bounded(&mut (*self.raw()).command, text) }
    }

    pub fn read_command(&self) -> String {
        unsafe { read_bounded(&(*self.raw()).command) }
    }

    pub fn write_response(&self, text: &str) {
        unsafe { write_bounded(&mut (*self.raw()).response, text) }
    }

    pub fn read_response(&self) -> String {
        unsafe { read_bounded(&(*self.raw()).response) }
    }

    pub fn request_seq(&self) -> u64 {
        unsafe { ptr::read_volatile(&(*self.raw()).request_seq) }
    }

    pub fn set_request_seq(&self, seq: u64) {
        unsafe { ptr::write_volatile(&mut (*self.raw()).request_seq, seq) }
    }

    pub fn response_seq(&self) -> u64 {
        unsafe { ptr::read_volatile(&(*self.raw()).response_seq) }
    }

    pub fn set_response_seq(&self, seq: u64) {
        unsafe { ptr::write_volatile(&mut (*self.raw()).response_seq, seq) }
    }

    /// Publish the monitoring summary. Readers may observe a partially updated record.
    pub fn write_snapshot(&self, snapshot: &MonitoringSnapshot) {
        unsafe {
            let record = &mut (*self.raw()).monitoring;
            ptr::write_volatile(&mut record.temperature, snapshot.temperature);
            ptr::write_volatile(&mut record.current, snapshot.current);
            ptr::write_volatile(&mut record.power, snapshot.power);
            ptr::write_volatile(&mut record.voltage, snapshot.voltage);
            ptr::write_volatile(&mut record.active_alarms_count, snapshot.active_alarms_count);
            ptr::write_volatile(&mut record.service_enabled, u8::from(snapshot.service_enabled));
            write_bounded(&mut record.last_update, &snapshot.last_update);
        }
    }

    pub fn read_snapshot(&self) -> MonitoringSnapshot {
        unsafe {
            let record = &(*self.raw()).monitoring;
            MonitoringSnapshot {
                temperature: ptr::read_volatile(&record.temperature),
                current: ptr::read_volatile(&record.current),
                power: ptr::read_volatile(&record.power),
                voltage: ptr::read_volatile(&record.voltage),
                active_alarms_count: ptr::read_volatile(&record.active_alarms_count),
                service_enabled: ptr::read_volatile(&record.service_enabled) != 0,
                last_update: read_bounded(&record.last_update),
            }
        }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.record.cast(), RECORD_SIZE);
        }
    }
}
