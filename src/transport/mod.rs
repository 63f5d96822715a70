//! # Mailbox transport
//!
//! A single-slot request/response channel between the radio client and the server, built
//! on a POSIX shared-memory region and two named semaphores.
//!
//! ## Exchange
//!
//! ```text
//! client                               server
//!   write command, request_seq += 1
//!   post client_ready  ─────────────▶  try_wait client_ready (polling)
//!                                      read command, dispatch
//!                                      write response, response_seq = request_seq
//!   wait server_ready  ◀─────────────  post server_ready
//!   (ignore posts whose response_seq != request_seq)
//! ```
//!
//! The server owns the resources: it creates them at startup (after removing stale ones
//! left by a crash) and unlinks them when its transport is dropped. Clients only ever
//! attach, so a client started before the server fails with
//! [`TransportError::ServerNotRunning`].

pub mod error;
pub mod mailbox;
pub mod semaphore;

use std::time::Duration;

use tracing::{debug, trace, warn};

pub use error::{TransportError, TransportResult};
pub use mailbox::{COMMAND_CAPACITY, MonitoringSnapshot, RESPONSE_CAPACITY, SharedRegion};
pub use semaphore::NamedSemaphore;

/// How long a client waits for the server to answer one command
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Answer written when a pending exchange is dropped without a response
const UNANSWERED_RESPONSE: &str = "ERROR: Internal server error";

/// System-wide names of the three IPC resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub mailbox: String,
    pub client_ready: String,
    pub server_ready: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            mailbox: "/radio_control_memory".to_string(),
            client_ready: "/sem_radio_client".to_string(),
            server_ready: "/sem_radio_server".to_string(),
        }
    }
}

impl ResourceNames {
    /// Names derived from a common prefix, for running isolated instances side by side.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            mailbox: format!("/{prefix}_memory"),
            client_ready: format!("/{prefix}_client"),
            server_ready: format!("/{prefix}_server"),
        }
    }

    /// Remove all three names. Missing ones are ignored.
    pub fn unlink_all(&self) {
        SharedRegion::unlink(&self.mailbox);
        for name in [&self.client_ready, &self.server_ready] {
            if let Err(e) = NamedSemaphore::unlink(name) {
                warn!("failed to unlink {name}: {e}");
            }
        }
    }
}

/// The server's side of the mailbox. Owns the resources for its lifetime.
#[derive(Debug)]
pub struct ServerTransport {
    names: ResourceNames,
    region: SharedRegion,
    client_ready: NamedSemaphore,
    server_ready: NamedSemaphore,
    last_answered: u64,
}

impl ServerTransport {
    /// Create the mailbox and both signals. Partially created resources are removed
    /// when a later step fails.
    pub fn open(names: &ResourceNames) -> TransportResult<Self> {
        let result = Self::create_all(names);
        if result.is_err() {
            names.unlink_all();
        }
        result
    }

    fn create_all(names: &ResourceNames) -> TransportResult<Self> {
        let region = SharedRegion::create(&names.mailbox)?;
        let client_ready = NamedSemaphore::create(&names.client_ready)
            .map_err(|e| TransportError::create(&names.client_ready, e))?;
        let server_ready = NamedSemaphore::create(&names.server_ready)
            .map_err(|e| TransportError::create(&names.server_ready, e))?;

        debug!(mailbox = %names.mailbox, "mailbox transport created");

        Ok(Self {
            names: names.clone(),
            region,
            client_ready,
            server_ready,
            last_answered: 0,
        })
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    /// Take a pending command if the client has signalled one.
    ///
    /// A signal carrying a sequence number that was already answered is a leftover of an
    /// abandoned exchange and is discarded without a response.
    pub fn try_receive(&mut self) -> TransportResult<Option<PendingExchange<'_>>> {
        let signalled = self
            .client_ready
            .try_wait()
            .map_err(|e| TransportError::signal(&self.names.client_ready, e))?;
        if !signalled {
            return Ok(None);
        }

        let sequence = self.region.request_seq();
        if sequence == self.last_answered {
            debug!(sequence, "discarding superseded client signal");
            return Ok(None);
        }

        let command = self.region.read_command();
        trace!(sequence, %command, "received command");

        Ok(Some(PendingExchange {
            transport: self,
            command,
            sequence,
            answered: false,
        }))
    }

    fn complete(&mut self, sequence: u64, response: &str) -> TransportResult<()> {
        self.region.write_response(response);
        self.region.set_response_seq(sequence);
        self.last_answered = sequence;
        self.server_ready
            .post()
            .map_err(|e| TransportError::signal(&self.names.server_ready, e))
    }

    /// Refresh the monitoring summary visible to clients.
    pub fn publish_snapshot(&self, snapshot: &MonitoringSnapshot) {
        self.region.write_snapshot(snapshot);
    }
}

impl Drop for ServerTransport {
    fn drop(&mut self) {
        self.names.unlink_all();
        debug!(mailbox = %self.names.mailbox, "mailbox transport removed");
    }
}

/// A received command that owes the client exactly one response.
///
/// Dropping it unanswered (for instance while unwinding from a panicking handler) still
/// completes the exchange with a generic error so the client is never left waiting.
#[derive(Debug)]
pub struct PendingExchange<'a> {
    transport: &'a mut ServerTransport,
    command: String,
    sequence: u64,
    answered: bool,
}

impl PendingExchange<'_> {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Write the response and raise the server-ready signal.
    pub fn respond(mut self, response: &str) -> TransportResult<()> {
        self.answered = true;
        self.transport.complete(self.sequence, response)
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        if !self.answered {
            warn!(sequence = self.sequence, "exchange dropped without a response");
            if let Err(e) = self.transport.complete(self.sequence, UNANSWERED_RESPONSE) {
                warn!("failed to complete abandoned exchange: {e}");
            }
        }
    }
}

/// The client's side of the mailbox
#[derive(Debug)]
pub struct ClientTransport {
    region: SharedRegion,
    client_ready: NamedSemaphore,
    server_ready: NamedSemaphore,
    sequence: u64,
}

impl ClientTransport {
    /// Attach to a running server's resources. Never creates them.
    pub fn open(names: &ResourceNames) -> TransportResult<Self> {
        let region = SharedRegion::attach(&names.mailbox)?;
        let client_ready = NamedSemaphore::open(&names.client_ready)
            .map_err(|e| TransportError::attach(&names.client_ready, e))?;
        let server_ready = NamedSemaphore::open(&names.server_ready)
            .map_err(|e| TransportError::attach(&names.server_ready, e))?;

        // Responses meant for an earlier, abandoned client must not satisfy our first wait
        let stale = server_ready
            .drain()
            .map_err(|e| TransportError::signal(&names.server_ready, e))?;
        if stale > 0 {
            debug!(stale, "drained stale server-ready signals");
        }

        let sequence = region.request_seq();
        Ok(Self {
            region,
            client_ready,
            server_ready,
            sequence,
        })
    }

    /// Write a command and signal the server. Over-long commands are truncated.
    pub fn send(&mut self, command: &str) -> TransportResult<()> {
        self.sequence = self.sequence.wrapping_add(1);
        if self.sequence == 0 {
            self.sequence = 1;
        }

        self.region.write_command(command);
        self.region.set_request_seq(self.sequence);
        self.client_ready
            .post()
            .map_err(|e| TransportError::signal(self.client_ready.name(), e))
    }

    /// Wait until the server answers the last command sent, or `timeout` expires.
    pub fn await_response(&self, timeout: Duration) -> TransportResult<String> {
        let deadline = semaphore::deadline_after(timeout)
            .map_err(|e| TransportError::signal(self.server_ready.name(), e))?;

        loop {
            let signalled = self
                .server_ready
                .wait_until(&deadline)
                .map_err(|e| TransportError::signal(self.server_ready.name(), e))?;
            if !signalled {
                return Err(TransportError::Timeout(timeout));
            }

            let answered = self.region.response_seq();
            if answered == self.sequence {
                return Ok(self.region.read_response());
            }
            debug!(answered, expected = self.sequence, "ignoring response to an earlier command");
        }
    }

    /// One complete exchange: send, then wait for the matching response.
    pub fn exchange(&mut self, command: &str, timeout: Duration) -> TransportResult<String> {
        self.send(command)?;
        self.await_response(timeout)
    }

    /// The monitoring summary last published by the server.
    pub fn snapshot(&self) -> MonitoringSnapshot {
        self.region.read_snapshot()
    }
}
