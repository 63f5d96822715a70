//! Error types for the mailbox transport

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while setting up or using the mailbox transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server could not allocate one of its IPC resources
    #[error("failed to create {resource}: {source}")]
    Create {
        resource: String,
        #[source]
        source: io::Error,
    },

    /// A client tried to attach but the server's resources do not exist
    #[error("server is not running ({resource} does not exist)")]
    ServerNotRunning { resource: String },

    /// The resource exists but could not be opened or mapped
    #[error("failed to attach to {resource}: {source}")]
    Attach {
        resource: String,
        #[source]
        source: io::Error,
    },

    /// The server did not answer within the exchange deadline
    #[error("server response timeout after {0:?}")]
    Timeout(Duration),

    /// Posting or waiting on a handshake signal failed
    #[error("handshake signal {resource} failed: {source}")]
    Signal {
        resource: String,
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    pub(crate) fn signal(resource: &str, source: io::Error) -> Self {
        Self::Signal {
            resource: resource.to_string(),
            source,
        }
    }

    pub(crate) fn create(resource: &str, source: impl Into<io::Error>) -> Self {
        Self::Create {
            resource: resource.to_string(),
            source: source.into(),
        }
    }

    /// Map an attach failure, turning a missing resource into `ServerNotRunning`.
    pub(crate) fn attach(resource: &str, source: impl Into<io::Error>) -> Self {
        let source = source.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::ServerNotRunning {
                resource: resource.to_string(),
            }
        } else {
            Self::Attach {
                resource: resource.to_string(),
                source,
            }
        }
    }
}
