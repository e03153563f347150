//! Error hierarchy for the endpoint-watch engine
//!
//! Errors are layered by concern: resolver failures stay inside the poll loop,
//! session-terminal failures are fanned out to subscribers, and everything the
//! process itself can fail on (configuration, server startup) lives in
//! [`Error`].

use std::net::SocketAddr;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Watch session failures surfaced to a caller
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Infrastructure-level failures (server, signals, metrics)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Failures reported by a [`crate::Resolver`] backend.
///
/// Never crosses the poll loop boundary: the loop translates each kind into a
/// published snapshot, a retry, or a terminal [`WatchError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Target currently has no known members
    #[error("target has no known members")]
    NotFound,

    /// Backend temporarily unavailable, retryable
    #[error("transient resolver failure: {0}")]
    Transient(String),

    /// Malformed target name, retrying cannot help
    #[error("invalid target: {0}")]
    Invalid(String),
}

impl ResolveError {
    /// Label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::NotFound => "not_found",
            ResolveError::Transient(_) => "transient",
            ResolveError::Invalid(_) => "invalid",
        }
    }
}

/// Terminal errors of a subscriber session.
///
/// `Clone` because one failure of a target is delivered to every session
/// attached to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// Target name rejected by the resolver; non-retryable
    #[error("invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Resolver kept failing past the retry budget; retryable by re-attaching
    #[error("target {target} unavailable after {attempts} failed resolutions: {reason}")]
    Unavailable {
        target: String,
        attempts: u32,
        reason: String,
    },

    /// Consumer did not keep up with publications and was disconnected
    #[error("subscriber {session_id} on {target} overran its queue of {capacity}")]
    SubscriberOverrun {
        target: String,
        session_id: String,
        capacity: usize,
    },

    /// Registry is shutting down
    #[error("watch registry is shutting down")]
    ShuttingDown,

    /// Too many concurrent watches on this server
    #[error("watch limit of {0} concurrent sessions reached")]
    TooManyWatches(usize),
}

impl WatchError {
    /// Whether a client may re-attach and expect a different outcome
    pub fn is_retryable(&self) -> bool {
        !matches!(self, WatchError::InvalidTarget { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// gRPC server failed to bind or serve
    #[error("gRPC server on {addr} failed: {source}")]
    ServerUnavailable {
        addr: SocketAddr,
        #[source]
        source: Box<tonic::transport::Error>,
    },

    /// Listen address could not be parsed
    #[error("invalid listen address {0}")]
    InvalidListenAddress(String),

    /// Shutdown signal plumbing failures
    #[error("{0}")]
    SignalSenderClosed(String),

    /// OS signal handler registration failures
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Background task failed to join
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl From<WatchError> for tonic::Status {
    fn from(err: WatchError) -> Self {
        let message = err.to_string();
        match err {
            WatchError::InvalidTarget { .. } => tonic::Status::invalid_argument(message),
            WatchError::Unavailable { .. } | WatchError::ShuttingDown => {
                tonic::Status::unavailable(message)
            }
            WatchError::SubscriberOverrun { .. } | WatchError::TooManyWatches(_) => {
                tonic::Status::resource_exhausted(message)
            }
        }
    }
}
