//! Unified error handling for tern-irc.
//!
//! Small per-concern enums (subscription bookkeeping, shutdown handshake)
//! convert into the session-level [`SessionError`] taxonomy that public
//! operations return.

use thiserror::Error;

/// Subscription bookkeeping errors from the subscriber registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("already listening: {name} for {command}")]
    AlreadyRegistered {
        /// The command slot being contested.
        command: String,
        /// The subscriber name.
        name: String,
    },

    #[error("no such listener: {name} for {command}")]
    NotFound {
        /// The command slot looked up.
        command: String,
        /// The subscriber name.
        name: String,
    },
}

/// Errors from joining the shutdown coordinator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// The acknowledgement channel was not a fresh, empty, depth-one channel.
    #[error("shutdown ack channel must be fresh and empty")]
    DirtyChannel,
}

/// Errors surfaced by the public session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Nick, user, or realname was empty at connect time.
    #[error("empty nick, user, or real name")]
    InvalidIdentity,

    /// Subscription bookkeeping failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Joining the shutdown coordinator failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// No terminal reply arrived within the deadline.
    #[error("timed out waiting for a reply")]
    Timeout,

    /// The server answered with an error reply.
    ///
    /// Carries the symbolic reply name when the code is in the session's
    /// reply table, otherwise the raw wire command.
    #[error("server rejected request: {0}")]
    Protocol(String),

    /// Dial, read, or write failure on the wire.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Background tasks could not be confirmed stopped during disconnect.
    #[error("teardown failed: {stale} task(s) unresponsive")]
    TeardownFailed {
        /// Participants that never acknowledged the stop broadcast.
        stale: usize,
    },

    /// The bounded nick-mutation retry count was exhausted.
    #[error("failed to acquire any alternate nick")]
    NickExhausted,

    /// A channel name failed validation before anything was sent.
    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    /// A command argument failed validation before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Correlation-token collision while setting up a request. The partial
    /// registrations are unwound before this is returned.
    #[error("correlation setup failed: {0}")]
    CorrelationSetup(RegistryError),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for session operations.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
