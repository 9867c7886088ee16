//! Error types for the protocol layer.

use thiserror::Error;

/// Errors encountered when decoding a raw wire line into a [`Message`].
///
/// Decode errors are recoverable: the read loop logs them and continues
/// with the next line rather than aborting the connection.
///
/// [`Message`]: crate::message::Message
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The line contained a `:` origin prefix with no terminating space.
    #[error("unterminated origin prefix: {line}")]
    UnterminatedOrigin {
        /// The offending raw line.
        line: String,
    },

    /// No command token was found after the optional origin prefix.
    #[error("no command token: {line}")]
    MissingCommand {
        /// The offending raw line.
        line: String,
    },
}

/// Errors raised by the line-framing codec.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LineError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Line exceeded the protocol length limit.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    TooLong {
        /// Actual line length in bytes.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Line was not valid UTF-8.
    #[error("invalid UTF-8 at byte {byte_pos}")]
    InvalidUtf8 {
        /// Byte position where validation failed.
        byte_pos: usize,
    },
}
