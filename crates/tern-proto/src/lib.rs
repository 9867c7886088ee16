//! # tern-proto
//!
//! The pure protocol layer of the tern IRC client: a line-oriented message
//! codec, the numeric reply-code table, tokio-util line framing, and CTCP
//! payload helpers.
//!
//! Everything in this crate is stateless with respect to the connection;
//! session concurrency lives in the `tern-irc` crate.
//!
//! ## Quick start
//!
//! ```rust
//! use tern_proto::Message;
//!
//! let msg = Message::decode(":nick!user@host PRIVMSG #tern :Hello!").unwrap();
//! assert_eq!(msg.command, "PRIVMSG");
//! assert_eq!(msg.params, vec!["#tern", "Hello!"]);
//!
//! let ping = Message::new("PING", ["12345"]);
//! assert_eq!(ping.encode(), "PING 12345");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod ctcp;
pub mod error;
pub mod line;
pub mod message;
pub mod replies;

pub use self::error::DecodeError;
pub use self::line::LineCodec;
pub use self::message::{Message, MAX_LINE_LEN, MAX_PARAMS};
pub use self::replies::{ReplyTable, STANDARD_REPLIES, WILDCARD};
