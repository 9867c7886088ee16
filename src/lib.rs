//! tern-irc is a client-side IRC session engine built around message
//! correlation: commands go out through one serialized queue, replies fan
//! out through a subscriber registry, and every request-style operation
//! waits on exactly the numerics that can answer it, with deadlines scaled
//! to the measured server lag.
//!
//! ```no_run
//! use tern_irc::{Config, Session};
//!
//! # async fn run() -> tern_irc::Result<()> {
//! let config = Config::new("irc.libera.chat:6697", "tern", "tern", "Tern Bot");
//! let session = Session::new(config);
//! session.connect().await?;
//! session.join("#tern", None).await?;
//! session.privmsg("#tern", "hello from tern").await?;
//! session.disconnect("done").await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]

mod commands;
mod config;
mod ctcp;
mod dispatch;
mod error;
mod keepalive;
mod request;
mod session;
mod shutdown;
mod transport;

pub use config::Config;
pub use error::{RegistryError, Result, SessionError, ShutdownError};
pub use session::Session;

/// The wire-format crate: message codec, reply table, CTCP grammar.
pub use tern_proto as proto;

pub use tern_proto::{Message, ReplyTable};
