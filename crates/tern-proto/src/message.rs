//! The IRC wire message and its codec.
//!
//! A [`Message`] is an immutable value object: an optional origin prefix,
//! a command (alphabetic verb or 3-digit numeric reply), and up to 15
//! ordered parameters, the last of which may contain spaces.

use std::fmt;

use crate::error::DecodeError;

/// Maximum number of parameters a message may carry.
pub const MAX_PARAMS: usize = 15;

/// Maximum encoded line length in bytes, excluding the CRLF terminator.
pub const MAX_LINE_LEN: usize = 510;

/// A parsed IRC message.
///
/// Encoding a message that violates the protocol invariants (empty command,
/// more than [`MAX_PARAMS`] parameters, over [`MAX_LINE_LEN`] bytes) yields
/// the empty string; callers treat an empty encoding as unsendable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Source of the message (`nick!user@host` or a server name), if any.
    pub origin: Option<String>,
    /// The command verb or 3-digit numeric reply code.
    pub command: String,
    /// Ordered parameters; only the final one may contain spaces.
    pub params: Vec<String>,
}

impl Message {
    /// Create a message from a command and parameters.
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Message {
            origin: None,
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach an origin prefix.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Decode a raw wire line.
    ///
    /// Trailing CR/LF is stripped. The first parameter token beginning with
    /// `:` starts the trailing multi-word parameter and absorbs the rest of
    /// the line, with its leading `:` removed.
    pub fn decode(line: &str) -> Result<Message, DecodeError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut rest = line;

        let origin = match rest.strip_prefix(':') {
            Some(tail) => match tail.split_once(' ') {
                Some((prefix, more)) => {
                    rest = more;
                    Some(prefix.to_owned())
                }
                None => {
                    return Err(DecodeError::UnterminatedOrigin {
                        line: line.to_owned(),
                    })
                }
            },
            None => None,
        };

        if rest.is_empty() {
            return Err(DecodeError::MissingCommand {
                line: line.to_owned(),
            });
        }

        let (command, after) = match rest.split_once(' ') {
            Some((cmd, more)) => (cmd.to_owned(), Some(more)),
            None => (rest.to_owned(), None),
        };

        let mut params = Vec::new();
        if let Some(mut after) = after {
            loop {
                if let Some(trailing) = after.strip_prefix(':') {
                    params.push(trailing.to_owned());
                    break;
                }
                match after.split_once(' ') {
                    Some((token, more)) => {
                        params.push(token.to_owned());
                        after = more;
                    }
                    None => {
                        if !after.is_empty() {
                            params.push(after.to_owned());
                        }
                        break;
                    }
                }
            }
        }

        Ok(Message {
            origin,
            command,
            params,
        })
    }

    /// Encode to a wire line, without the CRLF terminator.
    ///
    /// Returns the empty string when the message violates the protocol
    /// invariants; an empty encoding means "unsendable", never an error.
    pub fn encode(&self) -> String {
        if self.command.is_empty() || self.params.len() > MAX_PARAMS {
            return String::new();
        }

        let mut out = String::new();
        if let Some(origin) = &self.origin {
            if !origin.is_empty() {
                out.push(':');
                out.push_str(origin);
                out.push(' ');
            }
        }
        out.push_str(&self.command);

        for (i, param) in self.params.iter().enumerate() {
            let is_last = i + 1 == self.params.len();
            if param.contains(' ') {
                // Everything from the first spaced parameter onward folds
                // into the trailing parameter.
                out.push_str(" :");
                out.push_str(&self.params[i..].join(" "));
                break;
            }
            if is_last && (param.is_empty() || param.starts_with(':')) {
                out.push_str(" :");
                out.push_str(param);
                break;
            }
            out.push(' ');
            out.push_str(param);
        }

        if out.len() > MAX_LINE_LEN {
            return String::new();
        }
        out
    }

    /// True if the command is a 3-digit numeric reply code.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }

    /// The nick portion of the origin prefix, if present.
    pub fn source_nick(&self) -> Option<&str> {
        self.origin
            .as_deref()
            .map(|o| o.split('!').next().unwrap_or(o))
    }

    /// The first parameter, conventionally the target of the command.
    pub fn target(&self) -> Option<&str> {
        self.params.first().map(String::as_str)
    }

    /// The text body of a PRIVMSG or NOTICE.
    pub fn text(&self) -> Option<&str> {
        match self.command.as_str() {
            "PRIVMSG" | "NOTICE" => self.params.get(1).map(String::as_str),
            _ => None,
        }
    }

    /// Create a PRIVMSG to a target.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Message::new("PRIVMSG", [target.into(), text.into()])
    }

    /// Create a NOTICE to a target.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Message::new("NOTICE", [target.into(), text.into()])
    }

    /// Create a JOIN for a comma-separated channel list with optional keys.
    #[must_use]
    pub fn join(channels: impl Into<String>, keys: Option<String>) -> Self {
        let channels = channels.into();
        match keys {
            Some(keys) if !keys.is_empty() => Message::new("JOIN", [channels, keys]),
            _ => Message::new("JOIN", [channels]),
        }
    }

    /// Create a NICK change request.
    #[must_use]
    pub fn nick(nick: impl Into<String>) -> Self {
        Message::new("NICK", [nick.into()])
    }

    /// Create a USER registration message.
    #[must_use]
    pub fn user(user: impl Into<String>, realname: impl Into<String>) -> Self {
        Message::new(
            "USER",
            [user.into(), "0".to_owned(), "*".to_owned(), realname.into()],
        )
    }

    /// Create a PASS message.
    #[must_use]
    pub fn pass(password: impl Into<String>) -> Self {
        Message::new("PASS", [password.into()])
    }

    /// Create a PING carrying a correlation token.
    #[must_use]
    pub fn ping(token: impl Into<String>) -> Self {
        Message::new("PING", [token.into()])
    }

    /// Create a PONG echoing a server token.
    #[must_use]
    pub fn pong(token: impl Into<String>) -> Self {
        Message::new("PONG", [token.into()])
    }

    /// Create a QUIT with a reason.
    #[must_use]
    pub fn quit(reason: impl Into<String>) -> Self {
        Message::new("QUIT", [reason.into()])
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_simple_ping() {
        let msg = Message::decode("PING :server1\r\n").unwrap();
        assert_eq!(msg.origin, None);
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["server1"]);
    }

    #[test]
    fn decode_privmsg_with_origin() {
        let msg = Message::decode(":nick!user@host PRIVMSG #tern :Hello, world!").unwrap();
        assert_eq!(msg.origin.as_deref(), Some("nick!user@host"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#tern", "Hello, world!"]);
        assert_eq!(msg.source_nick(), Some("nick"));
        assert_eq!(msg.text(), Some("Hello, world!"));
    }

    #[test]
    fn decode_numeric_reply() {
        let msg = Message::decode(":irc.example.net 433 * tern :Nickname is already in use.")
            .unwrap();
        assert_eq!(msg.command, "433");
        assert!(msg.is_numeric());
        assert_eq!(msg.params.len(), 3);
    }

    #[test]
    fn decode_bare_command() {
        let msg = Message::decode("AWAY").unwrap();
        assert_eq!(msg.command, "AWAY");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn decode_rejects_missing_command() {
        assert!(matches!(
            Message::decode(":onlyaprefix"),
            Err(DecodeError::UnterminatedOrigin { .. })
        ));
        assert!(matches!(
            Message::decode(""),
            Err(DecodeError::MissingCommand { .. })
        ));
        assert!(matches!(
            Message::decode(":prefix "),
            Err(DecodeError::MissingCommand { .. })
        ));
    }

    #[test]
    fn encode_adds_colon_for_spaced_trailing() {
        let msg = Message::privmsg("#tern", "two words");
        assert_eq!(msg.encode(), "PRIVMSG #tern :two words");
    }

    #[test]
    fn encode_adds_colon_for_ambiguous_trailing() {
        let msg = Message::new("TOPIC", ["#tern", ""]);
        assert_eq!(msg.encode(), "TOPIC #tern :");
        let msg = Message::new("PRIVMSG", ["#tern", ":)"]);
        assert_eq!(msg.encode(), "PRIVMSG #tern ::)");
    }

    #[test]
    fn encode_plain_params_have_no_colon() {
        let msg = Message::new("JOIN", ["#a,#b"]);
        assert_eq!(msg.encode(), "JOIN #a,#b");
    }

    #[test]
    fn encode_with_origin() {
        let msg = Message::pong("abc").with_origin("tern.example");
        assert_eq!(msg.encode(), ":tern.example PONG abc");
    }

    #[test]
    fn encode_rejects_empty_command() {
        let msg = Message::new("", ["x"]);
        assert_eq!(msg.encode(), "");
    }

    #[test]
    fn encode_rejects_too_many_params() {
        let params: Vec<String> = (0..16).map(|i| format!("p{i}")).collect();
        let msg = Message::new("CMD", params);
        assert_eq!(msg.encode(), "");
    }

    #[test]
    fn encode_rejects_oversize_line() {
        let msg = Message::privmsg("#tern", "x".repeat(600));
        assert_eq!(msg.encode(), "");
    }

    fn well_formed_message() -> impl Strategy<Value = Message> {
        let origin = proptest::option::of("[a-zA-Z][a-zA-Z0-9.!@_-]{0,20}");
        let command = prop_oneof!["[A-Z]{1,10}", "[0-9]{3}"];
        let middles = proptest::collection::vec("[a-zA-Z0-9#_-]{1,8}", 0..6);
        let trailing = proptest::option::of("[a-zA-Z0-9 ]{0,40}");
        (origin, command, middles, trailing).prop_map(|(origin, command, middles, trailing)| {
            let mut params = middles;
            if let Some(trailing) = trailing {
                params.push(trailing);
            }
            Message {
                origin,
                command,
                params,
            }
        })
    }

    proptest! {
        #[test]
        fn round_trip(msg in well_formed_message()) {
            let line = msg.encode();
            prop_assert!(!line.is_empty());
            let back = Message::decode(&line).unwrap();
            prop_assert_eq!(back, msg);
        }
    }
}
