//! The public command surface: reply-correlated operations (nick changes,
//! joins, messages, whois, ping) and validated fire-and-forget commands.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tern_proto::Message;

use crate::error::{Result, SessionError};
use crate::request::{Outcome, Verdict};
use crate::session::Session;

/// USERHOST takes at most this many nicks per request.
const USERHOST_LIMIT: usize = 5;

/// ISON nick-list cap, sized to keep the encoded line within limits.
const ISON_LIMIT: usize = 53;

/// A channel name must carry a channel sigil and none of the separator
/// bytes the protocol reserves.
fn validate_channel(name: &str) -> Result<()> {
    let well_formed = name.len() > 1
        && name.starts_with(['#', '&', '+', '!'])
        && !name.contains([' ', ',', '\u{7}']);
    if well_formed {
        Ok(())
    } else {
        Err(SessionError::InvalidChannel(name.to_owned()))
    }
}

/// A mode string is a `+` or `-` followed by mode letters.
fn validate_modes(modes: &str) -> Result<()> {
    let well_formed = modes.starts_with(['+', '-'])
        && modes
            .chars()
            .all(|c| c == '+' || c == '-' || c.is_ascii_alphabetic());
    if well_formed {
        Ok(())
    } else {
        Err(SessionError::InvalidArgument(format!(
            "malformed mode string: {modes}"
        )))
    }
}

impl Session {
    /// Request a nick change and wait for the server's verdict. A rejected
    /// nick surfaces as [`SessionError::Protocol`]; on success the session's
    /// nick is updated.
    pub async fn set_nick(&self, nick: &str) -> Result<()> {
        self.inner.negotiate_nick(nick).await
    }

    /// Join one or more comma-separated channels, waiting until the server
    /// echoes a JOIN for every one of them.
    pub async fn join(&self, channels: &str, keys: Option<&str>) -> Result<()> {
        let mut pending: HashSet<String> = HashSet::new();
        for name in channels.split(',') {
            validate_channel(name)?;
            pending.insert(name.to_owned());
        }

        let me = self.nick();
        let mut listen = self.inner.resolve_all(&[
            "ERR_NEEDMOREPARAMS",
            "ERR_BANNEDFROMCHAN",
            "ERR_INVITEONLYCHAN",
            "ERR_BADCHANNELKEY",
            "ERR_CHANNELISFULL",
            "ERR_BADCHANMASK",
            "ERR_NOSUCHCHANNEL",
            "ERR_TOOMANYCHANNELS",
            "ERR_TOOMANYTARGETS",
        ]);
        listen.push("JOIN".to_owned());

        let outcome = self
            .inner
            .request(
                Message::join(channels, keys.map(str::to_owned)),
                &listen,
                move |msg| {
                    if msg.command != "JOIN" {
                        return Verdict::Reject;
                    }
                    // Other users' joins to shared channels pass through here.
                    let ours = msg
                        .source_nick()
                        .is_some_and(|n| n.eq_ignore_ascii_case(&me));
                    if ours {
                        if let Some(chan) = msg.target() {
                            pending.remove(chan);
                        }
                    }
                    if pending.is_empty() {
                        Verdict::Accept
                    } else {
                        Verdict::Collect
                    }
                },
            )
            .await?;

        self.finish(outcome).map(|_| ())
    }

    /// Send a PRIVMSG and watch briefly for a delivery error. Silence
    /// within the deadline counts as delivered; an away notice resets the
    /// deadline but is not a failure.
    pub async fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        let away = self.inner.replies.resolve("RPL_AWAY");
        let mut listen = self.inner.resolve_all(&[
            "ERR_NORECIPIENT",
            "ERR_NOTEXTTOSEND",
            "ERR_CANNOTSENDTOCHAN",
            "ERR_NOTOPLEVEL",
            "ERR_WILDTOPLEVEL",
            "ERR_TOOMANYTARGETS",
            "ERR_NOSUCHNICK",
        ]);
        listen.push(away.clone());

        let outcome = self
            .inner
            .request(Message::privmsg(target, text), &listen, move |msg| {
                if msg.command == away {
                    Verdict::Collect
                } else {
                    Verdict::Reject
                }
            })
            .await?;
        self.inner.expect_quiet(outcome)
    }

    /// WHOIS a nick and gather the multi-line response until the end-of
    /// marker, keyed by symbolic reply name.
    pub async fn whois(&self, target: &str) -> Result<HashMap<String, Vec<String>>> {
        let end = self.inner.replies.resolve("RPL_ENDOFWHOIS");
        let errors: HashSet<String> = self
            .inner
            .resolve_all(&["ERR_NOSUCHNICK", "ERR_NOSUCHSERVER", "ERR_NONICKNAMEGIVEN"])
            .into_iter()
            .collect();

        let mut listen = self.inner.resolve_all(&[
            "RPL_WHOISUSER",
            "RPL_WHOISSERVER",
            "RPL_WHOISOPERATOR",
            "RPL_WHOISIDLE",
            "RPL_WHOISCHANNELS",
            "RPL_AWAY",
            "ERR_NOSUCHNICK",
            "ERR_NOSUCHSERVER",
            "ERR_NONICKNAMEGIVEN",
        ]);
        listen.push(end.clone());

        let outcome = self
            .inner
            .request(Message::new("WHOIS", [target]), &listen, move |msg| {
                if msg.command == end {
                    Verdict::Accept
                } else if errors.contains(&msg.command) {
                    Verdict::Reject
                } else {
                    Verdict::Collect
                }
            })
            .await?;

        let replies = self.finish(outcome)?;
        let mut report: HashMap<String, Vec<String>> = HashMap::new();
        for reply in replies {
            let name = self.inner.replies.describe(&reply.command);
            // The first parameter is our own nick; the rest is the payload.
            let detail = reply
                .params
                .iter()
                .skip(1)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            report.entry(name).or_default().push(detail);
        }
        Ok(report)
    }

    /// Ping the server and return the measured round trip, which also
    /// refreshes the session's lag estimate.
    pub async fn ping(&self) -> Result<Duration> {
        self.inner.calibrate().await
    }

    /// Leave one or more comma-separated channels.
    pub async fn part(&self, channels: &str) -> Result<()> {
        for name in channels.split(',') {
            validate_channel(name)?;
        }
        self.send(Message::new("PART", [channels])).await
    }

    /// Set a channel topic, or query it when `topic` is `None`.
    pub async fn topic(&self, channel: &str, topic: Option<&str>) -> Result<()> {
        validate_channel(channel)?;
        let msg = match topic {
            Some(text) => Message::new("TOPIC", [channel, text]),
            None => Message::new("TOPIC", [channel]),
        };
        self.send(msg).await
    }

    /// Request NAMES, optionally scoped to comma-separated channels.
    pub async fn names(&self, channels: Option<&str>) -> Result<()> {
        self.send(Message::new("NAMES", channels.into_iter())).await
    }

    /// Request LIST, optionally scoped to comma-separated channels.
    pub async fn list(&self, channels: Option<&str>) -> Result<()> {
        self.send(Message::new("LIST", channels.into_iter())).await
    }

    /// Invite a nick to a channel.
    pub async fn invite(&self, nick: &str, channel: &str) -> Result<()> {
        validate_channel(channel)?;
        self.send(Message::new("INVITE", [nick, channel])).await
    }

    /// Kick a user from a channel, with an optional comment.
    pub async fn kick(&self, channel: &str, user: &str, comment: Option<&str>) -> Result<()> {
        validate_channel(channel)?;
        let msg = match comment {
            Some(comment) => Message::new("KICK", [channel, user, comment]),
            None => Message::new("KICK", [channel, user]),
        };
        self.send(msg).await
    }

    /// Send a NOTICE. Notices are never correlated; servers must not
    /// answer them with automatic replies.
    pub async fn notice(&self, target: &str, text: &str) -> Result<()> {
        self.send(Message::notice(target, text)).await
    }

    /// Send a WHO query for a mask, optionally restricted to operators.
    pub async fn who(&self, mask: &str, ops_only: bool) -> Result<()> {
        let msg = if ops_only {
            Message::new("WHO", [mask, "o"])
        } else {
            Message::new("WHO", [mask])
        };
        self.send(msg).await
    }

    /// Send a WHOWAS query for a nick.
    pub async fn whowas(&self, nick: &str) -> Result<()> {
        self.send(Message::new("WHOWAS", [nick])).await
    }

    /// Mark the session away with a message, or clear the away state
    /// when `message` is `None`.
    pub async fn away(&self, message: Option<&str>) -> Result<()> {
        self.send(Message::new("AWAY", message.into_iter())).await
    }

    /// Query user-host info for up to five nicks.
    pub async fn userhost(&self, nicks: &[&str]) -> Result<()> {
        if nicks.is_empty() || nicks.len() > USERHOST_LIMIT {
            return Err(SessionError::InvalidArgument(format!(
                "USERHOST takes 1 to {USERHOST_LIMIT} nicks, got {}",
                nicks.len()
            )));
        }
        self.send(Message::new("USERHOST", nicks.iter().copied()))
            .await
    }

    /// Ask which of the given nicks are online.
    pub async fn ison(&self, nicks: &[&str]) -> Result<()> {
        if nicks.is_empty() || nicks.len() > ISON_LIMIT {
            return Err(SessionError::InvalidArgument(format!(
                "ISON takes 1 to {ISON_LIMIT} nicks, got {}",
                nicks.len()
            )));
        }
        self.send(Message::new("ISON", [nicks.join(" ")])).await
    }

    /// Request operator privileges.
    pub async fn oper(&self, user: &str, password: &str) -> Result<()> {
        self.send(Message::new("OPER", [user, password])).await
    }

    /// Send a MODE change for a user or channel target.
    pub async fn mode(&self, target: &str, modes: &str, args: &[&str]) -> Result<()> {
        validate_modes(modes)?;
        let mut params = vec![target, modes];
        params.extend_from_slice(args);
        self.send(Message::new("MODE", params)).await
    }

    /// Map a correlation outcome to the collected replies, turning a
    /// refusal into a protocol error and a lapse into a timeout.
    fn finish(&self, outcome: Outcome) -> Result<Vec<std::sync::Arc<Message>>> {
        match outcome {
            Outcome::Done { replies, .. } => Ok(replies),
            Outcome::Refused { code, .. } => {
                Err(SessionError::Protocol(self.inner.replies.describe(&code)))
            }
            Outcome::Lapsed { .. } => Err(SessionError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn session() -> Session {
        Session::new(Config::new("127.0.0.1:0", "tern", "tern", "Tern Bot"))
    }

    #[test]
    fn channel_validation() {
        assert!(validate_channel("#tern").is_ok());
        assert!(validate_channel("&local").is_ok());
        assert!(validate_channel("tern").is_err());
        assert!(validate_channel("#").is_err());
        assert!(validate_channel("#has space").is_err());
        assert!(validate_channel("#has\u{7}bell").is_err());
    }

    #[test]
    fn mode_validation() {
        assert!(validate_modes("+o").is_ok());
        assert!(validate_modes("-v+b").is_ok());
        assert!(validate_modes("o").is_err());
        assert!(validate_modes("+o 1").is_err());
    }

    #[tokio::test]
    async fn join_rejects_bad_channel_before_sending() {
        let err = session().join("badchan", None).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidChannel(_)));

        let err = session().join("#ok,badchan", None).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidChannel(_)));
    }

    #[tokio::test]
    async fn empty_nick_change_is_a_no_op() {
        let session = session();
        session.set_nick("").await.unwrap();
        assert_eq!(session.nick(), "tern");
    }

    #[tokio::test]
    async fn userhost_enforces_nick_limit() {
        let nicks = ["a", "b", "c", "d", "e", "f"];
        let err = session().userhost(&nicks).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
        assert!(session().userhost(&nicks[..5]).await.is_ok());
    }
}
