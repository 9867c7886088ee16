//! CTCP payload parsing and quoting.
//!
//! CTCP rides inside PRIVMSG/NOTICE text bodies, delimited by `\x01`. Only
//! the payload grammar lives here; the auto-responder is a plain subscriber
//! in the client crate.

/// The CTCP delimiter byte.
pub const DELIMITER: char = '\x01';

/// A parsed CTCP query: an uppercase tag and its optional argument string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query<'a> {
    /// The query tag, e.g. `VERSION` or `PING`.
    pub tag: &'a str,
    /// Everything after the tag, if anything.
    pub args: Option<&'a str>,
}

/// Parse a message text body as a CTCP query.
///
/// Returns `None` for plain text and for empty payloads.
pub fn parse(text: &str) -> Option<Query<'_>> {
    let inner = text
        .strip_prefix(DELIMITER)?
        .trim_end_matches(DELIMITER);
    if inner.is_empty() {
        return None;
    }
    match inner.split_once(' ') {
        Some((tag, args)) => Some(Query {
            tag,
            args: Some(args),
        }),
        None => Some(Query {
            tag: inner,
            args: None,
        }),
    }
}

/// Build a CTCP payload from a tag and optional body.
pub fn quote(tag: &str, body: Option<&str>) -> String {
    match body {
        Some(body) => format!("{DELIMITER}{tag} {body}{DELIMITER}"),
        None => format!("{DELIMITER}{tag}{DELIMITER}"),
    }
}
