//! The numeric reply-code table.
//!
//! Servers answer client requests with 3-digit numeric reply identifiers.
//! The mapping between symbolic names and codes is data, not logic: the
//! session owns an immutable [`ReplyTable`] seeded from
//! [`STANDARD_REPLIES`], and tests may substitute a custom table.

use std::collections::HashMap;

/// The subscription key that matches every command.
pub const WILDCARD: &str = "*";

/// Symbolic name / numeric code pairs from RFC 1459 and common usage.
///
/// Coverage is partial by design and freely extensible.
pub const STANDARD_REPLIES: &[(&str, &str)] = &[
    ("ERR_NOSUCHNICK", "401"),
    ("ERR_NOSUCHSERVER", "402"),
    ("ERR_NOSUCHCHANNEL", "403"),
    ("ERR_CANNOTSENDTOCHAN", "404"),
    ("ERR_TOOMANYCHANNELS", "405"),
    ("ERR_WASNOSUCHNICK", "406"),
    ("ERR_TOOMANYTARGETS", "407"),
    ("ERR_NOORIGIN", "409"),
    ("ERR_NORECIPIENT", "411"),
    ("ERR_NOTEXTTOSEND", "412"),
    ("ERR_NOTOPLEVEL", "413"),
    ("ERR_WILDTOPLEVEL", "414"),
    ("ERR_UNKNOWNCOMMAND", "421"),
    ("ERR_NOMOTD", "422"),
    ("ERR_NOADMININFO", "423"),
    ("ERR_FILEERROR", "424"),
    ("ERR_NONICKNAMEGIVEN", "431"),
    ("ERR_ERRONEUSNICKNAME", "432"),
    ("ERR_NICKNAMEINUSE", "433"),
    ("ERR_NICKCOLLISION", "436"),
    ("ERR_USERNOTINCHANNEL", "441"),
    ("ERR_NOTONCHANNEL", "442"),
    ("ERR_USERONCHANNEL", "443"),
    ("ERR_NOLOGIN", "444"),
    ("ERR_SUMMONDISABLED", "445"),
    ("ERR_USERSDISABLED", "446"),
    ("ERR_NOTREGISTERED", "451"),
    ("ERR_NEEDMOREPARAMS", "461"),
    ("ERR_ALREADYREGISTRED", "462"),
    ("ERR_NOPERMFORHOST", "463"),
    ("ERR_PASSWDMISMATCH", "464"),
    ("ERR_YOUREBANNEDCREEP", "465"),
    ("ERR_KEYSET", "467"),
    ("ERR_CHANNELISFULL", "471"),
    ("ERR_UNKNOWNMODE", "472"),
    ("ERR_INVITEONLYCHAN", "473"),
    ("ERR_BANNEDFROMCHAN", "474"),
    ("ERR_BADCHANNELKEY", "475"),
    ("ERR_BADCHANMASK", "476"),
    ("ERR_NOPRIVILEGES", "481"),
    ("ERR_CHANOPRIVSNEEDED", "482"),
    ("ERR_CANTKILLSERVER", "483"),
    ("ERR_NOOPERHOST", "491"),
    ("ERR_UMODEUNKNOWNFLAG", "501"),
    ("ERR_USERSDONTMATCH", "502"),
    ("RPL_NONE", "300"),
    ("RPL_AWAY", "301"),
    ("RPL_USERHOST", "302"),
    ("RPL_ISON", "303"),
    ("RPL_UNAWAY", "305"),
    ("RPL_NOWAWAY", "306"),
    ("RPL_WHOISUSER", "311"),
    ("RPL_WHOISSERVER", "312"),
    ("RPL_WHOISOPERATOR", "313"),
    ("RPL_WHOWASUSER", "314"),
    ("RPL_ENDOFWHO", "315"),
    ("RPL_WHOISIDLE", "317"),
    ("RPL_ENDOFWHOIS", "318"),
    ("RPL_WHOISCHANNELS", "319"),
    ("RPL_LISTSTART", "321"),
    ("RPL_LIST", "322"),
    ("RPL_LISTEND", "323"),
    ("RPL_CHANNELMODEIS", "324"),
    ("RPL_NOTOPIC", "331"),
    ("RPL_TOPIC", "332"),
    ("RPL_INVITING", "341"),
    ("RPL_SUMMONING", "342"),
    ("RPL_VERSION", "351"),
    ("RPL_WHOREPLY", "352"),
    ("RPL_NAMREPLY", "353"),
    ("RPL_LINKS", "364"),
    ("RPL_ENDOFLINKS", "365"),
    ("RPL_ENDOFNAMES", "366"),
    ("RPL_BANLIST", "367"),
    ("RPL_ENDOFBANLIST", "368"),
    ("RPL_ENDOFWHOWAS", "369"),
    ("RPL_INFO", "371"),
    ("RPL_MOTD", "372"),
    ("RPL_ENDOFINFO", "374"),
    ("RPL_MOTDSTART", "375"),
    ("RPL_ENDOFMOTD", "376"),
    ("RPL_YOUREOPER", "381"),
    ("RPL_REHASHING", "382"),
    ("RPL_TIME", "391"),
    ("RPL_USERSSTART", "392"),
    ("RPL_USERS", "393"),
    ("RPL_ENDOFUSERS", "394"),
    ("RPL_NOUSERS", "395"),
    ("RPL_TRACELINK", "200"),
    ("RPL_TRACECONNECTING", "201"),
    ("RPL_TRACEHANDSHAKE", "202"),
    ("RPL_TRACEUNKNOWN", "203"),
    ("RPL_TRACEOPERATOR", "204"),
    ("RPL_TRACEUSER", "205"),
    ("RPL_TRACESERVER", "206"),
    ("RPL_TRACENEWTYPE", "208"),
    ("RPL_STATSLINKINFO", "211"),
    ("RPL_STATSCOMMANDS", "212"),
    ("RPL_STATSCLINE", "213"),
    ("RPL_STATSNLINE", "214"),
    ("RPL_STATSILINE", "215"),
    ("RPL_STATSKLINE", "216"),
    ("RPL_STATSYLINE", "218"),
    ("RPL_ENDOFSTATS", "219"),
    ("RPL_UMODEIS", "221"),
    ("RPL_STATSLLINE", "241"),
    ("RPL_STATSUPTIME", "242"),
    ("RPL_STATSOLINE", "243"),
    ("RPL_STATSHLINE", "244"),
    ("RPL_LUSERCLIENT", "251"),
    ("RPL_LUSEROP", "252"),
    ("RPL_LUSERUNKNOWN", "253"),
    ("RPL_LUSERCHANNELS", "254"),
    ("RPL_LUSERME", "255"),
    ("RPL_ADMINME", "256"),
    ("RPL_ADMINEMAIL", "259"),
    ("RPL_TRACELOG", "261"),
];

/// An immutable symbolic-name / reply-code lookup.
#[derive(Clone, Debug)]
pub struct ReplyTable {
    by_name: HashMap<String, String>,
    by_code: HashMap<String, String>,
}

impl ReplyTable {
    /// The standard table.
    pub fn standard() -> Self {
        Self::from_pairs(STANDARD_REPLIES)
    }

    /// Build a table from `(symbolic name, code)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut by_name = HashMap::with_capacity(pairs.len());
        let mut by_code = HashMap::with_capacity(pairs.len());
        for (name, code) in pairs {
            by_name.insert((*name).to_owned(), (*code).to_owned());
            by_code.insert((*code).to_owned(), (*name).to_owned());
        }
        ReplyTable { by_name, by_code }
    }

    /// The numeric code for a symbolic name.
    pub fn code(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// The symbolic name for a numeric code.
    pub fn name(&self, code: &str) -> Option<&str> {
        self.by_code.get(code).map(String::as_str)
    }

    /// Resolve a reply identifier to what appears on the wire.
    ///
    /// Symbolic names map to their numeric code; anything not in the table
    /// (textual commands such as `JOIN` or `PONG`) passes through unchanged.
    pub fn resolve(&self, identifier: &str) -> String {
        self.code(identifier)
            .map(str::to_owned)
            .unwrap_or_else(|| identifier.to_owned())
    }

    /// Describe a wire command for diagnostics: the symbolic name when the
    /// code is known, otherwise the command itself.
    pub fn describe(&self, command: &str) -> String {
        self.name(command)
            .map(str::to_owned)
            .unwrap_or_else(|| command.to_owned())
    }
}

impl Default for ReplyTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_lookups() {
        let table = ReplyTable::standard();
        assert_eq!(table.code("ERR_NICKNAMEINUSE"), Some("433"));
        assert_eq!(table.name("318"), Some("RPL_ENDOFWHOIS"));
        assert_eq!(table.code("NOT_A_REPLY"), None);
    }

    #[test]
    fn resolve_passes_textual_commands_through() {
        let table = ReplyTable::standard();
        assert_eq!(table.resolve("ERR_NOSUCHNICK"), "401");
        assert_eq!(table.resolve("JOIN"), "JOIN");
        assert_eq!(table.resolve("PONG"), "PONG");
    }

    #[test]
    fn custom_tables_are_injectable() {
        let table = ReplyTable::from_pairs(&[("ERR_TESTONLY", "999")]);
        assert_eq!(table.resolve("ERR_TESTONLY"), "999");
        assert_eq!(table.describe("999"), "ERR_TESTONLY");
        assert_eq!(table.describe("433"), "433");
    }
}
