//! SIP request methods and `is_method` pattern matching

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// SIP request method
///
/// Extension methods are kept verbatim in [`Method::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Subscribe,
    Notify,
    Publish,
    Info,
    Update,
    Refer,
    Message,
    Prack,
    Other(String),
}

impl Method {
    /// Canonical upper-case token
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Register => "REGISTER",
            Method::Options => "OPTIONS",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Publish => "PUBLISH",
            Method::Info => "INFO",
            Method::Update => "UPDATE",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
            Method::Prack => "PRACK",
            Method::Other(token) => token,
        }
    }

    /// Match against a `|`-separated method pattern such as `"INVITE|SUBSCRIBE"`.
    ///
    /// Comparison is case-insensitive. Empty alternatives never match.
    pub fn matches(&self, pattern: &str) -> bool {
        let token = self.as_str();
        pattern
            .split('|')
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .any(|alt| alt.eq_ignore_ascii_case(token))
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "REGISTER" => Method::Register,
            "OPTIONS" => Method::Options,
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "PUBLISH" => Method::Publish,
            "INFO" => Method::Info,
            "UPDATE" => Method::Update,
            "REFER" => Method::Refer,
            "MESSAGE" => Method::Message,
            "PRACK" => Method::Prack,
            _ => Method::Other(s.to_string()),
        };
        Ok(method)
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(method) => method,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternation_matches_any_member() {
        assert!(Method::Subscribe.matches("INVITE|SUBSCRIBE"));
        assert!(Method::Invite.matches("INVITE|SUBSCRIBE"));
        assert!(!Method::Bye.matches("INVITE|SUBSCRIBE"));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert!(Method::Register.matches("register"));
        assert!(Method::from("notify").matches("NOTIFY"));
    }

    #[test]
    fn test_empty_alternatives_never_match() {
        assert!(!Method::Invite.matches(""));
        assert!(!Method::Invite.matches("||"));
    }

    #[test]
    fn test_extension_method_roundtrips_token() {
        let method = Method::from("X-PING");
        assert_eq!(method, Method::Other("X-PING".to_string()));
        assert!(method.matches("OPTIONS|x-ping"));
        assert_eq!(method.to_string(), "X-PING");
    }
}
