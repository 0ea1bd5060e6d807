//! Minimal SIP URI accessor
//!
//! The host core owns full SIP parsing. Routing only needs the user, host,
//! port and parameters of the request URI, so this is a small nom parser for
//! `sip[s]:[user[:password]@]host[:port][;params][?headers]`.

use std::fmt;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag_no_case, take_till1, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize, rest},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use serde::{Deserialize, Serialize};

use crate::errors::{RoutingError, RoutingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        }
    }
}

/// Parsed SIP URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipUri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub params: Vec<(String, Option<String>)>,
    pub headers: Option<String>,
}

impl SipUri {
    /// Parse a SIP or SIPS URI
    pub fn parse(input: &str) -> RoutingResult<Self> {
        let trimmed = input.trim();
        match all_consuming(sip_uri)(trimmed) {
            Ok((_, uri)) => Ok(uri),
            Err(e) => Err(RoutingError::invalid_uri(input, e.to_string())),
        }
    }

    /// User part, treating an empty user as absent
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref().filter(|u| !u.is_empty())
    }

    /// Value of a URI parameter (`;name=value`), matched case-insensitively
    pub fn param(&self, name: &str) -> Option<Option<&str>> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_deref())
    }

    /// Copy of this URI with the user part replaced
    pub fn with_user(&self, user: Option<&str>) -> Self {
        Self {
            user: user.map(str::to_string),
            password: user.and(self.password.clone()),
            ..self.clone()
        }
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme.as_str())?;
        if let Some(user) = &self.user {
            f.write_str(user)?;
            if let Some(password) = &self.password {
                write!(f, ":{}", password)?;
            }
            f.write_str("@")?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        for (name, value) in &self.params {
            match value {
                Some(value) => write!(f, ";{}={}", name, value)?,
                None => write!(f, ";{}", name)?,
            }
        }
        if let Some(headers) = &self.headers {
            write!(f, "?{}", headers)?;
        }
        Ok(())
    }
}

fn scheme(input: &str) -> IResult<&str, Scheme> {
    alt((
        map(tag_no_case("sips:"), |_| Scheme::Sips),
        map(tag_no_case("sip:"), |_| Scheme::Sip),
    ))(input)
}

fn is_user_char(c: char) -> bool {
    !matches!(c, '@' | ':' | '<' | '>' | '"') && !c.is_whitespace()
}

fn is_password_char(c: char) -> bool {
    c != '@' && !c.is_whitespace()
}

// userinfo = user [ ":" password ] "@"
fn userinfo(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    terminated(
        pair(
            take_while1(is_user_char),
            opt(preceded(char(':'), take_while(is_password_char))),
        ),
        char('@'),
    )(input)
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')
}

// host = hostname / IPv4address / IPv6reference
fn host(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('['), take_till1(|c: char| c == ']'), char(']'))),
        take_while1(is_host_char),
    ))(input)
}

fn port(input: &str) -> IResult<&str, u16> {
    preceded(char(':'), map_res(digit1, |digits: &str| digits.parse::<u16>()))(input)
}

fn is_param_char(c: char) -> bool {
    !matches!(c, ';' | '=' | '?') && !c.is_whitespace()
}

fn param(input: &str) -> IResult<&str, (String, Option<String>)> {
    map(
        preceded(
            char(';'),
            pair(
                take_while1(is_param_char),
                opt(preceded(char('='), take_while(is_param_char))),
            ),
        ),
        |(name, value): (&str, Option<&str>)| (name.to_string(), value.map(str::to_string)),
    )(input)
}

fn sip_uri(input: &str) -> IResult<&str, SipUri> {
    map(
        tuple((
            scheme,
            opt(userinfo),
            host,
            opt(port),
            many0(param),
            opt(preceded(char('?'), rest)),
        )),
        |(scheme, userinfo, host, port, params, headers)| SipUri {
            scheme,
            user: userinfo.map(|(user, _)| user.to_string()),
            password: userinfo.and_then(|(_, password)| password.map(str::to_string)),
            host: host.to_string(),
            port,
            params,
            headers: headers.map(str::to_string),
        },
    )(input)
}
