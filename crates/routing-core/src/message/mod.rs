//! In-flight SIP message context
//!
//! A [`Message`] is created by the host transport once a frame has been
//! parsed, is owned by the routing engine for exactly one routing pass, and
//! is handed back to the host afterwards. Everything routing-related that is
//! scoped to one message lives here: the request URI and its parse cache,
//! the destination URI, flags, queued branch parameters and the callbacks
//! armed for the transaction.
//!
//! ## Parse cache invariant
//!
//! The parsed request URI is cached together with `parsed_uri_ok`. Every
//! request URI rewrite resets `parsed_uri_ok` and `parsed_orig_ruri_ok` and
//! drops the cached parses, so a stale parse is never observed.

mod flags;
mod method;
mod uri;

pub use flags::{MessageFlags, RouteFlag};
pub use method::Method;
pub use uri::{Scheme, SipUri};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::{RoutingError, RoutingResult};

/// Upper bound on the fragment queued for the Via branch parameter
pub const MAX_BRANCH_PARAM_LEN: usize = 256;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a message, unique within the worker process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    pub fn next() -> Self {
        Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// First line of the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirstLine {
    Request { method: Method, uri: String },
    Reply { status: u16, reason: String, cseq_method: Method },
}

/// A parsed header field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Address/port overriding the host's listening socket for outbound sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSocket {
    pub address: String,
    pub port: u16,
}

/// Callback routes armed for the transaction created by this message.
///
/// These are registrations only. The host core runs them later, per forked
/// branch, per upstream reply or on failure, outside the routing pass that
/// armed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedCallbacks {
    pub branch: Option<String>,
    pub reply: Option<String>,
    pub failure: Option<String>,
}

impl ArmedCallbacks {
    pub fn is_empty(&self) -> bool {
        self.branch.is_none() && self.reply.is_none() && self.failure.is_none()
    }
}

#[derive(Debug, Clone)]
struct UriCache {
    source: String,
    uri: SipUri,
}

/// In-flight SIP message
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    buf: Bytes,
    parsed_offset: usize,
    orig_len: usize,
    first_line: FirstLine,
    headers: Vec<Header>,
    new_uri: Option<String>,
    dst_uri: Option<String>,
    parsed_uri_ok: bool,
    parsed_uri: Option<UriCache>,
    parsed_orig_ruri_ok: bool,
    parsed_orig_ruri: Option<UriCache>,
    add_to_branch: String,
    branches: Vec<String>,
    hash_index: Option<u32>,
    flags: MessageFlags,
    force_send_socket: Option<SendSocket>,
    callbacks: ArmedCallbacks,
    terminal: Option<&'static str>,
}

impl Message {
    /// Start building a request
    pub fn request(method: impl Into<Method>, uri: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(FirstLine::Request {
            method: method.into(),
            uri: uri.into(),
        })
    }

    /// Start building a reply; `cseq_method` is the method the reply answers
    pub fn reply(status: u16, reason: impl Into<String>, cseq_method: impl Into<Method>) -> MessageBuilder {
        MessageBuilder::new(FirstLine::Reply {
            status,
            reason: reason.into(),
            cseq_method: cseq_method.into(),
        })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn buffer(&self) -> &Bytes {
        &self.buf
    }

    pub fn parsed_offset(&self) -> usize {
        self.parsed_offset
    }

    pub fn orig_len(&self) -> usize {
        self.orig_len
    }

    pub fn first_line(&self) -> &FirstLine {
        &self.first_line
    }

    pub fn is_request(&self) -> bool {
        matches!(self.first_line, FirstLine::Request { .. })
    }

    pub fn is_reply(&self) -> bool {
        !self.is_request()
    }

    /// Request method, or the CSeq method for replies
    pub fn method(&self) -> &Method {
        match &self.first_line {
            FirstLine::Request { method, .. } => method,
            FirstLine::Reply { cseq_method, .. } => cseq_method,
        }
    }

    /// Reply status code, `None` for requests
    pub fn status(&self) -> Option<u16> {
        match &self.first_line {
            FirstLine::Reply { status, .. } => Some(*status),
            FirstLine::Request { .. } => None,
        }
    }

    /// Request URI as received
    pub fn orig_ruri(&self) -> &str {
        match &self.first_line {
            FirstLine::Request { uri, .. } => uri,
            FirstLine::Reply { .. } => "",
        }
    }

    /// Current request URI (rewritten one if any)
    pub fn ruri(&self) -> &str {
        self.new_uri.as_deref().unwrap_or_else(|| self.orig_ruri())
    }

    pub fn is_ruri_rewritten(&self) -> bool {
        self.new_uri.is_some()
    }

    pub fn parsed_uri_ok(&self) -> bool {
        self.parsed_uri_ok
    }

    pub fn parsed_orig_ruri_ok(&self) -> bool {
        self.parsed_orig_ruri_ok
    }

    /// Parsed current request URI, parsing on first access
    pub fn parsed_uri(&mut self) -> RoutingResult<&SipUri> {
        if !self.parsed_uri_ok || self.parsed_uri.is_none() {
            let source = self.ruri().to_string();
            let uri = SipUri::parse(&source)?;
            self.parsed_uri = Some(UriCache { source, uri });
            self.parsed_uri_ok = true;
        }
        match &self.parsed_uri {
            Some(cache) => Ok(&cache.uri),
            None => Err(RoutingError::malformed(self.id.0, "request URI cache missing after parse")),
        }
    }

    /// Parsed original request URI, parsing on first access
    pub fn parsed_orig_ruri(&mut self) -> RoutingResult<&SipUri> {
        if !self.parsed_orig_ruri_ok || self.parsed_orig_ruri.is_none() {
            let source = self.orig_ruri().to_string();
            let uri = SipUri::parse(&source)?;
            self.parsed_orig_ruri = Some(UriCache { source, uri });
            self.parsed_orig_ruri_ok = true;
        }
        match &self.parsed_orig_ruri {
            Some(cache) => Ok(&cache.uri),
            None => Err(RoutingError::malformed(self.id.0, "original URI cache missing after parse")),
        }
    }

    /// User part of the current request URI (`$rU`)
    pub fn ruri_user(&mut self) -> RoutingResult<Option<String>> {
        Ok(self.parsed_uri()?.user().map(str::to_string))
    }

    /// Replace the request URI
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        let uri = uri.into();
        trace!("{}: request URI rewritten to {}", self.id, uri);
        self.new_uri = Some(uri);
        self.invalidate_uri_cache();
    }

    /// Alias of [`Message::set_uri`], kept for the host's `rewriteuri` action name
    pub fn rewrite_uri(&mut self, uri: impl Into<String>) {
        self.set_uri(uri);
    }

    /// Drop any rewrite and go back to the received request URI
    pub fn revert_uri(&mut self) {
        if self.new_uri.take().is_some() {
            trace!("{}: request URI reverted", self.id);
        }
        self.invalidate_uri_cache();
    }

    /// Replace only the user part of the request URI
    pub fn set_user(&mut self, user: Option<&str>) -> RoutingResult<()> {
        let rewritten = self.parsed_uri()?.with_user(user).to_string();
        self.set_uri(rewritten);
        Ok(())
    }

    fn invalidate_uri_cache(&mut self) {
        self.parsed_uri_ok = false;
        self.parsed_uri = None;
        self.parsed_orig_ruri_ok = false;
        self.parsed_orig_ruri = None;
    }

    pub fn dst_uri(&self) -> Option<&str> {
        self.dst_uri.as_deref()
    }

    pub fn set_dst_uri(&mut self, uri: impl Into<String>) {
        self.dst_uri = Some(uri.into());
    }

    pub fn reset_dst_uri(&mut self) {
        self.dst_uri = None;
    }

    /// First header with the given name (case-insensitive, compact forms accepted)
    pub fn header(&self, name: &str) -> Option<&str> {
        let wanted = canonical_header_name(name);
        self.headers
            .iter()
            .find(|h| canonical_header_name(&h.name).eq_ignore_ascii_case(wanted))
            .map(|h| h.value.as_str())
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Append a header field
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Remove all headers with the given name, returning how many were removed
    pub fn remove_header(&mut self, name: &str) -> usize {
        let wanted = canonical_header_name(name).to_string();
        let before = self.headers.len();
        self.headers
            .retain(|h| !canonical_header_name(&h.name).eq_ignore_ascii_case(&wanted));
        before - self.headers.len()
    }

    /// Tag parameter of the To header, if present and non-empty
    pub fn to_tag(&self) -> Option<&str> {
        self.header("To").and_then(|to| header_param(to, "tag"))
    }

    /// URI carried by the From header
    pub fn from_uri(&self) -> Option<&str> {
        self.header("From").map(name_addr_uri)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("User-Agent")
    }

    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: RouteFlag) {
        self.flags.set(flag);
    }

    pub fn reset_flag(&mut self, flag: RouteFlag) {
        self.flags.reset(flag);
    }

    pub fn is_flag_set(&self, flag: RouteFlag) -> bool {
        self.flags.is_set(flag)
    }

    /// Fragment queued for the Via branch parameter
    pub fn branch_param(&self) -> &str {
        &self.add_to_branch
    }

    /// Queue text for the branch parameter, bounded by [`MAX_BRANCH_PARAM_LEN`]
    pub fn append_branch_param(&mut self, fragment: &str) -> RoutingResult<()> {
        let len = self.add_to_branch.len() + fragment.len();
        if len > MAX_BRANCH_PARAM_LEN {
            return Err(RoutingError::BranchParamOverflow {
                len,
                max: MAX_BRANCH_PARAM_LEN,
            });
        }
        self.add_to_branch.push_str(fragment);
        Ok(())
    }

    /// Extra destinations added for parallel forking
    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    /// Add a fork destination; without a URI the current request URI is used
    pub fn append_branch(&mut self, uri: Option<&str>) {
        let target = uri.map(str::to_string).unwrap_or_else(|| self.ruri().to_string());
        self.branches.push(target);
    }

    pub fn hash_index(&self) -> Option<u32> {
        self.hash_index
    }

    pub fn set_hash_index(&mut self, index: u32) {
        self.hash_index = Some(index);
    }

    pub fn force_send_socket(&self) -> Option<&SendSocket> {
        self.force_send_socket.as_ref()
    }

    pub fn set_force_send_socket(&mut self, address: impl Into<String>, port: u16) {
        self.force_send_socket = Some(SendSocket {
            address: address.into(),
            port,
        });
    }

    pub fn callbacks(&self) -> &ArmedCallbacks {
        &self.callbacks
    }

    pub(crate) fn callbacks_mut(&mut self) -> &mut ArmedCallbacks {
        &mut self.callbacks
    }

    /// Name of the terminal action already issued for this message
    pub fn terminal_action(&self) -> Option<&'static str> {
        self.terminal
    }

    /// Latch a terminal action; a second one is refused
    pub(crate) fn latch_terminal(&mut self, action: &'static str) -> RoutingResult<()> {
        match self.terminal {
            Some(previous) => Err(RoutingError::DuplicateTerminal {
                id: self.id.0,
                previous,
                attempted: action,
            }),
            None => {
                self.terminal = Some(action);
                Ok(())
            }
        }
    }

    /// Check that the message state is internally consistent
    pub fn validate(&self) -> RoutingResult<()> {
        let id = self.id.0;
        if self.parsed_offset > self.buf.len() {
            return Err(RoutingError::malformed(
                id,
                format!("parsed offset {} beyond buffer of {} bytes", self.parsed_offset, self.buf.len()),
            ));
        }
        if self.orig_len > self.buf.len() {
            return Err(RoutingError::malformed(
                id,
                format!("original length {} beyond buffer of {} bytes", self.orig_len, self.buf.len()),
            ));
        }
        if self.is_request() && self.orig_ruri().trim().is_empty() {
            return Err(RoutingError::malformed(id, "request without request URI"));
        }
        match (&self.parsed_uri, self.parsed_uri_ok) {
            (None, true) => return Err(RoutingError::malformed(id, "parsed_uri_ok set without a parsed URI")),
            (Some(cache), true) if cache.source != self.ruri() => {
                return Err(RoutingError::malformed(id, "parsed URI does not match the request URI"));
            }
            _ => {}
        }
        match (&self.parsed_orig_ruri, self.parsed_orig_ruri_ok) {
            (None, true) => Err(RoutingError::malformed(id, "parsed_orig_ruri_ok set without a parsed URI")),
            (Some(cache), true) if cache.source != self.orig_ruri() => {
                Err(RoutingError::malformed(id, "parsed original URI does not match the received one"))
            }
            _ => Ok(()),
        }
    }
}

/// Builder for [`Message`], used by host adapters and tests
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    first_line: FirstLine,
    headers: Vec<Header>,
    buffer: Option<Bytes>,
    parsed_offset: Option<usize>,
    hash_index: Option<u32>,
    flags: MessageFlags,
    dst_uri: Option<String>,
}

impl MessageBuilder {
    fn new(first_line: FirstLine) -> Self {
        Self {
            first_line,
            headers: Vec::new(),
            buffer: None,
            parsed_offset: None,
            hash_index: None,
            flags: MessageFlags::new(),
            dst_uri: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn from(self, uri: &str) -> Self {
        self.header("From", format!("<{}>;tag=1928301774", uri))
    }

    /// To header without a tag (initial request)
    pub fn to(self, uri: &str) -> Self {
        self.header("To", format!("<{}>", uri))
    }

    /// To header carrying a tag (in-dialog request)
    pub fn to_tagged(self, uri: &str, tag: &str) -> Self {
        self.header("To", format!("<{}>;tag={}", uri, tag))
    }

    /// Raw bytes as received; defaults to a rendering of the first line and headers
    pub fn buffer(mut self, buffer: impl Into<Bytes>) -> Self {
        self.buffer = Some(buffer.into());
        self
    }

    /// Parsed/unparsed boundary reported by the host parser
    pub fn parsed_offset(mut self, offset: usize) -> Self {
        self.parsed_offset = Some(offset);
        self
    }

    pub fn hash_index(mut self, index: u32) -> Self {
        self.hash_index = Some(index);
        self
    }

    pub fn flag(mut self, flag: RouteFlag) -> Self {
        self.flags.set(flag);
        self
    }

    pub fn dst_uri(mut self, uri: impl Into<String>) -> Self {
        self.dst_uri = Some(uri.into());
        self
    }

    pub fn build(self) -> Message {
        let buf = self
            .buffer
            .unwrap_or_else(|| render(&self.first_line, &self.headers));
        let len = buf.len();
        Message {
            id: MessageId::next(),
            parsed_offset: self.parsed_offset.unwrap_or(len),
            orig_len: len,
            buf,
            first_line: self.first_line,
            headers: self.headers,
            new_uri: None,
            dst_uri: self.dst_uri,
            parsed_uri_ok: false,
            parsed_uri: None,
            parsed_orig_ruri_ok: false,
            parsed_orig_ruri: None,
            add_to_branch: String::new(),
            branches: Vec::new(),
            hash_index: self.hash_index,
            flags: self.flags,
            force_send_socket: None,
            callbacks: ArmedCallbacks::default(),
            terminal: None,
        }
    }
}

fn render(first_line: &FirstLine, headers: &[Header]) -> Bytes {
    let mut out = match first_line {
        FirstLine::Request { method, uri } => format!("{} {} SIP/2.0\r\n", method, uri),
        FirstLine::Reply { status, reason, .. } => format!("SIP/2.0 {} {}\r\n", status, reason),
    };
    for header in headers {
        out.push_str(&header.name);
        out.push_str(": ");
        out.push_str(&header.value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    Bytes::from(out)
}

fn canonical_header_name(name: &str) -> &str {
    match name {
        "t" | "T" => "To",
        "f" | "F" => "From",
        "i" | "I" => "Call-ID",
        "v" | "V" => "Via",
        "m" | "M" => "Contact",
        "o" | "O" => "Event",
        "l" | "L" => "Content-Length",
        _ => name,
    }
}

/// Value of a `;name=value` parameter in a header, outside the angle brackets
fn header_param<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    let params = match value.rfind('>') {
        Some(end) => &value[end + 1..],
        None => value,
    };
    params
        .split(';')
        .skip(1)
        .filter_map(|p| p.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// URI inside a name-addr (`"Alice" <sip:alice@x>;tag=1`) or bare addr-spec
fn name_addr_uri(value: &str) -> &str {
    if let (Some(start), Some(end)) = (value.find('<'), value.find('>')) {
        if start < end {
            return value[start + 1..end].trim();
        }
    }
    value.split(';').next().unwrap_or(value).trim()
}
