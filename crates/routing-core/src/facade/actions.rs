//! Typed core action facade
//!
//! [`CoreActions`] is the only way routes talk to the host core. Native
//! return codes are converted to `bool` (or [`LookupResult`]) here, so route
//! code branches on predicates only. Message-local operations (method
//! matching, flags, header edits, callback bookkeeping) are served from the
//! [`Message`] without a host round trip.
//!
//! Terminal actions (relay, replies, registrar save) go through the
//! message's terminal latch: once one of them has been issued, any further
//! terminal action on the same message is refused with
//! [`RoutingError::DuplicateTerminal`].

use std::sync::Arc;

use tracing::{debug, trace};

use crate::errors::{RoutingError, RoutingResult};
use crate::facade::host::{CallbackKind, HostCore, ReturnCode};
use crate::message::{Message, RouteFlag};

/// Outcome of a location lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    Found,
    NotFound,
    MethodNotSupported,
    Error,
}

impl From<ReturnCode> for LookupResult {
    fn from(rc: ReturnCode) -> Self {
        match rc.0 {
            code if code > 0 => LookupResult::Found,
            -1 => LookupResult::NotFound,
            -2 => LookupResult::MethodNotSupported,
            _ => LookupResult::Error,
        }
    }
}

/// Typed wrapper around a [`HostCore`]
#[derive(Clone)]
pub struct CoreActions {
    host: Arc<dyn HostCore>,
}

impl std::fmt::Debug for CoreActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreActions").finish_non_exhaustive()
    }
}

impl CoreActions {
    pub fn new(host: Arc<dyn HostCore>) -> Self {
        Self { host }
    }

    fn check(msg: &Message, op: &'static str, code: i32) -> bool {
        let rc = ReturnCode(code);
        trace!("{}: {} -> {}", msg.id(), op, rc);
        rc.is_success()
    }

    fn ensure_open(msg: &Message, attempted: &'static str) -> RoutingResult<()> {
        match msg.terminal_action() {
            Some(previous) => Err(RoutingError::DuplicateTerminal {
                id: msg.id().0,
                previous,
                attempted,
            }),
            None => Ok(()),
        }
    }

    // ---- message-local predicates and edits ----

    pub fn is_method(&self, msg: &Message, pattern: &str) -> bool {
        msg.method().matches(pattern)
    }

    pub fn setflag(&self, msg: &mut Message, flag: RouteFlag) {
        trace!("{}: setflag({})", msg.id(), flag);
        msg.set_flag(flag);
    }

    pub fn resetflag(&self, msg: &mut Message, flag: RouteFlag) {
        trace!("{}: resetflag({})", msg.id(), flag);
        msg.reset_flag(flag);
    }

    pub fn isflagset(&self, msg: &Message, flag: RouteFlag) -> bool {
        msg.is_flag_set(flag)
    }

    /// Append a header given as `"Name: value"` text (trailing CRLF allowed).
    pub fn append_hf(&self, msg: &mut Message, text: &str) -> RoutingResult<()> {
        let line = text.trim_end_matches(['\r', '\n']);
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| RoutingError::malformed(msg.id().0, format!("header text without name: {:?}", line)))?;
        msg.append_header(name.trim(), value.trim());
        trace!("{}: append_hf({})", msg.id(), name.trim());
        Ok(())
    }

    /// Remove every header with the given name; true when any was removed
    pub fn remove_hf(&self, msg: &mut Message, name: &str) -> bool {
        let removed = msg.remove_header(name);
        trace!("{}: remove_hf({}) removed {}", msg.id(), name, removed);
        removed > 0
    }

    pub fn t_is_set(&self, msg: &Message, kind: CallbackKind) -> bool {
        let callbacks = msg.callbacks();
        match kind {
            CallbackKind::Branch => callbacks.branch.is_some(),
            CallbackKind::Reply => callbacks.reply.is_some(),
            CallbackKind::Failure => callbacks.failure.is_some(),
        }
    }

    // ---- host predicates ----

    pub fn has_totag(&self, msg: &Message) -> bool {
        Self::check(msg, "has_totag", self.host.has_totag(msg))
    }

    pub fn loose_route(&self, msg: &mut Message) -> bool {
        let code = self.host.loose_route(msg);
        Self::check(msg, "loose_route", code)
    }

    pub fn t_check_trans(&self, msg: &mut Message) -> bool {
        let code = self.host.t_check_trans(msg);
        Self::check(msg, "t_check_trans", code)
    }

    pub fn t_precheck_trans(&self, msg: &mut Message) -> bool {
        let code = self.host.t_precheck_trans(msg);
        Self::check(msg, "t_precheck_trans", code)
    }

    pub fn t_is_canceled(&self, msg: &Message) -> bool {
        Self::check(msg, "t_is_canceled", self.host.t_is_canceled(msg))
    }

    pub fn is_myself(&self, msg: &Message, uri: &str) -> bool {
        Self::check(msg, "is_myself", self.host.is_myself(uri))
    }

    pub fn check_route_param(&self, msg: &Message, pattern: &str) -> bool {
        Self::check(msg, "check_route_param", self.host.check_route_param(msg, pattern))
    }

    pub fn max_forwards_process(&self, msg: &mut Message, limit: u32) -> bool {
        let code = self.host.max_forwards_process(msg, limit);
        Self::check(msg, "max_forwards_process", code)
    }

    pub fn sanity_check(&self, msg: &mut Message) -> bool {
        let code = self.host.sanity_check(msg);
        Self::check(msg, "sanity_check", code)
    }

    pub fn nat_uac_test(&self, msg: &mut Message, tests: u32) -> bool {
        let code = self.host.nat_uac_test(msg, tests);
        Self::check(msg, "nat_uac_test", code)
    }

    pub fn is_first_hop(&self, msg: &Message) -> bool {
        Self::check(msg, "is_first_hop", self.host.is_first_hop(msg))
    }

    pub fn auth_check(&self, msg: &mut Message, realm: &str, table: &str) -> bool {
        let code = self.host.auth_check(msg, realm, table);
        Self::check(msg, "auth_check", code)
    }

    pub fn lookup(&self, msg: &mut Message, table: &str) -> LookupResult {
        let rc = ReturnCode(self.host.lookup(msg, table));
        trace!("{}: lookup({}) -> {}", msg.id(), table, rc);
        LookupResult::from(rc)
    }

    // ---- host side effects ----

    pub fn record_route(&self, msg: &mut Message) {
        let code = self.host.record_route(msg);
        Self::check(msg, "record_route", code);
    }

    pub fn add_rr_param(&self, msg: &mut Message, param: &str) {
        let code = self.host.add_rr_param(msg, param);
        Self::check(msg, "add_rr_param", code);
    }

    pub fn force_rport(&self, msg: &mut Message) {
        let code = self.host.force_rport(msg);
        Self::check(msg, "force_rport", code);
    }

    pub fn fix_nated_register(&self, msg: &mut Message) {
        let code = self.host.fix_nated_register(msg);
        Self::check(msg, "fix_nated_register", code);
    }

    pub fn set_contact_alias(&self, msg: &mut Message) {
        let code = self.host.set_contact_alias(msg);
        Self::check(msg, "set_contact_alias", code);
    }

    pub fn handle_ruri_alias(&self, msg: &mut Message) {
        let code = self.host.handle_ruri_alias(msg);
        Self::check(msg, "handle_ruri_alias", code);
    }

    pub fn rtp_manage(&self, msg: &mut Message) -> bool {
        let code = self.host.rtp_manage(msg);
        Self::check(msg, "rtp_manage", code)
    }

    pub fn consume_credentials(&self, msg: &mut Message) {
        let code = self.host.consume_credentials(msg);
        Self::check(msg, "consume_credentials", code);
    }

    pub fn t_newtran(&self, msg: &mut Message) -> bool {
        let code = self.host.t_newtran(msg);
        Self::check(msg, "t_newtran", code)
    }

    pub fn t_release(&self, msg: &mut Message) {
        let code = self.host.t_release(msg);
        Self::check(msg, "t_release", code);
    }

    /// Arm a callback route. Registration only: nothing runs until the host
    /// core fires the callback for a later branch, reply or failure.
    pub fn t_on(&self, msg: &mut Message, kind: CallbackKind, route: &str) -> bool {
        let code = self.host.t_on_callback(msg, kind, route);
        let armed = Self::check(msg, kind.op_name(), code);
        if armed {
            let callbacks = msg.callbacks_mut();
            let slot = match kind {
                CallbackKind::Branch => &mut callbacks.branch,
                CallbackKind::Reply => &mut callbacks.reply,
                CallbackKind::Failure => &mut callbacks.failure,
            };
            *slot = Some(route.to_string());
        }
        armed
    }

    pub fn t_on_branch(&self, msg: &mut Message, route: &str) -> bool {
        self.t_on(msg, CallbackKind::Branch, route)
    }

    pub fn t_on_reply(&self, msg: &mut Message, route: &str) -> bool {
        self.t_on(msg, CallbackKind::Reply, route)
    }

    pub fn t_on_failure(&self, msg: &mut Message, route: &str) -> bool {
        self.t_on(msg, CallbackKind::Failure, route)
    }

    // ---- terminal actions ----

    /// Stateful relay; latches the message only when the host accepted it
    pub fn t_relay(&self, msg: &mut Message) -> RoutingResult<bool> {
        Self::ensure_open(msg, "t_relay")?;
        let code = self.host.t_relay(msg);
        let relayed = Self::check(msg, "t_relay", code);
        if relayed {
            msg.latch_terminal("t_relay")?;
        } else {
            debug!("{}: t_relay failed for {}", msg.id(), msg.ruri());
        }
        Ok(relayed)
    }

    pub fn sl_send_reply(&self, msg: &mut Message, code: u16, reason: &str) -> RoutingResult<()> {
        msg.latch_terminal("sl_send_reply")?;
        let rc = self.host.sl_send_reply(msg, code, reason);
        if !Self::check(msg, "sl_send_reply", rc) {
            debug!("{}: host failed to send {} {}", msg.id(), code, reason);
        }
        Ok(())
    }

    pub fn sl_reply_error(&self, msg: &mut Message) -> RoutingResult<()> {
        msg.latch_terminal("sl_reply_error")?;
        let rc = self.host.sl_reply_error(msg);
        Self::check(msg, "sl_reply_error", rc);
        Ok(())
    }

    pub fn t_reply(&self, msg: &mut Message, code: u16, reason: &str) -> RoutingResult<()> {
        msg.latch_terminal("t_reply")?;
        let rc = self.host.t_reply(msg, code, reason);
        Self::check(msg, "t_reply", rc);
        Ok(())
    }

    /// Persist REGISTER bindings. The registrar replies on success, which
    /// latches the message; a failed save leaves the reply to the caller.
    pub fn save(&self, msg: &mut Message, table: &str) -> RoutingResult<bool> {
        Self::ensure_open(msg, "save")?;
        let code = self.host.save(msg, table);
        let saved = Self::check(msg, "save", code);
        if saved {
            msg.latch_terminal("save")?;
        }
        Ok(saved)
    }

    /// Send a digest challenge (401/407), answering the request
    pub fn auth_challenge(&self, msg: &mut Message, realm: &str) -> RoutingResult<()> {
        msg.latch_terminal("auth_challenge")?;
        let code = self.host.auth_challenge(msg, realm);
        Self::check(msg, "auth_challenge", code);
        Ok(())
    }

    /// Hand a PUBLISH to the presence server, which answers it
    pub fn handle_publish(&self, msg: &mut Message) -> RoutingResult<bool> {
        msg.latch_terminal("handle_publish")?;
        let code = self.host.handle_publish(msg);
        Ok(Self::check(msg, "handle_publish", code))
    }

    /// Hand a SUBSCRIBE to the presence server, which answers it
    pub fn handle_subscribe(&self, msg: &mut Message) -> RoutingResult<bool> {
        msg.latch_terminal("handle_subscribe")?;
        let code = self.host.handle_subscribe(msg);
        Ok(Self::check(msg, "handle_subscribe", code))
    }
}
