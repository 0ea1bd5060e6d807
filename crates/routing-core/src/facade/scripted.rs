//! Scripted in-memory host core
//!
//! [`ScriptedHost`] answers every [`HostCore`] operation from a fixed table
//! of return codes and records each call it receives. It backs the
//! `route-replay` tool and the test suites: routing decisions can be
//! replayed against a known host state without a running SIP core.
//!
//! Defaults model an idle proxy: no transactions, no loose-route match, no
//! NAT, relays/saves/lookups succeed. `has_totag` and `is_myself` are
//! answered from the message and the configured local domains unless an
//! explicit answer overrides them.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::facade::host::{CallbackKind, HostCore, ReturnCode};
use crate::message::{ArmedCallbacks, Message, MessageFlags, SipUri};

/// One recorded host call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCall {
    pub op: String,
    pub arg: Option<String>,
}

/// Reply sent through the scripted host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentReply {
    pub op: String,
    pub code: u16,
    pub reason: String,
}

/// Message state seen by the host at `t_relay` time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySnapshot {
    pub ruri: String,
    pub flags: MessageFlags,
    pub callbacks: ArmedCallbacks,
}

/// Serializable description of a scripted host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedHostConfig {
    /// Domains and addresses that `is_myself` accepts
    pub local_domains: Vec<String>,
    /// Return code per operation name, overriding the defaults
    pub answers: HashMap<String, i32>,
}

#[derive(Debug, Default)]
struct HostState {
    calls: Vec<HostCall>,
    replies: Vec<SentReply>,
    relays: Vec<RelaySnapshot>,
}

/// Deterministic [`HostCore`] driven by a table of answers
#[derive(Debug, Default)]
pub struct ScriptedHost {
    local_domains: Vec<String>,
    answers: HashMap<String, i32>,
    state: Mutex<HostState>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ScriptedHostConfig) -> Self {
        Self {
            local_domains: config
                .local_domains
                .iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
            answers: config.answers,
            state: Mutex::new(HostState::default()),
        }
    }

    /// Fix the return code of an operation
    pub fn answer(mut self, op: &str, code: i32) -> Self {
        self.answers.insert(op.to_string(), code);
        self
    }

    /// Add a domain or address served by this proxy
    pub fn local_domain(mut self, domain: &str) -> Self {
        self.local_domains.push(domain.to_ascii_lowercase());
        self
    }

    /// Every call received, in order
    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }

    /// Operation names received, in order
    pub fn ops(&self) -> Vec<String> {
        self.state.lock().calls.iter().map(|c| c.op.clone()).collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn called(&self, op: &str) -> bool {
        self.count(op) > 0
    }

    /// Position of the first call to `op`
    pub fn position(&self, op: &str) -> Option<usize> {
        self.state.lock().calls.iter().position(|c| c.op == op)
    }

    pub fn replies(&self) -> Vec<SentReply> {
        self.state.lock().replies.clone()
    }

    /// Every `t_relay` attempt, successful or not
    pub fn relays(&self) -> Vec<RelaySnapshot> {
        self.state.lock().relays.clone()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.replies.clear();
        state.relays.clear();
    }

    fn record(&self, op: &str, arg: Option<String>) {
        self.state.lock().calls.push(HostCall {
            op: op.to_string(),
            arg,
        });
    }

    fn respond(&self, op: &str, arg: Option<String>, default: i32) -> i32 {
        self.record(op, arg);
        self.answers.get(op).copied().unwrap_or(default)
    }

    fn record_reply(&self, op: &str, code: u16, reason: &str) {
        self.state.lock().replies.push(SentReply {
            op: op.to_string(),
            code,
            reason: reason.to_string(),
        });
    }

    fn is_local(&self, uri: &str) -> bool {
        match SipUri::parse(uri) {
            Ok(parsed) => {
                let host = parsed.host.to_ascii_lowercase();
                self.local_domains.iter().any(|d| *d == host)
            }
            Err(_) => false,
        }
    }
}

impl HostCore for ScriptedHost {
    fn has_totag(&self, msg: &Message) -> i32 {
        let derived = ReturnCode::from(msg.to_tag().is_some()).0;
        self.respond("has_totag", None, derived)
    }

    fn loose_route(&self, _msg: &mut Message) -> i32 {
        self.respond("loose_route", None, ReturnCode::FALSE)
    }

    fn t_check_trans(&self, _msg: &mut Message) -> i32 {
        self.respond("t_check_trans", None, ReturnCode::FALSE)
    }

    fn t_precheck_trans(&self, _msg: &mut Message) -> i32 {
        self.respond("t_precheck_trans", None, ReturnCode::FALSE)
    }

    fn t_relay(&self, msg: &mut Message) -> i32 {
        self.state.lock().relays.push(RelaySnapshot {
            ruri: msg.ruri().to_string(),
            flags: msg.flags(),
            callbacks: msg.callbacks().clone(),
        });
        self.respond("t_relay", Some(msg.ruri().to_string()), ReturnCode::TRUE)
    }

    fn t_newtran(&self, _msg: &mut Message) -> i32 {
        self.respond("t_newtran", None, ReturnCode::TRUE)
    }

    fn t_reply(&self, _msg: &mut Message, code: u16, reason: &str) -> i32 {
        self.record_reply("t_reply", code, reason);
        self.respond("t_reply", Some(format!("{} {}", code, reason)), ReturnCode::TRUE)
    }

    fn t_release(&self, _msg: &mut Message) -> i32 {
        self.respond("t_release", None, ReturnCode::TRUE)
    }

    fn t_is_canceled(&self, _msg: &Message) -> i32 {
        self.respond("t_is_canceled", None, ReturnCode::FALSE)
    }

    fn t_on_callback(&self, _msg: &mut Message, kind: CallbackKind, route: &str) -> i32 {
        self.respond(kind.op_name(), Some(route.to_string()), ReturnCode::TRUE)
    }

    fn record_route(&self, msg: &mut Message) -> i32 {
        let rc = self.respond("record_route", None, ReturnCode::TRUE);
        if ReturnCode(rc).is_success() {
            let proxy = self.local_domains.first().map(String::as_str).unwrap_or("localhost");
            msg.append_header("Record-Route", format!("<sip:{};lr>", proxy));
        }
        rc
    }

    fn add_rr_param(&self, _msg: &mut Message, param: &str) -> i32 {
        self.respond("add_rr_param", Some(param.to_string()), ReturnCode::TRUE)
    }

    fn check_route_param(&self, _msg: &Message, pattern: &str) -> i32 {
        self.respond("check_route_param", Some(pattern.to_string()), ReturnCode::FALSE)
    }

    fn sl_send_reply(&self, _msg: &mut Message, code: u16, reason: &str) -> i32 {
        self.record_reply("sl_send_reply", code, reason);
        self.respond("sl_send_reply", Some(format!("{} {}", code, reason)), ReturnCode::TRUE)
    }

    fn sl_reply_error(&self, _msg: &mut Message) -> i32 {
        self.record_reply("sl_reply_error", 500, "Server Internal Error");
        self.respond("sl_reply_error", None, ReturnCode::TRUE)
    }

    fn save(&self, _msg: &mut Message, table: &str) -> i32 {
        self.respond("save", Some(table.to_string()), ReturnCode::TRUE)
    }

    fn lookup(&self, _msg: &mut Message, table: &str) -> i32 {
        self.respond("lookup", Some(table.to_string()), ReturnCode::TRUE)
    }

    fn is_myself(&self, uri: &str) -> i32 {
        let derived = ReturnCode::from(self.is_local(uri)).0;
        self.respond("is_myself", Some(uri.to_string()), derived)
    }

    fn max_forwards_process(&self, _msg: &mut Message, limit: u32) -> i32 {
        self.respond("max_forwards_process", Some(limit.to_string()), ReturnCode::TRUE)
    }

    fn sanity_check(&self, _msg: &mut Message) -> i32 {
        self.respond("sanity_check", None, ReturnCode::TRUE)
    }

    fn force_rport(&self, _msg: &mut Message) -> i32 {
        self.respond("force_rport", None, ReturnCode::TRUE)
    }

    fn nat_uac_test(&self, _msg: &mut Message, tests: u32) -> i32 {
        self.respond("nat_uac_test", Some(tests.to_string()), ReturnCode::FALSE)
    }

    fn fix_nated_register(&self, _msg: &mut Message) -> i32 {
        self.respond("fix_nated_register", None, ReturnCode::TRUE)
    }

    fn is_first_hop(&self, _msg: &Message) -> i32 {
        self.respond("is_first_hop", None, ReturnCode::TRUE)
    }

    fn set_contact_alias(&self, _msg: &mut Message) -> i32 {
        self.respond("set_contact_alias", None, ReturnCode::TRUE)
    }

    fn handle_ruri_alias(&self, _msg: &mut Message) -> i32 {
        self.respond("handle_ruri_alias", None, ReturnCode::TRUE)
    }

    fn rtp_manage(&self, _msg: &mut Message) -> i32 {
        self.respond("rtp_manage", None, ReturnCode::TRUE)
    }

    fn auth_check(&self, _msg: &mut Message, realm: &str, table: &str) -> i32 {
        self.respond("auth_check", Some(format!("{}/{}", realm, table)), ReturnCode::TRUE)
    }

    fn auth_challenge(&self, _msg: &mut Message, realm: &str) -> i32 {
        self.record_reply("auth_challenge", 401, "Unauthorized");
        self.respond("auth_challenge", Some(realm.to_string()), ReturnCode::TRUE)
    }

    fn consume_credentials(&self, _msg: &mut Message) -> i32 {
        self.respond("consume_credentials", None, ReturnCode::TRUE)
    }

    fn handle_publish(&self, _msg: &mut Message) -> i32 {
        self.respond("handle_publish", None, ReturnCode::TRUE)
    }

    fn handle_subscribe(&self, _msg: &mut Message) -> i32 {
        self.respond("handle_subscribe", None, ReturnCode::TRUE)
    }
}
