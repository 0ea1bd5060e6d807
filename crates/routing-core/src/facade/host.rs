//! Native host core surface
//!
//! [`HostCore`] is what a SIP core has to provide to run the routing
//! script. Every operation reports a raw native return code: positive for
//! success, `0` for "stop the script", negative (usually `-1`) for failure.
//! Routing logic never sees these codes directly; [`CoreActions`] converts
//! them through [`ReturnCode`].
//!
//! Operations backed by optional modules (NAT traversal, authentication,
//! presence, media relay) have default implementations that report
//! [`ReturnCode::NOT_AVAILABLE`], so a host without those modules only needs
//! to provide the core transaction, reply and registrar operations.
//!
//! [`CoreActions`]: super::CoreActions

use std::fmt;

use crate::message::Message;

/// Raw return code of a native host operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub i32);

impl ReturnCode {
    pub const TRUE: i32 = 1;
    pub const FALSE: i32 = -1;
    pub const EXIT: i32 = 0;
    /// Reported by default implementations of optional operations
    pub const NOT_AVAILABLE: i32 = -1;

    /// Positive codes mean success; the `-1` sentinel and every other
    /// non-positive code mean failure.
    pub fn is_success(self) -> bool {
        self.0 > 0
    }

    pub fn is_exit(self) -> bool {
        self.0 == Self::EXIT
    }
}

impl From<i32> for ReturnCode {
    fn from(code: i32) -> Self {
        ReturnCode(code)
    }
}

impl From<bool> for ReturnCode {
    fn from(ok: bool) -> Self {
        ReturnCode(if ok { Self::TRUE } else { Self::FALSE })
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction callback kinds armed with `t_on_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Branch,
    Reply,
    Failure,
}

impl CallbackKind {
    /// Native operation name
    pub fn op_name(self) -> &'static str {
        match self {
            CallbackKind::Branch => "t_on_branch",
            CallbackKind::Reply => "t_on_reply",
            CallbackKind::Failure => "t_on_failure",
        }
    }
}

/// Operations provided by the host SIP core
///
/// Implementations must be callable from any worker thread; per-message
/// state is passed in through the [`Message`].
pub trait HostCore: Send + Sync {
    /// Non-empty To tag present
    fn has_totag(&self, msg: &Message) -> i32;

    /// RFC 3261 loose routing over the Route header set
    fn loose_route(&self, msg: &mut Message) -> i32;

    /// Match the message against existing transactions
    fn t_check_trans(&self, msg: &mut Message) -> i32;

    /// Detect a retransmission of a request whose transaction is still being created
    fn t_precheck_trans(&self, msg: &mut Message) -> i32;

    /// Stateful forward
    fn t_relay(&self, msg: &mut Message) -> i32;

    /// Create the server transaction without forwarding
    fn t_newtran(&self, msg: &mut Message) -> i32;

    /// Stateful reply on the current transaction
    fn t_reply(&self, msg: &mut Message, code: u16, reason: &str) -> i32;

    /// Release the current transaction
    fn t_release(&self, msg: &mut Message) -> i32;

    /// Transaction has been canceled
    fn t_is_canceled(&self, msg: &Message) -> i32;

    /// Arm a callback route for the transaction; runs later, outside this call
    fn t_on_callback(&self, msg: &mut Message, kind: CallbackKind, route: &str) -> i32;

    fn record_route(&self, msg: &mut Message) -> i32;

    fn add_rr_param(&self, msg: &mut Message, param: &str) -> i32;

    fn check_route_param(&self, msg: &Message, pattern: &str) -> i32;

    /// Stateless reply
    fn sl_send_reply(&self, msg: &mut Message, code: u16, reason: &str) -> i32;

    /// Stateless reply derived from the last internal error
    fn sl_reply_error(&self, msg: &mut Message) -> i32;

    /// Store the REGISTER bindings into a location table and reply
    fn save(&self, msg: &mut Message, table: &str) -> i32;

    /// Resolve the request URI from a location table.
    ///
    /// `-1` no contact, `-2` contacts found but none supports the method,
    /// `-3` internal error.
    fn lookup(&self, msg: &mut Message, table: &str) -> i32;

    /// URI points at one of the local domains or addresses
    fn is_myself(&self, uri: &str) -> i32;

    /// Decrement Max-Forwards (adding it with `limit` if absent); fails once exhausted
    fn max_forwards_process(&self, msg: &mut Message, limit: u32) -> i32;

    fn sanity_check(&self, msg: &mut Message) -> i32;

    fn force_rport(&self, _msg: &mut Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn nat_uac_test(&self, _msg: &mut Message, _tests: u32) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn fix_nated_register(&self, _msg: &mut Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn is_first_hop(&self, _msg: &Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn set_contact_alias(&self, _msg: &mut Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn handle_ruri_alias(&self, _msg: &mut Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn rtp_manage(&self, _msg: &mut Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn auth_check(&self, _msg: &mut Message, _realm: &str, _table: &str) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn auth_challenge(&self, _msg: &mut Message, _realm: &str) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn consume_credentials(&self, _msg: &mut Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn handle_publish(&self, _msg: &mut Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }

    fn handle_subscribe(&self, _msg: &mut Message) -> i32 {
        ReturnCode::NOT_AVAILABLE
    }
}
