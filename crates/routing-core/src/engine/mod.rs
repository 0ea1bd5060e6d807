//! Routing engine
//!
//! [`RoutingEngine`] owns the main request route: it validates the message,
//! walks the named routes in a fixed order and returns the single
//! [`Disposition`] reached. The engine holds no per-message state, so one
//! instance is shared by all host workers.
//!
//! Fatal errors ([`RoutingError`]) abort the current message only. The
//! infallible [`RoutingEngine::route`] logs them and reports
//! [`Disposition::Dropped`]; [`RoutingEngine::try_route`] hands them back.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info_span, warn};

use crate::config::RouterConfig;
use crate::errors::{RoutingError, RoutingResult};
use crate::facade::{CoreActions, HostCore};
use crate::message::{Message, RouteFlag};
use crate::routes::{call_route, RouteContext, RouteId, RouteOutcome, RoutePhase};

/// Local answer sent by the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Explicit status line
    Status { code: u16, reason: String },
    /// Error reply derived from the last internal failure
    Error,
    /// Reply generated by the registrar while saving bindings
    Registrar,
    /// Digest authentication challenge
    Challenge,
    /// Reply generated by the presence server
    Presence,
}

/// Final result of routing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Forwarded statefully by the host core
    Relayed,
    /// Answered by the proxy
    RepliedLocally(Reply),
    /// Discarded without any reply
    Dropped,
    /// Nothing terminal happened; the host carries on with its default handling
    Continue,
}

impl Disposition {
    pub fn replied(code: u16, reason: impl Into<String>) -> Self {
        Disposition::RepliedLocally(Reply::Status {
            code,
            reason: reason.into(),
        })
    }

    /// Status code of an explicit local reply
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Disposition::RepliedLocally(Reply::Status { code, .. }) => Some(*code),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Disposition::Continue)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Relayed => write!(f, "relayed"),
            Disposition::RepliedLocally(Reply::Status { code, reason }) => {
                write!(f, "replied {} {}", code, reason)
            }
            Disposition::RepliedLocally(reply) => write!(f, "replied ({:?})", reply),
            Disposition::Dropped => write!(f, "dropped"),
            Disposition::Continue => write!(f, "continue"),
        }
    }
}

/// Dispatcher for the named routes
#[derive(Debug, Clone)]
pub struct RoutingEngine {
    core: CoreActions,
    config: Arc<RouterConfig>,
}

impl RoutingEngine {
    pub fn new(host: Arc<dyn HostCore>, config: RouterConfig) -> Self {
        Self {
            core: CoreActions::new(host),
            config: Arc::new(config),
        }
    }

    /// Like [`RoutingEngine::new`], rejecting an unusable configuration
    pub fn try_new(host: Arc<dyn HostCore>, config: RouterConfig) -> RoutingResult<Self> {
        config.validate()?;
        Ok(Self::new(host, config))
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn core(&self) -> &CoreActions {
        &self.core
    }

    fn context(&self, phase: RoutePhase) -> RouteContext<'_> {
        RouteContext::new(&self.core, &self.config, phase)
    }

    /// Route a request, never failing
    pub fn route(&self, msg: &mut Message) -> Disposition {
        match self.try_route(msg) {
            Ok(disposition) => disposition,
            Err(e) => {
                error!("{}: routing aborted: {}", msg.id(), e);
                Disposition::Dropped
            }
        }
    }

    /// Route a request through the main request route
    pub fn try_route(&self, msg: &mut Message) -> RoutingResult<Disposition> {
        let span = info_span!("route", id = %msg.id(), method = %msg.method());
        let _enter = span.enter();

        msg.validate()?;
        if !msg.is_request() {
            return Err(RoutingError::malformed(
                msg.id().0,
                "reply handed to the request route",
            ));
        }

        let disposition = request_route(&self.context(RoutePhase::Request), msg)?.into_disposition();
        debug!("{}: {} {} -> {}", msg.id(), msg.method(), msg.orig_ruri(), disposition);
        Ok(disposition)
    }

    /// Run a single route by name
    pub fn run_named(&self, name: &str, msg: &mut Message) -> RoutingResult<Disposition> {
        let id: RouteId = name.parse()?;
        self.run(id, msg)
    }

    /// Run a single route
    pub fn run(&self, id: RouteId, msg: &mut Message) -> RoutingResult<Disposition> {
        msg.validate()?;
        let phase = match id {
            RouteId::ManageBranch => RoutePhase::Branch,
            RouteId::ManageReply => RoutePhase::Reply,
            RouteId::ManageFailure => RoutePhase::Failure,
            _ => RoutePhase::Request,
        };
        Ok(self.context(phase).run(id, msg)?.into_disposition())
    }

    /// Branch callback, run by the host for each new outgoing branch
    pub fn on_branch(&self, msg: &mut Message) -> Disposition {
        self.callback(RouteId::ManageBranch, msg)
    }

    /// Reply callback, run by the host for each reply on the transaction
    pub fn on_reply(&self, msg: &mut Message) -> Disposition {
        self.callback(RouteId::ManageReply, msg)
    }

    /// Failure callback, run by the host when every branch failed
    pub fn on_failure(&self, msg: &mut Message) -> Disposition {
        self.callback(RouteId::ManageFailure, msg)
    }

    fn callback(&self, id: RouteId, msg: &mut Message) -> Disposition {
        let span = info_span!("callback", id = %msg.id(), route = %id);
        let _enter = span.enter();
        match self.run(id, msg) {
            Ok(disposition) => disposition,
            Err(e) => {
                warn!("{}: {} failed: {}", msg.id(), id, e);
                Disposition::Continue
            }
        }
    }
}

/// Main request route
fn request_route(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    call_route!(ctx, RouteId::ReqInit, msg);
    call_route!(ctx, RouteId::NatDetect, msg);

    if ctx.core.is_method(msg, "CANCEL") {
        if ctx.core.t_check_trans(msg) {
            return ctx.run(RouteId::Relay, msg);
        }
        debug!("{}: CANCEL without transaction", msg.id());
        return Ok(RouteOutcome::exit(Disposition::Dropped));
    }

    if !ctx.core.is_method(msg, "ACK") {
        if ctx.core.t_precheck_trans(msg) {
            // retransmission of a request still being processed
            ctx.core.t_check_trans(msg);
            return Ok(RouteOutcome::exit(Disposition::Dropped));
        }
        ctx.core.t_check_trans(msg);
    }

    call_route!(ctx, RouteId::WithinDlg, msg);

    if ctx.core.is_method(msg, "ACK") {
        // an ACK always carries a To tag; without one there is nothing to match
        debug!("{}: ACK outside any dialog", msg.id());
        return Ok(RouteOutcome::exit(Disposition::Dropped));
    }

    call_route!(ctx, RouteId::Auth, msg);

    // preloaded routes are not honoured for initial requests
    ctx.core.remove_hf(msg, "Route");
    if ctx.core.is_method(msg, "INVITE|SUBSCRIBE") {
        ctx.core.record_route(msg);
    }
    if ctx.core.is_method(msg, "INVITE") {
        ctx.core.setflag(msg, RouteFlag::Acc);
    }

    call_route!(ctx, RouteId::SipOut, msg);
    call_route!(ctx, RouteId::Presence, msg);
    call_route!(ctx, RouteId::Registrar, msg);

    if msg.ruri_user()?.is_none() {
        ctx.core.sl_send_reply(msg, 484, "Address Incomplete")?;
        return Ok(RouteOutcome::exit(Disposition::replied(484, "Address Incomplete")));
    }

    call_route!(ctx, RouteId::Pstn, msg);
    call_route!(ctx, RouteId::Location, msg);
    ctx.run(RouteId::Relay, msg)
}
