//! Named routing blocks
//!
//! Every route is a plain function over a [`RouteContext`] and the current
//! [`Message`]. Routes call each other through the [`ROUTE_TABLE`] by
//! [`RouteId`]; a route either returns to its caller
//! ([`RouteOutcome::Return`]) or ends processing of the message with a
//! [`Disposition`] ([`RouteOutcome::Exit`]).
//!
//! Callback routes (`MANAGE_BRANCH`, `MANAGE_REPLY`, `MANAGE_FAILURE`) live
//! in the same table but are never invoked from request processing: they are
//! only armed by name and later run by the host through the engine.

mod auth;
mod callbacks;
mod dialog;
mod location;
mod nat;
mod presence;
mod pstn;
mod registrar;
mod relay;
mod reqinit;
mod sipout;

use std::fmt;
use std::str::FromStr;

use crate::config::RouterConfig;
use crate::engine::Disposition;
use crate::errors::{RoutingError, RoutingResult};
use crate::facade::CoreActions;
use crate::message::Message;

/// Identifier of a named route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    ReqInit,
    NatDetect,
    WithinDlg,
    Auth,
    SipOut,
    Presence,
    Pstn,
    Location,
    Relay,
    Registrar,
    DlgUri,
    NatManage,
    ManageBranch,
    ManageReply,
    ManageFailure,
}

impl RouteId {
    pub const ALL: [RouteId; 15] = [
        RouteId::ReqInit,
        RouteId::NatDetect,
        RouteId::WithinDlg,
        RouteId::Auth,
        RouteId::SipOut,
        RouteId::Presence,
        RouteId::Pstn,
        RouteId::Location,
        RouteId::Relay,
        RouteId::Registrar,
        RouteId::DlgUri,
        RouteId::NatManage,
        RouteId::ManageBranch,
        RouteId::ManageReply,
        RouteId::ManageFailure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RouteId::ReqInit => "REQINIT",
            RouteId::NatDetect => "NATDETECT",
            RouteId::WithinDlg => "WITHINDLG",
            RouteId::Auth => "AUTH",
            RouteId::SipOut => "SIPOUT",
            RouteId::Presence => "PRESENCE",
            RouteId::Pstn => "PSTN",
            RouteId::Location => "LOCATION",
            RouteId::Relay => "RELAY",
            RouteId::Registrar => "REGISTRAR",
            RouteId::DlgUri => "DLGURI",
            RouteId::NatManage => "NATMANAGE",
            RouteId::ManageBranch => "MANAGE_BRANCH",
            RouteId::ManageReply => "MANAGE_REPLY",
            RouteId::ManageFailure => "MANAGE_FAILURE",
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteId {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RoutingError::UnknownRoute(s.to_string()))
    }
}

/// Result of running one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Back to the caller, processing continues
    Return,
    /// Processing of the message is over
    Exit(Disposition),
}

impl RouteOutcome {
    pub fn exit(disposition: Disposition) -> Self {
        RouteOutcome::Exit(disposition)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, RouteOutcome::Exit(_))
    }

    /// Disposition seen by whoever invoked the route from outside the table
    pub fn into_disposition(self) -> Disposition {
        match self {
            RouteOutcome::Return => Disposition::Continue,
            RouteOutcome::Exit(disposition) => disposition,
        }
    }
}

/// Which kind of processing a route runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePhase {
    Request,
    Branch,
    Reply,
    Failure,
}

/// Everything a route may use besides the message itself
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub core: &'a CoreActions,
    pub config: &'a RouterConfig,
    pub phase: RoutePhase,
}

impl<'a> RouteContext<'a> {
    pub fn new(core: &'a CoreActions, config: &'a RouterConfig, phase: RoutePhase) -> Self {
        Self { core, config, phase }
    }

    /// Invoke another route through the table
    pub fn run(&self, id: RouteId, msg: &mut Message) -> RoutingResult<RouteOutcome> {
        tracing::trace!("{}: route({})", msg.id(), id);
        (route_fn(id))(self, msg)
    }
}

pub type RouteFn = fn(&RouteContext<'_>, &mut Message) -> RoutingResult<RouteOutcome>;

/// Route functions indexed in [`RouteId::ALL`] order
pub static ROUTE_TABLE: [(RouteId, RouteFn); 15] = [
    (RouteId::ReqInit, reqinit::reqinit),
    (RouteId::NatDetect, nat::natdetect),
    (RouteId::WithinDlg, dialog::withindlg),
    (RouteId::Auth, auth::auth),
    (RouteId::SipOut, sipout::sipout),
    (RouteId::Presence, presence::presence),
    (RouteId::Pstn, pstn::pstn),
    (RouteId::Location, location::location),
    (RouteId::Relay, relay::relay),
    (RouteId::Registrar, registrar::registrar),
    (RouteId::DlgUri, nat::dlguri),
    (RouteId::NatManage, nat::natmanage),
    (RouteId::ManageBranch, callbacks::manage_branch),
    (RouteId::ManageReply, callbacks::manage_reply),
    (RouteId::ManageFailure, callbacks::manage_failure),
];

pub fn route_fn(id: RouteId) -> RouteFn {
    ROUTE_TABLE[id as usize].1
}

/// Run a sub-route and return from the caller if it exited.
macro_rules! call_route {
    ($ctx:expr, $id:expr, $msg:expr) => {
        if let $crate::routes::RouteOutcome::Exit(disposition) = $ctx.run($id, $msg)? {
            return Ok($crate::routes::RouteOutcome::Exit(disposition));
        }
    };
}

pub(crate) use call_route;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_ids() {
        for (index, id) in RouteId::ALL.iter().enumerate() {
            assert_eq!(ROUTE_TABLE[index].0, *id);
            assert_eq!(*id as usize, index);
        }
    }

    #[test]
    fn test_names_round_trip_case_insensitively() {
        assert_eq!("relay".parse::<RouteId>().unwrap(), RouteId::Relay);
        assert_eq!("MANAGE_FAILURE".parse::<RouteId>().unwrap(), RouteId::ManageFailure);
        assert!(matches!(
            "TOVOICEMAIL".parse::<RouteId>(),
            Err(RoutingError::UnknownRoute(_))
        ));
    }

    #[test]
    fn test_return_maps_to_continue() {
        assert_eq!(RouteOutcome::Return.into_disposition(), Disposition::Continue);
        assert_eq!(
            RouteOutcome::exit(Disposition::Dropped).into_disposition(),
            Disposition::Dropped
        );
    }
}
