//! Transaction callback routes
//!
//! Armed by RELAY during request processing and run by the host core once
//! the transaction creates a branch, receives a reply or fails.

use tracing::debug;

use super::{call_route, RouteContext, RouteId, RouteOutcome};
use crate::engine::Disposition;
use crate::errors::RoutingResult;
use crate::message::Message;

pub(super) fn manage_branch(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    debug!("{}: new branch to {}", msg.id(), msg.ruri());
    call_route!(ctx, RouteId::NatManage, msg);
    Ok(RouteOutcome::Return)
}

pub(super) fn manage_reply(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    debug!("{}: incoming reply {:?}", msg.id(), msg.status());
    if msg.status().is_some_and(|status| (100..300).contains(&status)) {
        call_route!(ctx, RouteId::NatManage, msg);
    }
    Ok(RouteOutcome::Return)
}

pub(super) fn manage_failure(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    call_route!(ctx, RouteId::NatManage, msg);
    if ctx.core.t_is_canceled(msg) {
        debug!("{}: transaction canceled, no further failure handling", msg.id());
        return Ok(RouteOutcome::exit(Disposition::Dropped));
    }
    Ok(RouteOutcome::Return)
}
