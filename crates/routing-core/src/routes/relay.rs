use tracing::debug;

use super::{RouteContext, RouteOutcome};
use crate::engine::{Disposition, Reply};
use crate::errors::RoutingResult;
use crate::facade::CallbackKind;
use crate::message::Message;

/// Arm transaction callbacks and forward statefully
pub(super) fn relay(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    let names = &ctx.config.callbacks;
    if ctx.core.is_method(msg, "INVITE|SUBSCRIBE") {
        if !ctx.core.t_is_set(msg, CallbackKind::Branch) {
            ctx.core.t_on_branch(msg, &names.branch);
        }
        ctx.core.t_on_reply(msg, &names.reply);
    }
    if ctx.core.is_method(msg, "INVITE") {
        ctx.core.t_on_failure(msg, &names.failure);
    }

    if ctx.core.t_relay(msg)? {
        return Ok(RouteOutcome::exit(Disposition::Relayed));
    }
    if ctx.core.is_method(msg, "ACK") {
        // ACKs are never answered
        debug!("{}: ACK relay to {} failed", msg.id(), msg.ruri());
        return Ok(RouteOutcome::exit(Disposition::Dropped));
    }
    ctx.core.sl_reply_error(msg)?;
    Ok(RouteOutcome::exit(Disposition::RepliedLocally(Reply::Error)))
}
