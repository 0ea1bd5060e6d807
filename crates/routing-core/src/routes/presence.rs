//! Local presence server hand-off

use tracing::warn;

use super::{RouteContext, RouteOutcome};
use crate::engine::{Disposition, Reply};
use crate::errors::RoutingResult;
use crate::message::Message;

pub(super) fn presence(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    if !ctx.core.is_method(msg, "PUBLISH|SUBSCRIBE") {
        return Ok(RouteOutcome::Return);
    }

    if !ctx.config.presence {
        ctx.core.sl_send_reply(msg, 404, "Not here")?;
        return Ok(RouteOutcome::exit(Disposition::replied(404, "Not here")));
    }

    if !ctx.core.t_newtran(msg) {
        ctx.core.sl_reply_error(msg)?;
        return Ok(RouteOutcome::exit(Disposition::RepliedLocally(Reply::Error)));
    }

    let handled = if ctx.core.is_method(msg, "PUBLISH") {
        ctx.core.handle_publish(msg)?
    } else {
        ctx.core.handle_subscribe(msg)?
    };
    if !handled {
        warn!("{}: presence server rejected {}", msg.id(), msg.method());
    }
    ctx.core.t_release(msg);
    Ok(RouteOutcome::exit(Disposition::RepliedLocally(Reply::Presence)))
}
