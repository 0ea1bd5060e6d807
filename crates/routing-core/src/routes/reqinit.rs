//! Per-request sanity checks run before anything else

use tracing::{debug, info};

use super::{RouteContext, RouteOutcome};
use crate::engine::Disposition;
use crate::errors::RoutingResult;
use crate::message::Message;

pub(super) fn reqinit(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    if let Some(agent) = msg.user_agent() {
        if let Some(scanner) = ctx
            .config
            .scanner_user_agents
            .iter()
            .find(|s| !s.is_empty() && agent.contains(s.as_str()))
        {
            debug!("{}: dropping request from scanner '{}'", msg.id(), scanner);
            return Ok(RouteOutcome::exit(Disposition::Dropped));
        }
    }

    if !ctx.core.max_forwards_process(msg, ctx.config.max_forwards) {
        if ctx.core.is_method(msg, "ACK") {
            return Ok(RouteOutcome::exit(Disposition::Dropped));
        }
        ctx.core.sl_send_reply(msg, 483, "Too Many Hops")?;
        return Ok(RouteOutcome::exit(Disposition::replied(483, "Too Many Hops")));
    }

    if ctx.config.keepalive_options && ctx.core.is_method(msg, "OPTIONS") {
        let ruri = msg.ruri().to_string();
        if ctx.core.is_myself(msg, &ruri) && msg.ruri_user()?.is_none() {
            ctx.core.sl_send_reply(msg, 200, "Keepalive")?;
            return Ok(RouteOutcome::exit(Disposition::replied(200, "Keepalive")));
        }
    }

    if !ctx.core.sanity_check(msg) {
        info!("{}: malformed SIP request {} {}", msg.id(), msg.method(), msg.ruri());
        return Ok(RouteOutcome::exit(Disposition::Dropped));
    }

    Ok(RouteOutcome::Return)
}
