//! In-dialog request handling
//!
//! Requests carrying a To tag belong to an existing dialog. They follow
//! their Route set when it points through us, otherwise only ACKs matching
//! a transaction are forwarded and everything else is refused.

use tracing::debug;

use super::{call_route, RouteContext, RouteId, RouteOutcome};
use crate::engine::Disposition;
use crate::errors::RoutingResult;
use crate::message::{Message, RouteFlag};

pub(super) fn withindlg(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    if !ctx.core.has_totag(msg) {
        return Ok(RouteOutcome::Return);
    }

    if ctx.core.loose_route(msg) {
        call_route!(ctx, RouteId::DlgUri, msg);
        if ctx.core.is_method(msg, "BYE") {
            ctx.core.setflag(msg, RouteFlag::Acc);
            ctx.core.setflag(msg, RouteFlag::AccFailed);
        } else if ctx.core.is_method(msg, "ACK") {
            call_route!(ctx, RouteId::NatManage, msg);
        } else if ctx.core.is_method(msg, "NOTIFY") {
            // updates the route set for NOTIFYs answering a SUBSCRIBE we relayed
            ctx.core.record_route(msg);
        }
        return Ok(RouteOutcome::exit(ctx.run(RouteId::Relay, msg)?.into_disposition()));
    }

    if ctx.core.is_method(msg, "ACK") {
        if ctx.core.t_check_trans(msg) {
            // non loose-routed ACK to a negative reply we forwarded
            return Ok(RouteOutcome::exit(ctx.run(RouteId::Relay, msg)?.into_disposition()));
        }
        debug!("{}: ACK without matching transaction, ignoring", msg.id());
        return Ok(RouteOutcome::exit(Disposition::Dropped));
    }

    ctx.core.sl_send_reply(msg, 404, "Not here")?;
    Ok(RouteOutcome::exit(Disposition::replied(404, "Not here")))
}
