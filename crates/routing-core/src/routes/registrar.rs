use super::{RouteContext, RouteOutcome};
use crate::engine::{Disposition, Reply};
use crate::errors::RoutingResult;
use crate::message::{Message, RouteFlag};

/// Store the bindings of a REGISTER
pub(super) fn registrar(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    if !ctx.core.is_method(msg, "REGISTER") {
        return Ok(RouteOutcome::Return);
    }
    if ctx.core.isflagset(msg, RouteFlag::Nats) {
        ctx.core.setflag(msg, RouteFlag::Natb);
        if ctx.config.nat.sipping {
            ctx.core.setflag(msg, RouteFlag::NatSipping);
        }
    }

    let table = ctx.config.location_table.as_str();
    if ctx.core.save(msg, table)? {
        return Ok(RouteOutcome::exit(Disposition::RepliedLocally(Reply::Registrar)));
    }
    ctx.core.sl_reply_error(msg)?;
    Ok(RouteOutcome::exit(Disposition::RepliedLocally(Reply::Error)))
}
