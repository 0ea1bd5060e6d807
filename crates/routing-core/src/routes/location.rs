use super::{RouteContext, RouteId, RouteOutcome};
use crate::engine::Disposition;
use crate::errors::RoutingResult;
use crate::facade::LookupResult;
use crate::message::{Message, RouteFlag};

/// Deliver to a registered contact of a local user
pub(super) fn location(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    let table = ctx.config.location_table.as_str();
    let (code, reason) = match ctx.core.lookup(msg, table) {
        LookupResult::Found => {
            if ctx.core.is_method(msg, "INVITE") {
                ctx.core.setflag(msg, RouteFlag::AccMissed);
            }
            return Ok(RouteOutcome::exit(ctx.run(RouteId::Relay, msg)?.into_disposition()));
        }
        LookupResult::NotFound | LookupResult::Error => (404, "Not Found"),
        LookupResult::MethodNotSupported => (405, "Method Not Allowed"),
    };

    if ctx.core.t_newtran(msg) {
        ctx.core.t_reply(msg, code, reason)?;
    } else {
        ctx.core.sl_send_reply(msg, code, reason)?;
    }
    Ok(RouteOutcome::exit(Disposition::replied(code, reason)))
}
