use super::{RouteContext, RouteId, RouteOutcome};
use crate::errors::RoutingResult;
use crate::message::Message;

/// Forward requests for foreign domains straight out
pub(super) fn sipout(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    let ruri = msg.ruri().to_string();
    if ctx.core.is_myself(msg, &ruri) {
        return Ok(RouteOutcome::Return);
    }
    ctx.core.append_hf(msg, "P-Hint: outbound\r\n")?;
    Ok(RouteOutcome::exit(ctx.run(RouteId::Relay, msg)?.into_disposition()))
}
