//! Routing of telephone numbers to a PSTN gateway

use tracing::debug;

use super::{RouteContext, RouteId, RouteOutcome};
use crate::engine::Disposition;
use crate::errors::RoutingResult;
use crate::message::Message;

/// `+` followed by a non-zero digit and at least one more digit
pub(crate) fn is_e164_number(user: &str) -> bool {
    let Some(digits) = user.strip_prefix('+') else {
        return false;
    };
    digits.len() >= 2
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0')
}

pub(super) fn pstn(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    let Some(pstn) = &ctx.config.pstn else {
        return Ok(RouteOutcome::Return);
    };
    let Some(user) = msg.ruri_user()? else {
        return Ok(RouteOutcome::Return);
    };
    if !is_e164_number(&user) {
        return Ok(RouteOutcome::Return);
    }

    let from_local = match msg.from_uri().map(str::to_string) {
        Some(from) => ctx.core.is_myself(msg, &from),
        None => false,
    };
    if !from_local {
        ctx.core.sl_send_reply(msg, 403, "Not Allowed")?;
        return Ok(RouteOutcome::exit(Disposition::replied(403, "Not Allowed")));
    }

    let target = format!("sip:{}@{}", user, pstn.gateway);
    debug!("{}: PSTN call to {} via {}", msg.id(), user, pstn.gateway);
    msg.rewrite_uri(target);
    Ok(RouteOutcome::exit(ctx.run(RouteId::Relay, msg)?.into_disposition()))
}
