//! NAT detection and media/contact fixups

use tracing::trace;

use super::{RouteContext, RouteOutcome, RoutePhase};
use crate::errors::RoutingResult;
use crate::message::{Message, RouteFlag};

/// Detect a NATed sender and mark the message with `NATS`
pub(super) fn natdetect(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    if !ctx.config.nat.enabled {
        return Ok(RouteOutcome::Return);
    }
    ctx.core.force_rport(msg);
    if ctx.core.nat_uac_test(msg, ctx.config.nat.uac_tests) {
        if ctx.core.is_method(msg, "REGISTER") {
            ctx.core.fix_nated_register(msg);
        } else if ctx.core.is_first_hop(msg) {
            ctx.core.set_contact_alias(msg);
        }
        ctx.core.setflag(msg, RouteFlag::Nats);
    }
    Ok(RouteOutcome::Return)
}

/// Media relay and record-route marking for NATed dialogs
pub(super) fn natmanage(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    if !ctx.config.nat.enabled {
        return Ok(RouteOutcome::Return);
    }
    if msg.is_request() && ctx.core.has_totag(msg) && ctx.core.check_route_param(msg, "nat=yes") {
        ctx.core.setflag(msg, RouteFlag::Natb);
    }
    if !(ctx.core.isflagset(msg, RouteFlag::Nats) || ctx.core.isflagset(msg, RouteFlag::Natb)) {
        return Ok(RouteOutcome::Return);
    }

    if !ctx.core.rtp_manage(msg) {
        trace!("{}: no media relay for {}", msg.id(), msg.method());
    }

    if msg.is_request() && ctx.phase == RoutePhase::Branch && !ctx.core.has_totag(msg) {
        ctx.core.add_rr_param(msg, ";nat=yes");
    }
    if msg.is_reply() && ctx.core.isflagset(msg, RouteFlag::Natb) && ctx.core.is_first_hop(msg) {
        ctx.core.set_contact_alias(msg);
    }
    Ok(RouteOutcome::Return)
}

/// Resolve a contact alias in the request URI of an in-dialog request
pub(super) fn dlguri(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    if ctx.config.nat.enabled && msg.dst_uri().is_none() {
        ctx.core.handle_ruri_alias(msg);
    }
    Ok(RouteOutcome::Return)
}
