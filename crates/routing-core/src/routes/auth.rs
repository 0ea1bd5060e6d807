//! Digest authentication and relay policy

use super::{RouteContext, RouteOutcome};
use crate::engine::{Disposition, Reply};
use crate::errors::RoutingResult;
use crate::message::{Message, SipUri};

pub(super) fn auth(ctx: &RouteContext<'_>, msg: &mut Message) -> RoutingResult<RouteOutcome> {
    let Some(auth) = &ctx.config.auth else {
        return Ok(RouteOutcome::Return);
    };

    let from = msg.from_uri().map(str::to_string);
    let from_local = from.as_deref().is_some_and(|uri| ctx.core.is_myself(msg, uri));

    if ctx.core.is_method(msg, "REGISTER") || from_local {
        let realm = match &auth.realm {
            Some(realm) => realm.clone(),
            None => from
                .as_deref()
                .and_then(|uri| SipUri::parse(uri).ok())
                .map(|uri| uri.host)
                .unwrap_or_default(),
        };
        if !ctx.core.auth_check(msg, &realm, &auth.table) {
            ctx.core.auth_challenge(msg, &realm)?;
            return Ok(RouteOutcome::exit(Disposition::RepliedLocally(Reply::Challenge)));
        }
        if !ctx.core.is_method(msg, "REGISTER|PUBLISH") {
            ctx.core.consume_credentials(msg);
        }
    }

    // only local users may use this proxy to reach foreign domains
    let ruri = msg.ruri().to_string();
    if !from_local && !ctx.core.is_myself(msg, &ruri) {
        ctx.core.sl_send_reply(msg, 403, "Not relaying")?;
        return Ok(RouteOutcome::exit(Disposition::replied(403, "Not relaying")));
    }
    Ok(RouteOutcome::Return)
}
