//! Initial request routing through the full request route
//!
//! Covers the stages every out-of-dialog request walks: request sanity,
//! retransmission handling, CANCEL, authentication, foreign domains,
//! presence, registrar, PSTN and user location.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use rvoip_routing_core::engine::Reply;
use rvoip_routing_core::facade::SentReply;
use rvoip_routing_core::{
    AuthConfig, Disposition, Message, RouteFlag, RouteId, RouterConfig, RoutingEngine,
    RoutingError, ScriptedHost,
};

const DOMAIN: &str = "example.com";

fn local_host() -> ScriptedHost {
    ScriptedHost::new().local_domain(DOMAIN)
}

fn engine(host: &Arc<ScriptedHost>, config: RouterConfig) -> RoutingEngine {
    RoutingEngine::new(host.clone(), config)
}

fn invite(uri: &str) -> Message {
    Message::request("INVITE", uri)
        .from("sip:alice@example.com")
        .to(uri)
        .build()
}

fn reply(op: &str, code: u16, reason: &str) -> SentReply {
    SentReply {
        op: op.to_string(),
        code,
        reason: reason.to_string(),
    }
}

#[test]
fn test_invite_to_registered_user_is_relayed() {
    let host = Arc::new(local_host());
    let mut msg = invite("sip:bob@example.com");

    let disposition = engine(&host, RouterConfig::default()).route(&mut msg);

    assert_eq!(disposition, Disposition::Relayed);
    assert!(host.replies().is_empty());
    assert!(host.position("record_route") < host.position("lookup"));
    assert_eq!(msg.header("Record-Route"), Some("<sip:example.com;lr>"));

    let relays = host.relays();
    assert_eq!(relays.len(), 1);
    assert!(relays[0].flags.is_set(RouteFlag::Acc));
    assert!(relays[0].flags.is_set(RouteFlag::AccMissed));
    assert_eq!(relays[0].callbacks.branch.as_deref(), Some("MANAGE_BRANCH"));
    assert_eq!(relays[0].callbacks.reply.as_deref(), Some("MANAGE_REPLY"));
    assert_eq!(relays[0].callbacks.failure.as_deref(), Some("MANAGE_FAILURE"));
}

#[test]
fn test_relay_keeps_branch_callback_armed_earlier() {
    let host = Arc::new(local_host());
    let engine = engine(&host, RouterConfig::default());
    let mut msg = invite("sip:bob@example.com");
    assert!(engine.core().t_on_branch(&mut msg, "FORK_BRANCH"));

    assert_eq!(engine.run(RouteId::Relay, &mut msg).unwrap(), Disposition::Relayed);

    assert_eq!(host.count("t_on_branch"), 1);
    assert_eq!(host.count("t_on_reply"), 1);
    assert_eq!(host.relays()[0].callbacks.branch.as_deref(), Some("FORK_BRANCH"));
}

#[test]
fn test_message_request_arms_no_callbacks() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("MESSAGE", "sip:bob@example.com")
        .from("sip:alice@example.com")
        .build();

    assert_eq!(engine(&host, RouterConfig::default()).route(&mut msg), Disposition::Relayed);
    assert!(msg.callbacks().is_empty());
    assert!(!host.called("record_route"));
    assert!(!msg.is_flag_set(RouteFlag::Acc));
}

#[test]
fn test_preloaded_route_headers_removed() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("INVITE", "sip:bob@example.com")
        .header("Route", "<sip:evil.example.net;lr>")
        .build();

    engine(&host, RouterConfig::default()).route(&mut msg);

    assert!(!msg.has_header("Route"));
}

#[test]
fn test_cancel_with_transaction_is_relayed() {
    let host = Arc::new(local_host().answer("t_check_trans", 1));
    let mut msg = Message::request("CANCEL", "sip:bob@example.com").build();

    assert_eq!(engine(&host, RouterConfig::default()).route(&mut msg), Disposition::Relayed);
    assert!(host.replies().is_empty());
    assert_eq!(host.count("t_relay"), 1);
}

#[test]
fn test_cancel_without_transaction_dropped_silently() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("CANCEL", "sip:bob@example.com").build();

    assert_eq!(engine(&host, RouterConfig::default()).route(&mut msg), Disposition::Dropped);
    assert!(host.replies().is_empty());
    assert!(!host.called("t_relay"));
}

#[test]
fn test_cancel_relay_failure_replies_error() {
    let host = Arc::new(local_host().answer("t_check_trans", 1).answer("t_relay", -1));
    let mut msg = Message::request("CANCEL", "sip:bob@example.com").build();

    assert_eq!(
        engine(&host, RouterConfig::default()).route(&mut msg),
        Disposition::RepliedLocally(Reply::Error)
    );
    assert_eq!(host.count("sl_reply_error"), 1);
}

#[test]
fn test_retransmission_absorbed() {
    let host = Arc::new(local_host().answer("t_precheck_trans", 1));
    let mut msg = invite("sip:bob@example.com");

    assert_eq!(engine(&host, RouterConfig::default()).route(&mut msg), Disposition::Dropped);
    assert_eq!(host.count("t_check_trans"), 1);
    assert!(!host.called("has_totag"));
    assert!(host.replies().is_empty());
}

#[test]
fn test_missing_user_replies_address_incomplete() {
    let host = Arc::new(local_host());
    let mut msg = invite("sip:example.com");

    let disposition = engine(&host, RouterConfig::default().with_pstn_gateway("gw.example.net")).route(&mut msg);

    assert_eq!(disposition, Disposition::replied(484, "Address Incomplete"));
    assert_eq!(host.replies(), vec![reply("sl_send_reply", 484, "Address Incomplete")]);
    assert!(!host.called("lookup"));
    assert!(!host.called("t_relay"));
}

#[test]
fn test_relay_failure_replies_error() {
    let host = Arc::new(local_host().answer("t_relay", -1));
    let mut msg = invite("sip:bob@example.com");

    assert_eq!(
        engine(&host, RouterConfig::default()).route(&mut msg),
        Disposition::RepliedLocally(Reply::Error)
    );
    assert_eq!(host.count("t_relay"), 1);
    assert_eq!(host.count("sl_reply_error"), 1);
    assert!(host.position("t_relay") < host.position("sl_reply_error"));
}

#[test]
fn test_scanner_dropped_without_host_calls() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("OPTIONS", "sip:100@example.com")
        .header("User-Agent", "friendly-scanner 1.0")
        .build();

    assert_eq!(engine(&host, RouterConfig::default()).route(&mut msg), Disposition::Dropped);
    assert!(host.calls().is_empty());
}

#[test]
fn test_max_forwards_exhausted() {
    let host = Arc::new(local_host().answer("max_forwards_process", -1));
    let mut msg = invite("sip:bob@example.com");

    assert_eq!(
        engine(&host, RouterConfig::default()).route(&mut msg),
        Disposition::replied(483, "Too Many Hops")
    );
    assert!(!host.called("sanity_check"));
}

#[test]
fn test_ack_with_exhausted_max_forwards_dropped() {
    let host = Arc::new(local_host().answer("max_forwards_process", -1));
    let mut msg = Message::request("ACK", "sip:bob@example.com")
        .to_tagged("sip:bob@example.com", "8321234356")
        .build();

    assert_eq!(engine(&host, RouterConfig::default()).route(&mut msg), Disposition::Dropped);
    assert!(host.replies().is_empty());
    assert!(!host.called("sl_send_reply"));
    assert!(!host.called("t_check_trans"));
}

#[test]
fn test_keepalive_options_answered() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("OPTIONS", "sip:example.com").build();

    assert_eq!(
        engine(&host, RouterConfig::default()).route(&mut msg),
        Disposition::replied(200, "Keepalive")
    );
}

#[test]
fn test_insane_request_dropped() {
    let host = Arc::new(local_host().answer("sanity_check", -1));
    let mut msg = invite("sip:bob@example.com");

    assert_eq!(engine(&host, RouterConfig::default()).route(&mut msg), Disposition::Dropped);
    assert!(host.replies().is_empty());
    assert!(!host.called("force_rport"));
}

#[test]
fn test_foreign_domain_sent_out() {
    let host = Arc::new(local_host());
    let mut msg = invite("sip:carol@elsewhere.net");

    assert_eq!(engine(&host, RouterConfig::default()).route(&mut msg), Disposition::Relayed);
    assert_eq!(msg.header("P-Hint"), Some("outbound"));
    assert!(!host.called("lookup"));
}

#[test]
fn test_auth_challenges_unauthenticated_register() {
    let host = Arc::new(local_host().answer("auth_check", -1));
    let mut msg = Message::request("REGISTER", "sip:example.com")
        .from("sip:alice@example.com")
        .to("sip:alice@example.com")
        .build();

    let config = RouterConfig::default().with_auth(AuthConfig::default());
    assert_eq!(
        engine(&host, config).route(&mut msg),
        Disposition::RepliedLocally(Reply::Challenge)
    );
    assert_eq!(host.calls().iter().find(|c| c.op == "auth_check").and_then(|c| c.arg.clone()),
        Some("example.com/subscriber".to_string()));
    assert!(!host.called("save"));
}

#[test]
fn test_auth_consumes_credentials_of_local_caller() {
    let host = Arc::new(local_host());
    let mut msg = invite("sip:bob@example.com");

    let config = RouterConfig::default().with_auth(AuthConfig::default());
    assert_eq!(engine(&host, config).route(&mut msg), Disposition::Relayed);
    assert_eq!(host.count("consume_credentials"), 1);
}

#[test]
fn test_auth_refuses_open_relay() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("INVITE", "sip:carol@elsewhere.net")
        .from("sip:mallory@attacker.net")
        .build();

    let config = RouterConfig::default().with_auth(AuthConfig::default());
    assert_eq!(
        engine(&host, config).route(&mut msg),
        Disposition::replied(403, "Not relaying")
    );
    assert!(!host.called("auth_check"));
    assert!(!host.called("t_relay"));
}

#[test]
fn test_presence_disabled_rejects_subscribe() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("SUBSCRIBE", "sip:bob@example.com").build();

    assert_eq!(
        engine(&host, RouterConfig::default()).route(&mut msg),
        Disposition::replied(404, "Not here")
    );
}

#[test]
fn test_presence_enabled_handles_publish() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("PUBLISH", "sip:bob@example.com").build();

    assert_eq!(
        engine(&host, RouterConfig::default().with_presence()).route(&mut msg),
        Disposition::RepliedLocally(Reply::Presence)
    );
    assert!(host.position("t_newtran") < host.position("handle_publish"));
    assert!(host.position("handle_publish") < host.position("t_release"));
    assert!(!host.called("t_relay"));
}

#[test]
fn test_presence_transaction_failure() {
    let host = Arc::new(local_host().answer("t_newtran", -1));
    let mut msg = Message::request("SUBSCRIBE", "sip:bob@example.com").build();

    assert_eq!(
        engine(&host, RouterConfig::default().with_presence()).route(&mut msg),
        Disposition::RepliedLocally(Reply::Error)
    );
    assert!(!host.called("handle_subscribe"));
}

#[test]
fn test_register_behind_nat_marks_binding() {
    let host = Arc::new(local_host().answer("nat_uac_test", 1));
    let mut msg = Message::request("REGISTER", "sip:example.com")
        .from("sip:alice@example.com")
        .to("sip:alice@example.com")
        .build();

    let disposition = engine(&host, RouterConfig::default()).route(&mut msg);

    assert_eq!(disposition, Disposition::RepliedLocally(Reply::Registrar));
    assert!(msg.is_flag_set(RouteFlag::Nats));
    assert!(msg.is_flag_set(RouteFlag::Natb));
    assert!(!msg.is_flag_set(RouteFlag::NatSipping));
    assert!(host.called("fix_nated_register"));
    assert!(host.replies().is_empty());
}

#[test]
fn test_register_nat_sipping_opt_in() {
    let host = Arc::new(local_host().answer("nat_uac_test", 1));
    let mut msg = Message::request("REGISTER", "sip:example.com").build();

    engine(&host, RouterConfig::default().with_nat_sipping()).route(&mut msg);

    assert!(msg.is_flag_set(RouteFlag::NatSipping));
}

#[test]
fn test_register_save_failure_replies_error() {
    for nat in [1, -1] {
        let host = Arc::new(local_host().answer("nat_uac_test", nat).answer("save", -1));
        let mut msg = Message::request("REGISTER", "sip:example.com").build();

        assert_eq!(
            engine(&host, RouterConfig::default()).route(&mut msg),
            Disposition::RepliedLocally(Reply::Error)
        );
        assert_eq!(host.count("sl_reply_error"), 1);
    }
}

#[test]
fn test_pstn_number_rewritten_to_gateway() {
    let host = Arc::new(local_host());
    let mut msg = invite("sip:+4930123456@example.com");

    let config = RouterConfig::default().with_pstn_gateway("gw.example.net:5080");
    assert_eq!(engine(&host, config).route(&mut msg), Disposition::Relayed);

    assert_eq!(host.relays()[0].ruri, "sip:+4930123456@gw.example.net:5080");
    assert_eq!(msg.orig_ruri(), "sip:+4930123456@example.com");
    assert!(!host.called("lookup"));
}

#[test]
fn test_pstn_refused_for_foreign_caller() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("INVITE", "sip:+4930123456@example.com")
        .from("sip:mallory@attacker.net")
        .build();

    let config = RouterConfig::default().with_pstn_gateway("gw.example.net");
    assert_eq!(engine(&host, config).route(&mut msg), Disposition::replied(403, "Not Allowed"));
}

#[test]
fn test_location_not_found() {
    for code in [-1, -3] {
        let host = Arc::new(local_host().answer("lookup", code));
        let mut msg = invite("sip:bob@example.com");

        assert_eq!(
            engine(&host, RouterConfig::default()).route(&mut msg),
            Disposition::replied(404, "Not Found")
        );
        assert_eq!(host.replies(), vec![reply("t_reply", 404, "Not Found")]);
        assert!(host.position("t_newtran") < host.position("t_reply"));
    }
}

#[test]
fn test_location_method_not_supported() {
    let host = Arc::new(local_host().answer("lookup", -2));
    let mut msg = invite("sip:bob@example.com");

    assert_eq!(
        engine(&host, RouterConfig::default()).route(&mut msg),
        Disposition::replied(405, "Method Not Allowed")
    );
}

#[test]
fn test_location_table_from_config() {
    let host = Arc::new(local_host());
    let mut msg = invite("sip:bob@example.com");

    engine(&host, RouterConfig::default().with_location_table("aliases")).route(&mut msg);

    let lookup = host.calls().into_iter().find(|c| c.op == "lookup");
    assert_eq!(lookup.and_then(|c| c.arg), Some("aliases".to_string()));
}

#[test]
fn test_inconsistent_message_aborted() {
    let host = Arc::new(local_host());
    let mut msg = Message::request("INVITE", "sip:bob@example.com")
        .buffer("INVITE sip:bob@example.com SIP/2.0\r\n")
        .parsed_offset(4096)
        .build();

    let engine = engine(&host, RouterConfig::default());
    assert!(matches!(
        engine.try_route(&mut msg),
        Err(RoutingError::MalformedMessage { .. })
    ));
    assert_eq!(engine.route(&mut msg), Disposition::Dropped);
    assert!(host.calls().is_empty());
}

#[test]
fn test_run_named_route() {
    let host = Arc::new(local_host());
    let mut msg = invite("sip:carol@elsewhere.net");

    let disposition = engine(&host, RouterConfig::default()).run_named("SIPOUT", &mut msg).unwrap();

    assert_eq!(disposition, Disposition::Relayed);
    assert_eq!(host.ops().first().map(String::as_str), Some("is_myself"));
}
