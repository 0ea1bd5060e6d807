//! In-dialog requests and transaction callback routes

use std::sync::Arc;

use pretty_assertions::assert_eq;

use rvoip_routing_core::engine::Reply;
use rvoip_routing_core::{Disposition, Message, RouteFlag, RouterConfig, RoutingEngine, ScriptedHost};

fn engine(host: &Arc<ScriptedHost>) -> RoutingEngine {
    RoutingEngine::new(host.clone(), RouterConfig::default())
}

fn in_dialog(method: &str) -> Message {
    Message::request(method, "sip:bob@10.0.0.2:5060")
        .from("sip:alice@example.com")
        .to_tagged("sip:bob@example.com", "8321234356")
        .header("Route", "<sip:example.com;lr>")
        .build()
}

fn loose_routing_host() -> ScriptedHost {
    ScriptedHost::new().local_domain("example.com").answer("loose_route", 1)
}

#[test]
fn test_bye_marks_accounting_before_relay() {
    let host = Arc::new(loose_routing_host());
    let mut msg = in_dialog("BYE");

    assert_eq!(engine(&host).route(&mut msg), Disposition::Relayed);

    let relays = host.relays();
    assert_eq!(relays.len(), 1);
    assert!(relays[0].flags.is_set(RouteFlag::Acc));
    assert!(relays[0].flags.is_set(RouteFlag::AccFailed));
    assert!(host.called("handle_ruri_alias"));
    // in-dialog requests never reach the initial-request stages
    assert!(!host.called("lookup"));
    assert!(!host.called("record_route"));
}

#[test]
fn test_dialog_uri_alias_skipped_with_destination() {
    let host = Arc::new(loose_routing_host());
    let mut msg = Message::request("BYE", "sip:bob@10.0.0.2")
        .to_tagged("sip:bob@example.com", "1")
        .dst_uri("sip:192.0.2.7:5060")
        .build();

    engine(&host).route(&mut msg);

    assert!(!host.called("handle_ruri_alias"));
}

#[test]
fn test_ack_runs_nat_management_then_relay() {
    let host = Arc::new(loose_routing_host());
    let mut msg = in_dialog("ACK");

    assert_eq!(engine(&host).route(&mut msg), Disposition::Relayed);

    let nat_check = host.position("check_route_param");
    assert!(nat_check.is_some());
    assert!(nat_check < host.position("t_relay"));
    assert!(host.replies().is_empty());
}

#[test]
fn test_ack_relay_failure_not_answered() {
    let host = Arc::new(loose_routing_host().answer("t_relay", -1));
    let mut msg = in_dialog("ACK");

    assert_eq!(engine(&host).route(&mut msg), Disposition::Dropped);
    assert!(host.replies().is_empty());
    assert!(!host.called("sl_reply_error"));
}

#[test]
fn test_ack_nat_dialog_gets_media_relay() {
    let host = Arc::new(loose_routing_host().answer("check_route_param", 1));
    let mut msg = in_dialog("ACK");

    engine(&host).route(&mut msg);

    assert!(msg.is_flag_set(RouteFlag::Natb));
    assert!(host.position("rtp_manage") < host.position("t_relay"));
}

#[test]
fn test_notify_record_routed() {
    let host = Arc::new(loose_routing_host());
    let mut msg = in_dialog("NOTIFY");

    assert_eq!(engine(&host).route(&mut msg), Disposition::Relayed);
    assert_eq!(host.count("record_route"), 1);
}

#[test]
fn test_ack_without_transaction_dropped() {
    let host = Arc::new(ScriptedHost::new().local_domain("example.com"));
    let mut msg = Message::request("ACK", "sip:bob@example.com")
        .to_tagged("sip:bob@example.com", "8321234356")
        .build();

    assert_eq!(engine(&host).route(&mut msg), Disposition::Dropped);

    let ops = host.ops();
    assert_eq!(ops.last().map(String::as_str), Some("t_check_trans"));
    assert_eq!(host.count("t_check_trans"), 1);
    assert!(host.replies().is_empty());
}

#[test]
fn test_ack_with_transaction_relayed() {
    let host = Arc::new(ScriptedHost::new().answer("t_check_trans", 1));
    let mut msg = Message::request("ACK", "sip:bob@example.com")
        .to_tagged("sip:bob@example.com", "8321234356")
        .build();

    assert_eq!(engine(&host).route(&mut msg), Disposition::Relayed);
}

#[test]
fn test_stray_in_dialog_request_not_here() {
    let host = Arc::new(ScriptedHost::new().local_domain("example.com"));
    let mut msg = Message::request("INFO", "sip:bob@example.com")
        .to_tagged("sip:bob@example.com", "8321234356")
        .build();

    assert_eq!(engine(&host).route(&mut msg), Disposition::replied(404, "Not here"));
    let replies = host.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].code, 404);
    assert_eq!(replies[0].reason, "Not here");
}

#[test]
fn test_in_dialog_relay_failure_replies_error() {
    let host = Arc::new(loose_routing_host().answer("t_relay", -1));
    let mut msg = in_dialog("BYE");

    assert_eq!(engine(&host).route(&mut msg), Disposition::RepliedLocally(Reply::Error));
    assert_eq!(host.count("sl_reply_error"), 1);
}

#[test]
fn test_branch_callback_marks_nat_dialog() {
    let host = Arc::new(ScriptedHost::new());
    let mut msg = Message::request("INVITE", "sip:bob@192.0.2.10")
        .flag(RouteFlag::Nats)
        .build();

    assert_eq!(engine(&host).on_branch(&mut msg), Disposition::Continue);
    assert!(host.called("rtp_manage"));
    let param = host.calls().into_iter().find(|c| c.op == "add_rr_param");
    assert_eq!(param.and_then(|c| c.arg), Some(";nat=yes".to_string()));
}

#[test]
fn test_branch_callback_without_nat_is_noop() {
    let host = Arc::new(ScriptedHost::new());
    let mut msg = Message::request("INVITE", "sip:bob@192.0.2.10").build();

    assert_eq!(engine(&host).on_branch(&mut msg), Disposition::Continue);
    assert!(!host.called("rtp_manage"));
    assert!(!host.called("add_rr_param"));
}

#[test]
fn test_reply_callback_fixes_nated_contact() {
    let host = Arc::new(ScriptedHost::new());
    let mut ok = Message::reply(200, "OK", "INVITE").flag(RouteFlag::Natb).build();

    assert_eq!(engine(&host).on_reply(&mut ok), Disposition::Continue);
    assert!(host.called("rtp_manage"));
    assert!(host.called("set_contact_alias"));
}

#[test]
fn test_reply_callback_ignores_failures() {
    let host = Arc::new(ScriptedHost::new());
    let mut busy = Message::reply(486, "Busy Here", "INVITE").flag(RouteFlag::Natb).build();

    assert_eq!(engine(&host).on_reply(&mut busy), Disposition::Continue);
    assert!(host.calls().is_empty());
}

#[test]
fn test_failure_callback_stops_on_cancel() {
    let host = Arc::new(ScriptedHost::new().answer("t_is_canceled", 1));
    let mut msg = Message::request("INVITE", "sip:bob@example.com").build();

    assert_eq!(engine(&host).on_failure(&mut msg), Disposition::Dropped);

    let host = Arc::new(ScriptedHost::new());
    assert_eq!(engine(&host).on_failure(&mut msg), Disposition::Continue);
}
