use super::*;
use crate::agui::event::Props;
use crate::agui::widget::{QuoteApproval, StatusMessage};
use serde_json::{Value, json};

fn registry() -> Arc<Registry> {
    Arc::new(Registry::standard().expect("standard registry builds"))
}

fn event(component: &str, props: Value) -> WorkflowEvent {
    let props: Props = props.as_object().cloned().expect("props fixture must be an object");
    WorkflowEvent::new(component, props).expect("valid event fixture")
}

fn wire(component: &str, props: Value) -> String {
    json!({"type": "ui_render", "component": component, "props": props}).to_string()
}

// =============================================================================
// Basics
// =============================================================================

#[test]
fn new_dispatcher_is_idle_and_empty() {
    let dispatcher = Dispatcher::new(registry());
    assert!(dispatcher.state().is_none());
    assert_eq!(dispatcher.phase(), Phase::Idle);
    assert_eq!(dispatcher.applied(), 0);
}

#[test]
fn thinking_loader_carries_stage_caption_and_progress() {
    let mut dispatcher = Dispatcher::new(registry());
    let outcome = dispatcher
        .on_event(event("thinking_loader", json!({"stage": "fetching", "progress": 60})))
        .expect("dispatch");
    assert_eq!(outcome, Dispatch::Rendered);

    let state = dispatcher.state().expect("state rendered");
    assert_eq!(state.phase, Phase::Fetching);
    assert_eq!(state.caption, Some("Fetching vendor quotes..."));
    assert_eq!(state.progress.map(Progress::get), Some(60));
    assert_eq!(state.widget.kind(), "thinking_loader");
}

#[test]
fn each_stage_maps_to_its_phase() {
    let cases = [
        ("parsing", Phase::Parsing),
        ("analyzing", Phase::Analyzing),
        ("fetching", Phase::Fetching),
        ("processing", Phase::Processing),
        ("idle", Phase::Idle),
    ];
    let mut dispatcher = Dispatcher::new(registry());
    for (stage, phase) in cases {
        dispatcher
            .on_event(event("thinking_loader", json!({"stage": stage})))
            .expect("dispatch");
        assert_eq!(dispatcher.phase(), phase, "stage {stage}");
    }
}

#[test]
fn missing_stage_is_idle_without_caption() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher
        .on_event(event("inventory_check", json!({"items": [{"name": "Laptop", "requested": 2, "available": 5}]})))
        .expect("dispatch");

    let state = dispatcher.state().expect("state rendered");
    assert_eq!(state.phase, Phase::Idle);
    assert!(state.caption.is_none());
    assert!(state.progress.is_none());
}

// =============================================================================
// Last write wins
// =============================================================================

#[test]
fn state_after_sequence_equals_last_event_alone() {
    let reg = registry();
    let sequence = vec![
        event("thinking_loader", json!({"stage": "parsing", "progress": 10})),
        event("inventory_check", json!({"message": "checking"})),
        event("quote_fetcher", json!({"stage": "fetching", "vendors": ["Acme", "Globex"], "received": 1})),
        event("quote_approval_card", json!({"vendor": "Acme", "total_amount": 500})),
    ];
    let last = sequence.last().cloned().expect("non-empty");

    let mut dispatcher = Dispatcher::new(Arc::clone(&reg));
    for e in sequence {
        dispatcher.on_event(e).expect("dispatch");
    }

    let alone = RenderState::from_event(&reg, last).expect("render alone");
    assert_eq!(dispatcher.state(), Some(&alone));
    assert_eq!(dispatcher.applied(), 4);
}

#[test]
fn approval_props_do_not_leak_into_error_card() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher
        .on_text(&wire("quote_approval_card", json!({"vendor": "Acme", "total_amount": 500})))
        .expect("dispatch approval");
    dispatcher
        .on_text(&wire("error_card", json!({"message": "Payment declined"})))
        .expect("dispatch error");

    let state = dispatcher.state().expect("state rendered");
    assert_eq!(state.component, "error_card");
    assert_eq!(state.phase, Phase::Error);
    let Widget::ErrorCard(card) = &state.widget else {
        panic!("expected error card");
    };
    assert_eq!(card.message.as_deref(), Some("Payment declined"));

    let json = serde_json::to_value(state).expect("serialize");
    assert!(!json.to_string().contains("Acme"));
    assert!(json["widget"]["props"].get("total_amount").is_none());
}

#[test]
fn unknown_component_renders_fallback_message() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher
        .on_text(&wire("unknown_widget_xyz", json!({"message": "hi"})))
        .expect("unknown components never fail");

    let state = dispatcher.state().expect("state rendered");
    assert_eq!(state.component, "unknown_widget_xyz");
    assert_eq!(state.widget, Widget::Fallback(StatusMessage { message: "hi".into() }));
    assert_eq!(state.phase, Phase::Idle);
}

#[test]
fn unknown_component_keeps_stage_and_progress() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher
        .on_event(event("shiny_new_card", json!({"stage": "processing", "progress": 0})))
        .expect("dispatch");

    let state = dispatcher.state().expect("state rendered");
    assert_eq!(state.phase, Phase::Processing);
    assert_eq!(state.progress.map(Progress::get), Some(0));
}

// =============================================================================
// Malformed events
// =============================================================================

#[test]
fn malformed_event_leaves_state_unchanged() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher
        .on_event(event("quote_fetcher", json!({"stage": "fetching", "progress": 30})))
        .expect("dispatch");
    let before = dispatcher.state().cloned();

    let bad_inputs = [
        r#"{"type":"ui_render","props":{"message":"no component"}}"#.to_owned(),
        "not even json".to_owned(),
        wire("thinking_loader", json!({"progress": 101})),
        wire("thinking_loader", json!({"stage": "sleeping"})),
        wire("quote_approval_card", json!({"total_amount": "five hundred"})),
    ];
    for input in &bad_inputs {
        assert!(dispatcher.on_text(input).is_err(), "should reject {input}");
        assert_eq!(dispatcher.state().cloned(), before, "state changed after {input}");
    }
    assert_eq!(dispatcher.applied(), 1);
}

#[test]
fn payload_mismatch_reports_component() {
    let mut dispatcher = Dispatcher::new(registry());
    let err = dispatcher
        .on_event(event("inventory_check", json!({"items": "none"})))
        .expect_err("should fail");
    let EventError::InvalidPayload { component, .. } = err else {
        panic!("expected invalid payload");
    };
    assert_eq!(component, "inventory_check");
}

// =============================================================================
// Terminal phases
// =============================================================================

#[test]
fn payment_success_is_terminal_and_sticky() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher
        .on_event(event("payment_success", json!({"transaction_id": "tx_1", "amount": 500})))
        .expect("dispatch");
    assert_eq!(dispatcher.phase(), Phase::Success);

    let outcome = dispatcher
        .on_event(event("thinking_loader", json!({"stage": "parsing"})))
        .expect("dispatch");
    assert_eq!(outcome, Dispatch::Ignored);
    assert_eq!(dispatcher.phase(), Phase::Success);
    assert_eq!(dispatcher.state().map(|s| s.widget.kind()), Some("payment_success"));
    assert_eq!(dispatcher.applied(), 1);
}

#[test]
fn error_card_is_terminal_even_with_stage() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher
        .on_event(event("error_card", json!({"stage": "processing", "message": "boom"})))
        .expect("dispatch");
    assert_eq!(dispatcher.phase(), Phase::Error);
    assert!(dispatcher.phase().is_terminal());
}

#[test]
fn reset_starts_a_new_session() {
    let mut dispatcher = Dispatcher::new(registry());
    let first = dispatcher.session_id();
    dispatcher
        .on_event(event("error_card", json!({"message": "boom"})))
        .expect("dispatch");

    let second = dispatcher.reset();
    assert_ne!(first, second);
    assert_eq!(dispatcher.session_id(), second);
    assert!(dispatcher.state().is_none());
    assert_eq!(dispatcher.phase(), Phase::Idle);

    let outcome = dispatcher
        .on_event(event("quote_approval_card", json!({"vendor": "Initech"})))
        .expect("dispatch");
    assert_eq!(outcome, Dispatch::Rendered);
    let Some(Widget::QuoteApprovalCard(QuoteApproval { vendor, .. })) = dispatcher.state().map(|s| &s.widget) else {
        panic!("expected quote approval card");
    };
    assert_eq!(vendor.as_deref(), Some("Initech"));
}

#[test]
fn fail_renders_terminal_error_card() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher
        .on_event(event("thinking_loader", json!({"stage": "analyzing", "progress": 50})))
        .expect("dispatch");

    let state = dispatcher.fail("workflow backend unreachable", Some("E_WORKFLOW_CONNECT"), true);
    assert_eq!(state.phase, Phase::Error);
    assert!(state.progress.is_none());
    assert!(state.caption.is_none());
    assert_eq!(state.widget.message(), Some("workflow backend unreachable"));

    let outcome = dispatcher
        .on_event(event("thinking_loader", json!({"stage": "parsing"})))
        .expect("dispatch");
    assert_eq!(outcome, Dispatch::Ignored);
}
