use super::*;
use parking_lot::Mutex;
use serde_json::json;

fn recorder() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn test_groups_run_exact_then_wildcard_then_custom() {
    let bus = EventBus::new();
    let log = recorder();

    let l = log.clone();
    bus.subscribe_custom("file_started", move |_: &AguiEvent| {
        l.lock().push("custom".to_string())
    });
    let l = log.clone();
    bus.subscribe_all(move |_: &AguiEvent| l.lock().push("all".to_string()));
    let l = log.clone();
    bus.subscribe(EventKind::Custom, move |_: &AguiEvent| {
        l.lock().push("kind".to_string())
    });

    bus.dispatch(&AguiEvent::custom("file_started", json!({})));

    assert_eq!(*log.lock(), vec!["kind", "all", "custom"]);
}

#[test]
fn test_registration_order_within_group() {
    let bus = EventBus::new();
    let log = recorder();

    for label in ["first", "second", "third"] {
        let l = log.clone();
        bus.subscribe(EventKind::RunFinished, move |_: &AguiEvent| {
            l.lock().push(label.to_string())
        });
    }

    bus.dispatch(&AguiEvent::run_finished(None));
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[test]
fn test_custom_handlers_only_see_their_name() {
    let bus = EventBus::new();
    let seen = recorder();
    let all = recorder();

    let s = seen.clone();
    bus.subscribe_custom("agent_activity", move |event: &AguiEvent| {
        s.lock().push(event.custom_name().unwrap_or_default().to_string())
    });
    let a = all.clone();
    bus.subscribe_all(move |event: &AguiEvent| a.lock().push(event.kind().to_string()));

    bus.dispatch(&AguiEvent::custom("agent_activity", json!({})));
    bus.dispatch(&AguiEvent::custom("code_update", json!({})));
    bus.dispatch(&AguiEvent::run_finished(None));

    assert_eq!(*seen.lock(), vec!["agent_activity"]);
    assert_eq!(*all.lock(), vec!["CUSTOM", "CUSTOM", "RUN_FINISHED"]);
}

#[test]
fn test_kind_handlers_ignore_other_kinds() {
    let bus = EventBus::new();
    let log = recorder();
    let l = log.clone();
    bus.subscribe(EventKind::TextMessageContent, move |_: &AguiEvent| {
        l.lock().push("content".to_string())
    });

    bus.dispatch(&AguiEvent::text_message_end("m"));
    assert!(log.lock().is_empty());

    bus.dispatch(&AguiEvent::text_message_content("m", "x"));
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn test_unsubscribe() {
    let bus = EventBus::new();
    let log = recorder();
    let l = log.clone();
    let id = bus.subscribe_all(move |_: &AguiEvent| l.lock().push("hit".to_string()));

    assert_eq!(bus.len(), 1);
    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
    assert!(bus.is_empty());

    bus.dispatch(&AguiEvent::run_finished(None));
    assert!(log.lock().is_empty());
}

#[test]
fn test_unsubscribe_all_clears_diagnostics_too() {
    let bus = EventBus::new();
    let log = recorder();
    let l = log.clone();
    bus.on_diagnostic(move |d: &Diagnostic| l.lock().push(d.to_string()));
    bus.subscribe_all(|_: &AguiEvent| {});

    bus.unsubscribe_all();
    bus.report(&Diagnostic::UnknownMessage {
        kind: EventKind::TextMessageContent,
        message_id: "x".to_string(),
    });

    assert!(bus.is_empty());
    assert!(log.lock().is_empty());
}

#[test]
fn test_handler_can_mutate_bus_during_dispatch() {
    let bus = Arc::new(EventBus::new());
    let log = recorder();

    let inner_bus = bus.clone();
    let l = log.clone();
    bus.subscribe_all(move |_: &AguiEvent| {
        let l2 = l.clone();
        inner_bus.subscribe_all(move |_: &AguiEvent| l2.lock().push("late".to_string()));
        l.lock().push("outer".to_string());
    });

    bus.dispatch(&AguiEvent::run_finished(None));
    assert_eq!(*log.lock(), vec!["outer"]);

    bus.dispatch(&AguiEvent::run_finished(None));
    assert_eq!(*log.lock(), vec!["outer", "outer", "late"]);
}

#[test]
fn test_report_reaches_diagnostic_handlers() {
    let bus = EventBus::new();
    let log = recorder();
    let l = log.clone();
    let id = bus.on_diagnostic(move |d: &Diagnostic| l.lock().push(d.to_string()));

    bus.report(&Diagnostic::UnknownToolCall {
        kind: EventKind::ToolCallArgs,
        tool_call_id: "tc".to_string(),
    });
    assert_eq!(*log.lock(), vec!["TOOL_CALL_ARGS for unknown tool call 'tc'"]);

    assert!(bus.unsubscribe(id));
    bus.report(&Diagnostic::MalformedFrame {
        payload: "{".to_string(),
        error: "eof".to_string(),
    });
    assert_eq!(log.lock().len(), 1);
}

struct Counter(Arc<Mutex<usize>>);

impl EventHandler for Counter {
    fn on_event(&self, _event: &AguiEvent) {
        *self.0.lock() += 1;
    }
}

#[test]
fn test_struct_handler() {
    let bus = EventBus::new();
    let count = Arc::new(Mutex::new(0));
    bus.subscribe(EventKind::StateSnapshot, Counter(count.clone()));

    bus.dispatch(&AguiEvent::state_snapshot(json!({})));
    bus.dispatch(&AguiEvent::state_snapshot(json!({"a": 1})));

    assert_eq!(*count.lock(), 2);
}
