use ddd_eventing::listener::{FnListener, Listener, SupportedEvents};
use ddd_eventing::{DispatchOutcome, Event, EventConfig, EventService};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};

type Seen = Arc<Mutex<Vec<(String, Event)>>>;

/// 记录 (监听器名, 收到的事件)
fn spy(name: &'static str, priority: i32, seen: &Seen) -> FnListener {
    let seen = seen.clone();
    FnListener::new(name, move |event| {
        let seen = seen.clone();
        let event = event.clone();
        Box::pin(async move {
            seen.lock().unwrap().push((name.to_string(), event));
            Ok(())
        })
    })
    .with_priority(priority)
}

fn order(name: &str, payload: Value) -> Event {
    let Value::Object(payload) = payload else {
        panic!("payload must be an object")
    };
    Event::builder().name(name).payload(payload).build()
}

fn names(seen: &Seen) -> Vec<String> {
    seen.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
}

#[tokio::test]
async fn order_created_runs_equal_priority_listeners_in_registration_order() {
    let service = EventService::builder().build();
    let dispatcher = service.dispatcher();
    let seen = Seen::default();
    dispatcher.listen("order_created", Arc::new(spy("A", 5, &seen)));
    dispatcher.listen("order_created", Arc::new(spy("B", 5, &seen)));

    let event = order("order_created", json!({"order_id": "O-1"}));
    dispatcher.dispatch(&event).await.unwrap();

    let seen = seen.lock().unwrap();
    let order: Vec<&str> = seen.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(order, vec!["A", "B"]);
    for (_, received) in seen.iter() {
        assert_eq!(received, &event);
        assert_eq!(received.payload_str("order_id"), Some("O-1"));
    }
}

#[tokio::test]
async fn priority_filter_and_stop_propagation_together() {
    let service = EventService::builder().build();
    let dispatcher = service.dispatcher();
    let seen = Seen::default();

    // should_handle 为 false：无论优先级多高都不执行
    let vip_only = spy("vip-only", 100, &seen).with_supported(SupportedEvents::One("vip".into()));
    dispatcher.listen("order_paid", Arc::new(vip_only));
    dispatcher.listen("order_paid", Arc::new(spy("ledger", 10, &seen)));
    dispatcher.listen("order_paid", Arc::new(spy("fraud-check", 5, &seen).stopping()));
    dispatcher.listen("order_paid", Arc::new(spy("mailer", 1, &seen)));

    let report = dispatcher
        .dispatch_sync(&order("order_paid", json!({"order_id": "O-2"})))
        .await
        .unwrap();

    assert_eq!(names(&seen), vec!["ledger", "fraud-check"]);
    assert_eq!(report.stopped_by.as_deref(), Some("fraud-check"));
}

#[tokio::test]
async fn inline_failure_surfaces_to_producer() {
    let service = EventService::builder().build();
    let dispatcher = service.dispatcher();
    let seen = Seen::default();
    dispatcher.listen("user_registered", Arc::new(spy("welcome", 10, &seen)));
    dispatcher.listen(
        "user_registered",
        FnListener::arc("crm-sync", |_| {
            Box::pin(async { Err(anyhow::anyhow!("crm unavailable")) })
        }),
    );
    dispatcher.listen("user_registered", Arc::new(spy("analytics", -5, &seen)));

    let result = dispatcher
        .dispatch(&order("user_registered", json!({"user_id": "U-1"})))
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.listener(), Some("crm-sync"));
    assert!(err.to_string().contains("crm unavailable"));
    assert_eq!(names(&seen), vec!["welcome"]);
}

#[tokio::test]
async fn disabled_system_records_nothing() {
    let service = EventService::builder()
        .config(EventConfig {
            history_enabled: true,
            ..Default::default()
        })
        .build();
    let dispatcher = service.dispatcher();
    let seen = Seen::default();
    dispatcher.listen("*", Arc::new(spy("everything", 0, &seen)));

    service.disable();
    dispatcher.dispatch(&order("order_created", json!({}))).await.unwrap();
    let async_event = Event::builder().name("order_created").is_async(true).build();
    dispatcher.dispatch(&async_event).await.unwrap();

    assert!(names(&seen).is_empty());
    assert!(dispatcher.event_history().is_empty());
}

#[tokio::test]
async fn history_keeps_last_capacity_records() {
    const CAPACITY: usize = 5;
    let service = EventService::builder()
        .config(EventConfig {
            history_enabled: true,
            history_capacity: CAPACITY,
            ..Default::default()
        })
        .build();
    let dispatcher = service.dispatcher();
    let seen = Seen::default();
    dispatcher.listen("tick", Arc::new(spy("l", 0, &seen)));

    let events: Vec<Event> = (0..=CAPACITY)
        .map(|i| order("tick", json!({ "n": i })))
        .collect();
    for event in &events {
        dispatcher.dispatch(event).await.unwrap();
    }

    let history = dispatcher.event_history();
    assert_eq!(history.len(), CAPACITY);
    let ids: Vec<&str> = history.iter().map(|r| r.event_id.as_str()).collect();
    let expected: Vec<&str> = events[1..].iter().map(|e| e.id()).collect();
    assert_eq!(ids, expected);
    assert!(history
        .iter()
        .all(|r| r.outcome == DispatchOutcome::Completed { invoked: 1 }));
}

#[tokio::test]
async fn history_toggle_at_runtime() {
    let service = EventService::builder().build();
    let dispatcher = service.dispatcher();
    assert!(!dispatcher.history_enabled());

    dispatcher.dispatch(&order("a", json!({}))).await.unwrap();
    assert!(dispatcher.event_history().is_empty());

    dispatcher.set_enable_history(true);
    dispatcher.dispatch(&order("b", json!({}))).await.unwrap();
    let history = dispatcher.event_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_name, "b");
    assert_eq!(history[0].outcome, DispatchOutcome::Completed { invoked: 0 });
}

#[tokio::test]
async fn service_reset_isolates_cases() {
    let service = EventService::builder().build();
    let seen = Seen::default();
    service
        .dispatcher()
        .listen("e", Arc::new(spy("leaky", 0, &seen)));
    service.reset();

    service
        .dispatcher()
        .dispatch(&order("e", Value::Object(Map::new())))
        .await
        .unwrap();
    assert!(names(&seen).is_empty());
}

#[tokio::test]
async fn listener_trait_objects_from_independent_types() {
    struct Counter {
        hits: Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl Listener for Counter {
        fn name(&self) -> &str {
            "counter"
        }
        fn priority(&self) -> i32 {
            3
        }
        fn supported_events(&self) -> SupportedEvents {
            SupportedEvents::Many(vec!["a".into(), "b".into()])
        }
        async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
            *self.hits.lock().unwrap() += 1;
            Ok(())
        }
    }

    let service = EventService::builder().build();
    let dispatcher = service.dispatcher();
    let counter = Arc::new(Counter {
        hits: Mutex::new(0),
    });
    dispatcher.subscribe(counter.clone());

    for name in ["a", "b", "c"] {
        dispatcher.dispatch(&order(name, json!({}))).await.unwrap();
    }
    assert_eq!(*counter.hits.lock().unwrap(), 2);
}
