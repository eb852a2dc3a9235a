//! Triggers evaluated against a live bus, the way rule sets use them

use domus_core::{Event, Node};
use domus_event_bus::Bus;
use domus_trigger::{compile, EvalError};
use std::sync::{Arc, Mutex};

fn alarm() -> Node {
    Node::new("alarm")
}

#[test]
fn test_zone_trigger_from_listener() {
    let bus = Arc::new(Bus::new());
    let zone2 = compile("zone(2).active == true").unwrap();
    let zone3 = compile("zone(3).active == true").unwrap();
    let results = Arc::new(Mutex::new(Vec::new()));

    let cache = Arc::clone(&bus);
    let sink = Arc::clone(&results);
    bus.subscribe_fn("zone-rules", move |event| {
        let a = zone2.eval(event, &cache).map_err(|e| e.to_string())?;
        let b = zone3.eval(event, &cache).map_err(|e| e.to_string())?;
        sink.lock().unwrap().push((a, b));
        Ok(())
    });

    bus.post(Event::stable(alarm(), "zone(2).active", true));
    assert_eq!(*results.lock().unwrap(), vec![(true, false)]);
}

#[test]
fn test_trigger_sees_value_cached_by_same_post() {
    let bus = Bus::new();
    let condition = compile("door & door.lock == \"open\"").unwrap();

    bus.post(Event::stable(alarm(), "door.lock", "open"));
    let arrived = Event::transient(alarm(), "door(1)", true);
    assert!(condition.eval(&arrived, &bus).unwrap());

    bus.post(Event::stable(alarm(), "door.lock", "closed"));
    assert!(!condition.eval(&arrived, &bus).unwrap());
}

#[test]
fn test_type_mismatch_against_bus_value() {
    let bus = Bus::new();
    bus.post(Event::stable(alarm(), "door.lock", true));

    let condition = compile("door.lock == \"locked\"").unwrap();
    let err = condition
        .eval(&Event::signal(alarm(), "tick"), &bus)
        .unwrap_err();
    assert!(matches!(err, EvalError::TypeMismatch { line: 1, ref id, .. } if id == "door.lock"));
}

#[test]
fn test_concurrent_evaluation_of_shared_condition() {
    let bus = Bus::new();
    for i in 0..4 {
        bus.post(Event::stable(alarm(), format!("temp({})", i), 20 + i));
    }
    let condition = compile("temp(0) < 21 & temp(3) >= 23").unwrap();

    std::thread::scope(|s| {
        for i in 0..4 {
            let (bus, condition) = (&bus, &condition);
            s.spawn(move || {
                let event = Event::signal(alarm(), format!("tick({})", i));
                for _ in 0..100 {
                    assert!(condition.eval(&event, bus).unwrap());
                }
            });
        }
    });
}
