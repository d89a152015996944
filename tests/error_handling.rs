//! Error handling and edge case tests.

use graphwatch::{
    Descriptor, Key, Mode, Monitor, MonitorConfig, Object, ObserveError, Opaque, PollingConfig,
    SetOptions, Subscriptions, Value,
};
use std::sync::Arc;

fn manual_monitor() -> Monitor {
    Monitor::new(MonitorConfig {
        polling: PollingConfig {
            background: false,
            ..Default::default()
        },
        ..Default::default()
    })
}

// --- Reference Errors ---

#[test]
fn test_listen_on_unregistered_root() {
    let monitor = manual_monitor();
    let result = monitor.listen("ghost", |_, _, _| {}, "a");
    assert!(matches!(result, Err(ObserveError::ReferenceMissing(ref id)) if id == "ghost"));
    assert_eq!(monitor.subscription_count(), 0);
}

#[test]
fn test_on_with_empty_path() {
    let monitor = manual_monitor();
    let result = monitor.on("", |_, _, _| {});
    assert!(matches!(result, Err(ObserveError::ReferenceMissing(_))));
}

#[test]
fn test_unresolvable_parent_creates_nothing() {
    let monitor = manual_monitor();
    monitor.register("root", Object::new().with("leaf", 1)).unwrap();

    let result = monitor.listen("root", |_, _, _| {}, "leaf.deeper");
    assert!(matches!(result, Err(ObserveError::ReferenceMissing(_))));
    assert_eq!(monitor.subscription_count(), 0);
    assert!(monitor.sampler().is_empty());
}

#[test]
fn test_get_missing_path_is_none() {
    let monitor = manual_monitor();
    monitor.register("root", Object::new()).unwrap();
    assert!(monitor.get("root.a.b").is_none());
    assert!(monitor.get("nobody").is_none());
}

#[test]
fn test_set_without_create_fails_on_missing_parent() {
    let monitor = manual_monitor();
    let root = Object::new();
    monitor.register("root", root.clone()).unwrap();

    let result = monitor.set("root.a.b", 1, SetOptions::default());
    assert!(matches!(result, Err(ObserveError::ReferenceMissing(_))));
    assert!(!root.has("a"));

    monitor
        .set(
            "root/a/b",
            1,
            SetOptions {
                create: true,
                key_separator: Some("/".to_string()),
            },
        )
        .unwrap();
    assert_eq!(monitor.get("root.a.b"), Some(Value::Int(1)));
}

// --- Subscription Errors ---

#[test]
fn test_unsubscribe_twice() {
    let monitor = manual_monitor();
    monitor.register("root", Object::new().with("n", 1)).unwrap();
    let subs = monitor.listen("root", |_, _, _| {}, "n").unwrap();
    let token = subs.get("root.n").unwrap();

    assert!(monitor.unsubscribe(token));
    assert!(!monitor.unsubscribe(token));
    assert!(monitor.mode_of(token).is_none());
}

#[test]
fn test_bulk_removal_reports_bad_keys_and_continues() {
    let monitor = manual_monitor();
    let other = manual_monitor();
    monitor.register("root", Object::new().with("a", 1).with("b", 2)).unwrap();
    other.register("root", Object::new().with("x", 1)).unwrap();

    let mut subs = monitor.listen("root", |_, _, _| {}, "").unwrap();
    let foreign = other.listen("root", |_, _, _| {}, "x").unwrap();
    subs.insert("stolen", foreign.get("root.x").unwrap());

    let summary = monitor.remove(Some(&subs));
    assert_eq!(summary.removed, 2);
    assert_eq!(summary.failed.len(), 1);
    assert!(matches!(
        &summary.failed[0],
        (key, ObserveError::InvalidSubscriptionKey(_)) if key == "stolen"
    ));
    assert_eq!(monitor.subscription_count(), 0);
    assert_eq!(other.subscription_count(), 1);
}

#[test]
fn test_bulk_removal_of_stale_tokens() {
    let monitor = manual_monitor();
    monitor.register("root", Object::new().with("n", 1)).unwrap();
    let subs = monitor.listen("root", |_, _, _| {}, "n").unwrap();

    assert_eq!(monitor.remove(Some(&subs)).removed, 1);
    let again = monitor.remove(Some(&subs));
    assert_eq!(again.removed, 0);
    assert!(matches!(
        again.failed.as_slice(),
        [(_, ObserveError::UnknownSubscription(_))]
    ));
}

#[test]
fn test_remove_all_on_empty_monitor() {
    let monitor = manual_monitor();
    let summary = monitor.remove(None);
    assert_eq!(summary.removed, 0);
    assert!(summary.is_clean());
    assert!(monitor.remove(Some(&Subscriptions::default())).is_clean());
}

// --- Ineligible Slots ---

#[test]
fn test_ineligible_slots_fall_back_to_sampling() {
    let monitor = manual_monitor();
    let root = Object::new()
        .with("nothing", Value::Null)
        .with("host", Opaque::new(42u32));
    root.define("frozen", Descriptor::data(1).read_only().non_configurable())
        .unwrap();
    root.define("live", Descriptor::accessor(Arc::new(|| Value::Int(0)), None))
        .unwrap();
    monitor.register("root", root).unwrap();

    let subs = monitor.listen("root", |_, _, _| {}, "").unwrap();
    assert_eq!(subs.len(), 4);
    for token in subs.tokens() {
        assert_eq!(monitor.mode_of(token), Some(Mode::Sampled));
    }
    assert_eq!(monitor.sampler().len(), 4);

    monitor.remove(None);
    assert!(monitor.sampler().is_empty());
}

#[test]
fn test_read_only_slot_rejects_writes_while_observed() {
    let monitor = manual_monitor();
    let root = Object::new();
    root.define("frozen", Descriptor::data(1).read_only().non_configurable())
        .unwrap();
    monitor.register("root", root.clone()).unwrap();
    monitor.listen("root", |_, _, _| {}, "frozen").unwrap();

    assert!(matches!(root.set("frozen", 2), Err(ObserveError::ReadOnly(_))));
    assert!(matches!(
        root.define("frozen", Descriptor::data(3)),
        Err(ObserveError::NotConfigurable(_))
    ));
    assert_eq!(root.get("frozen"), Some(Value::Int(1)));
}

#[test]
fn test_calling_a_non_function() {
    let root = Object::new().with("n", 1);
    assert!(matches!(root.call("n", &[]), Err(ObserveError::NotCallable(_))));
    assert!(matches!(
        root.call(Key::from("missing"), &[]),
        Err(ObserveError::NotCallable(_))
    ));
}
