//! Property tests over random subscribe/unsubscribe sequences and graphs.

use graphwatch::{Monitor, MonitorConfig, Object, PollingConfig, Token, Value};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const KEYS: [&str; 3] = ["a", "b", "c"];

#[derive(Clone, Debug)]
enum Op {
    Subscribe(usize),
    Unsubscribe(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..KEYS.len()).prop_map(Op::Subscribe),
        any::<usize>().prop_map(Op::Unsubscribe),
    ]
}

fn manual_monitor() -> Monitor {
    Monitor::new(MonitorConfig {
        polling: PollingConfig {
            background: false,
            ..Default::default()
        },
        ..Default::default()
    })
}

struct Live {
    token: Token,
    key: usize,
    hits: Arc<AtomicUsize>,
}

proptest! {
    #[test]
    fn prop_every_live_token_hears_its_path_once(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let monitor = manual_monitor();
        let root = Object::new().with("a", 1).with("b", 2).with("c", 3);
        let before: Vec<_> = KEYS.iter().map(|k| root.descriptor(*k)).collect();
        monitor.register("root", root.clone()).unwrap();

        let mut live: Vec<Live> = Vec::new();
        let mut removed: Vec<Live> = Vec::new();
        let mut seen = HashSet::new();
        for op in ops {
            match op {
                Op::Subscribe(key) => {
                    let hits = Arc::new(AtomicUsize::new(0));
                    let counter = Arc::clone(&hits);
                    let subs = monitor
                        .listen("root", move |_, _, _| { counter.fetch_add(1, Ordering::SeqCst); }, KEYS[key])
                        .unwrap();
                    let token = subs.tokens().next().unwrap();
                    prop_assert!(seen.insert(token), "token reused");
                    live.push(Live { token, key, hits });
                }
                Op::Unsubscribe(pick) if !live.is_empty() => {
                    let entry = live.remove(pick % live.len());
                    prop_assert!(monitor.unsubscribe(entry.token));
                    removed.push(entry);
                }
                Op::Unsubscribe(_) => {}
            }
        }
        prop_assert_eq!(monitor.subscription_count(), live.len());

        for (i, key) in KEYS.iter().enumerate() {
            root.set(*key, Value::Int(100 + i as i64)).unwrap();
        }
        for entry in &live {
            prop_assert_eq!(entry.hits.load(Ordering::SeqCst), 1, "key {}", KEYS[entry.key]);
        }
        for entry in &removed {
            prop_assert_eq!(entry.hits.load(Ordering::SeqCst), 0);
        }

        monitor.remove(None);
        for (i, key) in KEYS.iter().enumerate() {
            root.set(*key, Value::Int(1 + i as i64)).unwrap();
        }
        let after: Vec<_> = KEYS.iter().map(|k| root.descriptor(*k)).collect();
        prop_assert_eq!(before, after);
        for entry in &live {
            prop_assert_eq!(entry.hits.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn prop_drilling_random_graphs_terminates(
        nodes in 1usize..8,
        edges in proptest::collection::vec((0usize..8, 0usize..8), 0..20),
    ) {
        let objects: Vec<Object> = (0..nodes)
            .map(|i| Object::new().with("id", i as i64))
            .collect();
        for (n, (from, to)) in edges.into_iter().enumerate() {
            let (from, to) = (from % nodes, to % nodes);
            objects[from].set(format!("e{n}"), objects[to].clone()).unwrap();
        }

        let monitor = manual_monitor();
        monitor.register("root", objects[0].clone()).unwrap();
        let subs = monitor.listen("root", |_, _, _| {}, "").unwrap();

        let paths: HashSet<&str> = subs.paths().collect();
        prop_assert_eq!(paths.len(), subs.len());
        prop_assert_eq!(monitor.subscription_count(), subs.len());

        let summary = monitor.remove(None);
        prop_assert!(summary.is_clean());
        prop_assert_eq!(summary.removed, subs.len());
    }
}
