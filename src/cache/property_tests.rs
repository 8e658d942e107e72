//! Property-Based Tests for the Cache Engine
//!
//! Uses proptest to verify the capacity bound, eviction order, fingerprint
//! stability, and stats accuracy over arbitrary operation sequences.

use proptest::prelude::*;

use chrono::Utc;

use crate::cache::{CacheResult, StateStore};
use crate::key::{JsonKeyCodec, KeyCodec};

// == Test Configuration ==
const TEST_CAPACITY: usize = 8;

// == Strategies ==
/// Generates store keys from a small pool so operations collide.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,3}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{1,16}".prop_map(|s| s)
}

/// A sequence of store operations for invariant testing.
#[derive(Debug, Clone)]
enum StoreOp {
    Observe { key: String },
    Inject { key: String, value: String },
    StartLoad { key: String },
    Remove { key: String },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        key_strategy().prop_map(|key| StoreOp::Observe { key }),
        (key_strategy(), value_strategy())
            .prop_map(|(key, value)| StoreOp::Inject { key, value }),
        key_strategy().prop_map(|key| StoreOp::StartLoad { key }),
        key_strategy().prop_map(|key| StoreOp::Remove { key }),
    ]
}

fn apply(store: &StateStore<String, String>, op: StoreOp) {
    match op {
        StoreOp::Observe { key } => {
            let _ = store.cell(&key, &key);
        }
        StoreOp::Inject { key, value } => {
            let _ = store.set_value(
                &key,
                &key,
                CacheResult::Loaded {
                    value,
                    updated_at: Utc::now(),
                },
            );
        }
        StoreOp::StartLoad { key } => {
            let _ = store.set_loading(&key, &key);
        }
        StoreOp::Remove { key } => {
            store.remove(&key);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any operation sequence, the resident entry count never exceeds
    // the configured capacity.
    #[test]
    fn prop_capacity_bound_holds(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let store: StateStore<String, String> = StateStore::new(Some(TEST_CAPACITY));

        for op in ops {
            apply(&store, op);
            prop_assert!(store.count() <= TEST_CAPACITY, "capacity bound violated");
        }
    }

    // The stats entry count always mirrors the real resident count.
    #[test]
    fn prop_stats_entry_count_accurate(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let store: StateStore<String, String> = StateStore::new(Some(TEST_CAPACITY));

        for op in ops {
            apply(&store, op);
        }
        prop_assert_eq!(store.stats().total_entries, store.count());
    }

    // Inserting capacity + 1 distinct keys evicts exactly the oldest.
    #[test]
    fn prop_eviction_is_oldest_first(extra in 1usize..4) {
        let capacity = 4;
        let store: StateStore<String, String> = StateStore::new(Some(capacity));
        let total = capacity + extra;

        for i in 0..total {
            let key = format!("key{i}");
            store.set_loading(&key, &key).unwrap();
            store.set_loaded(&key, format!("v{i}"));
        }

        prop_assert_eq!(store.count(), capacity);
        // The first `extra` keys are gone, the rest survive, in order.
        for i in 0..extra {
            let k = format!("key{i}");
            prop_assert!(!store.contains(&k));
        }
        for i in extra..total {
            let k = format!("key{i}");
            prop_assert!(store.contains(&k));
        }
    }

    // Injected values round-trip exactly.
    #[test]
    fn prop_inject_roundtrip(key in key_strategy(), value in value_strategy()) {
        let store: StateStore<String, String> = StateStore::new(None);
        store.set_value(&key, &key, CacheResult::Loaded {
            value: value.clone(),
            updated_at: Utc::now(),
        }).unwrap();

        let current = store.current(&key).unwrap();
        prop_assert_eq!(current.value().cloned(), Some(value));
    }

    // Equal argument tuples always produce the same fingerprint; tuples
    // differing in any component never collide.
    #[test]
    fn prop_fingerprint_stable_and_injective(
        a in "[a-z]{1,8}", b in any::<u32>(),
        c in "[a-z]{1,8}", d in any::<u32>(),
    ) {
        let codec = JsonKeyCodec;
        let lhs = codec.encode(&(a.clone(), b)).unwrap();
        let lhs_again = codec.encode(&(a.clone(), b)).unwrap();
        prop_assert_eq!(&lhs, &lhs_again, "fingerprint must be stable");

        let rhs = codec.encode(&(c.clone(), d)).unwrap();
        if (a, b) == (c, d) {
            prop_assert_eq!(lhs, rhs);
        } else {
            prop_assert_ne!(lhs, rhs);
        }
    }
}
