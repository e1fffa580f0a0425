#![cfg(test)]

// Property tests for WeakTable kept inside the crate next to the module they
// exercise.

use crate::weak_table::{InsertError, WeakTable};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    TryInsert(usize, i32),
    Remove(usize),
    Release(usize),
    Contains(String),
    Snapshot,
    Sweep,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::btree_set("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let pool: Vec<String> = pool.into_iter().collect();
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::TryInsert(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Release),
            prop_oneof![contains_pool, "[a-z]{0,5}".prop_map(|s| s)].prop_map(OpI::Contains),
            Just(OpI::Snapshot),
            Just(OpI::Sweep),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Model: the live entries in insertion order, plus the strong references the
// test holds. Releasing a strong reference kills the entry.
struct Model {
    entries: Vec<(String, i32)>,
    held: HashMap<String, Arc<String>>,
}

impl Model {
    fn position(&self, k: &str) -> Option<usize> {
        self.entries.iter().position(|(kk, _)| kk == k)
    }

    fn strong(&mut self, k: &str) -> Arc<String> {
        self.held
            .entry(k.to_string())
            .or_insert_with(|| Arc::new(k.to_string()))
            .clone()
    }
}

// Invariants exercised across random operation sequences:
// - `insert` overwrites in place and returns the previous value; `try_insert`
//   rejects equal live keys.
// - Releasing the last strong reference hides the entry immediately, before
//   any sweep.
// - `live_entries` yields live keys in first-insertion order.
// - `len`/`is_empty` parity with the model after each op; `slot_count` never
//   drops below `len`.
fn run_scenario<S: BuildHasher>(
    mut sut: WeakTable<String, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model = Model {
        entries: Vec::new(),
        held: HashMap::new(),
    };

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = &pool[i];
                let key = model.strong(k);
                let prev = sut.insert(&key, v);
                match model.position(k) {
                    Some(p) => {
                        prop_assert_eq!(prev, Some(model.entries[p].1));
                        model.entries[p].1 = v;
                    }
                    None => {
                        prop_assert_eq!(prev, None);
                        model.entries.push((k.clone(), v));
                    }
                }
            }
            OpI::TryInsert(i, v) => {
                let k = &pool[i];
                let key = model.strong(k);
                let already = model.position(k).is_some();
                match sut.try_insert(&key, v) {
                    Ok(h) => {
                        prop_assert!(!already, "try_insert must fail on duplicate");
                        prop_assert_eq!(sut.value(h), Some(&v));
                        model.entries.push((k.clone(), v));
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                }
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                let removed = sut.remove(k.as_str());
                match model.position(k) {
                    Some(p) => {
                        let (mk, mv) = model.entries.remove(p);
                        let (sk, sv) = removed.expect("live entry must be removable");
                        prop_assert_eq!(&*sk, &mk);
                        prop_assert_eq!(sv, mv);
                    }
                    None => prop_assert!(removed.is_none()),
                }
            }
            OpI::Release(i) => {
                let k = &pool[i];
                if model.held.remove(k).is_some() {
                    if let Some(p) = model.position(k) {
                        model.entries.remove(p);
                    }
                }
                prop_assert!(!sut.contains_key(k.as_str()));
            }
            OpI::Contains(s) => {
                prop_assert_eq!(sut.contains_key(s.as_str()), model.position(&s).is_some());
            }
            OpI::Snapshot => {
                let seen: Vec<String> = sut
                    .live_entries()
                    .into_iter()
                    .map(|(_, k)| (*k).clone())
                    .collect();
                let expected: Vec<String> = model.entries.iter().map(|(k, _)| k.clone()).collect();
                prop_assert_eq!(seen, expected);
                prop_assert_eq!(sut.slot_count(), model.entries.len());
            }
            OpI::Sweep => {
                sut.sweep();
                prop_assert_eq!(sut.slot_count(), model.entries.len());
            }
        }

        prop_assert_eq!(sut.len(), model.entries.len());
        prop_assert_eq!(sut.is_empty(), model.entries.is_empty());
        prop_assert!(sut.slot_count() >= sut.len());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(WeakTable::new(), &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: Same invariants under worst-case collisions, where dead and live
// entries share one probe sequence.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(WeakTable::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}
