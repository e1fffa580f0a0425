// Threaded stress tests.
//
// Invariants exercised:
// - Concurrent add/notify never duplicates an observer; each notify sees a
//   consistent population. While adders only add, the result count lies
//   between len() just before and just after the call, and never shrinks
//   across one notifier's calls.
// - Concurrent hub adds for one key share a single observable.
// - A notify callback that re-enters the hub does not deadlock against a
//   concurrent Hub::add for the same key.
// - WeakSet stays consistent under concurrent add/delete of equal members.
mod support;

use std::collections::HashSet;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use support::Probe;
use weak_observable::{Callback, Hub, Observable, WeakSet};

const ADDERS: u32 = 8;
const PER_ADDER: u32 = 25;
const NOTIFIERS: usize = 4;

#[test]
fn concurrent_add_and_notify() {
    let obs: Observable<Probe> = Observable::new();
    let total = (ADDERS * PER_ADDER) as usize;

    let held: Vec<Arc<Probe>> = thread::scope(|scope| {
        let adders: Vec<_> = (0..ADDERS)
            .map(|t| {
                let obs = &obs;
                scope.spawn(move || {
                    (0..PER_ADDER)
                        .map(|i| {
                            let id = t * PER_ADDER + i;
                            let o = Probe::new(id, id as i32);
                            obs.add(&o).unwrap();
                            // Re-adding must not duplicate.
                            obs.add(&o).unwrap();
                            o
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for _ in 0..NOTIFIERS {
            let obs = &obs;
            scope.spawn(move || {
                let mut last = 0;
                for _ in 0..20 {
                    let before = obs.len();
                    let results = obs.notify(&()).unwrap();
                    let after = obs.len();
                    assert!(
                        before <= results.len() && results.len() <= after,
                        "notified {} observers, len went {} -> {}",
                        results.len(),
                        before,
                        after
                    );
                    assert!(results.len() >= last, "a live observer was skipped");
                    assert!(results.len() <= total);
                    let distinct: HashSet<i32> = results.iter().copied().collect();
                    assert_eq!(distinct.len(), results.len(), "observer notified twice");
                    last = results.len();
                }
            });
        }

        adders
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let results = obs.notify(&()).unwrap();
    assert_eq!(results.len(), total);
    assert_eq!(obs.len(), total);
    drop(held);
    assert!(obs.notify(&()).unwrap().is_empty());
}

#[test]
fn concurrent_hub_adds_share_one_observable() {
    let hub: Hub<u64, Probe> = Hub::new();

    let held: Vec<Arc<Probe>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..ADDERS)
            .map(|t| {
                let hub = &hub;
                scope.spawn(move || {
                    let o = Probe::new(t, 1);
                    hub.add(7, &o).unwrap();
                    o
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(hub.len(), 1);
    assert_eq!(hub.notify(&7, &()).unwrap().len(), ADDERS as usize);
    assert!(held.iter().all(|o| o.call_count() == 1));
}

#[test]
fn hub_reentry_from_callback_while_another_thread_adds() {
    let hub: Arc<Hub<u64, Probe>> = Arc::new(Hub::new());
    let first = Probe::new(1, 1);
    let extra = Probe::new(2, 2);
    let late = Probe::new(3, 3);
    hub.add(1, &first).unwrap();

    let (entered_tx, entered_rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel();

    let notifier = {
        let hub = Arc::clone(&hub);
        let extra = Arc::clone(&extra);
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            let reenter: &Callback<'_, (i32, i32), i32> = &|_| {
                let _ = entered_tx.send(());
                // Give the other thread time to queue up on the hub.
                thread::sleep(Duration::from_millis(200));
                hub.add(2, &extra).unwrap();
                0
            };
            let results = hub.notify_with(&1, &(0, 0), Some(reenter)).unwrap();
            let _ = done_tx.send(results.len());
        })
    };

    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("callback never ran");
    let adder = {
        let hub = Arc::clone(&hub);
        let late = Arc::clone(&late);
        thread::spawn(move || {
            hub.add(1, &late).unwrap();
            let _ = done_tx.send(0);
        })
    };

    for _ in 0..2 {
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("hub add and notify deadlocked");
    }
    notifier.join().unwrap();
    adder.join().unwrap();

    assert_eq!(hub.notify(&2, &()).unwrap(), vec![2]);
    let mut on_first = hub.notify(&1, &()).unwrap();
    on_first.sort_unstable();
    assert_eq!(on_first, vec![1, 3]);
}

#[test]
fn concurrent_weak_set_add_delete() {
    let set: WeakSet<u32> = WeakSet::new();
    let members: Vec<Arc<u32>> = (0..64).map(Arc::new).collect();

    thread::scope(|scope| {
        for t in 0..4 {
            let set = &set;
            let members = &members;
            scope.spawn(move || {
                for (i, m) in members.iter().enumerate() {
                    if (i + t) % 2 == 0 {
                        set.add(m);
                    } else {
                        set.delete(&**m);
                    }
                }
            });
        }
    });

    let seen: Vec<u32> = set.iter().map(|m| *m).collect();
    let distinct: HashSet<u32> = seen.iter().copied().collect();
    assert_eq!(distinct.len(), seen.len());
    assert_eq!(set.len(), seen.len());
}
