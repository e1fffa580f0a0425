// Shared test observer.
//
// `Probe` answers to "update" and "trigger", records every method it is
// notified through, and compares by `id` only, so two probes with the same id
// are "the same observer" as far as the registries are concerned.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::convert::Infallible;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use weak_observable::{Backrefs, Callback, HubObserver, Observer, Receive};

pub struct Probe {
    pub id: u32,
    ret: i32,
    methods: &'static [&'static str],
    calls: Mutex<Vec<String>>,
    backrefs: Backrefs<Probe>,
}

impl Probe {
    pub fn new(id: u32, ret: i32) -> Arc<Self> {
        Arc::new(Self {
            id,
            ret,
            methods: &["update", "trigger"],
            calls: Mutex::new(Vec::new()),
            backrefs: Backrefs::new(),
        })
    }

    /// A probe that answers to no method at all.
    pub fn mute(id: u32) -> Arc<Self> {
        Arc::new(Self {
            id,
            ret: 0,
            methods: &[],
            calls: Mutex::new(Vec::new()),
            backrefs: Backrefs::new(),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn backref_count(&self) -> usize {
        self.backrefs.len()
    }

    fn record(&self, method: &str) {
        self.calls.lock().push(method.to_string());
    }
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Probe({})", self.id)
    }
}

impl PartialEq for Probe {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Probe {}
impl Hash for Probe {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Observer for Probe {
    fn responds_to(&self, method: &str) -> bool {
        self.methods.iter().any(|m| *m == method)
    }
}

impl HubObserver for Probe {
    fn backrefs(&self) -> &Backrefs<Self> {
        &self.backrefs
    }
}

// No arguments: return the configured value.
impl Receive<()> for Probe {
    type Output = i32;
    type Error = Infallible;

    fn receive(
        &self,
        method: &str,
        _args: &(),
        _callback: Option<&Callback<'_, (), i32>>,
    ) -> Result<i32, Infallible> {
        self.record(method);
        Ok(self.ret)
    }
}

// A pair of arguments: hand them to the callback when there is one.
impl Receive<(i32, i32)> for Probe {
    type Output = i32;
    type Error = Infallible;

    fn receive(
        &self,
        method: &str,
        args: &(i32, i32),
        callback: Option<&Callback<'_, (i32, i32), i32>>,
    ) -> Result<i32, Infallible> {
        self.record(method);
        Ok(match callback {
            Some(cb) => cb(args),
            None => self.ret,
        })
    }
}

// A single argument: fail when it equals this probe's id.
impl Receive<i32> for Probe {
    type Output = i32;
    type Error = String;

    fn receive(
        &self,
        method: &str,
        args: &i32,
        _callback: Option<&Callback<'_, i32, i32>>,
    ) -> Result<i32, String> {
        self.record(method);
        if *args == self.id as i32 {
            return Err(format!("probe {} refused {}", self.id, args));
        }
        Ok(self.ret)
    }
}
