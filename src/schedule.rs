//! Priority-bucketed, frequency-gated schedule
//!
//! Systems are grouped by priority; buckets are traversed in ascending
//! order. Each system with an execute capability carries a counter that is
//! bumped every tick and gates the system on `counter % frequency == 0`.

use std::any::TypeId;
use std::collections::BTreeMap;

use crate::system::{BoxedSystem, SystemDescriptor};

/// Per-system execute state
pub(crate) struct ExecuteState {
    pub(crate) frequency: u32,
    pub(crate) priority: i32,
    pub(crate) counter: u64,
}

/// A registered system plus its scheduling state
pub(crate) struct SystemEntry {
    pub(crate) sid: u64,
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) system: BoxedSystem,
    pub(crate) init: bool,
    pub(crate) end: bool,
    pub(crate) execute: Option<ExecuteState>,
    priority: i32,
}

/// System add/remove submitted while a tick may be in flight; applied at
/// bucket boundaries.
pub(crate) enum ScheduleOp {
    Add(BoxedSystem, TypeId),
    Remove(TypeId),
}

/// Buckets of systems ordered by priority.
///
/// Plans are lists of stable system ids, one inner list per bucket, so a
/// removal at a bucket boundary cannot shift what a later bucket refers to.
pub(crate) struct Schedule {
    entries: Vec<SystemEntry>,
    next_sid: u64,
}

impl Schedule {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_sid: 0,
        }
    }

    /// Register a system. Re-adding a system type replaces the previous
    /// instance and resets its counters.
    pub(crate) fn insert(&mut self, system: BoxedSystem, type_id: TypeId) {
        self.remove(type_id);
        let descriptor: SystemDescriptor = system.descriptor();
        let sid = self.next_sid;
        self.next_sid += 1;
        self.entries.push(SystemEntry {
            sid,
            type_id,
            name: descriptor.name,
            system,
            init: descriptor.init,
            end: descriptor.end,
            execute: descriptor.execute.map(|spec| ExecuteState {
                frequency: spec.frequency.max(1),
                priority: spec.priority,
                counter: 0,
            }),
            priority: descriptor.priority(),
        });
    }

    pub(crate) fn remove(&mut self, type_id: TypeId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.type_id != type_id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Buckets of init-capable systems, ascending priority
    pub(crate) fn init_plan(&self) -> Vec<Vec<u64>> {
        self.plan_of(|entry| entry.init)
    }

    /// Buckets of end-capable systems, ascending priority
    pub(crate) fn end_plan(&self) -> Vec<Vec<u64>> {
        self.plan_of(|entry| entry.end)
    }

    /// Advance every execute counter and collect the due systems into
    /// ascending priority buckets.
    pub(crate) fn tick_plan(&mut self) -> Vec<Vec<u64>> {
        let mut buckets: BTreeMap<i32, Vec<u64>> = BTreeMap::new();
        for entry in &mut self.entries {
            if let Some(execute) = &mut entry.execute {
                execute.counter += 1;
                if execute.counter % execute.frequency as u64 == 0 {
                    buckets.entry(execute.priority).or_default().push(entry.sid);
                }
            }
        }
        buckets.into_values().collect()
    }

    fn plan_of(&self, capability: impl Fn(&SystemEntry) -> bool) -> Vec<Vec<u64>> {
        let mut buckets: BTreeMap<i32, Vec<u64>> = BTreeMap::new();
        for entry in &self.entries {
            if capability(entry) {
                buckets.entry(entry.priority).or_default().push(entry.sid);
            }
        }
        buckets.into_values().collect()
    }

    pub(crate) fn index_of(&self, sid: u64) -> Option<usize> {
        self.entries.iter().position(|entry| entry.sid == sid)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [SystemEntry] {
        &mut self.entries
    }
}
