//! Bucket executor
//!
//! Drives a phase plan over the schedule: buckets run in ascending priority
//! order, systems within a bucket fan out over rayon when the world allows
//! it, and the executor joins every bucket before starting the next one.
//! System add/remove submitted mid-tick is applied at the bucket boundary.

use crate::schedule::{Schedule, SystemEntry};
use crate::world::World;

/// Which system body a phase invokes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhaseKind {
    Init,
    Execute,
    End,
}

/// Run every bucket of `plan`, joining between buckets.
pub(crate) fn run_phase(world: &World, schedule: &mut Schedule, plan: Vec<Vec<u64>>, kind: PhaseKind) {
    for bucket in plan {
        run_bucket(world, schedule, &bucket, kind);
        // Bucket boundary: the system set may change here, the plan's stable
        // ids keep later buckets valid.
        world.drain_pending_systems(schedule);
    }
}

fn run_bucket(world: &World, schedule: &mut Schedule, sids: &[u64], kind: PhaseKind) {
    let indices: Vec<usize> = sids
        .iter()
        .filter_map(|&sid| schedule.index_of(sid))
        .collect();

    #[cfg(feature = "parallel")]
    if world.parallel_enabled() && indices.len() > 1 {
        use rayon::prelude::*;

        // Convert the entries pointer to usize so it can cross thread
        // boundaries as an opaque handle.
        let entries_ptr = schedule.entries_mut().as_mut_ptr() as usize;

        let run = |index: usize| {
            // SAFETY: each index is unique within the bucket, so every
            // thread gets exclusive access to its own SystemEntry; the
            // entries vector is not resized while the bucket runs (pending
            // schedule ops are only applied at bucket boundaries).
            let entry = unsafe { &mut *(entries_ptr as *mut SystemEntry).add(index) };
            dispatch(world, entry, kind);
        };

        match world.thread_pool() {
            Some(pool) => pool.install(|| indices.par_iter().for_each(|&i| run(i))),
            None => indices.par_iter().for_each(|&i| run(i)),
        }
        return;
    }

    for &index in &indices {
        let entry = &mut schedule.entries_mut()[index];
        dispatch(world, entry, kind);
    }
}

/// Invoke one system body; a failure goes to the error sink and never
/// cancels siblings.
fn dispatch(world: &World, entry: &mut SystemEntry, kind: PhaseKind) {
    let result = match kind {
        PhaseKind::Init => entry.system.init(world),
        PhaseKind::Execute => entry.system.execute(world),
        PhaseKind::End => entry.system.end(world),
    };
    if let Err(error) = result {
        world.report_system_error(entry.name, error);
    }
}
