use rustc_hash::FxHashSet;

use crate::engine::tasks::descriptor::TaskId;

/// One reconciliation pass over the registry snapshot.
///
/// Returns the updated launched set and the tasks to start, in registration
/// order. A task id enters the launched set at most once per registration,
/// which is what guarantees at-most-one concurrent execution per identity;
/// ids that left the registry are dropped so the set cannot grow unbounded.
pub fn reconcile(
    pending: &[TaskId],
    mut launched: FxHashSet<TaskId>,
) -> (FxHashSet<TaskId>, Vec<TaskId>) {
    let current: FxHashSet<TaskId> = pending.iter().copied().collect();
    launched.retain(|id| current.contains(id));

    let mut to_start = Vec::new();
    for &id in pending {
        if launched.insert(id) {
            to_start.push(id);
        }
    }
    (launched, to_start)
}
