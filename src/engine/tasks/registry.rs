use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::engine::tasks::deferred::{DeferredResult, TaskResult, TaskTicket};
use crate::engine::tasks::descriptor::{
    TableId, TaskId, TaskKind, TaskOutput, TaskProgress, TaskStatus,
};
use crate::engine::transform::engine::TableHandle;

const LOG_TARGET: &str = "engine::tasks::registry";

struct TaskEntry {
    kind: TaskKind,
    progress: TaskProgress,
    settle: Option<DeferredResult>,
}

/// Latest successful result per kind and table, readable without a task.
#[derive(Default)]
struct ResultCache {
    filtered: FxHashMap<TableId, (TableHandle, u64)>,
    ordered: FxHashMap<TableId, TableHandle>,
    table_aggregates: FxHashMap<TableId, RecordBatch>,
    column_aggregates: FxHashMap<(TableId, String), RecordBatch>,
    system_columns: FxHashMap<(TableId, String), TableHandle>,
}

#[derive(Default)]
struct RegistryInner {
    // Insertion-ordered so the scheduler launches tasks in registration order.
    tasks: IndexMap<TaskId, TaskEntry>,
    cache: ResultCache,
    tables: FxHashMap<TableId, TableHandle>,
}

/// Authoritative store of in-flight background computations. Mutated only
/// through the registry actions; the scheduler observes it level-triggered.
pub struct TaskRegistry {
    next_id: AtomicU64,
    wake: Notify,
    inner: RwLock<RegistryInner>,
}

impl TaskRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(0),
            wake: Notify::new(),
            inner: RwLock::new(RegistryInner::default()),
        })
    }

    /// Binds the source columnar table a task kind refers to by logical id.
    pub fn bind_table(&self, table: impl Into<TableId>, handle: TableHandle) {
        self.inner.write().tables.insert(table.into(), handle);
    }

    pub fn table_handle(&self, table: &str) -> Option<TableHandle> {
        self.inner.read().tables.get(table).copied()
    }

    /// Adds a pending task and hands back its identity and deferred result.
    pub fn register(&self, kind: TaskKind) -> (TaskId, TaskTicket) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (settle, ticket) = DeferredResult::channel();
        {
            let mut inner = self.inner.write();
            inner.tasks.insert(
                id,
                TaskEntry {
                    kind,
                    progress: TaskProgress::pending(),
                    settle: Some(settle),
                },
            );
        }
        debug!(target: LOG_TARGET, task_id = id, "Task registered");
        self.wake.notify_one();
        (id, ticket)
    }

    /// Replaces a task's progress record. Updates for unknown identities are
    /// logged and ignored.
    pub fn update_progress(&self, id: TaskId, progress: TaskProgress) {
        let mut inner = self.inner.write();
        match inner.tasks.get_mut(&id) {
            Some(entry) => entry.progress = progress,
            None => {
                warn!(target: LOG_TARGET, task_id = id, "Progress update for unknown task");
            }
        }
    }

    /// Records a kind-specific successful result into the cache.
    pub fn mark_succeeded(&self, kind: &TaskKind, output: &TaskOutput) {
        let mut inner = self.inner.write();
        let cache = &mut inner.cache;
        match (kind, output) {
            (TaskKind::Filter { table, epoch, .. }, TaskOutput::Table(handle)) => {
                cache.filtered.insert(table.clone(), (*handle, *epoch));
            }
            (TaskKind::Order { table, .. }, TaskOutput::Table(handle)) => {
                cache.ordered.insert(table.clone(), *handle);
            }
            (TaskKind::TableAggregate { table, .. }, TaskOutput::Aggregate(batch)) => {
                cache.table_aggregates.insert(table.clone(), batch.clone());
            }
            (TaskKind::ColumnAggregate { table, column, .. }, TaskOutput::Aggregate(batch))
            | (
                TaskKind::FilteredColumnAggregate { table, column, .. },
                TaskOutput::Aggregate(batch),
            ) => {
                cache
                    .column_aggregates
                    .insert((table.clone(), column.clone()), batch.clone());
            }
            (TaskKind::SystemColumnCompute { table, alias }, TaskOutput::Table(handle)) => {
                cache
                    .system_columns
                    .insert((table.clone(), alias.clone()), *handle);
            }
            _ => {
                warn!(
                    target: LOG_TARGET,
                    kind = kind.label(),
                    "Mismatched output shape for succeeded task"
                );
            }
        }
    }

    /// Removes a settled or abandoned task.
    pub fn unregister(&self, id: TaskId) {
        let removed = self.inner.write().tasks.shift_remove(&id).is_some();
        if removed {
            debug!(target: LOG_TARGET, task_id = id, "Task unregistered");
            self.wake.notify_one();
        } else {
            warn!(target: LOG_TARGET, task_id = id, "Unregister for unknown task");
        }
    }

    /// Settles the task's deferred result. A task already unregistered, or
    /// settled once before, is a logged no-op.
    pub(crate) fn settle(&self, id: TaskId, result: TaskResult) {
        let settle = {
            let mut inner = self.inner.write();
            inner.tasks.get_mut(&id).and_then(|entry| entry.settle.take())
        };
        match settle {
            Some(deferred) => deferred.settle(result),
            None => {
                debug!(target: LOG_TARGET, task_id = id, "Settle after unregistration ignored");
            }
        }
    }

    /// Registered task ids in registration order.
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.inner.read().tasks.keys().copied().collect()
    }

    pub fn kind(&self, id: TaskId) -> Option<TaskKind> {
        self.inner.read().tasks.get(&id).map(|e| e.kind.clone())
    }

    pub fn progress(&self, id: TaskId) -> Option<TaskProgress> {
        self.inner.read().tasks.get(&id).map(|e| e.progress.clone())
    }

    /// Removes every failed task in one sweep; callers that do not track
    /// individual failures can rely on this instead of `unregister`.
    pub fn sweep_failed(&self) -> usize {
        let mut inner = self.inner.write();
        let before = inner.tasks.len();
        inner
            .tasks
            .retain(|_, entry| entry.progress.status != TaskStatus::Failed);
        let swept = before - inner.tasks.len();
        if swept > 0 {
            debug!(target: LOG_TARGET, swept, "Swept failed tasks");
            self.wake.notify_one();
        }
        swept
    }

    /// Parks until the pending set changes. A change that raced ahead of the
    /// wait resolves immediately.
    pub async fn changed(&self) {
        self.wake.notified().await;
    }

    pub fn latest_filtered(&self, table: &str) -> Option<(TableHandle, u64)> {
        self.inner.read().cache.filtered.get(table).copied()
    }

    pub fn latest_ordered(&self, table: &str) -> Option<TableHandle> {
        self.inner.read().cache.ordered.get(table).copied()
    }

    pub fn latest_table_aggregate(&self, table: &str) -> Option<RecordBatch> {
        self.inner.read().cache.table_aggregates.get(table).cloned()
    }

    pub fn latest_column_aggregate(&self, table: &str, column: &str) -> Option<RecordBatch> {
        self.inner
            .read()
            .cache
            .column_aggregates
            .get(&(table.to_string(), column.to_string()))
            .cloned()
    }

    pub fn latest_system_column(&self, table: &str, alias: &str) -> Option<TableHandle> {
        self.inner
            .read()
            .cache
            .system_columns
            .get(&(table.to_string(), alias.to_string()))
            .copied()
    }
}
