use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};

use crate::engine::transform::engine::TableHandle;
use crate::engine::transform::spec::{AggregateSpec, ColumnFilter, SortConstraint};

/// Stable identity of a registered background computation. Assigned once,
/// never reused while the task is registered.
pub type TaskId = u64;

/// Logical identity of a result table as consumers refer to it.
pub type TableId = String;

/// Equal-width binning request attached to a column aggregate. The scheduler
/// expands this into the two-phase stats-then-bin transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinningRequest {
    pub bin_count: u32,
}

#[derive(Debug, Clone)]
pub enum TaskKind {
    Filter {
        table: TableId,
        filters: Vec<ColumnFilter>,
        /// Epoch stamped on the produced filtered table, so dependent
        /// aggregates can tell which filter generation they saw.
        epoch: u64,
    },
    Order {
        table: TableId,
        order_by: Vec<SortConstraint>,
    },
    TableAggregate {
        table: TableId,
        aggregates: Vec<AggregateSpec>,
    },
    ColumnAggregate {
        table: TableId,
        column: String,
        aggregates: Vec<AggregateSpec>,
        binning: Option<BinningRequest>,
    },
    FilteredColumnAggregate {
        table: TableId,
        column: String,
        aggregates: Vec<AggregateSpec>,
        binning: Option<BinningRequest>,
        /// Filter generation this aggregate expects; falls back to the base
        /// table when the cached filtered table is from another generation.
        filter_epoch: u64,
    },
    SystemColumnCompute {
        table: TableId,
        alias: String,
    },
}

impl TaskKind {
    pub fn table(&self) -> &str {
        match self {
            TaskKind::Filter { table, .. }
            | TaskKind::Order { table, .. }
            | TaskKind::TableAggregate { table, .. }
            | TaskKind::ColumnAggregate { table, .. }
            | TaskKind::FilteredColumnAggregate { table, .. }
            | TaskKind::SystemColumnCompute { table, .. } => table,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Filter { .. } => "filter",
            TaskKind::Order { .. } => "order",
            TaskKind::TableAggregate { .. } => "table-aggregate",
            TaskKind::ColumnAggregate { .. } => "column-aggregate",
            TaskKind::FilteredColumnAggregate { .. } => "filtered-column-aggregate",
            TaskKind::SystemColumnCompute { .. } => "system-column-compute",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Progress record replaced wholesale by `update_progress`.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
}

impl TaskProgress {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
            failed_at: None,
            failure: None,
        }
    }

    pub fn running(mut self) -> Self {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        self
    }

    pub fn succeeded(mut self) -> Self {
        self.status = TaskStatus::Succeeded;
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn failed(mut self, detail: impl Into<String>) -> Self {
        self.status = TaskStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.failure = Some(detail.into());
        self
    }
}

/// Kind-specific successful result of a task.
#[derive(Debug, Clone)]
pub enum TaskOutput {
    /// New table held by the engine (filter, order, system column).
    Table(TableHandle),
    /// Small aggregate table read back from the engine.
    Aggregate(RecordBatch),
}
