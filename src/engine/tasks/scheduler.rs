use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashSet;
use tracing::{debug, error, info, warn};

use crate::engine::tasks::descriptor::{TaskId, TaskKind, TaskOutput, TaskProgress};
use crate::engine::tasks::error::TaskError;
use crate::engine::tasks::reconcile::reconcile;
use crate::engine::tasks::registry::TaskRegistry;
use crate::engine::transform::client::TransformClient;
use crate::engine::transform::engine::TableHandle;
use crate::engine::transform::error::TransformError;
use crate::engine::transform::spec::{
    AggregateFn, AggregateSpec, BinningSpec, GroupBySpec, GroupKey, TransformSpec,
};

const LOG_TARGET: &str = "engine::tasks::scheduler";

const STATS_MIN_ALIAS: &str = "__stat_min";
const STATS_MAX_ALIAS: &str = "__stat_max";
const BIN_INDEX_ALIAS: &str = "bin";
const BIN_WIDTH_ALIAS: &str = "bin_width";
const BIN_LOWER_ALIAS: &str = "bin_lower";
const BIN_UPPER_ALIAS: &str = "bin_upper";

/// Level-triggered reconciliation loop over the task registry. Launches each
/// newly registered task exactly once and reports terminal state back.
pub struct ComputationScheduler {
    registry: Arc<TaskRegistry>,
    client: Arc<TransformClient>,
    launched: FxHashSet<TaskId>,
}

impl ComputationScheduler {
    pub fn new(registry: Arc<TaskRegistry>, client: Arc<TransformClient>) -> Self {
        Self {
            registry,
            client,
            launched: FxHashSet::default(),
        }
    }

    /// Runs until the owning runtime drops the future. Each pass snapshots
    /// the registry, reconciles against the launched set, and spawns one
    /// processing future per new task; completion order is not launch order.
    pub async fn run(mut self) {
        info!(target: LOG_TARGET, "Computation scheduler started");
        loop {
            self.pass();
            self.registry.changed().await;
        }
    }

    fn pass(&mut self) {
        let pending = self.registry.pending_ids();
        let launched = std::mem::take(&mut self.launched);
        let (launched, to_start) = reconcile(&pending, launched);
        self.launched = launched;

        for id in to_start {
            debug!(target: LOG_TARGET, task_id = id, "Launching task");
            tokio::spawn(process_task(
                Arc::clone(&self.registry),
                Arc::clone(&self.client),
                id,
            ));
        }
    }
}

/// Drives one task to a terminal state. Failures become registry state and a
/// rejected deferred result; they never cross back into the scheduler loop.
async fn process_task(registry: Arc<TaskRegistry>, client: Arc<TransformClient>, id: TaskId) {
    let Some(kind) = registry.kind(id) else {
        warn!(target: LOG_TARGET, task_id = id, "Task vanished before launch");
        return;
    };

    let progress = registry.progress(id).unwrap_or_else(TaskProgress::pending);
    registry.update_progress(id, progress.running());
    let started = Instant::now();

    match run_kind(&registry, &client, &kind).await {
        Ok(output) => {
            info!(
                target: LOG_TARGET,
                task_id = id,
                kind = kind.label(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Task completed"
            );
            registry.mark_succeeded(&kind, &output);
            registry.settle(id, Ok(output));
            registry.unregister(id);
        }
        Err(err) => {
            error!(
                target: LOG_TARGET,
                task_id = id,
                kind = kind.label(),
                error = %err,
                "Task failed"
            );
            let progress = registry.progress(id).unwrap_or_else(TaskProgress::pending);
            registry.update_progress(id, progress.failed(err.to_string()));
            registry.settle(id, Err(TaskError::Failed(err.to_string())));
            // The task stays registered so the owner can observe the failure.
        }
    }
}

async fn run_kind(
    registry: &TaskRegistry,
    client: &TransformClient,
    kind: &TaskKind,
) -> Result<TaskOutput, TransformError> {
    match kind {
        TaskKind::Filter { table, filters, .. } => {
            let source = source_handle(registry, table)?;
            let spec = TransformSpec {
                filters: filters.clone(),
                ..TransformSpec::default()
            };
            Ok(TaskOutput::Table(client.apply(source, &spec, None).await?))
        }
        TaskKind::Order { table, order_by } => {
            let source = source_handle(registry, table)?;
            let spec = TransformSpec {
                order_by: order_by.clone(),
                ..TransformSpec::default()
            };
            Ok(TaskOutput::Table(client.apply(source, &spec, None).await?))
        }
        TaskKind::TableAggregate { table, aggregates } => {
            let source = source_handle(registry, table)?;
            aggregate(client, source, Vec::new(), aggregates.clone()).await
        }
        TaskKind::ColumnAggregate {
            table,
            column,
            aggregates,
            binning,
        } => {
            let source = source_handle(registry, table)?;
            column_aggregate(client, source, column, aggregates, binning.as_ref()).await
        }
        TaskKind::FilteredColumnAggregate {
            table,
            column,
            aggregates,
            binning,
            filter_epoch,
        } => {
            // Aggregate over the cached filtered table when it is from the
            // expected filter generation, otherwise over the base table.
            let source = match registry.latest_filtered(table) {
                Some((handle, epoch)) if epoch == *filter_epoch => handle,
                _ => source_handle(registry, table)?,
            };
            column_aggregate(client, source, column, aggregates, binning.as_ref()).await
        }
        TaskKind::SystemColumnCompute { table, alias } => {
            let source = source_handle(registry, table)?;
            let spec = TransformSpec {
                row_number: Some(alias.clone()),
                ..TransformSpec::default()
            };
            Ok(TaskOutput::Table(client.apply(source, &spec, None).await?))
        }
    }
}

async fn column_aggregate(
    client: &TransformClient,
    source: TableHandle,
    column: &str,
    aggregates: &[AggregateSpec],
    binning: Option<&crate::engine::tasks::descriptor::BinningRequest>,
) -> Result<TaskOutput, TransformError> {
    match binning {
        None => aggregate(client, source, Vec::new(), aggregates.to_vec()).await,
        Some(request) => {
            // Phase one: min/max stats over the column.
            let stats_spec = TransformSpec {
                group_by: Some(GroupBySpec {
                    keys: Vec::new(),
                    aggregates: vec![
                        AggregateSpec {
                            field: Some(column.to_string()),
                            alias: STATS_MIN_ALIAS.to_string(),
                            func: AggregateFn::Min,
                        },
                        AggregateSpec {
                            field: Some(column.to_string()),
                            alias: STATS_MAX_ALIAS.to_string(),
                            func: AggregateFn::Max,
                        },
                    ],
                }),
                ..TransformSpec::default()
            };
            let stats = client.apply(source, &stats_spec, None).await?;

            // Phase two: equal-width bins bounded by the stats table.
            let bin_spec = TransformSpec {
                group_by: Some(GroupBySpec {
                    keys: vec![GroupKey {
                        field: column.to_string(),
                        binning: Some(BinningSpec {
                            stats_min_field: STATS_MIN_ALIAS.to_string(),
                            stats_max_field: STATS_MAX_ALIAS.to_string(),
                            bin_count: request.bin_count,
                            index_alias: BIN_INDEX_ALIAS.to_string(),
                            width_alias: BIN_WIDTH_ALIAS.to_string(),
                            lower_alias: BIN_LOWER_ALIAS.to_string(),
                            upper_alias: BIN_UPPER_ALIAS.to_string(),
                        }),
                    }],
                    aggregates: aggregates.to_vec(),
                }),
                ..TransformSpec::default()
            };
            let handle = client.apply(source, &bin_spec, Some(stats)).await?;
            Ok(TaskOutput::Aggregate(client.read_table(handle).await?))
        }
    }
}

async fn aggregate(
    client: &TransformClient,
    source: TableHandle,
    keys: Vec<GroupKey>,
    aggregates: Vec<AggregateSpec>,
) -> Result<TaskOutput, TransformError> {
    let spec = TransformSpec {
        group_by: Some(GroupBySpec { keys, aggregates }),
        ..TransformSpec::default()
    };
    let handle = client.apply(source, &spec, None).await?;
    Ok(TaskOutput::Aggregate(client.read_table(handle).await?))
}

fn source_handle(registry: &TaskRegistry, table: &str) -> Result<TableHandle, TransformError> {
    registry
        .table_handle(table)
        .ok_or_else(|| TransformError::UnboundTable(table.to_string()))
}
