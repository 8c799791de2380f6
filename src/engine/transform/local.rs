use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Date64Array, Float32Array, Float64Array,
    Int8Array, Int16Array, Int32Array, Int64Array, StringArray, Time32MillisecondArray,
    TimestampMillisecondArray, UInt32Array,
};
use arrow::compute::{self, SortColumn, SortOptions, lexsort_to_indices};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::debug;

use crate::engine::transform::engine::{TableHandle, TransformEngine};
use crate::engine::transform::error::TransformError;
use crate::engine::transform::spec::{
    AggregateFn, AggregateSpec, BinningSpec, ColumnFilter, FilterOp, FilterValue, GroupBySpec,
    GroupKey, SortConstraint, TransformSpec,
};
use crate::engine::transform::wire::{self, TransformReply};

const LOG_TARGET: &str = "engine::transform::local";

/// In-process transform engine backing the demo transport and tests. Holds
/// result tables in memory, keyed by handle.
#[derive(Default)]
pub struct LocalEngine {
    tables: DashMap<u64, RecordBatch>,
    next_handle: AtomicU64,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a columnar batch and returns its handle, the identity used in
    /// subsequent transform requests.
    pub fn register_batch(&self, batch: RecordBatch) -> TableHandle {
        self.store(batch)
    }

    fn store(&self, batch: RecordBatch) -> TableHandle {
        let handle = self.next_handle.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        self.tables.insert(handle, batch);
        TableHandle(handle)
    }

    fn batch(&self, handle: TableHandle) -> Result<RecordBatch, TransformError> {
        self.tables
            .get(&handle.0)
            .map(|entry| entry.value().clone())
            .ok_or(TransformError::UnknownHandle(handle.0))
    }
}

#[async_trait]
impl TransformEngine for LocalEngine {
    async fn submit(
        &self,
        source: TableHandle,
        spec: &[u8],
        stats: Option<TableHandle>,
    ) -> Result<Vec<u8>, TransformError> {
        let spec = wire::decode_spec(spec)?;
        let source = self.batch(source)?;
        let stats = match stats {
            Some(handle) => Some(self.batch(handle)?),
            None => None,
        };

        let result = apply_pipeline(source, &spec, stats.as_ref())?;
        let row_count = result.num_rows() as u64;
        let handle = self.store(result);
        debug!(
            target: LOG_TARGET,
            handle = handle.0,
            rows = row_count,
            "Transform applied"
        );
        wire::encode_reply(&TransformReply {
            handle: handle.0,
            row_count,
        })
        .map_err(TransformError::from)
    }

    async fn read_table(&self, handle: TableHandle) -> Result<RecordBatch, TransformError> {
        self.batch(handle)
    }
}

fn apply_pipeline(
    batch: RecordBatch,
    spec: &TransformSpec,
    stats: Option<&RecordBatch>,
) -> Result<RecordBatch, TransformError> {
    let mut batch = batch;
    // Row numbers are assigned over the source order, before filtering.
    if let Some(alias) = &spec.row_number {
        batch = append_row_numbers(&batch, alias)?;
    }
    if !spec.filters.is_empty() {
        let keep = filter_indices(&batch, &spec.filters)?;
        batch = take_rows(&batch, &UInt32Array::from(keep))?;
    }
    if let Some(group) = &spec.group_by {
        batch = group_aggregate(&batch, group, stats)?;
    }
    if !spec.order_by.is_empty() {
        let order = sort_indices(&batch, &spec.order_by)?;
        batch = take_rows(&batch, &order)?;
    }
    if let Some(projection) = &spec.projection {
        batch = project(&batch, projection)?;
    }
    Ok(batch)
}

fn append_row_numbers(batch: &RecordBatch, alias: &str) -> Result<RecordBatch, TransformError> {
    let mut fields: Vec<FieldRef> = batch.schema().fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(alias, DataType::Int64, false)));
    let mut columns = batch.columns().to_vec();
    columns.push(Arc::new(Int64Array::from_iter_values(
        1..=batch.num_rows() as i64,
    )) as ArrayRef);
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

fn filter_indices(
    batch: &RecordBatch,
    filters: &[ColumnFilter],
) -> Result<Vec<u32>, TransformError> {
    let columns = filters
        .iter()
        .map(|filter| column(batch, &filter.field))
        .collect::<Result<Vec<_>, _>>()?;

    let mut keep = Vec::new();
    'rows: for row in 0..batch.num_rows() {
        for (filter, col) in filters.iter().zip(&columns) {
            let actual = scalar_at(col, row)?;
            if !eval_filter(filter.op, &filter.value, actual.as_ref()) {
                continue 'rows;
            }
        }
        keep.push(row as u32);
    }
    Ok(keep)
}

fn eval_filter(op: FilterOp, expected: &FilterValue, actual: Option<&Scalar>) -> bool {
    match op {
        FilterOp::IsNull => return actual.is_none(),
        FilterOp::NotNull => return actual.is_some(),
        _ => {}
    }
    // Null rows never satisfy a value predicate.
    let Some(actual) = actual else {
        return false;
    };
    match op {
        FilterOp::Eq => scalar_eq(actual, expected),
        FilterOp::NotEq => !scalar_eq(actual, expected),
        FilterOp::Lt => matches!(scalar_cmp(actual, expected), Some(Ordering::Less)),
        FilterOp::LtEq => matches!(
            scalar_cmp(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOp::Gt => matches!(scalar_cmp(actual, expected), Some(Ordering::Greater)),
        FilterOp::GtEq => matches!(
            scalar_cmp(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOp::Between => in_range(actual, expected).unwrap_or(false),
        FilterOp::NotBetween => in_range(actual, expected).map(|b| !b).unwrap_or(false),
        FilterOp::IsNull | FilterOp::NotNull => unreachable!("handled above"),
    }
}

fn in_range(actual: &Scalar, expected: &FilterValue) -> Option<bool> {
    let FilterValue::Range { low, high } = expected else {
        return None;
    };
    let v = actual.as_f64()?;
    Some(v >= *low && v <= *high)
}

fn scalar_eq(actual: &Scalar, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::Null => false,
        FilterValue::Range { .. } => false,
        FilterValue::Bool(b) => matches!(actual, Scalar::Bool(v) if v == b),
        FilterValue::Text(t) => matches!(actual, Scalar::Text(v) if v == t),
        _ => match (actual.as_f64(), filter_value_f64(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn scalar_cmp(actual: &Scalar, expected: &FilterValue) -> Option<Ordering> {
    if let FilterValue::Text(t) = expected {
        return match actual {
            Scalar::Text(v) => Some(v.as_str().cmp(t.as_str())),
            _ => None,
        };
    }
    let b = filter_value_f64(expected)?;
    actual.as_f64()?.partial_cmp(&b)
}

fn filter_value_f64(value: &FilterValue) -> Option<f64> {
    match value {
        FilterValue::Int(v) => Some(*v as f64),
        FilterValue::Float(v) => Some(*v),
        _ => None,
    }
}

fn sort_indices(
    batch: &RecordBatch,
    order_by: &[SortConstraint],
) -> Result<UInt32Array, TransformError> {
    let columns = order_by
        .iter()
        .map(|constraint| {
            Ok(SortColumn {
                values: column(batch, &constraint.field)?,
                options: Some(SortOptions {
                    descending: !constraint.ascending,
                    nulls_first: constraint.nulls_first,
                }),
            })
        })
        .collect::<Result<Vec<_>, TransformError>>()?;
    Ok(lexsort_to_indices(&columns, None)?)
}

fn take_rows(batch: &RecordBatch, indices: &UInt32Array) -> Result<RecordBatch, TransformError> {
    let columns = batch
        .columns()
        .iter()
        .map(|col| compute::take(col.as_ref(), indices, None))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

fn project(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch, TransformError> {
    let mut fields = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let index = batch
            .schema()
            .index_of(name)
            .map_err(|_| TransformError::Kernel(format!("unknown field '{name}' in projection")))?;
        fields.push(batch.schema().field(index).clone());
        columns.push(batch.column(index).clone());
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

fn group_aggregate(
    batch: &RecordBatch,
    spec: &GroupBySpec,
    stats: Option<&RecordBatch>,
) -> Result<RecordBatch, TransformError> {
    if spec.keys.is_empty() {
        let all: Vec<usize> = (0..batch.num_rows()).collect();
        return emit_groups(batch, &[], &[Some(all)], &spec.aggregates);
    }
    if spec.keys.len() == 1 {
        if let Some(binning) = &spec.keys[0].binning {
            return binned_aggregate(batch, &spec.keys[0], binning, &spec.aggregates, stats);
        }
    }
    grouped_aggregate(batch, spec)
}

fn binned_aggregate(
    batch: &RecordBatch,
    key: &GroupKey,
    binning: &BinningSpec,
    aggregates: &[AggregateSpec],
    stats: Option<&RecordBatch>,
) -> Result<RecordBatch, TransformError> {
    let stats = stats.ok_or_else(|| {
        TransformError::Kernel("binned aggregation requires a stats table".to_string())
    })?;
    let min = first_f64(stats, &binning.stats_min_field)?;
    let max = first_f64(stats, &binning.stats_max_field)?;
    let bins = binning.bin_count.max(1) as usize;
    let width = (max - min) / bins as f64;

    let col = column(batch, &key.field)?;
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); bins];
    for row in 0..batch.num_rows() {
        let Some(v) = scalar_at(&col, row)?.and_then(|s| s.as_f64()) else {
            continue;
        };
        let index = if width > 0.0 {
            (((v - min) / width).floor() as i64).clamp(0, bins as i64 - 1) as usize
        } else {
            0
        };
        members[index].push(row);
    }

    // Empty bins stay in the output with null aggregate values.
    let groups: Vec<Option<Vec<usize>>> = members
        .into_iter()
        .map(|rows| if rows.is_empty() { None } else { Some(rows) })
        .collect();

    let mut fields = vec![
        Field::new(&binning.index_alias, DataType::Int64, false),
        Field::new(&binning.width_alias, DataType::Float64, false),
        Field::new(&binning.lower_alias, DataType::Float64, false),
        Field::new(&binning.upper_alias, DataType::Float64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(0..bins as i64)),
        Arc::new(Float64Array::from(vec![width; bins])),
        Arc::new(Float64Array::from_iter_values(
            (0..bins).map(|i| min + i as f64 * width),
        )),
        Arc::new(Float64Array::from_iter_values(
            (0..bins).map(|i| min + (i + 1) as f64 * width),
        )),
    ];
    append_aggregate_columns(batch, &groups, aggregates, &mut fields, &mut columns)?;
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

fn grouped_aggregate(
    batch: &RecordBatch,
    spec: &GroupBySpec,
) -> Result<RecordBatch, TransformError> {
    let key_columns = spec
        .keys
        .iter()
        .map(|key| column(batch, &key.field))
        .collect::<Result<Vec<_>, _>>()?;

    // Insertion-ordered so groups come out in first-seen order.
    let mut groups: IndexMap<String, (u32, Vec<usize>)> = IndexMap::new();
    for row in 0..batch.num_rows() {
        let mut rendered = String::new();
        for col in &key_columns {
            match scalar_at(col, row)? {
                Some(scalar) => rendered.push_str(&scalar.render()),
                None => rendered.push('\u{0}'),
            }
            rendered.push('\u{1f}');
        }
        groups
            .entry(rendered)
            .or_insert_with(|| (row as u32, Vec::new()))
            .1
            .push(row);
    }

    let first_rows = UInt32Array::from(
        groups
            .values()
            .map(|(first, _)| *first)
            .collect::<Vec<u32>>(),
    );
    let mut fields = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();
    for (key, col) in spec.keys.iter().zip(&key_columns) {
        let index = batch
            .schema()
            .index_of(&key.field)
            .map_err(|_| TransformError::Kernel(format!("unknown field '{}'", key.field)))?;
        fields.push(batch.schema().field(index).clone());
        columns.push(compute::take(col.as_ref(), &first_rows, None)?);
    }

    let group_rows: Vec<Option<Vec<usize>>> = groups
        .into_values()
        .map(|(_, rows)| Some(rows))
        .collect();
    append_aggregate_columns(batch, &group_rows, &spec.aggregates, &mut fields, &mut columns)?;
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

fn emit_groups(
    batch: &RecordBatch,
    fields: &[Field],
    groups: &[Option<Vec<usize>>],
    aggregates: &[AggregateSpec],
) -> Result<RecordBatch, TransformError> {
    let mut fields = fields.to_vec();
    let mut columns: Vec<ArrayRef> = Vec::new();
    append_aggregate_columns(batch, groups, aggregates, &mut fields, &mut columns)?;
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

fn append_aggregate_columns(
    batch: &RecordBatch,
    groups: &[Option<Vec<usize>>],
    aggregates: &[AggregateSpec],
    fields: &mut Vec<Field>,
    columns: &mut Vec<ArrayRef>,
) -> Result<(), TransformError> {
    for aggregate in aggregates {
        if aggregate.func == AggregateFn::CountStar {
            let mut counts: Vec<Option<i64>> = Vec::with_capacity(groups.len());
            for group in groups {
                counts.push(group.as_ref().map(|rows| rows.len() as i64));
            }
            fields.push(Field::new(&aggregate.alias, DataType::Int64, true));
            columns.push(Arc::new(Int64Array::from(counts)));
            continue;
        }

        let field = aggregate.field.as_ref().ok_or_else(|| {
            TransformError::Kernel(format!(
                "aggregate '{}' requires a source field",
                aggregate.alias
            ))
        })?;
        let col = column(batch, field)?;
        let mut values: Vec<Option<f64>> = Vec::with_capacity(groups.len());
        for group in groups {
            match group {
                Some(rows) => values.push(numeric_aggregate(&col, rows, aggregate.func)?),
                None => values.push(None),
            }
        }
        fields.push(Field::new(&aggregate.alias, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(values)));
    }
    Ok(())
}

fn numeric_aggregate(
    col: &ArrayRef,
    rows: &[usize],
    func: AggregateFn,
) -> Result<Option<f64>, TransformError> {
    let mut values = Vec::with_capacity(rows.len());
    for &row in rows {
        if let Some(v) = scalar_at(col, row)?.and_then(|s| s.as_f64()) {
            values.push(v);
        }
    }
    if values.is_empty() {
        return Ok(None);
    }
    let result = match func {
        AggregateFn::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateFn::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateFn::Sum => values.iter().sum(),
        AggregateFn::Mean => values.iter().sum::<f64>() / values.len() as f64,
        AggregateFn::CountStar => unreachable!("count-star handled by caller"),
    };
    Ok(Some(result))
}

fn first_f64(stats: &RecordBatch, field: &str) -> Result<f64, TransformError> {
    if stats.num_rows() == 0 {
        return Err(TransformError::Kernel("stats table is empty".to_string()));
    }
    let col = column(stats, field)?;
    scalar_at(&col, 0)?
        .and_then(|s| s.as_f64())
        .ok_or_else(|| TransformError::Kernel(format!("stats field '{field}' is not numeric")))
}

fn column(batch: &RecordBatch, name: &str) -> Result<ArrayRef, TransformError> {
    batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| TransformError::Kernel(format!("unknown field '{name}'")))
}

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Scalar::Bool(v) => v.to_string(),
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => v.to_string(),
            Scalar::Text(v) => v.clone(),
        }
    }
}

fn scalar_at(array: &ArrayRef, row: usize) -> Result<Option<Scalar>, TransformError> {
    if array.is_null(row) {
        return Ok(None);
    }
    let scalar = match array.data_type() {
        DataType::Boolean => Scalar::Bool(downcast::<BooleanArray>(array)?.value(row)),
        DataType::Int8 => Scalar::Int(downcast::<Int8Array>(array)?.value(row) as i64),
        DataType::Int16 => Scalar::Int(downcast::<Int16Array>(array)?.value(row) as i64),
        DataType::Int32 => Scalar::Int(downcast::<Int32Array>(array)?.value(row) as i64),
        DataType::Int64 => Scalar::Int(downcast::<Int64Array>(array)?.value(row)),
        DataType::Float32 => Scalar::Float(downcast::<Float32Array>(array)?.value(row) as f64),
        DataType::Float64 => Scalar::Float(downcast::<Float64Array>(array)?.value(row)),
        DataType::Date32 => Scalar::Int(downcast::<Date32Array>(array)?.value(row) as i64),
        DataType::Date64 => Scalar::Int(downcast::<Date64Array>(array)?.value(row)),
        DataType::Time32(TimeUnit::Millisecond) => {
            Scalar::Int(downcast::<Time32MillisecondArray>(array)?.value(row) as i64)
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            Scalar::Int(downcast::<TimestampMillisecondArray>(array)?.value(row))
        }
        DataType::Utf8 => Scalar::Text(downcast::<StringArray>(array)?.value(row).to_string()),
        other => {
            return Err(TransformError::Kernel(format!(
                "unsupported column type {other} in kernel"
            )));
        }
    };
    Ok(Some(scalar))
}

fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T, TransformError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| TransformError::Kernel("column downcast failed".to_string()))
}
