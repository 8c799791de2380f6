use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use serde_json::Value;
use tracing::debug;

use crate::engine::columnar::encoder::encode_column;
use crate::engine::columnar::error::EncodeError;
use crate::engine::columnar::schema::ColumnSchema;
use crate::engine::columnar::scratch::EncodeScratch;

const LOG_TARGET: &str = "engine::columnar::translator";

/// One page of row-major driver output. Produced once per result page and
/// consumed exactly once by `translate`.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub schema: Arc<ColumnSchema>,
    pub rows: Vec<Vec<Value>>,
}

impl RowBatch {
    pub fn new(schema: Arc<ColumnSchema>, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Converts a row batch into one columnar record batch bound to its schema.
///
/// Pure function of its inputs; any column failure aborts the whole batch.
pub fn translate(batch: &RowBatch, scratch: &mut EncodeScratch) -> Result<RecordBatch, EncodeError> {
    let expected = batch.schema.len();
    for (row, values) in batch.rows.iter().enumerate() {
        if values.len() != expected {
            return Err(EncodeError::ShapeMismatch {
                row,
                expected,
                actual: values.len(),
            });
        }
    }

    let mut columns = Vec::with_capacity(expected);
    let mut cells: Vec<Value> = Vec::with_capacity(batch.rows.len());
    for (index, field) in batch.schema.fields().iter().enumerate() {
        cells.clear();
        cells.extend(batch.rows.iter().map(|row| row[index].clone()));
        columns.push(encode_column(&field.logical_type, &cells, scratch)?);
    }

    debug!(
        target: LOG_TARGET,
        rows = batch.rows.len(),
        columns = expected,
        "Translated row batch"
    );
    Ok(RecordBatch::try_new(batch.schema.to_arrow(), columns)?)
}
