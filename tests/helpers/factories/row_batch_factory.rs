use std::sync::Arc;

use serde_json::Value;

use crate::engine::columnar::{ColumnSchema, RowBatch};

pub struct RowBatchFactory {
    schema: Arc<ColumnSchema>,
    rows: Vec<Vec<Value>>,
}

impl RowBatchFactory {
    pub fn new(schema: Arc<ColumnSchema>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn create(self) -> RowBatch {
        RowBatch::new(self.schema, self.rows)
    }
}
