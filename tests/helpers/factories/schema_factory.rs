use std::sync::Arc;

use crate::engine::columnar::{ColumnSchema, FieldSpec, LogicalType};

pub struct ColumnSchemaFactory {
    fields: Vec<FieldSpec>,
}

impl ColumnSchemaFactory {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_field(mut self, name: &str, logical_type: LogicalType) -> Self {
        self.fields.push(FieldSpec::new(name, logical_type));
        self
    }

    pub fn create(self) -> Arc<ColumnSchema> {
        Arc::new(ColumnSchema::new(self.fields))
    }
}
