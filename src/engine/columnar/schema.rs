use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};

/// Logical column types accepted from upstream drivers.
///
/// Decimal is carried with its precision and scale so display layers can
/// format it, but the encoder deliberately routes it through the text path
/// (see `encode_column`).
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Calendar date stored as days since the UNIX epoch.
    Date32,
    /// Calendar date stored as milliseconds since the UNIX epoch.
    Date64,
    /// Time of day stored as milliseconds since midnight.
    TimeMillis,
    Timestamp {
        tz: Option<Arc<str>>,
    },
    Decimal {
        precision: u8,
        scale: i8,
        bit_width: u16,
    },
    Utf8,
    Binary,
}

impl LogicalType {
    pub fn arrow_type(&self) -> DataType {
        match self {
            LogicalType::Boolean => DataType::Boolean,
            LogicalType::Int8 => DataType::Int8,
            LogicalType::Int16 => DataType::Int16,
            LogicalType::Int32 => DataType::Int32,
            LogicalType::Int64 => DataType::Int64,
            LogicalType::Float32 => DataType::Float32,
            LogicalType::Float64 => DataType::Float64,
            LogicalType::Date32 => DataType::Date32,
            LogicalType::Date64 => DataType::Date64,
            LogicalType::TimeMillis => DataType::Time32(TimeUnit::Millisecond),
            LogicalType::Timestamp { tz } => {
                DataType::Timestamp(TimeUnit::Millisecond, tz.clone())
            }
            // Decimal sources arrive as text from the schema translator and
            // stay text inside the engine.
            LogicalType::Decimal { .. } => DataType::Utf8,
            LogicalType::Utf8 => DataType::Utf8,
            LogicalType::Binary => DataType::Binary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: true,
        }
    }
}

/// Ordered column schema for one result set. Immutable once a batch is being
/// encoded against it.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    fields: Vec<FieldSpec>,
}

impl ColumnSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_arrow(&self) -> SchemaRef {
        let fields = self
            .fields
            .iter()
            .map(|spec| Field::new(&spec.name, spec.logical_type.arrow_type(), spec.nullable))
            .collect::<Vec<_>>();
        Arc::new(Schema::new(fields))
    }
}
