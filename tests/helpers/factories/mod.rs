pub mod row_batch_factory;
pub mod schema_factory;

pub use row_batch_factory::RowBatchFactory;
pub use schema_factory::ColumnSchemaFactory;
