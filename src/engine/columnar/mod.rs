pub mod encoder;
pub mod error;
pub mod schema;
pub mod scratch;
pub mod translator;

pub use encoder::encode_column;
pub use error::EncodeError;
pub use schema::{ColumnSchema, FieldSpec, LogicalType};
pub use scratch::EncodeScratch;
pub use translator::{RowBatch, translate};
