use std::fmt;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::transform::error::TransformError;

/// Opaque identity of a columnar table held by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableHandle(pub u64);

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// The native computation engine behind the byte-oriented transform protocol.
/// Kernels are opaque; only the message contract is specified here.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Submits an encoded transform spec against a source table, with an
    /// optional stats table for binned requests. Returns an encoded reply
    /// frame carrying the result table handle.
    async fn submit(
        &self,
        source: TableHandle,
        spec: &[u8],
        stats: Option<TableHandle>,
    ) -> Result<Vec<u8>, TransformError>;

    /// Reads back the columnar table behind a handle.
    async fn read_table(&self, handle: TableHandle) -> Result<RecordBatch, TransformError>;
}
