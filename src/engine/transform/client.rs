use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::engine::transform::engine::{TableHandle, TransformEngine};
use crate::engine::transform::error::TransformError;
use crate::engine::transform::spec::TransformSpec;
use crate::engine::transform::wire;
use crate::shared::config::CONFIG;

const LOG_TARGET: &str = "engine::transform::client";

/// Marshalling wrapper around a `TransformEngine`: encodes specs, decodes
/// replies, and enforces the boundary-level request timeout.
pub struct TransformClient {
    engine: Arc<dyn TransformEngine>,
    timeout: Duration,
}

impl TransformClient {
    pub fn new(engine: Arc<dyn TransformEngine>) -> Self {
        Self::with_timeout(
            engine,
            Duration::from_millis(CONFIG.transform.request_timeout_ms),
        )
    }

    pub fn with_timeout(engine: Arc<dyn TransformEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Applies one transform spec and returns the result table handle.
    pub async fn apply(
        &self,
        source: TableHandle,
        spec: &TransformSpec,
        stats: Option<TableHandle>,
    ) -> Result<TableHandle, TransformError> {
        let bytes = wire::encode_spec(spec)?;
        debug!(
            target: LOG_TARGET,
            source = %source,
            spec_bytes = bytes.len(),
            has_stats = stats.is_some(),
            "Submitting transform"
        );
        let reply = self
            .deadline(self.engine.submit(source, &bytes, stats))
            .await??;
        let reply = wire::decode_reply(&reply)?;
        debug!(
            target: LOG_TARGET,
            handle = reply.handle,
            rows = reply.row_count,
            "Transform reply decoded"
        );
        Ok(TableHandle(reply.handle))
    }

    pub async fn read_table(&self, handle: TableHandle) -> Result<RecordBatch, TransformError> {
        self.deadline(self.engine.read_table(handle)).await?
    }

    async fn deadline<T>(
        &self,
        fut: impl Future<Output = T>,
    ) -> Result<T, TransformError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| TransformError::Timeout(self.timeout.as_millis() as u64))
    }
}
