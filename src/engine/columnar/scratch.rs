use arrow::array::BooleanBufferBuilder;
use arrow::buffer::NullBuffer;

/// Reusable per-row null mask shared across the columns of a batch.
///
/// Must be reset before each column encode; must not be shared across
/// concurrently encoding batches.
#[derive(Debug, Default)]
pub struct EncodeScratch {
    mask: Vec<bool>,
    null_count: usize,
}

impl EncodeScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the mask for a column of `rows` values, all initially valid.
    pub fn reset(&mut self, rows: usize) {
        self.mask.clear();
        self.mask.resize(rows, true);
        self.null_count = 0;
    }

    pub fn set_null(&mut self, row: usize) {
        if self.mask[row] {
            self.mask[row] = false;
            self.null_count += 1;
        }
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    /// Packs the mask into a validity bitmap. Returns `None` when every row is
    /// valid, in which case the bitmap is omitted from the output buffer.
    pub fn finish_validity(&self) -> Option<NullBuffer> {
        if self.null_count == 0 {
            return None;
        }
        let mut builder = BooleanBufferBuilder::new(self.mask.len());
        for &valid in &self.mask {
            builder.append(valid);
        }
        Some(NullBuffer::new(builder.finish()))
    }
}
