use std::fmt::Debug;

use bzip2::{Decompress, Status};

use super::{Decompressor, DecompressionError, Step, StepStatus};

/// Simple wrapper around a [bzip2::Decompress]
pub struct Bunzip2Decompressor {
    inner: Decompress,
    eof: bool
}

impl Debug for Bunzip2Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bunzip2Decompressor")
            .field("eof", &self.eof)
            .field("total_in", &self.inner.total_in())
            .field("total_out", &self.inner.total_out())
            .finish()
    }
}

impl Default for Bunzip2Decompressor {
    /// Identical to [Bunzip2Decompressor::new]
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for Bunzip2Decompressor {
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, DecompressionError> {
        if self.eof {
            return Ok(Step::new(0, 0, StepStatus::LogicalEnd));
        }

        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();

        let status = self.inner.decompress(input, output)
            .map_err(|e| DecompressionError::Bunzip2(e.to_string()))?;

        let consumed = (self.inner.total_in() - before_in) as usize;
        let produced = (self.inner.total_out() - before_out) as usize;

        tracing::trace!(
            in_len = input.len(),
            out_len = output.len(),
            consumed,
            produced,
            ?status,
            "bunzip2 step"
        );

        let status = if status == Status::StreamEnd {
            self.eof = true;
            StepStatus::LogicalEnd
        } else {
            StepStatus::Continue
        };

        Ok(Step::new(consumed, produced, status))
    }

    fn total_in(&self) -> u64 {
        self.inner.total_in()
    }

    fn total_out(&self) -> u64 {
        self.inner.total_out()
    }
}

impl Bunzip2Decompressor {
    /// Creates a new Bunzip2Decompressor, with a new [bzip2::Decompress]
    pub fn new() -> Self {
        // don't use the 'small' alternative decompression algorithm
        let small = false;
        Self {
            inner: Decompress::new(small),
            eof: false
        }
    }
}
