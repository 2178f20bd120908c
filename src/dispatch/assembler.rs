use thiserror::Error;

use crate::decompress::{Decompressor, DecompressionError, StepStatus};

use super::unit::OutputUnit;

#[derive(Error, Debug)]
#[error("could not allocate a chunk of {0} bytes")]
pub struct AllocationError(pub usize);

/// Provides the buffers decompressed data is written into
pub trait ChunkAllocator: Send {
    /// Allocates a buffer with "capacity" writable bytes
    fn allocate(&mut self, capacity: usize) -> Result<Vec<u8>, AllocationError>;
}

/// Allocates chunks on the heap, reporting allocation failure instead of aborting
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl ChunkAllocator for SystemAllocator {
    fn allocate(&mut self, capacity: usize) -> Result<Vec<u8>, AllocationError> {
        let mut chunk = Vec::new();
        chunk.try_reserve_exact(capacity)
            .map_err(|_| AllocationError(capacity))?;
        chunk.resize(capacity, 0);

        Ok(chunk)
    }
}

#[derive(Debug)]
pub(crate) enum AssemblyError {
    Allocation(AllocationError),
    Map,
    Decompression(DecompressionError)
}

/// Progress of one input unit through a decompressor
///
/// Survives a failed call, so that the same unit can be passed again
/// and decoding resumes where it stopped
#[derive(Debug)]
pub(crate) struct Assembly {
    pub input_len: usize,
    pub consumed: usize,
    pub unit: OutputUnit,

    // The last step filled its whole chunk, so the decompressor may have more output
    draining: bool
}

impl Assembly {
    pub fn new(input_len: usize, unit: OutputUnit) -> Self {
        Self {
            input_len,
            consumed: 0,
            unit,
            draining: false
        }
    }

    /// Drives "decompressor" over the unconsumed part of "input", appending
    /// every non-empty chunk to the output unit
    ///
    /// Stops when the input is used up and no output is pending, when the
    /// decompressor stalls, or at the logical end of the stream
    pub fn run<D: Decompressor + ?Sized>(
        &mut self,
        decompressor: &mut D,
        input: &[u8],
        capacity: usize,
        allocator: &mut dyn ChunkAllocator
    ) -> Result<StepStatus, AssemblyError> {
        debug_assert_eq!(input.len(), self.input_len);

        loop {
            let remaining = &input[self.consumed..];
            if remaining.is_empty() && !self.draining {
                return Ok(StepStatus::Continue);
            }

            let mut chunk = allocator.allocate(capacity)
                .map_err(AssemblyError::Allocation)?;
            if chunk.is_empty() {
                return Err(AssemblyError::Map);
            }
            let writable = chunk.len();

            let step = decompressor.step(remaining, &mut chunk)
                .map_err(AssemblyError::Decompression)?;
            self.consumed += step.consumed;

            chunk.truncate(step.produced);
            if !chunk.is_empty() {
                self.unit.push_chunk(chunk);
            }

            if step.status == StepStatus::LogicalEnd {
                return Ok(StepStatus::LogicalEnd);
            }

            if step.is_stalled() {
                self.draining = false;
                return Ok(StepStatus::Continue);
            }

            self.draining = step.produced == writable;
        }
    }
}
