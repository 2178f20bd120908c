use crate::{decompress::MAX_WINDOW_BITS, format::Format};

pub const DEFAULT_CHUNK_CAPACITY: usize = 4096;

/// Runtime settings of a [super::Dispatcher]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum size of one output chunk. Bounds the memory used by a single decompressor step
    pub chunk_capacity: usize,

    /// Format used when data arrives before a format tag. None means such data is rejected
    pub default_format: Option<Format>,

    /// Largest LZ77 window (as a power of two) accepted from DEFLATE streams
    pub window_bits: u8
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            default_format: Format::fallback(),
            window_bits: MAX_WINDOW_BITS
        }
    }
}

impl DispatcherConfig {
    pub fn with_chunk_capacity(mut self, chunk_capacity: usize) -> Self {
        self.chunk_capacity = chunk_capacity;
        self
    }

    pub fn with_default_format(mut self, default_format: Option<Format>) -> Self {
        self.default_format = default_format;
        self
    }

    pub fn with_window_bits(mut self, window_bits: u8) -> Self {
        self.window_bits = window_bits;
        self
    }
}
