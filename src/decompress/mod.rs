use thiserror::Error;

/// Provides a [Decompressor] for gzip and zlib wrapped DEFLATE streams using [flate2::Decompress]
#[cfg(feature = "gzip")]
pub mod inflate;

/// Provides a [Decompressor] for bzip2 streams using [bzip2::Decompress]
#[cfg(feature = "bzip2")]
pub mod bunzip2;

#[cfg(feature = "gzip")]
use self::inflate::{InflateDecompressor, header::GzipHeaderError};

#[cfg(feature = "bzip2")]
use self::bunzip2::Bunzip2Decompressor;

/// Smallest and largest accepted DEFLATE window, as a power of two
pub const MIN_WINDOW_BITS: u8 = 8;
pub const MAX_WINDOW_BITS: u8 = 15;

#[derive(Error, Debug)]
pub enum DecompressionError {
    #[error("inflate error: {0}")]
    Inflate(String),

    #[error("bunzip2 error: {0}")]
    Bunzip2(String),

    #[cfg(feature = "gzip")]
    #[error("invalid gzip header: {0}")]
    GzipHeader(#[from] GzipHeaderError),

    #[error("{what} mismatch: expected {expected:#010x}, got {actual:#010x}")]
    Checksum {
        what: &'static str,
        expected: u32,
        actual: u32
    },

    #[error("stream declares a {0}-bit window, larger than the configured maximum of {1}")]
    WindowSize(u8, u8)
}

#[derive(Error, Debug)]
pub enum InitError {
    #[error("window bits must be between 8 and 15, got {0}")]
    WindowBits(u8)
}

/// Whether a decompressor expects more input after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepStatus {
    #[default]
    Continue,

    /// The compressed stream is complete. No further input belongs to it
    LogicalEnd
}

/// The result of a single [Decompressor::step] call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Step {
    pub consumed: usize,
    pub produced: usize,
    pub status: StepStatus
}

impl Step {
    pub fn new(consumed: usize, produced: usize, status: StepStatus) -> Self {
        Self {
            consumed,
            produced,
            status
        }
    }

    /// Returns whether this step neither consumed nor produced anything
    pub fn is_stalled(&self) -> bool {
        self.consumed == 0 && self.produced == 0 && self.status == StepStatus::Continue
    }
}

pub trait Decompressor: std::fmt::Debug + Send {
    /// Feeds as much of "input" as the decompressor accepts in one call,
    /// writing decompressed bytes to the beginning of "output"
    ///
    /// Empty input is not an error, it just produces a stalled [Step]
    /// unless the decompressor has output pending
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, DecompressionError>;

    /// Total amount of compressed bytes consumed so far
    fn total_in(&self) -> u64;

    /// Total amount of decompressed bytes produced so far
    fn total_out(&self) -> u64;
}

/// One of the available decompressors. A session owns exactly one of these
/// while a stream is in progress
#[derive(Debug)]
pub enum Backend {
    #[cfg(feature = "gzip")]
    Inflate(InflateDecompressor),

    #[cfg(feature = "bzip2")]
    Bunzip2(Bunzip2Decompressor)
}

impl Backend {
    /// A short name for log messages
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "gzip")]
            Self::Inflate(..) => "inflate",

            #[cfg(feature = "bzip2")]
            Self::Bunzip2(..) => "bunzip2"
        }
    }
}

impl Decompressor for Backend {
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, DecompressionError> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Inflate(d) => d.step(input, output),

            #[cfg(feature = "bzip2")]
            Self::Bunzip2(d) => d.step(input, output)
        }
    }

    fn total_in(&self) -> u64 {
        match self {
            #[cfg(feature = "gzip")]
            Self::Inflate(d) => d.total_in(),

            #[cfg(feature = "bzip2")]
            Self::Bunzip2(d) => d.total_in()
        }
    }

    fn total_out(&self) -> u64 {
        match self {
            #[cfg(feature = "gzip")]
            Self::Inflate(d) => d.total_out(),

            #[cfg(feature = "bzip2")]
            Self::Bunzip2(d) => d.total_out()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stalled_step() {
        assert!(Step::default().is_stalled());
        assert!(!Step::new(1, 0, StepStatus::Continue).is_stalled());
        assert!(!Step::new(0, 1, StepStatus::Continue).is_stalled());
        assert!(!Step::new(0, 0, StepStatus::LogicalEnd).is_stalled());
    }
}
