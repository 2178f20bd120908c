use std::fmt::Debug;

use flate2::{Crc, Decompress, FlushDecompress, Status};

use super::{Decompressor, DecompressionError, InitError, Step, StepStatus, MAX_WINDOW_BITS, MIN_WINDOW_BITS};

use self::header::{GzipHeader, GzipHeaderReader, GzipTrailer, GZIP_ID1, GZIP_TRAILER_SIZE};

/// Provides utilities for reading gzip member headers and trailers
pub mod header;

/// The wrapper around the DEFLATE data, detected from the first byte of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    Gzip,
    Zlib
}

enum Phase {
    Detect,
    GzipHeader(GzipHeaderReader),
    Body(Wrapper),
    GzipTrailer(Vec<u8>),
    Done
}

/// Incremental DEFLATE decompressor with gzip and zlib wrapper auto-detection
///
/// Only the first gzip member of a stream is decoded, anything after
/// its trailer is left unconsumed
pub struct InflateDecompressor {
    inner: Decompress,
    phase: Phase,
    window_bits: u8,

    header: Option<GzipHeader>,
    crc: Crc,

    total_in: u64,
    total_out: u64
}

impl Debug for InflateDecompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InflateDecompressor")
            .field("wrapper", &self.wrapper())
            .field("total_in", &self.total_in)
            .field("total_out", &self.total_out)
            .finish()
    }
}

impl Default for InflateDecompressor {
    /// Identical to [InflateDecompressor::new] with the largest window
    fn default() -> Self {
        Self {
            inner: Decompress::new(false),
            phase: Phase::Detect,
            window_bits: MAX_WINDOW_BITS,

            header: None,
            crc: Crc::new(),

            total_in: 0,
            total_out: 0
        }
    }
}

impl Decompressor for InflateDecompressor {
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, DecompressionError> {
        if let Phase::Detect = self.phase {
            let Some(&first) = input.first() else {
                return Ok(Step::default());
            };
            self.detect(first)?;
        }

        let step = match self.phase {
            Phase::Detect => unreachable!("wrapper is detected above"),

            Phase::GzipHeader(ref mut reader) => {
                let (consumed, header) = reader.update(input)?;

                if let Some(header) = header {
                    tracing::debug!(
                        filename = ?header.filename,
                        mtime = header.mtime,
                        os = header.os,
                        "read gzip header"
                    );

                    self.header = Some(header);
                    self.phase = Phase::Body(Wrapper::Gzip);
                }

                Step::new(consumed, 0, StepStatus::Continue)
            },

            Phase::Body(wrapper) => self.inflate(wrapper, input, output)?,

            Phase::GzipTrailer(..) => self.read_trailer(input)?,

            Phase::Done => Step::new(0, 0, StepStatus::LogicalEnd)
        };

        self.total_in += step.consumed as u64;
        self.total_out += step.produced as u64;

        Ok(step)
    }

    fn total_in(&self) -> u64 {
        self.total_in
    }

    fn total_out(&self) -> u64 {
        self.total_out
    }
}

impl InflateDecompressor {
    /// Creates a new InflateDecompressor accepting LZ77 windows of
    /// up to 2^window_bits bytes
    pub fn new(window_bits: u8) -> Result<Self, InitError> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&window_bits) {
            return Err(InitError::WindowBits(window_bits));
        }

        Ok(Self {
            window_bits,
            ..Default::default()
        })
    }

    /// Returns the detected wrapper, if any data was seen yet
    pub fn wrapper(&self) -> Option<Wrapper> {
        match &self.phase {
            Phase::Detect => None,
            Phase::GzipHeader(..) | Phase::GzipTrailer(..) => Some(Wrapper::Gzip),
            Phase::Body(wrapper) => Some(*wrapper),
            Phase::Done => Some(if self.header.is_some() { Wrapper::Gzip } else { Wrapper::Zlib })
        }
    }

    /// Returns the gzip member header once it has been read
    pub fn header(&self) -> Option<&GzipHeader> {
        self.header.as_ref()
    }

    fn detect(&mut self, first: u8) -> Result<(), DecompressionError> {
        if first == GZIP_ID1 {
            tracing::trace!("detected gzip wrapper");
            self.phase = Phase::GzipHeader(GzipHeaderReader::new());
            return Ok(());
        }

        // zlib CMF byte: low nibble is the method, high nibble the window size minus 8
        if first & 0x0f == 8 {
            let declared = (first >> 4) + 8;
            if declared > self.window_bits {
                return Err(DecompressionError::WindowSize(declared, self.window_bits));
            }
        }

        tracing::trace!("detected zlib wrapper");
        self.inner = Decompress::new(true);
        self.phase = Phase::Body(Wrapper::Zlib);

        Ok(())
    }

    fn inflate(&mut self, wrapper: Wrapper, input: &[u8], output: &mut [u8]) -> Result<Step, DecompressionError> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();

        let status = self.inner.decompress(input, output, FlushDecompress::None)
            .map_err(|e| DecompressionError::Inflate(e.to_string()))?;

        let consumed = (self.inner.total_in() - before_in) as usize;
        let produced = (self.inner.total_out() - before_out) as usize;

        tracing::trace!(
            in_len = input.len(),
            out_len = output.len(),
            consumed,
            produced,
            ?status,
            "inflate step"
        );

        if wrapper == Wrapper::Gzip {
            self.crc.update(&output[..produced]);
        }

        // BufError only means no progress was possible with the given buffers
        match (status, wrapper) {
            (Status::Ok | Status::BufError, _) => Ok(Step::new(consumed, produced, StepStatus::Continue)),

            (Status::StreamEnd, Wrapper::Zlib) => {
                self.phase = Phase::Done;
                Ok(Step::new(consumed, produced, StepStatus::LogicalEnd))
            },

            (Status::StreamEnd, Wrapper::Gzip) => {
                self.phase = Phase::GzipTrailer(Vec::with_capacity(GZIP_TRAILER_SIZE));

                // The trailer may already be in this input
                let trailer = self.read_trailer(&input[consumed..])?;
                Ok(Step::new(consumed + trailer.consumed, produced, trailer.status))
            }
        }
    }

    fn read_trailer(&mut self, input: &[u8]) -> Result<Step, DecompressionError> {
        let Phase::GzipTrailer(buffer) = &mut self.phase else {
            return Ok(Step::default());
        };

        let consumed = std::cmp::min(GZIP_TRAILER_SIZE - buffer.len(), input.len());
        buffer.extend_from_slice(&input[..consumed]);

        let Some(trailer) = GzipTrailer::from_bytes(buffer.as_slice()) else {
            return Ok(Step::new(consumed, 0, StepStatus::Continue));
        };

        if trailer.crc32 != self.crc.sum() {
            return Err(DecompressionError::Checksum {
                what: "crc32",
                expected: trailer.crc32,
                actual: self.crc.sum()
            });
        }

        if trailer.size != self.crc.amount() {
            return Err(DecompressionError::Checksum {
                what: "size",
                expected: trailer.size,
                actual: self.crc.amount()
            });
        }

        self.phase = Phase::Done;
        Ok(Step::new(consumed, 0, StepStatus::LogicalEnd))
    }
}
