use thiserror::Error;

use crate::{decompress::{DecompressionError, InitError, StepStatus}, format::Format};

use self::{
    assembler::{AllocationError, Assembly, AssemblyError, ChunkAllocator, SystemAllocator},
    session::{DecodeSession, Selection},
};

pub use self::{
    config::DispatcherConfig,
    session::SessionState,
    unit::{InputUnit, OutputUnit, UnitMetadata},
};

/// Provides the chunk allocation seam and the loop that drains input through a decompressor
pub mod assembler;

/// Provides dispatcher settings
pub mod config;

/// Provides the per-stream decompressor owner
pub mod session;

/// Provides input and output unit types
pub mod unit;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("data arrived before a format was selected")]
    NotNegotiated,

    #[error("could not allocate output: {0}")]
    AllocationFailure(#[from] AllocationError),

    #[error("could not map output chunk for writing")]
    Map,

    #[error("could not decompress {format} stream: {source}")]
    Backend {
        format: Format,

        #[source]
        source: DecompressionError
    },

    #[error("could not initialize {format} decompressor: {source}")]
    Init {
        format: Format,

        #[source]
        source: InitError
    },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("error within callback: {0}")]
    Downstream(#[from] anyhow::Error)
}

impl DispatchError {
    /// Returns whether the failed call may be repeated with the same input unit
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocationFailure(..) | Self::Map)
    }
}

/// What the caller should do after a dispatch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The stream needs more input
    Continue,

    /// The stream is complete. The next unit starts a new stream
    EndOfStream
}

/// The result of a successful [Dispatcher::update]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub unit: OutputUnit,
    pub flow: Flow
}

impl Decoded {
    pub fn is_end_of_stream(&self) -> bool {
        self.flow == Flow::EndOfStream
    }
}

/// A stream decompressor for gzip and bzip2 data
///
/// Input is passed one unit at a time through [Dispatcher::update].
/// The format is selected with [Dispatcher::set_format] while no
/// stream is in progress
pub struct Dispatcher<'a> {
    config: DispatcherConfig,
    session: DecodeSession,
    allocator: Box<dyn ChunkAllocator + 'a>,

    last_metadata: Option<UnitMetadata>,

    on_output: Option<Box<dyn FnMut(&OutputUnit) -> anyhow::Result<()> + 'a>>
}

impl std::fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

impl Default for Dispatcher<'_> {
    /// Identical to [Dispatcher::new]
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Dispatcher<'a> {
    /// Creates a new Dispatcher with the default configuration
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
            session: DecodeSession::default(),
            allocator: Box::new(SystemAllocator),

            last_metadata: None,

            on_output: None
        }
    }

    /// Creates a new Dispatcher with the specified configuration
    pub fn with_config(config: DispatcherConfig) -> Result<Self, DispatchError> {
        if config.chunk_capacity == 0 {
            return Err(DispatchError::InvalidConfig("chunk capacity must not be zero"));
        }

        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Replaces the allocator output chunks are obtained from
    pub fn with_allocator(mut self, allocator: impl ChunkAllocator + 'a) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    /// Sets the output callback. The passed closure will be invoked with
    /// every non-empty output unit before [Dispatcher::update] returns
    pub fn set_callback(&mut self, on_output: impl FnMut(&OutputUnit) -> anyhow::Result<()> + 'a) {
        self.on_output = Some(Box::new(on_output));
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Selects the format for the next stream from a media type tag
    ///
    /// Repeating the tag of the stream in progress is allowed, switching to
    /// another one is a [DispatchError::ProtocolViolation]. An unknown tag
    /// makes the dispatcher refuse data until a supported tag arrives
    pub fn set_format(&mut self, tag: &str) -> Result<Format, DispatchError> {
        let format = match Format::from_tag(tag) {
            Ok(format) => format,
            Err(e) => {
                tracing::warn!(error = %e, "could not select decompressor, input unsupported");
                if !self.session.in_progress() {
                    self.session.select(Selection::Rejected(tag.to_owned()));
                }

                return Err(DispatchError::UnsupportedFormat(tag.to_owned()));
            }
        };

        if let Some(active) = self.session.active_format() {
            if active != format {
                tracing::warn!(%active, requested = %format, "format change in the middle of a stream");
                return Err(DispatchError::ProtocolViolation(format!(
                    "cannot switch from {active} to {format} in the middle of a stream"
                )));
            }

            return Ok(format);
        }

        tracing::debug!(%format, "selected format");
        self.session.select(Selection::Selected(format));

        Ok(format)
    }

    /// Decompresses one input unit
    ///
    /// The first non-empty unit of a stream binds a decompressor for the
    /// selected format. The returned unit contains everything decompressed
    /// from this input, [Flow::EndOfStream] signals that the stream ended
    /// within it (anything after the end is discarded)
    ///
    /// After a retryable error the same unit must be passed again
    pub fn update<'i>(&mut self, input: impl Into<InputUnit<'i>>) -> Result<Decoded, DispatchError> {
        let input = input.into();
        self.check_ordering(&input.metadata);

        if input.is_empty() {
            return Ok(Decoded {
                unit: OutputUnit::new(input.metadata, self.session.total_out()),
                flow: Flow::Continue
            });
        }

        let mut assembly = match self.session.take_pending() {
            Some(assembly) if assembly.input_len == input.len() => {
                tracing::debug!(consumed = assembly.consumed, "resuming failed unit");
                assembly
            },

            Some(assembly) => {
                let expected = assembly.input_len;
                self.session.set_pending(assembly);

                return Err(DispatchError::ProtocolViolation(format!(
                    "expected the failed {expected} byte unit again, got {} bytes", input.len()
                )));
            },

            None => {
                if !self.session.in_progress() {
                    self.begin_stream()?;
                }

                Assembly::new(input.len(), OutputUnit::new(input.metadata, self.session.total_out()))
            }
        };

        let Some(active) = self.session.active_mut() else {
            return Err(DispatchError::NotNegotiated);
        };
        let format = active.format;
        let result = assembly.run(&mut active.backend, input.data, self.config.chunk_capacity, self.allocator.as_mut());

        let status = match result {
            Ok(status) => status,

            Err(AssemblyError::Decompression(source)) => {
                tracing::warn!(%format, error = %source, "could not decompress stream");
                self.session.fail();

                return Err(DispatchError::Backend { format, source });
            },

            Err(AssemblyError::Allocation(e)) => {
                tracing::warn!(error = %e, "could not allocate buffer");
                self.session.set_pending(assembly);

                return Err(DispatchError::AllocationFailure(e));
            },

            Err(AssemblyError::Map) => {
                tracing::warn!("could not map memory object");
                self.session.set_pending(assembly);

                return Err(DispatchError::Map);
            }
        };

        self.session.record(assembly.consumed, assembly.unit.len());

        let flow = match status {
            StepStatus::Continue => Flow::Continue,
            StepStatus::LogicalEnd => {
                let trailing = input.len() - assembly.consumed;
                if trailing > 0 {
                    tracing::warn!(trailing, "discarding data after the end of the stream");
                }

                self.session.finish();
                Flow::EndOfStream
            }
        };

        let unit = assembly.unit;
        if !unit.is_empty() {
            if let Some(on_output) = &mut self.on_output {
                (on_output)(&unit)?;
            }
        }

        Ok(Decoded {
            unit,
            flow
        })
    }

    /// Releases the decompressor of an unfinished stream, and forgets
    /// a pending retry. The format selection is kept
    pub fn reset(&mut self) {
        self.session.teardown();
        self.last_metadata = None;
    }

    fn begin_stream(&mut self) -> Result<(), DispatchError> {
        let format = match self.session.selection() {
            Selection::Selected(format) => *format,
            Selection::Rejected(tag) => return Err(DispatchError::UnsupportedFormat(tag.clone())),
            Selection::Default => self.config.default_format.ok_or(DispatchError::NotNegotiated)?
        };

        self.session.begin(format, self.config.window_bits)
            .map_err(|source| {
                tracing::warn!(%format, error = %source, "could not invoke decompressor");
                DispatchError::Init { format, source }
            })
    }

    fn check_ordering(&mut self, metadata: &UnitMetadata) {
        if let Some(previous) = &self.last_metadata {
            if metadata.precedes(previous) {
                tracing::warn!(?previous, current = ?metadata, "input unit goes backwards");
            }
        }

        self.last_metadata = Some(*metadata);
    }
}

#[cfg(all(test, feature = "gzip", feature = "bzip2"))]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};

    use super::assembler::tests::FlakyAllocator;
    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = DispatcherConfig::default().with_chunk_capacity(0);
        assert!(matches!(Dispatcher::with_config(config), Err(DispatchError::InvalidConfig(..))));
    }

    #[test]
    fn empty_unit_before_any_tag() {
        let config = DispatcherConfig::default().with_default_format(None);
        let mut dispatcher = Dispatcher::with_config(config).unwrap();

        let decoded = dispatcher.update(InputUnit::new(&[])).unwrap();
        assert!(decoded.unit.is_empty());
        assert_eq!(decoded.flow, Flow::Continue);
        assert_eq!(dispatcher.state(), SessionState::Idle);

        assert!(matches!(dispatcher.update(b"x"), Err(DispatchError::NotNegotiated)));
    }

    #[test]
    fn default_format_is_gzip() {
        let data = gzip(b"defaults");
        let mut dispatcher = Dispatcher::new();

        let decoded = dispatcher.update(&data).unwrap();
        assert_eq!(decoded.unit.to_vec(), b"defaults");
        assert!(decoded.is_end_of_stream());
    }

    #[test]
    fn retry_with_another_unit_is_a_violation() {
        let data = gzip(&b"0123456789".repeat(100));
        let allocator = FlakyAllocator {
            failing: vec![0],
            ..Default::default()
        };
        let mut dispatcher = Dispatcher::new().with_allocator(allocator);

        let err = dispatcher.update(&data).unwrap_err();
        assert!(err.is_retryable());
        assert!(dispatcher.session().has_pending_retry());

        assert!(matches!(dispatcher.update(&data[1..]), Err(DispatchError::ProtocolViolation(..))));
        assert!(dispatcher.session().has_pending_retry());

        let decoded = dispatcher.update(&data).unwrap();
        assert_eq!(decoded.unit.to_vec(), b"0123456789".repeat(100));
        assert!(!dispatcher.session().has_pending_retry());
    }

    #[test]
    fn reset_releases_decompressor() {
        let data = gzip(b"partial");
        let mut dispatcher = Dispatcher::new();

        dispatcher.update(&data[..5]).unwrap();
        assert_eq!(dispatcher.state(), SessionState::Decoding);

        dispatcher.reset();
        assert_eq!(dispatcher.state(), SessionState::Idle);

        let decoded = dispatcher.update(&data).unwrap();
        assert_eq!(decoded.unit.to_vec(), b"partial");
    }
}
