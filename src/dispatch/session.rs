use crate::{decompress::{Backend, Decompressor, InitError}, format::Format};

use super::assembler::Assembly;

/// What the next stream will be decoded as
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// No tag was seen, the configured default applies
    #[default]
    Default,

    Selected(Format),

    /// The last tag was not recognized. Data is refused until a supported tag arrives
    Rejected(String)
}

/// Lifecycle state of a [DecodeSession]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No decompressor is bound
    Idle,

    /// A decompressor is bound and a stream is in progress
    Decoding,

    /// The last stream failed. Behaves like [SessionState::Idle]
    Failed
}

#[derive(Debug)]
pub(crate) struct Active {
    pub format: Format,
    pub backend: Backend
}

/// Owns the decompressor of the stream in progress, if any, and its counters
///
/// The session outlives single streams: after a stream ends or fails,
/// the next unit starts a new one
#[derive(Debug, Default)]
pub struct DecodeSession {
    selection: Selection,
    active: Option<Active>,
    failed: bool,

    pending: Option<Assembly>,

    total_in: u64,
    total_out: u64,

    streams_completed: u64,
    streams_failed: u64
}

impl DecodeSession {
    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Decoding
        } else if self.failed {
            SessionState::Failed
        } else {
            SessionState::Idle
        }
    }

    /// Returns whether a decompressor is bound
    pub fn in_progress(&self) -> bool {
        self.active.is_some()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The format of the stream in progress
    pub fn active_format(&self) -> Option<Format> {
        self.active.as_ref().map(|a| a.format)
    }

    /// Returns whether a call failed locally and must be repeated with the same unit
    pub fn has_pending_retry(&self) -> bool {
        self.pending.is_some()
    }

    /// Compressed bytes consumed in the current (or last) stream
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Decompressed bytes produced in the current (or last) stream
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    pub fn streams_completed(&self) -> u64 {
        self.streams_completed
    }

    pub fn streams_failed(&self) -> u64 {
        self.streams_failed
    }

    pub(crate) fn select(&mut self, selection: Selection) {
        debug_assert!(!self.in_progress());

        self.selection = selection;
        self.failed = false;
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut Active> {
        self.active.as_mut()
    }

    /// Binds a fresh decompressor for "format"
    pub(crate) fn begin(&mut self, format: Format, window_bits: u8) -> Result<(), InitError> {
        debug_assert!(!self.in_progress());

        let backend = format.create_decompressor(window_bits)?;
        tracing::debug!(%format, backend = backend.name(), "initialized decompressor");

        self.active = Some(Active { format, backend });
        self.failed = false;
        self.total_in = 0;
        self.total_out = 0;

        Ok(())
    }

    /// Takes the progress of a unit that failed locally, if any
    pub(crate) fn take_pending(&mut self) -> Option<Assembly> {
        self.pending.take()
    }

    /// Keeps the progress of a unit that failed locally, until it is passed again
    pub(crate) fn set_pending(&mut self, assembly: Assembly) {
        debug_assert!(self.in_progress());
        self.pending = Some(assembly);
    }

    pub(crate) fn record(&mut self, consumed: usize, produced: usize) {
        self.total_in += consumed as u64;
        self.total_out += produced as u64;
    }

    /// Releases the decompressor after the logical end of its stream
    pub(crate) fn finish(&mut self) {
        if self.finalize() {
            self.streams_completed += 1;
        }
    }

    /// Releases the decompressor after a decoding error
    pub(crate) fn fail(&mut self) {
        if self.finalize() {
            self.streams_failed += 1;
            self.failed = true;
        }
    }

    /// Releases the decompressor without completing its stream
    pub(crate) fn teardown(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("dropping unfinished retry");
        }
        self.finalize();
    }

    fn finalize(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        tracing::debug!(
            format = %active.format,
            backend = active.backend.name(),
            total_in = active.backend.total_in(),
            total_out = active.backend.total_out(),
            "finalized decompressor"
        );

        true
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
