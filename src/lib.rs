/// Provides incremental decompressors for the supported formats
pub mod decompress;

/// Provides utilities for mapping format tags to decompressors
pub mod format;

/// Provides the stream dispatcher, which feeds input units through a decompressor
pub mod dispatch;

pub use dispatch::{
    Decoded, DispatchError, Dispatcher, DispatcherConfig, Flow, InputUnit, OutputUnit, SessionState,
    UnitMetadata,
};
pub use format::Format;

#[cfg(not(any(feature = "gzip", feature = "bzip2")))]
compile_error!("at least one of the \"gzip\" or \"bzip2\" features must be enabled");
