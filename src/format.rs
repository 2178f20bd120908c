use std::{fmt::Display, str::FromStr};

use thiserror::Error;

use crate::decompress::{Backend, InitError};

#[cfg(feature = "gzip")]
use crate::decompress::inflate::InflateDecompressor;

#[cfg(feature = "bzip2")]
use crate::decompress::bunzip2::Bunzip2Decompressor;

pub const GZIP_TAG: &str = "application/x-gzip";
pub const BZIP2_TAG: &str = "application/x-bzip2";

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("unsupported format: {0}")]
    Unsupported(String)
}

/// Represents a compressed stream format.
/// See [Format::from_tag] and [Format::create_decompressor]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    #[cfg(feature = "gzip")]
    Gzip,

    #[cfg(feature = "bzip2")]
    Bzip2
}

impl Format {
    /// Looks up the format for a media type tag
    ///
    /// Returns [FormatError::Unsupported] for unknown tags and for
    /// tags whose decompressor was not compiled in
    pub fn from_tag(tag: &str) -> Result<Self, FormatError> {
        match tag {
            #[cfg(feature = "gzip")]
            GZIP_TAG => Ok(Self::Gzip),

            #[cfg(feature = "bzip2")]
            BZIP2_TAG => Ok(Self::Bzip2),

            _ => Err(FormatError::Unsupported(tag.to_owned()))
        }
    }

    /// The media type tag of this format
    pub fn tag(self) -> &'static str {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip => GZIP_TAG,

            #[cfg(feature = "bzip2")]
            Self::Bzip2 => BZIP2_TAG
        }
    }

    /// The format assumed when data arrives before any tag
    pub fn fallback() -> Option<Self> {
        #[cfg(feature = "gzip")]
        return Some(Self::Gzip);

        #[cfg(not(feature = "gzip"))]
        return None;
    }

    /// Creates a fresh decompressor for this format
    ///
    /// "window_bits" only applies to [Format::Gzip]
    #[cfg_attr(not(feature = "gzip"), allow(unused_variables))]
    pub fn create_decompressor(self, window_bits: u8) -> Result<Backend, InitError> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip => Ok(Backend::Inflate(InflateDecompressor::new(window_bits)?)),

            #[cfg(feature = "bzip2")]
            Self::Bzip2 => Ok(Backend::Bunzip2(Bunzip2Decompressor::new()))
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}
