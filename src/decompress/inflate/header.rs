use std::io::Cursor;

use byteorder::{ByteOrder, ReadBytesExt, LittleEndian};
use flate2::Crc;
use thiserror::Error;

pub const GZIP_ID1: u8 = 0x1f;
pub const GZIP_ID2: u8 = 0x8b;
pub const GZIP_CM_DEFLATE: u8 = 8;
pub const GZIP_HEADER_CONSTANT_SIZE: usize = 10;
pub const GZIP_TRAILER_SIZE: usize = 8;

const FTEXT: u8 = 1 << 0;
const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const FRESERVED: u8 = 0xe0;

#[derive(Error, Debug)]
pub enum GzipHeaderError {
    #[error("bad magic bytes")]
    BadMagic,

    #[error("unknown compression method: {0}")]
    UnknownMethod(u8),

    #[error("reserved flags are set: {0:#04x}")]
    ReservedFlags(u8),

    #[error("header checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    HeaderChecksum {
        expected: u16,
        actual: u16
    }
}

/// Represents the result of reading a gzip member header
///
/// Strings are decoded as ISO 8859-1, as gzip requires
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GzipHeader {
    pub flags: u8,

    pub mtime: u32,
    pub extra_flags: u8,
    pub os: u8,

    pub extra: Option<Vec<u8>>,
    pub filename: Option<String>,
    pub comment: Option<String>,

    pub header_size: usize
}

impl GzipHeader {
    /// Attempts to read a gzip member header from the provided
    /// byte buffer. Returns None if there isn't enough data yet
    ///
    /// Obviously wrong headers are rejected as early as possible,
    /// so a bad magic number fails even if only a byte is available
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Result<Option<Self>, GzipHeaderError> {
        let (_, header) = GzipHeaderReader::new().update(data.as_ref())?;
        Ok(header)
    }

    /// Returns whether the producer marked the contents as text
    pub fn is_text(&self) -> bool {
        self.flags & FTEXT != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Fixed,
    ExtraLength,
    Extra(usize),
    Name,
    Comment,
    HeaderCrc,
    Done
}

/// Reads a gzip member header from consecutive pieces of input
///
/// Only the bytes of the field being read are buffered, so every
/// input byte is looked at once
pub struct GzipHeaderReader {
    field: Field,
    buffer: Vec<u8>,

    header: GzipHeader,
    crc: Crc
}

impl std::fmt::Debug for GzipHeaderReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipHeaderReader")
            .field("field", &self.field)
            .field("buffered", &self.buffer.len())
            .field("header_size", &self.header.header_size)
            .finish()
    }
}

impl Default for GzipHeaderReader {
    /// Identical to [GzipHeaderReader::new]
    fn default() -> Self {
        Self::new()
    }
}

impl GzipHeaderReader {
    pub fn new() -> Self {
        Self {
            field: Field::Fixed,
            buffer: Vec::with_capacity(GZIP_HEADER_CONSTANT_SIZE),

            header: GzipHeader::default(),
            crc: Crc::new()
        }
    }

    /// Consumes header bytes from "input". Returns the amount of bytes
    /// consumed, and the header once its last byte was read
    ///
    /// Nothing past the end of the header is consumed
    pub fn update(&mut self, input: &[u8]) -> Result<(usize, Option<GzipHeader>), GzipHeaderError> {
        let mut consumed = 0;

        loop {
            if self.field == Field::Done {
                let header = std::mem::take(&mut self.header);
                return Ok((consumed, Some(header)));
            }

            let rest = &input[consumed..];
            if rest.is_empty() {
                return Ok((consumed, None));
            }

            let field = self.field;
            let taken = match field {
                Field::Fixed => self.read_fixed(rest)?,
                Field::ExtraLength => self.read_extra_length(rest),
                Field::Extra(remaining) => self.read_extra(rest, remaining),
                Field::Name | Field::Comment => self.read_string(rest),
                Field::HeaderCrc => self.read_header_crc(rest)?,
                Field::Done => 0
            };

            // The header checksum covers everything before itself
            if field != Field::HeaderCrc {
                self.crc.update(&rest[..taken]);
            }

            self.header.header_size += taken;
            consumed += taken;
        }
    }

    fn fill(&mut self, rest: &[u8], size: usize) -> usize {
        let taken = std::cmp::min(size - self.buffer.len(), rest.len());
        self.buffer.extend_from_slice(&rest[..taken]);
        taken
    }

    fn read_fixed(&mut self, rest: &[u8]) -> Result<usize, GzipHeaderError> {
        let taken = self.fill(rest, GZIP_HEADER_CONSTANT_SIZE);
        let fixed = self.buffer.as_slice();

        if fixed.first().is_some_and(|&id1| id1 != GZIP_ID1) {
            return Err(GzipHeaderError::BadMagic);
        }
        if fixed.get(1).is_some_and(|&id2| id2 != GZIP_ID2) {
            return Err(GzipHeaderError::BadMagic);
        }
        if let Some(&method) = fixed.get(2) {
            if method != GZIP_CM_DEFLATE {
                return Err(GzipHeaderError::UnknownMethod(method));
            }
        }
        if let Some(&flags) = fixed.get(3) {
            if flags & FRESERVED != 0 {
                return Err(GzipHeaderError::ReservedFlags(flags & FRESERVED));
            }
        }

        if fixed.len() == GZIP_HEADER_CONSTANT_SIZE {
            self.header.flags = fixed[3];
            self.header.mtime = LittleEndian::read_u32(&fixed[4..8]);
            self.header.extra_flags = fixed[8];
            self.header.os = fixed[9];

            self.next_field();
        }

        Ok(taken)
    }

    fn read_extra_length(&mut self, rest: &[u8]) -> usize {
        let taken = self.fill(rest, 2);

        if self.buffer.len() == 2 {
            let length = LittleEndian::read_u16(&self.buffer) as usize;
            self.header.extra = Some(Vec::with_capacity(length));

            if length == 0 {
                self.next_field();
            } else {
                self.buffer.clear();
                self.field = Field::Extra(length);
            }
        }

        taken
    }

    fn read_extra(&mut self, rest: &[u8], remaining: usize) -> usize {
        let taken = std::cmp::min(remaining, rest.len());
        if let Some(extra) = &mut self.header.extra {
            extra.extend_from_slice(&rest[..taken]);
        }

        if taken == remaining {
            self.next_field();
        } else {
            self.field = Field::Extra(remaining - taken);
        }

        taken
    }

    fn read_string(&mut self, rest: &[u8]) -> usize {
        let Some(length) = rest.iter().position(|&b| b == 0) else {
            self.buffer.extend_from_slice(rest);
            return rest.len();
        };
        self.buffer.extend_from_slice(&rest[..length]);

        let value = self.buffer.iter().map(|&b| b as char).collect();
        match self.field {
            Field::Name => self.header.filename = Some(value),
            _ => self.header.comment = Some(value)
        }

        self.next_field();
        length + 1
    }

    fn read_header_crc(&mut self, rest: &[u8]) -> Result<usize, GzipHeaderError> {
        let taken = self.fill(rest, 2);

        if self.buffer.len() == 2 {
            let expected = LittleEndian::read_u16(&self.buffer);
            let actual = (self.crc.sum() & 0xffff) as u16;

            if expected != actual {
                return Err(GzipHeaderError::HeaderChecksum { expected, actual });
            }

            self.next_field();
        }

        Ok(taken)
    }

    /// Moves on to the next field present according to the flags
    fn next_field(&mut self) {
        const ORDER: [(u8, Field); 4] = [
            (FEXTRA, Field::ExtraLength),
            (FNAME, Field::Name),
            (FCOMMENT, Field::Comment),
            (FHCRC, Field::HeaderCrc)
        ];

        let position = match self.field {
            Field::Fixed => 0,
            Field::ExtraLength | Field::Extra(..) => 1,
            Field::Name => 2,
            Field::Comment => 3,
            Field::HeaderCrc | Field::Done => ORDER.len()
        };

        let flags = self.header.flags;
        self.field = ORDER[position..].iter()
            .find(|(flag, _)| flags & flag != 0)
            .map_or(Field::Done, |&(_, field)| field);
        self.buffer.clear();
    }
}

/// The CRC32 and ISIZE fields that follow a gzip member body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipTrailer {
    pub crc32: u32,
    pub size: u32
}

impl GzipTrailer {
    /// Attempts to read a gzip trailer. Returns None if there isn't enough data
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Option<Self> {
        let data = data.as_ref();
        if data.len() < GZIP_TRAILER_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let crc32 = cursor.read_u32::<LittleEndian>().ok()?;
        let size = cursor.read_u32::<LittleEndian>().ok()?;

        Some(Self {
            crc32,
            size
        })
    }
}
