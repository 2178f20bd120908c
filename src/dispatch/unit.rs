/// Timing information carried from an input unit to the output unit decoded from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct UnitMetadata {
    pub timestamp: Option<u64>,
    pub offset: Option<u64>
}

impl UnitMetadata {
    pub fn new(timestamp: Option<u64>, offset: Option<u64>) -> Self {
        Self {
            timestamp,
            offset
        }
    }

    /// Returns whether any field of "self" goes backwards compared to "previous"
    pub fn precedes(&self, previous: &Self) -> bool {
        let backwards = |current: Option<u64>, previous: Option<u64>| {
            matches!((current, previous), (Some(c), Some(p)) if c < p)
        };

        backwards(self.timestamp, previous.timestamp) || backwards(self.offset, previous.offset)
    }
}

/// One delivery of compressed bytes. Borrowed for the duration of a single dispatch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputUnit<'a> {
    pub data: &'a [u8],
    pub metadata: UnitMetadata
}

impl<'a> InputUnit<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            metadata: UnitMetadata::default()
        }
    }

    pub fn with_metadata(mut self, metadata: UnitMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a> From<&'a [u8]> for InputUnit<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for InputUnit<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a Vec<u8>> for InputUnit<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// The decompressed bytes produced by one dispatch call, as a list of chunks
///
/// Chunks are never empty. "offset" is the amount of bytes decompressed
/// in the current stream before this unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputUnit {
    chunks: Vec<Vec<u8>>,
    pub metadata: UnitMetadata,
    pub offset: u64
}

impl OutputUnit {
    pub fn new(metadata: UnitMetadata, offset: u64) -> Self {
        Self {
            chunks: Vec::new(),
            metadata,
            offset
        }
    }

    pub(crate) fn push_chunk(&mut self, chunk: Vec<u8>) {
        debug_assert!(!chunk.is_empty());
        self.chunks.push(chunk);
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Vec<u8>> {
        self.chunks
    }

    /// Total amount of decompressed bytes in this unit
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenates all chunks
    pub fn to_vec(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// Offset right after the last byte of this unit
    pub fn end_offset(&self) -> u64 {
        self.offset + self.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_ordering() {
        let previous = UnitMetadata::new(Some(10), Some(100));

        assert!(!UnitMetadata::new(Some(10), Some(100)).precedes(&previous));
        assert!(!UnitMetadata::new(Some(11), None).precedes(&previous));
        assert!(!UnitMetadata::default().precedes(&previous));
        assert!(UnitMetadata::new(Some(9), Some(200)).precedes(&previous));
        assert!(UnitMetadata::new(None, Some(99)).precedes(&previous));
    }

    #[test]
    fn output_unit_lengths() {
        let mut unit = OutputUnit::new(UnitMetadata::default(), 5);
        assert!(unit.is_empty());
        assert_eq!(unit.end_offset(), 5);

        unit.push_chunk(b"abc".to_vec());
        unit.push_chunk(b"de".to_vec());

        assert_eq!(unit.len(), 5);
        assert_eq!(unit.to_vec(), b"abcde");
        assert_eq!(unit.end_offset(), 10);
        assert_eq!(unit.into_chunks().len(), 2);
    }
}
