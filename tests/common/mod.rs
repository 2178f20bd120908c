#![allow(dead_code)]

use std::io::Write;

use stream_gzdec::{Decoded, DispatchError, Dispatcher, Flow};

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Deterministic, mildly compressible bytes
pub fn payload(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            if i % 3 == 0 { b'a' + (state % 4) as u8 } else { (state >> 24) as u8 }
        })
        .collect()
}

/// Feeds "units" one after another, returning every decoded unit
pub fn feed<'a>(dispatcher: &mut Dispatcher, units: impl IntoIterator<Item = &'a [u8]>) -> Result<Vec<Decoded>, DispatchError> {
    units.into_iter()
        .map(|unit| dispatcher.update(unit))
        .collect()
}

pub fn concat(decoded: &[Decoded]) -> Vec<u8> {
    decoded.iter().flat_map(|d| d.unit.to_vec()).collect()
}

pub fn end_count(decoded: &[Decoded]) -> usize {
    decoded.iter().filter(|d| d.flow == Flow::EndOfStream).count()
}

/// Splits "data" into consecutive pieces of the given sizes, the last piece taking the rest
pub fn split<'a>(data: &'a [u8], sizes: &[usize]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut rest = data;

    for &size in sizes {
        let size = std::cmp::min(size, rest.len());
        let (piece, tail) = rest.split_at(size);
        pieces.push(piece);
        rest = tail;
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }

    pieces
}
