// Per-column block compression (zlib via flate2).
// Blocks are opaque to callers: raw bytes in, compressed bytes out.
use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_LEVEL: u32 = 6;
pub const MAX_LEVEL: u32 = 9;

// Upper bound on buffer pre-allocation driven by on-disk sizes.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Rejects compression levels outside `0..=MAX_LEVEL`.
pub fn check_level(level: u32) -> Result<(), Error> {
    if level > MAX_LEVEL {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("compression level {level} out of range (0-{MAX_LEVEL})"))
            .with_hint("Pass a level between 0 (store) and 9 (smallest)."));
    }
    Ok(())
}

pub fn compress(raw: &[u8], level: u32) -> Result<Vec<u8>, Error> {
    check_level(level)?;
    let compression_failed = |err: io::Error| {
        Error::new(ErrorKind::Internal)
            .with_message("compression failed")
            .with_source(err)
    };
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::new(level));
    encoder.write_all(raw).map_err(compression_failed)?;
    encoder.finish().map_err(compression_failed)
}

/// Inflates one block and checks it against the stored uncompressed size.
///
/// Output is capped one byte past `expected_len`, so oversized streams are
/// reported as a mismatch without inflating them fully.
pub fn decompress(block: &[u8], expected_len: u64) -> Result<Vec<u8>, Error> {
    let cap = usize::try_from(expected_len).unwrap_or(usize::MAX);
    let mut out = Vec::with_capacity(cap.min(MAX_PREALLOC));
    ZlibDecoder::new(block)
        .take(expected_len.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("column block failed to decompress")
                .with_source(err)
        })?;
    if out.len() as u64 != expected_len {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message("decompressed size mismatch")
            .with_mismatch(expected_len, out.len()));
    }
    Ok(out)
}
