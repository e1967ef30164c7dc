//! zlib support for FBX array properties.

use std::io::Read;
use flate2::read::ZlibDecoder;

use crate::util::{Error, Result};

/// Upper bound on zlib expansion used to size the output buffer up front.
const MAX_RATIO: usize = 64;
/// Largest buffer reserved before any data has been decoded.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Compress data into a zlib stream, as FBX exporters store large arrays.
#[cfg(test)]
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a zlib stream that must expand to exactly `expected_len` bytes.
///
/// A short or long result is a corruption error, never silently truncated.
pub fn inflate_exact(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let decoder = ZlibDecoder::new(data);
    // The declared length comes from the file; let the buffer grow with
    // the data actually decoded instead of trusting it.
    let capacity = expected_len.min(data.len().saturating_mul(MAX_RATIO)).min(MAX_PREALLOC);
    let mut decompressed = Vec::with_capacity(capacity);

    // One byte past the expected size is enough to detect oversized streams.
    decoder
        .take((expected_len as u64).saturating_add(1))
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::corrupted(format!("invalid zlib stream in array property: {}", e)))?;

    if decompressed.len() != expected_len {
        return Err(Error::corrupted(format!(
            "compressed array expanded to {} bytes, expected {}",
            decompressed.len(),
            expected_len
        )));
    }
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let original: Vec<u8> = (0..4000u32).flat_map(|i| (i % 7).to_le_bytes()).collect();
        let compressed = deflate(&original).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(inflate_exact(&compressed, original.len()).unwrap(), original);
    }

    #[test]
    fn test_size_mismatch_is_corruption() {
        let compressed = deflate(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert!(matches!(inflate_exact(&compressed, 12), Err(Error::Corrupted(_))));
        assert!(matches!(inflate_exact(&compressed, 4), Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_huge_declared_length_is_corruption() {
        let compressed = deflate(&[0; 16]).unwrap();
        let err = inflate_exact(&compressed, usize::MAX / 2).unwrap_err();
        assert!(matches!(err, Error::Corrupted(ref m) if m.contains("expanded to 16 bytes")));
    }

    #[test]
    fn test_garbage_is_corruption() {
        assert!(matches!(inflate_exact(b"definitely not zlib", 8), Err(Error::Corrupted(_))));
    }
}
