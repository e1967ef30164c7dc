//! FBX binary format constants.

/// Magic bytes at the start of a binary FBX file.
pub const FBX_MAGIC: &[u8; 23] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// First version whose node records use 64-bit header fields.
pub const WIDE_HEADER_VERSION: u32 = 7500;

/// Size of the null record closing a child list (32-bit headers).
pub const SENTINEL_LEN: u64 = 13;

/// Size of the null record closing a child list (64-bit headers).
pub const WIDE_SENTINEL_LEN: u64 = 25;

/// Array property stored uncompressed.
pub const ARRAY_ENCODING_RAW: u32 = 0;

/// Array property stored as a zlib stream.
pub const ARRAY_ENCODING_ZLIB: u32 = 1;

/// Separator between an object's name and its class in name properties
/// (`"Cube\x00\x01Model"`).
pub const NAME_CLASS_SEPARATOR: &str = "\x00\x01";

/// Sentinel length for a file version.
#[inline]
pub const fn sentinel_len(version: u32) -> u64 {
    if version >= WIDE_HEADER_VERSION {
        WIDE_SENTINEL_LEN
    } else {
        SENTINEL_LEN
    }
}

/// Strip the class suffix from an object name property.
pub fn object_name(raw: &str) -> &str {
    raw.split(NAME_CLASS_SEPARATOR).next().unwrap_or(raw)
}
