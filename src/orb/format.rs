//! `.orb` container constants and version packing.
//!
//! ```text
//! +------------------------------+
//! | version (u32)                |  major << 24 | minor << 12 | patch
//! | object_count (u32)           |
//! +------------------------------+
//! | id (u64)                     |
//! | type (u8)                    |  ResourceType code
//! | payload_size (u32)           |
//! | name_len (u32), name         |
//! | payload                      |
//! +------------------------------+
//! | ... next resource            |
//! ```
//!
//! All values are little-endian. Cross references inside payloads are signed
//! offsets between positions in one write batch (`target - referrer`); `0`
//! means "no reference".

use std::fmt;

/// Offset of the object count in the file header.
pub const OBJECT_COUNT_OFFSET: u64 = 4;

/// Size of the file header in bytes.
pub const FILE_HEADER_SIZE: u64 = 8;

/// Offset of `payload_size` within a resource header.
pub const PAYLOAD_SIZE_OFFSET: u64 = 9;

/// Resource header size without the name.
pub const RESOURCE_HEADER_SIZE: u64 = 17;

/// Relative offset meaning "no reference".
pub const NO_REFERENCE: i64 = 0;

/// Codec version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Packed on-disk form. Minor and patch get 12 bits each.
    #[inline]
    pub const fn pack(self) -> u32 {
        (self.major << 24) | ((self.minor & 0xFFF) << 12) | (self.patch & 0xFFF)
    }

    #[inline]
    pub const fn unpack(packed: u32) -> Self {
        Self {
            major: packed >> 24,
            minor: (packed >> 12) & 0xFFF,
            patch: packed & 0xFFF,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version written by this codec. Files with any other version cannot be
/// appended to; newer files cannot be read.
pub const CURRENT_VERSION: Version = Version::new(0, 3, 0);
