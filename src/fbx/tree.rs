//! Generic FBX binary node tree.
//!
//! ```text
//! +--------------------------+
//! | Magic (23 bytes)         |
//! | Version (u32 LE)         |
//! +--------------------------+
//! | Node record              |  end_offset, num_properties, property_list_len
//! |   name_len (u8), name    |  (u32 each, u64 from version 7500)
//! |   properties...          |
//! |   child records...       |
//! |   null record            |  13 (or 25) zero bytes, only if children exist
//! +--------------------------+
//! | ... top-level records    |
//! | null record              |
//! +--------------------------+
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use super::compression::inflate_exact;
use super::format::*;
use crate::util::{Error, Result};

/// A typed node property. Arrays are always stored decompressed.
#[derive(Clone, Debug, PartialEq)]
pub enum FbxProperty {
    I16(i16),
    Bool(bool),
    I32(i32),
    F32(f32),
    F64(f64),
    I64(i64),
    String(String),
    F32Array(Vec<f32>),
    I32Array(Vec<i32>),
    F64Array(Vec<f64>),
    I64Array(Vec<i64>),
    BoolArray(Vec<bool>),
    Bytes(Vec<u8>),
}

impl FbxProperty {
    /// Type code used in the binary encoding.
    pub const fn type_code(&self) -> u8 {
        match self {
            Self::I16(_) => b'Y',
            Self::Bool(_) => b'C',
            Self::I32(_) => b'I',
            Self::F32(_) => b'F',
            Self::F64(_) => b'D',
            Self::I64(_) => b'L',
            Self::String(_) => b'S',
            Self::F32Array(_) => b'f',
            Self::I32Array(_) => b'i',
            Self::F64Array(_) => b'd',
            Self::I64Array(_) => b'l',
            Self::BoolArray(_) => b'b',
            Self::Bytes(_) => b'R',
        }
    }

    /// Integer value of any scalar integer-like property.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I16(v) => Some(v as i64),
            Self::Bool(v) => Some(v as i64),
            Self::I32(v) => Some(v as i64),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Floating point value of any numeric scalar property.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v as f64),
            Self::F64(v) => Some(v),
            Self::I16(v) => Some(v as f64),
            Self::I32(v) => Some(v as f64),
            Self::I64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Floating point array, widening `f32` arrays.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Self::F64Array(v) => Some(v.clone()),
            Self::F32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    /// Integer array, accepting both 32 and 64 bit encodings.
    pub fn to_i32_vec(&self) -> Option<Vec<i32>> {
        match self {
            Self::I32Array(v) => Some(v.clone()),
            Self::I64Array(v) => Some(v.iter().map(|&x| x as i32).collect()),
            _ => None,
        }
    }
}

/// A node: name, ordered properties and owned children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FbxNode {
    pub name: String,
    pub properties: Vec<FbxProperty>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The `nth` direct child called `name` (no recursion).
    pub fn find_child(&self, name: &str, nth: usize) -> Option<&FbxNode> {
        self.children.iter().filter(|c| c.name == name).nth(nth)
    }

    /// First direct child called `name`.
    #[inline]
    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.find_child(name, 0)
    }

    /// Direct children called `name`, in file order.
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a FbxNode> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter(move |c| c.name == name)
    }

    #[inline]
    pub fn property(&self, index: usize) -> Option<&FbxProperty> {
        self.properties.get(index)
    }

    /// String value of the first property of child `name`.
    pub fn child_str(&self, name: &str) -> Option<&str> {
        self.child(name)?.property(0)?.as_str()
    }
}

/// A parsed FBX file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FbxTree {
    pub version: u32,
    pub roots: Vec<FbxNode>,
}

impl FbxTree {
    /// Parse an FBX file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::open(path, e))?;
        Self::read(BufReader::new(file))
    }

    /// Parse from any byte stream.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut stream = NodeStream { inner: reader, pos: 0, wide: false };

        let mut magic = [0u8; 23];
        stream.read_exact(&mut magic)?;
        if &magic != FBX_MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = stream.read_u32()?;
        stream.wide = version >= WIDE_HEADER_VERSION;
        debug!(version, "reading FBX tree");

        let mut roots = Vec::new();
        while let Some(node) = stream.read_node(version)? {
            roots.push(node);
        }
        Ok(Self { version, roots })
    }

    /// The `nth` top-level node called `name`.
    pub fn find_child(&self, name: &str, nth: usize) -> Option<&FbxNode> {
        self.roots.iter().filter(|n| n.name == name).nth(nth)
    }
}

/// Reader that tracks the absolute stream position for offset checks.
struct NodeStream<R> {
    inner: R,
    pos: u64,
    wide: bool,
}

impl<R: Read> NodeStream<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| self.eof_or_io(e))?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn read_vec(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut buf)?;
        if (buf.len() as u64) < len {
            return Err(Error::UnexpectedEof(self.pos + buf.len() as u64));
        }
        self.pos += len;
        Ok(buf)
    }

    fn eof_or_io(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof(self.pos)
        } else {
            Error::Io(e)
        }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let v = self.inner.read_u8().map_err(|e| self.eof_or_io(e))?;
        self.pos += 1;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let v = self.inner.read_u32::<LittleEndian>().map_err(|e| self.eof_or_io(e))?;
        self.pos += 4;
        Ok(v)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let v = self.inner.read_u64::<LittleEndian>().map_err(|e| self.eof_or_io(e))?;
        self.pos += 8;
        Ok(v)
    }

    /// Header field: u32 before version 7500, u64 after.
    fn read_header_field(&mut self) -> Result<u64> {
        if self.wide {
            self.read_u64()
        } else {
            self.read_u32().map(u64::from)
        }
    }

    /// Read one node record; `None` for the null record ending a list.
    fn read_node(&mut self, version: u32) -> Result<Option<FbxNode>> {
        let start = self.pos;
        let end_offset = self.read_header_field()?;
        let num_properties = self.read_header_field()?;
        let _property_list_len = self.read_header_field()?;
        let name_len = self.read_u8()?;

        if end_offset == 0 {
            return Ok(None);
        }
        if end_offset <= start {
            return Err(Error::corrupted(format!(
                "node at {} ends at {}, before its own header",
                start, end_offset
            )));
        }

        let name = String::from_utf8_lossy(&self.read_vec(name_len as u64)?).into_owned();
        let mut node = FbxNode::new(name);
        node.properties.reserve(num_properties.min(1024) as usize);
        for _ in 0..num_properties {
            let property = self.read_property()?;
            node.properties.push(property);
        }

        if self.pos < end_offset {
            let sentinel = sentinel_len(version);
            while self.pos + sentinel < end_offset {
                match self.read_node(version)? {
                    Some(child) => node.children.push(child),
                    None => {
                        return Err(Error::corrupted(format!(
                            "unexpected null record inside node '{}'",
                            node.name
                        )))
                    }
                }
            }
            let zeros = self.read_vec(sentinel)?;
            if zeros.iter().any(|&b| b != 0) {
                return Err(Error::corrupted(format!("Expected {} zero bytes", sentinel)));
            }
        }

        if self.pos != end_offset {
            return Err(Error::corrupted(format!(
                "node '{}' ended at {}, expected end offset {}",
                node.name, self.pos, end_offset
            )));
        }
        Ok(Some(node))
    }

    fn read_property(&mut self) -> Result<FbxProperty> {
        let code = self.read_u8()?;
        let property = match code {
            b'Y' => {
                let mut b = [0u8; 2];
                self.read_exact(&mut b)?;
                FbxProperty::I16(i16::from_le_bytes(b))
            }
            b'C' => FbxProperty::Bool(self.read_u8()? != 0),
            b'I' => FbxProperty::I32(self.read_u32()? as i32),
            b'F' => FbxProperty::F32(f32::from_bits(self.read_u32()?)),
            b'D' => FbxProperty::F64(f64::from_bits(self.read_u64()?)),
            b'L' => FbxProperty::I64(self.read_u64()? as i64),
            b'S' => {
                let len = self.read_u32()?;
                FbxProperty::String(String::from_utf8_lossy(&self.read_vec(len as u64)?).into_owned())
            }
            b'R' => {
                let len = self.read_u32()?;
                FbxProperty::Bytes(self.read_vec(len as u64)?)
            }
            b'f' => FbxProperty::F32Array(self.read_array(4, |b| {
                f32::from_le_bytes([b[0], b[1], b[2], b[3]])
            })?),
            b'd' => FbxProperty::F64Array(self.read_array(8, |b| {
                f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            })?),
            b'i' => FbxProperty::I32Array(self.read_array(4, |b| {
                i32::from_le_bytes([b[0], b[1], b[2], b[3]])
            })?),
            b'l' => FbxProperty::I64Array(self.read_array(8, |b| {
                i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            })?),
            b'b' => FbxProperty::BoolArray(self.read_array(1, |b| b[0] != 0)?),
            other => {
                return Err(Error::corrupted(format!(
                    "unknown property type code 0x{:02x} at {}",
                    other,
                    self.pos - 1
                )))
            }
        };
        Ok(property)
    }

    /// Array property: `length, encoding, compressed_len`, then the payload.
    /// Elements are decoded explicitly as little-endian.
    fn read_array<T>(&mut self, elem_size: usize, decode: impl Fn(&[u8]) -> T) -> Result<Vec<T>> {
        let length = self.read_u32()? as usize;
        let encoding = self.read_u32()?;
        let stored_len = self.read_u32()?;
        let stored = self.read_vec(stored_len as u64)?;
        let expected = length
            .checked_mul(elem_size)
            .ok_or_else(|| Error::corrupted(format!("array of {} elements is too large", length)))?;

        let bytes = match encoding {
            ARRAY_ENCODING_RAW => {
                if stored.len() != expected {
                    return Err(Error::corrupted(format!(
                        "array of {} elements stores {} bytes, expected {}",
                        length,
                        stored.len(),
                        expected
                    )));
                }
                stored
            }
            ARRAY_ENCODING_ZLIB => inflate_exact(&stored, expected)?,
            other => {
                return Err(Error::corrupted(format!("unknown array encoding {}", other)));
            }
        };
        Ok(bytes.chunks_exact(elem_size).map(decode).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbx::testing::{encode, encode_with};

    fn sample_tree() -> FbxTree {
        let mut objects = FbxNode::new("Objects");
        let mut geometry = FbxNode::new("Geometry");
        geometry.properties = vec![
            FbxProperty::I64(42),
            FbxProperty::String("Cube\x00\x01Geometry".into()),
            FbxProperty::String("Mesh".into()),
        ];
        let mut vertices = FbxNode::new("Vertices");
        vertices.properties = vec![FbxProperty::F64Array(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])];
        let mut indices = FbxNode::new("PolygonVertexIndex");
        indices.properties = vec![FbxProperty::I32Array(vec![0, 1, -3])];
        geometry.children = vec![vertices, indices];
        objects.children.push(geometry);

        let mut header = FbxNode::new("FBXHeaderExtension");
        header.properties = vec![
            FbxProperty::I16(-2),
            FbxProperty::Bool(true),
            FbxProperty::F32(1.5),
            FbxProperty::Bytes(vec![9, 8, 7]),
            FbxProperty::BoolArray(vec![true, false]),
            FbxProperty::I64Array(vec![-1, 5]),
            FbxProperty::F32Array(vec![0.25]),
        ];
        FbxTree { version: 7400, roots: vec![header, objects] }
    }

    #[test]
    fn test_roundtrip_plain() {
        let tree = sample_tree();
        let bytes = encode(&tree);
        let parsed = FbxTree::read(bytes.as_slice()).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_roundtrip_compressed_arrays() {
        let tree = sample_tree();
        let bytes = encode_with(&tree, true);
        let parsed = FbxTree::read(bytes.as_slice()).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_wide_headers() {
        let mut tree = sample_tree();
        tree.version = 7500;
        let parsed = FbxTree::read(encode(&tree).as_slice()).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_find_child_is_direct_only() {
        let tree = sample_tree();
        let objects = tree.find_child("Objects", 0).unwrap();
        assert!(objects.find_child("Geometry", 0).is_some());
        assert!(objects.find_child("Geometry", 1).is_none());
        // Vertices is a grandchild, not a child.
        assert!(objects.find_child("Vertices", 0).is_none());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&sample_tree());
        bytes[0] = b'X';
        assert!(matches!(FbxTree::read(bytes.as_slice()), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_corrupted_sentinel() {
        let tree = FbxTree {
            version: 7400,
            roots: vec![FbxNode {
                name: "A".into(),
                properties: vec![],
                children: vec![FbxNode::new("B")],
            }],
        };
        let mut bytes = encode(&tree);
        // Layout: magic(23) + version(4) + A header(13) + "A"(1) + B header(13) + "B"(1)
        // + sentinel(13) + top-level null record(13).
        let sentinel_start = 23 + 4 + 13 + 1 + 13 + 1;
        bytes[sentinel_start + 5] = 0xFF;
        let err = FbxTree::read(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Corrupted(ref m) if m.contains("Expected 13 zero bytes")));
    }

    /// A file holding one node `N` with a single raw property record.
    fn single_property_file(prop: &[u8]) -> Vec<u8> {
        let mut bytes = FBX_MAGIC.to_vec();
        bytes.extend_from_slice(&7400u32.to_le_bytes());
        let end = bytes.len() + 13 + 1 + prop.len();
        bytes.extend_from_slice(&(end as u32).to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(prop.len() as u32).to_le_bytes());
        bytes.push(1);
        bytes.push(b'N');
        bytes.extend_from_slice(prop);
        bytes.extend_from_slice(&[0u8; 13]);
        bytes
    }

    fn array_property(code: u8, length: u32, encoding: u32, payload: &[u8]) -> Vec<u8> {
        let mut prop = vec![code];
        prop.extend_from_slice(&length.to_le_bytes());
        prop.extend_from_slice(&encoding.to_le_bytes());
        prop.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        prop.extend_from_slice(payload);
        prop
    }

    #[test]
    fn test_compressed_size_mismatch() {
        // 'd' array claiming 3 elements while the zlib stream only holds 2.
        let prop = array_property(b'd', 3, ARRAY_ENCODING_ZLIB, &deflate_doubles(&[1.0, 2.0]));
        let err = FbxTree::read(single_property_file(&prop).as_slice()).unwrap_err();
        assert!(matches!(err, Error::Corrupted(_)));
    }

    #[test]
    fn test_oversized_array_length() {
        let payload = crate::fbx::compression::deflate(&[0; 8]).unwrap();
        let prop = array_property(b'i', u32::MAX, ARRAY_ENCODING_ZLIB, &payload);
        let err = FbxTree::read(single_property_file(&prop).as_slice()).unwrap_err();
        assert!(matches!(err, Error::Corrupted(_)));

        let prop = array_property(b'l', u32::MAX, ARRAY_ENCODING_RAW, &[0; 16]);
        let err = FbxTree::read(single_property_file(&prop).as_slice()).unwrap_err();
        assert!(matches!(err, Error::Corrupted(_)));
    }

    #[test]
    fn test_children_named_outlives_name() {
        let tree = sample_tree();
        let objects = tree.find_child("Objects", 0).unwrap();
        let geometry = {
            let name = String::from("Geometry");
            let geometry = objects.children_named(&name).next().unwrap();
            geometry
        };
        assert_eq!(geometry.children.len(), 2);
    }

    #[test]
    fn test_truncated_file() {
        let bytes = encode(&sample_tree());
        let err = FbxTree::read(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof(_)));
    }

    fn deflate_doubles(values: &[f64]) -> Vec<u8> {
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        crate::fbx::compression::deflate(&raw).unwrap()
    }
}
