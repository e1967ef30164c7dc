//! `.orb` container reader: index scan and per-item decoding.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::format::*;
use super::payload::OrbPayload;
use super::stream::IStream;
use crate::resource::ResourceType;
use crate::util::{Error, Result};

/// Location of one resource in the file.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub id: u64,
    /// Offset of the resource header.
    pub offset: u64,
    pub resource_type: ResourceType,
    pub name: String,
    pub payload_size: u32,
}

/// A decoded resource.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbItem {
    pub id: u64,
    pub resource_type: ResourceType,
    pub name: String,
    pub payload: OrbPayload,
}

impl fmt::Display for OrbItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {} '{}'", self.id, self.resource_type, self.name)?;
        write!(f, "{}", self.payload)
    }
}

/// An opened container with its index.
pub struct OrbFile {
    path: PathBuf,
    stream: IStream<BufReader<File>>,
    version: Version,
    object_count: u32,
    entries: Vec<IndexEntry>,
    by_id: HashMap<u64, usize>,
}

impl fmt::Debug for OrbFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrbFile")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("objects", &self.entries.len())
            .finish()
    }
}

impl OrbFile {
    /// Open a container and index its resources.
    ///
    /// Files newer than the codec are rejected; older ones are read as far
    /// as their layout allows.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut stream = IStream::open(path)?;

        let version = Version::unpack(stream.read_u32()?);
        if version > CURRENT_VERSION {
            return Err(Error::VersionTooNew {
                found: version.to_string(),
                supported: CURRENT_VERSION.to_string(),
            });
        }
        if version < CURRENT_VERSION {
            warn!("{}: container version {} is older than {}", path.display(), version, CURRENT_VERSION);
        }
        let object_count = stream.read_u32()?;

        let mut entries = Vec::with_capacity(object_count.min(1 << 16) as usize);
        let mut by_id = HashMap::new();
        for _ in 0..object_count {
            let offset = stream.pos();
            let id = stream.read_u64()?;
            let resource_type = ResourceType::from_code(stream.read_u8()?)?;
            let payload_size = stream.read_u32()?;
            let name = stream.read_string()?;
            stream.seek(stream.pos() + payload_size as u64)?;

            if by_id.insert(id, entries.len()).is_some() {
                return Err(Error::corrupted(format!("duplicate resource id {} at offset {}", id, offset)));
            }
            entries.push(IndexEntry { id, offset, resource_type, name, payload_size });
        }

        if stream.pos() != stream.len() {
            return Err(Error::corrupted(format!(
                "{}: {} trailing byte(s) after {} object(s)",
                path.display(),
                stream.len() - stream.pos(),
                object_count
            )));
        }
        debug!(path = %path.display(), %version, objects = entries.len(), "indexed container");

        Ok(Self {
            path: path.to_path_buf(),
            stream,
            version,
            object_count,
            entries,
            by_id,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Object count stored in the file header.
    #[inline]
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Index entries in file order.
    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, id: u64) -> Option<&IndexEntry> {
        self.by_id.get(&id).map(|&i| &self.entries[i])
    }

    pub fn find(&self, name: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Write the index as a table: id, type, name, payload size.
    pub fn print_index<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{} (version {}, {} objects)", self.path.display(), self.version, self.entries.len())?;
        writeln!(out, "{:>6}  {:<18}  {:>10}  name", "id", "type", "size")?;
        for e in &self.entries {
            writeln!(out, "{:>6}  {:<18}  {:>10}  {}", e.id, e.resource_type.as_str(), e.payload_size, e.name)?;
        }
        Ok(())
    }

    /// Decode the resource with `id`.
    pub fn item_details(&mut self, id: u64) -> Result<OrbItem> {
        let offset = self.entry(id).map(|e| e.offset).ok_or(Error::ObjectNotFound(id))?;

        self.stream.seek(offset)?;
        let found = self.stream.read_u64()?;
        if found != id {
            return Err(Error::IdMismatch { expected: id, found });
        }
        let resource_type = ResourceType::from_code(self.stream.read_u8()?)?;
        let payload_size = self.stream.read_u32()?;
        let name = self.stream.read_string()?;

        let start = self.stream.pos();
        let payload = OrbPayload::read(&mut self.stream, resource_type)?;
        let consumed = self.stream.pos() - start;
        if consumed != payload_size as u64 {
            return Err(Error::corrupted(format!(
                "resource {} '{}': payload is {} bytes, decoded {}",
                id, name, payload_size, consumed
            )));
        }
        Ok(OrbItem { id, resource_type, name, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intermediate::{OrbIntermediate, OrbValue};
    use crate::orb::OrbWriter;
    use crate::resource::*;

    fn write(path: &Path) {
        let mut batch = OrbIntermediate::new();
        batch
            .append_object("sampler", OrbValue::SamplerState(OrbSamplerState::default()))
            .unwrap();
        batch
            .append_object("albedo", OrbValue::Texture(OrbTexture::reference("albedo.dds")))
            .unwrap();
        let mut writer = OrbWriter::create(path).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_index_and_details() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.orb");
        write(&path);

        let mut file = OrbFile::open(&path).unwrap();
        assert_eq!(file.version(), CURRENT_VERSION);
        assert_eq!(file.object_count(), 2);
        assert_eq!(file.entries().len(), 2);
        assert_eq!(file.entry(1).unwrap().resource_type, ResourceType::TextureReference);
        assert_eq!(file.find("sampler").unwrap().payload_size, 4);

        let item = file.item_details(1).unwrap();
        assert_eq!(item.name, "albedo");
        assert_eq!(item.payload, OrbPayload::TextureReference { path: "albedo.dds".into() });
        assert!(item.to_string().contains("path: albedo.dds"));

        let mut listing = Vec::new();
        file.print_index(&mut listing).unwrap();
        let listing = String::from_utf8(listing).unwrap();
        assert!(listing.contains("SAMPLER_STATE"));
        assert!(listing.contains("albedo"));
    }

    #[test]
    fn test_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.orb");
        write(&path);
        let mut file = OrbFile::open(&path).unwrap();
        assert!(matches!(file.item_details(7), Err(Error::ObjectNotFound(7))));
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.orb");
        let mut bytes = Version::new(9, 0, 0).pack().to_le_bytes().to_vec();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(OrbFile::open(&path), Err(Error::VersionTooNew { .. })));
    }

    #[test]
    fn test_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.orb");
        write(&path);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 3);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(OrbFile::open(&path), Err(Error::UnexpectedEof(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.orb");
        write(&path);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0; 20]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(OrbFile::open(&path), Err(Error::Corrupted(ref m)) if m.contains("trailing")));
    }

    #[test]
    fn test_id_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.orb");
        write(&path);
        let mut file = OrbFile::open(&path).unwrap();
        // Point the second entry at the first header.
        file.entries[1].offset = file.entries[0].offset;
        assert!(matches!(
            file.item_details(1),
            Err(Error::IdMismatch { expected: 1, found: 0 })
        ));
    }
}
