//! `.orb` container writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use super::compiler::{NoCompiler, ShaderCompiler};
use super::format::*;
use super::payload::{self, ReferenceResolver};
use super::stream::{IStream, OStream};
use crate::intermediate::{OrbIntermediate, OrbValue};
use crate::resource::*;
use crate::util::{Error, Result};

/// Resolves names for the object at `from` within one batch.
struct BatchRefs<'a> {
    batch: &'a OrbIntermediate,
    from: usize,
}

impl ReferenceResolver for BatchRefs<'_> {
    fn offset(&self, name: Option<&str>) -> Result<i64> {
        let Some(name) = name else {
            return Ok(NO_REFERENCE);
        };
        self.batch
            .offset_from_name(self.from, name)
            .ok_or_else(|| Error::UnresolvedReference {
                from: self.batch.objects()[self.from].name.clone(),
                target: name.to_string(),
            })
    }
}

/// Writes an [`OrbIntermediate`] into a container file.
pub struct OrbWriter {
    stream: OStream<BufWriter<File>>,
    next_id: u64,
    object_count: u32,
    compiler: Box<dyn ShaderCompiler>,
}

impl OrbWriter {
    /// Create a new container, truncating any existing file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut stream = OStream::create(path.as_ref())?;
        stream.write_u32(CURRENT_VERSION.pack())?;
        stream.write_u32(0)?;
        debug!(path = %path.as_ref().display(), version = %CURRENT_VERSION, "created container");
        Ok(Self {
            stream,
            next_id: 0,
            object_count: 0,
            compiler: Box::new(NoCompiler),
        })
    }

    /// Open an existing container for appending.
    ///
    /// The file must carry exactly the current codec version; otherwise it
    /// is left untouched and a version error is returned.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| Error::open(path, e))?;

        let (object_count, max_id) = scan_existing(&file)?;
        let mut stream = OStream::new(BufWriter::with_capacity(1024 * 1024, file));
        stream.seek_end()?;
        debug!(
            path = %path.display(),
            objects = object_count,
            "appending to container"
        );
        Ok(Self {
            stream,
            next_id: max_id.map_or(0, |id| id + 1),
            object_count,
            compiler: Box::new(NoCompiler),
        })
    }

    /// Use `compiler` for shaders that carry a compile request.
    pub fn with_compiler(mut self, compiler: impl ShaderCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    /// Id the next written object receives.
    #[inline]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Total number of objects in the file after the writes so far.
    #[inline]
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Write every object of `batch`. References are resolved and every
    /// payload (including compiled shaders) is encoded before the file is
    /// touched; a failed batch leaves the container as it was.
    pub fn write(&mut self, batch: &OrbIntermediate) -> Result<()> {
        for object in batch.objects() {
            for target in object.value.references() {
                if !batch.contains(target) {
                    return Err(Error::UnresolvedReference {
                        from: object.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        let count = u32::try_from(batch.len())
            .ok()
            .and_then(|n| n.checked_add(self.object_count))
            .ok_or_else(|| Error::other("too many objects for one container"))?;

        let mut records = OStream::new(Cursor::new(Vec::new()));
        for (index, object) in batch.objects().iter().enumerate() {
            let id = self.next_id + index as u64;
            let refs = BatchRefs { batch, from: index };
            self.encode_object(&mut records, id, &object.name, &object.value, &refs)?;
        }
        let records = records.into_inner()?.into_inner();

        let start = self.stream.pos();
        if let Err(e) = self.commit(&records, count) {
            self.rollback(start);
            return Err(e);
        }

        self.next_id += batch.len() as u64;
        self.object_count = count;
        info!("wrote {} object(s), {} in container", batch.len(), self.object_count);
        Ok(())
    }

    /// Append encoded records and patch the header count.
    fn commit(&mut self, records: &[u8], count: u32) -> Result<()> {
        self.stream.write_bytes(records)?;
        let end = self.stream.pos();
        self.stream.seek(OBJECT_COUNT_OFFSET)?;
        self.stream.write_u32(count)?;
        self.stream.seek(end)?;
        self.stream.flush()
    }

    /// Cut the file back to `len` and restore the previous count.
    fn rollback(&mut self, len: u64) {
        let restored = self.stream.truncate(len).and_then(|_| {
            self.stream.seek(OBJECT_COUNT_OFFSET)?;
            self.stream.write_u32(self.object_count)?;
            self.stream.seek(len)?;
            self.stream.flush()
        });
        if let Err(e) = restored {
            warn!("failed to roll back partial write: {}", e);
        }
    }

    fn encode_object<W: Write + Seek>(
        &self,
        out: &mut OStream<W>,
        id: u64,
        name: &str,
        value: &OrbValue,
        refs: &BatchRefs<'_>,
    ) -> Result<()> {
        let ty = value.resource_type();
        let header = out.pos();
        out.write_u64(id)?;
        out.write_u8(ty.code())?;
        out.write_u32(0)?;
        out.write_len_prefixed(name.as_bytes())?;
        let start = out.pos();

        match value {
            OrbValue::Material(m) => payload::write_material(out, m, refs)?,
            OrbValue::Mesh(m) => payload::write_mesh(out, m, refs)?,
            OrbValue::Texture(t) => payload::write_texture(out, t)?,
            OrbValue::ShaderCode(s) => match &s.compile {
                Some(request) => {
                    let bytecode = self.compiler.compile(s, request)?;
                    payload::write_shader(out, s.shader_type, &ShaderSource::Inline(bytecode))?
                }
                None => payload::write_shader(out, s.shader_type, &s.source)?,
            },
            OrbValue::ShaderBinary(s) => payload::write_shader(out, s.shader_type, &s.bytecode)?,
            OrbValue::InputLayout(l) => payload::write_input_layout(out, l)?,
            OrbValue::PipelineState(p) => payload::write_pipeline_state(out, p, refs)?,
            OrbValue::RasterizerState(r) => payload::write_rasterizer_state(out, r)?,
            OrbValue::BlendState(b) => payload::write_blend_state(out, b)?,
            OrbValue::SamplerState(s) => payload::write_sampler_state(out, s)?,
        }

        let end = out.pos();
        let size = u32::try_from(end - start)
            .map_err(|_| Error::other(format!("payload of '{}' exceeds 4 GiB", name)))?;
        out.seek(header + PAYLOAD_SIZE_OFFSET)?;
        out.write_u32(size)?;
        out.seek(end)?;
        debug!(id, name, ty = %ty, size, "encoded object");
        Ok(())
    }

    /// Flush buffered data to disk.
    pub fn finish(mut self) -> Result<()> {
        self.stream.flush()
    }
}

/// Read the header and index of an existing container: object count and
/// the largest id, after the version gate.
fn scan_existing(file: &File) -> Result<(u32, Option<u64>)> {
    let mut input = IStream::new(file)?;
    check_append_version(Version::unpack(input.read_u32()?))?;
    let object_count = input.read_u32()?;

    let mut max_id = None;
    for _ in 0..object_count {
        let (id, size) = skip_header(&mut input)?;
        input.seek(input.pos() + size as u64)?;
        max_id = max_id.max(Some(id));
    }
    if input.pos() != input.len() {
        return Err(Error::corrupted(format!(
            "{} trailing byte(s) after {} object(s)",
            input.len() - input.pos(),
            object_count
        )));
    }
    Ok((object_count, max_id))
}

fn skip_header<R: Read + Seek>(input: &mut IStream<R>) -> Result<(u64, u32)> {
    let id = input.read_u64()?;
    ResourceType::from_code(input.read_u8()?)?;
    let size = input.read_u32()?;
    let name_len = input.read_u32()?;
    input.seek(input.pos() + name_len as u64)?;
    Ok((id, size))
}

fn check_append_version(found: Version) -> Result<()> {
    if found > CURRENT_VERSION {
        Err(Error::VersionTooNew {
            found: found.to_string(),
            supported: CURRENT_VERSION.to_string(),
        })
    } else if found < CURRENT_VERSION {
        Err(Error::DeprecatedVersion {
            found: found.to_string(),
            current: CURRENT_VERSION.to_string(),
        })
    } else {
        Ok(())
    }
}
