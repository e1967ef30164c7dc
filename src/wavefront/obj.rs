//! Wavefront OBJ geometry reader.
//!
//! Supported directives: `v`, `vt`, `vn`, `f`, `o`, `usemtl`, `mtllib`.
//! Everything else (`g`, `s`, `l`, ...) is skipped up to the end of its line.
//! Position, UV and normal pools are shared by all objects of a file, as OBJ
//! indices are file-global.

use std::path::Path;

use glam::{Vec2, Vec3};
use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use super::mtl::MtlReader;
use crate::config::ConvertOptions;
use crate::intermediate::{OrbIntermediate, OrbValue};
use crate::lexer::{Lexer, TokenKind};
use crate::resource::{fan_triangulate, CornerGroup, NgonPolicy, OrbMesh, Vertex};
use crate::util::{Error, ParseErrorKind, Result};

/// Reads OBJ files (and the MTL libraries they name).
#[derive(Debug)]
pub struct ObjReader {
    policy: NgonPolicy,
}

/// Object under construction.
#[derive(Debug, Default)]
struct PendingObject {
    name: String,
    corners: Vec<Vertex>,
    groups: Vec<CornerGroup>,
    group_start: usize,
    material: Option<String>,
}

impl PendingObject {
    fn new(name: impl Into<String>, material: Option<String>) -> Self {
        Self { name: name.into(), material, ..Default::default() }
    }

    /// Close the running corner group, if it holds anything.
    fn close_group(&mut self) {
        let count = self.corners.len() - self.group_start;
        if count > 0 {
            self.groups.push(CornerGroup {
                start: self.group_start,
                count,
                material: self.material.clone(),
            });
        }
        self.group_start = self.corners.len();
    }

    fn use_material(&mut self, material: String) {
        self.close_group();
        self.material = Some(material);
    }
}

#[derive(Debug, Default)]
struct Pools {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
}

impl ObjReader {
    pub fn new(options: &ConvertOptions) -> Self {
        Self { policy: NgonPolicy::new(options.triangulate) }
    }

    /// Read `path`, appending one mesh per object. Returns the number of
    /// meshes appended.
    pub fn read_file(&mut self, path: impl AsRef<Path>, out: &mut OrbIntermediate) -> Result<usize> {
        let path = path.as_ref();
        let mut lexer = Lexer::open(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mesh".to_string());
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let meshes = self.read(&mut lexer, &stem, base_dir, out)?;
        info!("{}: {} mesh(es)", path.display(), meshes);
        Ok(meshes)
    }

    /// Read OBJ text from `lexer`. Geometry before the first `o` belongs to an
    /// object called `default_name`; `mtllib` paths resolve against
    /// `base_dir`.
    pub fn read(
        &mut self,
        lexer: &mut Lexer,
        default_name: &str,
        base_dir: &Path,
        out: &mut OrbIntermediate,
    ) -> Result<usize> {
        let mut pools = Pools::default();
        let mut object = PendingObject::new(default_name, None);
        let mut meshes = 0;

        while !lexer.at_end() {
            let directive = lexer.expect_identifier("Expected an OBJ directive")?;
            let line = lexer.previous().line;
            match directive.as_str() {
                "v" => {
                    let p = read_vec3(lexer)?;
                    pools.positions.push(p);
                    lexer.skip_line();
                }
                "vt" => {
                    let u = lexer.expect_number("Expected u coordinate")?;
                    let v = lexer.expect_number("Expected v coordinate")?;
                    pools.uvs.push(Vec2::new(u, v));
                    lexer.skip_line();
                }
                "vn" => {
                    let n = read_vec3(lexer)?;
                    pools.normals.push(n);
                    lexer.skip_line();
                }
                "f" => {
                    let face = read_face(lexer, line, &pools)?;
                    if face.len() < 3 {
                        trace!(line, corners = face.len(), "skipping degenerate face");
                        continue;
                    }
                    if !self.policy.accept(lexer.file(), face.len()) {
                        return Err(lexer.error_at(
                            ParseErrorKind::UnsupportedPolygon,
                            line,
                            format!(
                                "Face with {} vertices; enable triangulation to convert it",
                                face.len()
                            ),
                        ));
                    }
                    for tri in fan_triangulate(&face) {
                        object.corners.extend_from_slice(&tri);
                    }
                }
                "o" => {
                    let mut name = lexer.rest_of_line();
                    if name.is_empty() {
                        name = default_name.to_string();
                    }
                    let material = object.material.clone();
                    let finished = std::mem::replace(&mut object, PendingObject::new(name, material));
                    meshes += emit(finished, out)?;
                }
                "usemtl" => {
                    let material = lexer.rest_of_line();
                    if material.is_empty() {
                        return Err(lexer.error_at(ParseErrorKind::Semantic, line, "usemtl without a material name"));
                    }
                    object.use_material(material);
                }
                "mtllib" => {
                    let file = lexer.rest_of_line();
                    let mtl_path = base_dir.join(&file);
                    match MtlReader::new().read_file(&mtl_path, out) {
                        Ok(_) => {}
                        Err(Error::FileNotFound(missing)) => {
                            warn!("{}: material library {} not found", lexer.file(), missing.display());
                        }
                        Err(e) => return Err(e),
                    }
                }
                other => {
                    trace!(line, directive = other, "skipping OBJ directive");
                    lexer.skip_line();
                }
            }
        }

        meshes += emit(object, out)?;
        Ok(meshes)
    }
}

fn read_vec3(lexer: &mut Lexer) -> Result<Vec3> {
    let x = lexer.expect_number("Expected x coordinate")?;
    let y = lexer.expect_number("Expected y coordinate")?;
    let z = lexer.expect_number("Expected z coordinate")?;
    Ok(Vec3::new(x, y, z))
}

/// Corners `p`, `p/t`, `p//n` or `p/t/n` up to the end of `line`.
fn read_face(lexer: &mut Lexer, line: u32, pools: &Pools) -> Result<SmallVec<[Vertex; 4]>> {
    let mut face = SmallVec::new();
    while lexer.check(TokenKind::Number) && lexer.current().line == line {
        let p = lexer.expect_integer("Expected a position index")?;
        let mut uv = None;
        let mut normal = None;
        if lexer.matches(TokenKind::Slash) {
            if lexer.check(TokenKind::Number) {
                uv = Some(lexer.expect_integer("Expected a texture coordinate index")?);
            }
            if lexer.matches(TokenKind::Slash) {
                normal = Some(lexer.expect_integer("Expected a normal index")?);
            }
        }

        let position = pools.positions[resolve(lexer, line, p, pools.positions.len(), "Position")?];
        let uv = match uv {
            Some(i) => pools.uvs[resolve(lexer, line, i, pools.uvs.len(), "Texture coordinate")?],
            None => Vec2::ZERO,
        };
        let normal = match normal {
            Some(i) => pools.normals[resolve(lexer, line, i, pools.normals.len(), "Normal")?],
            None => Vec3::ZERO,
        };
        face.push(Vertex {
            position: position.to_array(),
            normal: normal.to_array(),
            tangent: [0.0; 3],
            uv: uv.to_array(),
        });
    }
    if lexer.current().line == line && !lexer.at_end() {
        return Err(lexer.unexpected("Expected a face index"));
    }
    Ok(face)
}

/// 1-based (or negative, relative) OBJ index to a pool offset.
fn resolve(lexer: &Lexer, line: u32, raw: i64, len: usize, what: &str) -> Result<usize> {
    let index = if raw < 0 { len as i64 + raw } else { raw - 1 };
    if raw == 0 || index < 0 || index >= len as i64 {
        let range = if len == 0 {
            "no entries defined yet".to_string()
        } else {
            format!("valid range is 1..={} or -{}..=-1", len, len)
        };
        return Err(lexer.error_at(
            ParseErrorKind::IndexOutOfRange,
            line,
            format!("{} index {} out of range ({})", what, raw, range),
        ));
    }
    Ok(index as usize)
}

/// Append a finished object as a mesh; empty objects are dropped.
fn emit(mut object: PendingObject, out: &mut OrbIntermediate) -> Result<usize> {
    if object.corners.is_empty() {
        debug!(object = %object.name, "object without faces");
        return Ok(0);
    }
    object.close_group();
    let PendingObject { name, corners, groups, .. } = object;
    let mesh = OrbMesh::from_corners(corners, groups);
    debug!(
        object = %name,
        vertices = mesh.vertices.len(),
        indices = mesh.indices.len(),
        submeshes = mesh.submeshes.len(),
        "built OBJ mesh"
    );
    let unique = out.unique_name(&name);
    out.append_object(unique, OrbValue::Mesh(mesh))?;
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::TextureChannel;

    fn read(source: &str, triangulate: bool) -> Result<OrbIntermediate> {
        let mut out = OrbIntermediate::new();
        let mut lexer = Lexer::new("test.obj", source);
        let options = ConvertOptions { triangulate, ..Default::default() };
        ObjReader::new(&options).read(&mut lexer, "test", Path::new(""), &mut out)?;
        Ok(out)
    }

    fn mesh<'a>(out: &'a OrbIntermediate, name: &str) -> &'a OrbMesh {
        match &out.get(name).unwrap().value {
            OrbValue::Mesh(m) => m,
            other => panic!("expected mesh, got {:?}", other),
        }
    }

    #[test]
    fn test_single_triangle() {
        let out = read("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", false).unwrap();
        assert_eq!(out.len(), 1);
        let m = mesh(&out, "test");
        assert_eq!(m.vertices.len(), 3);
        assert_eq!(m.indices.len(), 0);
        assert_eq!(m.submeshes.len(), 1);
        assert_eq!(m.vertices[1].position, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_corner_forms_and_negative_indices() {
        let source = "\
v 0 0 0
v 1 0 0
v 1 1 0
vt 0 0
vt 1 1
vn 0 0 1
f 1/1/1 2//1 -1/-1/-1
";
        let out = read(source, false).unwrap();
        let m = mesh(&out, "test");
        assert_eq!(m.vertices[0].uv, [0.0, 0.0]);
        assert_eq!(m.vertices[1].uv, [0.0, 0.0]);
        assert_eq!(m.vertices[2].uv, [1.0, 1.0]);
        assert_eq!(m.vertices[2].position, [1.0, 1.0, 0.0]);
        assert!(m.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_quad_policy() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let err = read(source, false).unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::UnsupportedPolygon));

        let out = read(source, true).unwrap();
        let m = mesh(&out, "test");
        assert_eq!(m.vertices.len(), 4);
        assert_eq!(m.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_index_out_of_range() {
        let err = read("v 0 0 0\nv 1 0 0\nf 1 2 5\n", false).unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::IndexOutOfRange));
        let message = err.to_string();
        assert!(message.starts_with("Error at test.obj@3:"), "{}", message);
        assert!(message.contains("1..=2"), "{}", message);
    }

    #[test]
    fn test_objects_share_pools() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
o first
f 1 2 3
v 0 0 1
o second
f 2 3 4
";
        let out = read(source, false).unwrap();
        let names: Vec<&str> = out.objects().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(mesh(&out, "second").vertices[2].position, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_usemtl_splits_submeshes() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
usemtl red
f 1 2 3
usemtl blue
f 2 4 3
g ignored group
s off
";
        let out = read(source, false).unwrap();
        let m = mesh(&out, "test");
        assert_eq!(m.material.as_deref(), Some("red"));
        assert_eq!(m.submeshes.len(), 2);
        assert_eq!(m.submeshes[1].material.as_deref(), Some("blue"));
        // Two corners are shared, so the mesh is indexed.
        assert_eq!(m.vertices.len(), 4);
        assert_eq!(m.submeshes[1].index_start, 3);
    }

    #[test]
    fn test_mtllib_loads_materials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scene.mtl"), "newmtl red\nKd 1 0 0\nmap_Kd red.png\n").unwrap();
        let obj = dir.path().join("scene.obj");
        std::fs::write(&obj, "mtllib scene.mtl\nmtllib missing.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl red\nf 1 2 3\n")
            .unwrap();

        let mut out = OrbIntermediate::new();
        let meshes = ObjReader::new(&ConvertOptions::default()).read_file(&obj, &mut out).unwrap();
        assert_eq!(meshes, 1);
        let OrbValue::Material(material) = &out.get("red").unwrap().value else {
            panic!("expected material");
        };
        assert_eq!(material.texture(TextureChannel::Color), Some("red.png"));
        assert_eq!(mesh(&out, "scene").material.as_deref(), Some("red"));
    }

    #[test]
    fn test_unexpected_token() {
        let err = read("v 0 0 0\nf 1 { 2\n", false).unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::UnexpectedToken));
    }
}
