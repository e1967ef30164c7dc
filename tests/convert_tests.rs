//! End-to-end conversions: source files through the loaders into a container.

use std::path::Path;

use orbit_assets::prelude::*;
use orbit_assets::util::ParseErrorKind;

fn convert(inputs: &[&Path], output: &Path, options: &ConvertOptions) -> Result<OrbFile> {
    let mut batch = OrbIntermediate::new();
    for input in inputs {
        load_file(input, &mut batch, options)?;
    }
    let mut writer = OrbWriter::create(output)?;
    writer.write(&batch)?;
    writer.finish()?;
    OrbFile::open(output)
}

#[test]
fn test_obj_triangle() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let obj = dir.path().join("tri.obj");
    std::fs::write(&obj, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();

    let mut file = convert(&[&obj], &dir.path().join("tri.orb"), &ConvertOptions::default()).unwrap();
    assert_eq!(file.entries().len(), 1);
    assert_eq!(file.entries()[0].name, "tri");

    let OrbPayload::Mesh { material, indices, vertices, submeshes } = file.item_details(0).unwrap().payload else {
        panic!("expected mesh");
    };
    assert_eq!(material, 0);
    assert!(indices.is_empty());
    let positions: Vec<[f32; 3]> = vertices.iter().map(|v| v.position).collect();
    assert_eq!(positions, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    assert_eq!(submeshes.len(), 1);
    assert_eq!(submeshes[0].vertex_count, 3);
}

const TRIANGLE_OBJ: &str = "o Triangle
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
";

#[test]
fn test_obj_named_triangle() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let obj = dir.path().join("triangle.obj");
    std::fs::write(&obj, TRIANGLE_OBJ).unwrap();

    let mut file = convert(&[&obj], &dir.path().join("triangle.orb"), &ConvertOptions::default()).unwrap();
    let names: Vec<&str> = file.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Triangle"]);

    let OrbPayload::Mesh { indices, vertices, submeshes, .. } = file.item_details(0).unwrap().payload else {
        panic!("expected mesh");
    };
    assert_eq!(vertices.len(), 3);
    assert!(indices.is_empty());
    assert_eq!(submeshes.len(), 1);
    assert_eq!((submeshes[0].vertex_start, submeshes[0].vertex_count), (0, 3));
    assert_eq!(vertices[1].uv, [1.0, 0.0]);
    assert_eq!(vertices[2].normal, [0.0, 0.0, 1.0]);
}

#[test]
fn test_triangles_unaffected_by_triangulate() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let obj = dir.path().join("triangle.obj");
    std::fs::write(&obj, TRIANGLE_OBJ).unwrap();

    let plain = dir.path().join("plain.orb");
    let fanned = dir.path().join("fanned.orb");
    convert(&[&obj], &plain, &ConvertOptions::default()).unwrap();
    let options = ConvertOptions { triangulate: true, ..Default::default() };
    convert(&[&obj], &fanned, &options).unwrap();
    assert_eq!(std::fs::read(&plain).unwrap(), std::fs::read(&fanned).unwrap());
}

#[test]
fn test_obj_quad_needs_triangulation() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let obj = dir.path().join("quad.obj");
    std::fs::write(&obj, "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();
    let output = dir.path().join("quad.orb");

    let err = convert(&[&obj], &output, &ConvertOptions::default()).unwrap_err();
    assert_eq!(err.parse_kind(), Some(ParseErrorKind::UnsupportedPolygon));

    let options = ConvertOptions { triangulate: true, ..Default::default() };
    let mut file = convert(&[&obj], &output, &options).unwrap();
    let OrbPayload::Mesh { indices, .. } = file.item_details(0).unwrap().payload else {
        panic!("expected mesh");
    };
    assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
}

#[test]
fn test_raw_scene() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path();
    std::fs::create_dir(root.join("meshes")).unwrap();
    std::fs::write(root.join("meshes/box.mtl"), "newmtl wood\nKd 0.6 0.4 0.2\nmap_Kd wood.dds\n").unwrap();
    std::fs::write(
        root.join("meshes/box.obj"),
        "mtllib box.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl wood\nf 1 2 3\n",
    )
    .unwrap();
    std::fs::write(root.join("basic.hlsl"), "float4 main() : SV_Position { return 0; }").unwrap();
    std::fs::write(
        root.join("scene.raw"),
        r#"
        read {
            "meshes/box.obj";
            "wood.dds" as TEXTURE "wood.dds" reference();
            "basic.hlsl" as SHADER(VERTEX) "basic_vs";
        };

        new PIPELINE_STATE as "basic" {
            vertex_shader = "basic_vs";
            rasterizer_state = new RASTERIZER_STATE { cull = NONE; };
            samplers = { new SAMPLER_STATE { filter = POINT; } };
        };
        "#,
    )
    .unwrap();

    let scene = root.join("scene.raw");
    let duplicate = convert(&[&scene], &root.join("scene.orb"), &ConvertOptions::default());
    // The MTL already declared the texture under the same name.
    assert!(matches!(duplicate, Err(Error::DuplicateName(ref n)) if n == "wood.dds"));

    std::fs::write(
        root.join("scene.raw"),
        r#"
        read {
            "meshes/box.obj";
            "basic.hlsl" as SHADER(VERTEX) "basic_vs";
        };
        new PIPELINE_STATE as "basic" {
            vertex_shader = "basic_vs";
            rasterizer_state = new RASTERIZER_STATE { cull = NONE; };
            samplers = { new SAMPLER_STATE { filter = POINT; } };
        };
        "#,
    )
    .unwrap();
    let mut file = convert(&[&scene], &root.join("scene.orb"), &ConvertOptions::default())
        .expect("Failed to convert scene");

    let names: Vec<&str> = file.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "wood.dds",
            "wood",
            "box",
            "basic_vs",
            "basic.rasterizer_state",
            "basic.samplers.0",
            "basic",
        ]
    );

    let OrbPayload::Mesh { material, .. } = file.item_details(2).unwrap().payload else {
        panic!("expected mesh");
    };
    assert_eq!(material, -1);

    let OrbPayload::PipelineState { bindings, samplers, .. } = file.item_details(6).unwrap().payload else {
        panic!("expected pipeline state");
    };
    assert_eq!(bindings[0], -3);
    assert_eq!(bindings[6], -2);
    assert_eq!(samplers, vec![-1]);

    let OrbPayload::RasterizerState(raster) = file.item_details(4).unwrap().payload else {
        panic!("expected rasterizer state");
    };
    assert_eq!(raster.cull, CullMode::None);
}

#[test]
fn test_unsupported_input() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("model.gltf");
    std::fs::write(&input, "{}").unwrap();
    let err = convert(&[&input], &dir.path().join("out.orb"), &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
}
