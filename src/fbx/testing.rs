//! Binary FBX encoder used to build fixtures in tests.

use super::compression::deflate;
use super::format::*;
use super::tree::{FbxNode, FbxProperty, FbxTree};

/// Encode a tree with uncompressed arrays.
pub(crate) fn encode(tree: &FbxTree) -> Vec<u8> {
    encode_with(tree, false)
}

/// Encode a tree, optionally zlib-compressing every array property.
pub(crate) fn encode_with(tree: &FbxTree, compress: bool) -> Vec<u8> {
    let wide = tree.version >= WIDE_HEADER_VERSION;
    let mut buf = FBX_MAGIC.to_vec();
    buf.extend_from_slice(&tree.version.to_le_bytes());
    for node in &tree.roots {
        encode_node(&mut buf, node, wide, compress);
    }
    buf.extend(std::iter::repeat(0u8).take(sentinel_len(tree.version) as usize));
    buf
}

fn push_field(buf: &mut Vec<u8>, value: u64, wide: bool) {
    if wide {
        buf.extend_from_slice(&value.to_le_bytes());
    } else {
        buf.extend_from_slice(&(value as u32).to_le_bytes());
    }
}

fn patch_field(buf: &mut [u8], at: usize, value: u64, wide: bool) {
    if wide {
        buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
    } else {
        buf[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes());
    }
}

fn encode_node(buf: &mut Vec<u8>, node: &FbxNode, wide: bool, compress: bool) {
    let field = if wide { 8 } else { 4 };
    let start = buf.len();
    push_field(buf, 0, wide);
    push_field(buf, node.properties.len() as u64, wide);
    push_field(buf, 0, wide);
    buf.push(node.name.len() as u8);
    buf.extend_from_slice(node.name.as_bytes());

    let props_start = buf.len();
    for property in &node.properties {
        encode_property(buf, property, compress);
    }
    let props_len = (buf.len() - props_start) as u64;

    if !node.children.is_empty() {
        for child in &node.children {
            encode_node(buf, child, wide, compress);
        }
        let sentinel = if wide { WIDE_SENTINEL_LEN } else { SENTINEL_LEN };
        buf.extend(std::iter::repeat(0u8).take(sentinel as usize));
    }

    let end = buf.len() as u64;
    patch_field(buf, start, end, wide);
    patch_field(buf, start + 2 * field, props_len, wide);
}

fn encode_array(buf: &mut Vec<u8>, code: u8, count: usize, raw: Vec<u8>, compress: bool) {
    buf.push(code);
    buf.extend_from_slice(&(count as u32).to_le_bytes());
    let (encoding, stored) = if compress {
        (ARRAY_ENCODING_ZLIB, deflate(&raw).expect("deflate into memory"))
    } else {
        (ARRAY_ENCODING_RAW, raw)
    };
    buf.extend_from_slice(&encoding.to_le_bytes());
    buf.extend_from_slice(&(stored.len() as u32).to_le_bytes());
    buf.extend_from_slice(&stored);
}

fn encode_property(buf: &mut Vec<u8>, property: &FbxProperty, compress: bool) {
    let code = property.type_code();
    match property {
        FbxProperty::I16(v) => {
            buf.push(code);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        FbxProperty::Bool(v) => {
            buf.push(code);
            buf.push(*v as u8);
        }
        FbxProperty::I32(v) => {
            buf.push(code);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        FbxProperty::F32(v) => {
            buf.push(code);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        FbxProperty::F64(v) => {
            buf.push(code);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        FbxProperty::I64(v) => {
            buf.push(code);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        FbxProperty::String(s) => {
            buf.push(code);
            buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        FbxProperty::Bytes(b) => {
            buf.push(code);
            buf.extend_from_slice(&(b.len() as u32).to_le_bytes());
            buf.extend_from_slice(b);
        }
        FbxProperty::F32Array(v) => {
            let raw = v.iter().flat_map(|x| x.to_le_bytes()).collect();
            encode_array(buf, code, v.len(), raw, compress);
        }
        FbxProperty::F64Array(v) => {
            let raw = v.iter().flat_map(|x| x.to_le_bytes()).collect();
            encode_array(buf, code, v.len(), raw, compress);
        }
        FbxProperty::I32Array(v) => {
            let raw = v.iter().flat_map(|x| x.to_le_bytes()).collect();
            encode_array(buf, code, v.len(), raw, compress);
        }
        FbxProperty::I64Array(v) => {
            let raw = v.iter().flat_map(|x| x.to_le_bytes()).collect();
            encode_array(buf, code, v.len(), raw, compress);
        }
        FbxProperty::BoolArray(v) => {
            let raw = v.iter().map(|&x| x as u8).collect();
            encode_array(buf, code, v.len(), raw, compress);
        }
    }
}

/// Node with the given properties and no children.
pub(crate) fn leaf(name: &str, properties: Vec<FbxProperty>) -> FbxNode {
    FbxNode {
        name: name.into(),
        properties,
        children: Vec::new(),
    }
}

/// `P` entry of a `Properties70` table.
pub(crate) fn p70(name: &str, values: Vec<FbxProperty>) -> FbxNode {
    let mut properties = vec![
        FbxProperty::String(name.into()),
        FbxProperty::String(String::new()),
        FbxProperty::String(String::new()),
        FbxProperty::String(String::new()),
    ];
    properties.extend(values);
    leaf("P", properties)
}

/// Connection record `C`.
pub(crate) fn connection(kind: &str, child: i64, parent: i64, property: Option<&str>) -> FbxNode {
    let mut properties = vec![
        FbxProperty::String(kind.into()),
        FbxProperty::I64(child),
        FbxProperty::I64(parent),
    ];
    if let Some(p) = property {
        properties.push(FbxProperty::String(p.into()));
    }
    leaf("C", properties)
}

/// Object node (`Model`, `Geometry`, ...) with id, name and class.
pub(crate) fn object(kind: &str, id: i64, name: &str, class: &str, children: Vec<FbxNode>) -> FbxNode {
    FbxNode {
        name: kind.into(),
        properties: vec![
            FbxProperty::I64(id),
            FbxProperty::String(format!("{}\x00\x01{}", name, kind)),
            FbxProperty::String(class.into()),
        ],
        children,
    }
}
