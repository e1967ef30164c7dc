//! Closed engine enumerations shared with the runtime.
//!
//! Every enum carries an explicit on-disk code and the keyword used by the raw
//! scene DSL. The codes are part of the `.orb` format and must never be
//! derived from declaration order.

use std::fmt;

use crate::util::{Error, Result};

/// Enum spelled as a keyword in text formats.
pub trait Keyword: Sized + Copy {
    /// What the keyword names, for diagnostics.
    const WHAT: &'static str;

    fn parse_keyword(keyword: &str) -> Option<Self>;

    /// Comma separated list of accepted keywords.
    fn accepted() -> String;
}

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $what:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal => $keyword:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All variants, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// On-disk code.
            #[inline]
            pub const fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Decode an on-disk code.
            pub fn from_code(code: u8) -> Result<Self> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(Error::InvalidEnum { what: $what, value: code as u32 }),
                }
            }

            /// Keyword used in text formats and diagnostics.
            #[inline]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $keyword),+
                }
            }

            /// Parse a keyword (exact match).
            pub fn from_keyword(keyword: &str) -> Option<Self> {
                match keyword {
                    $($keyword => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Accepted keywords, for error messages.
            pub fn keywords() -> String {
                Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
            }
        }

        impl Keyword for $name {
            const WHAT: &'static str = $what;

            fn parse_keyword(keyword: &str) -> Option<Self> {
                $name::from_keyword(keyword)
            }

            fn accepted() -> String {
                $name::keywords()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum! {
    /// Type tag of a resource stored in an `.orb` container.
    pub enum ResourceType: "resource type" {
        Material = 0 => "MATERIAL",
        Mesh = 1 => "MESH",
        Texture = 2 => "TEXTURE",
        ShaderCode = 3 => "SHADER_CODE",
        InputLayout = 4 => "INPUT_LAYOUT",
        PipelineState = 5 => "PIPELINE_STATE",
        ShaderBinary = 6 => "SHADER_BINARY",
        RasterizerState = 7 => "RASTERIZER_STATE",
        BlendState = 8 => "BLEND_STATE",
        TextureReference = 9 => "TEXTURE_REFERENCE",
        SamplerState = 10 => "SAMPLER_STATE",
    }
}

keyword_enum! {
    /// Programmable pipeline stage.
    pub enum ShaderType: "shader type" {
        Vertex = 0 => "VERTEX",
        Pixel = 1 => "PIXEL",
        Geometry = 2 => "GEOMETRY",
        Hull = 3 => "HULL",
        Domain = 4 => "DOMAIN",
        Compute = 5 => "COMPUTE",
    }
}

keyword_enum! {
    /// Vertex attribute format.
    pub enum FormatType: "format" {
        R32G32B32A32Float = 0 => "R32G32B32A32_FLOAT",
        R32G32B32Float = 1 => "R32G32B32_FLOAT",
        R32G32Float = 2 => "R32G32_FLOAT",
        R32Float = 3 => "R32_FLOAT",
        R32G32B32A32Uint = 4 => "R32G32B32A32_UINT",
        R32G32B32Uint = 5 => "R32G32B32_UINT",
        R32G32Uint = 6 => "R32G32_UINT",
        R32Uint = 7 => "R32_UINT",
        R32G32B32A32Sint = 8 => "R32G32B32A32_SINT",
        R32G32B32Sint = 9 => "R32G32B32_SINT",
        R32G32Sint = 10 => "R32G32_SINT",
        R32Sint = 11 => "R32_SINT",
        R16G16B16A16Float = 12 => "R16G16B16A16_FLOAT",
        R16G16Float = 13 => "R16G16_FLOAT",
        R8G8B8A8Unorm = 14 => "R8G8B8A8_UNORM",
        R8G8B8A8Uint = 15 => "R8G8B8A8_UINT",
    }
}

keyword_enum! {
    /// Whether an input element advances per vertex or per instance.
    pub enum InputClassification: "input classification" {
        PerVertex = 0 => "PER_VERTEX",
        PerInstance = 1 => "PER_INSTANCE",
    }
}

keyword_enum! {
    pub enum PrimitiveTopology: "primitive topology" {
        PointList = 0 => "POINT_LIST",
        LineList = 1 => "LINE_LIST",
        LineStrip = 2 => "LINE_STRIP",
        TriangleList = 3 => "TRIANGLE_LIST",
        TriangleStrip = 4 => "TRIANGLE_STRIP",
    }
}

keyword_enum! {
    pub enum FillMode: "fill mode" {
        Solid = 0 => "SOLID",
        Wireframe = 1 => "WIREFRAME",
    }
}

keyword_enum! {
    pub enum CullMode: "cull mode" {
        None = 0 => "NONE",
        Front = 1 => "FRONT",
        Back = 2 => "BACK",
    }
}

keyword_enum! {
    pub enum BlendFactor: "blend factor" {
        Zero = 0 => "ZERO",
        One = 1 => "ONE",
        SrcColor = 2 => "SRC_COLOR",
        InvSrcColor = 3 => "INV_SRC_COLOR",
        SrcAlpha = 4 => "SRC_ALPHA",
        InvSrcAlpha = 5 => "INV_SRC_ALPHA",
        DestAlpha = 6 => "DEST_ALPHA",
        InvDestAlpha = 7 => "INV_DEST_ALPHA",
        DestColor = 8 => "DEST_COLOR",
        InvDestColor = 9 => "INV_DEST_COLOR",
        SrcAlphaSat = 10 => "SRC_ALPHA_SAT",
        BlendFactor = 11 => "BLEND_FACTOR",
        InvBlendFactor = 12 => "INV_BLEND_FACTOR",
    }
}

keyword_enum! {
    pub enum BlendOperation: "blend operation" {
        Add = 0 => "ADD",
        Subtract = 1 => "SUBTRACT",
        RevSubtract = 2 => "REV_SUBTRACT",
        Min = 3 => "MIN",
        Max = 4 => "MAX",
    }
}

keyword_enum! {
    pub enum FilterMode: "filter" {
        Point = 0 => "POINT",
        Linear = 1 => "LINEAR",
        Anisotropic = 2 => "ANISOTROPIC",
    }
}

keyword_enum! {
    pub enum AddressMode: "address mode" {
        Wrap = 0 => "WRAP",
        Mirror = 1 => "MIRROR",
        Clamp = 2 => "CLAMP",
        Border = 3 => "BORDER",
        MirrorOnce = 4 => "MIRROR_ONCE",
    }
}

/// Render target channel mask; channels combine with `|`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorWriteMask(pub u8);

impl ColorWriteMask {
    pub const NONE: Self = Self(0);
    pub const RED: Self = Self(1);
    pub const GREEN: Self = Self(2);
    pub const BLUE: Self = Self(4);
    pub const ALPHA: Self = Self(8);
    pub const ALL: Self = Self(15);

    /// Parse a single channel keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "NONE" => Some(Self::NONE),
            "RED" => Some(Self::RED),
            "GREEN" => Some(Self::GREEN),
            "BLUE" => Some(Self::BLUE),
            "ALPHA" => Some(Self::ALPHA),
            "ALL" => Some(Self::ALL),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for ColorWriteMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ColorWriteMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ColorWriteMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            return f.write_str("NONE");
        }
        let names: Vec<&str> = [
            (Self::RED, "RED"),
            (Self::GREEN, "GREEN"),
            (Self::BLUE, "BLUE"),
            (Self::ALPHA, "ALPHA"),
        ]
        .iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, name)| *name)
        .collect();
        f.write_str(&names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_codes() {
        assert_eq!(ResourceType::Material.code(), 0);
        assert_eq!(ResourceType::Mesh.code(), 1);
        assert_eq!(ResourceType::Texture.code(), 2);
        assert_eq!(ResourceType::ShaderCode.code(), 3);
        assert_eq!(ResourceType::InputLayout.code(), 4);
        assert_eq!(ResourceType::PipelineState.code(), 5);
        assert_eq!(ResourceType::ShaderBinary.code(), 6);
        assert_eq!(ResourceType::RasterizerState.code(), 7);
        assert_eq!(ResourceType::BlendState.code(), 8);
        for ty in ResourceType::ALL {
            assert_eq!(ResourceType::from_code(ty.code()).unwrap(), *ty);
        }
        assert!(ResourceType::from_code(200).is_err());
    }

    #[test]
    fn test_keywords() {
        assert_eq!(BlendOperation::from_keyword("SUBTRACT"), Some(BlendOperation::Subtract));
        assert_eq!(BlendOperation::from_keyword("subtract"), None);
        assert_eq!(FormatType::R32G32B32Float.to_string(), "R32G32B32_FLOAT");
        assert!(CullMode::keywords().contains("BACK"));
    }

    #[test]
    fn test_color_mask() {
        let mask = ColorWriteMask::RED | ColorWriteMask::BLUE;
        assert_eq!(mask.0, 5);
        assert!(mask.contains(ColorWriteMask::RED));
        assert!(!mask.contains(ColorWriteMask::GREEN));
        assert_eq!(mask.to_string(), "RED|BLUE");
        assert_eq!(ColorWriteMask::default(), ColorWriteMask::ALL);
    }
}
