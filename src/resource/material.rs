//! Surface material description.

use glam::Vec4;

/// Which texture slots of a material are bound (bit flags in the container).
pub mod material_flags {
    pub const COLOR_TEXTURE: u32 = 1 << 0;
    pub const NORMAL_TEXTURE: u32 = 1 << 1;
    pub const ROUGHNESS_TEXTURE: u32 = 1 << 2;
    pub const OCCLUSION_TEXTURE: u32 = 1 << 3;
}

/// Texture channel a material slot feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureChannel {
    Color,
    Normal,
    Roughness,
    Occlusion,
}

impl TextureChannel {
    pub const ALL: [TextureChannel; 4] = [
        TextureChannel::Color,
        TextureChannel::Normal,
        TextureChannel::Roughness,
        TextureChannel::Occlusion,
    ];

    /// Flag bit set when this slot is bound.
    pub const fn flag(self) -> u32 {
        match self {
            Self::Color => material_flags::COLOR_TEXTURE,
            Self::Normal => material_flags::NORMAL_TEXTURE,
            Self::Roughness => material_flags::ROUGHNESS_TEXTURE,
            Self::Occlusion => material_flags::OCCLUSION_TEXTURE,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Normal => "normal",
            Self::Roughness => "roughness",
            Self::Occlusion => "occlusion",
        }
    }
}

/// Material with named texture references.
///
/// Texture slots hold resource *names*; the writer turns them into relative
/// offsets within the write batch.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbMaterial {
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub roughness: f32,
    pub color_texture: Option<String>,
    pub normal_texture: Option<String>,
    pub roughness_texture: Option<String>,
    pub occlusion_texture: Option<String>,
}

impl Default for OrbMaterial {
    fn default() -> Self {
        Self {
            diffuse: Vec4::ONE,
            specular: Vec4::ZERO,
            roughness: 0.5,
            color_texture: None,
            normal_texture: None,
            roughness_texture: None,
            occlusion_texture: None,
        }
    }
}

impl OrbMaterial {
    pub fn texture(&self, channel: TextureChannel) -> Option<&str> {
        match channel {
            TextureChannel::Color => self.color_texture.as_deref(),
            TextureChannel::Normal => self.normal_texture.as_deref(),
            TextureChannel::Roughness => self.roughness_texture.as_deref(),
            TextureChannel::Occlusion => self.occlusion_texture.as_deref(),
        }
    }

    pub fn set_texture(&mut self, channel: TextureChannel, name: impl Into<String>) {
        let slot = match channel {
            TextureChannel::Color => &mut self.color_texture,
            TextureChannel::Normal => &mut self.normal_texture,
            TextureChannel::Roughness => &mut self.roughness_texture,
            TextureChannel::Occlusion => &mut self.occlusion_texture,
        };
        *slot = Some(name.into());
    }

    /// Flag word describing the bound texture slots.
    pub fn flags(&self) -> u32 {
        TextureChannel::ALL
            .iter()
            .filter(|c| self.texture(**c).is_some())
            .fold(0, |acc, c| acc | c.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut material = OrbMaterial::default();
        assert_eq!(material.flags(), 0);
        material.set_texture(TextureChannel::Color, "albedo");
        material.set_texture(TextureChannel::Occlusion, "ao");
        assert_eq!(
            material.flags(),
            material_flags::COLOR_TEXTURE | material_flags::OCCLUSION_TEXTURE
        );
        assert_eq!(material.texture(TextureChannel::Color), Some("albedo"));
        assert_eq!(material.texture(TextureChannel::Normal), None);
    }
}
