use anyhow::Result;
use glam::{Vec2, Vec3};

use crate::color;
use crate::texture::TextureRegistry;

/// Uniform surface parameters, stored linear. Constructors clamp so the BRDF
/// kernel downstream never has to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub albedo: Vec3,
    pub roughness: f32,
    pub metallic: f32,
}

impl Material {
    pub fn new(albedo: Vec3, roughness: f32, metallic: f32) -> Self {
        Self {
            albedo: albedo.clamp(Vec3::ZERO, Vec3::ONE),
            roughness: roughness.clamp(0.0, 1.0),
            metallic: metallic.clamp(0.0, 1.0),
        }
    }

    /// Accepts an sRGB-authored albedo and stores it linear.
    pub fn from_srgb(albedo_srgb: Vec3, roughness: f32, metallic: f32) -> Self {
        Self::new(color::srgb_to_linear(albedo_srgb), roughness, metallic)
    }
}

/// Registry keys for the four maps the textured mode reads. The albedo map is
/// expected to be registered sRGB; the remaining three carry linear data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialMaps {
    pub albedo: String,
    pub normal: String,
    pub roughness: String,
    pub metallic: String,
}

/// Per-texel material state resolved from the maps. The normal comes straight
/// from the map (decoded `n*2-1`), replacing the geometric normal the way the
/// reference shader does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexturedSample {
    pub albedo: Vec3,
    pub normal: Vec3,
    pub roughness: f32,
    pub metallic: f32,
}

impl MaterialMaps {
    pub fn keys(&self) -> [&str; 4] {
        [&self.albedo, &self.normal, &self.roughness, &self.metallic]
    }

    /// Fails fast when any of the four maps is missing, naming the absent key.
    pub fn validate(&self, registry: &TextureRegistry) -> Result<()> {
        for key in self.keys() {
            registry.get(key)?;
        }
        Ok(())
    }

    pub fn sample(&self, registry: &TextureRegistry, uv: Vec2) -> Result<TexturedSample> {
        let albedo = registry.get(&self.albedo)?.sample_decoded(uv).truncate();
        let normal_raw = registry.get(&self.normal)?.sample(uv).truncate();
        let roughness = registry.get(&self.roughness)?.sample(uv).x;
        let metallic = registry.get(&self.metallic)?.sample(uv).x;
        Ok(TexturedSample {
            albedo,
            normal: (normal_raw * 2.0 - Vec3::ONE).normalize_or_zero(),
            roughness: roughness.clamp(0.0, 1.0),
            metallic: metallic.clamp(0.0, 1.0),
        })
    }
}
