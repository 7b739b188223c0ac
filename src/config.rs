use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::brdf::DiffuseModel;
use crate::ibl::{BrdfSettings, DiffuseSettings, SpecularSettings};
use crate::lights::{self, PointLight};
use crate::material::MaterialMaps;
use crate::shading::{IblMaps, ModeFlags, ShadeMode};

/// Registry keys the tools agree on.
pub const ENVIRONMENT_KEY: &str = "env::source";
pub const BRDF_KEY: &str = "ibl::brdf";
pub const DIFFUSE_ASSET_KEY: &str = "ibl::diffuse";
pub const DIFFUSE_GENERATED_KEY: &str = "ibl::diffuse_generated";
pub const SPECULAR_KEY: &str = "ibl::specular";
pub const MATERIAL_ALBEDO_KEY: &str = "material::albedo";
pub const MATERIAL_NORMAL_KEY: &str = "material::normal";
pub const MATERIAL_ROUGHNESS_KEY: &str = "material::roughness";
pub const MATERIAL_METALLIC_KEY: &str = "material::metallic";

#[derive(Debug, Clone, Deserialize)]
pub struct LightConfig {
    pub position: [f32; 3],
    #[serde(default = "LightConfig::default_color")]
    pub color: [f32; 3],
    #[serde(default = "LightConfig::default_intensity")]
    pub intensity: f32,
}

impl LightConfig {
    const fn default_color() -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }

    const fn default_intensity() -> f32 {
        1.0
    }

    pub fn to_light(&self) -> PointLight {
        PointLight::new(
            Vec3::from_array(self.position),
            Vec3::from_array(self.color),
            self.intensity,
        )
    }
}

/// Mode selection keeps the boolean-flag shape the control panel exposes;
/// several raised flags resolve by the fixed priority order.
#[derive(Debug, Clone, Deserialize)]
pub struct ShadingConfig {
    #[serde(default = "ShadingConfig::default_mode")]
    pub mode: ModeFlags,
    #[serde(default)]
    pub diffuse_model: DiffuseModel,
    #[serde(default = "ShadingConfig::default_lights")]
    pub lights: Vec<LightConfig>,
}

impl ShadingConfig {
    fn default_mode() -> ModeFlags {
        ModeFlags {
            punctual: true,
            ..Default::default()
        }
    }

    fn default_lights() -> Vec<LightConfig> {
        lights::default_rig()
            .into_iter()
            .map(|light| LightConfig {
                position: light.position.to_array(),
                color: light.color.to_array(),
                intensity: light.intensity,
            })
            .collect()
    }

    pub fn resolve_mode(&self) -> Result<ShadeMode> {
        self.mode
            .resolve()
            .ok_or_else(|| anyhow!("shading config raises no mode flag"))
    }

    pub fn lights(&self) -> Vec<PointLight> {
        self.lights.iter().map(LightConfig::to_light).collect()
    }
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            mode: Self::default_mode(),
            diffuse_model: DiffuseModel::default(),
            lights: Self::default_lights(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiffuseBakeConfig {
    #[serde(default = "DiffuseBakeConfig::default_size")]
    pub width: u32,
    #[serde(default = "DiffuseBakeConfig::default_size")]
    pub height: u32,
    #[serde(default = "DiffuseBakeConfig::default_sample_delta")]
    pub sample_delta: f32,
}

impl DiffuseBakeConfig {
    const fn default_size() -> u32 {
        256
    }

    const fn default_sample_delta() -> f32 {
        0.25
    }

    pub fn to_settings(&self) -> DiffuseSettings {
        DiffuseSettings {
            width: self.width,
            height: self.height,
            sample_delta: self.sample_delta,
        }
    }
}

impl Default for DiffuseBakeConfig {
    fn default() -> Self {
        Self {
            width: Self::default_size(),
            height: Self::default_size(),
            sample_delta: Self::default_sample_delta(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecularBakeConfig {
    #[serde(default = "SpecularBakeConfig::default_atlas_size")]
    pub atlas_size: u32,
    #[serde(default = "SpecularBakeConfig::default_sample_count")]
    pub sample_count: u32,
    #[serde(default = "SpecularBakeConfig::default_environment_resolution")]
    pub environment_resolution: u32,
}

impl SpecularBakeConfig {
    const fn default_atlas_size() -> u32 {
        512
    }

    const fn default_sample_count() -> u32 {
        1024
    }

    const fn default_environment_resolution() -> u32 {
        512
    }

    pub fn to_settings(&self) -> SpecularSettings {
        SpecularSettings {
            atlas_size: self.atlas_size,
            sample_count: self.sample_count,
            environment_resolution: self.environment_resolution,
        }
    }
}

impl Default for SpecularBakeConfig {
    fn default() -> Self {
        Self {
            atlas_size: Self::default_atlas_size(),
            sample_count: Self::default_sample_count(),
            environment_resolution: Self::default_environment_resolution(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrdfBakeConfig {
    #[serde(default = "BrdfBakeConfig::default_size")]
    pub size: u32,
    #[serde(default = "BrdfBakeConfig::default_sample_count")]
    pub sample_count: u32,
}

impl BrdfBakeConfig {
    const fn default_size() -> u32 {
        256
    }

    const fn default_sample_count() -> u32 {
        1024
    }

    pub fn to_settings(&self) -> BrdfSettings {
        BrdfSettings {
            size: self.size,
            sample_count: self.sample_count,
        }
    }
}

impl Default for BrdfBakeConfig {
    fn default() -> Self {
        Self {
            size: Self::default_size(),
            sample_count: Self::default_sample_count(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BakeConfig {
    #[serde(default)]
    pub diffuse: DiffuseBakeConfig,
    #[serde(default)]
    pub specular: SpecularBakeConfig,
    #[serde(default)]
    pub brdf: BrdfBakeConfig,
}

/// Texture files for the textured shading mode. Any slot left empty falls
/// back to a builtin placeholder map.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MaterialAssetConfig {
    #[serde(default)]
    pub albedo: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub roughness: Option<String>,
    #[serde(default)]
    pub metallic: Option<String>,
}

/// Paths to external assets. The equirectangular environment and the three
/// image-based-lighting maps are all optional; tools fall back to the builtin
/// sky and freshly baked maps when a path is absent.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetConfig {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub brdf: Option<String>,
    #[serde(default)]
    pub diffuse: Option<String>,
    #[serde(default)]
    pub specular: Option<String>,
    #[serde(default)]
    pub material: MaterialAssetConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "PreviewConfig::default_image_size")]
    pub width: u32,
    #[serde(default = "PreviewConfig::default_image_size")]
    pub height: u32,
    #[serde(default = "PreviewConfig::default_roughness")]
    pub roughness: Vec<f32>,
    #[serde(default = "PreviewConfig::default_metallic")]
    pub metallic: Vec<f32>,
    #[serde(default = "PreviewConfig::default_albedo")]
    pub albedo: [f32; 3],
    #[serde(default = "PreviewConfig::default_background")]
    pub background: [f32; 3],
}

impl PreviewConfig {
    const fn default_image_size() -> u32 {
        512
    }

    fn default_roughness() -> Vec<f32> {
        vec![0.0025, 0.04, 0.16, 0.36, 0.64]
    }

    fn default_metallic() -> Vec<f32> {
        vec![0.0, 0.2, 0.4, 0.6, 0.8]
    }

    const fn default_albedo() -> [f32; 3] {
        [1.0, 0.2, 0.2]
    }

    const fn default_background() -> [f32; 3] {
        [0.05, 0.05, 0.08]
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: Self::default_image_size(),
            height: Self::default_image_size(),
            roughness: Self::default_roughness(),
            metallic: Self::default_metallic(),
            albedo: Self::default_albedo(),
            background: Self::default_background(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub shading: ShadingConfig,
    #[serde(default)]
    pub bake: BakeConfig,
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub environment: Option<String>,
    pub diffuse_size: Option<u32>,
    pub atlas_size: Option<u32>,
    pub sample_count: Option<u32>,
    pub sample_delta: Option<f32>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(path) = &overrides.environment {
            self.assets.environment = Some(path.clone());
        }
        if let Some(size) = overrides.diffuse_size {
            self.bake.diffuse.width = size;
            self.bake.diffuse.height = size;
        }
        if let Some(size) = overrides.atlas_size {
            self.bake.specular.atlas_size = size;
        }
        if let Some(count) = overrides.sample_count {
            self.bake.specular.sample_count = count;
        }
        if let Some(delta) = overrides.sample_delta {
            self.bake.diffuse.sample_delta = delta;
        }
    }

    /// Map bindings for the image-based modes: the diffuse slot points at the
    /// freshly generated map or the external asset depending on the mode.
    pub fn ibl_map_keys(&self, mode: ShadeMode) -> IblMaps {
        let diffuse = if mode == ShadeMode::ImageBasedGenerated {
            DIFFUSE_GENERATED_KEY
        } else {
            DIFFUSE_ASSET_KEY
        };
        IblMaps {
            brdf: BRDF_KEY.to_string(),
            diffuse: diffuse.to_string(),
            specular: SPECULAR_KEY.to_string(),
        }
    }

    /// Map bindings for the textured mode.
    pub fn material_map_keys(&self) -> MaterialMaps {
        MaterialMaps {
            albedo: MATERIAL_ALBEDO_KEY.to_string(),
            normal: MATERIAL_NORMAL_KEY.to_string(),
            roughness: MATERIAL_ROUGHNESS_KEY.to_string(),
            metallic: MATERIAL_METALLIC_KEY.to_string(),
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.environment.is_none()
            && self.diffuse_size.is_none()
            && self.atlas_size.is_none()
            && self.sample_count.is_none()
            && self.sample_delta.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.environment.is_some() {
            fields.push("environment");
        }
        if self.diffuse_size.is_some() {
            fields.push("diffuse_size");
        }
        if self.atlas_size.is_some() {
            fields.push("atlas_size");
        }
        if self.sample_count.is_some() {
            fields.push("sample_count");
        }
        if self.sample_delta.is_some() {
            fields.push("sample_delta");
        }
        fields
    }
}
