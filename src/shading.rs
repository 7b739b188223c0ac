use anyhow::{anyhow, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::brdf::{self, DiffuseModel};
use crate::color;
use crate::ibl;
use crate::lights::PointLight;
use crate::material::{Material, MaterialMaps};
use crate::texture::TextureRegistry;

/// The one lighting path a pipeline evaluates. Exactly one mode is active per
/// pipeline; there is no flag combination state at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadeMode {
    Punctual,
    Textured,
    ImageBased,
    ImageBasedGenerated,
}

/// Legacy flag set where several booleans could be raised at once. Kept for
/// callers configured that way; resolution order is punctual, textured,
/// image-based, image-based-generated, first raised flag wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeFlags {
    pub punctual: bool,
    pub textured: bool,
    pub image_based: bool,
    pub image_based_generated: bool,
}

impl ModeFlags {
    pub fn resolve(&self) -> Option<ShadeMode> {
        if self.punctual {
            Some(ShadeMode::Punctual)
        } else if self.textured {
            Some(ShadeMode::Textured)
        } else if self.image_based {
            Some(ShadeMode::ImageBased)
        } else if self.image_based_generated {
            Some(ShadeMode::ImageBasedGenerated)
        } else {
            None
        }
    }

    pub fn for_mode(mode: ShadeMode) -> Self {
        let mut flags = Self::default();
        match mode {
            ShadeMode::Punctual => flags.punctual = true,
            ShadeMode::Textured => flags.textured = true,
            ShadeMode::ImageBased => flags.image_based = true,
            ShadeMode::ImageBasedGenerated => flags.image_based_generated = true,
        }
        flags
    }
}

/// Registry keys for the three maps the image-based modes read. `diffuse`
/// points at either the external RGBM irradiance asset or a freshly generated
/// linear map; the encoding tag on the registered texture settles which.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IblMaps {
    pub brdf: String,
    pub diffuse: String,
    pub specular: String,
}

impl IblMaps {
    fn validate(&self, registry: &TextureRegistry) -> Result<()> {
        for key in [&self.brdf, &self.diffuse, &self.specular] {
            registry.get(key)?;
        }
        Ok(())
    }
}

/// Optional map bindings handed to the pipeline at build time.
#[derive(Debug, Clone, Default)]
pub struct PipelineMaps {
    pub material: Option<MaterialMaps>,
    pub ibl: Option<IblMaps>,
}

/// The point being shaded. Normals are expected unit length; uv is only
/// required by the textured mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Option<Vec2>,
}

impl SurfaceSample {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position,
            normal,
            uv: None,
        }
    }

    pub fn with_uv(mut self, uv: Vec2) -> Self {
        self.uv = Some(uv);
        self
    }
}

/// Everything one evaluation call needs. Nothing is shared or mutated between
/// calls; two inputs with equal fields shade identically.
#[derive(Debug, Clone, Copy)]
pub struct ShadeInput<'a> {
    pub surface: SurfaceSample,
    pub material: Material,
    pub camera_position: Vec3,
    pub lights: &'a [PointLight],
}

/// Compiled shading configuration: one mode, a fixed light count, and the map
/// bindings the mode requires, all checked up front.
#[derive(Debug)]
pub struct ShadingPipeline {
    mode: ShadeMode,
    light_count: usize,
    diffuse_model: DiffuseModel,
    material_maps: Option<MaterialMaps>,
    ibl_maps: Option<IblMaps>,
}

impl ShadingPipeline {
    pub fn new(
        mode: ShadeMode,
        light_count: usize,
        diffuse_model: DiffuseModel,
        maps: PipelineMaps,
        registry: &TextureRegistry,
    ) -> Result<Self> {
        let material_maps = match mode {
            ShadeMode::Textured => {
                let material = maps
                    .material
                    .ok_or_else(|| anyhow!("textured shading enabled without material maps"))?;
                material.validate(registry)?;
                Some(material)
            }
            _ => maps.material,
        };
        let ibl_maps = match mode {
            ShadeMode::ImageBased | ShadeMode::ImageBasedGenerated => {
                let ibl = maps
                    .ibl
                    .ok_or_else(|| anyhow!("image-based shading enabled without ibl maps"))?;
                ibl.validate(registry)?;
                Some(ibl)
            }
            _ => maps.ibl,
        };
        Ok(Self {
            mode,
            light_count,
            diffuse_model,
            material_maps,
            ibl_maps,
        })
    }

    pub fn mode(&self) -> ShadeMode {
        self.mode
    }

    pub fn light_count(&self) -> usize {
        self.light_count
    }

    /// Shades one surface point and returns the display color, sRGB-encoded.
    /// The image-based modes are Reinhard-tonemapped before encoding; the
    /// punctual and textured modes are not, matching the reference output.
    pub fn evaluate(&self, registry: &TextureRegistry, input: &ShadeInput) -> Result<Vec3> {
        if input.lights.len() != self.light_count {
            return Err(anyhow!(
                "light list length {} does not match the compiled light count {}",
                input.lights.len(),
                self.light_count
            ));
        }
        let n = input.surface.normal.normalize_or_zero();
        let v = (input.camera_position - input.surface.position).normalize_or_zero();

        match self.mode {
            ShadeMode::Punctual => {
                let radiance = self.direct_lighting(input, n, v, &input.material);
                Ok(color::linear_to_srgb(radiance))
            }
            ShadeMode::Textured => {
                let maps = self
                    .material_maps
                    .as_ref()
                    .ok_or_else(|| anyhow!("textured shading enabled without material maps"))?;
                let uv = input
                    .surface
                    .uv
                    .ok_or_else(|| anyhow!("textured shading requires surface uv coordinates"))?;
                let sampled = maps.sample(registry, uv)?;
                let material = Material::new(sampled.albedo, sampled.roughness, sampled.metallic);
                let radiance = self.direct_lighting(input, sampled.normal, v, &material);
                Ok(color::linear_to_srgb(radiance))
            }
            ShadeMode::ImageBased | ShadeMode::ImageBasedGenerated => {
                let radiance = self.image_lighting(registry, n, v, &input.material)?;
                Ok(color::linear_to_srgb(color::reinhard(radiance)))
            }
        }
    }

    /// Cook-Torrance sum over the light list. Dot products are clamped and the
    /// specular denominator floored per the grazing-angle policy.
    fn direct_lighting(&self, input: &ShadeInput, n: Vec3, v: Vec3, material: &Material) -> Vec3 {
        let f0 = brdf::base_reflectivity(material.albedo, material.metallic);
        let mut total = Vec3::ZERO;
        for light in input.lights {
            let l = light.direction_from(input.surface.position);
            let h = (v + l).normalize_or_zero();
            let n_dot_l = n.dot(l).max(0.0);
            let n_dot_v = n.dot(v).max(0.0);
            let n_dot_h = n.dot(h).max(0.0);
            let h_dot_v = h.dot(v).max(0.0);

            let d = brdf::distribution_ggx(n_dot_h, material.roughness);
            let g = brdf::geometry_smith(n_dot_v, n_dot_l, material.roughness);
            let f = brdf::fresnel_schlick(h_dot_v, f0);
            let specular = d * g * f / (4.0 * n_dot_v * n_dot_l).max(0.001);

            let k_d = (Vec3::ONE - f) * (1.0 - material.metallic);
            let diffuse =
                k_d * self
                    .diffuse_model
                    .evaluate(material.albedo, material.roughness, n, v, l);

            total += (diffuse + specular) * light.radiance() * n_dot_l;
        }
        total
    }

    /// Split-sum environment lighting: irradiance-map diffuse plus prefiltered
    /// specular scaled and biased by the BRDF integration table.
    fn image_lighting(
        &self,
        registry: &TextureRegistry,
        n: Vec3,
        v: Vec3,
        material: &Material,
    ) -> Result<Vec3> {
        let maps = self
            .ibl_maps
            .as_ref()
            .ok_or_else(|| anyhow!("image-based shading enabled without ibl maps"))?;
        let f0 = brdf::base_reflectivity(material.albedo, material.metallic);
        let n_dot_v = n.dot(v).max(0.0);
        let k_s = brdf::fresnel_schlick(n_dot_v, f0);
        let k_d = (Vec3::ONE - k_s) * (1.0 - material.metallic);

        let irradiance = registry
            .get(&maps.diffuse)?
            .sample_decoded(color::equirect_uv(n))
            .truncate();
        let diffuse = k_d * material.albedo * irradiance;

        let r = brdf::reflect(-v, n);
        let prefiltered =
            ibl::sample_prefiltered_specular(registry.get(&maps.specular)?, r, material.roughness);
        let env_brdf = registry
            .get(&maps.brdf)?
            .sample_decoded(Vec2::new(n_dot_v, material.roughness));
        let specular = prefiltered * (k_s * env_brdf.x + Vec3::splat(env_brdf.y));

        Ok(diffuse + specular)
    }
}
