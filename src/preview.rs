use anyhow::{anyhow, Result};
use glam::Vec3;

use crate::color;
use crate::config::PreviewConfig;
use crate::lights::PointLight;
use crate::material::Material;
use crate::offscreen;
use crate::shading::{ShadeInput, ShadingPipeline, SurfaceSample};
use crate::texture::{Texture, TextureEncoding, TextureRegistry};

const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 0.0, 10.0);
const SPHERE_SPACING: f32 = 2.5;
const SPHERE_RADIUS: f32 = 1.0;

/// Sphere-grid scene: one column per roughness value, one row per metallic
/// value with `metallic[0]` at the bottom, shaded with a shared albedo against
/// a flat background.
#[derive(Debug, Clone)]
pub struct PreviewScene {
    pub width: u32,
    pub height: u32,
    pub roughness: Vec<f32>,
    pub metallic: Vec<f32>,
    pub albedo_srgb: Vec3,
    pub background: Vec3,
}

impl PreviewScene {
    pub fn from_config(config: &PreviewConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            roughness: config.roughness.clone(),
            metallic: config.metallic.clone(),
            albedo_srgb: Vec3::from_array(config.albedo),
            background: Vec3::from_array(config.background),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "preview image must have non-zero dimensions ({}x{})",
                self.width,
                self.height
            ));
        }
        if self.roughness.is_empty() || self.metallic.is_empty() {
            return Err(anyhow!(
                "preview grid needs at least one roughness and one metallic value"
            ));
        }
        Ok(())
    }
}

/// Renders the grid orthographically, looking down -Z. Every sphere texel runs
/// the full shading pipeline; misses show the background. The output stores
/// display-ready sRGB values.
pub fn render_sphere_grid(
    scene: &PreviewScene,
    pipeline: &ShadingPipeline,
    registry: &TextureRegistry,
    lights: &[PointLight],
) -> Result<Texture> {
    scene.validate()?;
    let cols = scene.roughness.len() as u32;
    let rows = scene.metallic.len() as u32;
    let background = color::linear_to_srgb(scene.background).extend(1.0);

    offscreen::render_fullscreen(scene.width, scene.height, TextureEncoding::Srgb, |x, y| {
        let u = (x as f32 + 0.5) / scene.width as f32;
        let v = (y as f32 + 0.5) / scene.height as f32;
        let col = ((u * cols as f32).floor() as u32).min(cols - 1);
        let row = ((v * rows as f32).floor() as u32).min(rows - 1);

        // Position within the cell, in world units around the sphere center.
        let lx = (u * cols as f32 - col as f32 - 0.5) * SPHERE_SPACING;
        let ly = (0.5 - (v * rows as f32 - row as f32)) * SPHERE_SPACING;
        let r2 = SPHERE_RADIUS * SPHERE_RADIUS;
        if lx * lx + ly * ly > r2 {
            return Ok(background);
        }

        let lz = (r2 - lx * lx - ly * ly).sqrt();
        let normal = Vec3::new(lx, ly, lz) / SPHERE_RADIUS;
        let center = Vec3::new(
            (col as f32 - (cols as f32 - 1.0) * 0.5) * SPHERE_SPACING,
            ((rows as f32 - 1.0) * 0.5 - row as f32) * SPHERE_SPACING,
            0.0,
        );
        let position = center + normal * SPHERE_RADIUS;

        // metallic[0] fills the bottom row; image rows count down from the top.
        let material = Material::from_srgb(
            scene.albedo_srgb,
            scene.roughness[col as usize],
            scene.metallic[(rows - 1 - row) as usize],
        );
        let surface = SurfaceSample::new(position, normal).with_uv(color::equirect_uv(normal));
        let input = ShadeInput {
            surface,
            material,
            camera_position: CAMERA_POSITION,
            lights,
        };
        let shaded = pipeline.evaluate(registry, &input)?;
        Ok(shaded.extend(1.0))
    })
}
