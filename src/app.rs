use anyhow::{anyhow, Context, Result};
use glam::{Vec3, Vec4};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::color;
use crate::config::{self, AppConfig, AppConfigOverrides};
use crate::environment::{self, environment_encoding_for_path};
use crate::offscreen::MapBaker;
use crate::preview::{self, PreviewScene};
use crate::shading::{PipelineMaps, ShadeMode, ShadingPipeline};
use crate::texture::{Texture, TextureEncoding, TextureRegistry};

/// Everything one preview run needs besides the config file contents.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub output: PathBuf,
    /// Overrides the mode flags from the config when set.
    pub mode: Option<ShadeMode>,
    pub overrides: AppConfigOverrides,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/shading.json"),
            output: PathBuf::from("preview.png"),
            mode: None,
            overrides: AppConfigOverrides::default(),
        }
    }
}

pub fn run() -> Result<()> {
    run_with_options(RunOptions::default())
}

/// Loads the config, prepares every map the selected mode reads, renders the
/// sphere-grid preview and writes it as a PNG.
pub fn run_with_options(options: RunOptions) -> Result<()> {
    let mut config = AppConfig::load_or_default(&options.config_path);
    if !options.overrides.is_empty() {
        info!("applying config overrides: {:?}", options.overrides.applied_fields());
        config.apply_overrides(&options.overrides);
    }
    let mode = match options.mode {
        Some(mode) => mode,
        None => config.shading.resolve_mode()?,
    };

    let mut registry = TextureRegistry::new();
    let maps = prepare_maps(&mut registry, &config, mode)?;
    let lights = config.shading.lights();
    let pipeline =
        ShadingPipeline::new(mode, lights.len(), config.shading.diffuse_model, maps, &registry)?;

    let scene = PreviewScene::from_config(&config.preview);
    let started = Instant::now();
    let image = preview::render_sphere_grid(&scene, &pipeline, &registry, &lights)?;
    info!(
        "rendered {}x{} preview ({mode:?}) in {:.2?}",
        image.width(),
        image.height(),
        started.elapsed()
    );

    if let Some(parent) = options.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory '{}'", parent.display()))?;
        }
    }
    image.save_png(&options.output)?;
    println!("Wrote {}", options.output.display());
    Ok(())
}

/// Loads or bakes the maps the mode reads, registers them under the fixed
/// keys and returns the pipeline bindings.
fn prepare_maps(
    registry: &mut TextureRegistry,
    config: &AppConfig,
    mode: ShadeMode,
) -> Result<PipelineMaps> {
    let mut maps = PipelineMaps::default();
    match mode {
        ShadeMode::Punctual => {}
        ShadeMode::Textured => {
            register_material_maps(registry, config)?;
            maps.material = Some(config.material_map_keys());
        }
        ShadeMode::ImageBased => {
            register_external_ibl_maps(registry, config)?;
            maps.ibl = Some(config.ibl_map_keys(mode));
        }
        ShadeMode::ImageBasedGenerated => {
            prepare_generated_maps(registry, config)?;
            maps.ibl = Some(config.ibl_map_keys(mode));
        }
    }
    Ok(maps)
}

/// Registers the configured equirect source, or the builtin sky when no path
/// is set.
fn register_environment(registry: &mut TextureRegistry, config: &AppConfig) -> Result<()> {
    let texture = match config.assets.environment.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let encoding = environment_encoding_for_path(path)
                .ok_or_else(|| anyhow!("unsupported environment format '{}'", path.display()))?;
            Texture::load(path, encoding)?
        }
        None => {
            info!("no environment asset configured, synthesizing the builtin sky");
            environment::generate_default_sky(512, 256)?
        }
    };
    registry.register(config::ENVIRONMENT_KEY, texture);
    Ok(())
}

fn register_material_maps(registry: &mut TextureRegistry, config: &AppConfig) -> Result<()> {
    let assets = &config.assets.material;
    let albedo = match assets.albedo.as_deref() {
        Some(path) => Texture::load(Path::new(path), TextureEncoding::Srgb)?,
        None => placeholder_albedo()?,
    };
    registry.register(config::MATERIAL_ALBEDO_KEY, albedo);
    let normal = match assets.normal.as_deref() {
        Some(path) => Texture::load(Path::new(path), TextureEncoding::Linear)?,
        None => placeholder_normal_map(64, 32)?,
    };
    registry.register(config::MATERIAL_NORMAL_KEY, normal);
    let roughness = match assets.roughness.as_deref() {
        Some(path) => Texture::load(Path::new(path), TextureEncoding::Linear)?,
        None => Texture::filled(1, 1, TextureEncoding::Linear, Vec4::new(0.35, 0.35, 0.35, 1.0))?,
    };
    registry.register(config::MATERIAL_ROUGHNESS_KEY, roughness);
    let metallic = match assets.metallic.as_deref() {
        Some(path) => Texture::load(Path::new(path), TextureEncoding::Linear)?,
        None => Texture::filled(1, 1, TextureEncoding::Linear, Vec4::new(0.0, 0.0, 0.0, 1.0))?,
    };
    registry.register(config::MATERIAL_METALLIC_KEY, metallic);
    Ok(())
}

/// The fully asset-driven image-based mode: prefiltered maps must exist on
/// disk, only the LUT can be integrated on the spot.
fn register_external_ibl_maps(registry: &mut TextureRegistry, config: &AppConfig) -> Result<()> {
    let diffuse = config.assets.diffuse.as_deref().ok_or_else(|| {
        anyhow!("image_based mode needs assets.diffuse (or switch to image_based_generated)")
    })?;
    let specular = config.assets.specular.as_deref().ok_or_else(|| {
        anyhow!("image_based mode needs assets.specular (or switch to image_based_generated)")
    })?;
    registry.register(
        config::DIFFUSE_ASSET_KEY,
        Texture::load(Path::new(diffuse), TextureEncoding::Rgbm)?,
    );
    registry.register(
        config::SPECULAR_KEY,
        Texture::load(Path::new(specular), TextureEncoding::Rgbm)?,
    );
    register_brdf(registry, config)
}

/// The self-generating mode convolves its own diffuse map. The specular side
/// still prefers the external prefiltered asset and only falls back to a
/// fresh prefilter pass when no path is configured.
fn prepare_generated_maps(registry: &mut TextureRegistry, config: &AppConfig) -> Result<()> {
    register_environment(registry, config)?;
    MapBaker::new(registry).bake_diffuse(
        config::ENVIRONMENT_KEY,
        config::DIFFUSE_GENERATED_KEY,
        &config.bake.diffuse.to_settings(),
    )?;
    match config.assets.specular.as_deref() {
        Some(path) => {
            registry.register(
                config::SPECULAR_KEY,
                Texture::load(Path::new(path), TextureEncoding::Rgbm)?,
            );
        }
        None => {
            info!("no external specular asset, prefiltering the environment instead");
            MapBaker::new(registry).bake_specular_atlas(
                config::ENVIRONMENT_KEY,
                config::SPECULAR_KEY,
                &config.bake.specular.to_settings(),
            )?;
        }
    }
    register_brdf(registry, config)
}

/// External LUT files carry the reference convention of sRGB-encoded texels;
/// without a path the table is integrated directly.
fn register_brdf(registry: &mut TextureRegistry, config: &AppConfig) -> Result<()> {
    match config.assets.brdf.as_deref() {
        Some(path) => {
            let lut = Texture::load(Path::new(path), TextureEncoding::Srgb)?;
            registry.register(config::BRDF_KEY, lut);
            Ok(())
        }
        None => MapBaker::new(registry).bake_brdf_lut(config::BRDF_KEY, &config.bake.brdf.to_settings()),
    }
}

/// Red and white checker so the textured mode renders something recognizable
/// without any asset files.
fn placeholder_albedo() -> Result<Texture> {
    let size = 8u32;
    let light = Vec4::new(0.9, 0.9, 0.9, 1.0);
    let dark = Vec4::new(0.5, 0.1, 0.1, 1.0);
    let mut pixels = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            pixels.push(if (x + y) % 2 == 0 { light } else { dark });
        }
    }
    Texture::from_pixels(size, size, TextureEncoding::Srgb, pixels)
}

/// World-space normals encoded per equirect texel. Sampling this map at the
/// preview's spherical UVs hands back the sphere normal itself, so the
/// placeholder keeps the geometry intact while exercising the map path.
fn placeholder_normal_map(width: u32, height: u32) -> Result<Texture> {
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let dir = color::equirect_texel_direction(x, y, width, height);
            pixels.push((dir * 0.5 + Vec3::splat(0.5)).extend(1.0));
        }
    }
    Texture::from_pixels(width, height, TextureEncoding::Linear, pixels)
}
