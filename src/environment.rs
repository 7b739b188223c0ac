use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use std::fs;
use std::path::Path;

use crate::color;
use crate::texture::{map_key_from_path, Texture, TextureEncoding, TextureRegistry};

/// Read-only equirectangular radiance input for the map generators. Level 0
/// holds the decoded source texels; further levels are successive 2x box
/// reductions so prefiltering can read coarse lods cheaply.
pub struct Environment {
    levels: Vec<EnvironmentLevel>,
}

struct EnvironmentLevel {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
}

impl EnvironmentLevel {
    fn pixel(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Bilinear read at texel centers; x wraps across the azimuth seam, y
    /// clamps at the poles.
    fn sample(&self, uv: Vec2) -> Vec3 {
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = x - x0;
        let ty = y - y0;

        let ix0 = x0.rem_euclid(self.width as f32) as u32;
        let ix1 = (x0 + 1.0).rem_euclid(self.width as f32) as u32;
        let iy0 = y0.clamp(0.0, (self.height - 1) as f32) as u32;
        let iy1 = (y0 + 1.0).clamp(0.0, (self.height - 1) as f32) as u32;

        let c00 = self.pixel(ix0, iy0);
        let c10 = self.pixel(ix1, iy0);
        let c01 = self.pixel(ix0, iy1);
        let c11 = self.pixel(ix1, iy1);

        let top = c00 * (1.0 - tx) + c10 * tx;
        let bottom = c01 * (1.0 - tx) + c11 * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

impl Environment {
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Vec3>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "environment map must have non-zero dimensions ({width}x{height})"
            ));
        }
        if pixels.len() != (width * height) as usize {
            return Err(anyhow!(
                "environment data length {} does not match {width}x{height}",
                pixels.len()
            ));
        }
        let mut levels = vec![EnvironmentLevel {
            width,
            height,
            pixels,
        }];
        while levels[levels.len() - 1].width > 1 || levels[levels.len() - 1].height > 1 {
            let next = downsample(&levels[levels.len() - 1]);
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// Decodes a registered map into linear radiance according to its encoding
    /// tag and builds the mip chain.
    pub fn from_texture(texture: &Texture) -> Result<Self> {
        let pixels = texture
            .pixels()
            .iter()
            .map(|px| match texture.encoding() {
                TextureEncoding::Linear => px.truncate(),
                TextureEncoding::Srgb => color::srgb_to_linear(px.truncate()),
                TextureEncoding::Rgbm => color::decode_rgbm(*px),
            })
            .collect();
        Self::from_pixels(texture.width(), texture.height(), pixels)
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Radiance along a world direction, read from the finest level.
    pub fn sample(&self, dir: Vec3) -> Vec3 {
        self.levels[0].sample(color::equirect_uv(dir.normalize_or_zero()))
    }

    /// Trilinear radiance lookup: bilinear in the two nearest mip levels,
    /// blended by the fractional lod.
    pub fn sample_lod(&self, dir: Vec3, lod: f32) -> Vec3 {
        let uv = color::equirect_uv(dir.normalize_or_zero());
        let max_level = (self.levels.len() - 1) as f32;
        let lod = lod.clamp(0.0, max_level);
        let lo = lod.floor() as usize;
        let hi = (lo + 1).min(self.levels.len() - 1);
        let t = lod.fract();
        let fine = self.levels[lo].sample(uv);
        let coarse = self.levels[hi].sample(uv);
        fine * (1.0 - t) + coarse * t
    }
}

fn downsample(level: &EnvironmentLevel) -> EnvironmentLevel {
    let width = (level.width / 2).max(1);
    let height = (level.height / 2).max(1);
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let sx = (x * 2).min(level.width - 1);
            let sy = (y * 2).min(level.height - 1);
            let sx1 = (sx + 1).min(level.width - 1);
            let sy1 = (sy + 1).min(level.height - 1);
            let sum = level.pixel(sx, sy)
                + level.pixel(sx1, sy)
                + level.pixel(sx, sy1)
                + level.pixel(sx1, sy1);
            pixels.push(sum * 0.25);
        }
    }
    EnvironmentLevel {
        width,
        height,
        pixels,
    }
}

/// Procedural gradient sky with a warm sun disc, used when no environment
/// asset is supplied. Stored linear so it can feed the generators directly.
pub fn generate_default_sky(width: u32, height: u32) -> Result<Texture> {
    let sun_dir = Vec3::new(0.45, 0.7, 0.35).normalize();
    let zenith = Vec3::new(0.25, 0.35, 0.6);
    let horizon_sky = Vec3::new(0.65, 0.7, 0.9);
    let horizon_ground = Vec3::new(0.2, 0.18, 0.16);
    let ground = Vec3::new(0.08, 0.07, 0.05);

    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let dir = color::equirect_texel_direction(x, y, width, height);
            let elevation = dir.y.clamp(-1.0, 1.0);
            let mut radiance = if elevation >= 0.0 {
                horizon_sky.lerp(zenith, elevation)
            } else {
                horizon_ground.lerp(ground, -elevation)
            };
            let sun = dir.dot(sun_dir).max(0.0).powf(256.0);
            radiance += Vec3::new(1.0, 0.9, 0.75) * sun * 8.0;
            pixels.push(radiance.extend(1.0));
        }
    }
    Texture::from_pixels(width, height, TextureEncoding::Linear, pixels)
}

/// Encoding convention by file extension: Radiance HDR carries linear data,
/// PNG is treated as an sRGB LDR sky. Unknown extensions are not environments.
pub fn environment_encoding_for_path(path: &Path) -> Option<TextureEncoding> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("hdr") => Some(TextureEncoding::Linear),
        Some("png") => Some(TextureEncoding::Srgb),
        _ => None,
    }
}

/// Scans a directory and registers every supported environment image under an
/// `env::` key derived from its file name. Keys that already exist are left
/// alone. Returns the added keys, sorted.
pub fn load_environment_directory(
    registry: &mut TextureRegistry,
    dir: &Path,
) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut loaded = Vec::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("reading environment directory '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(encoding) = environment_encoding_for_path(&path) else {
            continue;
        };
        let key = map_key_from_path("env", &path);
        if registry.contains(&key) {
            continue;
        }
        let texture = Texture::load(&path, encoding)
            .with_context(|| format!("processing environment '{}'", path.display()))?;
        registry.register(&key, texture);
        loaded.push(key);
    }
    loaded.sort();
    Ok(loaded)
}
