use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::color;

/// How stored texel values relate to linear radiance. Self-generated maps are
/// always `Linear`; external prefiltered assets arrive as `Rgbm` and LDR color
/// assets as `Srgb`. Decoding happens at sample time so the raw data keeps the
/// layout it had on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureEncoding {
    #[default]
    Linear,
    Srgb,
    Rgbm,
}

/// CPU-side RGBA image. Values are the raw stored texels (normalized 0..1 for
/// 8-bit sources, unbounded for float sources); interpretation is governed by
/// the encoding tag.
#[derive(Debug, Clone)]
pub struct Texture {
    width: u32,
    height: u32,
    encoding: TextureEncoding,
    pixels: Vec<Vec4>,
}

impl Texture {
    pub fn from_pixels(
        width: u32,
        height: u32,
        encoding: TextureEncoding,
        pixels: Vec<Vec4>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("texture must have non-zero dimensions ({width}x{height})"));
        }
        let expected = (width * height) as usize;
        if pixels.len() != expected {
            return Err(anyhow!(
                "texture data length {} does not match {width}x{height}",
                pixels.len()
            ));
        }
        Ok(Self {
            width,
            height,
            encoding,
            pixels,
        })
    }

    pub fn from_rgba8(
        width: u32,
        height: u32,
        encoding: TextureEncoding,
        bytes: &[u8],
    ) -> Result<Self> {
        let expected = (width * height * 4) as usize;
        if bytes.len() != expected {
            return Err(anyhow!(
                "texture byte length {} does not match {width}x{height} rgba",
                bytes.len()
            ));
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| {
                Vec4::new(
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                    px[3] as f32 / 255.0,
                )
            })
            .collect();
        Self::from_pixels(width, height, encoding, pixels)
    }

    /// Uniform-color image, handy for targets and test environments.
    pub fn filled(width: u32, height: u32, encoding: TextureEncoding, value: Vec4) -> Result<Self> {
        Self::from_pixels(
            width,
            height,
            encoding,
            vec![value; (width * height) as usize],
        )
    }

    /// Loads any format the `image` crate was built with (PNG and Radiance HDR
    /// here). Texels are kept exactly as stored; pass the encoding the asset
    /// was authored in.
    pub fn load(path: &Path, encoding: TextureEncoding) -> Result<Self> {
        let dynamic = image::open(path)
            .with_context(|| format!("failed to load texture '{}'", path.display()))?;
        let rgba = dynamic.into_rgba32f();
        let (width, height) = (rgba.width(), rgba.height());
        let pixels = rgba
            .pixels()
            .map(|px| Vec4::new(px.0[0], px.0[1], px.0[2], px.0[3]))
            .collect();
        Self::from_pixels(width, height, encoding, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn encoding(&self) -> TextureEncoding {
        self.encoding
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    /// Raw texel with clamp-to-edge addressing.
    pub fn texel(&self, x: i32, y: i32) -> Vec4 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn put_texel(&mut self, x: u32, y: u32, value: Vec4) {
        let index = (y * self.width + x) as usize;
        self.pixels[index] = value;
    }

    /// Bilinear read of the raw stored values, clamp-to-edge on both axes.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = x - x0;
        let ty = y - y0;
        let x0 = x0 as i32;
        let y0 = y0 as i32;
        let top = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), tx);
        let bottom = self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), tx);
        top.lerp(bottom, ty)
    }

    /// Bilinear read decoded to linear color. Filtering happens on the stored
    /// values first, matching how GPU samplers treat encoded textures.
    pub fn sample_decoded(&self, uv: Vec2) -> Vec4 {
        let raw = self.sample(uv);
        match self.encoding {
            TextureEncoding::Linear => raw,
            TextureEncoding::Srgb => color::srgb_to_linear_rgba(raw),
            TextureEncoding::Rgbm => color::decode_rgbm(raw).extend(1.0),
        }
    }

    /// Re-encodes a linear map into RGBM so it can survive an 8-bit export.
    /// Values above the RGBM range clamp.
    pub fn to_rgbm(&self) -> Self {
        let pixels = self
            .pixels
            .iter()
            .map(|px| color::encode_rgbm(px.truncate()))
            .collect();
        Self {
            width: self.width,
            height: self.height,
            encoding: TextureEncoding::Rgbm,
            pixels,
        }
    }

    /// Writes the raw stored values as an 8-bit PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = image::RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
            .ok_or_else(|| anyhow!("failed to assemble {}x{} image buffer", self.width, self.height))?;
        image
            .save(path)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        Ok(())
    }

    /// Raw stored values packed as `width*height*4` bytes, row-major RGBA.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for px in &self.pixels {
            let clamped = px.clamp(Vec4::ZERO, Vec4::ONE);
            bytes.push((clamped.x * 255.0).round() as u8);
            bytes.push((clamped.y * 255.0).round() as u8);
            bytes.push((clamped.z * 255.0).round() as u8);
            bytes.push((clamped.w * 255.0).round() as u8);
        }
        bytes
    }
}

/// Derives a registry key from a file name: `maps::studio_03.png` style inputs
/// become `maps::studio_03`.
pub fn map_key_from_path(namespace: &str, path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("map");
    let mut key = String::with_capacity(stem.len());
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() {
            key.push(ch.to_ascii_lowercase());
        } else {
            key.push('_');
        }
    }
    format!("{namespace}::{key}")
}

struct TextureEntry {
    texture: Texture,
    refs: usize,
}

/// Keyed store for every map the pipeline reads or writes. Lookups of keys
/// that were never registered fail with a named error instead of handing out
/// placeholder data.
#[derive(Default)]
pub struct TextureRegistry {
    textures: HashMap<String, TextureEntry>,
    revision: u64,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a map. Replacing keeps the existing retain count so
    /// holders of the key keep it alive across re-registration.
    pub fn register(&mut self, key: &str, texture: Texture) {
        let refs = self.textures.get(key).map(|entry| entry.refs).unwrap_or(0);
        self.textures
            .insert(key.to_string(), TextureEntry { texture, refs });
        self.revision += 1;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Result<&Texture> {
        self.textures
            .get(key)
            .map(|entry| &entry.texture)
            .ok_or_else(|| anyhow!("texture '{key}' not registered"))
    }

    pub fn retain(&mut self, key: &str) -> Result<()> {
        let entry = self
            .textures
            .get_mut(key)
            .ok_or_else(|| anyhow!("texture '{key}' not registered"))?;
        entry.refs += 1;
        Ok(())
    }

    /// Drops one reference; the entry is evicted once the count returns to
    /// zero. Returns true when this call removed the map.
    pub fn release(&mut self, key: &str) -> bool {
        let Some(entry) = self.textures.get_mut(key) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.textures.remove(key);
            self.revision += 1;
            return true;
        }
        false
    }

    pub fn remove(&mut self, key: &str) -> Option<Texture> {
        let removed = self.textures.remove(key).map(|entry| entry.texture);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn from_pixels_validates_dimensions() {
        assert!(Texture::from_pixels(0, 4, TextureEncoding::Linear, Vec::new()).is_err());
        assert!(Texture::from_pixels(2, 2, TextureEncoding::Linear, vec![Vec4::ONE; 3]).is_err());
        assert!(Texture::from_pixels(2, 2, TextureEncoding::Linear, vec![Vec4::ONE; 4]).is_ok());
    }

    #[test]
    fn sample_hits_texel_centers_exactly() {
        let pixels = vec![
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 1.0, 0.0, 1.0),
            Vec4::new(0.0, 0.0, 1.0, 1.0),
            Vec4::new(1.0, 1.0, 1.0, 1.0),
        ];
        let tex = Texture::from_pixels(2, 2, TextureEncoding::Linear, pixels).unwrap();
        assert_eq!(tex.sample(Vec2::new(0.25, 0.25)), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(tex.sample(Vec2::new(0.75, 0.75)), Vec4::new(1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn sample_blends_between_texels() {
        let pixels = vec![Vec4::ZERO, Vec4::ONE];
        let tex = Texture::from_pixels(2, 1, TextureEncoding::Linear, pixels).unwrap();
        let mid = tex.sample(Vec2::new(0.5, 0.5));
        assert!((mid.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sample_clamps_to_edge() {
        let pixels = vec![Vec4::splat(0.2), Vec4::splat(0.8)];
        let tex = Texture::from_pixels(2, 1, TextureEncoding::Linear, pixels).unwrap();
        assert_eq!(tex.sample(Vec2::new(-3.0, 0.5)), Vec4::splat(0.2));
        assert_eq!(tex.sample(Vec2::new(4.0, 0.5)), Vec4::splat(0.8));
    }

    #[test]
    fn decoded_sample_honors_the_encoding_tag() {
        let raw = Vec4::new(0.5, 0.5, 0.5, 1.0);
        let srgb = Texture::filled(1, 1, TextureEncoding::Srgb, raw).unwrap();
        let decoded = srgb.sample_decoded(Vec2::splat(0.5));
        assert!((decoded.x - 0.214).abs() < 1e-2);

        let rgbm = Texture::filled(1, 1, TextureEncoding::Rgbm, raw).unwrap();
        let decoded = rgbm.sample_decoded(Vec2::splat(0.5));
        assert!((decoded.truncate() - Vec3::splat(3.5)).length() < 1e-6);
        assert_eq!(decoded.w, 1.0);

        let linear = Texture::filled(1, 1, TextureEncoding::Linear, raw).unwrap();
        assert_eq!(linear.sample_decoded(Vec2::splat(0.5)), raw);
    }

    #[test]
    fn rgbm_reencode_round_trips_bright_values() {
        let bright = Vec4::new(3.0, 1.5, 0.2, 1.0);
        let linear = Texture::filled(1, 1, TextureEncoding::Linear, bright).unwrap();
        let rgbm = linear.to_rgbm();
        assert_eq!(rgbm.encoding(), TextureEncoding::Rgbm);
        let decoded = rgbm.sample_decoded(Vec2::splat(0.5)).truncate();
        assert!((decoded - bright.truncate()).abs().max_element() < 0.05);
    }

    #[test]
    fn save_and_load_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        let tex = Texture::from_rgba8(
            2,
            2,
            TextureEncoding::Linear,
            &[
                10, 20, 30, 255, 40, 50, 60, 255, 70, 80, 90, 255, 100, 110, 120, 255,
            ],
        )
        .unwrap();
        tex.save_png(&path).unwrap();
        let loaded = Texture::load(&path, TextureEncoding::Linear).unwrap();
        assert_eq!(loaded.width(), 2);
        assert_eq!(loaded.to_rgba8(), tex.to_rgba8());
    }

    #[test]
    fn rgba8_round_trip_preserves_bytes() {
        let bytes = [12u8, 99, 201, 255, 0, 128, 64, 32];
        let tex = Texture::from_rgba8(2, 1, TextureEncoding::Linear, &bytes).unwrap();
        assert_eq!(tex.to_rgba8(), bytes);
    }

    #[test]
    fn registry_reports_missing_keys_by_name() {
        let registry = TextureRegistry::new();
        let err = registry.get("ibl::brdf").unwrap_err();
        assert!(err.to_string().contains("ibl::brdf"));
    }

    #[test]
    fn registry_retain_release_controls_lifetime() {
        let mut registry = TextureRegistry::new();
        let tex = Texture::filled(1, 1, TextureEncoding::Linear, Vec4::ONE).unwrap();
        registry.register("env::studio", tex);
        registry.retain("env::studio").unwrap();
        registry.retain("env::studio").unwrap();
        assert!(!registry.release("env::studio"));
        assert!(registry.contains("env::studio"));
        assert!(registry.release("env::studio"));
        assert!(!registry.contains("env::studio"));
        assert!(registry.retain("env::studio").is_err());
    }

    #[test]
    fn registry_replacement_keeps_refs_and_bumps_revision() {
        let mut registry = TextureRegistry::new();
        let tex = Texture::filled(1, 1, TextureEncoding::Linear, Vec4::ONE).unwrap();
        registry.register("env::studio", tex.clone());
        registry.retain("env::studio").unwrap();
        registry.retain("env::studio").unwrap();
        let before = registry.revision();
        registry.register("env::studio", tex);
        assert!(registry.revision() > before);
        assert!(!registry.release("env::studio"));
        assert!(registry.contains("env::studio"));
        assert!(registry.release("env::studio"));
    }

    #[test]
    fn map_keys_are_sanitized() {
        let key = map_key_from_path("env", Path::new("/assets/Studio Light-03.png"));
        assert_eq!(key, "env::studio_light_03");
    }
}
