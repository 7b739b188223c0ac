use anyhow::{anyhow, Result};
use glam::{Vec2, Vec3, Vec4};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::brdf;
use crate::color;
use crate::environment::Environment;
use crate::sampling::{hammersley, importance_sample_ggx, tangent_to_world};
use crate::texture::{Texture, TextureEncoding};

/// Number of roughness bands baked into (and read from) the specular atlas.
/// The packing layout and the runtime lookup share this constant; prefiltered
/// assets from elsewhere must have been baked with the same band count.
pub const SPECULAR_BANDS: u32 = 5;

const PDF_EPSILON: f32 = 1e-4;

/// Parameters for the irradiance convolution. `sample_delta` is the sweep step
/// in radians for both the azimuth and elevation loops; coarser steps run
/// faster and bias the estimate slightly darker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffuseSettings {
    pub width: u32,
    pub height: u32,
    pub sample_delta: f32,
}

impl Default for DiffuseSettings {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            sample_delta: 0.25,
        }
    }
}

impl DiffuseSettings {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "diffuse map must have non-zero dimensions ({}x{})",
                self.width,
                self.height
            ));
        }
        if !(self.sample_delta > 0.0 && self.sample_delta.is_finite()) {
            return Err(anyhow!(
                "diffuse sample delta must be a positive step, got {}",
                self.sample_delta
            ));
        }
        Ok(())
    }
}

/// Parameters for GGX prefiltering. `environment_resolution` feeds the
/// solid-angle mip heuristic and should match the source environment's base
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecularSettings {
    pub atlas_size: u32,
    pub sample_count: u32,
    pub environment_resolution: u32,
}

impl Default for SpecularSettings {
    fn default() -> Self {
        Self {
            atlas_size: 512,
            sample_count: 1024,
            environment_resolution: 512,
        }
    }
}

impl SpecularSettings {
    pub fn validate(&self) -> Result<()> {
        // Band rects sit at 0.5^k fractions of the atlas; only a multiple of
        // 2^SPECULAR_BANDS puts every band edge on an exact texel row.
        let band_align = 1u32 << SPECULAR_BANDS;
        if self.atlas_size == 0 || self.atlas_size % band_align != 0 {
            return Err(anyhow!(
                "specular atlas size {} must be a multiple of {band_align} to hold {SPECULAR_BANDS} aligned bands",
                self.atlas_size
            ));
        }
        if self.sample_count == 0 {
            return Err(anyhow!("specular sample count must be at least 1"));
        }
        if self.environment_resolution == 0 {
            return Err(anyhow!("environment resolution must be non-zero"));
        }
        Ok(())
    }
}

/// Parameters for the split-sum BRDF integration table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrdfSettings {
    pub size: u32,
    pub sample_count: u32,
}

impl Default for BrdfSettings {
    fn default() -> Self {
        Self {
            size: 256,
            sample_count: 1024,
        }
    }
}

impl BrdfSettings {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(anyhow!("brdf lut size must be non-zero"));
        }
        if self.sample_count == 0 {
            return Err(anyhow!("brdf lut sample count must be at least 1"));
        }
        Ok(())
    }
}

/// Cosine-weighted hemisphere convolution of the environment around `n`,
/// swept at a fixed angular step. Includes the diffuse lobe's 1/PI term, so a
/// uniform environment of radiance k converges to irradiance k.
pub fn irradiance_for_direction(env: &Environment, n: Vec3, sample_delta: f32) -> Vec3 {
    let mut irradiance = Vec3::ZERO;
    let mut sample_count = 0u32;
    let mut phi = 0.0f32;
    while phi < TAU {
        let mut theta = 0.0f32;
        while theta < FRAC_PI_2 {
            let tangent = Vec3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            );
            let dir = tangent_to_world(tangent, n);
            irradiance += env.sample(dir) * theta.cos() * theta.sin();
            sample_count += 1;
            theta += sample_delta;
        }
        phi += sample_delta;
    }
    irradiance * PI / sample_count.max(1) as f32
}

/// Convolves the environment into a diffuse irradiance map. Output texels are
/// direct linear radiance, never RGBM.
pub fn generate_diffuse_irradiance(env: &Environment, settings: &DiffuseSettings) -> Result<Texture> {
    settings.validate()?;
    let mut pixels = Vec::with_capacity((settings.width * settings.height) as usize);
    for y in 0..settings.height {
        for x in 0..settings.width {
            let n = color::equirect_texel_direction(x, y, settings.width, settings.height);
            let irradiance = irradiance_for_direction(env, n, settings.sample_delta);
            pixels.push(irradiance.extend(1.0));
        }
    }
    Texture::from_pixels(settings.width, settings.height, TextureEncoding::Linear, pixels)
}

/// GGX-prefiltered radiance along `n` for one roughness level, with R = N = V.
/// Sample lods follow the solid-angle ratio between one environment texel and
/// one importance sample.
pub fn prefilter_for_direction(
    env: &Environment,
    n: Vec3,
    roughness: f32,
    settings: &SpecularSettings,
) -> Vec3 {
    let v = n;
    let resolution = settings.environment_resolution as f32;
    let sa_texel = 4.0 * PI / (6.0 * resolution * resolution);

    let mut color = Vec3::ZERO;
    let mut weight = 0.0f32;
    for i in 0..settings.sample_count {
        let xi = hammersley(i, settings.sample_count);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = brdf::reflect(-v, h).normalize_or_zero();
        let n_dot_l = n.dot(l).max(0.0);
        if n_dot_l > 0.0 {
            let n_dot_h = n.dot(h).max(0.0);
            let h_dot_v = h.dot(v).max(0.0);
            let d = brdf::distribution_ggx(n_dot_h, roughness);
            let pdf = d * n_dot_h / (4.0 * h_dot_v).max(PDF_EPSILON) + PDF_EPSILON;
            let sa_sample = 1.0 / (settings.sample_count as f32 * pdf + PDF_EPSILON);
            let mip = if roughness == 0.0 {
                0.0
            } else {
                (0.5 * (sa_sample / sa_texel).log2()).max(0.0)
            };
            color += env.sample_lod(l, mip) * n_dot_l;
            weight += n_dot_l;
        }
    }
    if weight > 0.0 {
        color / weight
    } else {
        color
    }
}

/// One prefiltered equirectangular map at the given roughness.
pub fn generate_prefiltered_band(
    env: &Environment,
    roughness: f32,
    width: u32,
    height: u32,
    settings: &SpecularSettings,
) -> Result<Texture> {
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let n = color::equirect_texel_direction(x, y, width, height);
            let filtered = prefilter_for_direction(env, n, roughness, settings);
            pixels.push(filtered.extend(1.0));
        }
    }
    Texture::from_pixels(width, height, TextureEncoding::Linear, pixels)
}

/// Normalized atlas rectangle occupied by one roughness band: each band is a
/// 2:1 equirect image shrunk by powers of two and stacked below the previous
/// one.
pub fn band_rect(band: u32) -> (Vec2, Vec2) {
    let scale = 0.5f32.powi(band as i32);
    let next = 0.5f32.powi(band as i32 + 1);
    (Vec2::new(0.0, 1.0 - scale), Vec2::new(scale, 1.0 - next))
}

/// Remaps an equirect uv for `dir` into the atlas rectangle of `band`.
pub fn specular_band_uv(dir: Vec3, band: u32) -> Vec2 {
    let uv = color::equirect_uv(dir);
    let (min, max) = band_rect(band);
    min + (max - min) * uv
}

/// Roughness-blended read of the banded specular atlas: the two nearest bands
/// are sampled and mixed by the fractional part of `roughness * band count`.
/// Works for both self-generated (linear) and external (RGBM) atlases via the
/// texture's encoding tag.
pub fn sample_prefiltered_specular(atlas: &Texture, dir: Vec3, roughness: f32) -> Vec3 {
    let scaled = roughness.clamp(0.0, 1.0) * SPECULAR_BANDS as f32;
    let max_band = SPECULAR_BANDS - 1;
    let lo = (scaled.floor() as u32).min(max_band);
    let hi = (scaled.ceil() as u32).min(max_band);
    let t = scaled.fract();
    let near = atlas.sample_decoded(specular_band_uv(dir, lo)).truncate();
    if lo == hi {
        return near;
    }
    let far = atlas.sample_decoded(specular_band_uv(dir, hi)).truncate();
    near.lerp(far, t)
}

/// Runs the prefilter once per band and packs the results into the shared
/// atlas layout. Band k is filtered at roughness k / band count.
pub fn generate_specular_atlas(env: &Environment, settings: &SpecularSettings) -> Result<Texture> {
    settings.validate()?;
    let size = settings.atlas_size;
    let mut atlas = Texture::filled(
        size,
        size,
        TextureEncoding::Linear,
        Vec4::new(0.0, 0.0, 0.0, 1.0),
    )?;
    for band in 0..SPECULAR_BANDS {
        let roughness = band as f32 / SPECULAR_BANDS as f32;
        let width = (size >> band).max(1);
        let height = (size >> (band + 1)).max(1);
        let map = generate_prefiltered_band(env, roughness, width, height, settings)?;
        let (min, _) = band_rect(band);
        let y_offset = (min.y * size as f32).round() as u32;
        for y in 0..height {
            for x in 0..width {
                atlas.put_texel(x, y_offset + y, map.texel(x as i32, y as i32));
            }
        }
    }
    Ok(atlas)
}

/// Split-sum BRDF integration table: x indexes N.V, y indexes roughness, and
/// the two channels hold the Fresnel scale and bias.
pub fn generate_brdf_lut(settings: &BrdfSettings) -> Result<Texture> {
    settings.validate()?;
    let size = settings.size;
    let mut pixels = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        let roughness = (y as f32 + 0.5) / size as f32;
        for x in 0..size {
            let n_dot_v = (x as f32 + 0.5) / size as f32;
            let (scale, bias) = integrate_brdf(n_dot_v, roughness, settings.sample_count);
            pixels.push(Vec4::new(scale, bias, 0.0, 1.0));
        }
    }
    Texture::from_pixels(size, size, TextureEncoding::Linear, pixels)
}

fn integrate_brdf(n_dot_v: f32, roughness: f32, sample_count: u32) -> (f32, f32) {
    let n = Vec3::Z;
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let mut scale = 0.0f32;
    let mut bias = 0.0f32;
    for i in 0..sample_count {
        let xi = hammersley(i, sample_count);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = brdf::reflect(-v, h);
        let n_dot_l = l.z.max(0.0);
        if n_dot_l > 0.0 {
            let n_dot_h = h.z.max(0.0);
            let v_dot_h = v.dot(h).max(0.0);
            let g = brdf::geometry_smith_ibl(n_dot_v, n_dot_l, roughness);
            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v).max(1e-4);
            let fc = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fc) * g_vis;
            bias += fc * g_vis;
        }
    }
    let norm = 1.0 / sample_count as f32;
    (scale * norm, bias * norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_environment(value: f32) -> Environment {
        Environment::from_pixels(16, 8, vec![Vec3::splat(value); 128]).unwrap()
    }

    #[test]
    fn settings_validation_rejects_degenerate_inputs() {
        let mut diffuse = DiffuseSettings::default();
        diffuse.sample_delta = 0.0;
        assert!(diffuse.validate().is_err());
        diffuse = DiffuseSettings { width: 0, ..Default::default() };
        assert!(diffuse.validate().is_err());

        let specular = SpecularSettings { atlas_size: 16, ..Default::default() };
        assert!(specular.validate().is_err());
        assert!(SpecularSettings::default().validate().is_ok());

        // Sizes off the 32-texel grid leave rows that no band writes but the
        // 0.5^k lookup rects still cover.
        let misaligned = SpecularSettings { atlas_size: 100, ..Default::default() };
        let err = misaligned.validate().unwrap_err();
        assert!(err.to_string().contains("multiple of 32"), "unexpected error: {err}");
        let aligned = SpecularSettings { atlas_size: 96, ..Default::default() };
        assert!(aligned.validate().is_ok());

        let brdf = BrdfSettings { sample_count: 0, ..Default::default() };
        assert!(brdf.validate().is_err());
        assert!(BrdfSettings::default().validate().is_ok());
    }

    #[test]
    fn uniform_irradiance_keeps_the_environment_level() {
        let env = uniform_environment(1.0);
        let irradiance = irradiance_for_direction(&env, Vec3::Y, 0.025);
        for channel in [irradiance.x, irradiance.y, irradiance.z] {
            assert!((channel - 1.0).abs() < 0.02, "irradiance {irradiance:?}");
        }
    }

    #[test]
    fn irradiance_is_rotation_invariant_on_uniform_input() {
        let env = uniform_environment(0.5);
        let up = irradiance_for_direction(&env, Vec3::Y, 0.1);
        let side = irradiance_for_direction(&env, Vec3::X, 0.1);
        assert!((up - side).length() < 1e-4);
    }

    #[test]
    fn band_rects_tile_the_left_column() {
        let (min0, max0) = band_rect(0);
        assert_eq!(min0, Vec2::new(0.0, 0.0));
        assert_eq!(max0, Vec2::new(1.0, 0.5));
        let (min1, max1) = band_rect(1);
        assert_eq!(min1, Vec2::new(0.0, 0.5));
        assert_eq!(max1, Vec2::new(0.5, 0.75));
        // Each band starts where the previous one ended.
        for band in 1..SPECULAR_BANDS {
            let (min, _) = band_rect(band);
            let (_, prev_max) = band_rect(band - 1);
            assert!((min.y - prev_max.y).abs() < 1e-6);
        }
    }

    #[test]
    fn integer_roughness_reads_a_single_band() {
        let mut pixels = vec![Vec4::new(0.0, 0.0, 0.0, 1.0); 64 * 64];
        // Paint band 1's rect green, everything else red.
        for y in 0..64u32 {
            for x in 0..64u32 {
                let u = (x as f32 + 0.5) / 64.0;
                let v = (y as f32 + 0.5) / 64.0;
                let inside = u < 0.5 && (0.5..0.75).contains(&v);
                pixels[(y * 64 + x) as usize] = if inside {
                    Vec4::new(0.0, 1.0, 0.0, 1.0)
                } else {
                    Vec4::new(1.0, 0.0, 0.0, 1.0)
                };
            }
        }
        let atlas = Texture::from_pixels(64, 64, TextureEncoding::Linear, pixels).unwrap();
        // roughness 0.2 scales to exactly band 1; the edge-adjacent texels of
        // the probe direction stay inside the band.
        let sampled = sample_prefiltered_specular(&atlas, Vec3::X, 0.2);
        assert!(sampled.y > 0.9, "sampled {sampled:?}");
    }

    #[test]
    fn prefilter_at_zero_roughness_is_a_mirror() {
        let mut pixels = Vec::new();
        for y in 0..8u32 {
            for x in 0..16u32 {
                pixels.push(Vec3::new(x as f32 / 15.0, y as f32 / 7.0, 0.25));
            }
        }
        let env = Environment::from_pixels(16, 8, pixels).unwrap();
        let settings = SpecularSettings {
            atlas_size: 32,
            sample_count: 64,
            environment_resolution: 16,
        };
        for dir in [Vec3::X, Vec3::new(0.5, 0.5, -0.7).normalize()] {
            let filtered = prefilter_for_direction(&env, dir, 0.0, &settings);
            let direct = env.sample(dir);
            assert!(
                (filtered - direct).length() < 1e-4,
                "filtered {filtered:?} direct {direct:?}"
            );
        }
    }

    #[test]
    fn rough_prefilter_converges_to_the_environment_mean_on_uniform_input() {
        let env = uniform_environment(2.0);
        let settings = SpecularSettings {
            atlas_size: 32,
            sample_count: 128,
            environment_resolution: 16,
        };
        let filtered = prefilter_for_direction(&env, Vec3::Y, 0.8, &settings);
        assert!((filtered - Vec3::splat(2.0)).length() < 1e-3);
    }

    #[test]
    fn atlas_bands_land_in_their_rects() {
        let env = uniform_environment(1.0);
        let settings = SpecularSettings {
            atlas_size: 32,
            sample_count: 16,
            environment_resolution: 16,
        };
        let atlas = generate_specular_atlas(&env, &settings).unwrap();
        assert_eq!(atlas.width(), 32);
        // Band 0 center (uniform input) holds the environment value.
        let band0 = atlas.texel(8, 8);
        assert!((band0.truncate() - Vec3::ONE).length() < 1e-3);
        // The region right of the cascade was never written.
        let untouched = atlas.texel(31, 31);
        assert_eq!(untouched.truncate(), Vec3::ZERO);
    }

    #[test]
    fn brdf_lut_is_bounded_with_a_strong_grazing_bias() {
        let settings = BrdfSettings { size: 16, sample_count: 1024 };
        let lut = generate_brdf_lut(&settings).unwrap();
        for px in lut.pixels() {
            assert!(px.x >= 0.0 && px.y >= 0.0);
            assert!(px.x + px.y <= 1.05, "scale+bias {px:?}");
        }
        // Smooth grazing reflection carries a strong Fresnel bias.
        let grazing = lut.sample(Vec2::new(0.05, 0.05));
        assert!(grazing.y > 0.1);
    }
}
