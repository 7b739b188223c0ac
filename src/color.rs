use glam::{Vec2, Vec3, Vec4};
use std::f32::consts::{PI, TAU};

/// Range multiplier shared by every RGBM-encoded asset this crate consumes.
pub const RGBM_MAX_RANGE: f32 = 7.0;

fn srgb_channel_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_channel_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

pub fn srgb_to_linear(c: Vec3) -> Vec3 {
    Vec3::new(
        srgb_channel_to_linear(c.x),
        srgb_channel_to_linear(c.y),
        srgb_channel_to_linear(c.z),
    )
}

pub fn linear_to_srgb(c: Vec3) -> Vec3 {
    Vec3::new(
        linear_channel_to_srgb(c.x),
        linear_channel_to_srgb(c.y),
        linear_channel_to_srgb(c.z),
    )
}

/// Channel-wise sRGB decode; alpha is carried through untouched.
pub fn srgb_to_linear_rgba(c: Vec4) -> Vec4 {
    srgb_to_linear(c.truncate()).extend(c.w)
}

/// Channel-wise sRGB encode; alpha is carried through untouched.
pub fn linear_to_srgb_rgba(c: Vec4) -> Vec4 {
    linear_to_srgb(c.truncate()).extend(c.w)
}

pub fn decode_rgbm(rgbm: Vec4) -> Vec3 {
    rgbm.truncate() * (rgbm.w * RGBM_MAX_RANGE)
}

/// Inverse of [`decode_rgbm`] with the alpha snapped up to the next 8-bit step,
/// so an encode/decode round trip through an RGBA8 image never loses headroom.
pub fn encode_rgbm(color: Vec3) -> Vec4 {
    let scaled = (color / RGBM_MAX_RANGE).clamp(Vec3::ZERO, Vec3::ONE);
    let max_channel = scaled.x.max(scaled.y).max(scaled.z).max(1e-6);
    let alpha = (max_channel * 255.0).ceil() / 255.0;
    (scaled / alpha).extend(alpha)
}

pub fn reinhard(x: Vec3) -> Vec3 {
    x / (x + Vec3::ONE)
}

/// Unit direction to polar coordinates: azimuth in [-PI, PI], elevation in
/// [-PI/2, PI/2]. The elevation input is clamped so a direction that drifted
/// slightly off unit length cannot produce NaN.
pub fn cartesian_to_polar(v: Vec3) -> Vec2 {
    let phi = v.z.atan2(v.x);
    let theta = v.y.clamp(-1.0, 1.0).asin();
    Vec2::new(phi, theta)
}

pub fn polar_to_cartesian(polar: Vec2) -> Vec3 {
    let (phi, theta) = (polar.x, polar.y);
    Vec3::new(
        theta.cos() * phi.cos(),
        theta.sin(),
        theta.cos() * phi.sin(),
    )
}

pub fn polar_to_equirect(polar: Vec2) -> Vec2 {
    Vec2::new(polar.x / TAU + 0.5, polar.y / PI + 0.5)
}

/// Direction straight to equirectangular UV.
pub fn equirect_uv(dir: Vec3) -> Vec2 {
    polar_to_equirect(cartesian_to_polar(dir))
}

/// World direction represented by an output-map texel center; the inverse of
/// the equirectangular mapping used when sampling environments.
pub fn equirect_texel_direction(x: u32, y: u32, width: u32, height: u32) -> Vec3 {
    let u = (x as f32 + 0.5) / width as f32;
    let v = (y as f32 + 0.5) / height as f32;
    let phi = (u - 0.5) * TAU;
    let theta = (v - 0.5) * PI;
    polar_to_cartesian(Vec2::new(phi, theta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn srgb_round_trips_within_tolerance() {
        for i in 0..=100 {
            let c = i as f32 / 100.0;
            let back = linear_channel_to_srgb(srgb_channel_to_linear(c));
            assert!((back - c).abs() < 1e-3, "channel {c} round-tripped to {back}");
        }
    }

    #[test]
    fn srgb_alpha_passes_through() {
        let rgba = Vec4::new(0.5, 0.25, 0.75, 0.33);
        assert_eq!(srgb_to_linear_rgba(rgba).w, 0.33);
        assert_eq!(linear_to_srgb_rgba(rgba).w, 0.33);
    }

    #[test]
    fn polar_round_trips_for_random_unit_vectors() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..256 {
            let v = Vec3::new(
                rng.gen_range(-1.0f32..1.0),
                rng.gen_range(-1.0f32..1.0),
                rng.gen_range(-1.0f32..1.0),
            );
            if v.length_squared() < 1e-4 {
                continue;
            }
            let v = v.normalize();
            let back = polar_to_cartesian(cartesian_to_polar(v));
            assert!(
                (back - v).length() < 1e-5,
                "direction {v:?} round-tripped to {back:?}"
            );
        }
    }

    #[test]
    fn rgbm_round_trips_within_quantization() {
        let samples = [
            Vec3::new(0.1, 0.2, 0.3),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(4.5, 2.0, 0.01),
            Vec3::new(6.9, 6.9, 6.9),
        ];
        for color in samples {
            let decoded = decode_rgbm(encode_rgbm(color));
            assert!(
                (decoded - color).abs().max_element() < RGBM_MAX_RANGE / 255.0,
                "{color:?} decoded to {decoded:?}"
            );
        }
    }

    #[test]
    fn rgbm_decode_matches_reference_constant() {
        let rgbm = Vec4::new(0.5, 0.5, 0.5, 1.0);
        assert_eq!(decode_rgbm(rgbm), Vec3::splat(3.5));
    }

    #[test]
    fn reinhard_stays_below_one() {
        let mapped = reinhard(Vec3::new(0.0, 1.0, 1000.0));
        assert_eq!(mapped.x, 0.0);
        assert!((mapped.y - 0.5).abs() < 1e-6);
        assert!(mapped.z < 1.0);
    }

    #[test]
    fn texel_direction_maps_back_to_its_uv() {
        let (w, h) = (64, 32);
        for (x, y) in [(0, 0), (31, 15), (63, 31), (12, 7)] {
            let dir = equirect_texel_direction(x, y, w, h);
            let uv = equirect_uv(dir);
            let expected_u = (x as f32 + 0.5) / w as f32;
            let expected_v = (y as f32 + 0.5) / h as f32;
            assert!((uv.x - expected_u).abs() < 1e-5);
            assert!((uv.y - expected_v).abs() < 1e-5);
        }
    }
}
