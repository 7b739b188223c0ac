use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Reflectance at normal incidence for dielectrics; metals take it from albedo.
pub const DIELECTRIC_F0: f32 = 0.04;

/// Diffuse lobe used by the analytic and textured paths. Lambert is the
/// reference model; the other two trade energy for retro-reflection or
/// roughness-dependent flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffuseModel {
    #[default]
    Lambert,
    OrenNayar,
    Burley,
}

/// GGX normal distribution with the squared-roughness remapping.
pub fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom)
}

pub fn geometry_schlick_ggx(n_dot_v: f32, k: f32) -> f32 {
    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

/// Smith shadowing/masking with the direct-lighting remapping k = (r + 1)^2 / 8.
pub fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = (r * r) / 8.0;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

/// Smith shadowing/masking with the split-sum remapping k = r^2 / 2, used when
/// integrating the environment BRDF.
pub fn geometry_smith_ibl(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let k = (roughness * roughness) / 2.0;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

/// Mirror reflection of `v` about `n`.
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

pub fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Base reflectivity blended from the dielectric constant toward albedo as the
/// surface turns metallic.
pub fn base_reflectivity(albedo: Vec3, metallic: f32) -> Vec3 {
    Vec3::splat(DIELECTRIC_F0).lerp(albedo, metallic)
}

pub fn diffuse_lambert(albedo: Vec3) -> Vec3 {
    albedo / PI
}

/// Burley's retro-reflective diffuse. Collapses to Lambert at normal incidence
/// and brightens grazing angles on rough surfaces.
pub fn diffuse_burley(albedo: Vec3, roughness: f32, n_dot_v: f32, n_dot_l: f32, l_dot_h: f32) -> Vec3 {
    let fd90 = 0.5 + 2.0 * roughness * l_dot_h * l_dot_h;
    let light_scatter = 1.0 + (fd90 - 1.0) * (1.0 - n_dot_l).clamp(0.0, 1.0).powi(5);
    let view_scatter = 1.0 + (fd90 - 1.0) * (1.0 - n_dot_v).clamp(0.0, 1.0).powi(5);
    albedo / PI * light_scatter * view_scatter
}

/// Fujii's qualitative Oren-Nayar, treating roughness as the facet deviation.
pub fn diffuse_oren_nayar(albedo: Vec3, roughness: f32, n: Vec3, v: Vec3, l: Vec3) -> Vec3 {
    let sigma = roughness;
    let n_dot_v = n.dot(v).max(0.0);
    let n_dot_l = n.dot(l).max(0.0);
    let s = l.dot(v) - n_dot_l * n_dot_v;
    let t = if s > 0.0 { n_dot_l.max(n_dot_v).max(1e-4) } else { 1.0 };
    let a = 1.0 / (PI + (PI / 2.0 - 2.0 / 3.0) * sigma);
    let b = sigma * a;
    albedo * (a + b * s / t)
}

impl DiffuseModel {
    /// Evaluates the selected diffuse lobe. `v` and `l` must be unit vectors
    /// pointing away from the surface.
    pub fn evaluate(self, albedo: Vec3, roughness: f32, n: Vec3, v: Vec3, l: Vec3) -> Vec3 {
        match self {
            DiffuseModel::Lambert => diffuse_lambert(albedo),
            DiffuseModel::Burley => {
                let h = (v + l).normalize_or_zero();
                diffuse_burley(
                    albedo,
                    roughness,
                    n.dot(v).max(0.0),
                    n.dot(l).max(0.0),
                    l.dot(h).max(0.0),
                )
            }
            DiffuseModel::OrenNayar => diffuse_oren_nayar(albedo, roughness, n, v, l),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ggx_peak_at_aligned_half_vector() {
        let roughness = 0.5;
        let a = roughness * roughness;
        let expected = 1.0 / (PI * a * a);
        assert!((distribution_ggx(1.0, roughness) - expected).abs() < 1e-4);
        assert!(distribution_ggx(0.5, roughness) < distribution_ggx(1.0, roughness));
    }

    #[test]
    fn fresnel_spans_f0_to_white() {
        let f0 = Vec3::new(0.04, 0.04, 0.04);
        assert!((fresnel_schlick(1.0, f0) - f0).length() < 1e-6);
        assert!((fresnel_schlick(0.0, f0) - Vec3::ONE).length() < 1e-6);
    }

    #[test]
    fn reflect_mirrors_about_the_normal() {
        let reflected = reflect(Vec3::new(1.0, -1.0, 0.0).normalize(), Vec3::Y);
        assert!((reflected - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-6);
    }

    #[test]
    fn kernel_terms_are_non_negative_over_the_valid_domain() {
        let f0 = base_reflectivity(Vec3::new(0.7, 0.3, 0.1), 0.4);
        for i in 0..=10 {
            let cos = i as f32 / 10.0;
            for j in 0..=10 {
                let roughness = j as f32 / 10.0;
                assert!(distribution_ggx(cos, roughness.max(0.05)) >= 0.0);
                assert!(geometry_smith(cos, cos, roughness) >= 0.0);
                assert!(geometry_smith_ibl(cos.max(0.01), cos.max(0.01), roughness) >= 0.0);
                assert!(fresnel_schlick(cos, f0).min_element() >= 0.0);
            }
        }
    }

    #[test]
    fn smith_term_stays_in_unit_interval() {
        for roughness in [0.0, 0.25, 0.5, 1.0] {
            for cos in [0.1, 0.5, 1.0] {
                let g = geometry_smith(cos, cos, roughness);
                assert!((0.0..=1.0).contains(&g), "g = {g} at r = {roughness}");
            }
        }
    }

    #[test]
    fn base_reflectivity_blends_toward_albedo() {
        let albedo = Vec3::new(0.9, 0.6, 0.3);
        assert_eq!(base_reflectivity(albedo, 0.0), Vec3::splat(DIELECTRIC_F0));
        assert_eq!(base_reflectivity(albedo, 1.0), albedo);
    }

    #[test]
    fn burley_matches_lambert_at_normal_incidence() {
        let albedo = Vec3::splat(0.8);
        let n = Vec3::Y;
        let burley = DiffuseModel::Burley.evaluate(albedo, 0.7, n, n, n);
        assert!((burley - diffuse_lambert(albedo)).length() < 1e-5);
    }

    #[test]
    fn oren_nayar_collapses_to_lambert_at_zero_sigma() {
        let albedo = Vec3::splat(0.8);
        let n = Vec3::Y;
        let v = Vec3::new(0.3, 0.8, 0.1).normalize();
        let l = Vec3::new(-0.4, 0.7, 0.2).normalize();
        let on = diffuse_oren_nayar(albedo, 0.0, n, v, l);
        assert!((on - diffuse_lambert(albedo)).length() < 1e-5);
    }

    #[test]
    fn diffuse_models_parse_from_snake_case() {
        let model: DiffuseModel = serde_json::from_str("\"oren_nayar\"").unwrap();
        assert_eq!(model, DiffuseModel::OrenNayar);
        assert_eq!(DiffuseModel::default(), DiffuseModel::Lambert);
    }
}
