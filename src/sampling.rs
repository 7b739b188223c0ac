use glam::{Vec2, Vec3};
use std::f32::consts::TAU;

pub fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = (bits << 16) | (bits >> 16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xaaaa_aaaa) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xcccc_cccc) >> 2);
    bits = ((bits & 0x0f0f_0f0f) << 4) | ((bits & 0xf0f0_f0f0) >> 4);
    bits = ((bits & 0x00ff_00ff) << 8) | ((bits & 0xff00_ff00) >> 8);
    bits as f32 * 2.328_306_436_538_696_3e-10
}

/// Low-discrepancy point i of a count-point Hammersley set on the unit square.
pub fn hammersley(i: u32, count: u32) -> Vec2 {
    Vec2::new(i as f32 / count as f32, radical_inverse_vdc(i))
}

/// Lifts a tangent-space sample (+Z up) into the frame around `n`. The up axis
/// switches to +X when `n` is nearly parallel to +Z so the cross product stays
/// well conditioned.
pub fn tangent_to_world(sample: Vec3, n: Vec3) -> Vec3 {
    let up = if n.z.abs() < 0.999 {
        Vec3::Z
    } else {
        Vec3::X
    };
    let tangent = up.cross(n).normalize();
    let bitangent = n.cross(tangent);
    tangent * sample.x + bitangent * sample.y + n * sample.z
}

/// GGX-distributed half vector around `n` for a uniform point `xi`, using the
/// squared-roughness parameterization.
pub fn importance_sample_ggx(xi: Vec2, n: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);
    tangent_to_world(h, n).normalize()
}
