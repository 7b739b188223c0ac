use glam::Vec3;

/// Non-attenuated point emitter. Radiance arriving at a shaded point is
/// `color * intensity` regardless of distance, matching the reference rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            position,
            color,
            intensity,
        }
    }

    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Unit direction from the shaded point toward the light.
    pub fn direction_from(&self, point: Vec3) -> Vec3 {
        (self.position - point).normalize_or_zero()
    }
}

/// Four white units in a square above the scene, the rig every preview and
/// test scene starts from.
pub fn default_rig() -> Vec<PointLight> {
    [
        Vec3::new(10.0, 10.0, 10.0),
        Vec3::new(-10.0, 10.0, 10.0),
        Vec3::new(10.0, -10.0, 10.0),
        Vec3::new(-10.0, -10.0, 10.0),
    ]
    .into_iter()
    .map(|position| PointLight::new(position, Vec3::ONE, 1.0))
    .collect()
}
