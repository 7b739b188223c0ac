use anyhow::{Context, Result};
use glam::Vec4;
use log::info;
use std::time::Instant;

use crate::environment::Environment;
use crate::ibl::{self, BrdfSettings, DiffuseSettings, SpecularSettings};
use crate::texture::{Texture, TextureEncoding, TextureRegistry};

/// Evaluates `shade` once per texel of a target image. The target only comes
/// into existence when every texel succeeded, so a failing pass can never
/// leave a partially written map behind.
pub fn render_fullscreen<F>(
    width: u32,
    height: u32,
    encoding: TextureEncoding,
    mut shade: F,
) -> Result<Texture>
where
    F: FnMut(u32, u32) -> Result<Vec4>,
{
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(shade(x, y)?);
        }
    }
    Texture::from_pixels(width, height, encoding, pixels)
}

/// Orchestrates generation passes against the registry: resolve the source
/// environment, run a generator to completion, then publish the result under
/// the target key. A pass that fails leaves the target's previous registration
/// untouched.
pub struct MapBaker<'r> {
    registry: &'r mut TextureRegistry,
}

impl<'r> MapBaker<'r> {
    pub fn new(registry: &'r mut TextureRegistry) -> Self {
        Self { registry }
    }

    fn environment(&self, env_key: &str) -> Result<Environment> {
        let texture = self
            .registry
            .get(env_key)
            .with_context(|| format!("generation pass needs environment '{env_key}'"))?;
        Environment::from_texture(texture)
    }

    /// Convolves the environment into a diffuse irradiance map and registers
    /// it under `target_key`.
    pub fn bake_diffuse(
        &mut self,
        env_key: &str,
        target_key: &str,
        settings: &DiffuseSettings,
    ) -> Result<()> {
        settings.validate()?;
        let started = Instant::now();
        let env = self.environment(env_key)?;
        let map = ibl::generate_diffuse_irradiance(&env, settings)?;
        info!(
            "baked diffuse irradiance {}x{} from '{env_key}' into '{target_key}' in {:.2?}",
            settings.width,
            settings.height,
            started.elapsed()
        );
        self.registry.register(target_key, map);
        Ok(())
    }

    /// Prefilters the environment once per roughness band and registers the
    /// packed atlas under `target_key`.
    pub fn bake_specular_atlas(
        &mut self,
        env_key: &str,
        target_key: &str,
        settings: &SpecularSettings,
    ) -> Result<()> {
        settings.validate()?;
        let started = Instant::now();
        let env = self.environment(env_key)?;
        let atlas = ibl::generate_specular_atlas(&env, settings)?;
        info!(
            "baked specular atlas {0}x{0} ({1} bands) from '{env_key}' into '{target_key}' in {2:.2?}",
            settings.atlas_size,
            ibl::SPECULAR_BANDS,
            started.elapsed()
        );
        self.registry.register(target_key, atlas);
        Ok(())
    }

    /// Integrates the split-sum BRDF table and registers it under `target_key`.
    pub fn bake_brdf_lut(&mut self, target_key: &str, settings: &BrdfSettings) -> Result<()> {
        settings.validate()?;
        let started = Instant::now();
        let lut = ibl::generate_brdf_lut(settings)?;
        info!(
            "baked brdf lut {0}x{0} into '{target_key}' in {1:.2?}",
            settings.size,
            started.elapsed()
        );
        self.registry.register(target_key, lut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use glam::Vec3;

    fn registry_with_env(value: f32) -> TextureRegistry {
        let mut registry = TextureRegistry::new();
        registry.register(
            "env::uniform",
            Texture::filled(8, 4, TextureEncoding::Linear, Vec4::new(value, value, value, 1.0))
                .unwrap(),
        );
        registry
    }

    #[test]
    fn bake_registers_the_target_map() {
        let mut registry = registry_with_env(1.0);
        let settings = DiffuseSettings {
            width: 8,
            height: 4,
            sample_delta: 0.2,
        };
        MapBaker::new(&mut registry)
            .bake_diffuse("env::uniform", "ibl::diffuse", &settings)
            .unwrap();
        let map = registry.get("ibl::diffuse").unwrap();
        assert_eq!((map.width(), map.height()), (8, 4));
        assert_eq!(map.encoding(), TextureEncoding::Linear);
    }

    #[test]
    fn missing_environment_leaves_previous_target_intact() {
        let mut registry = registry_with_env(1.0);
        let previous =
            Texture::filled(2, 2, TextureEncoding::Linear, Vec4::new(0.25, 0.0, 0.0, 1.0)).unwrap();
        registry.register("ibl::diffuse", previous);
        let settings = DiffuseSettings {
            width: 4,
            height: 2,
            sample_delta: 0.3,
        };
        let err = MapBaker::new(&mut registry)
            .bake_diffuse("env::missing", "ibl::diffuse", &settings)
            .unwrap_err();
        assert!(err.to_string().contains("env::missing"));
        let map = registry.get("ibl::diffuse").unwrap();
        assert_eq!(map.width(), 2, "failed pass must not replace the target");
    }

    #[test]
    fn invalid_settings_fail_before_touching_the_registry() {
        let mut registry = registry_with_env(1.0);
        let settings = DiffuseSettings {
            width: 4,
            height: 2,
            sample_delta: 0.0,
        };
        assert!(MapBaker::new(&mut registry)
            .bake_diffuse("env::uniform", "ibl::diffuse", &settings)
            .is_err());
        assert!(!registry.contains("ibl::diffuse"));
    }

    #[test]
    fn specular_and_brdf_bakes_register_their_maps() {
        let mut registry = registry_with_env(0.5);
        let settings = SpecularSettings {
            atlas_size: 32,
            sample_count: 16,
            environment_resolution: 8,
        };
        let mut baker = MapBaker::new(&mut registry);
        baker
            .bake_specular_atlas("env::uniform", "ibl::specular", &settings)
            .unwrap();
        baker
            .bake_brdf_lut("ibl::brdf", &BrdfSettings { size: 8, sample_count: 64 })
            .unwrap();
        assert!(registry.contains("ibl::specular"));
        assert!(registry.contains("ibl::brdf"));
    }

    #[test]
    fn render_fullscreen_aborts_on_the_first_failed_texel() {
        let result = render_fullscreen(4, 4, TextureEncoding::Linear, |x, y| {
            if (x, y) == (2, 1) {
                Err(anyhow!("texel failure"))
            } else {
                Ok(Vec4::ONE)
            }
        });
        assert!(result.is_err());

        let ok = render_fullscreen(2, 2, TextureEncoding::Linear, |x, _| {
            Ok(Vec3::splat(x as f32).extend(1.0))
        })
        .unwrap();
        assert_eq!(ok.texel(1, 0).x, 1.0);
    }
}
