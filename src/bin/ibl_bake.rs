use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use merlin_shading::color;
use merlin_shading::config::{self, AppConfig, AppConfigOverrides};
use merlin_shading::environment;
use merlin_shading::offscreen::MapBaker;
use merlin_shading::texture::{Texture, TextureEncoding, TextureRegistry};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("[ibl_bake] error: {err:?}");
        std::process::exit(1);
    }
}

struct BakeArgs {
    config_path: Option<PathBuf>,
    env_path: Option<PathBuf>,
    out_dir: PathBuf,
    rgbm: bool,
    only: Vec<String>,
    overrides: AppConfigOverrides,
    show_help: bool,
}

impl Default for BakeArgs {
    fn default() -> Self {
        Self {
            config_path: None,
            env_path: None,
            out_dir: PathBuf::from("assets/ibl"),
            rgbm: false,
            only: Vec::new(),
            overrides: AppConfigOverrides::default(),
            show_help: false,
        }
    }
}

fn run() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    if args.show_help {
        print_usage();
        return Ok(());
    }
    let mut config = match &args.config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default("config/shading.json"),
    };
    config.apply_overrides(&args.overrides);

    let mut registry = TextureRegistry::new();
    let env_path = args
        .env_path
        .clone()
        .or_else(|| config.assets.environment.as_deref().map(PathBuf::from));
    let env_texture = match env_path {
        Some(path) => {
            let encoding = environment::environment_encoding_for_path(&path)
                .ok_or_else(|| anyhow!("unsupported environment format '{}'", path.display()))?;
            Texture::load(&path, encoding)?
        }
        None => environment::generate_default_sky(512, 256)?,
    };
    registry.register(config::ENVIRONMENT_KEY, env_texture);

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output directory '{}'", args.out_dir.display()))?;

    let selected = |name: &str| args.only.is_empty() || args.only.iter().any(|only| only == name);
    let started = Instant::now();
    let mut written = 0usize;

    if selected("diffuse") {
        MapBaker::new(&mut registry).bake_diffuse(
            config::ENVIRONMENT_KEY,
            config::DIFFUSE_GENERATED_KEY,
            &config.bake.diffuse.to_settings(),
        )?;
        let path = args.out_dir.join("diffuse.png");
        export_radiance_map(registry.get(config::DIFFUSE_GENERATED_KEY)?, &path, args.rgbm)?;
        println!("Wrote {}", path.display());
        written += 1;
    }
    if selected("specular") {
        MapBaker::new(&mut registry).bake_specular_atlas(
            config::ENVIRONMENT_KEY,
            config::SPECULAR_KEY,
            &config.bake.specular.to_settings(),
        )?;
        let path = args.out_dir.join("specular.png");
        export_radiance_map(registry.get(config::SPECULAR_KEY)?, &path, args.rgbm)?;
        println!("Wrote {}", path.display());
        written += 1;
    }
    if selected("brdf") {
        MapBaker::new(&mut registry).bake_brdf_lut(config::BRDF_KEY, &config.bake.brdf.to_settings())?;
        let path = args.out_dir.join("brdf.png");
        // The LUT always uses the reference's sRGB file convention.
        export_srgb8(registry.get(config::BRDF_KEY)?, &path)?;
        println!("Wrote {}", path.display());
        written += 1;
    }

    println!("Baked {written} maps in {:.2?}", started.elapsed());
    Ok(())
}

fn parse_args<I, S>(args: I) -> Result<BakeArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = BakeArgs::default();
    let mut iter = args.into_iter();
    while let Some(raw) = iter.next() {
        let flag = raw.as_ref();
        match flag {
            "--help" | "-h" => parsed.show_help = true,
            "--rgbm" => parsed.rgbm = true,
            "--config" => parsed.config_path = Some(PathBuf::from(take_value(&mut iter, flag)?)),
            "--env" => parsed.env_path = Some(PathBuf::from(take_value(&mut iter, flag)?)),
            "--out" => parsed.out_dir = PathBuf::from(take_value(&mut iter, flag)?),
            "--only" => {
                let value = take_value(&mut iter, flag)?;
                if !matches!(value.as_str(), "diffuse" | "specular" | "brdf") {
                    bail!("unknown map '{value}' for --only; use diffuse, specular or brdf");
                }
                parsed.only.push(value);
            }
            "--diffuse-size" => {
                let value = take_value(&mut iter, flag)?;
                parsed.overrides.diffuse_size =
                    Some(value.parse().with_context(|| format!("invalid diffuse size '{value}'"))?);
            }
            "--atlas-size" => {
                let value = take_value(&mut iter, flag)?;
                parsed.overrides.atlas_size =
                    Some(value.parse().with_context(|| format!("invalid atlas size '{value}'"))?);
            }
            "--samples" => {
                let value = take_value(&mut iter, flag)?;
                parsed.overrides.sample_count =
                    Some(value.parse().with_context(|| format!("invalid sample count '{value}'"))?);
            }
            "--sample-delta" => {
                let value = take_value(&mut iter, flag)?;
                parsed.overrides.sample_delta =
                    Some(value.parse().with_context(|| format!("invalid sample delta '{value}'"))?);
            }
            other => bail!("unknown flag '{other}'; run with --help for usage"),
        }
    }
    Ok(parsed)
}

fn take_value<I, S>(iter: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    iter.next()
        .map(|value| value.as_ref().to_string())
        .ok_or_else(|| anyhow!("expected a value after '{flag}'"))
}

/// Radiance maps export HDR-preserving RGBM or display sRGB.
fn export_radiance_map(map: &Texture, path: &Path, rgbm: bool) -> Result<()> {
    if rgbm {
        map.to_rgbm().save_png(path)
    } else {
        export_srgb8(map, path)
    }
}

/// Clamps linear texels into an 8-bit sRGB file.
fn export_srgb8(map: &Texture, path: &Path) -> Result<()> {
    let pixels = map.pixels().iter().map(|px| color::linear_to_srgb_rgba(*px)).collect();
    Texture::from_pixels(map.width(), map.height(), TextureEncoding::Srgb, pixels)?.save_png(path)
}

fn print_usage() {
    eprintln!(
        "ibl_bake

Usage:
  ibl_bake [--env <image>] [--out <dir>] [--only <map>] [--rgbm] [options]

Bakes the image-based-lighting map set (diffuse irradiance, banded specular
atlas, BRDF integration table) from an equirectangular environment and writes
the results as PNGs. Without --env the builtin procedural sky is used.

Options:
  --env <image>        equirect source (.hdr linear, .png sRGB)
  --out <dir>          output directory (default assets/ibl)
  --only <map>         bake a subset: diffuse, specular or brdf (repeatable)
  --rgbm               write diffuse/specular as RGBM instead of display sRGB;
                       use this for maps fed back into the image_based mode
  --config <path>      settings JSON (default config/shading.json)
  --diffuse-size <n>   irradiance map size override
  --atlas-size <n>     specular atlas size override
  --samples <n>        specular sample count override
  --sample-delta <x>   irradiance sweep step override, in radians

The BRDF table always exports with the reference sRGB file convention.
"
    );
}
