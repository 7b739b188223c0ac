use crate::app::RunOptions;
use crate::config::AppConfigOverrides;
use crate::shading::ShadeMode;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    mode: Option<ShadeMode>,
    environment: Option<String>,
    diffuse_size: Option<u32>,
    atlas_size: Option<u32>,
    sample_count: Option<u32>,
    sample_delta: Option<f32>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Use --flag value pairs.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => {
                    overrides.config = Some(PathBuf::from(value));
                }
                "out" => {
                    overrides.output = Some(PathBuf::from(value));
                }
                "mode" => {
                    overrides.mode = Some(parse_mode_flag(&value)?);
                }
                "env" => {
                    overrides.environment = Some(value);
                }
                "diffuse-size" => {
                    overrides.diffuse_size = Some(
                        value.parse::<u32>().with_context(|| format!("Invalid diffuse size '{value}'"))?,
                    );
                }
                "atlas-size" => {
                    overrides.atlas_size = Some(
                        value.parse::<u32>().with_context(|| format!("Invalid atlas size '{value}'"))?,
                    );
                }
                "samples" => {
                    overrides.sample_count = Some(
                        value.parse::<u32>().with_context(|| format!("Invalid sample count '{value}'"))?,
                    );
                }
                "sample-delta" => {
                    overrides.sample_delta = Some(
                        value.parse::<f32>().with_context(|| format!("Invalid sample delta '{value}'"))?,
                    );
                }
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --out, --mode, --env, \
                     --diffuse-size, --atlas-size, --samples, --sample-delta."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn into_run_options(self) -> RunOptions {
        let mut options = RunOptions::default();
        if let Some(config) = self.config {
            options.config_path = config;
        }
        if let Some(output) = self.output {
            options.output = output;
        }
        options.mode = self.mode;
        options.overrides = AppConfigOverrides {
            environment: self.environment,
            diffuse_size: self.diffuse_size,
            atlas_size: self.atlas_size,
            sample_count: self.sample_count,
            sample_delta: self.sample_delta,
        };
        options
    }
}

fn parse_mode_flag(value: &str) -> Result<ShadeMode> {
    match value {
        "punctual" => Ok(ShadeMode::Punctual),
        "textured" => Ok(ShadeMode::Textured),
        "image_based" => Ok(ShadeMode::ImageBased),
        "image_based_generated" => Ok(ShadeMode::ImageBasedGenerated),
        other => bail!(
            "Invalid mode '{other}'. Use punctual, textured, image_based or image_based_generated."
        ),
    }
}
