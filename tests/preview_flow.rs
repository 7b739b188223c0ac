use merlin_shading::shading::ShadeMode;
use merlin_shading::texture::{Texture, TextureEncoding};
use merlin_shading::{run_with_options, RunOptions};
use std::fs;

#[test]
fn punctual_preview_writes_a_lit_png() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("shading.json");
    fs::write(
        &config_path,
        r#"{
            "shading": { "mode": { "punctual": true } },
            "preview": { "width": 48, "height": 48 }
        }"#,
    )
    .expect("write config");

    let output = dir.path().join("out/preview.png");
    run_with_options(RunOptions {
        config_path,
        output: output.clone(),
        mode: None,
        overrides: Default::default(),
    })
    .expect("preview run");

    let image = Texture::load(&output, TextureEncoding::Srgb).expect("load output");
    assert_eq!((image.width(), image.height()), (48, 48));
    let lit = image.pixels().iter().any(|px| px.x > 0.6);
    assert!(lit, "expected at least one lit sphere texel");
}

#[test]
fn generated_mode_preview_runs_from_the_builtin_sky() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("shading.json");
    fs::write(
        &config_path,
        r#"{
            "shading": { "mode": { "image_based_generated": true } },
            "bake": {
                "diffuse": { "width": 8, "height": 4, "sample_delta": 0.5 },
                "specular": { "atlas_size": 32, "sample_count": 8, "environment_resolution": 8 },
                "brdf": { "size": 8, "sample_count": 32 }
            },
            "preview": { "width": 32, "height": 32 }
        }"#,
    )
    .expect("write config");

    let output = dir.path().join("ibl_preview.png");
    run_with_options(RunOptions {
        config_path,
        output: output.clone(),
        mode: None,
        overrides: Default::default(),
    })
    .expect("preview run");

    let image = Texture::load(&output, TextureEncoding::Srgb).expect("load output");
    assert_eq!((image.width(), image.height()), (32, 32));
}

#[test]
fn mode_override_beats_the_config_flags() {
    // No flag raised in the config; the override alone selects the mode.
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("shading.json");
    fs::write(
        &config_path,
        r#"{
            "shading": { "mode": {} },
            "preview": { "width": 24, "height": 24 }
        }"#,
    )
    .expect("write config");

    let output = dir.path().join("preview.png");
    run_with_options(RunOptions {
        config_path,
        output: output.clone(),
        mode: Some(ShadeMode::Punctual),
        overrides: Default::default(),
    })
    .expect("preview run");
    assert!(output.exists());
}
