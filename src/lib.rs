pub mod app;
pub mod brdf;
pub mod cli;
pub mod color;
pub mod config;
pub mod environment;
pub mod ibl;
pub mod lights;
pub mod material;
pub mod offscreen;
pub mod preview;
pub mod sampling;
pub mod shading;
pub mod texture;

pub use app::{run, run_with_options, RunOptions};
