//! Clean command - removes the generated output

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use pressroom_generator::Engine;

use super::load_config;

/// Remove the output directory named by the configuration.
pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let output = config.build.output_dir.clone();

    let mut engine = Engine::new(config).wrap_err("Failed to set up engine")?;
    engine.clean().wrap_err("Clean failed")?;

    tracing::info!(dir = %output.display(), "Output removed");
    println!("  Removed {}", output.display());
    Ok(())
}
