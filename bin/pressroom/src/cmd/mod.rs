//! Command implementations.

pub mod build;
pub mod clean;

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use pressroom_core::Config;

/// Load the configuration and resolve its relative paths against the
/// directory holding the config file.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let mut config = Config::load_with_env(config_path)
        .wrap_err_with(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let base = config_path.parent().unwrap_or(Path::new(""));
    let build = &mut config.build;
    for dir in [
        &mut build.source_dir,
        &mut build.output_dir,
        &mut build.template_dir,
        &mut build.static_dir,
    ] {
        *dir = resolve(base, dir);
    }
    if let Some(file) = config.routing.categories_file.as_mut() {
        *file = resolve(base, file);
    }

    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_paths_resolve_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.toml");
        fs::write(
            &path,
            r#"
[site]
name = "Test"
base_url = "https://example.com"

[build]
output_dir = "/var/www/site"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.build.source_dir, dir.path().join("content"));
        assert_eq!(config.build.template_dir, dir.path().join("templates"));
        assert_eq!(config.build.output_dir, PathBuf::from("/var/www/site"));
    }
}
