//! Build command - generates the static site

use std::{path::Path, time::Instant};

use color_eyre::eyre::{Result, WrapErr};
use pressroom_core::config::PageErrorPolicy;
use pressroom_generator::{BuildStats, Engine, RssPlugin, SitemapPlugin};

use super::load_config;

/// Run the build command.
///
/// Loads the configuration, renders every page into the output directory
/// and synchronizes static assets. The built-in `sitemap` and `rss` plugins
/// run when the configuration has a `[plugins.<name>]` table for them.
pub fn run(config_path: &Path, output: Option<&Path>, best_effort: bool) -> Result<BuildStats> {
    let start = Instant::now();
    tracing::info!(?config_path, ?output, best_effort, "Starting build");

    let mut config = load_config(config_path)?;

    if let Some(output) = output {
        config.build.output_dir = output.to_path_buf();
    }

    if best_effort {
        config.build.on_page_error = PageErrorPolicy::Continue;
    }

    let sitemap = config.plugins.contains_key(SitemapPlugin::NAME);
    let rss = config.plugins.contains_key(RssPlugin::NAME);

    let mut engine = Engine::new(config).wrap_err("Failed to set up build")?;
    if sitemap {
        engine
            .add_plugin(SitemapPlugin::new())
            .wrap_err("Failed to set up sitemap plugin")?;
    }
    if rss {
        engine
            .add_plugin(RssPlugin::new())
            .wrap_err("Failed to set up rss plugin")?;
    }
    let stats = engine.build().wrap_err("Build failed")?;

    let duration = start.elapsed();

    println!();
    println!("  Build complete!");
    println!("  ───────────────────────────");
    println!("  Pages:      {}", stats.pages);
    if stats.failed > 0 {
        println!("  Skipped:    {}", stats.failed);
    }
    println!("  Assets:     {}", stats.assets);
    println!("  Duration:   {:.2}s", duration.as_secs_f64());
    println!();

    tracing::info!(
        pages = stats.pages,
        failed = stats.failed,
        assets = stats.assets,
        duration_ms = stats.duration_ms,
        "Build complete"
    );

    Ok(stats)
}
