//! Pressroom CLI
//!
//! Static site generator with declarative URL routing and translations.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for Pressroom.
#[derive(Parser)]
#[command(
    name = "pressroom",
    version,
    about = "A static site generator with declarative routing"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Build the site
    Build {
        /// Output directory, overriding build.output_dir
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
        /// Skip pages that fail instead of aborting the build
        #[arg(long)]
        best_effort: bool,
    },
    /// Remove the output directory
    Clean,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    pressroom::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            output,
            best_effort,
        } => {
            pressroom::cmd::build::run(&cli.config, output.as_deref(), best_effort)?;
        }
        Commands::Clean => {
            pressroom::cmd::clean::run(&cli.config)?;
        }
    }

    Ok(())
}
