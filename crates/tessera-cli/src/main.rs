//! Tessera CLI - developer front end for the tessera kernel compiler.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about = "Tessera kernel compiler CLI", long_about = None)]
struct Cli {
    /// Compiler configuration file (defaults to the user config, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generated kernel source for a computation
    Emit(commands::emit::EmitArgs),

    /// Run a forward or inverse FFT over the given samples
    Fft(commands::evaluate::FftArgs),

    /// Print the coefficients of a window function
    Window(commands::evaluate::WindowArgs),

    /// Show or create the compiler configuration
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so emitted kernel source can be piped
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Emit(args) => commands::emit::run(args, config),
        Commands::Fft(args) => commands::evaluate::run_fft(args, config),
        Commands::Window(args) => commands::evaluate::run_window(args, config),
        Commands::Config(args) => commands::config::run(args, config),
    }
}
