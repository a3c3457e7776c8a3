//! Compiler configuration commands.

use std::path::Path;

use clap::{Args, Subcommand};
use tessera_config::{CompilerConfig, user_config_path};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file location
    Path,
}

pub fn run(args: ConfigArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let path = config.map_or_else(user_config_path, Path::to_path_buf);
    match args.command {
        ConfigCommand::Show => show(&path),
        ConfigCommand::Init { force } => init(&path, force),
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn show(path: &Path) -> anyhow::Result<()> {
    let config = CompilerConfig::load_or_default_from(path)?;
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# defaults ({} not found)", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config '{}' already exists. Use --force to overwrite.",
            path.display()
        );
    }
    CompilerConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
