//! Command-line interface for assetline
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `dev`: Build, serve and watch (the default)
//! - `build`: Production build and archive
//! - one subcommand per task (`clean`, `styles`, `images`, ...)
//! - `reload`: Reload the browsers of a running server

mod build;
mod dev;
mod reload;
mod task;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use crate::config::{Config, Mode};
use crate::tasks::TaskContext;

pub use build::BuildCommand;
pub use dev::DevCommand;
pub use reload::ReloadCommand;
pub use task::TaskCommand;

/// assetline - stylesheet, image and font pipeline for theme projects
#[derive(Parser, Debug)]
#[command(name = "assetline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Production mode: minify, optimize images, no source maps
    #[arg(long, global = true, env = "ASSETLINE_PROD")]
    pub prod: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to assetline.toml config file
    #[arg(short, long, global = true, default_value = "assetline.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build, start the development server and watch for changes
    Dev(DevCommand),

    /// Build everything and package the project archive
    Build(BuildCommand),

    /// Remove the output directory
    Clean,

    /// Compile the stylesheet
    Styles,

    /// Copy (and in production, optimize) images
    Images,

    /// Copy fonts
    Fonts,

    /// Copy the remaining source files
    Copy,

    /// Package the project into a zip archive
    Compress,

    /// Start the development server until Ctrl+C
    Serve,

    /// Watch sources and rebuild on change
    Watch,

    /// Ask a running server to reload connected browsers
    Reload(ReloadCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner(self.mode());

        match &self.command {
            None => DevCommand::default().execute(self).await,
            Some(Commands::Dev(cmd)) => cmd.execute(self).await,
            Some(Commands::Build(cmd)) => cmd.execute(self).await,
            Some(Commands::Reload(cmd)) => cmd.execute(self).await,
            Some(Commands::Clean) => TaskCommand::Clean.execute(self).await,
            Some(Commands::Styles) => TaskCommand::Styles.execute(self).await,
            Some(Commands::Images) => TaskCommand::Images.execute(self).await,
            Some(Commands::Fonts) => TaskCommand::Fonts.execute(self).await,
            Some(Commands::Copy) => TaskCommand::Copy.execute(self).await,
            Some(Commands::Compress) => TaskCommand::Compress.execute(self).await,
            Some(Commands::Serve) => TaskCommand::Serve.execute(self).await,
            Some(Commands::Watch) => TaskCommand::Watch.execute(self).await,
        }
    }

    /// Mode fixed for the whole run
    pub fn mode(&self) -> Mode {
        Mode::from_flag(self.prod)
    }

    /// Load the configuration and build the shared task context
    pub fn context(&self) -> Result<TaskContext> {
        info!("Loading configuration from {}", self.config);
        let config = Config::load(&self.config)?;
        Ok(TaskContext::new(Arc::new(config), self.mode()))
    }
}

/// Print the assetline banner
fn print_banner(mode: Mode) {
    let mode = match mode {
        Mode::Production => mode.to_string().yellow(),
        Mode::Development => mode.to_string().green(),
    };

    eprintln!(
        "\n{} {} {} {}\n",
        "◆".cyan(),
        "assetline".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed(),
        mode
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_dev() {
        let cli = Cli::try_parse_from(["assetline"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, "assetline.toml");
    }

    #[test]
    fn test_prod_flag_is_global() {
        let cli = Cli::try_parse_from(["assetline", "styles", "--prod"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Styles)));
        assert_eq!(cli.mode(), Mode::Production);
    }

    #[test]
    fn test_dev_options() {
        let cli = Cli::try_parse_from(["assetline", "dev", "--port", "4000", "--no-open"]).unwrap();
        match cli.command {
            Some(Commands::Dev(cmd)) => {
                assert_eq!(cmd.port, Some(4000));
                assert!(cmd.no_open);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
