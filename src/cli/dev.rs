//! Development command implementation

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::Cli;
use crate::config::OpenMode;
use crate::runner::dev_pipeline;
use crate::server::ServeOptions;

/// Build, serve and watch
#[derive(Args, Debug, Default)]
pub struct DevCommand {
    /// Port to run the dev server on (defaults to serve.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Do not open a browser
    #[arg(long)]
    pub no_open: bool,
}

impl DevCommand {
    pub async fn execute(&self, cli: &Cli) -> Result<()> {
        let ctx = cli.context()?;

        let mut options = ServeOptions::from_config(&ctx.config);
        if let Some(port) = self.port {
            options.port = port;
        }
        if self.no_open {
            options.open = OpenMode::Off;
        }

        eprintln!(
            "  {} Press {} to stop\n",
            "•".dimmed(),
            "Ctrl+C".yellow()
        );

        let pipeline = dev_pipeline(options);
        tokio::select! {
            result = pipeline.run(&ctx) => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{} Stopped", "■".dimmed());
            }
        }

        Ok(())
    }
}
