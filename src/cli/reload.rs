//! Remote reload command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::Cli;
use crate::config::Config;
use crate::server::reload::RELOAD_ROUTE;

/// Ask a running development server to reload its browsers
#[derive(Args, Debug)]
pub struct ReloadCommand {
    /// Base URL of the server (defaults to http://localhost:<serve.port>)
    #[arg(long)]
    pub url: Option<String>,
}

impl ReloadCommand {
    pub async fn execute(&self, cli: &Cli) -> Result<()> {
        let base = match &self.url {
            Some(url) => url.clone(),
            None => {
                let config = Config::load(&cli.config)?;
                format!("http://localhost:{}", config.serve.port)
            }
        };
        let endpoint = reload_endpoint(&base);

        let response = reqwest::Client::new()
            .post(&endpoint)
            .send()
            .await
            .with_context(|| format!("No development server reachable at {}", base))?;

        if !response.status().is_success() {
            anyhow::bail!("{} answered {}", endpoint, response.status());
        }

        eprintln!("{} Reload sent to {}", "✓".green().bold(), base.cyan());
        Ok(())
    }
}

fn reload_endpoint(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), RELOAD_ROUTE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_endpoint() {
        assert_eq!(
            reload_endpoint("http://localhost:3000/"),
            "http://localhost:3000/__assetline/reload"
        );
    }
}
