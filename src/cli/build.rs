//! Build command implementation

use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::Cli;
use crate::runner::build_pipeline;
use crate::tasks::TaskReport;
use crate::utils::{display_path, format_size};

/// Build everything and package the project archive
#[derive(Args, Debug, Default)]
pub struct BuildCommand {
    /// Skip packaging; stop after the output directory is built
    #[arg(long)]
    pub no_archive: bool,
}

impl BuildCommand {
    pub async fn execute(&self, cli: &Cli) -> Result<()> {
        let start = Instant::now();
        let ctx = cli.context()?;

        let mut pipeline = build_pipeline();
        if self.no_archive {
            pipeline = pipeline.without("compress");
        }

        let reports = pipeline.run(&ctx).await?;
        let duration = start.elapsed();

        let written: usize = reports.iter().map(|r| r.files.len()).sum();
        eprintln!(
            "\n{} Built {} file(s) in {:.2}s ({} mode)\n",
            "✓".green().bold(),
            written,
            duration.as_secs_f64(),
            ctx.mode
        );

        print_summary(&reports);
        Ok(())
    }
}

/// Per-task sizes, plus every diagnostic
fn print_summary(reports: &[TaskReport]) {
    for report in reports.iter().filter(|r| !r.files.is_empty()) {
        let size = format_size(report.total_size());
        if report.files.len() == 1 {
            eprintln!(
                "  {} {} {}",
                "•".dimmed(),
                display_path(&report.files[0].path).cyan(),
                size.dimmed()
            );
        } else {
            eprintln!(
                "  {} {} {} file(s) {}",
                "•".dimmed(),
                report.task.cyan(),
                report.files.len(),
                size.dimmed()
            );
        }
    }

    for report in reports {
        for diagnostic in &report.diagnostics {
            eprintln!("  {} {}: {}", "✗".red(), report.task, diagnostic);
        }
    }

    eprintln!();
}
