//! Single-task commands

use anyhow::Result;
use colored::Colorize;

use super::Cli;
use crate::runner::run_task;
use crate::server::ServeOptions;
use crate::tasks::{
    AssetTask, CleanTask, CompressTask, CopyTask, ServeTask, StylesTask, Task,
};
use crate::utils::{display_path, format_size};
use crate::watch::WatchTask;

/// A task run on its own from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCommand {
    Clean,
    Styles,
    Images,
    Fonts,
    Copy,
    Compress,
    Serve,
    Watch,
}

impl TaskCommand {
    fn task(self, options: ServeOptions) -> Box<dyn Task> {
        match self {
            TaskCommand::Clean => Box::new(CleanTask),
            TaskCommand::Styles => Box::new(StylesTask),
            TaskCommand::Images => Box::new(AssetTask::images()),
            TaskCommand::Fonts => Box::new(AssetTask::fonts()),
            TaskCommand::Copy => Box::new(CopyTask),
            TaskCommand::Compress => Box::new(CompressTask),
            TaskCommand::Serve => Box::new(ServeTask::new(options)),
            TaskCommand::Watch => Box::new(WatchTask),
        }
    }

    pub async fn execute(self, cli: &Cli) -> Result<()> {
        let ctx = cli.context()?;
        let task = self.task(ServeOptions::from_config(&ctx.config));

        let report = run_task(task.as_ref(), &ctx).await?;

        for file in &report.files {
            eprintln!(
                "  {} {} {}",
                "•".dimmed(),
                display_path(&file.path).cyan(),
                format_size(file.size).dimmed()
            );
        }
        for diagnostic in &report.diagnostics {
            eprintln!("  {} {}", "✗".red(), diagnostic);
        }

        if self == TaskCommand::Serve {
            eprintln!("  {} Press {} to stop\n", "•".dimmed(), "Ctrl+C".yellow());
            tokio::signal::ctrl_c().await?;
            eprintln!("\n{} Stopped", "■".dimmed());
        }

        Ok(())
    }
}
