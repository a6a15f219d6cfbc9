//! Pipeline tasks
//!
//! Every unit of work implements [`Task`]. Tasks get a shared
//! [`TaskContext`] and return a [`TaskReport`] describing what they did, so
//! composites and tests can check which stages ran.

mod assets;
mod clean;
mod compress;
mod copy;
mod files;
mod serve;
mod styles;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, Mode};
use crate::error::{PipelineError, Result};
use crate::server::LiveReload;

pub use assets::{AssetKind, AssetTask};
pub use clean::CleanTask;
pub use compress::CompressTask;
pub use copy::CopyTask;
pub use serve::{ReloadTask, ServeTask};
pub use styles::StylesTask;

/// Everything a task may read or signal
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Project configuration
    pub config: Arc<Config>,

    /// Development or production
    pub mode: Mode,

    /// Live reload hub; a no-op when no server is running
    pub live: LiveReload,
}

impl TaskContext {
    pub fn new(config: Arc<Config>, mode: Mode) -> Self {
        Self {
            config,
            mode,
            live: LiveReload::new(),
        }
    }
}

/// A processing step a task applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Delete,
    SourceMapInit,
    Compile,
    MergeMediaQueries,
    Minify,
    SourceMapWrite,
    /// Rule merging and value shortening done alongside prefixing
    Normalize,
    Prefix,
    Rename,
    Write,
    Stream,
    Copy,
    Optimize,
    Replace,
    Archive,
    Serve,
    Reload,
}

/// A file a task wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Summary of a task run
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// Task name
    pub task: &'static str,

    /// Stages applied, in order
    pub stages: Vec<Stage>,

    /// Files written
    pub files: Vec<WrittenFile>,

    /// Non-fatal problems (compile errors)
    pub diagnostics: Vec<String>,
}

impl TaskReport {
    pub fn new(task: &'static str) -> Self {
        Self {
            task,
            stages: Vec::new(),
            files: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Record a stage once, keeping first-seen order
    pub fn stage(&mut self, stage: Stage) {
        if !self.stages.contains(&stage) {
            self.stages.push(stage);
        }
    }

    /// Whether a stage was applied
    pub fn applied(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Total bytes written
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// True when the run produced no diagnostics
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Task trait - implement this to add a pipeline step
#[async_trait]
pub trait Task: Send + Sync {
    /// Task name for logging and the command line
    fn name(&self) -> &'static str;

    /// Run the task to completion
    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport>;
}

/// Run blocking work off the async runtime
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PipelineError::Other(anyhow::Error::new(e)))?
}
