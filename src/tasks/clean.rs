//! Output directory removal

use std::fs;
use std::io::ErrorKind;

use async_trait::async_trait;
use tracing::debug;

use super::{blocking, Stage, Task, TaskContext, TaskReport};
use crate::error::{PipelineError, Result};

/// Deletes the output directory; a missing directory is not an error
pub struct CleanTask;

#[async_trait]
impl Task for CleanTask {
    fn name(&self) -> &'static str {
        "clean"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let dist = ctx.config.dist_dir();

        blocking(move || {
            let mut report = TaskReport::new("clean");

            match fs::remove_dir_all(&dist) {
                Ok(()) => debug!("Removed {}", dist.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("{} does not exist, nothing to clean", dist.display())
                }
                Err(e) => return Err(PipelineError::io(&dist, e)),
            }

            report.stage(Stage::Delete);
            Ok(report)
        })
        .await
    }
}
