//! Development server and reload tasks

use async_trait::async_trait;
use tracing::{error, info};

use super::{Stage, Task, TaskContext, TaskReport};
use crate::error::Result;
use crate::server::{DevServer, ServeOptions};

/// Starts the development server in the background.
///
/// The task completes once the listener is bound; the server keeps running
/// for the rest of the process.
pub struct ServeTask {
    options: ServeOptions,
}

impl ServeTask {
    pub fn new(options: ServeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Task for ServeTask {
    fn name(&self) -> &'static str {
        "serve"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut report = TaskReport::new("serve");

        let server = DevServer::new(ctx.config.clone(), self.options.clone(), ctx.live.clone());
        let running = server.spawn().await?;
        info!("Development server started on {}", running.addr);

        tokio::spawn(async move {
            match running.handle.await {
                Ok(Ok(())) => info!("Development server stopped"),
                Ok(Err(e)) => error!("Development server failed: {}", e),
                Err(e) => error!("Development server task aborted: {}", e),
            }
        });

        report.stage(Stage::Serve);
        Ok(report)
    }
}

/// Tells every connected browser to reload
pub struct ReloadTask;

#[async_trait]
impl Task for ReloadTask {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let mut report = TaskReport::new("reload");
        ctx.live.reload("files changed");
        report.stage(Stage::Reload);
        Ok(report)
    }
}
