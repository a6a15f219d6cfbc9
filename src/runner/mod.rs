//! Task composition
//!
//! A [`Pipeline`] is a list of steps run one after another. A step is
//! either a single task or a group of tasks started together; the next step
//! begins only after every task of the group has finished. The first
//! failure aborts the rest of the pipeline.

use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use futures_util::future::try_join_all;
use tracing::debug;

use crate::error::Result;
use crate::server::ServeOptions;
use crate::tasks::{
    AssetTask, CleanTask, CompressTask, CopyTask, ServeTask, StylesTask, Task, TaskContext,
    TaskReport,
};
use crate::utils::format_duration;
use crate::watch::WatchTask;

/// One pipeline step
#[derive(Clone)]
pub enum Step {
    Task(Arc<dyn Task>),
    Parallel(Vec<Arc<dyn Task>>),
}

impl Step {
    fn describe(&self) -> String {
        match self {
            Step::Task(task) => task.name().to_string(),
            Step::Parallel(tasks) => {
                let names: Vec<&str> = tasks.iter().map(|t| t.name()).collect();
                format!("({})", names.join(" ∥ "))
            }
        }
    }
}

/// A named sequence of steps
#[derive(Clone)]
pub struct Pipeline {
    name: &'static str,
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// Append a task run on its own
    pub fn then(mut self, task: impl Task + 'static) -> Self {
        self.steps.push(Step::Task(Arc::new(task)));
        self
    }

    /// Append a group of tasks run concurrently
    pub fn parallel(mut self, tasks: Vec<Arc<dyn Task>>) -> Self {
        self.steps.push(Step::Parallel(tasks));
        self
    }

    /// Remove the task called `name`, wherever it appears
    pub fn without(mut self, name: &str) -> Self {
        self.steps = self
            .steps
            .into_iter()
            .filter_map(|step| match step {
                Step::Task(task) if task.name() == name => None,
                Step::Parallel(tasks) => {
                    let tasks: Vec<_> = tasks.into_iter().filter(|t| t.name() != name).collect();
                    (!tasks.is_empty()).then_some(Step::Parallel(tasks))
                }
                step => Some(step),
            })
            .collect();
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Human readable shape, e.g. `clean → (styles ∥ images) → compress`
    pub fn describe(&self) -> String {
        self.steps
            .iter()
            .map(Step::describe)
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Run every step in order, collecting the reports
    pub async fn run(&self, ctx: &TaskContext) -> Result<Vec<TaskReport>> {
        let start = Instant::now();
        debug!("Pipeline '{}': {}", self.name, self.describe());
        eprintln!("{} Starting '{}'...", "→".blue(), self.name.cyan());

        let mut reports = Vec::new();
        for step in &self.steps {
            match step {
                Step::Task(task) => reports.push(run_task(task.as_ref(), ctx).await?),
                Step::Parallel(tasks) => {
                    let group = tasks.iter().map(|task| run_task(task.as_ref(), ctx));
                    reports.extend(try_join_all(group).await?);
                }
            }
        }

        eprintln!(
            "{} Finished '{}' after {}",
            "✓".green().bold(),
            self.name.cyan(),
            format_duration(start.elapsed()).dimmed()
        );

        Ok(reports)
    }
}

/// Run one task with start/finish lines
pub async fn run_task(task: &dyn Task, ctx: &TaskContext) -> Result<TaskReport> {
    let start = Instant::now();
    eprintln!("  {} Starting '{}'...", "•".dimmed(), task.name());

    match task.run(ctx).await {
        Ok(report) => {
            eprintln!(
                "  {} Finished '{}' after {}",
                "•".dimmed(),
                task.name(),
                format_duration(start.elapsed()).dimmed()
            );
            Ok(report)
        }
        Err(e) => {
            eprintln!("  {} '{}' failed: {}", "✗".red(), task.name(), e);
            Err(e)
        }
    }
}

/// The asset tasks that run side by side in both composites
fn asset_group() -> Vec<Arc<dyn Task>> {
    vec![
        Arc::new(StylesTask),
        Arc::new(AssetTask::fonts()),
        Arc::new(AssetTask::images()),
        Arc::new(CopyTask),
    ]
}

/// clean → (styles ∥ fonts ∥ images ∥ copy) → compress
pub fn build_pipeline() -> Pipeline {
    Pipeline::new("build")
        .then(CleanTask)
        .parallel(asset_group())
        .then(CompressTask)
}

/// clean → (styles ∥ fonts ∥ images ∥ copy) → serve → watch
pub fn dev_pipeline(options: ServeOptions) -> Pipeline {
    Pipeline::new("dev")
        .then(CleanTask)
        .parallel(asset_group())
        .then(ServeTask::new(options))
        .then(WatchTask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Mode, OpenMode};
    use crate::error::PipelineError;
    use crate::server::ReloadMessage;
    use crate::tasks::Stage;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        delay_ms: u64,
        fail: bool,
        log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, delay_ms: u64, log: &Log) -> Self {
            Self {
                name,
                delay_ms,
                fail: false,
                log: log.clone(),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl Task for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _ctx: &TaskContext) -> Result<TaskReport> {
            self.log.lock().unwrap().push(format!("start {}", self.name));
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.log.lock().unwrap().push(format!("end {}", self.name));
            if self.fail {
                return Err(PipelineError::Config(format!("{} failed", self.name)));
            }
            Ok(TaskReport::new(self.name))
        }
    }

    fn context() -> (TempDir, TaskContext) {
        let dir = TempDir::new().unwrap();
        let config = Config::for_project(dir.path(), "aurora");
        (dir, TaskContext::new(Arc::new(config), Mode::Development))
    }

    #[tokio::test]
    async fn test_group_finishes_before_next_step() {
        let (_dir, ctx) = context();
        let log: Log = Arc::default();

        let pipeline = Pipeline::new("test")
            .then(Recorder::new("first", 0, &log))
            .parallel(vec![
                Arc::new(Recorder::new("slow", 50, &log)),
                Arc::new(Recorder::new("fast", 0, &log)),
            ])
            .then(Recorder::new("last", 0, &log));

        let reports = pipeline.run(&ctx).await.unwrap();
        let log = log.lock().unwrap().clone();

        assert_eq!(reports.len(), 4);
        let last = log.iter().position(|l| l == "start last").unwrap();
        let slow = log.iter().position(|l| l == "end slow").unwrap();
        let fast = log.iter().position(|l| l == "end fast").unwrap();
        assert!(slow < last);
        assert!(fast < last);
        // Both group members start before either finishes
        let start_fast = log.iter().position(|l| l == "start fast").unwrap();
        assert!(start_fast < slow);
    }

    #[tokio::test]
    async fn test_failure_aborts_pipeline() {
        let (_dir, ctx) = context();
        let log: Log = Arc::default();

        let pipeline = Pipeline::new("test")
            .parallel(vec![
                Arc::new(Recorder::new("broken", 0, &log).failing()),
                Arc::new(Recorder::new("ok", 0, &log)),
            ])
            .then(Recorder::new("never", 0, &log));

        let err = pipeline.run(&ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(!log.lock().unwrap().iter().any(|l| l == "start never"));
    }

    #[test]
    fn test_composite_shapes() {
        assert_eq!(
            build_pipeline().describe(),
            "clean → (styles ∥ fonts ∥ images ∥ copy) → compress"
        );

        let options = ServeOptions {
            bind: "127.0.0.1".to_string(),
            port: 0,
            host: "localhost".to_string(),
            open: OpenMode::Off,
            notify: false,
        };
        assert_eq!(
            dev_pipeline(options).describe(),
            "clean → (styles ∥ fonts ∥ images ∥ copy) → serve → watch"
        );
    }

    #[test]
    fn test_without_removes_steps() {
        assert_eq!(
            build_pipeline().without("compress").describe(),
            "clean → (styles ∥ fonts ∥ images ∥ copy)"
        );
        assert_eq!(
            build_pipeline().without("fonts").describe(),
            "clean → (styles ∥ images ∥ copy) → compress"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dev_pipeline_builds_serves_and_watches() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::for_project(std::fs::canonicalize(dir.path()).unwrap(), "aurora");
        config.serve.static_files = true;
        config.watch.debounce_ms = 50;
        let entry = config.styles_entry();
        std::fs::create_dir_all(entry.parent().unwrap()).unwrap();
        std::fs::write(&entry, ".a { color: red; }").unwrap();

        let ctx = TaskContext::new(Arc::new(config), Mode::Development);
        let mut rx = ctx.live.subscribe();
        let options = ServeOptions {
            bind: "127.0.0.1".to_string(),
            port: 0,
            host: "localhost".to_string(),
            open: OpenMode::Off,
            notify: false,
        };
        let dev_ctx = ctx.clone();
        let dev = tokio::spawn(async move { dev_pipeline(options).run(&dev_ctx).await });

        let wait = Duration::from_secs(10);
        let initial = tokio::time::timeout(wait, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(initial, ReloadMessage::CssUpdate { .. }));
        assert!(ctx.config.styles_output().is_file());

        tokio::time::sleep(Duration::from_millis(500)).await;
        std::fs::write(&entry, ".a { color: blue; }").unwrap();

        let rebuilt = tokio::time::timeout(wait, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(rebuilt, ReloadMessage::CssUpdate { .. }));
        let reload = tokio::time::timeout(wait, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(reload, ReloadMessage::FullReload { .. }));
        assert!(!dev.is_finished());

        dev.abort();
    }

    #[tokio::test]
    async fn test_build_produces_archive() {
        let (_dir, ctx) = context();
        let config = ctx.config.clone();
        let entry = config.styles_entry();
        std::fs::create_dir_all(entry.parent().unwrap()).unwrap();
        std::fs::write(&entry, ".a { color: red; }").unwrap();
        std::fs::create_dir_all(config.src_dir().join("js")).unwrap();
        std::fs::write(config.src_dir().join("js/app.js"), "let x = 1;").unwrap();
        std::fs::create_dir_all(config.dist_dir().join("stale")).unwrap();
        std::fs::write(config.dist_dir().join("stale/old.txt"), "old").unwrap();

        let ctx = TaskContext::new(config.clone(), Mode::Production);
        let reports = build_pipeline().run(&ctx).await.unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.task).collect();
        assert_eq!(names, vec!["clean", "styles", "fonts", "images", "copy", "compress"]);
        assert!(reports[1].applied(Stage::Minify));
        assert!(config.archive_path().is_file());
        assert!(!config.dist_dir().join("stale").exists());
        assert!(config.dist_dir().join("js/app.js").is_file());
    }
}
