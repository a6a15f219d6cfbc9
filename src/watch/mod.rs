//! Source watching
//!
//! Changes under the project root are debounced into batches. Each batch is
//! classified into [`WatchAction`]s, every distinct task runs once, and
//! connected browsers get a single reload afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use globset::GlobSet;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::runner::run_task;
use crate::tasks::{
    AssetTask, CopyTask, ReloadTask, StylesTask, Task, TaskContext, TaskReport,
};
use crate::utils::{build_globset, build_globset_ignore_case, is_hidden, to_slash};

/// What a changed file asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchAction {
    Styles,
    Images,
    Fonts,
    Copy,
    Reload,
}

impl WatchAction {
    fn task(self) -> Box<dyn Task> {
        match self {
            WatchAction::Styles => Box::new(StylesTask),
            WatchAction::Images => Box::new(AssetTask::images()),
            WatchAction::Fonts => Box::new(AssetTask::fonts()),
            WatchAction::Copy => Box::new(CopyTask),
            WatchAction::Reload => Box::new(ReloadTask),
        }
    }
}

/// Maps root-relative paths to actions
pub struct WatchRules {
    root: PathBuf,
    styles: GlobSet,
    images: GlobSet,
    fonts: GlobSet,
    markup: GlobSet,
    src: PathBuf,
    dedicated: Vec<PathBuf>,
    ignored: Vec<PathBuf>,
}

impl WatchRules {
    pub fn new(config: &Config) -> Result<Self> {
        let root = config.root.clone();
        let rel = |path: PathBuf| {
            path.strip_prefix(&root)
                .map(Path::to_path_buf)
                .unwrap_or(path)
        };

        let styles_dir = to_slash(&rel(config.styles_src_dir()));
        let images_dir = to_slash(&rel(config.images_src_dir()));
        let fonts_dir = to_slash(&rel(config.fonts_src_dir()));
        let extensions = config.images.extensions.join(",");

        let invalid = |e: globset::Error| PipelineError::Config(format!("invalid watch pattern: {}", e));
        let glob = |patterns: &[String]| build_globset(patterns).map_err(invalid);

        // Image extensions match like the images task does, ignoring case
        let images = build_globset_ignore_case(&[format!("{}/**/*.{{{}}}", images_dir, extensions)])
            .map_err(invalid)?;

        Ok(Self {
            styles: glob(&[format!("{}/**/*.scss", styles_dir)])?,
            images,
            fonts: glob(&[format!("{}/**", fonts_dir)])?,
            markup: glob(&config.watch.markup)?,
            src: rel(config.src_dir()),
            dedicated: config.dedicated_src_dirs().into_iter().map(rel).collect(),
            ignored: vec![
                rel(config.dist_dir()),
                rel(config.bundle_dir()),
                PathBuf::from("node_modules"),
                PathBuf::from("target"),
            ],
            root,
        })
    }

    /// Actions for one root-relative path
    pub fn classify(&self, relative: &Path) -> Vec<WatchAction> {
        if is_hidden(relative) || self.ignored.iter().any(|dir| relative.starts_with(dir)) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.styles.is_match(relative) {
            actions.push(WatchAction::Styles);
        } else if self.images.is_match(relative) {
            actions.push(WatchAction::Images);
        } else if self.fonts.is_match(relative) {
            actions.push(WatchAction::Fonts);
        } else if relative.starts_with(&self.src)
            && !self.dedicated.iter().any(|dir| relative.starts_with(dir))
        {
            actions.push(WatchAction::Copy);
        }

        if self.markup.is_match(relative) {
            actions.push(WatchAction::Reload);
        }
        actions
    }

    /// Distinct tasks for a batch of changed paths, in first-seen order,
    /// followed by exactly one reload. Empty when nothing relevant changed.
    pub fn plan<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<WatchAction> {
        let mut plan = Vec::new();
        let mut relevant = false;

        for path in paths {
            let path = path.as_ref();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            for action in self.classify(relative) {
                relevant = true;
                if action != WatchAction::Reload && !plan.contains(&action) {
                    plan.push(action);
                }
            }
        }

        if relevant {
            plan.push(WatchAction::Reload);
        }
        plan
    }
}

/// Run a batch plan. Failures are logged and the remaining actions still run.
pub async fn execute_plan(plan: &[WatchAction], ctx: &TaskContext) -> Vec<TaskReport> {
    let mut reports = Vec::new();

    for action in plan {
        let task = action.task();
        match run_task(task.as_ref(), ctx).await {
            Ok(report) => reports.push(report),
            Err(e) => error!("Task '{}' failed: {}", task.name(), e),
        }
    }

    reports
}

/// Watches sources until the process exits
pub struct WatchTask;

#[async_trait]
impl Task for WatchTask {
    fn name(&self) -> &'static str {
        "watch"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let rules = WatchRules::new(&ctx.config)?;
        let root = ctx.config.root.clone();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(
            Duration::from_millis(ctx.config.watch.debounce_ms),
            move |result: DebounceEventResult| {
                let _ = tx.send(result);
            },
        )?;
        debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

        info!("Watching {}", root.display());
        eprintln!(
            "  {} Watching for changes in {}\n",
            "•".dimmed(),
            root.display().to_string().cyan()
        );

        while let Some(result) = rx.recv().await {
            let events = match result {
                Ok(events) => events,
                Err(e) => {
                    warn!("Watch error: {}", e);
                    continue;
                }
            };

            let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
            let plan = rules.plan(&paths);
            if plan.is_empty() {
                continue;
            }

            for path in &paths {
                let relative = path.strip_prefix(&root).unwrap_or(path);
                eprintln!("  {} {}", "↻".yellow(), to_slash(relative).dimmed());
            }
            debug!("Watch plan: {:?}", plan);
            execute_plan(&plan, ctx).await;
        }

        // Only reached once the debouncer has shut down
        drop(debouncer);
        Ok(TaskReport::new("watch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::server::ReloadMessage;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn rules() -> WatchRules {
        WatchRules::new(&Config::for_project("/site", "aurora")).unwrap()
    }

    #[test]
    fn test_classify() {
        let rules = rules();
        let classify = |p: &str| rules.classify(Path::new(p));

        assert_eq!(classify("src/scss/vendor.scss"), vec![WatchAction::Styles]);
        assert_eq!(classify("src/scss/parts/_grid.scss"), vec![WatchAction::Styles]);
        assert_eq!(classify("src/images/hero.png"), vec![WatchAction::Images]);
        assert_eq!(classify("src/images/icons/star.svg"), vec![WatchAction::Images]);
        assert_eq!(classify("src/images/HERO.JPG"), vec![WatchAction::Images]);
        assert_eq!(classify("src/fonts/body.woff2"), vec![WatchAction::Fonts]);
        assert_eq!(classify("src/js/app.js"), vec![WatchAction::Copy]);
        assert_eq!(
            classify("src/templates/header.html"),
            vec![WatchAction::Copy, WatchAction::Reload]
        );
        assert_eq!(classify("index.html"), vec![WatchAction::Reload]);
    }

    #[test]
    fn test_classify_ignores_outputs() {
        let rules = rules();

        assert!(rules.classify(Path::new("dist/css/main.css")).is_empty());
        assert!(rules.classify(Path::new("dist/index.html")).is_empty());
        assert!(rules.classify(Path::new("bundled/aurora.zip")).is_empty());
        assert!(rules.classify(Path::new("node_modules/x/index.html")).is_empty());
        assert!(rules.classify(Path::new(".git/index")).is_empty());
        assert!(rules.classify(Path::new("src/images/notes.txt")).is_empty());
        assert!(rules.classify(Path::new("functions.php")).is_empty());
    }

    #[test]
    fn test_plan_dedups_and_reloads_once() {
        let rules = rules();
        let plan = rules.plan(&[
            "/site/src/scss/a.scss",
            "/site/src/scss/b.scss",
            "/site/src/js/app.js",
            "/site/index.html",
            "/site/dist/css/main.css",
        ]);

        assert_eq!(
            plan,
            vec![WatchAction::Styles, WatchAction::Copy, WatchAction::Reload]
        );
        assert!(rules.plan(&["/site/dist/css/main.css"]).is_empty());
    }

    #[tokio::test]
    async fn test_batch_runs_task_then_one_reload() {
        let dir = TempDir::new().unwrap();
        let config = Config::for_project(dir.path(), "aurora");
        let entry = config.styles_entry();
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        fs::write(&entry, ".a { color: red; }").unwrap();
        let ctx = TaskContext::new(Arc::new(config), Mode::Development);
        let rules = WatchRules::new(&ctx.config).unwrap();
        let mut rx = ctx.live.subscribe();

        let plan = rules.plan(&[entry.clone(), entry]);
        let reports = execute_plan(&plan, &ctx).await;

        let names: Vec<&str> = reports.iter().map(|r| r.task).collect();
        assert_eq!(names, vec!["styles", "reload"]);

        let mut reloads = 0;
        while let Ok(message) = rx.try_recv() {
            if matches!(message, ReloadMessage::FullReload { .. }) {
                reloads += 1;
            }
        }
        assert_eq!(reloads, 1);
        assert!(ctx.config.styles_output().is_file());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watch_loop_rebuilds_once_per_change() {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let mut config = Config::for_project(&root, "aurora");
        config.watch.debounce_ms = 50;
        let entry = config.styles_entry();
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        fs::write(&entry, ".a { color: red; }").unwrap();

        let ctx = TaskContext::new(Arc::new(config), Mode::Development);
        let mut rx = ctx.live.subscribe();
        let watch_ctx = ctx.clone();
        let watcher = tokio::spawn(async move { WatchTask.run(&watch_ctx).await });

        // Give the watcher time to register before touching sources
        tokio::time::sleep(Duration::from_millis(500)).await;
        fs::write(&entry, ".a { color: blue; }").unwrap();

        let wait = Duration::from_secs(10);
        let first = tokio::time::timeout(wait, rx.recv()).await.unwrap().unwrap();
        assert_eq!(
            first,
            ReloadMessage::CssUpdate {
                path: "css/main.css".to_string()
            }
        );
        let second = tokio::time::timeout(wait, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(second, ReloadMessage::FullReload { .. }));

        // Writing dist/css/main.css must not start another round
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(rx.try_recv().is_err());
        assert!(fs::read_to_string(ctx.config.styles_output())
            .unwrap()
            .contains("blue"));

        watcher.abort();
    }

    #[tokio::test]
    async fn test_broken_stylesheet_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let config = Config::for_project(dir.path(), "aurora");
        let entry = config.styles_entry();
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        fs::write(&entry, ".a { color: $missing; ").unwrap();
        let ctx = TaskContext::new(Arc::new(config), Mode::Development);

        let plan = vec![WatchAction::Styles, WatchAction::Copy, WatchAction::Reload];
        let reports = execute_plan(&plan, &ctx).await;

        assert_eq!(reports.len(), 3);
        assert!(!reports[0].is_clean());
    }
}
