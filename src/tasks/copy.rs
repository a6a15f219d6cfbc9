//! Verbatim copy of the remaining source files

use std::fs;

use async_trait::async_trait;
use tracing::debug;

use super::files::{collect_files, write_file};
use super::{blocking, Stage, Task, TaskContext, TaskReport};
use crate::config::Config;
use crate::error::{IoResultExt, Result};

/// Copies every source file outside the styles, images and fonts subtrees
pub struct CopyTask;

#[async_trait]
impl Task for CopyTask {
    fn name(&self) -> &'static str {
        "copy"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let config = ctx.config.clone();
        blocking(move || copy_sources(&config)).await
    }
}

fn copy_sources(config: &Config) -> Result<TaskReport> {
    let mut report = TaskReport::new("copy");
    let src = config.src_dir();
    let dist = config.dist_dir();
    let skipped = config.dedicated_src_dirs();

    let files = collect_files(&src, |dir| skipped.iter().any(|s| s == dir), |_| true)?;

    for file in &files {
        let data = fs::read(&file.path).with_path(&file.path)?;
        report.stage(Stage::Copy);

        let written = write_file(&dist.join(&file.relative), &data)?;
        report.stage(Stage::Write);
        report.files.push(written);
    }

    debug!("copy: {} file(s) written to {}", files.len(), dist.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::tasks::TaskContext;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_skips_dedicated_subtrees() {
        let dir = TempDir::new().unwrap();
        let config = Config::for_project(dir.path(), "aurora");
        let src = config.src_dir();
        for sub in ["scss", "images", "fonts", "js", "templates/parts"] {
            fs::create_dir_all(src.join(sub)).unwrap();
        }
        fs::write(src.join("scss/vendor.scss"), "a{}").unwrap();
        fs::write(src.join("images/a.png"), "png").unwrap();
        fs::write(src.join("fonts/a.woff"), "woff").unwrap();
        fs::write(src.join("js/app.js"), "console.log(1)").unwrap();
        fs::write(src.join("templates/parts/header.html"), "<header/>").unwrap();
        let ctx = TaskContext::new(Arc::new(config), Mode::Development);

        let report = CopyTask.run(&ctx).await.unwrap();

        let mut written: Vec<PathBuf> = report
            .files
            .iter()
            .map(|f| f.path.strip_prefix(ctx.config.dist_dir()).unwrap().to_path_buf())
            .collect();
        written.sort();
        assert_eq!(
            written,
            vec![
                PathBuf::from("js/app.js"),
                PathBuf::from("templates/parts/header.html")
            ]
        );
        assert_eq!(
            fs::read_to_string(ctx.config.dist_dir().join("js/app.js")).unwrap(),
            "console.log(1)"
        );
    }
}
