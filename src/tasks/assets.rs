//! Image and font copying
//!
//! Both tasks copy a source subtree into the same subtree of dist. In
//! production every file goes through the image optimizer, which only
//! rewrites formats it knows.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use super::files::{collect_files, extension_of, write_file};
use super::{blocking, Stage, Task, TaskContext, TaskReport};
use crate::config::{Config, Mode};
use crate::error::{IoResultExt, Result};
use crate::transform::ImageOptimizer;
use crate::utils::{format_size, to_slash};

/// Which asset subtree a task handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Images,
    Fonts,
}

impl AssetKind {
    fn source_dir(self, config: &Config) -> PathBuf {
        match self {
            AssetKind::Images => config.images_src_dir(),
            AssetKind::Fonts => config.fonts_src_dir(),
        }
    }

    fn dest_dir(self, config: &Config) -> PathBuf {
        match self {
            AssetKind::Images => config.images_dist_dir(),
            AssetKind::Fonts => config.fonts_dist_dir(),
        }
    }

    /// Whether a file with this extension belongs to the task
    fn accepts(self, config: &Config, extension: &str) -> bool {
        match self {
            AssetKind::Images => config
                .images
                .extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(extension)),
            AssetKind::Fonts => true,
        }
    }
}

/// Copies images or fonts, optimizing them in production
pub struct AssetTask {
    kind: AssetKind,
}

impl AssetTask {
    pub fn images() -> Self {
        Self {
            kind: AssetKind::Images,
        }
    }

    pub fn fonts() -> Self {
        Self {
            kind: AssetKind::Fonts,
        }
    }
}

#[async_trait]
impl Task for AssetTask {
    fn name(&self) -> &'static str {
        match self.kind {
            AssetKind::Images => "images",
            AssetKind::Fonts => "fonts",
        }
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let config = ctx.config.clone();
        let mode = ctx.mode;
        let kind = self.kind;
        let name = self.name();

        blocking(move || copy_assets(&config, mode, kind, name)).await
    }
}

fn copy_assets(config: &Config, mode: Mode, kind: AssetKind, name: &'static str) -> Result<TaskReport> {
    let mut report = TaskReport::new(name);
    let source = kind.source_dir(config);
    let dest = kind.dest_dir(config);

    let files = collect_files(&source, |_| false, |path| {
        kind.accepts(config, &extension_of(path))
    })?;

    let optimizer = mode
        .is_production()
        .then(|| ImageOptimizer::new(&config.images));

    let mut saved_total = 0;
    for file in &files {
        let data = fs::read(&file.path).with_path(&file.path)?;

        let bytes = match &optimizer {
            Some(optimizer) => {
                report.stage(Stage::Optimize);
                let optimized = optimizer.optimize(&file.path, data)?;
                let saved = optimized.saved();
                if saved > 0 {
                    info!(
                        "Optimized {} (saved {} - {:.1}%)",
                        to_slash(&file.relative),
                        format_size(saved),
                        saved as f64 * 100.0 / optimized.original_size as f64
                    );
                }
                saved_total += saved;
                optimized.bytes
            }
            None => {
                report.stage(Stage::Copy);
                data
            }
        };

        let written = write_file(&dest.join(&file.relative), &bytes)?;
        report.stage(Stage::Write);
        report.files.push(written);
    }

    if optimizer.is_some() && !files.is_empty() {
        info!(
            "Optimized {} {} (saved {})",
            files.len(),
            name,
            format_size(saved_total)
        );
    }
    debug!("{}: {} file(s) written to {}", name, files.len(), dest.display());

    Ok(report)
}
