//! Stylesheet compilation
//!
//! SCSS entry → grass → lightningcss → `<dist>/<styles.dir>/<styles.output>`.
//! Compile failures are reported, never fatal, and leave the previous
//! output in place so a running watch loop keeps going.

use std::io::{Error as IoError, ErrorKind};
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, error};

use super::files::write_file;
use super::{blocking, Stage, Task, TaskContext, TaskReport};
use crate::config::{Config, Mode};
use crate::error::{PipelineError, Result};
use crate::transform::{self, CssOptions};
use crate::utils::{relative_path, to_slash};

/// Compiles the stylesheet entry point
pub struct StylesTask;

#[async_trait]
impl Task for StylesTask {
    fn name(&self) -> &'static str {
        "styles"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let config = ctx.config.clone();
        let mode = ctx.mode;

        let mut report = blocking(move || build_styles(&config, mode)).await?;

        if let Some(message) = report.diagnostics.first() {
            error!("Stylesheet compilation failed:\n{}", message);
            let entry = relative_path(&ctx.config.root, &ctx.config.styles_entry());
            ctx.live.error(message.clone(), entry);
            return Ok(report);
        }

        let output = ctx.config.styles_output();
        let streamed = relative_path(&ctx.config.dist_dir(), &output)
            .unwrap_or_else(|| to_slash(&output));
        ctx.live.stream_css(streamed);
        report.stage(Stage::Stream);

        Ok(report)
    }
}

/// Compile, post-process and write the stylesheet
fn build_styles(config: &Config, mode: Mode) -> Result<TaskReport> {
    let mut report = TaskReport::new("styles");
    let production = mode.is_production();

    let entry = config.styles_entry();
    if !entry.is_file() {
        return Err(PipelineError::io(
            &entry,
            IoError::new(ErrorKind::NotFound, "stylesheet entry not found"),
        ));
    }

    if !production {
        report.stage(Stage::SourceMapInit);
    }

    let load_paths: Vec<PathBuf> = config
        .styles
        .load_paths
        .iter()
        .map(|p| config.root.join(p))
        .collect();

    let css = match transform::compile_scss(&entry, &load_paths) {
        Ok(css) => css,
        Err(message) => {
            report.diagnostics.push(message);
            return Ok(report);
        }
    };
    report.stage(Stage::Compile);

    let mut browsers = config.styles.browsers.clone();
    if production {
        report.stage(Stage::MergeMediaQueries);
        if let Some(floor) = &config.styles.compatibility {
            browsers.push(floor.clone());
        }
        report.stage(Stage::Minify);
    } else {
        report.stage(Stage::SourceMapWrite);
    }
    // Prefixing runs through the declaration handlers, which normalize in
    // both modes
    report.stage(Stage::Normalize);
    report.stage(Stage::Prefix);

    let output = config.styles_output();
    let options = CssOptions {
        filename: relative_path(&config.root, &entry).unwrap_or_else(|| to_slash(&entry)),
        map_source: relative_path(&config.dist_dir(), &output).unwrap_or_else(|| to_slash(&output)),
        browsers,
        merge_media_queries: production,
        minify: production,
        source_map: !production,
    };

    let processed = match transform::css::process(&css, &options) {
        Ok(processed) => processed,
        Err(PipelineError::Css { message, .. }) => {
            report.diagnostics.push(message);
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    report.stage(Stage::Rename);

    let written = write_file(&output, processed.code.as_bytes())?;
    debug!("Wrote {} ({} bytes)", output.display(), written.size);
    report.stage(Stage::Write);
    report.files.push(written);

    Ok(report)
}
