//! Packaging into `<bundle>/<project>.zip`
//!
//! Walks the project root, leaves out development-only paths, swaps the
//! placeholder token for the project name in text files and writes a
//! deflated archive.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use async_trait::async_trait;
use globset::GlobSet;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::files::{collect_files, extension_of, SourceFile};
use super::{blocking, Stage, Task, TaskContext, TaskReport, WrittenFile};
use crate::config::Config;
use crate::error::{IoResultExt, PipelineError, Result};
use crate::transform::replace_placeholder;
use crate::utils::{build_globset, format_size, is_hidden, to_slash};

/// Archives the project tree
pub struct CompressTask;

#[async_trait]
impl Task for CompressTask {
    fn name(&self) -> &'static str {
        "compress"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let config = ctx.config.clone();
        blocking(move || compress(&config)).await
    }
}

/// Root-relative exclusion rules
struct Exclusions {
    globs: GlobSet,
    include_hidden: bool,
}

impl Exclusions {
    fn new(config: &Config) -> Result<Self> {
        let mut patterns: Vec<String> = config.compress.exclude.clone();
        patterns.push(config.paths.src.clone());
        patterns.push(config.paths.bundle.clone());
        if let Some(source) = &config.source {
            if let Some(name) = source.strip_prefix(&config.root).ok().map(to_slash) {
                patterns.push(name);
            }
        }

        // A bare name excludes the path itself and everything beneath it
        let expanded: Vec<String> = patterns
            .iter()
            .map(|p| p.trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .flat_map(|p| [format!("{}/**", p), p])
            .collect();

        let globs = build_globset(&expanded)
            .map_err(|e| PipelineError::Config(format!("invalid compress.exclude pattern: {}", e)))?;

        Ok(Self {
            globs,
            include_hidden: config.compress.include_hidden,
        })
    }

    fn excludes(&self, relative: &Path) -> bool {
        (!self.include_hidden && is_hidden(relative)) || self.globs.is_match(relative)
    }
}

fn compress(config: &Config) -> Result<TaskReport> {
    let mut report = TaskReport::new("compress");
    let root = &config.root;
    let exclusions = Exclusions::new(config)?;
    let relative = |path: &Path| path.strip_prefix(root).unwrap_or(path).to_path_buf();

    let files: Vec<SourceFile> = collect_files(
        root,
        |dir| exclusions.excludes(&relative(dir)),
        |file| !exclusions.excludes(&relative(file)),
    )?;

    let archive_path = config.archive_path();
    let bundle_dir = config.bundle_dir();
    fs::create_dir_all(&bundle_dir).with_path(&bundle_dir)?;

    let file = File::create(&archive_path).with_path(&archive_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("  {spinner} archiving [{bar:30}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let placeholder = &config.compress.placeholder;
    let mut replaced_files = 0;

    for source in &files {
        let name = to_slash(&source.relative);
        progress.set_message(name.clone());

        let data = fs::read(&source.path).with_path(&source.path)?;
        let data = if extension_of(&source.path) == "zip" {
            data
        } else {
            match replace_placeholder(&data, placeholder, &config.project.name) {
                Some(replaced) => {
                    replaced_files += 1;
                    report.stage(Stage::Replace);
                    replaced
                }
                None => data,
            }
        };

        zip.start_file(name, options)?;
        zip.write_all(&data).with_path(&archive_path)?;
        progress.inc(1);
    }

    let mut writer = zip.finish()?;
    writer.flush().with_path(&archive_path)?;
    progress.finish_and_clear();
    report.stage(Stage::Archive);

    let size = fs::metadata(&archive_path).with_path(&archive_path)?.len();
    report.stage(Stage::Write);
    report.files.push(WrittenFile {
        path: archive_path.clone(),
        size,
    });

    debug!("Replaced '{}' in {} file(s)", placeholder, replaced_files);
    info!(
        "Packaged {} file(s) into {} ({})",
        files.len(),
        archive_path.display(),
        format_size(size)
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn read_archive(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            entries.push((entry.name().to_string(), data));
        }
        entries.sort();
        entries
    }

    fn project() -> (TempDir, Arc<Config>) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let mut config = Config::for_project(root, "aurora");
        config.source = Some(root.join("assetline.toml"));

        let files: &[(&str, &[u8])] = &[
            ("assetline.toml", b"[project]\nname = \"aurora\"\n"),
            ("package.json", b"{}"),
            (".gitignore", b"dist\n"),
            (".git/HEAD", b"ref"),
            ("node_modules/lib/index.js", b"module"),
            ("src/scss/vendor.scss", b"a{}"),
            ("bundled/old.zip", b"stale"),
            ("functions.php", b"<?php // _themename functions, _themename setup"),
            ("dist/css/main.css", b".x{}"),
            ("dist/images/logo.png", &[0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe]),
            ("languages/pack.zip", b"_themename inside a zip"),
        ];
        for (path, data) in files {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, data).unwrap();
        }

        (dir, Arc::new(config))
    }

    #[tokio::test]
    async fn test_archive_contents() {
        let (_dir, config) = project();
        let ctx = TaskContext::new(config.clone(), Mode::Production);

        let report = CompressTask.run(&ctx).await.unwrap();
        assert!(report.applied(Stage::Replace));
        assert!(report.applied(Stage::Archive));

        let entries = read_archive(&config.archive_path());
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "dist/css/main.css",
                "dist/images/logo.png",
                "functions.php",
                "languages/pack.zip",
            ]
        );
    }

    #[tokio::test]
    async fn test_placeholder_replaced_in_text_only() {
        let (_dir, config) = project();
        let ctx = TaskContext::new(config.clone(), Mode::Production);
        CompressTask.run(&ctx).await.unwrap();

        let entries = read_archive(&config.archive_path());
        let get = |name: &str| entries.iter().find(|(n, _)| n == name).unwrap().1.clone();

        let php = String::from_utf8(get("functions.php")).unwrap();
        assert_eq!(php, "<?php // aurora functions, aurora setup");
        assert!(!php.contains("_themename"));

        // Archives inside the tree and binary files are untouched
        assert_eq!(get("languages/pack.zip"), b"_themename inside a zip".to_vec());
        assert_eq!(get("dist/images/logo.png"), vec![0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe]);
    }

    #[tokio::test]
    async fn test_rerun_excludes_previous_archive() {
        let (_dir, config) = project();
        let ctx = TaskContext::new(config.clone(), Mode::Production);

        CompressTask.run(&ctx).await.unwrap();
        CompressTask.run(&ctx).await.unwrap();

        let entries = read_archive(&config.archive_path());
        assert!(entries.iter().all(|(n, _)| !n.starts_with("bundled")));
    }

    #[test]
    fn test_exclusions() {
        let mut config = Config::for_project("/p", "aurora");
        config.source = Some("/p/assetline.toml".into());
        let exclusions = Exclusions::new(&config).unwrap();

        assert!(exclusions.excludes(Path::new("node_modules")));
        assert!(exclusions.excludes(Path::new("node_modules/a/b.js")));
        assert!(exclusions.excludes(Path::new("src/scss/vendor.scss")));
        assert!(exclusions.excludes(Path::new("assetline.toml")));
        assert!(exclusions.excludes(Path::new(".editorconfig")));
        assert!(!exclusions.excludes(Path::new("style.css")));
        assert!(!exclusions.excludes(Path::new("srcset.php")));
    }

    #[test]
    fn test_custom_source_dir_is_excluded() {
        let mut config = Config::for_project("/p", "aurora");
        config.paths.src = "assets".to_string();
        config.paths.bundle = "release".to_string();
        let exclusions = Exclusions::new(&config).unwrap();

        assert!(exclusions.excludes(Path::new("assets")));
        assert!(exclusions.excludes(Path::new("assets/scss/vendor.scss")));
        assert!(exclusions.excludes(Path::new("release/aurora.zip")));
        assert!(!exclusions.excludes(Path::new("assets.php")));
    }
}
