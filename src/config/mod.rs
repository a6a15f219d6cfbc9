//! Configuration handling for Assetline
//!
//! Parses `assetline.toml` and resolves every path the tasks touch against
//! the project root.

mod schema;

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use schema::*;

/// Default configuration file name
pub const CONFIG_FILE: &str = "assetline.toml";

/// Build variant, fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Fast rebuilds, source maps, untouched images
    #[default]
    Development,
    /// Merged media queries, minification, image optimization
    Production,
}

impl Mode {
    /// Pick the mode from the `--prod` switch
    pub fn from_flag(production: bool) -> Self {
        if production {
            Mode::Production
        } else {
            Mode::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Mode::Production
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Development => write!(f, "development"),
            Mode::Production => write!(f, "production"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    #[serde(default)]
    pub project: ProjectConfig,

    /// Directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Stylesheet settings
    #[serde(default)]
    pub styles: StylesConfig,

    /// Image settings
    #[serde(default)]
    pub images: ImagesConfig,

    /// Font settings
    #[serde(default)]
    pub fonts: FontsConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Watcher settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Packaging settings
    #[serde(default)]
    pub compress: CompressConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,

    /// Path of the file this configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// The subset of `package.json` used as a fallback for project metadata
#[derive(Debug, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&absolute_path)
            .with_context(|| format!("Failed to read config file: {}", absolute_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", absolute_path.display()))?;

        // Set root directory to the directory containing the config file
        let parent = absolute_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        config.root = fs::canonicalize(&parent).unwrap_or(parent);
        config.source = Some(config.root.join(
            absolute_path
                .file_name()
                .unwrap_or_else(|| OsStr::new(CONFIG_FILE)),
        ));

        if config.project.name.is_empty() {
            config.fill_from_package_json()?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Create a configuration with defaults for a project rooted at `root`
    pub fn for_project(root: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            project: ProjectConfig {
                name: name.to_string(),
                version: "0.1.0".to_string(),
            },
            root: root.into(),
            ..Default::default()
        }
    }

    /// Read name and version from a sibling `package.json`
    fn fill_from_package_json(&mut self) -> Result<()> {
        let package_path = self.root.join("package.json");
        if !package_path.is_file() {
            anyhow::bail!(
                "No [project].name in config and no package.json at {}",
                package_path.display()
            );
        }

        let content = fs::read_to_string(&package_path)
            .with_context(|| format!("Failed to read {}", package_path.display()))?;
        let package: PackageJson = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", package_path.display()))?;

        debug!("Project metadata taken from {}", package_path.display());

        self.project.name = package.name.unwrap_or_default();
        if let Some(version) = package.version {
            self.project.version = version;
        }

        Ok(())
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let name = &self.project.name;
        if name.is_empty() {
            anyhow::bail!("Project name must not be empty");
        }
        if name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
            anyhow::bail!("Project name '{}' must not contain whitespace or slashes", name);
        }

        if let Some(proxy) = &self.serve.proxy {
            url::Url::parse(proxy)
                .with_context(|| format!("Invalid serve.proxy URL: {}", proxy))?;
        }

        if self.images.png_level > 6 {
            anyhow::bail!("images.png_level must be between 0 and 6");
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            anyhow::bail!("images.jpeg_quality must be between 1 and 100");
        }

        Ok(())
    }

    /// Absolute source directory
    pub fn src_dir(&self) -> PathBuf {
        self.root.join(&self.paths.src)
    }

    /// Absolute output directory
    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(&self.paths.dist)
    }

    /// Absolute directory the archive is written to
    pub fn bundle_dir(&self) -> PathBuf {
        self.root.join(&self.paths.bundle)
    }

    /// Absolute path of the SCSS entry point
    pub fn styles_entry(&self) -> PathBuf {
        self.src_dir().join(&self.styles.entry)
    }

    /// Source subtree holding stylesheets (the entry's top-level directory)
    pub fn styles_src_dir(&self) -> PathBuf {
        let entry = Path::new(&self.styles.entry);
        match entry.components().next() {
            Some(first) if entry.components().count() > 1 => self.src_dir().join(first),
            _ => self.src_dir(),
        }
    }

    /// Absolute path of the compiled stylesheet
    pub fn styles_output(&self) -> PathBuf {
        self.dist_dir()
            .join(&self.styles.dir)
            .join(&self.styles.output)
    }

    /// Source subtrees owned by dedicated tasks, skipped by `copy`
    pub fn dedicated_src_dirs(&self) -> Vec<PathBuf> {
        let src = self.src_dir();
        [self.styles_src_dir(), self.images_src_dir(), self.fonts_src_dir()]
            .into_iter()
            .filter(|dir| *dir != src)
            .collect()
    }

    pub fn images_src_dir(&self) -> PathBuf {
        self.src_dir().join(&self.images.dir)
    }

    pub fn images_dist_dir(&self) -> PathBuf {
        self.dist_dir().join(&self.images.dir)
    }

    pub fn fonts_src_dir(&self) -> PathBuf {
        self.src_dir().join(&self.fonts.dir)
    }

    pub fn fonts_dist_dir(&self) -> PathBuf {
        self.dist_dir().join(&self.fonts.dir)
    }

    /// Absolute path of `<bundle>/<project-name>.zip`
    pub fn archive_path(&self) -> PathBuf {
        self.bundle_dir().join(format!("{}.zip", self.project.name))
    }

    /// Public hostname of the dev server
    pub fn public_host(&self) -> String {
        self.serve
            .host
            .clone()
            .unwrap_or_else(|| format!("{}.test", self.project.name))
    }

    /// Upstream URL to proxy, or `None` when serving the output directory
    pub fn upstream(&self) -> Option<String> {
        if self.serve.static_files {
            return None;
        }

        Some(
            self.serve
                .proxy
                .clone()
                .unwrap_or_else(|| format!("http://{}.test", self.project.name)),
        )
    }
}
