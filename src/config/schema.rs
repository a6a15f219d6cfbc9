//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Project metadata configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, used for the archive name, the local hostname and
    /// placeholder replacement
    #[serde(default)]
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Source and output directory layout, relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Source directory
    #[serde(default = "default_src")]
    pub src: String,

    /// Output directory, removed by `clean`
    #[serde(default = "default_dist")]
    pub dist: String,

    /// Directory the zip archive is written to
    #[serde(default = "default_bundle")]
    pub bundle: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            src: default_src(),
            dist: default_dist(),
            bundle: default_bundle(),
        }
    }
}

fn default_src() -> String {
    "src".to_string()
}

fn default_dist() -> String {
    "dist".to_string()
}

fn default_bundle() -> String {
    "bundled".to_string()
}

/// Stylesheet compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// SCSS entry point, relative to the source directory
    #[serde(default = "default_styles_entry")]
    pub entry: String,

    /// Name of the compiled file
    #[serde(default = "default_styles_output")]
    pub output: String,

    /// Output subdirectory inside dist
    #[serde(default = "default_styles_dir")]
    pub dir: String,

    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Extra legacy target honoured when minifying in production
    #[serde(default = "default_compatibility")]
    pub compatibility: Option<String>,

    /// Additional `@use`/`@import` search paths, relative to the project root
    #[serde(default)]
    pub load_paths: Vec<String>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: default_styles_entry(),
            output: default_styles_output(),
            dir: default_styles_dir(),
            browsers: default_browsers(),
            compatibility: default_compatibility(),
            load_paths: Vec::new(),
        }
    }
}

fn default_styles_entry() -> String {
    "scss/vendor.scss".to_string()
}

fn default_styles_output() -> String {
    "main.css".to_string()
}

fn default_styles_dir() -> String {
    "css".to_string()
}

fn default_browsers() -> Vec<String> {
    ["> 0.5%", "last 2 versions", "Firefox ESR", "not dead"]
        .iter()
        .map(|q| q.to_string())
        .collect()
}

fn default_compatibility() -> Option<String> {
    Some("ie 8".to_string())
}

/// Image copying and optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Images subdirectory, shared by src and dist
    #[serde(default = "default_images_dir")]
    pub dir: String,

    /// File extensions picked up by the images task
    #[serde(default = "default_image_extensions")]
    pub extensions: Vec<String>,

    /// oxipng preset (0-6)
    #[serde(default = "default_png_level")]
    pub png_level: u8,

    /// JPEG re-encode quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: default_images_dir(),
            extensions: default_image_extensions(),
            png_level: default_png_level(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "svg", "gif"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_png_level() -> u8 {
    6
}

fn default_jpeg_quality() -> u8 {
    75
}

/// Font copying
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    /// Fonts subdirectory, shared by src and dist
    #[serde(default = "default_fonts_dir")]
    pub dir: String,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            dir: default_fonts_dir(),
        }
    }
}

fn default_fonts_dir() -> String {
    "fonts".to_string()
}

/// Which URL to open once the dev server is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Do not open a browser
    Off,
    /// Open `http://localhost:<port>`
    Local,
    /// Open `http://<host>:<port>`
    External,
}

/// Development server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Upstream site to proxy; defaults to `http://<project>.test`
    #[serde(default)]
    pub proxy: Option<String>,

    /// Serve the output directory instead of proxying
    #[serde(default, rename = "static")]
    pub static_files: bool,

    /// Public hostname; defaults to `<project>.test`
    #[serde(default)]
    pub host: Option<String>,

    /// Address to bind to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Browser opening behaviour
    #[serde(default = "default_open")]
    pub open: OpenMode,

    /// Show in-page notifications on reload
    #[serde(default)]
    pub notify: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            static_files: false,
            host: None,
            bind: default_bind(),
            port: default_port(),
            open: default_open(),
            notify: false,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_open() -> OpenMode {
    OpenMode::External
}

/// File watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Globs (relative to the project root) that only trigger a reload
    #[serde(default = "default_markup")]
    pub markup: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            markup: default_markup(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_markup() -> Vec<String> {
    vec!["**/*.html".to_string()]
}

/// Packaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressConfig {
    /// Token replaced with the project name in archived text files
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Root-relative paths left out of the archive
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Archive dotfiles and dot-directories too
    #[serde(default)]
    pub include_hidden: bool,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
            exclude: default_exclude(),
            include_hidden: false,
        }
    }
}

fn default_placeholder() -> String {
    "_themename".to_string()
}

fn default_exclude() -> Vec<String> {
    [
        "node_modules",
        "bundled",
        "src",
        "target",
        ".gitignore",
        "package.json",
        "package-lock.json",
        "Cargo.toml",
        "Cargo.lock",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}
