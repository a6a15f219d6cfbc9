//! Content transformations
//!
//! Thin wrappers over the libraries doing the real work: grass for SCSS,
//! lightningcss for CSS post-processing, oxipng/image for images.

pub mod css;
pub mod optimize;

use std::path::{Path, PathBuf};

use tracing::debug;

pub use self::css::{CssOptions, ProcessedCss};
pub use self::optimize::{ImageOptimizer, Optimized};

/// Compile an SCSS entry point to expanded CSS.
///
/// The entry's directory is always on the load path. Errors come back as
/// the compiler's formatted message, which already carries the location.
pub fn compile_scss(entry: &Path, load_paths: &[PathBuf]) -> Result<String, String> {
    debug!("Compiling {}", entry.display());

    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    if let Some(parent) = entry.parent() {
        options = options.load_path(parent);
    }
    for path in load_paths {
        options = options.load_path(path);
    }

    grass::from_path(entry, &options).map_err(|e| e.to_string())
}

/// Replace every occurrence of `token` in UTF-8 text.
///
/// Returns `None` for binary content, which is archived untouched.
pub fn replace_placeholder(content: &[u8], token: &str, value: &str) -> Option<Vec<u8>> {
    if token.is_empty() {
        return None;
    }

    let text = std::str::from_utf8(content).ok()?;
    if !text.contains(token) {
        return None;
    }

    Some(text.replace(token, value).into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_compile_scss_with_partials() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_colors.scss"), "$brand: #336699;").unwrap();
        fs::write(
            dir.path().join("vendor.scss"),
            "@import 'colors';\n.nav { a { color: $brand; } }\n",
        )
        .unwrap();

        let css = compile_scss(&dir.path().join("vendor.scss"), &[]).unwrap();

        assert!(css.contains(".nav a"));
        assert!(css.contains("#336699"));
    }

    #[test]
    fn test_compile_scss_reports_errors() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("vendor.scss");
        fs::write(&entry, ".nav { color: $undefined; }").unwrap();

        let message = compile_scss(&entry, &[]).unwrap_err();
        assert!(message.contains("Undefined variable"));
    }

    #[test]
    fn test_replace_placeholder() {
        let out = replace_placeholder(b"Theme: _themename / _themename", "_themename", "aurora");
        assert_eq!(out.unwrap(), b"Theme: aurora / aurora".to_vec());

        assert!(replace_placeholder(b"nothing here", "_themename", "aurora").is_none());
        assert!(replace_placeholder(&[0xff, 0xfe, 0x00], "_themename", "aurora").is_none());
    }
}
