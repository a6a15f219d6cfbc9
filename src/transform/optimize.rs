//! Image optimization
//!
//! PNG goes through oxipng, JPEG is re-encoded with the `image` crate, GIF
//! is re-packed losslessly with the `gif` crate, SVG gets a markup cleanup
//! that never touches IDs or text content. Everything else is passed
//! through unchanged.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::config::ImagesConfig;
use crate::error::{PipelineError, Result};

static SVG_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static SVG_METADATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<metadata\b[^>]*>.*?</metadata>|<metadata\b[^>]*/>").unwrap());

/// Elements whose whitespace is content, or any whitespace run
static SVG_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?s)(?P<keep><(?:text|style|script|title|desc)\b[^>]*/>",
        r"|<text\b.*?</text>|<style\b.*?</style>|<script\b.*?</script>",
        r"|<title\b.*?</title>|<desc\b.*?</desc>)",
        r"|\s+",
    ))
    .unwrap()
});

/// Result of optimizing one file
#[derive(Debug, Clone)]
pub struct Optimized {
    pub bytes: Vec<u8>,
    pub original_size: u64,
}

impl Optimized {
    /// Bytes saved compared to the original
    pub fn saved(&self) -> u64 {
        self.original_size.saturating_sub(self.bytes.len() as u64)
    }
}

/// Multi-format optimizer
#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    png_level: u8,
    jpeg_quality: u8,
}

impl ImageOptimizer {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            png_level: config.png_level.min(6),
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    /// Optimize `data`, keeping the original when the result is not smaller
    pub fn optimize(&self, path: &Path, data: Vec<u8>) -> Result<Optimized> {
        let original_size = data.len() as u64;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let candidate = match extension.as_str() {
            "png" => Some(self.optimize_png(path, &data)?),
            "jpg" | "jpeg" => Some(self.optimize_jpeg(path, &data)?),
            "svg" => Some(self.optimize_svg(path, &data)?),
            "gif" => Some(self.optimize_gif(path, &data)?),
            _ => None,
        };

        let bytes = match candidate {
            Some(smaller) if smaller.len() < data.len() => smaller,
            _ => {
                debug!("Keeping original bytes for {}", path.display());
                data
            }
        };

        Ok(Optimized {
            bytes,
            original_size,
        })
    }

    fn optimize_png(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>> {
        let options = oxipng::Options::from_preset(self.png_level);
        oxipng::optimize_from_memory(data, &options).map_err(|e| PipelineError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn optimize_jpeg(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>> {
        let image_error = |e: image::ImageError| PipelineError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(image_error)?;

        let mut out = Vec::with_capacity(data.len());
        let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
        decoded.write_with_encoder(encoder).map_err(image_error)?;

        Ok(out)
    }

    /// Decode to palette indices and encode again frame by frame
    fn optimize_gif(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>> {
        let gif_error = |message: String| PipelineError::Image {
            path: path.to_path_buf(),
            message,
        };

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options
            .read_info(Cursor::new(data))
            .map_err(|e| gif_error(e.to_string()))?;

        let global_palette = decoder.global_palette().map(<[u8]>::to_vec).unwrap_or_default();
        let repeat = decoder.repeat();

        let mut out = Vec::with_capacity(data.len());
        {
            let mut encoder =
                gif::Encoder::new(&mut out, decoder.width(), decoder.height(), &global_palette)
                    .map_err(|e| gif_error(e.to_string()))?;
            if repeat != gif::Repeat::Finite(0) {
                encoder.set_repeat(repeat).map_err(|e| gif_error(e.to_string()))?;
            }

            while let Some(frame) = decoder
                .read_next_frame()
                .map_err(|e| gif_error(e.to_string()))?
            {
                // Frames come back deinterlaced
                let mut frame = frame.clone();
                frame.interlaced = false;
                encoder.write_frame(&frame).map_err(|e| gif_error(e.to_string()))?;
            }
        }

        Ok(out)
    }

    fn optimize_svg(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>> {
        let source = std::str::from_utf8(data).map_err(|e| PipelineError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(clean_svg(source).into_bytes())
    }
}

/// Strip comments, metadata and inter-tag whitespace from SVG markup.
///
/// Whitespace inside `text`, `style`, `script`, `title` and `desc` is kept.
pub fn clean_svg(source: &str) -> String {
    let without_comments = SVG_COMMENT.replace_all(source, "");
    let markup = SVG_METADATA.replace_all(&without_comments, "");

    SVG_SEGMENT
        .replace_all(&markup, |caps: &Captures| {
            let Some(found) = caps.get(0) else {
                return String::new();
            };
            if caps.name("keep").is_some() {
                return found.as_str().to_string();
            }

            // A gap sits between two tags; anything else is text or attributes
            let before = &markup[..found.start()];
            let after = &markup[found.end()..];
            if before.ends_with('>') && (after.is_empty() || after.starts_with('<')) {
                String::new()
            } else {
                found.as_str().to_string()
            }
        })
        .trim()
        .to_string()
}
