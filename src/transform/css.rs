//! CSS post-processing with lightningcss
//!
//! Takes compiled CSS and applies, as requested: media-query merging,
//! minification, vendor prefixing and an inline source map.
//!
//! Prefixes come from lightningcss's declaration handlers, which run as one
//! pass over the whole sheet. That pass always normalizes as well: adjacent
//! rules with the same selector are merged and values are shortened. Only
//! the printer decides whether the output is minified.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lightningcss::rules::media::MediaRule;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::ToCss;
use parcel_sourcemap::SourceMap;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Options for a single post-processing pass
#[derive(Debug, Clone, Default)]
pub struct CssOptions {
    /// File name recorded in errors
    pub filename: String,

    /// Name of the source the inline map points at. The map covers the
    /// compiled CSS, not the SCSS it came from.
    pub map_source: String,

    /// Browserslist queries driving prefixing (and, when minifying, the
    /// compatibility floor)
    pub browsers: Vec<String>,

    /// Merge identical `@media` blocks and move them to the end
    pub merge_media_queries: bool,

    /// Emit minified output
    pub minify: bool,

    /// Append an inline source map
    pub source_map: bool,
}

/// Output of a post-processing pass
#[derive(Debug, Clone)]
pub struct ProcessedCss {
    pub code: String,

    /// Number of `@media` blocks folded into an earlier identical one
    pub merged_media_queries: usize,
}

/// Resolve browserslist queries into lightningcss targets
pub fn resolve_targets(queries: &[String]) -> Result<Targets> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }

    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| PipelineError::Config(format!("invalid browser query: {}", e)))?;

    Ok(browsers.map(Targets::from).unwrap_or_default())
}

/// Run the post-processing pass over compiled CSS
pub fn process(css: &str, options: &CssOptions) -> Result<ProcessedCss> {
    let css_error = |message: String| PipelineError::Css {
        file: options.filename.clone(),
        message,
    };

    let targets = resolve_targets(&options.browsers)?;

    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: options.filename.clone(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| css_error(e.to_string()))?;

    let merged_media_queries = if options.merge_media_queries {
        let merged = merge_media_queries(&mut stylesheet.rules).map_err(css_error)?;
        info!("Merged {} duplicate media queries", merged);
        merged
    } else {
        0
    };

    // Normalizes and prefixes; compact printing is a separate switch
    stylesheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| css_error(e.to_string()))?;

    let mut source_map = if options.source_map {
        let mut map = SourceMap::new("/");
        let index = map.add_source(&options.map_source);
        map.set_source_content(index as usize, css)
            .map_err(|e| css_error(e.to_string()))?;
        Some(map)
    } else {
        None
    };

    let result = stylesheet
        .to_css(PrinterOptions {
            minify: options.minify,
            source_map: source_map.as_mut(),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| css_error(e.to_string()))?;

    let mut code = result.code;

    if let Some(map) = source_map.as_mut() {
        let json = map.to_json(None).map_err(|e| css_error(e.to_string()))?;
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&inline_source_map(&json));
        code.push('\n');
    }

    debug!("Processed {} ({} bytes)", options.filename, code.len());

    Ok(ProcessedCss {
        code,
        merged_media_queries,
    })
}

/// Render a source map as a trailing data-URI comment
pub fn inline_source_map(json: &str) -> String {
    format!(
        "/*# sourceMappingURL=data:application/json;charset=utf-8;base64,{} */",
        STANDARD.encode(json)
    )
}

/// Fold `@media` blocks with identical queries together and move them,
/// in first-appearance order, after every other top-level rule.
fn merge_media_queries(rules: &mut CssRuleList<'_>) -> std::result::Result<usize, String> {
    let mut kept = Vec::with_capacity(rules.0.len());
    let mut media: Vec<(String, MediaRule<'_>)> = Vec::new();
    let mut merged = 0;

    for rule in rules.0.drain(..) {
        match rule {
            CssRule::Media(rule) => {
                let key = rule
                    .query
                    .to_css_string(PrinterOptions::default())
                    .map_err(|e| e.to_string())?;

                if let Some((_, existing)) = media.iter_mut().find(|(k, _)| *k == key) {
                    existing.rules.0.extend(rule.rules.0);
                    merged += 1;
                } else {
                    media.push((key, rule));
                }
            }
            other => kept.push(other),
        }
    }

    kept.extend(media.into_iter().map(|(_, rule)| CssRule::Media(rule)));
    rules.0 = kept;

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CssOptions {
        CssOptions {
            filename: "vendor.scss".to_string(),
            browsers: vec!["safari 12".to_string()],
            ..CssOptions::default()
        }
    }

    #[test]
    fn test_prefixes_inline() {
        let css = ".card { user-select: none; }";
        let result = process(css, &options()).unwrap();

        assert!(result.code.contains("-webkit-user-select: none"));
        assert!(result.code.contains("user-select: none"));
        assert_eq!(result.code.matches(".card").count(), 1);
    }

    #[test]
    fn test_merge_media_queries() {
        let css = r#"
@media (min-width: 600px) { .a { color: red; } }
.b { color: blue; }
@media (min-width: 600px) { .c { color: green; } }
.d { color: black; }
"#;
        let opts = CssOptions {
            merge_media_queries: true,
            minify: true,
            ..options()
        };
        let result = process(css, &opts).unwrap();

        assert_eq!(result.merged_media_queries, 1);
        assert_eq!(result.code.matches("@media").count(), 1);
        let media_at = result.code.find("@media").unwrap();
        let last_plain = result.code.find(".d").unwrap();
        assert!(media_at > last_plain);
    }

    #[test]
    fn test_minify_strips_whitespace() {
        let css = "body {\n  color: #ff0000;\n  margin: 0px;\n}\n";
        let opts = CssOptions {
            minify: true,
            ..options()
        };
        let result = process(css, &opts).unwrap();

        assert!(!result.code.contains('\n'));
        assert!(result.code.starts_with("body{"));
    }

    #[test]
    fn test_inline_source_map() {
        let css = "body { color: red; }";
        let opts = CssOptions {
            source_map: true,
            ..options()
        };
        let result = process(css, &opts).unwrap();

        assert!(result
            .code
            .contains("sourceMappingURL=data:application/json;charset=utf-8;base64,"));
    }

    #[test]
    fn test_source_map_labels_compiled_css() {
        let css = "body { color: red; }";
        let opts = CssOptions {
            map_source: "css/main.css".to_string(),
            source_map: true,
            ..options()
        };
        let result = process(css, &opts).unwrap();

        let encoded = result
            .code
            .split("base64,")
            .nth(1)
            .and_then(|rest| rest.split(" */").next())
            .unwrap();
        let json = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        let map: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(map["sources"][0], "css/main.css");
        assert!(!json.contains("vendor.scss"));
        assert_eq!(map["sourcesContent"][0], css);
    }

    #[test]
    fn test_unminified_output_keeps_layout_but_normalizes() {
        let css = ".a { color: #ff0000; }\n.a { margin: 0px 0px 0px 0px; }\n.b { display: flex; }";
        let result = process(css, &options()).unwrap();

        // Printed readable, one declaration per line
        assert!(result.code.starts_with(".a {\n  color: red;\n  margin: 0;\n}\n"));
        assert!(result.code.contains("\n.b {\n  display: flex;\n}"));
        assert_eq!(result.code.matches(".a").count(), 1);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = process("..broken { color: red; }", &options()).unwrap_err();

        match err {
            PipelineError::Css { file, .. } => assert_eq!(file, "vendor.scss"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_output_is_deterministic() {
        let css = ".x { display: flex; } @media print { .x { display: none; } }";
        let opts = CssOptions {
            merge_media_queries: true,
            minify: true,
            ..options()
        };

        let first = process(css, &opts).unwrap();
        let second = process(css, &opts).unwrap();
        assert_eq!(first.code, second.code);
    }
}
