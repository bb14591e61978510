//! Canopy - batteries-included, lazy-loading syntax highlighting
//!
//! This crate provides:
//! - A set of builtin grammars, each behind a `lang-*` feature flag
//! - [`BuiltinProvider`], which loads those grammars on first use
//! - [`Highlighter`] (sync) and [`AsyncHighlighter`] producing HTML or ANSI
//! - Language detection from file names, shebangs and class lists
//!
//! # Usage
//!
//! Every builtin language is enabled by default. To pick a subset:
//!
//! ```toml
//! [dependencies]
//! canopy = { version = "0.1", default-features = false, features = ["lang-json", "lang-html"] }
//! ```
//!
//! # Example
//!
//! ```rust
//! use canopy::Highlighter;
//!
//! let highlighter = Highlighter::new();
//! let html = highlighter.highlight("js", "let x = 1;").unwrap();
//! assert!(html.contains(r#"<span class="keyword">let</span>"#));
//! ```

mod highlighter;
pub mod languages;
mod provider;

pub use highlighter::{AsyncHighlighter, Highlighter};
pub use provider::BuiltinProvider;

pub use canopy_highlight::{
    self as highlight, Diagnostic, Error, HtmlFormat, Language, Match, Options, Registry,
    RenderNode, Rule,
};
pub use canopy_theme::{self as theme, Theme, builtin};

/// Configuration for [`Highlighter`] and [`AsyncHighlighter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Fail instead of degrading when a language or rule fails.
    pub strict: bool,
    /// Theme used for ANSI output.
    pub theme: String,
    /// HTML output format.
    pub html_format: HtmlFormat,
    /// Record dropped overlapping matches as [`Diagnostic`]s.
    pub diagnostics: bool,
}

impl Default for Config {
    fn default() -> Self {
        let options = Options::default();
        Self {
            strict: options.strict,
            theme: options.theme,
            html_format: HtmlFormat::default(),
            diagnostics: options.diagnostics,
        }
    }
}

impl Config {
    pub fn options(&self) -> Options {
        Options {
            theme: self.theme.clone(),
            strict: self.strict,
            diagnostics: self.diagnostics,
        }
    }
}

/// Detect a language from a file name or path, by extension.
///
/// Returns the canonical name of a builtin language, or `None`.
pub fn detect_language(path: &str) -> Option<&'static str> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let extension = match file_name.rsplit_once('.') {
        Some((_, extension)) => extension.to_ascii_lowercase(),
        None => file_name.to_ascii_lowercase(),
    };

    match extension.as_str() {
        "js" | "mjs" | "cjs" | "jsx" | "as" => Some("javascript"),
        "json" | "jsonc" | "importmap" => Some("json"),
        "css" => Some("css"),
        "html" | "htm" | "xhtml" => Some("html"),
        "xml" | "xsl" | "xslt" | "svg" | "plist" | "rss" | "atom" => Some("xml"),
        "md" | "markdown" | "mdown" => Some("markdown"),
        "diff" | "patch" => Some("diff"),
        "txt" | "text" | "log" => Some("plain"),
        _ => None,
    }
}

/// Detect a language from content, e.g. a shebang line or an XML prolog.
pub fn detect_from_content(content: &str) -> Option<&'static str> {
    let first_line = content.lines().next()?;

    if let Some(shebang) = first_line.strip_prefix("#!") {
        let shebang = shebang.trim();
        if shebang.contains("node") || shebang.contains("deno") || shebang.contains("bun") {
            return Some("javascript");
        }
        return None;
    }

    let trimmed = first_line.trim_start();
    if trimmed.starts_with("<?xml") {
        Some("xml")
    } else if trimmed
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"))
    {
        Some("html")
    } else if trimmed.starts_with("diff --git") || trimmed.starts_with("--- ") {
        Some("diff")
    } else {
        None
    }
}

/// Read a language name from an HTML class list such as
/// `"line-numbers language-ruby"` or `"brush-js"`.
pub fn language_from_class(classes: &str) -> Option<&str> {
    classes.split_whitespace().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("brush-"))
            .filter(|name| !name.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("src/app.js"), Some("javascript"));
        assert_eq!(detect_language("C:\\site\\INDEX.HTM"), Some("html"));
        assert_eq!(detect_language("README.md"), Some("markdown"));
        assert_eq!(detect_language("fix.patch"), Some("diff"));
        assert_eq!(detect_language("Makefile"), None);
        assert_eq!(detect_language("main.rs"), None);
    }

    #[test]
    fn test_detect_from_content() {
        assert_eq!(
            detect_from_content("#!/usr/bin/env node\nconsole.log(1)"),
            Some("javascript")
        );
        assert_eq!(detect_from_content("#!/bin/sh\necho"), None);
        assert_eq!(
            detect_from_content("<?xml version=\"1.0\"?>\n<a/>"),
            Some("xml")
        );
        assert_eq!(detect_from_content("<!DOCTYPE html>"), Some("html"));
        assert_eq!(detect_from_content("diff --git a/x b/x"), Some("diff"));
        assert_eq!(detect_from_content("hello"), None);
        assert_eq!(detect_from_content(""), None);
    }

    #[test]
    fn test_language_from_class() {
        assert_eq!(language_from_class("line-numbers language-ruby"), Some("ruby"));
        assert_eq!(language_from_class("brush-js"), Some("js"));
        assert_eq!(language_from_class("language- plain"), None);
        assert_eq!(language_from_class(""), None);
    }

    #[test]
    fn test_config_maps_to_options() {
        let config = Config {
            strict: true,
            theme: "dark".into(),
            ..Config::default()
        };
        let options = config.options();
        assert!(options.strict);
        assert_eq!(options.theme, "dark");
        assert!(!options.diagnostics);
        assert_eq!(Config::default().html_format, HtmlFormat::ClassNames);
    }
}
