//! Builtin module provider for the canopy crate.
//!
//! This module provides `BuiltinProvider`, a `ModuleProvider` that hands out
//! the registration functions of the grammars compiled in via `lang-*`
//! features.

use canopy_highlight::{BoxError, Module, ModuleProvider};
use futures::FutureExt;
use futures::future::BoxFuture;

/// A provider for the builtin grammars of enabled language features.
///
/// Modules are ready immediately, so highlighting with this provider never
/// suspends and works with the synchronous [`Highlighter`](crate::Highlighter).
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProvider;

impl BuiltinProvider {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a language name or file-style alias to the name of the
    /// module that defines it.
    pub fn normalize_language(language: &str) -> &str {
        match language {
            "js" | "jsx" | "mjs" | "cjs" | "actionscript" | "as" => "javascript",
            "jsonc" | "importmap" => "json",
            "htm" | "xhtml" => "html",
            "xsl" | "xslt" | "svg" | "xml-tag" => "xml",
            "md" | "mdown" => "markdown",
            "patch" => "diff",
            "text" | "txt" => "plain",
            other => other,
        }
    }

    /// Canonical names of every compiled-in language.
    pub fn languages() -> Vec<&'static str> {
        MODULES.iter().map(|(name, _)| *name).collect()
    }

    /// Look up the module defining `language`.
    ///
    /// When `language` is a file-style name the grammar does not alias
    /// itself (`jsx`, `svg`, ...), the module also aliases it to the
    /// canonical name so the registry can find the language afterwards.
    pub fn module(language: &str) -> Option<Module> {
        let name = Self::normalize_language(language);
        let (canonical, register) = MODULES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .copied()?;
        if canonical == language {
            return Some(Module::from(register));
        }

        let requested = language.to_string();
        Some(Module::new(move |registry| {
            register(registry);
            if !registry.has_language(&requested) {
                tracing::debug!(alias = %requested, language = canonical, "aliasing builtin language");
                registry.alias(canonical, [requested.as_str()]);
            }
        }))
    }
}

type Register = fn(&canopy_highlight::Registry);

const MODULES: &[(&str, Register)] = &[
    #[cfg(feature = "lang-css")]
    ("css", crate::languages::css::register),
    #[cfg(feature = "lang-diff")]
    ("diff", crate::languages::diff::register),
    #[cfg(feature = "lang-html")]
    ("html", crate::languages::html::register),
    #[cfg(feature = "lang-javascript")]
    ("javascript", crate::languages::javascript::register),
    #[cfg(feature = "lang-json")]
    ("json", crate::languages::json::register),
    #[cfg(feature = "lang-markdown")]
    ("markdown", crate::languages::markdown::register),
    #[cfg(feature = "lang-plain")]
    ("plain", crate::languages::plain::register),
    #[cfg(feature = "lang-xml")]
    ("xml", crate::languages::xml::register),
];

impl ModuleProvider for BuiltinProvider {
    fn resolve(&self, name: &str) -> BoxFuture<'static, Result<Option<Module>, BoxError>> {
        let module = Self::module(name);
        if module.is_none() {
            tracing::debug!(language = name, "no builtin grammar");
        }
        futures::future::ready(Ok(module)).boxed()
    }
}
