//! High-level syntax highlighting API with thread-safe language sharing.
//!
//! This module provides highlighters over the builtin grammars:
//!
//! - [`Highlighter`]: synchronous, HTML or ANSI output
//! - [`AsyncHighlighter`]: the same API for providers that load lazily
//!
//! # Thread Safety
//!
//! Languages are compiled once and shared through the [`Registry`]. Use
//! [`Highlighter::fork`] to create a new highlighter that shares it.
//!
//! # Example
//!
//! ```rust,ignore
//! use canopy::Highlighter;
//!
//! let hl = Highlighter::new();
//!
//! // Each thread gets its own forked highlighter
//! let handles: Vec<_> = code_blocks.into_iter().map(|code| {
//!     let hl = hl.fork();
//!     std::thread::spawn(move || hl.highlight("javascript", &code))
//! }).collect();
//! ```

use std::sync::Arc;

use canopy_highlight::{
    AsyncHighlighter as AwaitingCore, Diagnostic, Error, ModuleProvider, Registry, RenderNode,
    SyncHighlighter,
};
use canopy_theme::Theme;

use crate::{BuiltinProvider, Config};

/// High-level syntax highlighter.
///
/// Produces HTML in the configured [`HtmlFormat`](crate::HtmlFormat), or ANSI
/// escape sequences painted with the configured theme.
///
/// Highlighting polls each build once. With [`BuiltinProvider`] that
/// completes unless another fork is loading the same language, in which case
/// the call blocks until that load finishes. A custom provider that yields
/// also blocks the calling thread; prefer [`AsyncHighlighter`] for those.
#[derive(Debug, Clone)]
pub struct Highlighter {
    core: SyncHighlighter,
    config: Config,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    /// Create a new highlighter over the builtin grammars with default
    /// configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new highlighter with custom configuration.
    pub fn with_config(config: Config) -> Self {
        Self::with_provider(BuiltinProvider, config)
    }

    /// Create a new highlighter that resolves languages through `provider`.
    pub fn with_provider(provider: impl ModuleProvider + 'static, config: Config) -> Self {
        let registry = Registry::new(provider, config.options());
        Self::with_registry(registry, config)
    }

    /// Create a new highlighter over an existing registry.
    ///
    /// The registry's own options decide strictness and diagnostics; only
    /// the output settings of `config` apply.
    pub fn with_registry(registry: Registry, config: Config) -> Self {
        Self {
            core: SyncHighlighter::with_format(registry, config.html_format.clone()),
            config,
        }
    }

    /// Fork this highlighter, creating a new one that shares the registry.
    ///
    /// Languages loaded through either highlighter are visible to both.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn registry(&self) -> &Registry {
        self.core.registry()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Highlight source code and return HTML string.
    ///
    /// Embedded languages (scripts and styles in HTML, fenced blocks in
    /// Markdown) are loaded and highlighted along the way.
    pub fn highlight(&self, language: &str, source: &str) -> Result<String, Error> {
        self.core.highlight(language, source)
    }

    /// Highlight and return the render tree (for custom rendering).
    pub fn highlight_tree(&self, language: &str, source: &str) -> Result<RenderNode, Error> {
        self.core.highlight_tree(language, source)
    }

    /// Highlight with ANSI colors from the configured theme.
    pub fn highlight_to_ansi(&self, language: &str, source: &str) -> Result<String, Error> {
        let theme = self.theme()?;
        self.core.highlight_to_ansi(language, source, &theme)
    }

    /// Highlight with ANSI colors from `theme`.
    pub fn highlight_to_ansi_with(
        &self,
        language: &str,
        source: &str,
        theme: &Theme,
    ) -> Result<String, Error> {
        self.core.highlight_to_ansi(language, source, theme)
    }

    /// The configured theme.
    pub fn theme(&self) -> Result<Arc<Theme>, Error> {
        self.core.theme(&self.config.theme)
    }

    /// Drain the overlap diagnostics collected so far.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.registry().take_diagnostics()
    }
}

/// Asynchronous counterpart of [`Highlighter`].
#[derive(Debug, Clone)]
pub struct AsyncHighlighter {
    core: AwaitingCore,
    config: Config,
}

impl Default for AsyncHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncHighlighter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_provider(BuiltinProvider, config)
    }

    pub fn with_provider(provider: impl ModuleProvider + 'static, config: Config) -> Self {
        let registry = Registry::new(provider, config.options());
        Self {
            core: AwaitingCore::with_format(registry, config.html_format.clone()),
            config,
        }
    }

    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn registry(&self) -> &Registry {
        self.core.registry()
    }

    pub async fn highlight(&self, language: &str, source: &str) -> Result<String, Error> {
        self.core.highlight(language, source).await
    }

    pub async fn highlight_tree(&self, language: &str, source: &str) -> Result<RenderNode, Error> {
        self.core.highlight_tree(language, source).await
    }

    pub async fn highlight_to_ansi(&self, language: &str, source: &str) -> Result<String, Error> {
        let theme = self.registry().theme(&self.config.theme).await?;
        self.core.highlight_to_ansi(language, source, &theme).await
    }
}
