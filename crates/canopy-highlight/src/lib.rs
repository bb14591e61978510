//! Lazy-loading, rule-driven syntax highlighting for canopy.
//!
//! This crate provides the core highlighting engine. Grammars are plain data:
//! a [`Language`] is an ordered list of [`Rule`]s, each a regular expression
//! (or literal list) tagged with a token type and an admission policy. The
//! engine turns source text into a tree of typed, possibly nested [`Match`]es
//! and renders that tree line by line.
//!
//! # Why Async in a Highlighting Library?
//!
//! Languages are loaded on demand. The first time a language is requested,
//! the [`Registry`] asks its [`ModuleProvider`] for the module that defines
//! it, and the module registers one or more languages. A provider backed by
//! compiled-in grammars answers immediately; one that fetches grammar modules
//! from elsewhere has to wait. Embedded languages (a `<script>` element inside
//! HTML, a fenced block inside Markdown) and derived languages are resolved
//! the same way, in the middle of a tree build.
//!
//! - **Tokenizing is synchronous**: applying a rule is a regex scan, and
//!   inserting matches into the tree never suspends.
//!
//! - **Getting a language can be async**: resolving a module, and every nested
//!   language lookup it triggers, goes through the registry's deduplicating
//!   [`Loader`].
//!
//! # Architecture
//!
//! - [`Match`]: a tagged interval with ordered, non-overlapping children.
//!   Overlap is resolved at insertion time by rejection or bisection.
//! - [`Rule`]: how raw regex hits become matches, capture-group extraction,
//!   and delegation to embedded languages.
//! - [`Language`]: named rule lists, parent languages, per-type render hooks.
//! - [`Loader`]: a memoizing async cache that shares in-flight resolutions.
//! - [`Registry`]: aliases, the language and theme loaders, and the
//!   strict/lenient failure policy.
//! - [`RenderNode`]: the render tree, serialized to HTML or ANSI.
//!
//! ## The Sync-in-Async-Clothing Pattern
//!
//! The build is written **once** as async code. Two wrappers provide the sync
//! and async APIs:
//!
//! - [`SyncHighlighter`]: Polls the build **once**, which completes when every
//!   module comes from a provider that answers immediately. If the build is
//!   still pending (a yielding provider, or another thread loading the same
//!   language), it blocks the current thread until the build finishes.
//!
//! - [`AsyncHighlighter`]: Actually awaits module resolution.
//!
//! # Failure policy
//!
//! In lenient mode (the default) a failing rule contributes nothing, a
//! missing embedded language leaves its span unhighlighted, and an unknown
//! top-level language renders as plain text; each degradation is logged with
//! `tracing`. In strict mode these surface as [`Error`]s.
//!
//! # Quick Start
//!
//! ```rust
//! use canopy_highlight::{Language, Module, Options, Registry, Rule, SyncHighlighter, TableProvider};
//!
//! fn register(registry: &Registry) {
//!     let mut language = Language::new("tiny");
//!     language.push(Rule::literals(["if", "else"]).typed("keyword"));
//!     language.push(Rule::double_quoted_string());
//!     registry.register(language);
//!     registry.alias("tiny", ["t"]);
//! }
//!
//! let provider = TableProvider::new().with("tiny", Module::new(register));
//! let highlighter = SyncHighlighter::new(Registry::new(provider, Options::default()));
//! let html = highlighter.highlight("tiny", "if \"x\"").unwrap();
//! assert!(html.contains("<span class=\"keyword\">if</span>"));
//! ```
//!
//! # HTML Output Formats
//!
//! - **`ClassNames`** (default): `<span class="keyword">`, matching the token
//!   types used by grammars.
//! - **`ClassNamesWithPrefix(prefix)`**: namespaced classes like
//!   `<span class="cn-keyword">`.
//! - **`CustomElements`**: compact custom elements like `<a-k>`, `<a-s>`, for
//!   token types that map to a theme slot.
//! - **`CustomElementsWithPrefix(prefix)`**: custom elements with your prefix,
//!   e.g. `<code-k>`.

mod error;
mod language;
mod loader;
mod match_tree;
mod registry;
mod render;
mod rule;

pub use error::{BoxError, Error, SharedError};
pub use language::{Language, run_hooks};
pub use loader::Loader;
pub use match_tree::{Allow, Expression, Match, Process};
pub use registry::{Diagnostic, Module, ModuleProvider, Options, Registry, TableProvider};
pub use render::{CODE_CLASS, Fragment, RenderNode, html_escape, plain, render_lines, to_ansi};
pub use rule::{
    Apply, ApplyFn, Candidate, Capture, Embed, ExtractFn, Extractor, Hit, Rule, Term,
    literal_pattern,
};

use std::future::Future;
use std::task::{Context, Poll, Waker};

use canopy_theme::Theme;

/// HTML output format for syntax highlighting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HtmlFormat {
    /// Traditional class-based spans: `<span class="keyword">`, etc. (default)
    ///
    /// # Example
    /// ```html
    /// <span class="keyword">if</span> <span class="string">"x"</span>
    /// ```
    #[default]
    ClassNames,

    /// Class-based spans with custom prefix: `<span class="prefix-keyword">`, etc.
    ///
    /// Every word of a multi-word class is prefixed.
    ///
    /// # Example
    /// ```html
    /// <!-- With prefix "cn" -->
    /// <span class="cn-keyword">if</span>
    /// ```
    ClassNamesWithPrefix(String),

    /// Custom elements with default prefix: `<a-k>`, `<a-s>`, etc.
    ///
    /// Elements whose class has no theme slot stay `<span class="...">`.
    ///
    /// # Example
    /// ```html
    /// <a-k>if</a-k> <a-s>"x"</a-s>
    /// ```
    CustomElements,

    /// Custom elements with custom prefix: `<prefix-k>`, `<prefix-s>`, etc.
    ///
    /// # Example
    /// ```html
    /// <!-- With prefix "code" -->
    /// <code-k>if</code-k>
    /// ```
    CustomElementsWithPrefix(String),
}

/// Drive `future` to completion on the current thread.
///
/// The first poll uses a no-op waker. A pending build is then handed to
/// `block_on`, whose waker is the one the shared loader futures register.
fn drive<F: Future>(future: F) -> F::Output {
    let mut future = std::pin::pin!(future);
    let mut cx = Context::from_waker(Waker::noop());

    match future.as_mut().poll(&mut cx) {
        Poll::Ready(output) => output,
        Poll::Pending => {
            tracing::trace!("build pending, blocking until it completes");
            futures::executor::block_on(future)
        }
    }
}

/// Synchronous highlighter.
///
/// Every call polls the build once. A build that is still pending, because the
/// module provider has not answered yet or another thread is loading the same
/// language, blocks the calling thread until it completes.
///
/// # Example
///
/// ```rust,ignore
/// use canopy_highlight::{Options, Registry, SyncHighlighter};
///
/// let highlighter = SyncHighlighter::new(Registry::new(provider, Options::default()));
/// let html = highlighter.highlight("javascript", "let x = 1;")?;
/// ```
#[derive(Debug, Clone)]
pub struct SyncHighlighter {
    registry: Registry,
    html_format: HtmlFormat,
}

impl SyncHighlighter {
    pub fn new(registry: Registry) -> Self {
        Self::with_format(registry, HtmlFormat::default())
    }

    pub fn with_format(registry: Registry, html_format: HtmlFormat) -> Self {
        Self {
            registry,
            html_format,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn html_format(&self) -> &HtmlFormat {
        &self.html_format
    }

    /// Highlight into a `<code>` render tree.
    pub fn highlight_tree(&self, language: &str, source: &str) -> Result<RenderNode, Error> {
        drive(self.registry.process(language, source))
    }

    /// Highlight and serialize to HTML.
    pub fn highlight(&self, language: &str, source: &str) -> Result<String, Error> {
        Ok(self
            .highlight_tree(language, source)?
            .to_html(&self.html_format))
    }

    /// Highlight and paint with ANSI escape sequences using `theme`.
    pub fn highlight_to_ansi(
        &self,
        language: &str,
        source: &str,
        theme: &Theme,
    ) -> Result<String, Error> {
        Ok(to_ansi(&self.highlight_tree(language, source)?, theme))
    }

    /// Look up a theme by name through the registry.
    pub fn theme(&self, name: &str) -> Result<std::sync::Arc<Theme>, Error> {
        drive(self.registry.theme(name))
    }
}

/// Asynchronous highlighter for providers that load modules lazily.
#[derive(Debug, Clone)]
pub struct AsyncHighlighter {
    registry: Registry,
    html_format: HtmlFormat,
}

impl AsyncHighlighter {
    pub fn new(registry: Registry) -> Self {
        Self::with_format(registry, HtmlFormat::default())
    }

    pub fn with_format(registry: Registry, html_format: HtmlFormat) -> Self {
        Self {
            registry,
            html_format,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn highlight_tree(&self, language: &str, source: &str) -> Result<RenderNode, Error> {
        self.registry.process(language, source).await
    }

    pub async fn highlight(&self, language: &str, source: &str) -> Result<String, Error> {
        Ok(self
            .highlight_tree(language, source)
            .await?
            .to_html(&self.html_format))
    }

    pub async fn highlight_to_ansi(
        &self,
        language: &str,
        source: &str,
        theme: &Theme,
    ) -> Result<String, Error> {
        Ok(to_ansi(&self.highlight_tree(language, source).await?, theme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use std::pin::Pin;
    use std::task::Context;

    fn tiny(registry: &Registry) {
        let mut language = Language::new("tiny");
        language.push(Rule::literals(["fn"]).typed("keyword"));
        language.push(Rule::double_quoted_string());
        language.push(Rule::string_escape());
        registry.register(language);
    }

    fn outer(registry: &Registry) {
        let mut language = Language::new("outer");
        language.push(Rule::new(r"\[([^\]]*)\]").captures([Some(Capture::new(
            Expression::default().language("tiny"),
        ))]));
        registry.register(language);
    }

    fn provider() -> TableProvider {
        TableProvider::new()
            .with("tiny", Module::new(tiny))
            .with("outer", Module::new(outer))
    }

    /// Yields once before answering.
    struct SlowProvider(TableProvider);

    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    impl ModuleProvider for SlowProvider {
        fn resolve(&self, name: &str) -> BoxFuture<'static, Result<Option<Module>, BoxError>> {
            let ready = self.0.resolve(name);
            async move {
                YieldOnce(false).await;
                ready.await
            }
            .boxed()
        }
    }

    #[test]
    fn test_basic_highlighting() {
        let highlighter = SyncHighlighter::new(Registry::new(provider(), Options::default()));
        let html = highlighter.highlight("tiny", "fn").unwrap();
        assert_eq!(
            html,
            "<code class=\"syntax highlighted\"><span class=\"tiny\"><span class=\"text\">\
             <span class=\"keyword\">fn</span></span></span></code>"
        );
    }

    #[test]
    fn test_custom_elements() {
        let highlighter = SyncHighlighter::with_format(
            Registry::new(provider(), Options::default()),
            HtmlFormat::CustomElements,
        );
        let html = highlighter.highlight("tiny", r#"fn "a\n""#).unwrap();
        assert!(html.contains("<a-k>fn</a-k>"), "{html}");
        assert!(html.contains("<a-s>&quot;a"), "{html}");
    }

    #[test]
    fn test_embedded_language() {
        let highlighter = SyncHighlighter::new(Registry::new(provider(), Options::default()));
        let html = highlighter.highlight("outer", "x [fn] y").unwrap();
        assert!(
            html.contains(r#"[<span class="tiny"><span class="keyword">fn</span></span>]"#),
            "{html}"
        );
    }

    #[test]
    fn test_unknown_language_lenient_and_strict() {
        let lenient = SyncHighlighter::new(Registry::new(provider(), Options::default()));
        let html = lenient.highlight("cobol", "a < b").unwrap();
        assert!(html.contains("a &lt; b"));

        let strict = SyncHighlighter::new(Registry::new(
            provider(),
            Options {
                strict: true,
                ..Options::default()
            },
        ));
        assert!(matches!(
            strict.highlight("cobol", "a < b"),
            Err(Error::LanguageNotFound { .. })
        ));
    }

    #[test]
    fn test_ansi_output() {
        let highlighter = SyncHighlighter::new(Registry::new(provider(), Options::default()));
        let theme = highlighter.theme("base").unwrap();
        let ansi = highlighter.highlight_to_ansi("tiny", "fn x", &theme).unwrap();
        assert!(ansi.contains("\x1b["));
        assert!(ansi.ends_with(" x"));
    }

    #[test]
    fn test_sync_highlighter_blocks_on_yield() {
        let highlighter =
            SyncHighlighter::new(Registry::new(SlowProvider(provider()), Options::default()));
        let html = highlighter.highlight("outer", "[fn]").unwrap();
        assert!(html.contains(r#"<span class="keyword">fn</span>"#), "{html}");
    }

    fn sleepy(registry: &Registry) {
        std::thread::sleep(std::time::Duration::from_millis(300));
        tiny(registry);
        registry.alias("tiny", ["sleepy"]);
    }

    #[test]
    fn test_threads_share_an_in_flight_load() {
        let provider = TableProvider::new().with("sleepy", Module::new(sleepy));
        let highlighter = SyncHighlighter::new(Registry::new(provider, Options::default()));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let highlighter = highlighter.clone();
                std::thread::spawn(move || highlighter.highlight("sleepy", "fn"))
            })
            .collect();
        for handle in handles {
            let html = handle.join().unwrap().unwrap();
            assert!(html.contains(r#"<span class="keyword">fn</span>"#), "{html}");
        }
    }

    #[test]
    fn test_async_highlighter_awaits_provider() {
        let highlighter =
            AsyncHighlighter::new(Registry::new(SlowProvider(provider()), Options::default()));
        let html = futures::executor::block_on(highlighter.highlight("outer", "[fn]")).unwrap();
        assert!(html.contains(r#"<span class="keyword">fn</span>"#), "{html}");
    }
}
