//! The registry: language aliases, lazy module loading, and failure policy.
//!
//! A [`Registry`] is the context every build runs in. It owns:
//!
//! - the alias table mapping requested names to canonical language names;
//! - a [`Loader`] of languages, which resolves unknown names through a
//!   [`ModuleProvider`] and deduplicates concurrent requests;
//! - a second [`Loader`] for themes;
//! - the [`Options`] that decide between strict and lenient failure handling.
//!
//! # Module resolution
//!
//! Loading a language is a two-phase affair. The provider maps the requested
//! name to a [`Module`]; running the module's registration function registers
//! one or more languages (and their aliases) into the registry. The requested
//! name is then resolved through the alias table again and read back from the
//! cache. A module that registers nothing under the requested name yields
//! [`Error::LanguageNotFound`].
//!
//! Registries are cheap to clone and share all state between clones.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use canopy_theme::{Theme, builtin};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{BoxError, Error};
use crate::language::Language;
use crate::loader::Loader;
use crate::match_tree::Match;
use crate::render::{self, RenderNode};
use crate::rule::Embed;

/// Registry-wide behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Name of the default theme.
    pub theme: String,
    /// Surface failures as errors instead of degrading.
    pub strict: bool,
    /// Record matches dropped during tree building as [`Diagnostic`]s.
    pub diagnostics: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            theme: "base".to_string(),
            strict: false,
            diagnostics: false,
        }
    }
}

/// A match that lost an overlap conflict and was left out of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub language: String,
    pub kind: Option<String>,
    pub offset: usize,
    pub value: String,
}

/// A language module: a function that registers languages into a registry.
#[derive(Clone)]
pub struct Module {
    register: Arc<dyn Fn(&Registry) + Send + Sync>,
}

impl Module {
    pub fn new<F>(register: F) -> Self
    where
        F: Fn(&Registry) + Send + Sync + 'static,
    {
        Self {
            register: Arc::new(register),
        }
    }

    pub fn register(&self, registry: &Registry) {
        (self.register)(registry)
    }
}

impl From<fn(&Registry)> for Module {
    fn from(register: fn(&Registry)) -> Self {
        Module::new(register)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Module(..)")
    }
}

/// Maps requested language names to modules.
///
/// Returning `Ok(None)` means the name is unknown; `Err` means resolution
/// itself failed. Providers backed by compiled-in grammars return a ready
/// future, which lets the synchronous highlighter complete in a single poll.
pub trait ModuleProvider: Send + Sync {
    fn resolve(&self, name: &str) -> BoxFuture<'static, Result<Option<Module>, BoxError>>;
}

/// A provider backed by a fixed name → module table.
#[derive(Debug, Clone, Default)]
pub struct TableProvider {
    modules: HashMap<String, Module>,
}

impl TableProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, module: impl Into<Module>) -> Self {
        self.modules.insert(name.into(), module.into());
        self
    }
}

impl ModuleProvider for TableProvider {
    fn resolve(&self, name: &str) -> BoxFuture<'static, Result<Option<Module>, BoxError>> {
        let module = self.modules.get(name).cloned();
        futures::future::ready(Ok(module)).boxed()
    }
}

struct RegistryInner {
    aliases: RwLock<HashMap<String, String>>,
    languages: Loader<Arc<Language>, Error>,
    themes: Loader<Arc<Theme>, Error>,
    options: Options,
    provider: Arc<dyn ModuleProvider>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

/// Alias table, language and theme loaders, and options.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("options", &self.inner.options)
            .field("languages", &self.inner.languages.keys())
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn new(provider: impl ModuleProvider + 'static, options: Options) -> Self {
        Self::with_provider(Arc::new(provider), options)
    }

    pub fn with_provider(provider: Arc<dyn ModuleProvider>, options: Options) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<RegistryInner>| {
            let weak = weak.clone();
            let languages = Loader::new(move |loader, name: String| {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(inner) => Registry { inner }.resolve_module(loader, name).await,
                        None => Err(Error::not_found(name)),
                    }
                }
            });
            let themes = Loader::new(|_, name: String| async move {
                builtin::by_name(&name)
                    .map(Arc::new)
                    .ok_or(Error::ThemeNotFound { name })
            });

            RegistryInner {
                aliases: RwLock::new(HashMap::new()),
                languages,
                themes,
                options,
                provider,
                diagnostics: Mutex::new(Vec::new()),
            }
        });
        Self { inner }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn is_strict(&self) -> bool {
        self.inner.options.strict
    }

    fn resolve_alias(&self, name: &str) -> String {
        let aliases = self
            .inner
            .aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// The canonical name for a request: the alias registered under the
    /// exact name, else under its lower-cased form, else the lower-cased name.
    fn canonical_name(&self, name: &str) -> String {
        let aliases = self
            .inner
            .aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(canonical) = aliases.get(name) {
            return canonical.clone();
        }
        let lowered = name.to_lowercase();
        aliases.get(&lowered).cloned().unwrap_or(lowered)
    }

    async fn resolve_module(
        &self,
        loader: Loader<Arc<Language>, Error>,
        name: String,
    ) -> Result<Arc<Language>, Error> {
        let module = self
            .inner
            .provider
            .resolve(&name)
            .await
            .map_err(|source| Error::LanguageLoad {
                language: name.clone(),
                source: Arc::from(source),
            })?;
        let Some(module) = module else {
            return Err(Error::not_found(name));
        };

        tracing::debug!(language = %name, "registering language module");
        module.register(self);

        let resolved = self.resolve_alias(&name);
        loader.get(&resolved).ok_or_else(|| Error::not_found(name))
    }

    /// Look up a language by name or alias, loading its module if needed.
    pub async fn get_language(&self, name: &str) -> Result<Arc<Language>, Error> {
        let resolved = self.canonical_name(name);
        if let Some(language) = self.inner.languages.get(&resolved) {
            return Ok(language);
        }

        match self.inner.languages.load(&resolved).await {
            Ok(language) => Ok(language),
            Err(err @ (Error::LanguageLoad { .. } | Error::LanguageNotFound { .. })) => Err(err),
            Err(err) if self.is_strict() => Err(Error::LanguageNotFound {
                language: resolved,
                source: Some(Arc::new(err)),
            }),
            Err(err) => Err(err),
        }
    }

    /// Point `canonical` and each of `aliases` at `canonical`.
    pub fn alias<I, S>(&self, canonical: &str, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = self
            .inner
            .aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        table.insert(canonical.to_string(), canonical.to_string());
        for alias in aliases {
            table.insert(alias.into(), canonical.to_string());
        }
    }

    /// Store a language under its name, making the name resolvable.
    pub fn register(&self, language: Language) -> Arc<Language> {
        let name = language.name().to_string();
        let language = self.inner.languages.set(name.clone(), Arc::new(language));
        let mut table = self
            .inner
            .aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        table.entry(name.clone()).or_insert(name);
        language
    }

    /// True when the language is registered (no loading is attempted).
    pub fn has_language(&self, name: &str) -> bool {
        let resolved = self.canonical_name(name);
        self.inner.languages.has(&resolved)
    }

    /// Every alias pointing at `canonical`, including the name itself.
    pub fn language_aliases(&self, canonical: &str) -> Vec<String> {
        let table = self
            .inner
            .aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut aliases: Vec<String> = table
            .iter()
            .filter(|(_, target)| target.as_str() == canonical)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        aliases
    }

    /// Canonical names of all known languages.
    pub fn language_names(&self) -> Vec<String> {
        let table = self
            .inner
            .aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = table
            .iter()
            .filter(|(alias, target)| alias == target)
            .map(|(alias, _)| alias.clone())
            .collect();
        names.sort();
        names
    }

    /// Build the tree for a span delegated to another language.
    ///
    /// The embedded tree's root takes on the embedding expression's
    /// metadata. When the language cannot be obtained, strict mode fails with
    /// [`Error::LanguageNotFound`]; lenient mode logs and returns a plain
    /// leaf covering the span.
    pub fn build_embedded(&self, embed: Embed) -> BoxFuture<'_, Result<Match, Error>> {
        async move {
            let name = embed.language().to_string();
            let language = match self.get_language(&name).await {
                Ok(language) => language,
                Err(err) if self.is_strict() => {
                    return Err(match err {
                        not_found @ Error::LanguageNotFound { .. } => not_found,
                        other => Error::LanguageNotFound {
                            language: name,
                            source: Some(Arc::new(other)),
                        },
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        language = %name,
                        error = %err,
                        "embedded language unavailable, keeping span unhighlighted"
                    );
                    return Ok(Match::new(embed.offset, embed.text, embed.expression));
                }
            };

            let mut root = language
                .build_tree(self, &embed.text, embed.offset, Vec::new())
                .await?;
            Arc::make_mut(&mut root.expression).overlay(&embed.expression);
            Ok(root)
        }
        .boxed()
    }

    /// Highlight `text` as `language` into a `<code>` render tree.
    ///
    /// In lenient mode an unavailable language produces the unhighlighted
    /// container instead of an error.
    pub async fn process(&self, language: &str, text: &str) -> Result<RenderNode, Error> {
        match self.get_language(language).await {
            Ok(found) => found.process(self, text).await,
            Err(err) if self.is_strict() => Err(err),
            Err(err) => {
                tracing::warn!(language, error = %err, "language unavailable, rendering plain text");
                Ok(render::plain(text))
            }
        }
    }

    /// Look up a theme, loading a builtin one by name if needed.
    pub async fn theme(&self, name: &str) -> Result<Arc<Theme>, Error> {
        self.inner.themes.load(name).await
    }

    /// The theme named by [`Options::theme`].
    pub async fn default_theme(&self) -> Result<Arc<Theme>, Error> {
        self.theme(&self.inner.options.theme).await
    }

    pub fn register_theme(&self, name: impl Into<String>, theme: Theme) -> Arc<Theme> {
        self.inner.themes.set(name, Arc::new(theme))
    }

    pub(crate) fn report_dropped(&self, language: &str, dropped: &Match) {
        tracing::trace!(
            language,
            offset = dropped.offset(),
            length = dropped.len(),
            kind = dropped.kind(),
            "overlapping match dropped"
        );
        if self.inner.options.diagnostics {
            let mut diagnostics = self
                .inner
                .diagnostics
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            diagnostics.push(Diagnostic {
                language: language.to_string(),
                kind: dropped.kind().map(str::to_string),
                offset: dropped.offset(),
                value: dropped.value().to_string(),
            });
        }
    }

    /// Drain the diagnostics collected so far.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = self
            .inner
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Capture, Rule};
    use crate::match_tree::Expression;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn keywords(registry: &Registry) {
        let mut language = Language::new("keywords");
        language.push(Rule::literals(["if", "else"]).typed("keyword"));
        registry.register(language);
        registry.alias("keywords", ["kw"]);
    }

    fn host(registry: &Registry) {
        let mut language = Language::new("host");
        language.push(
            Rule::new(r"\{([^}]*)\}")
                .captures([Some(Capture::new(Expression::default().language("keywords")))]),
        );
        registry.register(language);
    }

    fn broken_host(registry: &Registry) {
        let mut language = Language::new("broken");
        language.push(Rule::new(r"<([^>]*)>").language("missing"));
        registry.register(language);
    }

    fn silent(_: &Registry) {}

    struct FailingProvider;

    impl ModuleProvider for FailingProvider {
        fn resolve(&self, _: &str) -> BoxFuture<'static, Result<Option<Module>, BoxError>> {
            futures::future::ready(Err("network unreachable".into())).boxed()
        }
    }

    fn provider() -> TableProvider {
        TableProvider::new()
            .with("keywords", keywords as fn(&Registry))
            .with("kw", keywords as fn(&Registry))
            .with("host", host as fn(&Registry))
            .with("broken", broken_host as fn(&Registry))
            .with("silent", silent as fn(&Registry))
    }

    fn registry(strict: bool) -> Registry {
        Registry::new(
            provider(),
            Options {
                strict,
                ..Options::default()
            },
        )
    }

    #[test]
    fn test_alias_resolution_loads_module_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let registry = Registry::new(
            TableProvider::new().with(
                "kw",
                Module::new(move |registry| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    keywords(registry);
                }),
            ),
            Options::default(),
        );

        let language = block_on(registry.get_language("KW")).unwrap();
        assert_eq!(language.name(), "keywords");
        assert!(registry.has_language("kw"));
        assert!(registry.has_language("keywords"));
        let again = block_on(registry.get_language("keywords")).unwrap();
        assert!(Arc::ptr_eq(&language, &again));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert_eq!(registry.language_aliases("keywords"), ["keywords", "kw"]);
        assert_eq!(registry.language_names(), ["keywords"]);
    }

    #[test]
    fn test_mixed_case_alias_resolves() {
        let registry = registry(true);
        block_on(registry.get_language("keywords")).unwrap();
        registry.alias("keywords", ["KeyWords-Legacy"]);

        let language = block_on(registry.get_language("KeyWords-Legacy")).unwrap();
        assert_eq!(language.name(), "keywords");
        assert!(registry.has_language("KeyWords-Legacy"));
        // Lower-cased requests still fall back to the lower-cased table.
        assert!(registry.has_language("KEYWORDS"));
        assert!(!registry.has_language("keywords-legacy"));
    }

    #[test]
    fn test_concurrent_requests_share_module_load() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let registry = Registry::new(
            TableProvider::new().with(
                "keywords",
                Module::new(move |registry| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    keywords(registry);
                }),
            ),
            Options::default(),
        );
        let (a, b) = block_on(async {
            futures::join!(
                registry.get_language("keywords"),
                registry.get_language("keywords")
            )
        });
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_and_unregistered_languages() {
        let registry = registry(false);
        let err = block_on(registry.get_language("cobol")).unwrap_err();
        assert!(err.is_not_found());

        // The module runs but registers nothing under the name.
        let err = block_on(registry.get_language("silent")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_provider_failure_is_load_error() {
        let registry = Registry::new(FailingProvider, Options::default());
        let err = block_on(registry.get_language("ruby")).unwrap_err();
        assert!(matches!(err, Error::LanguageLoad { ref language, .. } if language == "ruby"));
        assert!(!registry.has_language("ruby"));
    }

    #[test]
    fn test_embedded_language_root_is_complete() {
        let registry = registry(true);
        let language = block_on(registry.get_language("host")).unwrap();
        let tree = block_on(language.build_tree(&registry, "x {if y}", 0, Vec::new())).unwrap();

        assert_eq!(tree.children().len(), 1);
        let embedded = &tree.children()[0];
        assert_eq!(embedded.offset(), 3);
        assert_eq!(embedded.kind(), Some("keywords"));
        assert!(embedded.is_complete());
        assert_eq!(embedded.children()[0].offset(), 3);
        assert_eq!(embedded.children()[0].value(), "if");
    }

    #[test]
    fn test_missing_embedded_language_strict_and_lenient() {
        let strict = registry(true);
        let language = block_on(strict.get_language("broken")).unwrap();
        let err = block_on(language.build_tree(&strict, "a <b> c", 0, Vec::new())).unwrap_err();
        assert!(matches!(err, Error::LanguageNotFound { ref language, .. } if language == "missing"));

        let lenient = registry(false);
        let language = block_on(lenient.get_language("broken")).unwrap();
        let tree = block_on(language.build_tree(&lenient, "a <b> c", 0, Vec::new())).unwrap();
        assert_eq!(tree.children().len(), 1);
        assert_eq!(tree.children()[0].value(), "<b>");
        assert!(tree.children()[0].children().is_empty());
    }

    #[test]
    fn test_process_lenient_falls_back_to_plain() {
        let lenient = registry(false);
        let node = block_on(lenient.process("cobol", "MOVE A TO B")).unwrap();
        assert_eq!(node, render::plain("MOVE A TO B"));

        let strict = registry(true);
        assert!(block_on(strict.process("cobol", "MOVE A TO B")).is_err());
    }

    #[test]
    fn test_themes_load_builtin_and_registered() {
        let registry = registry(false);
        let base = block_on(registry.default_theme()).unwrap();
        assert_eq!(base.name, "base");

        let err = block_on(registry.theme("neon")).unwrap_err();
        assert!(matches!(err, Error::ThemeNotFound { .. }));

        registry.register_theme("neon", builtin::dark());
        assert!(block_on(registry.theme("neon")).is_ok());
    }

    #[test]
    fn test_diagnostics_record_dropped_matches() {
        fn overlapping(registry: &Registry) {
            let mut language = Language::new("overlap");
            language.push(Rule::new("abc").typed("first"));
            language.push(Rule::new("bcd").typed("second"));
            registry.register(language);
        }
        let registry = Registry::new(
            TableProvider::new().with("overlap", overlapping as fn(&Registry)),
            Options {
                diagnostics: true,
                ..Options::default()
            },
        );
        let language = block_on(registry.get_language("overlap")).unwrap();
        let tree = block_on(language.build_tree(&registry, "abcd", 0, Vec::new())).unwrap();
        assert_eq!(tree.children().len(), 1);

        let diagnostics = registry.take_diagnostics();
        assert_eq!(
            diagnostics,
            vec![Diagnostic {
                language: "overlap".into(),
                kind: Some("second".into()),
                offset: 1,
                value: "bcd".into(),
            }]
        );
        assert!(registry.take_diagnostics().is_empty());
    }
}
