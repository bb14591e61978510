//! Error types surfaced by language resolution and tokenization.

use std::sync::Arc;

/// Boxed error returned by custom rule functions and module providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared error source.
///
/// Sources are reference counted so that an error produced inside a shared
/// loader future can be handed to every waiter.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Errors that can cross the engine boundary.
///
/// In lenient mode only the top-level lookup in [`crate::Registry::get_language`]
/// ever returns one of these; everything below it degrades and logs instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No module could register the requested (or aliased) language.
    #[error("language not found: {language}")]
    LanguageNotFound {
        language: String,
        #[source]
        source: Option<Arc<Error>>,
    },

    /// The module provider failed while resolving a language module.
    #[error("failed to load language '{language}'")]
    LanguageLoad {
        language: String,
        #[source]
        source: SharedError,
    },

    /// A rule's custom logic (or a nested build it triggered) failed.
    #[error("rule apply failed (type={kind}, pattern={pattern})")]
    RuleApply {
        kind: String,
        pattern: String,
        #[source]
        source: SharedError,
    },

    /// The theme loader has no theme by this name.
    #[error("theme not found: {name}")]
    ThemeNotFound { name: String },
}

impl Error {
    pub(crate) fn not_found(language: impl Into<String>) -> Self {
        Error::LanguageNotFound {
            language: language.into(),
            source: None,
        }
    }

    /// Returns true for [`Error::LanguageNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::LanguageNotFound { .. })
    }
}
