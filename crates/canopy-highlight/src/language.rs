//! Languages: named, ordered rule lists that build match trees.
//!
//! A [`Language`] is assembled once by its module (rules pushed in order,
//! parents declared with [`Language::derives`], per-type hooks attached with
//! [`Language::on`]) and is immutable once registered.
//!
//! Building a tree applies every rule in declaration order, resolves embedded
//! and derived languages through the [`Registry`], sorts the raw matches by
//! [`Match::order`] and inserts them into a root match covering the whole
//! text. Because the sort is stable, the first rule wins when two rules
//! produce a match with the same start and length.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{BoxError, Error};
use crate::match_tree::{Expression, Match, Process};
use crate::registry::Registry;
use crate::render::{self, RenderNode};
use crate::rule::{Apply, CompiledRule, Hit, Rule, Term};

pub struct Language {
    name: String,
    rules: Vec<CompiledRule>,
    parents: Vec<String>,
    processes: HashMap<String, Process>,
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name)
            .field("rules", &self.rules.len())
            .field("parents", &self.parents)
            .field("processes", &self.processes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Why a rule produced no matches.
enum Failure {
    /// The rule's own logic failed.
    Rule(BoxError),
    /// A language the rule depends on failed.
    Language(Error),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Rule(err) => write!(f, "{err}"),
            Failure::Language(err) => write!(f, "{err}"),
        }
    }
}

impl Language {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            parents: Vec::new(),
            processes: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Append a rule. A rule whose pattern does not compile is logged and
    /// skipped.
    pub fn push(&mut self, rule: Rule) -> &mut Self {
        let source = rule.source();
        match rule.compile() {
            Ok(compiled) => self.rules.push(compiled),
            Err(err) => tracing::error!(
                language = %self.name,
                pattern = source.as_deref().unwrap_or_default(),
                error = %err,
                "malformed rule skipped"
            ),
        }
        self
    }

    /// Append `template` matching any of `words`.
    pub fn push_literals<I, S>(&mut self, words: I, template: Rule) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(template.with_terms(words.into_iter().map(|word| Term::Literal(word.into()))))
    }

    /// Inherit every match of `parent`.
    ///
    /// The parent is resolved through the registry when a tree is built, so
    /// it need not be registered yet.
    pub fn derives(&mut self, parent: impl Into<String>) -> &mut Self {
        let parent = parent.into();
        self.parents.push(parent.clone());
        self.push(Rule::derived(parent))
    }

    /// Attach a post-render hook for tokens of type `kind` owned by this
    /// language.
    pub fn on<F>(&mut self, kind: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(RenderNode, &Match) -> RenderNode + Send + Sync + 'static,
    {
        self.processes.insert(kind.into(), Arc::new(hook));
        self
    }

    /// Attach an existing hook, such as [`Rule::web_link_process`].
    pub fn on_process(&mut self, kind: impl Into<String>, hook: Process) -> &mut Self {
        self.processes.insert(kind.into(), hook);
        self
    }

    pub fn process_for(&self, kind: &str) -> Option<&Process> {
        self.processes.get(kind)
    }

    fn expression_for(self: &Arc<Self>, rule: &CompiledRule) -> Arc<Expression> {
        Arc::new(rule.expression.clone().owner(self.clone()))
    }

    /// The expression of the first rule producing tokens of type `kind`.
    pub fn rule_for_type(self: &Arc<Self>, kind: &str) -> Option<Arc<Expression>> {
        self.rules
            .iter()
            .find(|rule| rule.expression.kind.as_deref() == Some(kind))
            .map(|rule| self.expression_for(rule))
    }

    /// This language's name followed by the names of all its ancestors.
    ///
    /// In lenient mode an unavailable parent is logged and left out.
    pub fn all_names<'a>(&'a self, registry: &'a Registry) -> BoxFuture<'a, Result<Vec<String>, Error>> {
        async move {
            let mut names = vec![self.name.clone()];
            for parent in &self.parents {
                match registry.get_language(parent).await {
                    Ok(language) => names.extend(language.all_names(registry).await?),
                    Err(err) if registry.is_strict() => return Err(err),
                    Err(err) => {
                        tracing::warn!(language = %self.name, parent = %parent, error = %err, "parent language unavailable");
                    }
                }
            }
            Ok(names)
        }
        .boxed()
    }

    /// Raw matches of every rule, in rule order, offsets relative to `text`.
    pub fn get_matches<'a>(
        self: &'a Arc<Self>,
        registry: &'a Registry,
        text: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Match>, Error>> {
        async move {
            let mut matches = Vec::new();
            for rule in &self.rules {
                matches.extend(self.matches_for_rule(registry, rule, text).await?);
            }
            Ok(matches)
        }
        .boxed()
    }

    async fn matches_for_rule(
        self: &Arc<Self>,
        registry: &Registry,
        rule: &CompiledRule,
        text: &str,
    ) -> Result<Vec<Match>, Error> {
        let matches = match self.apply_rule(registry, rule, text).await {
            Ok(matches) => matches,
            Err(failure) if registry.is_strict() => {
                return Err(match failure {
                    Failure::Language(not_found @ Error::LanguageNotFound { .. }) => not_found,
                    Failure::Language(err) => Error::RuleApply {
                        kind: rule.kind().to_string(),
                        pattern: rule.source.clone(),
                        source: Arc::new(err),
                    },
                    Failure::Rule(err) => Error::RuleApply {
                        kind: rule.kind().to_string(),
                        pattern: rule.source.clone(),
                        source: Arc::from(err),
                    },
                });
            }
            Err(failure) => {
                tracing::warn!(
                    language = %self.name,
                    kind = rule.kind(),
                    pattern = %rule.source,
                    error = %failure,
                    "rule apply failed, skipping"
                );
                Vec::new()
            }
        };

        if rule.debug {
            tracing::debug!(
                language = %self.name,
                kind = rule.kind(),
                pattern = %rule.source,
                count = matches.len(),
                ?text,
                "rule matches"
            );
        }
        Ok(matches)
    }

    async fn apply_rule(
        self: &Arc<Self>,
        registry: &Registry,
        rule: &CompiledRule,
        text: &str,
    ) -> Result<Vec<Match>, Failure> {
        let hits = match &rule.apply {
            Apply::Derived(parent) => {
                let parent = registry
                    .get_language(parent)
                    .await
                    .map_err(Failure::Language)?;
                return parent
                    .get_matches(registry, text)
                    .await
                    .map_err(Failure::Language);
            }
            Apply::Pattern => rule
                .scan(text, &self.expression_for(rule))
                .map_err(Failure::Rule)?,
            Apply::Custom(apply) => apply(text).map_err(Failure::Rule)?,
        };

        let mut matches = Vec::with_capacity(hits.len());
        for hit in hits {
            match hit {
                Hit::Token(token) => matches.push(token),
                Hit::Embed(embed) => matches.push(
                    registry
                        .build_embedded(embed)
                        .await
                        .map_err(Failure::Language)?,
                ),
            }
        }
        Ok(matches)
    }

    /// Build the finished tree for `text`, placed at absolute `offset`.
    ///
    /// `extra` matches are inserted whole after the rule matches. Matches
    /// that lose an overlap conflict are dropped and reported to the
    /// registry.
    pub async fn build_tree(
        self: &Arc<Self>,
        registry: &Registry,
        text: &str,
        offset: usize,
        extra: Vec<Match>,
    ) -> Result<Match, Error> {
        let text = text.replace('\r', "");

        let mut matches = self.get_matches(registry, &text).await?;
        if offset > 0 {
            for m in &mut matches {
                m.shift(offset);
            }
        }

        let names = self.all_names(registry).await?;
        let expression = Expression::typed(names.join(" "))
            .allow_all()
            .owner(self.clone());
        let mut root = Match::new(offset, text, Arc::new(expression));

        matches.sort_by(Match::order);
        for m in matches {
            if let Err(dropped) = root.insert_at_end(m) {
                registry.report_dropped(&self.name, &dropped);
            }
        }
        for m in extra {
            if let Err(dropped) = root.insert(m, true) {
                registry.report_dropped(&self.name, &dropped);
            }
        }

        root.complete = true;
        Ok(root)
    }

    /// Build and render `text` line by line, running post-render hooks.
    pub async fn process(self: &Arc<Self>, registry: &Registry, text: &str) -> Result<RenderNode, Error> {
        let root = self.build_tree(registry, text, 0, Vec::new()).await?;
        Ok(render::render_lines(root, &mut run_hooks))
    }
}

/// Run a token's rule-level hook, then its owner's hook for the token type.
pub fn run_hooks(mut node: RenderNode, m: &Match) -> RenderNode {
    let expression = m.expression();
    if let Some(process) = &expression.process {
        node = process(node, m);
    }
    if let (Some(owner), Some(kind)) = (&expression.owner, &expression.kind) {
        if let Some(process) = owner.processes.get(kind) {
            node = process(node, m);
        }
    }
    node
}
