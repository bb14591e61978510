//! Rules: declarative token patterns and how their hits become matches.
//!
//! A [`Rule`] pairs a pattern with an [`Expression`] template. Applying a rule
//! to a text scans it for every (non-overlapping, unless `incremental`) hit
//! and turns each hit into one or more [`Hit`]s:
//!
//! - by default the whole hit becomes a token of the rule's type;
//! - with an [`Extractor`], selected capture groups become tokens instead;
//! - when the expression names a `language`, the text is delegated to that
//!   language as an [`Embed`], resolved later by the registry.
//!
//! Rules are validated and compiled when they are pushed onto a
//! [`Language`](crate::Language). A rule whose pattern does not compile is
//! reported and skipped there.

use std::fmt;
use std::sync::Arc;

use regex::{Captures, Regex, RegexBuilder};

use crate::error::BoxError;
use crate::match_tree::{Expression, Match, Process};
use crate::render::RenderNode;

/// Custom extraction from a single regex hit.
pub type ExtractFn =
    Arc<dyn Fn(&Captures<'_>, &Arc<Expression>) -> Result<Vec<Hit>, BoxError> + Send + Sync>;

/// Custom rule application over a whole text.
pub type ApplyFn = Arc<dyn Fn(&str) -> Result<Vec<Hit>, BoxError> + Send + Sync>;

/// Raw result of applying a rule.
#[derive(Debug)]
pub enum Hit {
    /// A finished token.
    Token(Match),
    /// A span to be highlighted by another language.
    Embed(Embed),
}

/// A span of text delegated to an embedded language.
#[derive(Debug, Clone)]
pub struct Embed {
    pub offset: usize,
    pub text: String,
    /// Metadata overlaid on the embedded tree's root. Its `language` names the
    /// language to build with.
    pub expression: Arc<Expression>,
}

impl Embed {
    pub fn new(offset: usize, text: impl Into<String>, expression: Arc<Expression>) -> Self {
        Self {
            offset,
            text: text.into(),
            expression,
        }
    }

    pub fn language(&self) -> &str {
        self.expression.language.as_deref().unwrap_or_default()
    }
}

/// Turn a span into a token or an embed according to `expression`.
fn hit(offset: usize, value: &str, expression: Arc<Expression>) -> Hit {
    if expression.language.is_some() {
        Hit::Embed(Embed::new(offset, value, expression))
    } else {
        Hit::Token(Match::new(offset, value, expression))
    }
}

/// One capture group of an [`Extractor::Captures`] list.
#[derive(Debug, Clone)]
pub struct Capture {
    /// Group index. Defaults to the entry's position in the list plus one.
    pub index: Option<usize>,
    pub expression: Expression,
}

impl Capture {
    pub fn new(expression: Expression) -> Self {
        Self {
            index: None,
            expression,
        }
    }

    pub fn at(index: usize, expression: Expression) -> Self {
        Self {
            index: Some(index),
            expression,
        }
    }
}

/// One branch of an [`Extractor::Conditional`].
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Pattern tested against the condition group. `None` always matches.
    pub condition: Option<String>,
    pub expression: Expression,
}

impl Candidate {
    pub fn when(condition: impl Into<String>, expression: Expression) -> Self {
        Self {
            condition: Some(condition.into()),
            expression,
        }
    }

    pub fn otherwise(expression: Expression) -> Self {
        Self {
            condition: None,
            expression,
        }
    }
}

/// How a regex hit is turned into [`Hit`]s.
#[derive(Clone)]
pub enum Extractor {
    /// Entry `i` describes capture group `i + 1` (or its explicit index);
    /// `None` entries and empty groups are skipped.
    Captures(Vec<Option<Capture>>),
    /// Pick the first candidate whose condition matches group `condition`,
    /// and apply it to group `content`.
    Conditional {
        condition: usize,
        content: usize,
        candidates: Vec<Candidate>,
    },
    Custom(ExtractFn),
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extractor::Captures(captures) => f.debug_tuple("Captures").field(captures).finish(),
            Extractor::Conditional {
                condition,
                content,
                candidates,
            } => f
                .debug_struct("Conditional")
                .field("condition", condition)
                .field("content", content)
                .field("candidates", candidates)
                .finish(),
            Extractor::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// What a rule does when its language applies it.
#[derive(Clone)]
pub enum Apply {
    /// Scan the text with the rule's pattern.
    Pattern,
    /// Contribute all matches of the named parent language.
    Derived(String),
    /// Run a custom function over the whole text.
    Custom(ApplyFn),
}

impl fmt::Debug for Apply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Apply::Pattern => f.write_str("Pattern"),
            Apply::Derived(name) => f.debug_tuple("Derived").field(name).finish(),
            Apply::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One alternative of a literal list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Escaped and anchored at word boundaries.
    Literal(String),
    /// Used as-is.
    Regex(String),
}

impl Term {
    fn source(&self) -> String {
        match self {
            Term::Literal(literal) => literal_pattern(literal),
            Term::Regex(source) => source.clone(),
        }
    }
}

impl From<&str> for Term {
    fn from(literal: &str) -> Self {
        Term::Literal(literal.to_string())
    }
}

impl From<String> for Term {
    fn from(literal: String) -> Self {
        Term::Literal(literal)
    }
}

#[derive(Debug, Clone)]
enum Pattern {
    Regex(String),
    Alternatives(Vec<Term>),
}

/// A token rule declaration.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Option<Pattern>,
    expression: Expression,
    extractor: Option<Extractor>,
    apply: Apply,
    incremental: bool,
    debug: bool,
    case_insensitive: bool,
}

impl Rule {
    fn with_pattern(pattern: Option<Pattern>, apply: Apply) -> Self {
        Self {
            pattern,
            expression: Expression::default(),
            extractor: None,
            apply,
            incremental: false,
            debug: false,
            case_insensitive: false,
        }
    }

    /// A rule matching the regular expression `pattern`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self::with_pattern(Some(Pattern::Regex(pattern.into())), Apply::Pattern)
    }

    /// A rule matching any of the given literal words.
    ///
    /// Each literal is escaped and anchored with word boundaries where its
    /// first or last character is a word character.
    pub fn literals<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::alternatives(words.into_iter().map(|word| Term::Literal(word.into())))
    }

    /// A rule matching any of `terms`, mixing literals and regex fragments.
    pub fn alternatives<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        let terms = terms.into_iter().map(Into::into).collect();
        Self::with_pattern(Some(Pattern::Alternatives(terms)), Apply::Pattern)
    }

    /// Replace this rule's pattern with an alternation of `terms`, keeping
    /// everything else.
    pub fn with_terms<I, T>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        self.pattern = Some(Pattern::Alternatives(
            terms.into_iter().map(Into::into).collect(),
        ));
        if matches!(self.apply, Apply::Custom(_)) {
            self.apply = Apply::Pattern;
        }
        self
    }

    /// A rule computed by `apply` instead of a pattern scan.
    pub fn custom<F>(apply: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<Hit>, BoxError> + Send + Sync + 'static,
    {
        Self::with_pattern(None, Apply::Custom(Arc::new(apply)))
    }

    pub(crate) fn derived(parent: impl Into<String>) -> Self {
        Self::with_pattern(None, Apply::Derived(parent.into()))
    }

    pub fn typed(mut self, kind: impl Into<String>) -> Self {
        self.expression.kind = Some(kind.into());
        self
    }

    pub fn allow<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expression = self.expression.allow(types);
        self
    }

    pub fn allow_all(mut self) -> Self {
        self.expression = self.expression.allow_all();
        self
    }

    pub fn disallow<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expression = self.expression.disallow(types);
        self
    }

    pub fn only<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expression = self.expression.only(types);
        self
    }

    pub fn force(mut self) -> Self {
        self.expression.force = true;
        self
    }

    /// Delegate every hit to the named language.
    pub fn language(mut self, name: impl Into<String>) -> Self {
        self.expression.language = Some(name.into());
        self
    }

    pub fn process<F>(mut self, hook: F) -> Self
    where
        F: Fn(RenderNode, &Match) -> RenderNode + Send + Sync + 'static,
    {
        self.expression.process = Some(Arc::new(hook));
        self
    }

    /// Extract capture groups instead of emitting the whole hit.
    pub fn captures<I>(mut self, captures: I) -> Self
    where
        I: IntoIterator<Item = Option<Capture>>,
    {
        self.extractor = Some(Extractor::Captures(captures.into_iter().collect()));
        self
    }

    pub fn conditional(mut self, condition: usize, content: usize, candidates: Vec<Candidate>) -> Self {
        self.extractor = Some(Extractor::Conditional {
            condition,
            content,
            candidates,
        });
        self
    }

    pub fn extract_with<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Captures<'_>, &Arc<Expression>) -> Result<Vec<Hit>, BoxError> + Send + Sync + 'static,
    {
        self.extractor = Some(Extractor::Custom(Arc::new(extract)));
        self
    }

    /// Resume scanning one character after the start of each hit rather
    /// than at its end.
    pub fn incremental(mut self) -> Self {
        self.incremental = true;
        self
    }

    /// Log every application of this rule at debug level.
    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.expression.kind.as_deref()
    }

    /// Regex source this rule compiles to, if it has a pattern.
    pub fn source(&self) -> Option<String> {
        self.pattern.as_ref().map(|pattern| match pattern {
            Pattern::Regex(source) => source.clone(),
            Pattern::Alternatives(terms) => {
                let alternatives: Vec<String> = terms.iter().map(Term::source).collect();
                format!("({})", alternatives.join("|"))
            }
        })
    }

    pub(crate) fn compile(self) -> Result<CompiledRule, regex::Error> {
        let source = self.source();
        let regex = match &source {
            Some(source) => Some(
                RegexBuilder::new(source)
                    .case_insensitive(self.case_insensitive)
                    .build()?,
            ),
            None => None,
        };

        let extractor = match self.extractor {
            None => None,
            Some(Extractor::Captures(captures)) => Some(Extract::Captures(captures)),
            Some(Extractor::Custom(extract)) => Some(Extract::Custom(extract)),
            Some(Extractor::Conditional {
                condition,
                content,
                candidates,
            }) => {
                let mut compiled = Vec::with_capacity(candidates.len());
                for candidate in candidates {
                    let condition = match &candidate.condition {
                        Some(pattern) => Some(Regex::new(pattern)?),
                        None => None,
                    };
                    compiled.push((condition, candidate.expression));
                }
                Some(Extract::Conditional {
                    condition,
                    content,
                    candidates: compiled,
                })
            }
        };

        Ok(CompiledRule {
            source: source.unwrap_or_default(),
            regex,
            expression: self.expression,
            extractor,
            apply: self.apply,
            incremental: self.incremental,
            debug: self.debug,
        })
    }
}

/// Escape `literal` and anchor it at word boundaries.
pub fn literal_pattern(literal: &str) -> String {
    let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let starts = literal.chars().next().is_some_and(word);
    let ends = literal.chars().next_back().is_some_and(word);
    let (prefix, suffix) = match (starts, ends) {
        (true, true) => ("\\b", "\\b"),
        (true, false) => ("\\b", "\\B"),
        (false, true) => ("\\B", "\\b"),
        (false, false) => ("", ""),
    };
    format!("{prefix}{}{suffix}", regex::escape(literal))
}

enum Extract {
    Captures(Vec<Option<Capture>>),
    Conditional {
        condition: usize,
        content: usize,
        candidates: Vec<(Option<Regex>, Expression)>,
    },
    Custom(ExtractFn),
}

/// A rule as stored by a language: pattern compiled, owner not yet attached.
pub(crate) struct CompiledRule {
    pub(crate) source: String,
    regex: Option<Regex>,
    pub(crate) expression: Expression,
    extractor: Option<Extract>,
    pub(crate) apply: Apply,
    incremental: bool,
    pub(crate) debug: bool,
}

fn next_char(text: &str, at: usize) -> usize {
    at + text[at..].chars().next().map_or(1, char::len_utf8)
}

impl CompiledRule {
    pub(crate) fn kind(&self) -> &str {
        self.expression.kind.as_deref().unwrap_or_default()
    }

    /// Scan `text` with this rule's pattern. `expression` is the rule's
    /// expression with its owner attached.
    pub(crate) fn scan(&self, text: &str, expression: &Arc<Expression>) -> Result<Vec<Hit>, BoxError> {
        let Some(regex) = &self.regex else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        let mut at = 0;
        while at <= text.len() {
            let Some(captures) = regex.captures_at(text, at) else {
                break;
            };
            let Some(whole) = captures.get(0) else {
                break;
            };
            if whole.is_empty() {
                at = next_char(text, whole.start());
                continue;
            }

            hits.extend(self.extract(&captures, whole, expression)?);

            at = if self.incremental {
                next_char(text, whole.start())
            } else {
                whole.end()
            };
        }
        Ok(hits)
    }

    fn extract(
        &self,
        captures: &Captures<'_>,
        whole: regex::Match<'_>,
        expression: &Arc<Expression>,
    ) -> Result<Vec<Hit>, BoxError> {
        match &self.extractor {
            None => Ok(vec![hit(whole.start(), whole.as_str(), expression.clone())]),
            Some(Extract::Captures(list)) => {
                let mut hits = Vec::new();
                for (position, capture) in list.iter().enumerate() {
                    let Some(capture) = capture else { continue };
                    let index = capture.index.unwrap_or(position + 1);
                    let Some(group) = captures.get(index).filter(|g| !g.is_empty()) else {
                        continue;
                    };
                    let mut nested = capture.expression.clone();
                    // Embedded captures are owned by the language they embed.
                    if nested.language.is_none() && nested.owner.is_none() {
                        nested.owner.clone_from(&expression.owner);
                    }
                    hits.push(hit(group.start(), group.as_str(), Arc::new(nested)));
                }
                Ok(hits)
            }
            Some(Extract::Conditional {
                condition,
                content,
                candidates,
            }) => {
                let condition = captures.get(*condition).map_or("", |m| m.as_str());
                let Some(content) = captures.get(*content).filter(|m| !m.is_empty()) else {
                    return Ok(Vec::new());
                };
                let chosen = candidates.iter().find(|(pattern, _)| {
                    pattern
                        .as_ref()
                        .is_none_or(|pattern| pattern.is_match(condition))
                });
                let Some((_, chosen)) = chosen else {
                    return Ok(Vec::new());
                };
                let mut nested = chosen.clone();
                if nested.owner.is_none() {
                    nested.owner.clone_from(&expression.owner);
                }
                Ok(vec![hit(content.start(), content.as_str(), Arc::new(nested))])
            }
            Some(Extract::Custom(extract)) => extract(captures, expression),
        }
    }
}

/// Percent-encode everything except unreserved URI characters.
fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Predefined rules shared by many grammars.
impl Rule {
    pub fn c_style_comment() -> Self {
        Rule::new(r"(?s)/\*.*?\*/").typed("comment").allow(["href"])
    }

    pub fn cpp_style_comment() -> Self {
        Rule::new(r"(?m)//.*$").typed("comment").allow(["href"])
    }

    pub fn perl_style_comment() -> Self {
        Rule::new(r"(?m)#.*$").typed("comment").allow(["href"])
    }

    /// `/.../flags` on one line, followed by something that cannot continue an
    /// expression. A leading `*` or `/` is left to the comment rules.
    pub fn perl_style_regular_expression() -> Self {
        Rule::new(r#"(?m)(\B/(?:[^\\/*\n]|\\.)(?:[^\\/\n]|\\.)*/[a-z]*)\s*(?:$|[^\w\s'"(])"#)
            .typed("constant")
            .captures([Some(Capture::new(Expression::typed("constant")))])
            .incremental()
    }

    pub fn ruby_style_regular_expression() -> Self {
        Rule::new(r#"(?m)(\B/(?:[^\\/*\n]|\\.)(?:[^\\/\n]|\\.)*/[a-z]*)\s*(?:$|[^\w\s'"(]|do)"#)
            .typed("constant")
            .captures([Some(Capture::new(Expression::typed("constant")))])
            .incremental()
    }

    pub fn c_style_function() -> Self {
        Rule::new(r"(?i)([a-z_][a-z0-9_]*)\s*\(")
            .typed("function")
            .captures([Some(Capture::new(Expression::typed("function")))])
    }

    pub fn camel_case_type() -> Self {
        Rule::new(r"\b_*[A-Z]\w*\b").typed("type")
    }

    pub fn c_style_type() -> Self {
        Rule::new(r"(?i)\b[_a-z][_\w]*_t\b").typed("type")
    }

    pub fn xml_comment() -> Self {
        Rule::new(r"(?s)(?:&lt;|<)!--.*?--(?:&gt;|>)").typed("comment")
    }

    pub fn web_link() -> Self {
        Rule::new(r"\w+://[\w\-./?%&=@:;#]*").typed("href")
    }

    pub fn hex_number() -> Self {
        Rule::new(r"\b0x[0-9a-fA-F]+").typed("constant")
    }

    pub fn decimal_number() -> Self {
        Rule::new(r"\b[-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?").typed("constant")
    }

    pub fn double_quoted_string() -> Self {
        Rule::new(r#""(?:[^\\"\n]|\\.)*""#).typed("string")
    }

    pub fn single_quoted_string() -> Self {
        Rule::new(r"'(?:[^\\'\n]|\\.)*'").typed("string")
    }

    pub fn multi_line_double_quoted_string() -> Self {
        Rule::new(r#""(?:[^\\"]|\\.)*""#).typed("string")
    }

    pub fn multi_line_single_quoted_string() -> Self {
        Rule::new(r"'(?:[^\\']|\\.)*'").typed("string")
    }

    pub fn string_escape() -> Self {
        Rule::new(r"\\.").typed("escape").only(["string"])
    }

    /// A hook turning a token into a link to `base_url` followed by the
    /// percent-encoded token text.
    pub fn web_link_process(base_url: impl Into<String>) -> Process {
        let base_url = base_url.into();
        Arc::new(move |node: RenderNode, m: &Match| {
            node.into_link(format!("{base_url}{}", encode_component(m.value())))
        })
    }
}
