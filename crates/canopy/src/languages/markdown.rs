//! Markdown.
//!
//! Fenced code blocks with an info string are highlighted as that language.
//! A fence naming a language the registry cannot provide degrades to plain
//! text, or fails the build in strict mode.

use std::sync::Arc;

use canopy_highlight::{BoxError, Capture, Embed, Expression, Hit, Language, Match, Registry, Rule};
use regex::Captures;

/// Split a fenced block into its fences and its body.
fn fenced_block(captures: &Captures<'_>, _: &Arc<Expression>) -> Result<Vec<Hit>, BoxError> {
    let code = || Arc::new(Expression::typed("code"));
    let mut hits = Vec::new();

    if let Some(open) = captures.get(1) {
        hits.push(Hit::Token(Match::new(open.start(), open.as_str(), code())));
    }
    if let Some(body) = captures.get(3).filter(|body| !body.is_empty()) {
        let info = captures.get(2).map_or("", |info| info.as_str());
        if info.is_empty() {
            hits.push(Hit::Token(Match::new(body.start(), body.as_str(), code())));
        } else {
            let expression = Expression::typed("code").language(info);
            hits.push(Hit::Embed(Embed::new(
                body.start(),
                body.as_str(),
                Arc::new(expression),
            )));
        }
    }
    if let Some(close) = captures.get(4) {
        hits.push(Hit::Token(Match::new(close.start(), close.as_str(), code())));
    }

    Ok(hits)
}

pub fn register(registry: &Registry) {
    let mut language = Language::new("markdown");

    language.push(Rule::new(r"(?m)^#{1,6}[ \t]+.+$").typed("heading"));

    language
        .push(Rule::new(r"\*\*(.+?)\*\*").typed("strong"))
        .push(Rule::new(r"__(.+?)__").typed("strong"))
        .push(Rule::new(r"\*([^*\n]+)\*").typed("emphasis").incremental())
        .push(Rule::new(r"_([^_\n]+)_").typed("emphasis").incremental());

    language.push(
        Rule::new(r"(?m)^(```[ \t]*([\w+\-]*)[^\n]*\n)((?s:.*?))(^```)[ \t]*$")
            .typed("code")
            .extract_with(fenced_block),
    );
    language.push(Rule::new(r"`[^`\n\r]+`").typed("code"));

    language.push(Rule::new(r"\[([^\]]+)\]\(([^)]+)\)").captures([
        Some(Capture::new(Expression::typed("string"))),
        Some(Capture::new(
            Expression::typed("link").process(|node, m| node.into_link(m.value())),
        )),
    ]));
    language.push(Rule::new(r"!\[[^\]]*\]\([^)]+\)").typed("link"));

    language.push(Rule::new(r"(?m)^>[ \t]+.+$").typed("quote"));

    language
        .push(Rule::new(r"(?m)^[ \t]*[-*+][ \t]+").typed("list-marker"))
        .push(Rule::new(r"(?m)^[ \t]*\d+\.[ \t]+").typed("list-marker"));

    language.push(Rule::new(r"(?m)^[-*_]{3,}$").typed("operator"));

    language.push(
        Rule::web_link()
            .typed("link")
            .process(|node, m| node.into_link(m.value())),
    );

    registry.register(language);
    registry.alias("markdown", ["md"]);
}

#[cfg(test)]
mod tests {
    use crate::{BuiltinProvider, Config, Error, Highlighter};
    use canopy_test_harness::{test_language, tokens_of};
    use indoc::indoc;

    fn has(tokens: &[(String, String)], kind: &str, value: &str) -> bool {
        tokens.iter().any(|(k, v)| k == kind && v == value)
    }

    const README: &str = indoc! {r#"
        # Canopy

        Some **bold**, __also bold__, *italic* and `inline code`.
        See [the docs](https://example.com/docs) or https://example.com.

        > quoted text

        - item one
        1. first

        ---

        ```js
        let x = "*not emphasis*";
        ```

        ```
        plain # block
        ```
    "#};

    #[test]
    fn test_markdown_grammar() {
        test_language(BuiltinProvider, "md", &[README]);
    }

    #[test]
    fn test_inline_markup() {
        let registry = test_language(BuiltinProvider, "markdown", &[]);
        let tokens = tokens_of(&registry, "markdown", README);

        assert!(has(&tokens, "heading", "# Canopy"), "{tokens:?}");
        assert!(has(&tokens, "strong", "**bold**"), "{tokens:?}");
        assert!(has(&tokens, "strong", "__also bold__"), "{tokens:?}");
        assert!(has(&tokens, "emphasis", "*italic*"), "{tokens:?}");
        assert!(has(&tokens, "code", "`inline code`"), "{tokens:?}");
        assert!(has(&tokens, "string", "the docs"), "{tokens:?}");
        assert!(has(&tokens, "link", "https://example.com/docs"), "{tokens:?}");
        assert!(has(&tokens, "quote", "> quoted text"), "{tokens:?}");
        assert!(has(&tokens, "list-marker", "- "), "{tokens:?}");
        assert!(has(&tokens, "list-marker", "1. "), "{tokens:?}");
        assert!(has(&tokens, "operator", "---"), "{tokens:?}");
    }

    #[test]
    fn test_fenced_blocks_embed_their_language() {
        let registry = test_language(BuiltinProvider, "markdown", &[]);
        let tokens = tokens_of(&registry, "markdown", README);

        assert!(has(&tokens, "code", "```js\n"), "{tokens:?}");
        assert!(has(&tokens, "keyword", "let"), "{tokens:?}");
        assert!(has(&tokens, "string", "\"*not emphasis*\""), "{tokens:?}");
        assert!(!has(&tokens, "emphasis", "*not emphasis*"), "{tokens:?}");
        assert!(has(&tokens, "code", "plain # block\n"), "{tokens:?}");
        assert!(registry.has_language("javascript"));
    }

    #[test]
    fn test_links_render_as_anchors() {
        let html = Highlighter::new()
            .highlight("md", "[docs](http://x.org/a)")
            .unwrap();
        assert!(
            html.contains(r#"<a class="link" href="http://x.org/a">http://x.org/a</a>"#),
            "{html}"
        );
    }

    #[test]
    fn test_unknown_fence_language() {
        let source = "```cobol\nMOVE A TO B\n```";

        let lenient = Highlighter::new().highlight("markdown", source).unwrap();
        assert!(lenient.contains("MOVE A TO B"), "{lenient}");

        let strict = Highlighter::with_config(Config {
            strict: true,
            ..Config::default()
        });
        assert!(matches!(
            strict.highlight("markdown", source),
            Err(Error::LanguageNotFound { .. })
        ));
    }
}
