//! HTML: XML tags plus embedded scripts, styles and ERB instructions.

use canopy_highlight::{Candidate, Capture, Expression, Language, Registry, Rule};

pub fn register(registry: &Registry) {
    let mut language = Language::new("html");

    // The type attribute decides how a script body is highlighted; HTML5
    // treats a missing or unknown type as JavaScript.
    language.push(
        Rule::new(r"(?is)<script(\s+[^>]*?)?>(.*?)</script>").conditional(
            1,
            2,
            vec![
                Candidate::when(
                    r#"(?i)type\s*=\s*["'](?:importmap|application/(?:ld\+)?json)["']"#,
                    Expression::default().language("json"),
                ),
                Candidate::when(
                    r#"(?i)type\s*=\s*["'](?:text|application)/javascript["']"#,
                    Expression::default().language("javascript"),
                ),
                Candidate::otherwise(Expression::default().language("javascript")),
            ],
        ),
    );

    language.push(
        Rule::new(r"(?is)<style[^>]*>(.*?)</style>")
            .captures([Some(Capture::new(Expression::default().language("css")))]),
    );

    language.push(
        Rule::new(r"<%=?(.*?)(%>)")
            .typed("instruction")
            .allow(["string"]),
    );

    language.push(
        Rule::new(r"(?i)<!(DOCTYPE.*?)>")
            .captures([Some(Capture::new(Expression::typed("doctype")))]),
    );

    language.derives("xml");

    registry.register(language);
}

#[cfg(test)]
mod tests {
    use crate::{BuiltinProvider, Highlighter};
    use canopy_test_harness::{test_language, tokens_of};
    use indoc::indoc;

    fn has(tokens: &[(String, String)], kind: &str, value: &str) -> bool {
        tokens.iter().any(|(k, v)| k == kind && v == value)
    }

    const PAGE: &str = indoc! {r#"
        <!DOCTYPE html>
        <html>
          <head>
            <style type="text/css">
              body { color: red; }
            </style>
            <script type="importmap">{"imports": {"a": "./a.js"}}</script>
          </head>
          <body class="main">
            <p>Tom &amp; Jerry <%= name %></p>
            <script>
              let x = 1;
            </script>
          </body>
        </html>
    "#};

    #[test]
    fn test_html_grammar() {
        test_language(BuiltinProvider, "html", &[PAGE]);
    }

    #[test]
    fn test_embedded_languages() {
        let registry = test_language(BuiltinProvider, "html", &[]);
        let tokens = tokens_of(&registry, "html", PAGE);

        assert!(has(&tokens, "doctype", "DOCTYPE html"), "{tokens:?}");
        assert!(has(&tokens, "tag-name", "body"), "{tokens:?}");
        assert!(has(&tokens, "entity", "&amp;"), "{tokens:?}");
        assert!(has(&tokens, "instruction", "<%= name %>"), "{tokens:?}");
        // From the stylesheet, the import map and the script.
        assert!(has(&tokens, "property", "color"), "{tokens:?}");
        assert!(has(&tokens, "key", "\"imports\""), "{tokens:?}");
        assert!(has(&tokens, "keyword", "let"), "{tokens:?}");
        // Every embedded language was loaded on demand.
        for name in ["css", "json", "javascript", "xml", "xml-tag"] {
            assert!(registry.has_language(name), "{name} not loaded");
        }
    }

    #[test]
    fn test_script_type_selects_language() {
        let registry = test_language(BuiltinProvider, "html", &[]);

        let json = tokens_of(
            &registry,
            "html",
            r#"<script type="application/json">{"let": 1}</script>"#,
        );
        assert!(has(&json, "key", "\"let\""), "{json:?}");
        assert!(!has(&json, "keyword", "let"), "{json:?}");

        let js = tokens_of(
            &registry,
            "html",
            r#"<script type="text/javascript">let a;</script>"#,
        );
        assert!(has(&js, "keyword", "let"), "{js:?}");
    }

    #[test]
    fn test_root_class_lists_ancestry() {
        let html = Highlighter::new().highlight("html", "<p>").unwrap();
        assert!(html.contains(r#"<span class="html xml">"#), "{html}");
    }
}
