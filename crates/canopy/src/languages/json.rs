//! JSON.

use canopy_highlight::{Capture, Expression, Language, Registry, Rule};

const STRING: &str = r#""(?:[^"\\]|\\.)*""#;

pub fn register(registry: &Registry) {
    let mut language = Language::new("json");

    language.push(Rule::literals(["true", "false", "null"]).typed("constant"));
    language.push(Rule::new(r"-?(?:0|[1-9]\d*)(?:\.\d+)?(?:[eE][+-]?\d+)?").typed("constant"));

    // Keys before plain strings so that a key wins the identical span.
    language.push(Rule::new(format!(r"({STRING})(\s*)(:)")).captures([
        Some(Capture::new(Expression::typed("key"))),
        None,
        Some(Capture::new(Expression::typed("operator"))),
    ]));
    language.push(Rule::new(STRING).typed("string"));

    language.push(Rule::literals(["{", "}", "[", "]", ","]).typed("operator"));

    registry.register(language);
}
