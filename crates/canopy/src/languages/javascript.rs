//! JavaScript (and ActionScript, which shares its surface syntax).

use canopy_highlight::{Language, Registry, Rule};

const KEYWORDS: &[&str] = &[
    "async",
    "await",
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "export",
    "extends",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "let",
    "new",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

const OPERATORS: &[&str] = &[
    "+", "*", "/", "-", "&", "|", "~", "!", "%", "<", "=", ">", "...",
];

const ACCESS: &[&str] = &[
    "implements",
    "package",
    "protected",
    "interface",
    "private",
    "public",
];

pub fn register(registry: &Registry) {
    let mut language = Language::new("javascript");

    language
        .push(Rule::literals(["this", "true", "false", "null"]).typed("constant"))
        .push(Rule::literals(KEYWORDS.iter().copied()).typed("keyword"))
        .push(Rule::literals(OPERATORS.iter().copied()).typed("operator"))
        .push(Rule::literals(ACCESS.iter().copied()).typed("access"));

    language
        .push(Rule::perl_style_regular_expression())
        .push(Rule::camel_case_type());

    language
        .push(Rule::c_style_comment())
        .push(Rule::cpp_style_comment())
        .push(Rule::web_link());

    language
        .push(Rule::single_quoted_string())
        .push(Rule::double_quoted_string())
        .push(Rule::string_escape());

    language
        .push(Rule::decimal_number())
        .push(Rule::hex_number())
        .push(Rule::c_style_function());

    registry.register(language);
    registry.alias("javascript", ["js", "actionscript"]);
}
