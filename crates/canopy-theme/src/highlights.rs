//! Theme slots and the token-type vocabulary that maps onto them.
//!
//! Grammars tag their matches with free-form token types (`keyword`,
//! `string`, `tag-name`, `href`, ...). Themes only define a small, fixed set
//! of color slots. This module is the bridge between the two:
//!
//! 1. **Token types** - whatever a grammar rule was `typed` with. A rendered
//!    element's class may hold several of them (`"html xml"`).
//!
//! 2. **Theme slots** - the [`ThemeSlot`]s a [`Theme`](crate::Theme) styles.
//!
//! 3. **HTML tags** - short custom element suffixes (`<a-k>`, `<a-s>`).
//!
//! Several token types share a slot. For example `insert` and `add` both
//! paint as [`ThemeSlot::DiffAdd`].

/// The fixed set of color categories a theme defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeSlot {
    Keyword,
    Function,
    String,
    Comment,
    Type,
    Variable,
    Constant,
    Number,
    Operator,
    Punctuation,
    Property,
    Attribute,
    Tag,
    Macro,
    Label,
    Namespace,
    Constructor,
    /// Markup: headings, titles
    Title,
    /// Markup: bold text
    Strong,
    /// Markup: italic text
    Emphasis,
    /// Markup: links/URLs
    Link,
    /// Markup: inline code and code blocks
    Literal,
    /// Markup: strikethrough
    Strikethrough,
    /// Diff additions
    DiffAdd,
    /// Diff deletions
    DiffDelete,
    /// Embedded content
    Embedded,
    Error,
    /// No styling (plain text, indentation, language containers)
    None,
}

impl ThemeSlot {
    /// Every styleable slot, in storage order. [`ThemeSlot::None`] is absent.
    pub const ALL: [ThemeSlot; 27] = [
        ThemeSlot::Keyword,
        ThemeSlot::Function,
        ThemeSlot::String,
        ThemeSlot::Comment,
        ThemeSlot::Type,
        ThemeSlot::Variable,
        ThemeSlot::Constant,
        ThemeSlot::Number,
        ThemeSlot::Operator,
        ThemeSlot::Punctuation,
        ThemeSlot::Property,
        ThemeSlot::Attribute,
        ThemeSlot::Tag,
        ThemeSlot::Macro,
        ThemeSlot::Label,
        ThemeSlot::Namespace,
        ThemeSlot::Constructor,
        ThemeSlot::Title,
        ThemeSlot::Strong,
        ThemeSlot::Emphasis,
        ThemeSlot::Link,
        ThemeSlot::Literal,
        ThemeSlot::Strikethrough,
        ThemeSlot::DiffAdd,
        ThemeSlot::DiffDelete,
        ThemeSlot::Embedded,
        ThemeSlot::Error,
    ];

    /// Number of styleable slots.
    pub const COUNT: usize = Self::ALL.len();

    /// Position in [`ThemeSlot::ALL`], or `None` for [`ThemeSlot::None`].
    pub fn index(self) -> Option<usize> {
        Self::ALL.iter().position(|slot| *slot == self)
    }

    /// Get the HTML tag suffix for this slot.
    /// Returns None for slots that produce no styling.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            ThemeSlot::Keyword => Some("k"),
            ThemeSlot::Function => Some("f"),
            ThemeSlot::String => Some("s"),
            ThemeSlot::Comment => Some("c"),
            ThemeSlot::Type => Some("t"),
            ThemeSlot::Variable => Some("v"),
            ThemeSlot::Constant => Some("co"),
            ThemeSlot::Number => Some("n"),
            ThemeSlot::Operator => Some("o"),
            ThemeSlot::Punctuation => Some("p"),
            ThemeSlot::Property => Some("pr"),
            ThemeSlot::Attribute => Some("at"),
            ThemeSlot::Tag => Some("tg"),
            ThemeSlot::Macro => Some("m"),
            ThemeSlot::Label => Some("l"),
            ThemeSlot::Namespace => Some("ns"),
            ThemeSlot::Constructor => Some("cr"),
            ThemeSlot::Title => Some("tt"),
            ThemeSlot::Strong => Some("st"),
            ThemeSlot::Emphasis => Some("em"),
            ThemeSlot::Link => Some("tu"),
            ThemeSlot::Literal => Some("tl"),
            ThemeSlot::Strikethrough => Some("tx"),
            ThemeSlot::DiffAdd => Some("da"),
            ThemeSlot::DiffDelete => Some("dd"),
            ThemeSlot::Embedded => Some("eb"),
            ThemeSlot::Error => Some("er"),
            ThemeSlot::None => None,
        }
    }

    /// The key naming this slot in theme files, e.g. `"diff.addition"`.
    pub fn name(self) -> &'static str {
        match self {
            ThemeSlot::Keyword => "keyword",
            ThemeSlot::Function => "function",
            ThemeSlot::String => "string",
            ThemeSlot::Comment => "comment",
            ThemeSlot::Type => "type",
            ThemeSlot::Variable => "variable",
            ThemeSlot::Constant => "constant",
            ThemeSlot::Number => "number",
            ThemeSlot::Operator => "operator",
            ThemeSlot::Punctuation => "punctuation",
            ThemeSlot::Property => "property",
            ThemeSlot::Attribute => "attribute",
            ThemeSlot::Tag => "tag",
            ThemeSlot::Macro => "macro",
            ThemeSlot::Label => "label",
            ThemeSlot::Namespace => "namespace",
            ThemeSlot::Constructor => "constructor",
            ThemeSlot::Title => "markup.heading",
            ThemeSlot::Strong => "markup.bold",
            ThemeSlot::Emphasis => "markup.italic",
            ThemeSlot::Link => "markup.link",
            ThemeSlot::Literal => "markup.raw",
            ThemeSlot::Strikethrough => "markup.strikethrough",
            ThemeSlot::DiffAdd => "diff.addition",
            ThemeSlot::DiffDelete => "diff.deletion",
            ThemeSlot::Embedded => "embedded",
            ThemeSlot::Error => "error",
            ThemeSlot::None => "none",
        }
    }
}

/// Map a single token type to its theme slot.
///
/// Unknown types get [`ThemeSlot::None`]. Dotted theme-file names
/// (`diff.addition`, `markup.heading`) are accepted too, so theme keys and
/// grammar types go through the same table.
pub fn slot_for_type(kind: &str) -> ThemeSlot {
    match kind {
        "keyword" | "reserved" | "builtin" | "directive" | "control" => ThemeSlot::Keyword,

        "function" | "method" | "selector" => ThemeSlot::Function,

        "string" | "escape" | "regex" | "regexp" | "character" | "value" => ThemeSlot::String,

        "comment" | "doc" => ThemeSlot::Comment,

        "type" | "class" => ThemeSlot::Type,

        "variable" | "parameter" => ThemeSlot::Variable,

        "constant" | "boolean" | "null" | "entity" | "unit" | "color" => ThemeSlot::Constant,

        "number" | "integer" | "float" => ThemeSlot::Number,

        "operator" | "access" => ThemeSlot::Operator,

        "punctuation" | "delimiter" | "bracket" | "list" => ThemeSlot::Punctuation,

        "property" | "key" => ThemeSlot::Property,

        "attribute" | "attribute-name" | "at-rule" => ThemeSlot::Attribute,

        "tag" | "tag-name" => ThemeSlot::Tag,

        "macro" | "doctype" | "instruction" | "preprocessor" => ThemeSlot::Macro,

        "label" | "offset" | "index" => ThemeSlot::Label,

        "namespace" | "module" => ThemeSlot::Namespace,

        "constructor" => ThemeSlot::Constructor,

        "heading" | "title" | "header" | "markup.heading" => ThemeSlot::Title,

        "strong" | "bold" | "markup.bold" => ThemeSlot::Strong,

        "emphasis" | "italic" | "markup.italic" => ThemeSlot::Emphasis,

        "href" | "link" | "url" | "markup.link" => ThemeSlot::Link,

        "code" | "quote" | "markup.raw" => ThemeSlot::Literal,

        "strikethrough" | "strike" | "markup.strikethrough" => ThemeSlot::Strikethrough,

        "insert" | "add" | "addition" | "diff.addition" => ThemeSlot::DiffAdd,

        "remove" | "del" | "deletion" | "diff.deletion" => ThemeSlot::DiffDelete,

        "embedded" | "cdata" => ThemeSlot::Embedded,

        "error" | "invalid" => ThemeSlot::Error,

        _ => ThemeSlot::None,
    }
}

/// Map a rendered element's class string to a slot.
///
/// The class may list several token types; the first one with a slot wins.
pub fn slot_for_class(class: &str) -> ThemeSlot {
    class
        .split_whitespace()
        .map(slot_for_type)
        .find(|slot| *slot != ThemeSlot::None)
        .unwrap_or(ThemeSlot::None)
}

/// The custom element suffix for a class string, if any.
pub fn tag_for_class(class: &str) -> Option<&'static str> {
    slot_for_class(class).tag()
}
