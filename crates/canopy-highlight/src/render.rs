//! Render trees and their HTML / ANSI serializations.
//!
//! [`Match::reduce`] folds a match tree into a [`RenderNode`] tree: every
//! match becomes an element whose class is the match's token type, with the
//! literal text between children kept as [`Fragment::Text`]. Post-render hooks
//! may replace elements (for example turning a `href` token into an anchor).
//!
//! The render tree is format-agnostic. [`RenderNode::to_html`] serializes it
//! according to an [`HtmlFormat`], and [`to_ansi`] paints it for terminals
//! using a [`Theme`].

use std::io::{self, Write};

use canopy_theme::{Theme, ThemeSlot, slot_for_class};

use crate::HtmlFormat;
use crate::match_tree::{Expression, Match};

/// Class of the outermost container produced by [`render_lines`].
pub const CODE_CLASS: &str = "syntax highlighted";

/// A piece of element content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Node(RenderNode),
}

/// A generic element: tag, class string, attributes and ordered content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderNode {
    pub tag: String,
    pub class: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Fragment>,
}

impl RenderNode {
    pub fn element(tag: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            class: class.into(),
            ..Self::default()
        }
    }

    pub fn span(class: impl Into<String>) -> Self {
        Self::element("span", class)
    }

    /// Default `append` for [`Match::reduce`]; empty text is skipped.
    pub fn append(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::Text(text) if text.is_empty() => {}
            fragment => self.children.push(fragment),
        }
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.append(Fragment::Text(text.into()));
    }

    pub fn push_node(&mut self, node: RenderNode) {
        self.children.push(Fragment::Node(node));
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Turn this element into a hyperlink, keeping its class and content.
    pub fn into_link(mut self, href: impl Into<String>) -> Self {
        self.tag = "a".to_string();
        self.set_attribute("href", href);
        self
    }

    /// Concatenated text of the whole subtree.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Fragment::Text(t) => out.push_str(t),
                Fragment::Node(node) => node.collect_text(out),
            }
        }
    }

    /// Serialize to HTML.
    pub fn to_html(&self, format: &HtmlFormat) -> String {
        let mut html = String::new();
        self.html_into(format, &mut html);
        html
    }

    /// Serialize to HTML, writing to `w`.
    pub fn write_html<W: Write>(&self, w: &mut W, format: &HtmlFormat) -> io::Result<()> {
        w.write_all(self.to_html(format).as_bytes())
    }

    fn html_into(&self, format: &HtmlFormat, out: &mut String) {
        let (open, close) = make_html_tags(self, format);
        out.push_str(&open);
        for child in &self.children {
            match child {
                Fragment::Text(text) => out.push_str(&html_escape(text)),
                Fragment::Node(node) => node.html_into(format, out),
            }
        }
        out.push_str(&close);
    }
}

fn prefixed(prefix: &str, class: &str) -> String {
    class
        .split_whitespace()
        .map(|word| format!("{prefix}-{word}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Opening and closing tags for one element in the given format.
fn make_html_tags(node: &RenderNode, format: &HtmlFormat) -> (String, String) {
    let short_tag = match format {
        HtmlFormat::CustomElements | HtmlFormat::CustomElementsWithPrefix(_)
            if node.tag == "span" && node.attributes.is_empty() =>
        {
            slot_for_class(&node.class).tag()
        }
        _ => None,
    };

    if let Some(short_tag) = short_tag {
        let prefix = match format {
            HtmlFormat::CustomElementsWithPrefix(prefix) => prefix.as_str(),
            _ => "a",
        };
        return (
            format!("<{prefix}-{short_tag}>"),
            format!("</{prefix}-{short_tag}>"),
        );
    }

    let class = match format {
        HtmlFormat::ClassNamesWithPrefix(prefix) => prefixed(prefix, &node.class),
        _ => node.class.clone(),
    };

    let mut open = format!("<{}", node.tag);
    if !class.is_empty() {
        open.push_str(&format!(" class=\"{}\"", html_escape(&class)));
    }
    for (name, value) in &node.attributes {
        open.push_str(&format!(" {}=\"{}\"", name, html_escape(value)));
    }
    open.push('>');
    (open, format!("</{}>", node.tag))
}

/// Escape HTML special characters.
pub fn html_escape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

/// Split a finished tree into lines and reduce each line into the returned
/// `<code class="syntax highlighted">` container.
pub fn render_lines<P>(root: Match, process: &mut P) -> RenderNode
where
    P: FnMut(RenderNode, &Match) -> RenderNode,
{
    let mut code = RenderNode::element("code", CODE_CLASS);
    for line in root.split_lines() {
        code.push_node(line.reduce(&mut RenderNode::append, process));
    }
    code
}

/// The container for `text` with no highlighting at all.
pub fn plain(text: &str) -> RenderNode {
    let text = text.replace('\r', "");
    let root = Match::new(0, text, std::sync::Arc::new(Expression::default()));
    render_lines(root, &mut |node, _| node)
}

/// Paint a render tree with ANSI escape sequences.
///
/// Each run of text takes the style of the innermost enclosing element whose
/// class maps to a slot the theme styles. Styles are reset before every
/// newline so that line-oriented consumers never see a dangling color.
pub fn to_ansi(node: &RenderNode, theme: &Theme) -> String {
    let mut out = String::new();
    let mut active = None;
    paint(node, theme, None, &mut active, &mut out);
    if active.is_some() {
        out.push_str(Theme::ANSI_RESET);
    }
    out
}

fn paint(
    node: &RenderNode,
    theme: &Theme,
    inherited: Option<ThemeSlot>,
    active: &mut Option<ThemeSlot>,
    out: &mut String,
) {
    let own = Some(slot_for_class(&node.class))
        .filter(|slot| theme.style(*slot).is_some_and(|style| !style.is_empty()));
    let slot = own.or(inherited);

    for child in &node.children {
        match child {
            Fragment::Text(text) => paint_text(text, slot, theme, active, out),
            Fragment::Node(child) => paint(child, theme, slot, active, out),
        }
    }
}

fn paint_text(
    text: &str,
    slot: Option<ThemeSlot>,
    theme: &Theme,
    active: &mut Option<ThemeSlot>,
    out: &mut String,
) {
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            if active.take().is_some() {
                out.push_str(Theme::ANSI_RESET);
            }
            out.push('\n');
        }
        if line.is_empty() {
            continue;
        }
        if *active != slot {
            if active.is_some() {
                out.push_str(Theme::ANSI_RESET);
            }
            if let Some(slot) = slot {
                out.push_str(&theme.ansi_style(slot));
            }
            *active = slot;
        }
        out.push_str(line);
    }
}
