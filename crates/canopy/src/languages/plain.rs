//! Plain text with clickable links.

use canopy_highlight::{Language, Registry, Rule};

pub fn register(registry: &Registry) {
    let mut language = Language::new("plain");
    language.push(Rule::web_link());
    language.on("href", |node, m| node.into_link(m.value()));

    registry.register(language);
    registry.alias("plain", ["text"]);
}
