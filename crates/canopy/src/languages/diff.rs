//! Unified diffs.

use canopy_highlight::{Language, Registry, Rule};

pub fn register(registry: &Registry) {
    let mut language = Language::new("diff");

    // File headers
    language.push(Rule::new(r"(?m)^\+\+\+.*$").typed("add"));
    language.push(Rule::new(r"(?m)^---.*$").typed("del"));

    language.push(Rule::new(r"(?m)^@@.*@@").typed("offset"));

    language.push(Rule::new(r"(?m)^\+[^+].*$").typed("insert"));
    language.push(Rule::new(r"(?m)^-[^-].*$").typed("remove"));

    registry.register(language);
    registry.alias("diff", ["patch"]);
}
