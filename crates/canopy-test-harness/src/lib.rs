//! Test harness for canopy grammars.
//!
//! This crate provides utilities for checking that a grammar loads, builds
//! well-formed match trees, and actually highlights its samples.
//!
//! # Usage
//!
//! In a grammar module's tests:
//!
//! ```ignore
//! #[cfg(test)]
//! mod tests {
//!     #[test]
//!     fn test_grammar() {
//!         canopy_test_harness::test_language(
//!             canopy::BuiltinProvider,
//!             "json",
//!             &[r#"{"a": [1, true, null]}"#],
//!         );
//!     }
//! }
//! ```

pub use canopy_highlight;

use std::fs;
use std::path::Path;

use canopy_highlight::{Match, ModuleProvider, Options, Registry};
use futures::executor::block_on;

/// Tests a language by resolving it in strict mode and building every sample.
///
/// This function:
/// 1. Resolves `name` through `provider` with a strict registry
/// 2. Builds and renders the match tree of each sample
/// 3. Checks the tree invariants (see [`assert_tree_invariants`])
/// 4. Checks that splitting into lines reproduces the sample exactly
/// 5. Checks that every non-blank sample produces at least one token
///
/// Returns the registry so callers can inspect what was loaded.
///
/// # Panics
///
/// Panics with a description of the first violated property.
pub fn test_language(
    provider: impl ModuleProvider + 'static,
    name: &str,
    samples: &[&str],
) -> Registry {
    let registry = Registry::new(
        provider,
        Options {
            strict: true,
            ..Options::default()
        },
    );

    let language = block_on(registry.get_language(name)).unwrap_or_else(|e| {
        panic!("Language {name} did not resolve: {e}");
    });

    for (index, sample) in samples.iter().enumerate() {
        let tree = block_on(language.build_tree(&registry, sample, 0, Vec::new()))
            .unwrap_or_else(|e| panic!("Sample {index} of {name} failed to build: {e}"));

        assert_tree_invariants(&tree);

        let text = sample.replace('\r', "");
        let mut lines = String::new();
        for line in tree.clone().split_lines() {
            assert_tree_invariants(&line);
            push_leaves(&line, &mut lines);
        }
        if lines != text {
            panic!(
                "Line splitting of sample {index} of {name} does not reconstruct it.\n\
                 expected: {text:?}\n\
                 got:      {lines:?}"
            );
        }

        if !text.trim().is_empty() && tree.children().is_empty() {
            panic!(
                "No tokens produced for sample {index} of {name}.\n\
                 Sample has {} bytes.\n\
                 This likely means none of the language's rules match it.",
                text.len()
            );
        }

        block_on(language.process(&registry, sample))
            .unwrap_or_else(|e| panic!("Sample {index} of {name} failed to render: {e}"));
    }

    registry
}

/// Append the text of every leaf fragment of `node`, in order, including the
/// gaps between children.
fn push_leaves(node: &Match, out: &mut String) {
    if node.children().is_empty() {
        out.push_str(node.value());
        return;
    }
    let slice = |from: usize, to: usize| {
        node.value()
            .get(from.saturating_sub(node.offset())..to.saturating_sub(node.offset()))
            .unwrap_or_default()
    };
    let mut start = node.offset();
    for child in node.children() {
        out.push_str(slice(start, child.offset()));
        push_leaves(child, out);
        start = child.end_offset();
    }
    out.push_str(slice(start, node.end_offset()));
}

/// Check the structural invariants of a match tree.
///
/// For every node: its children are sorted and non-overlapping, each lies
/// within the node's range, and each child's value is the matching slice of
/// the node's value.
///
/// # Panics
///
/// Panics naming the offending node.
pub fn assert_tree_invariants(tree: &Match) {
    check(tree, &mut Vec::new());
}

fn check(node: &Match, path: &mut Vec<String>) {
    path.push(format!(
        "{}@{}",
        node.kind().unwrap_or("?"),
        node.offset()
    ));

    let mut previous_end = node.offset();
    for child in node.children() {
        if !node.contains(child) {
            panic!(
                "{}: child {:?}@{}..{} escapes its parent's range {}..{}",
                path.join(" > "),
                child.kind(),
                child.offset(),
                child.end_offset(),
                node.offset(),
                node.end_offset()
            );
        }
        if child.offset() < previous_end {
            panic!(
                "{}: child {:?}@{} overlaps or precedes its previous sibling ending at {}",
                path.join(" > "),
                child.kind(),
                child.offset(),
                previous_end
            );
        }
        let start = child.offset() - node.offset();
        let expected = node.value().get(start..start + child.len());
        if expected != Some(child.value()) {
            panic!(
                "{}: child {:?}@{} has value {:?} but covers {:?}",
                path.join(" > "),
                child.kind(),
                child.offset(),
                child.value(),
                expected
            );
        }
        previous_end = child.end_offset();
        check(child, path);
    }

    path.pop();
}

/// Every token of the tree below the root, depth first, as `(type, value)`.
///
/// Untyped nodes are listed with an empty type.
pub fn tokens(tree: &Match) -> Vec<(String, String)> {
    let mut tokens = Vec::new();
    collect(tree, &mut tokens);
    tokens
}

fn collect(node: &Match, tokens: &mut Vec<(String, String)>) {
    for child in node.children() {
        tokens.push((
            child.kind().unwrap_or_default().to_string(),
            child.value().to_string(),
        ));
        collect(child, tokens);
    }
}

/// Build `sample` as `name` with `registry` and return its tokens.
///
/// # Panics
///
/// Panics if the language does not resolve or the build fails.
pub fn tokens_of(registry: &Registry, name: &str, sample: &str) -> Vec<(String, String)> {
    let tree = block_on(async {
        let language = registry.get_language(name).await?;
        language.build_tree(registry, sample, 0, Vec::new()).await
    })
    .unwrap_or_else(|e| panic!("Failed to build {name} sample: {e}"));
    tokens(&tree)
}

/// Read a sample file relative to a crate directory
/// (use `env!("CARGO_MANIFEST_DIR")`).
///
/// # Panics
///
/// Panics if the file cannot be read.
pub fn read_sample(crate_dir: &str, relative: &str) -> String {
    let path = Path::new(crate_dir).join(relative);
    fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!("Failed to read sample file {}: {e}", path.display());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_highlight::{Language, Module, Rule, TableProvider};

    fn words(registry: &Registry) {
        let mut language = Language::new("words");
        language.push(Rule::literals(["alpha", "beta"]).typed("keyword"));
        language.push(Rule::double_quoted_string());
        registry.register(language);
    }

    fn provider() -> TableProvider {
        TableProvider::new().with("words", Module::new(words))
    }

    #[test]
    fn test_language_accepts_a_working_grammar() {
        let registry = test_language(provider(), "words", &["alpha \"x\"\nbeta\r\n", ""]);
        assert!(registry.has_language("words"));
        assert_eq!(
            tokens_of(&registry, "words", "beta \"q\""),
            [
                ("keyword".to_string(), "beta".to_string()),
                ("string".to_string(), "\"q\"".to_string()),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "No tokens produced")]
    fn test_language_rejects_samples_without_tokens() {
        test_language(provider(), "words", &["gamma"]);
    }

    #[test]
    #[should_panic(expected = "did not resolve")]
    fn test_language_rejects_unknown_language() {
        test_language(provider(), "nope", &[]);
    }

    #[test]
    fn test_line_leaves_reconstruct_indented_source() {
        let registry = test_language(provider(), "words", &[]);
        let language = block_on(registry.get_language("words")).unwrap();
        let source = "alpha\n    \"x\" beta\n\n  gamma";
        let tree = block_on(language.build_tree(&registry, source, 0, Vec::new())).unwrap();

        let lines = tree.split_lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1].children()[0].kind(), Some("indent"));

        let mut text = String::new();
        for line in &lines {
            push_leaves(line, &mut text);
        }
        assert_eq!(text, source);
    }

    #[test]
    fn test_read_sample() {
        let manifest = read_sample(env!("CARGO_MANIFEST_DIR"), "Cargo.toml");
        assert!(manifest.contains("canopy-test-harness"));
    }
}
