//! The match tree: tagged intervals over source text.
//!
//! A [`Match`] covers `[offset, end_offset)` of the source and owns an ordered
//! list of non-overlapping children, each contained in its parent's range.
//! Overlap is resolved *before* a child is spliced in (by rejection or by
//! bisection), so it is never represented in the tree.
//!
//! # Admission policy
//!
//! Whether a node accepts a child is decided by [`Match::can_contain`]
//! (the node's own `allow`/`disallow` lists, the candidate's `force` flag, and
//! the node's `complete` state) and, for candidates restricted with `only`, by
//! an ancestry walk performed at splice time. The ancestry is never stored in
//! the tree: insertion threads a borrowed ancestry chain down the recursion
//! instead.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::language::Language;
use crate::render::{Fragment, RenderNode};

/// Post-render transform attached to a rule or to a language's token type.
pub type Process = Arc<dyn Fn(RenderNode, &Match) -> RenderNode + Send + Sync>;

/// Which child types a node admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allow {
    /// Any child type (`'*'`).
    All,
    /// Only the listed child types.
    Types(Vec<String>),
}

impl Allow {
    fn permits(&self, kind: Option<&str>) -> bool {
        match self {
            Allow::All => true,
            Allow::Types(types) => kind.is_some_and(|kind| types.iter().any(|t| t == kind)),
        }
    }
}

/// Rule metadata carried by every [`Match`].
#[derive(Clone, Default)]
pub struct Expression {
    /// Token category, used as the render class.
    pub kind: Option<String>,
    /// Children admitted by this node. `None` makes it a leaf.
    pub allow: Option<Allow>,
    /// Child types rejected even when `allow` would admit them.
    pub disallow: Vec<String>,
    /// Restrict this token to subtrees with an ancestor of one of these types.
    pub only: Option<Vec<String>>,
    /// Bypass overlap rejection and admission checks.
    pub force: bool,
    /// Embedded language that the whole hit is delegated to.
    pub language: Option<String>,
    /// Rule-level post-render hook.
    pub process: Option<Process>,
    /// Language whose rule produced this token.
    pub owner: Option<Arc<Language>>,
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl Expression {
    /// An expression with only a token category.
    pub fn typed(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn allow<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(Allow::Types(strings(types)));
        self
    }

    pub fn allow_all(mut self) -> Self {
        self.allow = Some(Allow::All);
        self
    }

    pub fn disallow<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallow = strings(types);
        self
    }

    pub fn only<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(strings(types));
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn language(mut self, name: impl Into<String>) -> Self {
        self.language = Some(name.into());
        self
    }

    pub fn process<F>(mut self, hook: F) -> Self
    where
        F: Fn(RenderNode, &Match) -> RenderNode + Send + Sync + 'static,
    {
        self.process = Some(Arc::new(hook));
        self
    }

    pub fn owner(mut self, owner: Arc<Language>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Copy every field that `other` sets onto `self`.
    ///
    /// Used when an embedded tree's root takes on the metadata of the rule
    /// that embedded it.
    pub fn overlay(&mut self, other: &Expression) {
        if other.kind.is_some() {
            self.kind.clone_from(&other.kind);
        }
        if other.allow.is_some() {
            self.allow.clone_from(&other.allow);
        }
        if !other.disallow.is_empty() {
            self.disallow.clone_from(&other.disallow);
        }
        if other.only.is_some() {
            self.only.clone_from(&other.only);
        }
        if other.process.is_some() {
            self.process.clone_from(&other.process);
        }
        if other.owner.is_some() {
            self.owner.clone_from(&other.owner);
        }
        self.force |= other.force;
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("kind", &self.kind)
            .field("allow", &self.allow)
            .field("disallow", &self.disallow)
            .field("only", &self.only)
            .field("force", &self.force)
            .field("language", &self.language)
            .field("process", &self.process.is_some())
            .field("owner", &self.owner.as_ref().map(|owner| owner.name()))
            .finish()
    }
}

/// Borrowed view of the nodes above the one being inserted into.
#[derive(Clone, Copy)]
struct Lineage<'a> {
    kind: Option<&'a str>,
    complete: bool,
    parent: Option<&'a Lineage<'a>>,
}

/// A tagged interval over the source text.
#[derive(Debug, Clone)]
pub struct Match {
    pub(crate) offset: usize,
    pub(crate) length: usize,
    pub(crate) value: String,
    pub(crate) expression: Arc<Expression>,
    pub(crate) children: Vec<Match>,
    pub(crate) complete: bool,
    pub(crate) continues: bool,
}

impl Match {
    /// Create a match for `value` starting at absolute `offset`.
    pub fn new(offset: usize, value: impl Into<String>, expression: Arc<Expression>) -> Self {
        let value = value.into();
        Self {
            offset,
            length: value.len(),
            value,
            expression,
            children: Vec::new(),
            complete: false,
            continues: false,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.length
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expression(&self) -> &Arc<Expression> {
        &self.expression
    }

    pub fn kind(&self) -> Option<&str> {
        self.expression.kind.as_deref()
    }

    pub fn children(&self) -> &[Match] {
        &self.children
    }

    /// True once the subtree has been finalized by a tree build.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True when this match is a fragment followed by another fragment of the
    /// same logical span, starting at this fragment's end.
    pub fn continues(&self) -> bool {
        self.continues
    }

    /// Sort order required by [`Match::insert_at_end`]: offset ascending,
    /// then length descending.
    pub fn order(a: &Match, b: &Match) -> Ordering {
        a.offset
            .cmp(&b.offset)
            .then_with(|| b.length.cmp(&a.length))
    }

    /// Move this match and its whole subtree forward by `delta` bytes.
    pub fn shift(&mut self, delta: usize) {
        self.offset += delta;
        for child in &mut self.children {
            child.shift(delta);
        }
    }

    pub fn contains(&self, other: &Match) -> bool {
        other.offset >= self.offset && other.end_offset() <= self.end_offset()
    }

    /// Whether `candidate` may become a direct child of this node.
    pub fn can_contain(&self, candidate: &Match) -> bool {
        let expression = &candidate.expression;
        if expression.force {
            return true;
        }
        if self.complete {
            return false;
        }
        // Admission of `only`-scoped tokens is decided at splice time.
        if expression.only.is_some() {
            return true;
        }
        let Some(allow) = &self.expression.allow else {
            return false;
        };
        if let Some(kind) = candidate.kind() {
            if self.expression.disallow.iter().any(|t| t == kind) {
                return false;
            }
        }
        allow.permits(candidate.kind())
    }

    fn can_have_child(&self, candidate: &Match, lineage: Option<&Lineage<'_>>) -> bool {
        let Some(only) = &candidate.expression.only else {
            return true;
        };
        let listed = |kind: Option<&str>| kind.is_some_and(|kind| only.iter().any(|t| t == kind));

        if listed(self.kind()) {
            return true;
        }
        let mut ancestor = lineage;
        while let Some(node) = ancestor {
            if node.complete {
                break;
            }
            if listed(node.kind) {
                return true;
            }
            ancestor = node.parent;
        }
        false
    }

    fn splice(
        &mut self,
        index: usize,
        mut candidate: Match,
        lineage: Option<&Lineage<'_>>,
    ) -> Result<(), Match> {
        if !self.can_have_child(&candidate, lineage) {
            return Err(candidate);
        }
        if candidate.expression.owner.is_none() {
            if let Some(owner) = &self.expression.owner {
                Arc::make_mut(&mut candidate.expression).owner = Some(owner.clone());
            }
        }
        self.children.insert(index, candidate);
        Ok(())
    }

    /// Append a match supplied in [`Match::order`].
    ///
    /// The candidate is compared with the current last child only: it is
    /// appended after it, nested inside it, or, when it partially overlaps
    /// and is not forced, rejected. A rejected match is handed back and the
    /// tree is left unchanged.
    pub fn insert_at_end(&mut self, candidate: Match) -> Result<(), Match> {
        self.insert_at_end_within(candidate, None)
    }

    fn insert_at_end_within(
        &mut self,
        candidate: Match,
        lineage: Option<&Lineage<'_>>,
    ) -> Result<(), Match> {
        if !self.contains(&candidate) || !self.can_contain(&candidate) {
            return Err(candidate);
        }

        let Some(last) = self.children.last() else {
            return self.splice(0, candidate, lineage);
        };
        let (last_start, last_end) = (last.offset, last.end_offset());

        if candidate.offset < last_start {
            return if candidate.expression.force {
                self.insert_spread(candidate, lineage)
            } else {
                Err(candidate)
            };
        }

        if candidate.offset < last_end {
            if candidate.end_offset() <= last_end {
                let here = Lineage {
                    kind: self.expression.kind.as_deref(),
                    complete: self.complete,
                    parent: lineage,
                };
                let index = self.children.len() - 1;
                return self.children[index].insert_at_end_within(candidate, Some(&here));
            }
            return if candidate.expression.force {
                self.insert_spread(candidate, lineage)
            } else {
                Err(candidate)
            };
        }

        let end = self.children.len();
        self.splice(end, candidate, lineage)
    }

    /// General insertion for out-of-band matches.
    ///
    /// With `whole`, the candidate is inserted intact below the deepest node
    /// containing it, taking over the children inside its range. Without it,
    /// the candidate is spliced against the existing children, bisecting it
    /// wherever it partially overlaps one of them.
    pub fn insert(&mut self, candidate: Match, whole: bool) -> Result<(), Match> {
        if !self.contains(&candidate) {
            return Err(candidate);
        }
        if whole {
            self.insert_whole_deepest(candidate)
        } else {
            self.insert_spread(candidate, None)
        }
    }

    fn insert_whole_deepest(&mut self, candidate: Match) -> Result<(), Match> {
        match self.children.iter().position(|child| child.contains(&candidate)) {
            Some(index) => self.children[index].insert_whole_deepest(candidate),
            None => self.insert_whole(candidate),
        }
    }

    fn insert_whole(&mut self, mut candidate: Match) -> Result<(), Match> {
        let shell = Match {
            offset: self.offset,
            length: self.length,
            value: self.value.clone(),
            expression: self.expression.clone(),
            children: std::mem::take(&mut self.children),
            complete: self.complete,
            continues: false,
        };
        let mut parts = shell
            .bisect_at_offsets(&[candidate.offset, candidate.end_offset()])
            .into_iter();
        let before = parts.next().flatten();
        let middle = parts.next().flatten();
        let after = parts.next().flatten();

        if let Some(before) = before {
            self.children.extend(before.children);
        }

        let mut rejected = None;
        match middle {
            Some(middle) => {
                candidate.children.clear();
                if let (Some(owner), Some(kind)) = (&self.expression.owner, candidate.kind()) {
                    if let Some(expression) = owner.rule_for_type(kind) {
                        candidate.expression = expression;
                    }
                }
                for child in middle.children {
                    if candidate.can_contain(&child) {
                        candidate.children.push(child);
                    } else {
                        tracing::trace!(
                            offset = child.offset,
                            kind = child.kind(),
                            "child not admitted by whole insertion, dropped"
                        );
                    }
                }
                self.children.push(candidate);
            }
            None => rejected = Some(candidate),
        }

        if let Some(after) = after {
            self.children.extend(after.children);
        }

        match rejected {
            Some(candidate) => Err(candidate),
            None => Ok(()),
        }
    }

    fn insert_spread(
        &mut self,
        mut candidate: Match,
        lineage: Option<&Lineage<'_>>,
    ) -> Result<(), Match> {
        let mut index = 0;
        while index < self.children.len() {
            let child = &self.children[index];
            let (child_start, child_end) = (child.offset, child.end_offset());

            if candidate.end_offset() <= child_start {
                return self.splice(index, candidate, lineage);
            }
            if candidate.offset >= child_end {
                index += 1;
                continue;
            }

            if child.contains(&candidate) {
                let here = Lineage {
                    kind: self.expression.kind.as_deref(),
                    complete: self.complete,
                    parent: lineage,
                };
                return self.children[index].insert_spread(candidate, Some(&here));
            }

            let mut parts = candidate
                .bisect_at_offsets(&[child_start, child_end])
                .into_iter();
            let before = parts.next().flatten();
            let middle = parts.next().flatten();
            let after = parts.next().flatten();

            if let Some(before) = before {
                if let Err(dropped) = self.splice(index, before, lineage) {
                    tracing::trace!(offset = dropped.offset, "leading fragment rejected");
                } else {
                    index += 1;
                }
            }
            if let Some(middle) = middle {
                let here = Lineage {
                    kind: self.expression.kind.as_deref(),
                    complete: self.complete,
                    parent: lineage,
                };
                if let Err(dropped) = self.children[index].insert_spread(middle, Some(&here)) {
                    tracing::trace!(offset = dropped.offset, "overlapping fragment rejected");
                }
            }
            match after {
                Some(after) => {
                    candidate = after;
                    index += 1;
                }
                None => return Ok(()),
            }
        }

        let end = self.children.len();
        self.splice(end, candidate, lineage)
    }

    fn snap(&self, cut: usize) -> usize {
        if cut <= self.offset || cut >= self.end_offset() {
            return cut;
        }
        let mut at = cut - self.offset;
        while !self.value.is_char_boundary(at) {
            at -= 1;
        }
        self.offset + at
    }

    /// Split this match into contiguous fragments at the given absolute cuts.
    ///
    /// The result is aligned with the sorted cut list (plus this match's end
    /// as a final cut): entry `i` covers the range ending at cut `i`, and is
    /// `None` when that range is empty or lies before this match. Cuts past
    /// the end are ignored. Children are moved into the fragment containing
    /// them; a child straddling a cut is bisected in turn.
    pub fn bisect_at_offsets(mut self, splits: &[usize]) -> Vec<Option<Match>> {
        let end = self.end_offset();
        let mut cuts: Vec<usize> = splits.iter().map(|&cut| self.snap(cut)).collect();
        cuts.push(end);
        cuts.sort_unstable();

        let mut parts: Vec<Option<Match>> = Vec::with_capacity(cuts.len());
        let mut previous: Option<usize> = None;
        let mut start = self.offset;

        for &cut in &cuts {
            if cut > end {
                break;
            }
            let from = start.max(self.offset);
            if cut < self.offset || cut == from {
                parts.push(None);
                start = cut;
                continue;
            }

            let fragment = Match {
                offset: from,
                length: cut - from,
                value: self.slice(from, cut).to_string(),
                expression: self.expression.clone(),
                children: Vec::new(),
                complete: self.complete,
                continues: false,
            };
            if let Some(index) = previous {
                if let Some(Some(prev)) = parts.get_mut(index) {
                    prev.continues = true;
                }
            }
            previous = Some(parts.len());
            parts.push(Some(fragment));
            start = cut;
        }

        if let Some(index) = previous {
            if let Some(Some(last)) = parts.get_mut(index) {
                last.continues = self.continues;
            }
        }

        let mut cursor = 0;
        for child in std::mem::take(&mut self.children) {
            let first = cuts.partition_point(|&cut| cut <= child.offset);
            let last = cuts.partition_point(|&cut| cut < child.end_offset());
            let pieces: Vec<Match> = if first < last {
                child
                    .bisect_at_offsets(&cuts[first..last])
                    .into_iter()
                    .flatten()
                    .collect()
            } else {
                vec![child]
            };

            for piece in pieces {
                let home = (cursor..parts.len())
                    .find(|&index| parts[index].as_ref().is_some_and(|p| p.contains(&piece)));
                match home {
                    Some(index) => {
                        cursor = index;
                        if let Some(part) = parts[index].as_mut() {
                            part.children.push(piece);
                        }
                    }
                    None => tracing::warn!(
                        offset = piece.offset,
                        length = piece.length,
                        "child outside of bisected range, dropped"
                    ),
                }
            }
        }

        parts
    }

    /// Cut after every match of `pattern`, so each separator stays with the
    /// fragment it terminates.
    pub fn split(self, pattern: &Regex) -> Vec<Match> {
        let cuts: Vec<usize> = pattern
            .find_iter(&self.value)
            .map(|m| self.offset + m.end())
            .collect();
        self.bisect_at_offsets(&cuts).into_iter().flatten().collect()
    }

    /// Split into lines, then split each line into `indent` and `text`.
    ///
    /// Each returned line keeps this match's expression. Its children are an
    /// `indent` fragment covering leading whitespace (when there is any) and a
    /// `text` fragment holding the rest of the line with its tokens.
    pub fn split_lines(self) -> Vec<Match> {
        let cuts: Vec<usize> = self
            .value
            .match_indices('\n')
            .map(|(at, _)| self.offset + at + 1)
            .collect();
        let expression = self.expression.clone();

        self.bisect_at_offsets(&cuts)
            .into_iter()
            .flatten()
            .map(|line| {
                let mut top = Match::new(line.offset, line.value.clone(), expression.clone());
                match line.value.find(|c: char| !c.is_whitespace()) {
                    Some(indent) if indent > 0 => {
                        let cut = line.offset + indent;
                        let mut parts = line.bisect_at_offsets(&[cut]).into_iter().flatten();
                        if let Some(mut whitespace) = parts.next() {
                            whitespace.expression = Arc::new(Expression::typed("indent"));
                            top.children.push(whitespace);
                        }
                        if let Some(mut text) = parts.next() {
                            text.expression = Arc::new(Expression::typed("text"));
                            top.children.push(text);
                        }
                    }
                    _ => {
                        let mut text = line;
                        text.expression = Arc::new(Expression::typed("text"));
                        top.children.push(text);
                    }
                }
                top
            })
            .collect()
    }

    fn slice(&self, from: usize, to: usize) -> &str {
        let from = from.saturating_sub(self.offset);
        let to = to.saturating_sub(self.offset);
        self.value.get(from..to).unwrap_or_default()
    }

    /// Depth-first fold into a render tree.
    ///
    /// Text between children and after the last child is passed to `append`
    /// as [`Fragment::Text`]; each child is reduced recursively and appended
    /// as [`Fragment::Node`]. `process` receives every finished container and
    /// may replace it.
    pub fn reduce<A, P>(&self, append: &mut A, process: &mut P) -> RenderNode
    where
        A: FnMut(&mut RenderNode, Fragment),
        P: FnMut(RenderNode, &Match) -> RenderNode,
    {
        let mut container = RenderNode::span(self.kind().unwrap_or_default());
        let mut start = self.offset;

        for child in &self.children {
            if child.offset < start {
                tracing::warn!(
                    offset = child.offset,
                    start,
                    "child starts before the end of its previous sibling"
                );
            } else if child.offset > start {
                append(
                    &mut container,
                    Fragment::Text(self.slice(start, child.offset).to_string()),
                );
            }
            let node = child.reduce(append, process);
            append(&mut container, Fragment::Node(node));
            start = child.end_offset();
        }

        if start < self.end_offset() {
            append(
                &mut container,
                Fragment::Text(self.slice(start, self.end_offset()).to_string()),
            );
        } else if start > self.end_offset() {
            tracing::warn!(
                offset = self.offset,
                "children extend past the end of their parent"
            );
        }

        process(container, self)
    }

    /// Reduce without post-render hooks.
    pub fn render(&self) -> RenderNode {
        self.reduce(&mut RenderNode::append, &mut |node, _| node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(offset: usize, value: &str, kind: &str) -> Match {
        Match::new(offset, value, Arc::new(Expression::typed(kind)))
    }

    fn root(text: &str) -> Match {
        Match::new(0, text, Arc::new(Expression::typed("root").allow_all()))
    }

    fn spans(node: &Match) -> Vec<(usize, usize, String)> {
        node.children()
            .iter()
            .map(|c| (c.offset(), c.len(), c.kind().unwrap_or_default().to_string()))
            .collect()
    }

    fn leaves(node: &Match, out: &mut String) {
        if node.children.is_empty() {
            out.push_str(node.value());
            return;
        }
        let mut start = node.offset;
        for child in &node.children {
            out.push_str(node.slice(start, child.offset));
            leaves(child, out);
            start = child.end_offset();
        }
        out.push_str(node.slice(start, node.end_offset()));
    }

    #[test]
    fn test_contains_is_half_open() {
        let outer = token(2, "abcd", "x");
        assert!(outer.contains(&token(2, "ab", "y")));
        assert!(outer.contains(&token(4, "cd", "y")));
        assert!(!outer.contains(&token(5, "de", "y")));
        assert!(!outer.contains(&token(1, "ab", "y")));
    }

    #[test]
    fn test_can_contain_policy_order() {
        let leaf = token(0, "abc", "string");
        assert!(!leaf.can_contain(&token(0, "a", "escape")));

        let mut forced = token(0, "a", "escape");
        Arc::make_mut(&mut forced.expression).force = true;
        assert!(leaf.can_contain(&forced));

        let scoped = Match::new(0, "a", Arc::new(Expression::typed("escape").only(["string"])));
        assert!(leaf.can_contain(&scoped));

        let listed = Match::new(
            0,
            "abc",
            Arc::new(Expression::typed("comment").allow(["href"]).disallow(["href"])),
        );
        assert!(!listed.can_contain(&token(0, "a", "href")));

        let mut complete = root("abc");
        complete.complete = true;
        assert!(!complete.can_contain(&token(0, "a", "keyword")));
        assert!(complete.can_contain(&forced));
    }

    #[test]
    fn test_insert_at_end_sorted_disjoint() {
        let mut tree = root("if x then y");
        for m in [token(0, "if", "keyword"), token(5, "then", "keyword"), token(10, "y", "name")] {
            tree.insert_at_end(m).unwrap();
        }
        assert_eq!(
            spans(&tree),
            vec![
                (0, 2, "keyword".into()),
                (5, 4, "keyword".into()),
                (10, 1, "name".into())
            ]
        );
    }

    #[test]
    fn test_insert_at_end_nests_inside_last_child() {
        let mut tree = root("/* see http://x */");
        let comment = Match::new(
            0,
            "/* see http://x */",
            Arc::new(Expression::typed("comment").allow(["href"])),
        );
        tree.insert_at_end(comment).unwrap();
        tree.insert_at_end(token(7, "http://x", "href")).unwrap();
        assert_eq!(tree.children().len(), 1);
        assert_eq!(spans(&tree.children()[0]), vec![(7, 8, "href".into())]);
    }

    #[test]
    fn test_partial_overlap_at_same_start_is_rejected() {
        let mut tree = root("abcdef");
        tree.insert_at_end(token(0, "abc", "first")).unwrap();
        let before = spans(&tree);

        let rejected = tree.insert_at_end(token(0, "abcde", "second")).unwrap_err();
        assert_eq!(rejected.value(), "abcde");
        assert_eq!(spans(&tree), before);
    }

    #[test]
    fn test_leaf_rejects_nested_token() {
        let mut tree = root("\"a\"");
        tree.insert_at_end(token(0, "\"a\"", "string")).unwrap();
        assert!(tree.insert_at_end(token(1, "a", "name")).is_err());
        assert!(tree.children()[0].children().is_empty());
    }

    #[test]
    fn test_forced_overlap_is_spread_over_children() {
        let mut tree = root("abcdef");
        tree.insert_at_end(token(2, "cdef", "tail")).unwrap();

        let forced = Match::new(0, "abcd", Arc::new(Expression::typed("mark").force()));
        tree.insert_at_end(forced).unwrap();

        // The leading part stays a sibling; the overlapping part is forced
        // into the existing token.
        assert_eq!(
            spans(&tree),
            vec![(0, 2, "mark".into()), (2, 4, "tail".into())]
        );
        let head = &tree.children()[0];
        assert!(head.continues());
        assert_eq!(spans(&tree.children()[1]), vec![(2, 2, "mark".into())]);
    }

    #[test]
    fn test_only_requires_matching_ancestor() {
        let mut tree = root("'a\\n' \\t");
        tree.insert_at_end(Match::new(
            0,
            "'a\\n'",
            Arc::new(Expression::typed("string").allow_all()),
        ))
        .unwrap();
        let escape = || Arc::new(Expression::typed("escape").only(["string"]));
        tree.insert_at_end(Match::new(2, "\\n", escape())).unwrap();
        // Outside any string the escape has no admissible ancestor.
        assert!(tree.insert_at_end(Match::new(7, "\\t", escape())).is_err());
        assert_eq!(spans(&tree.children()[0]), vec![(2, 2, "escape".into())]);
    }

    #[test]
    fn test_only_does_not_cross_complete_subtree() {
        let scoped = Match::new(3, "y", Arc::new(Expression::typed("escape").only(["string"])));
        let string = Lineage {
            kind: Some("string"),
            complete: false,
            parent: None,
        };
        let embedded_root = Lineage {
            kind: Some("inner"),
            complete: true,
            parent: Some(&string),
        };
        let leaf = token(3, "y", "leaf");
        // The walk stops at the embedded root and never reaches the string.
        assert!(!leaf.can_have_child(&scoped, Some(&embedded_root)));
        assert!(leaf.can_have_child(&scoped, Some(&string)));
    }

    #[test]
    fn test_bisect_aligns_parts_with_cuts() {
        let m = token(10, "abcdef", "word");
        let parts = m.bisect_at_offsets(&[10, 12]);
        assert_eq!(parts.len(), 3);
        assert!(parts[0].is_none());
        assert_eq!(parts[1].as_ref().unwrap().value(), "ab");
        assert_eq!(parts[2].as_ref().unwrap().value(), "cdef");

        let m = token(10, "abcdef", "word");
        let parts = m.bisect_at_offsets(&[5, 12, 30]);
        assert!(parts[0].is_none());
        assert_eq!(parts[1].as_ref().unwrap().offset(), 10);
        assert_eq!(parts[2].as_ref().unwrap().end_offset(), 16);
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_bisect_preserves_text_and_children() {
        let mut tree = root("let a = 1; let b = 2;");
        for m in [
            token(0, "let", "keyword"),
            token(8, "1", "constant"),
            token(11, "let", "keyword"),
            token(19, "2", "constant"),
        ] {
            tree.insert_at_end(m).unwrap();
        }
        let original = spans(&tree);

        let parts = tree.bisect_at_offsets(&[4, 11, 15]);
        let fragments: Vec<Match> = parts.into_iter().flatten().collect();
        let text: String = fragments.iter().map(|f| f.value()).collect();
        assert_eq!(text, "let a = 1; let b = 2;");

        let redistributed: Vec<_> = fragments.iter().flat_map(spans).collect();
        assert_eq!(redistributed, original);
        assert!(fragments[..fragments.len() - 1].iter().all(Match::continues));
        assert!(!fragments.last().unwrap().continues());
    }

    #[test]
    fn test_bisect_splits_straddling_child() {
        let mut tree = root("ab\"cd\nef\"");
        tree.insert_at_end(token(2, "\"cd\nef\"", "string")).unwrap();

        let lines: Vec<Match> = tree.split(&Regex::new("\n").unwrap());
        assert_eq!(lines.len(), 2);
        assert_eq!(spans(&lines[0]), vec![(2, 4, "string".into())]);
        assert_eq!(spans(&lines[1]), vec![(6, 3, "string".into())]);
        assert!(lines[0].children()[0].continues());
        assert_eq!(lines[1].children()[0].value(), "ef\"");
    }

    #[test]
    fn test_bisect_snaps_to_char_boundary() {
        let m = token(0, "héllo", "word");
        // Byte 2 falls inside 'é'.
        let parts: Vec<_> = m.bisect_at_offsets(&[2]).into_iter().flatten().collect();
        assert_eq!(parts[0].value(), "h");
        assert_eq!(parts[1].value(), "éllo");
    }

    #[test]
    fn test_split_lines_reconstructs_text() {
        let text = "fn main() {\n    let x = \"a\nb\";\n\n}\n";
        let mut tree = root(text);
        tree.insert_at_end(token(0, "fn", "keyword")).unwrap();
        tree.insert_at_end(token(24, "\"a\nb\"", "string")).unwrap();

        let lines = tree.split_lines();
        assert_eq!(lines.len(), 5);

        let mut rebuilt = String::new();
        for line in &lines {
            leaves(line, &mut rebuilt);
        }
        assert_eq!(rebuilt, text);

        let kinds: Vec<_> = lines[1].children().iter().map(|c| c.kind().unwrap()).collect();
        assert_eq!(kinds, ["indent", "text"]);
        assert_eq!(lines[1].children()[0].value(), "    ");
        assert_eq!(lines[0].children()[0].kind(), Some("text"));
        assert_eq!(lines[0].kind(), Some("root"));
    }

    #[test]
    fn test_split_lines_empty_text() {
        assert!(root("").split_lines().is_empty());
    }

    #[test]
    fn test_reduce_interleaves_text() {
        let mut tree = root("if true");
        tree.insert_at_end(token(0, "if", "keyword")).unwrap();
        let node = tree.render();
        assert_eq!(node.class, "root");
        assert_eq!(node.children.len(), 2);
        match &node.children[0] {
            Fragment::Node(keyword) => {
                assert_eq!(keyword.class, "keyword");
                assert_eq!(keyword.text_content(), "if");
            }
            other => panic!("expected node, got {other:?}"),
        }
        assert_eq!(node.children[1], Fragment::Text(" true".into()));
    }

    #[test]
    fn test_reduce_process_replaces_container() {
        let mut tree = root("see http://x");
        tree.insert_at_end(token(4, "http://x", "href")).unwrap();
        let node = tree.reduce(&mut RenderNode::append, &mut |node, m: &Match| {
            if m.kind() == Some("href") {
                node.into_link(m.value())
            } else {
                node
            }
        });
        match &node.children[1] {
            Fragment::Node(link) => {
                assert_eq!(link.tag, "a");
                assert_eq!(link.attribute("href"), Some("http://x"));
            }
            other => panic!("expected link, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_whole_takes_over_children() {
        let mut tree = root("a b c d");
        for m in [token(0, "a", "x"), token(2, "b", "x"), token(4, "c", "x"), token(6, "d", "x")] {
            tree.insert_at_end(m).unwrap();
        }
        let region = Match::new(2, "b c", Arc::new(Expression::typed("region").allow(["x"])));
        tree.insert(region, true).unwrap();

        assert_eq!(
            spans(&tree),
            vec![(0, 1, "x".into()), (2, 3, "region".into()), (6, 1, "x".into())]
        );
        assert_eq!(
            spans(&tree.children()[1]),
            vec![(2, 1, "x".into()), (4, 1, "x".into())]
        );
    }

    #[test]
    fn test_insert_whole_descends_to_deepest_container() {
        let mut tree = root("(a b)");
        tree.insert_at_end(Match::new(
            0,
            "(a b)",
            Arc::new(Expression::typed("group").allow_all()),
        ))
        .unwrap();
        tree.insert(token(1, "a", "name"), true).unwrap();
        assert_eq!(tree.children().len(), 1);
        assert_eq!(spans(&tree.children()[0]), vec![(1, 1, "name".into())]);
    }

    #[test]
    fn test_insert_outside_range_is_rejected() {
        let mut tree = root("abc");
        assert!(tree.insert(token(2, "cd", "x"), true).is_err());
        assert!(tree.insert(token(5, "x", "x"), false).is_err());
    }

    #[test]
    fn test_shift_moves_subtree() {
        let mut tree = root("ab");
        tree.insert_at_end(token(1, "b", "x")).unwrap();
        tree.shift(10);
        assert_eq!(tree.offset(), 10);
        assert_eq!(tree.children()[0].offset(), 11);
    }

    #[test]
    fn test_order_longest_first() {
        let mut matches = vec![token(3, "a", "x"), token(0, "ab", "y"), token(0, "abcd", "z")];
        matches.sort_by(Match::order);
        let kinds: Vec<_> = matches.iter().map(|m| m.kind().unwrap()).collect();
        assert_eq!(kinds, ["z", "y", "x"]);
    }
}
