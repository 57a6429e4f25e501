//! Backtracking matcher: walks a tree against a compiled instruction sequence.
//!
//! The matcher keeps an explicit stack of [`Holder`]s, one per open `->`
//! depth, and a program counter that steps forward through the instructions
//! and backward to backtrack. Each holder owns a lazily built iterator of
//! candidate `(key, value)` pairs. Running off the end of the instructions
//! is a complete match; the next pull resumes from the last `End`.
//!
//! Instructions run in one of two phases. Outside a key, `Arrow` opens a new
//! depth and a selector installs its candidates. Inside a key, filters
//! (regexes, type tests) wrap the candidates and `End` pulls the next one.

use std::iter::{self, FusedIterator};
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, trace};

use crate::container;
use crate::error::ValidationError;
use crate::predicate::Predicate;
use crate::value::{Node, Value};

use super::op::Op;

/// One match: capture names mapped to the `(key, value)` they selected.
pub type Bindings<'a> = IndexMap<Arc<str>, (Node<'a>, Node<'a>)>;

type Candidate<'a> = Result<Pair<'a>, ValidationError>;
type Candidates<'a> = Box<dyn Iterator<Item = Candidate<'a>> + 'a>;

/// Longest rendering of a key or value put into an error message.
const MAX_ERROR_VALUE_LEN: usize = 60;

/// A candidate selection. Subtree candidates carry the bindings of the
/// sub-pattern match that produced them.
struct Pair<'a> {
    key: Node<'a>,
    value: Node<'a>,
    nested: Option<Bindings<'a>>,
}

impl<'a> Pair<'a> {
    fn plain(key: Node<'a>, value: Node<'a>) -> Self {
        Self {
            key,
            value,
            nested: None,
        }
    }
}

/// One depth of the path being walked.
struct Holder<'a> {
    /// The node whose entries are the candidates.
    parent: Node<'a>,
    /// Built once, on first use; afterwards only wrapped by filters.
    candidates: Option<Candidates<'a>>,
    key: Option<Node<'a>>,
    value: Node<'a>,
    nested: Option<Bindings<'a>>,
    name: Option<Arc<str>>,
    subtree: bool,
    /// No selector has run for this depth yet.
    empty: bool,
}

impl<'a> Holder<'a> {
    fn root(value: Node<'a>) -> Self {
        Self {
            parent: value,
            candidates: Some(Box::new(iter::empty())),
            key: None,
            value,
            nested: None,
            name: None,
            subtree: false,
            empty: false,
        }
    }

    fn child(parent: Node<'a>) -> Self {
        Self {
            parent,
            candidates: None,
            key: None,
            value: parent,
            nested: None,
            name: None,
            subtree: false,
            empty: true,
        }
    }

    /// Set the candidate iterator. It can only be set once.
    fn install(&mut self, candidates: Candidates<'a>) {
        debug_assert!(self.candidates.is_none(), "candidates already set");
        self.candidates = Some(candidates);
        self.empty = false;
    }

    /// Wrap the candidate iterator, building the default container iterator
    /// first if nothing installed one. `skip_base` decides whether a parent
    /// that isn't a container is skipped or reported.
    fn refine(&mut self, skip_base: bool, wrap: impl FnOnce(Candidates<'a>) -> Candidates<'a>) {
        let base = match self.candidates.take() {
            Some(candidates) => candidates,
            None => container_pairs(self.parent, skip_base),
        };
        self.candidates = Some(wrap(base));
        self.empty = false;
    }

    fn advance(&mut self) -> Option<Candidate<'a>> {
        let parent = self.parent;
        self.candidates
            .get_or_insert_with(|| container_pairs(parent, false))
            .next()
    }

    fn select(&mut self, pair: Pair<'a>) {
        self.key = Some(pair.key);
        self.value = pair.value;
        self.nested = pair.nested;
    }
}

/// Program counter over an instruction sequence.
struct Frame {
    ops: Arc<[Op]>,
    pc: Option<usize>,
}

impl Frame {
    fn new(ops: Arc<[Op]>) -> Self {
        Self { ops, pc: None }
    }

    /// Step to the next instruction, returning its index. At the end the
    /// counter stays on the last instruction.
    fn advance(&mut self) -> Option<usize> {
        let next = self.pc.map_or(0, |pc| pc + 1);
        if next >= self.ops.len() {
            return None;
        }
        self.pc = Some(next);
        Some(next)
    }

    fn step_back(&mut self) -> bool {
        match self.pc {
            Some(pc) if pc > 0 => {
                self.pc = Some(pc - 1);
                true
            }
            _ => false,
        }
    }

    fn at_end_marker(&self) -> bool {
        self.pc.is_some_and(|pc| self.ops[pc].is_end())
    }
}

/// Lazy stream of matches of a pattern against one tree.
///
/// Yields a [`ValidationError`] at the point a validating element rejects a
/// candidate, possibly after other matches, and then stops.
pub struct Matches<'a> {
    frame: Frame,
    path: Vec<Holder<'a>>,
    in_key: bool,
    /// A match was just yielded; the next pull backtracks first.
    yielded: bool,
}

impl<'a> Matches<'a> {
    pub(crate) fn new(ops: Arc<[Op]>, root: Node<'a>) -> Self {
        Self {
            frame: Frame::new(ops),
            path: vec![Holder::root(root)],
            in_key: false,
            yielded: false,
        }
    }

    fn top(&self) -> &Holder<'a> {
        self.path.last().expect("path is non-empty while matching")
    }

    fn top_mut(&mut self) -> &mut Holder<'a> {
        self.path.last_mut().expect("path is non-empty while matching")
    }

    fn on_not_in_key(&mut self, op: &Op) -> Result<bool, ValidationError> {
        match op {
            Op::Arrow => {
                debug_assert!(!self.top().empty);
                let parent = self.top().value;
                self.path.push(Holder::child(parent));
                trace!(depth = self.path.len() - 1, "open depth");
                Ok(false)
            }
            Op::Ident(name) => {
                let top = self.top_mut();
                top.name = Some(Arc::clone(name));
                top.empty = false;
                Ok(true)
            }
            Op::StringKey { key, skippable } => {
                let top = self.top_mut();
                top.install(lookup(top.parent, &Value::from(key.as_str()), *skippable));
                Ok(true)
            }
            Op::Param { key, skippable, .. } => {
                let top = self.top_mut();
                top.install(lookup(top.parent, key, *skippable));
                Ok(true)
            }
            Op::RegexKey { regex, skippable } => {
                let skippable = *skippable;
                self.top_mut()
                    .refine(skippable, |c| filter_keys(c, regex.clone(), skippable));
                Ok(true)
            }
            Op::KeySubtree { ops, skippable } => {
                let skippable = *skippable;
                let top = self.top_mut();
                top.subtree = true;
                top.refine(skippable, |c| match_keys(c, Arc::clone(ops), skippable));
                Ok(true)
            }
            Op::ValueSubtree { ops, skippable } => {
                debug_assert!(!self.top().empty);
                let parent = self.top().value;
                let mut holder = Holder::child(parent);
                holder.subtree = true;
                holder.install(match_value(parent, Arc::clone(ops), *skippable));
                self.path.push(holder);
                trace!(depth = self.path.len() - 1, "open value subtree");
                Ok(true)
            }
            Op::Ty {
                name,
                predicate,
                skippable,
            } => self.test_root(name, &**predicate, *skippable),
            Op::End => unreachable!("End is only executed inside a key"),
        }
    }

    fn on_in_key(&mut self, op: &Op) -> Result<bool, ValidationError> {
        match op {
            Op::StringKey { .. } | Op::Param { .. } | Op::RegexKey { .. } | Op::KeySubtree { .. } => {
                self.on_not_in_key(op)
            }
            Op::Ty {
                name,
                predicate,
                skippable,
            } => {
                let skippable = *skippable;
                // A value test never excuses the depth's container shape.
                self.top_mut().refine(false, |c| {
                    filter_values(c, name.clone(), Arc::clone(predicate), skippable)
                });
                Ok(true)
            }
            Op::End => self.next_candidate(),
            Op::Arrow | Op::Ident(_) | Op::ValueSubtree { .. } => {
                unreachable!("{op:?} is never executed inside a key")
            }
        }
    }

    /// A type test before any arrow applies to the root value itself.
    fn test_root(
        &mut self,
        name: &str,
        predicate: &dyn Predicate,
        skippable: bool,
    ) -> Result<bool, ValidationError> {
        debug_assert_eq!(self.path.len(), 1);
        let root = self.top().value;
        if predicate.accepts(&root.to_value()) {
            Ok(false)
        } else if skippable {
            self.path.clear();
            Ok(false)
        } else {
            Err(rejected(name, root))
        }
    }

    /// `End`: select the next candidate at this depth, or backtrack.
    fn next_candidate(&mut self) -> Result<bool, ValidationError> {
        match self.top_mut().advance() {
            Some(Ok(pair)) => {
                self.top_mut().select(pair);
                Ok(false)
            }
            Some(Err(err)) => Err(err),
            None => {
                self.backtrack();
                Ok(true)
            }
        }
    }

    /// Drop the exhausted depth and rewind to just before the previous `End`,
    /// so that it runs again and pulls that depth's next candidate.
    fn backtrack(&mut self) {
        self.path.pop();
        trace!(depth = self.path.len(), "backtrack");
        while self.frame.step_back() && !self.frame.at_end_marker() {}
        if !self.frame.step_back() {
            // Nothing left to backtrack into.
            self.path.clear();
        }
    }

    /// Continue after a yielded match by re-running the final `End`.
    fn resume(&mut self) {
        if self.frame.at_end_marker() {
            self.frame.step_back();
            self.in_key = true;
        } else {
            // Patterns without any `End` match at most once.
            self.path.clear();
        }
    }

    fn bindings(&self) -> Bindings<'a> {
        let mut out = Bindings::new();
        for holder in &self.path {
            if holder.subtree
                && let Some(nested) = &holder.nested
            {
                for (name, kv) in nested {
                    out.insert(Arc::clone(name), *kv);
                }
            }
            if let (Some(name), Some(key)) = (&holder.name, holder.key) {
                out.insert(Arc::clone(name), (key, holder.value));
            }
        }
        out
    }
}

impl<'a> Iterator for Matches<'a> {
    type Item = Result<Bindings<'a>, ValidationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if std::mem::take(&mut self.yielded) {
            self.resume();
        }
        let ops = Arc::clone(&self.frame.ops);
        while !self.path.is_empty() {
            let Some(pc) = self.frame.advance() else {
                debug_assert!(!self.top().empty);
                self.yielded = true;
                return Some(Ok(self.bindings()));
            };
            let op = &ops[pc];
            let step = if self.in_key {
                self.on_in_key(op)
            } else {
                self.on_not_in_key(op)
            };
            match step {
                Ok(in_key) => self.in_key = in_key,
                Err(err) => {
                    debug!(%err, "validation failed");
                    self.path.clear();
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

impl FusedIterator for Matches<'_> {}

/// The default candidates of a depth: every entry of the parent container.
fn container_pairs(node: Node<'_>, skippable: bool) -> Candidates<'_> {
    match container::pairs(node) {
        Ok(pairs) => Box::new(pairs.map(|(key, value)| Ok(Pair::plain(key, value)))),
        Err(_) if skippable => Box::new(iter::empty()),
        Err(err) => Box::new(iter::once(Err(err))),
    }
}

/// Candidates of a literal or parameter key: the one indexed entry.
fn lookup<'a>(parent: Node<'a>, key: &Value, skippable: bool) -> Candidates<'a> {
    match container::index(parent, key) {
        Some((key, value)) => Box::new(iter::once(Ok(Pair::plain(key, value)))),
        None if skippable => Box::new(iter::empty()),
        None => Box::new(iter::once(Err(ValidationError::MissingKey {
            key: key.to_string(),
        }))),
    }
}

fn filter_keys(candidates: Candidates<'_>, regex: Regex, skippable: bool) -> Candidates<'_> {
    Box::new(candidates.filter_map(move |item| {
        let pair = match item {
            Ok(pair) => pair,
            Err(err) => return Some(Err(err)),
        };
        if pair.key.to_value().as_str().is_some_and(|key| regex.is_match(key)) {
            Some(Ok(pair))
        } else if skippable {
            None
        } else {
            Some(Err(ValidationError::KeyMismatch {
                key: abbreviate(pair.key),
                regex: regex.as_str().to_string(),
            }))
        }
    }))
}

fn filter_values(
    candidates: Candidates<'_>,
    name: String,
    predicate: Arc<dyn Predicate>,
    skippable: bool,
) -> Candidates<'_> {
    Box::new(candidates.filter_map(move |item| {
        let pair = match item {
            Ok(pair) => pair,
            Err(err) => return Some(Err(err)),
        };
        if predicate.accepts(&pair.value.to_value()) {
            Some(Ok(pair))
        } else if skippable {
            None
        } else {
            Some(Err(rejected(&name, pair.value)))
        }
    }))
}

/// Replace each candidate by one candidate per match of `ops` against its
/// key. A skippable key subtree drops a candidate whose key fails to validate.
fn match_keys<'a>(candidates: Candidates<'a>, ops: Arc<[Op]>, skippable: bool) -> Candidates<'a> {
    Box::new(candidates.flat_map(move |item| -> Candidates<'a> {
        let Pair { key, value, .. } = match item {
            Ok(pair) => pair,
            Err(err) => return Box::new(iter::once(Err(err))),
        };
        let results = Matches::new(Arc::clone(&ops), key).map(move |result| {
            result.map(|bindings| Pair {
                key,
                value,
                nested: Some(bindings),
            })
        });
        if skippable {
            Box::new(results.map_while(Result::ok).map(Ok::<_, ValidationError>))
        } else {
            Box::new(results)
        }
    }))
}

/// One candidate per match of `ops` against `parent` itself.
fn match_value<'a>(parent: Node<'a>, ops: Arc<[Op]>, skippable: bool) -> Candidates<'a> {
    let results = Matches::new(ops, parent).map(move |result| {
        result.map(|bindings| Pair {
            key: parent,
            value: parent,
            nested: Some(bindings),
        })
    });
    if skippable {
        Box::new(Optional {
            inner: results,
            parent,
            produced: false,
            done: false,
        })
    } else {
        Box::new(results)
    }
}

/// Candidates of an optional (`?`) value subtree: the sub-pattern's matches
/// up to the first validation error, or one empty match if there were none.
struct Optional<'a, I> {
    inner: I,
    parent: Node<'a>,
    produced: bool,
    done: bool,
}

impl<'a, I> Iterator for Optional<'a, I>
where
    I: Iterator<Item = Candidate<'a>>,
{
    type Item = Candidate<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(pair)) => {
                self.produced = true;
                Some(Ok(pair))
            }
            Some(Err(_)) | None => {
                self.done = true;
                (!self.produced).then(|| {
                    Ok(Pair {
                        key: self.parent,
                        value: self.parent,
                        nested: Some(Bindings::new()),
                    })
                })
            }
        }
    }
}

fn rejected(name: &str, value: Node<'_>) -> ValidationError {
    ValidationError::Rejected {
        name: name.to_string(),
        value: abbreviate(value),
    }
}

fn abbreviate(node: Node<'_>) -> String {
    let text = node.to_string();
    if text.chars().count() <= MAX_ERROR_VALUE_LEN {
        text
    } else {
        let head: String = text.chars().take(MAX_ERROR_VALUE_LEN).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests;
