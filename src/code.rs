//! Compiled ABDL patterns.

use std::sync::Arc;

use itertools::Itertools;

use crate::defs::Defs;
use crate::pattern::{Matches, Op};
use crate::value::{Node, Value};

/// A pattern compiled against a definitions table.
///
/// Cheap to clone and safe to share between threads; every call to
/// [`matches`](Self::matches) walks with its own state.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: Arc<str>,
    ops: Arc<[Op]>,
    params: Vec<String>,
    defs: Defs,
}

impl CompiledPattern {
    pub(crate) fn new(source: &str, ops: Vec<Op>, defs: &Defs) -> Self {
        let mut names = Vec::new();
        for op in &ops {
            op.collect_params(&mut names);
        }
        let params: Vec<String> = names.into_iter().unique().map(str::to_string).collect();
        let defs = defs.subset(params.iter().map(String::as_str));
        Self {
            source: source.into(),
            ops: ops.into(),
            params,
            defs,
        }
    }

    /// Lazily match this pattern against `root`.
    pub fn matches<'a>(&self, root: &'a Value) -> Matches<'a> {
        Matches::new(Arc::clone(&self.ops), Node::Value(root))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The flat instruction sequence.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Every name the pattern refers to, first use first, without repeats.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The definitions of [`params`](Self::params).
    pub fn defs(&self) -> &Defs {
        &self.defs
    }
}
