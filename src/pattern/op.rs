//! Pattern elements: the instructions a compiled pattern is made of.

use std::sync::Arc;

use regex::Regex;

use crate::predicate::Predicate;
use crate::value::Value;

/// One instruction of a compiled pattern.
///
/// Every `Arrow` segment and every `ValueSubtree` group is closed by an
/// `End`, which is also where the matcher pulls candidates and backtracks.
#[derive(Debug, Clone)]
pub enum Op {
    /// `->`: start iterating/indexing the current value.
    Arrow,
    /// `name`: capture the selected `(key, value)` under `name`.
    Ident(Arc<str>),
    /// `'key'`: index with a string key.
    StringKey { key: String, skippable: bool },
    /// `/re/`: keep keys that are strings matching `regex`.
    RegexKey { regex: Regex, skippable: bool },
    /// `$name`: index with an externally defined key.
    Param {
        name: String,
        key: Value,
        skippable: bool,
    },
    /// `:$name`: keep values accepted by an externally defined predicate.
    Ty {
        name: String,
        predicate: Arc<dyn Predicate>,
        skippable: bool,
    },
    /// `[...]`: match a sub-pattern against each candidate's key.
    KeySubtree { ops: Arc<[Op]>, skippable: bool },
    /// `(...)`: match a sub-pattern against the current value.
    ValueSubtree { ops: Arc<[Op]>, skippable: bool },
    End,
}

impl Op {
    /// Append the names this instruction refers to, recursing into subtrees.
    pub(crate) fn collect_params<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Op::Param { name, .. } | Op::Ty { name, .. } => out.push(name),
            Op::KeySubtree { ops, .. } | Op::ValueSubtree { ops, .. } => {
                for op in ops.iter() {
                    op.collect_params(out);
                }
            }
            _ => {}
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Op::End)
    }

    pub fn is_skippable(&self) -> bool {
        match self {
            Op::StringKey { skippable, .. }
            | Op::RegexKey { skippable, .. }
            | Op::Param { skippable, .. }
            | Op::Ty { skippable, .. }
            | Op::KeySubtree { skippable, .. }
            | Op::ValueSubtree { skippable, .. } => *skippable,
            Op::Arrow | Op::Ident(_) | Op::End => false,
        }
    }
}
