//! Definitions table: the names a pattern's `$param` keys and `:$type`
//! tests refer to.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::predicate::{Kind, Predicate};
use crate::value::Value;

/// A single named definition.
#[derive(Clone)]
pub enum Def {
    /// A key value, used by `$name` parameters.
    Key(Value),
    /// A predicate, used by `:$name` type tests.
    Predicate(Arc<dyn Predicate>),
}

impl fmt::Debug for Def {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Def::Key(v) => write!(f, "Key({v})"),
            Def::Predicate(p) => write!(f, "Predicate({p:?})"),
        }
    }
}

/// Caller-supplied name → definition table.
///
/// ```rust
/// use abdl::{Defs, Kind, Uri};
///
/// let defs = Defs::new()
///     .with_kind("dict", Kind::Map)
///     .with_key("branch", "HEAD")
///     .with_predicate("uri", Uri::default());
/// assert_eq!(defs.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Defs {
    entries: IndexMap<String, Def>,
}

impl Defs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table defining every built-in kind name (`dict`, `list`, `str`, ...).
    pub fn builtin_kinds() -> Self {
        let mut defs = Self::new();
        for (name, kind) in Kind::names() {
            defs.insert(name, Def::Predicate(Arc::new(kind)));
        }
        defs
    }

    pub fn with_key(mut self, name: impl Into<String>, key: impl Into<Value>) -> Self {
        self.insert(name, Def::Key(key.into()));
        self
    }

    pub fn with_predicate(mut self, name: impl Into<String>, predicate: impl Predicate + 'static) -> Self {
        self.insert(name, Def::Predicate(Arc::new(predicate)));
        self
    }

    pub fn with_kind(self, name: impl Into<String>, kind: Kind) -> Self {
        self.with_predicate(name, kind)
    }

    /// Insert or replace a definition.
    pub fn insert(&mut self, name: impl Into<String>, def: Def) {
        self.entries.insert(name.into(), def);
    }

    pub fn get(&self, name: &str) -> Option<&Def> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The subset of this table named by `names`, in that order.
    pub(crate) fn subset<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> Defs {
        let entries = names
            .into_iter()
            .filter_map(|name| self.entries.get(name).map(|def| (name.to_string(), def.clone())))
            .collect();
        Defs { entries }
    }
}

impl<N: Into<String>> FromIterator<(N, Def)> for Defs {
    fn from_iter<I: IntoIterator<Item = (N, Def)>>(iter: I) -> Self {
        Defs {
            entries: iter.into_iter().map(|(n, d)| (n.into(), d)).collect(),
        }
    }
}
