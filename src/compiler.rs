//! Entry points: compile a pattern, or compile and match in one go.

use tracing::debug;

use crate::code::CompiledPattern;
use crate::defs::Defs;
use crate::error::PatternError;
use crate::pattern::{Matches, parse};
use crate::value::Value;

/// Compile an ABDL pattern, resolving every `$name` against `defs`.
pub fn compile(pattern: &str, defs: &Defs) -> Result<CompiledPattern, PatternError> {
    let ops = parse(pattern, defs)?;
    let compiled = CompiledPattern::new(pattern, ops, defs);
    debug!(
        pattern,
        ops = compiled.ops().len(),
        params = ?compiled.params(),
        "compiled pattern"
    );
    Ok(compiled)
}

/// Compile `pattern` and match it against `root`.
///
/// ```rust
/// use abdl::{Defs, Kind, Value, match_tree};
///
/// let tree = Value::map([("foo", Value::Int(1)), ("bar", Value::map([("baz", 2)]))]);
/// let defs = Defs::new().with_kind("dict", Kind::Map);
/// let found: Vec<_> = match_tree("->X:?$dict->Y", &tree, &defs)?
///     .collect::<Result<_, _>>()?;
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0]["Y"].0, Value::from("baz"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn match_tree<'a>(pattern: &str, root: &'a Value, defs: &Defs) -> Result<Matches<'a>, PatternError> {
    Ok(compile(pattern, defs)?.matches(root))
}
