use super::*;
use crate::compiler::compile;
use crate::defs::Defs;
use crate::predicate::{AnyOf, CommitHash, Kind, Uri};

/// One match, owned: `(name, key, value)` in binding order.
type Row = Vec<(String, Value, Value)>;

fn row_of(bindings: Bindings<'_>) -> Row {
    bindings
        .into_iter()
        .map(|(name, (key, value))| {
            (
                name.to_string(),
                key.to_value().into_owned(),
                value.to_value().into_owned(),
            )
        })
        .collect()
}

/// Every result of matching `pattern` against `root`; `None` marks an error.
fn run(pattern: &str, root: &Value, defs: &Defs) -> Vec<Option<Row>> {
    let compiled = compile(pattern, defs).unwrap();
    compiled
        .matches(root)
        .map(|result| result.ok().map(row_of))
        .collect()
}

fn entry(name: &str, key: impl Into<Value>, value: impl Into<Value>) -> (String, Value, Value) {
    (name.to_string(), key.into(), value.into())
}

/// Reference enumeration of `->N0->N1...` built from the container adapter.
fn walk(node: Node<'_>, names: &[&str], row: &mut Row, out: &mut Vec<Option<Row>>) -> bool {
    let Some((name, rest)) = names.split_first() else {
        out.push(Some(row.clone()));
        return true;
    };
    let Ok(pairs) = container::pairs(node) else {
        out.push(None);
        return false;
    };
    for (key, value) in pairs {
        row.push(entry(name, key.to_value().into_owned(), value.to_value().into_owned()));
        let more = walk(value, rest, row, out);
        row.pop();
        if !more {
            return false;
        }
    }
    true
}

fn reference(root: &Value, names: &[&str]) -> Vec<Option<Row>> {
    let mut out = Vec::new();
    walk(Node::Value(root), names, &mut Vec::new(), &mut out);
    out
}

fn arrows(names: &[&str]) -> String {
    names.iter().map(|name| format!("->{name}")).collect()
}

fn level(depth: usize) -> Value {
    if depth == 0 {
        return Value::Int(0);
    }
    let child = level(depth - 1);
    match depth % 3 {
        0 => Value::map([("a", child.clone()), ("b", child)]),
        1 => Value::seq([child.clone(), child]),
        _ => Value::map([("x", child), ("y", Value::seq(Vec::<Value>::new()))]),
    }
}

fn sample() -> Value {
    Value::map([("foo", Value::Int(1)), ("bar", Value::map([("baz", 2)]))])
}

fn dict_defs() -> Defs {
    Defs::new().with_kind("dict", Kind::Map)
}

// --- Walking ---

#[test]
fn test_depth_one_matches_container_pairs() {
    let trees = [
        Value::map([("a", 1), ("b", 2), ("c", 3)]),
        Value::seq(["x", "y"]),
        Value::set(["p", "q", "r"]),
        Value::map(Vec::<(Value, Value)>::new()),
        Value::Int(5),
        Value::from("abc"),
        Value::from(""),
    ];
    for tree in &trees {
        assert_eq!(run("->X", tree, &Defs::new()), reference(tree, &["X"]), "{tree}");
    }
}

#[test]
fn test_depth_composition() {
    let nested_set = Value::map([(
        "s",
        Value::set([
            Value::seq([Value::seq([1, 2])]),
            Value::seq([Value::map([("m", 3)])]),
        ]),
    )]);
    let strings = Value::map([("w", Value::seq(["ab", "c"]))]);
    let trees = [level(4), level(5), nested_set, strings];
    let names = ["A", "B", "C", "D"];
    for tree in &trees {
        for depth in 1..=names.len() {
            let names = &names[..depth];
            let expected = reference(tree, names);
            assert_eq!(run(&arrows(names), tree, &Defs::new()), expected, "{tree}");
        }
    }
    assert_eq!(run("->A->B->C->D", &level(4), &Defs::new()).len(), 8);
}

#[test]
fn test_depth_two_stops_at_scalar() {
    let tree = Value::map([("bar", Value::map([("baz", 2)])), ("foo", Value::Int(1))]);
    let got = run("->X->Y", &tree, &Defs::new());
    assert_eq!(got, reference(&tree, &["X", "Y"]));
    assert_eq!(
        got,
        vec![
            Some(vec![
                entry("X", "bar", Value::map([("baz", 2)])),
                entry("Y", "baz", 2)
            ]),
            None,
        ]
    );
}

#[test]
fn test_strings_iterate_as_characters() {
    let word = Value::from("ab");
    assert_eq!(
        run("->X", &word, &Defs::new()),
        vec![Some(vec![entry("X", 0, "a")]), Some(vec![entry("X", 1, "b")])]
    );
    // A character is a one-character string, so it iterates as itself.
    assert_eq!(
        run("->X->Y", &word, &Defs::new()),
        vec![
            Some(vec![entry("X", 0, "a"), entry("Y", 0, "a")]),
            Some(vec![entry("X", 1, "b"), entry("Y", 0, "b")]),
        ]
    );
    let defs = Defs::new().with_key("second", 1).with_key("last", -1);
    let tree = Value::map([("w", "xyz")]);
    assert_eq!(
        run("->'w'->C$second", &tree, &defs),
        vec![Some(vec![entry("C", 1, "y")])]
    );
    assert_eq!(
        run("->'w'->C$last->D", &tree, &defs),
        vec![Some(vec![entry("C", 2, "z"), entry("D", 0, "z")])]
    );
}

// --- Selectors ---

#[test]
fn test_regex_validating_yields_then_fails() {
    let tree = Value::map([("ab", 1), ("ac", 2), ("b", 3), ("ad", 4)]);
    assert_eq!(
        run("->/^a/", &tree, &Defs::new()),
        vec![Some(vec![]), Some(vec![]), None]
    );
    let mixed = Value::set([Value::Int(1), Value::from("ab")]);
    assert_eq!(run("->/^a/", &mixed, &Defs::new()), vec![None]);
}

#[test]
fn test_regex_skippable_omits() {
    let tree = Value::map([("ab", 1), ("ac", 2), ("b", 3), ("ad", 4)]);
    assert_eq!(
        run("->K/^a/?", &tree, &Defs::new()),
        vec![
            Some(vec![entry("K", "ab", 1)]),
            Some(vec![entry("K", "ac", 2)]),
            Some(vec![entry("K", "ad", 4)]),
        ]
    );
    let mixed = Value::set([Value::Int(1), Value::from("ab")]);
    assert_eq!(run("->/^a/?", &mixed, &Defs::new()), vec![Some(vec![])]);
}

#[test]
fn test_regex_never_matches_indices() {
    let tree = Value::seq(["a", "b"]);
    assert_eq!(run("->/0/?", &tree, &Defs::new()), vec![]);
    assert_eq!(run("->/0/", &tree, &Defs::new()), vec![None]);
}

#[test]
fn test_empty_literal() {
    let tree = Value::map([
        ("", Value::map([("p", 1), ("q", 2)])),
        ("x", Value::map([("r", 3)])),
    ]);
    assert_eq!(
        run("->''?->Y", &tree, &Defs::new()),
        vec![Some(vec![entry("Y", "p", 1)]), Some(vec![entry("Y", "q", 2)])]
    );
    let without = Value::map([("x", Value::map([("r", 3)]))]);
    assert_eq!(run("->''?->Y", &without, &Defs::new()), vec![]);
    assert_eq!(run("->''?->Y", &Value::Int(3), &Defs::new()), vec![]);
}

#[test]
fn test_literal_missing_key() {
    let tree = Value::map([("a", 1)]);
    assert_eq!(run("->X'a'", &tree, &Defs::new()), vec![Some(vec![entry("X", "a", 1)])]);
    assert_eq!(run("->X'b'", &tree, &Defs::new()), vec![None]);
    assert_eq!(run("->X'b'?", &tree, &Defs::new()), vec![]);
}

#[test]
fn test_literal_on_set_is_a_miss() {
    let tree = Value::set(["a"]);
    assert_eq!(run("->X'a'", &tree, &Defs::new()), vec![None]);
    assert_eq!(run("->X'a'?", &tree, &Defs::new()), vec![]);
}

#[test]
fn test_param_indexes_sequences() {
    let tree = Value::seq(["a", "b", "c"]);
    let defs = Defs::new()
        .with_key("second", 1)
        .with_key("last", -1)
        .with_key("far", 10);
    assert_eq!(run("->X$second", &tree, &defs), vec![Some(vec![entry("X", 1, "b")])]);
    assert_eq!(run("->X$last", &tree, &defs), vec![Some(vec![entry("X", 2, "c")])]);
    assert_eq!(run("->X$far", &tree, &defs), vec![None]);
    assert_eq!(run("->X$far?", &tree, &defs), vec![]);
    assert_eq!(run("->X$?far", &tree, &defs), vec![]);
}

#[test]
fn test_param_indexes_mappings() {
    let tree = Value::map([(Value::Int(7), Value::from("seven")), (Value::from("7"), Value::from("str"))]);
    let defs = Defs::new().with_key("n", 7).with_key("s", "7");
    assert_eq!(run("->X$n", &tree, &defs), vec![Some(vec![entry("X", 7, "seven")])]);
    assert_eq!(run("->X$s", &tree, &defs), vec![Some(vec![entry("X", "7", "str")])]);
}

// --- Type tests ---

#[test]
fn test_scenario_dict_then_any() {
    assert_eq!(
        run("->X:?$dict->Y", &sample(), &dict_defs()),
        vec![Some(vec![
            entry("X", "bar", Value::map([("baz", 2)])),
            entry("Y", "baz", 2)
        ])]
    );
}

#[test]
fn test_whitespace_and_newlines_between_tokens() {
    assert_eq!(
        run("-> X :?$dict\n  -> Y", &sample(), &dict_defs()),
        run("->X:?$dict->Y", &sample(), &dict_defs())
    );
}

#[test]
fn test_type_narrowing_is_conjunctive() {
    let defs = Defs::new()
        .with_predicate("a", AnyOf(vec![Kind::Map, Kind::Seq, Kind::Set]))
        .with_predicate("b", AnyOf(vec![Kind::Map, Kind::Set]))
        .with_kind("c", Kind::Map);
    let tree = Value::map([
        ("m", Value::map([("k", 1)])),
        ("l", Value::seq([1])),
        ("s", Value::set(["e"])),
        ("n", Value::Int(5)),
    ]);
    assert_eq!(
        run("->X:?$a:?$b:?$c->Y", &tree, &defs),
        vec![Some(vec![entry("X", "m", Value::map([("k", 1)])), entry("Y", "k", 1)])]
    );
    assert_eq!(
        run("->X:$a->Y", &tree, &defs),
        vec![
            Some(vec![entry("X", "m", Value::map([("k", 1)])), entry("Y", "k", 1)]),
            Some(vec![entry("X", "l", Value::seq([1])), entry("Y", 0, 1)]),
            Some(vec![entry("X", "s", Value::set(["e"])), entry("Y", "e", "e")]),
            None,
        ]
    );
}

#[test]
fn test_skippable_type_test_keeps_container_check() {
    let defs = Defs::builtin_kinds();
    let tree = Value::map([("a", 1)]);
    for pattern in ["->X->Y", "->X->Y:?$int", "->X->Y:?$str:$int", "->X->Y:$int:?$str"] {
        assert_eq!(run(pattern, &tree, &defs), vec![None], "{pattern}");
    }
    let err = compile("->X->Y:?$int", &defs)
        .unwrap()
        .matches(&tree)
        .find_map(Result::err);
    assert_eq!(err, Some(ValidationError::NotAContainer { found: "int".into() }));
    // A skippable selector still skips a parent that isn't a container.
    assert_eq!(run("->X->Y/a/?:?$int", &tree, &defs), vec![]);
}

#[test]
fn test_closure_predicate() {
    let defs = Defs::new().with_predicate("even", |v: &Value| v.as_int().is_some_and(|n| n % 2 == 0));
    let tree = Value::seq([1, 2, 3, 4]);
    assert_eq!(
        run("->X:?$even", &tree, &defs),
        vec![Some(vec![entry("X", 1, 2)]), Some(vec![entry("X", 3, 4)])]
    );
}

#[test]
fn test_root_type_tests() {
    let defs = dict_defs();
    let seq = Value::seq([Value::map([("k", 1)])]);
    assert_eq!(run(":$dict->X", &seq, &defs), vec![None]);
    assert_eq!(run(":?$dict->X", &seq, &defs), vec![]);
    assert_eq!(
        run(":?$dict->X", &sample(), &defs),
        reference(&sample(), &["X"])
    );
}

#[test]
fn test_patterns_without_end_match_once() {
    let defs = dict_defs();
    assert_eq!(run("", &sample(), &defs), vec![Some(vec![])]);
    assert_eq!(run(":$dict", &sample(), &defs), vec![Some(vec![])]);
    assert_eq!(run(":$dict", &Value::Int(1), &defs), vec![None]);
    assert_eq!(run(":?$dict", &Value::Int(1), &defs), vec![]);
}

// --- Subtrees ---

#[test]
fn test_key_subtree_matches_keys() {
    let defs = Defs::new().with_kind("sets", Kind::Set);
    let tree = Value::map([
        (Value::set(["a", "b"]), Value::map([("d1", 1)])),
        (Value::from("plain"), Value::map([("d2", 2)])),
    ]);
    assert_eq!(
        run("->[:?$sets->A]->D", &tree, &defs),
        vec![
            Some(vec![entry("A", "a", "a"), entry("D", "d1", 1)]),
            Some(vec![entry("A", "b", "b"), entry("D", "d1", 1)]),
        ]
    );
}

#[test]
fn test_key_subtree_validation() {
    let tree = Value::map([(Value::Int(1), Value::Int(1))]);
    assert_eq!(run("->[->A]", &tree, &Defs::new()), vec![None]);
    assert_eq!(run("->[->A]?", &tree, &Defs::new()), vec![]);
}

#[test]
fn test_named_key_subtree_keeps_capture() {
    let defs = Defs::builtin_kinds().with_predicate("commit", CommitHash::default());
    let hash = "385e734a52e13949a7a5c71827f6de920dbfea43";
    let tree = Value::map([(hash, 1), ("HEAD", 2)]);
    assert_eq!(
        run("->commit[:?$str:?$commit]", &tree, &defs),
        vec![Some(vec![entry("commit", hash, 1)])]
    );
}

#[test]
fn test_project_config() {
    let hash = "385e734a52e13949a7a5c71827f6de920dbfea43";
    let repo = "https://soniex2.autistic.space/git-repos/ganarchy.git";
    let tree = Value::map([(
        "projects",
        Value::map([
            (
                hash,
                Value::map([(
                    repo,
                    Value::map([
                        ("HEAD", Value::map([("active", true)])),
                        ("dev", Value::map([("active", false), ("federate", true)])),
                        ("stale", Value::map([("federate", false)])),
                    ]),
                )]),
            ),
            (
                "not-a-commit",
                Value::map([("https://example.org/", Value::map([("HEAD", Value::map([("active", true)]))]))]),
            ),
            (
                "385e734a52e13949a7a5c71827f6de920dbfea44",
                Value::map([("http://insecure.example/", Value::map([("HEAD", Value::map([("active", true)]))]))]),
            ),
        ]),
    )]);
    let defs = Defs::builtin_kinds()
        .with_predicate("commit", CommitHash::default())
        .with_predicate("uri", Uri::default());
    let pattern = "
        ->'projects':$dict
          ->commit[:?$str:?$commit]:?$dict
            ->url[:?$str:?$uri]:?$dict
              ->branch:?$dict
                (->active'active'?:?$bool)
                (->federate'federate'?:?$bool)?";

    let compiled = compile(pattern, &defs).unwrap();
    let results: Vec<_> = compiled
        .matches(&tree)
        .map(|result| {
            let bindings = result.unwrap();
            let keys: Vec<(String, String)> = bindings
                .iter()
                .map(|(name, (key, _))| (name.to_string(), key.to_string()))
                .collect();
            let active = bindings["active"].1.to_value().into_owned();
            let federate = bindings.get("federate").map(|(_, v)| v.to_value().into_owned());
            (keys, active, federate)
        })
        .collect();

    let quoted = |s: &str| format!("{s:?}");
    let keys = |branch: &str, federate: bool| {
        let mut keys = vec![
            ("commit".to_string(), quoted(hash)),
            ("url".to_string(), quoted(repo)),
            ("branch".to_string(), quoted(branch)),
            ("active".to_string(), quoted("active")),
        ];
        if federate {
            keys.push(("federate".to_string(), quoted("federate")));
        }
        keys
    };
    assert_eq!(
        results,
        vec![
            (keys("HEAD", false), Value::Bool(true), None),
            (keys("dev", true), Value::Bool(false), Some(Value::Bool(true))),
        ]
    );
}

#[test]
fn test_value_subtrees_are_independent() {
    let tree = Value::map([("a", 1), ("b", 2)]);
    assert_eq!(
        run("(->A'a')(->B'b')", &tree, &Defs::new()),
        vec![Some(vec![entry("A", "a", 1), entry("B", "b", 2)])]
    );
    let partial = Value::map([("a", 1)]);
    assert_eq!(run("(->A'a')(->B'b')", &partial, &Defs::new()), vec![None]);
    assert_eq!(
        run("(->A'a')(->B'b')?", &partial, &Defs::new()),
        vec![Some(vec![entry("A", "a", 1)])]
    );
}

#[test]
fn test_value_subtree_multiplies_results() {
    let tree = Value::map([("k", Value::seq([1, 2]))]);
    assert_eq!(
        run("->K(->I)", &tree, &Defs::new()),
        vec![
            Some(vec![entry("K", "k", Value::seq([1, 2])), entry("I", 0, 1)]),
            Some(vec![entry("K", "k", Value::seq([1, 2])), entry("I", 1, 2)]),
        ]
    );
}

#[test]
fn test_flattening_last_write_wins() {
    let tree = Value::map([("k", Value::map([("b", 1)]))]);
    assert_eq!(
        run("->X(->X'b')", &tree, &Defs::new()),
        vec![Some(vec![entry("X", "b", 1)])]
    );
    // A holder's own capture is written after its key subtree's bindings.
    let keyed = Value::map([(Value::set(["s"]), Value::Int(1))]);
    assert_eq!(
        run("->K[->K]", &keyed, &Defs::new()),
        vec![Some(vec![entry("K", Value::set(["s"]), 1)])]
    );
}

// --- Iteration ---

#[test]
fn test_fused_after_error() {
    let tree = Value::map([("ab", 1), ("b", 2), ("ac", 3)]);
    let compiled = compile("->/^a/", &Defs::new()).unwrap();
    let mut matches = compiled.matches(&tree);
    assert!(matches!(matches.next(), Some(Ok(_))));
    assert!(matches!(
        matches.next(),
        Some(Err(ValidationError::KeyMismatch { ref key, .. })) if key == "\"b\""
    ));
    assert!(matches.next().is_none());
    assert!(matches.next().is_none());
}

#[test]
fn test_error_kinds() {
    let defs = dict_defs();
    let first = |pattern: &str, tree: &Value| {
        compile(pattern, &defs)
            .unwrap()
            .matches(tree)
            .find_map(Result::err)
            .unwrap()
    };
    assert_eq!(
        first("->X->Y", &Value::map([("a", 1)])),
        ValidationError::NotAContainer { found: "int".into() }
    );
    assert_eq!(
        first("->X'b'", &Value::map([("a", 1)])),
        ValidationError::MissingKey { key: "\"b\"".into() }
    );
    assert_eq!(
        first("->X:$dict", &Value::map([("a", 1)])),
        ValidationError::Rejected {
            name: "dict".into(),
            value: "1".into()
        }
    );
}

#[test]
fn test_lazy_first_result() {
    let compiled = compile("->X->Y", &Defs::new()).unwrap();
    let tree = Value::map([("x", Value::map([("y", 1)])), ("z", Value::Int(0))]);
    // The first pull never reaches the scalar under "z".
    let first = compiled.matches(&tree).next().unwrap().unwrap();
    assert_eq!(row_of(first), vec![entry("X", "x", Value::map([("y", 1)])), entry("Y", "y", 1)]);
    let all: Vec<_> = compiled.matches(&tree).collect();
    assert_eq!(all.len(), 2);
    assert!(all[1].is_err());
}

#[test]
fn test_shared_across_threads() {
    let compiled = compile("->X:?$dict->Y", &dict_defs()).unwrap();
    let trees: Vec<Value> = (0..4)
        .map(|n| Value::map([("k", Value::seq(0..n))]))
        .map(|inner| Value::map([("outer", inner), ("skip", Value::Int(0))]))
        .collect();
    let compiled = &compiled;
    std::thread::scope(|scope| {
        let handles: Vec<_> = trees
            .iter()
            .map(|tree| scope.spawn(move || compiled.matches(tree).filter(Result::is_ok).count()))
            .collect();
        let counts: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(counts, vec![1, 1, 1, 1]);
    });
}
