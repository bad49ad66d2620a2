//! The k-path covering over the calculator grammar covers every enumerated
//! path, including the context-sensitive ones under `let`.

use photesthesis_conformance::{expr_grammar, sym};
use photesthesis_corpus::ParamSpecs;
use photesthesis_grammar::{Atom, AtomPtr};
use photesthesis_value::{head_symbol, Value};

fn specs() -> ParamSpecs {
    let mut specs = ParamSpecs::new();
    specs.insert(sym("n"), sym("expr"));
    specs
}

/// Does `path` match the derivation tree of `value` starting at its root?
/// Refs match list nodes headed by their rule name; a terminal literal
/// matches an equal child.
fn path_matches_at(value: &Value, path: &[AtomPtr]) -> bool {
    let Some((first, rest)) = path.split_first() else {
        return true;
    };
    let Some(r) = first.as_rule_ref() else {
        return false;
    };
    if head_symbol(value).as_ref() != Some(r.rule()) {
        return false;
    }
    let Some(next) = rest.first() else {
        return true;
    };
    for child in value.iter_list().skip(1) {
        let hit = match next.as_ref() {
            Atom::Lit(v) => rest.len() == 1 && child == v,
            Atom::Ref(_) => path_matches_at(child, rest),
        };
        if hit {
            return true;
        }
    }
    false
}

fn covered_somewhere(value: &Value, path: &[AtomPtr]) -> bool {
    if path_matches_at(value, path) {
        return true;
    }
    value
        .iter_list()
        .skip(1)
        .any(|child| covered_somewhere(child, path))
}

fn assert_covering_at(k: usize) {
    let g = expr_grammar();
    let specs = specs();
    let paths = g.generate_k_path_set(k, &sym("expr"), &specs).unwrap();
    assert!(!paths.is_empty());
    let values = g.k_path_covering(&sym("expr"), k, &specs).unwrap();
    assert!(!values.is_empty());
    for path in &paths {
        assert!(
            values.iter().any(|v| covered_somewhere(v, path)),
            "uncovered {}-path; covering was {:?}",
            k,
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_k2_covering_covers_every_path() {
    assert_covering_at(2);
}

#[test]
fn test_k3_covering_covers_every_path() {
    assert_covering_at(3);
}

#[test]
fn test_covering_reaches_the_guarded_var_rule() {
    let g = expr_grammar();
    let values = g.k_path_covering(&sym("expr"), 2, &specs()).unwrap();
    // `var` is only reachable inside a `let`, so its presence shows the
    // context machinery engaged during covering.
    assert!(values.iter().any(|v| v.to_string().contains("(var x)")));
    // And every value is a well-formed expr tree.
    for v in &values {
        assert_eq!(head_symbol(v), Some(sym("expr")));
    }
}

#[test]
fn test_path_set_respects_context_guards() {
    let g = expr_grammar();
    let paths = g.generate_k_path_set(2, &sym("expr"), &specs()).unwrap();
    // Paths into `var` exist (via let-extended refs)...
    assert!(paths.iter().any(|p| p
        .iter()
        .any(|a| a.as_rule_ref().is_some_and(|r| r.rule() == &sym("var")))));
    // ...but only from an expr ref that introduces the x flag; the guard
    // keeps the plain expr refs away from `var`.
    for p in &paths {
        let Some((first, rest)) = p.split_first() else {
            continue;
        };
        let (Some(a), Some(b)) = (
            first.as_rule_ref(),
            rest.first().and_then(|atom| atom.as_rule_ref()),
        ) else {
            continue;
        };
        if a.rule() == &sym("expr") && b.rule() == &sym("var") {
            assert!(a.ctx_ext().contains(&sym("x")));
        }
    }
}
