//! End-to-end scenarios driving the whole engine with the calculator SUT.

use photesthesis_conformance::{expr_grammar, sym, CalcTest};
use photesthesis_corpus::{Corpus, ParamSpecs, Plan};
use photesthesis_engine::{DriverResult, Test, TestCase, TestRun};
use photesthesis_value::Value;
use std::str::FromStr;

fn seed_specs() -> Vec<ParamSpecs> {
    let mut spec = ParamSpecs::new();
    spec.insert(sym("n"), sym("expr"));
    vec![spec]
}

fn plan_for(text: &str) -> Plan {
    let mut plan = Plan::new(sym("CalcTest"));
    plan.add_param(sym("n"), Value::from_str(text).unwrap())
        .unwrap();
    plan
}

fn run_one(text: &str) -> Vec<(String, String)> {
    let grammar = expr_grammar();
    let mut corpus = Corpus::in_memory();
    let mut test = Test::new(&grammar, &mut corpus, sym("CalcTest"), seed_specs());
    let mut case = CalcTest::new();
    test.run_plan(&mut case, &plan_for(text)).unwrap();
    test.transcript()
        .vars()
        .iter()
        .map(|r| (r.name.to_string(), r.value.to_string()))
        .collect()
}

#[test]
fn test_literal_scenario() {
    let vars = run_one("(expr 3)");
    assert_eq!(vars, vec![("res".to_string(), "3".to_string())]);
}

#[test]
fn test_addition_scenario() {
    let vars = run_one("(expr (add (expr 1) (expr 2)))");
    assert_eq!(vars, vec![("res".to_string(), "3".to_string())]);
}

#[test]
fn test_let_scenario() {
    let vars = run_one("(expr (let x (expr 2) (expr (var x))))");
    assert_eq!(vars, vec![("res".to_string(), "2".to_string())]);
}

/// A wrapper that runs the calculator but also reports a failing invariant
/// on every run.
struct AlwaysBroken {
    inner: CalcTest,
}

impl TestCase for AlwaysBroken {
    fn run(&mut self, t: &mut TestRun<'_>) -> DriverResult<()> {
        self.inner.run(t)?;
        t.invariant(sym("one"), Value::int64(1), Value::int64(2));
        Ok(())
    }

    fn on_invariant_failure(
        &mut self,
        _plan: &Plan,
        _name: &photesthesis_corpus::VarName,
        _expected: &Value,
        _got: &Value,
    ) {
    }
}

#[test]
fn test_invariant_failure_reported_by_administer() {
    let grammar = expr_grammar();
    let expected_plans = grammar
        .plans_from_k_path_coverings(&sym("CalcTest"), &seed_specs()[0], 2)
        .unwrap();
    let expected_hashes: std::collections::BTreeSet<u64> =
        expected_plans.iter().map(|p| p.hash_code()).collect();

    let mut corpus = Corpus::in_memory();
    let mut test = Test::new(&grammar, &mut corpus, sym("CalcTest"), seed_specs());
    let mut case = AlwaysBroken {
        inner: CalcTest::new(),
    };
    let failures = test.administer(&mut case, 0, 3, 3).unwrap();
    assert!(!failures.is_empty());
    for hash in &failures {
        assert!(expected_hashes.contains(hash));
    }
}

#[test]
fn test_corpus_roundtrip_of_scenarios() {
    let grammar = expr_grammar();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calc.corpus");
    let scenarios = [
        "(expr 3)",
        "(expr (add (expr 1) (expr 2)))",
        "(expr (let x (expr 2) (expr (var x))))",
    ];
    let mut transcripts = Vec::new();
    {
        let mut scratch = Corpus::in_memory();
        let mut test = Test::new(&grammar, &mut scratch, sym("CalcTest"), seed_specs());
        let mut case = CalcTest::new();
        for text in scenarios {
            test.run_plan(&mut case, &plan_for(text)).unwrap();
            transcripts.push(test.transcript().clone());
        }
    }
    {
        let mut corpus = Corpus::open(&path).unwrap();
        for ts in &transcripts {
            corpus.add_transcript(ts.clone()).unwrap();
        }
        // Dropped dirty here, which writes the file.
    }
    let reloaded = Corpus::open_with(&path, false).unwrap();
    assert_eq!(reloaded.transcript_count(&sym("CalcTest")), scenarios.len());
    for ts in &transcripts {
        assert_eq!(reloaded.find_by_plan(ts.plan()), Some(ts));
    }
}

#[test]
fn test_full_lifecycle_grows_then_replays_clean() {
    let grammar = expr_grammar();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.corpus");
    {
        let mut corpus = Corpus::open(&path).unwrap();
        let mut test = Test::new(&grammar, &mut corpus, sym("CalcTest"), seed_specs());
        let mut case = CalcTest::new();
        let failures = test.administer(&mut case, 0, 3, 3).unwrap();
        assert!(failures.is_empty());
    }
    {
        let mut corpus = Corpus::open(&path).unwrap();
        assert!(corpus.has_transcripts(&sym("CalcTest")));
        let before = corpus.transcript_count(&sym("CalcTest"));
        let mut test = Test::new(&grammar, &mut corpus, sym("CalcTest"), seed_specs());
        test.seed_with(11);
        let mut case = CalcTest::new();
        let failures = test.administer(&mut case, 48, 3, 4).unwrap();
        assert!(failures.is_empty());
        assert!(corpus.transcript_count(&sym("CalcTest")) >= before);
    }
    {
        // A third administration replays the grown corpus cleanly.
        let mut corpus = Corpus::open(&path).unwrap();
        let mut test = Test::new(&grammar, &mut corpus, sym("CalcTest"), seed_specs());
        let mut case = CalcTest::new();
        let failures = test.administer(&mut case, 0, 3, 3).unwrap();
        assert!(failures.is_empty());
    }
}
