//! A miniature calculator system under test, with the grammar of abstract
//! test scenarios that drives it. The integration tests in `tests/` run the
//! whole engine against this pair.

use photesthesis_engine::{DriverResult, TestCase, TestRun};
use photesthesis_grammar::{Atom, Grammar, Production};
use photesthesis_value::{Symbol, Value};

/// Intern a known-good identifier literal.
pub fn sym(s: &str) -> Symbol {
    Symbol::new(s).expect("valid symbol literal")
}

/// The SUT: integer arithmetic over a stack of local symbolic variables.
#[derive(Default)]
pub struct Calculator {
    var_stack: Vec<(String, i64)>,
}

impl Calculator {
    pub fn new() -> Calculator {
        Calculator::default()
    }

    pub fn get_var(&self, name: &str) -> Option<i64> {
        self.var_stack
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn push_var(&mut self, name: &str, value: i64) {
        self.var_stack.push((name.to_string(), value));
    }

    pub fn pop_var(&mut self) {
        self.var_stack.pop();
    }

    // Wrapping keeps replay deterministic on pathological inputs.
    pub fn add(&self, a: i64, b: i64) -> i64 {
        a.wrapping_add(b)
    }

    pub fn sub(&self, a: i64, b: i64) -> i64 {
        a.wrapping_sub(b)
    }

    pub fn mul(&self, a: i64, b: i64) -> i64 {
        a.wrapping_mul(b)
    }
}

/// The grammar of abstract calculator scenarios. `let` introduces `x` as a
/// local context flag, and references to `var` are only active under it.
pub fn expr_grammar() -> Grammar {
    let expr = sym("expr");
    let x = sym("x");
    let mut g = Grammar::new();

    for op in ["add", "sub", "mul"] {
        g.add_rule(
            sym(op),
            vec![
                Production::new(vec![Atom::int64(0)]),
                Production::new(vec![Atom::rule_ref(expr.clone()), Atom::rule_ref(expr.clone())]),
            ],
        )
        .expect("fresh rule");
    }

    g.add_rule(
        sym("let"),
        vec![
            Production::new(vec![Atom::int64(0)]),
            Production::new(vec![
                Atom::sym(x.clone()),
                Atom::rule_ref(expr.clone()),
                Atom::rule_ref_extending(expr.clone(), [x.clone()]),
            ]),
        ],
    )
    .expect("fresh rule");

    g.add_rule(
        sym("var"),
        vec![Production::new(vec![Atom::sym(x.clone())])],
    )
    .expect("fresh rule");

    g.add_rule(
        expr,
        vec![
            Production::new(vec![Atom::int64(1)]),
            Production::new(vec![Atom::int64(2)]),
            Production::new(vec![Atom::int64(3)]),
            Production::new(vec![Atom::rule_ref(sym("add"))]),
            Production::new(vec![Atom::rule_ref(sym("sub"))]),
            Production::new(vec![Atom::rule_ref(sym("mul"))]),
            Production::new(vec![Atom::rule_ref(sym("let"))]),
            Production::guarded(vec![Atom::rule_ref(sym("var"))], [x]),
        ],
    )
    .expect("fresh rule");

    g
}

/// The interface between the engine, the scenario grammar, and the SUT.
pub struct CalcTest {
    calc: Calculator,
}

impl CalcTest {
    pub fn new() -> CalcTest {
        CalcTest {
            calc: Calculator::new(),
        }
    }

    /// Evaluate a generated scenario tree. Anything that fails to
    /// destructure evaluates to zero, matching the degenerate productions
    /// like `(add 0)`.
    pub fn eval(&mut self, v: &Value) -> i64 {
        let mut a = Value::nil();
        if !v.matches((sym("expr"), &mut a)) {
            return 0;
        }
        let mut b = Value::nil();
        let mut c = Value::nil();
        if a.matches((sym("add"), &mut b, &mut c)) {
            let (l, r) = (self.eval(&b), self.eval(&c));
            return self.calc.add(l, r);
        }
        if a.matches((sym("sub"), &mut b, &mut c)) {
            let (l, r) = (self.eval(&b), self.eval(&c));
            return self.calc.sub(l, r);
        }
        if a.matches((sym("mul"), &mut b, &mut c)) {
            let (l, r) = (self.eval(&b), self.eval(&c));
            return self.calc.mul(l, r);
        }
        let mut name = Symbol::empty();
        if a.matches((sym("let"), &mut name, &mut b, &mut c)) {
            let bound = self.eval(&b);
            self.calc.push_var(name.as_str(), bound);
            let result = self.eval(&c);
            self.calc.pop_var();
            return result;
        }
        if a.matches((sym("var"), &mut name)) {
            return self.calc.get_var(name.as_str()).unwrap_or(0);
        }
        let mut i = 0i64;
        if a.matches((&mut i,)) {
            return i;
        }
        0
    }
}

impl Default for CalcTest {
    fn default() -> Self {
        CalcTest::new()
    }
}

impl TestCase for CalcTest {
    fn run(&mut self, t: &mut TestRun<'_>) -> DriverResult<()> {
        let val = t.get_param(&sym("n"))?;
        let res = self.eval(&val);
        t.check(sym("res"), Value::int64(res));
        Ok(())
    }
}
