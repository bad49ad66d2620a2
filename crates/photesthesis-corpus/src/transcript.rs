//! Execution records.

use crate::plan::{Plan, TestName, VarName};
use photesthesis_value::Value;
use std::fmt;

/// One `check:` or `track:` record appended during a run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarRecord {
    pub name: VarName,
    pub value: Value,
    pub tracked: bool,
}

/// A plan plus the ordered variable records its execution produced.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Transcript {
    plan: Plan,
    vars: Vec<VarRecord>,
}

impl Transcript {
    pub fn new(plan: Plan) -> Transcript {
        Transcript {
            plan,
            vars: Vec::new(),
        }
    }

    pub fn test_name(&self) -> &TestName {
        self.plan.test_name()
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn add_checked(&mut self, name: VarName, value: Value) {
        self.vars.push(VarRecord {
            name,
            value,
            tracked: false,
        });
    }

    pub fn add_tracked(&mut self, name: VarName, value: Value) {
        self.vars.push(VarRecord {
            name,
            value,
            tracked: true,
        });
    }

    pub fn vars(&self) -> &[VarRecord] {
        &self.vars
    }

    pub fn clear_vars(&mut self) {
        self.vars.clear();
    }

    pub(crate) fn push_record(&mut self, record: VarRecord) {
        self.vars.push(record);
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "#### transcript: {} 0x{:x}",
            self.test_name(),
            self.plan.hash_code()
        )?;
        write!(f, "{}", self.plan)?;
        for var in &self.vars {
            let kw = if var.tracked { "track" } else { "check" };
            writeln!(f, "{}: {} = {}", kw, var.name, var.value)?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photesthesis_value::Symbol;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn sample_plan() -> Plan {
        let mut plan = Plan::new(sym("calc"));
        plan.add_param(
            sym("n"),
            Value::list([Value::sym(sym("expr")), Value::int64(3)]),
        )
        .unwrap();
        plan
    }

    #[test]
    fn test_records_keep_invocation_order() {
        let mut ts = Transcript::new(sample_plan());
        ts.add_tracked(sym("depth"), Value::int64(1));
        ts.add_checked(sym("res"), Value::int64(3));
        assert_eq!(ts.vars().len(), 2);
        assert!(ts.vars()[0].tracked);
        assert!(!ts.vars()[1].tracked);
        assert_eq!(ts.vars()[1].value, Value::int64(3));
    }

    #[test]
    fn test_equality_includes_records() {
        let mut a = Transcript::new(sample_plan());
        let mut b = Transcript::new(sample_plan());
        assert_eq!(a, b);
        a.add_checked(sym("res"), Value::int64(3));
        assert_ne!(a, b);
        b.add_checked(sym("res"), Value::int64(3));
        assert_eq!(a, b);
        // A check and a track of the same variable are distinct records.
        let mut c = Transcript::new(sample_plan());
        c.add_tracked(sym("res"), Value::int64(3));
        assert_ne!(a, c);
    }

    #[test]
    fn test_display_block_shape() {
        let mut ts = Transcript::new(sample_plan());
        ts.add_checked(sym("res"), Value::int64(3));
        let text = ts.to_string();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("#### transcript: calc 0x"));
        assert_eq!(lines.next().unwrap(), "param: n = (expr 3)");
        assert_eq!(lines.next().unwrap(), "check: res = 3");
        assert!(text.ends_with("\n\n"));
    }
}
