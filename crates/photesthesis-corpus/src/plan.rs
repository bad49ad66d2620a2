//! Named, parameterized test scenarios.

use crate::error::{CorpusError, CorpusResult};
use photesthesis_value::{head_symbol, Hash64, Symbol, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub type TestName = Symbol;
pub type ParamName = Symbol;
pub type RuleName = Symbol;
pub type VarName = Symbol;
pub type PlanHash = u64;

/// Parameter assignments of a plan, ordered by name.
pub type Params = BTreeMap<ParamName, Value>;

/// Which grammar rule generates each parameter, ordered by name.
pub type ParamSpecs = BTreeMap<ParamName, RuleName>;

/// A plan is a test name plus parameter assignments. Free-text comments may
/// be attached for the corpus file; they take no part in identity, order,
/// or hashing.
#[derive(Debug, Clone)]
pub struct Plan {
    test_name: TestName,
    comments: Vec<String>,
    params: Params,
}

impl Plan {
    pub fn new(test_name: TestName) -> Plan {
        Plan {
            test_name,
            comments: Vec::new(),
            params: Params::new(),
        }
    }

    pub fn with_params(test_name: TestName, params: Params) -> Plan {
        Plan {
            test_name,
            comments: Vec::new(),
            params,
        }
    }

    pub fn test_name(&self) -> &TestName {
        &self.test_name
    }

    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Add a parameter; the name must not already be assigned.
    pub fn add_param(&mut self, name: ParamName, value: Value) -> CorpusResult<()> {
        if self.params.contains_key(&name) {
            return Err(CorpusError::DuplicateParam { param: name });
        }
        self.params.insert(name, value);
        Ok(())
    }

    pub fn get_param(&self, name: &ParamName) -> CorpusResult<Value> {
        self.params
            .get(name)
            .cloned()
            .ok_or_else(|| CorpusError::UnknownParam {
                param: name.clone(),
            })
    }

    pub fn has_param(&self, name: &ParamName) -> bool {
        self.params.contains_key(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Recover the specs that generated this plan: each parameter value is a
    /// list headed by the name of its generating rule.
    pub fn param_specs(&self) -> CorpusResult<ParamSpecs> {
        let mut specs = ParamSpecs::new();
        for (name, value) in &self.params {
            let rule = head_symbol(value).ok_or_else(|| CorpusError::MalformedParamValue {
                param: name.clone(),
            })?;
            specs.insert(name.clone(), rule);
        }
        Ok(specs)
    }

    /// Mix this plan into a streaming hasher: `test_name ":" (k "=" v)*`
    /// in key order.
    pub fn add_to_hash(&self, h: &mut Hash64) {
        h.add_symbol(&self.test_name);
        h.add_str(":");
        for (k, v) in &self.params {
            h.add_key_value(k, v);
        }
    }

    pub fn hash_code(&self) -> PlanHash {
        let mut h = Hash64::new();
        self.add_to_hash(&mut h);
        h.finish()
    }
}

impl PartialEq for Plan {
    fn eq(&self, other: &Self) -> bool {
        self.test_name == other.test_name && self.params == other.params
    }
}

impl Eq for Plan {}

impl PartialOrd for Plan {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Plan {
    fn cmp(&self, other: &Self) -> Ordering {
        self.test_name
            .cmp(&other.test_name)
            .then_with(|| self.params.cmp(&other.params))
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for comment in &self.comments {
            writeln!(f, "# {}", comment)?;
        }
        for (name, value) in &self.params {
            writeln!(f, "param: {} = {}", name, value)?;
        }
        Ok(())
    }
}
