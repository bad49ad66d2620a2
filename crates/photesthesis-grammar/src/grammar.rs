//! Rule storage, production filtering, and random generation.

use crate::atom::{Atom, AtomPtr, Production, Rule};
use crate::context::Context;
use crate::error::{GrammarError, GrammarResult};
use photesthesis_corpus::{ParamSpecs, Plan, RuleName, TestName};
use photesthesis_value::Value;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// A set of named rules plus a canonical root ref per rule, used when that
/// rule acts as a start symbol.
#[derive(Debug, Default)]
pub struct Grammar {
    rules: BTreeMap<RuleName, Rule>,
    root_refs: BTreeMap<RuleName, AtomPtr>,
}

impl Grammar {
    pub fn new() -> Grammar {
        Grammar::default()
    }

    pub fn add_rule(
        &mut self,
        name: RuleName,
        productions: Vec<Production>,
    ) -> GrammarResult<()> {
        if self.rules.contains_key(&name) {
            return Err(GrammarError::DuplicateRule { rule: name });
        }
        self.root_refs
            .insert(name.clone(), Atom::rule_ref(name.clone()));
        self.rules.insert(name, Rule::new(productions));
        Ok(())
    }

    pub(crate) fn root_ref(&self, name: &RuleName) -> GrammarResult<&AtomPtr> {
        self.root_refs
            .get(name)
            .ok_or_else(|| GrammarError::RuleNotFound { rule: name.clone() })
    }

    fn productions(&self, name: &RuleName) -> GrammarResult<&[Production]> {
        let rule = self
            .rules
            .get(name)
            .ok_or_else(|| GrammarError::RuleNotFound { rule: name.clone() })?;
        if rule.productions().is_empty() {
            return Err(GrammarError::EmptyRule { rule: name.clone() });
        }
        Ok(rule.productions())
    }

    /// Productions of `rule` usable at the given depth limit and context.
    /// At depth 1 a production containing refs cannot be used, since there
    /// is no budget left to descend into them.
    pub(crate) fn active_productions(
        &self,
        rule: &RuleName,
        depth_limit: usize,
        ctx: &Context<'_>,
    ) -> GrammarResult<Vec<&Production>> {
        let mut active = Vec::new();
        let mut skipped_for_refs = false;
        for prod in self.productions(rule)? {
            if depth_limit == 1 && prod.has_refs() {
                skipped_for_refs = true;
                continue;
            }
            if ctx.has_all(prod.ctx_req()) {
                active.push(prod);
            }
        }
        if active.is_empty() {
            return Err(if skipped_for_refs {
                GrammarError::NeedsTerminalProduction { rule: rule.clone() }
            } else {
                GrammarError::NoActiveProductions { rule: rule.clone() }
            });
        }
        Ok(active)
    }

    /// Expand `rule` by picking a uniformly random active production at each
    /// step. The result is always a list headed by the rule's name.
    pub fn random_value(
        &self,
        rule: &RuleName,
        rng: &mut StdRng,
        depth_limit: usize,
        ctx: &mut Context<'_>,
    ) -> GrammarResult<Value> {
        if depth_limit == 0 {
            return Err(GrammarError::DepthExhausted { rule: rule.clone() });
        }
        let prods = self.active_productions(rule, depth_limit, ctx)?;
        let prod = prods
            .choose(rng)
            .ok_or_else(|| GrammarError::NoActiveProductions { rule: rule.clone() })?;
        let mut vals = vec![Value::sym(rule.clone())];
        for atom in prod.atoms() {
            match atom.as_ref() {
                Atom::Lit(v) => vals.push(v.clone()),
                Atom::Ref(r) => {
                    let v = ctx.with_flags(r.ctx_ext(), |ctx| {
                        self.random_value(r.rule(), rng, depth_limit - 1, ctx)
                    })?;
                    vals.push(v);
                }
            }
        }
        Ok(Value::list(vals))
    }

    /// Populate a plan by generating a random value for every param spec.
    pub fn random_plan(
        &self,
        test_name: &TestName,
        specs: &ParamSpecs,
        rng: &mut StdRng,
        depth_limit: usize,
    ) -> GrammarResult<Plan> {
        let mut plan = Plan::new(test_name.clone());
        for (name, rule) in specs {
            let mut ctx = Context::new(specs);
            let value = self.random_value(rule, rng, depth_limit, &mut ctx)?;
            plan.add_param(name.clone(), value)?;
        }
        Ok(plan)
    }
}
