//! k-path enumeration and covering expansion.
//!
//! A k-path is a directed path of exactly k atoms through the grammar
//! graph. [`Grammar::generate_k_path_set`] enumerates every k-path
//! reachable from a start rule; [`Grammar::k_path_covering`] produces a set
//! of values whose derivation trees collectively cover all of them, while
//! keeping rules that do not participate in any uncovered path at their
//! minimal expansion. Per-atom expansion sets are combined by cyclic
//! zipping rather than a cartesian product, so the covering set stays
//! linear in the largest atom expansion.

use crate::atom::{Atom, AtomPtr};
use crate::context::Context;
use crate::error::{GrammarError, GrammarResult};
use crate::grammar::Grammar;
use photesthesis_corpus::{ParamName, ParamSpecs, Params, Plan, RuleName, TestName};
use photesthesis_value::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// An ordered sequence of exactly k atoms.
pub type KPath = Vec<AtomPtr>;

/// Combine a set of list prefixes with the expansion set of the next atom.
/// Both sets cycle in parallel until each has wrapped at least once, so
/// every prefix and every extension appears in some output, and the result
/// has `max(|prefixes|, |ext|)` elements instead of the full product.
fn extend_by_cycling(
    prefixes: &BTreeSet<Vec<Value>>,
    ext: &BTreeSet<Value>,
) -> BTreeSet<Vec<Value>> {
    debug_assert!(!prefixes.is_empty());
    debug_assert!(!ext.is_empty());
    let steps = prefixes.len().max(ext.len());
    prefixes
        .iter()
        .cycle()
        .zip(ext.iter().cycle())
        .take(steps)
        .map(|(prefix, v)| {
            let mut extended = prefix.clone();
            extended.push(v.clone());
            extended
        })
        .collect()
}

/// The same cyclic combination, extending param maps with one more param.
fn extend_params_by_cycling(
    sets: &BTreeSet<Params>,
    name: &ParamName,
    ext: &BTreeSet<Value>,
) -> BTreeSet<Params> {
    debug_assert!(!sets.is_empty());
    debug_assert!(!ext.is_empty());
    let steps = sets.len().max(ext.len());
    sets.iter()
        .cycle()
        .zip(ext.iter().cycle())
        .take(steps)
        .map(|(params, v)| {
            let mut extended = params.clone();
            extended.insert(name.clone(), v.clone());
            extended
        })
        .collect()
}

impl Grammar {
    /// All k-paths reachable from the root ref of `root`.
    pub fn generate_k_path_set(
        &self,
        k: usize,
        root: &RuleName,
        specs: &ParamSpecs,
    ) -> GrammarResult<BTreeSet<KPath>> {
        let root_ref = self.root_ref(root)?.clone();
        let Atom::Ref(r) = root_ref.as_ref() else {
            unreachable!("root refs are always rule refs");
        };
        let mut path_roots = BTreeSet::from([r.tag()]);
        let mut ctx = Context::new(specs);
        self.expand_k_path_prefix(k, &[root_ref.clone()], &mut ctx, &mut path_roots)
    }

    /// Grow `prefix` one atom at a time. The last element of any prefix
    /// shorter than k is a ref; its active productions supply the
    /// extensions. Literals may only occupy the final position. Every ref
    /// not yet used as a path root additionally starts a fresh path.
    fn expand_k_path_prefix(
        &self,
        k: usize,
        prefix: &[AtomPtr],
        ctx: &mut Context<'_>,
        path_roots: &mut BTreeSet<u64>,
    ) -> GrammarResult<BTreeSet<KPath>> {
        debug_assert!(k > 0);
        debug_assert!(!prefix.is_empty());
        if prefix.len() == k {
            return Ok(BTreeSet::from([prefix.to_vec()]));
        }
        let Some(Atom::Ref(anchor)) = prefix.last().map(|a| a.as_ref()) else {
            unreachable!("non-final prefix positions are always rule refs");
        };
        let prods = self.active_productions(anchor.rule(), k, ctx)?;
        let mut res = BTreeSet::new();
        for prod in prods {
            for ext in prod.atoms() {
                match ext.as_ref() {
                    Atom::Ref(r) => {
                        ctx.with_flags(r.ctx_ext(), |ctx| -> GrammarResult<()> {
                            let mut extended = prefix.to_vec();
                            extended.push(ext.clone());
                            res.extend(self.expand_k_path_prefix(k, &extended, ctx, path_roots)?);
                            if path_roots.insert(r.tag()) {
                                let restarted = [ext.clone()];
                                res.extend(self.expand_k_path_prefix(
                                    k,
                                    &restarted,
                                    ctx,
                                    path_roots,
                                )?);
                            }
                            Ok(())
                        })?;
                    }
                    Atom::Lit(_) if prefix.len() == k - 1 => {
                        let mut extended = prefix.to_vec();
                        extended.push(ext.clone());
                        res.extend(self.expand_k_path_prefix(k, &extended, ctx, path_roots)?);
                    }
                    Atom::Lit(_) => {}
                }
            }
        }
        Ok(res)
    }

    /// Expand the rule at the top of `path`, returning `(covering,
    /// fallback)` expansion sets, at least one of which is non-empty.
    ///
    /// A production is marked covering if one of its atoms completes a path
    /// still in `paths` (which is then removed), or if a ref atom's own
    /// recursive expansion covered something. Covering productions
    /// contribute all their expansions; if nothing covers, the single
    /// smallest non-covering expansion survives as the fallback.
    fn covering_or_minimal(
        &self,
        path: &mut Vec<AtomPtr>,
        depth_limit: usize,
        ctx: &mut Context<'_>,
        k: usize,
        paths: &mut BTreeSet<KPath>,
    ) -> GrammarResult<(BTreeSet<Value>, BTreeSet<Value>)> {
        debug_assert!(!path.is_empty());
        debug_assert!(k > 0);
        let Some(Atom::Ref(spine)) = path.last().map(|a| a.as_ref()) else {
            unreachable!("the expansion spine holds only rule refs");
        };
        let rule = spine.rule().clone();
        if depth_limit == 0 {
            return Err(GrammarError::DepthExhausted { rule });
        }

        // The last k-1 spine entries; one more atom makes a k-path
        // candidate. A shorter spine cannot complete any path yet.
        let window: Vec<AtomPtr> = if path.len() >= k - 1 {
            path[path.len() - (k - 1)..].to_vec()
        } else {
            Vec::new()
        };

        let prods = self.active_productions(&rule, depth_limit, ctx)?;
        let mut covering = BTreeSet::new();
        let mut fallback = BTreeSet::new();

        for prod in prods {
            let mut prefixes = BTreeSet::from([vec![Value::sym(rule.clone())]]);
            let mut covers_some_kpath = false;

            for atom in prod.atoms() {
                if window.is_empty() && k > 1 {
                    break;
                }
                let mut candidate = window.clone();
                candidate.push(atom.clone());
                if paths.remove(&candidate) {
                    covers_some_kpath = true;
                    break;
                }
            }

            for atom in prod.atoms() {
                let expansion = match atom.as_ref() {
                    Atom::Lit(v) => BTreeSet::from([v.clone()]),
                    Atom::Ref(r) => {
                        let (sub_covering, sub_fallback) =
                            ctx.with_flags(r.ctx_ext(), |ctx| {
                                path.push(atom.clone());
                                let result = self
                                    .covering_or_minimal(path, depth_limit - 1, ctx, k, paths);
                                path.pop();
                                result
                            })?;
                        if sub_covering.is_empty() {
                            debug_assert_eq!(sub_fallback.len(), 1);
                            sub_fallback
                        } else {
                            covers_some_kpath = true;
                            sub_covering
                        }
                    }
                };
                prefixes = extend_by_cycling(&prefixes, &expansion);
            }

            let target = if covers_some_kpath {
                &mut covering
            } else {
                &mut fallback
            };
            for prefix in prefixes {
                target.insert(Value::list(prefix));
            }
        }

        if !covering.is_empty() {
            fallback.clear();
        } else if fallback.len() > 1 {
            // Keep only the smallest non-covering expansion.
            let smallest = fallback.iter().next().cloned();
            fallback = smallest.into_iter().collect();
        }
        debug_assert!(!(covering.is_empty() && fallback.is_empty()));
        Ok((covering, fallback))
    }

    /// Values from `rule` covering every k-path reachable from it. The
    /// depth limit starts at k and grows only when a pass over the root
    /// covers nothing, which is what makes this terminate on cyclic
    /// grammars.
    pub fn k_path_covering(
        &self,
        rule: &RuleName,
        k: usize,
        specs: &ParamSpecs,
    ) -> GrammarResult<BTreeSet<Value>> {
        let mut ctx = Context::new(specs);
        let mut paths = self.generate_k_path_set(k, rule, specs)?;
        let mut res = BTreeSet::new();
        let mut depth_limit = k;
        while !paths.is_empty() {
            let mut path = vec![self.root_ref(rule)?.clone()];
            let (covering, _fallback) =
                self.covering_or_minimal(&mut path, depth_limit, &mut ctx, k, &mut paths)?;
            if covering.is_empty() {
                depth_limit += 1;
                debug!(
                    rule = %rule,
                    depth_limit,
                    uncovered = paths.len(),
                    "no covering expansion found, raising depth limit"
                );
            } else {
                res.extend(covering);
            }
        }
        Ok(res)
    }

    /// Run the covering driver for each param independently, then combine
    /// the per-param value sets into param maps by cyclic zipping in
    /// declaration order.
    pub fn k_path_coverings(
        &self,
        k: usize,
        specs: &ParamSpecs,
    ) -> GrammarResult<BTreeSet<Params>> {
        let mut res: BTreeSet<Params> = BTreeSet::new();
        for (name, rule) in specs {
            let vals = self.k_path_covering(rule, k, specs)?;
            if res.is_empty() {
                for v in vals {
                    res.insert(Params::from([(name.clone(), v)]));
                }
            } else if !vals.is_empty() {
                res = extend_params_by_cycling(&res, name, &vals);
            }
        }
        Ok(res)
    }

    /// Wrap every covering param map into a plan.
    pub fn plans_from_k_path_coverings(
        &self,
        test_name: &TestName,
        specs: &ParamSpecs,
        k: usize,
    ) -> GrammarResult<BTreeSet<Plan>> {
        Ok(self
            .k_path_coverings(k, specs)?
            .into_iter()
            .map(|params| Plan::with_params(test_name.clone(), params))
            .collect())
    }
}
