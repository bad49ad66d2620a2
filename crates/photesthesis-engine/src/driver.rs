//! The test driver state machine.
//!
//! A [`Test`] binds a grammar and a corpus to a named scenario. Each call
//! to [`Test::administer`] either seeds an empty corpus from k-path
//! coverings, or replays every stored transcript and, when all checks
//! pass, spends the expansion budget sampling random plans, keeping those
//! whose trajectory is new.
//!
//! User code implements [`TestCase`]: the `run` body drives the system
//! under test through the operations on [`TestRun`], and the two handler
//! methods may be overridden to intercept failures.

use crate::config::Config;
use crate::coverage;
use crate::error::{DriverError, DriverResult};
use photesthesis_corpus::{
    Corpus, ParamName, ParamSpecs, Plan, PlanHash, TestName, Transcript, VarName,
};
use photesthesis_grammar::Grammar;
use photesthesis_value::hash::hash_bytes;
use photesthesis_value::{Hash64, Value};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Plan hashes of failed runs, in the order they were observed.
pub type Failures = Vec<PlanHash>;

type Trajectories = BTreeMap<u64, Transcript>;

struct InvariantFailure {
    name: VarName,
    expected: Value,
    got: Value,
}

/// A user-defined test scenario.
pub trait TestCase {
    /// Run the system under test against the current plan.
    fn run(&mut self, t: &mut TestRun<'_>) -> DriverResult<()>;

    /// Called for each `invariant` whose observed value disagreed with the
    /// expected one.
    fn on_invariant_failure(
        &mut self,
        plan: &Plan,
        name: &VarName,
        expected: &Value,
        got: &Value,
    ) {
        warn!(
            test = %plan.test_name(),
            plan_hash = format_args!("0x{:x}", plan.hash_code()),
            invariant = %name,
            expected = %expected,
            got = %got,
            "invariant failed"
        );
    }

    /// Called when a replayed transcript differs from the stored one. The
    /// corpus is updated with the fresh transcript either way.
    fn on_transcript_mismatch(&mut self, expected: &Transcript, got: &Transcript) {
        warn!(expected = %expected, got = %got, "transcript mismatch");
    }
}

/// The operations a `run` body may perform.
pub struct TestRun<'a> {
    transcript: &'a mut Transcript,
    user_hasher: &'a mut Hash64,
    invariant_failures: &'a mut Vec<InvariantFailure>,
}

impl TestRun<'_> {
    pub fn plan(&self) -> &Plan {
        self.transcript.plan()
    }

    /// The plan's value for a parameter.
    pub fn get_param(&self, name: &ParamName) -> DriverResult<Value> {
        Ok(self.transcript.plan().get_param(name)?)
    }

    /// Record a value expected to be identical across all executions. A
    /// disagreement marks the run failed and reaches the invariant handler;
    /// it touches neither the transcript nor the trajectory.
    pub fn invariant(&mut self, name: VarName, expected: Value, got: Value) {
        if expected != got {
            self.invariant_failures.push(InvariantFailure {
                name,
                expected,
                got,
            });
        }
    }

    /// Mix a value into the user trajectory without transcribing it.
    pub fn trace(&mut self, name: &VarName, value: &Value) {
        self.user_hasher.add_key_value(name, value);
    }

    /// Transcribe a value for replay checking without tracing it.
    pub fn check(&mut self, name: VarName, value: Value) {
        self.transcript.add_checked(name, value);
    }

    /// Trace and transcribe: the record is flagged so a reader of the
    /// corpus can see it is trajectory-sensitive.
    pub fn track(&mut self, name: VarName, value: Value) {
        self.trace(&name, &value);
        self.transcript.add_tracked(name, value);
    }
}

/// Driver state for one named test bound to a grammar and a corpus.
pub struct Test<'a> {
    grammar: &'a Grammar,
    corpus: &'a mut Corpus,
    test_name: TestName,
    seed_specs: Vec<ParamSpecs>,
    rng: StdRng,
    verbose: u64,
    failed: bool,
    transcript: Transcript,
    user_trajectory: u64,
    path_trajectory: u64,
    trajectory: u64,
    stability_mask: Vec<u8>,
    stability_retries: u64,
}

impl<'a> Test<'a> {
    pub fn new(
        grammar: &'a Grammar,
        corpus: &'a mut Corpus,
        test_name: TestName,
        seed_specs: Vec<ParamSpecs>,
    ) -> Test<'a> {
        let verbose = Config::from_env(0, 0, 0).verbose;
        Test {
            grammar,
            corpus,
            transcript: Transcript::new(Plan::new(test_name.clone())),
            test_name,
            seed_specs,
            rng: StdRng::seed_from_u64(0),
            verbose,
            failed: false,
            user_trajectory: 0,
            path_trajectory: 0,
            trajectory: 0,
            stability_mask: Vec::new(),
            stability_retries: 0,
        }
    }

    /// Seed the plan generator with a specific value. Unseeded drivers
    /// behave as if seeded with zero.
    pub fn seed_with(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Seed the plan generator from OS entropy.
    pub fn seed_from_entropy(&mut self) {
        self.rng = StdRng::from_entropy();
    }

    /// The transcript of the most recent run.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The trajectory of the most recent run.
    pub fn trajectory(&self) -> u64 {
        self.trajectory
    }

    fn init_trajectory(&mut self) {
        self.user_trajectory = 0;
        self.path_trajectory = 0;
        coverage::with_region(|region| region.fill(0));
    }

    fn fini_trajectory(&mut self, user_hasher: &Hash64) {
        self.user_trajectory = user_hasher.finish();
        let path = coverage::with_region(|region| {
            if self.stability_mask.is_empty() {
                for b in region.iter_mut() {
                    *b = coverage::COUNTER_CLASSES[*b as usize];
                }
            } else {
                for (b, mask) in region.iter_mut().zip(&self.stability_mask) {
                    *b = coverage::COUNTER_CLASSES[*b as usize] & mask;
                }
            }
            hash_bytes(region)
        });
        match path {
            Some(h) => {
                self.path_trajectory = h;
                let mut combined = Hash64::new();
                combined.add_u64(self.path_trajectory);
                combined.add_u64(self.user_trajectory);
                self.trajectory = combined.finish();
            }
            None => {
                // Degenerate single-trajectory form: no counters registered.
                self.path_trajectory = 0;
                self.trajectory = self.user_trajectory;
            }
        }
    }

    /// Run the test body once against `plan`, rebuilding the transcript and
    /// trajectory.
    pub fn run_plan(&mut self, case: &mut impl TestCase, plan: &Plan) -> DriverResult<()> {
        self.failed = false;
        self.transcript = Transcript::new(plan.clone());
        self.init_trajectory();
        let mut user_hasher = Hash64::new();
        let mut invariant_failures = Vec::new();
        case.run(&mut TestRun {
            transcript: &mut self.transcript,
            user_hasher: &mut user_hasher,
            invariant_failures: &mut invariant_failures,
        })?;
        self.fini_trajectory(&user_hasher);
        for failure in &invariant_failures {
            self.failed = true;
            case.on_invariant_failure(
                self.transcript.plan(),
                &failure.name,
                &failure.expected,
                &failure.got,
            );
        }
        if self.verbose > 1 {
            debug!(
                plan = %plan,
                trajectory = format_args!("0x{:x}", self.trajectory),
                "ran plan"
            );
        }
        Ok(())
    }

    /// Run `plan` twice and demand matching trajectories. An unstable user
    /// trajectory is fatal. An unstable path trajectory triggers the edge
    /// masking loop: re-run until no new unstable edges appear, masking
    /// each one out of every later path hash, within the configured retry
    /// budget.
    pub fn run_plan_stabilized(
        &mut self,
        case: &mut impl TestCase,
        plan: &Plan,
    ) -> DriverResult<()> {
        self.run_plan(case, plan)?;
        let saved_user = self.user_trajectory;
        let saved_path = self.path_trajectory;
        self.run_plan(case, plan)?;
        if self.user_trajectory != saved_user {
            return Err(DriverError::UnstableUserTrajectory {
                plan_hash: plan.hash_code(),
            });
        }
        if self.path_trajectory == saved_path {
            return Ok(());
        }
        info!(
            plan_hash = format_args!("0x{:x}", plan.hash_code()),
            "path trajectory is unstable, attempting to stabilize"
        );
        let region_len = coverage::with_region(|r| r.len()).unwrap_or(0);
        if self.stability_mask.is_empty() {
            self.stability_mask = vec![0xff; region_len];
        }
        let mut attempts = 0;
        while attempts < self.stability_retries {
            loop {
                let saved_buf = coverage::with_region(|r| r.to_vec()).unwrap_or_default();
                self.run_plan(case, plan)?;
                let mut newly_masked = 0usize;
                let mask = &mut self.stability_mask;
                coverage::with_region(|region| {
                    for (i, (now, before)) in region.iter().zip(&saved_buf).enumerate() {
                        if mask[i] != 0 && now != before {
                            mask[i] = 0;
                            newly_masked += 1;
                        }
                    }
                });
                let masked_total = self.stability_mask.iter().filter(|m| **m == 0).count();
                info!(
                    newly_masked,
                    masked_total,
                    region = region_len,
                    "masked unstable path edges"
                );
                if newly_masked == 0 {
                    break;
                }
            }
            attempts += 1;
            let saved = self.path_trajectory;
            self.run_plan(case, plan)?;
            if self.path_trajectory == saved {
                return Ok(());
            }
        }
        Err(DriverError::StabilizationFailed {
            plan_hash: plan.hash_code(),
            retries: self.stability_retries,
        })
    }

    /// Run a plan and admit it to the corpus if both its trajectory and its
    /// plan are new. Returns whether the corpus grew.
    fn run_plan_and_maybe_expand(
        &mut self,
        case: &mut impl TestCase,
        plan: &Plan,
        trajectories: &mut Trajectories,
    ) -> DriverResult<bool> {
        self.run_plan_stabilized(case, plan)?;
        if !trajectories.contains_key(&self.trajectory)
            && self.corpus.find_by_plan(self.transcript.plan()).is_none()
        {
            debug!(
                trajectory = format_args!("0x{:x}", self.trajectory),
                "novel trajectory found"
            );
            trajectories.insert(self.trajectory, self.transcript.clone());
            self.corpus.add_transcript(self.transcript.clone())?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Replay a stored transcript; a differing live transcript is reported
    /// and replaces the stored one, keeping the corpus aligned with current
    /// behavior while still flagging the change as a failure.
    fn check_transcript(
        &mut self,
        case: &mut impl TestCase,
        stored: &Transcript,
    ) -> DriverResult<()> {
        self.run_plan_stabilized(case, stored.plan())?;
        if &self.transcript != stored {
            case.on_transcript_mismatch(stored, &self.transcript);
            self.corpus.update_transcript(self.transcript.clone())?;
            self.failed = true;
        }
        Ok(())
    }

    fn initialize_from_k_paths(
        &mut self,
        case: &mut impl TestCase,
        k_path_length: u64,
    ) -> DriverResult<Failures> {
        info!(
            k_path_length,
            test = %self.test_name,
            "initializing corpus from k-path coverings"
        );
        let mut trajectories = Trajectories::new();
        let mut failures = Failures::new();
        let mut n_plans = 0usize;
        let seed_specs = self.seed_specs.clone();
        for spec in &seed_specs {
            for k in 2..k_path_length as usize {
                let plans = self
                    .grammar
                    .plans_from_k_path_coverings(&self.test_name, spec, k)?;
                debug!(count = plans.len(), k, params = spec.len(), "running covering plans");
                for plan in plans {
                    n_plans += 1;
                    self.run_plan_and_maybe_expand(case, &plan, &mut trajectories)?;
                    if self.failed {
                        failures.push(plan.hash_code());
                    }
                }
            }
        }
        info!(
            plans = n_plans,
            trajectories = trajectories.len(),
            test = %self.test_name,
            "initialized corpus"
        );
        self.report_failures(&failures);
        Ok(failures)
    }

    fn check_corpus(
        &mut self,
        case: &mut impl TestCase,
        trajectories: &mut Trajectories,
        config: &Config,
    ) -> DriverResult<Failures> {
        let stored: Vec<Transcript> = self.corpus.transcripts(&self.test_name).cloned().collect();
        if stored.is_empty() {
            return Ok(Failures::new());
        }
        info!(
            count = stored.len(),
            test = %self.test_name,
            "checking stored transcripts"
        );
        let mut failures = Failures::new();
        for ts in &stored {
            if let Some(only) = config.test_hash {
                if ts.plan().hash_code() != only {
                    continue;
                }
            }
            self.check_transcript(case, ts)?;
            if self.failed {
                failures.push(ts.plan().hash_code());
            }
            trajectories.insert(self.trajectory, self.transcript.clone());
        }
        info!(
            trajectories = trajectories.len(),
            transcripts = stored.len(),
            test = %self.test_name,
            "corpus check complete"
        );
        self.report_failures(&failures);
        Ok(failures)
    }

    fn randomly_expand(
        &mut self,
        case: &mut impl TestCase,
        trajectories: &mut Trajectories,
        steps: u64,
        depth: u64,
    ) -> DriverResult<Failures> {
        if steps == 0 {
            return Ok(Failures::new());
        }
        info!(steps, depth, test = %self.test_name, "expanding corpus randomly");
        let mut failures = Failures::new();
        let mut new_trajectories = 0usize;
        for _ in 0..steps {
            let spec = if trajectories.is_empty() {
                self.seed_specs
                    .choose(&mut self.rng)
                    .cloned()
                    .ok_or(DriverError::NoSeedSpecs)?
            } else {
                let idx = self.rng.gen_range(0..trajectories.len());
                match trajectories.values().nth(idx) {
                    Some(ts) => ts.plan().param_specs()?,
                    None => continue,
                }
            };
            let plan =
                self.grammar
                    .random_plan(&self.test_name, &spec, &mut self.rng, depth as usize)?;
            if self.run_plan_and_maybe_expand(case, &plan, trajectories)? {
                new_trajectories += 1;
            }
            if self.failed {
                failures.push(plan.hash_code());
            }
        }
        info!(
            steps,
            new_trajectories,
            total = self.corpus.transcript_count(&self.test_name),
            test = %self.test_name,
            "random expansion complete"
        );
        self.report_failures(&failures);
        Ok(failures)
    }

    fn report_failures(&self, failures: &Failures) {
        if !failures.is_empty() {
            let rendered: Vec<String> = failures.iter().map(|h| format!("0x{:x}", h)).collect();
            warn!(
                test = %self.test_name,
                failing = rendered.join(", "),
                "plans failed"
            );
        }
    }

    /// Check and/or grow the corpus. Arguments may be overridden by the
    /// `PHOTESTHESIS_*` environment variables. Returns the plan hashes of
    /// failing runs; an empty list means success.
    pub fn administer(
        &mut self,
        case: &mut impl TestCase,
        expansion_steps: u64,
        k_path_length: u64,
        random_depth: u64,
    ) -> DriverResult<Failures> {
        let config = Config::from_env(expansion_steps, k_path_length, random_depth);
        self.verbose = config.verbose;
        self.stability_retries = config.stability_retries;
        if let Some(seed) = config.random_seed {
            self.seed_with(seed);
        }
        if !self.corpus.has_transcripts(&self.test_name) {
            self.initialize_from_k_paths(case, config.k_path_length)
        } else {
            let mut trajectories = Trajectories::new();
            let failures = self.check_corpus(case, &mut trajectories, &config)?;
            if !failures.is_empty() {
                return Ok(failures);
            }
            self.randomly_expand(
                case,
                &mut trajectories,
                config.expansion_steps,
                config.random_depth,
            )
        }
    }
}
