use std::collections::BTreeMap;

use mpp_core::errors::ErrorInfo;
use mpp_core::{MarkId, MppError, RngHandle};
use mpp_mark::{CfgGen, CfgNrg, EnergyScheme, EnergyStack, NrgContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{SamplerConfig, TemperatureSchedule};
use crate::context::{ErrorSink, KernelCalcContext, ProposerContext};
use crate::determinism;
use crate::kernel::{Kernel, KernelKind};
use crate::kernel_proposer::KernelProposer;
use crate::mark_sets::{PairCollection, UpdatableMarkSetCollection};
use crate::metrics::{CoverageMetrics, MetricSample, MetricsRecorder};
use crate::outcome::ProposalOutcome;
use crate::snapshot::{canonical_hash, CfgSnapshot};

/// Tolerance when comparing the cached total energy against a recomputation.
const ENERGY_TOLERANCE: f64 = 1e-6;

/// What happened to one step's proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepOutcome {
    /// The kernel proposed nothing.
    NoChange,
    /// A proposal was made and rejected by the acceptance test.
    Rejected,
    /// A proposal was made and became the chain state.
    Accepted,
}

/// Trace of one chain step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Zero-based step index; initialisation has no index.
    pub iteration: Option<usize>,
    /// Kernel that ran.
    pub kernel: KernelKind,
    /// Outcome.
    pub outcome: StepOutcome,
    /// Density ratio fed to the acceptance test.
    pub density_ratio: Option<f64>,
    /// Acceptance probability.
    pub accept_prob: Option<f64>,
    /// Total energy of the chain state after the step.
    pub energy: f64,
    /// Number of marks after the step.
    pub size: usize,
    /// Ids touched by the proposal.
    pub changed: Vec<MarkId>,
}

/// Counters for one kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStats {
    /// Times the kernel was selected.
    pub proposed: usize,
    /// Times it proposed nothing.
    pub no_change: usize,
    /// Times its proposal was accepted.
    pub accepted: usize,
}

impl KernelStats {
    /// Accepted over selected, zero before the first selection.
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

/// One Markov chain: state, secondary indices, kernels and randomness.
///
/// Steps run strictly in sequence. Independent chains share nothing but the
/// read-only stack and scheme.
///
/// A failed `update_after_accept` may leave some secondary indices updated and
/// others not. The chain then refuses further steps with `stale-indices` until
/// [`Chain::initialise`] rebuilds every index from a fresh state.
#[derive(Debug)]
pub struct Chain<'s> {
    nrg: NrgContext<'s>,
    rng: RngHandle,
    cfg_gen: CfgGen,
    kernels: KernelProposer,
    mark_sets: UpdatableMarkSetCollection,
    pair_collection: String,
    state: Option<CfgNrg>,
    errors: ErrorSink,
    poisson_intensity: f64,
    schedule: TemperatureSchedule,
    iteration: usize,
    stats: BTreeMap<KernelKind, KernelStats>,
    indices_stale: bool,
}

impl<'s> Chain<'s> {
    /// Builds a chain with the stock kernels of `config`.
    pub fn new(
        config: &SamplerConfig,
        stack: &'s EnergyStack,
        scheme: &'s dyn EnergyScheme,
        seed: u64,
    ) -> Result<Self, MppError> {
        config.validate()?;
        Self::with_kernels(config, KernelProposer::from_config(config), stack, scheme, seed)
    }

    /// Builds a chain with a caller-supplied kernel set.
    pub fn with_kernels(
        config: &SamplerConfig,
        mut kernels: KernelProposer,
        stack: &'s EnergyStack,
        scheme: &'s dyn EnergyScheme,
        seed: u64,
    ) -> Result<Self, MppError> {
        let cfg_gen = CfgGen::new(config.marks.kind, config.marks.bounds.clone());
        let probe = cfg_gen.clone().new_template();
        kernels.retain_compatible(&probe);
        if kernels.is_empty() {
            return Err(no_kernel());
        }
        let mut mark_sets = UpdatableMarkSetCollection::new();
        mark_sets.insert(config.pair_collection.clone(), Box::new(PairCollection::new()));
        Ok(Self {
            nrg: NrgContext::new(stack, scheme),
            rng: RngHandle::from_seed(seed),
            cfg_gen,
            kernels,
            mark_sets,
            pair_collection: config.pair_collection.clone(),
            state: None,
            errors: ErrorSink::new(),
            poisson_intensity: config.poisson_intensity,
            schedule: config.schedule.clone(),
            iteration: 0,
            stats: BTreeMap::new(),
            indices_stale: false,
        })
    }

    /// Seeds the chain with the initial kernel, replacing any current state.
    pub fn initialise(&mut self) -> Result<StepRecord, MppError> {
        self.errors.clear();
        let nrg = self.nrg;
        let kernel = self.kernels.initial_mut();
        let outcome = {
            let proposer = ProposerContext::new(&mut self.rng, nrg, &mut self.errors);
            let mut ctx = KernelCalcContext::new(proposer, &mut self.cfg_gen, &self.mark_sets);
            kernel.make_proposal(self.state.as_ref(), &mut ctx)
        };
        let proposed = match outcome {
            ProposalOutcome::Proposed(proposed) => proposed,
            ProposalOutcome::NoChange => {
                return Err(MppError::Proposal(ErrorInfo::new(
                    "empty-proposal",
                    "initial kernel proposed nothing",
                )))
            }
            ProposalOutcome::Fatal(err) => {
                warn!(kernel = %kernel.kind(), error = %err, "initialisation failed");
                return Err(err);
            }
        };
        if let Err(err) =
            kernel.update_after_accept(&mut self.mark_sets, self.state.as_ref(), &proposed, nrg)
        {
            warn!(kernel = %kernel.kind(), error = %err, "index rebuild failed");
            self.indices_stale = true;
            return Err(err);
        }
        self.indices_stale = false;
        let changed = kernel.changed_mark_ids().to_vec();
        let kind = kernel.kind();
        info!(marks = proposed.len(), energy = proposed.total(), "chain initialised");
        let record = StepRecord {
            iteration: None,
            kernel: kind,
            outcome: StepOutcome::Accepted,
            density_ratio: None,
            accept_prob: Some(1.0),
            energy: proposed.total(),
            size: proposed.len(),
            changed,
        };
        self.state = Some(proposed);
        Ok(record)
    }

    /// Runs one propose/accept/update cycle. Seeds the chain first if needed.
    ///
    /// A fatal proposal or index failure aborts the step with the state unchanged.
    /// After an index failure the chain only accepts [`Chain::initialise`].
    pub fn step(&mut self) -> Result<StepRecord, MppError> {
        if self.indices_stale {
            return Err(stale_indices());
        }
        if self.state.is_none() {
            return self.initialise();
        }
        self.errors.clear();
        let nrg = self.nrg;
        let index = self.kernels.select(&mut self.rng).ok_or_else(no_kernel)?;
        let kernel = self.kernels.kernel_mut(index).ok_or_else(no_kernel)?;
        let kind = kernel.kind();
        let iteration = self.iteration;
        self.iteration += 1;

        let outcome = {
            let proposer = ProposerContext::new(&mut self.rng, nrg, &mut self.errors);
            let mut ctx = KernelCalcContext::new(proposer, &mut self.cfg_gen, &self.mark_sets);
            kernel.make_proposal(self.state.as_ref(), &mut ctx)
        };
        let stats = self.stats.entry(kind).or_default();
        stats.proposed += 1;

        let (existing_size, existing_total) = self
            .state
            .as_ref()
            .map(|s| (s.len(), s.total()))
            .unwrap_or((0, 0.0));
        let proposed = match outcome {
            ProposalOutcome::Proposed(proposed) => proposed,
            ProposalOutcome::NoChange => {
                stats.no_change += 1;
                return Ok(StepRecord {
                    iteration: Some(iteration),
                    kernel: kind,
                    outcome: StepOutcome::NoChange,
                    density_ratio: None,
                    accept_prob: None,
                    energy: existing_total,
                    size: existing_size,
                    changed: Vec::new(),
                });
            }
            ProposalOutcome::Fatal(err) => {
                warn!(iteration, kernel = %kind, error = %err, "fatal proposal");
                return Err(err);
            }
        };

        let temperature = self.schedule.temperature(iteration);
        let density_ratio = ((existing_total - proposed.total()) / temperature).exp();
        let accept_prob = kernel.calc_accept_prob(
            existing_size,
            proposed.len(),
            self.poisson_intensity,
            nrg.stack.extent(),
            density_ratio,
        );
        let accepted = self.rng.next_double() < accept_prob;
        debug!(iteration, kernel = %kind, accept_prob, accepted, "step");

        let changed = kernel.changed_mark_ids().to_vec();
        if !accepted {
            return Ok(StepRecord {
                iteration: Some(iteration),
                kernel: kind,
                outcome: StepOutcome::Rejected,
                density_ratio: Some(density_ratio),
                accept_prob: Some(accept_prob),
                energy: existing_total,
                size: existing_size,
                changed,
            });
        }
        if let Err(err) =
            kernel.update_after_accept(&mut self.mark_sets, self.state.as_ref(), &proposed, nrg)
        {
            warn!(iteration, kernel = %kind, error = %err, "index update failed");
            self.indices_stale = true;
            return Err(err);
        }
        stats.accepted += 1;
        let record = StepRecord {
            iteration: Some(iteration),
            kernel: kind,
            outcome: StepOutcome::Accepted,
            density_ratio: Some(density_ratio),
            accept_prob: Some(accept_prob),
            energy: proposed.total(),
            size: proposed.len(),
            changed,
        };
        self.state = Some(proposed);
        Ok(record)
    }

    /// Whether a failed index update left the secondary indices unusable.
    pub fn indices_stale(&self) -> bool {
        self.indices_stale
    }

    /// Current state, `None` before initialisation.
    pub fn state(&self) -> Option<&CfgNrg> {
        self.state.as_ref()
    }

    /// Secondary indices.
    pub fn mark_sets(&self) -> &UpdatableMarkSetCollection {
        &self.mark_sets
    }

    /// Rejection reasons of the last step.
    pub fn errors(&self) -> &ErrorSink {
        &self.errors
    }

    /// Steps taken since initialisation.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Temperature of the next step.
    pub fn temperature(&self) -> f64 {
        self.schedule.temperature(self.iteration)
    }

    /// Counters per kernel.
    pub fn kernel_stats(&self) -> &BTreeMap<KernelKind, KernelStats> {
        &self.stats
    }

    /// Accepted over selected, per kernel label.
    pub fn acceptance_rates(&self) -> BTreeMap<String, f64> {
        self.stats
            .iter()
            .map(|(kind, stats)| (kind.as_str().to_string(), stats.acceptance_rate()))
            .collect()
    }

    /// Checks the cached energy against a recomputation and the pair index
    /// against a rebuild.
    pub fn check_consistency(&self) -> Result<(), MppError> {
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };
        let recomputed = state.recompute_total(self.nrg)?;
        if (recomputed - state.total()).abs() > ENERGY_TOLERANCE {
            return Err(MppError::Energy(
                ErrorInfo::new("energy-drift", "cached total differs from recomputation")
                    .with_context("cached", state.total().to_string())
                    .with_context("recomputed", recomputed.to_string()),
            ));
        }
        let pairs = self.mark_sets.pairs(&self.pair_collection)?;
        if *pairs != PairCollection::rebuild(state, self.nrg) {
            return Err(MppError::Index(
                ErrorInfo::new("pair-index-drift", "incremental pair index differs from rebuild")
                    .with_context("indexed", pairs.len().to_string()),
            ));
        }
        Ok(())
    }
}

fn no_kernel() -> MppError {
    MppError::Config(
        ErrorInfo::new("no-eligible-kernel", "no kernel can be selected")
            .with_hint("give a positive weight to a kernel compatible with the mark kind"),
    )
}

fn stale_indices() -> MppError {
    MppError::Index(
        ErrorInfo::new("stale-indices", "a failed index update left the chain inconsistent")
            .with_hint("discard the chain or call initialise to rebuild it"),
    )
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainSummary {
    /// Index of the chain within the run.
    pub chain_index: usize,
    /// Seed the chain RNG started from.
    pub seed: u64,
    /// Label from the seed policy.
    pub label: Option<String>,
    /// Counters per kernel label.
    pub kernel_stats: BTreeMap<String, KernelStats>,
    /// Acceptance rate per kernel label.
    pub acceptance_rates: BTreeMap<String, f64>,
    /// Total energy of the final state.
    pub final_energy: f64,
    /// Number of marks in the final state.
    pub final_size: usize,
    /// Canonical hash of the final configuration.
    pub final_hash: String,
    /// Aggregates over the recorded samples.
    pub coverage: CoverageMetrics,
    /// Recorded samples.
    pub samples: Vec<MetricSample>,
    /// Final configuration.
    pub snapshot: CfgSnapshot,
}

/// Runs chain `chain_index` of `config` to completion.
///
/// The chain seed is derived from the master seed and the chain index, so two
/// calls with the same arguments produce identical summaries.
pub fn run_chain(
    config: &SamplerConfig,
    stack: &EnergyStack,
    scheme: &dyn EnergyScheme,
    chain_index: usize,
) -> Result<ChainSummary, MppError> {
    let seed = determinism::chain_seed(config.seed_policy.master_seed, chain_index);
    info!(
        chain_index,
        seed,
        iterations = config.iterations,
        "chain start"
    );
    let mut chain = Chain::new(config, stack, scheme, seed)?;
    chain.initialise()?;

    let mut recorder = MetricsRecorder::new();
    let (mut accepted, mut proposed) = (0usize, 0usize);
    for iteration in 0..config.iterations {
        let temperature = chain.temperature();
        let record = chain.step()?;
        proposed += 1;
        if record.outcome == StepOutcome::Accepted {
            accepted += 1;
        }
        if iteration < config.burn_in || (iteration - config.burn_in) % config.thinning != 0 {
            continue;
        }
        if let Some(state) = chain.state() {
            recorder.push_sample(MetricSample {
                iteration: iteration - config.burn_in,
                temperature,
                energy: state.total(),
                size: state.len(),
                accepted_moves: accepted,
                proposed_moves: proposed,
                cfg_hash: canonical_hash(state.cfg()),
            });
        }
    }

    let empty = CfgNrg::empty();
    let state = chain.state().unwrap_or(&empty);
    let snapshot = CfgSnapshot::capture(state);
    let summary = ChainSummary {
        chain_index,
        seed,
        label: config.seed_policy.label.clone(),
        kernel_stats: chain
            .kernel_stats()
            .iter()
            .map(|(kind, stats)| (kind.as_str().to_string(), *stats))
            .collect(),
        acceptance_rates: chain.acceptance_rates(),
        final_energy: state.total(),
        final_size: state.len(),
        final_hash: snapshot.hash.clone(),
        coverage: recorder.coverage(),
        samples: recorder.into_samples(),
        snapshot,
    };
    info!(
        chain_index,
        final_size = summary.final_size,
        final_energy = summary.final_energy,
        "chain finished"
    );
    Ok(summary)
}
