#![deny(missing_docs)]

//! Reversible-jump proposal kernels and the chain that drives them.
//!
//! Each kernel proposes a new energy-bearing configuration without touching
//! the current one, reports an acceptance probability, and after acceptance
//! replays its change into the chain's secondary indices. [`Chain`] owns one
//! state, one RNG and one set of indices and runs the propose/accept/update
//! cycle; [`run_chain`] wraps it with burn-in, thinning and metrics.

/// Chain driver and run summaries.
pub mod chain;
/// Sampler configuration.
pub mod config;
/// Borrowed contexts handed to kernels and proposers.
pub mod context;
/// Per-chain seed derivation.
pub mod determinism;
/// Kernel contract and acceptance helpers.
pub mod kernel;
/// Weighted kernel selection.
pub mod kernel_proposer;
pub mod kernels;
/// Secondary indices over the configuration.
pub mod mark_sets;
/// Sample recording and coverage aggregates.
pub mod metrics;
/// Three-way proposal result.
pub mod outcome;
/// Whole-configuration proposers.
pub mod propose_cfg;
/// Single-mark proposers.
pub mod propose_mark;
/// Two-into-one proposers.
pub mod propose_merge;
/// One-into-two proposers.
pub mod propose_split;
/// Choosing a mark from a configuration.
pub mod select_mark;
/// Serializable snapshots and canonical hashing.
pub mod snapshot;

pub use chain::{run_chain, Chain, ChainSummary, KernelStats, StepOutcome, StepRecord};
pub use config::{
    BirthAndKillConfig, BirthConfig, InitialConfig, KernelWeights, MarkConfig, SamplerConfig,
    SeedPolicy, TemperatureSchedule,
};
pub use context::{ErrorSink, KernelCalcContext, ProposerContext};
pub use determinism::chain_seed;
pub use kernel::{
    birth_accept_prob, clamp_probability, death_accept_prob, BirthDeathProbs, Kernel, KernelKind,
};
pub use kernel_proposer::KernelProposer;
pub use kernels::{
    BirthAndKillKernel, BirthKernel, DeathKernel, ExchangeKernel, InitialCfgKernel, MergeKernel,
    ReplaceKernel, SplitKernel,
};
pub use mark_sets::{
    Pair, PairCollection, UpdatableMarkSet, UpdatableMarkSetCollection, PAIR_COLLECTION,
};
pub use metrics::{CoverageMetrics, MetricSample, MetricsRecorder};
pub use outcome::ProposalOutcome;
pub use propose_cfg::{ConfigurationProposer, UniformCfgProposer};
pub use propose_mark::{MarkProposer, PerturbMarkProposer, RandomMarkProposer, RepeatMarkProposer};
pub use propose_merge::{CentroidMergeProposer, MergeProposer};
pub use propose_split::{MajorAxisSplitProposer, SplitProposer};
pub use select_mark::{
    ExtractionWeight, MarkFromCfgProposer, UniformMarkSelector, WeightedMarkSelector,
};
pub use snapshot::{canonical_hash, CfgSnapshot};
