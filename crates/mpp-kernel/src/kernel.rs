use std::fmt;

use mpp_core::errors::ErrorInfo;
use mpp_core::{Extent, MarkId, MppError};
use mpp_mark::{CfgNrg, Mark, NrgContext};
use serde::{Deserialize, Serialize};

use crate::context::KernelCalcContext;
use crate::mark_sets::UpdatableMarkSetCollection;
use crate::outcome::ProposalOutcome;

/// Kind of move a kernel performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KernelKind {
    /// Seeds the chain with a whole configuration.
    InitialConfiguration,
    /// Adds marks.
    Birth,
    /// Removes one mark.
    Death,
    /// Adds one mark and removes the marks it overlaps.
    BirthAndKill,
    /// Fuses two overlapping marks.
    Merge,
    /// Divides one mark into two.
    Split,
    /// Swaps one mark for a perturbed copy.
    Exchange,
    /// Death followed by birth.
    Replace,
}

impl KernelKind {
    /// Stable label used in logs, metrics and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelKind::InitialConfiguration => "initial",
            KernelKind::Birth => "birth",
            KernelKind::Death => "death",
            KernelKind::BirthAndKill => "birth-and-kill",
            KernelKind::Merge => "merge",
            KernelKind::Split => "split",
            KernelKind::Exchange => "exchange",
            KernelKind::Replace => "replace",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Propose, evaluate and commit contract shared by every move.
///
/// A kernel remembers what it proposed last. [`Kernel::update_after_accept`]
/// consumes that record, so it can run at most once per proposal; the chain
/// calls it only after accepting.
pub trait Kernel: fmt::Debug + Send {
    /// Kind of move.
    fn kind(&self) -> KernelKind;

    /// Proposes a new state from `existing` without touching it.
    fn make_proposal(
        &mut self,
        existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> ProposalOutcome<CfgNrg>;

    /// Acceptance probability in `[0, 1]`. Pure.
    fn calc_accept_prob(
        &self,
        existing_size: usize,
        proposed_size: usize,
        poisson_intensity: f64,
        extent: &Extent,
        density_ratio: f64,
    ) -> f64;

    /// Brings `mark_sets` in line with the accepted transition `existing -> accepted`.
    fn update_after_accept(
        &mut self,
        mark_sets: &mut UpdatableMarkSetCollection,
        existing: Option<&CfgNrg>,
        accepted: &CfgNrg,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError>;

    /// Ids touched by the last proposal.
    fn changed_mark_ids(&self) -> &[MarkId];

    /// Whether this kernel can operate on marks like `mark`.
    fn is_compatible_with(&self, mark: &Mark) -> bool;
}

/// Clamps to `[0, 1]`, mapping NaN to 0.
pub fn clamp_probability(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Proposal asymmetry between birth and death moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BirthDeathProbs {
    /// Probability of choosing a birth move.
    #[serde(default = "default_half")]
    pub prob_birth: f64,
    /// Probability of choosing a death move.
    #[serde(default = "default_half")]
    pub prob_death: f64,
}

fn default_half() -> f64 {
    0.5
}

impl Default for BirthDeathProbs {
    fn default() -> Self {
        Self {
            prob_birth: default_half(),
            prob_death: default_half(),
        }
    }
}

/// `min(1, ratio * pd * V * lambda / (pb * n))`, or 1 when the denominator is zero.
pub fn birth_accept_prob(
    probs: &BirthDeathProbs,
    proposed_size: usize,
    poisson_intensity: f64,
    extent: &Extent,
    density_ratio: f64,
) -> f64 {
    let num = density_ratio * probs.prob_death * extent.volume() as f64 * poisson_intensity;
    let dem = probs.prob_birth * proposed_size as f64;
    if dem == 0.0 {
        return 1.0;
    }
    clamp_probability(num / dem)
}

/// Reverse of [`birth_accept_prob`]. With at most one mark the volume term is
/// dropped and the ratio alone decides.
pub fn death_accept_prob(
    probs: &BirthDeathProbs,
    existing_size: usize,
    poisson_intensity: f64,
    extent: &Extent,
    density_ratio: f64,
) -> f64 {
    if existing_size <= 1 {
        return clamp_probability(density_ratio);
    }
    let num = density_ratio * probs.prob_birth * existing_size as f64;
    let dem = probs.prob_death * extent.volume() as f64 * poisson_intensity;
    if dem == 0.0 {
        return 1.0;
    }
    clamp_probability(num / dem)
}

/// Error returned when `update_after_accept` runs without a pending proposal.
pub(crate) fn nothing_pending(kind: KernelKind) -> MppError {
    MppError::Index(
        ErrorInfo::new(
            "no-pending-proposal",
            "update_after_accept called without an accepted proposal",
        )
        .with_context("kernel", kind.as_str())
        .with_hint("call update_after_accept once, right after accepting"),
    )
}

/// Error returned when a proposal's bookkeeping disagrees with the accepted state.
pub(crate) fn stale_accept(kind: KernelKind, id: MarkId) -> MppError {
    MppError::Index(
        ErrorInfo::new("stale-accept", "accepted state does not contain the proposed mark")
            .with_context("kernel", kind.as_str())
            .with_context("id", id.to_string()),
    )
}
