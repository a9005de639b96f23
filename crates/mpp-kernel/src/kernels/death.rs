use std::sync::Arc;

use mpp_core::{Extent, MarkId, MppError};
use mpp_mark::{CfgNrg, Mark, NrgContext, VoxelizedMarkMemo};

use crate::context::KernelCalcContext;
use crate::kernel::{death_accept_prob, nothing_pending, BirthDeathProbs, Kernel, KernelKind};
use crate::mark_sets::UpdatableMarkSetCollection;
use crate::outcome::ProposalOutcome;

/// Removes one uniformly chosen mark.
#[derive(Debug)]
pub struct DeathKernel {
    probs: BirthDeathProbs,
    pending: Option<Arc<VoxelizedMarkMemo>>,
    changed: Vec<MarkId>,
}

impl DeathKernel {
    /// Creates the kernel.
    pub fn new(probs: BirthDeathProbs) -> Self {
        Self {
            probs,
            pending: None,
            changed: Vec::new(),
        }
    }

    fn propose(
        &mut self,
        existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> Result<Option<CfgNrg>, MppError> {
        let Some(existing) = existing.filter(|cfg| !cfg.is_empty()) else {
            ctx.proposer.errors.add("death: configuration is empty");
            return Ok(None);
        };
        let Some(index) = existing.cfg().random_index(ctx.proposer.rng) else {
            return Ok(None);
        };
        let mut proposed = existing.shallow_copy();
        let removed = proposed.remove(index, ctx.nrg())?;
        self.changed = vec![removed.id()];
        self.pending = Some(removed);
        Ok(Some(proposed))
    }
}

impl Kernel for DeathKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Death
    }

    fn make_proposal(
        &mut self,
        existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> ProposalOutcome<CfgNrg> {
        self.pending = None;
        self.changed.clear();
        self.propose(existing, ctx).into()
    }

    fn calc_accept_prob(
        &self,
        existing_size: usize,
        _proposed_size: usize,
        poisson_intensity: f64,
        extent: &Extent,
        density_ratio: f64,
    ) -> f64 {
        death_accept_prob(
            &self.probs,
            existing_size,
            poisson_intensity,
            extent,
            density_ratio,
        )
    }

    fn update_after_accept(
        &mut self,
        mark_sets: &mut UpdatableMarkSetCollection,
        _existing: Option<&CfgNrg>,
        accepted: &CfgNrg,
        _nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        let removed = self.pending.take().ok_or_else(|| nothing_pending(self.kind()))?;
        mark_sets.remove(accepted, &removed)
    }

    fn changed_mark_ids(&self) -> &[MarkId] {
        &self.changed
    }

    fn is_compatible_with(&self, _mark: &Mark) -> bool {
        true
    }
}
