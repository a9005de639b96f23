use std::sync::Arc;

use mpp_core::{Extent, MarkId, MppError};
use mpp_mark::{CfgNrg, Mark, NrgContext, VoxelizedMarkMemo};

use crate::context::KernelCalcContext;
use crate::kernel::{clamp_probability, nothing_pending, Kernel, KernelKind};
use crate::mark_sets::UpdatableMarkSetCollection;
use crate::outcome::ProposalOutcome;
use crate::propose_mark::MarkProposer;

#[derive(Debug)]
struct Pending {
    index: usize,
    old: Arc<VoxelizedMarkMemo>,
    new: Arc<VoxelizedMarkMemo>,
}

/// Swaps a random mark for a reshaped copy that keeps its id and position
/// in the configuration.
#[derive(Debug)]
pub struct ExchangeKernel {
    marks: Box<dyn MarkProposer>,
    pending: Option<Pending>,
    changed: Vec<MarkId>,
}

impl ExchangeKernel {
    /// Creates the kernel.
    pub fn new(marks: Box<dyn MarkProposer>) -> Self {
        Self {
            marks,
            pending: None,
            changed: Vec::new(),
        }
    }

    fn propose(
        &mut self,
        existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> Result<Option<CfgNrg>, MppError> {
        let Some(existing) = existing else {
            ctx.proposer.errors.add("exchange: no configuration");
            return Ok(None);
        };
        let Some(index) = existing.cfg().random_index(ctx.proposer.rng) else {
            ctx.proposer.errors.add("exchange: configuration is empty");
            return Ok(None);
        };
        let Some(original) = existing.memo(index) else {
            return Ok(None);
        };
        let mut candidate = VoxelizedMarkMemo::clone(original);
        if !self.marks.propose(&mut candidate, &mut ctx.proposer)? {
            ctx.proposer
                .errors
                .add(format!("exchange: mark proposer declined {}", original.id()));
            return Ok(None);
        }
        let candidate = Arc::new(candidate);
        let mut proposed = existing.shallow_copy();
        let old = proposed.exchange(index, candidate.clone(), ctx.nrg())?;
        self.changed = vec![candidate.id()];
        self.pending = Some(Pending {
            index,
            old,
            new: candidate,
        });
        Ok(Some(proposed))
    }
}

impl Kernel for ExchangeKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Exchange
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
        _existing_size: usize,
        _proposed_size: usize,
        _poisson_intensity: f64,
        _extent: &Extent,
        density_ratio: f64,
    ) -> f64 {
        clamp_probability(density_ratio.min(1.0))
    }

    fn update_after_accept(
        &mut self,
        mark_sets: &mut UpdatableMarkSetCollection,
        _existing: Option<&CfgNrg>,
        accepted: &CfgNrg,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        let pending = self.pending.take().ok_or_else(|| nothing_pending(self.kind()))?;
        mark_sets.exchange(accepted, &pending.old, pending.index, &pending.new, nrg)
    }

    fn changed_mark_ids(&self) -> &[MarkId] {
        &self.changed
    }

    fn is_compatible_with(&self, mark: &Mark) -> bool {
        self.marks.is_compatible_with(mark)
    }
}
