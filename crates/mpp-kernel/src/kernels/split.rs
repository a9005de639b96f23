use std::sync::Arc;

use mpp_core::{Extent, MarkId, MppError};
use mpp_mark::{CfgNrg, Mark, NrgContext, VoxelizedMarkMemo};

use crate::context::KernelCalcContext;
use crate::kernel::{clamp_probability, nothing_pending, stale_accept, Kernel, KernelKind};
use crate::mark_sets::UpdatableMarkSetCollection;
use crate::outcome::ProposalOutcome;
use crate::propose_split::SplitProposer;
use crate::select_mark::MarkFromCfgProposer;

#[derive(Debug)]
struct Pending {
    removed: Arc<VoxelizedMarkMemo>,
    born: [Arc<VoxelizedMarkMemo>; 2],
}

/// Replaces one selected mark by two, the dual of [`super::MergeKernel`].
#[derive(Debug)]
pub struct SplitKernel {
    selector: Box<dyn MarkFromCfgProposer>,
    splitter: Box<dyn SplitProposer>,
    pending: Option<Pending>,
    changed: Vec<MarkId>,
}

impl SplitKernel {
    /// Creates the kernel.
    pub fn new(selector: Box<dyn MarkFromCfgProposer>, splitter: Box<dyn SplitProposer>) -> Self {
        Self {
            selector,
            splitter,
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
            ctx.proposer.errors.add("split: configuration is empty");
            return Ok(None);
        };
        let Some(index) = self.selector.select(existing, &mut ctx.proposer) else {
            ctx.proposer.errors.add("split: no mark selected");
            return Ok(None);
        };
        let Some(source) = existing.memo(index) else {
            return Ok(None);
        };
        let template = ctx.cfg_gen.new_template();
        let Some((first, mut second)) =
            self.splitter.propose(source, &template, &mut ctx.proposer)?
        else {
            return Ok(None);
        };
        second.set_id(ctx.cfg_gen.next_id());
        let born = [
            Arc::new(VoxelizedMarkMemo::new(first)),
            Arc::new(VoxelizedMarkMemo::new(second)),
        ];
        let stack = ctx.proposer.stack();
        if born.iter().any(|memo| memo.size(stack) == 0) {
            ctx.proposer
                .errors
                .add(format!("split: a part of {} has no voxels", source.id()));
            return Ok(None);
        }

        let mut proposed = existing.shallow_copy();
        let removed = proposed.remove(index, ctx.nrg())?;
        for memo in &born {
            proposed.add(memo.clone(), ctx.nrg())?;
        }
        self.changed = vec![removed.id(), born[0].id(), born[1].id()];
        self.pending = Some(Pending { removed, born });
        Ok(Some(proposed))
    }
}

impl Kernel for SplitKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Split
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
        clamp_probability(density_ratio)
    }

    fn update_after_accept(
        &mut self,
        mark_sets: &mut UpdatableMarkSetCollection,
        _existing: Option<&CfgNrg>,
        accepted: &CfgNrg,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        let pending = self.pending.take().ok_or_else(|| nothing_pending(self.kind()))?;
        mark_sets.remove(accepted, &pending.removed)?;
        for memo in &pending.born {
            if accepted.index_of(memo.id()).is_none() {
                return Err(stale_accept(self.kind(), memo.id()));
            }
            mark_sets.add(accepted, memo, nrg)?;
        }
        Ok(())
    }

    fn changed_mark_ids(&self) -> &[MarkId] {
        &self.changed
    }

    fn is_compatible_with(&self, mark: &Mark) -> bool {
        self.splitter.is_compatible_with(mark)
    }
}
