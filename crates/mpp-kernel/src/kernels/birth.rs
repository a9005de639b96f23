use std::sync::Arc;

use mpp_core::{Extent, MarkId, MppError};
use mpp_mark::{CfgNrg, Mark, NrgContext, VoxelizedMarkMemo};

use crate::context::KernelCalcContext;
use crate::kernel::{
    birth_accept_prob, nothing_pending, stale_accept, BirthDeathProbs, Kernel, KernelKind,
};
use crate::mark_sets::UpdatableMarkSetCollection;
use crate::outcome::ProposalOutcome;
use crate::propose_mark::MarkProposer;

/// Adds `repeats` freshly proposed marks.
#[derive(Debug)]
pub struct BirthKernel {
    marks: Box<dyn MarkProposer>,
    repeats: usize,
    probs: BirthDeathProbs,
    pending: Option<Vec<Arc<VoxelizedMarkMemo>>>,
    changed: Vec<MarkId>,
}

impl BirthKernel {
    /// Creates the kernel. `repeats` is raised to at least one.
    pub fn new(marks: Box<dyn MarkProposer>, repeats: usize, probs: BirthDeathProbs) -> Self {
        Self {
            marks,
            repeats: repeats.max(1),
            probs,
            pending: None,
            changed: Vec::new(),
        }
    }

    /// Marks born per proposal.
    pub fn repeats(&self) -> usize {
        self.repeats
    }

    /// Proposes `repeats` new marks, or `None` as soon as one is refused.
    fn propose_new_marks(
        &self,
        ctx: &mut KernelCalcContext<'_>,
    ) -> Result<Option<Vec<VoxelizedMarkMemo>>, MppError> {
        let mut born = Vec::with_capacity(self.repeats);
        for _ in 0..self.repeats {
            let mut memo = VoxelizedMarkMemo::new(ctx.cfg_gen.new_template());
            if !self.marks.propose(&mut memo, &mut ctx.proposer)? {
                ctx.proposer.errors.add("birth: mark proposer declined");
                return Ok(None);
            }
            born.push(memo);
        }
        Ok(Some(born))
    }

    fn propose(
        &mut self,
        existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> Result<Option<CfgNrg>, MppError> {
        let Some(born) = self.propose_new_marks(ctx)? else {
            return Ok(None);
        };
        let mut proposed = existing.map(CfgNrg::shallow_copy).unwrap_or_default();
        let mut memos = Vec::with_capacity(born.len());
        for memo in born {
            let memo = Arc::new(memo);
            proposed.add(memo.clone(), ctx.nrg())?;
            memos.push(memo);
        }
        self.changed = memos.iter().map(|m| m.id()).collect();
        self.pending = Some(memos);
        Ok(Some(proposed))
    }
}

impl Kernel for BirthKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Birth
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
        proposed_size: usize,
        poisson_intensity: f64,
        extent: &Extent,
        density_ratio: f64,
    ) -> f64 {
        birth_accept_prob(
            &self.probs,
            proposed_size,
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
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        let born = self.pending.take().ok_or_else(|| nothing_pending(self.kind()))?;
        for memo in &born {
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
        self.marks.is_compatible_with(mark)
    }
}
