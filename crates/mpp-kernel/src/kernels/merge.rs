use std::sync::Arc;

use mpp_core::{Extent, MarkId, MppError};
use mpp_mark::{CfgNrg, Mark, NrgContext, VoxelizedMarkMemo};

use crate::context::KernelCalcContext;
use crate::kernel::{clamp_probability, nothing_pending, stale_accept, Kernel, KernelKind};
use crate::mark_sets::{Pair, UpdatableMarkSetCollection};
use crate::outcome::ProposalOutcome;
use crate::propose_merge::MergeProposer;

#[derive(Debug)]
struct Pending {
    // Higher configuration index first.
    removed: [Arc<VoxelizedMarkMemo>; 2],
    merged: Arc<VoxelizedMarkMemo>,
}

/// Fuses the two marks of a pair sampled from a named pair index.
///
/// Stale pairs (an endpoint no longer in the configuration) are ordinary
/// rejections. A missing pair index is fatal.
#[derive(Debug)]
pub struct MergeKernel {
    merger: Box<dyn MergeProposer>,
    pair_collection: String,
    pending: Option<Pending>,
    changed: Vec<MarkId>,
}

impl MergeKernel {
    /// Creates the kernel sampling from the pair index named `pair_collection`.
    pub fn new(merger: Box<dyn MergeProposer>, pair_collection: impl Into<String>) -> Self {
        Self {
            merger,
            pair_collection: pair_collection.into(),
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
            ctx.proposer.errors.add("merge: no configuration");
            return Ok(None);
        };
        let mark_sets = ctx.mark_sets;
        let pairs = mark_sets.pairs(&self.pair_collection)?;
        let Some(pair) = pairs.sample(ctx.proposer.rng) else {
            ctx.proposer.errors.add("merge: no overlapping pair");
            return Ok(None);
        };
        let (Some(first), Some(second)) =
            (existing.index_of(pair.first()), existing.index_of(pair.second()))
        else {
            ctx.proposer.errors.add(format!("merge: stale pair {pair}"));
            return Ok(None);
        };
        let (Some(a), Some(b)) = (existing.memo(first), existing.memo(second)) else {
            return Ok(None);
        };
        let Some(mut merged) = self.merger.propose(a, b, &mut ctx.proposer)? else {
            ctx.proposer.errors.add(format!("merge: proposer declined {pair}"));
            return Ok(None);
        };
        merged.set_id(ctx.cfg_gen.next_id());
        let merged = Arc::new(VoxelizedMarkMemo::new(merged));

        let (high, low) = if first > second {
            (first, second)
        } else {
            (second, first)
        };
        let mut proposed = existing.shallow_copy();
        let removed_high = proposed.remove(high, ctx.nrg())?;
        let removed_low = proposed.remove(low, ctx.nrg())?;
        proposed.add(merged.clone(), ctx.nrg())?;

        self.changed = vec![pair.first(), pair.second(), merged.id()];
        self.pending = Some(Pending {
            removed: [removed_high, removed_low],
            merged,
        });
        Ok(Some(proposed))
    }

    /// Name of the pair index sampled.
    pub fn pair_collection(&self) -> &str {
        &self.pair_collection
    }

    /// Pair merged by the last proposal, if any.
    pub fn last_pair(&self) -> Option<Pair> {
        match self.changed.as_slice() {
            [a, b, _] => Some(Pair::new(*a, *b)),
            _ => None,
        }
    }
}

impl Kernel for MergeKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Merge
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
        for memo in &pending.removed {
            mark_sets.remove(accepted, memo)?;
        }
        if accepted.index_of(pending.merged.id()).is_none() {
            return Err(stale_accept(self.kind(), pending.merged.id()));
        }
        mark_sets.add(accepted, &pending.merged, nrg)
    }

    fn changed_mark_ids(&self) -> &[MarkId] {
        &self.changed
    }

    fn is_compatible_with(&self, mark: &Mark) -> bool {
        self.merger.is_compatible_with(mark)
    }
}
