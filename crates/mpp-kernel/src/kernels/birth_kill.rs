use std::sync::Arc;

use mpp_core::{Extent, MarkId, MppError, Point3, Voxel, FLAG_INSIDE, REGION_INSIDE};
use mpp_mark::{CfgNrg, EnergyStack, Mark, MarkGeometry, NrgContext, VoxelizedMarkMemo};
use tracing::debug;

use crate::config::BirthAndKillConfig;
use crate::context::{KernelCalcContext, ProposerContext};
use crate::kernel::{
    birth_accept_prob, nothing_pending, stale_accept, BirthDeathProbs, Kernel, KernelKind,
};
use crate::mark_sets::UpdatableMarkSetCollection;
use crate::outcome::ProposalOutcome;
use crate::propose_mark::MarkProposer;

#[derive(Debug)]
struct Pending {
    killed: Vec<Arc<VoxelizedMarkMemo>>,
    born: Vec<Arc<VoxelizedMarkMemo>>,
}

/// Births one mark and kills every existing mark it overlaps too much.
///
/// The kill set holds every mark whose overlap ratio with the new mark,
/// `max(overlap / new_size, overlap / existing_size)`, exceeds the threshold.
/// Marks without voxels are always killed. Optionally one more mark is born
/// inside the area freed by the killed marks.
#[derive(Debug)]
pub struct BirthAndKillKernel {
    marks: Box<dyn MarkProposer>,
    probs: BirthDeathProbs,
    config: BirthAndKillConfig,
    pending: Option<Pending>,
    changed: Vec<MarkId>,
}

impl BirthAndKillKernel {
    /// Creates the kernel.
    pub fn new(
        marks: Box<dyn MarkProposer>,
        probs: BirthDeathProbs,
        config: BirthAndKillConfig,
    ) -> Self {
        Self {
            marks,
            probs,
            config,
            pending: None,
            changed: Vec::new(),
        }
    }

    /// Kill-set threshold and additional-birth settings.
    pub fn config(&self) -> &BirthAndKillConfig {
        &self.config
    }

    fn propose(
        &mut self,
        existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> Result<Option<CfgNrg>, MppError> {
        let stack = ctx.proposer.stack();
        let mut born = VoxelizedMarkMemo::new(ctx.cfg_gen.new_template());
        if !self.marks.propose(&mut born, &mut ctx.proposer)? {
            ctx.proposer.errors.add("birth-and-kill: mark proposer declined");
            return Ok(None);
        }
        if born.size(stack) == 0 {
            ctx.proposer
                .errors
                .add(format!("birth-and-kill: {} has no voxels", born.id()));
            return Ok(None);
        }

        let empty = CfgNrg::empty();
        let existing = existing.unwrap_or(&empty);
        let killed = kill_set(existing, &born, self.config.overlap_ratio_threshold, stack);

        let mut extra = None;
        if self.config.enable_additional_birth && !killed.is_empty() {
            if let Some(point) = self.sample_freed_point(&killed, &born, &mut ctx.proposer) {
                let mut mark = born.mark().duplicate();
                mark.set_id(ctx.cfg_gen.next_id());
                mark.shape_mut().set_center(point);
                let memo = VoxelizedMarkMemo::new(mark);
                if memo.size(stack) > 0 {
                    extra = Some(memo);
                }
            }
        }

        let mut proposed = existing.shallow_copy();
        for memo in &killed {
            proposed.remove_by_id(memo.id(), ctx.nrg())?;
        }
        let mut born_memos = vec![Arc::new(born)];
        born_memos.extend(extra.map(Arc::new));
        for memo in &born_memos {
            proposed.add(memo.clone(), ctx.nrg())?;
        }

        debug!(
            killed = killed.len(),
            born = born_memos.len(),
            "birth-and-kill proposal"
        );
        self.changed = killed
            .iter()
            .chain(born_memos.iter())
            .map(|m| m.id())
            .collect();
        self.pending = Some(Pending {
            killed,
            born: born_memos,
        });
        Ok(Some(proposed))
    }

    /// Rejection-samples a voxel inside some killed mark but outside `born`.
    fn sample_freed_point(
        &self,
        killed: &[Arc<VoxelizedMarkMemo>],
        born: &VoxelizedMarkMemo,
        ctx: &mut ProposerContext<'_>,
    ) -> Option<Point3> {
        let extent = ctx.extent();
        for _ in 0..self.config.additional_birth_attempts {
            let victim = killed[ctx.rng.index(killed.len())].mark();
            let bbox = victim.bounding_box(extent, REGION_INSIDE);
            if bbox.is_empty() {
                continue;
            }
            let pick = |rng: &mut mpp_core::RngHandle, lo: i64, hi: i64| {
                lo + rng.index((hi - lo + 1) as usize) as i64
            };
            let voxel = Voxel::new(
                pick(&mut *ctx.rng, bbox.min.x, bbox.max.x),
                pick(&mut *ctx.rng, bbox.min.y, bbox.max.y),
                pick(&mut *ctx.rng, bbox.min.z, bbox.max.z),
            );
            let point = voxel.center();
            let in_victim = victim.eval_point_inside(&point) & FLAG_INSIDE != 0;
            let in_born = born.mark().eval_point_inside(&point) & FLAG_INSIDE != 0;
            if in_victim && !in_born {
                return Some(point);
            }
        }
        ctx.errors.add(format!(
            "birth-and-kill: no freed voxel after {} attempts",
            self.config.additional_birth_attempts
        ));
        None
    }
}

/// Existing marks whose overlap ratio with `born` exceeds `threshold`, plus
/// every mark with no voxels. `born` must have at least one voxel.
pub(crate) fn kill_set(
    existing: &CfgNrg,
    born: &VoxelizedMarkMemo,
    threshold: f64,
    stack: &EnergyStack,
) -> Vec<Arc<VoxelizedMarkMemo>> {
    let born_size = born.size(stack);
    debug_assert!(born_size > 0, "kill_set needs a born mark with voxels");
    let mut killed = Vec::new();
    for other in existing.memos() {
        let other_size = other.size(stack);
        if other_size == 0 {
            killed.push(other.clone());
            continue;
        }
        let overlap = born.overlap_with(other, stack) as f64;
        let ratio = (overlap / born_size as f64).max(overlap / other_size as f64);
        if ratio > threshold {
            killed.push(other.clone());
        }
    }
    killed
}

impl Kernel for BirthAndKillKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::BirthAndKill
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
        let pending = self.pending.take().ok_or_else(|| nothing_pending(self.kind()))?;
        for memo in &pending.killed {
            mark_sets.remove(accepted, memo)?;
        }
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
        self.marks.is_compatible_with(mark)
    }
}
