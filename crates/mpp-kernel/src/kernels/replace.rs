use mpp_core::{Extent, MarkId, MppError};
use mpp_mark::{CfgNrg, Mark, NrgContext};

use crate::context::KernelCalcContext;
use crate::kernel::{clamp_probability, nothing_pending, Kernel, KernelKind};
use crate::kernels::{BirthKernel, DeathKernel};
use crate::mark_sets::UpdatableMarkSetCollection;
use crate::outcome::ProposalOutcome;

/// Death followed by birth, accepted or rejected as one move.
///
/// Needs an existing configuration. Birth runs only when death produced a
/// state; the intermediate state is kept so both inner updates can replay the
/// two transitions in order.
#[derive(Debug)]
pub struct ReplaceKernel {
    death: DeathKernel,
    birth: BirthKernel,
    post_death: Option<CfgNrg>,
    changed: Vec<MarkId>,
}

impl ReplaceKernel {
    /// Wraps a death and a birth kernel.
    pub fn new(death: DeathKernel, birth: BirthKernel) -> Self {
        Self {
            death,
            birth,
            post_death: None,
            changed: Vec::new(),
        }
    }

    fn propose(
        &mut self,
        existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> Result<Option<CfgNrg>, MppError> {
        if existing.is_none() {
            ctx.proposer.errors.add("replace: no configuration");
            return Ok(None);
        }
        let Some(post_death) = self.death.make_proposal(existing, ctx).into_result()? else {
            return Ok(None);
        };
        let Some(proposed) = self
            .birth
            .make_proposal(Some(&post_death), ctx)
            .into_result()?
        else {
            return Ok(None);
        };
        self.changed = self
            .death
            .changed_mark_ids()
            .iter()
            .chain(self.birth.changed_mark_ids())
            .copied()
            .collect();
        self.post_death = Some(post_death);
        Ok(Some(proposed))
    }
}

impl Kernel for ReplaceKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Replace
    }

    fn make_proposal(
        &mut self,
        existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> ProposalOutcome<CfgNrg> {
        self.post_death = None;
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
        existing: Option<&CfgNrg>,
        accepted: &CfgNrg,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        let post_death = self
            .post_death
            .take()
            .ok_or_else(|| nothing_pending(self.kind()))?;
        self.death
            .update_after_accept(mark_sets, existing, &post_death, nrg)?;
        self.birth
            .update_after_accept(mark_sets, Some(&post_death), accepted, nrg)
    }

    fn changed_mark_ids(&self) -> &[MarkId] {
        &self.changed
    }

    fn is_compatible_with(&self, mark: &Mark) -> bool {
        self.death.is_compatible_with(mark) && self.birth.is_compatible_with(mark)
    }
}
