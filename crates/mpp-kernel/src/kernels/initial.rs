use mpp_core::errors::ErrorInfo;
use mpp_core::{Extent, MarkId, MppError};
use mpp_mark::{CfgNrg, Mark, NrgContext};

use crate::context::KernelCalcContext;
use crate::kernel::{nothing_pending, Kernel, KernelKind};
use crate::mark_sets::UpdatableMarkSetCollection;
use crate::outcome::ProposalOutcome;
use crate::propose_cfg::ConfigurationProposer;

/// Seeds the chain with a configuration from a [`ConfigurationProposer`].
///
/// Any prior state is ignored, so calling it again reseeds. A proposer that
/// returns nothing is a fatal error since the chain cannot start without it.
#[derive(Debug)]
pub struct InitialCfgKernel {
    proposer: Box<dyn ConfigurationProposer>,
    pending: bool,
    changed: Vec<MarkId>,
}

impl InitialCfgKernel {
    /// Creates the kernel.
    pub fn new(proposer: Box<dyn ConfigurationProposer>) -> Self {
        Self {
            proposer,
            pending: false,
            changed: Vec::new(),
        }
    }

    fn propose(&mut self, ctx: &mut KernelCalcContext<'_>) -> Result<Option<CfgNrg>, MppError> {
        let cfg = self
            .proposer
            .propose(ctx.cfg_gen, &mut ctx.proposer)?
            .ok_or_else(|| {
                MppError::Proposal(
                    ErrorInfo::new("empty-proposal", "configuration proposer produced nothing")
                        .with_hint("check the initial mark count and radius bounds"),
                )
            })?;
        ctx.cfg_gen.observe_cfg(&cfg);
        let proposed = CfgNrg::from_cfg(&cfg, ctx.nrg())?;
        self.changed = cfg.ids();
        self.pending = true;
        Ok(Some(proposed))
    }
}

impl Kernel for InitialCfgKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::InitialConfiguration
    }

    fn make_proposal(
        &mut self,
        _existing: Option<&CfgNrg>,
        ctx: &mut KernelCalcContext<'_>,
    ) -> ProposalOutcome<CfgNrg> {
        self.pending = false;
        self.changed.clear();
        self.propose(ctx).into()
    }

    fn calc_accept_prob(
        &self,
        _existing_size: usize,
        _proposed_size: usize,
        _poisson_intensity: f64,
        _extent: &Extent,
        _density_ratio: f64,
    ) -> f64 {
        1.0
    }

    fn update_after_accept(
        &mut self,
        mark_sets: &mut UpdatableMarkSetCollection,
        _existing: Option<&CfgNrg>,
        accepted: &CfgNrg,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        if !std::mem::take(&mut self.pending) {
            return Err(nothing_pending(self.kind()));
        }
        mark_sets.init_from(accepted, nrg)
    }

    fn changed_mark_ids(&self) -> &[MarkId] {
        &self.changed
    }

    fn is_compatible_with(&self, _mark: &Mark) -> bool {
        true
    }
}
