use mpp_core::{Extent, RegionMap, RngHandle};
use mpp_mark::{CfgGen, EnergyStack, NrgContext};
use tracing::debug;

use crate::mark_sets::UpdatableMarkSetCollection;

/// Collects human readable rejection reasons for the current proposal.
///
/// Purely diagnostic: nothing reads it to make decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSink {
    messages: Vec<String>,
}

impl ErrorSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reason.
    pub fn add(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(reason = %message, "proposal rejected");
        self.messages.push(message);
    }

    /// Drops all recorded reasons.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Recorded reasons, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// State a proposer may draw on: randomness, the energy stack and a diagnostics sink.
pub struct ProposerContext<'a> {
    /// Chain RNG; every draw advances it.
    pub rng: &'a mut RngHandle,
    /// Stack and scheme the proposal is evaluated against.
    pub nrg: NrgContext<'a>,
    /// Rejection reasons for the current proposal.
    pub errors: &'a mut ErrorSink,
}

impl<'a> ProposerContext<'a> {
    /// Bundles the proposer state.
    pub fn new(rng: &'a mut RngHandle, nrg: NrgContext<'a>, errors: &'a mut ErrorSink) -> Self {
        Self { rng, nrg, errors }
    }

    /// Energy stack.
    pub fn stack(&self) -> &'a EnergyStack {
        self.nrg.stack
    }

    /// Scene extent.
    pub fn extent(&self) -> &'a Extent {
        self.nrg.stack.extent()
    }

    /// Region membership rules.
    pub fn regions(&self) -> &'a RegionMap {
        self.nrg.stack.regions()
    }

    /// Shorter-lived view of the same context.
    pub fn reborrow(&mut self) -> ProposerContext<'_> {
        ProposerContext {
            rng: &mut *self.rng,
            nrg: self.nrg,
            errors: &mut *self.errors,
        }
    }
}

/// Per-call bundle handed to [`crate::kernel::Kernel::make_proposal`].
pub struct KernelCalcContext<'a> {
    /// Randomness, energy stack and diagnostics.
    pub proposer: ProposerContext<'a>,
    /// Template factory and id source.
    pub cfg_gen: &'a mut CfgGen,
    /// Secondary indices, read-only while proposing.
    pub mark_sets: &'a UpdatableMarkSetCollection,
}

impl<'a> KernelCalcContext<'a> {
    /// Bundles the per-call state.
    pub fn new(
        proposer: ProposerContext<'a>,
        cfg_gen: &'a mut CfgGen,
        mark_sets: &'a UpdatableMarkSetCollection,
    ) -> Self {
        Self {
            proposer,
            cfg_gen,
            mark_sets,
        }
    }

    /// Stack and scheme.
    pub fn nrg(&self) -> NrgContext<'a> {
        self.proposer.nrg
    }

    /// Shorter-lived view of the same context, used by composite kernels.
    pub fn reborrow(&mut self) -> KernelCalcContext<'_> {
        KernelCalcContext {
            proposer: self.proposer.reborrow(),
            cfg_gen: &mut *self.cfg_gen,
            mark_sets: self.mark_sets,
        }
    }
}
