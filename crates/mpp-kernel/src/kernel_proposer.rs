use mpp_core::RngHandle;
use mpp_mark::Mark;
use tracing::debug;

use crate::config::SamplerConfig;
use crate::kernel::{Kernel, KernelKind};
use crate::kernels::{
    BirthAndKillKernel, BirthKernel, DeathKernel, ExchangeKernel, InitialCfgKernel, MergeKernel,
    ReplaceKernel, SplitKernel,
};
use crate::propose_cfg::UniformCfgProposer;
use crate::propose_mark::{PerturbMarkProposer, RandomMarkProposer, RepeatMarkProposer};
use crate::propose_merge::CentroidMergeProposer;
use crate::propose_split::MajorAxisSplitProposer;
use crate::select_mark::WeightedMarkSelector;

const EXCHANGE_ATTEMPTS: usize = 5;

/// Chooses the kernel for each step.
///
/// The initial kernel is held apart and used once to seed the chain. The rest
/// are drawn in proportion to their weights.
#[derive(Debug)]
pub struct KernelProposer {
    initial: Box<dyn Kernel>,
    kernels: Vec<(Box<dyn Kernel>, u32)>,
}

impl KernelProposer {
    /// Creates a proposer with only the initial kernel.
    pub fn new(initial: Box<dyn Kernel>) -> Self {
        Self {
            initial,
            kernels: Vec::new(),
        }
    }

    /// Builds the stock kernel set described by `config`. Kernels with zero
    /// weight are left out.
    pub fn from_config(config: &SamplerConfig) -> Self {
        let bounds = config.marks.bounds.clone();
        let probs = config.birth_death;
        let initial = InitialCfgKernel::new(Box::new(UniformCfgProposer::new(
            config.initial.marks,
            Box::new(RepeatMarkProposer::new(
                Box::new(RandomMarkProposer::new(bounds.clone())),
                config.initial.attempts.max(1),
            )),
        )));
        let birth = || {
            BirthKernel::new(
                Box::new(RandomMarkProposer::new(bounds.clone())),
                config.birth.repeats,
                probs,
            )
        };

        let stock: [Box<dyn Kernel>; 7] = [
            Box::new(birth()),
            Box::new(DeathKernel::new(probs)),
            Box::new(BirthAndKillKernel::new(
                Box::new(RandomMarkProposer::new(bounds.clone())),
                probs,
                config.birth_and_kill.clone(),
            )),
            Box::new(MergeKernel::new(
                Box::new(CentroidMergeProposer::new(bounds.clone())),
                config.pair_collection.clone(),
            )),
            Box::new(SplitKernel::new(
                Box::new(WeightedMarkSelector::new(config.marks.split_selection)),
                Box::new(MajorAxisSplitProposer::new(bounds.clone())),
            )),
            Box::new(ExchangeKernel::new(Box::new(RepeatMarkProposer::new(
                Box::new(PerturbMarkProposer::new(
                    config.marks.perturb_step,
                    bounds.clone(),
                )),
                EXCHANGE_ATTEMPTS,
            )))),
            Box::new(ReplaceKernel::new(DeathKernel::new(probs), birth())),
        ];

        let mut proposer = KernelProposer::new(Box::new(initial));
        for kernel in stock {
            let weight = config.kernels.weight(kernel.kind());
            proposer.add(kernel, weight);
        }
        proposer
    }

    /// Registers `kernel` with selection weight `weight`; zero weights are ignored.
    pub fn add(&mut self, kernel: Box<dyn Kernel>, weight: u32) {
        if weight == 0 {
            return;
        }
        self.kernels.push((kernel, weight));
    }

    /// Drops kernels that cannot operate on marks like `probe`.
    pub fn retain_compatible(&mut self, probe: &Mark) {
        self.kernels.retain(|(kernel, _)| {
            let keep = kernel.is_compatible_with(probe);
            if !keep {
                debug!(kernel = %kernel.kind(), mark = probe.kind().as_str(), "kernel dropped");
            }
            keep
        });
    }

    /// Kinds of the selectable kernels, in registration order.
    pub fn kinds(&self) -> Vec<KernelKind> {
        self.kernels.iter().map(|(k, _)| k.kind()).collect()
    }

    /// Number of selectable kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Whether no kernel is selectable.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// The seeding kernel.
    pub fn initial_mut(&mut self) -> &mut dyn Kernel {
        self.initial.as_mut()
    }

    /// Draws a kernel index in proportion to the weights.
    pub fn select(&self, rng: &mut RngHandle) -> Option<usize> {
        let total: u64 = self.kernels.iter().map(|(_, w)| u64::from(*w)).sum();
        if total == 0 {
            return None;
        }
        let mut target = (rng.next_double() * total as f64) as u64;
        for (index, (_, weight)) in self.kernels.iter().enumerate() {
            let weight = u64::from(*weight);
            if target < weight {
                return Some(index);
            }
            target -= weight;
        }
        Some(self.kernels.len() - 1)
    }

    /// Kernel at `index`.
    pub fn kernel_mut(&mut self, index: usize) -> Option<&mut dyn Kernel> {
        let (kernel, _) = self.kernels.get_mut(index)?;
        let kernel: &mut dyn Kernel = kernel.as_mut();
        Some(kernel)
    }
}
