#![allow(dead_code)]

use mpp_core::{Extent, MarkId, MppError, RngHandle, Voxel};
use mpp_kernel::{
    ConfigurationProposer, ErrorSink, Kernel, KernelCalcContext, MarkProposer, PairCollection,
    ProposalOutcome, ProposerContext, UpdatableMarkSetCollection, PAIR_COLLECTION,
};
use mpp_mark::{
    Cfg, CfgGen, CfgNrg, Ellipse, EnergyStack, Mark, MarkBounds, MarkKind, MarkShape, NrgContext,
    VoxelizedMarkMemo,
};

/// 48x48 scene with two bright discs.
pub fn stack() -> EnergyStack {
    EnergyStack::from_fn(Extent::planar(48, 48), |v: Voxel| {
        let blob = |cx: f32, cy: f32| {
            let dx = v.x as f32 - cx;
            let dy = v.y as f32 - cy;
            dx * dx + dy * dy <= 25.0
        };
        if blob(12.0, 12.0) || blob(34.0, 30.0) {
            1.0
        } else {
            0.0
        }
    })
}

pub fn disc_shape(cx: f64, cy: f64, r: f64) -> MarkShape {
    MarkShape::Ellipse(Ellipse {
        cx,
        cy,
        a: r,
        b: r,
        angle: 0.0,
    })
}

pub fn disc(id: u64, cx: f64, cy: f64, r: f64) -> Mark {
    Mark::new(MarkId::from_raw(id), disc_shape(cx, cy, r))
}

pub fn id(raw: u64) -> MarkId {
    MarkId::from_raw(raw)
}

pub fn cfg_nrg(marks: Vec<Mark>, nrg: NrgContext<'_>) -> CfgNrg {
    let cfg = Cfg::from_marks(marks).expect("cfg");
    CfgNrg::from_cfg(&cfg, nrg).expect("cfg nrg")
}

/// Places the mark at a fixed shape, keeping its id.
#[derive(Debug, Clone)]
pub struct FixedMarkProposer {
    pub shape: MarkShape,
}

impl MarkProposer for FixedMarkProposer {
    fn propose(
        &self,
        memo: &mut VoxelizedMarkMemo,
        _ctx: &mut ProposerContext<'_>,
    ) -> Result<bool, MppError> {
        *memo.mark_mut().shape_mut() = self.shape.clone();
        Ok(true)
    }

    fn is_compatible_with(&self, mark: &Mark) -> bool {
        mark.kind() == self.shape.kind()
    }
}

/// Mark proposer that refuses every mark.
#[derive(Debug, Clone, Copy)]
pub struct DecliningMarkProposer;

impl MarkProposer for DecliningMarkProposer {
    fn propose(
        &self,
        _memo: &mut VoxelizedMarkMemo,
        _ctx: &mut ProposerContext<'_>,
    ) -> Result<bool, MppError> {
        Ok(false)
    }

    fn is_compatible_with(&self, _mark: &Mark) -> bool {
        true
    }
}

/// Configuration proposer that never produces anything.
#[derive(Debug, Clone, Copy)]
pub struct BarrenCfgProposer;

impl ConfigurationProposer for BarrenCfgProposer {
    fn propose(
        &self,
        _cfg_gen: &mut CfgGen,
        _ctx: &mut ProposerContext<'_>,
    ) -> Result<Option<Cfg>, MppError> {
        Ok(None)
    }
}

/// Scene whose lower-right corner holds NaN intensities.
pub fn poisoned_stack() -> EnergyStack {
    EnergyStack::from_fn(Extent::planar(48, 48), |v: Voxel| {
        if v.x >= 36 && v.y >= 36 {
            f32::NAN
        } else {
            0.0
        }
    })
}

/// Everything a kernel borrows from the chain, owned in one place.
pub struct Harness {
    pub rng: RngHandle,
    pub errors: ErrorSink,
    pub cfg_gen: CfgGen,
    pub mark_sets: UpdatableMarkSetCollection,
}

impl Harness {
    pub fn new(seed: u64) -> Self {
        let mut mark_sets = UpdatableMarkSetCollection::new();
        mark_sets.insert(PAIR_COLLECTION, Box::new(PairCollection::new()));
        Self {
            rng: RngHandle::from_seed(seed),
            errors: ErrorSink::new(),
            cfg_gen: CfgGen::new(MarkKind::Ellipse, MarkBounds::default()),
            mark_sets,
        }
    }

    /// Makes `state` the starting point: ids are reserved and indices rebuilt.
    pub fn init(&mut self, state: &CfgNrg, nrg: NrgContext<'_>) {
        self.cfg_gen.observe_cfg(state.cfg());
        self.mark_sets.init_from(state, nrg).expect("init indices");
    }

    pub fn propose(
        &mut self,
        kernel: &mut dyn Kernel,
        existing: Option<&CfgNrg>,
        nrg: NrgContext<'_>,
    ) -> ProposalOutcome<CfgNrg> {
        self.errors.clear();
        let proposer = ProposerContext::new(&mut self.rng, nrg, &mut self.errors);
        let mut ctx = KernelCalcContext::new(proposer, &mut self.cfg_gen, &self.mark_sets);
        kernel.make_proposal(existing, &mut ctx)
    }

    pub fn accept(
        &mut self,
        kernel: &mut dyn Kernel,
        existing: Option<&CfgNrg>,
        accepted: &CfgNrg,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        kernel.update_after_accept(&mut self.mark_sets, existing, accepted, nrg)
    }

    pub fn pairs(&self) -> &PairCollection {
        self.mark_sets.pairs(PAIR_COLLECTION).expect("pair collection")
    }
}
