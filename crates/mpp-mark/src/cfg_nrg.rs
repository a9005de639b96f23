use std::sync::Arc;

use mpp_core::errors::ErrorInfo;
use mpp_core::{MarkId, MppError};

use crate::cfg::Cfg;
use crate::energy::{ensure_finite, NrgContext};
use crate::memo::VoxelizedMarkMemo;

#[derive(Debug, Clone, Default)]
struct CfgNrgInner {
    cfg: Cfg,
    memos: Vec<Arc<VoxelizedMarkMemo>>,
    mark_energies: Vec<f64>,
    total: f64,
}

/// Configuration with cached voxel memos and a running total energy.
///
/// Cloning (see [`CfgNrg::shallow_copy`]) is O(1): both copies share one
/// inner state until either is mutated, at which point the mutating copy takes
/// its own index while the memos themselves stay shared.
///
/// Every mutation computes its energy delta before touching the state, so an
/// error leaves the configuration exactly as it was.
#[derive(Debug, Clone, Default)]
pub struct CfgNrg {
    inner: Arc<CfgNrgInner>,
}

impl CfgNrg {
    /// Empty configuration with zero energy.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Voxelizes and scores every mark of `cfg`.
    pub fn from_cfg(cfg: &Cfg, nrg: NrgContext<'_>) -> Result<Self, MppError> {
        let mut out = CfgNrg::empty();
        for mark in cfg.iter() {
            out.add(VoxelizedMarkMemo::from_shared(mark.clone()), nrg)?;
        }
        Ok(out)
    }

    /// Cheap copy sharing all unmodified memos.
    pub fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// Cached total energy.
    pub fn total(&self) -> f64 {
        self.inner.total
    }

    /// Number of marks.
    pub fn len(&self) -> usize {
        self.inner.memos.len()
    }

    /// Whether there are no marks.
    pub fn is_empty(&self) -> bool {
        self.inner.memos.is_empty()
    }

    /// Underlying configuration.
    pub fn cfg(&self) -> &Cfg {
        &self.inner.cfg
    }

    /// Memos in configuration order.
    pub fn memos(&self) -> &[Arc<VoxelizedMarkMemo>] {
        &self.inner.memos
    }

    /// Memo at `index`.
    pub fn memo(&self, index: usize) -> Option<&Arc<VoxelizedMarkMemo>> {
        self.inner.memos.get(index)
    }

    /// Position of the mark with `id`.
    pub fn index_of(&self, id: MarkId) -> Option<usize> {
        self.inner.memos.iter().position(|m| m.id() == id)
    }

    /// Memo of the mark with `id`.
    pub fn memo_for_id(&self, id: MarkId) -> Option<&Arc<VoxelizedMarkMemo>> {
        self.index_of(id).and_then(|index| self.memo(index))
    }

    /// Individual energy of the mark at `index`.
    pub fn mark_energy(&self, index: usize) -> Option<f64> {
        self.inner.mark_energies.get(index).copied()
    }

    /// Adds a memo and updates the total.
    pub fn add(
        &mut self,
        memo: impl Into<Arc<VoxelizedMarkMemo>>,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        let memo = memo.into();
        if self.index_of(memo.id()).is_some() {
            return Err(duplicate_id(memo.id()));
        }
        let own = nrg.scheme.mark_energy(&memo, nrg.stack)?;
        let pairs = self.pair_sum(&memo, None, nrg)?;
        let total = ensure_finite("configuration total", self.total() + own + pairs)?;

        let inner = Arc::make_mut(&mut self.inner);
        inner.cfg.push(memo.shared_mark().clone())?;
        inner.memos.push(memo);
        inner.mark_energies.push(own);
        inner.total = total;
        Ok(())
    }

    /// Removes the memo at `index` and returns it.
    pub fn remove(
        &mut self,
        index: usize,
        nrg: NrgContext<'_>,
    ) -> Result<Arc<VoxelizedMarkMemo>, MppError> {
        let memo = self.memo(index).cloned().ok_or_else(|| out_of_range(index, self.len()))?;
        let own = self.inner.mark_energies[index];
        let pairs = self.pair_sum(&memo, Some(index), nrg)?;
        let total = ensure_finite("configuration total", self.total() - own - pairs)?;

        let inner = Arc::make_mut(&mut self.inner);
        inner.cfg.remove(index);
        inner.memos.remove(index);
        inner.mark_energies.remove(index);
        inner.total = total;
        Ok(memo)
    }

    /// Removes the memo of the mark with `id`.
    pub fn remove_by_id(
        &mut self,
        id: MarkId,
        nrg: NrgContext<'_>,
    ) -> Result<Arc<VoxelizedMarkMemo>, MppError> {
        let index = self.index_of(id).ok_or_else(|| {
            MppError::Proposal(
                ErrorInfo::new("unknown-mark", "mark id not present in configuration")
                    .with_context("id", id.to_string()),
            )
        })?;
        self.remove(index, nrg)
    }

    /// Replaces the memo at `index` with `memo`, keeping the position.
    pub fn exchange(
        &mut self,
        index: usize,
        memo: impl Into<Arc<VoxelizedMarkMemo>>,
        nrg: NrgContext<'_>,
    ) -> Result<Arc<VoxelizedMarkMemo>, MppError> {
        let memo = memo.into();
        let old = self.memo(index).cloned().ok_or_else(|| out_of_range(index, self.len()))?;
        if let Some(existing) = self.index_of(memo.id()) {
            if existing != index {
                return Err(duplicate_id(memo.id()));
            }
        }
        let old_own = self.inner.mark_energies[index];
        let old_pairs = self.pair_sum(&old, Some(index), nrg)?;
        let new_own = nrg.scheme.mark_energy(&memo, nrg.stack)?;
        let new_pairs = self.pair_sum(&memo, Some(index), nrg)?;
        let total = ensure_finite(
            "configuration total",
            self.total() - old_own - old_pairs + new_own + new_pairs,
        )?;

        let inner = Arc::make_mut(&mut self.inner);
        inner.cfg.replace(index, memo.shared_mark().clone());
        inner.memos[index] = memo;
        inner.mark_energies[index] = new_own;
        inner.total = total;
        Ok(old)
    }

    /// Recomputes the total from scratch, ignoring the cache.
    pub fn recompute_total(&self, nrg: NrgContext<'_>) -> Result<f64, MppError> {
        let mut total = 0.0;
        for (i, memo) in self.memos().iter().enumerate() {
            total += nrg.scheme.mark_energy(memo, nrg.stack)?;
            for other in &self.memos()[i + 1..] {
                total += nrg.scheme.pair_energy(memo, other, nrg.stack)?;
            }
        }
        ensure_finite("configuration total", total)
    }

    fn pair_sum(
        &self,
        memo: &VoxelizedMarkMemo,
        skip: Option<usize>,
        nrg: NrgContext<'_>,
    ) -> Result<f64, MppError> {
        let mut sum = 0.0;
        for (i, other) in self.memos().iter().enumerate() {
            if Some(i) == skip {
                continue;
            }
            sum += nrg.scheme.pair_energy(memo, other, nrg.stack)?;
        }
        Ok(sum)
    }
}

fn duplicate_id(id: MarkId) -> MppError {
    MppError::Proposal(
        ErrorInfo::new("duplicate-mark-id", "mark id already present in configuration")
            .with_context("id", id.to_string()),
    )
}

fn out_of_range(index: usize, len: usize) -> MppError {
    MppError::Proposal(
        ErrorInfo::new("index-out-of-range", "memo index outside configuration")
            .with_context("index", index.to_string())
            .with_context("len", len.to_string()),
    )
}
