use std::fmt;

use indexmap::IndexMap;
use mpp_core::errors::ErrorInfo;
use mpp_core::{MarkId, MppError, RngHandle};
use mpp_mark::{CfgNrg, NrgContext, VoxelizedMarkMemo};
use serde::{Deserialize, Serialize};

/// Default name under which the overlap pair index is registered.
pub const PAIR_COLLECTION: &str = "overlap-pairs";

/// Unordered pair of mark ids, stored with the smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pair {
    first: MarkId,
    second: MarkId,
}

impl Pair {
    /// Creates a normalised pair.
    pub fn new(a: MarkId, b: MarkId) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    /// Smaller id.
    pub fn first(&self) -> MarkId {
        self.first
    }

    /// Larger id.
    pub fn second(&self) -> MarkId {
        self.second
    }

    /// Whether `id` is one of the endpoints.
    pub fn contains(&self, id: MarkId) -> bool {
        self.first == id || self.second == id
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// Secondary index kept in step with configuration mutations.
///
/// After any sequence of calls mirroring the configuration's own mutations,
/// the content must equal what `init_from` on the final configuration yields.
/// `cfg` is always the configuration *after* the mutation.
pub trait UpdatableMarkSet: fmt::Debug + Send + Sync {
    /// Rebuilds the index from scratch.
    fn init_from(&mut self, cfg: &CfgNrg, nrg: NrgContext<'_>) -> Result<(), MppError>;

    /// Reflects the addition of `memo`.
    fn add(
        &mut self,
        cfg: &CfgNrg,
        memo: &VoxelizedMarkMemo,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError>;

    /// Reflects the removal of `memo`.
    fn remove(&mut self, cfg: &CfgNrg, memo: &VoxelizedMarkMemo) -> Result<(), MppError>;

    /// Reflects `old` being replaced by `new` at `index`.
    fn exchange(
        &mut self,
        cfg: &CfgNrg,
        old: &VoxelizedMarkMemo,
        index: usize,
        new: &VoxelizedMarkMemo,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError>;

    /// Downcast to the pair index, if this set is one.
    fn as_pairs(&self) -> Option<&PairCollection> {
        None
    }
}

/// Every pair of marks whose interiors share at least one voxel, weighted by
/// the number of shared voxels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairCollection {
    pairs: IndexMap<Pair, usize>,
}

impl PairCollection {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index for `cfg`.
    pub fn rebuild(cfg: &CfgNrg, nrg: NrgContext<'_>) -> Self {
        let mut out = PairCollection::new();
        let memos = cfg.memos();
        for (i, a) in memos.iter().enumerate() {
            for b in &memos[i + 1..] {
                out.insert_if_overlapping(a, b, nrg);
            }
        }
        out
    }

    /// Number of indexed pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair is indexed.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Weight of `pair`, if indexed.
    pub fn weight(&self, pair: &Pair) -> Option<usize> {
        self.pairs.get(pair).copied()
    }

    /// Whether `pair` is indexed.
    pub fn contains(&self, pair: &Pair) -> bool {
        self.pairs.contains_key(pair)
    }

    /// Indexed pairs with weights, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Pair, &usize)> + '_ {
        self.pairs.iter()
    }

    /// Draws a pair with probability proportional to its weight.
    pub fn sample(&self, rng: &mut RngHandle) -> Option<Pair> {
        let total: usize = self.pairs.values().sum();
        if total == 0 {
            return None;
        }
        let mut target = (rng.next_double() * total as f64) as usize;
        for (pair, weight) in &self.pairs {
            if target < *weight {
                return Some(*pair);
            }
            target -= weight;
        }
        self.pairs.keys().last().copied()
    }

    fn insert_if_overlapping(
        &mut self,
        a: &VoxelizedMarkMemo,
        b: &VoxelizedMarkMemo,
        nrg: NrgContext<'_>,
    ) {
        let overlap = a.overlap_with(b, nrg.stack);
        if overlap > 0 {
            self.pairs.insert(Pair::new(a.id(), b.id()), overlap);
        }
    }

    fn drop_mark(&mut self, id: MarkId) {
        self.pairs.retain(|pair, _| !pair.contains(id));
    }
}

impl UpdatableMarkSet for PairCollection {
    fn init_from(&mut self, cfg: &CfgNrg, nrg: NrgContext<'_>) -> Result<(), MppError> {
        *self = PairCollection::rebuild(cfg, nrg);
        Ok(())
    }

    fn add(
        &mut self,
        cfg: &CfgNrg,
        memo: &VoxelizedMarkMemo,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        if cfg.index_of(memo.id()).is_none() {
            return Err(MppError::Index(
                ErrorInfo::new("add-unknown-mark", "added mark is absent from configuration")
                    .with_context("id", memo.id().to_string()),
            ));
        }
        for other in cfg.memos() {
            if other.id() != memo.id() {
                self.insert_if_overlapping(memo, other, nrg);
            }
        }
        Ok(())
    }

    fn remove(&mut self, cfg: &CfgNrg, memo: &VoxelizedMarkMemo) -> Result<(), MppError> {
        if cfg.index_of(memo.id()).is_some() {
            return Err(MppError::Index(
                ErrorInfo::new("remove-present-mark", "removed mark is still in configuration")
                    .with_context("id", memo.id().to_string()),
            ));
        }
        self.drop_mark(memo.id());
        Ok(())
    }

    fn exchange(
        &mut self,
        cfg: &CfgNrg,
        old: &VoxelizedMarkMemo,
        index: usize,
        new: &VoxelizedMarkMemo,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        if cfg.memo(index).map(|m| m.id()) != Some(new.id()) {
            return Err(MppError::Index(
                ErrorInfo::new("exchange-mismatch", "exchanged mark not found at index")
                    .with_context("index", index.to_string())
                    .with_context("id", new.id().to_string()),
            ));
        }
        self.drop_mark(old.id());
        for other in cfg.memos() {
            if other.id() != new.id() {
                self.insert_if_overlapping(new, other, nrg);
            }
        }
        Ok(())
    }

    fn as_pairs(&self) -> Option<&PairCollection> {
        Some(self)
    }
}

/// Named secondary indices owned by one chain.
#[derive(Debug, Default)]
pub struct UpdatableMarkSetCollection {
    sets: IndexMap<String, Box<dyn UpdatableMarkSet>>,
}

impl UpdatableMarkSetCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `set` under `name`, replacing any previous set of that name.
    pub fn insert(&mut self, name: impl Into<String>, set: Box<dyn UpdatableMarkSet>) {
        self.sets.insert(name.into(), set);
    }

    /// Number of registered sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no set is registered.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Looks up a set by name.
    pub fn get(&self, name: &str) -> Option<&dyn UpdatableMarkSet> {
        self.sets.get(name).map(|set| set.as_ref())
    }

    /// Looks up a pair index by name.
    pub fn pairs(&self, name: &str) -> Result<&PairCollection, MppError> {
        self.get(name).and_then(|set| set.as_pairs()).ok_or_else(|| {
            MppError::Index(
                ErrorInfo::new("missing-pair-collection", "no pair collection under this name")
                    .with_context("name", name),
            )
        })
    }

    /// Rebuilds every set from `cfg`.
    pub fn init_from(&mut self, cfg: &CfgNrg, nrg: NrgContext<'_>) -> Result<(), MppError> {
        for set in self.sets.values_mut() {
            set.init_from(cfg, nrg)?;
        }
        Ok(())
    }

    /// Forwards an addition to every set. Stops at the first failing set, so
    /// earlier sets keep the change; callers treat an error as fatal.
    pub fn add(
        &mut self,
        cfg: &CfgNrg,
        memo: &VoxelizedMarkMemo,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        for set in self.sets.values_mut() {
            set.add(cfg, memo, nrg)?;
        }
        Ok(())
    }

    /// Forwards a removal to every set.
    pub fn remove(&mut self, cfg: &CfgNrg, memo: &VoxelizedMarkMemo) -> Result<(), MppError> {
        for set in self.sets.values_mut() {
            set.remove(cfg, memo)?;
        }
        Ok(())
    }

    /// Forwards an exchange to every set.
    pub fn exchange(
        &mut self,
        cfg: &CfgNrg,
        old: &VoxelizedMarkMemo,
        index: usize,
        new: &VoxelizedMarkMemo,
        nrg: NrgContext<'_>,
    ) -> Result<(), MppError> {
        for set in self.sets.values_mut() {
            set.exchange(cfg, old, index, new, nrg)?;
        }
        Ok(())
    }
}
