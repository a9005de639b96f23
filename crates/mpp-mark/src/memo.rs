use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use mpp_core::{MarkId, REGION_INSIDE, REGION_SHELL};
use tracing::trace;

use crate::mark::{Mark, MarkGeometry};
use crate::stack::EnergyStack;

/// Voxel statistics of one region of a mark.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionStats {
    /// Region identifier.
    pub region: u32,
    /// Sorted linear offsets of member voxels.
    pub voxels: Vec<usize>,
    /// Sum of intensities.
    pub sum: f64,
    /// Sum of squared intensities.
    pub sum_sq: f64,
}

impl RegionStats {
    /// Number of member voxels.
    pub fn count(&self) -> usize {
        self.voxels.len()
    }

    /// Mean intensity, `None` for an empty region.
    pub fn mean(&self) -> Option<f64> {
        (!self.voxels.is_empty()).then(|| self.sum / self.voxels.len() as f64)
    }
}

/// Per-region statistics of a voxelized mark.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoxelStats {
    regions: Vec<RegionStats>,
}

impl VoxelStats {
    /// Voxelizes `mark` against every region registered in the stack.
    pub fn compute(mark: &Mark, stack: &EnergyStack) -> Self {
        let extent = stack.extent();
        let bbox = mark.bounding_box(extent, REGION_SHELL);
        let mut regions: Vec<(RegionStats, _)> = stack
            .regions()
            .iter()
            .map(|(id, membership)| {
                (
                    RegionStats {
                        region: id,
                        ..RegionStats::default()
                    },
                    membership,
                )
            })
            .collect();
        for voxel in bbox.voxels() {
            let flags = mark.eval_point_inside(&voxel.center());
            if flags == 0 {
                continue;
            }
            let Some(offset) = extent.offset(&voxel) else {
                continue;
            };
            let value = stack.intensity(offset);
            for (stats, membership) in regions.iter_mut() {
                if membership.is_member(flags) {
                    stats.voxels.push(offset);
                    stats.sum += value;
                    stats.sum_sq += value * value;
                }
            }
        }
        let regions = regions
            .into_iter()
            .map(|(mut stats, _)| {
                stats.voxels.sort_unstable();
                stats
            })
            .collect();
        Self { regions }
    }

    /// Statistics for `region`, if the stack registers it.
    pub fn region(&self, region: u32) -> Option<&RegionStats> {
        self.regions.iter().find(|r| r.region == region)
    }

    /// Voxel count of the mark interior.
    pub fn inside_count(&self) -> usize {
        self.region(REGION_INSIDE).map(RegionStats::count).unwrap_or(0)
    }
}

/// Lazily voxelized mark.
///
/// The statistics are computed on first access and dropped whenever the mark is
/// mutated through [`VoxelizedMarkMemo::mark_mut`]. Clones share the mark until
/// one of them mutates it.
#[derive(Debug, Clone)]
pub struct VoxelizedMarkMemo {
    mark: Arc<Mark>,
    stats: OnceLock<Arc<VoxelStats>>,
}

impl VoxelizedMarkMemo {
    /// Wraps a mark with an empty cache.
    pub fn new(mark: Mark) -> Self {
        Self::from_shared(Arc::new(mark))
    }

    /// Wraps an already shared mark.
    pub fn from_shared(mark: Arc<Mark>) -> Self {
        Self {
            mark,
            stats: OnceLock::new(),
        }
    }

    /// The wrapped mark.
    pub fn mark(&self) -> &Mark {
        &self.mark
    }

    /// Shared handle to the wrapped mark.
    pub fn shared_mark(&self) -> &Arc<Mark> {
        &self.mark
    }

    /// Id of the wrapped mark.
    pub fn id(&self) -> MarkId {
        self.mark.id()
    }

    /// Mutable access to the mark; invalidates the cached statistics.
    pub fn mark_mut(&mut self) -> &mut Mark {
        self.reset();
        Arc::make_mut(&mut self.mark)
    }

    /// Drops the cached statistics.
    pub fn reset(&mut self) {
        self.stats = OnceLock::new();
    }

    /// Whether statistics are currently cached.
    pub fn is_computed(&self) -> bool {
        self.stats.get().is_some()
    }

    /// Statistics against `stack`, computed on first use.
    pub fn stats(&self, stack: &EnergyStack) -> &VoxelStats {
        self.stats.get_or_init(|| {
            let stats = VoxelStats::compute(&self.mark, stack);
            trace!(mark = %self.mark.id(), inside = stats.inside_count(), "voxelized");
            Arc::new(stats)
        })
    }

    /// Interior voxel count.
    pub fn size(&self, stack: &EnergyStack) -> usize {
        self.stats(stack).inside_count()
    }

    /// Number of voxels shared by the interiors of `self` and `other`.
    pub fn overlap_with(&self, other: &VoxelizedMarkMemo, stack: &EnergyStack) -> usize {
        let (Some(a), Some(b)) = (
            self.stats(stack).region(REGION_INSIDE),
            other.stats(stack).region(REGION_INSIDE),
        ) else {
            return 0;
        };
        sorted_intersection_count(&a.voxels, &b.voxels)
    }
}

fn sorted_intersection_count(a: &[usize], b: &[usize]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}
