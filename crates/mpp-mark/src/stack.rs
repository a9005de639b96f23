use mpp_core::errors::ErrorInfo;
use mpp_core::{Extent, MppError, RegionMap, Voxel};

/// Read-only image data the energy is evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyStack {
    extent: Extent,
    channel: Vec<f32>,
    regions: RegionMap,
}

impl EnergyStack {
    /// Wraps an intensity channel laid out x fastest. The length must match the extent.
    pub fn new(extent: Extent, channel: Vec<f32>, regions: RegionMap) -> Result<Self, MppError> {
        if channel.len() != extent.volume() {
            return Err(MppError::Energy(
                ErrorInfo::new("stack-size-mismatch", "channel length differs from extent volume")
                    .with_context("expected", extent.volume().to_string())
                    .with_context("actual", channel.len().to_string()),
            ));
        }
        Ok(Self {
            extent,
            channel,
            regions,
        })
    }

    /// Builds a stack by evaluating `f` at every voxel, using the default region map.
    pub fn from_fn<F>(extent: Extent, f: F) -> Self
    where
        F: Fn(Voxel) -> f32,
    {
        let channel = extent.full_box().voxels().map(f).collect();
        Self {
            extent,
            channel,
            regions: RegionMap::default(),
        }
    }

    /// Scene extent.
    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// Region rules used when voxelizing marks.
    pub fn regions(&self) -> &RegionMap {
        &self.regions
    }

    /// Intensity at a linear offset.
    pub fn intensity(&self, offset: usize) -> f64 {
        self.channel.get(offset).copied().unwrap_or(0.0) as f64
    }
}
