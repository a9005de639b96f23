use mpp_core::{BoundingBox, Point3, Voxel};
use serde::{Deserialize, Serialize};

/// Byte values written for voxels inside and outside a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryValues {
    /// Value for member voxels.
    pub on: u8,
    /// Value for non-member voxels.
    pub off: u8,
}

impl Default for BinaryValues {
    fn default() -> Self {
        Self { on: 255, off: 0 }
    }
}

/// Summary of a rasterized mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskProperties {
    /// Number of member voxels.
    pub voxel_count: usize,
    /// Mean position of member voxels, absent for an empty mask.
    pub center_of_gravity: Option<Point3>,
}

/// Binary mask restricted to a bounding box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMask {
    bbox: BoundingBox,
    values: BinaryValues,
    buffer: Vec<u8>,
}

impl ObjectMask {
    /// Creates a mask with every voxel set to `values.off`.
    pub fn new(bbox: BoundingBox, values: BinaryValues) -> Self {
        Self {
            bbox,
            values,
            buffer: vec![values.off; bbox.volume()],
        }
    }

    /// Box the mask covers.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    fn offset(&self, voxel: &Voxel) -> Option<usize> {
        if !self.bbox.contains(voxel) {
            return None;
        }
        let w = (self.bbox.max.x - self.bbox.min.x + 1) as usize;
        let h = (self.bbox.max.y - self.bbox.min.y + 1) as usize;
        let x = (voxel.x - self.bbox.min.x) as usize;
        let y = (voxel.y - self.bbox.min.y) as usize;
        let z = (voxel.z - self.bbox.min.z) as usize;
        Some((z * h + y) * w + x)
    }

    /// Marks `voxel` as a member. Voxels outside the box are ignored.
    pub fn set_on(&mut self, voxel: &Voxel) {
        if let Some(offset) = self.offset(voxel) {
            self.buffer[offset] = self.values.on;
        }
    }

    /// Whether `voxel` is a member.
    pub fn is_on(&self, voxel: &Voxel) -> bool {
        self.offset(voxel)
            .map(|offset| self.buffer[offset] == self.values.on)
            .unwrap_or(false)
    }

    /// Number of member voxels.
    pub fn count_on(&self) -> usize {
        self.buffer.iter().filter(|v| **v == self.values.on).count()
    }

    /// Raw buffer, x fastest within the box.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}
