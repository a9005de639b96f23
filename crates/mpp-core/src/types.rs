use serde::{Deserialize, Serialize};

/// Continuous point in scene coordinates. 2D marks leave `z` at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Point3 {
    /// Creates a point from its coordinates.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Integer voxel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Voxel {
    /// X index.
    pub x: i64,
    /// Y index.
    pub y: i64,
    /// Z index.
    pub z: i64,
}

impl Voxel {
    /// Creates a voxel coordinate.
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Centre of the voxel as a continuous point.
    pub fn center(&self) -> Point3 {
        Point3::new(self.x as f64, self.y as f64, self.z as f64)
    }
}

/// Size of the scene (image) in voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    /// Width in voxels.
    pub x: usize,
    /// Height in voxels.
    pub y: usize,
    /// Depth in voxels (1 for 2D scenes).
    pub z: usize,
}

impl Extent {
    /// Creates an extent. Zero-sized axes are allowed but yield an empty scene.
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Convenience constructor for a single-slice scene.
    pub const fn planar(x: usize, y: usize) -> Self {
        Self::new(x, y, 1)
    }

    /// Number of voxels in the scene.
    pub fn volume(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Whether the scene has a single z slice.
    pub fn is_planar(&self) -> bool {
        self.z <= 1
    }

    /// Whether `voxel` falls inside the scene.
    pub fn contains(&self, voxel: &Voxel) -> bool {
        voxel.x >= 0
            && voxel.y >= 0
            && voxel.z >= 0
            && (voxel.x as usize) < self.x
            && (voxel.y as usize) < self.y
            && (voxel.z as usize) < self.z
    }

    /// Linear offset of an in-scene voxel (x fastest).
    pub fn offset(&self, voxel: &Voxel) -> Option<usize> {
        if !self.contains(voxel) {
            return None;
        }
        Some((voxel.z as usize * self.y + voxel.y as usize) * self.x + voxel.x as usize)
    }

    /// Bounding box covering the whole scene.
    pub fn full_box(&self) -> BoundingBox {
        BoundingBox::new(
            Voxel::new(0, 0, 0),
            Voxel::new(
                self.x as i64 - 1,
                self.y as i64 - 1,
                self.z.max(1) as i64 - 1,
            ),
        )
    }
}

/// Axis-aligned voxel box with inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Lowest corner (inclusive).
    pub min: Voxel,
    /// Highest corner (inclusive).
    pub max: Voxel,
}

impl BoundingBox {
    /// Creates a box from inclusive corners.
    pub const fn new(min: Voxel, max: Voxel) -> Self {
        Self { min, max }
    }

    /// Whether the box contains no voxel.
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// Number of voxels covered by the box.
    pub fn volume(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.max.x - self.min.x + 1) * (self.max.y - self.min.y + 1) * (self.max.z - self.min.z + 1))
            as usize
    }

    /// Intersection with `other`; may be empty.
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            Voxel::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            Voxel::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        )
    }

    /// Whether `voxel` lies in the box.
    pub fn contains(&self, voxel: &Voxel) -> bool {
        voxel.x >= self.min.x
            && voxel.x <= self.max.x
            && voxel.y >= self.min.y
            && voxel.y <= self.max.y
            && voxel.z >= self.min.z
            && voxel.z <= self.max.z
    }

    /// Iterates every voxel in the box, x fastest.
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + '_ {
        let empty = self.is_empty();
        let (min, max) = (self.min, self.max);
        (min.z..=max.z)
            .filter(move |_| !empty)
            .flat_map(move |z| {
                (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| Voxel::new(x, y, z)))
            })
    }
}
