use std::f64::consts::PI;

use mpp_core::{
    BoundingBox, Extent, MarkId, Point3, RegionMembership, Voxel, FLAG_INSIDE, FLAG_SHELL,
    REGION_INSIDE, REGION_SHELL,
};
use serde::{Deserialize, Serialize};

use crate::mask::{BinaryValues, MaskProperties, ObjectMask};

/// Scale factor applied to a mark's body to obtain the outer edge of its shell.
pub const SHELL_SCALE: f64 = 1.5;

/// Capability interface every mark variant exposes.
pub trait MarkGeometry {
    /// Geometric centre.
    fn center_point(&self) -> Point3;

    /// Membership flags (`FLAG_INSIDE`, `FLAG_SHELL`) for `point`.
    fn eval_point_inside(&self, point: &Point3) -> u8;

    /// Voxel box enclosing `region`, clipped to the scene. `REGION_INSIDE`
    /// yields the tight body box; any other region yields the shell box.
    fn bounding_box(&self, extent: &Extent, region: u32) -> BoundingBox;

    /// Continuous size of the body (area, volume or point count).
    fn body_size(&self) -> f64;

    /// Rasterizes the voxels matching `membership` into a mask.
    fn calc_mask(
        &self,
        extent: &Extent,
        membership: RegionMembership,
        values: BinaryValues,
    ) -> (ObjectMask, MaskProperties) {
        let region = if membership.is_member(FLAG_SHELL) {
            REGION_SHELL
        } else {
            REGION_INSIDE
        };
        let bbox = self.bounding_box(extent, region);
        let mut mask = ObjectMask::new(bbox, values);
        let mut count = 0usize;
        let mut sum = Point3::default();
        for voxel in bbox.voxels() {
            if membership.is_member(self.eval_point_inside(&voxel.center())) {
                mask.set_on(&voxel);
                count += 1;
                sum.x += voxel.x as f64;
                sum.y += voxel.y as f64;
                sum.z += voxel.z as f64;
            }
        }
        let center_of_gravity = (count > 0).then(|| {
            let n = count as f64;
            Point3::new(sum.x / n, sum.y / n, sum.z / n)
        });
        (
            mask,
            MaskProperties {
                voxel_count: count,
                center_of_gravity,
            },
        )
    }
}

/// Variant tag used to check kernel compatibility and to build templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkKind {
    /// Planar rotated ellipse.
    Ellipse,
    /// Rotated ellipsoid in a volume.
    Ellipsoid,
    /// Explicit set of voxels.
    PointList,
}

impl MarkKind {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkKind::Ellipse => "ellipse",
            MarkKind::Ellipsoid => "ellipsoid",
            MarkKind::PointList => "point-list",
        }
    }
}

/// Planar ellipse lying in the z = 0 slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Center x.
    pub cx: f64,
    /// Center y.
    pub cy: f64,
    /// Semi-axis along the rotated x direction.
    pub a: f64,
    /// Semi-axis along the rotated y direction.
    pub b: f64,
    /// Rotation angle of the `a` axis from +x, in radians.
    pub angle: f64,
}

impl Ellipse {
    fn normalized_sq(&self, point: &Point3) -> f64 {
        if point.z.round() != 0.0 || self.a <= 0.0 || self.b <= 0.0 {
            return f64::INFINITY;
        }
        let (sin, cos) = self.angle.sin_cos();
        let dx = point.x - self.cx;
        let dy = point.y - self.cy;
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        (u / self.a).powi(2) + (v / self.b).powi(2)
    }

    fn half_widths(&self) -> (f64, f64) {
        let (sin, cos) = self.angle.sin_cos();
        let hx = ((self.a * cos).powi(2) + (self.b * sin).powi(2)).sqrt();
        let hy = ((self.a * sin).powi(2) + (self.b * cos).powi(2)).sqrt();
        (hx, hy)
    }
}

/// Rotated ellipsoid. Rotation is applied as `Rz * Ry * Rx`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Centre.
    pub center: Point3,
    /// Semi-axes along the local x, y, z directions.
    pub radii: [f64; 3],
    /// Rotation angles about x, y, z in radians.
    pub angles: [f64; 3],
}

impl Ellipsoid {
    fn rotation(&self) -> [[f64; 3]; 3] {
        let (sx, cx) = self.angles[0].sin_cos();
        let (sy, cy) = self.angles[1].sin_cos();
        let (sz, cz) = self.angles[2].sin_cos();
        [
            [cz * cy, cz * sy * sx - sz * cx, cz * sy * cx + sz * sx],
            [sz * cy, sz * sy * sx + cz * cx, sz * sy * cx - cz * sx],
            [-sy, cy * sx, cy * cx],
        ]
    }

    /// Unit vector of local axis `axis` (0, 1 or 2) in scene coordinates.
    pub fn axis_direction(&self, axis: usize) -> Point3 {
        let rot = self.rotation();
        let k = axis.min(2);
        Point3::new(rot[0][k], rot[1][k], rot[2][k])
    }

    /// Angles that rotate the local x axis onto `direction`.
    ///
    /// Returns zero angles for a zero-length direction.
    pub fn angles_towards(direction: Point3) -> [f64; 3] {
        let norm = direction.distance(&Point3::default());
        if norm <= f64::EPSILON {
            return [0.0; 3];
        }
        let (dx, dy, dz) = (direction.x / norm, direction.y / norm, direction.z / norm);
        [0.0, (-dz).clamp(-1.0, 1.0).asin(), dy.atan2(dx)]
    }

    fn normalized_sq(&self, point: &Point3) -> f64 {
        if self.radii.iter().any(|r| *r <= 0.0) {
            return f64::INFINITY;
        }
        let rot = self.rotation();
        let d = [
            point.x - self.center.x,
            point.y - self.center.y,
            point.z - self.center.z,
        ];
        let mut total = 0.0;
        for axis in 0..3 {
            // local = R^T d
            let local = rot[0][axis] * d[0] + rot[1][axis] * d[1] + rot[2][axis] * d[2];
            total += (local / self.radii[axis]).powi(2);
        }
        total
    }

    fn half_widths(&self) -> [f64; 3] {
        let rot = self.rotation();
        let mut half = [0.0; 3];
        for (row, out) in rot.iter().zip(half.iter_mut()) {
            *out = row
                .iter()
                .zip(self.radii.iter())
                .map(|(r, radius)| (r * radius).powi(2))
                .sum::<f64>()
                .sqrt();
        }
        half
    }
}

/// Mark defined by an explicit set of voxels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointList {
    points: Vec<Voxel>,
}

impl PointList {
    /// Creates a point list; duplicates are removed and points sorted.
    pub fn new(mut points: Vec<Voxel>) -> Self {
        points.sort_unstable();
        points.dedup();
        Self { points }
    }

    /// Member voxels in sorted order.
    pub fn points(&self) -> &[Voxel] {
        &self.points
    }

    fn contains(&self, voxel: &Voxel) -> bool {
        self.points.binary_search(voxel).is_ok()
    }

    fn raw_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.points {
            min = Voxel::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Voxel::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
        Some(BoundingBox::new(min, max))
    }
}

/// Variant payload of a mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MarkShape {
    /// Planar ellipse.
    Ellipse(Ellipse),
    /// Ellipsoid.
    Ellipsoid(Ellipsoid),
    /// Explicit voxel set.
    PointList(PointList),
}

impl MarkShape {
    /// Variant tag of the payload.
    pub fn kind(&self) -> MarkKind {
        match self {
            MarkShape::Ellipse(_) => MarkKind::Ellipse,
            MarkShape::Ellipsoid(_) => MarkKind::Ellipsoid,
            MarkShape::PointList(_) => MarkKind::PointList,
        }
    }

    /// Moves the shape so that its centre lies at `center`.
    pub fn set_center(&mut self, center: Point3) {
        match self {
            MarkShape::Ellipse(e) => {
                e.cx = center.x;
                e.cy = center.y;
            }
            MarkShape::Ellipsoid(e) => e.center = center,
            MarkShape::PointList(list) => {
                let current = point_list_center(list);
                let dx = (center.x - current.x).round() as i64;
                let dy = (center.y - current.y).round() as i64;
                let dz = (center.z - current.z).round() as i64;
                let moved = list
                    .points
                    .iter()
                    .map(|p| Voxel::new(p.x + dx, p.y + dy, p.z + dz))
                    .collect();
                *list = PointList::new(moved);
            }
        }
    }
}

fn point_list_center(list: &PointList) -> Point3 {
    if list.points.is_empty() {
        return Point3::default();
    }
    let n = list.points.len() as f64;
    let (sx, sy, sz) = list.points.iter().fold((0.0, 0.0, 0.0), |acc, p| {
        (acc.0 + p.x as f64, acc.1 + p.y as f64, acc.2 + p.z as f64)
    });
    Point3::new(sx / n, sy / n, sz / n)
}

fn flags_from_normalized(d_sq: f64) -> u8 {
    if d_sq <= 1.0 {
        FLAG_INSIDE
    } else if d_sq <= SHELL_SCALE * SHELL_SCALE {
        FLAG_SHELL
    } else {
        0
    }
}

fn box_around(center: Point3, half: [f64; 3], extent: &Extent) -> BoundingBox {
    let raw = BoundingBox::new(
        Voxel::new(
            (center.x - half[0]).floor() as i64,
            (center.y - half[1]).floor() as i64,
            (center.z - half[2]).floor() as i64,
        ),
        Voxel::new(
            (center.x + half[0]).ceil() as i64,
            (center.y + half[1]).ceil() as i64,
            (center.z + half[2]).ceil() as i64,
        ),
    );
    raw.intersect(&extent.full_box())
}

/// A geometric primitive with an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    id: MarkId,
    shape: MarkShape,
}

impl Mark {
    /// Creates a mark from its id and payload.
    pub fn new(id: MarkId, shape: MarkShape) -> Self {
        Self { id, shape }
    }

    /// Identifier of the mark.
    pub fn id(&self) -> MarkId {
        self.id
    }

    /// Reassigns the identifier (used when a proposer commits a new mark).
    pub fn set_id(&mut self, id: MarkId) {
        self.id = id;
    }

    /// Variant tag.
    pub fn kind(&self) -> MarkKind {
        self.shape.kind()
    }

    /// Variant payload.
    pub fn shape(&self) -> &MarkShape {
        &self.shape
    }

    /// Mutable variant payload.
    pub fn shape_mut(&mut self) -> &mut MarkShape {
        &mut self.shape
    }

    /// Independent copy carrying the same id.
    pub fn duplicate(&self) -> Mark {
        self.clone()
    }
}

impl MarkGeometry for Mark {
    fn center_point(&self) -> Point3 {
        match &self.shape {
            MarkShape::Ellipse(e) => Point3::new(e.cx, e.cy, 0.0),
            MarkShape::Ellipsoid(e) => e.center,
            MarkShape::PointList(list) => point_list_center(list),
        }
    }

    fn eval_point_inside(&self, point: &Point3) -> u8 {
        match &self.shape {
            MarkShape::Ellipse(e) => flags_from_normalized(e.normalized_sq(point)),
            MarkShape::Ellipsoid(e) => flags_from_normalized(e.normalized_sq(point)),
            MarkShape::PointList(list) => {
                let voxel = Voxel::new(
                    point.x.round() as i64,
                    point.y.round() as i64,
                    point.z.round() as i64,
                );
                if list.contains(&voxel) {
                    return FLAG_INSIDE;
                }
                let near = (-1..=1).any(|dz| {
                    (-1..=1).any(|dy| {
                        (-1..=1).any(|dx| {
                            list.contains(&Voxel::new(voxel.x + dx, voxel.y + dy, voxel.z + dz))
                        })
                    })
                });
                if near {
                    FLAG_SHELL
                } else {
                    0
                }
            }
        }
    }

    fn bounding_box(&self, extent: &Extent, region: u32) -> BoundingBox {
        let scale = if region == REGION_INSIDE {
            1.0
        } else {
            SHELL_SCALE
        };
        match &self.shape {
            MarkShape::Ellipse(e) => {
                let (hx, hy) = e.half_widths();
                box_around(
                    Point3::new(e.cx, e.cy, 0.0),
                    [hx * scale, hy * scale, 0.0],
                    extent,
                )
            }
            MarkShape::Ellipsoid(e) => {
                let half = e.half_widths();
                box_around(
                    e.center,
                    [half[0] * scale, half[1] * scale, half[2] * scale],
                    extent,
                )
            }
            MarkShape::PointList(list) => match list.raw_box() {
                Some(raw) => {
                    let grow = if region == REGION_INSIDE { 0 } else { 1 };
                    BoundingBox::new(
                        Voxel::new(raw.min.x - grow, raw.min.y - grow, raw.min.z - grow),
                        Voxel::new(raw.max.x + grow, raw.max.y + grow, raw.max.z + grow),
                    )
                    .intersect(&extent.full_box())
                }
                None => BoundingBox::new(Voxel::new(0, 0, 0), Voxel::new(-1, -1, -1)),
            },
        }
    }

    fn body_size(&self) -> f64 {
        match &self.shape {
            MarkShape::Ellipse(e) => PI * e.a * e.b,
            MarkShape::Ellipsoid(e) => 4.0 / 3.0 * PI * e.radii[0] * e.radii[1] * e.radii[2],
            MarkShape::PointList(list) => list.points.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_ellipse_box_is_symmetric() {
        let e = Ellipse {
            cx: 10.0,
            cy: 10.0,
            a: 4.0,
            b: 2.0,
            angle: PI / 2.0,
        };
        let (hx, hy) = e.half_widths();
        assert!((hx - 2.0).abs() < 1e-9);
        assert!((hy - 4.0).abs() < 1e-9);
    }

    #[test]
    fn angles_towards_aligns_local_x() {
        let dir = Point3::new(1.0, 2.0, -0.5);
        let e = Ellipsoid {
            center: Point3::default(),
            radii: [3.0, 1.0, 1.0],
            angles: Ellipsoid::angles_towards(dir),
        };
        let axis = e.axis_direction(0);
        let n = dir.distance(&Point3::default());
        assert!((axis.x - dir.x / n).abs() < 1e-9);
        assert!((axis.y - dir.y / n).abs() < 1e-9);
        assert!((axis.z - dir.z / n).abs() < 1e-9);
    }

    #[test]
    fn point_list_dedups_and_sorts() {
        let list = PointList::new(vec![
            Voxel::new(2, 0, 0),
            Voxel::new(1, 0, 0),
            Voxel::new(2, 0, 0),
        ]);
        assert_eq!(list.points(), &[Voxel::new(1, 0, 0), Voxel::new(2, 0, 0)]);
    }
}
