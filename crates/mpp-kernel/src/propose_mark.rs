use std::f64::consts::PI;
use std::fmt;

use mpp_core::{MppError, Point3, Voxel};
use mpp_mark::{Mark, MarkBounds, MarkGeometry, MarkShape, PointList, VoxelizedMarkMemo};
use serde::{Deserialize, Serialize};

use crate::context::ProposerContext;

/// Mutates a mark in place.
///
/// `Ok(false)` is an ordinary refusal: the memo may have been changed and the
/// caller must discard it. `Err` is a contract violation and is fatal.
pub trait MarkProposer: fmt::Debug + Send + Sync {
    /// Proposes new parameters for the mark held by `memo`.
    fn propose(
        &self,
        memo: &mut VoxelizedMarkMemo,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<bool, MppError>;

    /// Whether the proposer knows how to handle `mark`.
    fn is_compatible_with(&self, mark: &Mark) -> bool;
}

/// Places the mark at a uniformly random position with random size and orientation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomMarkProposer {
    /// Radius limits of generated marks.
    pub bounds: MarkBounds,
}

impl RandomMarkProposer {
    /// Creates the proposer.
    pub fn new(bounds: MarkBounds) -> Self {
        Self { bounds }
    }
}

impl MarkProposer for RandomMarkProposer {
    fn propose(
        &self,
        memo: &mut VoxelizedMarkMemo,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<bool, MppError> {
        let extent = *ctx.extent();
        let rng = &mut *ctx.rng;
        let center = Point3::new(
            rng.uniform(0.0, extent.x as f64),
            rng.uniform(0.0, extent.y as f64),
            if extent.is_planar() {
                0.0
            } else {
                rng.uniform(0.0, extent.z as f64)
            },
        );
        let (lo, hi) = (self.bounds.min_radius, self.bounds.max_radius);
        let shape = match memo.mark().shape() {
            MarkShape::Ellipse(_) => MarkShape::Ellipse(mpp_mark::Ellipse {
                cx: center.x,
                cy: center.y,
                a: rng.uniform(lo, hi),
                b: rng.uniform(lo, hi),
                angle: rng.uniform(0.0, PI),
            }),
            MarkShape::Ellipsoid(_) => MarkShape::Ellipsoid(mpp_mark::Ellipsoid {
                center,
                radii: [rng.uniform(lo, hi), rng.uniform(lo, hi), rng.uniform(lo, hi)],
                angles: [
                    rng.uniform(0.0, PI),
                    rng.uniform(0.0, PI),
                    rng.uniform(0.0, PI),
                ],
            }),
            MarkShape::PointList(_) => {
                let radius = rng.uniform(lo, hi);
                MarkShape::PointList(ball_points(center, radius, extent.is_planar()))
            }
        };
        *memo.mark_mut().shape_mut() = shape;

        if memo.size(ctx.stack()) == 0 {
            ctx.errors.add(format!("{} has no voxels inside the scene", memo.id()));
            return Ok(false);
        }
        Ok(true)
    }

    fn is_compatible_with(&self, _mark: &Mark) -> bool {
        true
    }
}

fn ball_points(center: Point3, radius: f64, planar: bool) -> PointList {
    let r = radius.ceil() as i64;
    let (cx, cy, cz) = (
        center.x.round() as i64,
        center.y.round() as i64,
        center.z.round() as i64,
    );
    let z_range = if planar { 0..=0 } else { -r..=r };
    let mut points = Vec::new();
    for dz in z_range {
        for dy in -r..=r {
            for dx in -r..=r {
                if ((dx * dx + dy * dy + dz * dz) as f64) <= radius * radius {
                    points.push(Voxel::new(cx + dx, cy + dy, cz + dz));
                }
            }
        }
    }
    PointList::new(points)
}

/// Jitters position, size and orientation by bounded uniform steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbMarkProposer {
    /// Largest displacement per axis, in voxels. Radii move by half of it.
    pub step: f64,
    /// Largest rotation per angle, in radians.
    #[serde(default = "default_angle_step")]
    pub angle_step: f64,
    /// Radius limits the perturbed mark must respect.
    #[serde(default)]
    pub bounds: MarkBounds,
}

fn default_angle_step() -> f64 {
    0.2
}

impl PerturbMarkProposer {
    /// Creates the proposer.
    pub fn new(step: f64, bounds: MarkBounds) -> Self {
        Self {
            step,
            angle_step: default_angle_step(),
            bounds,
        }
    }
}

impl MarkProposer for PerturbMarkProposer {
    fn propose(
        &self,
        memo: &mut VoxelizedMarkMemo,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<bool, MppError> {
        let extent = *ctx.extent();
        let (step, turn) = (self.step, self.angle_step);
        let rng = &mut *ctx.rng;
        let shift = Point3::new(
            rng.uniform(-step, step),
            rng.uniform(-step, step),
            if extent.is_planar() {
                0.0
            } else {
                rng.uniform(-step, step)
            },
        );
        let id = memo.id();
        let old_center = memo.mark().center_point();
        let admitted = match memo.mark_mut().shape_mut() {
            MarkShape::Ellipse(e) => {
                e.cx += shift.x;
                e.cy += shift.y;
                e.a += rng.uniform(-step / 2.0, step / 2.0);
                e.b += rng.uniform(-step / 2.0, step / 2.0);
                e.angle += rng.uniform(-turn, turn);
                self.bounds.admits(e.a) && self.bounds.admits(e.b)
            }
            MarkShape::Ellipsoid(e) => {
                e.center.x += shift.x;
                e.center.y += shift.y;
                e.center.z += shift.z;
                for radius in e.radii.iter_mut() {
                    *radius += rng.uniform(-step / 2.0, step / 2.0);
                }
                for angle in e.angles.iter_mut() {
                    *angle += rng.uniform(-turn, turn);
                }
                e.radii.iter().all(|r| self.bounds.admits(*r))
            }
            shape => {
                shape.set_center(Point3::new(
                    old_center.x + shift.x,
                    old_center.y + shift.y,
                    old_center.z + shift.z,
                ));
                true
            }
        };
        if !admitted {
            ctx.errors.add(format!("{id} perturbed outside radius bounds"));
            return Ok(false);
        }
        let center = memo.mark().center_point();
        let inside_scene = center.x >= 0.0
            && center.y >= 0.0
            && center.z >= 0.0
            && center.x < extent.x as f64
            && center.y < extent.y as f64
            && center.z < extent.z.max(1) as f64;
        if !inside_scene || memo.size(ctx.stack()) == 0 {
            ctx.errors.add(format!("{id} perturbed out of the scene"));
            return Ok(false);
        }
        Ok(true)
    }

    fn is_compatible_with(&self, _mark: &Mark) -> bool {
        true
    }
}

/// Retries an inner proposer up to `max_attempts` times.
///
/// Each attempt starts from the original mark. Errors from the inner proposer
/// are returned immediately.
#[derive(Debug)]
pub struct RepeatMarkProposer {
    inner: Box<dyn MarkProposer>,
    max_attempts: usize,
}

impl RepeatMarkProposer {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn MarkProposer>, max_attempts: usize) -> Self {
        Self {
            inner,
            max_attempts,
        }
    }

    /// Retry budget.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl MarkProposer for RepeatMarkProposer {
    fn propose(
        &self,
        memo: &mut VoxelizedMarkMemo,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<bool, MppError> {
        for _ in 0..self.max_attempts {
            let mut attempt = memo.clone();
            if self.inner.propose(&mut attempt, &mut ctx.reborrow())? {
                *memo = attempt;
                return Ok(true);
            }
        }
        ctx.errors.add(format!(
            "no acceptable mark after {} attempts",
            self.max_attempts
        ));
        Ok(false)
    }

    fn is_compatible_with(&self, mark: &Mark) -> bool {
        self.inner.is_compatible_with(mark)
    }
}
