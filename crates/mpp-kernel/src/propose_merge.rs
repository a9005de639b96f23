use std::f64::consts::PI;
use std::fmt;

use mpp_core::errors::ErrorInfo;
use mpp_core::{MppError, Point3};
use mpp_mark::{
    Ellipse, Ellipsoid, Mark, MarkBounds, MarkGeometry, MarkShape, PointList, VoxelizedMarkMemo,
};

use crate::context::ProposerContext;

/// Combines two marks into one.
pub trait MergeProposer: fmt::Debug + Send + Sync {
    /// Proposes a merged mark. The returned mark's id is provisional; the
    /// caller assigns a fresh one.
    fn propose(
        &self,
        a: &VoxelizedMarkMemo,
        b: &VoxelizedMarkMemo,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<Option<Mark>, MppError>;

    /// Whether the proposer can merge marks like `mark`.
    fn is_compatible_with(&self, mark: &Mark) -> bool;
}

/// Merges around the size-weighted centroid, conserving total body size and
/// elongating along the line joining the two centres. Point lists are unioned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentroidMergeProposer {
    bounds: MarkBounds,
}

impl CentroidMergeProposer {
    /// Creates the proposer.
    pub fn new(bounds: MarkBounds) -> Self {
        Self { bounds }
    }
}

impl MergeProposer for CentroidMergeProposer {
    fn propose(
        &self,
        a: &VoxelizedMarkMemo,
        b: &VoxelizedMarkMemo,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<Option<Mark>, MppError> {
        let (ma, mb) = (a.mark(), b.mark());
        let (size_a, size_b) = (ma.body_size(), mb.body_size());
        let total = size_a + size_b;
        let (ca, cb) = (ma.center_point(), mb.center_point());
        let center = if total > 0.0 {
            Point3::new(
                (ca.x * size_a + cb.x * size_b) / total,
                (ca.y * size_a + cb.y * size_b) / total,
                (ca.z * size_a + cb.z * size_b) / total,
            )
        } else {
            Point3::new((ca.x + cb.x) / 2.0, (ca.y + cb.y) / 2.0, (ca.z + cb.z) / 2.0)
        };
        let direction = Point3::new(cb.x - ca.x, cb.y - ca.y, cb.z - ca.z);
        let half_gap = ca.distance(&cb) / 2.0;

        let shape = match (ma.shape(), mb.shape()) {
            (MarkShape::Ellipse(ea), MarkShape::Ellipse(eb)) => {
                let mean_minor = (ea.a.min(ea.b) + eb.a.min(eb.b)) / 2.0;
                let major = (total / PI).sqrt().max(half_gap + mean_minor);
                let minor = total / (PI * major);
                let angle = if half_gap > 0.0 {
                    direction.y.atan2(direction.x)
                } else {
                    ea.angle
                };
                MarkShape::Ellipse(Ellipse {
                    cx: center.x,
                    cy: center.y,
                    a: major,
                    b: minor,
                    angle,
                })
            }
            (MarkShape::Ellipsoid(ea), MarkShape::Ellipsoid(eb)) => {
                let min_radius = |e: &Ellipsoid| e.radii.iter().copied().fold(f64::MAX, f64::min);
                let mean_minor = (min_radius(ea) + min_radius(eb)) / 2.0;
                let equal = (3.0 * total / (4.0 * PI)).cbrt();
                let major = equal.max(half_gap + mean_minor);
                let minor = (3.0 * total / (4.0 * PI * major)).sqrt();
                let angles = if half_gap > 0.0 {
                    Ellipsoid::angles_towards(direction)
                } else {
                    ea.angles
                };
                MarkShape::Ellipsoid(Ellipsoid {
                    center,
                    radii: [major, minor, minor],
                    angles,
                })
            }
            (MarkShape::PointList(la), MarkShape::PointList(lb)) => {
                let mut points = la.points().to_vec();
                points.extend_from_slice(lb.points());
                return Ok(Some(Mark::new(
                    ma.id(),
                    MarkShape::PointList(PointList::new(points)),
                )));
            }
            _ => return Err(kind_mismatch(ma, mb)),
        };

        let admitted = match &shape {
            MarkShape::Ellipse(e) => self.bounds.admits(e.a) && self.bounds.admits(e.b),
            MarkShape::Ellipsoid(e) => e.radii.iter().all(|r| self.bounds.admits(*r)),
            MarkShape::PointList(_) => true,
        };
        if !admitted {
            ctx.errors
                .add(format!("merge of {} and {} exceeds radius bounds", ma.id(), mb.id()));
            return Ok(None);
        }
        Ok(Some(Mark::new(ma.id(), shape)))
    }

    fn is_compatible_with(&self, _mark: &Mark) -> bool {
        true
    }
}

fn kind_mismatch(a: &Mark, b: &Mark) -> MppError {
    MppError::Proposal(
        ErrorInfo::new("merge-kind-mismatch", "cannot merge marks of different kinds")
            .with_context("first", a.kind().as_str())
            .with_context("second", b.kind().as_str()),
    )
}
