use std::f64::consts::FRAC_PI_2;
use std::fmt;

use mpp_core::errors::ErrorInfo;
use mpp_core::{MppError, Point3};
use mpp_mark::{Ellipse, Ellipsoid, Mark, MarkBounds, MarkShape, PointList, VoxelizedMarkMemo};

use crate::context::ProposerContext;

/// Divides one mark into two.
pub trait SplitProposer: fmt::Debug + Send + Sync {
    /// Proposes two marks replacing `memo`. Both are built from `template`,
    /// which fixes their kind; ids are assigned by the caller.
    fn propose(
        &self,
        memo: &VoxelizedMarkMemo,
        template: &Mark,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<Option<(Mark, Mark)>, MppError>;

    /// Whether the proposer can split marks like `mark`.
    fn is_compatible_with(&self, mark: &Mark) -> bool;
}

/// Cuts the mark across its longest axis at a random fraction in `[0.4, 0.6)`.
///
/// Ellipse and ellipsoid children keep the parent's cross-section and share the
/// major axis in proportion to the cut. Point lists are cut at the matching
/// quantile along the coordinate with the widest spread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MajorAxisSplitProposer {
    bounds: MarkBounds,
}

const CUT_LOW: f64 = 0.4;
const CUT_HIGH: f64 = 0.6;

impl MajorAxisSplitProposer {
    /// Creates the proposer.
    pub fn new(bounds: MarkBounds) -> Self {
        Self { bounds }
    }
}

impl SplitProposer for MajorAxisSplitProposer {
    fn propose(
        &self,
        memo: &VoxelizedMarkMemo,
        template: &Mark,
        ctx: &mut ProposerContext<'_>,
    ) -> Result<Option<(Mark, Mark)>, MppError> {
        let source = memo.mark();
        if source.kind() != template.kind() {
            return Err(MppError::Proposal(
                ErrorInfo::new("split-kind-mismatch", "template kind differs from split mark")
                    .with_context("mark", source.kind().as_str())
                    .with_context("template", template.kind().as_str()),
            ));
        }
        let u = ctx.rng.uniform(CUT_LOW, CUT_HIGH);

        let shapes = match source.shape() {
            MarkShape::Ellipse(e) => {
                let (major, minor, angle) = if e.a >= e.b {
                    (e.a, e.b, e.angle)
                } else {
                    (e.b, e.a, e.angle + FRAC_PI_2)
                };
                let (sin, cos) = angle.sin_cos();
                let child = |half: f64, offset: f64| Ellipse {
                    cx: e.cx + offset * cos,
                    cy: e.cy + offset * sin,
                    a: half,
                    b: minor,
                    angle,
                };
                let first = child(u * major, -(1.0 - u) * major);
                let second = child((1.0 - u) * major, u * major);
                let admitted = [first.a, second.a, minor]
                    .iter()
                    .all(|r| self.bounds.admits(*r));
                admitted.then(|| (MarkShape::Ellipse(first), MarkShape::Ellipse(second)))
            }
            MarkShape::Ellipsoid(e) => {
                let axis = (0..3)
                    .max_by(|i, j| e.radii[*i].total_cmp(&e.radii[*j]))
                    .unwrap_or(0);
                let major = e.radii[axis];
                let dir = e.axis_direction(axis);
                let child = |half: f64, offset: f64| {
                    let mut radii = e.radii;
                    radii[axis] = half;
                    Ellipsoid {
                        center: Point3::new(
                            e.center.x + offset * dir.x,
                            e.center.y + offset * dir.y,
                            e.center.z + offset * dir.z,
                        ),
                        radii,
                        angles: e.angles,
                    }
                };
                let first = child(u * major, -(1.0 - u) * major);
                let second = child((1.0 - u) * major, u * major);
                let admitted = first
                    .radii
                    .iter()
                    .chain(second.radii.iter())
                    .all(|r| self.bounds.admits(*r));
                admitted.then(|| (MarkShape::Ellipsoid(first), MarkShape::Ellipsoid(second)))
            }
            MarkShape::PointList(list) => split_points(list, u),
        };

        let Some((first, second)) = shapes else {
            ctx.errors.add(format!("split of {} rejected", source.id()));
            return Ok(None);
        };
        let mut a = template.duplicate();
        *a.shape_mut() = first;
        let mut b = template.duplicate();
        *b.shape_mut() = second;
        Ok(Some((a, b)))
    }

    fn is_compatible_with(&self, _mark: &Mark) -> bool {
        true
    }
}

fn split_points(list: &PointList, u: f64) -> Option<(MarkShape, MarkShape)> {
    let points = list.points();
    if points.len() < 2 {
        return None;
    }
    let spread = |f: fn(&mpp_core::Voxel) -> i64| {
        let lo = points.iter().map(f).min().unwrap_or(0);
        let hi = points.iter().map(f).max().unwrap_or(0);
        hi - lo
    };
    let spreads = [spread(|p| p.x), spread(|p| p.y), spread(|p| p.z)];
    let axis = (0..3).max_by_key(|i| spreads[*i]).unwrap_or(0);
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| match axis {
        0 => (p.x, p.y, p.z),
        1 => (p.y, p.x, p.z),
        _ => (p.z, p.x, p.y),
    });
    let cut = ((sorted.len() as f64 * u).round() as usize).clamp(1, sorted.len() - 1);
    let second = sorted.split_off(cut);
    Some((
        MarkShape::PointList(PointList::new(sorted)),
        MarkShape::PointList(PointList::new(second)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpp_core::Voxel;

    #[test]
    fn point_list_split_keeps_every_point() {
        let points: Vec<Voxel> = (0..10).map(|x| Voxel::new(x, 0, 0)).collect();
        let (a, b) = split_points(&PointList::new(points), 0.5).unwrap();
        match (a, b) {
            (MarkShape::PointList(a), MarkShape::PointList(b)) => {
                assert_eq!(a.points().len() + b.points().len(), 10);
                assert!(a.points().iter().all(|p| p.x < 5));
            }
            _ => panic!("expected point lists"),
        }
    }

    #[test]
    fn single_point_cannot_split() {
        assert!(split_points(&PointList::new(vec![Voxel::new(0, 0, 0)]), 0.5).is_none());
    }
}
