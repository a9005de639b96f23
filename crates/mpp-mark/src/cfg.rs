use std::sync::Arc;

use mpp_core::errors::ErrorInfo;
use mpp_core::{MarkId, MppError, Point3, RngHandle};
use serde::{Deserialize, Serialize};

use crate::mark::{Ellipse, Ellipsoid, Mark, MarkKind, MarkShape, PointList};

/// Ordered collection of marks with unique ids.
///
/// Cloning copies the index but shares the marks themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cfg {
    marks: Vec<Arc<Mark>>,
}

impl Cfg {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration, rejecting duplicate ids.
    pub fn from_marks(marks: impl IntoIterator<Item = Mark>) -> Result<Self, MppError> {
        let mut cfg = Cfg::new();
        for mark in marks {
            cfg.push(Arc::new(mark))?;
        }
        Ok(cfg)
    }

    /// Number of marks.
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Whether the configuration has no marks.
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Mark at `index`.
    pub fn get(&self, index: usize) -> Option<&Arc<Mark>> {
        self.marks.get(index)
    }

    /// Iterates marks in order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Mark>> + '_ {
        self.marks.iter()
    }

    /// Ids in configuration order.
    pub fn ids(&self) -> Vec<MarkId> {
        self.marks.iter().map(|m| m.id()).collect()
    }

    /// Position of the mark with `id`.
    pub fn index_of(&self, id: MarkId) -> Option<usize> {
        self.marks.iter().position(|m| m.id() == id)
    }

    /// Appends a mark. Fails when its id is already present.
    pub fn push(&mut self, mark: Arc<Mark>) -> Result<(), MppError> {
        if self.index_of(mark.id()).is_some() {
            return Err(MppError::Proposal(
                ErrorInfo::new("duplicate-mark-id", "mark id already present in configuration")
                    .with_context("id", mark.id().to_string()),
            ));
        }
        self.marks.push(mark);
        Ok(())
    }

    /// Removes and returns the mark at `index`, preserving the order of the rest.
    pub fn remove(&mut self, index: usize) -> Option<Arc<Mark>> {
        (index < self.marks.len()).then(|| self.marks.remove(index))
    }

    /// Replaces the mark at `index`.
    pub fn replace(&mut self, index: usize, mark: Arc<Mark>) -> Option<Arc<Mark>> {
        let slot = self.marks.get_mut(index)?;
        Some(std::mem::replace(slot, mark))
    }

    /// Uniformly random index, `None` when empty.
    pub fn random_index(&self, rng: &mut RngHandle) -> Option<usize> {
        if self.marks.is_empty() {
            return None;
        }
        Some(rng.index(self.marks.len()))
    }

    /// Random index drawn proportionally to `weight(mark)`.
    ///
    /// Non-finite or negative weights count as zero. Returns `None` when every
    /// weight is zero.
    pub fn random_index_weighted<F>(&self, rng: &mut RngHandle, weight: F) -> Option<usize>
    where
        F: Fn(&Mark) -> f64,
    {
        let weights: Vec<f64> = self
            .marks
            .iter()
            .map(|m| {
                let w = weight(m);
                if w.is_finite() && w > 0.0 {
                    w
                } else {
                    0.0
                }
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return None;
        }
        let mut target = rng.next_double() * total;
        for (index, w) in weights.iter().enumerate() {
            if target < *w {
                return Some(index);
            }
            target -= w;
        }
        weights.iter().rposition(|w| *w > 0.0)
    }
}

/// Monotone id source. Ids are never reused within a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkIdGenerator {
    next: u64,
}

impl MarkIdGenerator {
    /// Creates a generator starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh id.
    pub fn next_id(&mut self) -> MarkId {
        let id = MarkId::from_raw(self.next);
        self.next += 1;
        id
    }

    /// Ensures future ids are greater than `id`.
    pub fn observe(&mut self, id: MarkId) {
        self.next = self.next.max(id.as_raw() + 1);
    }
}

/// Radius limits used when instantiating and perturbing marks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkBounds {
    /// Smallest allowed semi-axis.
    #[serde(default = "default_min_radius")]
    pub min_radius: f64,
    /// Largest allowed semi-axis.
    #[serde(default = "default_max_radius")]
    pub max_radius: f64,
}

fn default_min_radius() -> f64 {
    2.0
}

fn default_max_radius() -> f64 {
    8.0
}

impl Default for MarkBounds {
    fn default() -> Self {
        Self {
            min_radius: default_min_radius(),
            max_radius: default_max_radius(),
        }
    }
}

impl MarkBounds {
    /// Whether `radius` lies within the limits.
    pub fn admits(&self, radius: f64) -> bool {
        radius.is_finite() && radius >= self.min_radius && radius <= self.max_radius
    }
}

/// Template factory: creates fresh marks of the configured kind with new ids.
#[derive(Debug, Clone, PartialEq)]
pub struct CfgGen {
    kind: MarkKind,
    bounds: MarkBounds,
    ids: MarkIdGenerator,
}

impl CfgGen {
    /// Creates a generator for `kind` marks.
    pub fn new(kind: MarkKind, bounds: MarkBounds) -> Self {
        Self {
            kind,
            bounds,
            ids: MarkIdGenerator::new(),
        }
    }

    /// Kind of mark produced.
    pub fn kind(&self) -> MarkKind {
        self.kind
    }

    /// Radius limits.
    pub fn bounds(&self) -> &MarkBounds {
        &self.bounds
    }

    /// Draws a fresh id.
    pub fn next_id(&mut self) -> MarkId {
        self.ids.next_id()
    }

    /// Makes every id of `cfg` unavailable to future draws.
    pub fn observe_cfg(&mut self, cfg: &Cfg) {
        for mark in cfg.iter() {
            self.ids.observe(mark.id());
        }
    }

    /// Fresh mark of the configured kind at the origin with minimal size.
    pub fn new_template(&mut self) -> Mark {
        let r = self.bounds.min_radius;
        let shape = match self.kind {
            MarkKind::Ellipse => MarkShape::Ellipse(Ellipse {
                cx: 0.0,
                cy: 0.0,
                a: r,
                b: r,
                angle: 0.0,
            }),
            MarkKind::Ellipsoid => MarkShape::Ellipsoid(Ellipsoid {
                center: Point3::default(),
                radii: [r; 3],
                angles: [0.0; 3],
            }),
            MarkKind::PointList => MarkShape::PointList(PointList::new(Vec::new())),
        };
        Mark::new(self.next_id(), shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_of(n: u64) -> Cfg {
        let mut gen = CfgGen::new(MarkKind::Ellipse, MarkBounds::default());
        Cfg::from_marks((0..n).map(|_| gen.new_template())).unwrap()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut cfg = cfg_of(2);
        let dup = cfg.get(0).unwrap().clone();
        assert!(cfg.push(dup).is_err());
        assert_eq!(cfg.len(), 2);
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let cfg = cfg_of(3);
        let mut rng = RngHandle::from_seed(5);
        for _ in 0..50 {
            let idx = cfg
                .random_index_weighted(&mut rng, |m| if m.id().as_raw() == 1 { 1.0 } else { 0.0 })
                .unwrap();
            assert_eq!(idx, 1);
        }
        assert!(cfg.random_index_weighted(&mut rng, |_| 0.0).is_none());
    }

    #[test]
    fn generator_skips_observed_ids() {
        let mut gen = CfgGen::new(MarkKind::Ellipse, MarkBounds::default());
        let cfg = Cfg::from_marks([Mark::new(
            MarkId::from_raw(41),
            gen.new_template().shape().clone(),
        )])
        .unwrap();
        gen.observe_cfg(&cfg);
        assert_eq!(gen.next_id(), MarkId::from_raw(42));
    }
}
