use std::fmt;

use mpp_mark::{CfgNrg, Mark, MarkGeometry};
use serde::{Deserialize, Serialize};

use crate::context::ProposerContext;

/// Picks one mark of an existing configuration.
pub trait MarkFromCfgProposer: fmt::Debug + Send + Sync {
    /// Index of the selected mark, `None` if nothing can be selected.
    fn select(&self, cfg: &CfgNrg, ctx: &mut ProposerContext<'_>) -> Option<usize>;
}

/// Every mark equally likely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformMarkSelector;

impl MarkFromCfgProposer for UniformMarkSelector {
    fn select(&self, cfg: &CfgNrg, ctx: &mut ProposerContext<'_>) -> Option<usize> {
        cfg.cfg().random_index(ctx.rng)
    }
}

/// Extraction weight applied by [`WeightedMarkSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionWeight {
    /// Proportional to body size; large marks are split more often.
    BodySize,
    /// Inversely proportional to body size.
    InverseBodySize,
}

impl ExtractionWeight {
    fn weight(&self, mark: &Mark) -> f64 {
        let size = mark.body_size();
        match self {
            ExtractionWeight::BodySize => size,
            ExtractionWeight::InverseBodySize if size > 0.0 => 1.0 / size,
            ExtractionWeight::InverseBodySize => 0.0,
        }
    }
}

/// Selects marks in proportion to an extraction weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedMarkSelector {
    weight: ExtractionWeight,
}

impl WeightedMarkSelector {
    /// Creates the selector.
    pub fn new(weight: ExtractionWeight) -> Self {
        Self { weight }
    }
}

impl MarkFromCfgProposer for WeightedMarkSelector {
    fn select(&self, cfg: &CfgNrg, ctx: &mut ProposerContext<'_>) -> Option<usize> {
        let index = cfg
            .cfg()
            .random_index_weighted(ctx.rng, |mark| self.weight.weight(mark));
        if index.is_none() && !cfg.is_empty() {
            ctx.errors.add("every mark has zero extraction weight");
        }
        index
    }
}
