use mpp_core::{MppError, REGION_INSIDE, REGION_SHELL};
use serde::{Deserialize, Serialize};

use crate::memo::VoxelizedMarkMemo;
use crate::stack::EnergyStack;

/// Scores marks and pairs of marks. Lower is better.
///
/// The total energy of a configuration is the sum of `mark_energy` over its
/// marks plus `pair_energy` over every unordered pair.
pub trait EnergyScheme: Send + Sync {
    /// Contribution of a single mark.
    fn mark_energy(&self, memo: &VoxelizedMarkMemo, stack: &EnergyStack) -> Result<f64, MppError>;

    /// Interaction between two distinct marks.
    fn pair_energy(
        &self,
        a: &VoxelizedMarkMemo,
        b: &VoxelizedMarkMemo,
        stack: &EnergyStack,
    ) -> Result<f64, MppError>;
}

/// Weights for [`ContrastOverlapEnergy`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnergyWeights {
    /// Fixed cost paid by every mark.
    #[serde(default = "default_per_mark")]
    pub per_mark: f64,
    /// Reward per unit of inside/shell intensity contrast.
    #[serde(default = "default_contrast")]
    pub contrast: f64,
    /// Penalty per overlapping voxel between two marks.
    #[serde(default = "default_overlap")]
    pub overlap: f64,
}

fn default_per_mark() -> f64 {
    1.0
}

fn default_contrast() -> f64 {
    4.0
}

fn default_overlap() -> f64 {
    0.1
}

impl Default for EnergyWeights {
    fn default() -> Self {
        Self {
            per_mark: default_per_mark(),
            contrast: default_contrast(),
            overlap: default_overlap(),
        }
    }
}

/// Marks are rewarded for being brighter than their shell; overlapping marks
/// are penalised per shared voxel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContrastOverlapEnergy {
    weights: EnergyWeights,
}

impl ContrastOverlapEnergy {
    /// Creates the scheme from weights.
    pub fn new(weights: EnergyWeights) -> Self {
        Self { weights }
    }

    /// Configured weights.
    pub fn weights(&self) -> &EnergyWeights {
        &self.weights
    }
}

impl EnergyScheme for ContrastOverlapEnergy {
    fn mark_energy(&self, memo: &VoxelizedMarkMemo, stack: &EnergyStack) -> Result<f64, MppError> {
        let stats = memo.stats(stack);
        let inside = stats.region(REGION_INSIDE).and_then(|r| r.mean());
        let value = match inside {
            Some(mean_in) => {
                let mean_shell = stats
                    .region(REGION_SHELL)
                    .and_then(|r| r.mean())
                    .unwrap_or(0.0);
                self.weights.per_mark - self.weights.contrast * (mean_in - mean_shell)
            }
            None => self.weights.per_mark,
        };
        ensure_finite("mark energy", value)
    }

    fn pair_energy(
        &self,
        a: &VoxelizedMarkMemo,
        b: &VoxelizedMarkMemo,
        stack: &EnergyStack,
    ) -> Result<f64, MppError> {
        let overlap = a.overlap_with(b, stack) as f64;
        ensure_finite("pair energy", self.weights.overlap * overlap)
    }
}

/// Borrowed pair of stack and scheme needed by every energy update.
#[derive(Clone, Copy)]
pub struct NrgContext<'a> {
    /// Image data.
    pub stack: &'a EnergyStack,
    /// Scoring rules.
    pub scheme: &'a dyn EnergyScheme,
}

impl<'a> NrgContext<'a> {
    /// Bundles a stack and a scheme.
    pub fn new(stack: &'a EnergyStack, scheme: &'a dyn EnergyScheme) -> Self {
        Self { stack, scheme }
    }
}

impl std::fmt::Debug for NrgContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NrgContext")
            .field("extent", self.stack.extent())
            .finish_non_exhaustive()
    }
}

/// Returns `value` or a fatal error if it is NaN or infinite.
pub fn ensure_finite(what: &str, value: f64) -> Result<f64, MppError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MppError::non_finite(what, value))
    }
}
