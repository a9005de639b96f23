use mpp_core::errors::ErrorInfo;
use mpp_core::MppError;
use mpp_mark::{EnergyWeights, MarkBounds, MarkKind};
use serde::{Deserialize, Serialize};

use crate::kernel::{BirthDeathProbs, KernelKind};
use crate::mark_sets::PAIR_COLLECTION;
use crate::select_mark::ExtractionWeight;

/// YAML-configurable parameters governing one sampler run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplerConfig {
    /// Number of kernel steps after initialisation.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Steps excluded from metrics.
    #[serde(default)]
    pub burn_in: usize,
    /// Interval at which to record metric samples.
    #[serde(default = "default_thinning")]
    pub thinning: usize,
    /// Relative selection weight of every kernel.
    #[serde(default)]
    pub kernels: KernelWeights,
    /// Birth/death proposal asymmetry.
    #[serde(default)]
    pub birth_death: BirthDeathProbs,
    /// Intensity of the Poisson prior on the number of marks, per voxel.
    #[serde(default = "default_poisson_intensity")]
    pub poisson_intensity: f64,
    /// Birth kernel settings.
    #[serde(default)]
    pub birth: BirthConfig,
    /// Birth-and-kill kernel settings.
    #[serde(default)]
    pub birth_and_kill: BirthAndKillConfig,
    /// Initial configuration settings.
    #[serde(default)]
    pub initial: InitialConfig,
    /// Mark kind and size limits.
    #[serde(default)]
    pub marks: MarkConfig,
    /// Energy scheme weights.
    #[serde(default)]
    pub energy: EnergyWeights,
    /// Temperature applied to energy differences.
    #[serde(default)]
    pub schedule: TemperatureSchedule,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Name of the pair index the merge kernel samples from.
    #[serde(default = "default_pair_collection")]
    pub pair_collection: String,
}

fn default_iterations() -> usize {
    200
}

fn default_thinning() -> usize {
    1
}

fn default_poisson_intensity() -> f64 {
    1e-3
}

fn default_pair_collection() -> String {
    PAIR_COLLECTION.to_string()
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            burn_in: 0,
            thinning: default_thinning(),
            kernels: KernelWeights::default(),
            birth_death: BirthDeathProbs::default(),
            poisson_intensity: default_poisson_intensity(),
            birth: BirthConfig::default(),
            birth_and_kill: BirthAndKillConfig::default(),
            initial: InitialConfig::default(),
            marks: MarkConfig::default(),
            energy: EnergyWeights::default(),
            schedule: TemperatureSchedule::default(),
            seed_policy: SeedPolicy::default(),
            pair_collection: default_pair_collection(),
        }
    }
}

impl SamplerConfig {
    /// Parses a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, MppError> {
        let config: SamplerConfig = serde_yaml::from_str(text).map_err(|err| {
            MppError::Serde(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_hint("check the YAML against SamplerConfig"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises to YAML.
    pub fn to_yaml_string(&self) -> Result<String, MppError> {
        serde_yaml::to_string(self)
            .map_err(|err| MppError::Serde(ErrorInfo::new("config-serialize", err.to_string())))
    }

    /// Rejects values no run can use.
    pub fn validate(&self) -> Result<(), MppError> {
        let probability = |name: &str, value: f64| -> Result<(), MppError> {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(invalid(name, value.to_string(), "must lie in [0, 1]"))
            }
        };
        probability("birth_death.prob_birth", self.birth_death.prob_birth)?;
        probability("birth_death.prob_death", self.birth_death.prob_death)?;
        probability(
            "birth_and_kill.overlap_ratio_threshold",
            self.birth_and_kill.overlap_ratio_threshold,
        )?;
        if !self.poisson_intensity.is_finite() || self.poisson_intensity < 0.0 {
            return Err(invalid(
                "poisson_intensity",
                self.poisson_intensity.to_string(),
                "must be finite and non-negative",
            ));
        }
        if self.thinning == 0 {
            return Err(invalid("thinning", "0".to_string(), "must be at least 1"));
        }
        if self.birth.repeats == 0 {
            return Err(invalid("birth.repeats", "0".to_string(), "must be at least 1"));
        }
        let bounds = &self.marks.bounds;
        if !(bounds.min_radius > 0.0 && bounds.min_radius <= bounds.max_radius) {
            return Err(invalid(
                "marks",
                format!("{}..{}", bounds.min_radius, bounds.max_radius),
                "need 0 < min_radius <= max_radius",
            ));
        }
        if self.kernels.total() == 0 {
            return Err(invalid("kernels", "0".to_string(), "at least one weight must be positive"));
        }
        self.schedule.validate()
    }
}

fn invalid(field: &str, value: String, rule: &str) -> MppError {
    MppError::Config(
        ErrorInfo::new("invalid-config", format!("{field} {rule}"))
            .with_context("field", field)
            .with_context("value", value),
    )
}

/// Relative selection weight per kernel. Zero disables a kernel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KernelWeights {
    /// Birth.
    #[serde(default = "default_weight")]
    pub birth: u32,
    /// Death.
    #[serde(default = "default_weight")]
    pub death: u32,
    /// Birth-and-kill.
    #[serde(default)]
    pub birth_and_kill: u32,
    /// Merge.
    #[serde(default = "default_weight")]
    pub merge: u32,
    /// Split.
    #[serde(default = "default_weight")]
    pub split: u32,
    /// Exchange.
    #[serde(default = "default_exchange_weight")]
    pub exchange: u32,
    /// Replace.
    #[serde(default)]
    pub replace: u32,
}

fn default_weight() -> u32 {
    1
}

fn default_exchange_weight() -> u32 {
    2
}

impl Default for KernelWeights {
    fn default() -> Self {
        Self {
            birth: default_weight(),
            death: default_weight(),
            birth_and_kill: 0,
            merge: default_weight(),
            split: default_weight(),
            exchange: default_exchange_weight(),
            replace: 0,
        }
    }
}

impl KernelWeights {
    /// Weight of `kind`; the initial kernel is never drawn by weight.
    pub fn weight(&self, kind: KernelKind) -> u32 {
        match kind {
            KernelKind::InitialConfiguration => 0,
            KernelKind::Birth => self.birth,
            KernelKind::Death => self.death,
            KernelKind::BirthAndKill => self.birth_and_kill,
            KernelKind::Merge => self.merge,
            KernelKind::Split => self.split,
            KernelKind::Exchange => self.exchange,
            KernelKind::Replace => self.replace,
        }
    }

    /// Sum of all weights.
    pub fn total(&self) -> u64 {
        [
            self.birth,
            self.death,
            self.birth_and_kill,
            self.merge,
            self.split,
            self.exchange,
            self.replace,
        ]
        .iter()
        .map(|w| u64::from(*w))
        .sum()
    }
}

/// Birth kernel settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BirthConfig {
    /// Marks born per proposal.
    #[serde(default = "default_repeats")]
    pub repeats: usize,
}

fn default_repeats() -> usize {
    1
}

impl Default for BirthConfig {
    fn default() -> Self {
        Self {
            repeats: default_repeats(),
        }
    }
}

/// Birth-and-kill kernel settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BirthAndKillConfig {
    /// Existing marks whose overlap ratio with the new mark exceeds this are killed.
    #[serde(default = "default_overlap_ratio_threshold")]
    pub overlap_ratio_threshold: f64,
    /// Tries spent looking for a freed voxel for the additional birth.
    #[serde(default = "default_additional_birth_attempts")]
    pub additional_birth_attempts: usize,
    /// Whether to attempt the additional birth at all.
    #[serde(default = "default_enable_additional_birth")]
    pub enable_additional_birth: bool,
}

fn default_overlap_ratio_threshold() -> f64 {
    0.1
}

fn default_additional_birth_attempts() -> usize {
    20
}

fn default_enable_additional_birth() -> bool {
    true
}

impl Default for BirthAndKillConfig {
    fn default() -> Self {
        Self {
            overlap_ratio_threshold: default_overlap_ratio_threshold(),
            additional_birth_attempts: default_additional_birth_attempts(),
            enable_additional_birth: default_enable_additional_birth(),
        }
    }
}

/// Initial configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitialConfig {
    /// Marks the initial proposer tries to place.
    #[serde(default = "default_initial_marks")]
    pub marks: usize,
    /// Placement attempts per initial mark.
    #[serde(default = "default_placement_attempts")]
    pub attempts: usize,
}

fn default_initial_marks() -> usize {
    4
}

fn default_placement_attempts() -> usize {
    10
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            marks: default_initial_marks(),
            attempts: default_placement_attempts(),
        }
    }
}

/// Mark kind, size limits and proposal step sizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkConfig {
    /// Kind of every mark in the run.
    #[serde(default = "default_kind")]
    pub kind: MarkKind,
    /// Radius limits.
    #[serde(flatten)]
    pub bounds: MarkBounds,
    /// Largest displacement of the exchange kernel's perturbation.
    #[serde(default = "default_perturb_step")]
    pub perturb_step: f64,
    /// How the split kernel picks the mark to split.
    #[serde(default = "default_split_selection")]
    pub split_selection: ExtractionWeight,
}

fn default_kind() -> MarkKind {
    MarkKind::Ellipse
}

fn default_perturb_step() -> f64 {
    1.5
}

fn default_split_selection() -> ExtractionWeight {
    ExtractionWeight::BodySize
}

impl Default for MarkConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            bounds: MarkBounds::default(),
            perturb_step: default_perturb_step(),
            split_selection: default_split_selection(),
        }
    }
}

/// Temperature applied to energy differences at a given iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemperatureSchedule {
    /// Fixed temperature.
    Constant {
        /// Temperature.
        #[serde(default = "default_temperature")]
        temperature: f64,
    },
    /// `max(start * ratio^iteration, floor)`.
    Geometric {
        /// Temperature at iteration 0.
        #[serde(default = "default_temperature")]
        start: f64,
        /// Per-iteration factor.
        #[serde(default = "default_cooling_ratio")]
        ratio: f64,
        /// Lowest temperature reached.
        #[serde(default = "default_floor")]
        floor: f64,
    },
}

fn default_temperature() -> f64 {
    1.0
}

fn default_cooling_ratio() -> f64 {
    0.995
}

fn default_floor() -> f64 {
    0.05
}

impl Default for TemperatureSchedule {
    fn default() -> Self {
        TemperatureSchedule::Constant {
            temperature: default_temperature(),
        }
    }
}

impl TemperatureSchedule {
    /// Temperature at `iteration`.
    pub fn temperature(&self, iteration: usize) -> f64 {
        match self {
            TemperatureSchedule::Constant { temperature } => *temperature,
            TemperatureSchedule::Geometric {
                start,
                ratio,
                floor,
            } => {
                let exponent = i32::try_from(iteration).unwrap_or(i32::MAX);
                (start * ratio.powi(exponent)).max(*floor)
            }
        }
    }

    fn validate(&self) -> Result<(), MppError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(invalid(name, value.to_string(), "must be positive"))
            }
        };
        match self {
            TemperatureSchedule::Constant { temperature } => {
                positive("schedule.temperature", *temperature)
            }
            TemperatureSchedule::Geometric {
                start,
                ratio,
                floor,
            } => {
                positive("schedule.start", *start)?;
                positive("schedule.ratio", *ratio)?;
                positive("schedule.floor", *floor)
            }
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in summaries.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
