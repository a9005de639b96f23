use std::fs::File;
use std::io::Write;
use std::path::Path;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Per-iteration metrics stored for CSV export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    /// Iteration (post burn-in) when the sample was recorded.
    pub iteration: usize,
    /// Temperature at that iteration.
    pub temperature: f64,
    /// Total energy of the chain state.
    pub energy: f64,
    /// Number of marks.
    pub size: usize,
    /// Accepted proposals so far.
    pub accepted_moves: usize,
    /// Proposals so far, including ones that produced no change.
    pub proposed_moves: usize,
    /// Canonical hash of the configuration.
    pub cfg_hash: String,
}

/// Aggregate statistics over the recorded samples.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageMetrics {
    /// Number of distinct configurations sampled.
    pub unique_states: usize,
    /// Mean energy.
    pub mean_energy: f64,
    /// Energy variance.
    pub energy_variance: f64,
    /// Mean number of marks.
    pub mean_size: f64,
}

impl CoverageMetrics {
    /// Returns an empty descriptor.
    pub fn empty() -> Self {
        Self {
            unique_states: 0,
            mean_energy: 0.0,
            energy_variance: 0.0,
            mean_size: 0.0,
        }
    }
}

/// Collects samples and tracks distinct configuration hashes.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    samples: Vec<MetricSample>,
    unique_hashes: IndexSet<String>,
}

impl MetricsRecorder {
    /// Creates a new recorder instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample.
    pub fn push_sample(&mut self, sample: MetricSample) {
        self.unique_hashes.insert(sample.cfg_hash.clone());
        self.samples.push(sample);
    }

    /// Recorded samples in order.
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// Consumes the recorder, returning its samples.
    pub fn into_samples(self) -> Vec<MetricSample> {
        self.samples
    }

    /// Computes aggregate statistics.
    pub fn coverage(&self) -> CoverageMetrics {
        if self.samples.is_empty() {
            return CoverageMetrics::empty();
        }
        let n = self.samples.len() as f64;
        let mean_energy = self.samples.iter().map(|s| s.energy).sum::<f64>() / n;
        let variance = if self.samples.len() > 1 {
            let mean_sq = self.samples.iter().map(|s| s.energy * s.energy).sum::<f64>() / n;
            (mean_sq - mean_energy * mean_energy).max(0.0)
        } else {
            0.0
        };
        CoverageMetrics {
            unique_states: self.unique_hashes.len(),
            mean_energy,
            energy_variance: variance,
            mean_size: self.samples.iter().map(|s| s.size as f64).sum::<f64>() / n,
        }
    }

    /// Writes the recorded metrics to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(
            file,
            "iteration,temperature,energy,size,accepted,proposed,cfg_hash"
        )?;
        for sample in &self.samples {
            writeln!(
                file,
                "{},{},{:.6},{},{},{},{}",
                sample.iteration,
                sample.temperature,
                sample.energy,
                sample.size,
                sample.accepted_moves,
                sample.proposed_moves,
                sample.cfg_hash
            )?;
        }
        Ok(())
    }
}
