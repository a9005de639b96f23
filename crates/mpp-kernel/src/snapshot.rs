use std::fs;
use std::path::Path;

use mpp_core::errors::ErrorInfo;
use mpp_core::MppError;
use mpp_mark::{Cfg, CfgNrg, Mark, MarkShape};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Serializable view of a configuration and its energy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CfgSnapshot {
    /// Marks in configuration order.
    pub marks: Vec<Mark>,
    /// Cached total energy when the snapshot was taken.
    pub total_energy: f64,
    /// Canonical hash of `marks`.
    pub hash: String,
}

impl CfgSnapshot {
    /// Captures `state`.
    pub fn capture(state: &CfgNrg) -> Self {
        Self {
            marks: state.cfg().iter().map(|m| Mark::clone(m)).collect(),
            total_energy: state.total(),
            hash: canonical_hash(state.cfg()),
        }
    }

    /// Rebuilds the configuration, rejecting duplicate ids.
    pub fn to_cfg(&self) -> Result<Cfg, MppError> {
        Cfg::from_marks(self.marks.iter().cloned())
    }

    /// Restores the snapshot from disk.
    pub fn load(path: &Path) -> Result<Self, MppError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            MppError::Serde(
                ErrorInfo::new("snapshot-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            MppError::Serde(
                ErrorInfo::new("snapshot-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Writes the snapshot to disk.
    pub fn store(&self, path: &Path) -> Result<(), MppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                MppError::Serde(
                    ErrorInfo::new("snapshot-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            MppError::Serde(
                ErrorInfo::new("snapshot-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            MppError::Serde(
                ErrorInfo::new("snapshot-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// SHA-256 over the marks sorted by id, independent of configuration order.
pub fn canonical_hash(cfg: &Cfg) -> String {
    let mut marks: Vec<&Mark> = cfg.iter().map(|m| m.as_ref()).collect();
    marks.sort_by_key(|m| m.id());
    let mut hasher = Sha256::new();
    hasher.update((marks.len() as u64).to_le_bytes());
    for mark in marks {
        hasher.update(mark.id().as_raw().to_le_bytes());
        hasher.update(mark.kind().as_str().as_bytes());
        encode_shape(mark.shape(), &mut hasher);
    }
    format!("{:x}", hasher.finalize())
}

fn encode_shape(shape: &MarkShape, hasher: &mut Sha256) {
    match shape {
        MarkShape::Ellipse(e) => {
            for value in [e.cx, e.cy, e.a, e.b, e.angle] {
                hasher.update(value.to_bits().to_le_bytes());
            }
        }
        MarkShape::Ellipsoid(e) => {
            let c = e.center;
            for value in [c.x, c.y, c.z].iter().chain(&e.radii).chain(&e.angles) {
                hasher.update(value.to_bits().to_le_bytes());
            }
        }
        MarkShape::PointList(list) => {
            hasher.update((list.points().len() as u64).to_le_bytes());
            for p in list.points() {
                for coord in [p.x, p.y, p.z] {
                    hasher.update(coord.to_le_bytes());
                }
            }
        }
    }
}
