#![deny(missing_docs)]
#![doc = "Core identifiers, geometry primitives, errors and deterministic randomness shared by the MPP sampler crates."]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod region;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, MppError};
pub use region::{
    RegionMap, RegionMembership, FLAG_INSIDE, FLAG_SHELL, REGION_INSIDE, REGION_SHELL,
};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{BoundingBox, Extent, Point3, Voxel};

/// Identifier of a mark, unique within a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarkId(u64);

impl MarkId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}
