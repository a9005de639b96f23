#![deny(missing_docs)]

//! Marks, configurations and energy-bearing configurations for the MPP sampler.

/// Configurations, id generation and mark templates.
pub mod cfg;
/// Energy-bearing configuration with incremental totals.
pub mod cfg_nrg;
/// Energy schemes and the borrowed evaluation context.
pub mod energy;
/// Mark variants and the geometry capability trait.
pub mod mark;
/// Rasterized masks.
pub mod mask;
/// Lazily voxelized marks.
pub mod memo;
/// Image data marks are scored against.
pub mod stack;

pub use cfg::{Cfg, CfgGen, MarkBounds, MarkIdGenerator};
pub use cfg_nrg::CfgNrg;
pub use energy::{ContrastOverlapEnergy, EnergyScheme, EnergyWeights, NrgContext};
pub use mark::{Ellipse, Ellipsoid, Mark, MarkGeometry, MarkKind, MarkShape, PointList};
pub use mask::{BinaryValues, MaskProperties, ObjectMask};
pub use memo::{RegionStats, VoxelStats, VoxelizedMarkMemo};
pub use stack::EnergyStack;
