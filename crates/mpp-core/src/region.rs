//! Region membership rules used when rasterizing marks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flag bit set when a point lies inside the mark body.
pub const FLAG_INSIDE: u8 = 0b0000_0001;
/// Flag bit set when a point lies in the shell ring around the mark body.
pub const FLAG_SHELL: u8 = 0b0000_0010;

/// Region identifier for the mark interior.
pub const REGION_INSIDE: u32 = 0;
/// Region identifier for the shell surrounding the mark.
pub const REGION_SHELL: u32 = 1;

/// Membership test for a single region: a point belongs to the region when
/// any of the region's flag bits is set in the point's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMembership {
    flags: u8,
}

impl RegionMembership {
    /// Creates a membership from raw flag bits.
    pub const fn new(flags: u8) -> Self {
        Self { flags }
    }

    /// Membership covering only the mark interior.
    pub const fn inside() -> Self {
        Self::new(FLAG_INSIDE)
    }

    /// Membership covering only the shell ring.
    pub const fn shell() -> Self {
        Self::new(FLAG_SHELL)
    }

    /// Raw flag bits.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Returns whether a point with `point_flags` belongs to this region.
    pub fn is_member(&self, point_flags: u8) -> bool {
        self.flags & point_flags != 0
    }
}

/// Maps region identifiers to their membership rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMap {
    regions: BTreeMap<u32, RegionMembership>,
}

impl RegionMap {
    /// Creates an empty map.
    pub fn empty() -> Self {
        Self {
            regions: BTreeMap::new(),
        }
    }

    /// Adds or replaces the rule for `region`.
    pub fn with_region(mut self, region: u32, membership: RegionMembership) -> Self {
        self.regions.insert(region, membership);
        self
    }

    /// Looks up the rule for `region`.
    pub fn membership(&self, region: u32) -> Option<RegionMembership> {
        self.regions.get(&region).copied()
    }

    /// Iterates the registered regions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, RegionMembership)> + '_ {
        self.regions.iter().map(|(id, m)| (*id, *m))
    }

    /// Number of registered regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the map has no regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Default for RegionMap {
    /// Interior as region 0 and shell as region 1.
    fn default() -> Self {
        Self::empty()
            .with_region(REGION_INSIDE, RegionMembership::inside())
            .with_region(REGION_SHELL, RegionMembership::shell())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_separates_inside_and_shell() {
        let map = RegionMap::default();
        let inside = map.membership(REGION_INSIDE).unwrap();
        let shell = map.membership(REGION_SHELL).unwrap();
        assert!(inside.is_member(FLAG_INSIDE));
        assert!(!inside.is_member(FLAG_SHELL));
        assert!(shell.is_member(FLAG_SHELL));
        assert!(!shell.is_member(0));
    }
}
