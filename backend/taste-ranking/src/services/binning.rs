// ============================================
// Scalar Binning
// ============================================
//
// Converts price / wait-time scalars into sparse bin vectors so they can be
// compared and learned like categorical features.
//
// Soft encoding around containing bin r_i:
//   r_i -> 1.0, r_{i-1} -> 0.25, r_{i+1} -> 0.25 (clipped at the ends)
//
// Out-of-range, negative or missing scalars encode to the empty vector.

use crate::registry::{DimensionRegistry, FeatureGroup, FeatureKey};
use std::collections::BTreeMap;

/// Weight of the bins adjacent to the containing bin
pub const NEIGHBOR_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinEncoding {
    /// Containing bin only
    OneHot,
    /// Containing bin plus neighbors at `NEIGHBOR_WEIGHT`
    Soft,
}

/// Encode `value` over the bins of a scalar group
///
/// Returns an empty map for unspecified values and for non-scalar groups.
pub fn encode(
    registry: &DimensionRegistry,
    group: FeatureGroup,
    value: Option<f64>,
    encoding: BinEncoding,
) -> BTreeMap<FeatureKey, f64> {
    let mut vector = BTreeMap::new();

    let (Some(value), Some(bins)) = (value, registry.bins(group)) else {
        return vector;
    };
    let Some(index) = bins.locate(value) else {
        return vector;
    };

    let mut insert = |i: usize, weight: f64| {
        if let Some(key) = FeatureKey::bin(group, i as u8) {
            vector.insert(key, weight);
        }
    };

    insert(index, 1.0);
    if encoding == BinEncoding::Soft {
        if index > 0 {
            insert(index - 1, NEIGHBOR_WEIGHT);
        }
        if index + 1 < bins.bin_count() {
            insert(index + 1, NEIGHBOR_WEIGHT);
        }
    }

    vector
}

/// Soft encoding, as used by the scorer
pub fn soft_bin(
    registry: &DimensionRegistry,
    group: FeatureGroup,
    value: Option<f64>,
) -> BTreeMap<FeatureKey, f64> {
    encode(registry, group, value, BinEncoding::Soft)
}
