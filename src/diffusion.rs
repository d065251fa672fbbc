//! Ring Diffusion
//!
//! Spreads each source cell's magnitude over the concentric rings around it:
//! - ring `d` (0 = the source itself) receives `sqrt(m) / (d + 1)^decay_exponent`
//! - overlapping catchments add up
//! - every cell inside the footprint of any source is present, with 0 if
//!   nothing reached it

use crate::geocell::{CellId, GeoCellIndexer};
use crate::source_cells::SourceCells;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Reach and fall-off of one diffusion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffusionKernel {
    /// Number of rings receiving a contribution (ring 0 through radius - 1)
    pub radius: u32,
    pub decay_exponent: u32,
}

impl DiffusionKernel {
    pub fn new(radius: u32, decay_exponent: u32) -> Self {
        Self {
            radius,
            decay_exponent,
        }
    }

    /// Contribution of a source of `magnitude` at ring `distance`
    pub fn contribution(&self, magnitude: f64, distance: u32) -> f64 {
        let falloff = f64::from(distance + 1).powi(self.decay_exponent as i32);
        magnitude.sqrt() / falloff
    }
}

/// Accumulated influence per cell. Built once by [`diffuse`], never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfluenceField {
    values: BTreeMap<CellId, f64>,
}

impl InfluenceField {
    /// `None` means the cell lies outside every source footprint
    pub fn get(&self, cell: &CellId) -> Option<f64> {
        self.values.get(cell).copied()
    }

    pub fn contains(&self, cell: &CellId) -> bool {
        self.values.contains_key(cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, f64)> + '_ {
        self.values.iter().map(|(cell, value)| (*cell, *value))
    }

    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }

    /// Cell-wise sum over the union of both key sets
    pub fn superpose(&self, other: &InfluenceField) -> InfluenceField {
        let mut values = self.values.clone();
        for (cell, value) in other.iter() {
            *values.entry(cell).or_insert(0.0) += value;
        }
        InfluenceField { values }
    }
}

impl FromIterator<(CellId, f64)> for InfluenceField {
    fn from_iter<T: IntoIterator<Item = (CellId, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// NaN and negative magnitudes contribute nothing
fn usable_magnitude(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

/// Diffuse every source over its rings
///
/// Rings `0..footprint_radius` around each source are present in the result
/// (at 0 if untouched); rings `0..kernel.radius` receive the decayed
/// contribution. The footprint never shrinks below the kernel radius.
pub fn diffuse(sources: &SourceCells, kernel: &DiffusionKernel, footprint_radius: u32) -> InfluenceField {
    let footprint = footprint_radius.max(kernel.radius);
    let mut values: BTreeMap<CellId, f64> = BTreeMap::new();
    let mut silent_sources = 0usize;

    for (source, raw_magnitude) in sources.iter() {
        let rings: Vec<BTreeSet<CellId>> = (0..footprint)
            .map(|distance| GeoCellIndexer::ring_at(source, distance))
            .collect();

        for cell in rings.iter().flatten() {
            values.entry(*cell).or_insert(0.0);
        }

        let magnitude = usable_magnitude(raw_magnitude);
        if magnitude == 0.0 {
            silent_sources += 1;
            continue;
        }

        for (distance, ring) in rings.iter().take(kernel.radius as usize).enumerate() {
            let contribution = kernel.contribution(magnitude, distance as u32);
            for cell in ring {
                *values.entry(*cell).or_insert(0.0) += contribution;
            }
        }
    }

    debug!(
        sources = sources.len(),
        silent_sources,
        cells = values.len(),
        radius = kernel.radius,
        decay_exponent = kernel.decay_exponent,
        footprint,
        "diffusion pass complete"
    );

    InfluenceField { values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocell::GeoPoint;
    use approx::assert_abs_diff_eq;
    use h3o::Resolution;
    use more_asserts::{assert_ge, assert_gt};

    fn source_cell() -> CellId {
        GeoCellIndexer::new(Resolution::Seven)
            .cell_of(GeoPoint::new(47.378177, 8.540192))
            .unwrap()
    }

    #[test]
    fn test_contribution_decays_with_distance() {
        let kernel = DiffusionKernel::new(5, 2);
        assert_eq!(kernel.contribution(4.0, 0), 2.0);
        assert_eq!(kernel.contribution(4.0, 1), 0.5);
        assert_abs_diff_eq!(kernel.contribution(4.0, 2), 2.0 / 9.0, epsilon = 1e-15);

        for exponent in 1..=4 {
            let kernel = DiffusionKernel::new(8, exponent);
            for d in 0..7 {
                assert_gt!(kernel.contribution(9.0, d), kernel.contribution(9.0, d + 1));
            }
        }
    }

    #[test]
    fn test_single_source_field() {
        let a = source_cell();
        let sources: SourceCells = [(a, 4.0)].into_iter().collect();
        let field = diffuse(&sources, &DiffusionKernel::new(2, 2), 2);

        assert_eq!(field.len(), 7);
        assert_eq!(field.get(&a), Some(2.0));
        for cell in GeoCellIndexer::ring_at(a, 1) {
            assert_eq!(field.get(&cell), Some(0.5));
        }
        // ring 2 is outside radius and footprint
        for cell in GeoCellIndexer::ring_at(a, 2) {
            assert_eq!(field.get(&cell), None);
        }
    }

    #[test]
    fn test_footprint_beyond_radius_is_zero_not_absent() {
        let a = source_cell();
        let sources: SourceCells = [(a, 1.0)].into_iter().collect();
        let field = diffuse(&sources, &DiffusionKernel::new(1, 1), 3);

        assert_eq!(field.len(), 1 + 6 + 12);
        assert_eq!(field.get(&a), Some(1.0));
        for cell in GeoCellIndexer::ring_at(a, 2) {
            assert_eq!(field.get(&cell), Some(0.0));
        }
    }

    #[test]
    fn test_silent_sources_keep_their_footprint() {
        let a = source_cell();
        for magnitude in [0.0, f64::NAN, -4.0] {
            let sources: SourceCells = [(a, magnitude)].into_iter().collect();
            let field = diffuse(&sources, &DiffusionKernel::new(2, 1), 2);
            assert_eq!(field.len(), 7);
            assert_eq!(field.total(), 0.0);
        }
    }

    #[test]
    fn test_overlapping_sources_add_up() {
        let a = source_cell();
        let b = *GeoCellIndexer::ring_at(a, 1).iter().next().unwrap();
        let sources: SourceCells = [(a, 4.0), (b, 9.0)].into_iter().collect();
        let field = diffuse(&sources, &DiffusionKernel::new(2, 1), 2);

        // each source sits in the other's first ring
        assert_eq!(field.get(&a), Some(2.0 + 3.0 / 2.0));
        assert_eq!(field.get(&b), Some(3.0 + 2.0 / 2.0));
        for value in field.iter().map(|(_, v)| v) {
            assert_ge!(value, 0.0);
        }
    }

    #[test]
    fn test_empty_sources_give_empty_field() {
        let field = diffuse(&SourceCells::default(), &DiffusionKernel::new(3, 2), 3);
        assert!(field.is_empty());
    }

    #[test]
    fn test_superpose_covers_union() {
        let a = source_cell();
        let b = *GeoCellIndexer::ring_at(a, 4).iter().next().unwrap();
        let left: InfluenceField = [(a, 1.0)].into_iter().collect();
        let right: InfluenceField = [(a, 2.0), (b, 5.0)].into_iter().collect();

        let sum = left.superpose(&right);
        assert_eq!(sum.get(&a), Some(3.0));
        assert_eq!(sum.get(&b), Some(5.0));
        assert_eq!(sum.len(), 2);
    }
}
