//! Hexagonal cell indexing on top of H3
//!
//! Maps coordinates to cells at one fixed resolution, cells back to their
//! closed polygon outline, and cells to the ring of cells at an exact grid
//! distance.

use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both components finite and inside the lat/lon domain
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Opaque key of one hexagonal cell at a fixed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(CellIndex);

impl CellId {
    pub fn index(&self) -> CellIndex {
        self.0
    }

    pub fn resolution(&self) -> Resolution {
        self.0.resolution()
    }

    /// Cell center
    pub fn center(&self) -> GeoPoint {
        let center = LatLng::from(self.0);
        GeoPoint::new(center.lat(), center.lng())
    }
}

impl From<CellIndex> for CellId {
    fn from(index: CellIndex) -> Self {
        CellId(index)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CellId {
    type Err = h3o::error::InvalidCellIndex;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellIndex::from_str(s).map(CellId)
    }
}

// Serialized as the hex cell string, which also makes it a valid JSON map key
impl Serialize for CellId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Maps points to cells at one resolution chosen for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoCellIndexer {
    resolution: Resolution,
}

impl GeoCellIndexer {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Cell containing `point`, or `None` when the point has no valid cell
    pub fn cell_of(&self, point: GeoPoint) -> Option<CellId> {
        if !point.is_valid() {
            return None;
        }
        let latlng = LatLng::new(point.lat, point.lon).ok()?;
        Some(CellId(latlng.to_cell(self.resolution)))
    }

    /// Closed outline of `cell` (first vertex repeated at the end)
    pub fn boundary_of(cell: CellId) -> Vec<GeoPoint> {
        let mut ring: Vec<GeoPoint> = cell
            .0
            .boundary()
            .iter()
            .map(|latlng| GeoPoint::new(latlng.lat(), latlng.lng()))
            .collect();
        if let Some(&first) = ring.first() {
            ring.push(first);
        }
        ring
    }

    /// Cells at exactly `distance` grid steps from `cell`
    ///
    /// Distance 0 is the cell itself. The fast hexagonal walk fails around
    /// pentagons; there the ring is read off a distance-tagged disk instead.
    pub fn ring_at(cell: CellId, distance: u32) -> BTreeSet<CellId> {
        if distance == 0 {
            return BTreeSet::from([cell]);
        }

        let fast: Option<BTreeSet<CellId>> = cell
            .0
            .grid_ring_fast(distance)
            .map(|maybe| maybe.map(CellId))
            .collect();

        match fast {
            Some(ring) => ring,
            None => cell
                .0
                .grid_disk_distances_safe(distance)
                .filter(|(_, d)| *d == distance)
                .map(|(index, _)| CellId(index))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZURICH_HB: GeoPoint = GeoPoint { lat: 47.378177, lon: 8.540192 };
    const BERN: GeoPoint = GeoPoint { lat: 46.948832, lon: 7.439136 };

    #[test]
    fn test_cell_of_is_deterministic() {
        for res in [Resolution::Six, Resolution::Seven, Resolution::Eight] {
            let indexer = GeoCellIndexer::new(res);
            let a = indexer.cell_of(ZURICH_HB).unwrap();
            let b = indexer.cell_of(ZURICH_HB).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.resolution(), res);
        }
    }

    #[test]
    fn test_distinct_points_in_distinct_cells() {
        let indexer = GeoCellIndexer::new(Resolution::Eight);
        assert_ne!(indexer.cell_of(ZURICH_HB), indexer.cell_of(BERN));
    }

    #[test]
    fn test_invalid_points_have_no_cell() {
        let indexer = GeoCellIndexer::new(Resolution::Seven);
        assert_eq!(indexer.cell_of(GeoPoint::new(f64::NAN, 8.0)), None);
        assert_eq!(indexer.cell_of(GeoPoint::new(47.0, f64::INFINITY)), None);
        assert_eq!(indexer.cell_of(GeoPoint::new(91.0, 8.0)), None);
        assert_eq!(indexer.cell_of(GeoPoint::new(47.0, -180.5)), None);
    }

    #[test]
    fn test_boundary_is_closed() {
        let indexer = GeoCellIndexer::new(Resolution::Seven);
        let cell = indexer.cell_of(ZURICH_HB).unwrap();
        let boundary = GeoCellIndexer::boundary_of(cell);

        assert!(boundary.len() >= 7);
        assert_eq!(boundary.first(), boundary.last());
        // center lies near the indexed point
        let center = cell.center();
        assert!((center.lat - ZURICH_HB.lat).abs() < 0.05);
        assert!((center.lon - ZURICH_HB.lon).abs() < 0.05);
    }

    #[test]
    fn test_ring_zero_is_the_cell() {
        let indexer = GeoCellIndexer::new(Resolution::Six);
        let cell = indexer.cell_of(BERN).unwrap();
        assert_eq!(GeoCellIndexer::ring_at(cell, 0), BTreeSet::from([cell]));
    }

    #[test]
    fn test_rings_exclude_center_and_grow() {
        let indexer = GeoCellIndexer::new(Resolution::Seven);
        let cell = indexer.cell_of(ZURICH_HB).unwrap();
        for d in 1..=5 {
            let ring = GeoCellIndexer::ring_at(cell, d);
            assert!(!ring.contains(&cell));
            assert_eq!(ring.len(), 6 * d as usize);
            for other in &ring {
                assert_eq!(cell.index().grid_distance(other.index()).unwrap(), d as i32);
            }
        }
    }

    #[test]
    fn test_ring_around_pentagon() {
        let pentagon = CellIndex::base_cells()
            .find(|base| base.is_pentagon())
            .and_then(|base| base.center_child(Resolution::Six))
            .map(CellId::from)
            .unwrap();
        assert!(pentagon.index().is_pentagon());

        let ring = GeoCellIndexer::ring_at(pentagon, 1);
        assert_eq!(ring.len(), 5);
        assert!(!ring.contains(&pentagon));

        let ring2 = GeoCellIndexer::ring_at(pentagon, 2);
        assert!(!ring2.is_empty());
        assert!(ring2.is_disjoint(&ring));
    }

    #[test]
    fn test_cell_id_string_round_trip() {
        let indexer = GeoCellIndexer::new(Resolution::Eight);
        let cell = indexer.cell_of(BERN).unwrap();
        let text = cell.to_string();
        assert_eq!(text.len(), 15);
        assert_eq!(text.parse::<CellId>().unwrap(), cell);
    }

    #[test]
    fn test_cell_id_serializes_as_string() {
        let cell = GeoCellIndexer::new(Resolution::Seven).cell_of(BERN).unwrap();
        let json = serde_json::to_value(cell).unwrap();
        assert_eq!(json, serde_json::Value::String(cell.to_string()));
    }
}
