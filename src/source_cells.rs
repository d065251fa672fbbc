use crate::geocell::{CellId, GeoCellIndexer};
use crate::records::{DropCounts, DropReason, SourceRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// How several records inside one cell combine into a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Average magnitude (station usage)
    #[default]
    Mean,
    /// Total magnitude (asset counts)
    Sum,
}

/// Source magnitude per cell, input of one diffusion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceCells {
    cells: BTreeMap<CellId, f64>,
}

impl SourceCells {
    /// Index every record and combine those sharing a cell
    ///
    /// Records whose point has no valid cell are counted as degenerate and
    /// left out.
    pub fn aggregate(
        records: &[SourceRecord],
        indexer: &GeoCellIndexer,
        aggregation: Aggregation,
    ) -> (Self, DropCounts) {
        let mut drops = DropCounts::default();
        let mut sums: BTreeMap<CellId, (f64, usize)> = BTreeMap::new();

        for record in records {
            let Some(cell) = indexer.cell_of(record.point) else {
                drops.record(DropReason::DegenerateCell);
                continue;
            };
            let entry = sums.entry(cell).or_insert((0.0, 0));
            entry.0 += record.magnitude;
            entry.1 += 1;
        }

        if drops.degenerate_cell > 0 {
            warn!(
                degenerate_cell = drops.degenerate_cell,
                "records without a valid cell were dropped"
            );
        }

        let cells = sums
            .into_iter()
            .map(|(cell, (sum, count))| {
                let value = match aggregation {
                    Aggregation::Sum => sum,
                    Aggregation::Mean => sum / count as f64,
                };
                (cell, value)
            })
            .collect();

        (Self { cells }, drops)
    }

    pub fn get(&self, cell: &CellId) -> Option<f64> {
        self.cells.get(cell).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, f64)> + '_ {
        self.cells.iter().map(|(cell, value)| (*cell, *value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(CellId, f64)> for SourceCells {
    fn from_iter<T: IntoIterator<Item = (CellId, f64)>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocell::GeoPoint;
    use h3o::Resolution;

    fn record(id: &str, lat: f64, lon: f64, magnitude: f64) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            label: id.to_string(),
            point: GeoPoint::new(lat, lon),
            magnitude,
            category: "ZH".to_string(),
        }
    }

    #[test]
    fn test_mean_and_sum_per_cell() {
        let indexer = GeoCellIndexer::new(Resolution::Six);
        // two stops a few meters apart share a cell
        let records = vec![
            record("a", 47.378177, 8.540192, 2.0),
            record("b", 47.378180, 8.540195, 4.0),
            record("c", 46.948832, 7.439136, 5.0),
        ];
        let shared = indexer.cell_of(records[0].point).unwrap();
        assert_eq!(indexer.cell_of(records[1].point), Some(shared));

        let (mean, drops) = SourceCells::aggregate(&records, &indexer, Aggregation::Mean);
        assert_eq!(drops.total(), 0);
        assert_eq!(mean.len(), 2);
        assert_eq!(mean.get(&shared), Some(3.0));

        let (sum, _) = SourceCells::aggregate(&records, &indexer, Aggregation::Sum);
        assert_eq!(sum.get(&shared), Some(6.0));
    }

    #[test]
    fn test_degenerate_points_are_counted() {
        let indexer = GeoCellIndexer::new(Resolution::Seven);
        let records = vec![record("ok", 47.0, 8.0, 1.0), record("bad", f64::NAN, 8.0, 1.0)];

        let (cells, drops) = SourceCells::aggregate(&records, &indexer, Aggregation::Sum);
        assert_eq!(cells.len(), 1);
        assert_eq!(drops.degenerate_cell, 1);
    }
}
