//! GeoJSON export of scored cells.

use crate::error::Result;
use crate::geocell::{CellId, GeoCellIndexer, GeoPoint};
use crate::records::{DropCounts, DropReason, SourceRecord};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use serde::Serialize;
use std::io::Write;
use tracing::warn;

/// One polygon of a rendered map: cell, outline, value and display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCell {
    pub cell: CellId,
    /// Closed ring, first point repeated last
    pub boundary: Vec<GeoPoint>,
    pub value: f64,
    pub label: String,
}

impl ScoredCell {
    pub fn new(cell: CellId, value: f64, label: impl Into<String>) -> Self {
        Self {
            cell,
            boundary: GeoCellIndexer::boundary_of(cell),
            value,
            label: label.into(),
        }
    }

    /// Polygon feature with the cell id as `id`, `properties.value` and a
    /// top-level `name`
    pub fn to_feature(&self) -> Feature {
        let ring: Vec<Vec<f64>> = self.boundary.iter().map(|p| vec![p.lon, p.lat]).collect();

        let mut properties = JsonObject::new();
        properties.insert(String::from("value"), JsonValue::from(self.value));

        let mut foreign_members = JsonObject::new();
        foreign_members.insert(String::from("name"), JsonValue::String(self.label.clone()));

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
            id: Some(Id::String(self.cell.to_string())),
            properties: Some(properties),
            foreign_members: Some(foreign_members),
        }
    }
}

/// Per-record map cells (record magnitude, record label) for a single dataset
pub fn record_cells(records: &[SourceRecord], indexer: &GeoCellIndexer) -> (Vec<ScoredCell>, DropCounts) {
    let mut drops = DropCounts::default();
    let cells = records
        .iter()
        .filter_map(|record| match indexer.cell_of(record.point) {
            Some(cell) => Some(ScoredCell::new(cell, record.magnitude, record.label.clone())),
            None => {
                drops.record(DropReason::DegenerateCell);
                None
            }
        })
        .collect();

    if drops.degenerate_cell > 0 {
        warn!(
            degenerate_cell = drops.degenerate_cell,
            "records without a valid cell left off the map"
        );
    }
    (cells, drops)
}

/// Feature collection of `cells`; empty input gives an empty collection
pub fn to_feature_collection(cells: &[ScoredCell]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: cells.iter().map(ScoredCell::to_feature).collect(),
        foreign_members: None,
    }
}

/// Serialize the feature collection of `cells` into `sink`
pub fn write_feature_collection<W: Write>(cells: &[ScoredCell], sink: W) -> Result<()> {
    serde_json::to_writer(sink, &to_feature_collection(cells))?;
    Ok(())
}
