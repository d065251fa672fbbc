pub mod normalizer;
pub mod schema;

pub use normalizer::{normalize_table, NormalizedBatch};
pub use schema::{MagnitudeTransform, TableSchema};

use crate::error::{BalanceError, Result};
use crate::geocell::GeoPoint;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Untyped rows as read from a delimited file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from string slices, handy for fixtures
    pub fn from_strs(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }

    /// Read a headed CSV stream. Short rows are kept; missing trailing
    /// fields read as absent.
    pub fn from_csv_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BalanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_reader(file, delimiter)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// One located demand or supply observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub id: String,
    pub label: String,
    pub point: GeoPoint,
    /// Non-negative count (or its rescaled log)
    pub magnitude: f64,
    pub category: String,
}

/// Why a row or record did not reach the influence fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnparsableCoordinate,
    UnparsableMagnitude,
    /// Coordinate parsed but outside the lat/lon domain
    InvalidPoint,
    /// No valid cell for the point at the run resolution
    DegenerateCell,
}

/// Per-dataset tally of dropped rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub unparsable_coordinate: usize,
    pub unparsable_magnitude: usize,
    pub invalid_point: usize,
    pub degenerate_cell: usize,
}

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::UnparsableCoordinate => self.unparsable_coordinate += 1,
            DropReason::UnparsableMagnitude => self.unparsable_magnitude += 1,
            DropReason::InvalidPoint => self.invalid_point += 1,
            DropReason::DegenerateCell => self.degenerate_cell += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unparsable_coordinate + self.unparsable_magnitude + self.invalid_point + self.degenerate_cell
    }

    pub fn merge(&mut self, other: &DropCounts) {
        self.unparsable_coordinate += other.unparsable_coordinate;
        self.unparsable_magnitude += other.unparsable_magnitude;
        self.invalid_point += other.invalid_point;
        self.degenerate_cell += other.degenerate_cell;
    }
}
