//! Tabular Normalizer
//!
//! Turns raw rows into [`SourceRecord`]s: category filtering first, then the
//! combined coordinate split, numeric coercion and the magnitude transform.
//! Bad rows are dropped and counted, never fatal.

use super::schema::{MagnitudeTransform, TableSchema};
use super::{DropCounts, DropReason, RawTable, SourceRecord};
use crate::config::CategoryFilter;
use crate::error::{BalanceError, Result};
use crate::geocell::GeoPoint;
use crate::math_utils::finite_max;
use tracing::{debug, warn};

/// Records that survived normalization, with the tally of what did not.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch {
    pub dataset: String,
    pub records: Vec<SourceRecord>,
    pub drops: DropCounts,
    /// Rows rejected by the category filter (not counted as drops)
    pub excluded_by_category: usize,
    pub rows_read: usize,
}

impl NormalizedBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct ColumnMap {
    coordinate: usize,
    magnitudes: Vec<usize>,
    id: usize,
    label: Option<usize>,
    category: Option<usize>,
}

impl ColumnMap {
    fn resolve(table: &RawTable, schema: &TableSchema) -> Result<Self> {
        let find = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| BalanceError::MissingColumn {
                    dataset: schema.dataset.clone(),
                    column: name.to_string(),
                })
        };

        Ok(Self {
            coordinate: find(&schema.coordinate_column)?,
            magnitudes: schema
                .magnitude_columns
                .iter()
                .map(|c| find(c))
                .collect::<Result<Vec<_>>>()?,
            id: find(&schema.id_column)?,
            label: schema.label_column.as_deref().map(find).transpose()?,
            category: schema.category_column.as_deref().map(find).transpose()?,
        })
    }
}

fn field(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

/// Split `"lat,lon"` on the first comma and parse both halves
pub fn parse_coordinate(text: &str) -> Option<GeoPoint> {
    let (lat, lon) = text.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;
    Some(GeoPoint::new(lat, lon))
}

fn parse_magnitude(row: &[String], columns: &[usize], missing_as_zero: bool) -> Option<f64> {
    let mut total = 0.0;
    for &index in columns {
        let text = field(row, index);
        let value = if text.is_empty() {
            if missing_as_zero { 0.0 } else { return None; }
        } else {
            let parsed = text.parse::<f64>().ok()?;
            if parsed.is_nan() && missing_as_zero { 0.0 } else { parsed }
        };
        total += value;
    }
    Some(total)
}

/// Rescale raw magnitudes in place; results are always finite and >= 0
fn apply_transform(records: &mut [SourceRecord], transform: MagnitudeTransform) {
    match transform {
        MagnitudeTransform::Raw => {
            for record in records.iter_mut() {
                record.magnitude = clamp_magnitude(record.magnitude);
            }
        }
        MagnitudeTransform::LogRelativeMax => {
            let logs: Vec<f64> = records.iter().map(|r| r.magnitude.ln()).collect();
            let max = finite_max(logs.iter().copied()).filter(|m| *m > 0.0);
            debug!(max_log = ?max, "log magnitude scale");

            for (record, log) in records.iter_mut().zip(logs) {
                let scaled = match max {
                    Some(m) => log / m,
                    None => log,
                };
                record.magnitude = clamp_magnitude(scaled);
            }
        }
    }
}

fn clamp_magnitude(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

/// Normalize one raw table into source records
///
/// Fails only when a schema column is missing or when the category filter
/// admits nothing from a categorized table.
pub fn normalize_table(
    table: &RawTable,
    schema: &TableSchema,
    filter: &CategoryFilter,
) -> Result<NormalizedBatch> {
    if schema.category_column.is_some() && filter.is_empty_selection() {
        return Err(BalanceError::EmptySelection {
            dataset: schema.dataset.clone(),
        });
    }

    let columns = ColumnMap::resolve(table, schema)?;
    let mut drops = DropCounts::default();
    let mut excluded_by_category = 0;
    let mut records = Vec::with_capacity(table.len());

    for row in table.rows() {
        let category = columns
            .category
            .map(|index| field(row, index).to_string())
            .unwrap_or_default();
        if columns.category.is_some() && !filter.admits(&category) {
            excluded_by_category += 1;
            continue;
        }

        let Some(point) = parse_coordinate(field(row, columns.coordinate)) else {
            drops.record(DropReason::UnparsableCoordinate);
            continue;
        };
        if !point.is_valid() {
            drops.record(DropReason::InvalidPoint);
            continue;
        }
        let Some(magnitude) =
            parse_magnitude(row, &columns.magnitudes, schema.missing_magnitude_as_zero)
        else {
            drops.record(DropReason::UnparsableMagnitude);
            continue;
        };

        let id = field(row, columns.id).to_string();
        let label = columns
            .label
            .map(|index| field(row, index).to_string())
            .unwrap_or_else(|| id.clone());

        records.push(SourceRecord {
            id,
            label,
            point,
            magnitude,
            category,
        });
    }

    // a categorized table must leave at least one usable record
    if columns.category.is_some() && records.is_empty() {
        return Err(BalanceError::EmptySelection {
            dataset: schema.dataset.clone(),
        });
    }

    apply_transform(&mut records, schema.transform);

    if drops.total() > 0 {
        warn!(
            dataset = %schema.dataset,
            unparsable_coordinate = drops.unparsable_coordinate,
            unparsable_magnitude = drops.unparsable_magnitude,
            invalid_point = drops.invalid_point,
            "dropped rows during normalization"
        );
    }
    debug!(
        dataset = %schema.dataset,
        rows = table.len(),
        kept = records.len(),
        excluded_by_category,
        "normalized table"
    );

    Ok(NormalizedBatch {
        dataset: schema.dataset.clone(),
        records,
        drops,
        excluded_by_category,
        rows_read: table.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MobilityKind;
    use approx::assert_abs_diff_eq;

    fn demand_table() -> RawTable {
        RawTable::from_strs(
            &["code", "Bahnhof_Haltestelle", "Kanton", "Geoposition", "DTV"],
            &[
                &["ZUE", "Zürich HB", "ZH", "47.378177,8.540192", "471300"],
                &["WIN", "Winterthur", "ZH", "47.500331,8.723616", "117500"],
                &["BN", "Bern", "BE", "46.948832,7.439136", "263200"],
                &["XX", "Broken", "BE", "not a coordinate", "1000"],
                &["YY", "Nowhere", "VS", "46.1,7.1", ""],
            ],
        )
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("47.5,8.7"), Some(GeoPoint::new(47.5, 8.7)));
        assert_eq!(parse_coordinate(" 47.5 , 8.7 "), Some(GeoPoint::new(47.5, 8.7)));
        assert_eq!(parse_coordinate("47.5;8.7"), None);
        assert_eq!(parse_coordinate("47.5,"), None);
        assert_eq!(parse_coordinate("abc,8.7"), None);
        assert_eq!(parse_coordinate(""), None);
    }

    #[test]
    fn test_demand_log_rescaled_to_batch_max() {
        let batch = normalize_table(
            &demand_table(),
            &TableSchema::passenger_frequency(),
            &CategoryFilter::All,
        )
        .unwrap();

        assert_eq!(batch.records.len(), 3);
        assert_eq!(batch.drops.unparsable_coordinate, 1);
        assert_eq!(batch.drops.unparsable_magnitude, 1);

        let max_log = 471300f64.ln();
        assert_abs_diff_eq!(batch.records[0].magnitude, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(batch.records[1].magnitude, 117500f64.ln() / max_log, epsilon = 1e-12);
        assert_eq!(batch.records[0].label, "Zürich HB");
        assert_eq!(batch.records[2].category, "BE");
    }

    #[test]
    fn test_rescale_is_relative_to_filtered_batch() {
        let batch = normalize_table(
            &demand_table(),
            &TableSchema::passenger_frequency(),
            &CategoryFilter::only(["BE"]),
        )
        .unwrap();

        // Bern is now the largest station in the batch
        assert_eq!(batch.records.len(), 1);
        assert_abs_diff_eq!(batch.records[0].magnitude, 1.0, epsilon = 1e-12);
        assert_eq!(batch.excluded_by_category, 3);
        assert_eq!(batch.drops.unparsable_coordinate, 1);
    }

    #[test]
    fn test_filter_excluding_everything_is_empty_selection() {
        let result = normalize_table(
            &demand_table(),
            &TableSchema::passenger_frequency(),
            &CategoryFilter::only(["TI"]),
        );
        assert!(matches!(result, Err(BalanceError::EmptySelection { .. })));

        let result = normalize_table(
            &demand_table(),
            &TableSchema::passenger_frequency(),
            &CategoryFilter::only(Vec::<String>::new()),
        );
        assert!(matches!(result, Err(BalanceError::EmptySelection { .. })));
    }

    #[test]
    fn test_admitted_rows_all_dropped_is_empty_selection() {
        // VS admits only "Nowhere", whose DTV is empty
        let result = normalize_table(
            &demand_table(),
            &TableSchema::passenger_frequency(),
            &CategoryFilter::only(["VS"]),
        );
        match result {
            Err(BalanceError::EmptySelection { dataset }) => assert_eq!(dataset, "demand"),
            other => panic!("expected empty selection, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_counts_become_zero() {
        let table = RawTable::from_strs(
            &["code", "Bahnhof_Haltestelle", "Kanton", "Geoposition", "DTV"],
            &[
                &["A", "A", "ZH", "47.0,8.0", "0"],
                &["B", "B", "ZH", "47.1,8.1", "0.5"],
                &["C", "C", "ZH", "47.2,8.2", "-3"],
                &["D", "D", "ZH", "47.3,8.3", "100"],
            ],
        );
        let batch =
            normalize_table(&table, &TableSchema::passenger_frequency(), &CategoryFilter::All).unwrap();

        let magnitudes: Vec<f64> = batch.records.iter().map(|r| r.magnitude).collect();
        assert_eq!(magnitudes, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_supply_sums_columns_and_fills_missing() {
        let table = RawTable::from_strs(
            &["Abkuerzung Bahnhof", "Name Haltestelle", "Geoposition", "parkrail_anzahl", "mietvelo_anzahl"],
            &[
                &["ZUE", "Zürich HB", "47.378177,8.540192", "", "20"],
                &["OL", "Olten", "47.351928,7.907684", "150", ""],
                &["BAD", "Bad", "47.35,7.90", "lots", "1"],
            ],
        );

        let batch = normalize_table(
            &table,
            &TableSchema::mobility(MobilityKind::Combined),
            &CategoryFilter::only(["ZH"]),
        )
        .unwrap();

        // the mobility table has no category column, so the filter does not apply
        assert_eq!(batch.excluded_by_category, 0);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].magnitude, 20.0);
        assert_eq!(batch.records[1].magnitude, 150.0);
        assert_eq!(batch.drops.unparsable_magnitude, 1);
    }

    #[test]
    fn test_out_of_range_point_is_dropped() {
        let table = RawTable::from_strs(
            &["Abkuerzung Bahnhof", "Name Haltestelle", "Geoposition", "parkrail_anzahl"],
            &[&["Z", "Z", "147.0,8.0", "10"], &["N", "N", "NaN,8.0", "10"]],
        );
        let batch = normalize_table(
            &table,
            &TableSchema::mobility(MobilityKind::ParkAndRide),
            &CategoryFilter::All,
        )
        .unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.drops.invalid_point, 2);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let table = RawTable::from_strs(&["code", "Geoposition"], &[]);
        match normalize_table(&table, &TableSchema::passenger_frequency(), &CategoryFilter::All) {
            Err(BalanceError::MissingColumn { dataset, column }) => {
                assert_eq!(dataset, "demand");
                assert_eq!(column, "DTV");
            }
            other => panic!("expected missing column, got {:?}", other),
        }
    }
}
