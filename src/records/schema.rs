use crate::config::MobilityKind;
use crate::constants::*;
use serde::{Deserialize, Serialize};

/// How raw magnitudes are turned into source magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeTransform {
    /// Use the (summed) count as is
    #[default]
    Raw,
    /// Natural log, then divided by the largest log in the current batch
    LogRelativeMax,
}

/// Which columns of a raw table carry what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Dataset name used in diagnostics ("demand", "supply")
    pub dataset: String,
    /// Combined `"lat,lon"` column
    pub coordinate_column: String,
    /// Summed into one magnitude
    pub magnitude_columns: Vec<String>,
    pub id_column: String,
    pub label_column: Option<String>,
    /// Tables without a category column are never filtered
    pub category_column: Option<String>,
    pub transform: MagnitudeTransform,
    /// Read an empty magnitude field as 0 instead of dropping the row
    pub missing_magnitude_as_zero: bool,
}

impl TableSchema {
    /// SBB passenger frequency table: daily traffic per station, by canton
    pub fn passenger_frequency() -> Self {
        Self {
            dataset: "demand".to_string(),
            coordinate_column: COL_GEOPOSITION.to_string(),
            magnitude_columns: vec![COL_DAILY_TRAFFIC.to_string()],
            id_column: COL_STATION_CODE.to_string(),
            label_column: Some(COL_STATION_NAME.to_string()),
            category_column: Some(COL_CANTON.to_string()),
            transform: MagnitudeTransform::LogRelativeMax,
            missing_magnitude_as_zero: false,
        }
    }

    /// SBB mobility table: park-and-ride spaces and rental bikes per stop
    pub fn mobility(kind: MobilityKind) -> Self {
        Self {
            dataset: "supply".to_string(),
            coordinate_column: COL_GEOPOSITION.to_string(),
            magnitude_columns: kind
                .magnitude_columns()
                .into_iter()
                .map(String::from)
                .collect(),
            id_column: COL_STATION_ABBREVIATION.to_string(),
            label_column: Some(COL_STOP_NAME.to_string()),
            category_column: None,
            transform: MagnitudeTransform::Raw,
            missing_magnitude_as_zero: true,
        }
    }
}
