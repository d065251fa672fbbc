use crate::constants::*;
use crate::diffusion::DiffusionKernel;
use crate::error::{BalanceError, Result};
use crate::source_cells::Aggregation;
use h3o::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Which categories (cantons) a run admits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl CategoryFilter {
    pub fn only<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategoryFilter::Only(categories.into_iter().map(Into::into).collect())
    }

    pub fn admits(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(set) => set.contains(category),
        }
    }

    /// True when nothing at all can pass the filter
    pub fn is_empty_selection(&self) -> bool {
        matches!(self, CategoryFilter::Only(set) if set.is_empty())
    }
}

/// Which supply assets count toward the mobility offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MobilityKind {
    #[default]
    ParkAndRide,
    BikeShare,
    Combined,
}

impl MobilityKind {
    pub fn magnitude_columns(&self) -> Vec<&'static str> {
        match self {
            MobilityKind::ParkAndRide => vec![COL_PARK_AND_RIDE],
            MobilityKind::BikeShare => vec![COL_BIKE_SHARE],
            MobilityKind::Combined => vec![COL_PARK_AND_RIDE, COL_BIKE_SHARE],
        }
    }
}

/// Immutable run configuration, passed explicitly into every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// H3 resolution of the grid (6, 7 or 8)
    pub resolution: u8,
    pub radius_demand: u32,
    pub radius_supply: u32,
    pub decay_exponent_demand: u32,
    pub decay_exponent_supply: u32,
    pub category_filter: CategoryFilter,
    /// Subtract the mean balance from every cell after scoring
    pub recenter_balance: bool,
    pub mobility_kind: MobilityKind,
    pub demand_aggregation: Aggregation,
    pub supply_aggregation: Aggregation,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            radius_demand: DEFAULT_RADIUS_DEMAND,
            radius_supply: DEFAULT_RADIUS_SUPPLY,
            decay_exponent_demand: DEFAULT_DECAY_EXPONENT_DEMAND,
            decay_exponent_supply: DEFAULT_DECAY_EXPONENT_SUPPLY,
            category_filter: CategoryFilter::All,
            recenter_balance: true,
            mobility_kind: MobilityKind::ParkAndRide,
            demand_aggregation: Aggregation::Mean,
            supply_aggregation: Aggregation::Sum,
        }
    }
}

impl BalanceConfig {
    /// Parse a config from JSON text; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: BalanceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| BalanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check every numeric option against its supported range
    pub fn validate(&self) -> Result<()> {
        self.h3_resolution()?;
        check_range("radius_demand", self.radius_demand, MIN_RADIUS, MAX_RADIUS)?;
        check_range("radius_supply", self.radius_supply, MIN_RADIUS, MAX_RADIUS)?;
        check_range(
            "decay_exponent_demand",
            self.decay_exponent_demand,
            MIN_DECAY_EXPONENT,
            MAX_DECAY_EXPONENT,
        )?;
        check_range(
            "decay_exponent_supply",
            self.decay_exponent_supply,
            MIN_DECAY_EXPONENT,
            MAX_DECAY_EXPONENT,
        )?;
        Ok(())
    }

    pub fn h3_resolution(&self) -> Result<Resolution> {
        let resolution = Resolution::try_from(self.resolution)
            .map_err(|e| BalanceError::config("resolution", e.to_string()))?;
        if !SUPPORTED_RESOLUTIONS.contains(&resolution) {
            return Err(BalanceError::config(
                "resolution",
                format!("{} is not one of 6, 7, 8", self.resolution),
            ));
        }
        Ok(resolution)
    }

    /// Rings zero-initialized around every source, shared by both fields
    pub fn footprint_radius(&self) -> u32 {
        self.radius_demand.max(self.radius_supply)
    }

    pub fn demand_kernel(&self) -> DiffusionKernel {
        DiffusionKernel::new(self.radius_demand, self.decay_exponent_demand)
    }

    pub fn supply_kernel(&self) -> DiffusionKernel {
        DiffusionKernel::new(self.radius_supply, self.decay_exponent_supply)
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(BalanceError::config(
            field,
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(())
}
