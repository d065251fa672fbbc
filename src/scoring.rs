//! Field normalization and balance scoring
//!
//! Each influence field is rescaled as `value / mean - std` over the union of
//! both fields' cells (a cell missing from one field counts as 0 there). The
//! standard deviation is the sample one of the raw values, so this is not a
//! z-score.

use crate::diffusion::InfluenceField;
use crate::export::ScoredCell;
use crate::geocell::CellId;
use crate::math_utils::{mean, sample_std};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Mean and sample standard deviation of one field over the scored cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldStats {
    pub mean: f64,
    pub std: f64,
}

impl FieldStats {
    pub fn of(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            std: sample_std(values),
        }
    }

    /// `value / mean - std`; a zero or non-finite mean drops the ratio term
    pub fn normalize(&self, value: f64) -> f64 {
        let ratio = if self.mean != 0.0 && self.mean.is_finite() {
            value / self.mean
        } else {
            0.0
        };
        ratio - self.std
    }
}

/// Raw, normalized and balance values of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceCell {
    pub cell: CellId,
    pub demand: f64,
    pub supply: f64,
    pub normalized_demand: f64,
    pub normalized_supply: f64,
    /// Positive: demand outpaces supply (underserved)
    pub balance: f64,
}

/// Scored union of the demand and supply fields, ordered by cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceGrid {
    cells: Vec<BalanceCell>,
    pub demand_stats: FieldStats,
    pub supply_stats: FieldStats,
    /// Mean subtracted from every balance, when re-centering was requested
    pub recentered_by: Option<f64>,
}

impl BalanceGrid {
    pub fn cells(&self) -> &[BalanceCell] {
        &self.cells
    }

    pub fn get(&self, cell: &CellId) -> Option<&BalanceCell> {
        self.cells
            .binary_search_by(|probe| probe.cell.cmp(cell))
            .ok()
            .map(|index| &self.cells[index])
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Lowest and highest balance, for color scales
    pub fn balance_range(&self) -> Option<(f64, f64)> {
        let mut values = self.cells.iter().map(|c| c.balance);
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Balance map cells, labelled with their cell id
    pub fn to_scored_cells(&self) -> Vec<ScoredCell> {
        self.cells
            .iter()
            .map(|c| ScoredCell::new(c.cell, c.balance, c.cell.to_string()))
            .collect()
    }
}

/// Score every cell touched by either field
pub fn score_balance(demand: &InfluenceField, supply: &InfluenceField, recenter: bool) -> BalanceGrid {
    let union: BTreeSet<CellId> = demand.cells().chain(supply.cells()).collect();

    let demand_values: Vec<f64> = union.iter().map(|c| demand.get(c).unwrap_or(0.0)).collect();
    let supply_values: Vec<f64> = union.iter().map(|c| supply.get(c).unwrap_or(0.0)).collect();
    let demand_stats = FieldStats::of(&demand_values);
    let supply_stats = FieldStats::of(&supply_values);

    let mut cells: Vec<BalanceCell> = union
        .iter()
        .zip(demand_values.iter().zip(supply_values.iter()))
        .map(|(&cell, (&d, &s))| {
            let normalized_demand = demand_stats.normalize(d);
            let normalized_supply = supply_stats.normalize(s);
            BalanceCell {
                cell,
                demand: d,
                supply: s,
                normalized_demand,
                normalized_supply,
                balance: normalized_demand - normalized_supply,
            }
        })
        .collect();

    let recentered_by = if recenter && !cells.is_empty() {
        let balances: Vec<f64> = cells.iter().map(|c| c.balance).collect();
        let offset = mean(&balances);
        for cell in cells.iter_mut() {
            cell.balance -= offset;
        }
        Some(offset)
    } else {
        None
    };

    debug!(
        cells = cells.len(),
        demand_mean = demand_stats.mean,
        supply_mean = supply_stats.mean,
        ?recentered_by,
        "balance scored"
    );

    BalanceGrid {
        cells,
        demand_stats,
        supply_stats,
        recentered_by,
    }
}
