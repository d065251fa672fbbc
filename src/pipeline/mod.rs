//! Batch balance pipeline
//!
//! Normalizer -> Indexer -> Diffusion (demand, supply) -> Scorer, each stage
//! a pure function of the previous stage's output. A run either returns a
//! complete [`BalanceReport`] or an error; nothing partial escapes.

mod timing;

pub use timing::{format_timing_report, CancelToken, StageTiming};

use crate::config::BalanceConfig;
use crate::diffusion::{diffuse, InfluenceField};
use crate::error::{BalanceError, Result};
use crate::export::{self, ScoredCell};
use crate::geocell::GeoCellIndexer;
use crate::records::{normalize_table, DropCounts, NormalizedBatch, RawTable, TableSchema};
use crate::scoring::{score_balance, BalanceGrid};
use crate::source_cells::{Aggregation, SourceCells};
use geojson::FeatureCollection;
use serde::Serialize;
use std::io::Write;
use timing::timed;
use tracing::{debug, info};

/// What happened to one input table on its way to the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetDiagnostics {
    pub dataset: String,
    pub rows_read: usize,
    pub excluded_by_category: usize,
    /// Records that reached a cell
    pub records: usize,
    pub source_cells: usize,
    pub drops: DropCounts,
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    pub grid: BalanceGrid,
    pub demand_field: InfluenceField,
    pub supply_field: InfluenceField,
    pub demand: DatasetDiagnostics,
    pub supply: DatasetDiagnostics,
    pub timings: Vec<StageTiming>,
}

impl BalanceReport {
    pub fn scored_cells(&self) -> Vec<ScoredCell> {
        self.grid.to_scored_cells()
    }

    pub fn feature_collection(&self) -> FeatureCollection {
        export::to_feature_collection(&self.scored_cells())
    }

    pub fn write_geojson<W: Write>(&self, sink: W) -> Result<()> {
        export::write_feature_collection(&self.scored_cells(), sink)
    }

    pub fn timing_report(&self) -> String {
        format_timing_report(&self.timings)
    }
}

struct IndexedDataset {
    sources: SourceCells,
    diagnostics: DatasetDiagnostics,
}

fn index_dataset(batch: NormalizedBatch, indexer: &GeoCellIndexer, aggregation: Aggregation) -> IndexedDataset {
    let (sources, cell_drops) = SourceCells::aggregate(&batch.records, indexer, aggregation);
    let mut drops = batch.drops;
    drops.merge(&cell_drops);

    IndexedDataset {
        diagnostics: DatasetDiagnostics {
            dataset: batch.dataset,
            rows_read: batch.rows_read,
            excluded_by_category: batch.excluded_by_category,
            records: batch.records.len() - cell_drops.degenerate_cell,
            source_cells: sources.len(),
            drops,
        },
        sources,
    }
}

/// Runs the balance computation for one validated configuration.
#[derive(Debug, Clone)]
pub struct BalancePipeline {
    config: BalanceConfig,
    indexer: GeoCellIndexer,
    demand_schema: TableSchema,
    supply_schema: TableSchema,
    cancel: CancelToken,
}

impl BalancePipeline {
    /// Validate `config` and set up the SBB table layouts
    pub fn new(config: BalanceConfig) -> Result<Self> {
        config.validate()?;
        let indexer = GeoCellIndexer::new(config.h3_resolution()?);
        let supply_schema = TableSchema::mobility(config.mobility_kind);

        Ok(Self {
            config,
            indexer,
            demand_schema: TableSchema::passenger_frequency(),
            supply_schema,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_schemas(mut self, demand: TableSchema, supply: TableSchema) -> Self {
        self.demand_schema = demand;
        self.supply_schema = supply;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub fn indexer(&self) -> &GeoCellIndexer {
        &self.indexer
    }

    fn checkpoint(&self, stage: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            debug!(stage, "cancellation requested");
            return Err(BalanceError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }

    /// Normalize one table on its own, e.g. for a single-dataset map
    pub fn normalize(&self, table: &RawTable, schema: &TableSchema) -> Result<NormalizedBatch> {
        normalize_table(table, schema, &self.config.category_filter)
    }

    /// Per-record cells of one dataset, labelled with the record labels,
    /// plus every row and record dropped on the way
    pub fn dataset_cells(
        &self,
        table: &RawTable,
        schema: &TableSchema,
    ) -> Result<(Vec<ScoredCell>, DropCounts)> {
        let batch = self.normalize(table, schema)?;
        let (cells, cell_drops) = export::record_cells(&batch.records, &self.indexer);
        let mut drops = batch.drops;
        drops.merge(&cell_drops);
        Ok((cells, drops))
    }

    pub fn run(&self, demand: &RawTable, supply: &RawTable) -> Result<BalanceReport> {
        if self.config.category_filter.is_empty_selection() {
            return Err(BalanceError::EmptySelection {
                dataset: self.demand_schema.dataset.clone(),
            });
        }

        let mut timings = Vec::new();
        let filter = &self.config.category_filter;

        let (demand_batch, supply_batch) = timed(&mut timings, "normalize", || {
            Ok::<_, BalanceError>((
                normalize_table(demand, &self.demand_schema, filter)?,
                normalize_table(supply, &self.supply_schema, filter)?,
            ))
        })?;
        self.checkpoint("normalize")?;

        let (demand_set, supply_set) = timed(&mut timings, "index", || {
            (
                index_dataset(demand_batch, &self.indexer, self.config.demand_aggregation),
                index_dataset(supply_batch, &self.indexer, self.config.supply_aggregation),
            )
        });
        self.checkpoint("index")?;

        let footprint = self.config.footprint_radius();
        let demand_field = timed(&mut timings, "diffuse_demand", || {
            diffuse(&demand_set.sources, &self.config.demand_kernel(), footprint)
        });
        self.checkpoint("diffuse_demand")?;

        let supply_field = timed(&mut timings, "diffuse_supply", || {
            diffuse(&supply_set.sources, &self.config.supply_kernel(), footprint)
        });
        self.checkpoint("diffuse_supply")?;

        let grid = timed(&mut timings, "score", || {
            score_balance(&demand_field, &supply_field, self.config.recenter_balance)
        });

        info!(
            cells = grid.len(),
            demand_sources = demand_set.diagnostics.source_cells,
            supply_sources = supply_set.diagnostics.source_cells,
            demand_dropped = demand_set.diagnostics.drops.total(),
            supply_dropped = supply_set.diagnostics.drops.total(),
            "balance grid computed"
        );

        Ok(BalanceReport {
            grid,
            demand_field,
            supply_field,
            demand: demand_set.diagnostics,
            supply: supply_set.diagnostics,
            timings,
        })
    }
}
