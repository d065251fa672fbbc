pub mod config;
pub mod constants;
pub mod diffusion;
pub mod error;
pub mod export;
pub mod geocell;
pub mod math_utils;
pub mod pipeline;
pub mod records;
pub mod scoring;
pub mod source_cells;

pub use config::{BalanceConfig, CategoryFilter, MobilityKind};
pub use error::{BalanceError, Result};
pub use pipeline::{BalancePipeline, BalanceReport, CancelToken};
