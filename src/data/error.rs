use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("At least one group key is required")]
    NoGroupKeys,

    #[error("Aggregates are not keyed identically: {0}")]
    KeyMismatch(String),

    #[error("Population sums to zero for group {0}; rate is undefined")]
    ZeroPopulation(String),
}
