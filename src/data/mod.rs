//! Data module - CSV loading and the view pipeline

mod aggregator;
mod error;
mod loader;
mod normalizer;
mod pipeline;
mod ranker;
pub mod schema;

pub use error::PipelineError;
pub use normalizer::AliasMap;
pub use pipeline::{
    numeric_values, text_values, DashboardTables, Dimension, PipelineContext, Selection,
    ViewSettings, DEFAULT_TOP_N,
};
