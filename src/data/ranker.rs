//! Ranker Module
//! Top-N selection over grouped tables.

use crate::data::aggregator::ensure_columns;
use crate::data::error::PipelineError;
use polars::prelude::*;

pub struct Ranker;

impl Ranker {
    /// The `n` rows with the largest `metric_column`, descending.
    ///
    /// Ties keep their original row order and null metrics sort last.
    /// Asking for more rows than the table holds returns all of them.
    pub fn top_n(df: &DataFrame, metric_column: &str, n: usize) -> Result<DataFrame, PipelineError> {
        ensure_columns(df, [metric_column])?;

        let sorted = df
            .clone()
            .lazy()
            .sort_by_exprs(
                [col(metric_column)],
                SortMultipleOptions::default()
                    .with_order_descending(true)
                    .with_nulls_last(true)
                    .with_maintain_order(true),
            )
            .collect()?;

        Ok(sorted.head(Some(n)))
    }
}
