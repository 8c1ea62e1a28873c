//! Aggregator Module
//! Grouped sums/means and per-100k rate derivation.
//!
//! Every aggregate is sorted ascending by its group keys, so two aggregates
//! computed over the same keys and the same input always line up row by row.
//! Rates are derived from summed numerators and summed denominators; per-row
//! rates are never averaged.

use crate::data::error::PipelineError;
use crate::data::schema::records::{POPULATION, SUICIDES_NO, SUICIDES_PER_100K};
use polars::prelude::*;
use tracing::{debug, warn};

/// Scale factor for per-capita rates.
pub const PER_100K: f64 = 100_000.0;

/// How the non-key columns of a group are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    #[default]
    Sum,
    Mean,
}

/// Rated groups with the groups whose rate is undefined set aside.
#[derive(Debug, Clone)]
pub struct RatedGroups {
    /// keys, `suicides_no`, `population`, `suicides_per_100k`, then any
    /// mean columns
    pub table: DataFrame,
    /// Groups whose population sums to zero, e.g. `country=Z`.
    pub undefined: Vec<String>,
}

/// Computes grouped views over the record table.
pub struct Aggregator;

impl Aggregator {
    /// Sum `sum_columns` for every distinct combination of `group_keys`.
    pub fn aggregate(
        df: &DataFrame,
        group_keys: &[&str],
        sum_columns: &[&str],
    ) -> Result<DataFrame, PipelineError> {
        Self::aggregate_with(df, group_keys, sum_columns, Reducer::Sum)
    }

    /// Reduce `columns` with `reducer` for every distinct combination of
    /// `group_keys`. Output is sorted by the keys.
    pub fn aggregate_with(
        df: &DataFrame,
        group_keys: &[&str],
        columns: &[&str],
        reducer: Reducer,
    ) -> Result<DataFrame, PipelineError> {
        if group_keys.is_empty() {
            return Err(PipelineError::NoGroupKeys);
        }
        ensure_columns(df, group_keys.iter().chain(columns))?;

        let keys: Vec<Expr> = group_keys.iter().map(|k| col(*k)).collect();
        let aggs: Vec<Expr> = columns
            .iter()
            .map(|c| match reducer {
                Reducer::Sum => col(*c).sum(),
                Reducer::Mean => col(*c).mean(),
            })
            .collect();

        let grouped = df
            .clone()
            .lazy()
            .group_by(keys.clone())
            .agg(aggs)
            .sort_by_exprs(keys, SortMultipleOptions::default())
            .collect()?;

        debug!(
            keys = ?group_keys,
            columns = ?columns,
            ?reducer,
            groups = grouped.height(),
            "aggregated"
        );
        Ok(grouped)
    }

    /// Rate of sums per group of `group_keys`, plus the mean of each of
    /// `mean_columns`.
    ///
    /// Groups whose population sums to zero have no rate. They are dropped
    /// from the table, logged, and listed in `undefined`; the rest are rated.
    pub fn rates_by_group(
        records: &DataFrame,
        group_keys: &[&str],
        mean_columns: &[&str],
    ) -> Result<RatedGroups, PipelineError> {
        let suicides = Self::aggregate(records, group_keys, &[SUICIDES_NO])?;
        let population = Self::aggregate(records, group_keys, &[POPULATION])?;
        ensure_same_keys(&suicides, &population, group_keys)?;

        let populated = population
            .column(POPULATION)?
            .as_materialized_series()
            .gt(0)?;
        let keys: Vec<String> = group_keys.iter().map(|k| k.to_string()).collect();
        let undefined: Vec<String> = (&populated)
            .into_iter()
            .enumerate()
            .filter(|(_, has_population)| !has_population.unwrap_or(false))
            .map(|(row, _)| describe_group(&population, &keys, row))
            .collect();
        for group in &undefined {
            warn!(group = %group, "population sums to zero, group has no rate");
        }

        let mut table = Self::suicides_per_100k(
            &suicides.filter(&populated)?,
            &population.filter(&populated)?,
        )?;
        if !mean_columns.is_empty() {
            let means = Self::aggregate_with(records, group_keys, mean_columns, Reducer::Mean)?
                .filter(&populated)?;
            ensure_same_keys(&table, &means, group_keys)?;
            for column in mean_columns {
                table.with_column(means.column(column)?.clone())?;
            }
        }

        Ok(RatedGroups { table, undefined })
    }

    /// Derive `suicides_per_100k` from a suicide-count aggregate and a
    /// population aggregate over the same keys.
    ///
    /// The key columns are those of `population_grouped` other than
    /// `population`. Both tables must hold identical key values in identical
    /// order. A group whose population sums to zero is an error.
    pub fn suicides_per_100k(
        grouped: &DataFrame,
        population_grouped: &DataFrame,
    ) -> Result<DataFrame, PipelineError> {
        ensure_columns(grouped, [SUICIDES_NO])?;
        ensure_columns(population_grouped, [POPULATION])?;

        let keys: Vec<String> = population_grouped
            .get_column_names()
            .iter()
            .filter(|name| name.as_str() != POPULATION)
            .map(|name| name.to_string())
            .collect();
        if keys.is_empty() {
            return Err(PipelineError::NoGroupKeys);
        }
        ensure_same_keys(grouped, population_grouped, &keys)?;

        let suicides = grouped.column(SUICIDES_NO)?.cast(&DataType::Float64)?;
        let population = population_grouped
            .column(POPULATION)?
            .cast(&DataType::Float64)?;

        let mut rates = Vec::with_capacity(grouped.height());
        for (row, (s, p)) in suicides
            .f64()?
            .into_iter()
            .zip(population.f64()?.into_iter())
            .enumerate()
        {
            match p {
                Some(p) if p > 0.0 => rates.push(s.unwrap_or(0.0) / p * PER_100K),
                _ => {
                    return Err(PipelineError::ZeroPopulation(describe_group(
                        population_grouped,
                        &keys,
                        row,
                    )))
                }
            }
        }

        let mut out = grouped.clone();
        if out.column(POPULATION).is_err() {
            out.with_column(population_grouped.column(POPULATION)?.clone())?;
        }
        out.with_column(Column::new(SUICIDES_PER_100K.into(), rates))?;
        Ok(out)
    }
}

/// Fail with `ColumnNotFound` unless every name is a column of `df`.
pub(crate) fn ensure_columns<I, S>(df: &DataFrame, names: I) -> Result<(), PipelineError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for name in names {
        let name = name.as_ref();
        if df.column(name).is_err() {
            return Err(PipelineError::ColumnNotFound(name.to_string()));
        }
    }
    Ok(())
}

/// Fail with `KeyMismatch` unless both tables hold the same key values in
/// the same order.
pub(crate) fn ensure_same_keys<S: AsRef<str>>(
    left: &DataFrame,
    right: &DataFrame,
    keys: &[S],
) -> Result<(), PipelineError> {
    if left.height() != right.height() {
        return Err(PipelineError::KeyMismatch(format!(
            "{} groups vs {} groups",
            left.height(),
            right.height()
        )));
    }
    ensure_columns(left, keys)?;
    ensure_columns(right, keys)?;

    for key in keys {
        let key = key.as_ref();
        let l = left.column(key)?.as_materialized_series();
        let r = right.column(key)?.as_materialized_series();
        if !l.equals_missing(r) {
            return Err(PipelineError::KeyMismatch(format!(
                "values of '{key}' differ"
            )));
        }
    }
    Ok(())
}

/// Human-readable label of one group, e.g. `country=Albania, year=1987`.
fn describe_group(df: &DataFrame, keys: &[String], row: usize) -> String {
    keys.iter()
        .map(|key| {
            let value = df
                .column(key)
                .and_then(|c| c.cast(&DataType::String))
                .ok()
                .and_then(|c| c.str().ok().and_then(|ca| ca.get(row).map(str::to_string)))
                .unwrap_or_else(|| "null".to_string());
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}
