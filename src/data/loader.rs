//! CSV Data Loader Module
//! Reads the record and coordinate tables with Polars and conforms them to
//! the canonical schema (column names, dtypes, value ranges).

use crate::data::schema::{coordinates, records};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Input file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("{file}: missing column '{column}'")]
    MissingColumn { file: String, column: String },
    #[error("{file}: column '{column}' {reason}")]
    Malformed {
        file: String,
        column: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy)]
enum ColumnKind {
    Text,
    Integer,
    Number,
}

impl ColumnKind {
    fn dtype(self) -> DataType {
        match self {
            ColumnKind::Text => DataType::String,
            ColumnKind::Integer => DataType::Int64,
            ColumnKind::Number => DataType::Float64,
        }
    }
}

/// One required column: canonical name, the headers accepted for it in the
/// source file, and the checks applied after casting.
struct ColumnSpec {
    name: &'static str,
    headers: &'static [&'static str],
    kind: ColumnKind,
    range: Option<(f64, f64)>,
    allowed: Option<&'static [&'static str]>,
}

impl ColumnSpec {
    const fn new(name: &'static str, headers: &'static [&'static str], kind: ColumnKind) -> Self {
        Self {
            name,
            headers,
            kind,
            range: None,
            allowed: None,
        }
    }

    const fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    const fn allowed(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = Some(values);
        self
    }
}

const RECORD_COLUMNS: [ColumnSpec; 9] = [
    ColumnSpec::new(records::COUNTRY, &["country"], ColumnKind::Text),
    ColumnSpec::new(records::YEAR, &["year"], ColumnKind::Integer),
    ColumnSpec::new(records::SEX, &["sex"], ColumnKind::Text).allowed(&["male", "female"]),
    ColumnSpec::new(records::AGE_BRACKET, &["age_bracket", "age"], ColumnKind::Text),
    ColumnSpec::new(records::GENERATION, &["generation"], ColumnKind::Text),
    ColumnSpec::new(records::SUICIDES_NO, &["suicides_no"], ColumnKind::Integer)
        .range(0.0, f64::INFINITY),
    ColumnSpec::new(records::POPULATION, &["population"], ColumnKind::Integer)
        .range(0.0, f64::INFINITY),
    ColumnSpec::new(
        records::GDP_PER_CAPITA,
        &["gdp_per_capita", "gdp_per_capita ($)"],
        ColumnKind::Number,
    )
    .range(0.0, f64::INFINITY),
    ColumnSpec::new(
        records::SUICIDES_PER_100K,
        &["suicides_per_100k", "suicides/100k pop"],
        ColumnKind::Number,
    ),
];

const COORDINATE_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec::new(coordinates::COUNTRY, &["country", "name"], ColumnKind::Text),
    ColumnSpec::new(coordinates::LATITUDE, &["latitude", "lat"], ColumnKind::Number)
        .range(-90.0, 90.0),
    ColumnSpec::new(coordinates::LONGITUDE, &["longitude", "lon"], ColumnKind::Number)
        .range(-180.0, 180.0),
];

/// Handles CSV file loading with Polars.
pub struct DataLoader;

impl DataLoader {
    /// Load the primary record table.
    pub fn load_records(path: &Path) -> Result<DataFrame, LoaderError> {
        let df = Self::read_csv(path)?;
        let df = Self::conform(df, path, &RECORD_COLUMNS)?;
        info!(path = %path.display(), rows = df.height(), "loaded record table");
        Ok(df)
    }

    /// Load the country coordinate table.
    pub fn load_coordinates(path: &Path) -> Result<DataFrame, LoaderError> {
        let df = Self::read_csv(path)?;
        let df = Self::conform(df, path, &COORDINATE_COLUMNS)?;
        info!(path = %path.display(), rows = df.height(), "loaded coordinate table");
        Ok(df)
    }

    fn read_csv(path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.is_file() {
            return Err(LoaderError::MissingFile(path.to_path_buf()));
        }

        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .finish()?
            .collect()?;

        debug!(
            path = %path.display(),
            columns = ?df.get_column_names(),
            "read raw csv"
        );
        Ok(df)
    }

    /// Keep only the required columns, renamed to their canonical names and
    /// cast to their canonical dtypes. Anything that does not fit is an error.
    fn conform(df: DataFrame, path: &Path, specs: &[ColumnSpec]) -> Result<DataFrame, LoaderError> {
        let file = path.display().to_string();
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut columns = Vec::with_capacity(specs.len());
        for spec in specs {
            // Kaggle headers carry stray padding, e.g. " gdp_for_year ($) "
            let source = spec
                .headers
                .iter()
                .find_map(|header| present.iter().find(|p| p.trim() == *header))
                .ok_or_else(|| LoaderError::MissingColumn {
                    file: file.clone(),
                    column: spec.name.to_string(),
                })?;

            let malformed = |reason: String| LoaderError::Malformed {
                file: file.clone(),
                column: spec.name.to_string(),
                reason,
            };

            let series = df
                .column(source)?
                .as_materialized_series()
                .strict_cast(&spec.kind.dtype())
                .map_err(|e| malformed(format!("has values that are not {:?}: {e}", spec.kind)))?
                .with_name(spec.name.into());

            if series.null_count() > 0 {
                return Err(malformed(format!(
                    "has {} empty values",
                    series.null_count()
                )));
            }

            if let Some((min, max)) = spec.range {
                let as_f64 = series.cast(&DataType::Float64)?;
                let outside = as_f64
                    .f64()?
                    .into_iter()
                    .flatten()
                    .find(|v| *v < min || *v > max);
                if let Some(bad) = outside {
                    return Err(malformed(format!("value {bad} outside [{min}, {max}]")));
                }
            }

            if let Some(allowed) = spec.allowed {
                let unexpected = series
                    .str()?
                    .into_iter()
                    .flatten()
                    .find(|v| !allowed.contains(v))
                    .map(str::to_string);
                if let Some(bad) = unexpected {
                    return Err(malformed(format!("unexpected value '{bad}'")));
                }
            }

            columns.push(Column::from(series));
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Get sorted distinct values of a text column.
    pub fn unique_values(df: &DataFrame, column: &str) -> Vec<String> {
        df.column(column)
            .ok()
            .and_then(|col| col.str().ok())
            .map(|ca| {
                ca.into_iter()
                    .flatten()
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }
}
