//! Data Pipeline Module
//! Turns the loaded record and coordinate tables into the input table of
//! every chart for one user selection.
//!
//! There is no caching: each selection recomputes every view from the raw
//! tables. The dataset is tens of thousands of rows, so a full pass is cheap.

use crate::data::aggregator::{Aggregator, RatedGroups};
use crate::data::error::PipelineError;
use crate::data::loader::{DataLoader, LoaderError};
use crate::data::normalizer::{AliasMap, Normalizer};
use crate::data::ranker::Ranker;
use crate::data::schema::{coordinates, map, records};
use crate::stats::{Loess, RateDistribution, DEFAULT_LOESS_BANDWIDTH};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Default size of the top-countries ranking.
pub const DEFAULT_TOP_N: usize = 15;

/// Demographic dimension of the breakdown chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    #[default]
    Sex,
    AgeBracket,
    Generation,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Sex, Dimension::AgeBracket, Dimension::Generation];

    /// Record-table column holding this dimension.
    pub fn column(self) -> &'static str {
        match self {
            Dimension::Sex => records::SEX,
            Dimension::AgeBracket => records::AGE_BRACKET,
            Dimension::Generation => records::GENERATION,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Sex => "sex",
            Dimension::AgeBracket => "age",
            Dimension::Generation => "generation",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The user's current choice; owned by the UI, passed by value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub dimension: Dimension,
    pub country: String,
}

/// Tunables of the derived views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub top_n: usize,
    pub loess_bandwidth: f64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            loess_bandwidth: DEFAULT_LOESS_BANDWIDTH,
        }
    }
}

/// Every chart input for one selection.
#[derive(Debug, Clone)]
pub struct DashboardTables {
    pub selection: Selection,
    /// `<dimension>`, `suicides_no`, `population`, `suicides_per_100k`
    pub by_dimension: DataFrame,
    /// `country`, `suicides_no`, `population`, `suicides_per_100k`, `gdp_per_capita`
    pub gdp_vs_rate: DataFrame,
    /// LOESS trend of rate over GDP, `[gdp_per_capita, suicides_per_100k]`
    pub gdp_trend: Vec<[f64; 2]>,
    /// `country`, `year`, `suicides_no` for the selected country
    pub country_by_year: DataFrame,
    /// `country`, `suicides_no`, largest first
    pub top_countries: DataFrame,
    /// `country`, `lat`, `lon`, `suicides_per_100k_pop`
    pub country_map: DataFrame,
    pub rate_distribution: RateDistribution,
    /// Groups left out of the rate views because their population sums to
    /// zero, e.g. `country=Z`.
    pub undefined_rates: Vec<String>,
}

impl DashboardTables {
    /// Output tables keyed by the file stem they are exported under.
    pub fn named_tables(&self) -> Vec<(String, &DataFrame)> {
        vec![
            (
                format!("suicides_by_{}", self.selection.dimension.label()),
                &self.by_dimension,
            ),
            ("gdp_vs_suicide_rate".to_string(), &self.gdp_vs_rate),
            ("suicides_by_year".to_string(), &self.country_by_year),
            ("top_countries".to_string(), &self.top_countries),
            ("suicide_rate_map".to_string(), &self.country_map),
        ]
    }
}

/// Owns the loaded inputs; every view is computed from here.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    records: DataFrame,
    coordinates: DataFrame,
    aliases: AliasMap,
    countries: Vec<String>,
    settings: ViewSettings,
}

impl PipelineContext {
    pub fn new(
        records: DataFrame,
        coordinates: DataFrame,
        aliases: AliasMap,
        settings: ViewSettings,
    ) -> Self {
        let countries = DataLoader::unique_values(&records, records::COUNTRY);
        Self {
            records,
            coordinates,
            aliases,
            countries,
            settings,
        }
    }

    /// Read both input files. Any load failure is fatal for the pipeline.
    pub fn load_inputs(
        records_path: &Path,
        coordinates_path: &Path,
        aliases: AliasMap,
        settings: ViewSettings,
    ) -> Result<Self, LoaderError> {
        let records = DataLoader::load_records(records_path)?;
        let coordinates = DataLoader::load_coordinates(coordinates_path)?;
        Ok(Self::new(records, coordinates, aliases, settings))
    }

    pub fn records(&self) -> &DataFrame {
        &self.records
    }

    pub fn coordinates(&self) -> &DataFrame {
        &self.coordinates
    }

    /// Countries of the record table, sorted.
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Initial selection: `preferred` if the dataset has it, else the first
    /// country.
    pub fn default_selection(&self, preferred: Option<&str>) -> Selection {
        let country = preferred
            .filter(|p| self.countries.iter().any(|c| c.as_str() == *p))
            .map(str::to_string)
            .or_else(|| self.countries.first().cloned())
            .unwrap_or_default();
        Selection {
            dimension: Dimension::default(),
            country,
        }
    }

    /// Recompute every view for `selection`.
    pub fn compute_view(&self, selection: &Selection) -> Result<DashboardTables, PipelineError> {
        info!(
            dimension = %selection.dimension,
            country = %selection.country,
            "computing dashboard"
        );

        let by_dimension = DataPipeline::dimension_breakdown(&self.records, selection.dimension)?;
        let country_rates = DataPipeline::country_rates(&self.records)?;
        let mut undefined_rates = by_dimension.undefined;
        undefined_rates.extend(country_rates.undefined);
        if !undefined_rates.is_empty() {
            warn!(groups = ?undefined_rates, "groups without a defined rate left out");
        }
        let by_dimension = by_dimension.table;
        let gdp_vs_rate = country_rates.table;

        let gdp_trend = DataPipeline::gdp_trend(&gdp_vs_rate, self.settings.loess_bandwidth)?;
        let country_by_year = DataPipeline::country_by_year(&self.records, &selection.country)?;
        let top_countries = DataPipeline::top_countries(&self.records, self.settings.top_n)?;
        let country_map = DataPipeline::country_map(&gdp_vs_rate, &self.coordinates, &self.aliases)?;
        let rate_distribution = RateDistribution::from_values(
            numeric_values(&country_map, map::SUICIDES_PER_100K_POP)?
                .into_iter()
                .flatten()
                .collect(),
        );

        debug!(
            groups = by_dimension.height(),
            years = country_by_year.height(),
            mapped = country_map.height(),
            "dashboard computed"
        );

        Ok(DashboardTables {
            selection: selection.clone(),
            by_dimension,
            gdp_vs_rate,
            gdp_trend,
            country_by_year,
            top_countries,
            country_map,
            rate_distribution,
            undefined_rates,
        })
    }
}

/// The individual view computations, each a pure function of its inputs.
pub struct DataPipeline;

impl DataPipeline {
    /// Suicides, population and rate per value of `dimension`.
    /// Age brackets come out in age order, the other dimensions sorted.
    pub fn dimension_breakdown(
        records: &DataFrame,
        dimension: Dimension,
    ) -> Result<RatedGroups, PipelineError> {
        let mut rated = Aggregator::rates_by_group(records, &[dimension.column()], &[])?;
        if dimension == Dimension::AgeBracket {
            rated.table = order_by_age(&rated.table)?;
        }
        Ok(rated)
    }

    /// Per-country totals, rate and mean GDP per capita. Countries with no
    /// population are listed in `undefined` instead.
    pub fn country_rates(records: &DataFrame) -> Result<RatedGroups, PipelineError> {
        Aggregator::rates_by_group(records, &[records::COUNTRY], &[records::GDP_PER_CAPITA])
    }

    /// LOESS curve of rate over GDP per capita.
    pub fn gdp_trend(country_rates: &DataFrame, bandwidth: f64) -> Result<Vec<[f64; 2]>, PipelineError> {
        let (xs, ys): (Vec<f64>, Vec<f64>) = numeric_values(country_rates, records::GDP_PER_CAPITA)?
            .into_iter()
            .zip(numeric_values(country_rates, records::SUICIDES_PER_100K)?)
            .filter_map(|(x, y)| Some((x?, y?)))
            .unzip();
        Ok(Loess::new(bandwidth).fit(&xs, &ys))
    }

    /// Yearly suicide totals of one country. Unknown countries give an
    /// empty table.
    pub fn country_by_year(records: &DataFrame, country: &str) -> Result<DataFrame, PipelineError> {
        let filtered = records
            .clone()
            .lazy()
            .filter(col(records::COUNTRY).eq(lit(country)))
            .collect()?;
        Aggregator::aggregate(
            &filtered,
            &[records::COUNTRY, records::YEAR],
            &[records::SUICIDES_NO],
        )
    }

    /// Countries with the most suicides over the whole period.
    pub fn top_countries(records: &DataFrame, n: usize) -> Result<DataFrame, PipelineError> {
        let totals = Aggregator::aggregate(records, &[records::COUNTRY], &[records::SUICIDES_NO])?;
        Ranker::top_n(&totals, records::SUICIDES_NO, n)
    }

    /// Per-country rate with coordinates, named for the map renderer.
    pub fn country_map(
        country_rates: &DataFrame,
        coordinate_table: &DataFrame,
        aliases: &AliasMap,
    ) -> Result<DataFrame, PipelineError> {
        let mut rates = country_rates.select([records::COUNTRY, records::SUICIDES_PER_100K])?;
        Normalizer::normalize_country_names(&mut rates, aliases)?;

        let mut joined = Normalizer::join_coordinates(&rates, coordinate_table)?;
        joined.rename(coordinates::LATITUDE, map::LAT.into())?;
        joined.rename(coordinates::LONGITUDE, map::LON.into())?;
        joined.rename(records::SUICIDES_PER_100K, map::SUICIDES_PER_100K_POP.into())?;

        Ok(joined.select([
            records::COUNTRY,
            map::LAT,
            map::LON,
            map::SUICIDES_PER_100K_POP,
        ])?)
    }
}

/// Leading integer of an age bracket: "15-24 years" -> 15, "75+ years" -> 75.
pub fn age_lower_bound(bracket: &str) -> Option<u32> {
    let digits: String = bracket
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Reorder rows by age bracket; unparseable brackets go last, in place.
fn order_by_age(df: &DataFrame) -> Result<DataFrame, PipelineError> {
    let mut order: Vec<(Option<u32>, IdxSize)> = df
        .column(records::AGE_BRACKET)?
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, bracket)| (bracket.and_then(age_lower_bound), row as IdxSize))
        .collect();
    order.sort_by_key(|&(bound, row)| (bound.is_none(), bound, row));

    let idx = IdxCa::from_vec("idx".into(), order.into_iter().map(|(_, row)| row).collect());
    Ok(df.take(&idx)?)
}

/// Values of a numeric column as `f64`, nulls kept.
pub fn numeric_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, PipelineError> {
    let values = df
        .column(column)
        .map_err(|_| PipelineError::ColumnNotFound(column.to_string()))?
        .cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().collect())
}

/// Values of any column rendered as text, nulls as empty strings.
pub fn text_values(df: &DataFrame, column: &str) -> Result<Vec<String>, PipelineError> {
    let values = df
        .column(column)
        .map_err(|_| PipelineError::ColumnNotFound(column.to_string()))?
        .cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const EPS: f64 = 1e-9;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("data")
            .join(name)
    }

    fn context(settings: ViewSettings) -> PipelineContext {
        PipelineContext::load_inputs(
            &fixture("records_sample.csv"),
            &fixture("coordinates_sample.csv"),
            AliasMap::default(),
            settings,
        )
        .unwrap()
    }

    fn int_sum(df: &DataFrame, column: &str) -> i64 {
        df.column(column).unwrap().i64().unwrap().sum().unwrap_or(0)
    }

    #[test]
    fn test_every_dimension_conserves_totals() {
        let ctx = context(ViewSettings::default());
        let raw = int_sum(ctx.records(), records::SUICIDES_NO);
        assert_eq!(raw, 40844);

        for dimension in Dimension::ALL {
            let grouped = DataPipeline::dimension_breakdown(ctx.records(), dimension)
                .unwrap()
                .table;
            assert_eq!(int_sum(&grouped, records::SUICIDES_NO), raw, "{dimension}");
            assert_eq!(
                int_sum(&grouped, records::POPULATION),
                int_sum(ctx.records(), records::POPULATION)
            );
        }
    }

    #[test]
    fn test_age_brackets_in_age_order() {
        let ctx = context(ViewSettings::default());
        let grouped = DataPipeline::dimension_breakdown(ctx.records(), Dimension::AgeBracket)
            .unwrap()
            .table;
        assert_eq!(
            text_values(&grouped, records::AGE_BRACKET).unwrap(),
            vec![
                "5-14 years",
                "15-24 years",
                "25-34 years",
                "35-54 years",
                "55-74 years",
                "75+ years"
            ]
        );
    }

    #[test]
    fn test_age_lower_bound() {
        assert_eq!(age_lower_bound("5-14 years"), Some(5));
        assert_eq!(age_lower_bound(" 75+ years"), Some(75));
        assert_eq!(age_lower_bound("unknown"), None);
    }

    #[test]
    fn test_country_rates_use_rate_of_sums() {
        let ctx = context(ViewSettings::default());
        let rated = DataPipeline::country_rates(ctx.records()).unwrap();
        assert!(rated.undefined.is_empty());
        let rates = rated.table;

        assert_eq!(
            text_values(&rates, records::COUNTRY).unwrap(),
            vec!["Albania", "Republic of Korea", "Russian Federation", "Utopia"]
        );
        let albania = numeric_values(&rates, records::SUICIDES_PER_100K).unwrap()[0].unwrap();
        let expected = 28.0 / (312_900.0 + 21_800.0 + 338_200.0 + 278_800.0) * 100_000.0;
        assert!((albania - expected).abs() < EPS);

        let gdp = numeric_values(&rates, records::GDP_PER_CAPITA).unwrap();
        assert_eq!(gdp[0], Some((796.0 * 2.0 + 769.0 * 2.0) / 4.0));
    }

    #[test]
    fn test_country_by_year() {
        let ctx = context(ViewSettings::default());
        let years = DataPipeline::country_by_year(ctx.records(), "Albania").unwrap();
        assert_eq!(text_values(&years, records::YEAR).unwrap(), vec!["1987", "1988"]);
        assert_eq!(
            numeric_values(&years, records::SUICIDES_NO).unwrap(),
            vec![Some(22.0), Some(6.0)]
        );

        let none = DataPipeline::country_by_year(ctx.records(), "Atlantis").unwrap();
        assert_eq!(none.height(), 0);
        assert_eq!(none.width(), 3);
    }

    #[test]
    fn test_top_countries() {
        let ctx = context(ViewSettings::default());
        let top = DataPipeline::top_countries(ctx.records(), 2).unwrap();
        assert_eq!(
            text_values(&top, records::COUNTRY).unwrap(),
            vec!["Russian Federation", "Republic of Korea"]
        );
        let all = DataPipeline::top_countries(ctx.records(), DEFAULT_TOP_N).unwrap();
        assert_eq!(all.height(), 4);
    }

    #[test]
    fn test_country_map_contract() {
        let ctx = context(ViewSettings::default());
        let view = ctx.compute_view(&ctx.default_selection(None)).unwrap();
        let map_df = &view.country_map;

        let names: Vec<String> = map_df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["country", "lat", "lon", "suicides_per_100k_pop"]);
        assert_eq!(map_df.height(), 4);
        assert_eq!(
            text_values(map_df, records::COUNTRY).unwrap(),
            vec!["Albania", "South Korea", "Russia", "Utopia"]
        );
        let lat = numeric_values(map_df, map::LAT).unwrap();
        assert!(lat[0].is_some() && lat[1].is_some() && lat[2].is_some());
        assert_eq!(lat[3], None);
        assert_eq!(view.rate_distribution.summary.count, 4);
    }

    #[test]
    fn test_compute_view_for_selection() {
        let ctx = context(ViewSettings {
            top_n: 3,
            loess_bandwidth: 0.5,
        });
        let selection = Selection {
            dimension: Dimension::Generation,
            country: "Utopia".to_string(),
        };
        let view = ctx.compute_view(&selection).unwrap();

        assert_eq!(view.selection, selection);
        assert_eq!(view.top_countries.height(), 3);
        assert_eq!(view.country_by_year.height(), 2);
        assert_eq!(view.gdp_trend.len(), 4);
        assert!(view.by_dimension.column(records::GENERATION).is_ok());

        let stems: Vec<String> = view.named_tables().into_iter().map(|(n, _)| n).collect();
        assert_eq!(stems[0], "suicides_by_generation");
        assert_eq!(stems.len(), 5);
    }

    #[test]
    fn test_unpopulated_country_leaves_other_views_intact() {
        let records = df!(
            records::COUNTRY => ["A", "A", "Z"],
            records::YEAR => [1990i64, 1991, 1990],
            records::SEX => ["male", "female", "male"],
            records::AGE_BRACKET => ["15-24 years", "15-24 years", "15-24 years"],
            records::SUICIDES_NO => [10i64, 5, 3],
            records::POPULATION => [1000i64, 500, 0],
            records::GDP_PER_CAPITA => [800.0, 800.0, 1200.0],
            records::GENERATION => ["X", "X", "Boomers"]
        )
        .unwrap();
        let coords = df!(
            coordinates::COUNTRY => ["A", "Z"],
            coordinates::LATITUDE => [10.0, 20.0],
            coordinates::LONGITUDE => [30.0, 40.0]
        )
        .unwrap();
        let ctx = PipelineContext::new(records, coords, AliasMap::default(), ViewSettings::default());

        let view = ctx.compute_view(&ctx.default_selection(Some("Z"))).unwrap();
        assert_eq!(view.undefined_rates, vec!["country=Z".to_string()]);
        assert_eq!(text_values(&view.gdp_vs_rate, records::COUNTRY).unwrap(), vec!["A"]);
        assert_eq!(text_values(&view.country_map, records::COUNTRY).unwrap(), vec!["A"]);
        assert_eq!(
            numeric_values(&view.gdp_vs_rate, records::SUICIDES_PER_100K).unwrap(),
            vec![Some(1000.0)]
        );
        assert_eq!(view.rate_distribution.summary.count, 1);

        // Z still counts toward totals that need no population
        assert_eq!(view.top_countries.height(), 2);
        assert_eq!(view.country_by_year.height(), 1);
        assert_eq!(int_sum(&view.by_dimension, records::SUICIDES_NO), 18);
    }

    #[test]
    fn test_default_selection() {
        let ctx = context(ViewSettings::default());
        assert_eq!(ctx.default_selection(Some("Utopia")).country, "Utopia");
        assert_eq!(ctx.default_selection(Some("Atlantis")).country, "Albania");
        assert_eq!(ctx.default_selection(None).dimension, Dimension::Sex);
    }

    #[test]
    fn test_empty_records_give_empty_views() {
        let ctx = context(ViewSettings::default());
        let empty = PipelineContext::new(
            ctx.records().head(Some(0)),
            ctx.coordinates().clone(),
            AliasMap::default(),
            ViewSettings::default(),
        );
        let view = empty.compute_view(&empty.default_selection(None)).unwrap();
        assert_eq!(view.by_dimension.height(), 0);
        assert_eq!(view.top_countries.height(), 0);
        assert_eq!(view.country_map.height(), 0);
        assert!(view.gdp_trend.is_empty());
        assert!(view.rate_distribution.is_empty());
    }
}
