//! Chart Data Module
//! Backend-neutral description of every dashboard chart, built from the
//! pipeline's output tables. The interactive plotter and the static renderer
//! both draw from these.

use crate::data::schema::{map, records};
use crate::data::{numeric_values, text_values, DashboardTables, PipelineError};
use crate::stats::RateDistribution;

/// One point of a scatter chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub label: String,
    /// Drives marker colour (and size on maps).
    pub metric: f64,
}

#[derive(Debug, Clone)]
pub enum ChartKind {
    Bars {
        x_label: String,
        y_label: String,
        categories: Vec<String>,
        values: Vec<f64>,
        /// Per-bar colour metric; bars share one colour when absent.
        shades: Option<Vec<f64>>,
        horizontal: bool,
    },
    Scatter {
        x_label: String,
        y_label: String,
        points: Vec<ScatterPoint>,
        trend: Vec<[f64; 2]>,
        /// Longitude/latitude axes with marker size following the metric.
        geographic: bool,
    },
    Violin {
        y_label: String,
        distribution: RateDistribution,
    },
}

/// Chart data for a single dashboard figure.
#[derive(Debug, Clone)]
pub struct ChartData {
    /// File stem used on export.
    pub id: String,
    pub title: String,
    pub kind: ChartKind,
}

impl ChartData {
    /// All six dashboard charts, in display order.
    pub fn from_dashboard(tables: &DashboardTables) -> Result<Vec<ChartData>, PipelineError> {
        let dimension = tables.selection.dimension;
        let country = &tables.selection.country;
        let top_n = tables.top_countries.height();

        Ok(vec![
            ChartData {
                id: format!("suicides_by_{}", dimension.label()),
                title: format!("Suicides number by {dimension}"),
                kind: ChartKind::Bars {
                    x_label: dimension.label().to_string(),
                    y_label: "Number of suicides".to_string(),
                    categories: text_values(&tables.by_dimension, dimension.column())?,
                    values: dense(numeric_values(&tables.by_dimension, records::SUICIDES_NO)?),
                    shades: Some(dense(numeric_values(
                        &tables.by_dimension,
                        records::SUICIDES_PER_100K,
                    )?)),
                    horizontal: false,
                },
            },
            ChartData {
                id: "gdp_vs_suicide_rate".to_string(),
                title: "Suicide rate and GDP per capita with LOESS trend".to_string(),
                kind: ChartKind::Scatter {
                    x_label: "GDP per capita ($)".to_string(),
                    y_label: "Suicides per 100k".to_string(),
                    points: scatter_points(
                        text_values(&tables.gdp_vs_rate, records::COUNTRY)?,
                        numeric_values(&tables.gdp_vs_rate, records::GDP_PER_CAPITA)?,
                        numeric_values(&tables.gdp_vs_rate, records::SUICIDES_PER_100K)?,
                        numeric_values(&tables.gdp_vs_rate, records::SUICIDES_PER_100K)?,
                    ),
                    trend: tables.gdp_trend.clone(),
                    geographic: false,
                },
            },
            ChartData {
                id: "suicides_by_year".to_string(),
                title: format!("Suicides in {country} by year"),
                kind: ChartKind::Bars {
                    x_label: "Year".to_string(),
                    y_label: "Number of suicides".to_string(),
                    categories: text_values(&tables.country_by_year, records::YEAR)?,
                    values: dense(numeric_values(&tables.country_by_year, records::SUICIDES_NO)?),
                    shades: None,
                    horizontal: false,
                },
            },
            ChartData {
                id: "top_countries".to_string(),
                title: format!("Number of suicides in {top_n} top countries"),
                kind: ChartKind::Bars {
                    x_label: "Number of suicides".to_string(),
                    y_label: String::new(),
                    categories: text_values(&tables.top_countries, records::COUNTRY)?,
                    values: dense(numeric_values(&tables.top_countries, records::SUICIDES_NO)?),
                    shades: None,
                    horizontal: true,
                },
            },
            ChartData {
                id: "suicide_rate_map".to_string(),
                title: "Suicides per 100k in different countries".to_string(),
                kind: ChartKind::Scatter {
                    x_label: "Longitude".to_string(),
                    y_label: "Latitude".to_string(),
                    points: scatter_points(
                        text_values(&tables.country_map, records::COUNTRY)?,
                        numeric_values(&tables.country_map, map::LON)?,
                        numeric_values(&tables.country_map, map::LAT)?,
                        numeric_values(&tables.country_map, map::SUICIDES_PER_100K_POP)?,
                    ),
                    trend: Vec::new(),
                    geographic: true,
                },
            },
            ChartData {
                id: "suicide_rate_distribution".to_string(),
                title: "Distribution of suicide rate among countries".to_string(),
                kind: ChartKind::Violin {
                    y_label: "Suicides per 100k".to_string(),
                    distribution: tables.rate_distribution.clone(),
                },
            },
        ])
    }

    /// Nothing to draw.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            ChartKind::Bars { values, .. } => values.is_empty(),
            ChartKind::Scatter { points, .. } => points.is_empty(),
            ChartKind::Violin { distribution, .. } => distribution.is_empty(),
        }
    }
}

/// Nulls become 0 so bars stay aligned with their categories.
fn dense(values: Vec<Option<f64>>) -> Vec<f64> {
    values.into_iter().map(|v| v.unwrap_or(0.0)).collect()
}

/// Rows with a missing coordinate are not drawn (e.g. countries without
/// coordinates on the map).
fn scatter_points(
    labels: Vec<String>,
    xs: Vec<Option<f64>>,
    ys: Vec<Option<f64>>,
    metrics: Vec<Option<f64>>,
) -> Vec<ScatterPoint> {
    labels
        .into_iter()
        .zip(xs)
        .zip(ys)
        .zip(metrics)
        .filter_map(|(((label, x), y), metric)| {
            Some(ScatterPoint {
                x: x?,
                y: y?,
                label,
                metric: metric.unwrap_or(0.0),
            })
        })
        .collect()
}

/// Map `values` onto `[0, 1]`; a constant series maps to 0.5.
pub fn unit_scale(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;
    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                0.0
            } else if span > 0.0 {
                (v - min) / span
            } else {
                0.5
            }
        })
        .collect()
}

/// Green -> yellow -> red colour ramp for `t` in `[0, 1]`.
pub fn heat_color(t: f64) -> (u8, u8, u8) {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let (r, g) = if t < 0.5 {
        (t * 2.0, 1.0)
    } else {
        (1.0, 1.0 - (t - 0.5) * 2.0)
    };
    ((r * 230.0) as u8, (g * 200.0) as u8, 40)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AliasMap, Dimension, PipelineContext, Selection, ViewSettings};
    use std::path::Path;

    fn dashboard(country: &str) -> DashboardTables {
        let data = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data");
        let ctx = PipelineContext::load_inputs(
            &data.join("records_sample.csv"),
            &data.join("coordinates_sample.csv"),
            AliasMap::default(),
            ViewSettings::default(),
        )
        .unwrap();
        ctx.compute_view(&Selection {
            dimension: Dimension::Sex,
            country: country.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_six_charts_from_dashboard() {
        let charts = ChartData::from_dashboard(&dashboard("Albania")).unwrap();
        let ids: Vec<&str> = charts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "suicides_by_sex",
                "gdp_vs_suicide_rate",
                "suicides_by_year",
                "top_countries",
                "suicide_rate_map",
                "suicide_rate_distribution"
            ]
        );
        assert!(charts.iter().all(|c| !c.is_empty()));

        match &charts[0].kind {
            ChartKind::Bars { categories, values, .. } => {
                assert_eq!(categories, &vec!["female".to_string(), "male".to_string()]);
                assert_eq!(values.iter().sum::<f64>(), 40844.0);
            }
            other => panic!("unexpected chart kind {other:?}"),
        }
    }

    #[test]
    fn test_map_skips_countries_without_coordinates() {
        let charts = ChartData::from_dashboard(&dashboard("Albania")).unwrap();
        match &charts[4].kind {
            ChartKind::Scatter { points, geographic, .. } => {
                assert!(*geographic);
                let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
                assert_eq!(labels, vec!["Albania", "South Korea", "Russia"]);
            }
            other => panic!("unexpected chart kind {other:?}"),
        }
    }

    #[test]
    fn test_unknown_country_gives_empty_year_chart() {
        let charts = ChartData::from_dashboard(&dashboard("Atlantis")).unwrap();
        assert!(charts[2].is_empty());
        assert_eq!(charts[2].title, "Suicides in Atlantis by year");
    }

    #[test]
    fn test_color_helpers() {
        assert_eq!(unit_scale(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(unit_scale(&[7.0, 7.0]), vec![0.5, 0.5]);
        assert!(unit_scale(&[]).is_empty());
        assert_eq!(heat_color(0.0), (0, 200, 40));
        assert_eq!(heat_color(1.0), (230, 0, 40));
        assert_eq!(heat_color(f64::NAN), heat_color(0.0));
    }
}
