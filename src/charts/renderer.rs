//! Static Chart Renderer
//! Draws dashboard charts off-screen with plotters, as SVG markup for HTML
//! export or PNG bytes for image export.
//!
//! Layout per chart:
//! 1. Title centered on top
//! 2. Plot area with labelled axes
//! 3. "No data" notice instead of the plot when the selection is empty

use crate::charts::chart_data::{heat_color, unit_scale, ChartData, ChartKind, ScatterPoint};
use crate::stats::RateDistribution;
use image::{ImageFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Cursor;
use thiserror::Error;

const BAR: RGBColor = RGBColor(52, 152, 219);
const TREND: RGBColor = RGBColor(44, 62, 80);
const GRID: RGBColor = RGBColor(220, 220, 220);

const FONT: &str = "sans-serif";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Draw(String),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Bitmap of {width}x{height} could not be assembled")]
    Bitmap { width: u32, height: u32 },
}

fn draw_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError::Draw(e.to_string())
}

type DrawResult<DB> = Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render a chart as a standalone SVG document.
    pub fn render_svg(chart: &ChartData, width: u32, height: u32) -> Result<String, RenderError> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
            Self::draw(&root, chart).map_err(draw_error)?;
            root.present().map_err(draw_error)?;
        }
        Ok(svg)
    }

    /// Render a chart to PNG bytes.
    pub fn render_png(chart: &ChartData, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            Self::draw(&root, chart).map_err(draw_error)?;
            root.present().map_err(draw_error)?;
        }

        let img =
            RgbImage::from_raw(width, height, buffer).ok_or(RenderError::Bitmap { width, height })?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &ChartData) -> DrawResult<DB> {
        root.fill(&WHITE)?;
        let root = root.titled(&chart.title, (FONT, 22))?;

        if chart.is_empty() {
            let (w, h) = root.dim_in_pixel();
            root.draw(&Text::new(
                "No data for this selection",
                (w as i32 / 2 - 100, h as i32 / 2),
                (FONT, 18).into_font().color(&BLACK.mix(0.5)),
            ))?;
            return Ok(());
        }

        match &chart.kind {
            ChartKind::Bars {
                x_label,
                y_label,
                categories,
                values,
                shades,
                horizontal,
            } => {
                let colors: Vec<RGBColor> = match shades {
                    Some(shades) => unit_scale(shades).into_iter().map(heat).collect(),
                    None => vec![BAR; values.len()],
                };
                if *horizontal {
                    Self::draw_horizontal_bars(&root, (x_label, y_label), categories, values, &colors)
                } else {
                    Self::draw_vertical_bars(&root, (x_label, y_label), categories, values, &colors)
                }
            }
            ChartKind::Scatter {
                x_label,
                y_label,
                points,
                trend,
                geographic,
            } => Self::draw_scatter(&root, (x_label, y_label), points, trend, *geographic),
            ChartKind::Violin {
                y_label,
                distribution,
            } => Self::draw_violin(&root, y_label, distribution),
        }
    }

    fn draw_vertical_bars<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        (x_label, y_label): (&str, &str),
        categories: &[String],
        values: &[f64],
        colors: &[RGBColor],
    ) -> DrawResult<DB> {
        let n = values.len();
        let top = padded_max(values);

        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5f64..n as f64 - 0.5, 0f64..top)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .light_line_style(&GRID)
            .x_labels(n + 1)
            .x_label_formatter(&|x| category_at(categories, *x))
            .x_desc(x_label)
            .y_desc(y_label)
            .draw()?;

        chart.draw_series(values.iter().zip(colors).enumerate().map(|(i, (&v, &c))| {
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x + 0.35, v)], c.filled())
        }))?;
        Ok(())
    }

    /// Largest value on top.
    fn draw_horizontal_bars<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        (x_label, y_label): (&str, &str),
        categories: &[String],
        values: &[f64],
        colors: &[RGBColor],
    ) -> DrawResult<DB> {
        let n = values.len();
        let right = padded_max(values);
        let reversed: Vec<String> = categories.iter().rev().cloned().collect();

        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(160)
            .build_cartesian_2d(0f64..right, -0.5f64..n as f64 - 0.5)?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .light_line_style(&GRID)
            .y_labels(n + 1)
            .y_label_formatter(&|y| category_at(&reversed, *y))
            .x_desc(x_label)
            .y_desc(y_label)
            .draw()?;

        chart.draw_series(values.iter().zip(colors).enumerate().map(|(i, (&v, &c))| {
            let y = (n - 1 - i) as f64;
            Rectangle::new([(0.0, y - 0.35), (v, y + 0.35)], c.filled())
        }))?;
        Ok(())
    }

    fn draw_scatter<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        (x_label, y_label): (&str, &str),
        points: &[ScatterPoint],
        trend: &[[f64; 2]],
        geographic: bool,
    ) -> DrawResult<DB> {
        let (x_range, y_range) = if geographic {
            (-180f64..180f64, -90f64..90f64)
        } else {
            let xs = points.iter().map(|p| p.x).chain(trend.iter().map(|p| p[0]));
            let ys = points.iter().map(|p| p.y).chain(trend.iter().map(|p| p[1]));
            (padded_range(xs), padded_range(ys))
        };

        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .light_line_style(&GRID)
            .x_desc(x_label)
            .y_desc(y_label)
            .draw()?;

        let metrics: Vec<f64> = points.iter().map(|p| p.metric).collect();
        let scaled = unit_scale(&metrics);
        chart.draw_series(points.iter().zip(scaled).map(|(p, t)| {
            let size = if geographic { 3.0 + 9.0 * t } else { 4.0 };
            Circle::new((p.x, p.y), size as i32, heat(t).mix(0.85).filled())
        }))?;

        if trend.len() > 1 {
            chart.draw_series(LineSeries::new(
                trend.iter().map(|p| (p[0], p[1])),
                TREND.stroke_width(2),
            ))?;
        }
        Ok(())
    }

    fn draw_violin<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        y_label: &str,
        distribution: &RateDistribution,
    ) -> DrawResult<DB> {
        let s = &distribution.summary;
        let ys = distribution
            .values
            .iter()
            .copied()
            .chain(distribution.density.iter().map(|p| p[0]));
        let y_range = padded_range(ys);

        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(20)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.6f64..1.0f64, y_range)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_x_axis()
            .light_line_style(&GRID)
            .y_desc(y_label)
            .draw()?;

        let peak = distribution
            .density
            .iter()
            .map(|p| p[1])
            .fold(0.0_f64, f64::max);
        if peak > 0.0 {
            let scale = 0.4 / peak;
            let mut outline: Vec<(f64, f64)> = distribution
                .density
                .iter()
                .map(|&[y, d]| (d * scale, y))
                .collect();
            outline.extend(distribution.density.iter().rev().map(|&[y, d]| (-d * scale, y)));

            chart.draw_series(std::iter::once(Polygon::new(
                outline.clone(),
                BAR.mix(0.3).filled(),
            )))?;
            outline.push(outline[0]);
            chart.draw_series(std::iter::once(PathElement::new(outline, BAR.stroke_width(1))))?;
        }

        // Box with whiskers
        chart.draw_series(std::iter::once(Rectangle::new(
            [(-0.05, s.q1), (0.05, s.q3)],
            TREND.mix(0.4).filled(),
        )))?;
        chart.draw_series(
            [
                vec![(-0.05, s.median), (0.05, s.median)],
                vec![(0.0, s.min), (0.0, s.q1)],
                vec![(0.0, s.q3), (0.0, s.max)],
            ]
            .into_iter()
            .map(|path| PathElement::new(path, TREND.stroke_width(2))),
        )?;

        chart.draw_series(
            distribution
                .values
                .iter()
                .map(|&v| Circle::new((0.7, v), 3, BAR.mix(0.8).filled())),
        )?;
        Ok(())
    }
}

fn heat(t: f64) -> RGBColor {
    let (r, g, b) = heat_color(t);
    RGBColor(r, g, b)
}

/// Label of the category sitting at integer position `x`.
fn category_at(categories: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

/// Upper bound for bars starting at zero.
fn padded_max(values: &[f64]) -> f64 {
    let max = values.iter().copied().filter(|v| v.is_finite()).fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        return 0.0..1.0;
    }
    let pad = if max > min { (max - min) * 0.08 } else { 1.0 };
    (min - pad)..(max + pad)
}

/// Whether the system can lay out text in the chart font. Rendering needs a
/// font installed; tests that render skip themselves without one.
#[cfg(test)]
pub(crate) fn fonts_available() -> bool {
    (FONT, 12).into_font().box_size("0").is_ok()
}
