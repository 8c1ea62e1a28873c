//! Charts module - dashboard chart data, interactive plotting and static rendering

mod chart_data;
mod plotter;
mod renderer;

pub use chart_data::{ChartData, ChartKind};
pub use plotter::ChartPlotter;
pub use renderer::{RenderError, StaticChartRenderer};

#[cfg(test)]
pub(crate) use renderer::fonts_available;
