//! Stats module - descriptive statistics and smoothing

mod calculator;

pub use calculator::{Loess, RateDistribution, DEFAULT_LOESS_BANDWIDTH};
