//! Statistics Calculator Module
//! Descriptive statistics and kernel density for the rate distribution view,
//! and the LOESS smoother drawn over the GDP scatter.

use statrs::distribution::{Continuous, Normal};
use statrs::statistics::{Data, Max, Min, OrderStatistics};

/// Default LOESS bandwidth (share of points in each local fit).
pub const DEFAULT_LOESS_BANDWIDTH: f64 = 0.3;

/// Number of points the density curve is evaluated at.
pub const DENSITY_POINTS: usize = 64;

/// Descriptive statistics for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl Default for SummaryStats {
    fn default() -> Self {
        Self {
            count: 0,
            min: f64::NAN,
            q1: f64::NAN,
            median: f64::NAN,
            q3: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            std: f64::NAN,
        }
    }
}

/// Values of the distribution view with their summary and density outline.
#[derive(Debug, Clone, Default)]
pub struct RateDistribution {
    pub values: Vec<f64>,
    pub summary: SummaryStats,
    /// `[value, density]` pairs, ascending by value.
    pub density: Vec<[f64; 2]>,
}

impl RateDistribution {
    pub fn from_values(values: Vec<f64>) -> Self {
        let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        let summary = StatsCalculator::compute_descriptive_stats(&values);
        let density = StatsCalculator::density_curve(&values, DENSITY_POINTS);
        Self {
            values,
            summary,
            density,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> SummaryStats {
        let n = values.len();
        if n == 0 {
            return SummaryStats::default();
        }

        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        let mut data = Data::new(values.to_vec());
        SummaryStats {
            count: n,
            min: data.min(),
            q1: data.lower_quartile(),
            median: data.median(),
            q3: data.upper_quartile(),
            max: data.max(),
            mean,
            std: variance.sqrt(),
        }
    }

    /// Gaussian kernel density estimate with Silverman's rule-of-thumb
    /// bandwidth, evaluated at `points` evenly spaced values spanning the
    /// sample plus one bandwidth on each side.
    pub fn density_curve(values: &[f64], points: usize) -> Vec<[f64; 2]> {
        let n = values.len();
        if n == 0 || points < 2 {
            return Vec::new();
        }

        let stats = Self::compute_descriptive_stats(values);
        let mut h = 1.06 * stats.std * (n as f64).powf(-0.2);
        if !(h.is_finite() && h > 0.0) {
            h = 1.0;
        }

        let Ok(kernel) = Normal::new(0.0, 1.0) else {
            return Vec::new();
        };

        let lo = stats.min - h;
        let hi = stats.max + h;
        let step = (hi - lo) / (points - 1) as f64;

        (0..points)
            .map(|i| {
                let x = lo + step * i as f64;
                let density =
                    values.iter().map(|v| kernel.pdf((x - v) / h)).sum::<f64>() / (n as f64 * h);
                [x, density]
            })
            .collect()
    }
}

/// Locally weighted linear regression (tricube weights).
#[derive(Debug, Clone, Copy)]
pub struct Loess {
    bandwidth: f64,
}

impl Default for Loess {
    fn default() -> Self {
        Self::new(DEFAULT_LOESS_BANDWIDTH)
    }
}

impl Loess {
    /// `bandwidth` is the share of points used by each local fit, clamped
    /// to `(0, 1]`.
    pub fn new(bandwidth: f64) -> Self {
        let bandwidth = if bandwidth.is_finite() && bandwidth > 0.0 {
            bandwidth.min(1.0)
        } else {
            DEFAULT_LOESS_BANDWIDTH
        };
        Self { bandwidth }
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Smoothed `[x, y]` curve evaluated at every distinct `x`, ascending.
    /// Pairs with a non-finite coordinate are ignored.
    pub fn fit(&self, xs: &[f64], ys: &[f64]) -> Vec<[f64; 2]> {
        let mut pairs: Vec<(f64, f64)> = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| (x, y))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        if n < 2 {
            return pairs.into_iter().map(|(x, y)| [x, y]).collect();
        }

        let span = ((self.bandwidth * n as f64).ceil() as usize).clamp(2, n);
        let mut distances = vec![0.0; n];
        let mut curve: Vec<[f64; 2]> = Vec::new();

        for (i, &(x0, _)) in pairs.iter().enumerate() {
            if i > 0 && pairs[i - 1].0 == x0 {
                continue;
            }

            for (d, &(x, _)) in distances.iter_mut().zip(&pairs) {
                *d = (x - x0).abs();
            }
            let mut nearest = distances.clone();
            nearest.select_nth_unstable_by(span - 1, f64::total_cmp);
            let radius = nearest[span - 1];

            let (mut sw, mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for (&d, &(x, y)) in distances.iter().zip(&pairs) {
                let w = tricube(d, radius);
                if w == 0.0 {
                    continue;
                }
                let dx = x - x0;
                sw += w;
                sx += w * dx;
                sy += w * y;
                sxx += w * dx * dx;
                sxy += w * dx * y;
            }

            let denom = sw * sxx - sx * sx;
            let y0 = if denom.abs() > 1e-12 * sw * sxx.max(f64::MIN_POSITIVE) {
                // intercept of the local line in coordinates centred on x0
                (sy * sxx - sx * sxy) / denom
            } else {
                sy / sw
            };
            curve.push([x0, y0]);
        }

        curve
    }
}

fn tricube(distance: f64, radius: f64) -> f64 {
    if radius <= 0.0 {
        return if distance == 0.0 { 1.0 } else { 0.0 };
    }
    let u = distance / radius;
    if u >= 1.0 {
        0.0
    } else {
        (1.0 - u.powi(3)).powi(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_descriptive_stats() {
        let stats = StatsCalculator::compute_descriptive_stats(&[5.0, 1.0, 3.0, 2.0, 4.0]);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.median - 3.0).abs() < EPS);
        assert!((stats.mean - 3.0).abs() < EPS);
        assert!(stats.q1 <= stats.median && stats.median <= stats.q3);
        assert!((stats.std - 2.5f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_empty_stats_are_nan() {
        let stats = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.median.is_nan());
        assert!(RateDistribution::from_values(Vec::new()).density.is_empty());
    }

    #[test]
    fn test_density_integrates_to_about_one() {
        let values = [10.0, 12.0, 9.5, 30.0, 11.0, 14.0];
        let curve = StatsCalculator::density_curve(&values, 400);
        assert_eq!(curve.len(), 400);
        let step = curve[1][0] - curve[0][0];
        let area: f64 = curve.iter().map(|p| p[1] * step).sum();
        // the grid stops one bandwidth past the data, so some mass is cut off
        assert!(area > 0.7 && area <= 1.0 + 1e-6, "area = {area}");
        assert!(curve.iter().all(|p| p[1] >= 0.0));
    }

    #[test]
    fn test_single_value_distribution() {
        let dist = RateDistribution::from_values(vec![7.0, f64::NAN]);
        assert_eq!(dist.values, vec![7.0]);
        assert_eq!(dist.summary.std, 0.0);
        assert_eq!(dist.density.len(), DENSITY_POINTS);
    }

    #[test]
    fn test_loess_reproduces_a_line() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 1.5).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        let curve = Loess::new(0.3).fit(&xs, &ys);

        assert_eq!(curve.len(), 20);
        for [x, y] in curve {
            assert!((y - (2.0 * x + 1.0)).abs() < 1e-6, "x = {x}, y = {y}");
        }
    }

    #[test]
    fn test_loess_sorts_and_dedups_x() {
        let xs = [3.0, 1.0, 2.0, 2.0, f64::NAN];
        let ys = [3.0, 1.0, 2.0, 2.0, 5.0];
        let curve = Loess::new(1.0).fit(&xs, &ys);
        let curve_x: Vec<f64> = curve.iter().map(|p| p[0]).collect();
        assert_eq!(curve_x, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_loess_degenerate_inputs() {
        assert!(Loess::default().fit(&[], &[]).is_empty());
        assert_eq!(Loess::default().fit(&[1.0], &[4.0]), vec![[1.0, 4.0]]);
        let flat = Loess::default().fit(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]);
        assert_eq!(flat.len(), 1);
        assert!((flat[0][1] - 2.0).abs() < EPS);
        assert_eq!(Loess::new(-1.0).bandwidth(), DEFAULT_LOESS_BANDWIDTH);
        assert_eq!(Loess::new(5.0).bandwidth(), 1.0);
    }
}
