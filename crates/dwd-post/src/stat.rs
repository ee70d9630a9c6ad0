use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use dwd_core::errors::{DwdError, ErrorInfo};

/// Counts over explicit bin edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin edges (inclusive of the left edge, exclusive of the right edge except the last bin).
    pub edges: Vec<f64>,
    /// Counts recorded per bin.
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Empty histogram over `edges`.
    pub fn new(edges: Vec<f64>) -> Self {
        let bins = edges.len().saturating_sub(1);
        Self {
            edges,
            counts: vec![0; bins],
        }
    }

    /// Histogram of `values` over `edges`; values outside the edges are ignored.
    pub fn from_values(edges: Vec<f64>, values: impl IntoIterator<Item = f64>) -> Self {
        let mut histogram = Self::new(edges);
        for value in values {
            histogram.record(value);
        }
        histogram
    }

    /// Counts one value, returning whether it fell inside the edges.
    pub fn record(&mut self, value: f64) -> bool {
        match self.bin_of(value) {
            Some(bin) => {
                self.counts[bin] += 1;
                true
            }
            None => false,
        }
    }

    fn bin_of(&self, value: f64) -> Option<usize> {
        let (first, last) = (*self.edges.first()?, *self.edges.last()?);
        if self.counts.is_empty() || value.is_nan() || value < first || value > last {
            return None;
        }
        if value == last {
            return Some(self.counts.len() - 1);
        }
        let upper = self.edges.partition_point(|edge| *edge <= value);
        Some(upper - 1)
    }

    /// Number of counted values.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// `num` points evenly spaced in log10 between `start` and `end`, both included.
pub fn logspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    let (lo, hi) = (start.log10(), end.log10());
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (hi - lo) / (num - 1) as f64;
            (0..num)
                .map(|idx| {
                    if idx + 1 == num {
                        end
                    } else {
                        10f64.powf(lo + idx as f64 * step)
                    }
                })
                .collect()
        }
    }
}

/// Evenly spaced grid `start + i·step` strictly below `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearGrid {
    /// First point.
    pub start: f64,
    /// Spacing.
    pub step: f64,
    /// Number of points.
    pub len: usize,
}

impl LinearGrid {
    /// Grid over `[start, stop)`.
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        let len = if step > 0.0 && stop > start {
            ((stop - start) / step).ceil() as usize
        } else {
            0
        };
        Self { start, step, len }
    }

    /// Point `idx`.
    pub fn at(&self, idx: usize) -> f64 {
        self.start + idx as f64 * self.step
    }

    /// Index `i` such that `at(i - 1) <= value < at(i)`; `0` below the grid and `len` above it.
    pub fn digitize(&self, value: f64) -> usize {
        if self.len == 0 || value.is_nan() || value < self.start {
            return 0;
        }
        let mut idx = (((value - self.start) / self.step).floor() as usize + 1).min(self.len);
        while idx > 0 && self.at(idx - 1) > value {
            idx -= 1;
        }
        while idx < self.len && self.at(idx) <= value {
            idx += 1;
        }
        idx
    }
}

/// Linear-interpolated percentile of sorted values.
pub fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = quantile * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = position - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

/// Median of unsorted values; NaN for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, 0.5)
}

/// Trailing-window medians.
///
/// Entry `i` of the result is the median of `values[i..i + window]`, so the
/// output has `values.len() - window + 1` entries (none when the window does
/// not fit).
pub fn rolling_median(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    let mut sorted: Vec<f64> = values[..window].to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut medians = Vec::with_capacity(values.len() - window + 1);
    medians.push(percentile(&sorted, 0.5));
    for idx in window..values.len() {
        let outgoing = values[idx - window];
        if let Ok(pos) = sorted.binary_search_by(|probe| probe.total_cmp(&outgoing)) {
            sorted.remove(pos);
        }
        let incoming = values[idx];
        let pos = sorted.partition_point(|probe| probe.total_cmp(&incoming).is_lt());
        sorted.insert(pos, incoming);
        medians.push(percentile(&sorted, 0.5));
    }
    medians
}

/// Least-squares polynomial fit, coefficients in ascending powers.
///
/// Solved through the thin QR factorisation of the Vandermonde matrix.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Vec<f64>, DwdError> {
    let terms = degree + 1;
    if xs.len() != ys.len() || xs.len() < terms {
        return Err(DwdError::Sampling(
            ErrorInfo::new("fit-underdetermined", "not enough points for polynomial fit")
                .with_context("points", xs.len().min(ys.len()).to_string())
                .with_context("terms", terms.to_string()),
        ));
    }
    let vandermonde = DMatrix::<f64>::from_fn(xs.len(), terms, |row, power| {
        xs[row].powi(power as i32)
    });
    let rhs = DVector::<f64>::from_column_slice(ys);
    let qr = vandermonde.qr();
    let r = qr.r();
    let scale = r.diagonal().amax().max(1.0);
    if let Some(column) = r
        .diagonal()
        .iter()
        .position(|d| !d.is_finite() || d.abs() < f64::EPSILON * scale)
    {
        return Err(singular(column));
    }
    let projected = qr.q().transpose() * rhs;
    let solution = r
        .solve_upper_triangular(&projected)
        .ok_or_else(|| singular(terms - 1))?;
    Ok(solution.iter().copied().collect())
}

fn singular(column: usize) -> DwdError {
    DwdError::Sampling(
        ErrorInfo::new("fit-singular", "polynomial fit is rank deficient")
            .with_context("column", column.to_string()),
    )
}

/// Evaluates ascending-power coefficients at `x`.
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_matches_half_open_bins() {
        let hist = Histogram::from_values(vec![0.0, 1.0, 2.0, 3.0], [0.0, 0.5, 1.0, 2.999, 3.0, 3.5, -1.0]);
        assert_eq!(hist.counts, vec![2, 1, 2]);
        assert_eq!(hist.total(), 5);
    }

    #[test]
    fn logspace_hits_both_ends() {
        let edges = logspace(1e-4, 1e2, 7);
        assert_eq!(edges.len(), 7);
        assert_eq!(edges[0], 1e-4);
        assert_eq!(edges[6], 1e2);
        assert!((edges[3] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn digitize_follows_left_closed_bins() {
        let grid = LinearGrid::new(0.0, 1.0, 0.25);
        assert_eq!(grid.len, 4);
        assert_eq!(grid.digitize(-0.1), 0);
        assert_eq!(grid.digitize(0.0), 1);
        assert_eq!(grid.digitize(0.25), 2);
        assert_eq!(grid.digitize(0.3), 2);
        assert_eq!(grid.digitize(0.9), 4);
        assert_eq!(grid.digitize(5.0), 4);
    }

    #[test]
    fn rolling_median_tracks_window() {
        let medians = rolling_median(&[5.0, 1.0, 3.0, 9.0, 9.0, 0.0], 3);
        assert_eq!(medians, vec![3.0, 3.0, 9.0, 9.0]);
        assert!(rolling_median(&[1.0], 2).is_empty());
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn quartic_fit_recovers_coefficients() {
        let truth = [1.0, -2.0, 0.5, 0.25, -0.1];
        let xs: Vec<f64> = (0..40).map(|i| -2.0 + i as f64 * 0.1).collect();
        let ys: Vec<f64> = xs.iter().map(|x| polyval(&truth, *x)).collect();
        let fit = polyfit(&xs, &ys, 4).expect("fit");
        for (got, want) in fit.iter().zip(truth) {
            assert!((got - want).abs() < 1e-8, "{got} vs {want}");
        }
    }

    #[test]
    fn log_frequency_fit_is_stable() {
        let truth = [-40.0, -3.0, 0.2, 0.01, 0.001];
        let xs: Vec<f64> = (0..200).map(|i| -8.5 + i as f64 * 0.028).collect();
        let ys: Vec<f64> = xs.iter().map(|x| polyval(&truth, *x)).collect();
        let fit = polyfit(&xs, &ys, 4).expect("fit");
        for x in [-8.0, -6.0, -3.5] {
            assert!((polyval(&fit, x) - polyval(&truth, x)).abs() < 1e-6);
        }
    }

    #[test]
    fn repeated_abscissae_are_singular() {
        let xs = [1.0; 8];
        let ys = [2.0; 8];
        let err = polyfit(&xs, &ys, 2).expect_err("rank deficient");
        assert_eq!(err.info().code, "fit-singular");
    }

    #[test]
    fn underdetermined_fit_is_rejected() {
        let err = polyfit(&[1.0, 2.0], &[1.0, 2.0], 4).expect_err("too few points");
        assert_eq!(err.info().code, "fit-underdetermined");
    }

    proptest::proptest! {
        #[test]
        fn rolling_median_matches_window_medians(
            values in proptest::collection::vec(-1e3f64..1e3, 1..60),
            window in 1usize..12,
        ) {
            let medians = rolling_median(&values, window);
            let expected: Vec<f64> = values.windows(window).map(median).collect();
            proptest::prop_assert_eq!(medians, expected);
        }

        #[test]
        fn histogram_keeps_values_inside_the_edges(
            values in proptest::collection::vec(-2.0f64..5.0, 0..80),
        ) {
            let hist = Histogram::from_values(vec![0.0, 1.0, 2.0, 3.0], values.iter().copied());
            let inside = values.iter().filter(|v| (0.0..=3.0).contains(*v)).count() as u64;
            proptest::prop_assert_eq!(hist.total(), inside);
        }
    }
}
