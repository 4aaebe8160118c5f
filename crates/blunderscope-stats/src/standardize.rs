//! Column-wise z-score standardization.

use crate::descriptive::DescriptiveStats;

/// Per-column mean and scale learned from a sample.
///
/// Columns with zero variance keep a scale of 1 so that they map to 0
/// instead of dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    /// Learns column means and population standard deviations.
    ///
    /// # Arguments
    ///
    /// * `rows` - Row-major samples; every row must have the same width
    ///
    /// # Panics
    ///
    /// Panics if rows have differing widths.
    #[must_use]
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|row| row.len() == width),
            "rows must have the same width"
        );

        let (means, scales) = (0..width)
            .map(|col| {
                DescriptiveStats::new(rows.iter().map(|row| row[col])).map_or(
                    (0.0, 1.0),
                    |stats| {
                        let scale = if stats.std_dev > 0.0 {
                            stats.std_dev
                        } else {
                            1.0
                        };
                        (stats.mean, scale)
                    },
                )
            })
            .unzip();
        Self { means, scales }
    }

    #[must_use]
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect()
    }

    #[must_use]
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    /// Convenience for `fit` followed by `transform`.
    #[must_use]
    pub fn fit_transform(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        Self::fit(rows).transform(rows)
    }
}
