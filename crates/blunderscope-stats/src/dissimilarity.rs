//! Gower dissimilarity over mixed numeric/categorical rows.
//!
//! For each pair of rows, numeric features contribute `|a - b| / range`
//! (0 when the column is constant) and categorical features contribute 0 on a
//! match and 1 on a mismatch. The dissimilarity is the unweighted mean over all
//! features, so every entry lies in `[0, 1]`.

/// One observation with numeric and categorical parts.
///
/// Categorical values are level indices; only equality matters.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedRow {
    pub numeric: Vec<f64>,
    pub categorical: Vec<usize>,
}

/// Dense symmetric matrix of pairwise dissimilarities.
#[derive(Debug, Clone, PartialEq)]
pub struct DissimilarityMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DissimilarityMatrix {
    /// Builds a matrix from a distance function evaluated on the upper triangle.
    ///
    /// The diagonal is zero and the lower triangle mirrors the upper one.
    #[must_use]
    pub fn from_fn<F>(n: usize, mut distance: F) -> Self
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distance(i, j);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self { n, values }
    }

    /// Computes Gower's dissimilarity for all pairs of `rows`.
    ///
    /// # Panics
    ///
    /// Panics if rows have differing numeric or categorical widths.
    ///
    /// # Examples
    ///
    /// ```
    /// # use blunderscope_stats::dissimilarity::{DissimilarityMatrix, MixedRow};
    /// let rows = [
    ///     MixedRow { numeric: vec![0.0], categorical: vec![0] },
    ///     MixedRow { numeric: vec![1.0], categorical: vec![0] },
    ///     MixedRow { numeric: vec![1.0], categorical: vec![1] },
    /// ];
    /// let matrix = DissimilarityMatrix::gower(&rows);
    /// assert_eq!(matrix.get(0, 1), 0.5);
    /// assert_eq!(matrix.get(1, 2), 0.5);
    /// assert_eq!(matrix.get(0, 2), 1.0);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn gower(rows: &[MixedRow]) -> Self {
        let (n_numeric, n_categorical) = rows
            .first()
            .map_or((0, 0), |row| (row.numeric.len(), row.categorical.len()));
        assert!(
            rows.iter()
                .all(|row| row.numeric.len() == n_numeric
                    && row.categorical.len() == n_categorical),
            "rows must have the same shape"
        );
        let n_features = n_numeric + n_categorical;
        if n_features == 0 {
            return Self::from_fn(rows.len(), |_, _| 0.0);
        }

        let ranges = (0..n_numeric)
            .map(|col| {
                let (min, max) = rows.iter().map(|row| row.numeric[col]).fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(min, max), v| (min.min(v), max.max(v)),
                );
                max - min
            })
            .collect::<Vec<_>>();

        Self::from_fn(rows.len(), |i, j| {
            let (a, b) = (&rows[i], &rows[j]);
            let numeric = a
                .numeric
                .iter()
                .zip(&b.numeric)
                .zip(&ranges)
                .map(|((x, y), range)| {
                    if *range > 0.0 {
                        ((x - y).abs() / range).min(1.0)
                    } else {
                        0.0
                    }
                })
                .sum::<f64>();
            let mismatches = a
                .categorical
                .iter()
                .zip(&b.categorical)
                .filter(|(x, y)| x != y)
                .count();
            (numeric + mismatches as f64) / n_features as f64
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n..(i + 1) * self.n]
    }
}
