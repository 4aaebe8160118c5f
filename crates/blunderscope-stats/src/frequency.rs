//! Level counts for categorical columns.

/// Occurrence counts of each level of a categorical column.
///
/// Levels are identified by their index into a closed, ordered set of levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: Vec<usize>,
}

impl FrequencyTable {
    /// Counts level indices.
    ///
    /// # Arguments
    ///
    /// * `n_levels` - Size of the level set
    /// * `indices` - Observed level indices, each `< n_levels`
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    #[must_use]
    pub fn new<I>(n_levels: usize, indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut counts = vec![0; n_levels];
        for index in indices {
            counts[index] += 1;
        }
        Self { counts }
    }

    #[must_use]
    pub fn count(&self, index: usize) -> usize {
        self.counts.get(index).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// The `k` most frequent levels as `(index, count)`.
    ///
    /// Levels that never occur are omitted. Results are sorted by count in
    /// descending order; equal counts keep level order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use blunderscope_stats::frequency::FrequencyTable;
    /// let table = FrequencyTable::new(4, [2, 0, 2, 3, 0, 1]);
    /// assert_eq!(table.top(3), vec![(0, 2), (2, 2), (1, 1)]);
    /// ```
    #[must_use]
    pub fn top(&self, k: usize) -> Vec<(usize, usize)> {
        let mut entries = self
            .counts
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, count)| count > 0)
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(k);
        entries
    }
}
