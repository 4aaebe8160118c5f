//! Groups a subject's pending mistakes into habit archetypes.
//!
//! # How It Works
//!
//! 1. Centipawn loss and move number are z-score standardized
//! 2. Every record becomes a mixed row: the two numbers plus the level index
//!    of each categorical field
//! 3. Gower's coefficient gives the all-pairs dissimilarity matrix
//! 4. HDBSCAN labels each record with a cluster or noise and a membership
//!    probability
//!
//! All hyperparameters are fixed.

use blunderscope_evaluator::features::CategoricalField;
use blunderscope_stats::{
    dissimilarity::{DissimilarityMatrix, MixedRow},
    hdbscan::{Clustering, HdbscanParams, hdbscan},
    standardize::Standardizer,
};

use crate::model::MistakeRecord;

/// Fewest pending mistakes worth clustering.
pub const MIN_MISTAKES: usize = 20;
pub const MIN_CLUSTER_SIZE: usize = 5;
pub const MIN_SAMPLES: usize = 3;

pub const PARAMS: HdbscanParams = HdbscanParams {
    min_cluster_size: MIN_CLUSTER_SIZE,
    min_samples: MIN_SAMPLES,
    allow_single_cluster: false,
};

/// One discovered archetype within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitCluster {
    pub label: u32,
    /// Indices into the clustered records, ascending.
    pub members: Vec<usize>,
    /// Membership probability of each member, aligned with `members`.
    pub probabilities: Vec<f64>,
}

impl HabitCluster {
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn mean_confidence(&self) -> f64 {
        if self.probabilities.is_empty() {
            return 0.0;
        }
        self.probabilities.iter().sum::<f64>() / self.probabilities.len() as f64
    }

    /// Membership mask over all `n` clustered records.
    #[must_use]
    pub fn membership(&self, n: usize) -> Vec<bool> {
        let mut mask = vec![false; n];
        for &i in &self.members {
            mask[i] = true;
        }
        mask
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClusteringOutcome {
    /// Fewer than [`MIN_MISTAKES`] records; nothing was clustered.
    InsufficientData { count: usize },
    /// Per-record labels; [`Clustering::n_clusters`] may be zero.
    Clustered(Clustering),
}

/// Clusters `records`, or reports that there are too few of them.
#[must_use]
pub fn cluster_mistakes(records: &[MistakeRecord]) -> ClusteringOutcome {
    if records.len() < MIN_MISTAKES {
        return ClusteringOutcome::InsufficientData {
            count: records.len(),
        };
    }
    let matrix = DissimilarityMatrix::gower(&mixed_rows(records));
    let clustering = hdbscan(&matrix, &PARAMS);
    tracing::info!(
        records = records.len(),
        clusters = clustering.n_clusters(),
        noise = clustering.labels.iter().filter(|&&l| l < 0).count(),
        "mistakes clustered"
    );
    ClusteringOutcome::Clustered(clustering)
}

/// Splits a clustering into its non-noise clusters, ascending by label.
#[must_use]
pub fn habit_clusters(clustering: &Clustering) -> Vec<HabitCluster> {
    let mut clusters = Vec::<HabitCluster>::new();
    for (i, (&label, &probability)) in clustering
        .labels
        .iter()
        .zip(&clustering.probabilities)
        .enumerate()
    {
        let Ok(label) = u32::try_from(label) else {
            continue;
        };
        let slot = match clusters.binary_search_by_key(&label, |c| c.label) {
            Ok(slot) => slot,
            Err(slot) => {
                clusters.insert(
                    slot,
                    HabitCluster {
                        label,
                        members: vec![],
                        probabilities: vec![],
                    },
                );
                slot
            }
        };
        clusters[slot].members.push(i);
        clusters[slot].probabilities.push(probability);
    }
    clusters
}

/// Standardized numbers plus categorical level indices for every record.
#[must_use]
pub fn mixed_rows(records: &[MistakeRecord]) -> Vec<MixedRow> {
    let numeric = records
        .iter()
        .map(|r| vec![f64::from(r.cpl), f64::from(r.move_number)])
        .collect::<Vec<_>>();
    Standardizer::fit_transform(&numeric)
        .into_iter()
        .zip(records)
        .map(|(numeric, record)| MixedRow {
            numeric,
            categorical: CategoricalField::ALL
                .iter()
                .map(|&field| record.features.level_index(field))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{habit_population, record};

    #[test]
    fn test_too_few_records() {
        let records = (0..19).map(|i| record(i, 120, 10)).collect::<Vec<_>>();
        assert_eq!(
            cluster_mistakes(&records),
            ClusteringOutcome::InsufficientData { count: 19 }
        );
    }

    #[test]
    fn test_mixed_rows_are_standardized() {
        let records = [record(0, 100, 10), record(1, 300, 30)];
        let rows = mixed_rows(&records);
        assert_eq!(rows[0].numeric, [-1.0, -1.0]);
        assert_eq!(rows[1].numeric, [1.0, 1.0]);
        assert_eq!(rows[0].categorical.len(), CategoricalField::ALL.len());
    }

    #[test]
    fn test_pattern_is_isolated() {
        let records = habit_population();
        let ClusteringOutcome::Clustered(clustering) = cluster_mistakes(&records) else {
            panic!("expected a clustering");
        };
        let clusters = habit_clusters(&clustering);
        assert!(
            clusters.iter().any(|c| c.members == [0, 1, 2, 3, 4]),
            "{clusters:?}"
        );
        for cluster in &clusters {
            assert_eq!(cluster.members.len(), cluster.probabilities.len());
            let confidence = cluster.mean_confidence();
            assert!((0.0..=1.0).contains(&confidence));
        }

        // deterministic across runs
        assert_eq!(
            cluster_mistakes(&records),
            ClusteringOutcome::Clustered(clustering)
        );
    }

    #[test]
    fn test_habit_clusters_skip_noise() {
        let clustering = Clustering {
            labels: vec![1, -1, 0, 1, 0],
            probabilities: vec![0.5, 0.0, 1.0, 1.0, 0.8],
        };
        let clusters = habit_clusters(&clustering);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].label, 0);
        assert_eq!(clusters[0].members, [2, 4]);
        assert_eq!(clusters[1].members, [0, 3]);
        assert!((clusters[1].mean_confidence() - 0.75).abs() < 1e-12);
        assert_eq!(clusters[0].membership(5), [false, false, true, false, true]);
    }
}
