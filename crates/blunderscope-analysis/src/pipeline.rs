//! Habit discovery for one subject.
//!
//! # How It Works
//!
//! ```text
//! clear prior analysis -> fetch pending mistakes -> (too few: InsufficientData)
//!   -> cluster -> (all noise: NoHabits)
//!   -> fit encoder once
//!   -> per cluster, in parallel: trigger model, summary
//!   -> per cluster, in label order: feedback, save habit, link members
//! ```
//!
//! Clusters without a control group or without triggers are skipped. A habit
//! is only kept if both saving it and linking its members succeed; a failure
//! affects that habit alone. A habit that could neither be linked nor removed
//! again is listed in [`AnalysisReport::orphaned_habits`].

use std::{num::NonZeroUsize, thread};

use blunderscope_evaluator::features::MistakeFeatures;
use blunderscope_stats::{hdbscan::Clustering, logistic::LogisticError};
use serde::Serialize;

use crate::{
    clustering::{ClusteringOutcome, HabitCluster, cluster_mistakes, habit_clusters},
    config::PipelineConfig,
    encoder::{EncoderError, OneHotEncoder},
    feedback::{FeedbackRequest, FeedbackService, synthesize_feedback},
    model::{HabitId, MemberLink, MistakeId, MistakeRecord, NewHabit, SubjectId},
    store::{HabitStore, StoreError},
    summary::{ClusterSummary, summarize},
    triggers::{TriggerOutcome, TriggerSet, identify_triggers},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Clusters were analyzed; some may not have produced a habit.
    Completed,
    /// Too few pending mistakes to cluster.
    InsufficientData,
    /// Every mistake was noise.
    NoHabits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub outcome: RunOutcome,
    pub new_habits_found: usize,
    pub total_mistakes_considered: usize,
    /// Habits saved without their members whose removal failed as well.
    pub orphaned_habits: Vec<HabitId>,
}

impl AnalysisReport {
    fn empty(outcome: RunOutcome, total_mistakes_considered: usize) -> Self {
        Self {
            outcome,
            new_habits_found: 0,
            total_mistakes_considered,
            orphaned_habits: vec![],
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum PipelineError {
    #[display("failed to clear prior analysis")]
    ClearPrior(StoreError),
    #[display("failed to fetch pending mistakes")]
    Fetch(StoreError),
    #[display("failed to prepare features")]
    #[from]
    Preprocessing(EncoderError),
}

/// Runs habit discovery against a store and a feedback service.
///
/// ```
/// use blunderscope_analysis::{
///     config::PipelineConfig,
///     feedback::{FeedbackError, FeedbackRequest, FeedbackService},
///     memory::MemoryStore,
///     model::SubjectId,
///     pipeline::{HabitPipeline, RunOutcome},
/// };
///
/// #[derive(Debug)]
/// struct Offline;
///
/// impl FeedbackService for Offline {
///     fn generate(&self, _: &FeedbackRequest) -> Result<String, FeedbackError> {
///         Err(FeedbackError::Service { message: "offline".to_owned() })
///     }
/// }
///
/// let store = MemoryStore::new();
/// let pipeline = HabitPipeline::new(&store, Offline, PipelineConfig::default());
/// let report = pipeline.run(SubjectId(1))?;
/// assert_eq!(report.outcome, RunOutcome::InsufficientData);
/// assert_eq!(report.total_mistakes_considered, 0);
/// # Ok::<(), blunderscope_analysis::pipeline::PipelineError>(())
/// ```
#[derive(Debug)]
pub struct HabitPipeline<S, F> {
    store: S,
    feedback: F,
    config: PipelineConfig,
}

/// Per-cluster result of the parallel stage.
#[derive(Debug, PartialEq)]
enum ClusterAnalysis {
    NoControlGroup,
    NoTriggers,
    ModelFailed(LogisticError),
    Ready(Candidate),
}

#[derive(Debug, PartialEq)]
struct Candidate {
    triggers: TriggerSet,
    summary: ClusterSummary,
    confidence: f64,
    representative: MistakeId,
    links: Vec<MemberLink>,
}

impl<S, F> HabitPipeline<S, F>
where
    S: HabitStore,
    F: FeedbackService,
{
    #[must_use]
    pub fn new(store: S, feedback: F, config: PipelineConfig) -> Self {
        Self {
            store,
            feedback,
            config,
        }
    }

    /// Replaces the subject's habits with freshly discovered ones.
    pub fn run(&self, subject: SubjectId) -> Result<AnalysisReport, PipelineError> {
        let span = tracing::info_span!("habit_analysis", %subject);
        let _enter = span.enter();

        self.store
            .clear_prior_analysis(subject)
            .map_err(PipelineError::ClearPrior)?;
        let records = self
            .store
            .fetch_pending_mistakes(subject)
            .map_err(PipelineError::Fetch)?;
        tracing::info!(mistakes = records.len(), "pending mistakes fetched");

        match cluster_mistakes(&records) {
            ClusteringOutcome::InsufficientData { count } => {
                tracing::info!(count, "not enough mistakes to look for habits");
                Ok(AnalysisReport::empty(RunOutcome::InsufficientData, count))
            }
            ClusteringOutcome::Clustered(clustering) => {
                self.build_habits(subject, &records, &clustering)
            }
        }
    }

    fn build_habits(
        &self,
        subject: SubjectId,
        records: &[MistakeRecord],
        clustering: &Clustering,
    ) -> Result<AnalysisReport, PipelineError> {
        let clusters = habit_clusters(clustering);
        if clusters.is_empty() {
            tracing::info!("every mistake is noise");
            return Ok(AnalysisReport::empty(RunOutcome::NoHabits, records.len()));
        }

        let population = records.iter().map(|r| r.features).collect::<Vec<MistakeFeatures>>();
        let encoder = OneHotEncoder::fit(&population)?;
        let encoded = encoder.encode_all(&population);

        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let analyses = analyze_clusters(&encoder, &encoded, records, &clusters, workers);

        let mut report = AnalysisReport::empty(RunOutcome::Completed, records.len());
        for (cluster, analysis) in clusters.iter().zip(analyses) {
            let span = tracing::info_span!(
                "cluster",
                label = cluster.label,
                size = cluster.members.len()
            );
            let _enter = span.enter();

            let candidate = match analysis {
                ClusterAnalysis::Ready(candidate) => candidate,
                ClusterAnalysis::NoControlGroup => {
                    tracing::warn!("cluster covers every mistake; skipping");
                    continue;
                }
                ClusterAnalysis::NoTriggers => {
                    tracing::info!("no significant triggers; skipping");
                    continue;
                }
                ClusterAnalysis::ModelFailed(err) => {
                    tracing::warn!(%err, "trigger model failed; skipping");
                    continue;
                }
            };
            match self.persist(subject, cluster.label, candidate) {
                Persisted::Kept => report.new_habits_found += 1,
                Persisted::Dropped => {}
                Persisted::Orphaned(id) => report.orphaned_habits.push(id),
            }
        }

        tracing::info!(
            new_habits_found = report.new_habits_found,
            orphaned = report.orphaned_habits.len(),
            "habit analysis finished"
        );
        Ok(report)
    }

    /// Generates feedback, then saves and links one habit.
    fn persist(&self, subject: SubjectId, label: u32, candidate: Candidate) -> Persisted {
        let Candidate {
            triggers,
            summary,
            confidence,
            representative,
            links,
        } = candidate;
        let request = FeedbackRequest::new(&triggers, confidence, summary);
        let feedback = synthesize_feedback(&self.feedback, &request, &self.config.feedback_retry);

        let habit = NewHabit {
            subject,
            cluster_label: label,
            name: format!("{} (H{label})", feedback.habit_name),
            triggers: triggers.weights(),
            confidence,
            representative,
            feedback: feedback.feedback,
            tip: feedback.tip,
        };
        let id = match self.store.save_habit(&habit) {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(name = %habit.name, %err, "failed to save habit");
                return Persisted::Dropped;
            }
        };
        if let Err(err) = self.store.link_mistakes(id, &links) {
            tracing::error!(habit = %id, %err, "failed to link mistakes; discarding habit");
            if let Err(err) = self.store.discard_habit(id) {
                tracing::error!(habit = %id, %err, "failed to discard habit");
                return Persisted::Orphaned(id);
            }
            return Persisted::Dropped;
        }
        tracing::info!(habit = %id, name = %habit.name, members = links.len(), "habit saved");
        Persisted::Kept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persisted {
    Kept,
    Dropped,
    /// Saved but neither linked nor removed.
    Orphaned(HabitId),
}

/// Analyzes every cluster on at most `workers` threads, keeping cluster order.
fn analyze_clusters(
    encoder: &OneHotEncoder,
    encoded: &[Vec<f64>],
    records: &[MistakeRecord],
    clusters: &[HabitCluster],
    workers: usize,
) -> Vec<ClusterAnalysis> {
    let chunk_size = clusters.len().div_ceil(workers.max(1)).max(1);
    let mut analyses = clusters.iter().map(|_| None).collect::<Vec<_>>();
    thread::scope(|s| {
        for (chunk, slots) in clusters
            .chunks(chunk_size)
            .zip(analyses.chunks_mut(chunk_size))
        {
            s.spawn(move || {
                for (cluster, slot) in chunk.iter().zip(slots) {
                    *slot = Some(analyze_cluster(encoder, encoded, records, cluster));
                }
            });
        }
    });
    analyses.into_iter().flatten().collect()
}

fn analyze_cluster(
    encoder: &OneHotEncoder,
    encoded: &[Vec<f64>],
    records: &[MistakeRecord],
    cluster: &HabitCluster,
) -> ClusterAnalysis {
    let membership = cluster.membership(records.len());
    let triggers = match identify_triggers(encoder, encoded, &membership) {
        Ok(TriggerOutcome::Fitted(triggers)) => triggers,
        Ok(TriggerOutcome::NoControlGroup) => return ClusterAnalysis::NoControlGroup,
        Err(err) => return ClusterAnalysis::ModelFailed(err),
    };
    if triggers.is_empty() {
        return ClusterAnalysis::NoTriggers;
    }

    let members = cluster
        .members
        .iter()
        .map(|&i| &records[i])
        .collect::<Vec<_>>();
    let Some(summary) = summarize(&members) else {
        return ClusterAnalysis::NoTriggers;
    };
    // first member wins ties
    let Some(representative) = members
        .iter()
        .rev()
        .max_by_key(|m| m.cpl)
        .map(|m| m.id)
    else {
        return ClusterAnalysis::NoTriggers;
    };
    let links = members
        .iter()
        .zip(&cluster.probabilities)
        .map(|(m, &confidence)| MemberLink {
            mistake: m.id,
            confidence,
        })
        .collect();

    ClusterAnalysis::Ready(Candidate {
        triggers,
        summary,
        confidence: cluster.mean_confidence(),
        representative,
        links,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        feedback::{FALLBACK_NAME, FALLBACK_TIP, FeedbackError},
        memory::MemoryStore,
        retry::RetryPolicy,
        testing::{habit_population, init_tracing, seed_store},
    };

    const SUBJECT: SubjectId = SubjectId(3);

    /// Answers with a fixed habit name, or fails every call.
    #[derive(Debug, Default)]
    struct CountingService {
        fail: bool,
        calls: AtomicUsize,
    }

    impl CountingService {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FeedbackService for CountingService {
        fn generate(&self, request: &FeedbackRequest) -> Result<String, FeedbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FeedbackError::Service {
                    message: "quota exceeded".to_owned(),
                });
            }
            let name = request.top_action.as_deref().unwrap_or("Habit");
            Ok(serde_json::json!({
                "habit_name": name,
                "feedback": "You keep doing this.",
                "tip": "Stop doing this.",
            })
            .to_string())
        }
    }

    /// Delegates to a memory store, failing writes on demand.
    #[derive(Debug, Default)]
    struct FaultyStore {
        inner: MemoryStore,
        fail_save: bool,
        fail_link: bool,
        fail_discard: bool,
    }

    impl HabitStore for FaultyStore {
        fn clear_prior_analysis(&self, subject: SubjectId) -> Result<(), StoreError> {
            self.inner.clear_prior_analysis(subject)
        }

        fn fetch_pending_mistakes(
            &self,
            subject: SubjectId,
        ) -> Result<Vec<MistakeRecord>, StoreError> {
            self.inner.fetch_pending_mistakes(subject)
        }

        fn save_habit(&self, habit: &NewHabit) -> Result<HabitId, StoreError> {
            if self.fail_save {
                return Err(StoreError::Backend {
                    message: "disk full".to_owned(),
                });
            }
            self.inner.save_habit(habit)
        }

        fn link_mistakes(&self, habit: HabitId, links: &[MemberLink]) -> Result<(), StoreError> {
            if self.fail_link {
                return Err(StoreError::Backend {
                    message: "deadlock".to_owned(),
                });
            }
            self.inner.link_mistakes(habit, links)
        }

        fn discard_habit(&self, habit: HabitId) -> Result<(), StoreError> {
            if self.fail_discard {
                return Err(StoreError::Backend {
                    message: "connection lost".to_owned(),
                });
            }
            self.inner.discard_habit(habit)
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            feedback_retry: RetryPolicy::immediate(3),
        }
    }

    fn pattern_ids(ids: &[MistakeId]) -> Vec<MistakeId> {
        ids[..5].to_vec()
    }

    #[test]
    fn test_pattern_becomes_habit() {
        init_tracing();
        let store = MemoryStore::new();
        let ids = seed_store(&store, SUBJECT, &habit_population());
        let service = CountingService::default();
        let pipeline = HabitPipeline::new(&store, &service, config());

        let report = pipeline.run(SUBJECT).unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.total_mistakes_considered, 25);
        let habits = store.habits(SUBJECT);
        assert_eq!(report.new_habits_found, habits.len());
        assert_eq!(service.calls(), habits.len());

        let pattern = habits
            .iter()
            .find(|h| {
                let members = store.habit_members(h.id);
                members.iter().map(|m| m.id).collect::<Vec<_>>() == pattern_ids(&ids)
            })
            .expect("pattern habit");
        let details = &pattern.details;
        assert!(details.triggers.contains_key("mistake_category_Hanging_Piece"));
        assert!(details.triggers.values().all(|&w| w > 0.1));
        assert!(details.name.ends_with(&format!(" (H{})", details.cluster_label)));
        // highest cpl of the pattern is its last record
        assert_eq!(details.representative, ids[4]);
        assert!((0.0..=1.0).contains(&details.confidence));

        for member in store.habit_members(pattern.id) {
            let confidence = member.habit_confidence.unwrap();
            assert!((0.0..=1.0).contains(&confidence));
        }
    }

    #[test]
    fn test_rerun_replaces_habits() {
        let store = MemoryStore::new();
        seed_store(&store, SUBJECT, &habit_population());
        let pipeline = HabitPipeline::new(&store, CountingService::default(), config());
        let first = pipeline.run(SUBJECT).unwrap();
        let second = pipeline.run(SUBJECT).unwrap();
        assert_eq!(first.new_habits_found, second.new_habits_found);
        assert_eq!(second.total_mistakes_considered, 25);
        assert_eq!(store.habits(SUBJECT).len(), second.new_habits_found);
    }

    #[test]
    fn test_insufficient_data() {
        let store = MemoryStore::new();
        seed_store(&store, SUBJECT, &habit_population()[..15]);
        let service = CountingService::default();
        let report = HabitPipeline::new(&store, &service, config())
            .run(SUBJECT)
            .unwrap();
        assert_eq!(
            report,
            AnalysisReport {
                outcome: RunOutcome::InsufficientData,
                new_habits_found: 0,
                total_mistakes_considered: 15,
                orphaned_habits: vec![],
            }
        );
        assert_eq!(service.calls(), 0);
        assert!(store.habits(SUBJECT).is_empty());
    }

    #[test]
    fn test_single_cluster_has_no_control_group() {
        let store = MemoryStore::new();
        seed_store(&store, SUBJECT, &habit_population());
        let records = store.fetch_pending_mistakes(SUBJECT).unwrap();
        let clustering = Clustering {
            labels: vec![0; records.len()],
            probabilities: vec![1.0; records.len()],
        };
        let service = CountingService::default();
        let pipeline = HabitPipeline::new(&store, &service, config());

        let report = pipeline.build_habits(SUBJECT, &records, &clustering).unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.new_habits_found, 0);
        assert_eq!(service.calls(), 0);
        assert!(store.habits(SUBJECT).is_empty());
    }

    #[test]
    fn test_all_noise() {
        let store = MemoryStore::new();
        seed_store(&store, SUBJECT, &habit_population());
        let records = store.fetch_pending_mistakes(SUBJECT).unwrap();
        let clustering = Clustering {
            labels: vec![-1; records.len()],
            probabilities: vec![0.0; records.len()],
        };
        let pipeline = HabitPipeline::new(&store, CountingService::default(), config());
        let report = pipeline.build_habits(SUBJECT, &records, &clustering).unwrap();
        assert_eq!(report.outcome, RunOutcome::NoHabits);
        assert_eq!(report.total_mistakes_considered, 25);
    }

    #[test]
    fn test_feedback_failure_uses_fallback() {
        let store = MemoryStore::new();
        let ids = seed_store(&store, SUBJECT, &habit_population());
        let service = CountingService::failing();
        let report = HabitPipeline::new(&store, &service, config())
            .run(SUBJECT)
            .unwrap();

        assert!(report.new_habits_found >= 1);
        assert_eq!(service.calls(), 3 * report.new_habits_found);
        let habits = store.habits(SUBJECT);
        for habit in &habits {
            assert_eq!(
                habit.details.name,
                format!("{FALLBACK_NAME} (H{})", habit.details.cluster_label)
            );
            assert_eq!(habit.details.tip, FALLBACK_TIP);
        }
        let linked = ids
            .iter()
            .filter(|&&id| store.mistake(id).unwrap().habit_id.is_some())
            .count();
        assert!(linked >= 5);
    }

    #[test]
    fn test_failed_save_links_nothing() {
        let store = FaultyStore {
            fail_save: true,
            ..FaultyStore::default()
        };
        let ids = seed_store(&store.inner, SUBJECT, &habit_population());
        let report = HabitPipeline::new(&store, CountingService::default(), config())
            .run(SUBJECT)
            .unwrap();
        assert_eq!(report.new_habits_found, 0);
        assert!(ids.iter().all(|&id| store.inner.mistake(id).unwrap().is_pending()));
    }

    #[test]
    fn test_failed_link_discards_habit() {
        let store = FaultyStore {
            fail_link: true,
            ..FaultyStore::default()
        };
        let ids = seed_store(&store.inner, SUBJECT, &habit_population());
        let report = HabitPipeline::new(&store, CountingService::default(), config())
            .run(SUBJECT)
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.new_habits_found, 0);
        assert!(store.inner.habits(SUBJECT).is_empty());
        assert!(ids.iter().all(|&id| store.inner.mistake(id).unwrap().is_pending()));
    }

    #[test]
    fn test_undiscarded_habit_is_reported() {
        let store = FaultyStore {
            fail_link: true,
            fail_discard: true,
            ..FaultyStore::default()
        };
        let ids = seed_store(&store.inner, SUBJECT, &habit_population());
        let report = HabitPipeline::new(&store, CountingService::default(), config())
            .run(SUBJECT)
            .unwrap();
        assert_eq!(report.new_habits_found, 0);
        assert!(!report.orphaned_habits.is_empty());
        let left = store
            .inner
            .habits(SUBJECT)
            .iter()
            .map(|h| h.id)
            .collect::<Vec<_>>();
        assert_eq!(report.orphaned_habits, left);
        assert!(ids.iter().all(|&id| store.inner.mistake(id).unwrap().is_pending()));
    }

    #[test]
    fn test_worker_count_does_not_change_analysis() {
        let records = habit_population();
        let clustering = Clustering {
            labels: (0..25).map(|i| i / 5).collect(),
            probabilities: vec![1.0; 25],
        };
        let clusters = habit_clusters(&clustering);
        assert_eq!(clusters.len(), 5);
        let population = records.iter().map(|r| r.features).collect::<Vec<_>>();
        let encoder = OneHotEncoder::fit(&population).unwrap();
        let encoded = encoder.encode_all(&population);

        let serial = analyze_clusters(&encoder, &encoded, &records, &clusters, 1);
        assert_eq!(serial.len(), 5);
        for workers in [0, 2, 3, 8] {
            let parallel = analyze_clusters(&encoder, &encoded, &records, &clusters, workers);
            assert_eq!(parallel, serial);
        }
    }
}
