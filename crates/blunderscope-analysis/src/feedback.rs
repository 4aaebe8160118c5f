//! Coaching text for a habit, produced by an external text generator.
//!
//! The generator receives a [`FeedbackRequest`] and must answer with a JSON
//! object holding exactly `habit_name`, `feedback` and `tip`. Anything else
//! counts as a failed attempt. When every attempt fails, the habit is still
//! stored with [`HabitFeedback::fallback`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{model::Trigger, retry::RetryPolicy, summary::ClusterSummary, triggers::TriggerSet};

pub const FALLBACK_NAME: &str = "Unlabeled Habit";
pub const FALLBACK_FEEDBACK: &str =
    "Personalized feedback could not be generated for this pattern.";
pub const FALLBACK_TIP: &str = "Review the mistakes in this habit manually.";

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum FeedbackError {
    #[display("feedback service failed: {message}")]
    Service { message: String },
    #[display("feedback response is not the expected JSON object")]
    #[from]
    Malformed(serde_json::Error),
    #[display("feedback response has an empty `{field}`")]
    EmptyField { field: &'static str },
}

/// Everything the generator knows about a habit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRequest {
    pub top_context: Option<String>,
    pub top_action: Option<String>,
    pub confidence: f64,
    pub summary: ClusterSummary,
    pub triggers: Vec<Trigger>,
}

impl FeedbackRequest {
    #[must_use]
    pub fn new(triggers: &TriggerSet, confidence: f64, summary: ClusterSummary) -> Self {
        Self {
            top_context: triggers.top_context().map(|t| t.label.clone()),
            top_action: triggers.top_action().map(|t| t.label.clone()),
            confidence,
            summary,
            triggers: triggers.triggers().to_vec(),
        }
    }
}

/// Validated generator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HabitFeedback {
    pub habit_name: String,
    pub feedback: String,
    pub tip: String,
}

impl HabitFeedback {
    /// Parses and validates a raw response.
    ///
    /// ```
    /// use blunderscope_analysis::feedback::HabitFeedback;
    ///
    /// let ok = HabitFeedback::parse(r#"{"habit_name": "Loose Rooks", "feedback": "f", "tip": "t"}"#);
    /// assert_eq!(ok.unwrap().habit_name, "Loose Rooks");
    /// assert!(HabitFeedback::parse(r#"{"habit_name": "Loose Rooks", "feedback": "f"}"#).is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, FeedbackError> {
        let feedback = serde_json::from_str::<Self>(raw)?;
        for (field, value) in [
            ("habit_name", &feedback.habit_name),
            ("feedback", &feedback.feedback),
            ("tip", &feedback.tip),
        ] {
            if value.trim().is_empty() {
                return Err(FeedbackError::EmptyField { field });
            }
        }
        Ok(feedback)
    }

    #[must_use]
    pub fn fallback() -> Self {
        Self {
            habit_name: FALLBACK_NAME.to_owned(),
            feedback: FALLBACK_FEEDBACK.to_owned(),
            tip: FALLBACK_TIP.to_owned(),
        }
    }
}

/// Text generator collaborator.
///
/// Returns the raw structured output; validation happens in
/// [`synthesize_feedback`].
pub trait FeedbackService: fmt::Debug {
    fn generate(&self, request: &FeedbackRequest) -> Result<String, FeedbackError>;
}

impl<S> FeedbackService for &S
where
    S: FeedbackService + ?Sized,
{
    fn generate(&self, request: &FeedbackRequest) -> Result<String, FeedbackError> {
        (**self).generate(request)
    }
}

/// Asks `service` for feedback, retrying per `policy`. Never fails.
#[must_use]
pub fn synthesize_feedback<S>(
    service: &S,
    request: &FeedbackRequest,
    policy: &RetryPolicy,
) -> HabitFeedback
where
    S: FeedbackService + ?Sized,
{
    policy
        .run("feedback generation", |_| {
            HabitFeedback::parse(&service.generate(request)?)
        })
        .unwrap_or_else(|_| HabitFeedback::fallback())
}
