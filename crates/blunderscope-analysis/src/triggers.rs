//! Trigger identification: which feature levels single out a cluster.
//!
//! For one cluster, every pending record is labeled by membership and a
//! sparse, class-balanced logistic model is fit on the shared one-hot
//! encoding. Levels whose coefficient clears [`TRIGGER_FLOOR`] are the
//! cluster's triggers; the L1 penalty keeps the rest at zero.

use std::collections::BTreeMap;

use blunderscope_evaluator::features::FieldGroup;
use blunderscope_stats::logistic::{LogisticError, LogisticParams, fit_l1_balanced};

use crate::{encoder::OneHotEncoder, model::Trigger};

/// Coefficients at or below this are not triggers.
pub const TRIGGER_FLOOR: f64 = 0.1;
/// Inverse regularization strength.
pub const REGULARIZATION_C: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// Every record belongs to the cluster; there is nothing to contrast with.
    NoControlGroup,
    Fitted(TriggerSet),
}

/// Triggers of one cluster, strongest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerSet {
    triggers: Vec<Trigger>,
}

impl TriggerSet {
    /// Orders by descending weight; equal weights keep their input order.
    #[must_use]
    pub fn new(mut triggers: Vec<Trigger>) -> Self {
        triggers.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        Self { triggers }
    }

    #[must_use]
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    #[must_use]
    pub fn top(&self, group: FieldGroup) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.group == group)
    }

    #[must_use]
    pub fn top_context(&self) -> Option<&Trigger> {
        self.top(FieldGroup::Context)
    }

    #[must_use]
    pub fn top_action(&self) -> Option<&Trigger> {
        self.top(FieldGroup::Action)
    }

    /// Feature name to weight, as persisted with the habit.
    #[must_use]
    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.triggers
            .iter()
            .map(|t| (t.feature.clone(), t.weight))
            .collect()
    }
}

/// Fits the membership model of one cluster.
///
/// # Arguments
///
/// * `encoder` - Encoder fit on the whole population
/// * `encoded` - Encoded rows of the whole population
/// * `membership` - `true` for rows inside the cluster
pub fn identify_triggers(
    encoder: &OneHotEncoder,
    encoded: &[Vec<f64>],
    membership: &[bool],
) -> Result<TriggerOutcome, LogisticError> {
    if membership.iter().all(|&m| m) {
        return Ok(TriggerOutcome::NoControlGroup);
    }
    let params = LogisticParams {
        c: REGULARIZATION_C,
        ..LogisticParams::default()
    };
    let model = fit_l1_balanced(encoded, membership, &params)?;
    if !model.converged {
        tracing::warn!(iterations = model.iterations, "trigger model did not converge");
    }

    let triggers = encoder
        .columns()
        .iter()
        .zip(&model.coefficients)
        .filter(|&(_, &weight)| weight > TRIGGER_FLOOR)
        .map(|(column, &weight)| Trigger {
            feature: column.name.clone(),
            label: column.label(),
            group: column.group(),
            weight,
        })
        .collect();
    Ok(TriggerOutcome::Fitted(TriggerSet::new(triggers)))
}
