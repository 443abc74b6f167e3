/// Cost anomaly & waste classification engine.
///
/// Pure, synchronous derivation logic over snapshot data: callers read
/// everything up front (cost rows, inventory, prior findings) and pass it in
/// by reference; nothing here touches the database or the network.
pub mod attribution;
pub mod baseline;
pub mod billing_date;
pub mod scenario;
pub mod spike;
pub mod waste;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::Confidence;

pub use attribution::{parse_resource_name, parse_resource_type, ResourceDelta};

/// One per-resource, per-day cost observation, as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CostSample {
    pub date: NaiveDate,
    pub resource_id: String,
    pub cost: Decimal,
}

impl CostSample {
    pub fn new(date: NaiveDate, resource_id: impl Into<String>, cost: Decimal) -> Self {
        Self {
            date,
            resource_id: resource_id.into(),
            cost,
        }
    }
}

/// The single dominant contributor to a day-over-day increase.
/// Either the whole attribution exists or none of it does.
#[derive(Debug, Clone, PartialEq)]
pub struct CauseAttribution {
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub increase: Decimal,
}

/// Result of evaluating one user's cost history for one billing date.
#[derive(Debug, Clone, PartialEq)]
pub struct CostEvaluation {
    pub date: NaiveDate,
    pub total_latest: Decimal,
    pub total_previous: Decimal,
    pub difference: Decimal,
    pub baseline: Decimal,
    pub spike_flag: bool,
    pub confidence: Confidence,
    pub top_cause: Option<CauseAttribution>,
    pub suggestion_text: String,
}

/// Evaluate a user's cost history as of `current_date`.
///
/// Resolves the latest complete billing date, aggregates totals and the
/// trailing-7-day baseline, attributes the increase to its dominant resource
/// and applies the spike and confidence rules. Returns `None` when there is
/// no billing date to evaluate (no data at all). All monetary outputs are
/// rounded to 4 decimal places, so re-evaluating unchanged input yields an
/// identical result.
pub fn evaluate(
    samples: &[CostSample],
    current_date: NaiveDate,
    threshold: Option<Decimal>,
) -> Option<CostEvaluation> {
    let billing_date = billing_date::resolve_billing_date(samples, current_date)?;
    let previous_date = billing_date.pred_opt()?;

    let totals = baseline::DailyTotals::from_samples(samples);
    let total_latest = totals.total_on(billing_date);
    let total_previous = totals.total_on(previous_date);
    let baseline = totals.baseline_ending_at(billing_date);
    let difference = total_latest - total_previous;

    let deltas = attribution::positive_increases(samples, billing_date, previous_date);
    let top_cause = attribution::top_cause(&deltas);
    let confidence = spike::score_confidence(&deltas);

    let threshold = spike::effective_threshold(threshold);
    let spike_flag = spike::is_spike(baseline, total_latest, difference, threshold);
    let suggestion_text =
        spike::build_suggestion(top_cause.as_ref().map(|c| c.resource_id.as_str()), spike_flag);

    Some(CostEvaluation {
        date: billing_date,
        total_latest: total_latest.round_dp(4),
        total_previous: total_previous.round_dp(4),
        difference: difference.round_dp(4),
        baseline: baseline.round_dp(4),
        spike_flag,
        confidence,
        top_cause: top_cause.map(|c| CauseAttribution {
            increase: c.increase.round_dp(4),
            ..c
        }),
        suggestion_text,
    })
}
