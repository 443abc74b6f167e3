use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One ingested per-resource, per-day cost row. Immutable for a given
/// (user, subscription, date, resource) key except full-window replace
/// during resync.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyCostResource {
    pub id: i64,
    pub user_id: Uuid,
    pub azure_subscription_id: String,
    pub date: NaiveDate,
    pub resource_id: String,
    pub cost: Decimal,
    pub currency: String,
}

/// One (date, resource, currency) cost aggregate as returned by the billing
/// provider adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct CostPoint {
    pub date: NaiveDate,
    pub resource_id: String,
    pub cost: Decimal,
    pub currency: String,
}

/// One evaluated day per user: totals, baseline, spike verdict and the
/// attributed top cause. Replaced wholesale on re-evaluation of a date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CostEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub total_yesterday: Decimal,
    pub total_today: Decimal,
    pub difference: Decimal,
    pub baseline: Decimal,
    pub spike_flag: bool,
    pub confidence: String,
    pub top_resource_id: Option<String>,
    pub top_resource_name: Option<String>,
    pub top_resource_type: Option<String>,
    pub top_increase_amount: Option<Decimal>,
    pub suggestion_text: String,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummaryResponse {
    pub date: Option<NaiveDate>,
    pub yesterday_total: Decimal,
    pub today_total: Decimal,
    pub difference: Decimal,
    pub baseline: Decimal,
    pub month_to_date_total: Decimal,
    pub spike_flag: bool,
    pub confidence: String,
    pub top_cause: Option<DashboardCauseResource>,
    pub suggestion_text: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardCauseResource {
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub increase_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DashboardHistoryItem {
    pub date: NaiveDate,
    pub yesterday_total: Decimal,
    pub today_total: Decimal,
    pub difference: Decimal,
    pub spike_flag: bool,
    pub confidence: String,
    pub top_resource_name: Option<String>,
    pub top_increase_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQueryParams {
    pub days: Option<i64>,
}
