use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Datelike;
use rust_decimal::Decimal;

use crate::auth::Claims;
use crate::db::{CostEventRepo, CostRecordRepo, WasteFindingRepo};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::jobs;
use crate::models::{
    DashboardCauseResource, DashboardHistoryItem, DashboardSummaryResponse, HistoryQueryParams,
    WasteFinding,
};

const DEFAULT_HISTORY_DAYS: i64 = 30;
const MAX_HISTORY_DAYS: i64 = 90;

/// Latest evaluated day for the signed-in user. A user with no data yet gets
/// a well-formed zeroed summary, not an error.
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DashboardSummaryResponse>, AppError> {
    let Some(event) = CostEventRepo::latest_for_user(&state.pool, claims.sub).await? else {
        return Ok(Json(DashboardSummaryResponse {
            date: None,
            yesterday_total: Decimal::ZERO,
            today_total: Decimal::ZERO,
            difference: Decimal::ZERO,
            baseline: Decimal::ZERO,
            month_to_date_total: Decimal::ZERO,
            spike_flag: false,
            confidence: "Low".to_string(),
            top_cause: None,
            suggestion_text: String::new(),
        }));
    };

    let month_start = event.date.with_day(1).unwrap_or(event.date);
    let month_to_date =
        CostRecordRepo::month_to_date_total(&state.pool, claims.sub, month_start, event.date)
            .await?;

    let top_cause = match (&event.top_resource_id, event.top_increase_amount) {
        (Some(resource_id), Some(increase)) => Some(DashboardCauseResource {
            resource_id: resource_id.clone(),
            resource_name: event.top_resource_name.clone().unwrap_or_default(),
            resource_type: event.top_resource_type.clone().unwrap_or_default(),
            increase_amount: increase,
        }),
        _ => None,
    };

    Ok(Json(DashboardSummaryResponse {
        date: Some(event.date),
        yesterday_total: event.total_yesterday,
        today_total: event.total_today,
        difference: event.difference,
        baseline: event.baseline,
        month_to_date_total: month_to_date,
        spike_flag: event.spike_flag,
        confidence: event.confidence,
        top_cause,
        suggestion_text: event.suggestion_text,
    }))
}

/// Recent days whose cost either spiked or rose past the configured
/// threshold, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQueryParams>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<DashboardHistoryItem>>, AppError> {
    let limit = params
        .days
        .unwrap_or(DEFAULT_HISTORY_DAYS)
        .clamp(1, MAX_HISTORY_DAYS);
    let threshold =
        jobs::spike_threshold(&state.worker).unwrap_or(crate::engine::spike::DEFAULT_SPIKE_THRESHOLD);

    let events =
        CostEventRepo::history_for_user(&state.pool, claims.sub, threshold, limit).await?;
    let items = events
        .into_iter()
        .map(|event| DashboardHistoryItem {
            date: event.date,
            yesterday_total: event.total_yesterday,
            today_total: event.total_today,
            difference: event.difference,
            spike_flag: event.spike_flag,
            confidence: event.confidence,
            top_resource_name: event.top_resource_name,
            top_increase_amount: event.top_increase_amount,
        })
        .collect();
    Ok(Json(items))
}

/// Open waste findings, costliest first.
pub async fn get_waste(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<WasteFinding>>, AppError> {
    let findings = WasteFindingRepo::list_open_for_user(&state.pool, claims.sub).await?;
    Ok(Json(findings))
}
