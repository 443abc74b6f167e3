use axum::{extract::State, Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Claims;
use crate::db::{ConnectionRepo, CostEventRepo, CostRecordRepo, WasteFindingRepo};
use crate::engine::scenario::{self, Scenario};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::jobs;
use crate::models::WasteFinding;

/// Subscription id used when the user has not registered a real one.
const DEV_FALLBACK_SUBSCRIPTION_ID: &str = "11111111-1111-1111-1111-111111111111";

#[derive(Debug, Deserialize)]
pub struct SeedScenarioRequest {
    pub scenario: String,
    #[serde(default = "default_days")]
    pub days: i64,
    #[serde(default = "default_clear")]
    pub clear_existing_data: bool,
    pub seed: Option<i64>,
}

fn default_days() -> i64 {
    30
}
fn default_clear() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SeedScenarioResponse {
    pub scenario: &'static str,
    pub days: i64,
    pub daily_cost_rows_inserted: u64,
    pub waste_findings_inserted: usize,
    pub events_generated: usize,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub note: &'static str,
}

/// Seed a synthetic cost scenario for the signed-in user and re-run the
/// detection engine over it. An unknown scenario name rejects the whole
/// request; nothing is partially applied.
pub async fn seed_scenario(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SeedScenarioRequest>,
) -> Result<Json<SeedScenarioResponse>, AppError> {
    let scenario: Scenario = req
        .scenario
        .parse()
        .map_err(|e: scenario::InvalidScenario| AppError::bad_request(e.to_string()))?;

    let days = scenario::clamp_days(req.days);
    let to_date = Utc::now().date_naive();
    let now = Utc::now();

    let subscription_id = ConnectionRepo::latest_subscription_id(&state.pool, claims.sub)
        .await?
        .unwrap_or_else(|| DEV_FALLBACK_SUBSCRIPTION_ID.to_string());

    let plan = scenario::build_plan(
        scenario,
        &subscription_id,
        days,
        to_date,
        now,
        req.seed.map(|s| s as u64),
    );

    clear_existing(&state, claims.sub, plan.from_date, req.clear_existing_data).await?;

    let rows_inserted =
        CostRecordRepo::insert_seed_rows(&state.pool, claims.sub, &subscription_id, &plan.rows)
            .await?;

    let findings: Vec<WasteFinding> = plan
        .findings
        .iter()
        .map(|seed| WasteFinding {
            id: Uuid::new_v4(),
            user_id: claims.sub,
            azure_subscription_id: subscription_id.clone(),
            finding_type: seed.finding_type.as_str().to_string(),
            resource_id: seed.resource_id.clone(),
            resource_name: seed.resource_name.to_string(),
            estimated_monthly_cost: Some(seed.estimated_monthly_cost),
            classification: None,
            inactive_duration_days: None,
            waste_confidence_level: None,
            last_seen_active_utc: None,
            status: "open".to_string(),
            detected_at_utc: seed.detected_at_utc,
        })
        .collect();
    if !findings.is_empty() {
        WasteFindingRepo::insert_batch(&state.pool, &findings).await?;
    }

    let events_generated = jobs::generate_cost_events(
        &state.pool,
        Some(claims.sub),
        jobs::spike_threshold(&state.worker),
    )
    .await?;

    Ok(Json(SeedScenarioResponse {
        scenario: scenario.as_str(),
        days,
        daily_cost_rows_inserted: rows_inserted,
        waste_findings_inserted: findings.len(),
        events_generated,
        from_date: plan.from_date,
        to_date: plan.to_date,
        note: plan.note,
    }))
}

async fn clear_existing(
    state: &AppState,
    user_id: Uuid,
    from_date: NaiveDate,
    clear_all: bool,
) -> Result<(), AppError> {
    if clear_all {
        CostRecordRepo::delete_for_user(&state.pool, user_id).await?;
        CostEventRepo::delete_for_user(&state.pool, user_id).await?;
    } else {
        CostRecordRepo::delete_from_date(&state.pool, user_id, from_date).await?;
        CostEventRepo::delete_from_date(&state.pool, user_id, from_date).await?;
    }
    // Findings are a snapshot; a reseed always starts them fresh.
    WasteFindingRepo::delete_for_user(&state.pool, user_id).await?;
    Ok(())
}
