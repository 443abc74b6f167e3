use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::time::interval;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{NotificationConfig, WorkerConfig};
use crate::db::{ConnectionRepo, CostEventRepo, CostRecordRepo, UserRepo, WasteFindingRepo};
use crate::engine::waste::{ActivityProfile, PriorFindingState, WasteCandidate};
use crate::engine::{self, CostEvaluation};
use crate::models::{CostEvent, ScanTarget, WasteFinding};
use crate::notify::{spike_email, EmailSender};
use crate::{azure, crypto};

/// Days of history read for an evaluation: enough for the billing-date
/// resolver, the 7-day baseline and the 30-day waste lookback.
const EVALUATION_WINDOW_DAYS: i64 = 35;

/// Scheduled ingestion loop: sync costs, evaluate events, scan for waste,
/// send spike alerts. One cycle failure never kills the loop.
pub fn spawn_background_jobs(
    pool: PgPool,
    worker: WorkerConfig,
    notifications: NotificationConfig,
    encryption_key: String,
) {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(worker.run_interval_hours.max(1) * 3600);
        let mut ticker = interval(period);
        let sender = EmailSender::new(notifications);
        loop {
            ticker.tick().await;
            info!("Running ingestion cycle");
            if let Err(e) = run_ingestion_cycle(&pool, &worker, &sender, &encryption_key).await {
                error!("Ingestion cycle failed: {e:#}");
            }
        }
    });

    info!("Background jobs started");
}

pub async fn run_ingestion_cycle(
    pool: &PgPool,
    worker: &WorkerConfig,
    sender: &EmailSender,
    encryption_key: &str,
) -> anyhow::Result<()> {
    let synced = sync_costs(pool, encryption_key, worker.sync_window_days, None).await?;
    let generated = generate_cost_events(pool, None, spike_threshold(worker)).await?;
    let findings = refresh_waste_findings(pool, encryption_key, None).await?;
    let notified = notify_spikes(pool, sender).await?;

    info!(
        subscriptions = synced,
        events = generated,
        waste_findings = findings,
        notifications = notified,
        "Ingestion cycle complete"
    );
    Ok(())
}

/// Immediate single-user ingestion after a connection is registered.
pub async fn run_backfill(
    pool: &PgPool,
    user_id: Uuid,
    worker: &WorkerConfig,
    encryption_key: &str,
) -> anyhow::Result<()> {
    let synced = sync_costs(pool, encryption_key, worker.backfill_window_days, Some(user_id)).await?;
    let generated = generate_cost_events(pool, Some(user_id), spike_threshold(worker)).await?;
    let findings = refresh_waste_findings(pool, encryption_key, Some(user_id)).await?;
    info!(
        user_id = %user_id,
        subscriptions = synced,
        events = generated,
        waste_findings = findings,
        "Backfill complete"
    );
    Ok(())
}

pub fn spike_threshold(worker: &WorkerConfig) -> Option<Decimal> {
    Decimal::from_f64_retain(worker.spike_threshold)
}

/// Fetch and window-replace daily cost rows for every scan target. A target
/// that fails is logged and skipped; the rest of the batch proceeds.
pub async fn sync_costs(
    pool: &PgPool,
    encryption_key: &str,
    window_days: i64,
    user_id: Option<Uuid>,
) -> anyhow::Result<usize> {
    let end_date = Utc::now().date_naive();
    let start_date = end_date - Duration::days(window_days.max(1) - 1);
    let targets = ConnectionRepo::scan_targets(pool, user_id).await?;
    let http = reqwest::Client::new();

    let mut processed = 0usize;
    for target in &targets {
        match sync_one_target(pool, &http, target, encryption_key, start_date, end_date).await {
            Ok(()) => processed += 1,
            Err(e) => {
                error!(
                    subscription = %target.azure_subscription_id,
                    "Cost sync failed: {e:#}"
                );
            }
        }
    }

    info!(
        processed,
        start_date = %start_date,
        end_date = %end_date,
        "Cost sync completed"
    );
    Ok(processed)
}

async fn sync_one_target(
    pool: &PgPool,
    http: &reqwest::Client,
    target: &ScanTarget,
    encryption_key: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> anyhow::Result<()> {
    let client_secret = crypto::decrypt_secret(&target.encrypted_client_secret, encryption_key)
        .map_err(anyhow::Error::msg)?;
    let token = azure::acquire_access_token(http, &target.tenant_id, &target.client_id, &client_secret).await?;
    let points = azure::costs::query_subscription_costs(
        http,
        &target.azure_subscription_id,
        &token,
        start_date,
        end_date,
    )
    .await?;

    CostRecordRepo::replace_window(
        pool,
        target.user_id,
        &target.azure_subscription_id,
        start_date,
        end_date,
        &points,
    )
    .await?;
    Ok(())
}

/// Evaluate every user with recent data (or one user) and replace their cost
/// event for the resolved billing date.
pub async fn generate_cost_events(
    pool: &PgPool,
    user_id: Option<Uuid>,
    threshold: Option<Decimal>,
) -> anyhow::Result<usize> {
    let today = Utc::now().date_naive();
    let window_start = today - Duration::days(EVALUATION_WINDOW_DAYS);

    let user_ids = match user_id {
        Some(id) => vec![id],
        None => CostRecordRepo::user_ids_with_data(pool, window_start, today).await?,
    };

    let mut generated = 0usize;
    for current_user in user_ids {
        let samples = CostRecordRepo::samples_for_user(pool, current_user, window_start, today).await?;
        let Some(evaluation) = engine::evaluate(&samples, today, threshold) else {
            continue;
        };
        let event = event_row(current_user, &evaluation);
        CostEventRepo::replace_for_date(pool, &event).await?;
        generated += 1;
    }

    info!(generated, date = %today, "Cost event generation completed");
    Ok(generated)
}

/// Flatten an engine evaluation into its persistence row.
pub fn event_row(user_id: Uuid, evaluation: &CostEvaluation) -> CostEvent {
    let cause = evaluation.top_cause.as_ref();
    CostEvent {
        id: Uuid::new_v4(),
        user_id,
        date: evaluation.date,
        total_yesterday: evaluation.total_previous,
        total_today: evaluation.total_latest,
        difference: evaluation.difference,
        baseline: evaluation.baseline,
        spike_flag: evaluation.spike_flag,
        confidence: evaluation.confidence.as_str().to_string(),
        top_resource_id: cause.map(|c| truncate(&c.resource_id, 1024)),
        top_resource_name: cause.map(|c| truncate(&c.resource_name, 256)),
        top_resource_type: cause.map(|c| truncate(&c.resource_type, 256)),
        top_increase_amount: cause.map(|c| c.increase),
        suggestion_text: evaluation.suggestion_text.clone(),
        created_at_utc: Utc::now(),
    }
}

/// Scan all targets for idle resources and snapshot-replace the waste
/// findings of every touched user. Cost activity and prior findings are read
/// once, up front, before any adapter call or write.
pub async fn refresh_waste_findings(
    pool: &PgPool,
    encryption_key: &str,
    user_id: Option<Uuid>,
) -> anyhow::Result<usize> {
    let today = Utc::now().date_naive();
    let now = Utc::now();
    let targets = ConnectionRepo::scan_targets(pool, user_id).await?;
    if targets.is_empty() {
        return Ok(0);
    }

    let user_ids: Vec<Uuid> = targets
        .iter()
        .map(|t| t.user_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let prior_states = WasteFindingRepo::stopped_vm_states(pool, &user_ids).await?;
    let empty_priors: HashMap<String, PriorFindingState> = HashMap::new();

    let mut profiles: HashMap<Uuid, ActivityProfile> = HashMap::new();
    for &uid in &user_ids {
        let lookback_start = today - Duration::days(29);
        let samples = CostRecordRepo::samples_for_user(pool, uid, lookback_start, today).await?;
        profiles.insert(uid, ActivityProfile::build(&samples, today));
    }

    let http = reqwest::Client::new();
    let mut findings: Vec<WasteFinding> = Vec::new();
    for target in &targets {
        let scanned = scan_one_target(&http, target, encryption_key).await;
        let inventory = match scanned {
            Ok(inventory) => inventory,
            Err(e) => {
                error!(
                    subscription = %target.azure_subscription_id,
                    "Waste scan failed: {e:#}"
                );
                continue;
            }
        };

        let profile = &profiles[&target.user_id];
        let priors = prior_states.get(&target.user_id).unwrap_or(&empty_priors);
        let candidates = engine::waste::classify_inventory(&inventory, profile, priors, today, now);
        findings.extend(
            candidates
                .into_iter()
                .map(|candidate| finding_row(target, candidate, now)),
        );
    }

    WasteFindingRepo::replace_for_users(pool, &user_ids, &findings).await?;
    info!(
        findings = findings.len(),
        subscriptions = targets.len(),
        "Waste scan completed"
    );
    Ok(findings.len())
}

async fn scan_one_target(
    http: &reqwest::Client,
    target: &ScanTarget,
    encryption_key: &str,
) -> anyhow::Result<crate::models::InventorySnapshot> {
    let client_secret = crypto::decrypt_secret(&target.encrypted_client_secret, encryption_key)
        .map_err(anyhow::Error::msg)?;
    let token = azure::acquire_access_token(http, &target.tenant_id, &target.client_id, &client_secret).await?;
    azure::inventory::query_inventory(http, &target.azure_subscription_id, &token).await
}

fn finding_row(
    target: &ScanTarget,
    candidate: WasteCandidate,
    now: chrono::DateTime<Utc>,
) -> WasteFinding {
    WasteFinding {
        id: Uuid::new_v4(),
        user_id: target.user_id,
        azure_subscription_id: target.azure_subscription_id.clone(),
        finding_type: candidate.finding_type.as_str().to_string(),
        resource_id: truncate(&candidate.resource_id, 1024),
        resource_name: truncate(&candidate.resource_name, 256),
        estimated_monthly_cost: candidate.estimated_monthly_cost,
        classification: candidate.classification.map(|c| c.as_str().to_string()),
        inactive_duration_days: candidate.inactive_duration_days,
        waste_confidence_level: candidate.waste_confidence_level.map(|c| c.as_str().to_string()),
        last_seen_active_utc: candidate.last_seen_active_utc,
        status: "open".to_string(),
        detected_at_utc: now,
    }
}

/// Email every user whose latest evaluated date flagged a spike. Send
/// failures are per-recipient; one bad mailbox never blocks the rest.
pub async fn notify_spikes(pool: &PgPool, sender: &EmailSender) -> anyhow::Result<usize> {
    if !sender.is_enabled() {
        return Ok(0);
    }

    let Some(latest_date) = CostEventRepo::latest_event_date(pool).await? else {
        info!("Spike notifications skipped: no evaluated dates yet");
        return Ok(0);
    };

    let spikes = CostEventRepo::spikes_on_date(pool, latest_date).await?;
    let mut sent = 0usize;
    for event in &spikes {
        let Some(email) = UserRepo::email_by_id(pool, event.user_id).await? else {
            continue;
        };
        let (subject, body) = spike_email(event);
        match sender.send(&email, &subject, &body).await {
            Ok(()) => sent += 1,
            Err(e) => error!("Failed to send spike notification to {email}: {e:#}"),
        }
    }
    Ok(sent)
}

fn truncate(value: &str, max_length: usize) -> String {
    let trimmed = value.trim();
    match trimmed.char_indices().nth(max_length) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}
