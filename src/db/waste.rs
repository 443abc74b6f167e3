use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::attribution::normalize_resource_id;
use crate::engine::waste::PriorFindingState;
use crate::models::{FindingType, WasteFinding};
use std::collections::HashMap;

pub struct WasteFindingRepo;

impl WasteFindingRepo {
    /// Prior stopped-VM snapshot state per user, keyed by normalized resource
    /// id. Read before the scan so `last_seen_active_utc` and detection times
    /// can carry forward through the replace.
    pub async fn stopped_vm_states(
        pool: &PgPool,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, HashMap<String, PriorFindingState>>, sqlx::Error> {
        let rows: Vec<(Uuid, String, Option<DateTime<Utc>>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT user_id, resource_id, last_seen_active_utc, detected_at_utc
             FROM waste_findings
             WHERE finding_type = 'stopped_vm' AND user_id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(pool)
        .await?;

        let mut states: HashMap<Uuid, HashMap<String, PriorFindingState>> = HashMap::new();
        for (user_id, resource_id, last_seen_active_utc, detected_at_utc) in rows {
            states.entry(user_id).or_default().insert(
                normalize_resource_id(&resource_id),
                PriorFindingState {
                    last_seen_active_utc,
                    detected_at_utc,
                },
            );
        }
        Ok(states)
    }

    /// Snapshot replace: all findings of the tracked types for the scanned
    /// users go away, the fresh set goes in, atomically.
    pub async fn replace_for_users(
        pool: &PgPool,
        user_ids: &[Uuid],
        findings: &[WasteFinding],
    ) -> Result<(), sqlx::Error> {
        let tracked: Vec<String> = FindingType::ALL.iter().map(|t| t.to_string()).collect();

        let mut tx = pool.begin().await?;
        sqlx::query(
            "DELETE FROM waste_findings WHERE user_id = ANY($1) AND finding_type = ANY($2)",
        )
        .bind(user_ids)
        .bind(&tracked)
        .execute(&mut *tx)
        .await?;

        for finding in findings {
            sqlx::query(
                r#"INSERT INTO waste_findings
                   (id, user_id, azure_subscription_id, finding_type, resource_id, resource_name,
                    estimated_monthly_cost, classification, inactive_duration_days,
                    waste_confidence_level, last_seen_active_utc, status, detected_at_utc)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
            )
            .bind(finding.id)
            .bind(finding.user_id)
            .bind(&finding.azure_subscription_id)
            .bind(&finding.finding_type)
            .bind(&finding.resource_id)
            .bind(&finding.resource_name)
            .bind(finding.estimated_monthly_cost)
            .bind(&finding.classification)
            .bind(finding.inactive_duration_days)
            .bind(&finding.waste_confidence_level)
            .bind(finding.last_seen_active_utc)
            .bind(&finding.status)
            .bind(finding.detected_at_utc)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Open findings, costliest first, newest first within equal estimates.
    pub async fn list_open_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<WasteFinding>, sqlx::Error> {
        sqlx::query_as::<_, WasteFinding>(
            "SELECT * FROM waste_findings
             WHERE user_id = $1 AND status = 'open'
             ORDER BY estimated_monthly_cost DESC NULLS LAST, detected_at_utc DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_for_user(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM waste_findings WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn insert_batch(
        pool: &PgPool,
        findings: &[WasteFinding],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for finding in findings {
            sqlx::query(
                r#"INSERT INTO waste_findings
                   (id, user_id, azure_subscription_id, finding_type, resource_id, resource_name,
                    estimated_monthly_cost, classification, inactive_duration_days,
                    waste_confidence_level, last_seen_active_utc, status, detected_at_utc)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
            )
            .bind(finding.id)
            .bind(finding.user_id)
            .bind(&finding.azure_subscription_id)
            .bind(&finding.finding_type)
            .bind(&finding.resource_id)
            .bind(&finding.resource_name)
            .bind(finding.estimated_monthly_cost)
            .bind(&finding.classification)
            .bind(finding.inactive_duration_days)
            .bind(&finding.waste_confidence_level)
            .bind(finding.last_seen_active_utc)
            .bind(&finding.status)
            .bind(finding.detected_at_utc)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
