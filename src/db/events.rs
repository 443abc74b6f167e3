use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::CostEvent;

pub struct CostEventRepo;

impl CostEventRepo {
    /// Upsert-by-replace: the existing row for (user, date) is deleted and
    /// the fresh evaluation inserted in one transaction.
    pub async fn replace_for_date(pool: &PgPool, event: &CostEvent) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM cost_events WHERE user_id = $1 AND date = $2")
            .bind(event.user_id)
            .bind(event.date)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"INSERT INTO cost_events
               (id, user_id, date, total_yesterday, total_today, difference, baseline,
                spike_flag, confidence, top_resource_id, top_resource_name, top_resource_type,
                top_increase_amount, suggestion_text, created_at_utc)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.date)
        .bind(event.total_yesterday)
        .bind(event.total_today)
        .bind(event.difference)
        .bind(event.baseline)
        .bind(event.spike_flag)
        .bind(&event.confidence)
        .bind(&event.top_resource_id)
        .bind(&event.top_resource_name)
        .bind(&event.top_resource_type)
        .bind(event.top_increase_amount)
        .bind(&event.suggestion_text)
        .bind(event.created_at_utc)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn latest_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<CostEvent>, sqlx::Error> {
        sqlx::query_as::<_, CostEvent>(
            "SELECT * FROM cost_events WHERE user_id = $1 ORDER BY date DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Days worth surfacing in history: spikes, plus any day whose increase
    /// cleared the threshold even without the spike flag.
    pub async fn history_for_user(
        pool: &PgPool,
        user_id: Uuid,
        threshold: Decimal,
        limit: i64,
    ) -> Result<Vec<CostEvent>, sqlx::Error> {
        sqlx::query_as::<_, CostEvent>(
            "SELECT * FROM cost_events
             WHERE user_id = $1 AND (spike_flag = TRUE OR difference > $2)
             ORDER BY date DESC
             LIMIT $3",
        )
        .bind(user_id)
        .bind(threshold)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Spike rows for one date, for notification runs.
    pub async fn spikes_on_date(
        pool: &PgPool,
        date: NaiveDate,
    ) -> Result<Vec<CostEvent>, sqlx::Error> {
        sqlx::query_as::<_, CostEvent>(
            "SELECT * FROM cost_events WHERE date = $1 AND spike_flag = TRUE",
        )
        .bind(date)
        .fetch_all(pool)
        .await
    }

    /// Most recent date that has a cost event row, across all users.
    pub async fn latest_event_date(pool: &PgPool) -> Result<Option<NaiveDate>, sqlx::Error> {
        let row: (Option<NaiveDate>,) = sqlx::query_as("SELECT MAX(date) FROM cost_events")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn delete_for_user(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM cost_events WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete_from_date(
        pool: &PgPool,
        user_id: Uuid,
        from_date: NaiveDate,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM cost_events WHERE user_id = $1 AND date >= $2")
            .bind(user_id)
            .bind(from_date)
            .execute(pool)
            .await?;
        Ok(())
    }
}
