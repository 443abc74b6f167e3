use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::CostSample;
use crate::models::{CostPoint, DailyCostResource};

pub struct CostRecordRepo;

impl CostRecordRepo {
    /// Replace one subscription's cost rows for a date window with a freshly
    /// fetched set. Delete and insert commit together, so a cancelled sync
    /// never leaves a half-written window.
    pub async fn replace_window(
        pool: &PgPool,
        user_id: Uuid,
        subscription_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        rows: &[CostPoint],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "DELETE FROM daily_cost_resources
             WHERE user_id = $1 AND azure_subscription_id = $2 AND date >= $3 AND date <= $4",
        )
        .bind(user_id)
        .bind(subscription_id)
        .bind(start_date)
        .bind(end_date)
        .execute(&mut *tx)
        .await?;

        for row in rows {
            sqlx::query(
                r#"INSERT INTO daily_cost_resources (user_id, azure_subscription_id, date, resource_id, cost, currency)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   ON CONFLICT (user_id, azure_subscription_id, date, resource_id)
                   DO UPDATE SET cost = EXCLUDED.cost, currency = EXCLUDED.currency"#,
            )
            .bind(user_id)
            .bind(subscription_id)
            .bind(row.date)
            .bind(truncated(&row.resource_id, 1024))
            .bind(row.cost)
            .bind(&row.currency)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Snapshot of one user's samples for the engine, across subscriptions.
    pub async fn samples_for_user(
        pool: &PgPool,
        user_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<CostSample>, sqlx::Error> {
        let rows: Vec<DailyCostResource> = sqlx::query_as(
            "SELECT * FROM daily_cost_resources
             WHERE user_id = $1 AND date >= $2 AND date <= $3
             ORDER BY date, resource_id",
        )
        .bind(user_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CostSample {
                date: row.date,
                resource_id: row.resource_id,
                cost: row.cost,
            })
            .collect())
    }

    /// Users with any cost rows in the window; drives the per-user
    /// evaluation fan-out.
    pub async fn user_ids_with_data(
        pool: &PgPool,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT DISTINCT user_id FROM daily_cost_resources WHERE date >= $1 AND date <= $2",
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn month_to_date_total(
        pool: &PgPool,
        user_id: Uuid,
        month_start: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Decimal, sqlx::Error> {
        let row: (Option<Decimal>,) = sqlx::query_as(
            "SELECT SUM(cost) FROM daily_cost_resources
             WHERE user_id = $1 AND date >= $2 AND date <= $3",
        )
        .bind(user_id)
        .bind(month_start)
        .bind(end_date)
        .fetch_one(pool)
        .await?;
        Ok(row.0.unwrap_or_default())
    }

    pub async fn delete_for_user(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM daily_cost_resources WHERE user_id = $1")
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
        sqlx::query("DELETE FROM daily_cost_resources WHERE user_id = $1 AND date >= $2")
            .bind(user_id)
            .bind(from_date)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn insert_seed_rows(
        pool: &PgPool,
        user_id: Uuid,
        subscription_id: &str,
        rows: &[crate::engine::scenario::SeedCostRow],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"INSERT INTO daily_cost_resources (user_id, azure_subscription_id, date, resource_id, cost, currency)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   ON CONFLICT (user_id, azure_subscription_id, date, resource_id)
                   DO UPDATE SET cost = EXCLUDED.cost, currency = EXCLUDED.currency"#,
            )
            .bind(user_id)
            .bind(subscription_id)
            .bind(row.date)
            .bind(&row.resource_id)
            .bind(row.cost)
            .bind(row.currency)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as u64)
    }
}

fn truncated(value: &str, max_length: usize) -> &str {
    let trimmed = value.trim();
    match trimmed.char_indices().nth(max_length) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}
