use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AzureConnection, ScanTarget, Subscription};

pub struct ConnectionRepo;

impl ConnectionRepo {
    /// Store a connection and its subscriptions together; a failed
    /// subscription insert rolls the whole registration back.
    pub async fn create_with_subscriptions(
        pool: &PgPool,
        user_id: Uuid,
        tenant_id: &str,
        client_id: &str,
        encrypted_client_secret: &str,
        subscription_ids: &[String],
    ) -> Result<AzureConnection, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let connection = sqlx::query_as::<_, AzureConnection>(
            r#"INSERT INTO azure_connections (id, user_id, tenant_id, client_id, encrypted_client_secret)
               VALUES ($1, $2, $3, $4, $5) RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(tenant_id)
        .bind(client_id)
        .bind(encrypted_client_secret)
        .fetch_one(&mut *tx)
        .await?;

        for subscription_id in subscription_ids {
            sqlx::query(
                r#"INSERT INTO subscriptions (id, user_id, azure_connection_id, azure_subscription_id)
                   VALUES ($1, $2, $3, $4)
                   ON CONFLICT (user_id, azure_subscription_id)
                   DO UPDATE SET azure_connection_id = EXCLUDED.azure_connection_id"#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(connection.id)
            .bind(subscription_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(connection)
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<AzureConnection>, sqlx::Error> {
        sqlx::query_as::<_, AzureConnection>(
            "SELECT * FROM azure_connections WHERE user_id = $1 ORDER BY created_at_utc DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn subscriptions_for_connection(
        pool: &PgPool,
        connection_id: Uuid,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE azure_connection_id = $1 ORDER BY azure_subscription_id",
        )
        .bind(connection_id)
        .fetch_all(pool)
        .await
    }

    /// Latest registered subscription id for a user; the scenario seeder
    /// falls back to a fixture id when none exists.
    pub async fn latest_subscription_id(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT azure_subscription_id FROM subscriptions
             WHERE user_id = $1 ORDER BY created_at_utc DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    /// All (subscription, credential) pairs a worker run scans, optionally
    /// narrowed to one user for connect-triggered backfills.
    pub async fn scan_targets(
        pool: &PgPool,
        user_id: Option<Uuid>,
    ) -> Result<Vec<ScanTarget>, sqlx::Error> {
        let base = "SELECT s.user_id, s.azure_subscription_id, c.tenant_id, c.client_id, c.encrypted_client_secret
             FROM subscriptions s
             JOIN azure_connections c ON c.id = s.azure_connection_id";

        match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, ScanTarget>(&format!("{base} WHERE s.user_id = $1"))
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
            }
            None => sqlx::query_as::<_, ScanTarget>(base).fetch_all(pool).await,
        }
    }
}
