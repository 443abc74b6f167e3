use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A service-principal credential set for one Azure tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AzureConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub encrypted_client_secret: String,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub azure_connection_id: Uuid,
    pub azure_subscription_id: String,
    pub display_name: String,
    pub created_at_utc: DateTime<Utc>,
}

/// One (subscription, credential) pair as processed by a worker run.
/// Joined from subscriptions and azure_connections; the secret stays
/// encrypted until the adapter call needs it.
#[derive(Debug, Clone, FromRow)]
pub struct ScanTarget {
    pub user_id: Uuid,
    pub azure_subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub encrypted_client_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub id: Uuid,
    pub tenant_id: String,
    pub client_id: String,
    pub subscription_ids: Vec<String>,
    pub created_at_utc: DateTime<Utc>,
}
