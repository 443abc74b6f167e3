use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Point-in-time snapshot of one idle or orphaned resource. The scan
/// replaces all findings of the tracked types each cycle; only
/// `last_seen_active_utc` survives across cycles (carried forward when the
/// current cost history cannot establish it).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WasteFinding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub azure_subscription_id: String,
    pub finding_type: String,
    pub resource_id: String,
    pub resource_name: String,
    pub estimated_monthly_cost: Option<Decimal>,
    pub classification: Option<String>,
    pub inactive_duration_days: Option<Decimal>,
    pub waste_confidence_level: Option<String>,
    pub last_seen_active_utc: Option<DateTime<Utc>>,
    pub status: String,
    pub detected_at_utc: DateTime<Utc>,
}

/// Inventory rows returned by the provider adapter. Only the shape matters
/// to the classifier; how they are fetched is the adapter's business.
#[derive(Debug, Clone, Deserialize)]
pub struct UnattachedDiskRow {
    pub resource_id: String,
    pub name: String,
    pub sku: String,
    pub size_gb: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnusedPublicIpRow {
    pub resource_id: String,
    pub name: String,
    pub sku: String,
    pub allocation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoppedVmRow {
    pub resource_id: String,
    pub name: String,
    pub power_state: String,
}

/// Everything the inventory adapter saw for one subscription.
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    pub unattached_disks: Vec<UnattachedDiskRow>,
    pub unused_public_ips: Vec<UnusedPublicIpRow>,
    pub stopped_vms: Vec<StoppedVmRow>,
}
