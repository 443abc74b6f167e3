pub mod connection;
pub mod cost;
pub mod types;
pub mod user;
pub mod waste;

pub use connection::{
    AzureConnection, ConnectionResponse, CreateConnectionRequest, ScanTarget, Subscription,
};
pub use cost::{
    CostEvent, CostPoint, DailyCostResource, DashboardCauseResource, DashboardHistoryItem,
    DashboardSummaryResponse, HistoryQueryParams,
};
pub use types::{Confidence, FindingType, WasteClassification};
pub use user::{LoginRequest, SignupRequest, TokenResponse, User, UserInfo};
pub use waste::{
    InventorySnapshot, StoppedVmRow, UnattachedDiskRow, UnusedPublicIpRow, WasteFinding,
};
