use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub encryption_key: String,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
}

fn default_token_expiry() -> u64 {
    24
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Hours between scheduled ingestion runs.
    #[serde(default = "default_run_interval")]
    pub run_interval_hours: u64,
    /// Days of cost history fetched on each scheduled sync.
    #[serde(default = "default_sync_window")]
    pub sync_window_days: i64,
    /// Days of cost history fetched when a new connection is backfilled.
    #[serde(default = "default_backfill_window")]
    pub backfill_window_days: i64,
    /// Minimum day-over-day increase (currency units) for a spike.
    #[serde(default = "default_spike_threshold")]
    pub spike_threshold: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            run_interval_hours: default_run_interval(),
            sync_window_days: default_sync_window(),
            backfill_window_days: default_backfill_window(),
            spike_threshold: default_spike_threshold(),
        }
    }
}

fn default_run_interval() -> u64 {
    24
}
fn default_sync_window() -> i64 {
    7
}
fn default_backfill_window() -> i64 {
    30
}
fn default_spike_threshold() -> f64 {
    5.0
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default)]
    pub from_address: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("COSTPILOT").separator("__"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }
}
