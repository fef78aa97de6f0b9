use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "PREORDER_ENV";
const CONFIG_DIR_ENV: &str = "PREORDER_CONFIG_DIR";
const ENV_PREFIX: &str = "PREORDER";

/// Vendor-conventional variables honoured on top of the layered sources.
const CONVENTIONAL_VARS: &[(&str, &str)] = &[
    ("SHOP_URL", "shopify.shop_url"),
    ("SHOPIFY_ACCESS_TOKEN", "shopify.access_token"),
    ("GITHUB_TOKEN", "github.token"),
    ("GITHUB_REPOSITORY", "github.repository"),
    ("SENDGRID_API_KEY", "email.api_key"),
    ("EMAIL_SENDER", "email.sender"),
];

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub shopify: ShopifySettings,
    #[serde(default)]
    pub github: GithubSettings,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub dashboard: DashboardSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// prefixed variables and finally the vendor-conventional variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::current_dir()
                    .map(|cwd| cwd.join("config"))
                    .unwrap_or_else(|_| PathBuf::from("config"))
            });

        let base_path = config_dir.join("base.toml");
        let environment_filename = format!("{}.toml", environment);
        let environment_path = config_dir.join(environment_filename);

        let mut builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("email.recipients"),
            );

        for (var, key) in CONVENTIONAL_VARS {
            builder = builder
                .set_override_option(*key, non_empty_var(var))
                .with_context(|| format!("failed to apply {var}"))?;
        }

        let recipients = non_empty_var("EMAIL_RECIPIENTS").map(|raw| split_list(&raw));
        builder = builder
            .set_override_option("email.recipients", recipients)
            .with_context(|| "failed to apply EMAIL_RECIPIENTS")?;

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Split a comma separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        30000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Commerce platform credentials and query shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifySettings {
    #[serde(default)]
    pub shop_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "ShopifySettings::default_api_version")]
    pub api_version: String,
    /// Collection handle holding the preorder titles.
    #[serde(default = "ShopifySettings::default_collection")]
    pub collection: String,
    #[serde(default = "ShopifySettings::default_page_size")]
    pub page_size: u32,
}

impl ShopifySettings {
    fn default_api_version() -> String {
        "2025-01".to_string()
    }

    fn default_collection() -> String {
        "preorder".to_string()
    }

    fn default_page_size() -> u32 {
        250
    }

    pub fn is_configured(&self) -> bool {
        self.shop_url.is_some() && self.access_token.is_some()
    }
}

impl Default for ShopifySettings {
    fn default() -> Self {
        Self {
            shop_url: None,
            access_token: None,
            api_version: Self::default_api_version(),
            collection: Self::default_collection(),
            page_size: Self::default_page_size(),
        }
    }
}

/// Issue tracker credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubSettings {
    #[serde(default)]
    pub token: Option<String>,
    /// `owner/repo`
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default = "GithubSettings::default_api_base")]
    pub api_base: String,
    #[serde(default = "GithubSettings::default_approval_label")]
    pub approval_label: String,
}

impl GithubSettings {
    fn default_api_base() -> String {
        "https://api.github.com".to_string()
    }

    fn default_approval_label() -> String {
        "preorder-approval".to_string()
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.repository.is_some()
    }
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            token: None,
            repository: None,
            api_base: Self::default_api_base(),
            approval_label: Self::default_approval_label(),
        }
    }
}

/// Email dispatch credentials and recipients.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "EmailSettings::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "EmailSettings::default_subject_prefix")]
    pub subject_prefix: String,
}

impl EmailSettings {
    fn default_endpoint() -> String {
        "https://api.sendgrid.com/v3/mail/send".to_string()
    }

    fn default_subject_prefix() -> String {
        "[Preorders]".to_string()
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.sender.is_some() && !self.recipients.is_empty()
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            sender: None,
            recipients: Vec::new(),
            endpoint: Self::default_endpoint(),
            subject_prefix: Self::default_subject_prefix(),
        }
    }
}

/// Bounds applied to every upstream call.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "GatewaySettings::default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "GatewaySettings::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "GatewaySettings::default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl GatewaySettings {
    fn default_timeout_ms() -> u64 {
        10000
    }

    fn default_max_retries() -> u32 {
        3
    }

    fn default_retry_delay_ms() -> u64 {
        1000
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            max_retries: Self::default_max_retries(),
            retry_delay_ms: Self::default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "StorageSettings::default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "StorageSettings::default_snapshot_file")]
    pub snapshot_file: String,
    #[serde(default = "StorageSettings::default_keep_backups")]
    pub keep_backups: usize,
    #[serde(default = "StorageSettings::default_persist")]
    pub persist: bool,
}

impl StorageSettings {
    fn default_data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    fn default_snapshot_file() -> String {
        "state.json".to_string()
    }

    fn default_keep_backups() -> usize {
        10
    }

    fn default_persist() -> bool {
        true
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    /// Where test mode keeps its own store: `state.json` becomes
    /// `state_test.json` next to it.
    pub fn test_snapshot_path(&self) -> PathBuf {
        let file = Path::new(&self.snapshot_file);
        let stem = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        let name = match file.extension() {
            Some(ext) => format!("{stem}_test.{}", ext.to_string_lossy()),
            None => format!("{stem}_test"),
        };
        self.data_dir.join(name)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            snapshot_file: Self::default_snapshot_file(),
            keep_backups: Self::default_keep_backups(),
            persist: Self::default_persist(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSettings {
    /// Start with fixture gateways instead of the live APIs.
    #[serde(default = "DashboardSettings::default_test_mode")]
    pub test_mode: bool,
    #[serde(default)]
    pub refresh_on_start: bool,
    /// Trailing window of sales pulled on every refresh.
    #[serde(default = "DashboardSettings::default_sales_window_days")]
    pub sales_window_days: u32,
    /// Titles published within this many days count as recent releases.
    #[serde(default = "DashboardSettings::default_recent_window_days")]
    pub recent_window_days: u32,
}

impl DashboardSettings {
    fn default_test_mode() -> bool {
        true
    }

    fn default_sales_window_days() -> u32 {
        30
    }

    fn default_recent_window_days() -> u32 {
        7
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            test_mode: Self::default_test_mode(),
            refresh_on_start: false,
            sales_window_days: Self::default_sales_window_days(),
            recent_window_days: Self::default_recent_window_days(),
        }
    }
}
