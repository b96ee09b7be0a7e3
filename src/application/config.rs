use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub snmp: SnmpConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Per-job intervals, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default = "default_supplies_secs")]
    pub supplies_secs: u64,
    #[serde(default = "default_discovery_secs")]
    pub discovery_secs: u64,
    #[serde(default = "default_evaluate_secs")]
    pub evaluate_secs: u64,
    #[serde(default = "default_maintenance_secs")]
    pub maintenance_secs: u64,
    #[serde(default = "default_dispatch_secs")]
    pub dispatch_secs: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
    #[serde(default = "default_summary_secs")]
    pub summary_secs: u64,
    #[serde(default = "default_cleanup_secs")]
    pub cleanup_secs: u64,
}

/// Agent credentials and polling limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpConfig {
    #[serde(default = "default_community")]
    pub default_community: String,
    #[serde(default = "default_snmp_port")]
    pub default_port: u16,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_polls: usize,
    #[serde(default = "default_walk_limit")]
    pub supply_walk_limit: usize,
}

/// Network sweep settings for finding unregistered printers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub enabled: bool,
    /// CIDR of the subnet to sweep, e.g. "192.168.1.0/24".
    #[serde(default = "default_network")]
    pub network: String,
    /// Lowercased substrings matched against the system description.
    #[serde(default = "default_vendor_signatures")]
    pub vendor_signatures: Vec<String>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Delivery endpoints and the retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub email_gateway_url: Option<String>,
    #[serde(default)]
    pub sms_gateway_url: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_feed_path")]
    pub system_feed_path: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// How long history is kept before the cleanup job removes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub days: u32,
}

/// Database storage path (tilde-expanded at point of use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

// --- Defaults ---

const fn default_poll_secs() -> u64 {
    300
}

const fn default_supplies_secs() -> u64 {
    900
}

const fn default_discovery_secs() -> u64 {
    3600
}

const fn default_evaluate_secs() -> u64 {
    300
}

const fn default_maintenance_secs() -> u64 {
    86_400
}

const fn default_dispatch_secs() -> u64 {
    60
}

const fn default_sweep_secs() -> u64 {
    300
}

const fn default_summary_secs() -> u64 {
    3600
}

const fn default_cleanup_secs() -> u64 {
    86_400
}

fn default_community() -> String {
    "public".into()
}

const fn default_snmp_port() -> u16 {
    161
}

const fn default_timeout_ms() -> u64 {
    2000
}

const fn default_retries() -> u32 {
    1
}

const fn default_max_concurrent() -> usize {
    8
}

const fn default_walk_limit() -> usize {
    64
}

fn default_network() -> String {
    "192.168.1.0/24".into()
}

fn default_vendor_signatures() -> Vec<String> {
    vec!["hp".into(), "hewlett".into()]
}

const fn default_probe_timeout_ms() -> u64 {
    500
}

fn default_feed_path() -> String {
    "~/.local/share/printwatch/notifications.jsonl".into()
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retention_days() -> u32 {
    90
}

// Stored with the tilde intact; expanded at point of use.
fn default_database_path() -> String {
    "~/.local/share/printwatch/printwatch.db".into()
}

// --- Default impls ---

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_poll_secs(),
            supplies_secs: default_supplies_secs(),
            discovery_secs: default_discovery_secs(),
            evaluate_secs: default_evaluate_secs(),
            maintenance_secs: default_maintenance_secs(),
            dispatch_secs: default_dispatch_secs(),
            sweep_secs: default_sweep_secs(),
            summary_secs: default_summary_secs(),
            cleanup_secs: default_cleanup_secs(),
        }
    }
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            default_community: default_community(),
            default_port: default_snmp_port(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            max_concurrent_polls: default_max_concurrent(),
            supply_walk_limit: default_walk_limit(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            network: default_network(),
            vendor_signatures: default_vendor_signatures(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            email_gateway_url: None,
            sms_gateway_url: None,
            webhook_url: None,
            system_feed_path: default_feed_path(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

// --- AppConfig methods ---

impl AppConfig {
    /// Load config from default path or create default config file
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the file cannot be read, or the TOML content is invalid.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_or_create(&path)
    }

    /// Load from a specific path, or create a default config file if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is invalid,
    /// or the default config file cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Load from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML content is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to a specific path, creating parent directories if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("printwatch").join("config.toml"))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_sensible_values() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler.poll_secs, 300);
        assert_eq!(config.scheduler.supplies_secs, 900);
        assert_eq!(config.scheduler.dispatch_secs, 60);
        assert_eq!(config.scheduler.maintenance_secs, 86_400);
        assert_eq!(config.scheduler.cleanup_secs, 86_400);
        assert_eq!(config.snmp.default_community, "public");
        assert_eq!(config.snmp.default_port, 161);
        assert_eq!(config.snmp.max_concurrent_polls, 8);
        assert!(!config.discovery.enabled);
        assert_eq!(config.discovery.vendor_signatures, vec!["hp", "hewlett"]);
        assert_eq!(config.notifications.max_attempts, 3);
        assert!(config.notifications.email_gateway_url.is_none());
        assert_eq!(config.retention.days, 90);
        assert_eq!(
            config.database.path,
            "~/.local/share/printwatch/printwatch.db"
        );
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("").expect("parse empty toml");
        assert_eq!(config.scheduler.poll_secs, 300);
        assert_eq!(config.snmp.default_community, "public");
        assert_eq!(config.retention.days, 90);
    }

    #[test]
    fn partial_toml_fills_missing_with_defaults() {
        let toml_str = r#"
[scheduler]
poll_secs = 60

[discovery]
enabled = true
network = "10.20.0.0/24"

[notifications]
email_gateway_url = "http://relay.internal/email"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse partial toml");
        assert_eq!(config.scheduler.poll_secs, 60);
        assert_eq!(config.scheduler.evaluate_secs, 300);
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.network, "10.20.0.0/24");
        assert_eq!(config.discovery.vendor_signatures, vec!["hp", "hewlett"]);
        assert_eq!(
            config.notifications.email_gateway_url.as_deref(),
            Some("http://relay.internal/email")
        );
        assert_eq!(config.notifications.max_attempts, 3);
    }

    #[test]
    fn load_from_file() {
        let toml_str = r#"
[snmp]
default_community = "fleet-ro"
timeout_ms = 5000

[retention]
days = 30
"#;
        let mut tmpfile = tempfile::NamedTempFile::new().expect("create tempfile");
        tmpfile
            .write_all(toml_str.as_bytes())
            .expect("write tmpfile");

        let config = AppConfig::load_from(tmpfile.path()).expect("load from file");
        assert_eq!(config.snmp.default_community, "fleet-ro");
        assert_eq!(config.snmp.timeout_ms, 5000);
        assert_eq!(config.retention.days, 30);
    }

    #[test]
    fn serde_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let deserialized: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(deserialized.scheduler.poll_secs, config.scheduler.poll_secs);
        assert_eq!(
            deserialized.snmp.default_community,
            config.snmp.default_community
        );
        assert_eq!(deserialized.database.path, config.database.path);
    }

    #[test]
    fn save_to_creates_file_and_directories() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("subdir").join("config.toml");

        let config = AppConfig::default();
        config.save_to(&path).expect("save_to");

        assert!(path.exists());
        let reloaded = AppConfig::load_from(&path).expect("reload");
        assert_eq!(reloaded.scheduler.poll_secs, config.scheduler.poll_secs);
    }

    #[test]
    fn load_or_create_creates_default_when_missing() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("printwatch").join("config.toml");

        assert!(!path.exists());
        let config = AppConfig::load_or_create(&path).expect("load_or_create");

        assert!(path.exists());
        assert_eq!(config.snmp.default_community, "public");
    }

    #[test]
    fn invalid_toml_fails() {
        let mut tmpfile = tempfile::NamedTempFile::new().expect("create tempfile");
        tmpfile
            .write_all(b"this is not valid toml [[[")
            .expect("write");

        let result = AppConfig::load_from(tmpfile.path());
        assert!(result.is_err());
    }
}
