//! Leadflow configuration system.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LeadflowError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadflowConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub sms: SmsGatewayConfig,
    /// Lead type code → priority and display label.
    #[serde(default)]
    pub lead_types: HashMap<String, LeadTypeConfig>,
}

impl LeadflowConfig {
    /// Load config from the default path (~/.leadflow/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LeadflowError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LeadflowError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        tracing::debug!("⚙️ Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| LeadflowError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// The Leadflow home directory (~/.leadflow).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".leadflow")
    }

    /// Reject settings the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.dispatch;
        if d.tick_interval_minutes == 0 {
            return Err(LeadflowError::Config("dispatch.tick_interval_minutes must be > 0".into()));
        }
        if d.send_probability > 100 {
            return Err(LeadflowError::Config(format!(
                "dispatch.send_probability must be 0-100, got {}",
                d.send_probability
            )));
        }
        if d.min_send_delay_secs > d.max_send_delay_secs {
            return Err(LeadflowError::Config(
                "dispatch.min_send_delay_secs exceeds max_send_delay_secs".into(),
            ));
        }
        if self.enrichment.batch_size == 0 {
            return Err(LeadflowError::Config("enrichment.batch_size must be > 0".into()));
        }
        Ok(())
    }

    /// Like `validate`, plus the checks that only matter when actually sending.
    pub fn validate_for_dispatch(&self) -> Result<()> {
        self.validate()?;
        if self.dispatch.senders.is_empty() {
            return Err(LeadflowError::Config("dispatch.senders is empty".into()));
        }
        Ok(())
    }

    /// Display label for a type code, or the configured fallback.
    pub fn type_label(&self, code: &str) -> String {
        self.lookup_type(code)
            .map(|t| t.label.clone())
            .unwrap_or_else(|| self.ingest.default_type_label.clone())
    }

    /// Priority for a lead's Type cell. Matches either the code or its label.
    pub fn type_priority(&self, kind: &str) -> Option<i64> {
        self.lookup_type(kind).map(|t| t.priority)
    }

    fn lookup_type(&self, kind: &str) -> Option<&LeadTypeConfig> {
        let kind = kind.trim();
        if kind.is_empty() {
            return None;
        }
        self.lead_types.get(kind).or_else(|| {
            self.lead_types.iter().find_map(|(code, t)| {
                (code.eq_ignore_ascii_case(kind) || t.label.eq_ignore_ascii_case(kind)).then_some(t)
            })
        })
    }
}

/// Record store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.leadflow/leadflow.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Written to the Source column of every ingested lead.
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    #[serde(default = "default_type_label")]
    pub default_type_label: String,
    /// Case numbers starting with one of these are not leads.
    #[serde(default = "default_ignored_case_prefixes")]
    pub ignored_case_prefixes: Vec<String>,
    /// JSON file read by the `ingest` command.
    #[serde(default)]
    pub import_path: String,
}

fn default_source_tag() -> String { "import".into() }
fn default_type_label() -> String { "Unknown".into() }
fn default_ignored_case_prefixes() -> Vec<String> { vec!["TOW".into(), "GRA".into()] }

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_tag: default_source_tag(),
            default_type_label: default_type_label(),
            ignored_case_prefixes: default_ignored_case_prefixes(),
            import_path: String::new(),
        }
    }
}

/// Skip-trace (BatchData) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Max skip-trace calls per run.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_batchdata_url")]
    pub base_url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize { 10 }
fn default_batchdata_url() -> String { "https://api.batchdata.com/api/v1".into() }
fn default_http_timeout() -> u64 { 30 }

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            api_key: String::new(),
            base_url: default_batchdata_url(),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Days between a slot being sent and the next slot becoming queueable.
    #[serde(default = "default_delay_between_messages")]
    pub delay_between_messages: u32,
}

fn default_delay_between_messages() -> u32 { 3 }

impl Default for QueueConfig {
    fn default() -> Self {
        Self { delay_between_messages: default_delay_between_messages() }
    }
}

/// Rate limiting and sender rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Sender phone numbers.
    #[serde(default)]
    pub senders: Vec<String>,
    #[serde(default = "default_max_per_hour")]
    pub max_per_sender_per_hour: u32,
    #[serde(default)]
    pub max_per_sender_per_day: Option<u32>,
    /// How often the external trigger runs a tick.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_minutes: u32,
    /// Chance (0-100) that each budgeted slot is kept before the last interval of the hour.
    #[serde(default = "default_send_probability")]
    pub send_probability: u8,
    #[serde(default = "default_min_send_delay")]
    pub min_send_delay_secs: u64,
    #[serde(default = "default_max_send_delay")]
    pub max_send_delay_secs: u64,
}

fn default_max_per_hour() -> u32 { 4 }
fn default_tick_interval() -> u32 { 5 }
fn default_send_probability() -> u8 { 60 }
fn default_min_send_delay() -> u64 { 20 }
fn default_max_send_delay() -> u64 { 60 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            senders: Vec::new(),
            max_per_sender_per_hour: default_max_per_hour(),
            max_per_sender_per_day: None,
            tick_interval_minutes: default_tick_interval(),
            send_probability: default_send_probability(),
            min_send_delay_secs: default_min_send_delay(),
            max_send_delay_secs: default_max_send_delay(),
        }
    }
}

/// HTTP SMS gateway used to deliver messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsGatewayConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for SmsGatewayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTypeConfig {
    #[serde(default)]
    pub priority: i64,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LeadflowConfig::default();
        assert_eq!(config.enrichment.batch_size, 10);
        assert_eq!(config.dispatch.tick_interval_minutes, 5);
        assert_eq!(config.ingest.default_type_label, "Unknown");
        assert!(config.validate().is_ok());
        assert!(config.validate_for_dispatch().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [dispatch]
            senders = ["5550001111", "5550002222"]
            max_per_sender_per_hour = 2
            send_probability = 75

            [queue]
            delay_between_messages = 5

            [lead_types.CV]
            priority = 3
            label = "Code Violation"
        "#;

        let config: LeadflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.dispatch.senders.len(), 2);
        assert_eq!(config.dispatch.max_per_sender_per_hour, 2);
        assert_eq!(config.dispatch.min_send_delay_secs, 20);
        assert_eq!(config.queue.delay_between_messages, 5);
        assert!(config.validate_for_dispatch().is_ok());
        assert_eq!(config.type_label("CV"), "Code Violation");
        assert_eq!(config.type_priority("code violation"), Some(3));
        assert_eq!(config.type_priority("cv"), Some(3));
        assert_eq!(config.type_priority("Probate"), None);
        assert_eq!(config.type_label("Probate"), "Unknown");
    }

    #[test]
    fn test_validate_rejects_bad_dispatch() {
        let mut config = LeadflowConfig::default();
        config.dispatch.send_probability = 101;
        assert!(config.validate().is_err());

        let mut config = LeadflowConfig::default();
        config.dispatch.tick_interval_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = LeadflowConfig::default();
        config.dispatch.min_send_delay_secs = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir()
            .join("leadflow-config-test")
            .join("config.toml");
        let mut config = LeadflowConfig::default();
        config.dispatch.senders = vec!["5550001111".into()];
        config.lead_types.insert(
            "PR".into(),
            LeadTypeConfig {
                priority: 1,
                label: "Probate".into(),
            },
        );
        config.save_to(&path).unwrap();

        let loaded = LeadflowConfig::load_from(&path).unwrap();
        assert_eq!(loaded.dispatch.senders, vec!["5550001111"]);
        assert_eq!(loaded.type_label("PR"), "Probate");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_home_dir() {
        let home = LeadflowConfig::home_dir();
        assert!(home.to_string_lossy().contains("leadflow"));
    }
}
