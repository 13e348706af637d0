//! Configuration loading and management

use anyhow::{Context, Result};
use luckydraw_adapters::ProxyConfig;
use luckydraw_domain::FilterConfig;
use luckydraw_domain::usecases::{DrawConfig, FetchConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub fetch: FetchSettings,

    #[serde(default)]
    pub filter: FilterSettings,

    #[serde(default)]
    pub draw: DrawSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// `proxy` or `stub`
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    #[serde(default = "default_empty_page_limit")]
    pub empty_page_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub min_level: u32,

    #[serde(default = "default_true")]
    pub dedupe_by_author: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawSettings {
    #[serde(default = "default_winner_count")]
    pub winner_count: usize,

    #[serde(default = "default_rolling_duration_ms")]
    pub rolling_duration_ms: u64,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_provider() -> String {
    "proxy".to_string()
}

fn default_base_url() -> String {
    ProxyConfig::default().base_url
}

fn default_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    ProxyConfig::default().user_agent
}

fn default_max_pages() -> u32 {
    50
}

fn default_page_delay_ms() -> u64 {
    500
}

fn default_empty_page_limit() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_winner_count() -> usize {
    1
}

fn default_rolling_duration_ms() -> u64 {
    3000
}

fn default_tick_interval_ms() -> u64 {
    50
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            page_delay_ms: default_page_delay_ms(),
            empty_page_limit: default_empty_page_limit(),
        }
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            keywords: vec![],
            min_level: 0,
            dedupe_by_author: default_true(),
        }
    }
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            winner_count: default_winner_count(),
            rolling_duration_ms: default_rolling_duration_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl SourceConfig {
    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
            user_agent: self.user_agent.clone(),
        }
    }
}

impl FetchSettings {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            max_pages: self.max_pages.max(1),
            page_delay: Duration::from_millis(self.page_delay_ms),
            empty_page_limit: self.empty_page_limit.max(1),
        }
    }
}

impl FilterSettings {
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            keywords: self
                .keywords
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            min_level: self.min_level,
            dedupe_by_author: self.dedupe_by_author,
        }
    }
}

impl DrawSettings {
    pub fn draw_config(&self, seed: Option<u64>) -> DrawConfig {
        DrawConfig {
            rolling_duration: Duration::from_millis(self.rolling_duration_ms),
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            seed,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./luckydraw.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LUCKYDRAW")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("filter.keywords")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# luckydraw configuration

[general]
log_level = "info"

[source]
provider = "proxy"  # proxy, stub
base_url = "http://127.0.0.1:3000"
timeout_secs = 15
# user_agent = "luckydraw/0.1.0"

[fetch]
max_pages = 50
page_delay_ms = 500
# consecutive empty pages treated as the end of data
empty_page_limit = 3

[filter]
keywords = []  # e.g. ["接好运", "想要"]
min_level = 0
dedupe_by_author = true

[draw]
winner_count = 1
rolling_duration_ms = 3000
tick_interval_ms = 50
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_parses() {
        let parsed: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();

        assert_eq!(parsed.source.provider, "proxy");
        assert_eq!(parsed.fetch.max_pages, 50);
        assert_eq!(parsed.fetch.empty_page_limit, 3);
        assert!(parsed.filter.dedupe_by_author);
        assert_eq!(parsed.draw.rolling_duration_ms, 3000);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let parsed: AppConfig = toml::from_str("[filter]\nmin_level = 3\n").unwrap();

        assert_eq!(parsed.filter.min_level, 3);
        assert!(parsed.filter.dedupe_by_author);
        assert_eq!(parsed.general.log_level, "info");
        assert_eq!(parsed.draw.winner_count, 1);
    }

    #[test]
    fn test_settings_convert_to_domain_configs() {
        let config = AppConfig {
            fetch: FetchSettings {
                max_pages: 0,
                page_delay_ms: 0,
                empty_page_limit: 2,
            },
            filter: FilterSettings {
                keywords: vec![" 接好运 ".to_string(), String::new()],
                ..Default::default()
            },
            ..Default::default()
        };

        let fetch = config.fetch.fetch_config();
        assert_eq!(fetch.max_pages, 1);
        assert!(fetch.page_delay.is_zero());
        assert_eq!(config.filter.filter_config().keywords, vec!["接好运"]);
        assert_eq!(
            config.draw.draw_config(Some(9)).rolling_duration,
            Duration::from_secs(3)
        );
    }
}
