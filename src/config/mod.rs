use crate::decay::FadeCurve;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Complete livemap configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveMapConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub decay: DecayConfig,
}

/// Map server the snapshots are fetched from
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Recurring poll cadences (seconds)
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_sightings_interval")]
    pub sightings_interval_secs: u64,
    #[serde(default = "default_workers_interval")]
    pub workers_interval_secs: u64,
    #[serde(default = "default_control_points_interval")]
    pub control_points_interval_secs: u64,
}

fn default_sightings_interval() -> u64 {
    30
}

fn default_workers_interval() -> u64 {
    14
}

fn default_control_points_interval() -> u64 {
    110
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            sightings_interval_secs: default_sightings_interval(),
            workers_interval_secs: default_workers_interval(),
            control_points_interval_secs: default_control_points_interval(),
        }
    }
}

/// Fade and expiry settings
#[derive(Debug, Clone, Deserialize)]
pub struct DecayConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Remaining TTL below which visuals start fading
    #[serde(default = "default_fade_threshold")]
    pub fade_threshold_secs: f64,
    /// Opacity reached at expiry
    #[serde(default = "default_fade_floor")]
    pub fade_floor: f64,
}

fn default_tick_interval_ms() -> u64 {
    2500
}

fn default_fade_threshold() -> f64 {
    300.0
}

fn default_fade_floor() -> f64 {
    0.5
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            fade_threshold_secs: default_fade_threshold(),
            fade_floor: default_fade_floor(),
        }
    }
}

impl DecayConfig {
    pub fn curve(&self) -> FadeCurve {
        FadeCurve {
            threshold_secs: self.fade_threshold_secs,
            floor: self.fade_floor,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl LiveMapConfig {
    /// Override from env vars where set.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("LIVEMAP_BASE_URL") {
            if url.is_empty() {
                warn!("LIVEMAP_BASE_URL is empty, keeping configured value");
            } else {
                self.server.base_url = url;
            }
        }
    }

    /// Reject values the schedulers cannot run with.
    pub fn validate(&self) -> Result<()> {
        let poll = &self.poll;
        if poll.sightings_interval_secs == 0
            || poll.workers_interval_secs == 0
            || poll.control_points_interval_secs == 0
        {
            bail!("poll intervals must be greater than zero");
        }
        if self.decay.tick_interval_ms == 0 {
            bail!("decay.tick_interval_ms must be greater than zero");
        }
        let threshold = self.decay.fade_threshold_secs;
        if threshold.is_nan() || threshold <= 0.0 {
            bail!("decay.fade_threshold_secs must be positive");
        }
        if !(0.0..=1.0).contains(&self.decay.fade_floor) {
            bail!("decay.fade_floor must be within [0, 1]");
        }
        if !self.server.base_url.starts_with("http://") && !self.server.base_url.starts_with("https://") {
            bail!("server.base_url must be an http(s) URL: {}", self.server.base_url);
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<LiveMapConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: LiveMapConfig = toml::from_str(&contents).context("Failed to parse config TOML")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LiveMapConfig::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.poll.sightings_interval_secs, 30);
        assert_eq!(config.poll.workers_interval_secs, 14);
        assert_eq!(config.poll.control_points_interval_secs, 110);
        assert_eq!(config.decay.tick_interval_ms, 2500);
        assert_eq!(config.decay.curve(), FadeCurve::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            base_url = "https://map.example.com"

            [poll]
            sightings_interval_secs = 20
            workers_interval_secs = 5
            control_points_interval_secs = 60

            [decay]
            tick_interval_ms = 1000
            fade_threshold_secs = 120.0
            fade_floor = 0.25
        "#;

        let config: LiveMapConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.base_url, "https://map.example.com");
        assert_eq!(config.poll.sightings_interval_secs, 20);
        assert_eq!(config.poll.workers_interval_secs, 5);
        assert_eq!(config.decay.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.decay.curve().floor, 0.25);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [decay]
            fade_floor = 0.3
        "#;

        let config: LiveMapConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.decay.fade_floor, 0.3);
        assert_eq!(config.decay.fade_threshold_secs, 300.0); // Default
        assert_eq!(config.poll.sightings_interval_secs, 30); // Default
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LiveMapConfig::default();
        config.poll.workers_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = LiveMapConfig::default();
        config.decay.fade_floor = 1.5;
        assert!(config.validate().is_err());

        let mut config = LiveMapConfig::default();
        config.server.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[poll]\nsightings_interval_secs = 45").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.poll.sightings_interval_secs, 45);
        assert_eq!(config.poll.workers_interval_secs, 14);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/livemap.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
