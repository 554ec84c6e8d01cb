use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CamviewConfig {
    /// Streams to supervise, in display order (left to right)
    #[serde(default = "default_streams")]
    pub streams: Vec<StreamEntry>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// One configured stream: where to connect and what to call it on screen.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamEntry {
    pub uri: String,
    pub label: String,
}

/// Reconnect backoff knobs shared by open failures and read failures.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    /// Initial delay before the first retry, and the value restored on success
    #[serde(default = "default_retry_floor")]
    pub floor_seconds: f64,

    /// Upper bound on the delay between consecutive retries
    #[serde(default = "default_retry_ceiling")]
    pub ceiling_seconds: f64,

    /// Multiplier applied to the delay after each consecutive failure
    #[serde(default = "default_retry_growth")]
    pub growth_factor: f64,
}

impl RetryConfig {
    pub fn floor(&self) -> Duration {
        Duration::from_secs_f64(self.floor_seconds)
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_secs_f64(self.ceiling_seconds)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            floor_seconds: default_retry_floor(),
            ceiling_seconds: default_retry_ceiling(),
            growth_factor: default_retry_growth(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// Per-tile height in pixels before horizontal concatenation
    #[serde(default = "default_tile_height")]
    pub tile_height: u32,

    /// A stream not updated for longer than this is rendered FROZEN
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_seconds: f64,

    /// Render cadence; also bounds how quickly an exit request is noticed
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Surface size used while the sink cannot report one
    #[serde(default = "default_fallback_resolution")]
    pub fallback_resolution: (u32, u32),

    /// TrueType font for tile headers; headers are drawn without text when
    /// the file cannot be loaded
    #[serde(default = "default_font_path")]
    pub font_path: String,

    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

impl DisplayConfig {
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.stale_threshold_seconds)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tile_height: default_tile_height(),
            stale_threshold_seconds: default_stale_threshold(),
            tick_interval_ms: default_tick_interval_ms(),
            fallback_resolution: default_fallback_resolution(),
            font_path: default_font_path(),
            font_size: default_font_size(),
        }
    }
}

impl CamviewConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("camview.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Configuration file (optional; serde defaults fill the gaps)
            .add_source(File::with_name(&path_str).required(false))
            // Environment variables with CAMVIEW_ prefix
            .add_source(Environment::with_prefix("CAMVIEW").separator("__"))
            .build()?;

        let config: CamviewConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.streams.is_empty() {
            return Err(ConfigError::Message(
                "At least one stream must be configured".to_string(),
            ));
        }

        for (i, stream) in self.streams.iter().enumerate() {
            if stream.uri.is_empty() {
                return Err(ConfigError::Message(format!("Stream {} has an empty uri", i)));
            }
            if stream.label.is_empty() {
                return Err(ConfigError::Message(format!(
                    "Stream {} has an empty label",
                    i
                )));
            }
        }

        if self.retry.floor_seconds <= 0.0 {
            return Err(ConfigError::Message(
                "retry.floor_seconds must be greater than 0".to_string(),
            ));
        }

        if self.retry.ceiling_seconds < self.retry.floor_seconds {
            return Err(ConfigError::Message(
                "retry.ceiling_seconds must not be less than retry.floor_seconds".to_string(),
            ));
        }

        if self.retry.growth_factor < 1.0 {
            return Err(ConfigError::Message(
                "retry.growth_factor must be at least 1.0".to_string(),
            ));
        }

        if self.display.tile_height == 0 {
            return Err(ConfigError::Message(
                "display.tile_height must be greater than 0".to_string(),
            ));
        }

        if self.display.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "display.tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.display.fallback_resolution.0 == 0 || self.display.fallback_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "display.fallback_resolution must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CamviewConfig {
    fn default() -> Self {
        Self {
            streams: default_streams(),
            retry: RetryConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

// Default value functions
fn default_streams() -> Vec<StreamEntry> {
    vec![
        StreamEntry {
            uri: "rtsp://192.168.1.1:7447/front".to_string(),
            label: "FRONT".to_string(),
        },
        StreamEntry {
            uri: "rtsp://192.168.1.1:7447/back".to_string(),
            label: "BACK".to_string(),
        },
    ]
}

fn default_retry_floor() -> f64 {
    0.5
}
fn default_retry_ceiling() -> f64 {
    5.0
}
fn default_retry_growth() -> f64 {
    1.6
}

fn default_tile_height() -> u32 {
    540
}
fn default_stale_threshold() -> f64 {
    2.0
}
fn default_tick_interval_ms() -> u64 {
    50
}
fn default_fallback_resolution() -> (u32, u32) {
    crate::compositor::FALLBACK_SURFACE
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    24.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = CamviewConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.streams.len(), 2);
        assert_eq!(config.streams[0].label, "FRONT");
        assert_eq!(config.streams[1].label, "BACK");
        assert_eq!(config.retry.floor(), Duration::from_millis(500));
        assert_eq!(config.retry.ceiling(), Duration::from_secs(5));
        assert_eq!(config.display.stale_threshold(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[[streams]]
uri = "rtsp://10.0.0.5:7447/abc"
label = "GATE"

[retry]
floor_seconds = 0.25
ceiling_seconds = 3.0

[display]
tile_height = 360
"#
        )
        .unwrap();

        let config = CamviewConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.streams.len(), 1);
        assert_eq!(config.streams[0].label, "GATE");
        assert_eq!(config.retry.floor(), Duration::from_millis(250));
        // Unspecified fields fall back to defaults
        assert!((config.retry.growth_factor - 1.6).abs() < f64::EPSILON);
        assert_eq!(config.display.tile_height, 360);
        assert_eq!(config.display.fallback_resolution, (1920, 1080));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CamviewConfig::default();

        config.streams.clear();
        assert!(config.validate().is_err());

        config.streams = default_streams();
        config.retry.growth_factor = 0.5;
        assert!(config.validate().is_err());

        config.retry.growth_factor = 1.6;
        config.retry.ceiling_seconds = 0.1;
        assert!(config.validate().is_err());

        config.retry.ceiling_seconds = 5.0;
        config.display.tile_height = 0;
        assert!(config.validate().is_err());

        config.display.tile_height = 540;
        assert!(config.validate().is_ok());
    }
}
