use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::TICKS_PER_SECOND;

/// Capacity and radius of one streamer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamerConfig {
    /// Hard limit on live entities.
    pub max_visible: usize,
    /// Radius around an observer within which candidates are considered.
    pub streaming_distance: f32,
    /// Fraction of `max_visible` handed out to observers each pass.
    #[serde(default = "default_saturation_ratio")]
    pub saturation_ratio: f64,
    /// Park unreferenced entities for reuse instead of destroying them.
    #[serde(default)]
    pub lru: bool,
}
fn default_saturation_ratio() -> f64 {
    0.7
}
impl StreamerConfig {
    pub fn new(max_visible: usize, streaming_distance: f32) -> Self {
        Self {
            max_visible,
            streaming_distance,
            saturation_ratio: default_saturation_ratio(),
            lru: false,
        }
    }
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_visible == 0 {
            return Err(ConfigError::Invalid("max_visible must be greater than zero"));
        }
        if !(self.streaming_distance > 0.0) || !self.streaming_distance.is_finite() {
            return Err(ConfigError::Invalid("streaming_distance must be a positive number"));
        }
        if !(self.saturation_ratio > 0.0 && self.saturation_ratio <= 1.0) {
            return Err(ConfigError::Invalid("saturation_ratio must be in (0, 1]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_vehicles")]
    pub vehicles: StreamerConfig,
    #[serde(default = "default_objects")]
    pub objects: StreamerConfig,
    /// Seconds a vehicle stays pinned after it was last used.
    #[serde(default = "default_respawn_delay_secs")]
    pub respawn_delay_secs: u32,
}
fn default_vehicles() -> StreamerConfig {
    StreamerConfig::new(1000, 300.0)
}
fn default_objects() -> StreamerConfig {
    StreamerConfig { lru: true, ..StreamerConfig::new(1000, 300.0) }
}
fn default_respawn_delay_secs() -> u32 {
    180
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            vehicles: default_vehicles(),
            objects: default_objects(),
            respawn_delay_secs: default_respawn_delay_secs(),
        }
    }
}
impl ServerConfig {
    pub fn from_path(p: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(p)?;
        Self::from_reader(std::io::BufReader::new(file))
    }
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vehicles.validate()?;
        self.objects.validate()
    }
    pub fn respawn_delay_ticks(&self) -> u32 {
        self.respawn_delay_secs.saturating_mul(TICKS_PER_SECOND)
    }
}
