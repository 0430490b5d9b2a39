use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{DashboardError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub surface: SurfaceConfig,
    pub stars: StarfieldConfig,
    pub trail: TrailConfig,
    pub ripples: RippleConfig,
    pub timing: TimingConfig,
    pub feeds: FeedConfig,
    pub assets: AssetConfig,
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections fall back to their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.surface.logical_width > 0.0 && self.surface.logical_height > 0.0) {
            return Err(DashboardError::InvalidConfig(format!(
                "logical surface must have a positive extent, got {}x{}",
                self.surface.logical_width, self.surface.logical_height
            )));
        }
        if self.trail.history_size == 0 || self.trail.rope_size == 0 {
            return Err(DashboardError::InvalidConfig(
                "trail history and rope sizes must be non-zero".to_string(),
            ));
        }
        if self.ripples.ttl_ms == 0 {
            return Err(DashboardError::InvalidConfig(
                "ripple ttl must be non-zero".to_string(),
            ));
        }
        let timing = &self.timing;
        if !(timing.reference_frame_ms > 0.0) {
            return Err(DashboardError::InvalidConfig(
                "reference frame duration must be positive".to_string(),
            ));
        }
        if !(timing.max_delta >= 0.0) {
            return Err(DashboardError::InvalidConfig(format!(
                "max delta must be non-negative, got {}",
                timing.max_delta
            )));
        }
        if timing.fps_window_ms == 0 || timing.fetch_interval_ms == 0 {
            return Err(DashboardError::InvalidConfig(
                "fps window and fetch interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fixed logical canvas every layout rule is expressed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub logical_width: f32,
    pub logical_height: f32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            logical_width: 1920.0,
            logical_height: 1080.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StarfieldConfig {
    pub count: usize,
    /// Increment of the shared rotation accumulator per reference frame.
    pub rotation_step: f32,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            count: 64,
            rotation_step: 0.02,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    pub history_size: usize,
    pub rope_size: usize,
    pub tangent_factor: f32,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            history_size: 20,
            rope_size: 100,
            tangent_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    pub ttl_ms: u64,
    pub line_width: f32,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 4_000,
            line_width: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub fps_window_ms: u64,
    pub fetch_interval_ms: u64,
    /// Frame duration that corresponds to a simulation delta of `1.0`.
    pub reference_frame_ms: f32,
    /// Upper bound for a single simulation step after a long stall.
    pub max_delta: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fps_window_ms: 1_000,
            fetch_interval_ms: 60_000,
            reference_frame_ms: 1_000.0 / 60.0,
            max_delta: 4.0,
        }
    }
}

/// Where each data feed is read from. Entries starting with `http://` or
/// `https://` are fetched over the network, everything else is a file path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub lessons: String,
    pub deadlines: String,
    pub weather: String,
    pub warnings: String,
    /// Station name as it appears in the weather report.
    pub weather_station: String,
    /// Station name as shown on the dashboard.
    pub weather_station_label: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            lessons: "lessons.json".to_string(),
            deadlines: "deadlines.json".to_string(),
            weather: "https://data.weather.gov.hk/weatherAPI/opendata/weather.php?dataType=rhrread&lang=en"
                .to_string(),
            warnings: "https://data.weather.gov.hk/weatherAPI/opendata/weather.php?dataType=warnsum&lang=en"
                .to_string(),
            weather_station: "Sha Tin".to_string(),
            weather_station_label: "沙田".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub texture_dir: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            texture_dir: PathBuf::from("textures"),
        }
    }
}

/// Demo switches for the data feeds. When enabled, lessons are selected for
/// `weekday` instead of today, every lesson counts as upcoming, and
/// `forced_warnings` are shown in front of the live warning list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// Weekday used in debug mode, Sunday = 0.
    pub weekday: u32,
    pub forced_warnings: Vec<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weekday: 2,
            forced_warnings: ["TC10", "WRAINB", "WTS", "WL", "WFNTSA", "WTMW"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
