//! Configuration types for the demos.

use crate::error::Result;
use crate::types::FallDirection;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Flash (octopus energy) demo parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    /// Number of grid rows
    pub rows: usize,
    /// Number of grid columns
    pub cols: usize,
    /// Last step the driver will run before it stops calling the engine
    pub max_step: u64,
    /// Upper bound (inclusive) for randomly generated starting energy
    pub fallback_max_energy: u8,
    /// Seed for the random fallback grid; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            rows: 10,
            cols: 10,
            max_step: 9999,
            fallback_max_energy: 8,
            seed: None,
        }
    }
}

/// How the settling engine advances particles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleMode {
    /// One particle in flight at a time, spawned at a fixed source
    Drop,
    /// Scan the grid and move the first movable rock, one per tick
    Bulk,
}

/// Settling (rock/sand) demo parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Number of grid rows
    pub rows: usize,
    /// Number of grid columns
    pub cols: usize,
    /// Movement mode
    pub mode: SettleMode,
    /// Fall direction at demo entry
    pub initial_direction: FallDirection,
    /// Position of the spawn source along the uphill wall (drop mode only)
    pub spawn_lane: usize,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            rows: 10,
            cols: 10,
            mode: SettleMode::Bulk,
            initial_direction: FallDirection::Up,
            spawn_lane: 5,
        }
    }
}

impl SettleConfig {
    /// Drop-mode sand cave: 10x12 with the source above column 8.
    pub fn sand() -> Self {
        Self {
            rows: 10,
            cols: 12,
            mode: SettleMode::Drop,
            initial_direction: FallDirection::Down,
            spawn_lane: 8,
        }
    }
}

/// Tick pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Milliseconds between simulation steps
    pub tick_interval_ms: u64,
    /// First tick after entering a demo waits this many intervals
    pub entry_delay_factor: u64,
    /// Pause between visual phases of one tick (runner only)
    pub phase_pause_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            entry_delay_factor: 2,
            phase_pause_ms: 100,
        }
    }
}

impl CadenceConfig {
    pub fn entry_delay_ms(&self) -> u64 {
        self.tick_interval_ms.saturating_mul(self.entry_delay_factor)
    }
}

/// Placement of grid cells on the display, in pixels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// X of the top-left corner of cell (0, 0)
    pub origin_x: i32,
    /// Y of the top-left corner of cell (0, 0)
    pub origin_y: i32,
    /// Distance between neighbouring cells
    pub cell_pitch: i32,
    /// Offset from a cell's corner to the point the marker is drawn at
    pub cell_inset: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            origin_x: 57,
            origin_y: 25,
            cell_pitch: 10,
            cell_inset: 5,
        }
    }
}

/// Button handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Minimum milliseconds between accepted button events
    pub debounce_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

/// Everything the badge needs, loadable from one JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrophyConfig {
    pub flash: FlashConfig,
    /// Bulk rock-tilting demo
    pub settle: SettleConfig,
    /// Drop-mode sand demo; fields left out keep the sand defaults
    #[serde(deserialize_with = "sand_with_overrides")]
    pub sand: SettleConfig,
    pub cadence: CadenceConfig,
    pub display: DisplayConfig,
    pub input: InputConfig,
}

impl Default for TrophyConfig {
    fn default() -> Self {
        Self {
            flash: FlashConfig::default(),
            settle: SettleConfig::default(),
            sand: SettleConfig::sand(),
            cadence: CadenceConfig::default(),
            display: DisplayConfig::default(),
            input: InputConfig::default(),
        }
    }
}

fn sand_with_overrides<'de, D>(deserializer: D) -> std::result::Result<SettleConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = serde_json::Value::deserialize(deserializer)?;
    let mut merged = serde_json::to_value(SettleConfig::sand()).map_err(de::Error::custom)?;
    if let (Some(base), Some(fields)) = (merged.as_object_mut(), overrides.as_object()) {
        for (key, value) in fields {
            base.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(merged).map_err(de::Error::custom)
}

impl TrophyConfig {
    /// Read overrides from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded configuration overrides");
        Ok(config)
    }
}
