//! Player configuration, read from TOML.
//!
//! ```toml
//! sample_rate = 48000
//! tuning = "edo46"
//! wavetable = "assets/wave100.dat"
//! drum_dir = "assets/drums"
//! ```

use std::path::{Path, PathBuf};

use et_ir::TuningProfile;
use serde::{Deserialize, Serialize};

use crate::error::MasterError;

/// Tuning names accepted in the config file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TuningSetting {
    #[default]
    Edo38,
    Edo46,
}

impl From<TuningSetting> for TuningProfile {
    fn from(setting: TuningSetting) -> Self {
        match setting {
            TuningSetting::Edo38 => TuningProfile::Edo38,
            TuningSetting::Edo46 => TuningProfile::Edo46,
        }
    }
}

impl From<TuningProfile> for TuningSetting {
    fn from(profile: TuningProfile) -> Self {
        match profile {
            TuningProfile::Edo38 => TuningSetting::Edo38,
            TuningProfile::Edo46 => TuningSetting::Edo46,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    /// Output rate for offline rendering (real-time uses the device rate)
    pub sample_rate: u32,
    pub tuning: TuningSetting,
    /// Scheduler lookahead window
    pub lookahead_seconds: f64,
    /// Interval between scheduling passes
    pub tick_seconds: f64,
    /// Octave shift applied to MIDI keys
    pub octave_shift: i32,
    /// Companion wavetable blob; built-in waves when absent
    pub wavetable: Option<PathBuf>,
    /// Byte offset of the melodic waves inside the blob
    pub wavetable_offset: usize,
    /// Extra drum WAVs, appended after the blob's drums
    pub drum_dir: Option<PathBuf>,
    /// Device ring buffer length
    pub buffer_ms: u32,
    /// Upper bound for offline renders
    pub max_render_seconds: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            tuning: TuningSetting::Edo38,
            lookahead_seconds: et_engine::DEFAULT_LOOKAHEAD,
            tick_seconds: et_engine::DEFAULT_TICK_INTERVAL,
            octave_shift: 0,
            wavetable: None,
            wavetable_offset: 0,
            drum_dir: None,
            buffer_ms: 100,
            max_render_seconds: 600,
        }
    }
}

impl PlayerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, MasterError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. Relative resource paths resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, MasterError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(dir) = path.parent() {
            config.wavetable = config.wavetable.map(|p| dir.join(p));
            config.drum_dir = config.drum_dir.map(|p| dir.join(p));
        }
        Ok(config)
    }

    pub fn tuning_profile(&self) -> TuningProfile {
        self.tuning.into()
    }

    pub fn validate(&self) -> Result<(), MasterError> {
        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(MasterError::InvalidConfig(format!(
                "sample_rate {} outside 8000..=192000",
                self.sample_rate
            )));
        }
        if !(self.lookahead_seconds > 0.0 && self.tick_seconds > 0.0) {
            return Err(MasterError::InvalidConfig("scheduler timings must be positive".into()));
        }
        if self.tick_seconds > self.lookahead_seconds {
            return Err(MasterError::InvalidConfig(
                "tick_seconds must not exceed lookahead_seconds".into(),
            ));
        }
        Ok(())
    }
}
