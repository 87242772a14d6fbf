//! Equal-division-of-the-octave tuning profiles.
//!
//! A [`TuningMapper`] converts 12-tone chromatic pitches into step indices
//! of the active N-step division and back. Forward mapping is a table
//! lookup; reverse mapping picks the nearest table entry and reports the
//! residual so inexact steps can be displayed and exported.

use core::fmt;

/// Number of octaves covered by every profile (keys 0..N*8).
pub const NUM_OCTAVES: u8 = 8;

/// Largest deviation (in steps) reported for an inexact reverse mapping.
pub const MAX_DEVIATION_STEPS: i8 = 3;

/// Chromatic pitch class → step index, `round(pc * 38 / 12)`.
const EDO38_TABLE: [u16; 12] = [0, 3, 6, 10, 13, 16, 19, 22, 25, 29, 32, 35];

/// Chromatic pitch class → step index, `round(pc * 46 / 12)`.
const EDO46_TABLE: [u16; 12] = [0, 4, 8, 12, 15, 19, 23, 27, 31, 35, 38, 42];

const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A supported equal division of the octave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TuningProfile {
    /// 38 equal steps per octave
    #[default]
    Edo38,
    /// 46 equal steps per octave
    Edo46,
}

impl TuningProfile {
    /// Look up a profile by its step count.
    pub const fn from_steps(steps: u16) -> Option<Self> {
        match steps {
            38 => Some(Self::Edo38),
            46 => Some(Self::Edo46),
            _ => None,
        }
    }

    /// Steps in one octave.
    pub const fn steps_per_octave(self) -> u16 {
        match self {
            Self::Edo38 => 38,
            Self::Edo46 => 46,
        }
    }

    /// Total number of addressable keys.
    pub const fn key_count(self) -> u16 {
        self.steps_per_octave() * NUM_OCTAVES as u16
    }

    /// The 12-entry chromatic lookup table.
    pub const fn table(self) -> &'static [u16; 12] {
        match self {
            Self::Edo38 => &EDO38_TABLE,
            Self::Edo46 => &EDO46_TABLE,
        }
    }

    /// Short lowercase name (`edo38`, `edo46`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Edo38 => "edo38",
            Self::Edo46 => "edo46",
        }
    }
}

impl fmt::Display for TuningProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A chromatic pitch recovered from a step index.
///
/// `offset` is the signed number of steps between the step index and the
/// named chromatic pitch: positive means the step sits above it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChromaticPitch {
    /// 0 = C … 11 = B
    pub pitch_class: u8,
    /// Octave number (may be one past the last octave after wraparound)
    pub octave: u8,
    /// Residual deviation in steps, clamped to ±[`MAX_DEVIATION_STEPS`]
    pub offset: i8,
}

impl ChromaticPitch {
    /// True if the step maps exactly onto a 12-tone pitch.
    pub fn is_exact(&self) -> bool {
        self.offset == 0
    }

    /// Semitone index counted from C of octave 0.
    pub fn key12(&self) -> u16 {
        self.octave as u16 * 12 + self.pitch_class as u16
    }

    /// Pitch name without octave (`C#`).
    pub fn name(&self) -> &'static str {
        PITCH_NAMES[self.pitch_class as usize % 12]
    }
}

impl fmt::Display for ChromaticPitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.octave)?;
        let marker = if self.offset > 0 { '^' } else { 'v' };
        for _ in 0..self.offset.unsigned_abs() {
            write!(f, "{}", marker)?;
        }
        Ok(())
    }
}

/// Maps between 12-tone pitches and steps of the active tuning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TuningMapper {
    profile: TuningProfile,
}

impl TuningMapper {
    pub const fn new(profile: TuningProfile) -> Self {
        Self { profile }
    }

    pub const fn profile(&self) -> TuningProfile {
        self.profile
    }

    pub const fn steps_per_octave(&self) -> u16 {
        self.profile.steps_per_octave()
    }

    pub const fn key_count(&self) -> u16 {
        self.profile.key_count()
    }

    /// Highest valid step index.
    pub const fn max_step(&self) -> u16 {
        self.profile.key_count() - 1
    }

    /// Convert a chromatic pitch class + octave into a step index.
    ///
    /// The result is clamped to the valid key range, so octaves outside
    /// 0..8 saturate at the lowest or highest key.
    pub fn to_step(&self, pitch_class: u8, octave: i32) -> u16 {
        let n = self.steps_per_octave() as i32;
        let within = self.profile.table()[pitch_class as usize % 12] as i32;
        let raw = octave.saturating_mul(n).saturating_add(within);
        raw.clamp(0, self.max_step() as i32) as u16
    }

    /// Split a step into (octave, step within octave).
    pub fn split(&self, step: u16) -> (u16, u16) {
        let n = self.steps_per_octave();
        let step = step.min(self.max_step());
        (step / n, step % n)
    }

    /// Convert a step index back to the nearest chromatic pitch.
    ///
    /// Ties between the neighbour below and the neighbour above resolve
    /// toward the lower one. The neighbour above B is C of the next octave.
    pub fn to_chromatic(&self, step: u16) -> ChromaticPitch {
        let table = self.profile.table();
        let n = self.steps_per_octave();
        let (octave, within) = self.split(step);

        // table[0] == 0, so a lower neighbour always exists
        let lower_idx = table.iter().rposition(|&s| s <= within).unwrap_or(0);
        let lower = table[lower_idx];
        let down = within - lower;
        if down == 0 {
            return ChromaticPitch {
                pitch_class: lower_idx as u8,
                octave: octave as u8,
                offset: 0,
            };
        }

        let (upper_idx, upper, upper_octave) = if lower_idx + 1 < table.len() {
            (lower_idx + 1, table[lower_idx + 1], octave)
        } else {
            (0, n, octave + 1)
        };
        let up = upper - within;

        if down <= up {
            ChromaticPitch {
                pitch_class: lower_idx as u8,
                octave: octave as u8,
                offset: clamp_offset(down as i32),
            }
        } else {
            ChromaticPitch {
                pitch_class: upper_idx as u8,
                octave: upper_octave as u8,
                offset: clamp_offset(-(up as i32)),
            }
        }
    }

    /// Residual of a reverse mapping in cents.
    pub fn offset_cents(&self, pitch: &ChromaticPitch) -> f32 {
        pitch.offset as f32 * 1200.0 / self.steps_per_octave() as f32
    }

    /// Continuous 12-tone key position of a step (C-0 = 0.0).
    pub fn key12_position(&self, step: u16) -> f64 {
        step.min(self.max_step()) as f64 * 12.0 / self.steps_per_octave() as f64
    }
}

fn clamp_offset(steps: i32) -> i8 {
    steps.clamp(-(MAX_DEVIATION_STEPS as i32), MAX_DEVIATION_STEPS as i32) as i8
}
