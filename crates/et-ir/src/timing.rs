//! Tempo conversions.

/// Tempo used when a file carries no tempo of its own.
pub const DEFAULT_BPM: f64 = 120.0;

/// Convert a MIDI tempo (microseconds per quarter note) to BPM.
///
/// A zero tempo is meaningless and falls back to [`DEFAULT_BPM`].
pub fn micros_to_bpm(micros_per_quarter: u32) -> f64 {
    if micros_per_quarter == 0 {
        return DEFAULT_BPM;
    }
    60_000_000.0 / micros_per_quarter as f64
}

/// Convert an Organya wait value (milliseconds per tick) to BPM.
pub fn wait_to_bpm(wait_ms: u16, ticks_per_beat: u16) -> f64 {
    let denom = wait_ms as f64 * ticks_per_beat.max(1) as f64;
    if denom <= 0.0 {
        return DEFAULT_BPM;
    }
    60_000.0 / denom
}

/// Tempo plus the tick resolution it applies to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tempo {
    pub bpm: f64,
    pub ticks_per_beat: u16,
}

impl Tempo {
    pub fn new(bpm: f64, ticks_per_beat: u16) -> Self {
        Self {
            bpm: if bpm > 0.0 { bpm } else { DEFAULT_BPM },
            ticks_per_beat: ticks_per_beat.max(1),
        }
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn seconds_per_tick(&self) -> f64 {
        self.seconds_per_beat() / self.ticks_per_beat as f64
    }

    pub fn ticks_to_seconds(&self, ticks: u32) -> f64 {
        ticks as f64 * self.seconds_per_tick()
    }

    /// Fractional tick position of a span of seconds.
    pub fn seconds_to_ticks(&self, seconds: f64) -> f64 {
        seconds / self.seconds_per_tick()
    }
}
