//! Note model: the unit the playback engine schedules.

use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

/// Which sample family a note plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstrumentId {
    /// One of the 100 single-cycle melodic waveforms
    Melodic(u8),
    /// A one-shot percussion sample slot
    Percussion(u8),
}

impl InstrumentId {
    pub fn is_percussion(&self) -> bool {
        matches!(self, Self::Percussion(_))
    }

    /// Slot index within its family.
    pub fn index(&self) -> u8 {
        match self {
            Self::Melodic(i) | Self::Percussion(i) => *i,
        }
    }
}

impl Default for InstrumentId {
    fn default() -> Self {
        Self::Melodic(0)
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Melodic(i) => write!(f, "wave:{}", i),
            Self::Percussion(i) => write!(f, "drum:{}", i),
        }
    }
}

/// Error returned when an instrument string is not `wave:N` or `drum:N`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseInstrumentError;

impl fmt::Display for ParseInstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected instrument of the form wave:N or drum:N")
    }
}

impl FromStr for InstrumentId {
    type Err = ParseInstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, index) = s.split_once(':').ok_or(ParseInstrumentError)?;
        let index: u8 = index.trim().parse().map_err(|_| ParseInstrumentError)?;
        match family.trim() {
            "wave" => Ok(Self::Melodic(index)),
            "drum" => Ok(Self::Percussion(index)),
            _ => Err(ParseInstrumentError),
        }
    }
}

/// Whether a melodic voice loops its waveform forever or a bounded
/// number of times ("pipi").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoopMode {
    #[default]
    Infinite,
    /// Loop count multiplier applied to the per-octave cycle table
    Finite(u8),
}

impl LoopMode {
    /// Decode the legacy single-byte encoding (0 = infinite).
    pub const fn from_pipi(raw: u8) -> Self {
        if raw == 0 {
            Self::Infinite
        } else {
            Self::Finite(raw)
        }
    }

    /// Encode back to the legacy single byte.
    pub const fn to_pipi(self) -> u8 {
        match self {
            Self::Infinite => 0,
            Self::Finite(n) => n,
        }
    }
}

/// A volume or pan change at a tick offset from the note start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AutomationPoint {
    /// Ticks after `Note::start_ticks`
    pub tick: u32,
    /// Volume 0..127 or pan -100..100
    pub value: i16,
}

impl AutomationPoint {
    pub const fn new(tick: u32, value: i16) -> Self {
        Self { tick, value }
    }
}

/// A single note in the song.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Note {
    /// Absolute start in song ticks
    pub start_ticks: u32,
    /// Length in ticks, always > 0
    pub duration_ticks: u32,
    /// Step index under the song's tuning
    pub pitch_step: u16,
    /// 0..127
    pub velocity: u8,
    /// -100 (left) .. 100 (right)
    pub pan: i8,
    pub instrument: InstrumentId,
    /// Owning track index (see `Song::tracks`)
    pub track: u8,
    pub loop_mode: LoopMode,
    pub volume_automation: Vec<AutomationPoint>,
    pub pan_automation: Vec<AutomationPoint>,
    /// Signed fine-tune added to the melodic buffer rate
    pub freq_adjust: i16,
}

impl Note {
    /// Create a note with centre pan, velocity 100 and no automation.
    pub fn new(start_ticks: u32, duration_ticks: u32, pitch_step: u16, instrument: InstrumentId) -> Self {
        Self {
            start_ticks,
            duration_ticks: duration_ticks.max(1),
            pitch_step,
            velocity: 100,
            pan: 0,
            instrument,
            track: 0,
            loop_mode: LoopMode::Infinite,
            volume_automation: Vec::new(),
            pan_automation: Vec::new(),
            freq_adjust: 0,
        }
    }

    /// Exclusive end tick.
    pub fn end_ticks(&self) -> u32 {
        self.start_ticks.saturating_add(self.duration_ticks)
    }

    /// True if `tick` falls in `[start, end)`.
    pub fn contains_tick(&self, tick: u32) -> bool {
        tick >= self.start_ticks && tick < self.end_ticks()
    }

    /// Record a volume change at absolute `tick`. Returns false if the tick
    /// is outside the note.
    pub fn push_volume_point(&mut self, tick: u32, volume: u8) -> bool {
        if !self.contains_tick(tick) {
            return false;
        }
        push_point(&mut self.volume_automation, tick - self.start_ticks, volume.min(127) as i16);
        true
    }

    /// Record a pan change at absolute `tick`. Returns false if the tick
    /// is outside the note.
    pub fn push_pan_point(&mut self, tick: u32, pan: i8) -> bool {
        if !self.contains_tick(tick) {
            return false;
        }
        push_point(&mut self.pan_automation, tick - self.start_ticks, pan.clamp(-100, 100) as i16);
        true
    }

    /// True if both automation lanes are strictly increasing and inside the note.
    pub fn automation_is_well_formed(&self) -> bool {
        let lane_ok = |lane: &[AutomationPoint]| {
            lane.windows(2).all(|w| w[0].tick < w[1].tick)
                && lane.last().map_or(true, |p| p.tick < self.duration_ticks)
        };
        lane_ok(&self.volume_automation) && lane_ok(&self.pan_automation)
    }
}

/// Append keeping ticks strictly increasing; a repeat tick overwrites.
fn push_point(lane: &mut Vec<AutomationPoint>, tick: u32, value: i16) {
    match lane.last_mut() {
        Some(last) if last.tick == tick => last.value = value,
        Some(last) if last.tick > tick => {
            let pos = lane.partition_point(|p| p.tick < tick);
            if lane[pos].tick == tick {
                lane[pos].value = value;
            } else {
                lane.insert(pos, AutomationPoint::new(tick, value));
            }
        }
        _ => lane.push(AutomationPoint::new(tick, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn instrument_string_round_trip() {
        for id in [InstrumentId::Melodic(42), InstrumentId::Percussion(3)] {
            assert_eq!(id.to_string().parse::<InstrumentId>(), Ok(id));
        }
        assert!("flute:1".parse::<InstrumentId>().is_err());
        assert!("wave:300".parse::<InstrumentId>().is_err());
    }

    #[test]
    fn pipi_zero_is_infinite() {
        assert_eq!(LoopMode::from_pipi(0), LoopMode::Infinite);
        assert_eq!(LoopMode::from_pipi(1), LoopMode::Finite(1));
        assert_eq!(LoopMode::Finite(1).to_pipi(), 1);
    }

    #[test]
    fn duration_is_never_zero() {
        let note = Note::new(10, 0, 0, InstrumentId::Melodic(0));
        assert_eq!(note.duration_ticks, 1);
        assert_eq!(note.end_ticks(), 11);
    }

    #[test]
    fn automation_outside_span_is_rejected() {
        let mut note = Note::new(10, 5, 0, InstrumentId::Melodic(0));
        assert!(!note.push_volume_point(9, 10));
        assert!(!note.push_volume_point(15, 10));
        assert!(note.push_volume_point(14, 10));
        assert_eq!(note.volume_automation, [AutomationPoint::new(4, 10)]);
    }

    #[test]
    fn automation_stays_strictly_increasing() {
        let mut note = Note::new(0, 20, 0, InstrumentId::Melodic(0));
        note.push_pan_point(5, 10);
        note.push_pan_point(5, 20);
        note.push_pan_point(2, -30);
        note.push_pan_point(8, 40);
        let ticks: Vec<u32> = note.pan_automation.iter().map(|p| p.tick).collect();
        assert_eq!(ticks, [2, 5, 8]);
        assert_eq!(note.pan_automation[1].value, 20);
        assert!(note.automation_is_well_formed());
    }
}
