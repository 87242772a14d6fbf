//! The loaded song: notes plus the timing context needed to play them.

use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use arrayvec::ArrayString;

use crate::diagnostics::Diagnostics;
use crate::note::Note;
use crate::timing::{Tempo, DEFAULT_BPM};
use crate::tuning::TuningProfile;

/// Which loader produced the song.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceFormat {
    /// Standard MIDI file
    #[default]
    EventList,
    /// Organya tracker file
    Columnar,
    /// Exported JSON project
    Json,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EventList => "midi",
            Self::Columnar => "organya",
            Self::Json => "json",
        })
    }
}

/// Musical meter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Note value of one beat (4 = quarter)
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Loop bounds in measures. `end_measure` is exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopRegion {
    pub enabled: bool,
    pub start_measure: u32,
    pub end_measure: u32,
}

impl LoopRegion {
    pub fn new(enabled: bool, start_measure: u32, end_measure: u32) -> Self {
        Self {
            enabled,
            start_measure,
            end_measure,
        }
    }

    /// True if the region is enabled and spans at least one measure.
    pub fn is_active(&self) -> bool {
        self.enabled && self.end_measure > self.start_measure
    }
}

/// Per-track metadata. Notes refer to tracks by index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackInfo {
    pub index: u8,
    pub name: ArrayString<16>,
    pub percussion: bool,
}

impl TrackInfo {
    pub fn new(index: u8, percussion: bool) -> Self {
        let mut name = ArrayString::new();
        let label = if percussion { "Drum" } else { "Track" };
        // "Track 255" fits in 16 bytes
        let _ = fmt::write(&mut name, format_args!("{} {}", label, index));
        Self {
            index,
            name,
            percussion,
        }
    }
}

/// A complete song ready for playback.
#[derive(Clone, Debug)]
pub struct Song {
    pub title: ArrayString<32>,
    pub format: SourceFormat,
    /// Tuning the pitch steps were mapped under
    pub tuning: TuningProfile,
    pub bpm: f64,
    pub ticks_per_beat: u16,
    pub time_signature: TimeSignature,
    pub loop_region: LoopRegion,
    pub tracks: Vec<TrackInfo>,
    /// Sorted by start tick
    pub notes: Vec<Note>,
    pub diagnostics: Diagnostics,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            format: SourceFormat::default(),
            tuning: TuningProfile::default(),
            bpm: DEFAULT_BPM,
            ticks_per_beat: 480,
            time_signature: TimeSignature::default(),
            loop_region: LoopRegion::default(),
            tracks: Vec::new(),
            notes: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }
}

impl Song {
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        for c in title.chars() {
            if song.title.try_push(c).is_err() {
                break;
            }
        }
        song
    }

    pub fn tempo(&self) -> Tempo {
        Tempo::new(self.bpm, self.ticks_per_beat)
    }

    /// Ticks in one measure. A beat is `ticks_per_beat` quarter-note ticks
    /// scaled by the signature's denominator.
    pub fn ticks_per_measure(&self) -> u32 {
        let ts = self.time_signature;
        let ticks = self.ticks_per_beat as u32 * ts.numerator.max(1) as u32 * 4
            / ts.denominator.max(1) as u32;
        ticks.max(1)
    }

    /// Ticks in one beat of the time signature.
    pub fn ticks_per_signature_beat(&self) -> f64 {
        self.ticks_per_measure() as f64 / self.time_signature.numerator.max(1) as f64
    }

    pub fn measure_start_tick(&self, measure: u32) -> u32 {
        measure.saturating_mul(self.ticks_per_measure())
    }

    pub fn measure_of_tick(&self, tick: u32) -> u32 {
        tick / self.ticks_per_measure()
    }

    /// Exclusive end of the last note.
    pub fn end_tick(&self) -> u32 {
        self.notes.iter().map(Note::end_ticks).max().unwrap_or(0)
    }

    /// Number of measures needed to hold every note.
    pub fn measure_count(&self) -> u32 {
        self.end_tick().div_ceil(self.ticks_per_measure())
    }

    pub fn seconds_per_measure(&self) -> f64 {
        self.tempo().ticks_to_seconds(self.ticks_per_measure())
    }

    /// Indices of notes whose start falls in `[start, end)`.
    pub fn notes_starting_in(&self, start: u32, end: u32) -> Range<usize> {
        let lo = self.notes.partition_point(|n| n.start_ticks < start);
        let hi = self.notes.partition_point(|n| n.start_ticks < end);
        lo..hi.max(lo)
    }

    /// Restore start-tick order after notes were added or edited.
    pub fn sort_notes(&mut self) {
        self.notes.sort_by_key(|n| n.start_ticks);
    }

    pub fn track_by_name(&self, name: &str) -> Option<&TrackInfo> {
        self.tracks.iter().find(|t| t.name.as_str() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::InstrumentId;
    use alloc::string::ToString;

    fn song_with_notes(starts: &[u32]) -> Song {
        let mut song = Song::new("test");
        song.ticks_per_beat = 4;
        for &s in starts {
            song.notes.push(Note::new(s, 4, 0, InstrumentId::Melodic(0)));
        }
        song.sort_notes();
        song
    }

    #[test]
    fn measure_length_follows_signature() {
        let mut song = Song::default();
        assert_eq!(song.ticks_per_measure(), 1920);
        song.time_signature = TimeSignature { numerator: 6, denominator: 8 };
        assert_eq!(song.ticks_per_measure(), 1440);
        assert_eq!(song.time_signature.to_string(), "6/8");
    }

    #[test]
    fn notes_in_range_uses_start_tick() {
        let song = song_with_notes(&[0, 3, 16, 17, 40]);
        assert_eq!(song.notes_starting_in(0, 16), 0..2);
        assert_eq!(song.notes_starting_in(16, 32), 2..4);
        assert_eq!(song.notes_starting_in(32, 48), 4..5);
        assert!(song.notes_starting_in(48, 64).is_empty());
    }

    #[test]
    fn measure_count_rounds_up() {
        let song = song_with_notes(&[0, 40]);
        // 16 ticks per measure, last note ends at 44
        assert_eq!(song.end_tick(), 44);
        assert_eq!(song.measure_count(), 3);
        assert!(Song::default().measure_count() == 0);
    }

    #[test]
    fn track_names() {
        assert_eq!(TrackInfo::new(3, false).name.as_str(), "Track 3");
        assert_eq!(TrackInfo::new(9, true).name.as_str(), "Drum 9");
    }

    #[test]
    fn loop_region_requires_span() {
        assert!(!LoopRegion::new(true, 2, 2).is_active());
        assert!(LoopRegion::new(true, 0, 2).is_active());
        assert!(!LoopRegion::new(false, 0, 2).is_active());
    }
}
