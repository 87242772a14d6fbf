//! Non-fatal anomalies recovered while loading or playing a song.

use alloc::vec::Vec;
use core::fmt;

use crate::note::InstrumentId;

/// A recovered anomaly. None of these abort a load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// SMPTE time division; the given ticks-per-quarter was substituted
    SmpteDivision { substituted: u16 },
    /// No tempo event; 120 BPM assumed
    NoTempo,
    /// No time signature event; 4/4 assumed
    NoTimeSignature,
    /// A tempo event after the first was ignored
    ExtraTempoChange { tick: u32 },
    /// A time signature after the first was ignored
    ExtraTimeSignature { tick: u32 },
    /// Note-off with no matching note-on
    OrphanNoteOff { track: u16, channel: u8, key: u8, tick: u32 },
    /// Note-on never released; flushed with a one-beat duration
    UnterminatedNote { track: u16, channel: u8, key: u8, tick: u32 },
    /// Program change on a channel whose instrument was already claimed
    IgnoredProgramChange { track: u16, channel: u8, program: u8, tick: u32 },
    /// Automation event with no sounding note on its track
    DiscardedAutomation { track: u16, tick: u32 },
    /// No sample loaded for the instrument; a fallback was used or the note skipped
    NoSampleForInstrument { instrument: InstrumentId },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmpteDivision { substituted } => {
                write!(f, "SMPTE division not supported, using {} ticks per quarter", substituted)
            }
            Self::NoTempo => f.write_str("no tempo found, assuming 120 BPM"),
            Self::NoTimeSignature => f.write_str("no time signature found, assuming 4/4"),
            Self::ExtraTempoChange { tick } => write!(f, "tempo change at tick {} ignored", tick),
            Self::ExtraTimeSignature { tick } => {
                write!(f, "time signature change at tick {} ignored", tick)
            }
            Self::OrphanNoteOff { track, channel, key, tick } => write!(
                f,
                "note-off without note-on (track {}, channel {}, key {}, tick {})",
                track, channel, key, tick
            ),
            Self::UnterminatedNote { track, channel, key, tick } => write!(
                f,
                "unterminated note (track {}, channel {}, key {}, tick {})",
                track, channel, key, tick
            ),
            Self::IgnoredProgramChange { track, channel, program, tick } => write!(
                f,
                "program change to {} ignored (track {}, channel {}, tick {})",
                program, track, channel, tick
            ),
            Self::DiscardedAutomation { track, tick } => {
                write!(f, "automation outside any note (track {}, tick {})", track, tick)
            }
            Self::NoSampleForInstrument { instrument } => {
                write!(f, "no sample for instrument {}", instrument)
            }
        }
    }
}

/// Diagnostics collected during one load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: &Diagnostics) {
        self.entries.extend_from_slice(&other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries matching `pred`.
    pub fn count(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.entries.iter().filter(|d| pred(d)).count()
    }

    pub fn contains(&self, diagnostic: &Diagnostic) -> bool {
        self.entries.contains(diagnostic)
    }

    pub fn unterminated_notes(&self) -> usize {
        self.count(|d| matches!(d, Diagnostic::UnterminatedNote { .. }))
    }

    pub fn orphan_note_offs(&self) -> usize {
        self.count(|d| matches!(d, Diagnostic::OrphanNoteOff { .. }))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}
