//! Raw events produced by the format parsers.

/// A decoded event, before note pairing.
///
/// Both file formats are flattened into this shape. `time` is in absolute
/// ticks from the start of the owning track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    /// Absolute tick
    pub time: u32,
    /// Source track (chunk index or column slot)
    pub track: u16,
    /// MIDI channel 0-15; always 0 for columnar tracks
    pub channel: u8,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn new(time: u32, track: u16, channel: u8, kind: RawEventKind) -> Self {
        Self {
            time,
            track,
            channel,
            kind,
        }
    }

    /// Ordering rank among events sharing a tick.
    ///
    /// Controls and meta events come first so that a program change is
    /// visible to a note-on at the same tick on any track. Note-ons and
    /// note-offs share a rank: within a track they keep file order, so a
    /// same-tick on/off pair still pairs up.
    pub fn rank(&self) -> u8 {
        match self.kind {
            RawEventKind::Tempo { .. }
            | RawEventKind::TimeSignature { .. }
            | RawEventKind::ProgramChange { .. }
            | RawEventKind::ControlChange { .. } => 0,
            RawEventKind::NoteOn { .. } | RawEventKind::NoteOff { .. } => 1,
            RawEventKind::AutomationVolume { .. } | RawEventKind::AutomationPan { .. } => 2,
            RawEventKind::EndOfTrack => 3,
        }
    }
}

/// What a raw event does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawEventKind {
    /// Key press. Columnar tracks also carry their pan byte and length.
    NoteOn {
        key: u8,
        velocity: u8,
        pan: Option<u8>,
        length: Option<u32>,
    },
    NoteOff {
        key: u8,
    },
    ProgramChange {
        program: u8,
    },
    ControlChange {
        controller: u8,
        value: u8,
    },
    /// Microseconds per quarter note
    Tempo {
        micros_per_quarter: u32,
    },
    /// Denominator is stored as a power of two (3 = eighth notes)
    TimeSignature {
        numerator: u8,
        denominator_pow2: u8,
    },
    /// Volume change on whatever note is sounding
    AutomationVolume {
        volume: u8,
    },
    /// Pan change on whatever note is sounding
    AutomationPan {
        pan: u8,
    },
    EndOfTrack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_sort_before_notes_and_notes_share_a_rank() {
        let on = RawEvent::new(0, 1, 0, RawEventKind::NoteOn { key: 60, velocity: 100, pan: None, length: None });
        let pc = RawEvent::new(0, 2, 0, RawEventKind::ProgramChange { program: 5 });
        let off = RawEvent::new(0, 0, 0, RawEventKind::NoteOff { key: 60 });
        assert!(pc.rank() < off.rank());
        assert_eq!(off.rank(), on.rank());
    }
}
