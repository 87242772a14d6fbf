//! Organya (`.org`) tracker format parser.
//!
//! Layout: an 18-byte header, 16 six-byte instrument records, then for
//! each track with notes five parallel columns (positions, keys, lengths,
//! volumes, pans). Tracks 0-7 are melodic, 8-15 percussion.

use std::io::Cursor;

use binrw::BinRead;
use et_ir::{wait_to_bpm, RawEvent, RawEventKind};

use crate::reader::BinaryReader;
use crate::{Column, FormatError};

pub const TRACK_COUNT: usize = 16;
/// First percussion track slot.
pub const FIRST_DRUM_TRACK: usize = 8;
/// Key/volume/pan value meaning "no change".
pub const NO_CHANGE: u8 = 255;
/// Volume a track starts at before any event sets it.
pub const DEFAULT_VOLUME: u8 = 200;
/// Centre pan (0 = left, 12 = right).
pub const DEFAULT_PAN: u8 = 6;

const HEADER_BYTES: usize = 18;
const INSTRUMENT_BYTES: usize = 6;
const VERSION_TAGS: [&[u8; 6]; 3] = [b"Org-01", b"Org-02", b"Org-03"];

/// Fixed file header.
#[derive(BinRead, Clone, Copy, Debug, PartialEq, Eq)]
#[br(little)]
pub struct OrgHeader {
    pub tag: [u8; 6],
    /// Milliseconds per tick
    pub wait: u16,
    pub beats_per_bar: u8,
    /// Ticks per beat
    pub steps_per_beat: u8,
    /// Loop start in ticks
    pub loop_start: u32,
    /// Loop end in ticks
    pub loop_end: u32,
}

/// Per-track instrument record.
#[derive(BinRead, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[br(little)]
pub struct InstrumentRecord {
    /// Frequency fine-tune, 1000 = neutral
    pub pitch: u16,
    /// Wave number (melodic) or drum number (percussion)
    pub instrument: u8,
    /// Non-zero limits melodic notes to a finite loop count
    pub pipi: u8,
    pub note_count: u16,
}

#[derive(BinRead)]
#[br(little)]
struct OrgPrelude {
    header: OrgHeader,
    instruments: [InstrumentRecord; TRACK_COUNT],
}

/// One column entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrgEvent {
    pub position: u32,
    /// 0-95, or [`NO_CHANGE`] for an automation-only event
    pub key: u8,
    pub length: u8,
    pub volume: u8,
    pub pan: u8,
}

impl OrgEvent {
    pub fn is_automation(&self) -> bool {
        self.key == NO_CHANGE
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrgTrack {
    pub index: u8,
    pub events: Vec<OrgEvent>,
}

impl OrgTrack {
    pub fn is_percussion(&self) -> bool {
        self.index as usize >= FIRST_DRUM_TRACK
    }
}

/// A parsed Organya file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrgSong {
    pub header: OrgHeader,
    pub instruments: [InstrumentRecord; TRACK_COUNT],
    /// Always 16 entries, one per slot
    pub tracks: Vec<OrgTrack>,
}

impl OrgSong {
    pub fn ticks_per_beat(&self) -> u16 {
        self.header.steps_per_beat as u16
    }

    /// `60000 / (wait * ticks_per_beat)`
    pub fn effective_bpm(&self) -> f64 {
        wait_to_bpm(self.header.wait, self.ticks_per_beat())
    }

    /// Flatten one track into raw events.
    ///
    /// Volume and pan carry across events: a note-on whose volume or pan is
    /// [`NO_CHANGE`] uses the track's last value. Automation-only events
    /// emit a change only for fields that are not [`NO_CHANGE`].
    pub fn track_events(&self, track: usize) -> Vec<RawEvent> {
        let Some(t) = self.tracks.get(track) else {
            return Vec::new();
        };
        let index = t.index as u16;
        let mut volume = DEFAULT_VOLUME;
        let mut pan = DEFAULT_PAN;
        let mut out = Vec::with_capacity(t.events.len());

        for ev in &t.events {
            if ev.volume != NO_CHANGE {
                volume = ev.volume;
            }
            if ev.pan != NO_CHANGE {
                pan = ev.pan;
            }
            if ev.is_automation() {
                if ev.volume != NO_CHANGE {
                    out.push(RawEvent::new(ev.position, index, 0, RawEventKind::AutomationVolume { volume }));
                }
                if ev.pan != NO_CHANGE {
                    out.push(RawEvent::new(ev.position, index, 0, RawEventKind::AutomationPan { pan }));
                }
            } else {
                out.push(RawEvent::new(
                    ev.position,
                    index,
                    0,
                    RawEventKind::NoteOn {
                        key: ev.key,
                        velocity: volume,
                        pan: Some(pan),
                        length: Some(ev.length as u32),
                    },
                ));
            }
        }
        out
    }
}

/// Parse an Organya file from raw bytes.
pub fn parse_org(data: &[u8]) -> Result<OrgSong, FormatError> {
    if data.len() < HEADER_BYTES {
        return Err(FormatError::MalformedHeader("header truncated"));
    }
    if !VERSION_TAGS.iter().any(|tag| data.starts_with(&tag[..])) {
        return Err(FormatError::MalformedHeader("missing Org-0x tag"));
    }
    if data.len() < HEADER_BYTES + INSTRUMENT_BYTES * TRACK_COUNT {
        return Err(FormatError::MalformedHeader("instrument table truncated"));
    }

    let mut cursor = Cursor::new(data);
    let prelude = OrgPrelude::read(&mut cursor)
        .map_err(|_| FormatError::MalformedHeader("unreadable header"))?;
    let header = prelude.header;
    if header.wait == 0 {
        return Err(FormatError::MalformedHeader("zero wait"));
    }
    if header.steps_per_beat == 0 || header.beats_per_bar == 0 {
        return Err(FormatError::MalformedHeader("zero beat subdivision"));
    }

    let mut r = BinaryReader::new(data);
    r.skip(cursor.position() as usize)?;

    let mut tracks = Vec::with_capacity(TRACK_COUNT);
    for (i, inst) in prelude.instruments.iter().enumerate() {
        let count = inst.note_count as usize;
        let mut positions = Vec::with_capacity(count);
        for _ in 0..count {
            positions.push(r.read_u32_le().map_err(truncated(i, Column::Position))?);
        }
        let keys = r.read_bytes(count).map_err(truncated(i, Column::Key))?;
        let lengths = r.read_bytes(count).map_err(truncated(i, Column::Length))?;
        let volumes = r.read_bytes(count).map_err(truncated(i, Column::Volume))?;
        let pans = r.read_bytes(count).map_err(truncated(i, Column::Pan))?;

        let events = (0..count)
            .map(|n| OrgEvent {
                position: positions[n],
                key: keys[n],
                length: lengths[n],
                volume: volumes[n],
                pan: pans[n],
            })
            .collect();
        tracks.push(OrgTrack {
            index: i as u8,
            events,
        });
    }

    Ok(OrgSong {
        header,
        instruments: prelude.instruments,
        tracks,
    })
}

fn truncated(track: usize, column: Column) -> impl FnOnce(FormatError) -> FormatError {
    move |_| FormatError::TruncatedColumn { track, column }
}
