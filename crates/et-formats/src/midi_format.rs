//! Standard MIDI File parser.
//!
//! Decodes the `MThd` header and every `MTrk` chunk into absolute-time
//! [`RawEvent`]s. Only what is needed to recover notes, programs, pan,
//! tempo and time signature is kept; everything else is skipped.

use et_ir::{Diagnostic, Diagnostics, RawEvent, RawEventKind};
use tracing::{debug, warn};

use crate::reader::BinaryReader;
use crate::FormatError;

/// Ticks per quarter substituted for SMPTE divisions.
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 480;

const META_TRACK_NAME: u8 = 0x03;
const META_END_OF_TRACK: u8 = 0x2F;
const META_TEMPO: u8 = 0x51;
const META_TIME_SIGNATURE: u8 = 0x58;

/// Data byte count for channel messages, indexed by `status >> 4` - 8.
const CHANNEL_PAYLOAD: [usize; 7] = [2, 2, 2, 2, 1, 1, 2];

/// A parsed MIDI file.
#[derive(Clone, Debug, PartialEq)]
pub struct MidiFile {
    /// Header format word (0, 1 or 2)
    pub format: u16,
    pub ticks_per_quarter: u16,
    pub tracks: Vec<MidiTrack>,
    pub diagnostics: Diagnostics,
}

/// Events of one `MTrk` chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiTrack {
    /// Sequence/track name meta event, if any
    pub name: Option<String>,
    pub events: Vec<RawEvent>,
}

/// Parse a MIDI file from raw bytes.
pub fn parse_midi(data: &[u8]) -> Result<MidiFile, FormatError> {
    let mut r = BinaryReader::new(data);
    let mut diagnostics = Diagnostics::new();

    let header_err = |_| FormatError::MalformedHeader("header chunk truncated");
    let tag = r.read_tag().map_err(header_err)?;
    if &tag != b"MThd" {
        return Err(FormatError::MalformedHeader("missing MThd tag"));
    }
    let header_len = r.read_u32_be().map_err(header_err)? as usize;
    if header_len < 6 {
        return Err(FormatError::MalformedHeader("header chunk shorter than 6 bytes"));
    }
    let format = r.read_u16_be().map_err(header_err)?;
    let declared_tracks = r.read_u16_be().map_err(header_err)?;
    let division = r.read_u16_be().map_err(header_err)?;
    r.skip(header_len - 6).map_err(header_err)?;

    let ticks_per_quarter = if division & 0x8000 != 0 {
        warn!(division, "SMPTE time division not supported, substituting default");
        diagnostics.push(Diagnostic::SmpteDivision {
            substituted: DEFAULT_TICKS_PER_QUARTER,
        });
        DEFAULT_TICKS_PER_QUARTER
    } else if division == 0 {
        return Err(FormatError::MalformedHeader("zero ticks per quarter note"));
    } else {
        division
    };

    let mut tracks = Vec::with_capacity(declared_tracks as usize);
    let mut chunk_index = 0usize;
    while r.remaining() >= 8 {
        let tag = r.read_tag()?;
        let len = r.read_u32_be()? as usize;
        let body = r.read_bytes(len).map_err(|_| FormatError::MalformedTrack {
            track: chunk_index,
            reason: "chunk length runs past end of file",
        })?;
        if &tag == b"MTrk" {
            tracks.push(parse_track(body, tracks.len() as u16)?);
        } else {
            debug!(tag = ?String::from_utf8_lossy(&tag), len, "skipping unknown chunk");
        }
        chunk_index += 1;
    }
    if !r.is_empty() {
        debug!(bytes = r.remaining(), "ignoring trailing bytes");
    }
    if tracks.len() != declared_tracks as usize {
        debug!(declared = declared_tracks, found = tracks.len(), "track count mismatch");
    }

    Ok(MidiFile {
        format,
        ticks_per_quarter,
        tracks,
        diagnostics,
    })
}

fn parse_track(body: &[u8], index: u16) -> Result<MidiTrack, FormatError> {
    let mut r = BinaryReader::new(body);
    let mut track = MidiTrack::default();
    let mut time: u32 = 0;
    let mut running: Option<u8> = None;

    while !r.is_empty() {
        match read_event(&mut r, index, &mut time, &mut running, &mut track) {
            Ok(true) => {}
            Ok(false) => break,
            Err(FormatError::UnexpectedEof { offset }) => {
                warn!(track = index, offset, "event runs past end of track chunk");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(track)
}

/// Decode one delta-time + event. Returns `Ok(false)` at end-of-track.
fn read_event(
    r: &mut BinaryReader,
    index: u16,
    time: &mut u32,
    running: &mut Option<u8>,
    track: &mut MidiTrack,
) -> Result<bool, FormatError> {
    let delta = r.read_varlen()?;
    *time = time.saturating_add(delta);

    let first = r.peek_u8()?;
    let status = if first & 0x80 != 0 {
        r.read_u8()?;
        first
    } else {
        match *running {
            Some(status) => status,
            None => {
                debug!(track = index, offset = r.position(), "data byte without running status");
                r.read_u8()?;
                return Ok(true);
            }
        }
    };

    match status {
        0x80..=0xEF => {
            *running = Some(status);
            let kind = read_channel_message(r, status)?;
            if let Some(kind) = kind {
                track.events.push(RawEvent::new(*time, index, status & 0x0F, kind));
            }
        }
        0xFF => {
            let meta_type = r.read_u8()?;
            let len = r.read_varlen()? as usize;
            let payload = r.read_bytes(len)?;
            match meta_type {
                META_END_OF_TRACK => {
                    track.events.push(RawEvent::new(*time, index, 0, RawEventKind::EndOfTrack));
                    return Ok(false);
                }
                META_TEMPO if len >= 3 => {
                    let micros = BinaryReader::new(payload).read_u24_be()?;
                    track.events.push(RawEvent::new(
                        *time,
                        index,
                        0,
                        RawEventKind::Tempo {
                            micros_per_quarter: micros,
                        },
                    ));
                }
                META_TIME_SIGNATURE if len >= 2 => {
                    track.events.push(RawEvent::new(
                        *time,
                        index,
                        0,
                        RawEventKind::TimeSignature {
                            numerator: payload[0],
                            denominator_pow2: payload[1],
                        },
                    ));
                }
                META_TRACK_NAME if track.name.is_none() => {
                    track.name = Some(String::from_utf8_lossy(payload).trim().to_string());
                }
                _ => {}
            }
        }
        0xF0 | 0xF7 => {
            let len = r.read_varlen()? as usize;
            r.skip(len)?;
        }
        // System common messages carry fixed payloads
        0xF2 => r.skip(2)?,
        0xF1 | 0xF3 => r.skip(1)?,
        _ => {}
    }
    Ok(true)
}

fn read_channel_message(r: &mut BinaryReader, status: u8) -> Result<Option<RawEventKind>, FormatError> {
    let opcode = status >> 4;
    let payload = CHANNEL_PAYLOAD[(opcode - 8) as usize];
    let a = r.read_u8()? & 0x7F;
    let b = if payload == 2 { r.read_u8()? & 0x7F } else { 0 };

    Ok(match opcode {
        0x8 => Some(RawEventKind::NoteOff { key: a }),
        0x9 if b == 0 => Some(RawEventKind::NoteOff { key: a }),
        0x9 => Some(RawEventKind::NoteOn {
            key: a,
            velocity: b,
            pan: None,
            length: None,
        }),
        0xB => Some(RawEventKind::ControlChange {
            controller: a,
            value: b,
        }),
        0xC => Some(RawEventKind::ProgramChange { program: a }),
        _ => None,
    })
}
