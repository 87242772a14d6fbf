//! Format loaders for edotrack.
//!
//! Parses Standard MIDI files and Organya `.org` files into raw events,
//! folds them into a [`Song`] with [`NoteModelBuilder`], and reads the
//! companion wavetable and exported JSON projects.

mod builder;
mod midi_format;
mod org_format;
mod reader;
mod song_json;
mod wav_format;
mod wavetable;

use std::fmt;

use et_ir::{Song, SourceFormat, TuningProfile};
use thiserror::Error;

pub use builder::{gm_drum_slot, merge_tracks, NoteModelBuilder};
pub use midi_format::{parse_midi, MidiFile, MidiTrack, DEFAULT_TICKS_PER_QUARTER};
pub use org_format::{parse_org, InstrumentRecord, OrgEvent, OrgHeader, OrgSong, OrgTrack};
pub use reader::BinaryReader;
pub use song_json::{
    document_to_song, export_song, import_song, song_to_json, LoopBlock, NoteEntry, SongDocument,
    SONG_FILE_TYPE, SONG_FILE_VERSION,
};
pub use wav_format::{frames_to_wav, load_wav, write_wav};
pub use wavetable::{builtin_bank, load_drum_dir, load_wavetable, scan_riff_samples, WAVETABLE_BYTES};

/// Column of an Organya track's note data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Position,
    Key,
    Length,
    Volume,
    Pan,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Position => "position",
            Self::Key => "key",
            Self::Length => "length",
            Self::Volume => "volume",
            Self::Pan => "pan",
        })
    }
}

/// Error type for format parsing.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Bad magic bytes or a truncated fixed header
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),

    /// A chunk's declared length runs past the end of the buffer
    #[error("malformed track {track}: {reason}")]
    MalformedTrack { track: usize, reason: &'static str },

    /// A columnar track ended before its declared note count
    #[error("track {track} truncated in {column} column")]
    TruncatedColumn { track: usize, column: Column },

    /// Variable-length quantity longer than four bytes
    #[error("variable-length quantity exceeds 4 bytes at offset {offset}")]
    InvalidVarLen { offset: usize },

    /// Read past the end of the data
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// Unsupported or corrupt WAV data
    #[error("invalid WAV data: {0}")]
    InvalidWav(&'static str),

    /// Wavetable blob too short for the melodic waves
    #[error("wavetable needs {needed} bytes from offset, found {found}")]
    WavetableTruncated { needed: usize, found: usize },

    /// Import rejected: wrong file type or schema violation
    #[error("invalid song file: {0}")]
    InvalidSongFile(String),

    /// Bytes match no known song format
    #[error("unrecognized song format")]
    UnknownFormat,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options applied while turning file bytes into a song.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadOptions {
    pub tuning: TuningProfile,
    /// Octave shift applied to MIDI keys
    pub octave_shift: i32,
}

/// Guess the format from leading bytes.
pub fn detect_format(data: &[u8]) -> Option<SourceFormat> {
    if data.starts_with(b"MThd") {
        return Some(SourceFormat::EventList);
    }
    if data.starts_with(b"Org-") {
        return Some(SourceFormat::Columnar);
    }
    let first = data.iter().copied().find(|b| !b.is_ascii_whitespace());
    if first == Some(b'{') {
        return Some(SourceFormat::Json);
    }
    None
}

/// Parse any supported song file into a [`Song`].
pub fn load_song(data: &[u8], options: &LoadOptions) -> Result<Song, FormatError> {
    let builder = NoteModelBuilder::new(options.tuning).with_octave_shift(options.octave_shift);
    match detect_format(data).ok_or(FormatError::UnknownFormat)? {
        SourceFormat::EventList => Ok(builder.build_midi(&parse_midi(data)?)),
        SourceFormat::Columnar => Ok(builder.build_org(&parse_org(data)?)),
        SourceFormat::Json => {
            let text = std::str::from_utf8(data)
                .map_err(|_| FormatError::InvalidSongFile("not UTF-8".into()))?;
            import_song(text, options.tuning)
        }
    }
}
