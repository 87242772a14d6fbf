//! Core IR types for edotrack.
//!
//! This crate defines the tuning-independent note model shared by the
//! format parsers and the playback engine. Parsers emit [`RawEvent`]s
//! which are folded into a [`Song`]; the engine consumes the song.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod diagnostics;
mod event;
mod note;
mod sample;
pub mod song;
mod timing;
mod tuning;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use event::{RawEvent, RawEventKind};
pub use note::{AutomationPoint, InstrumentId, LoopMode, Note, ParseInstrumentError};
pub use sample::{Sample, SampleData, WaveBank, WAVE_COUNT, WAVE_LEN};
pub use song::{LoopRegion, SourceFormat, Song, TimeSignature, TrackInfo};
pub use timing::{micros_to_bpm, wait_to_bpm, Tempo, DEFAULT_BPM};
pub use tuning::{ChromaticPitch, TuningMapper, TuningProfile, MAX_DEVIATION_STEPS, NUM_OCTAVES};
