//! Playback engine for edotrack.
//!
//! [`AudioEngine`] mixes sample voices against a frame clock;
//! [`PlaybackEngine`] walks a song measure by measure, feeding the mixer
//! a short lookahead window ahead of that clock.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_engine;
mod frame;
pub mod frequency;
pub mod playback;
mod sample_cache;
mod voice;
mod voice_pool;

pub use audio_engine::{AudioEngine, PlayRequest, VoiceHandle, MASTER_GAIN, STOP_FADE_SECONDS};
pub use frame::Frame;
pub use playback::{
    PlaybackEngine, PlaybackEvent, PlaybackObserver, TransportState, DEFAULT_LOOKAHEAD, DEFAULT_TICK_INTERVAL,
    MAX_BPM, MAX_MEASURES_PER_TICK,
};
pub use sample_cache::SampleCache;
pub use voice::{VoiceSource, VoiceState};
pub use voice_pool::{VoiceKey, MAX_VOICES};
