//! Headless controller for edotrack.
//!
//! Provides a unified API for loading songs, real-time playback, and
//! offline rendering that the CLI and tests share.

mod config;
mod error;
mod transport;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use et_audio::{AudioOutput, CpalOutput};
use et_engine::{AudioEngine, PlaybackEngine, SampleCache};
use et_formats::LoadOptions;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{info, warn};

use crate::transport::{audio_thread, Command, Session, SharedTransport};

// Re-export common types so callers don't need et-ir/et-engine directly.
pub use config::{PlayerConfig, TuningSetting};
pub use error::MasterError;
pub use et_engine::{Frame, PlaybackEvent};
pub use et_formats::FormatError;
pub use et_ir::{Diagnostics, Song, TuningProfile, WaveBank};
pub use transport::OutputFactory;

const COMMAND_QUEUE: usize = 64;
const EVENT_QUEUE: usize = 4096;

/// Headless controller: owns a song and manages playback.
pub struct Controller {
    config: PlayerConfig,
    song: Song,
    samples: Arc<SampleCache>,
    muted: BTreeSet<u8>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    commands: HeapProd<Command>,
    events: HeapCons<PlaybackEvent>,
    shared: Arc<SharedTransport>,
    sample_rate: u32,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    /// Create a controller, loading the wave resources `config` names.
    pub fn new(config: PlayerConfig) -> Result<Self, MasterError> {
        config.validate()?;
        let bank = load_bank(&config)?;
        Ok(Self::with_bank(config, &bank))
    }

    /// Create a controller around an already decoded wave bank.
    pub fn with_bank(config: PlayerConfig, bank: &WaveBank) -> Self {
        let mut song = Song::new("Untitled");
        song.tuning = config.tuning_profile();
        Self {
            config,
            song,
            samples: Arc::new(SampleCache::from_bank(bank)),
            muted: BTreeSet::new(),
            playback: None,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    // --- Song management ---

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Parse a MIDI, Organya or JSON song. On failure the current song is
    /// left untouched; on success playback stops and the song is replaced.
    pub fn load(&mut self, data: &[u8]) -> Result<(), MasterError> {
        let options = LoadOptions {
            tuning: self.config.tuning_profile(),
            octave_shift: self.config.octave_shift,
        };
        let song = et_formats::load_song(data, &options)?;
        info!(
            title = %song.title,
            format = %song.format,
            notes = song.notes.len(),
            diagnostics = song.diagnostics.len(),
            "loaded song"
        );
        self.replace_song(song);
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), MasterError> {
        let data = std::fs::read(path)?;
        self.load(&data)
    }

    /// Import an exported JSON project.
    pub fn import_json(&mut self, json: &str) -> Result<(), MasterError> {
        let song = et_formats::import_song(json, self.config.tuning_profile())?;
        self.replace_song(song);
        Ok(())
    }

    pub fn export_json(&self) -> Result<String, MasterError> {
        Ok(et_formats::song_to_json(&self.song)?)
    }

    fn replace_song(&mut self, song: Song) {
        self.stop();
        self.muted.clear();
        self.song = song;
    }

    // --- Real-time playback ---

    /// Start playback on the default audio device.
    pub fn play(&mut self, from_measure: Option<u32>) -> Result<(), MasterError> {
        let buffer_ms = self.config.buffer_ms;
        self.play_with(
            from_measure,
            Box::new(move || CpalOutput::open(buffer_ms).map(|o| Box::new(o) as Box<dyn AudioOutput>)),
        )
    }

    /// Start playback, opening the output with `open_output` on the audio
    /// thread. Resumes or restarts an existing session instead when one is
    /// running.
    pub fn play_with(&mut self, from_measure: Option<u32>, open_output: OutputFactory) -> Result<(), MasterError> {
        if let Some(pb) = self.playback.as_mut() {
            if !pb.shared.finished.load(Ordering::Relaxed) {
                pb.shared.playing.store(true, Ordering::Relaxed);
                send(pb, Command::Play(from_measure));
                return Ok(());
            }
        }
        self.stop();

        let (commands, command_rx) = HeapRb::<Command>::new(COMMAND_QUEUE).split();
        let (event_tx, events) = HeapRb::<PlaybackEvent>::new(EVENT_QUEUE).split();
        let shared = Arc::new(SharedTransport::new());
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let session = Session {
            song: self.song.clone(),
            samples: Arc::clone(&self.samples),
            lookahead: self.config.lookahead_seconds,
            tick: self.config.tick_seconds,
            muted: self.muted.iter().copied().collect(),
            from: from_measure,
        };
        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("et-audio".into())
            .spawn(move || audio_thread(session, open_output, command_rx, event_tx, thread_shared, ready_tx))?;

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err.into());
            }
            Err(_) => {
                let _ = thread.join();
                return Err(MasterError::AudioThread);
            }
        };

        self.playback = Some(PlaybackHandle {
            commands,
            events,
            shared,
            sample_rate,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Halt scheduling; sounding notes ring out.
    pub fn pause(&mut self) {
        if let Some(pb) = self.playback.as_mut() {
            send(pb, Command::Pause);
        }
    }

    /// Stop playback and shut the audio thread down. Safe to repeat.
    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.shared.shutdown.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                if handle.join().is_err() {
                    warn!("audio thread panicked");
                }
            }
        }
    }

    /// Tempo for this and later playback. Rejects non-finite, non-positive
    /// and anything above [`et_engine::MAX_BPM`].
    pub fn set_tempo(&mut self, bpm: f64) -> bool {
        if !(bpm.is_finite() && bpm > 0.0 && bpm <= et_engine::MAX_BPM) {
            return false;
        }
        self.song.bpm = bpm;
        if let Some(pb) = self.playback.as_mut() {
            send(pb, Command::SetTempo(bpm));
        }
        true
    }

    pub fn set_loop(&mut self, enabled: bool, start_measure: u32, end_measure: u32) {
        self.song.loop_region = et_ir::LoopRegion::new(enabled, start_measure, end_measure);
        if let Some(pb) = self.playback.as_mut() {
            send(
                pb,
                Command::SetLoop {
                    enabled,
                    start: start_measure,
                    end: end_measure,
                },
            );
        }
    }

    /// Mute a track by name. Returns false if no track has that name.
    pub fn set_track_mute(&mut self, name: &str, muted: bool) -> bool {
        let Some(track) = self.song.track_by_name(name).map(|t| t.index) else {
            return false;
        };
        if muted {
            self.muted.insert(track);
        } else {
            self.muted.remove(&track);
        }
        if let Some(pb) = self.playback.as_mut() {
            send(pb, Command::Mute { track, muted });
        }
        true
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.shared.playing.load(Ordering::Relaxed) && !p.shared.finished.load(Ordering::Relaxed))
    }

    /// Measure the audio clock is in, while playing.
    pub fn current_measure(&self) -> Option<u32> {
        self.playback.as_ref().and_then(|p| p.shared.measure())
    }

    /// Device rate of the running session.
    pub fn output_sample_rate(&self) -> Option<u32> {
        self.playback.as_ref().map(|p| p.sample_rate)
    }

    /// Drain playback events published since the last call.
    pub fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        match self.playback.as_mut() {
            Some(pb) => pb.events.pop_iter().collect(),
            None => Vec::new(),
        }
    }

    // --- Offline rendering ---

    /// Render the song from the start until it stops or `max_frames` is
    /// reached, then let ringing voices finish (up to one second).
    pub fn render_frames(&self, sample_rate: u32, max_frames: usize) -> Vec<Frame> {
        let mut audio = AudioEngine::new(sample_rate, self.song.tuning, Arc::clone(&self.samples));
        let mut playback = PlaybackEngine::new(self.song.clone())
            .with_timing(self.config.lookahead_seconds, self.config.tick_seconds);
        for &track in &self.muted {
            playback.set_track_mute_index(track, true);
        }
        playback.play(&mut audio, None);

        let mut frames = Vec::with_capacity(max_frames.min(sample_rate as usize * 60));
        let mut block = vec![Frame::silence(); 1024];
        while playback.is_playing() && frames.len() < max_frames {
            let n = block.len().min(max_frames - frames.len());
            playback.render(&mut audio, &mut block[..n]);
            frames.extend_from_slice(&block[..n]);
        }

        playback.stop(&mut audio);
        let tail_limit = frames.len() + sample_rate as usize;
        while audio.active_voice_count() > 0 && frames.len() < tail_limit {
            audio.render(&mut block);
            frames.extend_from_slice(&block);
        }
        frames
    }

    pub fn render_to_wav(&self, sample_rate: u32, max_seconds: u32) -> Vec<u8> {
        let max_frames = sample_rate as usize * max_seconds as usize;
        let frames = self.render_frames(sample_rate, max_frames);
        et_formats::frames_to_wav(&frames, sample_rate)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn send(pb: &mut PlaybackHandle, command: Command) {
    if pb.commands.try_push(command).is_err() {
        warn!(?command, "transport command queue full, command dropped");
    }
}

/// Decode the wavetable and drum directory `config` names, or the built-in
/// bank when none is configured.
pub fn load_bank(config: &PlayerConfig) -> Result<WaveBank, MasterError> {
    let mut bank = match &config.wavetable {
        Some(path) => {
            let data = std::fs::read(path)?;
            et_formats::load_wavetable(&data, config.wavetable_offset)?
        }
        None => et_formats::builtin_bank(),
    };
    if let Some(dir) = &config.drum_dir {
        bank.drums.extend(et_formats::load_drum_dir(dir)?);
    }
    info!(waves = bank.waves.len(), drums = bank.drums.len(), "wave bank ready");
    Ok(bank)
}
