//! Lookahead playback scheduler.
//!
//! Each scheduling tick hands the [`AudioEngine`] every measure whose
//! start lies within the lookahead window. Observer events are derived by
//! comparing the engine clock against the timestamps recorded when each
//! measure and note was scheduled.

use alloc::boxed::Box;
use alloc::collections::{BTreeSet, VecDeque};
use alloc::vec::Vec;
use et_ir::{LoopRegion, Song, Tempo};
use tracing::{debug, info, warn};

use crate::audio_engine::{AudioEngine, PlayRequest};
use crate::frame::Frame;
use crate::voice_pool::VoiceKey;

/// Default scheduling window in seconds.
pub const DEFAULT_LOOKAHEAD: f64 = 0.1;

/// Default interval between scheduling ticks in seconds.
pub const DEFAULT_TICK_INTERVAL: f64 = 0.025;

/// Fastest accepted tempo: one-millisecond ticks at one tick per beat.
pub const MAX_BPM: f64 = 60_000.0;

/// Most measures a single tick may hand to the audio engine. At extreme
/// tempos the scheduler catches up over later ticks instead.
pub const MAX_MEASURES_PER_TICK: usize = 64;

/// Something observers are told about.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackEvent {
    /// A note (index into `Song::notes`) began sounding.
    NoteStart { note: usize, time: f64 },
    /// A note fell silent or was released.
    NoteEnd { note: usize, time: f64 },
    /// The engine clock entered a new measure.
    MeasureChange { measure: u32 },
    /// Playback stopped, by request or at the end of the song.
    Stopped,
}

/// Receives playback events. Implemented for any `FnMut(&PlaybackEvent)`.
pub trait PlaybackObserver {
    fn on_event(&mut self, event: &PlaybackEvent);
}

impl<F: FnMut(&PlaybackEvent)> PlaybackObserver for F {
    fn on_event(&mut self, event: &PlaybackEvent) {
        self(event)
    }
}

/// Transport state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// A note handed to the audio engine and not yet finished.
#[derive(Clone, Copy, Debug)]
struct ScheduledNote {
    index: usize,
    voice: VoiceKey,
    start: f64,
    end: f64,
    started: bool,
}

/// Drives an [`AudioEngine`] through a [`Song`].
pub struct PlaybackEngine {
    song: Song,
    state: TransportState,
    bpm: f64,
    lookahead: f64,
    tick_interval: f64,
    loop_region: LoopRegion,
    muted: BTreeSet<u8>,
    /// Next measure to hand to the audio engine
    next_measure: u32,
    /// Its start on the engine clock
    next_measure_time: f64,
    /// Scheduled measure starts the clock has not reached yet
    boundaries: VecDeque<(f64, u32)>,
    current_measure: Option<u32>,
    scheduled: Vec<ScheduledNote>,
    /// Set once the last measure has been scheduled without looping
    end_time: Option<f64>,
    /// Frames left before the next tick inside `render`
    frames_until_tick: usize,
    observers: Vec<Box<dyn PlaybackObserver + Send>>,
}

impl PlaybackEngine {
    pub fn new(song: Song) -> Self {
        Self {
            bpm: song.bpm,
            loop_region: song.loop_region,
            song,
            state: TransportState::Stopped,
            lookahead: DEFAULT_LOOKAHEAD,
            tick_interval: DEFAULT_TICK_INTERVAL,
            muted: BTreeSet::new(),
            next_measure: 0,
            next_measure_time: 0.0,
            boundaries: VecDeque::new(),
            current_measure: None,
            scheduled: Vec::new(),
            end_time: None,
            frames_until_tick: 0,
            observers: Vec::new(),
        }
    }

    /// Override the scheduling window and tick interval (seconds).
    pub fn with_timing(mut self, lookahead: f64, tick_interval: f64) -> Self {
        if lookahead > 0.0 {
            self.lookahead = lookahead;
        }
        if tick_interval > 0.0 {
            self.tick_interval = tick_interval;
        }
        self
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Replace the song. Stops playback first.
    pub fn load(&mut self, audio: &mut AudioEngine, song: Song) {
        self.stop(audio);
        self.bpm = song.bpm;
        self.loop_region = song.loop_region;
        self.muted.clear();
        self.song = song;
    }

    pub fn subscribe(&mut self, observer: Box<dyn PlaybackObserver + Send>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Measure the engine clock is currently in, once playback reached one.
    pub fn current_measure(&self) -> Option<u32> {
        self.current_measure
    }

    pub fn tempo(&self) -> f64 {
        self.bpm
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn tick_interval(&self) -> f64 {
        self.tick_interval
    }

    /// Engine-clock start of the next measure not yet scheduled.
    pub fn next_measure_time(&self) -> f64 {
        self.next_measure_time
    }

    /// Start or resume playback.
    ///
    /// `Some(measure)` always restarts from that measure. `None` resumes a
    /// paused transport from its scheduling cursor, or starts a stopped one
    /// from measure 0.
    pub fn play(&mut self, audio: &mut AudioEngine, from: Option<u32>) {
        audio.set_tuning(self.song.tuning);
        let now = audio.current_time();
        match (self.state, from) {
            (TransportState::Playing, None) => return,
            (TransportState::Paused, None) => {
                self.next_measure_time = self.next_measure_time.max(now);
            }
            (_, from) => {
                self.release_voices(audio);
                self.reset_cursor(from.unwrap_or(0), now);
            }
        }
        self.state = TransportState::Playing;
        info!(measure = self.next_measure, bpm = self.bpm, "playback started");
        self.tick(audio);
    }

    /// Halt scheduling. Voices already handed to the audio engine finish.
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            debug!(measure = self.next_measure, "playback paused");
        }
    }

    /// Fade every tracked voice and clear the schedule. Safe to repeat.
    pub fn stop(&mut self, audio: &mut AudioEngine) {
        let was_running = self.state != TransportState::Stopped;
        self.release_voices(audio);
        self.state = TransportState::Stopped;
        self.reset_cursor(0, audio.current_time());
        if was_running {
            info!("playback stopped");
            self.emit(PlaybackEvent::Stopped);
        }
    }

    /// Change tempo. Measures already scheduled keep their timing; the
    /// next unscheduled measure still starts where the previous one ends.
    pub fn set_tempo(&mut self, bpm: f64) -> bool {
        if !(bpm.is_finite() && bpm > 0.0 && bpm <= MAX_BPM) {
            warn!(bpm, "ignoring invalid tempo");
            return false;
        }
        self.bpm = bpm;
        debug!(bpm, "tempo changed");
        true
    }

    pub fn set_loop(&mut self, enabled: bool, start_measure: u32, end_measure: u32) {
        self.loop_region = LoopRegion::new(enabled, start_measure, end_measure);
        if self.loop_region.is_active() {
            // a pending end-of-song stop no longer applies
            self.end_time = None;
        }
    }

    /// Mute or unmute a track by name. Returns false if no track has that name.
    pub fn set_track_mute(&mut self, name: &str, muted: bool) -> bool {
        match self.song.track_by_name(name).map(|t| t.index) {
            Some(index) => {
                self.set_track_mute_index(index, muted);
                true
            }
            None => false,
        }
    }

    /// Muting affects notes scheduled from now on.
    pub fn set_track_mute_index(&mut self, track: u8, muted: bool) {
        if muted {
            self.muted.insert(track);
        } else {
            self.muted.remove(&track);
        }
    }

    pub fn is_track_muted(&self, track: u8) -> bool {
        self.muted.contains(&track)
    }

    /// One scheduling pass.
    pub fn tick(&mut self, audio: &mut AudioEngine) {
        match self.state {
            TransportState::Stopped => return,
            TransportState::Paused => {
                self.poll(audio.current_time());
                return;
            }
            TransportState::Playing => {}
        }

        let now = audio.current_time();
        if self.next_measure_time < now {
            debug!(behind = now - self.next_measure_time, "scheduler fell behind the audio clock");
            self.next_measure_time = now;
        }

        let mut budget = MAX_MEASURES_PER_TICK;
        while self.end_time.is_none() && self.next_measure_time < now + self.lookahead {
            if budget == 0 {
                debug!(measure = self.next_measure, "measure budget spent for this tick");
                break;
            }
            budget -= 1;
            if self.loop_region.is_active() && self.next_measure >= self.loop_region.end_measure {
                self.next_measure = self.loop_region.start_measure;
            }
            if !self.loop_region.is_active() && self.next_measure >= self.song.measure_count() {
                self.end_time = Some(self.next_measure_time);
                break;
            }
            let (measure, start) = (self.next_measure, self.next_measure_time);
            self.schedule_measure(audio, measure, start);
            self.boundaries.push_back((start, measure));
            self.next_measure_time += self.measure_seconds();
            self.next_measure += 1;
        }

        self.poll(now);

        if self.end_time.is_some_and(|end| now >= end) {
            debug!("reached end of song");
            self.stop(audio);
        }
    }

    /// Render `out`, ticking every `tick_interval` of output.
    pub fn render(&mut self, audio: &mut AudioEngine, out: &mut [Frame]) {
        let period = (libm::round(self.tick_interval * audio.sample_rate() as f64) as usize).max(1);
        let mut offset = 0;
        while offset < out.len() {
            if self.frames_until_tick == 0 {
                self.tick(audio);
                self.frames_until_tick = period;
            }
            let n = (out.len() - offset).min(self.frames_until_tick);
            audio.render(&mut out[offset..offset + n]);
            offset += n;
            self.frames_until_tick -= n;
        }
    }

    fn measure_seconds(&self) -> f64 {
        Tempo::new(self.bpm, self.song.ticks_per_beat).ticks_to_seconds(self.song.ticks_per_measure())
    }

    fn schedule_measure(&mut self, audio: &mut AudioEngine, measure: u32, start: f64) {
        let seconds_per_tick = Tempo::new(self.bpm, self.song.ticks_per_beat).seconds_per_tick();
        let first_tick = self.song.measure_start_tick(measure);
        let last_tick = first_tick.saturating_add(self.song.ticks_per_measure());

        for index in self.song.notes_starting_in(first_tick, last_tick) {
            let note = &self.song.notes[index];
            if self.muted.contains(&note.track) {
                continue;
            }
            let when = start + (note.start_ticks - first_tick) as f64 * seconds_per_tick;
            let request = PlayRequest::from_note(note, when, seconds_per_tick);
            if let Some(handle) = audio.play_note(&request) {
                self.scheduled.push(ScheduledNote {
                    index,
                    voice: handle.id,
                    start: handle.start_time,
                    end: handle.stop_time,
                    started: false,
                });
            }
        }
        debug!(measure, start, "scheduled measure");
    }

    /// Emit every event whose time the clock has reached.
    fn poll(&mut self, now: f64) {
        while let Some(&(time, measure)) = self.boundaries.front() {
            if time > now {
                break;
            }
            self.boundaries.pop_front();
            self.current_measure = Some(measure);
            self.emit(PlaybackEvent::MeasureChange { measure });
        }

        let mut events = Vec::new();
        self.scheduled.retain_mut(|s| {
            if !s.started && s.start <= now {
                s.started = true;
                events.push(PlaybackEvent::NoteStart { note: s.index, time: s.start });
            }
            if s.started && s.end <= now {
                events.push(PlaybackEvent::NoteEnd { note: s.index, time: s.end });
                return false;
            }
            true
        });
        for event in events {
            self.emit(event);
        }
    }

    /// Fade every voice this scheduler started and forget it.
    fn release_voices(&mut self, audio: &mut AudioEngine) {
        let now = audio.current_time();
        for note in core::mem::take(&mut self.scheduled) {
            audio.stop_voice(note.voice);
            if note.started {
                self.emit(PlaybackEvent::NoteEnd { note: note.index, time: now });
            }
        }
    }

    fn reset_cursor(&mut self, measure: u32, now: f64) {
        self.next_measure = measure;
        self.next_measure_time = now;
        self.boundaries.clear();
        self.current_measure = None;
        self.end_time = None;
        self.frames_until_tick = 0;
    }

    fn emit(&mut self, event: PlaybackEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }
}
