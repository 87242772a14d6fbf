//! Voice mixer driven by an audio-frame clock.
//!
//! Notes are started at absolute times on the engine's own clock, which
//! advances one frame per rendered output frame.

use alloc::collections::BTreeSet;
use alloc::sync::Arc;
use alloc::vec::Vec;
use et_ir::{
    AutomationPoint, Diagnostic, Diagnostics, InstrumentId, LoopMode, Note, TuningMapper, TuningProfile,
};
use tracing::{debug, warn};

use crate::frame::Frame;
use crate::frequency::{
    melodic_buffer_rate, octave_index, percussion_buffer_rate, rate_to_increment, voice_stop_seconds,
    volume_to_gain, DRUM_REFERENCE_RATE,
};
use crate::sample_cache::SampleCache;
use crate::voice::{LanePoint, ParamLane, Voice, VoiceSource};
use crate::voice_pool::{VoiceKey, VoicePool};

/// Length of the fade applied by explicit stops.
pub const STOP_FADE_SECONDS: f64 = 0.005;

/// Headroom applied to the summed voices.
pub const MASTER_GAIN: f32 = 0.5;

/// Everything needed to start one voice.
#[derive(Clone, Copy, Debug)]
pub struct PlayRequest<'a> {
    pub pitch_step: u16,
    /// 0..127
    pub velocity: u8,
    pub instrument: InstrumentId,
    /// -100..100
    pub pan: i8,
    /// Start time in engine seconds
    pub when: f64,
    /// Requested length in seconds
    pub duration: f64,
    pub loop_mode: LoopMode,
    pub volume_automation: &'a [AutomationPoint],
    pub pan_automation: &'a [AutomationPoint],
    /// Converts automation tick offsets to seconds
    pub seconds_per_tick: f64,
    pub freq_adjust: i16,
}

impl<'a> PlayRequest<'a> {
    pub fn new(pitch_step: u16, instrument: InstrumentId, when: f64, duration: f64) -> Self {
        Self {
            pitch_step,
            velocity: 100,
            instrument,
            pan: 0,
            when,
            duration,
            loop_mode: LoopMode::Infinite,
            volume_automation: &[],
            pan_automation: &[],
            seconds_per_tick: 0.0,
            freq_adjust: 0,
        }
    }

    pub fn from_note(note: &'a Note, when: f64, seconds_per_tick: f64) -> Self {
        Self {
            pitch_step: note.pitch_step,
            velocity: note.velocity,
            instrument: note.instrument,
            pan: note.pan,
            when,
            duration: note.duration_ticks as f64 * seconds_per_tick,
            loop_mode: note.loop_mode,
            volume_automation: &note.volume_automation,
            pan_automation: &note.pan_automation,
            seconds_per_tick,
            freq_adjust: note.freq_adjust,
        }
    }
}

/// A started voice and when it will fall silent on its own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceHandle {
    pub id: VoiceKey,
    /// Actual start, later than the request if it arrived late
    pub start_time: f64,
    pub stop_time: f64,
}

/// The voice mixer.
pub struct AudioEngine {
    /// Output sample rate (e.g., 44100)
    sample_rate: u32,
    mapper: TuningMapper,
    cache: Arc<SampleCache>,
    pool: VoicePool,
    /// Frames rendered so far; the engine clock
    frames_rendered: u64,
    /// Instruments already reported as missing or substituted
    reported: BTreeSet<InstrumentId>,
    diagnostics: Diagnostics,
}

impl AudioEngine {
    pub fn new(sample_rate: u32, tuning: TuningProfile, cache: Arc<SampleCache>) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            mapper: TuningMapper::new(tuning),
            cache,
            pool: VoicePool::new(),
            frames_rendered: 0,
            reported: BTreeSet::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tuning(&self) -> TuningProfile {
        self.mapper.profile()
    }

    pub fn set_tuning(&mut self, tuning: TuningProfile) {
        self.mapper = TuningMapper::new(tuning);
    }

    /// Swap the sample set. Voices whose buffer disappears go silent.
    pub fn set_sample_cache(&mut self, cache: Arc<SampleCache>) {
        self.cache = cache;
        self.reported.clear();
    }

    pub fn sample_cache(&self) -> &Arc<SampleCache> {
        &self.cache
    }

    /// Engine clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn current_frame(&self) -> u64 {
        self.frames_rendered
    }

    /// Missing-sample reports gathered while playing.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn active_voice_count(&self) -> usize {
        self.pool.len()
    }

    /// The voice `stop_note(pitch)` would act on.
    pub fn voice_for_pitch(&self, pitch_step: u16) -> Option<VoiceKey> {
        self.pool.active_for(pitch_step)
    }

    pub fn is_voice_live(&self, id: VoiceKey) -> bool {
        self.pool.get(id).is_some_and(|v| !v.is_finished())
    }

    /// Start a voice. Returns `None` when no sample is available for the
    /// instrument or its family fallback.
    pub fn play_note(&mut self, request: &PlayRequest<'_>) -> Option<VoiceHandle> {
        let Some(resolved) = self.cache.resolve(request.instrument) else {
            self.report(request.instrument, None);
            return None;
        };
        if resolved != request.instrument {
            self.report(request.instrument, Some(resolved));
        }

        let sr = self.sample_rate as f64;
        let now = self.current_time();
        let start_time = if request.when < now {
            debug!(late_by = now - request.when, "note request arrived late, starting now");
            now
        } else {
            request.when
        };
        let start_frame = (libm::round(start_time * sr) as u64).max(self.frames_rendered);
        let steps = self.mapper.steps_per_octave();

        let (source, increment, sounding) = match resolved {
            InstrumentId::Melodic(wave) => {
                let (octave, within) = self.mapper.split(request.pitch_step);
                let rate = melodic_buffer_rate(octave, within, steps, request.freq_adjust);
                if rate <= 0.0 {
                    debug!(rate, "non-positive buffer rate, note skipped");
                    return None;
                }
                let seconds = voice_stop_seconds(request.duration.max(0.0), request.loop_mode, octave, rate);
                let source = VoiceSource::Cycle {
                    wave,
                    octave: octave_index(octave) as u8,
                };
                (source, rate_to_increment(rate, self.sample_rate), seconds)
            }
            InstrumentId::Percussion(slot) => {
                let drum = self.cache.drum(slot)?;
                let speed = percussion_buffer_rate(request.pitch_step, steps) / DRUM_REFERENCE_RATE;
                let source_rate = speed * drum.sample_rate as f64;
                let seconds = drum.len() as f64 / source_rate;
                (VoiceSource::OneShot { drum: slot }, rate_to_increment(source_rate, self.sample_rate), seconds)
            }
        };

        let end_frame = start_frame + libm::round(sounding * sr) as u64;
        let mut voice = Voice::new(source, request.pitch_step, start_frame, end_frame, increment);
        let to_frame = |tick: u32| start_frame + libm::round(tick as f64 * request.seconds_per_tick * sr) as u64;
        voice.gain = ParamLane::new(
            volume_to_gain(request.velocity) as f32,
            start_frame,
            lane(request.volume_automation, to_frame, |v| volume_to_gain(v.clamp(0, 127) as u8) as f32),
        );
        voice.pan = ParamLane::new(
            request.pan.clamp(-100, 100) as f32 / 100.0,
            start_frame,
            lane(request.pan_automation, to_frame, |v| v.clamp(-100, 100) as f32 / 100.0),
        );

        // Percussion never claims a pitch, so re-triggers cannot cut it off.
        let register = !voice.is_percussive();
        let id = self.pool.insert(voice, register);
        Some(VoiceHandle {
            id,
            start_time,
            stop_time: start_time + sounding,
        })
    }

    /// Fade out the active voice on `pitch_step`. No-op if there is none.
    pub fn stop_note(&mut self, pitch_step: u16) {
        if let Some(id) = self.pool.deregister(pitch_step) {
            self.fade(id);
        }
    }

    /// Fade out one voice by handle.
    pub fn stop_voice(&mut self, id: VoiceKey) {
        if let Some(pitch) = self.pool.get(id).map(|v| v.pitch_step) {
            if self.pool.active_for(pitch) == Some(id) {
                self.pool.deregister(pitch);
            }
            self.fade(id);
        }
    }

    /// Fade out every voice.
    pub fn stop_all(&mut self) {
        let (now, length) = (self.frames_rendered, self.fade_frames());
        for (_, voice) in self.pool.iter_mut() {
            voice.begin_fade(now, length);
        }
        self.pool.clear_registrations();
    }

    fn fade(&mut self, id: VoiceKey) {
        let (now, length) = (self.frames_rendered, self.fade_frames());
        if let Some(voice) = self.pool.get_mut(id) {
            voice.begin_fade(now, length);
        }
    }

    fn fade_frames(&self) -> u64 {
        (libm::round(STOP_FADE_SECONDS * self.sample_rate as f64) as u64).max(1)
    }

    fn report(&mut self, requested: InstrumentId, fallback: Option<InstrumentId>) {
        if !self.reported.insert(requested) {
            return;
        }
        match fallback {
            Some(used) => warn!(%requested, %used, "no sample for instrument, using fallback"),
            None => warn!(%requested, "no sample for instrument or fallback, notes will be skipped"),
        }
        self.diagnostics.push(Diagnostic::NoSampleForInstrument { instrument: requested });
    }

    /// Generate one frame of audio.
    pub fn render_frame(&mut self) -> Frame {
        let frame = self.mix_frame();
        self.pool.reap_finished();
        frame
    }

    /// Fill `out` with consecutive frames.
    pub fn render(&mut self, out: &mut [Frame]) {
        for frame in out.iter_mut() {
            *frame = self.mix_frame();
        }
        self.pool.reap_finished();
    }

    fn mix_frame(&mut self) -> Frame {
        let now = self.frames_rendered;
        let cache = &self.cache;
        let mut left = 0.0f32;
        let mut right = 0.0f32;

        for (_, voice) in self.pool.iter_mut() {
            let data = match voice.source {
                VoiceSource::Cycle { wave, octave } => cache.cycle(wave, octave as usize),
                VoiceSource::OneShot { drum } => cache.drum(drum).map(|s| &s.data),
            };
            let (l, r) = voice.render(now, data);
            left += l;
            right += r;
        }

        self.frames_rendered += 1;
        Frame::from_f32(left * MASTER_GAIN, right * MASTER_GAIN)
    }
}

fn lane(points: &[AutomationPoint], to_frame: impl Fn(u32) -> u64, value: impl Fn(i16) -> f32) -> Vec<LanePoint> {
    points
        .iter()
        .map(|p| LanePoint {
            frame: to_frame(p.tick),
            value: value(p.value),
        })
        .collect()
}
