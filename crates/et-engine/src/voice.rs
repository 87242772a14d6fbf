//! Voice: one sounding note reading from a cycle buffer or a one-shot drum.

use alloc::vec::Vec;
use et_ir::SampleData;

/// Voice lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    /// Waiting for its start frame.
    #[default]
    Scheduled,
    /// Producing audio.
    Playing,
    /// Fading out after an explicit stop.
    Stopping,
    /// Done; the pool will reclaim it.
    Finished,
}

/// Where a voice reads its samples from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceSource {
    /// Looping single-cycle waveform at a given octave index.
    Cycle { wave: u8, octave: u8 },
    /// Percussion sample played once.
    OneShot { drum: u8 },
}

/// A parameter change at an absolute output frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LanePoint {
    pub frame: u64,
    pub value: f32,
}

/// Timeline of a voice parameter.
///
/// The first point is reached with a linear ramp from the initial value,
/// starting at the voice's start frame. Every later point is a step.
#[derive(Clone, Debug, Default)]
pub struct ParamLane {
    initial: f32,
    origin: u64,
    points: Vec<LanePoint>,
    cursor: usize,
}

impl ParamLane {
    pub fn constant(value: f32) -> Self {
        Self {
            initial: value,
            ..Self::default()
        }
    }

    /// `points` must be sorted by frame.
    pub fn new(initial: f32, origin: u64, points: Vec<LanePoint>) -> Self {
        Self {
            initial,
            origin,
            points,
            cursor: 0,
        }
    }

    /// Value at `frame`. Frames must be queried in non-decreasing order.
    pub fn value_at(&mut self, frame: u64) -> f32 {
        while self.cursor < self.points.len() && self.points[self.cursor].frame <= frame {
            self.cursor += 1;
        }
        if self.cursor > 0 {
            return self.points[self.cursor - 1].value;
        }
        match self.points.first() {
            Some(first) if frame > self.origin => {
                let span = (first.frame - self.origin) as f32;
                let t = (frame - self.origin) as f32 / span;
                self.initial + (first.value - self.initial) * t
            }
            _ => self.initial,
        }
    }
}

/// Linear fade to silence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fade {
    pub start: u64,
    pub length: u64,
}

/// A single voice producing audio from a sample.
#[derive(Clone, Debug)]
pub struct Voice {
    pub source: VoiceSource,
    /// Pitch the voice was started for.
    pub pitch_step: u16,
    /// Current position in sample (16.16 fixed-point).
    pub position: u64,
    /// Playback increment (16.16 fixed-point).
    pub increment: u64,
    /// First output frame the voice sounds on.
    pub start_frame: u64,
    /// Output frame at which the voice stops on its own.
    pub end_frame: u64,
    /// Linear gain timeline.
    pub gain: ParamLane,
    /// Pan timeline, -1.0 (left) .. 1.0 (right).
    pub pan: ParamLane,
    pub fade: Option<Fade>,
    pub state: VoiceState,
}

impl Voice {
    pub fn new(source: VoiceSource, pitch_step: u16, start_frame: u64, end_frame: u64, increment: u64) -> Self {
        Self {
            source,
            pitch_step,
            position: 0,
            increment,
            start_frame,
            end_frame: end_frame.max(start_frame),
            gain: ParamLane::constant(1.0),
            pan: ParamLane::constant(0.0),
            fade: None,
            state: VoiceState::Scheduled,
        }
    }

    pub fn is_percussive(&self) -> bool {
        matches!(self.source, VoiceSource::OneShot { .. })
    }

    pub fn is_finished(&self) -> bool {
        self.state == VoiceState::Finished
    }

    /// Start a fade of `length` frames at `now`. A voice that has not
    /// started yet is dropped outright.
    pub fn begin_fade(&mut self, now: u64, length: u64) {
        if self.state == VoiceState::Finished || self.fade.is_some() {
            return;
        }
        if now < self.start_frame {
            self.state = VoiceState::Finished;
            return;
        }
        self.fade = Some(Fade {
            start: now,
            length: length.max(1),
        });
        self.state = VoiceState::Stopping;
    }

    /// Render output frame `frame`, reading from `data`.
    /// Returns a stereo pair at full scale ±1.0.
    pub fn render(&mut self, frame: u64, data: Option<&SampleData>) -> (f32, f32) {
        if self.state == VoiceState::Finished || frame < self.start_frame {
            return (0.0, 0.0);
        }
        if frame >= self.end_frame {
            self.state = VoiceState::Finished;
            return (0.0, 0.0);
        }
        if self.state == VoiceState::Scheduled {
            self.state = VoiceState::Playing;
        }

        let fade_gain = match self.fade {
            Some(fade) => {
                let elapsed = frame.saturating_sub(fade.start);
                if elapsed >= fade.length {
                    self.state = VoiceState::Finished;
                    return (0.0, 0.0);
                }
                1.0 - elapsed as f32 / fade.length as f32
            }
            None => 1.0,
        };

        let Some(data) = data else {
            self.state = VoiceState::Finished;
            return (0.0, 0.0);
        };
        let value = match self.source {
            VoiceSource::Cycle { .. } => data.get_cyclic_interpolated(self.position),
            VoiceSource::OneShot { .. } => {
                if (self.position >> 16) as usize >= data.len() {
                    self.state = VoiceState::Finished;
                    return (0.0, 0.0);
                }
                data.get_mono_interpolated(self.position)
            }
        };
        self.position += self.increment;

        let gain = self.gain.value_at(frame) * fade_gain;
        let pan = self.pan.value_at(frame);
        apply_gain_and_pan(value, gain, pan)
    }
}

/// Scale a sample by `gain` and spread it across the stereo field.
/// Centre keeps both channels at full level.
fn apply_gain_and_pan(sample_value: i16, gain: f32, pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    let s = sample_value as f32 / 32768.0 * gain;
    (s * (1.0 - pan).min(1.0), s * (1.0 + pan).min(1.0))
}
