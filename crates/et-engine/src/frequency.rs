//! Playback-rate, volume and loop-length arithmetic.
//!
//! Melodic voices play one downsampled waveform cycle per octave; the
//! cycle length halves as octaves rise so the buffer rate stays in a
//! usable range. Percussion uses a linear key-to-rate ladder.

use et_ir::{LoopMode, NUM_OCTAVES};

/// Cycle length of the melodic waveform for each octave.
pub const PERIOD_SIZES: [u32; NUM_OCTAVES as usize] = [256, 256, 128, 128, 64, 32, 16, 8];

/// Cycles a finite ("pipi") voice plays per loop count, per octave.
pub const LOOP_CYCLES: [u32; NUM_OCTAVES as usize] = [4, 8, 12, 16, 20, 24, 28, 32];

/// Frequency of octave 0, step 0.
pub const BASE_FREQUENCY: f64 = 32.75;

/// Drum buffer rate at which a drum sample plays at its native speed.
pub const DRUM_REFERENCE_RATE: f64 = 22050.0;

/// Clamp an octave to the period table.
pub fn octave_index(octave: u16) -> usize {
    (octave as usize).min(PERIOD_SIZES.len() - 1)
}

/// Samples per second read from the melodic cycle buffer.
///
/// `periodSize * 32.75 * 2^octave * 2^(step/N) + freq_adjust`
pub fn melodic_buffer_rate(octave: u16, step_in_octave: u16, steps_per_octave: u16, freq_adjust: i16) -> f64 {
    let oct = octave_index(octave);
    let ratio = libm::pow(2.0, step_in_octave as f64 / steps_per_octave.max(1) as f64);
    PERIOD_SIZES[oct] as f64 * BASE_FREQUENCY * (1u32 << oct) as f64 * ratio + freq_adjust as f64
}

/// Nearest 12-tone key of a step, rounding half away from zero.
pub fn percussion_key(step: u16, steps_per_octave: u16) -> u32 {
    libm::round(step as f64 * 12.0 / steps_per_octave.max(1) as f64) as u32
}

/// Drum buffer rate: `key * 800 + 100`.
pub fn percussion_buffer_rate(step: u16, steps_per_octave: u16) -> f64 {
    (percussion_key(step, steps_per_octave) * 800 + 100) as f64
}

/// 16.16 fixed-point increment for reading `source_rate` samples per
/// second at `output_rate`.
pub fn rate_to_increment(source_rate: f64, output_rate: u32) -> u64 {
    if output_rate == 0 || source_rate <= 0.0 {
        return 0;
    }
    libm::round(source_rate * 65536.0 / output_rate as f64) as u64
}

/// Linear gain for a 0..127 velocity on the logarithmic volume curve:
/// `10^(((v*2 - 255) * 8) / 2000)`.
pub fn volume_to_gain(velocity: u8) -> f64 {
    let v = velocity.min(127) as f64;
    libm::pow(10.0, ((v * 2.0 - 255.0) * 8.0) / 2000.0)
}

/// Seconds a finite loop of `count` runs lasts at `buffer_rate`.
pub fn finite_loop_seconds(octave: u16, count: u8, buffer_rate: f64) -> f64 {
    if buffer_rate <= 0.0 {
        return 0.0;
    }
    let oct = octave_index(octave);
    (PERIOD_SIZES[oct] * LOOP_CYCLES[oct] * count as u32) as f64 / buffer_rate
}

/// How long a melodic voice sounds.
///
/// Infinite loops run exactly the requested duration; finite loops stop
/// early when their cycles run out.
pub fn voice_stop_seconds(duration: f64, loop_mode: LoopMode, octave: u16, buffer_rate: f64) -> f64 {
    match loop_mode {
        LoopMode::Infinite => duration,
        LoopMode::Finite(count) => duration.min(finite_loop_seconds(octave, count, buffer_rate)),
    }
}
