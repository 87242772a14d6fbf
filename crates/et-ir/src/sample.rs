//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Length of one melodic waveform cycle.
pub const WAVE_LEN: usize = 256;

/// Number of melodic waveforms in a full wavetable.
pub const WAVE_COUNT: usize = 100;

/// A one-shot sample (percussion).
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<32>,
    /// Audio data
    pub data: SampleData,
    /// Native playback rate in Hz
    pub sample_rate: u32,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::Mono8(Vec::new()),
            sample_rate: 22050,
        }
    }
}

impl Sample {
    /// Create a new sample, truncating the name if needed.
    pub fn new(name: &str, data: SampleData, sample_rate: u32) -> Self {
        let mut sample = Self {
            data,
            sample_rate,
            ..Self::default()
        };
        for c in name.chars() {
            if sample.name.try_push(c).is_err() {
                break;
            }
        }
        sample
    }

    /// Length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Mono sample audio data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleData {
    /// 8-bit signed samples
    Mono8(Vec<i8>),
    /// 16-bit signed samples
    Mono16(Vec<i16>),
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono8(v) => v.len(),
            SampleData::Mono16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample value at `pos` scaled to i16; 0 past the end.
    pub fn get_mono(&self, pos: usize) -> i16 {
        match self {
            SampleData::Mono8(v) => v.get(pos).copied().unwrap_or(0) as i16 * 256,
            SampleData::Mono16(v) => v.get(pos).copied().unwrap_or(0),
        }
    }

    /// Linearly interpolated value at a 16.16 fixed-point position.
    ///
    /// Past the last frame the signal blends toward zero.
    pub fn get_mono_interpolated(&self, pos_fixed: u64) -> i16 {
        let idx = (pos_fixed >> 16) as usize;
        let frac = (pos_fixed & 0xFFFF) as i64;

        let a = self.get_mono(idx) as i64;
        let b = self.get_mono(idx + 1) as i64;

        (a + (((b - a) * frac) >> 16)) as i16
    }

    /// Like [`get_mono_interpolated`](Self::get_mono_interpolated), but the
    /// data is treated as one period of a cycle so the position wraps.
    pub fn get_cyclic_interpolated(&self, pos_fixed: u64) -> i16 {
        let len = self.len();
        if len == 0 {
            return 0;
        }
        let idx = ((pos_fixed >> 16) as usize) % len;
        let frac = (pos_fixed & 0xFFFF) as i64;

        let a = self.get_mono(idx) as i64;
        let b = self.get_mono((idx + 1) % len) as i64;

        (a + (((b - a) * frac) >> 16)) as i16
    }
}

/// Decoded instrument resources: melodic cycles plus percussion samples.
#[derive(Clone, Debug, Default)]
pub struct WaveBank {
    /// Single-cycle melodic waveforms, indexed by wave number
    pub waves: Vec<[i8; WAVE_LEN]>,
    /// Percussion samples, indexed by drum slot
    pub drums: Vec<Sample>,
}

impl WaveBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wave(&self, index: u8) -> Option<&[i8; WAVE_LEN]> {
        self.waves.get(index as usize)
    }

    pub fn drum(&self, index: u8) -> Option<&Sample> {
        self.drums.get(index as usize).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty() && self.drums.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn mono8_sample(data: &[i8]) -> SampleData {
        SampleData::Mono8(data.to_vec())
    }

    #[test]
    fn interpolated_at_integer_matches_nearest() {
        let data = mono8_sample(&[0, 100, -50, 30]);
        assert_eq!(data.get_mono_interpolated(1 << 16), data.get_mono(1));
    }

    #[test]
    fn interpolated_midpoint_averages_neighbors() {
        let data = mono8_sample(&[0, 100]);
        let mid = data.get_mono_interpolated(32768);
        let expected = (data.get_mono(0) as i32 + data.get_mono(1) as i32) / 2;
        assert!((mid as i32 - expected).abs() <= 1);
    }

    #[test]
    fn interpolated_past_end_fades_to_zero() {
        let data = mono8_sample(&[100]);
        let val = data.get_mono_interpolated(32768);
        let expected = data.get_mono(0) as i32 / 2;
        assert!((val as i32 - expected).abs() <= 1);
    }

    #[test]
    fn cyclic_read_wraps_to_start() {
        let data = SampleData::Mono16(vec![1000, 2000, 3000]);
        assert_eq!(data.get_cyclic_interpolated(3 << 16), 1000);
        // halfway between last and first
        let v = data.get_cyclic_interpolated((2 << 16) + 32768);
        assert!((v as i32 - 2000).abs() <= 1);
    }

    #[test]
    fn empty_drum_slot_is_absent() {
        let mut bank = WaveBank::new();
        bank.drums.push(Sample::new("empty", SampleData::Mono8(vec![]), 22050));
        assert!(bank.drum(0).is_none());
        assert!(bank.wave(0).is_none());
    }

    #[test]
    fn long_names_are_truncated() {
        let name = "a-very-long-sample-name-that-does-not-fit";
        let sample = Sample::new(name, SampleData::Mono8(vec![1]), 22050);
        assert_eq!(sample.name.len(), 32);
    }
}
