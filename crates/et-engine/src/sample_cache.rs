//! Playback-ready sample buffers.
//!
//! Melodic waveforms are pre-decimated to the per-octave cycle lengths in
//! [`PERIOD_SIZES`]; percussion samples are kept as-is. Lookups fall back
//! to slot 0 of the same family when a slot is absent.

use alloc::vec::Vec;
use et_ir::{InstrumentId, Sample, SampleData, WaveBank, WAVE_LEN};

use crate::frequency::PERIOD_SIZES;

/// One waveform decimated for every octave.
type CycleSet = Vec<SampleData>;

/// Decoded buffers shared by every voice.
#[derive(Clone, Debug, Default)]
pub struct SampleCache {
    waves: Vec<CycleSet>,
    drums: Vec<Sample>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every per-octave cycle buffer up front.
    pub fn from_bank(bank: &WaveBank) -> Self {
        let waves = bank
            .waves
            .iter()
            .map(|wave| PERIOD_SIZES.iter().map(|&size| decimate(wave, size as usize)).collect())
            .collect();
        Self {
            waves,
            drums: bank.drums.clone(),
        }
    }

    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    pub fn drum_count(&self) -> usize {
        self.drums.len()
    }

    /// Cycle buffer of `wave` for octave index `octave`.
    pub fn cycle(&self, wave: u8, octave: usize) -> Option<&SampleData> {
        self.waves.get(wave as usize).and_then(|set| set.get(octave))
    }

    pub fn drum(&self, slot: u8) -> Option<&Sample> {
        self.drums.get(slot as usize).filter(|s| !s.is_empty())
    }

    /// True if the exact slot is loaded.
    pub fn contains(&self, instrument: InstrumentId) -> bool {
        match instrument {
            InstrumentId::Melodic(i) => self.cycle(i, 0).is_some(),
            InstrumentId::Percussion(i) => self.drum(i).is_some(),
        }
    }

    /// The instrument that will actually sound for `instrument`: itself,
    /// slot 0 of its family, or nothing.
    pub fn resolve(&self, instrument: InstrumentId) -> Option<InstrumentId> {
        if self.contains(instrument) {
            return Some(instrument);
        }
        let fallback = match instrument {
            InstrumentId::Melodic(_) => InstrumentId::Melodic(0),
            InstrumentId::Percussion(_) => InstrumentId::Percussion(0),
        };
        self.contains(fallback).then_some(fallback)
    }
}

/// Average `WAVE_LEN / size` neighbouring samples into each output sample.
fn decimate(wave: &[i8; WAVE_LEN], size: usize) -> SampleData {
    let size = size.clamp(1, WAVE_LEN);
    let factor = WAVE_LEN / size;
    let data = wave
        .chunks(factor)
        .take(size)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / chunk.len() as i32) as i8
        })
        .collect();
    SampleData::Mono8(data)
}
