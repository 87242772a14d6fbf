//! Companion wavetable resource and drum sample loading.
//!
//! The resource holds 100 single-cycle 8-bit melodic waves back to back,
//! followed by a region of embedded RIFF/WAVE percussion samples that are
//! found by scanning for their signature.

use std::f64::consts::TAU;
use std::fs;
use std::path::Path;

use et_ir::{Sample, SampleData, WaveBank, WAVE_COUNT, WAVE_LEN};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::{debug, info, warn};

use crate::wav_format::load_wav;
use crate::FormatError;

/// Bytes occupied by the melodic waves.
pub const WAVETABLE_BYTES: usize = WAVE_COUNT * WAVE_LEN;

const NOISE_SEED: u64 = 0x5EED_D12A;
const NOISE_RATE: u32 = 22050;
const NOISE_LEN: usize = 3300;

/// Load melodic waves from `offset` and scan the rest for drums.
pub fn load_wavetable(data: &[u8], offset: usize) -> Result<WaveBank, FormatError> {
    let available = data.len().saturating_sub(offset);
    if available < WAVETABLE_BYTES {
        return Err(FormatError::WavetableTruncated {
            needed: WAVETABLE_BYTES,
            found: available,
        });
    }

    let region = &data[offset..offset + WAVETABLE_BYTES];
    let waves = region
        .chunks_exact(WAVE_LEN)
        .map(|chunk| {
            let mut wave = [0i8; WAVE_LEN];
            for (dst, &src) in wave.iter_mut().zip(chunk) {
                *dst = src as i8;
            }
            wave
        })
        .collect();

    let drums = scan_riff_samples(&data[offset + WAVETABLE_BYTES..]);
    info!(waves = WAVE_COUNT, drums = drums.len(), "loaded wavetable");
    Ok(WaveBank { waves, drums })
}

/// Find every decodable RIFF/WAVE image in `data`, in file order.
pub fn scan_riff_samples(data: &[u8]) -> Vec<Sample> {
    let mut samples = Vec::new();
    let mut pos = 0;
    while pos + 12 <= data.len() {
        if &data[pos..pos + 4] != b"RIFF" || &data[pos + 8..pos + 12] != b"WAVE" {
            pos += 1;
            continue;
        }
        let declared = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]) as usize;
        let end = pos.saturating_add(8).saturating_add(declared).min(data.len());
        let name = format!("drum{:02}", samples.len());
        match load_wav(&data[pos..end], &name) {
            Ok(sample) => {
                samples.push(sample);
                pos = end.max(pos + 12);
            }
            Err(e) => {
                debug!(offset = pos, error = %e, "skipping undecodable RIFF image");
                pos += 4;
            }
        }
    }
    samples
}

/// Load every `.wav` file in `dir`, sorted by file name.
///
/// Files that fail to decode are logged and skipped.
pub fn load_drum_dir(dir: &Path) -> Result<Vec<Sample>, FormatError> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    paths.sort();

    let mut samples = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = fs::read(&path)?;
        match load_wav(&bytes, &name) {
            Ok(sample) => samples.push(sample),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping drum sample"),
        }
    }
    Ok(samples)
}

/// Fallback instruments used when no wavetable is configured: sine,
/// square and saw cycles plus one noise burst drum.
pub fn builtin_bank() -> WaveBank {
    let mut sine = [0i8; WAVE_LEN];
    let mut square = [0i8; WAVE_LEN];
    let mut saw = [0i8; WAVE_LEN];
    for i in 0..WAVE_LEN {
        let phase = i as f64 / WAVE_LEN as f64;
        sine[i] = ((phase * TAU).sin() * 100.0).round() as i8;
        square[i] = if i < WAVE_LEN / 2 { 80 } else { -80 };
        saw[i] = (phase * 200.0 - 100.0).round() as i8;
    }

    let mut rng = Pcg32::seed_from_u64(NOISE_SEED);
    let noise: Vec<i16> = (0..NOISE_LEN)
        .map(|i| {
            let env = 1.0 - i as f64 / NOISE_LEN as f64;
            (rng.gen_range(-1.0..1.0) * env * env * 20000.0) as i16
        })
        .collect();

    WaveBank {
        waves: vec![sine, square, saw],
        drums: vec![Sample::new("noise", SampleData::Mono16(noise), NOISE_RATE)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav_format::tests::make_wav;

    fn blob(offset: usize, drums: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0xAA; offset];
        for w in 0..WAVE_COUNT {
            data.extend((0..WAVE_LEN).map(|i| (w + i) as u8));
        }
        data.extend(b"padding");
        for d in drums {
            data.extend(d);
            data.extend([0u8; 3]);
        }
        data
    }

    #[test]
    fn waves_read_from_offset() {
        let data = blob(16, &[]);
        let bank = load_wavetable(&data, 16).unwrap();
        assert_eq!(bank.waves.len(), WAVE_COUNT);
        assert_eq!(bank.waves[0][1], 1);
        assert_eq!(bank.waves[3][200], (203u8) as i8);
        assert!(bank.drums.is_empty());
    }

    #[test]
    fn drums_found_by_signature_in_order() {
        let kick = make_wav(1, 22050, 8, &[128, 200, 60]);
        let snare = make_wav(1, 11025, 16, &[0, 1, 2, 3]);
        let data = blob(0, &[kick, snare]);
        let bank = load_wavetable(&data, 0).unwrap();
        assert_eq!(bank.drums.len(), 2);
        assert_eq!(bank.drums[0].len(), 3);
        assert_eq!(bank.drums[1].sample_rate, 11025);
    }

    #[test]
    fn truncated_wavetable_is_error() {
        let data = vec![0u8; WAVETABLE_BYTES - 1];
        assert!(matches!(
            load_wavetable(&data, 0),
            Err(FormatError::WavetableTruncated { .. })
        ));
    }

    #[test]
    fn corrupt_riff_is_skipped() {
        let mut data = b"RIFF\x04\0\0\0WAVEjunk".to_vec();
        data.extend(make_wav(1, 22050, 8, &[128, 129]));
        let samples = scan_riff_samples(&data);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn drum_dir_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_snare.wav"), make_wav(1, 22050, 8, &[128; 4])).unwrap();
        fs::write(dir.path().join("a_kick.WAV"), make_wav(1, 22050, 8, &[128; 2])).unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        fs::write(dir.path().join("c_bad.wav"), b"nope").unwrap();
        let samples = load_drum_dir(dir.path()).unwrap();
        let names: Vec<&str> = samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a_kick", "b_snare"]);
    }

    #[test]
    fn builtin_bank_is_deterministic() {
        let a = builtin_bank();
        let b = builtin_bank();
        assert_eq!(a.waves.len(), 3);
        assert_eq!(a.drums[0].data, b.drums[0].data);
        assert_eq!(a.waves[0][64], 100);
    }
}
