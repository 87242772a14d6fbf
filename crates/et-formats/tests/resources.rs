//! Integration tests for wave resources: the companion wavetable blob,
//! drum directories and the WAV writer feeding back into the reader.

use std::fs;

use et_engine::Frame;
use et_formats::{frames_to_wav, load_drum_dir, load_wav, load_wavetable, FormatError, WAVETABLE_BYTES};
use et_ir::{SampleData, WAVE_COUNT, WAVE_LEN};
use pretty_assertions::assert_eq;

/// 8-bit unsigned mono WAV.
fn wav8(rate: u32, samples: &[u8]) -> Vec<u8> {
    let mut data = b"RIFF".to_vec();
    data.extend((36 + samples.len() as u32).to_le_bytes());
    data.extend(b"WAVE");
    data.extend(b"fmt ");
    data.extend(16u32.to_le_bytes());
    data.extend(1u16.to_le_bytes());
    data.extend(1u16.to_le_bytes());
    data.extend(rate.to_le_bytes());
    data.extend(rate.to_le_bytes());
    data.extend(1u16.to_le_bytes());
    data.extend(8u16.to_le_bytes());
    data.extend(b"data");
    data.extend((samples.len() as u32).to_le_bytes());
    data.extend(samples);
    data
}

fn wave_region() -> Vec<u8> {
    (0..WAVE_COUNT)
        .flat_map(|w| std::iter::repeat(w as u8).take(WAVE_LEN))
        .collect()
}

#[test]
fn wavetable_with_embedded_drums() {
    let offset = 32;
    let mut blob = vec![0xAA; offset];
    blob.extend(wave_region());
    blob.extend(b"padding between samples");
    blob.extend(wav8(11025, &[128, 255, 0, 128]));
    blob.extend([0u8; 7]);
    let stereo = [Frame { left: 1000, right: 3000 }, Frame::mono(-400)];
    blob.extend(frames_to_wav(&stereo, 22050));

    let bank = load_wavetable(&blob, offset).unwrap();
    assert_eq!(bank.waves.len(), WAVE_COUNT);
    assert_eq!(bank.waves[0], [0; WAVE_LEN]);
    assert_eq!(bank.waves[99], [99; WAVE_LEN]);

    assert_eq!(bank.drums.len(), 2);
    assert_eq!(bank.drums[0].sample_rate, 11025);
    assert_eq!(bank.drums[0].data, SampleData::Mono8(vec![0, 127, -128, 0]));
    assert_eq!(bank.drums[1].sample_rate, 22050);
    assert_eq!(bank.drums[1].data, SampleData::Mono16(vec![2000, -400]));
}

#[test]
fn short_wavetable_is_rejected() {
    let blob = vec![0u8; WAVETABLE_BYTES - 1];
    match load_wavetable(&blob, 0) {
        Err(FormatError::WavetableTruncated { needed, found }) => {
            assert_eq!(needed, WAVETABLE_BYTES);
            assert_eq!(found, WAVETABLE_BYTES - 1);
        }
        other => panic!("expected WavetableTruncated, got {:?}", other.map(|b| b.drums.len())),
    }
}

#[test]
fn drum_dir_loads_sorted_wavs_and_skips_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b_snare.wav"), wav8(8000, &[200, 60])).unwrap();
    fs::write(dir.path().join("a_kick.WAV"), wav8(8000, &[128; 16])).unwrap();
    fs::write(dir.path().join("c_broken.wav"), b"RIFF\0\0\0\0WAVE").unwrap();
    fs::write(dir.path().join("readme.txt"), b"not audio").unwrap();

    let drums = load_drum_dir(dir.path()).unwrap();
    let names: Vec<&str> = drums.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["a_kick", "b_snare"]);
    assert_eq!(drums[0].data.len(), 16);
}

#[test]
fn missing_drum_dir_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(load_drum_dir(&missing), Err(FormatError::Io(_))));
}

#[test]
fn rendered_wav_reads_back_as_mono() {
    let frames: Vec<Frame> = (0..64).map(|i| Frame::mono(i * 100)).collect();
    let bytes = frames_to_wav(&frames, 44100);
    assert_eq!(bytes.len(), 44 + 64 * 4);

    let sample = load_wav(&bytes, "render").unwrap();
    assert_eq!(sample.sample_rate, 44100);
    let expected: Vec<i16> = (0..64).map(|i| i * 100).collect();
    assert_eq!(sample.data, SampleData::Mono16(expected));
}
