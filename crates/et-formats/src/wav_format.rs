//! WAV encoding and decoding for PCM audio.

use std::io::Write;

use et_engine::Frame;
use et_ir::{Sample, SampleData};

use crate::FormatError;

// --- Writing ---

/// Write 16-bit stereo PCM.
pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> std::io::Result<()> {
    let num_channels: u16 = 2;
    let bits_per_sample: u16 = 16;
    let block_align = num_channels * (bits_per_sample / 8);
    let data_size = frames.len() as u32 * block_align as u32;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, num_channels, sample_rate, block_align, bits_per_sample)?;
    write_data_chunk(w, frames, data_size)
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(44 + frames.len() * 4);
    // writes into a Vec cannot fail
    let _ = write_wav(&mut buf, frames, sample_rate);
    buf
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    num_channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&num_channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())
}

fn write_data_chunk(w: &mut impl Write, frames: &[Frame], data_size: u32) -> std::io::Result<()> {
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for frame in frames {
        w.write_all(&frame.left.to_le_bytes())?;
        w.write_all(&frame.right.to_le_bytes())?;
    }
    Ok(())
}

// --- Reading ---

/// Decode an 8- or 16-bit PCM WAV into a mono sample.
///
/// Stereo input is averaged down to one channel.
pub fn load_wav(data: &[u8], name: &str) -> Result<Sample, FormatError> {
    let header = parse_header(data)?;
    let sample_data = read_pcm_data(data, &header);
    Ok(Sample::new(name, sample_data, header.sample_rate))
}

struct WavHeader {
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_offset: usize,
    data_size: usize,
}

fn parse_header(data: &[u8]) -> Result<WavHeader, FormatError> {
    if data.len() < 12 {
        return Err(FormatError::InvalidWav("shorter than RIFF header"));
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::InvalidWav("missing RIFF/WAVE tags"));
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32, u16)> = None;
    let mut data_chunk: Option<(usize, usize)> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;

        if chunk_id == b"fmt " && chunk_size >= 16 && pos + 24 <= data.len() {
            let format = read_u16_le(data, pos + 8);
            if format != 1 {
                return Err(FormatError::InvalidWav("not PCM"));
            }
            let channels = read_u16_le(data, pos + 10);
            let rate = read_u32_le(data, pos + 12);
            let bits = read_u16_le(data, pos + 22);
            fmt = Some((channels, rate, bits));
        } else if chunk_id == b"data" {
            data_chunk = Some((pos + 8, chunk_size));
            if fmt.is_some() {
                break;
            }
        }

        pos = pos.saturating_add(8 + chunk_size);
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let (num_channels, sample_rate, bits_per_sample) =
        fmt.ok_or(FormatError::InvalidWav("missing fmt chunk"))?;
    let (data_offset, data_size) = data_chunk.ok_or(FormatError::InvalidWav("missing data chunk"))?;

    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(FormatError::InvalidWav("only 8- and 16-bit PCM supported"));
    }
    if !(1..=2).contains(&num_channels) {
        return Err(FormatError::InvalidWav("only mono and stereo supported"));
    }
    if sample_rate == 0 {
        return Err(FormatError::InvalidWav("zero sample rate"));
    }

    Ok(WavHeader {
        num_channels,
        sample_rate,
        bits_per_sample,
        data_offset,
        data_size,
    })
}

fn read_pcm_data(data: &[u8], header: &WavHeader) -> SampleData {
    let start = header.data_offset.min(data.len());
    let end = header.data_offset.saturating_add(header.data_size).min(data.len());
    let raw = &data[start..end];

    match (header.bits_per_sample, header.num_channels) {
        (8, 1) => SampleData::Mono8(raw.iter().map(|&b| unsigned_to_i8(b)).collect()),
        (8, _) => SampleData::Mono8(
            raw.chunks_exact(2)
                .map(|c| ((unsigned_to_i8(c[0]) as i16 + unsigned_to_i8(c[1]) as i16) / 2) as i8)
                .collect(),
        ),
        (_, 1) => SampleData::Mono16(
            raw.chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        _ => SampleData::Mono16(
            raw.chunks_exact(4)
                .map(|c| {
                    let l = i16::from_le_bytes([c[0], c[1]]) as i32;
                    let r = i16::from_le_bytes([c[2], c[3]]) as i32;
                    ((l + r) / 2) as i16
                })
                .collect(),
        ),
    }
}

/// WAV 8-bit is unsigned 0-255, centre 128.
fn unsigned_to_i8(b: u8) -> i8 {
    (b as i16 - 128) as i8
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a minimal valid WAV file from raw parameters.
    pub(crate) fn make_wav(channels: u16, sample_rate: u32, bits: u16, pcm_data: &[u8]) -> Vec<u8> {
        let block_align = channels * (bits / 8);
        let byte_rate = sample_rate * block_align as u32;
        let data_size = pcm_data.len() as u32;
        let file_size = 36 + data_size;

        let mut buf = Vec::new();
        buf.extend(b"RIFF");
        buf.extend(&file_size.to_le_bytes());
        buf.extend(b"WAVE");
        buf.extend(b"fmt ");
        buf.extend(&16u32.to_le_bytes());
        buf.extend(&1u16.to_le_bytes());
        buf.extend(&channels.to_le_bytes());
        buf.extend(&sample_rate.to_le_bytes());
        buf.extend(&byte_rate.to_le_bytes());
        buf.extend(&block_align.to_le_bytes());
        buf.extend(&bits.to_le_bytes());
        buf.extend(b"data");
        buf.extend(&data_size.to_le_bytes());
        buf.extend(pcm_data);
        buf
    }

    #[test]
    fn load_8bit_mono() {
        let wav = make_wav(1, 22050, 8, &[128, 255, 0, 192]);
        let sample = load_wav(&wav, "test").unwrap();
        assert_eq!(sample.sample_rate, 22050);
        assert_eq!(sample.data, SampleData::Mono8(vec![0, 127, -128, 64]));
    }

    #[test]
    fn load_16bit_mono() {
        let pcm: Vec<u8> = [0i16, 1000, -1000, 32767]
            .iter()
            .flat_map(|&v| v.to_le_bytes())
            .collect();
        let wav = make_wav(1, 44100, 16, &pcm);
        let sample = load_wav(&wav, "test16").unwrap();
        assert_eq!(sample.data, SampleData::Mono16(vec![0, 1000, -1000, 32767]));
    }

    #[test]
    fn stereo_is_mixed_to_mono() {
        let pcm: Vec<u8> = [100i16, 200, -100, -300]
            .iter()
            .flat_map(|&v| v.to_le_bytes())
            .collect();
        let wav = make_wav(2, 44100, 16, &pcm);
        let sample = load_wav(&wav, "stereo").unwrap();
        assert_eq!(sample.data, SampleData::Mono16(vec![150, -200]));
    }

    #[test]
    fn written_wav_reads_back() {
        let frames = [Frame { left: 1000, right: -1000 }, Frame { left: 200, right: 400 }];
        let bytes = frames_to_wav(&frames, 48000);
        assert_eq!(bytes.len(), 44 + 8);
        let sample = load_wav(&bytes, "rt").unwrap();
        assert_eq!(sample.sample_rate, 48000);
        assert_eq!(sample.data, SampleData::Mono16(vec![0, 300]));
    }

    #[test]
    fn invalid_header_rejected() {
        assert!(load_wav(b"not a wav", "bad").is_err());
        assert!(load_wav(&[0; 10], "short").is_err());
    }
}
