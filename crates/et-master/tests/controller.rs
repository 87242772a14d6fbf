//! Controller behaviour: loading, offline rendering and the audio thread.

use std::time::{Duration, Instant};

use et_audio::{AudioOutput, NullOutput};
use et_master::{Controller, MasterError, PlaybackEvent, PlayerConfig};

/// Single-track SMF: one note of `ticks` length per entry, back to back.
fn midi(keys: &[(u8, u16)]) -> Vec<u8> {
    let mut track = Vec::new();
    for &(key, ticks) in keys {
        track.extend_from_slice(&[0x00, 0x90, key, 100]);
        track.extend_from_slice(&varlen(ticks as u32));
        track.extend_from_slice(&[0x80, key, 0]);
    }
    track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    let mut data = b"MThd".to_vec();
    data.extend_from_slice(&6u32.to_be_bytes());
    data.extend_from_slice(&[0, 0, 0, 1, 0x01, 0xE0]);
    data.extend_from_slice(b"MTrk");
    data.extend_from_slice(&(track.len() as u32).to_be_bytes());
    data.extend_from_slice(&track);
    data
}

fn varlen(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.insert(0, (value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes
}

fn controller() -> Controller {
    Controller::with_bank(PlayerConfig::default(), &et_formats::builtin_bank())
}

fn null_output() -> et_master::OutputFactory {
    Box::new(|| Ok(Box::new(NullOutput::new(8000)) as Box<dyn AudioOutput>))
}

fn wait_until_stopped(ctrl: &Controller) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while ctrl.is_playing() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn failed_load_keeps_current_song() {
    let mut ctrl = controller();
    ctrl.load(&midi(&[(60, 480), (64, 480)])).unwrap();
    assert_eq!(ctrl.song().notes.len(), 2);

    let err = ctrl.load(b"MThd\x00\x00\x00\x06\x00\x00").unwrap_err();
    assert!(matches!(err, MasterError::Format(_)));
    assert!(ctrl.load(b"not a song").is_err());
    assert_eq!(ctrl.song().notes.len(), 2);
}

#[test]
fn offline_render_covers_the_song() {
    let mut ctrl = controller();
    ctrl.load(&midi(&[(60, 480)])).unwrap();
    let frames = ctrl.render_frames(8000, 8000 * 60);

    // one 4/4 measure at 120 bpm is two seconds
    assert!(frames.len() >= 16000);
    assert!(frames.len() <= 16000 + 8000 + 1024);
    assert!(frames[..4000].iter().any(|f| !f.is_silent()));
    assert!(frames[8000..16000].iter().all(|f| f.is_silent()));
}

#[test]
fn render_to_wav_writes_a_riff_file() {
    let mut ctrl = controller();
    ctrl.load(&midi(&[(48, 240)])).unwrap();
    let wav = ctrl.render_to_wav(8000, 1);
    assert_eq!(&wav[..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    // capped at one second plus the ringing tail
    assert!(wav.len() <= 44 + 4 * (8000 + 8000 + 1024));
}

#[test]
fn muted_track_renders_silence() {
    let mut ctrl = controller();
    ctrl.load(&midi(&[(60, 480)])).unwrap();
    let name = ctrl.song().tracks[0].name.to_string();
    assert!(ctrl.set_track_mute(&name, true));
    assert!(!ctrl.set_track_mute("missing", true));
    let frames = ctrl.render_frames(8000, 8000 * 4);
    assert!(frames.iter().all(|f| f.is_silent()));
}

#[test]
fn audio_thread_plays_to_the_end() {
    let mut ctrl = controller();
    ctrl.load(&midi(&[(60, 480), (62, 480)])).unwrap();
    ctrl.play_with(None, null_output()).unwrap();
    assert_eq!(ctrl.output_sample_rate(), Some(8000));
    wait_until_stopped(&ctrl);
    assert!(!ctrl.is_playing());

    let events = ctrl.poll_events();
    assert!(events.contains(&PlaybackEvent::MeasureChange { measure: 0 }));
    assert_eq!(events.last(), Some(&PlaybackEvent::Stopped));
    let starts = events
        .iter()
        .filter(|e| matches!(e, PlaybackEvent::NoteStart { .. }))
        .count();
    assert_eq!(starts, 2);

    ctrl.stop();
    ctrl.stop();
    assert!(ctrl.poll_events().is_empty());
}

#[test]
fn looping_session_runs_until_stopped() {
    let mut ctrl = controller();
    ctrl.load(&midi(&[(60, 480)])).unwrap();
    ctrl.set_loop(true, 0, 1);
    ctrl.play_with(Some(0), null_output()).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert!(ctrl.is_playing());
    ctrl.stop();
    assert!(!ctrl.is_playing());
}

#[test]
fn failing_output_surfaces_the_error() {
    let mut ctrl = controller();
    ctrl.load(&midi(&[(60, 480)])).unwrap();
    let result = ctrl.play_with(None, Box::new(|| Err(et_audio::AudioError::NoDevice)));
    assert!(matches!(result, Err(MasterError::Audio(_))));
    assert!(!ctrl.is_playing());
}
