//! Real-time audio thread and the queues that talk to it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use et_audio::{AudioError, AudioOutput};
use et_engine::{AudioEngine, Frame, PlaybackEngine, PlaybackEvent, PlaybackObserver, SampleCache};
use et_ir::Song;
use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};
use tracing::{debug, error, warn};

/// Opens the output on the audio thread; device handles are not `Send`.
pub type OutputFactory = Box<dyn FnOnce() -> Result<Box<dyn AudioOutput>, AudioError> + Send>;

/// Transport request queued for the audio thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Command {
    Play(Option<u32>),
    Pause,
    SetTempo(f64),
    SetLoop { enabled: bool, start: u32, end: u32 },
    Mute { track: u8, muted: bool },
}

/// No measure reached yet.
const NO_MEASURE: u32 = u32::MAX;

/// State the audio thread publishes for the controller.
#[derive(Debug)]
pub(crate) struct SharedTransport {
    pub shutdown: AtomicBool,
    pub finished: AtomicBool,
    pub playing: AtomicBool,
    measure: AtomicU32,
}

impl SharedTransport {
    pub fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            playing: AtomicBool::new(true),
            measure: AtomicU32::new(NO_MEASURE),
        }
    }

    pub fn measure(&self) -> Option<u32> {
        match self.measure.load(Ordering::Relaxed) {
            NO_MEASURE => None,
            m => Some(m),
        }
    }
}

/// Observer that mirrors events into the shared state and the event queue.
struct EventForwarder {
    events: HeapProd<PlaybackEvent>,
    shared: Arc<SharedTransport>,
}

impl PlaybackObserver for EventForwarder {
    fn on_event(&mut self, event: &PlaybackEvent) {
        match *event {
            PlaybackEvent::MeasureChange { measure } => self.shared.measure.store(measure, Ordering::Relaxed),
            PlaybackEvent::Stopped => {
                self.shared.playing.store(false, Ordering::Relaxed);
                self.shared.measure.store(NO_MEASURE, Ordering::Relaxed);
            }
            _ => {}
        }
        // a slow reader loses events rather than stalling audio
        let _ = self.events.try_push(*event);
    }
}

/// Everything the audio thread starts from.
pub(crate) struct Session {
    pub song: Song,
    pub samples: Arc<SampleCache>,
    pub lookahead: f64,
    pub tick: f64,
    pub muted: Vec<u8>,
    pub from: Option<u32>,
}

pub(crate) fn audio_thread(
    session: Session,
    open_output: OutputFactory,
    mut commands: HeapCons<Command>,
    events: HeapProd<PlaybackEvent>,
    shared: Arc<SharedTransport>,
    ready: SyncSender<Result<u32, AudioError>>,
) {
    let mut output = match open_output() {
        Ok(output) => output,
        Err(err) => {
            shared.finished.store(true, Ordering::Relaxed);
            shared.playing.store(false, Ordering::Relaxed);
            let _ = ready.send(Err(err));
            return;
        }
    };
    let sample_rate = output.sample_rate();
    let _ = ready.send(Ok(sample_rate));

    let mut audio = AudioEngine::new(sample_rate, session.song.tuning, session.samples);
    let mut playback = PlaybackEngine::new(session.song).with_timing(session.lookahead, session.tick);
    for track in session.muted {
        playback.set_track_mute_index(track, true);
    }
    playback.subscribe(Box::new(EventForwarder {
        events,
        shared: Arc::clone(&shared),
    }));
    playback.play(&mut audio, session.from);

    // 10 ms blocks
    let mut block = vec![Frame::silence(); (sample_rate as usize / 100).max(64)];
    while !shared.shutdown.load(Ordering::Relaxed) {
        while let Some(command) = commands.try_pop() {
            apply(command, &mut playback, &mut audio, &shared);
        }
        playback.render(&mut audio, &mut block);
        if let Err(err) = output.write(&block) {
            error!(%err, "audio output failed");
            break;
        }
    }

    // let the stop fade reach the device
    playback.stop(&mut audio);
    audio.render(&mut block);
    let _ = output.write(&block);
    if let Err(err) = output.stop() {
        warn!(%err, "failed to stop audio output");
    }
    shared.playing.store(false, Ordering::Relaxed);
    shared.finished.store(true, Ordering::Relaxed);
    debug!("audio thread exited");
}

fn apply(command: Command, playback: &mut PlaybackEngine, audio: &mut AudioEngine, shared: &SharedTransport) {
    debug!(?command, "transport command");
    match command {
        Command::Play(from) => {
            shared.playing.store(true, Ordering::Relaxed);
            playback.play(audio, from);
        }
        Command::Pause => {
            playback.pause();
            shared.playing.store(false, Ordering::Relaxed);
        }
        Command::SetTempo(bpm) => {
            playback.set_tempo(bpm);
        }
        Command::SetLoop { enabled, start, end } => playback.set_loop(enabled, start, end),
        Command::Mute { track, muted } => playback.set_track_mute_index(track, muted),
    }
}
