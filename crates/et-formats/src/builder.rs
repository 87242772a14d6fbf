//! Folds parsed events into the note model.

use std::collections::{BTreeMap, VecDeque};

use et_ir::{
    micros_to_bpm, Diagnostic, Diagnostics, InstrumentId, LoopMode, LoopRegion, Note, RawEvent,
    RawEventKind, Song, SourceFormat, TimeSignature, TrackInfo, TuningMapper, TuningProfile,
};
use tracing::{debug, warn};

use crate::midi_format::MidiFile;
use crate::org_format::{OrgSong, DEFAULT_PAN};

const DRUM_CHANNEL: u8 = 9;
const PAN_CONTROLLER: u8 = 10;

/// 12-tone key MIDI drum hits are voiced at; keeps drum samples close to
/// their native rate.
const DRUM_KEY12: u8 = 27;

/// Pan bias per General MIDI program family (`program / 8`).
const FAMILY_PAN_BIAS: [i8; 16] = [0, 10, -10, -20, 0, -30, 20, 30, -25, 25, 15, -15, 0, 10, 0, 0];

/// Velocity scale (percent) per General MIDI program family.
const FAMILY_VELOCITY_SCALE: [u8; 16] = [
    100, 90, 85, 95, 110, 80, 85, 90, 90, 85, 80, 70, 75, 90, 100, 80,
];

/// Drum slot for General MIDI percussion keys 35..=81.
const GM_DRUM_SLOTS: [u8; 47] = [
    0, 0, 8, 2, 3, 2, 4, 5, 4, 5, 4, 6, 11, 11, 7, 11, // 35-50
    6, 7, 6, 9, 7, 9, 7, 10, 6, 9, 9, 9, 9, 9, 9, 9, // 51-66
    9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, // 67-81
];

/// Map a General MIDI percussion key to a drum slot.
pub fn gm_drum_slot(key: u8) -> u8 {
    key.checked_sub(35)
        .and_then(|i| GM_DRUM_SLOTS.get(i as usize))
        .copied()
        .unwrap_or(9)
}

/// Merge per-track event lists into one time-ordered stream.
///
/// The sort is stable: events on the same tick keep track order and, within
/// a track, file order. Only controls are pulled ahead of notes.
pub fn merge_tracks<'a>(tracks: impl IntoIterator<Item = &'a [RawEvent]>) -> Vec<RawEvent> {
    let mut merged: Vec<RawEvent> = tracks
        .into_iter()
        .flat_map(|events| events.iter().cloned())
        .collect();
    merged.sort_by_key(|e| (e.time, e.rank()));
    merged
}

fn record(diagnostics: &mut Diagnostics, diagnostic: Diagnostic) {
    debug!(%diagnostic, "recovered");
    diagnostics.push(diagnostic);
}

/// A note-on waiting for its release.
struct Pending {
    start: u32,
    velocity: u8,
    pan: i8,
}

/// Builds a [`Song`] from parsed files under a tuning profile.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoteModelBuilder {
    mapper: TuningMapper,
    octave_shift: i32,
}

impl NoteModelBuilder {
    pub fn new(tuning: TuningProfile) -> Self {
        Self {
            mapper: TuningMapper::new(tuning),
            octave_shift: 0,
        }
    }

    /// Shift MIDI keys by whole octaves before mapping.
    pub fn with_octave_shift(mut self, octave_shift: i32) -> Self {
        self.octave_shift = octave_shift;
        self
    }

    pub fn mapper(&self) -> &TuningMapper {
        &self.mapper
    }

    /// MIDI key 60 is C4.
    pub fn midi_step(&self, key: u8) -> u16 {
        self.mapper
            .to_step(key % 12, key as i32 / 12 - 1 + self.octave_shift)
    }

    /// Organya key 0 is C0.
    pub fn org_step(&self, key: u8) -> u16 {
        self.mapper.to_step(key % 12, key as i32 / 12)
    }

    pub fn build_midi(&self, midi: &MidiFile) -> Song {
        let merged = merge_tracks(midi.tracks.iter().map(|t| t.events.as_slice()));
        let mut diagnostics = midi.diagnostics.clone();

        let title = midi.tracks.first().and_then(|t| t.name.as_deref()).unwrap_or("");
        let mut song = Song::new(title);
        song.format = SourceFormat::EventList;
        song.tuning = self.mapper.profile();
        song.ticks_per_beat = midi.ticks_per_quarter;
        apply_meter(&merged, &mut song, &mut diagnostics);

        let programs = claim_instruments(&merged, &mut diagnostics);
        let lanes: BTreeMap<(u16, u8), u8> = programs
            .keys()
            .enumerate()
            .map(|(i, &key)| (key, i.min(u8::MAX as usize) as u8))
            .collect();
        song.tracks = lanes
            .iter()
            .map(|(&(_, channel), &lane)| TrackInfo::new(lane, channel == DRUM_CHANNEL))
            .collect();

        let mut pan_state: BTreeMap<(u16, u8), i8> = BTreeMap::new();
        let mut active: BTreeMap<(u16, u8, u8), VecDeque<Pending>> = BTreeMap::new();
        let mut notes = Vec::new();

        for ev in &merged {
            let channel_key = (ev.track, ev.channel);
            match ev.kind {
                RawEventKind::ControlChange { controller: PAN_CONTROLLER, value } => {
                    let pan = (value as i32 - 64) * 100 / 64;
                    pan_state.insert(channel_key, pan.clamp(-100, 100) as i8);
                }
                RawEventKind::NoteOn { key, velocity, .. } => {
                    let program = programs.get(&channel_key).copied().unwrap_or(0);
                    let cc_pan = pan_state.get(&channel_key).copied().unwrap_or(0);
                    let (velocity, pan) = if ev.channel == DRUM_CHANNEL {
                        (velocity.min(127), cc_pan)
                    } else {
                        shape_velocity_pan(program, velocity, cc_pan)
                    };
                    active
                        .entry((ev.track, ev.channel, key))
                        .or_default()
                        .push_back(Pending {
                            start: ev.time,
                            velocity,
                            pan,
                        });
                }
                RawEventKind::NoteOff { key } => {
                    let pending = active
                        .get_mut(&(ev.track, ev.channel, key))
                        .and_then(VecDeque::pop_front);
                    match pending {
                        Some(p) => {
                            let duration = ev.time.saturating_sub(p.start);
                            notes.push(self.midi_note(ev.track, ev.channel, key, &p, duration, &programs, &lanes));
                        }
                        None => record(
                            &mut diagnostics,
                            Diagnostic::OrphanNoteOff {
                                track: ev.track,
                                channel: ev.channel,
                                key,
                                tick: ev.time,
                            },
                        ),
                    }
                }
                _ => {}
            }
        }

        let one_beat = song.ticks_per_beat as u32;
        for ((track, channel, key), queue) in active {
            for p in queue {
                record(
                    &mut diagnostics,
                    Diagnostic::UnterminatedNote {
                        track,
                        channel,
                        key,
                        tick: p.start,
                    },
                );
                notes.push(self.midi_note(track, channel, key, &p, one_beat, &programs, &lanes));
            }
        }

        song.notes = notes;
        song.sort_notes();
        song.loop_region = LoopRegion::new(false, 0, song.measure_count());
        if diagnostics.unterminated_notes() > 0 || diagnostics.orphan_note_offs() > 0 {
            warn!(
                unterminated = diagnostics.unterminated_notes(),
                orphaned = diagnostics.orphan_note_offs(),
                "unpaired note events"
            );
        }
        song.diagnostics = diagnostics;
        debug!(notes = song.notes.len(), tracks = song.tracks.len(), "built MIDI note model");
        song
    }

    #[allow(clippy::too_many_arguments)]
    fn midi_note(
        &self,
        track: u16,
        channel: u8,
        key: u8,
        pending: &Pending,
        duration: u32,
        programs: &BTreeMap<(u16, u8), u8>,
        lanes: &BTreeMap<(u16, u8), u8>,
    ) -> Note {
        let (instrument, step) = if channel == DRUM_CHANNEL {
            (
                InstrumentId::Percussion(gm_drum_slot(key)),
                self.mapper.to_step(DRUM_KEY12 % 12, (DRUM_KEY12 / 12) as i32),
            )
        } else {
            let program = programs.get(&(track, channel)).copied().unwrap_or(0);
            (InstrumentId::Melodic(program % 100), self.midi_step(key))
        };
        let mut note = Note::new(pending.start, duration, step, instrument);
        note.velocity = pending.velocity;
        note.pan = pending.pan;
        note.track = lanes.get(&(track, channel)).copied().unwrap_or(0);
        note
    }

    pub fn build_org(&self, org: &OrgSong) -> Song {
        let mut song = Song::default();
        let mut diagnostics = Diagnostics::new();
        song.format = SourceFormat::Columnar;
        song.tuning = self.mapper.profile();
        song.bpm = org.effective_bpm();
        song.ticks_per_beat = org.ticks_per_beat();
        song.time_signature = TimeSignature {
            numerator: org.header.beats_per_bar,
            denominator: 4,
        };

        for track in &org.tracks {
            if track.events.is_empty() {
                continue;
            }
            let slot = track.index as usize;
            let inst = org.instruments[slot];
            let percussion = track.is_percussion();
            let instrument = if percussion {
                InstrumentId::Percussion(inst.instrument)
            } else {
                InstrumentId::Melodic(inst.instrument)
            };
            song.tracks.push(TrackInfo::new(track.index, percussion));

            let mut current: Option<usize> = None;
            for ev in org.track_events(slot) {
                let sounding = current.filter(|&i| song.notes[i].contains_tick(ev.time));
                match ev.kind {
                    RawEventKind::NoteOn { key, velocity, pan, length } => {
                        let mut note = Note::new(ev.time, length.unwrap_or(1), self.org_step(key), instrument);
                        note.velocity = org_velocity(velocity);
                        note.pan = org_pan(pan.unwrap_or(DEFAULT_PAN));
                        note.track = track.index;
                        if !percussion {
                            note.loop_mode = LoopMode::from_pipi(inst.pipi);
                            note.freq_adjust = (inst.pitch as i32 - 1000)
                                .clamp(i16::MIN as i32, i16::MAX as i32)
                                as i16;
                        }
                        current = Some(song.notes.len());
                        song.notes.push(note);
                    }
                    RawEventKind::AutomationVolume { volume } => match sounding {
                        Some(i) => {
                            song.notes[i].push_volume_point(ev.time, org_velocity(volume));
                        }
                        None => record(
                            &mut diagnostics,
                            Diagnostic::DiscardedAutomation { track: ev.track, tick: ev.time },
                        ),
                    },
                    RawEventKind::AutomationPan { pan } => match sounding {
                        Some(i) => {
                            song.notes[i].push_pan_point(ev.time, org_pan(pan));
                        }
                        None => record(
                            &mut diagnostics,
                            Diagnostic::DiscardedAutomation { track: ev.track, tick: ev.time },
                        ),
                    },
                    _ => {}
                }
            }
        }

        song.sort_notes();
        let tpm = song.ticks_per_measure();
        let header = org.header;
        // The scheduler loops whole measures: the start rounds down and the
        // end rounds up so a mid-measure loop end tick still plays through.
        song.loop_region = LoopRegion::new(
            header.loop_end > header.loop_start,
            header.loop_start / tpm,
            header.loop_end.div_ceil(tpm),
        );
        song.diagnostics = diagnostics;
        debug!(notes = song.notes.len(), bpm = song.bpm, "built Organya note model");
        song
    }
}

/// Take the first tempo and time signature; later ones are reported.
fn apply_meter(events: &[RawEvent], song: &mut Song, diagnostics: &mut Diagnostics) {
    let mut tempo_seen = false;
    let mut signature_seen = false;
    for ev in events {
        match ev.kind {
            RawEventKind::Tempo { micros_per_quarter } => {
                if tempo_seen {
                    record(diagnostics, Diagnostic::ExtraTempoChange { tick: ev.time });
                } else {
                    song.bpm = micros_to_bpm(micros_per_quarter);
                    tempo_seen = true;
                }
            }
            RawEventKind::TimeSignature { numerator, denominator_pow2 } => {
                if signature_seen {
                    record(diagnostics, Diagnostic::ExtraTimeSignature { tick: ev.time });
                } else {
                    song.time_signature = TimeSignature {
                        numerator: numerator.max(1),
                        denominator: 1u8 << denominator_pow2.min(6),
                    };
                    signature_seen = true;
                }
            }
            _ => {}
        }
    }
    if !tempo_seen {
        warn!("no tempo found, assuming 120 BPM");
        diagnostics.push(Diagnostic::NoTempo);
    }
    if !signature_seen {
        warn!("no time signature found, assuming 4/4");
        diagnostics.push(Diagnostic::NoTimeSignature);
    }
}

/// Fix each (track, channel) program at its first note-on.
///
/// The most recent program change on that channel at or before the note
/// wins, whichever track carried it. Changes after the claim are reported
/// and ignored. The drum channel is claimed
/// too so it gets a track lane, but its program is never used.
fn claim_instruments(events: &[RawEvent], diagnostics: &mut Diagnostics) -> BTreeMap<(u16, u8), u8> {
    // Program state is per channel across all tracks
    let mut latest = [0u8; 16];
    let mut claimed: BTreeMap<(u16, u8), u8> = BTreeMap::new();
    for ev in events {
        let key = (ev.track, ev.channel);
        let channel = ev.channel as usize % 16;
        match ev.kind {
            RawEventKind::ProgramChange { program } => {
                latest[channel] = program;
                if claimed.contains_key(&key) && ev.channel != DRUM_CHANNEL {
                    record(
                        diagnostics,
                        Diagnostic::IgnoredProgramChange {
                            track: ev.track,
                            channel: ev.channel,
                            program,
                            tick: ev.time,
                        },
                    );
                }
            }
            RawEventKind::NoteOn { .. } => {
                claimed.entry(key).or_insert(latest[channel]);
            }
            _ => {}
        }
    }
    claimed
}

fn shape_velocity_pan(program: u8, velocity: u8, cc_pan: i8) -> (u8, i8) {
    let family = (program / 8) as usize % 16;
    let scaled = velocity as u32 * FAMILY_VELOCITY_SCALE[family] as u32 / 100;
    let pan = cc_pan as i32 + FAMILY_PAN_BIAS[family] as i32;
    (scaled.min(127) as u8, pan.clamp(-100, 100) as i8)
}

/// Organya volume byte 0..254 to velocity 0..127.
fn org_velocity(volume: u8) -> u8 {
    (volume / 2).min(127)
}

/// Organya pan byte 0..12 (6 = centre) to -100..100.
fn org_pan(pan: u8) -> i8 {
    let scaled = (pan.min(12) as f64 - 6.0) * 100.0 / 6.0;
    scaled.round() as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi_format::MidiTrack;
    use crate::org_format::tests::{build_org, ev};
    use crate::org_format::{parse_org, NO_CHANGE};
    use et_ir::AutomationPoint;
    use pretty_assertions::assert_eq;

    fn on(time: u32, track: u16, channel: u8, key: u8, velocity: u8) -> RawEvent {
        RawEvent::new(time, track, channel, RawEventKind::NoteOn { key, velocity, pan: None, length: None })
    }

    fn off(time: u32, track: u16, channel: u8, key: u8) -> RawEvent {
        RawEvent::new(time, track, channel, RawEventKind::NoteOff { key })
    }

    fn midi(tracks: Vec<Vec<RawEvent>>) -> MidiFile {
        MidiFile {
            format: 1,
            ticks_per_quarter: 480,
            tracks: tracks
                .into_iter()
                .map(|events| MidiTrack { name: None, events })
                .collect(),
            diagnostics: Diagnostics::new(),
        }
    }

    #[test]
    fn single_note_without_tempo() {
        for profile in [TuningProfile::Edo38, TuningProfile::Edo46] {
            let builder = NoteModelBuilder::new(profile);
            let song = builder.build_midi(&midi(vec![vec![on(0, 0, 0, 60, 100), off(480, 0, 0, 60)]]));
            assert_eq!(song.notes.len(), 1);
            let note = &song.notes[0];
            assert_eq!(note.start_ticks, 0);
            assert_eq!(note.duration_ticks, 480);
            assert_eq!(note.pitch_step, TuningMapper::new(profile).to_step(0, 4));
            assert_eq!(note.velocity, 100);
            assert_eq!(song.bpm, 120.0);
            assert!(song.diagnostics.contains(&Diagnostic::NoTempo));
        }
    }

    #[test]
    fn tempo_and_signature_take_first_event() {
        let meta = vec![
            RawEvent::new(0, 0, 0, RawEventKind::Tempo { micros_per_quarter: 400_000 }),
            RawEvent::new(0, 0, 0, RawEventKind::TimeSignature { numerator: 3, denominator_pow2: 2 }),
            RawEvent::new(960, 0, 0, RawEventKind::Tempo { micros_per_quarter: 500_000 }),
        ];
        let song = NoteModelBuilder::default().build_midi(&midi(vec![meta]));
        assert_eq!(song.bpm, 150.0);
        assert_eq!(song.time_signature, TimeSignature { numerator: 3, denominator: 4 });
        assert!(song.diagnostics.contains(&Diagnostic::ExtraTempoChange { tick: 960 }));
        assert!(!song.diagnostics.contains(&Diagnostic::NoTempo));
    }

    #[test]
    fn orphan_and_unterminated_are_recovered() {
        let events = vec![off(0, 0, 0, 50), on(100, 0, 0, 60, 90)];
        let song = NoteModelBuilder::default().build_midi(&midi(vec![events]));
        assert_eq!(song.diagnostics.orphan_note_offs(), 1);
        assert_eq!(song.diagnostics.unterminated_notes(), 1);
        assert_eq!(song.notes.len(), 1);
        assert_eq!(song.notes[0].start_ticks, 100);
        assert_eq!(song.notes[0].duration_ticks, 480);
    }

    #[test]
    fn overlapping_same_key_pairs_first_in_first_out() {
        let events = vec![on(0, 0, 0, 60, 100), on(100, 0, 0, 60, 100), off(200, 0, 0, 60), off(300, 0, 0, 60)];
        let song = NoteModelBuilder::default().build_midi(&midi(vec![events]));
        let spans: Vec<(u32, u32)> = song.notes.iter().map(|n| (n.start_ticks, n.duration_ticks)).collect();
        assert_eq!(spans, vec![(0, 200), (100, 200)]);
    }

    #[test]
    fn same_tick_on_off_is_a_one_tick_note() {
        let events = vec![on(0, 0, 9, 36, 100), off(0, 0, 9, 36), on(960, 0, 9, 36, 100), off(970, 0, 9, 36)];
        let song = NoteModelBuilder::default().build_midi(&midi(vec![events]));
        let spans: Vec<(u32, u32)> = song.notes.iter().map(|n| (n.start_ticks, n.duration_ticks)).collect();
        assert_eq!(spans, vec![(0, 1), (960, 10)]);
        assert_eq!(song.diagnostics.orphan_note_offs(), 0);
        assert_eq!(song.diagnostics.unterminated_notes(), 0);
    }

    #[test]
    fn retrigger_on_release_tick_keeps_file_order() {
        let events = vec![on(0, 0, 0, 60, 100), off(480, 0, 0, 60), on(480, 0, 0, 60, 90), off(960, 0, 0, 60)];
        let song = NoteModelBuilder::default().build_midi(&midi(vec![events]));
        let spans: Vec<(u32, u32)> = song.notes.iter().map(|n| (n.start_ticks, n.duration_ticks)).collect();
        assert_eq!(spans, vec![(0, 480), (480, 480)]);
        assert_eq!(song.diagnostics.orphan_note_offs(), 0);
        assert_eq!(song.diagnostics.unterminated_notes(), 0);
    }

    #[test]
    fn program_claimed_at_first_note() {
        let events = vec![
            RawEvent::new(0, 0, 2, RawEventKind::ProgramChange { program: 40 }),
            RawEvent::new(0, 0, 2, RawEventKind::ProgramChange { program: 41 }),
            on(10, 0, 2, 60, 100),
            off(20, 0, 2, 60),
            RawEvent::new(30, 0, 2, RawEventKind::ProgramChange { program: 7 }),
            on(40, 0, 2, 62, 100),
            off(50, 0, 2, 62),
        ];
        let song = NoteModelBuilder::default().build_midi(&midi(vec![events]));
        assert!(song.notes.iter().all(|n| n.instrument == InstrumentId::Melodic(41)));
        assert!(song.diagnostics.contains(&Diagnostic::IgnoredProgramChange {
            track: 0,
            channel: 2,
            program: 7,
            tick: 30
        }));
    }

    #[test]
    fn program_change_at_same_tick_on_other_track_is_visible() {
        let song = NoteModelBuilder::default().build_midi(&midi(vec![
            vec![on(0, 0, 0, 60, 100), off(10, 0, 0, 60)],
            vec![RawEvent::new(0, 1, 0, RawEventKind::ProgramChange { program: 105 })],
        ]));
        assert_eq!(song.notes[0].instrument, InstrumentId::Melodic(5));
    }

    #[test]
    fn drum_channel_maps_to_percussion() {
        let events = vec![on(0, 0, 9, 36, 100), off(10, 0, 9, 36), on(0, 0, 9, 42, 100), off(10, 0, 9, 42)];
        let song = NoteModelBuilder::default().build_midi(&midi(vec![events]));
        let instruments: Vec<InstrumentId> = song.notes.iter().map(|n| n.instrument).collect();
        assert!(instruments.contains(&InstrumentId::Percussion(0)));
        assert!(instruments.contains(&InstrumentId::Percussion(5)));
        assert!(song.tracks[0].percussion);
    }

    #[test]
    fn pan_controller_and_family_bias() {
        let events = vec![
            RawEvent::new(0, 0, 0, RawEventKind::ProgramChange { program: 40 }), // strings family
            RawEvent::new(0, 0, 0, RawEventKind::ControlChange { controller: 10, value: 96 }),
            on(0, 0, 0, 60, 100),
            off(10, 0, 0, 60),
        ];
        let song = NoteModelBuilder::default().build_midi(&midi(vec![events]));
        let note = &song.notes[0];
        // cc 96 -> +50, strings bias -30
        assert_eq!(note.pan, 20);
        assert_eq!(note.velocity, 80);
    }

    #[test]
    fn channels_get_dense_track_lanes() {
        let song = NoteModelBuilder::default().build_midi(&midi(vec![
            vec![on(0, 0, 3, 60, 100), off(10, 0, 3, 60)],
            vec![on(0, 1, 0, 60, 100), off(10, 1, 0, 60)],
        ]));
        let lanes: Vec<u8> = song.tracks.iter().map(|t| t.index).collect();
        assert_eq!(lanes, vec![0, 1]);
        assert_eq!(song.notes.iter().map(|n| n.track).max(), Some(1));
    }

    #[test]
    fn octave_shift_moves_whole_octaves() {
        let builder = NoteModelBuilder::new(TuningProfile::Edo38).with_octave_shift(-1);
        assert_eq!(builder.midi_step(60), 38 * 3);
    }

    #[test]
    fn org_automation_inside_note() {
        let events = [ev(0, 0, 10, 200, 6), ev(5, NO_CHANGE, NO_CHANGE, 100, NO_CHANGE)];
        let org = parse_org(&build_org(100, &[(0, 0, 0, &events[..])])).unwrap();
        let song = NoteModelBuilder::default().build_org(&org);
        assert_eq!(song.notes.len(), 1);
        let note = &song.notes[0];
        assert_eq!(note.duration_ticks, 10);
        assert_eq!(note.velocity, 100);
        assert_eq!(note.pan, 0);
        assert_eq!(note.volume_automation, vec![AutomationPoint::new(5, 50)]);
        assert!(note.pan_automation.is_empty());
    }

    #[test]
    fn org_automation_outside_note_is_discarded() {
        let events = [ev(0, 12, 4, 200, 6), ev(6, NO_CHANGE, NO_CHANGE, 40, 12)];
        let org = parse_org(&build_org(100, &[(1, 3, 2, &events[..])])).unwrap();
        let song = NoteModelBuilder::default().build_org(&org);
        let note = &song.notes[0];
        assert!(note.volume_automation.is_empty());
        assert_eq!(song.diagnostics.len(), 2);
        assert_eq!(note.instrument, InstrumentId::Melodic(3));
        assert_eq!(note.loop_mode, LoopMode::Finite(2));
        assert_eq!(note.pitch_step, TuningMapper::default().to_step(0, 1));
    }

    #[test]
    fn org_header_drives_timing_and_loop() {
        let events = [ev(0, 30, 1, 200, 0)];
        let org = parse_org(&build_org(125, &[(8, 2, 0, &events[..])])).unwrap();
        let song = NoteModelBuilder::default().build_org(&org);
        assert_eq!(song.bpm, 120.0);
        assert_eq!(song.ticks_per_beat, 4);
        assert_eq!(song.ticks_per_measure(), 16);
        assert_eq!(song.loop_region, LoopRegion::new(true, 0, 4));
        let note = &song.notes[0];
        assert_eq!(note.instrument, InstrumentId::Percussion(2));
        assert_eq!(note.pan, -100);
        assert_eq!(note.freq_adjust, 0);
        assert!(song.tracks[0].percussion);
        assert_eq!(song.tracks[0].name.as_str(), "Drum 8");
    }

    #[test]
    fn org_loop_bounds_widen_to_whole_measures() {
        let events = [ev(0, 30, 1, 200, 6)];
        let mut org = parse_org(&build_org(125, &[(0, 0, 0, &events[..])])).unwrap();
        // 16 ticks per measure: tick 20 is inside measure 1, tick 40 inside measure 2
        org.header.loop_start = 20;
        org.header.loop_end = 40;
        let song = NoteModelBuilder::default().build_org(&org);
        assert_eq!(song.loop_region, LoopRegion::new(true, 1, 3));

        org.header.loop_end = 48;
        let song = NoteModelBuilder::default().build_org(&org);
        assert_eq!(song.loop_region, LoopRegion::new(true, 1, 3));
    }
}
