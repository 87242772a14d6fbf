//! JSON project export and import.

use std::collections::BTreeMap;

use et_ir::{
    AutomationPoint, InstrumentId, LoopMode, LoopRegion, Note, Song, SourceFormat, TimeSignature,
    TrackInfo, TuningMapper, TuningProfile,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::FormatError;

pub const SONG_FILE_TYPE: &str = "edotrack-song";
pub const SONG_FILE_VERSION: &str = "1.0";

/// Tick resolution assumed when a document does not state one.
const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// Top-level exported document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDocument {
    pub file_type: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// BPM
    pub tempo: f64,
    /// `"N/D"`
    pub time_signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticks_per_beat: Option<u16>,
    /// Steps per octave the pitches were written under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edo: Option<u16>,
    #[serde(rename = "loop")]
    pub loop_block: LoopBlock,
    pub notes: Vec<NoteEntry>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopBlock {
    pub enabled: bool,
    pub start_measure: u32,
    pub end_measure: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    pub pitch: u16,
    /// 0-based measure
    pub measure: u32,
    /// Beats into the measure
    pub beat: f64,
    /// Length in beats
    pub duration: f64,
    pub velocity: u8,
    pub pan: i8,
    /// `"wave:N"` or `"drum:N"`
    pub instrument: String,
    pub loop_mode: LoopModeValue,
    #[serde(default)]
    pub volume_automation: Vec<VolumePoint>,
    #[serde(default)]
    pub pan_automation: Vec<PanPoint>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub freq_adjust: i16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<u8>,
}

/// `"infinite"` or a loop count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoopModeValue {
    Count(u8),
    Named(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumePoint {
    pub tick: u32,
    pub volume: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanPoint {
    pub tick: u32,
    pub pan: i8,
}

fn is_zero(v: &i16) -> bool {
    *v == 0
}

fn invalid(msg: impl Into<String>) -> FormatError {
    FormatError::InvalidSongFile(msg.into())
}

/// Convert a song into its exported document form.
pub fn export_song(song: &Song) -> SongDocument {
    let tpm = song.ticks_per_measure();
    let beat_ticks = song.ticks_per_signature_beat();
    let notes = song
        .notes
        .iter()
        .map(|n| {
            let measure = n.start_ticks / tpm;
            let within = n.start_ticks - measure * tpm;
            NoteEntry {
                pitch: n.pitch_step,
                measure,
                beat: within as f64 / beat_ticks,
                duration: n.duration_ticks as f64 / beat_ticks,
                velocity: n.velocity,
                pan: n.pan,
                instrument: n.instrument.to_string(),
                loop_mode: match n.loop_mode {
                    LoopMode::Infinite => LoopModeValue::Named("infinite".into()),
                    LoopMode::Finite(count) => LoopModeValue::Count(count),
                },
                volume_automation: n
                    .volume_automation
                    .iter()
                    .map(|p| VolumePoint {
                        tick: p.tick,
                        volume: p.value.clamp(0, 127) as u8,
                    })
                    .collect(),
                pan_automation: n
                    .pan_automation
                    .iter()
                    .map(|p| PanPoint {
                        tick: p.tick,
                        pan: p.value.clamp(-100, 100) as i8,
                    })
                    .collect(),
                freq_adjust: n.freq_adjust,
                track: Some(n.track),
            }
        })
        .collect();

    SongDocument {
        file_type: SONG_FILE_TYPE.into(),
        version: SONG_FILE_VERSION.into(),
        title: song.title.as_str().into(),
        tempo: song.bpm,
        time_signature: song.time_signature.to_string(),
        ticks_per_beat: Some(song.ticks_per_beat),
        edo: Some(song.tuning.steps_per_octave()),
        loop_block: LoopBlock {
            enabled: song.loop_region.enabled,
            start_measure: song.loop_region.start_measure,
            end_measure: song.loop_region.end_measure,
        },
        notes,
    }
}

/// Serialize a song as pretty-printed JSON.
pub fn song_to_json(song: &Song) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(&export_song(song))?)
}

/// Parse and validate a JSON document.
///
/// `tuning` applies when the document does not name its own division.
pub fn import_song(json: &str, tuning: TuningProfile) -> Result<Song, FormatError> {
    let doc: SongDocument =
        serde_json::from_str(json).map_err(|e| invalid(format!("malformed document: {}", e)))?;
    document_to_song(&doc, tuning)
}

/// Validate a document and rebuild the song it describes.
pub fn document_to_song(doc: &SongDocument, tuning: TuningProfile) -> Result<Song, FormatError> {
    if doc.file_type != SONG_FILE_TYPE {
        return Err(invalid(format!("unexpected fileType {:?}", doc.file_type)));
    }
    if doc.version.split('.').next() != Some("1") {
        return Err(invalid(format!("unsupported version {:?}", doc.version)));
    }
    if !doc.tempo.is_finite() || doc.tempo <= 0.0 {
        return Err(invalid("tempo must be positive"));
    }
    let tuning = match doc.edo {
        Some(steps) => TuningProfile::from_steps(steps)
            .ok_or_else(|| invalid(format!("unsupported edo {}", steps)))?,
        None => tuning,
    };
    let mapper = TuningMapper::new(tuning);

    let mut song = Song::new(&doc.title);
    song.format = SourceFormat::Json;
    song.tuning = tuning;
    song.bpm = doc.tempo;
    song.ticks_per_beat = doc.ticks_per_beat.unwrap_or(DEFAULT_TICKS_PER_BEAT).max(1);
    song.time_signature = parse_time_signature(&doc.time_signature)?;
    song.loop_region = LoopRegion::new(
        doc.loop_block.enabled,
        doc.loop_block.start_measure,
        doc.loop_block.end_measure,
    );
    if song.loop_region.enabled && doc.loop_block.end_measure < doc.loop_block.start_measure {
        return Err(invalid("loop end before loop start"));
    }

    let tpm = song.ticks_per_measure();
    let beat_ticks = song.ticks_per_signature_beat();
    let mut tracks: BTreeMap<u8, bool> = BTreeMap::new();

    for (i, entry) in doc.notes.iter().enumerate() {
        let note = entry_to_note(entry, tpm, beat_ticks, &mapper).map_err(|msg| invalid(format!("note {}: {}", i, msg)))?;
        let percussive = tracks.entry(note.track).or_insert(false);
        *percussive |= note.instrument.is_percussion();
        song.notes.push(note);
    }

    song.tracks = tracks
        .into_iter()
        .map(|(index, percussion)| TrackInfo::new(index, percussion))
        .collect();
    song.sort_notes();
    debug!(notes = song.notes.len(), "imported song document");
    Ok(song)
}

fn parse_time_signature(text: &str) -> Result<TimeSignature, FormatError> {
    let bad = || invalid(format!("bad time signature {:?}", text));
    let (num, den) = text.split_once('/').ok_or_else(bad)?;
    let numerator: u8 = num.trim().parse().map_err(|_| bad())?;
    let denominator: u8 = den.trim().parse().map_err(|_| bad())?;
    if numerator == 0 || !denominator.is_power_of_two() || denominator > 64 {
        return Err(bad());
    }
    Ok(TimeSignature {
        numerator,
        denominator,
    })
}

fn entry_to_note(
    entry: &NoteEntry,
    ticks_per_measure: u32,
    beat_ticks: f64,
    mapper: &TuningMapper,
) -> Result<Note, String> {
    if entry.pitch > mapper.max_step() {
        return Err(format!("pitch {} out of range", entry.pitch));
    }
    if entry.velocity > 127 {
        return Err("velocity above 127".into());
    }
    if !(-100..=100).contains(&entry.pan) {
        return Err("pan outside -100..100".into());
    }
    if !entry.beat.is_finite() || entry.beat < 0.0 {
        return Err("negative beat".into());
    }
    if !entry.duration.is_finite() || entry.duration <= 0.0 {
        return Err("duration must be positive".into());
    }
    let instrument: InstrumentId = entry.instrument.parse().map_err(|e| format!("{}", e))?;
    let loop_mode = match &entry.loop_mode {
        LoopModeValue::Named(name) if name == "infinite" => LoopMode::Infinite,
        LoopModeValue::Count(0) => LoopMode::Infinite,
        LoopModeValue::Count(n) => LoopMode::Finite(*n),
        LoopModeValue::Named(other) => return Err(format!("unknown loopMode {:?}", other)),
    };

    let start = entry.measure as u64 * ticks_per_measure as u64 + (entry.beat * beat_ticks).round() as u64;
    let start = u32::try_from(start).map_err(|_| "start tick out of range".to_string())?;
    let duration = ((entry.duration * beat_ticks).round() as u32).max(1);

    let mut note = Note::new(start, duration, entry.pitch, instrument);
    note.velocity = entry.velocity;
    note.pan = entry.pan;
    note.loop_mode = loop_mode;
    note.freq_adjust = entry.freq_adjust;
    note.track = entry.track.unwrap_or(if instrument.is_percussion() { 8 } else { 0 });

    note.volume_automation = checked_lane(
        entry.volume_automation.iter().map(|p| (p.tick, p.volume as i16)),
        duration,
        0..=127,
    )?;
    note.pan_automation = checked_lane(
        entry.pan_automation.iter().map(|p| (p.tick, p.pan as i16)),
        duration,
        -100..=100,
    )?;
    Ok(note)
}

fn checked_lane(
    points: impl Iterator<Item = (u32, i16)>,
    duration: u32,
    range: std::ops::RangeInclusive<i16>,
) -> Result<Vec<AutomationPoint>, String> {
    let mut lane: Vec<AutomationPoint> = Vec::new();
    for (tick, value) in points {
        if lane.last().is_some_and(|last| last.tick >= tick) {
            return Err("automation ticks must strictly increase".into());
        }
        if tick >= duration {
            return Err(format!("automation tick {} past note end", tick));
        }
        if !range.contains(&value) {
            return Err(format!("automation value {} out of range", value));
        }
        lane.push(AutomationPoint::new(tick, value));
    }
    Ok(lane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_song() -> Song {
        let mut song = Song::new("demo");
        song.ticks_per_beat = 96;
        song.bpm = 140.0;
        song.time_signature = TimeSignature { numerator: 3, denominator: 4 };
        song.loop_region = LoopRegion::new(true, 1, 3);
        let mut a = Note::new(0, 96, 152, InstrumentId::Melodic(7));
        a.pan = -40;
        a.loop_mode = LoopMode::Finite(2);
        a.push_volume_point(10, 60);
        a.push_pan_point(20, 30);
        let mut b = Note::new(300, 33, 40, InstrumentId::Percussion(2));
        b.track = 8;
        b.freq_adjust = -12;
        song.notes = vec![a, b];
        song
    }

    #[test]
    fn document_shape() {
        let doc = export_song(&sample_song());
        assert_eq!(doc.file_type, SONG_FILE_TYPE);
        assert_eq!(doc.title, "demo");
        assert_eq!(doc.time_signature, "3/4");
        assert_eq!(doc.notes[1].measure, 1);
        assert!((doc.notes[1].beat - 12.0 / 96.0).abs() < 1e-12);
        assert_eq!(doc.notes[1].instrument, "drum:2");

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["loop"]["startMeasure"], 1);
        assert_eq!(json["notes"][0]["loopMode"], 2);
        assert_eq!(json["notes"][0]["volumeAutomation"][0]["volume"], 60);
        assert!(json["notes"][0].get("freqAdjust").is_none());
    }

    #[test]
    fn round_trip_preserves_notes() {
        let song = sample_song();
        let json = song_to_json(&song).unwrap();
        let back = import_song(&json, TuningProfile::Edo46).unwrap();
        assert_eq!(back.title, song.title);
        assert_eq!(back.notes, song.notes);
        assert_eq!(back.tuning, TuningProfile::Edo38);
        assert_eq!(back.loop_region, song.loop_region);
        assert_eq!(back.tracks.len(), 2);
        assert!(back.tracks[1].percussion);
    }

    #[test]
    fn wrong_file_type_is_rejected() {
        let mut doc = export_song(&sample_song());
        doc.file_type = "something-else".into();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            import_song(&json, TuningProfile::Edo38),
            Err(FormatError::InvalidSongFile(_))
        ));
    }

    #[test]
    fn malformed_json_is_invalid_song_file() {
        assert!(matches!(
            import_song("{\"fileType\": 3", TuningProfile::Edo38),
            Err(FormatError::InvalidSongFile(_))
        ));
    }

    #[test]
    fn minimal_document_uses_defaults() {
        let json = r#"{
            "fileType": "edotrack-song",
            "version": "1.0",
            "tempo": 120,
            "timeSignature": "4/4",
            "loop": {"enabled": false, "startMeasure": 0, "endMeasure": 0},
            "notes": [
                {"pitch": 10, "measure": 1, "beat": 1.5, "duration": 0.5, "velocity": 90,
                 "pan": 0, "instrument": "wave:3", "loopMode": "infinite"}
            ]
        }"#;
        let song = import_song(json, TuningProfile::Edo46).unwrap();
        assert_eq!(song.title.as_str(), "");
        assert_eq!(song.tuning, TuningProfile::Edo46);
        let note = &song.notes[0];
        assert_eq!(note.start_ticks, 1920 + 720);
        assert_eq!(note.duration_ticks, 240);
        assert_eq!(note.loop_mode, LoopMode::Infinite);
    }

    #[test]
    fn schema_violations_are_rejected() {
        let cases = [
            ("\"timeSignature\": \"4/4\"", "\"timeSignature\": \"4/3\""),
            ("\"wave:3\"", "\"flute:3\""),
            ("\"loopMode\": \"infinite\"", "\"loopMode\": \"forever\""),
            ("\"pitch\": 10", "\"pitch\": 9999"),
            ("\"duration\": 0.5", "\"duration\": 0"),
        ];
        let base = r#"{"fileType": "edotrack-song", "version": "1.0", "tempo": 120,
            "timeSignature": "4/4",
            "loop": {"enabled": false, "startMeasure": 0, "endMeasure": 0},
            "notes": [{"pitch": 10, "measure": 0, "beat": 0, "duration": 0.5, "velocity": 90,
                       "pan": 0, "instrument": "wave:3", "loopMode": "infinite"}]}"#;
        assert!(import_song(base, TuningProfile::Edo38).is_ok());
        for (from, to) in cases {
            let json = base.replace(from, to);
            assert!(
                matches!(import_song(&json, TuningProfile::Edo38), Err(FormatError::InvalidSongFile(_))),
                "{} accepted",
                to
            );
        }
    }
}
