//! VoicePool: voice storage plus the per-pitch active-voice table.

use alloc::collections::BTreeMap;
use slotmap::{new_key_type, SlotMap};

use crate::voice::{Voice, VoiceState};

new_key_type! {
    /// Identifier for a voice in the pool. Stale keys never alias new voices.
    pub struct VoiceKey;
}

/// Maximum number of simultaneous voices.
pub const MAX_VOICES: usize = 128;

/// Centralized pool of voices.
#[derive(Default)]
pub struct VoicePool {
    voices: SlotMap<VoiceKey, Voice>,
    /// Pitch step -> the voice `stop_note` acts on.
    active: BTreeMap<u16, VoiceKey>,
}

impl VoicePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a voice. If `register` is set it becomes the active voice for
    /// its pitch; a previous voice on that pitch keeps sounding but can no
    /// longer be stopped by pitch.
    /// Steals a voice if the pool is full (priority: Finished > Stopping > Playing > Scheduled).
    pub fn insert(&mut self, voice: Voice, register: bool) -> VoiceKey {
        if self.voices.len() >= MAX_VOICES {
            if let Some(victim) = self.find_steal_candidate() {
                self.remove(victim);
            }
        }
        let pitch = voice.pitch_step;
        let key = self.voices.insert(voice);
        if register {
            self.active.insert(pitch, key);
        }
        key
    }

    fn find_steal_candidate(&self) -> Option<VoiceKey> {
        let priority = |state: VoiceState| match state {
            VoiceState::Finished => 0,
            VoiceState::Stopping => 1,
            VoiceState::Playing => 2,
            VoiceState::Scheduled => 3,
        };
        self.voices
            .iter()
            .min_by_key(|(_, v)| (priority(v.state), v.start_frame))
            .map(|(k, _)| k)
    }

    pub fn get(&self, key: VoiceKey) -> Option<&Voice> {
        self.voices.get(key)
    }

    pub fn get_mut(&mut self, key: VoiceKey) -> Option<&mut Voice> {
        self.voices.get_mut(key)
    }

    /// Active voice registered for `pitch`.
    pub fn active_for(&self, pitch: u16) -> Option<VoiceKey> {
        self.active.get(&pitch).copied().filter(|k| self.voices.contains_key(*k))
    }

    /// Remove the registration for `pitch`, returning the voice it pointed at.
    pub fn deregister(&mut self, pitch: u16) -> Option<VoiceKey> {
        self.active.remove(&pitch)
    }

    /// Drop every registration without touching the voices.
    pub fn clear_registrations(&mut self) {
        self.active.clear();
    }

    /// Kill (remove) a voice immediately.
    pub fn remove(&mut self, key: VoiceKey) -> Option<Voice> {
        let voice = self.voices.remove(key)?;
        if self.active.get(&voice.pitch_step) == Some(&key) {
            self.active.remove(&voice.pitch_step);
        }
        Some(voice)
    }

    /// Reclaim every finished voice.
    pub fn reap_finished(&mut self) {
        let before = self.voices.len();
        self.voices.retain(|_, v| !v.is_finished());
        if self.voices.len() != before {
            let voices = &self.voices;
            self.active.retain(|_, k| voices.contains_key(*k));
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (VoiceKey, &mut Voice)> {
        self.voices.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    #[cfg(test)]
    pub fn registered_count(&self) -> usize {
        self.active.len()
    }
}
