//! Output that discards audio. Used when no device is wanted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use et_engine::Frame;

use crate::traits::{AudioError, AudioOutput};

/// Counts frames and throws them away, as fast as they arrive.
#[derive(Clone, Debug)]
pub struct NullOutput {
    sample_rate: u32,
    frames: Arc<AtomicU64>,
}

impl NullOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of frames written so far.
    pub fn frame_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames)
    }
}

impl AudioOutput for NullOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError> {
        self.frames.fetch_add(frames.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}
