//! Audio subsystem (spec.md §6.2): opaque to the core. The Coordinator calls
//! four async methods, each returning when playback completes. A real
//! implementation guarantees at most one clip plays at a time and releases
//! resources on `stop`; this crate only specifies the trait and wraps every
//! call with a safety timeout (spec.md §6.2, "an internal safety timeout >=
//! 15s to avoid indefinite blocking; callers treat timeout and completion
//! identically").

use std::time::Duration;

use crate::roles::Role;

/// The four playback points the Night Flow Controller's per-step loop drives
/// (spec.md §4.3 "Per-step loop", §6.2).
pub trait AudioPlayer: Send {
    async fn play_night_begin_audio(&mut self);
    async fn play_role_beginning_audio(&mut self, role: Role);
    async fn play_role_ending_audio(&mut self, role: Role);
    async fn play_night_end_audio(&mut self);
    /// Stops whatever is currently playing and releases its resources.
    async fn stop(&mut self);
}

/// Runs one audio call with the configured safety timeout. Per spec.md
/// §6.2/§9, timeout and natural completion are treated identically by the
/// caller — this function just logs which one happened so an operator can
/// tell the difference after the fact (SPEC_FULL.md §9, open question 2).
pub async fn with_safety_timeout<F: std::future::Future<Output = ()>>(label: &str, timeout: Duration, fut: F) {
    match tokio::time::timeout(timeout, fut).await {
        Ok(()) => log::trace!("{label} finished"),
        Err(_) => log::warn!("{label} hit its {timeout:?} safety timeout; treating as complete"),
    }
}

/// A deterministic, instantaneous audio stub for tests — plays nothing,
/// returns immediately. Mirrors the teacher crate's habit of shipping one
/// concrete implementation (`CliPlayer`, `CliHandler`) alongside each trait.
#[derive(Debug, Default)]
pub struct NullAudioPlayer {
    pub calls: Vec<String>,
}

impl NullAudioPlayer {
    pub fn new() -> Self {
        NullAudioPlayer::default()
    }
}

impl AudioPlayer for NullAudioPlayer {
    async fn play_night_begin_audio(&mut self) {
        self.calls.push("night_begin".to_string());
    }

    async fn play_role_beginning_audio(&mut self, role: Role) {
        self.calls.push(format!("role_begin:{role:?}"));
    }

    async fn play_role_ending_audio(&mut self, role: Role) {
        self.calls.push(format!("role_end:{role:?}"));
    }

    async fn play_night_end_audio(&mut self) {
        self.calls.push("night_end".to_string());
    }

    async fn stop(&mut self) {
        self.calls.push("stop".to_string());
    }
}
