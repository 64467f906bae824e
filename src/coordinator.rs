//! Serializes analysis runs and cancels superseded ones.
//!
//! Every accepted trigger bumps a shared generation counter. A run may only
//! merge its results while its token still equals the counter; a newer run
//! makes the older one stale without interrupting it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// Issued by [`RunCoordinator::begin`] for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunToken {
    generation: u64,
    note_id: String,
    threshold: f32,
}

impl RunToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn note_id(&self) -> &str {
        &self.note_id
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunState {
    pub latest_processed_note_id: Option<String>,
    pub latest_similarity_threshold: Option<f32>,
    pub run_token: u64,
    /// Run currently holding the newest token
    pub running: Option<InFlight>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InFlight {
    pub note_id: String,
    pub similarity_threshold: f32,
}

#[derive(Default)]
pub struct RunCoordinator {
    generation: AtomicU64,
    state: Mutex<RunState>,
}

impl RunCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run for `note_id`, or `None` when it would repeat the last
    /// completed run or the one in flight.
    pub fn begin(&self, note_id: &str, threshold: f32) -> Option<RunToken> {
        let mut state = self.lock();

        let repeats_latest = state.latest_processed_note_id.as_deref() == Some(note_id)
            && state.latest_similarity_threshold == Some(threshold);
        if repeats_latest {
            log::debug!("'{note_id}' already processed at threshold {threshold}");
            return None;
        }

        let in_flight = state
            .running
            .as_ref()
            .is_some_and(|r| r.note_id == note_id && r.similarity_threshold == threshold);
        if in_flight {
            log::debug!("'{note_id}' is already being processed");
            return None;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.run_token = generation;
        state.running = Some(InFlight {
            note_id: note_id.to_string(),
            similarity_threshold: threshold,
        });

        Some(RunToken {
            generation,
            note_id: note_id.to_string(),
            threshold,
        })
    }

    /// Whether no newer run has started since `token` was issued.
    pub fn is_current(&self, token: &RunToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.generation
    }

    /// Record a finished run. Stale tokens leave the state alone.
    pub fn complete(&self, token: &RunToken) {
        let mut state = self.lock();
        if !self.is_current(token) {
            log::debug!("run {} finished after being superseded", token.generation);
            return;
        }
        state.latest_processed_note_id = Some(token.note_id.clone());
        state.latest_similarity_threshold = Some(token.threshold);
        state.running = None;
    }

    /// Forget the last completed and in-flight runs so the next trigger always starts.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.latest_processed_note_id = None;
        state.latest_similarity_threshold = None;
        state.running = None;
    }

    pub fn state(&self) -> RunState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunState> {
        // the state is plain data, a poisoned lock still holds a usable value
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_after_completion_is_noop() {
        let coordinator = RunCoordinator::new();
        let token = coordinator.begin("A", 0.75).unwrap();
        coordinator.complete(&token);

        assert!(coordinator.begin("A", 0.75).is_none());
        assert!(coordinator.begin("A", 0.5).is_some());
    }

    #[test]
    fn test_different_note_starts_new_run() {
        let coordinator = RunCoordinator::new();
        let token = coordinator.begin("A", 0.75).unwrap();
        coordinator.complete(&token);

        let next = coordinator.begin("B", 0.75).unwrap();
        assert_eq!(next.generation(), token.generation() + 1);
        assert_eq!(next.note_id(), "B");
    }

    #[test]
    fn test_in_flight_duplicate_is_noop() {
        let coordinator = RunCoordinator::new();
        let _token = coordinator.begin("A", 0.75).unwrap();
        assert!(coordinator.begin("A", 0.75).is_none());
    }

    #[test]
    fn test_newer_run_supersedes() {
        let coordinator = RunCoordinator::new();
        let old = coordinator.begin("A", 0.75).unwrap();
        let new = coordinator.begin("B", 0.75).unwrap();

        assert!(!coordinator.is_current(&old));
        assert!(coordinator.is_current(&new));

        // stale completion records nothing
        coordinator.complete(&old);
        let state = coordinator.state();
        assert_eq!(state.latest_processed_note_id, None);
        assert_eq!(state.running.as_ref().map(|r| r.note_id.as_str()), Some("B"));

        coordinator.complete(&new);
        let state = coordinator.state();
        assert_eq!(state.latest_processed_note_id.as_deref(), Some("B"));
        assert_eq!(state.latest_similarity_threshold, Some(0.75));
        assert_eq!(state.run_token, new.generation());
        assert!(state.running.is_none());
    }

    #[test]
    fn test_reset_allows_repeat() {
        let coordinator = RunCoordinator::new();
        let token = coordinator.begin("A", 0.75).unwrap();
        coordinator.complete(&token);

        coordinator.reset();
        let again = coordinator.begin("A", 0.75).unwrap();
        assert!(again.generation() > token.generation());
    }
}
