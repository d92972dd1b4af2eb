//! Keystroke dispatch
//!
//! Owns the OS side of typing: the global debounce gate, the held-keys
//! registry and the cleanup obligation. Every OS call goes through an
//! [`InputBackend`]; a failed call is returned as a [`DispatchError`] and leaves
//! the registry exactly as it was.
//!
//! Invariants:
//! - the registry only contains keys whose `key_down` succeeded and whose
//!   `key_up` has not yet succeeded
//! - after [`KeystrokeDispatcher::shutdown`] (or drop) the registry is empty

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::domain::keyboard::KeyKind;
use crate::input::{InputBackend, InputError};

/// Failure at the dispatch boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to press '{key}': {source}")]
    Press { key: KeyKind, source: InputError },

    #[error("Failed to hold '{key}': {source}")]
    Hold { key: KeyKind, source: InputError },

    #[error("Failed to release '{key}': {source}")]
    Release { key: KeyKind, source: InputError },

    #[error("Failed to type text: {source}")]
    TypeText { source: InputError },
}

/// Outcome of a press attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Sent,
    /// Too soon after the last accepted press; dropped silently
    Debounced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Held,
    AlreadyHeld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotHeld,
}

/// Global minimum spacing between accepted presses, across all keys
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True if a press at `now` would be accepted
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_accepted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

/// Keys released (or not) during cleanup
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub released: Vec<KeyKind>,
    pub failed: Vec<(KeyKind, InputError)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Debounced keystroke dispatcher with a held-keys registry
pub struct KeystrokeDispatcher<B: InputBackend> {
    backend: B,
    debouncer: Debouncer,
    held: BTreeSet<KeyKind>,
    presses_sent: u64,
}

impl<B: InputBackend> KeystrokeDispatcher<B> {
    pub fn new(backend: B, debounce_interval: Duration) -> Self {
        Self {
            backend,
            debouncer: Debouncer::new(debounce_interval),
            held: BTreeSet::new(),
            presses_sent: 0,
        }
    }

    /// Atomic press-and-release, gated by the debounce interval
    ///
    /// The debounce clock only advances when the OS accepted the press.
    pub fn press(&mut self, key: KeyKind, now: Instant) -> Result<PressOutcome, DispatchError> {
        if !self.debouncer.ready(now) {
            debug!("Press of '{}' suppressed by debounce", key);
            return Ok(PressOutcome::Debounced);
        }

        self.backend
            .press_and_release(key)
            .map_err(|source| DispatchError::Press { key, source })?;

        self.debouncer.record(now);
        self.presses_sent += 1;
        info!("Pressed '{}'", key);
        Ok(PressOutcome::Sent)
    }

    /// Holds a key down until [`release`](Self::release) or shutdown
    ///
    /// Holding a key that is already held is a no-op.
    pub fn hold(&mut self, key: KeyKind) -> Result<HoldOutcome, DispatchError> {
        if self.held.contains(&key) {
            return Ok(HoldOutcome::AlreadyHeld);
        }

        self.backend
            .key_down(key)
            .map_err(|source| DispatchError::Hold { key, source })?;

        self.held.insert(key);
        info!("Holding '{}'", key);
        Ok(HoldOutcome::Held)
    }

    /// Releases a held key; releasing a key that is not held is a no-op
    pub fn release(&mut self, key: KeyKind) -> Result<ReleaseOutcome, DispatchError> {
        if !self.held.contains(&key) {
            return Ok(ReleaseOutcome::NotHeld);
        }

        self.backend
            .key_up(key)
            .map_err(|source| DispatchError::Release { key, source })?;

        self.held.remove(&key);
        info!("Released '{}'", key);
        Ok(ReleaseOutcome::Released)
    }

    /// Types a string directly, bypassing debounce
    pub fn type_text(&mut self, text: &str) -> Result<(), DispatchError> {
        self.backend
            .type_text(text)
            .map_err(|source| DispatchError::TypeText { source })?;
        info!("Typed {:?}", text);
        Ok(())
    }

    /// Releases every held key and empties the registry
    ///
    /// Keys whose release fails are reported and still dropped from the
    /// registry: after shutdown nothing is considered held. Calling this
    /// again is harmless.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for key in std::mem::take(&mut self.held) {
            match self.backend.key_up(key) {
                Ok(()) => {
                    info!("Released '{}' on shutdown", key);
                    report.released.push(key);
                }
                Err(err) => {
                    warn!("Could not release '{}' on shutdown: {}", key, err);
                    report.failed.push((key, err));
                }
            }
        }
        report
    }

    pub fn is_held(&self, key: KeyKind) -> bool {
        self.held.contains(&key)
    }

    pub fn held_keys(&self) -> impl Iterator<Item = KeyKind> + '_ {
        self.held.iter().copied()
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn presses_sent(&self) -> u64 {
        self.presses_sent
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: InputBackend> Drop for KeystrokeDispatcher<B> {
    fn drop(&mut self) {
        // Guaranteed cleanup, including unwinding out of the frame loop
        if !self.held.is_empty() {
            let report = self.shutdown();
            debug!(
                "Dispatcher dropped: released {} held key(s), {} failed",
                report.released.len(),
                report.failed.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keyboard::NamedKey;
    use crate::input::{InputEvent, RecordingBackend};
    use proptest::prelude::*;
    use std::panic::{self, AssertUnwindSafe};

    const SHIFT: KeyKind = KeyKind::Named(NamedKey::Shift);
    const CTRL: KeyKind = KeyKind::Named(NamedKey::Ctrl);
    const Q: KeyKind = KeyKind::Character('q');

    fn dispatcher(debounce_ms: u64) -> KeystrokeDispatcher<RecordingBackend> {
        KeystrokeDispatcher::new(RecordingBackend::new(), Duration::from_millis(debounce_ms))
    }

    fn at(start: Instant, secs: f64) -> Instant {
        start + Duration::from_secs_f64(secs)
    }

    #[test]
    fn debounce_scenario() {
        let mut d = dispatcher(300);
        let log = d.backend().log();
        let t0 = Instant::now();

        assert_eq!(d.press(Q, at(t0, 0.0)), Ok(PressOutcome::Sent));
        assert_eq!(d.press(Q, at(t0, 0.1)), Ok(PressOutcome::Debounced));
        assert_eq!(d.press(Q, at(t0, 0.35)), Ok(PressOutcome::Sent));
        assert_eq!(log.presses(), 2);
        assert_eq!(d.presses_sent(), 2);
    }

    #[test]
    fn debounce_is_global_across_keys() {
        let mut d = dispatcher(300);
        let t0 = Instant::now();
        assert_eq!(d.press(Q, t0), Ok(PressOutcome::Sent));
        assert_eq!(
            d.press(KeyKind::Named(NamedKey::Enter), at(t0, 0.2)),
            Ok(PressOutcome::Debounced)
        );
    }

    #[test]
    fn interval_boundary_is_accepted() {
        let mut d = dispatcher(300);
        let t0 = Instant::now();
        d.press(Q, t0).unwrap();
        assert_eq!(d.press(Q, t0 + Duration::from_millis(300)), Ok(PressOutcome::Sent));
    }

    #[test]
    fn failed_press_does_not_advance_debounce() {
        let mut d = dispatcher(300);
        let t0 = Instant::now();
        d.backend_mut().fail_key(Q);

        let err = d.press(Q, t0).unwrap_err();
        assert!(matches!(err, DispatchError::Press { key: Q, .. }));
        assert_eq!(d.debouncer().last_accepted(), None);

        // Another key right after the failure is not debounced
        assert_eq!(d.press(KeyKind::Character('w'), at(t0, 0.01)), Ok(PressOutcome::Sent));
    }

    #[test]
    fn hold_and_release_are_idempotent() {
        let mut d = dispatcher(0);
        let log = d.backend().log();

        assert_eq!(d.hold(SHIFT), Ok(HoldOutcome::Held));
        assert_eq!(d.hold(SHIFT), Ok(HoldOutcome::AlreadyHeld));
        assert!(d.is_held(SHIFT));

        assert_eq!(d.release(SHIFT), Ok(ReleaseOutcome::Released));
        assert_eq!(d.release(SHIFT), Ok(ReleaseOutcome::NotHeld));
        assert_eq!(d.release(CTRL), Ok(ReleaseOutcome::NotHeld));

        assert_eq!(log.events(), vec![InputEvent::KeyDown(SHIFT), InputEvent::KeyUp(SHIFT)]);
    }

    #[test]
    fn failed_hold_leaves_registry_unchanged() {
        let mut d = dispatcher(0);
        d.backend_mut().fail_key(CTRL);
        assert!(matches!(d.hold(CTRL), Err(DispatchError::Hold { .. })));
        assert_eq!(d.held_count(), 0);
    }

    #[test]
    fn failed_release_keeps_key_held() {
        let mut d = dispatcher(0);
        d.hold(SHIFT).unwrap();
        d.backend_mut().fail_key(SHIFT);

        assert!(matches!(d.release(SHIFT), Err(DispatchError::Release { .. })));
        assert!(d.is_held(SHIFT));

        d.backend_mut().heal_key(SHIFT);
        assert_eq!(d.release(SHIFT), Ok(ReleaseOutcome::Released));
    }

    #[test]
    fn shutdown_releases_everything() {
        let mut d = dispatcher(0);
        let log = d.backend().log();
        for key in [SHIFT, CTRL, Q] {
            d.hold(key).unwrap();
        }

        let report = d.shutdown();
        assert!(report.is_clean());
        assert_eq!(report.released.len(), 3);
        assert_eq!(d.held_count(), 0);

        let ups = log
            .events()
            .into_iter()
            .filter(|e| matches!(e, InputEvent::KeyUp(_)))
            .count();
        assert_eq!(ups, 3);

        // Second shutdown has nothing to do
        assert!(d.shutdown().released.is_empty());
    }

    #[test]
    fn shutdown_clears_registry_even_when_release_fails() {
        let mut d = dispatcher(0);
        d.hold(SHIFT).unwrap();
        d.hold(CTRL).unwrap();
        d.backend_mut().fail_key(CTRL);

        let report = d.shutdown();
        assert_eq!(report.released, vec![SHIFT]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(d.held_count(), 0);
    }

    #[test]
    fn drop_releases_held_keys() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        {
            let mut d = KeystrokeDispatcher::new(backend, Duration::ZERO);
            d.hold(SHIFT).unwrap();
        }
        assert_eq!(log.events().last(), Some(&InputEvent::KeyUp(SHIFT)));
    }

    #[test]
    fn panic_in_frame_loop_still_releases() {
        let backend = RecordingBackend::new();
        let log = backend.log();

        let result = panic::catch_unwind(AssertUnwindSafe(move || {
            let mut d = KeystrokeDispatcher::new(backend, Duration::ZERO);
            d.hold(SHIFT).unwrap();
            d.hold(CTRL).unwrap();
            panic!("simulated abnormal exit");
        }));

        assert!(result.is_err());
        let ups: Vec<_> = log
            .events()
            .into_iter()
            .filter(|e| matches!(e, InputEvent::KeyUp(_)))
            .collect();
        assert_eq!(ups.len(), 2);
    }

    #[test]
    fn type_text_passes_through() {
        let mut d = dispatcher(300);
        let log = d.backend().log();
        d.type_text("hello").unwrap();
        assert_eq!(log.events(), vec![InputEvent::TypeText("hello".to_string())]);

        d.backend_mut().fail_all(true);
        assert!(matches!(d.type_text("x"), Err(DispatchError::TypeText { .. })));
    }

    proptest! {
        #[test]
        fn accepted_presses_match_debounce_rule(
            mut offsets in proptest::collection::vec(0u64..3_000, 1..40),
            debounce_ms in 0u64..600,
        ) {
            offsets.sort_unstable();
            let t0 = Instant::now();
            let mut d = dispatcher(debounce_ms);

            let mut last: Option<u64> = None;
            let mut expected = 0usize;
            for &ms in &offsets {
                if last.is_none_or(|l| ms - l >= debounce_ms) {
                    expected += 1;
                    last = Some(ms);
                }
                d.press(Q, t0 + Duration::from_millis(ms)).unwrap();
            }

            prop_assert_eq!(d.backend().log().presses(), expected);
        }

        #[test]
        fn registry_tracks_latest_hold_or_release(
            ops in proptest::collection::vec((any::<bool>(), 0usize..4), 0..60),
        ) {
            let keys = [SHIFT, CTRL, KeyKind::Named(NamedKey::Alt), Q];
            let mut d = dispatcher(0);
            let mut model = BTreeSet::new();

            for (hold, idx) in ops {
                let key = keys[idx];
                if hold {
                    d.hold(key).unwrap();
                    model.insert(key);
                } else {
                    d.release(key).unwrap();
                    model.remove(&key);
                }
                let held: BTreeSet<KeyKind> = d.held_keys().collect();
                prop_assert!(held.is_subset(&model));
                prop_assert_eq!(&held, &model);
            }

            d.shutdown();
            prop_assert_eq!(d.held_count(), 0);
        }
    }
}
