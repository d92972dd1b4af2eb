//! In-memory input backend
//!
//! Records every successful call into a shared [`InputLog`] and can be told
//! to fail specific keys. The log handle outlives the backend, so the events
//! sent during `Drop`-driven cleanup can still be inspected.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::domain::keyboard::KeyKind;
use crate::input::backend::{InputBackend, InputError};

/// One simulated OS action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    PressAndRelease(KeyKind),
    KeyDown(KeyKind),
    KeyUp(KeyKind),
    TypeText(String),
}

/// Shared, cloneable view of the recorded events
#[derive(Debug, Clone, Default)]
pub struct InputLog {
    events: Rc<RefCell<Vec<InputEvent>>>,
}

impl InputLog {
    pub fn events(&self) -> Vec<InputEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Number of atomic press events
    pub fn presses(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, InputEvent::PressAndRelease(_)))
            .count()
    }

    fn push(&self, event: InputEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    log: InputLog,
    failing: BTreeSet<KeyKind>,
    fail_all: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> InputLog {
        self.log.clone()
    }

    /// Makes every future call for `key` fail
    pub fn fail_key(&mut self, key: KeyKind) {
        self.failing.insert(key);
    }

    pub fn heal_key(&mut self, key: KeyKind) {
        self.failing.remove(&key);
    }

    pub fn fail_all(&mut self, fail: bool) {
        self.fail_all = fail;
    }

    fn check(&self, key: KeyKind) -> Result<(), InputError> {
        if self.fail_all || self.failing.contains(&key) {
            return Err(InputError::InjectionFailed {
                key: key.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl InputBackend for RecordingBackend {
    fn press_and_release(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.check(key)?;
        self.log.push(InputEvent::PressAndRelease(key));
        Ok(())
    }

    fn key_down(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.check(key)?;
        self.log.push(InputEvent::KeyDown(key));
        Ok(())
    }

    fn key_up(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.check(key)?;
        self.log.push(InputEvent::KeyUp(key));
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<(), InputError> {
        if self.fail_all {
            return Err(InputError::TypeFailed("simulated failure".to_string()));
        }
        self.log.push(InputEvent::TypeText(text.to_string()));
        Ok(())
    }
}
