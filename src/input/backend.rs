//! OS input simulation boundary
//!
//! [`InputBackend`] is the seam between the dispatcher and whatever actually
//! injects keystrokes into the OS. Every call may fail; failures are returned,
//! never swallowed, so the dispatcher can keep its held-keys registry honest.

use log::info;

use crate::domain::keyboard::KeyKind;

/// Errors raised by an input backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("No OS key mapping for '{0}'")]
    UnmappedKey(String),

    #[error("Key injection failed for '{key}': {reason}")]
    InjectionFailed { key: String, reason: String },

    #[error("Text injection failed: {0}")]
    TypeFailed(String),
}

/// Low-level key primitives exposed by the OS
pub trait InputBackend {
    /// Atomic press followed by release
    fn press_and_release(&mut self, key: KeyKind) -> Result<(), InputError>;

    fn key_down(&mut self, key: KeyKind) -> Result<(), InputError>;

    fn key_up(&mut self, key: KeyKind) -> Result<(), InputError>;

    fn type_text(&mut self, text: &str) -> Result<(), InputError>;
}

impl<B: InputBackend + ?Sized> InputBackend for Box<B> {
    fn press_and_release(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.as_mut().press_and_release(key)
    }

    fn key_down(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.as_mut().key_down(key)
    }

    fn key_up(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.as_mut().key_up(key)
    }

    fn type_text(&mut self, text: &str) -> Result<(), InputError> {
        self.as_mut().type_text(text)
    }
}

/// Backend that only logs what it would have sent
#[derive(Debug, Default)]
pub struct DryRunBackend;

impl InputBackend for DryRunBackend {
    fn press_and_release(&mut self, key: KeyKind) -> Result<(), InputError> {
        info!("[dry-run] press {}", key);
        Ok(())
    }

    fn key_down(&mut self, key: KeyKind) -> Result<(), InputError> {
        info!("[dry-run] key down {}", key);
        Ok(())
    }

    fn key_up(&mut self, key: KeyKind) -> Result<(), InputError> {
        info!("[dry-run] key up {}", key);
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<(), InputError> {
        info!("[dry-run] type {:?}", text);
        Ok(())
    }
}
