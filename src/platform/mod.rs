//! Platform-specific input backends
//!
//! Win32 keystroke injection lives here; every other platform types through
//! the dry-run backend.

#[cfg(windows)]
pub mod windows;

use log::info;

use crate::input::{DryRunBackend, InputBackend};

/// Picks the OS backend, or the dry-run backend when asked or unsupported
pub fn default_backend(dry_run: bool) -> Box<dyn InputBackend> {
    if dry_run {
        info!("Dry run: keystrokes are logged, not sent");
        return Box::new(DryRunBackend);
    }

    #[cfg(windows)]
    {
        Box::new(self::windows::SendInputBackend::new())
    }

    #[cfg(not(windows))]
    {
        log::warn!("No keystroke injection on this platform; falling back to dry run");
        Box::new(DryRunBackend)
    }
}
