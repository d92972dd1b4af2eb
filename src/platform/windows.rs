//! Win32 keystroke injection
//!
//! Characters are resolved to a virtual key for the active keyboard layout
//! with `VkKeyScanW`, wrapping the key in Shift when the layout needs it.
//! Characters with no plain or shifted mapping fall back to Unicode
//! injection. Named keys use a fixed virtual-key table.

use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, KEYBD_EVENT_FLAGS, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, SendInput, VIRTUAL_KEY, VK_APPS, VK_BACK, VK_CAPITAL,
    VK_CONTROL, VK_LWIN, VK_MENU, VK_RETURN, VK_SHIFT, VK_SPACE, VK_TAB, VkKeyScanW,
};

use crate::domain::keyboard::{KeyKind, NamedKey};
use crate::input::{InputBackend, InputError};

/// How a key is delivered to the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stroke {
    Virtual { vk: VIRTUAL_KEY, shift: bool, extended: bool },
    Unicode(char),
}

fn named_vk(named: NamedKey) -> (VIRTUAL_KEY, bool) {
    match named {
        NamedKey::Backspace => (VK_BACK, false),
        NamedKey::Tab => (VK_TAB, false),
        NamedKey::CapsLock => (VK_CAPITAL, false),
        NamedKey::Enter => (VK_RETURN, false),
        NamedKey::Shift => (VK_SHIFT, false),
        NamedKey::Ctrl => (VK_CONTROL, false),
        NamedKey::Alt => (VK_MENU, false),
        NamedKey::Win => (VK_LWIN, true),
        NamedKey::Space => (VK_SPACE, false),
        NamedKey::Menu => (VK_APPS, true),
    }
}

fn resolve(key: KeyKind) -> Stroke {
    match key {
        KeyKind::Named(named) => {
            let (vk, extended) = named_vk(named);
            Stroke::Virtual {
                vk,
                shift: false,
                extended,
            }
        }
        KeyKind::Character(ch) => {
            let mut units = [0u16; 2];
            if ch.encode_utf16(&mut units).len() != 1 {
                return Stroke::Unicode(ch);
            }
            let scan = unsafe { VkKeyScanW(units[0]) };
            if scan == -1 {
                return Stroke::Unicode(ch);
            }
            let vk = (scan as u16) & 0xff;
            let modifiers = ((scan as u16) >> 8) & 0xff;
            match modifiers {
                0 => Stroke::Virtual {
                    vk: VIRTUAL_KEY(vk),
                    shift: false,
                    extended: false,
                },
                1 => Stroke::Virtual {
                    vk: VIRTUAL_KEY(vk),
                    shift: true,
                    extended: false,
                },
                // Needs Ctrl or AltGr; let the OS compose it instead
                _ => Stroke::Unicode(ch),
            }
        }
    }
}

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn vk_event(vk: VIRTUAL_KEY, extended: bool, up: bool) -> INPUT {
    let mut flags = KEYBD_EVENT_FLAGS(0);
    if extended {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    if up {
        flags |= KEYEVENTF_KEYUP;
    }
    key_input(vk, 0, flags)
}

fn unicode_events(ch: char, down: bool, up: bool, out: &mut Vec<INPUT>) {
    let mut units = [0u16; 2];
    for &unit in ch.encode_utf16(&mut units).iter() {
        if down {
            out.push(key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE));
        }
        if up {
            out.push(key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP));
        }
    }
}

fn stroke_events(stroke: Stroke, down: bool, up: bool) -> Vec<INPUT> {
    let mut events = Vec::with_capacity(4);
    match stroke {
        Stroke::Virtual { vk, shift, extended } => {
            if down {
                if shift {
                    events.push(vk_event(VK_SHIFT, false, false));
                }
                events.push(vk_event(vk, extended, false));
            }
            if up {
                events.push(vk_event(vk, extended, true));
                if shift {
                    events.push(vk_event(VK_SHIFT, false, true));
                }
            }
        }
        Stroke::Unicode(ch) => unicode_events(ch, down, up, &mut events),
    }
    events
}

/// Keyboard injection through `SendInput`
#[derive(Debug, Default)]
pub struct SendInputBackend;

impl SendInputBackend {
    pub fn new() -> Self {
        Self
    }

    fn send(&self, label: &str, events: &[INPUT]) -> Result<(), InputError> {
        if events.is_empty() {
            return Ok(());
        }
        let sent = unsafe { SendInput(events, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != events.len() {
            let reason = windows::core::Error::from_win32().to_string();
            return Err(InputError::InjectionFailed {
                key: label.to_string(),
                reason: format!("{} of {} events accepted: {}", sent, events.len(), reason),
            });
        }
        Ok(())
    }

    fn stroke(&self, key: KeyKind, down: bool, up: bool) -> Result<(), InputError> {
        let events = stroke_events(resolve(key), down, up);
        self.send(&key.to_string(), &events)
    }
}

impl InputBackend for SendInputBackend {
    fn press_and_release(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.stroke(key, true, true)
    }

    fn key_down(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.stroke(key, true, false)
    }

    fn key_up(&mut self, key: KeyKind) -> Result<(), InputError> {
        self.stroke(key, false, true)
    }

    fn type_text(&mut self, text: &str) -> Result<(), InputError> {
        let mut events = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            unicode_events(ch, true, true, &mut events);
        }
        self.send(text, &events)
            .map_err(|err| InputError::TypeFailed(err.to_string()))
    }
}
