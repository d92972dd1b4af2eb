//! Keyboard layout model
//!
//! Static geometric layout of the on-screen keyboard. Answers "which key, if
//! any, occupies display point (x, y)?" and resolves every label once, at
//! build time, into a closed [`KeyKind`] so the dispatcher never has to do
//! string membership checks per frame.
//!
//! ## Design Principles
//! - **Pure**: no I/O, no rendering, just geometry and lookups
//! - **Immutable**: a [`Layout`] is built once and never mutated
//! - **Non-overlapping**: key rectangles are closed and never intersect, so
//!   the first match in layout order is the only match

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::core::{Point, Rect};

/// Standard QWERTY table, row by row
pub const QWERTY_ROWS: &[&[&str]] = &[
    &["`", "1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "-", "=", "backspace"],
    &["tab", "q", "w", "e", "r", "t", "y", "u", "i", "o", "p", "[", "]", "\\"],
    &["caps", "a", "s", "d", "f", "g", "h", "j", "k", "l", ";", "'", "enter"],
    &["shift", "z", "x", "c", "v", "b", "n", "m", ",", ".", "/", "shift"],
    &["ctrl", "win", "alt", "space", "alt", "win", "menu", "ctrl"],
];

/// Converts a static row table into the owned form [`Layout::build`] takes
pub fn rows_from(table: &[&[&str]]) -> Vec<Vec<String>> {
    table
        .iter()
        .map(|row| row.iter().map(|label| label.to_string()).collect())
        .collect()
}

/// Error types for layout construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// No rows, or only empty rows
    EmptyLayout,
    /// Key dimensions must be positive and spacing at least one pixel
    InvalidGeometry {
        key_width: i32,
        key_height: i32,
        key_spacing: i32,
    },
    /// Empty label in the row table
    EmptyLabel { row: usize, col: usize },
    /// Multi-character label that is not in the special-key table
    UnknownKeyName {
        row: usize,
        col: usize,
        label: String,
    },
    /// Special-key table maps a label to an OS key name we cannot simulate
    UnknownOsKey { label: String, os_name: String },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::EmptyLayout => write!(f, "Keyboard layout has no keys"),
            LayoutError::InvalidGeometry {
                key_width,
                key_height,
                key_spacing,
            } => write!(
                f,
                "Invalid key geometry {}x{} with spacing {} (sizes must be > 0, spacing >= 1)",
                key_width, key_height, key_spacing
            ),
            LayoutError::EmptyLabel { row, col } => {
                write!(f, "Empty key label at row {}, column {}", row, col)
            }
            LayoutError::UnknownKeyName { row, col, label } => write!(
                f,
                "Key '{}' at row {}, column {} is neither a single character nor a special key",
                label, row, col
            ),
            LayoutError::UnknownOsKey { label, os_name } => {
                write!(f, "Special key '{}' maps to unknown OS key '{}'", label, os_name)
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// Key position in the layout, (row, col), zero-based from the top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId {
    pub row: usize,
    pub col: usize,
}

impl KeyId {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.row, self.col)
    }
}

/// Named keys the OS input layer knows how to simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamedKey {
    Backspace,
    Tab,
    CapsLock,
    Enter,
    Shift,
    Ctrl,
    Alt,
    Win,
    Space,
    Menu,
}

impl NamedKey {
    pub const ALL: [NamedKey; 10] = [
        NamedKey::Backspace,
        NamedKey::Tab,
        NamedKey::CapsLock,
        NamedKey::Enter,
        NamedKey::Shift,
        NamedKey::Ctrl,
        NamedKey::Alt,
        NamedKey::Win,
        NamedKey::Space,
        NamedKey::Menu,
    ];

    /// OS-level key name
    pub fn os_name(self) -> &'static str {
        match self {
            NamedKey::Backspace => "backspace",
            NamedKey::Tab => "tab",
            NamedKey::CapsLock => "capslock",
            NamedKey::Enter => "enter",
            NamedKey::Shift => "shift",
            NamedKey::Ctrl => "ctrl",
            NamedKey::Alt => "alt",
            NamedKey::Win => "win",
            NamedKey::Space => "space",
            NamedKey::Menu => "menu",
        }
    }

    pub fn from_os_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.os_name() == name)
    }

    /// Width class used when laying out the key
    pub fn width_class(self) -> WidthClass {
        match self {
            NamedKey::Space => WidthClass::ExtraWide,
            NamedKey::Backspace | NamedKey::Enter => WidthClass::Wider,
            NamedKey::Tab | NamedKey::CapsLock | NamedKey::Shift => WidthClass::Wide,
            NamedKey::Ctrl | NamedKey::Alt | NamedKey::Win | NamedKey::Menu => WidthClass::Normal,
        }
    }
}

/// Relative key width, as a multiple of the base key width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthClass {
    /// 1x
    Normal,
    /// 1.3x (tab, caps, shift)
    Wide,
    /// 1.5x (backspace, enter)
    Wider,
    /// 6x (space)
    ExtraWide,
}

impl WidthClass {
    /// Pixel width for the given base width, truncating
    pub fn scale(self, base: i32) -> i32 {
        match self {
            WidthClass::Normal => base,
            WidthClass::Wide => base * 13 / 10,
            WidthClass::Wider => base * 3 / 2,
            WidthClass::ExtraWide => base * 6,
        }
    }
}

/// What a key produces when pressed, resolved once at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyKind {
    Character(char),
    Named(NamedKey),
}

impl KeyKind {
    pub fn is_named(&self) -> bool {
        matches!(self, KeyKind::Named(_))
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Character(ch) => write!(f, "{}", ch),
            KeyKind::Named(named) => f.write_str(named.os_name()),
        }
    }
}

/// Mapping from a layout label to the OS key name it simulates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialKeyTable {
    entries: BTreeMap<String, String>,
}

impl SpecialKeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard table (`caps` simulates `capslock`, the rest map to themselves)
    pub fn standard() -> Self {
        let mut table = Self::new();
        for named in NamedKey::ALL {
            let label = match named {
                NamedKey::CapsLock => "caps",
                other => other.os_name(),
            };
            table.insert(label, named.os_name());
        }
        table
    }

    pub fn insert(&mut self, label: impl Into<String>, os_name: impl Into<String>) {
        self.entries.insert(label.into(), os_name.into());
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Character or special key, as reported by [`Layout::key_info`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Character,
    Special,
}

/// Description of how a label is simulated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub label: String,
    pub class: KeyClass,
    pub os_name: String,
}

/// Geometry parameters for [`Layout::build`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutGeometry {
    pub key_width: i32,
    pub key_height: i32,
    pub key_spacing: i32,
    /// Top-left corner of the keyboard area
    pub origin: Point,
    /// Width of the keyboard area that rows are centred in
    pub keyboard_width: i32,
}

/// A single key of the layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub id: KeyId,
    pub label: String,
    pub rect: Rect,
    pub width_class: WidthClass,
    pub kind: KeyKind,
}

/// Immutable keyboard layout with per-key rectangles in display coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    keys: Vec<Key>,
    /// Index into `keys` of the first key of every row
    row_offsets: Vec<usize>,
    row_lengths: Vec<usize>,
    specials: SpecialKeyTable,
    geometry: LayoutGeometry,
}

impl Layout {
    /// Builds the layout from a row table
    ///
    /// Each row is centred independently inside `keyboard_width`. Rows start
    /// at `origin.y` and advance by `key_height + key_spacing`.
    pub fn build(
        rows: &[Vec<String>],
        geometry: LayoutGeometry,
        specials: SpecialKeyTable,
    ) -> Result<Self, LayoutError> {
        let LayoutGeometry {
            key_width,
            key_height,
            key_spacing,
            origin,
            keyboard_width,
        } = geometry;

        if key_width <= 0 || key_height <= 0 || key_spacing < 1 {
            return Err(LayoutError::InvalidGeometry {
                key_width,
                key_height,
                key_spacing,
            });
        }

        let mut keys = Vec::new();
        let mut row_offsets = Vec::with_capacity(rows.len());
        let mut row_lengths = Vec::with_capacity(rows.len());
        let mut y = origin.y;

        for (row_idx, row) in rows.iter().enumerate() {
            let mut resolved = Vec::with_capacity(row.len());
            for (col_idx, label) in row.iter().enumerate() {
                let label = label.as_str();
                let kind = resolve_label(label, row_idx, col_idx, &specials)?;
                let width_class = match kind {
                    KeyKind::Named(named) => named.width_class(),
                    KeyKind::Character(_) => WidthClass::Normal,
                };
                resolved.push((label, kind, width_class, width_class.scale(key_width)));
            }

            let row_width: i32 =
                resolved.iter().map(|(_, _, _, w)| w + key_spacing).sum::<i32>() - key_spacing;
            let mut x = origin.x + (keyboard_width - row_width).div_euclid(2);

            row_offsets.push(keys.len());
            row_lengths.push(resolved.len());
            for (col_idx, (label, kind, width_class, w)) in resolved.into_iter().enumerate() {
                keys.push(Key {
                    id: KeyId::new(row_idx, col_idx),
                    label: label.to_string(),
                    rect: Rect::new(x, y, w, key_height),
                    width_class,
                    kind,
                });
                x += w + key_spacing;
            }

            y += key_height + key_spacing;
        }

        if keys.is_empty() {
            return Err(LayoutError::EmptyLayout);
        }

        Ok(Self {
            keys,
            row_offsets,
            row_lengths,
            specials,
            geometry,
        })
    }

    /// Returns the key whose closed rectangle contains the point
    pub fn hit_test(&self, x: i32, y: i32) -> Option<KeyId> {
        self.keys
            .iter()
            .find(|key| key.rect.contains_point(x, y))
            .map(|key| key.id)
    }

    pub fn key(&self, id: KeyId) -> Option<&Key> {
        let offset = *self.row_offsets.get(id.row)?;
        if id.col >= self.row_lengths[id.row] {
            return None;
        }
        self.keys.get(offset + id.col)
    }

    /// Label of the key, e.g. `"q"` or `"caps"`
    pub fn character_of(&self, id: KeyId) -> Option<&str> {
        self.key(id).map(|key| key.label.as_str())
    }

    pub fn kind_of(&self, id: KeyId) -> Option<KeyKind> {
        self.key(id).map(|key| key.kind)
    }

    pub fn is_special(&self, label: &str) -> bool {
        self.specials.contains(label)
    }

    /// OS key name for a label; labels without a special mapping map to themselves
    pub fn os_name_of<'a>(&'a self, label: &'a str) -> &'a str {
        self.specials.get(label).unwrap_or(label)
    }

    pub fn key_info(&self, label: &str) -> KeyInfo {
        let class = if self.is_special(label) {
            KeyClass::Special
        } else {
            KeyClass::Character
        };
        KeyInfo {
            label: label.to_string(),
            class,
            os_name: self.os_name_of(label).to_string(),
        }
    }

    /// First key carrying the given label, in layout order
    pub fn find_label(&self, label: &str) -> Option<KeyId> {
        self.keys.iter().find(|key| key.label == label).map(|key| key.id)
    }

    /// All keys in layout (row-major) order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn row_count(&self) -> usize {
        self.row_offsets.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn specials(&self) -> &SpecialKeyTable {
        &self.specials
    }

    pub fn geometry(&self) -> LayoutGeometry {
        self.geometry
    }

    /// Bounding box of all keys
    pub fn bounds(&self) -> Rect {
        let first = self.keys[0].rect;
        self.keys.iter().skip(1).fold(first, |acc, key| acc.union(&key.rect))
    }
}

fn resolve_label(
    label: &str,
    row: usize,
    col: usize,
    specials: &SpecialKeyTable,
) -> Result<KeyKind, LayoutError> {
    if label.is_empty() {
        return Err(LayoutError::EmptyLabel { row, col });
    }

    if let Some(os_name) = specials.get(label) {
        return NamedKey::from_os_name(os_name)
            .map(KeyKind::Named)
            .ok_or_else(|| LayoutError::UnknownOsKey {
                label: label.to_string(),
                os_name: os_name.to_string(),
            });
    }

    let mut chars = label.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(KeyKind::Character(ch)),
        _ => Err(LayoutError::UnknownKeyName {
            row,
            col,
            label: label.to_string(),
        }),
    }
}
