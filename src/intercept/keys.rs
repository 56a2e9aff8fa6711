//! Key event model, modifier tracking and macOS virtual key tables
//!
//! Key codes are the ANSI virtual key codes reported by CGEvent
//! (`kVK_ANSI_*` in HIToolbox/Events.h).

use std::time::Instant;

/// A single modifier key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Shift,
    Control,
    Option,
    Command,
    Function,
}

/// Modifier flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
    pub const FUNCTION: CGEventFlags = CGEventFlags::CGEventFlagSecondaryFn;
}

/// Which modifier keys are held for an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub option: bool,
    pub command: bool,
    pub function: bool,
}

impl Modifiers {
    /// Create a new Modifiers value from CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(event_flags: core_graphics::event::CGEventFlags) -> Self {
        Self {
            shift: event_flags.contains(flags::SHIFT),
            control: event_flags.contains(flags::CONTROL),
            option: event_flags.contains(flags::OPTION),
            command: event_flags.contains(flags::COMMAND),
            function: event_flags.contains(flags::FUNCTION),
        }
    }

    /// Build a set from a list of modifiers
    pub fn of(modifiers: &[Modifier]) -> Self {
        let mut set = Self::default();
        for modifier in modifiers {
            match modifier {
                Modifier::Shift => set.shift = true,
                Modifier::Control => set.control = true,
                Modifier::Option => set.option = true,
                Modifier::Command => set.command = true,
                Modifier::Function => set.function = true,
            }
        }
        set
    }
}

/// A key press captured while locked
///
/// Built inside the tap callback, so it holds no heap data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Printable character on a US layout, if any
    pub character: Option<char>,
    /// macOS virtual key code
    pub key_code: u16,
    pub modifiers: Modifiers,
    pub timestamp: Instant,
}

impl KeyEvent {
    pub fn new(key_code: u16, modifiers: Modifiers) -> Self {
        Self {
            character: character_for(key_code, modifiers.shift),
            key_code,
            modifiers,
            timestamp: Instant::now(),
        }
    }

    /// Text to speak for this key: the letter or digit itself, otherwise the key name
    pub fn spoken_text(&self) -> Option<String> {
        match self.character {
            Some(c) if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase().to_string()),
            _ => key_name(self.key_code).map(str::to_owned),
        }
    }
}

/// The reserved key chord that releases the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockShortcut {
    pub key_code: u16,
    pub modifiers: Modifiers,
}

impl Default for UnlockShortcut {
    /// Control + Option + U
    fn default() -> Self {
        Self {
            key_code: codes::U,
            modifiers: Modifiers::of(&[Modifier::Control, Modifier::Option]),
        }
    }
}

impl UnlockShortcut {
    /// Shift and Fn are ignored so the chord works regardless of caps/fn state
    pub fn matches(&self, key_code: u16, modifiers: Modifiers) -> bool {
        key_code == self.key_code
            && modifiers.control == self.modifiers.control
            && modifiers.option == self.modifiers.option
            && modifiers.command == self.modifiers.command
    }
}

/// macOS virtual key codes used by name elsewhere in the crate
pub mod codes {
    pub const U: u16 = 32;
    pub const RETURN: u16 = 36;
    pub const TAB: u16 = 48;
    pub const SPACE: u16 = 49;
    pub const DELETE: u16 = 51;
    pub const ESCAPE: u16 = 53;
}

#[rustfmt::skip]
const LETTERS: &[(u16, char)] = &[
    (0, 'a'), (1, 's'), (2, 'd'), (3, 'f'), (4, 'h'), (5, 'g'), (6, 'z'),
    (7, 'x'), (8, 'c'), (9, 'v'), (11, 'b'), (12, 'q'), (13, 'w'), (14, 'e'),
    (15, 'r'), (16, 'y'), (17, 't'), (31, 'o'), (32, 'u'), (34, 'i'), (35, 'p'),
    (37, 'l'), (38, 'j'), (40, 'k'), (45, 'n'), (46, 'm'),
];

#[rustfmt::skip]
const DIGITS: &[(u16, char, char)] = &[
    (18, '1', '!'), (19, '2', '@'), (20, '3', '#'), (21, '4', '$'), (23, '5', '%'),
    (22, '6', '^'), (26, '7', '&'), (28, '8', '*'), (25, '9', '('), (29, '0', ')'),
];

#[rustfmt::skip]
const PUNCTUATION: &[(u16, char, char)] = &[
    (24, '=', '+'), (27, '-', '_'), (30, ']', '}'), (33, '[', '{'), (39, '\'', '"'),
    (41, ';', ':'), (42, '\\', '|'), (43, ',', '<'), (44, '/', '?'), (47, '.', '>'),
    (50, '`', '~'),
];

const NAMES: &[(u16, &str)] = &[
    (codes::RETURN, "return"),
    (codes::TAB, "tab"),
    (codes::SPACE, "space"),
    (codes::DELETE, "delete"),
    (codes::ESCAPE, "escape"),
    (24, "equals"),
    (27, "minus"),
    (30, "right bracket"),
    (33, "left bracket"),
    (39, "quote"),
    (41, "semicolon"),
    (42, "backslash"),
    (43, "comma"),
    (44, "slash"),
    (47, "period"),
    (50, "grave"),
    (55, "command"),
    (56, "shift"),
    (57, "caps lock"),
    (58, "option"),
    (59, "control"),
    (63, "function"),
    (96, "F5"),
    (97, "F6"),
    (98, "F7"),
    (99, "F3"),
    (100, "F8"),
    (101, "F9"),
    (103, "F11"),
    (109, "F10"),
    (111, "F12"),
    (115, "home"),
    (116, "page up"),
    (117, "forward delete"),
    (118, "F4"),
    (119, "end"),
    (120, "F2"),
    (121, "page down"),
    (122, "F1"),
    (123, "left"),
    (124, "right"),
    (125, "down"),
    (126, "up"),
];

/// Character produced by a key on the US ANSI layout
pub fn character_for(key_code: u16, shift: bool) -> Option<char> {
    if let Some(&(_, c)) = LETTERS.iter().find(|(code, _)| *code == key_code) {
        return Some(if shift { c.to_ascii_uppercase() } else { c });
    }
    DIGITS
        .iter()
        .chain(PUNCTUATION)
        .find(|(code, _, _)| *code == key_code)
        .map(|&(_, plain, shifted)| if shift { shifted } else { plain })
        .or(if key_code == codes::SPACE { Some(' ') } else { None })
}

/// Spoken name for non-alphanumeric keys
pub fn key_name(key_code: u16) -> Option<&'static str> {
    NAMES
        .iter()
        .find(|(code, _)| *code == key_code)
        .map(|&(_, name)| name)
}
