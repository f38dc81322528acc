//! Event types and key identifiers.
//!
//! The constants are a subset of `linux/input-event-codes.h`: everything a keyboard-emulating
//! barcode scanner commonly emits. Codes without a named constant are still representable.

use std::{error::Error, fmt, io, str::FromStr};

ffi_enum! {
    /// Types of [`InputEvent`][crate::event::InputEvent]s.
    pub enum EventType: u16 {
        /// Synchronization event; separates groups of events.
        SYN = 0x00,
        /// [`KeyEvent`][crate::event::KeyEvent]: A key press, release, or repeat.
        KEY = 0x01,
        /// A relative axis movement.
        REL = 0x02,
        /// An absolute axis change.
        ABS = 0x03,
        /// A miscellaneous event. Scanners typically send `MSC_SCAN` before every key event.
        MSC = 0x04,
        /// An LED changed state, or is requested to change state.
        LED = 0x11,
        /// The autorepeat settings have changed.
        REP = 0x14,
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant_name() {
            Some(name) => write!(f, "EV_{name}"),
            None => write!(f, "EventType({:#x})", self.0),
        }
    }
}

impl EventType {
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

ffi_enum! {
    /// Synchronization event types.
    pub enum Syn: u16 {
        /// Marks the end of a group of events.
        REPORT = 0,
        /// Indicates that one or more events were dropped due to overflow of the kernel buffer.
        DROPPED = 3,
    }
}

impl fmt::Debug for Syn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant_name() {
            Some(name) => write!(f, "SYN_{name}"),
            None => write!(f, "Syn({:#x})", self.0),
        }
    }
}

impl Syn {
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

/// Error returned by [`FromStr`] implementations when no matching constant was found.
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownVariant {
    _p: (),
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown variant name")
    }
}
impl Error for UnknownVariant {}
impl From<UnknownVariant> for io::Error {
    fn from(value: UnknownVariant) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, value)
    }
}

ffi_enum! {
    /// An *evdev* key identifier.
    ///
    /// This is the event code of [`KeyEvent`][super::KeyEvent]s.
    ///
    /// The associated constants mimic the preprocessor constants in `linux/input-event-codes.h`,
    /// and [`Key`] uses the constant's name when formatted with `Debug`. [`FromStr`] parses the
    /// same names.
    ///
    /// Only the number row keys [`Key::KEY_0`] through [`Key::KEY_9`] produce barcode digits (see
    /// [`Key::digit`]). Keypad digits are *not* digits for this purpose; like any other key, they
    /// terminate a barcode.
    pub enum Key: u16 {
        KEY_RESERVED     = 0,
        KEY_ESC          = 1,
        KEY_1            = 2,
        KEY_2            = 3,
        KEY_3            = 4,
        KEY_4            = 5,
        KEY_5            = 6,
        KEY_6            = 7,
        KEY_7            = 8,
        KEY_8            = 9,
        KEY_9            = 10,
        KEY_0            = 11,
        KEY_MINUS        = 12,
        KEY_EQUAL        = 13,
        KEY_BACKSPACE    = 14,
        KEY_TAB          = 15,
        KEY_Q            = 16,
        KEY_W            = 17,
        KEY_E            = 18,
        KEY_R            = 19,
        KEY_T            = 20,
        KEY_Y            = 21,
        KEY_U            = 22,
        KEY_I            = 23,
        KEY_O            = 24,
        KEY_P            = 25,
        KEY_ENTER        = 28,
        KEY_LEFTCTRL     = 29,
        KEY_A            = 30,
        KEY_S            = 31,
        KEY_D            = 32,
        KEY_F            = 33,
        KEY_G            = 34,
        KEY_H            = 35,
        KEY_J            = 36,
        KEY_K            = 37,
        KEY_L            = 38,
        KEY_LEFTSHIFT    = 42,
        KEY_Z            = 44,
        KEY_X            = 45,
        KEY_C            = 46,
        KEY_V            = 47,
        KEY_B            = 48,
        KEY_N            = 49,
        KEY_M            = 50,
        KEY_DOT          = 52,
        KEY_SLASH        = 53,
        KEY_RIGHTSHIFT   = 54,
        KEY_LEFTALT      = 56,
        KEY_SPACE        = 57,
        KEY_CAPSLOCK     = 58,
        KEY_NUMLOCK      = 69,
        KEY_KP7          = 71,
        KEY_KP8          = 72,
        KEY_KP9          = 73,
        KEY_KPMINUS      = 74,
        KEY_KP4          = 75,
        KEY_KP5          = 76,
        KEY_KP6          = 77,
        KEY_KPPLUS       = 78,
        KEY_KP1          = 79,
        KEY_KP2          = 80,
        KEY_KP3          = 81,
        KEY_KP0          = 82,
        KEY_KPDOT        = 83,
        KEY_KPENTER      = 96,
    }
}

impl Key {
    #[inline]
    pub const fn from_raw(code: u16) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns the name of the constant for this key (eg. `"KEY_ENTER"`), if there is one.
    pub fn name(self) -> Option<&'static str> {
        self.variant_name()
    }

    /// Returns the ASCII digit produced by this key, if it is one of the number row keys.
    ///
    /// Every key for which this returns [`None`] is a barcode terminator.
    pub const fn digit(self) -> Option<u8> {
        match self {
            Self::KEY_0 => Some(b'0'),
            // `KEY_1`..=`KEY_9` are contiguous, `KEY_0` comes after them.
            Self(code @ 2..=10) => Some(b'1' + (code - 2) as u8),
            _ => None,
        }
    }

    /// Returns the number row key that types the ASCII digit `digit`.
    pub const fn for_digit(digit: u8) -> Option<Self> {
        match digit {
            b'0' => Some(Self::KEY_0),
            b'1'..=b'9' => Some(Self(2 + (digit - b'1') as u16)),
            _ => None,
        }
    }
}

impl FromStr for Key {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_variant_name(s).ok_or(UnknownVariant { _p: () })
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.variant_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Key({:#x})", self.0),
        }
    }
}
