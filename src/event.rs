//! Input event types.
//!
//! Devices deliver a stream of fixed-size [`InputEvent`] records. Each record carries:
//!
//! - **Timestamp** ([`InputEvent::time`]): when the kernel queued the event.
//! - **Event Type** ([`InputEvent::event_type`]): the broad category, eg. [`EventType::KEY`].
//! - **Event Code** ([`InputEvent::raw_code`]): which key (or axis, LED, ...) the event is about.
//! - **Event Value** ([`InputEvent::raw_value`]): what happened to it. For keys this is the
//!   [`KeyState`].
//!
//! Barcode scanning only looks at [`KeyEvent`]s; [`InputEvent::as_key`] extracts them.
//!
//! # `serde` support
//!
//! With the `serde` feature, [`Key`] implements [`Serialize`] and [`Deserialize`], so that
//! terminator keys can be stored in configuration files. Human-readable formats use the constant
//! name (`KEY_ENTER`) where one exists and the raw code otherwise, and accept both when
//! deserializing. Binary formats always use the raw code.
//!
//! [`Serialize`]: ::serde::Serialize
//! [`Deserialize`]: ::serde::Deserialize

pub(crate) mod codes;
#[cfg(any(test, feature = "serde"))]
mod serde;

use std::fmt;
use std::ops::Deref;
use std::time::{Duration, SystemTime};

use crate::raw::input::input_event;

pub use codes::{EventType, Key, Syn, UnknownVariant};

/// An input event received from or sent to an *evdev*.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct InputEvent(pub(crate) input_event);

impl InputEvent {
    /// Creates an [`InputEvent`] from raw values.
    ///
    /// The timestamp of the event will be set to 0.
    #[inline]
    pub const fn new(ty: EventType, raw_code: u16, raw_value: i32) -> Self {
        Self(input_event {
            time: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            type_: ty.0,
            code: raw_code,
            value: raw_value,
        })
    }

    /// Creates an [`InputEvent`] with all fields zeroed out.
    ///
    /// This results in a [`Syn::REPORT`] event.
    #[inline]
    pub const fn zeroed() -> Self {
        Self::new(EventType::SYN, 0, 0)
    }

    /// Returns the timestamp stored in the event.
    pub fn time(&self) -> SystemTime {
        let sec = self.0.time.tv_sec;
        let usec = self.0.time.tv_usec.clamp(0, 999_999);
        let dur = Duration::new(
            sec.unsigned_abs() as u64,
            (usec * 1000) as u32, // 999_999_000 fits in u32
        );

        let time = if sec >= 0 {
            SystemTime::UNIX_EPOCH.checked_add(dur)
        } else {
            SystemTime::UNIX_EPOCH.checked_sub(dur)
        };
        time.unwrap_or_else(|| {
            log::warn!(
                "`input_event` timestamp out of range of `SystemTime`: tv_sec={} tv_usec={}",
                self.0.time.tv_sec,
                self.0.time.tv_usec,
            );
            SystemTime::UNIX_EPOCH
        })
    }

    /// Returns the [`EventType`] of this event.
    #[inline]
    pub fn event_type(&self) -> EventType {
        EventType(self.0.type_)
    }

    /// Returns the raw *event code* field.
    #[inline]
    pub fn raw_code(&self) -> u16 {
        self.0.code
    }

    /// Returns the raw *event value* field.
    #[inline]
    pub fn raw_value(&self) -> i32 {
        self.0.value
    }

    /// Returns this event as a [`KeyEvent`] if it is of type [`EventType::KEY`].
    #[inline]
    pub fn as_key(&self) -> Option<KeyEvent> {
        if self.event_type() == EventType::KEY {
            Some(KeyEvent(*self))
        } else {
            None
        }
    }
}

impl fmt::Debug for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(key) = self.as_key() {
            return key.fmt(f);
        }
        if self.event_type() == EventType::SYN {
            return f
                .debug_struct("SynEvent")
                .field("syn", &Syn(self.raw_code()))
                .finish();
        }
        f.debug_struct("InputEvent")
            .field("time", &self.time())
            .field("type", &self.event_type())
            .field("code", &self.raw_code())
            .field("value", &self.raw_value())
            .finish()
    }
}

impl From<Syn> for InputEvent {
    #[inline]
    fn from(syn: Syn) -> Self {
        InputEvent::new(EventType::SYN, syn.0, 0)
    }
}

/// A key press/release/repeat event.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent(InputEvent);

impl KeyEvent {
    #[inline]
    pub fn new(key: Key, state: KeyState) -> Self {
        Self(InputEvent::new(EventType::KEY, key.0, state.0))
    }

    /// Returns the [`Key`] code that has been pressed/released/repeated.
    #[inline]
    pub fn key(&self) -> Key {
        Key(self.raw_code())
    }

    /// Returns the state of the key.
    #[inline]
    pub fn state(&self) -> KeyState {
        KeyState(self.raw_value())
    }

    /// Returns whether this event reports a key going down, either freshly or as an autorepeat.
    ///
    /// Releases carry no new input for a scanner and are not *strokes*.
    #[inline]
    pub fn is_stroke(&self) -> bool {
        matches!(self.state(), KeyState::PRESSED | KeyState::REPEAT)
    }
}

impl fmt::Debug for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEvent")
            .field("time", &self.time())
            .field("key", &self.key())
            .field("state", &self.state())
            .finish()
    }
}

impl Deref for KeyEvent {
    type Target = InputEvent;

    #[inline]
    fn deref(&self) -> &InputEvent {
        &self.0
    }
}

impl From<KeyEvent> for InputEvent {
    #[inline]
    fn from(value: KeyEvent) -> Self {
        value.0
    }
}

ffi_enum! {
    /// State of a [`Key`], stored as the value of a [`KeyEvent`].
    ///
    /// Returned by [`KeyEvent::state`].
    pub enum KeyState: i32 {
        /// The key used to be pressed and has now been released.
        RELEASED = 0,
        /// The key used to be released and has now been pressed.
        PRESSED = 1,
        /// The key is pressed, and has been held down long enough to generate a repeat event.
        REPEAT = 2,
    }
}
impl fmt::Debug for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "KeyState({:#?})", self.0),
        }
    }
}
