use std::{
    fs::File,
    io,
    os::fd::FromRawFd,
    slice,
};

use crate::{
    event::{EventType, InputEvent, Key, KeyEvent, KeyState, Syn},
    util::cvt,
};

/// `MSC_SCAN`, sent by keyboards before every key event.
const MSC_SCAN: u16 = 0x04;

/// Creates an anonymous pipe, returning the read end and the write end.
pub fn pipe() -> io::Result<(File, File)> {
    let mut fds = [0; 2];
    unsafe {
        cvt(libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC))?;
        Ok((File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])))
    }
}

/// Returns the in-memory representation of `events`, as the kernel would deliver it.
pub fn event_bytes(events: &[InputEvent]) -> Vec<u8> {
    let ptr = events.as_ptr().cast::<u8>();
    unsafe { slice::from_raw_parts(ptr, size_of_val(events)) }.to_vec()
}

/// The events of a single key being pressed and released, the way a USB keyboard reports it.
pub fn keystroke(key: Key) -> [InputEvent; 6] {
    [
        InputEvent::new(EventType::MSC, MSC_SCAN, 0x70000 + i32::from(key.raw())),
        KeyEvent::new(key, KeyState::PRESSED).into(),
        Syn::REPORT.into(),
        InputEvent::new(EventType::MSC, MSC_SCAN, 0x70000 + i32::from(key.raw())),
        KeyEvent::new(key, KeyState::RELEASED).into(),
        Syn::REPORT.into(),
    ]
}

/// The events a scanner sends for `digits` followed by `terminator`.
pub fn keystrokes(digits: &str, terminator: Option<Key>) -> Vec<InputEvent> {
    digits
        .bytes()
        .map(|b| Key::for_digit(b).unwrap_or_else(|| panic!("not a digit: {b:#x}")))
        .chain(terminator)
        .flat_map(keystroke)
        .collect()
}
