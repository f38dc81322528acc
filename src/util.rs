use std::{ffi::c_int, io};

/// Calls `f` until it returns something other than an [`io::ErrorKind::Interrupted`] error.
pub fn retry_interrupted<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            res => return res,
        }
    }
}

/// Returns `errno` as an [`io::Error`], or `fallback` if `errno` was not set by the failed call.
pub fn last_os_error_or(fallback: c_int) -> io::Error {
    or_errno(io::Error::last_os_error(), fallback)
}

/// Replaces an error that carries an OS error code of 0 ("success") by `fallback`.
pub fn or_errno(e: io::Error, fallback: c_int) -> io::Error {
    match e.raw_os_error() {
        Some(0) => io::Error::from_raw_os_error(fallback),
        _ => e,
    }
}

/// Converts the return value of a libc call that signals failure with `-1` and `errno`.
pub fn cvt(ret: c_int) -> io::Result<c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}
