use std::{
    error::Error,
    ffi::{c_char, c_int},
    fmt,
    fs::File,
    io::{self, Read as _},
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, RawFd},
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
    slice,
    time::Instant,
};

use uoctl::Ioctl;

use crate::{
    Version,
    event::InputEvent,
    raw::input::{EVIOCGNAME, EVIOCGRAB, EVIOCGVERSION},
    util::{cvt, or_errno, retry_interrupted},
};

/// A read-only handle to an *event device* node like `/dev/input/event3`.
///
/// [`Device`] performs no buffering: [`Device::read_event`] issues one `read(2)` per event, so
/// that a blocked read can be interrupted by a signal at any point without losing data.
///
/// Most users want [`BarcodeDevice`][crate::BarcodeDevice], which manages a [`Device`] along
/// with its idle timer.
#[derive(Debug)]
pub struct Device {
    file: File,
    path: PathBuf,
}

/// Outcome of a single [`Device::read_event`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawRead {
    /// A complete event record was read.
    Event(InputEvent),
    /// The read returned 0 bytes: the device has been removed or the descriptor reached EOF.
    Eof,
    /// The read returned a number of bytes that is not the size of an event record.
    Short(usize),
}

impl AsFd for Device {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for Device {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl Device {
    /// Opens an evdev node in read-only, blocking mode.
    ///
    /// Interrupted `open(2)` calls are retried.
    /// The device is *not* grabbed; call [`Device::grab`] for that.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::open_impl(path.as_ref())
    }

    fn open_impl(path: &Path) -> io::Result<Self> {
        let now = Instant::now();
        let file = retry_interrupted(|| {
            File::options()
                .read(true)
                .custom_flags(libc::O_NOCTTY | libc::O_CLOEXEC)
                .open(path)
        })
        .map_err(|e| io::Error::new(e.kind(), format!("failed to open '{}': {e}", path.display())))?;
        log::trace!("opened '{}' in {:?}", path.display(), now.elapsed());

        Ok(Self::from_file_unchecked(file, path.to_path_buf()))
    }

    /// Wraps an arbitrary [`File`] without checking that it refers to an evdev node.
    pub(crate) fn from_file_unchecked(file: File, path: PathBuf) -> Self {
        Self { file, path }
    }

    /// Returns the file system path this [`Device`] was opened from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Executes `ioctl` and adds context to the error.
    unsafe fn ioctl<T>(&self, name: &'static str, ioctl: Ioctl<T>, arg: T) -> io::Result<c_int> {
        match unsafe { ioctl.ioctl(self, arg) } {
            Ok(ok) => Ok(ok),
            Err(e) => {
                #[derive(Debug)]
                struct WrappedError {
                    cause: io::Error,
                    msg: String,
                }

                impl fmt::Display for WrappedError {
                    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str(&self.msg)
                    }
                }
                impl Error for WrappedError {
                    fn source(&self) -> Option<&(dyn Error + 'static)> {
                        Some(&self.cause)
                    }
                }

                log::trace!("ioctl {name} failed with error {e} ({:?})", e.kind());
                let msg = format!(
                    "ioctl {name} failed for device {} ({:?})",
                    self.path().display(),
                    e.kind()
                );
                Err(io::Error::new(e.kind(), WrappedError { cause: e, msg }))
            }
        }
    }

    /// Returns the evdev subsystem version.
    #[doc(alias = "EVIOCGVERSION")]
    pub fn driver_version(&self) -> io::Result<Version> {
        unsafe {
            let mut version = 0;
            self.ioctl("EVIOCGVERSION", EVIOCGVERSION, &mut version)?;
            Ok(Version(version))
        }
    }

    /// Fetches the device name.
    #[doc(alias = "EVIOCGNAME")]
    pub fn name(&self) -> io::Result<String> {
        // The ioctl returns the number of bytes copied, at most the buffer length. If the buffer
        // was filled completely the name may have been cut off, so retry with a bigger one.
        const INITIAL_LEN: usize = 64;
        let mut buf = vec![0_u8; INITIAL_LEN];
        let len = loop {
            let len = unsafe {
                self.ioctl(
                    "EVIOCGNAME",
                    EVIOCGNAME(buf.len()),
                    buf.as_mut_ptr() as *mut c_char,
                )?
            };
            if len as usize == buf.len() {
                buf.resize(buf.len() * 2, 0);
            } else {
                break len;
            }
        };

        // `len` includes the trailing 0 byte
        buf.truncate(len.saturating_sub(1) as usize);

        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Grabs this input device, making its events unavailable to other programs.
    ///
    /// Keystrokes from a grabbed scanner no longer reach the foreground terminal or desktop.
    /// The kernel releases the grab when the file descriptor is closed.
    ///
    /// # Errors
    ///
    /// Fails with [`io::ErrorKind::ResourceBusy`] if the device is already grabbed by any
    /// handle, including this one. If the kernel reports failure without an error code, this
    /// returns [`io::ErrorKind::PermissionDenied`].
    #[doc(alias = "EVIOCGRAB")]
    pub fn grab(&self) -> io::Result<()> {
        unsafe {
            self.ioctl("EVIOCGRAB", EVIOCGRAB, 1)
                .map_err(|e| or_errno(e, libc::EACCES))?;
        }
        Ok(())
    }

    /// Releases a grab taken by [`Device::grab`].
    #[doc(alias = "EVIOCGRAB")]
    pub fn ungrab(&self) -> io::Result<()> {
        unsafe {
            self.ioctl("EVIOCGRAB", EVIOCGRAB, 0)?;
        }
        Ok(())
    }

    /// Reads exactly one event record from the device, blocking until one is available.
    ///
    /// This performs a single `read(2)` call. If it is interrupted by a signal, this returns an
    /// [`io::ErrorKind::Interrupted`] error instead of retrying, so the caller can inspect
    /// whatever state the signal handler changed before reading again.
    pub fn read_event(&self) -> io::Result<RawRead> {
        let mut dest = InputEvent::zeroed();
        let bptr = (&raw mut dest).cast::<u8>();
        // Safety: `InputEvent` is plain old data without padding (`timeval` + 2 × `u16` + `i32`),
        // so any bytes the kernel writes form a valid value.
        let byte_buf = unsafe { slice::from_raw_parts_mut(bptr, size_of::<InputEvent>()) };
        let bytes = (&self.file).read(byte_buf)?;
        Ok(match bytes {
            0 => RawRead::Eof,
            n if n == size_of::<InputEvent>() => RawRead::Event(dest),
            n => RawRead::Short(n),
        })
    }

    /// Closes the device, releasing any grab, and reports errors that dropping would discard.
    ///
    /// The descriptor is invalid afterwards even if this fails; `close(2)` is never retried.
    pub fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        unsafe {
            cvt(libc::close(fd))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        os::{fd::OwnedFd, unix::net::UnixStream},
    };

    use crate::{
        event::{Key, KeyEvent, KeyState},
        test::{event_bytes, pipe},
    };

    use super::*;

    #[test]
    fn read_records() -> io::Result<()> {
        let (rx, mut tx) = pipe()?;
        let dev = Device::from_file_unchecked(rx, "pipe".into());

        let ev: InputEvent = KeyEvent::new(Key::KEY_7, KeyState::PRESSED).into();
        tx.write_all(&event_bytes(&[ev]))?;
        assert_eq!(dev.read_event()?, RawRead::Event(ev));

        tx.write_all(&[0; 5])?;
        assert_eq!(dev.read_event()?, RawRead::Short(5));

        drop(tx);
        assert_eq!(dev.read_event()?, RawRead::Eof);
        dev.close()?;
        Ok(())
    }

    #[test]
    fn ioctl_error_context() -> io::Result<()> {
        let (a, _b) = UnixStream::pair()?;
        let file = File::from(OwnedFd::from(a));
        let dev = Device::from_file_unchecked(file, "/not/an/evdev".into());

        // Sockets reject evdev ioctls with `ENOTTY`.
        let err = dev.grab().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("EVIOCGRAB"), "{msg}");
        assert!(msg.contains("/not/an/evdev"), "{msg}");
        assert!(err.get_ref().and_then(|e| e.source()).is_some());
        Ok(())
    }

    #[test]
    fn open_missing() {
        let err = Device::open("/dev/input/does-not-exist").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("/dev/input/does-not-exist"));
    }
}
