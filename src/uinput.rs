//! Virtual barcode scanners.
//!
//! A [`VirtualScanner`] is a `uinput` keyboard that types barcodes the way a USB scanner in
//! keyboard emulation mode does. Its *evdev* node can be opened with
//! [`BarcodeDevice::open`][crate::BarcodeDevice::open], which makes it useful for testing
//! applications without scanner hardware.

use std::{
    error::Error,
    ffi::{OsString, c_char, c_int},
    fmt,
    fs::{self, File},
    io::{self, Write as _},
    mem,
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
        unix::ffi::OsStringExt,
    },
    path::{Path, PathBuf},
    ptr, slice, thread,
    time::{Duration, Instant},
};

use uoctl::Ioctl;

use crate::{
    event::{EventType, InputEvent, Key, KeyEvent, KeyState, Syn},
    raw::uinput::{
        UI_DEV_CREATE, UI_DEV_SETUP, UI_GET_SYSNAME, UI_GET_VERSION, UI_SET_EVBIT, UI_SET_KEYBIT,
        UINPUT_MAX_NAME_SIZE, uinput_setup,
    },
};

/// Keys a [`VirtualScanner`] is able to type.
const KEYS: &[Key] = &[
    Key::KEY_0,
    Key::KEY_1,
    Key::KEY_2,
    Key::KEY_3,
    Key::KEY_4,
    Key::KEY_5,
    Key::KEY_6,
    Key::KEY_7,
    Key::KEY_8,
    Key::KEY_9,
    Key::KEY_ENTER,
    Key::KEY_TAB,
    Key::KEY_KPENTER,
];

/// How long [`VirtualScanner::evdev_path`] waits for the device node to appear.
const NODE_TIMEOUT: Duration = Duration::from_secs(5);

/// A virtual keyboard that types barcodes.
///
/// The device is destroyed when the [`VirtualScanner`] is dropped.
#[derive(Debug)]
pub struct VirtualScanner {
    file: File,
}

impl AsFd for VirtualScanner {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for VirtualScanner {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl VirtualScanner {
    /// Creates a virtual scanner called `name`.
    ///
    /// The device supports the number row digits, `KEY_ENTER`, `KEY_TAB` and `KEY_KPENTER`.
    ///
    /// # Errors
    ///
    /// Fails if `/dev/uinput` cannot be opened (usually [`io::ErrorKind::PermissionDenied`]), or
    /// with [`io::ErrorKind::InvalidInput`] if `name` is longer than 79 bytes or contains a 0
    /// byte.
    pub fn create(name: &str) -> io::Result<Self> {
        if name.len() >= UINPUT_MAX_NAME_SIZE || name.contains('\0') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid uinput device name '{name}'"),
            ));
        }

        let now = Instant::now();
        let file = File::options().read(true).write(true).open("/dev/uinput")?;
        let this = Self { file };
        unsafe {
            let mut version = 0;
            this.ioctl("UI_GET_VERSION", UI_GET_VERSION, &mut version)?;
            log::debug!("opened /dev/uinput; version={version:#x}");

            this.ioctl(
                "UI_SET_EVBIT",
                UI_SET_EVBIT,
                EventType::KEY.raw() as c_int,
            )?;
            for key in KEYS {
                this.ioctl("UI_SET_KEYBIT", UI_SET_KEYBIT, key.raw() as c_int)?;
            }

            let mut setup: uinput_setup = mem::zeroed();
            ptr::copy_nonoverlapping(
                name.as_ptr(),
                setup.name.as_mut_ptr().cast(),
                name.len(),
            );
            this.ioctl("UI_DEV_SETUP", UI_DEV_SETUP, &setup)?;
            UI_DEV_CREATE.ioctl(&this.file)?;
        }
        log::debug!("created virtual scanner '{name}' in {:?}", now.elapsed());
        Ok(this)
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
                let msg = format!("uinput ioctl {name} failed ({:?})", e.kind());
                Err(io::Error::new(e.kind(), WrappedError { cause: e, msg }))
            }
        }
    }

    /// Retrieves the device's directory name in `/sys/devices/virtual/input/`.
    #[doc(alias = "UI_GET_SYSNAME")]
    pub fn sysname(&self) -> io::Result<OsString> {
        let mut buf = vec![0_u8; 64];
        let len = loop {
            let len = unsafe {
                self.ioctl(
                    "UI_GET_SYSNAME",
                    UI_GET_SYSNAME(buf.len()),
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
        Ok(OsString::from_vec(buf))
    }

    /// Returns the path of the *evdev* node (`/dev/input/eventN`) belonging to this device.
    ///
    /// The node is created asynchronously after the device; this waits up to 5 seconds for it
    /// to appear.
    pub fn evdev_path(&self) -> io::Result<PathBuf> {
        let dir = Path::new("/sys/devices/virtual/input").join(self.sysname()?);
        let start = Instant::now();
        loop {
            if let Some(path) = find_event_node(&dir)? {
                if path.exists() {
                    log::debug!("virtual scanner node is {}", path.display());
                    return Ok(path);
                }
            }
            if start.elapsed() > NODE_TIMEOUT {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no evdev node appeared for '{}'", dir.display()),
                ));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Writes raw events to the device in a single batch.
    pub fn write(&self, events: &[InputEvent]) -> io::Result<()> {
        let ptr = events.as_ptr().cast::<u8>();
        // Safety: `InputEvent` has no padding.
        let bytes = unsafe { slice::from_raw_parts(ptr, size_of_val(events)) };
        (&self.file).write_all(bytes)
    }

    /// Presses and releases `key`.
    pub fn press(&self, key: Key) -> io::Result<()> {
        self.write(&[
            KeyEvent::new(key, KeyState::PRESSED).into(),
            Syn::REPORT.into(),
            KeyEvent::new(key, KeyState::RELEASED).into(),
            Syn::REPORT.into(),
        ])
    }

    /// Types the ASCII digits in `digits`, followed by `terminator` if one is given.
    ///
    /// Returns an [`io::ErrorKind::InvalidInput`] error, without typing anything, if `digits`
    /// contains anything but ASCII digits.
    pub fn type_code(&self, digits: &str, terminator: Option<Key>) -> io::Result<()> {
        let keys = digits
            .bytes()
            .map(|b| {
                Key::for_digit(b).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("cannot type non-digit {:?}", b as char),
                    )
                })
            })
            .collect::<io::Result<Vec<_>>>()?;
        for key in keys.into_iter().chain(terminator) {
            self.press(key)?;
        }
        Ok(())
    }
}

/// Finds the `eventN` child of an input device's sysfs directory.
fn find_event_node(dir: &Path) -> io::Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let name = entry?.file_name();
        if name.as_encoded_bytes().starts_with(b"event") {
            return Ok(Some(Path::new("/dev/input").join(name)));
        }
    }
    Ok(None)
}
