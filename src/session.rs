//! Reading barcodes from a grabbed input device with an idle timeout.
//!
//! A [`BarcodeDevice`] owns an evdev descriptor and a POSIX interval timer. Every
//! [`BarcodeDevice::read`] arms the timer, then blocks in `read(2)` until a complete barcode has
//! been typed or the timer fires. The expiration signal interrupts the blocked read (the handler
//! is installed without `SA_RESTART`) and bumps a counter that the read loop checks before every
//! `read(2)`. After the first expiration the timer keeps firing every [`REPEAT_INTERVAL`], so a
//! signal that lands between the counter check and the `read(2)` only delays the timeout.


use std::{
    fmt, io,
    ops::ControlFlow,
    path::Path,
    str,
    sync::atomic::{AtomicI32, Ordering},
    time::{Duration, Instant},
};

use crate::{
    device::{Device, RawRead},
    drop::on_drop,
    event::InputEvent,
    signal::{drain_pending_timeouts, install_timeout_handler},
    timer::IntervalTimer,
};

/// Period at which the idle timer keeps firing after its first expiration, until disarmed.
pub const REPEAT_INTERVAL: Duration = Duration::from_millis(10);

/// Longest barcode [`BarcodeDevice::read_code`] returns without truncation.
pub const MAX_CODE_LEN: usize = 1023;

/// Shortest idle budget [`BarcodeDevice::read`] accepts.
const MIN_IDLE: Duration = Duration::from_millis(1);

/// Value of the timeout counter while the device is open but no read is in progress.
const IDLE: i32 = -1;

/// An exclusively grabbed barcode scanner.
///
/// A [`BarcodeDevice`] starts out unopened. [`BarcodeDevice::open`] grabs a device node, after
/// which [`BarcodeDevice::read`] can be called any number of times. [`BarcodeDevice::close`] (or
/// dropping the value) releases the device again. A closed [`BarcodeDevice`] may be reopened.
///
/// The idle timer notifies the thread that called [`BarcodeDevice::open`], so this type is not
/// [`Send`].
///
/// # Example
///
/// ```no_run
/// # fn main() -> std::io::Result<()> {
/// use std::time::Duration;
/// use evbarcode::BarcodeDevice;
///
/// let mut scanner = BarcodeDevice::new();
/// scanner.open("/dev/input/by-id/usb-Scanner-event-kbd")?;
/// while let Some(code) = scanner.read_code(Duration::from_secs(30))? {
///     println!("{code}");
/// }
/// scanner.close()?;
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct BarcodeDevice {
    state: State,
    /// Counts timer expirations since the current read started.
    ///
    /// Boxed, because the timer holds its address: it must not move while a timer is bound to it.
    timeout: Box<AtomicI32>,
}

#[derive(Debug)]
enum State {
    Unopened,
    Open(Open),
    Closed,
}

#[derive(Debug)]
struct Open {
    device: Device,
    timer: IntervalTimer,
}

impl Default for BarcodeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl BarcodeDevice {
    /// Creates an unopened [`BarcodeDevice`].
    pub fn new() -> Self {
        Self {
            state: State::Unopened,
            timeout: Box::new(AtomicI32::new(IDLE)),
        }
    }

    /// Returns whether a device is currently open.
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Returns the path of the open device, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.state {
            State::Open(open) => Some(open.device.path()),
            State::Unopened | State::Closed => None,
        }
    }

    /// Opens and exclusively grabs the evdev node at `path`.
    ///
    /// On the first call in the process, this installs the signal handler for
    /// [`timeout_signal`][crate::timeout_signal].
    ///
    /// # Errors
    ///
    /// - [`io::ErrorKind::InvalidInput`] if `path` is empty or a device is already open.
    /// - Any error from opening the node; [`io::ErrorKind::NotFound`] if it doesn't exist.
    /// - [`io::ErrorKind::ResourceBusy`] if another handle has grabbed the device.
    /// - The OS error if no timer can be created.
    ///
    /// If an error is returned, nothing stays open.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> io::Result<()> {
        self.open_impl(path.as_ref())
    }

    fn open_impl(&mut self, path: &Path) -> io::Result<()> {
        if path.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "barcode device path is empty",
            ));
        }
        self.check_not_open()?;
        install_timeout_handler()?;

        let now = Instant::now();
        let device = Device::open(path)?;
        // Dropping `device` on error closes it.
        device.grab()?;
        self.attach(device)?;

        if let State::Open(open) = &self.state {
            let name = open.device.name().unwrap_or_else(|e| {
                log::debug!("failed to fetch device name: {e}");
                String::from("<unknown>")
            });
            match open.device.driver_version() {
                Ok(version) => log::debug!(
                    "opened barcode device '{}' ({name}, evdev {version}) in {:?}",
                    path.display(),
                    now.elapsed()
                ),
                Err(e) => log::debug!(
                    "opened barcode device '{}' ({name}) in {:?}; failed to fetch driver version: {e}",
                    path.display(),
                    now.elapsed()
                ),
            }
        }
        Ok(())
    }

    /// Opens the session on an already opened `device`, without grabbing it.
    #[cfg(test)]
    pub(crate) fn open_unchecked(&mut self, device: Device) -> io::Result<()> {
        self.check_not_open()?;
        install_timeout_handler()?;
        self.attach(device)
    }

    fn check_not_open(&self) -> io::Result<()> {
        if let State::Open(open) = &self.state {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "barcode device is already open ('{}')",
                    open.device.path().display()
                ),
            ));
        }
        Ok(())
    }

    /// Creates the idle timer for `device` and enters the open state.
    fn attach(&mut self, device: Device) -> io::Result<()> {
        // Safety: `self.timeout` is heap-allocated and outlives the timer. `close` deletes the
        // timer and drains its pending signals before `self.timeout` can be freed.
        let timer = match unsafe { IntervalTimer::new(&*self.timeout) } {
            Ok(timer) => timer,
            Err(e) => {
                if let Err(close) = device.close() {
                    log::warn!("failed to close device after timer creation failed: {close}");
                }
                return Err(e);
            }
        };
        self.timeout.store(IDLE, Ordering::SeqCst);
        self.state = State::Open(Open { device, timer });
        Ok(())
    }

    /// Reads one barcode into `buf`.
    ///
    /// Blocks until a terminator key follows at least one digit, or until no key event arrived
    /// for `max_idle`. The idle budget applies to the read as a whole; incoming events do not
    /// extend it.
    ///
    /// `buf` is zeroed first. Digits are stored as ASCII bytes, and the last byte of `buf` is
    /// always left 0. [`Scan::len`] counts every digit typed, including those that did not fit.
    ///
    /// Only presses and autorepeats of keys are considered. The number row keys `KEY_0` through
    /// `KEY_9` are digits, any other key terminates the barcode. Terminators before the first
    /// digit are ignored.
    ///
    /// Invalid arguments (`buf` shorter than 2 bytes, or `max_idle` below 1 millisecond) and
    /// reading from a device that isn't open result in [`ScanStatus::Failed`] with an
    /// [`io::ErrorKind::InvalidInput`] error.
    pub fn read(&mut self, buf: &mut [u8], max_idle: Duration) -> Scan {
        if buf.len() < 2 {
            return Scan::invalid(format!(
                "barcode buffer must hold at least 2 bytes (got {})",
                buf.len()
            ));
        }
        if max_idle < MIN_IDLE {
            return Scan::invalid(format!(
                "idle timeout must be at least {MIN_IDLE:?} (got {max_idle:?})"
            ));
        }
        let State::Open(open) = &self.state else {
            return Scan::invalid("barcode device is not open".into());
        };

        buf.fill(0);
        if let Err(e) = open.timer.arm(max_idle, REPEAT_INTERVAL) {
            return Scan::failed(e);
        }
        self.timeout.store(0, Ordering::SeqCst);

        let now = Instant::now();
        let mut acc = Accumulator::new(buf);
        let status = loop {
            if self.timeout.load(Ordering::Relaxed) != 0 {
                break ScanStatus::TimedOut;
            }
            match open.device.read_event() {
                Ok(RawRead::Event(ev)) => {
                    if acc.feed(ev).is_break() {
                        break ScanStatus::Complete;
                    }
                }
                Ok(RawRead::Eof) => break ScanStatus::DeviceGone,
                Ok(RawRead::Short(n)) => break ScanStatus::ShortRead(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break ScanStatus::Failed(e),
            }
        };

        if let Err(e) = open.timer.disarm() {
            log::warn!("failed to disarm idle timer: {e}");
        }

        let scan = Scan {
            len: acc.len,
            status,
        };
        log::trace!(
            "read from '{}' ended after {:?}: {scan:?}",
            open.device.path().display(),
            now.elapsed()
        );
        scan
    }

    /// Reads one barcode of up to [`MAX_CODE_LEN`] digits.
    ///
    /// Returns [`None`] if the idle timeout expired first. Digits typed before the timeout are
    /// discarded. Longer barcodes are truncated to their first [`MAX_CODE_LEN`] digits.
    ///
    /// # Errors
    ///
    /// Any status other than [`ScanStatus::Complete`] and [`ScanStatus::TimedOut`] is returned as
    /// an error, see [`ScanStatus::into_result`].
    pub fn read_code(&mut self, max_idle: Duration) -> io::Result<Option<String>> {
        let mut buf = [0; MAX_CODE_LEN + 1];
        let scan = self.read(&mut buf, max_idle);
        match scan.status() {
            ScanStatus::Complete => {
                if scan.is_truncated(buf.len()) {
                    log::warn!(
                        "barcode of {} digits truncated to {MAX_CODE_LEN} digits",
                        scan.len()
                    );
                }
                return Ok(Some(scan.digits(&buf).to_owned()));
            }
            ScanStatus::TimedOut => {
                if !scan.is_empty() {
                    log::debug!("discarding {} digits without terminator", scan.len());
                }
                return Ok(None);
            }
            _ => {}
        }
        scan.into_status().into_result().map(|()| None)
    }

    /// Closes the device and deletes the idle timer.
    ///
    /// Does nothing if no device is open. Otherwise, both resources are released even if one of
    /// them fails, and the first error is returned. The [`BarcodeDevice`] can be opened again
    /// afterwards.
    pub fn close(&mut self) -> io::Result<()> {
        let open = match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(open) => open,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        let now = Instant::now();
        let Open { device, timer } = open;
        let path = device.path().to_path_buf();
        let _d = on_drop(|| {
            log::debug!(
                "closed barcode device '{}' in {:?}",
                path.display(),
                now.elapsed()
            )
        });

        let closed = device.close();
        let deleted = timer.delete();
        // Expirations queued before deletion still reference `self.timeout`; consume them while
        // it is alive.
        let drained = drain_pending_timeouts();
        if drained != 0 {
            log::debug!("drained {drained} pending idle timer signals");
        }
        self.timeout.store(IDLE, Ordering::SeqCst);

        closed.and(deleted)
    }
}

impl Drop for BarcodeDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("failed to close barcode device: {e}");
        }
    }
}

/// Collects digits into the caller's buffer.
struct Accumulator<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Accumulator<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Processes one event, breaking when it completes the barcode.
    fn feed(&mut self, ev: InputEvent) -> ControlFlow<()> {
        let Some(key) = ev.as_key().filter(|key| key.is_stroke()) else {
            return ControlFlow::Continue(());
        };

        match key.key().digit() {
            Some(digit) => {
                if self.len < self.buf.len() - 1 {
                    self.buf[self.len] = digit;
                }
                self.len += 1;
                ControlFlow::Continue(())
            }
            None if self.len == 0 => {
                log::trace!("ignoring {:?} before the first digit", key.key());
                ControlFlow::Continue(())
            }
            None => ControlFlow::Break(()),
        }
    }
}

/// Result of a [`BarcodeDevice::read`].
#[derive(Debug)]
pub struct Scan {
    len: usize,
    status: ScanStatus,
}

impl Scan {
    fn failed(e: io::Error) -> Self {
        Self {
            len: 0,
            status: ScanStatus::Failed(e),
        }
    }

    fn invalid(msg: String) -> Self {
        Self::failed(io::Error::new(io::ErrorKind::InvalidInput, msg))
    }

    /// Returns the number of digits typed, including any that did not fit into the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether no digit was typed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn status(&self) -> &ScanStatus {
        &self.status
    }

    #[inline]
    pub fn into_status(self) -> ScanStatus {
        self.status
    }

    /// Returns whether a terminator ended the read.
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self.status, ScanStatus::Complete)
    }

    /// Returns whether more digits were typed than a buffer of `capacity` bytes holds.
    pub fn is_truncated(&self, capacity: usize) -> bool {
        self.len > capacity.saturating_sub(1)
    }

    /// Returns the number of digits stored in a buffer of `capacity` bytes.
    pub fn stored_len(&self, capacity: usize) -> usize {
        self.len.min(capacity.saturating_sub(1))
    }

    /// Returns the digits stored in `buf`, which must be the buffer passed to the read.
    pub fn digits<'b>(&self, buf: &'b [u8]) -> &'b str {
        let stored = &buf[..self.stored_len(buf.len())];
        str::from_utf8(stored).unwrap_or_default()
    }
}

/// How a [`BarcodeDevice::read`] ended.
#[derive(Debug)]
#[non_exhaustive]
pub enum ScanStatus {
    /// A terminator key followed at least one digit.
    Complete,
    /// The idle timeout expired before a terminator.
    TimedOut,
    /// The device reported end of file, usually because it was unplugged.
    DeviceGone,
    /// The device returned a number of bytes that is not a whole event record.
    ShortRead(usize),
    /// Any other error.
    Failed(io::Error),
}

impl ScanStatus {
    /// Converts this status into an [`io::Result`].
    ///
    /// [`ScanStatus::Complete`] is the only success. [`ScanStatus::TimedOut`] maps to
    /// [`io::ErrorKind::TimedOut`], [`ScanStatus::DeviceGone`] to `ENOENT` and
    /// [`ScanStatus::ShortRead`] to `EIO`.
    pub fn into_result(self) -> io::Result<()> {
        match self {
            Self::Complete => Ok(()),
            Self::TimedOut => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no barcode within the idle timeout",
            )),
            Self::DeviceGone => Err(io::Error::from_raw_os_error(libc::ENOENT)),
            Self::ShortRead(_) => Err(io::Error::from_raw_os_error(libc::EIO)),
            Self::Failed(e) => Err(e),
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::TimedOut => f.write_str("timed out"),
            Self::DeviceGone => f.write_str("device gone"),
            Self::ShortRead(n) => write!(f, "short read of {n} bytes"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}
