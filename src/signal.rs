//! Process-wide signal handling.
//!
//! Two unrelated asynchronous events are translated into state that normal code can observe:
//!
//! - Expiration of a [`BarcodeDevice`]'s idle timer, delivered as [`timeout_signal`]. Its handler
//!   increments the atomic counter whose address the timer carries, and does nothing else.
//! - A request to terminate the program (`SIGINT`, `SIGTERM`, ...), which sets the
//!   [`ShutdownFlag`].
//!
//! [`BarcodeDevice`]: crate::BarcodeDevice

use std::{
    ffi::{c_int, c_void},
    io, mem, ptr,
    sync::atomic::{AtomicBool, AtomicI32, Ordering},
};

use crate::util::cvt;

static TIMEOUT_HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Returns the real-time signal reserved for idle timer notifications (`SIGRTMAX`).
///
/// Applications using this crate must not install their own handler for this signal, and must
/// not block it on threads that read from a [`BarcodeDevice`][crate::BarcodeDevice].
#[inline]
pub fn timeout_signal() -> c_int {
    libc::SIGRTMAX()
}

/// Installs the handler for [`timeout_signal`], unless that already happened.
///
/// The handler is installed without `SA_RESTART`, so that a `read(2)` blocked on a device
/// returns `EINTR` when the timer fires.
///
/// The installation state is a plain flag: concurrent first calls are harmless (both install the
/// same handler), but callers are expected to open devices from one thread.
pub(crate) fn install_timeout_handler() -> io::Result<()> {
    if TIMEOUT_HANDLER_INSTALLED.load(Ordering::Acquire) {
        return Ok(());
    }

    let signum = timeout_signal();
    unsafe {
        let mut act: libc::sigaction = mem::zeroed();
        act.sa_sigaction = handle_timeout as extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void)
            as libc::sighandler_t;
        act.sa_flags = libc::SA_SIGINFO;
        libc::sigemptyset(&mut act.sa_mask);
        cvt(libc::sigaction(signum, &act, ptr::null_mut()))?;
    }

    TIMEOUT_HANDLER_INSTALLED.store(true, Ordering::Release);
    log::debug!("installed idle timer handler for signal {signum}");
    Ok(())
}

extern "C" fn handle_timeout(_signum: c_int, info: *mut libc::siginfo_t, _ctx: *mut c_void) {
    // Runs in signal context and may interrupt anything, including itself.
    // Only a single atomic RMW on memory owned by a live timer is allowed here.
    unsafe {
        if let Some(info) = info.as_ref() {
            count_expiration(info);
        }
    }
}

/// Increments the counter referenced by a timer-originated `info`.
///
/// Returns whether `info` was a timer expiration carrying a counter.
///
/// # Safety
///
/// If `info` originates from a timer, its `sival_ptr` must be null or point to a live
/// [`AtomicI32`].
unsafe fn count_expiration(info: &libc::siginfo_t) -> bool {
    if info.si_code != libc::SI_TIMER {
        return false;
    }
    let counter = unsafe { info.si_value().sival_ptr }.cast::<AtomicI32>();
    if counter.is_null() {
        return false;
    }
    unsafe {
        (*counter).fetch_add(1, Ordering::SeqCst);
    }
    true
}

/// Dequeues every pending [`timeout_signal`] without waiting, counting each timer-originated one
/// exactly like the live handler would.
///
/// Called after a timer has been deleted, while the counter it referenced is still alive, so that
/// a late expiration cannot be delivered after the counter's memory has been reused.
///
/// Returns the number of signals dequeued.
pub(crate) fn drain_pending_timeouts() -> usize {
    let signum = timeout_signal();
    let mut drained = 0;
    unsafe {
        let mut set: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, signum);
        let poll = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        loop {
            let mut info: libc::siginfo_t = mem::zeroed();
            if libc::sigtimedwait(&set, &mut info, &poll) != signum {
                break;
            }
            drained += 1;
            count_expiration(&info);
        }
    }
    drained
}

/// Handle to the process-wide shutdown flag.
///
/// The flag starts out unset when the process starts, is set (idempotently) by any signal
/// registered through [`install_shutdown`] or [`ShutdownFlag::install`], and is never reset.
///
/// Reading barcodes never consults the flag by itself. A driving loop receives the handle and
/// checks [`ShutdownFlag::is_set`] between [`BarcodeDevice::read`] calls.
///
/// Since the signal handlers are installed without `SA_RESTART`, a termination signal interrupts
/// a blocked read, but the read resumes waiting; shutdown is noticed once the current read
/// returns, at the latest when its idle timeout expires.
///
/// [`BarcodeDevice::read`]: crate::BarcodeDevice::read
#[derive(Debug, Clone, Copy)]
pub struct ShutdownFlag {
    _p: (),
}

impl ShutdownFlag {
    /// The conventional termination signals: `SIGINT`, `SIGTERM` and `SIGHUP`.
    pub const DEFAULT_SIGNALS: [c_int; 3] = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP];

    /// Returns a handle to the flag without registering any signal.
    #[inline]
    pub fn get() -> Self {
        Self { _p: () }
    }

    /// Registers every signal in `signals` to set the flag.
    ///
    /// Stops at, and returns, the first registration error.
    pub fn install(signals: &[c_int]) -> io::Result<Self> {
        for &signum in signals {
            install_shutdown(signum)?;
        }
        Ok(Self::get())
    }

    /// Returns whether any registered signal has been received.
    #[inline]
    pub fn is_set(&self) -> bool {
        SHUTDOWN.load(Ordering::Relaxed)
    }
}

/// Registers `signum` to set the [`ShutdownFlag`].
///
/// May be called for any number of different signals; each call only changes the disposition of
/// `signum`.
///
/// # Errors
///
/// Returns the OS error if the handler cannot be installed, eg. [`io::ErrorKind::InvalidInput`]
/// for `SIGKILL` or an out-of-range signal number.
pub fn install_shutdown(signum: c_int) -> io::Result<ShutdownFlag> {
    unsafe {
        let mut act: libc::sigaction = mem::zeroed();
        act.sa_sigaction = handle_shutdown as extern "C" fn(c_int) as libc::sighandler_t;
        act.sa_flags = 0;
        libc::sigemptyset(&mut act.sa_mask);
        cvt(libc::sigaction(signum, &act, ptr::null_mut()))?;
    }
    log::debug!("signal {signum} now requests shutdown");
    Ok(ShutdownFlag::get())
}

extern "C" fn handle_shutdown(_signum: c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
