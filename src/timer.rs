use std::{
    ffi::c_void,
    io, mem, ptr,
    sync::atomic::AtomicI32,
    time::Duration,
};

use crate::{
    signal::{drain_pending_timeouts, timeout_signal},
    util::{cvt, last_os_error_or},
};

/// An owned POSIX interval timer that notifies by sending [`timeout_signal`] to the thread that
/// created it.
///
/// The signal carries the address of an [`AtomicI32`] counter, which the signal handler
/// increments on every expiration.
///
/// The timer is deleted on drop, and expirations still pending for it are drained. The counter
/// must therefore outlive the [`IntervalTimer`]. [`IntervalTimer::delete`] only deletes the timer
/// and reports errors; its caller drains.
#[derive(Debug)]
pub(crate) struct IntervalTimer {
    id: libc::timer_t,
}

impl IntervalTimer {
    /// Creates a disarmed timer bound to `counter`.
    ///
    /// # Safety
    ///
    /// `counter` must stay valid and must not move until the timer has been deleted and any
    /// expirations still pending for it have been drained.
    pub(crate) unsafe fn new(counter: *const AtomicI32) -> io::Result<Self> {
        // Thread-directed, so that the expiration interrupts the thread blocked in `read(2)`
        // rather than whichever thread the kernel would pick for a process-directed signal.
        let tid = unsafe { libc::syscall(libc::SYS_gettid) } as libc::pid_t;

        let mut event: libc::sigevent = unsafe { mem::zeroed() };
        event.sigev_notify = libc::SIGEV_THREAD_ID;
        event.sigev_notify_thread_id = tid;
        event.sigev_signo = timeout_signal();
        event.sigev_value = libc::sigval {
            sival_ptr: counter.cast_mut().cast::<c_void>(),
        };

        let mut id: libc::timer_t = ptr::null_mut();
        if unsafe { libc::timer_create(libc::CLOCK_REALTIME, &mut event, &mut id) } == -1 {
            return Err(last_os_error_or(libc::EMFILE));
        }
        log::trace!("created timer {id:?} for thread {tid}");
        Ok(Self { id })
    }

    /// Arms the timer to first expire after `initial`, and then every `interval`.
    ///
    /// An `interval` of zero makes the timer one-shot. An `initial` of zero disarms it.
    pub(crate) fn arm(&self, initial: Duration, interval: Duration) -> io::Result<()> {
        let spec = libc::itimerspec {
            it_interval: timespec(interval),
            it_value: timespec(initial),
        };
        unsafe {
            cvt(libc::timer_settime(self.id, 0, &spec, ptr::null_mut()))?;
        }
        Ok(())
    }

    /// Stops the timer. Expirations that already happened are not undone.
    pub(crate) fn disarm(&self) -> io::Result<()> {
        self.arm(Duration::ZERO, Duration::ZERO)
    }

    /// Deletes the timer, reporting failure.
    pub(crate) fn delete(self) -> io::Result<()> {
        let id = self.id;
        mem::forget(self);
        unsafe {
            cvt(libc::timer_delete(id))?;
        }
        Ok(())
    }
}

// `BarcodeDevice::close` consumes the timer with `delete`, so this only runs when a session is
// torn down without it (for example while unwinding).
impl Drop for IntervalTimer {
    fn drop(&mut self) {
        unsafe {
            if libc::timer_delete(self.id) == -1 {
                log::error!(
                    "failed to delete timer {:?}: {}",
                    self.id,
                    io::Error::last_os_error()
                );
            }
        }
        let drained = drain_pending_timeouts();
        if drained != 0 {
            log::debug!("drained {drained} pending signals of dropped timer {:?}", self.id);
        }
    }
}

fn timespec(d: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: d.subsec_nanos() as _,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespec_conversion() {
        let ts = timespec(Duration::from_millis(1500));
        assert_eq!((ts.tv_sec, ts.tv_nsec), (1, 500_000_000));

        let ts = timespec(Duration::from_millis(10));
        assert_eq!((ts.tv_sec, ts.tv_nsec), (0, 10_000_000));

        let ts = timespec(Duration::MAX);
        assert_eq!(ts.tv_sec, libc::time_t::MAX);
        assert_eq!(ts.tv_nsec, 999_999_999);
    }
}
