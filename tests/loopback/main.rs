//! The loopback test.
//!
//! This test creates a [`VirtualScanner`] and reads barcodes typed on it through its grabbed
//! `evdev` node, exercising the real kernel interfaces: `EVIOCGRAB`, blocking reads and timer
//! signals interrupting them.
//!
//! Creating `uinput` devices requires write access to `/dev/uinput`. If that is not available,
//! every test prints a message and passes without doing anything.
//!
//! The virtual scanner is shared, so tests are serialized by [`Tester::get()`], which also checks
//! that each test releases its grab.

mod lifecycle;
mod scan;

use std::{
    io,
    ops::Deref,
    panic::resume_unwind,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    thread,
    time::Duration,
};

use evbarcode::{Device, VirtualScanner};

const TEST_DEVICE_NAME: &str = "-@-rust-evbarcode-loopback-@-";

struct Tester {
    scanner: VirtualScanner,
    path: PathBuf,
}

enum Slot {
    Unset,
    Unavailable,
    Ready(Tester),
}

static TESTER: Mutex<Slot> = Mutex::new(Slot::Unset);

fn setup() -> io::Result<Option<Tester>> {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_module(env!("CARGO_PKG_NAME"), log::LevelFilter::Trace)
        .try_init();

    let scanner = match VirtualScanner::create(TEST_DEVICE_NAME) {
        Ok(scanner) => scanner,
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
            ) =>
        {
            eprintln!("cannot create uinput device ({e}); skipping loopback tests");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let path = scanner.evdev_path()?;

    // udev may still be adjusting the node's permissions.
    let mut retries = 5;
    loop {
        match Device::open(&path) {
            Ok(dev) => {
                println!(
                    "opened test device '{}' at '{}'",
                    dev.name()?,
                    path.display()
                );
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied && retries > 0 => {
                retries -= 1;
                thread::sleep(Duration::from_millis(150));
                println!("(retrying)");
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                eprintln!("cannot open '{}' ({e}); skipping loopback tests", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Some(Tester { scanner, path }))
}

impl Tester {
    /// Returns exclusive access to the shared scanner, or [`None`] if `uinput` is unavailable.
    fn get() -> Option<impl Deref<Target = Tester>> {
        struct TesterHandle(MutexGuard<'static, Slot>);
        impl Drop for TesterHandle {
            fn drop(&mut self) {
                if thread::panicking() {
                    return;
                }

                // Every test must leave the device ungrabbed.
                let dev = Device::open(&self.path).unwrap();
                dev.grab().expect("test left the device grabbed");
                dev.ungrab().unwrap();
            }
        }
        impl Deref for TesterHandle {
            type Target = Tester;

            fn deref(&self) -> &Tester {
                match &*self.0 {
                    Slot::Ready(tester) => tester,
                    Slot::Unset | Slot::Unavailable => unreachable!(),
                }
            }
        }

        let mut guard = match TESTER.lock() {
            Ok(g) => g,
            Err(_poison) => {
                // Hide the backtrace / libtest noise; the causing thread already printed everything helpful.
                resume_unwind(Box::new("(silent unwind due to poison error)"))
            }
        };
        if let Slot::Unset = &*guard {
            *guard = match setup().unwrap() {
                Some(tester) => Slot::Ready(tester),
                None => Slot::Unavailable,
            };
        }
        match &*guard {
            Slot::Ready(_) => Some(TesterHandle(guard)),
            Slot::Unset | Slot::Unavailable => None,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[test]
fn test_identification() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let dev = Device::open(t.path())?;
    assert_eq!(dev.name()?, TEST_DEVICE_NAME);
    assert_eq!(dev.driver_version()?.major(), 1);
    assert_eq!(dev.path(), t.path());
    Ok(())
}

#[test]
fn test_sysname() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let sysname = t.scanner.sysname()?;
    println!("uinput sysname: {sysname:?}");
    assert!(sysname.as_encoded_bytes().starts_with(b"input"));
    assert!(t.path().starts_with("/dev/input/"));
    Ok(())
}
