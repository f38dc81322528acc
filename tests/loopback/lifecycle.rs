use std::io;

use evbarcode::{BarcodeDevice, Device, ScanStatus, VirtualScanner, event::Key};

use crate::Tester;

#[test]
fn grab_is_exclusive() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let mut dev = BarcodeDevice::new();
    dev.open(t.path())?;
    assert!(dev.is_open());
    assert_eq!(dev.path(), Some(t.path()));

    let mut other = BarcodeDevice::new();
    let err = other.open(t.path()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ResourceBusy, "{err}");
    assert!(!other.is_open());
    other.close()?;

    let raw = Device::open(t.path())?;
    let err = raw.grab().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ResourceBusy, "{err}");

    // Already open.
    let err = dev.open(t.path()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

    dev.close()?;
    Ok(())
}

#[test]
fn close_releases_grab() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let mut dev = BarcodeDevice::new();
    for _ in 0..3 {
        dev.open(t.path())?;
        dev.close()?;
        assert!(!dev.is_open());

        let raw = Device::open(t.path())?;
        raw.grab()?;
        raw.close()?;
    }

    // Dropping an open device releases it too.
    let mut dropped = BarcodeDevice::new();
    dropped.open(t.path())?;
    drop(dropped);
    dev.open(t.path())?;

    t.scanner.type_code("7", Some(Key::KEY_ENTER))?;
    assert_eq!(
        dev.read_code(std::time::Duration::from_millis(500))?
            .as_deref(),
        Some("7")
    );
    dev.close()?;
    Ok(())
}

#[test]
fn device_removed() -> io::Result<()> {
    // Removing the shared scanner would break the other tests, so this uses its own.
    let Some(_t) = Tester::get() else {
        return Ok(());
    };
    let scanner = VirtualScanner::create("-@-rust-evbarcode-removal-@-")?;
    let mut dev = BarcodeDevice::new();
    dev.open(scanner.evdev_path()?)?;

    scanner.type_code("12", None)?;
    drop(scanner);

    let mut buf = [0; 16];
    let scan = dev.read(&mut buf, std::time::Duration::from_secs(2));
    // The evdev driver reports removal as `ENODEV`.
    match scan.status() {
        ScanStatus::DeviceGone => {}
        ScanStatus::Failed(e) if e.raw_os_error() == Some(libc::ENODEV) => {}
        _ => panic!("unexpected scan result: {scan:?}"),
    }

    // Closing a removed device still releases the descriptor and the timer.
    dev.close()?;
    assert!(!dev.is_open());
    assert!(dev.path().is_none());
    dev.close()?;
    Ok(())
}
