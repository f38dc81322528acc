use std::{
    io, thread,
    time::{Duration, Instant},
};

use evbarcode::{BarcodeDevice, ScanStatus, event::Key};

use crate::Tester;

const BUDGET: Duration = Duration::from_millis(500);

#[test]
fn scan_complete() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let mut dev = BarcodeDevice::new();
    dev.open(t.path())?;

    t.scanner.type_code("123", Some(Key::KEY_ENTER))?;
    let mut buf = [0; 16];
    let scan = dev.read(&mut buf, BUDGET);
    assert!(scan.is_complete(), "{scan:?}");
    assert_eq!(scan.len(), 3);
    assert_eq!(&buf[..4], b"123\0");

    dev.close()?;
    Ok(())
}

#[test]
fn scan_timeout() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let mut dev = BarcodeDevice::new();
    dev.open(t.path())?;

    let mut buf = [0; 16];
    let now = Instant::now();
    let scan = dev.read(&mut buf, BUDGET);
    let elapsed = now.elapsed();
    assert!(matches!(scan.status(), ScanStatus::TimedOut), "{scan:?}");
    assert_eq!(scan.len(), 0);
    assert!(elapsed >= BUDGET, "{elapsed:?}");
    assert!(elapsed < BUDGET + Duration::from_millis(500), "{elapsed:?}");

    dev.close()?;
    Ok(())
}

#[test]
fn scan_while_typing() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let mut dev = BarcodeDevice::new();
    dev.open(t.path())?;

    let scanner = &t.scanner;
    let code = thread::scope(|s| {
        let typist = s.spawn(move || -> io::Result<()> {
            for digit in ["4", "0", "0", "6"] {
                thread::sleep(Duration::from_millis(30));
                scanner.type_code(digit, None)?;
            }
            scanner.press(Key::KEY_TAB)
        });
        let code = dev.read_code(Duration::from_secs(2));
        typist.join().unwrap()?;
        code
    })?;
    assert_eq!(code.as_deref(), Some("4006"));

    dev.close()?;
    Ok(())
}

#[test]
fn scan_sequence() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let mut dev = BarcodeDevice::new();
    dev.open(t.path())?;

    // A terminator on its own doesn't produce an empty code.
    t.scanner.press(Key::KEY_KPENTER)?;
    t.scanner.type_code("5901234123457", Some(Key::KEY_ENTER))?;
    t.scanner.type_code("42", Some(Key::KEY_ENTER))?;

    assert_eq!(dev.read_code(BUDGET)?.as_deref(), Some("5901234123457"));
    assert_eq!(dev.read_code(BUDGET)?.as_deref(), Some("42"));
    assert_eq!(dev.read_code(Duration::from_millis(50))?, None);

    dev.close()?;
    Ok(())
}

#[test]
fn scan_truncated() -> io::Result<()> {
    let Some(t) = Tester::get() else {
        return Ok(());
    };
    let mut dev = BarcodeDevice::new();
    dev.open(t.path())?;

    t.scanner.type_code("98765", Some(Key::KEY_ENTER))?;
    let mut buf = [0; 3];
    let scan = dev.read(&mut buf, BUDGET);
    assert!(scan.is_complete(), "{scan:?}");
    assert_eq!(scan.len(), 5);
    assert!(scan.is_truncated(buf.len()));
    assert_eq!(scan.digits(&buf), "98");
    assert_eq!(&buf, b"98\0");

    dev.close()?;
    Ok(())
}
