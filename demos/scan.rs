//! Prints barcodes scanned on a device until no barcode arrives within the idle timeout, or until
//! the program is asked to terminate.

use std::{env, io, process, time::Duration};

use evbarcode::{BarcodeDevice, ShutdownFlag};

fn usage() -> ! {
    eprintln!(
        "usage: {} <evdev-path> <idle-timeout-seconds>",
        env!("CARGO_CRATE_NAME")
    );
    eprintln!();
    eprintln!("The device is grabbed, so the scanned digits do not reach other applications.");
    eprintln!("SIGINT (Ctrl+C), SIGTERM and SIGHUP end the program after the current read.");
    process::exit(1);
}

fn parse_timeout(arg: &str) -> Option<Duration> {
    let secs = arg.trim().parse::<f64>().ok()?;
    let timeout = Duration::try_from_secs_f64(secs).ok()?;
    (timeout >= Duration::from_millis(1)).then_some(timeout)
}

fn main() -> io::Result<()> {
    env_logger::init();
    let (path, timeout) = match &*env::args().skip(1).collect::<Vec<_>>() {
        [path, timeout] => match parse_timeout(timeout) {
            Some(timeout) => (path.clone(), timeout),
            None => {
                eprintln!("{timeout}: invalid idle timeout (in seconds)");
                process::exit(1);
            }
        },
        _ => usage(),
    };

    let shutdown = ShutdownFlag::install(&ShutdownFlag::DEFAULT_SIGNALS)?;

    let mut dev = BarcodeDevice::new();
    if let Err(e) = dev.open(&path) {
        eprintln!("{path}: cannot open barcode device: {e}");
        process::exit(1);
    }

    let mut failed = false;
    loop {
        if shutdown.is_set() {
            eprintln!("Signaled to exit. Complying.");
            break;
        }
        match dev.read_code(timeout) {
            Ok(Some(code)) => println!("{code}"),
            Ok(None) => {
                eprintln!("Timed out, no more barcodes.");
                break;
            }
            Err(e) => {
                eprintln!("error reading from {path}: {e}");
                failed = true;
                break;
            }
        }
    }

    if let Err(e) = dev.close() {
        eprintln!("warning: error closing {path}: {e}");
        failed = true;
    }
    if failed {
        process::exit(1);
    }
    Ok(())
}
