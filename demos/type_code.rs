//! Creates a virtual barcode scanner and types the given barcodes on it, one per second.

use std::{env, io, process, thread, time::Duration};

use evbarcode::{VirtualScanner, event::Key};

fn main() -> io::Result<()> {
    env_logger::init();
    let codes = env::args().skip(1).collect::<Vec<_>>();
    if codes.is_empty() {
        eprintln!("usage: {} <digits>...", env!("CARGO_CRATE_NAME"));
        process::exit(1);
    }

    let scanner = VirtualScanner::create("evbarcode virtual scanner")?;
    println!("virtual scanner at {}", scanner.evdev_path()?.display());

    // Give the reader some time to open the device.
    thread::sleep(Duration::from_secs(1));
    for code in &codes {
        scanner.type_code(code, Some(Key::KEY_ENTER))?;
        println!("typed {code}");
        thread::sleep(Duration::from_secs(1));
    }
    Ok(())
}
