//! The shutdown flag is process-global and never reset, so it's tested in its own process.

use std::io;

use evbarcode::{ShutdownFlag, install_shutdown};

fn main() -> io::Result<()> {
    env_logger::init();

    let flag = install_shutdown(libc::SIGUSR1)?;
    ShutdownFlag::install(&[libc::SIGUSR2])?;
    assert!(!flag.is_set());
    assert!(!ShutdownFlag::get().is_set());

    println!("raising SIGUSR1");
    assert_eq!(unsafe { libc::raise(libc::SIGUSR1) }, 0);
    assert!(flag.is_set());
    assert!(ShutdownFlag::get().is_set());

    // Setting it again is harmless.
    assert_eq!(unsafe { libc::raise(libc::SIGUSR2) }, 0);
    assert!(flag.is_set());

    // Installing more signals doesn't reset it.
    ShutdownFlag::install(&ShutdownFlag::DEFAULT_SIGNALS)?;
    assert!(flag.is_set());

    println!("success!");
    Ok(())
}
