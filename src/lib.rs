#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod macros;

#[cfg(test)]
mod test;

pub mod device;
mod drop;
pub mod event;
mod raw;
mod session;
pub mod signal;
mod timer;
pub mod uinput;
mod util;
mod version;

#[doc(inline)]
pub use device::Device;
pub use event::UnknownVariant;
pub use session::{BarcodeDevice, MAX_CODE_LEN, REPEAT_INTERVAL, Scan, ScanStatus};
#[doc(inline)]
pub use signal::{ShutdownFlag, install_shutdown, timeout_signal};
#[doc(inline)]
pub use uinput::VirtualScanner;
pub use version::Version;
