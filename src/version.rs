use std::{ffi::c_int, fmt};

/// An `evdev` subsystem version, as reported by `EVIOCGVERSION`.
///
/// This is the version of the kernel's `evdev` interface (`EV_VERSION`), not the version of the
/// scanner's driver. Current kernels report `1.0.1`.
///
/// Returned by [`Device::driver_version`][crate::Device::driver_version], and logged whenever a
/// [`BarcodeDevice`][crate::BarcodeDevice] is opened.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub(crate) c_int);

impl Version {
    #[inline]
    pub fn major(self) -> u16 {
        (self.0 >> 16) as u16
    }

    #[inline]
    pub fn minor(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub fn patch(self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Version")
            .field(&format_args!("{self}"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components() {
        let v = Version(0x010001);
        assert_eq!((v.major(), v.minor(), v.patch()), (1, 0, 1));
        assert_eq!(v.to_string(), "1.0.1");
        assert_eq!(Version(0x020100).to_string(), "2.1.0");
        assert_eq!(format!("{v:?}"), "Version(1.0.1)");
        assert!(Version(0x010000) < v);
    }
}
