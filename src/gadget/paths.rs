//! Kernel locations used by the backends

use std::path::PathBuf;

/// Root of the legacy Android USB function driver
pub const ANDROID_USB_PATH: &str = "/sys/devices/virtual/android_usb/android0";

/// USB Device Controller class directory
pub const UDC_CLASS_PATH: &str = "/sys/class/udc";

/// Name of the lock file placed in the temp directory
pub const LOCK_FILE_NAME: &str = "usbdrive.lock";

/// Every filesystem root a backend reads or writes
///
/// The defaults point at the live kernel. Tests point them into a temporary
/// tree instead.
#[derive(Debug, Clone)]
pub struct GadgetPaths {
    /// configfs mount point; `None` means look it up in the mount table
    pub configfs: Option<PathBuf>,
    /// `/sys/class/udc`
    pub udc_class: PathBuf,
    /// `/sys/devices/virtual/android_usb/android0`
    pub android_usb: PathBuf,
    /// Advisory lock taken around mount/unmount
    pub lock_file: PathBuf,
}

impl Default for GadgetPaths {
    fn default() -> Self {
        Self {
            configfs: None,
            udc_class: PathBuf::from(UDC_CLASS_PATH),
            android_usb: PathBuf::from(ANDROID_USB_PATH),
            lock_file: std::env::temp_dir().join(LOCK_FILE_NAME),
        }
    }
}

impl GadgetPaths {
    /// Lay out every root below `root`, mirroring the real kernel tree
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            configfs: Some(root.join("sys/kernel/config")),
            udc_class: root.join("sys/class/udc"),
            android_usb: root.join("sys/devices/virtual/android_usb/android0"),
            lock_file: root.join(LOCK_FILE_NAME),
        }
    }
}
