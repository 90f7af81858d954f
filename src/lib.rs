//! usbdrive - expose a disk image as USB mass storage
//!
//! This crate drives the kernel's USB gadget control files so that a single
//! image file shows up on the USB host as a disk or CD-ROM. It understands
//! the ConfigFS gadget API, the legacy UDC-bound gadget and the legacy
//! Android `android_usb` driver.

pub mod config;
pub mod error;
pub mod gadget;
pub mod msd;

pub use error::{AppError, Result};
