//! Read-back checks after touching a LUN file
//!
//! The kernel can reject a LUN write without failing the write() call (for
//! example while the gadget is still bound), so every mount and unmount reads
//! the attribute back and compares.

use std::path::Path;

use super::attr::read_file;
use crate::error::{AppError, Result};

/// Require the LUN file to hold exactly `expected`
pub fn verify_mount(lun_file: &Path, expected: &str) -> Result<()> {
    let actual = read_file(lun_file)?;
    if actual != expected {
        return Err(AppError::VerifyFailed {
            path: lun_file.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Require the LUN file to be empty
pub fn verify_unmount(lun_file: &Path) -> Result<()> {
    verify_mount(lun_file, "")
}
