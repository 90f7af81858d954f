//! Scoped disconnect guards
//!
//! LUN attributes can only be changed while the gadget is off the bus. The
//! guards here take it off the bus when created and put it back when dropped,
//! so every exit path (success, `?` early return, panic unwinding) reconnects
//! the host.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::attr::{file_exists, read_file, write_file};
use crate::error::Result;

/// Exclusive access to a ConfigFS gadget that has been unbound from its UDC
///
/// Dropping it writes the previous controller name back to `UDC`. Rebind
/// failures are logged and never replace the error that ended the operation.
#[derive(Debug)]
pub struct DetachedGadget {
    gadget_path: PathBuf,
    previous_udc: String,
}

impl DetachedGadget {
    /// Record the current UDC binding and unbind the gadget
    pub fn detach(gadget_path: &Path) -> Result<Self> {
        let udc_file = gadget_path.join("UDC");
        let previous_udc = read_file(&udc_file)?;
        info!("Current UDC controller: {:?}", previous_udc);

        if previous_udc.is_empty() {
            debug!("Gadget {} already unbound", gadget_path.display());
        } else {
            info!("Disabling UDC");
            write_file(&udc_file, "")?;
        }

        Ok(Self {
            gadget_path: gadget_path.to_path_buf(),
            previous_udc,
        })
    }

    pub fn gadget_path(&self) -> &Path {
        &self.gadget_path
    }
}

impl Drop for DetachedGadget {
    fn drop(&mut self) {
        if self.previous_udc.is_empty() {
            return;
        }
        info!("Re-enabling UDC: {}", self.previous_udc);
        if let Err(e) = write_file(&self.gadget_path.join("UDC"), &self.previous_udc) {
            error!("Failed to rebind gadget to {}: {}", self.previous_udc, e);
        }
    }
}

/// A UDC soft-disconnected through its `soft_connect` attribute
///
/// Soft connect is best effort: a missing attribute or a failed write is a
/// warning, since some controllers re-enumerate on their own when the LUN
/// file changes.
#[derive(Debug)]
pub struct SoftDisconnect {
    soft_connect: Option<PathBuf>,
}

impl SoftDisconnect {
    /// Soft-disconnect the controller at `controller_dir`, if it supports it
    pub fn disconnect(controller_dir: &Path) -> Self {
        let path = controller_dir.join("soft_connect");
        if !file_exists(&path) {
            debug!("No soft_connect at {}, skipping disconnect", path.display());
            return Self { soft_connect: None };
        }

        info!("Disconnecting USB");
        if let Err(e) = write_file(&path, "disconnect") {
            warn!("Failed to disconnect USB: {}", e);
        }

        Self {
            soft_connect: Some(path),
        }
    }
}

impl Drop for SoftDisconnect {
    fn drop(&mut self) {
        if let Some(path) = &self.soft_connect {
            info!("Reconnecting USB");
            if let Err(e) = write_file(path, "connect") {
                warn!("Failed to reconnect USB: {}", e);
            }
        }
    }
}
