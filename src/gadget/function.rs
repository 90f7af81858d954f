//! Mass storage function of a ConfigFS gadget

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::attr::{create_dir, create_symlink, dir_exists, path_exists, read_file, write_file};
use super::backend::{MountOptions, MountStatus};
use super::detach::DetachedGadget;
use super::verify::{verify_mount, verify_unmount};
use crate::error::Result;

/// Function directory name under `functions/`
pub const MSD_FUNCTION_NAME: &str = "mass_storage.0";

/// The single LUN this tool drives
const LUN_NAME: &str = "lun.0";

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// `functions/mass_storage.0` and its `lun.0`
#[derive(Debug, Clone)]
pub struct MassStorageFunction {
    name: &'static str,
}

impl Default for MassStorageFunction {
    fn default() -> Self {
        Self {
            name: MSD_FUNCTION_NAME,
        }
    }
}

impl MassStorageFunction {
    pub fn name(&self) -> &str {
        self.name
    }

    /// Get function path in gadget
    pub fn function_path(&self, gadget_path: &Path) -> PathBuf {
        gadget_path.join("functions").join(self.name)
    }

    /// Get LUN path
    pub fn lun_path(&self, gadget_path: &Path) -> PathBuf {
        self.function_path(gadget_path).join(LUN_NAME)
    }

    /// Get the LUN `file` attribute
    pub fn lun_file(&self, gadget_path: &Path) -> PathBuf {
        self.lun_path(gadget_path).join("file")
    }

    /// Whether the function directory exists
    pub fn exists(&self, gadget_path: &Path) -> bool {
        dir_exists(&self.function_path(gadget_path))
    }

    /// Create the function directory if it is missing
    pub fn create(&self, gadget: &DetachedGadget) -> Result<()> {
        let func_path = self.function_path(gadget.gadget_path());
        if !dir_exists(&func_path) {
            info!("Creating mass storage function");
            create_dir(&func_path)?;
        }

        // The kernel creates lun.0 along with the function; plain trees need it made
        let lun_path = self.lun_path(gadget.gadget_path());
        if !dir_exists(&lun_path) {
            create_dir(&lun_path)?;
        }
        Ok(())
    }

    /// Link the function into `config_path` so the host sees it
    pub fn link(&self, gadget: &DetachedGadget, config_path: &Path) -> Result<()> {
        let link_path = config_path.join(self.name);
        if !path_exists(&link_path) {
            info!("Linking mass storage to config");
            create_symlink(&self.function_path(gadget.gadget_path()), &link_path)?;
        }
        Ok(())
    }

    /// Point the LUN at `image` with the requested flags, then read it back
    pub fn configure_lun(
        &self,
        gadget: &DetachedGadget,
        image: &str,
        opts: MountOptions,
    ) -> Result<()> {
        let lun_path = self.lun_path(gadget.gadget_path());
        let lun_file = lun_path.join("file");

        // Always clear first: not every kernel accepts a new path over an old one
        debug!("Clearing LUN file");
        write_file(&lun_file, "")?;

        info!("Setting CDROM flag: {}", flag(opts.cdrom));
        write_file(&lun_path.join("cdrom"), flag(opts.cdrom))?;

        info!("Setting read-only flag: {}", flag(!opts.read_write));
        write_file(&lun_path.join("ro"), flag(!opts.read_write))?;

        info!("Writing image path to LUN");
        write_file(&lun_file, image)?;

        info!("Verifying mount");
        verify_mount(&lun_file, image)
    }

    /// Empty the LUN, then read it back
    pub fn clear_lun(&self, gadget: &DetachedGadget) -> Result<()> {
        let lun_file = self.lun_file(gadget.gadget_path());

        info!("Clearing LUN file");
        write_file(&lun_file, "")?;

        info!("Verifying unmount");
        verify_unmount(&lun_file)
    }

    /// Read the LUN state without touching the gadget
    pub fn status(&self, gadget_path: &Path) -> MountStatus {
        if !self.exists(gadget_path) {
            return MountStatus::not_mounted();
        }

        let lun_path = self.lun_path(gadget_path);
        let file = match read_file(&lun_path.join("file")) {
            Ok(file) if !file.is_empty() => file,
            _ => return MountStatus::not_mounted(),
        };

        let read_attr = |attr: &str| read_file(&lun_path.join(attr)).unwrap_or_default();

        MountStatus {
            mounted: true,
            file: Some(PathBuf::from(file)),
            read_only: read_attr("ro") == "1",
            cdrom: read_attr("cdrom") == "1",
        }
    }
}
