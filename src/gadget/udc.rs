//! UDC-bound legacy gadget backend
//!
//! Older kernels expose the mass storage LUN of a statically bound gadget at
//! `/sys/class/udc/<ctrl>/device/gadget/lun0`. There is no binding to toggle;
//! the controller's `soft_connect` attribute, when present, is used to make
//! the host re-enumerate.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::attr::{file_exists, list_entries, read_file, write_file};
use super::backend::{
    image_attr, BackendKind, Capabilities, GadgetBackend, MountOptions, MountStatus,
};
use super::detach::SoftDisconnect;
use super::paths::GadgetPaths;
use super::verify::{verify_mount, verify_unmount};
use crate::error::{AppError, Result};

/// LUN directory relative to a controller entry
const LUN_DIR: &str = "device/gadget/lun0";

/// A controller that exposes a LUN
#[derive(Debug, Clone, PartialEq, Eq)]
struct UdcLun {
    /// `/sys/class/udc/<ctrl>`
    controller: PathBuf,
    /// `<controller>/device/gadget/lun0`
    lun_dir: PathBuf,
}

impl UdcLun {
    fn file(&self) -> PathBuf {
        self.lun_dir.join("file")
    }

    fn ro(&self) -> PathBuf {
        self.lun_dir.join("ro")
    }
}

/// UDC gadget backend
#[derive(Debug, Clone)]
pub struct UdcBackend {
    udc_class: PathBuf,
}

impl UdcBackend {
    pub fn new(paths: &GadgetPaths) -> Self {
        Self {
            udc_class: paths.udc_class.clone(),
        }
    }

    /// First controller, in name order, whose gadget has a LUN file
    fn find_lun(&self) -> Result<UdcLun> {
        list_entries(&self.udc_class)?
            .into_iter()
            .map(|name| {
                let controller = self.udc_class.join(name);
                let lun_dir = controller.join(LUN_DIR);
                UdcLun {
                    controller,
                    lun_dir,
                }
            })
            .find(|lun| file_exists(&lun.file()))
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no lun file found under {}",
                    self.udc_class.display()
                ))
            })
    }

    fn set_read_only(lun: &UdcLun, read_only: bool) -> Result<()> {
        let ro = lun.ro();
        if !file_exists(&ro) {
            debug!("No ro attribute, LUN stays read-write");
            return Ok(());
        }

        // Often shipped 0444
        if let Err(e) = fs::set_permissions(&ro, fs::Permissions::from_mode(0o644)) {
            warn!("Failed to make {} writable: {}", ro.display(), e);
        }

        let value = if read_only { "1" } else { "0" };
        info!("Setting read-only flag: {}", value);
        write_file(&ro, value)
    }
}

impl GadgetBackend for UdcBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Udc
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            read_write: true,
            cdrom: false,
        }
    }

    fn expected_paths(&self) -> String {
        self.udc_class.join("*").join(LUN_DIR).display().to_string()
    }

    fn supported(&self) -> bool {
        self.find_lun().is_ok()
    }

    fn mount(&self, image: &Path, opts: MountOptions) -> Result<()> {
        let image = image_attr(image)?;
        if opts.cdrom {
            warn!("UDC backend does not support CDROM mode, ignoring");
        }

        let lun = self.find_lun()?;
        info!("Found LUN: {}", lun.lun_dir.display());

        let _connection = SoftDisconnect::disconnect(&lun.controller);

        info!("Clearing LUN file");
        write_file(&lun.file(), "")?;

        Self::set_read_only(&lun, !opts.read_write)?;

        info!("Writing image path to LUN");
        write_file(&lun.file(), image)?;

        info!("Verifying mount");
        verify_mount(&lun.file(), image)?;

        info!("Mount verified successfully");
        Ok(())
    }

    fn unmount(&self) -> Result<()> {
        let lun = self.find_lun()?;

        info!("Clearing LUN file");
        write_file(&lun.file(), "")?;

        info!("Verifying unmount");
        verify_unmount(&lun.file())?;

        info!("Unmount verified successfully");
        Ok(())
    }

    fn status(&self) -> MountStatus {
        let Ok(lun) = self.find_lun() else {
            return MountStatus::not_mounted();
        };

        match read_file(&lun.file()) {
            Ok(file) if !file.is_empty() => MountStatus {
                mounted: true,
                file: Some(PathBuf::from(file)),
                read_only: read_file(&lun.ro()).map(|ro| ro == "1").unwrap_or(false),
                cdrom: false,
            },
            _ => MountStatus::not_mounted(),
        }
    }
}
