//! Legacy Android `android_usb` backend
//!
//! One global gadget with fixed attribute paths. Only read-only disks are
//! possible, and there is no recovery if a step fails halfway: the kernel
//! interface predates anything to restore to.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::attr::{file_exists, read_file, write_file};
use super::backend::{
    image_attr, BackendKind, Capabilities, GadgetBackend, MountOptions, MountStatus,
};
use super::paths::GadgetPaths;
use crate::error::Result;

/// Function list while an image is exposed
const MASS_STORAGE_FUNCTIONS: &str = "mass_storage";

/// Function list restored on unmount
const DEFAULT_FUNCTIONS: &str = "mtp";

/// android_usb backend
#[derive(Debug, Clone)]
pub struct SysfsBackend {
    root: PathBuf,
}

impl SysfsBackend {
    pub fn new(paths: &GadgetPaths) -> Self {
        Self {
            root: paths.android_usb.clone(),
        }
    }

    fn enable_file(&self) -> PathBuf {
        self.root.join("enable")
    }

    fn lun_file(&self) -> PathBuf {
        self.root.join("f_mass_storage/lun/file")
    }

    fn functions_file(&self) -> PathBuf {
        self.root.join("functions")
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        info!("{} USB", if enabled { "Enabling" } else { "Disabling" });
        write_file(&self.enable_file(), if enabled { "1" } else { "0" })
    }
}

impl GadgetBackend for SysfsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sysfs
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            read_write: false,
            cdrom: false,
        }
    }

    fn expected_paths(&self) -> String {
        self.enable_file().display().to_string()
    }

    fn supported(&self) -> bool {
        file_exists(&self.enable_file())
    }

    fn mount(&self, image: &Path, opts: MountOptions) -> Result<()> {
        let image = image_attr(image)?;
        if opts.cdrom {
            warn!("Sysfs backend does not support CDROM mode, ignoring");
        }
        if opts.read_write {
            warn!("Sysfs backend does not support read-write mode, ignoring");
        }

        self.set_enabled(false)?;

        info!("Setting image file path");
        write_file(&self.lun_file(), image)?;

        info!("Setting mass_storage function");
        write_file(&self.functions_file(), MASS_STORAGE_FUNCTIONS)?;

        self.set_enabled(true)
    }

    fn unmount(&self) -> Result<()> {
        self.set_enabled(false)?;

        info!("Clearing image file path");
        write_file(&self.lun_file(), "")?;

        info!("Resetting to MTP mode");
        write_file(&self.functions_file(), DEFAULT_FUNCTIONS)?;

        self.set_enabled(true)
    }

    fn status(&self) -> MountStatus {
        match read_file(&self.lun_file()) {
            Ok(file) if !file.is_empty() => MountStatus {
                mounted: true,
                file: Some(PathBuf::from(file)),
                read_only: true,
                cdrom: false,
            },
            _ => MountStatus::not_mounted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_android_usb() -> (TempDir, GadgetPaths) {
        let temp_dir = TempDir::new().unwrap();
        let paths = GadgetPaths::under(temp_dir.path());
        fs::create_dir_all(paths.android_usb.join("f_mass_storage/lun")).unwrap();
        fs::write(paths.android_usb.join("enable"), "1\n").unwrap();
        fs::write(paths.android_usb.join("functions"), "mtp,adb\n").unwrap();
        fs::write(paths.android_usb.join("f_mass_storage/lun/file"), "\n").unwrap();
        (temp_dir, paths)
    }

    #[test]
    fn test_supported() {
        let (temp_dir, paths) = fake_android_usb();
        assert!(SysfsBackend::new(&paths).supported());

        let missing = GadgetPaths::under(temp_dir.path().join("nothing"));
        assert!(!SysfsBackend::new(&missing).supported());
    }

    #[test]
    fn test_mount_ignores_rw_and_cdrom() {
        let (_temp_dir, paths) = fake_android_usb();
        let backend = SysfsBackend::new(&paths);
        let image = PathBuf::from("/sdcard/x.iso");

        backend
            .mount(
                &image,
                MountOptions {
                    read_write: true,
                    cdrom: true,
                },
            )
            .unwrap();

        let status = backend.status();
        assert!(status.mounted);
        assert_eq!(status.file, Some(image));
        assert!(status.read_only);
        assert!(!status.cdrom);

        assert_eq!(read_file(&backend.enable_file()).unwrap(), "1");
        assert_eq!(read_file(&backend.functions_file()).unwrap(), "mass_storage");
    }

    #[test]
    fn test_unmount_restores_mtp() {
        let (_temp_dir, paths) = fake_android_usb();
        let backend = SysfsBackend::new(&paths);
        backend
            .mount(Path::new("/sdcard/x.iso"), MountOptions::default())
            .unwrap();

        backend.unmount().unwrap();
        backend.unmount().unwrap();

        assert_eq!(read_file(&backend.lun_file()).unwrap(), "");
        assert_eq!(read_file(&backend.functions_file()).unwrap(), "mtp");
        assert_eq!(read_file(&backend.enable_file()).unwrap(), "1");
        assert!(!backend.status().mounted);
    }

    #[test]
    fn test_status_unreadable_lun_is_not_mounted() {
        let temp_dir = TempDir::new().unwrap();
        let paths = GadgetPaths::under(temp_dir.path());
        assert_eq!(SysfsBackend::new(&paths).status(), MountStatus::not_mounted());
    }
}
