//! MSD Controller
//!
//! Runs a mount/unmount end to end:
//! - Rejects option combinations no backend can express
//! - Validates the image path
//! - Selects the backend and demotes options it cannot honour
//! - Holds the operation lock while the backend touches the kernel

use tracing::{info, warn};

use super::image::validate_image;
use super::lock::OperationLock;
use super::types::{MountPlan, MountRequest, UnmountPlan};
use crate::error::{AppError, Result};
use crate::gadget::{
    select_backend, Backend, BackendKind, GadgetBackend, GadgetPaths, MountMode, MountOptions,
    MountStatus,
};

/// MSD Controller
#[derive(Debug, Clone, Default)]
pub struct MsdController {
    paths: GadgetPaths,
}

impl MsdController {
    /// Create a controller bound to `paths`
    pub fn new(paths: GadgetPaths) -> Self {
        Self { paths }
    }

    /// Resolve a request into a backend and the options it will receive
    fn prepare(&self, request: &MountRequest) -> Result<(Backend, MountPlan, MountOptions)> {
        let mut options = request.options;
        if options.cdrom && options.read_write {
            return Err(AppError::Config(
                "cannot use cdrom with read-write (CDROM devices are always read-only)"
                    .to_string(),
            ));
        }

        info!("Validating image file: {}", request.file.display());
        let image = validate_image(&request.file)?;

        let backend = select_backend(request.backend.as_deref(), &self.paths)?;
        let capabilities = backend.capabilities();

        let mut warnings = Vec::new();
        if options.read_write && !capabilities.read_write {
            warnings.push(format!(
                "{} backend only supports read-only mode, forcing read-only",
                backend.name()
            ));
            options.read_write = false;
        }
        if options.cdrom && !capabilities.cdrom {
            warnings.push(format!(
                "{} backend does not support CDROM mode",
                backend.name()
            ));
        }

        let plan = MountPlan {
            backend: backend.kind(),
            mode: MountMode::from_flags(options.read_write, options.cdrom && capabilities.cdrom),
            image,
            capabilities,
            warnings,
        };
        Ok((backend, plan, options))
    }

    /// Describe a mount without touching the gadget
    pub fn plan_mount(&self, request: &MountRequest) -> Result<MountPlan> {
        self.prepare(request).map(|(_, plan, _)| plan)
    }

    /// Expose the requested image to the host
    pub fn mount(&self, request: &MountRequest) -> Result<MountPlan> {
        let (backend, plan, options) = self.prepare(request)?;
        for warning in &plan.warnings {
            warn!("{}", warning);
        }

        let _lock = OperationLock::acquire(&self.paths.lock_file)?;

        info!(
            "Preparing to mount: backend={} file={} mode={}",
            plan.backend,
            plan.image.path.display(),
            plan.mode
        );
        backend.mount(&plan.image.path, options)?;

        info!("Successfully mounted image");
        Ok(plan)
    }

    /// Describe an unmount without touching the gadget
    pub fn plan_unmount(&self, force: Option<&str>) -> Result<UnmountPlan> {
        let backend = select_backend(force, &self.paths)?;
        Ok(UnmountPlan {
            backend: backend.kind(),
            current: backend.status(),
        })
    }

    /// Stop exposing whatever image is mounted
    pub fn unmount(&self, force: Option<&str>) -> Result<BackendKind> {
        let backend = select_backend(force, &self.paths)?;
        let _lock = OperationLock::acquire(&self.paths.lock_file)?;

        info!("Preparing to unmount: backend={}", backend.name());
        backend.unmount()?;

        info!("Successfully unmounted image");
        Ok(backend.kind())
    }

    /// Status of the first supported backend, in preference order
    pub fn status(&self) -> Option<(BackendKind, MountStatus)> {
        Backend::candidates(&self.paths)
            .into_iter()
            .find(|b| b.supported())
            .map(|b| (b.kind(), b.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use crate::gadget::attr::read_file;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn image(temp_dir: &TempDir) -> PathBuf {
        let image = temp_dir.path().join("x.iso");
        fs::write(&image, vec![0u8; 2048]).unwrap();
        image
    }

    fn configfs_controller() -> (TempDir, MsdController) {
        let temp_dir = TempDir::new().unwrap();
        let paths = GadgetPaths::under(temp_dir.path().join("kernel"));
        fs::create_dir_all(paths.configfs.as_ref().unwrap()).unwrap();
        fs::create_dir_all(paths.udc_class.join("fake-udc.0")).unwrap();
        (temp_dir, MsdController::new(paths))
    }

    fn sysfs_controller() -> (TempDir, MsdController) {
        let temp_dir = TempDir::new().unwrap();
        let paths = GadgetPaths::under(temp_dir.path().join("kernel"));
        fs::create_dir_all(paths.android_usb.join("f_mass_storage/lun")).unwrap();
        fs::write(paths.android_usb.join("enable"), "1\n").unwrap();
        (temp_dir, MsdController::new(paths))
    }

    #[test]
    fn test_cdrom_with_read_write_is_rejected() {
        let (temp_dir, controller) = configfs_controller();
        let mut request = MountRequest::new(image(&temp_dir), MountMode::Cdrom);
        request.options.read_write = true;

        assert!(matches!(
            controller.mount(&request),
            Err(AppError::Config(_))
        ));
        // Nothing reached the kernel tree
        let gadgets = controller.paths.configfs.as_ref().unwrap().join("usb_gadget");
        assert!(!gadgets.exists());
    }

    #[test]
    fn test_config_file_cdrom_end_to_end() {
        let (temp_dir, controller) = configfs_controller();
        let image = image(&temp_dir);
        let config_path = temp_dir.path().join("usbdrive.json");
        fs::write(
            &config_path,
            format!(r#"{{ "file": "{}", "mode": "cdrom" }}"#, image.display()),
        )
        .unwrap();

        let request = MountRequest::from(load_config(&config_path).unwrap());
        assert_eq!(
            request.options,
            MountOptions {
                read_write: false,
                cdrom: true
            }
        );

        let plan = controller.mount(&request).unwrap();
        assert_eq!(plan.backend, BackendKind::ConfigFs);
        assert_eq!(plan.mode, MountMode::Cdrom);

        let lun = controller
            .paths
            .configfs
            .as_ref()
            .unwrap()
            .join("usb_gadget/g1/functions/mass_storage.0/lun.0");
        assert_eq!(read_file(&lun.join("file")).unwrap(), image.to_string_lossy());
        assert_eq!(read_file(&lun.join("cdrom")).unwrap(), "1");
        assert_eq!(read_file(&lun.join("ro")).unwrap(), "1");

        let (kind, status) = controller.status().unwrap();
        assert_eq!(kind, BackendKind::ConfigFs);
        assert_eq!(status.file, Some(image));
    }

    #[test]
    fn test_sysfs_demotes_read_write() {
        let (temp_dir, controller) = sysfs_controller();
        let request = MountRequest::new(image(&temp_dir), MountMode::Rw);

        let plan = controller.plan_mount(&request).unwrap();
        assert_eq!(plan.backend, BackendKind::Sysfs);
        assert_eq!(plan.mode, MountMode::Ro);
        assert_eq!(plan.warnings.len(), 1);

        controller.mount(&request).unwrap();
        let (_, status) = controller.status().unwrap();
        assert!(status.mounted);
        assert!(status.read_only);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (temp_dir, controller) = configfs_controller();
        let mut request = MountRequest::new(image(&temp_dir), MountMode::Ro);
        request.backend = Some("configfs".to_string());

        let plan = controller.plan_mount(&request).unwrap();
        assert_eq!(plan.image.size, 2048);
        assert!(plan.warnings.is_empty());

        let gadgets = controller.paths.configfs.as_ref().unwrap().join("usb_gadget");
        assert!(!gadgets.exists());
        assert!(!controller.paths.lock_file.exists());
    }

    #[test]
    fn test_invalid_image_is_rejected_before_selection() {
        let (_temp_dir, controller) = configfs_controller();
        let request = MountRequest::new(Path::new("/system/app/evil.iso"), MountMode::Ro);
        assert!(matches!(
            controller.mount(&request),
            Err(AppError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_concurrent_operation_is_busy() {
        let (temp_dir, controller) = configfs_controller();
        let _held = OperationLock::acquire(&controller.paths.lock_file).unwrap();

        let request = MountRequest::new(image(&temp_dir), MountMode::Ro);
        assert!(matches!(controller.mount(&request), Err(AppError::Busy(_))));
        assert!(matches!(controller.unmount(None), Err(AppError::Busy(_))));
    }

    #[test]
    fn test_unmount_round_trip() {
        let (temp_dir, controller) = configfs_controller();
        controller
            .mount(&MountRequest::new(image(&temp_dir), MountMode::Rw))
            .unwrap();

        let plan = controller.plan_unmount(None).unwrap();
        assert!(plan.current.mounted);
        assert_eq!(plan.current.mode(), MountMode::Rw);

        assert_eq!(controller.unmount(None).unwrap(), BackendKind::ConfigFs);
        let (_, status) = controller.status().unwrap();
        assert!(!status.mounted);
    }

    #[test]
    fn test_status_without_backend() {
        let temp_dir = TempDir::new().unwrap();
        let controller = MsdController::new(GadgetPaths::under(temp_dir.path()));
        assert!(controller.status().is_none());
    }
}
