//! ConfigFS backend
//!
//! Drives the composable gadget API under `<configfs>/usb_gadget`. Reuses the
//! gadget that is currently bound to a UDC, or builds a minimal one named `g1`
//! when none is active.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::attr::{create_dir, dir_exists, find_mount_point, list_entries, read_file, write_file};
use super::backend::{
    image_attr, BackendKind, Capabilities, GadgetBackend, MountOptions, MountStatus,
};
use super::detach::DetachedGadget;
use super::function::MassStorageFunction;
use super::paths::GadgetPaths;
use crate::error::{AppError, Result};

/// Gadget directory below the configfs mount point
pub const USB_GADGET_DIR: &str = "usb_gadget";

/// Name of the gadget created when none is active
pub const DEFAULT_GADGET_NAME: &str = "g1";

/// Config created with a new gadget, and the fallback when `configs/` is empty
pub const DEFAULT_CONFIG_NAME: &str = "c.1";

/// USB Vendor ID (Google)
pub const DEFAULT_USB_VENDOR_ID: u16 = 0x18d1;

/// USB Product ID (mass storage)
pub const DEFAULT_USB_PRODUCT_ID: u16 = 0x4e26;

/// USB Gadget device descriptor used for a newly created gadget
#[derive(Debug, Clone)]
pub struct GadgetDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
    pub configuration: String,
}

impl Default for GadgetDescriptor {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_USB_VENDOR_ID,
            product_id: DEFAULT_USB_PRODUCT_ID,
            manufacturer: "Android".to_string(),
            product: "USB Drive".to_string(),
            serial_number: "123456".to_string(),
            configuration: "Config 1".to_string(),
        }
    }
}

/// ConfigFS gadget backend
#[derive(Debug, Clone)]
pub struct ConfigFsBackend {
    /// Fixed configfs mount point; `None` looks it up on every call
    configfs: Option<PathBuf>,
    /// UDC class directory, used to bind a freshly created gadget
    udc_class: PathBuf,
    descriptor: GadgetDescriptor,
    function: MassStorageFunction,
}

impl ConfigFsBackend {
    pub fn new(paths: &GadgetPaths) -> Self {
        Self {
            configfs: paths.configfs.clone(),
            udc_class: paths.udc_class.clone(),
            descriptor: GadgetDescriptor::default(),
            function: MassStorageFunction::default(),
        }
    }

    fn mount_point(&self) -> Option<PathBuf> {
        self.configfs
            .clone()
            .or_else(|| find_mount_point("configfs"))
    }

    fn gadgets_dir(&self) -> Result<PathBuf> {
        self.mount_point()
            .map(|p| p.join(USB_GADGET_DIR))
            .ok_or_else(|| AppError::NotFound("configfs not mounted".to_string()))
    }

    /// First gadget whose UDC attribute names a controller
    fn find_active_gadget(gadgets_dir: &Path) -> Result<Option<PathBuf>> {
        for name in list_entries(gadgets_dir)? {
            let gadget_path = gadgets_dir.join(&name);
            let udc = read_file(&gadget_path.join("UDC")).unwrap_or_default();
            if !udc.is_empty() {
                debug!("Gadget {} is bound to {}", name, udc);
                return Ok(Some(gadget_path));
            }
        }
        Ok(None)
    }

    /// Locate the gadget to operate on without creating anything
    fn lookup_gadget_root(&self) -> Result<PathBuf> {
        let gadgets_dir = self.gadgets_dir()?;
        if !dir_exists(&gadgets_dir) {
            return Err(AppError::NotFound(format!(
                "no gadget directory at {}",
                gadgets_dir.display()
            )));
        }

        if let Some(active) = Self::find_active_gadget(&gadgets_dir)? {
            return Ok(active);
        }

        let fallback = gadgets_dir.join(DEFAULT_GADGET_NAME);
        if dir_exists(&fallback) {
            return Ok(fallback);
        }

        Err(AppError::NotFound(format!(
            "no USB gadget found under {}",
            gadgets_dir.display()
        )))
    }

    /// Locate the active gadget, creating one if none is bound
    fn find_gadget_root(&self) -> Result<PathBuf> {
        let gadgets_dir = self.gadgets_dir()?;
        if !dir_exists(&gadgets_dir) {
            create_dir(&gadgets_dir)?;
        }

        if let Some(active) = Self::find_active_gadget(&gadgets_dir)? {
            return Ok(active);
        }

        let gadget_path = gadgets_dir.join(DEFAULT_GADGET_NAME);
        if !dir_exists(&gadget_path) {
            self.create_gadget(&gadget_path)?;
        }
        Ok(gadget_path)
    }

    /// Build a minimal gadget and bind it to the first UDC that accepts it
    fn create_gadget(&self, gadget_path: &Path) -> Result<()> {
        info!("Creating new USB gadget: {}", gadget_path.display());
        create_dir(gadget_path)?;

        write_file(
            &gadget_path.join("idVendor"),
            &format!("0x{:04x}", self.descriptor.vendor_id),
        )?;
        write_file(
            &gadget_path.join("idProduct"),
            &format!("0x{:04x}", self.descriptor.product_id),
        )?;

        let strings_path = gadget_path.join("strings/0x409");
        create_dir(&strings_path)?;
        write_file(
            &strings_path.join("serialnumber"),
            &self.descriptor.serial_number,
        )?;
        write_file(
            &strings_path.join("manufacturer"),
            &self.descriptor.manufacturer,
        )?;
        write_file(&strings_path.join("product"), &self.descriptor.product)?;

        let config_strings = gadget_path
            .join("configs")
            .join(DEFAULT_CONFIG_NAME)
            .join("strings/0x409");
        create_dir(&config_strings)?;
        write_file(
            &config_strings.join("configuration"),
            &self.descriptor.configuration,
        )?;

        self.bind_first_udc(gadget_path);
        Ok(())
    }

    fn bind_first_udc(&self, gadget_path: &Path) {
        let controllers = match list_entries(&self.udc_class) {
            Ok(controllers) => controllers,
            Err(e) => {
                warn!("No USB Device Controller (UDC) list: {}", e);
                return;
            }
        };

        for udc in controllers {
            match write_file(&gadget_path.join("UDC"), &udc) {
                Ok(()) => {
                    info!("Enabled USB gadget on UDC: {}", udc);
                    return;
                }
                Err(e) => debug!("UDC {} refused gadget: {}", udc, e),
            }
        }
        warn!("Gadget {} left unbound", gadget_path.display());
    }

    /// First config of the gadget, `c.1` when none exists yet
    fn find_config_root(gadget_path: &Path) -> Result<PathBuf> {
        let configs = gadget_path.join("configs");
        if !dir_exists(&configs) {
            create_dir(&configs)?;
        }

        let config = list_entries(&configs)?
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());
        Ok(configs.join(config))
    }
}

impl GadgetBackend for ConfigFsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ConfigFs
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            read_write: true,
            cdrom: true,
        }
    }

    fn expected_paths(&self) -> String {
        match &self.configfs {
            Some(root) => root.join(USB_GADGET_DIR).display().to_string(),
            None => "/sys/kernel/config/usb_gadget".to_string(),
        }
    }

    fn supported(&self) -> bool {
        self.mount_point().map(|p| dir_exists(&p)).unwrap_or(false)
    }

    fn mount(&self, image: &Path, opts: MountOptions) -> Result<()> {
        let image = image_attr(image)?;
        let gadget_root = self.find_gadget_root()?;
        info!("Found USB gadget: {}", gadget_root.display());

        let config_root = Self::find_config_root(&gadget_root)?;
        debug!("Using config: {}", config_root.display());

        let gadget = DetachedGadget::detach(&gadget_root)?;

        self.function.create(&gadget)?;
        self.function.link(&gadget, &config_root)?;
        self.function
            .configure_lun(&gadget, image, opts)?;

        info!("Mount verified successfully");
        Ok(())
    }

    fn unmount(&self) -> Result<()> {
        let gadget_root = self.lookup_gadget_root()?;
        info!("Found USB gadget: {}", gadget_root.display());

        let gadget = DetachedGadget::detach(&gadget_root)?;
        self.function.clear_lun(&gadget)?;

        info!("Unmount verified successfully");
        Ok(())
    }

    fn status(&self) -> MountStatus {
        match self.lookup_gadget_root() {
            Ok(gadget_root) => self.function.status(&gadget_root),
            Err(e) => {
                debug!("ConfigFS status unavailable: {}", e);
                MountStatus::not_mounted()
            }
        }
    }
}
