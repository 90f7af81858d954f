//! Backend contract shared by the three kernel interfaces

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::configfs::ConfigFsBackend;
use super::paths::GadgetPaths;
use super::sysfs::SysfsBackend;
use super::udc::UdcBackend;
use crate::error::{AppError, Result};

/// How the image is presented to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    /// Read-only disk
    Ro,
    /// Read-write disk
    #[default]
    Rw,
    /// Read-only optical drive
    Cdrom,
}

impl MountMode {
    pub fn from_flags(read_write: bool, cdrom: bool) -> Self {
        if cdrom {
            MountMode::Cdrom
        } else if read_write {
            MountMode::Rw
        } else {
            MountMode::Ro
        }
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MountMode::Ro => "read-only",
            MountMode::Rw => "read-write",
            MountMode::Cdrom => "cdrom",
        })
    }
}

/// Options for a single mount call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MountOptions {
    pub read_write: bool,
    pub cdrom: bool,
}

impl MountOptions {
    pub fn mode(&self) -> MountMode {
        MountMode::from_flags(self.read_write, self.cdrom)
    }
}

impl From<MountMode> for MountOptions {
    fn from(mode: MountMode) -> Self {
        match mode {
            MountMode::Ro => Self {
                read_write: false,
                cdrom: false,
            },
            MountMode::Rw => Self {
                read_write: true,
                cdrom: false,
            },
            MountMode::Cdrom => Self {
                read_write: false,
                cdrom: true,
            },
        }
    }
}

/// Snapshot of what the gadget currently exposes
///
/// Re-read from the kernel on every query. When `mounted` is false the other
/// fields carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MountStatus {
    pub mounted: bool,
    pub file: Option<PathBuf>,
    pub read_only: bool,
    pub cdrom: bool,
}

impl MountStatus {
    pub fn not_mounted() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> MountMode {
        MountMode::from_flags(!self.read_only, self.cdrom)
    }
}

/// What a backend can honour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub read_write: bool,
    pub cdrom: bool,
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.read_write, self.cdrom) {
            (true, true) => f.write_str("read-write, cdrom"),
            (true, false) => f.write_str("read-write"),
            (false, true) => f.write_str("read-only, cdrom"),
            (false, false) => f.write_str("read-only"),
        }
    }
}

/// Backend identity, in selection preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    ConfigFs,
    #[serde(alias = "legacy")]
    Udc,
    Sysfs,
}

impl BackendKind {
    /// Fixed preference order used when no backend is forced
    pub const ALL: [BackendKind; 3] = [BackendKind::ConfigFs, BackendKind::Udc, BackendKind::Sysfs];

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::ConfigFs => "configfs",
            BackendKind::Udc => "udc",
            BackendKind::Sysfs => "sysfs",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "configfs" => Ok(BackendKind::ConfigFs),
            "udc" | "legacy" => Ok(BackendKind::Udc),
            "sysfs" => Ok(BackendKind::Sysfs),
            other => Err(AppError::UnknownBackend(other.to_string())),
        }
    }
}

/// Image path as written into a LUN attribute
///
/// The attribute is text, so a path that is not valid UTF-8 cannot be
/// expressed there and is rejected instead of being mangled.
pub(crate) fn image_attr(image: &Path) -> Result<&str> {
    image.to_str().ok_or_else(|| {
        AppError::InvalidImage(format!("path is not valid UTF-8: {}", image.display()))
    })
}

/// Operations every kernel interface provides
pub trait GadgetBackend {
    /// Which backend this is
    fn kind(&self) -> BackendKind;

    /// Options this backend honours
    fn capabilities(&self) -> Capabilities;

    /// Kernel paths this backend needs, for error hints
    fn expected_paths(&self) -> String;

    /// Whether the kernel exposes this interface
    fn supported(&self) -> bool;

    /// Expose `image` to the host
    fn mount(&self, image: &Path, opts: MountOptions) -> Result<()>;

    /// Stop exposing any image
    fn unmount(&self) -> Result<()>;

    /// Current state; failures read as "not mounted"
    fn status(&self) -> MountStatus;

    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// The closed set of backends
#[derive(Debug, Clone)]
pub enum Backend {
    ConfigFs(ConfigFsBackend),
    Udc(UdcBackend),
    Sysfs(SysfsBackend),
}

macro_rules! dispatch {
    ($self:ident, $b:ident => $call:expr) => {
        match $self {
            Backend::ConfigFs($b) => $call,
            Backend::Udc($b) => $call,
            Backend::Sysfs($b) => $call,
        }
    };
}

impl Backend {
    /// Build the backend of `kind` bound to `paths`
    pub fn new(kind: BackendKind, paths: &GadgetPaths) -> Self {
        match kind {
            BackendKind::ConfigFs => Backend::ConfigFs(ConfigFsBackend::new(paths)),
            BackendKind::Udc => Backend::Udc(UdcBackend::new(paths)),
            BackendKind::Sysfs => Backend::Sysfs(SysfsBackend::new(paths)),
        }
    }

    /// All backends in preference order
    pub fn candidates(paths: &GadgetPaths) -> Vec<Backend> {
        BackendKind::ALL
            .iter()
            .map(|kind| Backend::new(*kind, paths))
            .collect()
    }
}

impl GadgetBackend for Backend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, b => b.kind())
    }

    fn capabilities(&self) -> Capabilities {
        dispatch!(self, b => b.capabilities())
    }

    fn expected_paths(&self) -> String {
        dispatch!(self, b => b.expected_paths())
    }

    fn supported(&self) -> bool {
        dispatch!(self, b => b.supported())
    }

    fn mount(&self, image: &Path, opts: MountOptions) -> Result<()> {
        dispatch!(self, b => b.mount(image, opts))
    }

    fn unmount(&self) -> Result<()> {
        dispatch!(self, b => b.unmount())
    }

    fn status(&self) -> MountStatus {
        dispatch!(self, b => b.status())
    }
}
