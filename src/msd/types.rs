//! MSD request and plan types

use serde::Serialize;
use std::path::PathBuf;

use super::image::ImageInfo;
use crate::config::ImageConfig;
use crate::gadget::{BackendKind, Capabilities, MountMode, MountOptions, MountStatus};

/// A mount as asked for by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    /// Image to expose
    pub file: PathBuf,
    /// Requested flags, before backend-specific demotion
    pub options: MountOptions,
    /// Backend name to force instead of auto-detecting
    pub backend: Option<String>,
}

impl MountRequest {
    pub fn new(file: impl Into<PathBuf>, mode: MountMode) -> Self {
        Self {
            file: file.into(),
            options: mode.into(),
            backend: None,
        }
    }
}

impl From<ImageConfig> for MountRequest {
    fn from(config: ImageConfig) -> Self {
        Self {
            file: config.file,
            options: config.mode.into(),
            backend: config.backend.map(|b| b.name().to_string()),
        }
    }
}

/// What a mount will do (or did)
#[derive(Debug, Clone, Serialize)]
pub struct MountPlan {
    pub backend: BackendKind,
    pub image: ImageInfo,
    /// Mode the host will actually see
    pub mode: MountMode,
    pub capabilities: Capabilities,
    /// Requested options the backend cannot honour
    pub warnings: Vec<String>,
}

/// What an unmount will act on
#[derive(Debug, Clone, Serialize)]
pub struct UnmountPlan {
    pub backend: BackendKind,
    pub current: MountStatus,
}
