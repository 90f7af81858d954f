use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::gadget::{BackendKind, MountMode};

/// Mount configuration
///
/// ```json
/// { "file": "/sdcard/x.iso", "mode": "cdrom", "backend": "configfs" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Image to expose; resolved to an absolute path on load
    pub file: PathBuf,
    /// Presentation mode, read-write when absent
    #[serde(default)]
    pub mode: MountMode,
    /// Backend to force; `legacy` is accepted for `udc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
}
