//! Backend selection

use tracing::{debug, info};

use super::backend::{Backend, BackendKind, GadgetBackend};
use super::paths::GadgetPaths;
use crate::error::{AppError, Result};

/// Pick a backend from `candidates`
///
/// With `force`, the named backend is returned if the kernel supports it.
/// Without, the first supported candidate wins.
pub fn select_from(force: Option<&str>, candidates: Vec<Backend>) -> Result<Backend> {
    if let Some(name) = force {
        let kind: BackendKind = name.parse()?;
        let backend = candidates
            .into_iter()
            .find(|b| b.kind() == kind)
            .ok_or_else(|| AppError::UnknownBackend(name.to_string()))?;

        if !backend.supported() {
            return Err(AppError::NotSupported {
                backend: backend.name().to_string(),
                hint: backend.expected_paths(),
            });
        }
        info!("Using forced backend: {}", backend.name());
        return Ok(backend);
    }

    for backend in candidates {
        if backend.supported() {
            info!("Selected backend: {}", backend.name());
            return Ok(backend);
        }
        debug!("Backend {} not supported", backend.name());
    }

    Err(AppError::NotFound(
        "no supported USB gadget backend found (configfs, android_usb or UDC gadget)".to_string(),
    ))
}

/// Pick a backend among all three, bound to `paths`
pub fn select_backend(force: Option<&str>, paths: &GadgetPaths) -> Result<Backend> {
    select_from(force, Backend::candidates(paths))
}
