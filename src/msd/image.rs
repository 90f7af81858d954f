//! Image file checks
//!
//! Anything written into a LUN file is opened by the kernel with full
//! privileges, so the path is vetted first: no system directories (including
//! via symlinks), and it must be a readable, non-empty regular file.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, Result};

/// Directories an image may never come from (whole-component prefix match)
const DENIED_PREFIXES: [&str; 11] = [
    "/system",
    "/sys",
    "/proc",
    "/dev",
    "/etc",
    "/bin",
    "/sbin",
    "/boot",
    "/root",
    "/data/system",
    "/data/data",
];

/// Symlink hops followed before giving up
const MAX_SYMLINK_HOPS: usize = 16;

/// Image file metadata
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    /// Absolute path
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl ImageInfo {
    /// Format size for display
    pub fn size_display(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if self.size >= GB {
            format!("{:.2} GB", self.size as f64 / GB as f64)
        } else if self.size >= MB {
            format!("{:.2} MB", self.size as f64 / MB as f64)
        } else if self.size >= KB {
            format!("{:.2} KB", self.size as f64 / KB as f64)
        } else {
            format!("{} B", self.size)
        }
    }
}

/// Drop `.` and fold `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Make `path` absolute against the current directory, `.` and `..` folded
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    std::env::current_dir()
        .map(|cwd| normalize(&cwd.join(path)))
        .map_err(|e| AppError::InvalidImage(format!("invalid path {}: {}", path.display(), e)))
}

fn check_not_denied(path: &Path) -> Result<()> {
    match DENIED_PREFIXES.iter().find(|p| path.starts_with(p)) {
        Some(denied) => Err(AppError::InvalidImage(format!(
            "cannot mount files from system directory: {}",
            denied
        ))),
        None => Ok(()),
    }
}

/// Reject paths in (or symlinked into) a system directory
///
/// `path` must already be absolute and normalized.
fn validate_safe_path(path: &Path) -> Result<()> {
    let mut current = path.to_path_buf();

    for _ in 0..MAX_SYMLINK_HOPS {
        check_not_denied(&current)?;

        let Ok(target) = fs::read_link(&current) else {
            // Symlinked parent directories are caught on the resolved path
            if let Ok(resolved) = fs::canonicalize(&current) {
                check_not_denied(&resolved)?;
            }
            return Ok(());
        };
        debug!("{} is a symlink to {}", current.display(), target.display());

        current = match current.parent() {
            Some(dir) => normalize(&dir.join(&target)),
            None => normalize(&target),
        };
    }

    Err(AppError::InvalidImage(format!(
        "too many levels of symbolic links: {}",
        path.display()
    )))
}

/// Check that `path` may be exposed as a disk image
pub fn validate_image(path: &Path) -> Result<ImageInfo> {
    // LUN attributes are text; a lossy conversion would name another file
    if path.to_str().is_none() {
        return Err(AppError::InvalidImage(format!(
            "path is not valid UTF-8: {}",
            path.display()
        )));
    }
    let path = absolute_path(path)?;
    validate_safe_path(&path)?;

    let metadata = fs::metadata(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::InvalidImage(format!("file does not exist: {}", path.display()))
        } else {
            AppError::InvalidImage(format!("cannot access file {}: {}", path.display(), e))
        }
    })?;

    if metadata.is_dir() {
        return Err(AppError::InvalidImage(format!(
            "path is a directory: {}",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(AppError::InvalidImage(format!(
            "file is empty: {}",
            path.display()
        )));
    }

    File::open(&path).map_err(|e| {
        AppError::InvalidImage(format!("file not readable {}: {}", path.display(), e))
    })?;

    Ok(ImageInfo {
        size: metadata.len(),
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_system_directory() {
        let err = validate_image(Path::new("/system/app/evil.iso")).unwrap_err();
        assert!(err.to_string().contains("/system"));
    }

    #[test]
    fn test_rejects_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("empty.img");
        fs::write(&image, b"").unwrap();

        assert!(matches!(
            validate_image(&image),
            Err(AppError::InvalidImage(msg)) if msg.contains("empty")
        ));
    }

    #[test]
    fn test_rejects_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            validate_image(temp_dir.path()),
            Err(AppError::InvalidImage(msg)) if msg.contains("directory")
        ));
    }

    #[test]
    fn test_rejects_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            validate_image(&temp_dir.path().join("missing.iso")),
            Err(AppError::InvalidImage(msg)) if msg.contains("does not exist")
        ));
    }

    #[test]
    fn test_accepts_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("disk.img");
        fs::write(&image, vec![0u8; 4096]).unwrap();

        let info = validate_image(&image).unwrap();
        assert_eq!(info.path, image);
        assert_eq!(info.size, 4096);
        assert_eq!(info.size_display(), "4.00 KB");
    }

    #[test]
    fn test_rejects_symlink_into_system_directory() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("passwd.img");
        symlink("/etc/passwd", &link).unwrap();

        assert!(matches!(
            validate_image(&link),
            Err(AppError::InvalidImage(msg)) if msg.contains("/etc")
        ));
    }

    #[test]
    fn test_rejects_parent_dir_escape() {
        assert!(matches!(
            validate_image(Path::new("/tmp/../etc/passwd")),
            Err(AppError::InvalidImage(msg)) if msg.contains("/etc")
        ));
        assert!(matches!(
            validate_image(Path::new("/sys/./../etc/passwd")),
            Err(AppError::InvalidImage(msg)) if msg.contains("/etc")
        ));
    }

    #[test]
    fn test_rejects_relative_symlink_escape() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("p.img");
        let mut target = PathBuf::new();
        for _ in temp_dir.path().components().skip(1) {
            target.push("..");
        }
        target.push("etc/passwd");
        symlink(&target, &link).unwrap();

        assert!(matches!(
            validate_image(&link),
            Err(AppError::InvalidImage(msg)) if msg.contains("/etc")
        ));
    }

    #[test]
    fn test_rejects_symlinked_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("etc-link");
        symlink("/etc", &link).unwrap();

        assert!(matches!(
            validate_image(&link.join("passwd")),
            Err(AppError::InvalidImage(msg)) if msg.contains("/etc")
        ));
    }

    #[test]
    fn test_deny_list_matches_whole_components() {
        assert!(check_not_denied(Path::new("/sysfoo/disk.img")).is_ok());
        assert!(check_not_denied(Path::new("/data/systemic/disk.img")).is_ok());
        assert!(check_not_denied(Path::new("/sys/disk.img")).is_err());
        assert!(check_not_denied(Path::new("/data/data/disk.img")).is_err());
    }

    #[test]
    fn test_normalize_folds_dots() {
        assert_eq!(
            normalize(Path::new("/tmp/./a/../b.img")),
            PathBuf::from("/tmp/b.img")
        );
        assert_eq!(normalize(Path::new("/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn test_rejects_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir
            .path()
            .join(OsStr::from_bytes(b"img\xff.iso"));
        fs::write(&image, vec![0u8; 512]).unwrap();

        assert!(matches!(
            validate_image(&image),
            Err(AppError::InvalidImage(msg)) if msg.contains("UTF-8")
        ));
    }

    #[test]
    fn test_symlink_cycle_terminates() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.img");
        let b = temp_dir.path().join("b.img");
        symlink(&b, &a).unwrap();
        symlink(&a, &b).unwrap();

        assert!(matches!(
            validate_image(&a),
            Err(AppError::InvalidImage(msg)) if msg.contains("symbolic links")
        ));
    }

    #[test]
    fn test_size_display() {
        let info = ImageInfo {
            path: PathBuf::from("/sdcard/x.iso"),
            size: 3 * 1024 * 1024 * 1024,
        };
        assert_eq!(info.size_display(), "3.00 GB");
    }
}
