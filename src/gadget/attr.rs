//! Kernel attribute file operations
//!
//! Every backend talks to the kernel through these helpers. Attribute files
//! under sysfs/configfs hold a single value terminated by a newline, so reads
//! are trimmed and writes always replace the whole value.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, Result};

/// Live mount table
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Places Android kernels expose configfs without a matching mount entry
const CONFIGFS_FALLBACKS: [&str; 2] = ["/sys/kernel/config", "/config"];

/// Check whether `path` is an existing non-directory
pub fn file_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
}

/// Check whether `path` is an existing directory
pub fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Check whether anything exists at `path` (symlinks are followed)
pub fn path_exists(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

/// Read an attribute and strip surrounding whitespace
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| AppError::io(path, e))
}

/// Write string content to an attribute
///
/// A single trailing newline is appended and the complete buffer goes out in
/// one write() call: sysfs handlers act on the first write and may reject a
/// value split across several.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .or_else(|e| {
            if path.exists() {
                // Some special files refuse O_TRUNC but accept a plain open
                OpenOptions::new().write(true).open(path).map_err(|_| e)
            } else {
                File::create(path)
            }
        })
        .map_err(|e| AppError::io(path, e))?;

    let mut buf = Vec::with_capacity(content.len() + 1);
    buf.extend_from_slice(content.as_bytes());
    buf.push(b'\n');

    file.write_all(&buf).map_err(|e| AppError::io(path, e))?;
    file.flush().map_err(|e| AppError::io(path, e))?;

    debug!("Wrote {:?} to {}", content, path.display());
    Ok(())
}

/// Create directory (and parents) if not exists
pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| AppError::io(path, e))
}

/// Create symlink `dest` pointing at `src`
pub fn create_symlink(src: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, dest).map_err(|e| AppError::io(dest, e))
}

/// List directory entry names, skipping dotfiles, in sorted order
pub fn list_entries(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(|e| AppError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    Ok(names)
}

/// Find where a filesystem type is mounted
///
/// Scans the live mount table for the first entry of type `fs_type`. For
/// configfs, falls back to the well-known Android locations when the mount
/// table has no entry.
pub fn find_mount_point(fs_type: &str) -> Option<PathBuf> {
    let table = fs::read_to_string(PROC_MOUNTS).unwrap_or_default();
    if let Some(point) = parse_mount_table(&table, fs_type) {
        return Some(point);
    }

    if fs_type == "configfs" {
        return CONFIGFS_FALLBACKS
            .iter()
            .map(Path::new)
            .find(|p| dir_exists(p))
            .map(Path::to_path_buf);
    }

    None
}

/// Return the mount point of the first `fs_type` entry in a mounts table
fn parse_mount_table(table: &str, fs_type: &str) -> Option<PathBuf> {
    table.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        (fields.len() >= 3 && fields[2] == fs_type).then(|| PathBuf::from(fields[1]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_replaces_whole_value() {
        let temp_dir = TempDir::new().unwrap();
        let attr = temp_dir.path().join("file");

        write_file(&attr, "/sdcard/a-long-image-name.iso").unwrap();
        write_file(&attr, "").unwrap();

        assert_eq!(fs::read_to_string(&attr).unwrap(), "\n");
        assert_eq!(read_file(&attr).unwrap(), "");
    }

    #[test]
    fn test_read_trims_newline() {
        let temp_dir = TempDir::new().unwrap();
        let attr = temp_dir.path().join("UDC");
        fs::write(&attr, "  musb-hdrc.0\n").unwrap();

        assert_eq!(read_file(&attr).unwrap(), "musb-hdrc.0");
    }

    #[test]
    fn test_read_missing_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_file(&temp_dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }

    #[test]
    fn test_existence_predicates() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("enable");
        fs::write(&file, "0").unwrap();

        assert!(file_exists(&file));
        assert!(!dir_exists(&file));
        assert!(dir_exists(temp_dir.path()));
        assert!(!file_exists(temp_dir.path()));
        assert!(path_exists(&file));
        assert!(!path_exists(&temp_dir.path().join("nope")));
    }

    #[test]
    fn test_list_entries_skips_dotfiles() {
        let temp_dir = TempDir::new().unwrap();
        create_dir(&temp_dir.path().join("g2")).unwrap();
        create_dir(&temp_dir.path().join("g1")).unwrap();
        create_dir(&temp_dir.path().join(".hidden")).unwrap();

        assert_eq!(list_entries(temp_dir.path()).unwrap(), vec!["g1", "g2"]);
    }

    #[test]
    fn test_parse_mount_table() {
        let table = "\
sysfs /sys sysfs rw,nosuid 0 0
none /sys/kernel/config configfs rw,relatime 0 0
tmpfs /dev tmpfs rw 0 0
";
        assert_eq!(
            parse_mount_table(table, "configfs"),
            Some(PathBuf::from("/sys/kernel/config"))
        );
        assert_eq!(parse_mount_table(table, "functionfs"), None);
    }
}
