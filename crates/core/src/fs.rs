//! Filesystem utilities

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Create a directory and all parent directories if they don't exist
///
/// Returns `Ok(true)` when the directory had to be created.
pub fn ensure_dir_exists(path: &Path) -> io::Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path)?;
    Ok(true)
}

/// Check if a path exists
pub fn path_exists(path: &Path) -> bool {
    path.exists()
}

/// Check if a path is a directory
pub fn is_directory(path: &Path) -> bool {
    path.is_dir()
}

/// Write `path` through a sibling `<name>.tmp` file and rename it into place.
///
/// Readers see either the previous contents or the complete new contents.
/// The temporary file is synced to disk before the rename. On error it is
/// removed and the original is untouched.
pub fn replace_file<F, E>(path: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&mut File) -> Result<(), E>,
    E: From<io::Error>,
{
    let tmp = temp_path(path);
    let mut file = File::create(&tmp)?;
    let written = write(&mut file).and_then(|()| file.sync_all().map_err(E::from));
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
