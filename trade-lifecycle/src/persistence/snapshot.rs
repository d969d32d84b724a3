use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes `state` to `path` atomically.
///
/// The JSON goes to a sibling temporary file which is fsynced and then
/// renamed over the target, so readers see either the old or the new
/// snapshot, never a torn one.
pub fn save_snapshot<T: Serialize>(path: &Path, state: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_vec_pretty(state)?;

    let temp = temp_path(path);
    let mut temp_file = std::fs::File::create(&temp)?;
    temp_file.write_all(&json)?;
    temp_file.sync_all()?;

    std::fs::rename(&temp, path)?;
    Ok(())
}

/// `<target>.tmp` next to the target, so the rename stays on one filesystem
/// and targets differing only in extension never share a temp file.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Reads a snapshot written by [`save_snapshot`]. `Ok(None)` if there is none yet.
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let reader = std::io::BufReader::new(file);
    Ok(Some(serde_json::from_reader(reader)?))
}
