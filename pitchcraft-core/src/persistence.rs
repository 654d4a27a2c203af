//! Draft checkpoints: atomic JSON writes and the workspace draft directory.
//!
//! Writes go to a uniquely named temp file next to the target, are flushed to
//! disk, then renamed over the target, so a reader never sees a half-written
//! draft.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Workspace-relative directory holding saved drafts.
pub const DRAFTS_DIR: &str = ".pitchcraft/drafts";

/// Serialize `data` as pretty JSON and write it atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, &json)
}

/// Write `data` to `path` through a temp file and rename, creating parent
/// directories as needed.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    ));

    let written = File::create(&tmp).and_then(|mut f| {
        f.write_all(data)?;
        f.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Load JSON from `path`. `Ok(None)` if the file does not exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let value =
        serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

/// Default checkpoint location for a run.
pub fn draft_path(workspace: &Path, run_id: Uuid) -> PathBuf {
    workspace.join(DRAFTS_DIR).join(format!("{run_id}.json"))
}

/// Saved drafts in `workspace`, most recently modified first.
pub fn list_drafts(workspace: &Path) -> io::Result<Vec<PathBuf>> {
    let dir = workspace.join(DRAFTS_DIR);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut drafts = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            let modified = entry.metadata()?.modified()?;
            drafts.push((modified, path));
        }
    }
    drafts.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(drafts.into_iter().map(|(_, p)| p).collect())
}
