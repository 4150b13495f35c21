use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes `bytes` next to `path` under a temporary name, syncs, then renames over `path`.
///
/// Readers see either the old file or the complete new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    let staged = File::create(&staging).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(error) = staged {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }

    if fs::rename(&staging, path).is_ok() {
        return Ok(());
    }
    // Some platforms refuse to rename over an existing file.
    let replaced = match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => fs::rename(&staging, path),
    };
    if replaced.is_err() {
        let _ = fs::remove_file(&staging);
    }
    replaced
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("ranked_results");
    path.with_file_name(format!(".{file_name}.{}.partial", std::process::id()))
}
