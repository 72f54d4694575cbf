use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::settings::Settings;

const SCRATCH_PREFIX: &str = "layerpack-";

/// Best-effort recursive chmod for trees that tools left read-only.
#[cfg(unix)]
pub(crate) fn make_writable_recursive(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }
    let mode = if meta.is_dir() { 0o755 } else { 0o644 };
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
    if meta.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                make_writable_recursive(&entry.path());
            }
        }
    }
}

#[cfg(not(unix))]
pub(crate) fn make_writable_recursive(path: &Path) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }
    let mut perms = meta.permissions();
    if perms.readonly() {
        perms.set_readonly(false);
        let _ = fs::set_permissions(path, perms);
    }
    if meta.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                make_writable_recursive(&entry.path());
            }
        }
    }
}

pub(crate) fn remove_dir_all_writable(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("failed to stat {}", path.display())),
    };
    if meta.file_type().is_symlink() {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove symlink {}", path.display()))?;
        return Ok(());
    }
    make_writable_recursive(path);
    fs::remove_dir_all(path).with_context(|| format!("failed to remove {}", path.display()))?;
    Ok(())
}

/// Per-build scratch space, removed when dropped.
pub struct ScratchDir {
    inner: Option<tempfile::TempDir>,
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    /// Allocate a fresh scratch directory according to `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error when the scratch root cannot be created.
    pub fn create(settings: &Settings) -> Result<Self> {
        let root = settings
            .scratch_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let mut scratch = Self::new_in(&root)?;
        scratch.keep = settings.keep_scratch;
        Ok(scratch)
    }

    pub(crate) fn new_in(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)
            .with_context(|| format!("failed to create scratch dir under {}", root.display()))?;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "allocated scratch directory");
        Ok(Self {
            inner: Some(dir),
            path,
            keep: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.inner.take() else {
            return;
        };
        let path = dir.keep();
        if self.keep {
            tracing::info!(path = %path.display(), "keeping scratch directory");
            return;
        }
        match remove_dir_all_writable(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed scratch directory"),
            Err(err) => tracing::warn!(%err, "failed to clean up scratch directory"),
        }
    }
}

/// Remove whatever currently occupies `path` so it can be replaced.
pub(crate) fn remove_path_for_replace(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("failed to stat {}", path.display())),
    };
    if meta.is_dir() {
        remove_dir_all_writable(path)
    } else {
        fs::remove_file(path).with_context(|| format!("failed to remove file {}", path.display()))
    }
}

/// Copy a file or directory tree to `dest`, replacing anything already there.
pub(crate) fn copy_replacing(src: &Path, dest: &Path) -> Result<()> {
    remove_path_for_replace(dest)?;
    if src.is_dir() {
        copy_dir_all(src, dest)
    } else {
        fs::copy(src, dest)
            .map(|_| ())
            .with_context(|| format!("copying {} to {}", src.display(), dest.display()))
    }
}

fn copy_dir_all(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("creating {}", dest.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("reading dir {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_all(&src_path, &dest_path)?;
        } else {
            fs::copy(&src_path, &dest_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dest_path.display())
            })?;
        }
    }
    Ok(())
}
