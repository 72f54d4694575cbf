use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use layerpack_domain::{LayerError, SizeMetric};
use serde::Serialize;
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::assembler::measure_tree_size;

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A finished layer archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveArtifact {
    pub path: PathBuf,
    pub bytes: u64,
}

impl ArchiveArtifact {
    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.bytes)
    }
}

/// Writes layer trees to deflated zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct Archiver {
    max_size_mb: Option<f64>,
}

impl Archiver {
    /// `max_size_mb` of `None` disables the ceiling.
    pub fn new(max_size_mb: Option<f64>) -> Self {
        Self { max_size_mb }
    }

    /// Archive `layer_root` to `output` with the `.zip` extension appended.
    ///
    /// Entry names are paths relative to `layer_root` with `/` separators,
    /// written in sorted order. An archive over the ceiling is deleted and
    /// [`LayerError::LayerSizeLimit`] is returned; a partially written archive
    /// is removed on any other failure.
    pub fn build_archive(&self, layer_root: &Path, output: &Path) -> Result<ArchiveArtifact> {
        let path = with_archive_extension(output);
        tracing::info!("Creating archive: {}", path.display());
        if let Err(err) = write_archive(layer_root, &path) {
            let _ = fs::remove_file(&path);
            return Err(err);
        }

        let bytes = fs::metadata(&path)
            .with_context(|| format!("reading metadata for {}", path.display()))?
            .len();
        let actual_mb = bytes_to_mb(bytes);
        if let Some(limit_mb) = self.max_size_mb {
            if actual_mb > limit_mb {
                fs::remove_file(&path)
                    .with_context(|| format!("removing oversized archive {}", path.display()))?;
                return Err(LayerError::LayerSizeLimit {
                    actual_mb,
                    limit_mb,
                    metric: SizeMetric::Archive,
                }
                .into());
            }
        }
        tracing::info!("Archive created: {} ({actual_mb:.2} MB)", path.display());
        Ok(ArchiveArtifact { path, bytes })
    }
}

fn with_archive_extension(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".");
    name.push(ARCHIVE_EXTENSION);
    PathBuf::from(name)
}

fn write_archive(layer_root: &Path, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let base = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let walker = WalkDir::new(layer_root)
        .min_depth(1)
        .sort_by(|a, b| a.path().cmp(b.path()));
    for entry in walker {
        let entry = entry.with_context(|| format!("walking {}", layer_root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(layer_root)
            .with_context(|| format!("failed to relativize {}", entry.path().display()))?;
        let name = rel.to_string_lossy().replace('\\', "/");
        let options = base.unix_permissions(file_mode(&entry)?);
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("adding {name} to archive"))?;
        let mut source = File::open(entry.path())
            .with_context(|| format!("opening {}", entry.path().display()))?;
        io::copy(&mut source, &mut zip).with_context(|| format!("writing {name} to archive"))?;
    }
    zip.finish().context("finalizing archive")?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(entry: &walkdir::DirEntry) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let meta = entry
        .metadata()
        .with_context(|| format!("reading metadata for {}", entry.path().display()))?;
    Ok(meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_entry: &walkdir::DirEntry) -> Result<u32> {
    Ok(0o644)
}

/// Size in megabytes of a file, or of every file under a directory.
pub fn measure_size(path: &Path) -> Result<f64> {
    let meta = fs::metadata(path)
        .with_context(|| format!("reading metadata for {}", path.display()))?;
    let bytes = if meta.is_dir() {
        measure_tree_size(path)?
    } else {
        meta.len()
    };
    Ok(bytes_to_mb(bytes))
}

#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}
