use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use layerpack_domain::PythonRuntime;
use serde::Serialize;
use walkdir::WalkDir;

use crate::fs::{copy_replacing, remove_dir_all_writable};
use crate::observer::SharedObserver;

const TEST_DIR_NAMES: [&str; 2] = ["tests", "testing"];

/// An assembled layer tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDirectory {
    pub root: PathBuf,
    /// `root/python/lib/python<major.minor>/site-packages`.
    pub site_packages: PathBuf,
}

/// What [`LayerAssembler::strip_tests`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StripReport {
    pub files: usize,
    pub dirs: usize,
}

impl StripReport {
    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.dirs == 0
    }
}

/// Lays out installed packages in the directory convention the target
/// runtime loads layers from.
pub struct LayerAssembler {
    runtime: PythonRuntime,
    observer: SharedObserver,
}

impl LayerAssembler {
    pub fn new(runtime: PythonRuntime, observer: SharedObserver) -> Self {
        Self { runtime, observer }
    }

    /// Copy every top-level entry of `fetched` into the site-packages path
    /// under `layer_root`.
    pub fn assemble(&self, fetched: &Path, layer_root: &Path) -> Result<LayerDirectory> {
        let site_packages = layer_root.join(self.runtime.site_packages());
        fs::create_dir_all(&site_packages)
            .with_context(|| format!("creating {}", site_packages.display()))?;

        let mut entries = fs::read_dir(fetched)
            .with_context(|| format!("reading {}", fetched.display()))?
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("reading {}", fetched.display()))?;
        entries.sort_by_key(fs::DirEntry::file_name);
        for entry in entries {
            copy_replacing(&entry.path(), &site_packages.join(entry.file_name()))?;
        }
        tracing::debug!(site_packages = %site_packages.display(), "assembled layer tree");
        Ok(LayerDirectory {
            root: layer_root.to_path_buf(),
            site_packages,
        })
    }

    /// Copy extra sources under the layer root by base name.
    ///
    /// Missing paths produce a warning and are skipped. Returns how many
    /// sources were copied.
    pub fn embed_sources(&self, layer: &LayerDirectory, sources: &[PathBuf]) -> Result<usize> {
        let mut copied = 0;
        for source in sources {
            if !source.exists() {
                self.observer
                    .warning(&format!("Source path does not exist: {}", source.display()));
                continue;
            }
            let base = match source.file_name() {
                Some(name) => Some(name.to_owned()),
                None => source.canonicalize()?.file_name().map(ToOwned::to_owned),
            };
            let Some(base) = base else {
                self.observer
                    .warning(&format!("Source path has no base name: {}", source.display()));
                continue;
            };
            let dest = layer.root.join(base);
            copy_replacing(source, &dest)?;
            tracing::info!("Added source: {} -> {}", source.display(), dest.display());
            copied += 1;
        }
        Ok(copied)
    }

    /// Remove test modules and test directories anywhere under the layer root.
    pub fn strip_tests(&self, layer: &LayerDirectory) -> Result<StripReport> {
        let mut doomed_dirs = Vec::new();
        let mut doomed_files = Vec::new();
        let mut walker = WalkDir::new(&layer.root)
            .min_depth(1)
            .sort_by(|a, b| a.path().cmp(b.path()))
            .into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.with_context(|| format!("walking {}", layer.root.display()))?;
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                if is_test_dir(&name) {
                    doomed_dirs.push(entry.into_path());
                    walker.skip_current_dir();
                }
            } else if is_test_file(&name) {
                doomed_files.push(entry.into_path());
            }
        }

        for dir in &doomed_dirs {
            remove_dir_all_writable(dir)?;
        }
        for file in &doomed_files {
            fs::remove_file(file).with_context(|| format!("removing {}", file.display()))?;
        }
        let report = StripReport {
            files: doomed_files.len(),
            dirs: doomed_dirs.len(),
        };
        tracing::info!(files = report.files, dirs = report.dirs, "stripped test files");
        Ok(report)
    }
}

/// `test_*.py` or `*_test.py`.
pub fn is_test_file(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".py") else {
        return false;
    };
    stem.starts_with("test_") || stem.ends_with("_test")
}

pub fn is_test_dir(name: &str) -> bool {
    TEST_DIR_NAMES.contains(&name)
}

/// Total bytes of regular files under `root`.
pub fn measure_tree_size(root: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_file() {
            total += entry
                .metadata()
                .with_context(|| format!("reading metadata for {}", entry.path().display()))?
                .len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::RecordingObserver;

    fn assembler(observer: Arc<RecordingObserver>) -> LayerAssembler {
        LayerAssembler::new(PythonRuntime::Python39, observer)
    }

    fn write(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    #[test]
    fn test_name_patterns() {
        for name in ["test_core.py", "core_test.py", "test_.py"] {
            assert!(is_test_file(name), "{name}");
        }
        for name in [
            "conftest.py",
            "testing.py",
            "test_core.pyc",
            "latest.py",
            "contest_test.txt",
        ] {
            assert!(!is_test_file(name), "{name}");
        }
        assert!(is_test_dir("tests"));
        assert!(is_test_dir("testing"));
        assert!(!is_test_dir("test"));
    }

    #[test]
    fn assemble_copies_into_site_packages() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fetched = temp.path().join("packages");
        write(&fetched.join("alpha").join("__init__.py"), "A = 1\n")?;
        write(&fetched.join("six.py"), "# six\n")?;
        let root = temp.path().join("layer");
        write(
            &root.join("python/lib/python3.9/site-packages/alpha/stale.py"),
            "old\n",
        )?;

        let layer = assembler(Arc::default()).assemble(&fetched, &root)?;
        assert_eq!(
            layer.site_packages,
            root.join("python").join("lib").join("python3.9").join("site-packages")
        );
        assert_eq!(
            fs::read_to_string(layer.site_packages.join("alpha").join("__init__.py"))?,
            "A = 1\n"
        );
        assert!(layer.site_packages.join("six.py").is_file());
        assert!(!layer.site_packages.join("alpha").join("stale.py").exists());
        Ok(())
    }

    #[test]
    fn embed_sources_uses_base_names_and_warns_on_missing() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let src_dir = temp.path().join("src").join("handlers");
        write(&src_dir.join("app.py"), "def handler(e, c): pass\n")?;
        let single = temp.path().join("settings.json");
        write(&single, "{}")?;
        let root = temp.path().join("layer");
        fs::create_dir_all(&root)?;
        let layer = LayerDirectory {
            site_packages: root.join("python"),
            root: root.clone(),
        };
        let observer = Arc::new(RecordingObserver::default());

        let copied = assembler(observer.clone()).embed_sources(
            &layer,
            &[src_dir, temp.path().join("missing"), single],
        )?;
        assert_eq!(copied, 2);
        assert!(root.join("handlers").join("app.py").is_file());
        assert!(root.join("settings.json").is_file());
        let events = observer.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("warning:Source path does not exist"));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn embed_sources_keeps_the_link_name_of_symlinked_sources() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let real = temp.path().join("real_impl");
        write(&real.join("app.py"), "def handler(e, c): pass\n")?;
        let link = temp.path().join("handlers");
        std::os::unix::fs::symlink(&real, &link)?;
        let root = temp.path().join("layer");
        fs::create_dir_all(&root)?;
        let layer = LayerDirectory {
            site_packages: root.join("python"),
            root: root.clone(),
        };

        let copied = assembler(Arc::default()).embed_sources(&layer, &[link])?;
        assert_eq!(copied, 1);
        assert!(root.join("handlers").join("app.py").is_file());
        assert!(!root.join("real_impl").exists());
        Ok(())
    }

    #[test]
    fn strip_tests_removes_every_pattern() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().join("layer");
        let site = root.join("python/lib/python3.9/site-packages");
        write(&site.join("pkg/__init__.py"), "")?;
        write(&site.join("pkg/test_api.py"), "")?;
        write(&site.join("pkg/api_test.py"), "")?;
        write(&site.join("pkg/tests/test_x.py"), "")?;
        write(&site.join("pkg/tests/helpers.py"), "")?;
        write(&site.join("pkg/testing/fixtures.py"), "")?;
        write(&site.join("pkg/conftest.py"), "")?;
        write(&root.join("handlers/test_handler.py"), "")?;
        let layer = LayerDirectory {
            root: root.clone(),
            site_packages: site.clone(),
        };

        let report = assembler(Arc::default()).strip_tests(&layer)?;
        assert_eq!(report, StripReport { files: 3, dirs: 2 });
        let remaining: Vec<String> = WalkDir::new(&root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        let mut remaining = remaining;
        remaining.sort();
        assert_eq!(remaining, vec!["__init__.py", "conftest.py"]);
        Ok(())
    }

    #[test]
    fn tree_size_counts_file_bytes() -> Result<()> {
        let temp = tempfile::tempdir()?;
        write(&temp.path().join("a/b.txt"), "12345")?;
        write(&temp.path().join("c.txt"), "123")?;
        assert_eq!(measure_tree_size(temp.path())?, 8);
        Ok(())
    }
}
