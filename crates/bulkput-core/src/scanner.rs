//! Recursive discovery of files under the configured roots

use crate::events::{ProgressSink, RunEvent};
use crate::resolve::resolve_key;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Include/exclude glob patterns matched against object keys.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> crate::Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Exclusion wins; with includes configured, at least one must match.
    pub fn matches(&self, key: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(key)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(key))
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> crate::Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p.as_ref()).map_err(|e| {
                crate::Error::Configuration(format!("Invalid glob pattern '{}': {}", p.as_ref(), e))
            })
        })
        .collect()
}

/// Walks root folders below a base directory.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    base_dir: PathBuf,
    filter: PathFilter,
}

impl TreeScanner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            filter: PathFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Whether `root` exists below the base directory.
    pub fn root_exists(&self, root: &str) -> bool {
        self.base_dir.join(root).exists()
    }

    /// Collect every regular file under `roots`, in root order.
    ///
    /// Within a directory entries are visited by file name, depth first.
    /// Missing roots are reported once through `progress` and skipped.
    /// Unreadable directories are logged and skipped. Symlinks and other
    /// non-regular entries are ignored.
    pub fn scan(&self, roots: &[String], progress: &dyn ProgressSink) -> Vec<PathBuf> {
        progress.emit(&RunEvent::ScanStarted);

        let mut files = Vec::new();
        for root in roots {
            let root_path = self.base_dir.join(root);
            if !root_path.exists() {
                warn!(folder = %root, path = ?root_path, "Root folder not found, skipping");
                progress.emit(&RunEvent::FolderSkipped { name: root.clone() });
                continue;
            }

            let before = files.len();
            self.walk(&root_path, &mut files);
            debug!(folder = %root, files = files.len() - before, "Scanned root folder");
        }

        progress.emit(&RunEvent::ScanCompleted { count: files.len() });
        files
    }

    fn walk(&self, root: &Path, files: &mut Vec<PathBuf>) {
        let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = ?e.path(), error = %e, "Cannot read directory entry, continuing");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            if !self.filter.is_empty() {
                if let Ok(key) = resolve_key(&self.base_dir, &path) {
                    if !self.filter.matches(&key) {
                        debug!(key = %key, "Filtered out");
                        continue;
                    }
                }
            }
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullProgress;
    use crate::testing::{write_tree, RecordingProgress};

    fn keys(base: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| resolve_key(base, p).unwrap()).collect()
    }

    #[test]
    fn test_scan_skips_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("A/a.txt", "hello")]);

        let progress = RecordingProgress::new();
        let scanner = TreeScanner::new(dir.path());
        let files = scanner.scan(&["A".to_string(), "B".to_string()], &progress);

        assert_eq!(keys(dir.path(), &files), vec!["A/a.txt"]);
        assert_eq!(progress.skipped(), vec!["B".to_string()]);
        assert_eq!(progress.scan_count(), Some(1));
    }

    #[test]
    fn test_scan_order_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("B/d.txt", "d"),
                ("A/sub/c.txt", "c"),
                ("A/b.txt", "b"),
                ("A/a.txt", "a"),
            ],
        );

        let scanner = TreeScanner::new(dir.path());
        let roots = vec!["B".to_string(), "A".to_string()];
        let first = scanner.scan(&roots, &NullProgress);
        let second = scanner.scan(&roots, &NullProgress);

        assert_eq!(
            keys(dir.path(), &first),
            vec!["B/d.txt", "A/a.txt", "A/b.txt", "A/sub/c.txt"]
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_scan_empty_roots() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("A/empty")).unwrap();

        let progress = RecordingProgress::new();
        let files = TreeScanner::new(dir.path()).scan(&["A".to_string()], &progress);

        assert!(files.is_empty());
        assert!(progress.skipped().is_empty());
        assert_eq!(progress.scan_count(), Some(0));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_ignores_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("A/real.txt", "x"), ("outside/secret.txt", "s")]);
        std::os::unix::fs::symlink(dir.path().join("A/real.txt"), dir.path().join("A/link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("outside"), dir.path().join("A/dirlink"))
            .unwrap();

        let files = TreeScanner::new(dir.path()).scan(&["A".to_string()], &NullProgress);
        assert_eq!(keys(dir.path(), &files), vec!["A/real.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_continues_past_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("A/a.txt", "a"), ("A/locked/hidden.txt", "h"), ("A/z/z.txt", "z")],
        );
        let locked = dir.path().join("A/locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not apply to root
        if std::fs::read_dir(&locked).is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let progress = RecordingProgress::new();
        let files = TreeScanner::new(dir.path()).scan(&["A".to_string()], &progress);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(keys(dir.path(), &files), vec!["A/a.txt", "A/z/z.txt"]);
        assert_eq!(progress.scan_count(), Some(2));
        assert!(progress.skipped().is_empty());
    }

    #[test]
    fn test_scan_applies_filter() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[("A/index.html", "<p>"), ("A/debug.log", "x"), ("A/img/logo.png", "p")],
        );

        let filter = PathFilter::new::<&str>(&[], &["*.log"]).unwrap();
        let files = TreeScanner::new(dir.path())
            .with_filter(filter)
            .scan(&["A".to_string()], &NullProgress);
        assert_eq!(keys(dir.path(), &files), vec!["A/img/logo.png", "A/index.html"]);
    }

    #[test]
    fn test_path_filter() {
        let filter = PathFilter::new(&["public/*"], &["*.map"]).unwrap();
        assert!(filter.matches("public/app.js"));
        assert!(!filter.matches("public/app.js.map"));
        assert!(!filter.matches("assets/app.js"));

        assert!(PathFilter::default().matches("anything/at/all"));
        assert!(PathFilter::new(&["[unclosed"], &[]).is_err());
    }
}
