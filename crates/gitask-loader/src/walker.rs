//! Recursive repository walk with ignored-directory pruning and an
//! extension allow-list.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::{DirEntry, WalkBuilder};
use serde::{Deserialize, Serialize};

pub const DEFAULT_IGNORED_DIRS: &[&str] = &[".git", "__pycache__", "node_modules", "venv", "env"];

pub const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    ".md", ".txt", ".py", ".js", ".java", ".c", ".cpp", ".h", ".hpp", ".html", ".css", ".scss",
    ".go", ".rs", ".rb", ".sh", ".yaml", ".yml",
];

/// How an ignored directory name is compared against a directory path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreMatch {
    /// The name appears anywhere in the relative path, so `env` also prunes
    /// `dev-environment/`.
    #[default]
    Substring,
    /// The name equals one whole path segment.
    Segment,
}

/// A file that passed both the directory and the extension filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub path: PathBuf,
    /// Path relative to the walk root, `/`-separated, no leading separator.
    pub relative: String,
    /// Lower-cased extension including the leading dot.
    pub extension: String,
}

#[derive(Debug, Clone)]
struct DirMatcher {
    ignored: Vec<String>,
    mode: IgnoreMatch,
}

impl DirMatcher {
    fn is_ignored(&self, relative_dir: &str) -> bool {
        match self.mode {
            IgnoreMatch::Substring => self
                .ignored
                .iter()
                .any(|name| relative_dir.contains(name.as_str())),
            IgnoreMatch::Segment => relative_dir
                .split('/')
                .any(|segment| self.ignored.iter().any(|name| name == segment)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepoWalker {
    matcher: Arc<DirMatcher>,
    extensions: Arc<Vec<String>>,
}

impl Default for RepoWalker {
    fn default() -> Self {
        Self::new(
            DEFAULT_IGNORED_DIRS.iter().map(|s| (*s).to_owned()).collect(),
            DEFAULT_TEXT_EXTENSIONS.iter().map(|s| (*s).to_owned()).collect(),
            IgnoreMatch::default(),
        )
    }
}

impl RepoWalker {
    #[must_use]
    pub fn new(ignored_dirs: Vec<String>, text_extensions: Vec<String>, mode: IgnoreMatch) -> Self {
        Self {
            matcher: Arc::new(DirMatcher {
                ignored: ignored_dirs,
                mode,
            }),
            extensions: Arc::new(
                text_extensions
                    .into_iter()
                    .map(|e| e.to_lowercase())
                    .collect(),
            ),
        }
    }

    /// Whether a directory, given relative to the walk root, is pruned.
    #[must_use]
    pub fn is_ignored_dir(&self, relative_dir: &str) -> bool {
        self.matcher.is_ignored(relative_dir)
    }

    #[must_use]
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }

    /// Lazily walk `root` in file-name order.
    ///
    /// No ignore files are honoured and hidden entries are visited. Ignored
    /// directories are never descended into and directory symlinks are not
    /// followed. A symlinked file is read when its target lies inside `root`.
    /// Unreadable entries and paths that are not valid UTF-8 are logged and
    /// skipped.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = WalkedFile> + use<> {
        let matcher = Arc::clone(&self.matcher);
        let filter_root = root.to_path_buf();
        let walk = WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_some_and(|t| t.is_dir()) {
                    return true;
                }
                !matcher.is_ignored(&relative_path(&filter_root, entry.path()))
            })
            .build();

        let root = root.to_path_buf();
        let canonical_root = root.canonicalize().ok();
        let walker = self.clone();
        walk.filter_map(move |entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(move |entry| is_readable_file(entry, canonical_root.as_deref()))
        .filter_map(move |entry| {
            let extension = extension_of(entry.path());
            if !walker.accepts_extension(&extension) {
                return None;
            }
            let Some(relative) = utf8_relative_path(&root, entry.path()) else {
                tracing::warn!(
                    path = %entry.path().display(),
                    "skipping file whose path is not valid UTF-8"
                );
                return None;
            };
            Some(WalkedFile {
                relative,
                path: entry.into_path(),
                extension,
            })
        })
    }
}

/// Regular files, and symlinks resolving to a regular file under `root`.
fn is_readable_file(entry: &DirEntry, root: Option<&Path>) -> bool {
    let Some(file_type) = entry.file_type() else {
        return false;
    };
    if file_type.is_file() {
        return true;
    }
    if !file_type.is_symlink() {
        return false;
    }
    let inside = std::fs::canonicalize(entry.path())
        .is_ok_and(|target| target.is_file() && root.is_some_and(|r| target.starts_with(r)));
    if !inside {
        tracing::debug!(
            path = %entry.path().display(),
            "skipping symlink to a directory or outside the repository"
        );
    }
    inside
}

/// Like [`relative_path`], but `None` when a component is not valid UTF-8.
fn utf8_relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .map(|parts| parts.join("/"))
}

/// `path` relative to `root`, joined with `/`.
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lower-cased extension with its leading dot, or empty when there is none.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relatives(walker: &RepoWalker, root: &Path) -> Vec<String> {
        walker.walk(root).map(|f| f.relative).collect()
    }

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(extension_of(Path::new("a/README.MD")), ".md");
        assert_eq!(extension_of(Path::new("lib.tar.gz")), ".gz");
        assert_eq!(extension_of(Path::new("Makefile")), "");
        assert_eq!(extension_of(Path::new(".bashrc")), "");
    }

    #[test]
    fn substring_matching_is_broad() {
        let walker = RepoWalker::default();
        assert!(walker.is_ignored_dir(".git"));
        assert!(walker.is_ignored_dir("src/node_modules/pkg"));
        assert!(walker.is_ignored_dir("my-venv-configs"));
        assert!(walker.is_ignored_dir("environment"));
        assert!(!walker.is_ignored_dir("src/app"));
    }

    #[test]
    fn segment_matching_is_exact() {
        let walker = RepoWalker::new(
            vec!["venv".into(), "env".into()],
            vec![".py".into()],
            IgnoreMatch::Segment,
        );
        assert!(walker.is_ignored_dir("venv"));
        assert!(walker.is_ignored_dir("a/env/b"));
        assert!(!walker.is_ignored_dir("my-venv-configs"));
        assert!(!walker.is_ignored_dir("environment"));
    }

    #[test]
    fn walk_filters_extensions_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/b.rs", "b");
        write(dir.path(), "src/a.py", "a");
        write(dir.path(), "README.md", "r");
        write(dir.path(), "image.png", "p");
        write(dir.path(), "Makefile", "m");

        let files = relatives(&RepoWalker::default(), dir.path());
        assert_eq!(files, vec!["README.md", "src/a.py", "src/b.rs"]);
    }

    #[test]
    fn walk_prunes_ignored_dirs_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".git/config.txt", "x");
        write(dir.path(), "web/node_modules/lib/index.js", "x");
        write(dir.path(), "pkg/__pycache__/mod.py", "x");
        write(dir.path(), "dev-environment/setup.sh", "x");
        write(dir.path(), "pkg/mod.py", "x");

        let files = relatives(&RepoWalker::default(), dir.path());
        assert_eq!(files, vec!["pkg/mod.py"]);
    }

    #[test]
    fn ignored_names_in_root_prefix_do_not_prune() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("venv-checkout");
        write(&root, "main.py", "x");

        let files = relatives(&RepoWalker::default(), &root);
        assert_eq!(files, vec!["main.py"]);
    }

    #[test]
    fn hidden_files_and_gitignored_files_are_visited() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".gitignore", "*.txt\n");
        write(dir.path(), ".hidden.md", "h");
        write(dir.path(), "notes.txt", "n");

        let files = relatives(&RepoWalker::default(), dir.path());
        assert_eq!(files, vec![".hidden.md", "notes.txt"]);
    }

    #[test]
    fn uppercase_extension_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "GUIDE.MD", "g");
        let files: Vec<WalkedFile> = RepoWalker::default().walk(dir.path()).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].extension, ".md");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_file_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"a\xff.py")), "x").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"a\xfe.py")), "y").unwrap();
        write(dir.path(), "good.py", "z");

        let files = relatives(&RepoWalker::default(), dir.path());
        assert_eq!(files, vec!["good.py"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_inside_root_are_followed() {
        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "secret.txt", "s");

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/real.md", "r");
        write(dir.path(), "sub/inner.py", "i");
        std::os::unix::fs::symlink(dir.path().join("docs/real.md"), dir.path().join("alias.md"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("leak.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("linked-dir")).unwrap();

        let files = relatives(&RepoWalker::default(), dir.path());
        assert_eq!(files, vec!["alias.md", "docs/real.md", "sub/inner.py"]);
    }
}
