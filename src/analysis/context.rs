//! Per-repository state shared by every analyzer: root path, permalink
//! settings and file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Default ceiling on the size of a file we are willing to scan (100 KB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024;

/// Default branch used for permalinks.
pub const DEFAULT_BRANCH: &str = "main";

/// Directory names that never contain first-party source.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "target",
    ".terraform",
    ".next",
    "coverage",
    ".idea",
    ".vscode",
    ".cache",
    ".pytest_cache",
    ".mypy_cache",
    "bower_components",
    ".sfdx",
];

/// A source file that passed discovery and was read successfully.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the repository root, `/`-separated.
    pub rel: String,
    pub content: String,
}

impl SourceFile {
    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or("")
    }

    pub fn extension(&self) -> &str {
        self.path.extension().and_then(|e| e.to_str()).unwrap_or("")
    }
}

/// Repository-level settings for an analyzer run.
#[derive(Debug, Clone)]
pub struct AnalyzerContext {
    root: PathBuf,
    base_url: Option<String>,
    branch: String,
    max_file_size: u64,
    excluded_dirs: Vec<String>,
    excluded_paths: Option<GlobSet>,
}

impl AnalyzerContext {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: None,
            branch: DEFAULT_BRANCH.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
            excluded_paths: None,
        }
    }

    /// Base URL of the hosted repository, e.g. `https://github.com/org/repo`.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url.map(|u| u.trim_end_matches('/').to_string());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Add directory names to prune during discovery.
    pub fn with_excluded_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dir in dirs {
            let dir = dir.into();
            if !self.excluded_dirs.contains(&dir) {
                self.excluded_dirs.push(dir);
            }
        }
        self
    }

    /// Glob patterns (matched against relative paths) to skip during discovery.
    pub fn with_excluded_paths(mut self, patterns: &[String]) -> Self {
        if patterns.is_empty() {
            return self;
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => debug!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern"),
            }
        }
        self.excluded_paths = builder.build().ok();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.excluded_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }

    /// Walk the repository and return files accepted by `predicate`.
    ///
    /// Pruned directories, excluded paths and files above the size ceiling
    /// are skipped. Results are sorted by path.
    pub fn find_files_matching<F>(&self, predicate: F) -> Vec<PathBuf>
    where
        F: Fn(&Path) -> bool,
    {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_pruned(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| predicate(e.path()))
            .filter(|e| {
                let too_big = e
                    .metadata()
                    .map(|m| m.len() > self.max_file_size)
                    .unwrap_or(true);
                if too_big {
                    debug!(path = %e.path().display(), "skipping file above size ceiling");
                }
                !too_big
            })
            .map(|e| e.into_path())
            .filter(|p| !self.is_excluded_path(p))
            .collect();
        files.sort();
        files
    }

    /// Files whose extension (without dot, case-insensitive) is in `extensions`.
    pub fn find_files(&self, extensions: &[&str]) -> Vec<PathBuf> {
        self.find_files_matching(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
    }

    /// Files whose name is exactly `name`, anywhere in the tree.
    pub fn find_named(&self, name: &str) -> Vec<PathBuf> {
        self.find_files_matching(|path| path.file_name().and_then(|n| n.to_str()) == Some(name))
    }

    /// Discover and read files with the given extensions.
    pub fn source_files(&self, extensions: &[&str]) -> Vec<SourceFile> {
        self.find_files(extensions)
            .into_iter()
            .filter_map(|path| self.load(&path))
            .collect()
    }

    /// Read a discovered file; failures are logged and yield `None`.
    pub fn load(&self, path: &Path) -> Option<SourceFile> {
        let content = self.read_file(path)?;
        Some(SourceFile {
            rel: self.relative(path),
            path: path.to_path_buf(),
            content,
        })
    }

    /// Read a file as lossy UTF-8, honoring the size ceiling.
    pub fn read_file(&self, path: &Path) -> Option<String> {
        match fs::metadata(path) {
            Ok(meta) if meta.len() > self.max_file_size => {
                debug!(path = %path.display(), "skipping file above size ceiling");
                return None;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot stat file");
                return None;
            }
            _ => {}
        }
        match fs::read(path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot read file");
                None
            }
        }
    }

    /// Path relative to the repository root with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_excluded_path(&self, path: &Path) -> bool {
        match &self.excluded_paths {
            Some(set) => set.is_match(self.relative(path)),
            None => false,
        }
    }

    /// Permalink for a file (and optional line) on the source host.
    pub fn source_link(&self, rel_path: &str, line: Option<usize>) -> Option<String> {
        let base = self.base_url.as_ref()?;
        let path = rel_path.trim_start_matches("./").trim_start_matches('/');
        Some(match line {
            Some(line) if line > 0 => format!("{}/blob/{}/{}#L{}", base, self.branch, path, line),
            _ => format!("{}/blob/{}/{}", base, self.branch, path),
        })
    }
}

/// Test and spec files pollute the domain model and are skipped for models.
pub fn is_test_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    name.contains("test") || name.contains("spec")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_link() {
        let ctx = AnalyzerContext::new("/repo")
            .with_base_url(Some("https://github.com/acme/api/".to_string()))
            .with_branch("develop");
        assert_eq!(
            ctx.source_link("cmd/main.go", Some(12)).as_deref(),
            Some("https://github.com/acme/api/blob/develop/cmd/main.go#L12")
        );
        assert_eq!(
            ctx.source_link("README.md", None).as_deref(),
            Some("https://github.com/acme/api/blob/develop/README.md")
        );
        assert!(AnalyzerContext::new("/repo").source_link("a.go", Some(1)).is_none());
    }

    #[test]
    fn test_discovery_prunes_and_limits() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/app.ts"), "export const x = 1;").unwrap();
        fs::write(root.join("node_modules/pkg/index.ts"), "export {}").unwrap();
        fs::write(root.join("src/huge.ts"), "x".repeat(2048)).unwrap();

        let ctx = AnalyzerContext::new(root).with_max_file_size(1024);
        let files = ctx.source_files(&["ts"]);
        let rels: Vec<_> = files.iter().map(|f| f.rel.as_str()).collect();
        assert_eq!(rels, vec!["src/app.ts"]);
    }

    #[test]
    fn test_excluded_paths() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/a.py"), "x = 1").unwrap();
        fs::write(root.join("b.py"), "y = 2").unwrap();

        let ctx = AnalyzerContext::new(root).with_excluded_paths(&["docs/**".to_string()]);
        let files = ctx.find_files(&["py"]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("b.py"));
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file("pkg/user_test.go"));
        assert!(is_test_file("src/app.spec.ts"));
        assert!(is_test_file("tests/TestHelper.php"));
        assert!(!is_test_file("src/models/user.py"));
    }
}
