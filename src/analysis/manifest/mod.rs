//! Manifest parsing shared by every analyzer.
//!
//! Dependencies come from manifest files only, never from import statements.
//! Each analyzer names the manifest kinds that belong to its language family
//! and [`collect_dependencies`] finds and parses them anywhere in the tree.
//!
//! ```text
//! ManifestKind
//!     ├── GoMod          (go.mod)
//!     ├── PackageJson    (package.json)
//!     ├── ComposerJson   (composer.json)
//!     ├── CargoToml      (Cargo.toml)
//!     ├── Requirements   (requirements*.txt)
//!     ├── Pyproject      (pyproject.toml)
//!     └── SfdxProject    (sfdx-project.json)
//! ```

use tracing::debug;

use super::context::AnalyzerContext;
use super::model::ExtractedDependency;

mod cargo;
mod golang;
mod node;
mod python;
mod sfdx;

pub use cargo::parse_cargo_toml;
pub use golang::{parse_go_mod, GoModule};
pub use node::{parse_composer_json, parse_package_json};
pub use python::{parse_pyproject, parse_requirements};
pub use sfdx::parse_sfdx_project;

/// Manifest file formats understood by the dependency extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    GoMod,
    PackageJson,
    ComposerJson,
    CargoToml,
    Requirements,
    Pyproject,
    SfdxProject,
}

impl ManifestKind {
    pub const ALL: &'static [ManifestKind] = &[
        ManifestKind::GoMod,
        ManifestKind::PackageJson,
        ManifestKind::ComposerJson,
        ManifestKind::CargoToml,
        ManifestKind::Requirements,
        ManifestKind::Pyproject,
        ManifestKind::SfdxProject,
    ];

    /// Whether a file name is a manifest of this kind.
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            ManifestKind::GoMod => file_name == "go.mod",
            ManifestKind::PackageJson => file_name == "package.json",
            ManifestKind::ComposerJson => file_name == "composer.json",
            ManifestKind::CargoToml => file_name == "Cargo.toml",
            ManifestKind::Requirements => {
                file_name.starts_with("requirements") && file_name.ends_with(".txt")
            }
            ManifestKind::Pyproject => file_name == "pyproject.toml",
            ManifestKind::SfdxProject => file_name == "sfdx-project.json",
        }
    }

    /// Parse manifest content; `file` is the relative path recorded on results.
    pub fn parse(&self, content: &str, file: &str) -> anyhow::Result<Vec<ExtractedDependency>> {
        match self {
            ManifestKind::GoMod => parse_go_mod(content, file),
            ManifestKind::PackageJson => parse_package_json(content, file),
            ManifestKind::ComposerJson => parse_composer_json(content, file),
            ManifestKind::CargoToml => parse_cargo_toml(content, file),
            ManifestKind::Requirements => Ok(parse_requirements(content, file)),
            ManifestKind::Pyproject => parse_pyproject(content, file),
            ManifestKind::SfdxProject => parse_sfdx_project(content, file),
        }
    }
}

/// Find and parse every manifest of the given kinds.
///
/// A manifest that fails to parse is logged at debug and skipped, so one
/// malformed file never hides the others.
pub fn collect_dependencies(
    ctx: &AnalyzerContext,
    kinds: &[ManifestKind],
) -> Vec<ExtractedDependency> {
    let files = ctx.find_files_matching(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| kinds.iter().any(|k| k.matches(name)))
            .unwrap_or(false)
    });

    let mut deps = Vec::new();
    for path in files {
        let Some(file) = ctx.load(&path) else { continue };
        let Some(kind) = kinds.iter().find(|k| k.matches(file.file_name())) else {
            continue;
        };
        match kind.parse(&file.content, &file.rel) {
            Ok(found) => deps.extend(found),
            Err(e) => debug!(path = %file.rel, error = %e, "skipping unparseable manifest"),
        }
    }
    deps
}

/// Common utility functions for manifest parsing.
pub mod utils {
    /// Extract package name from a requirement string.
    ///
    /// Handles various requirement formats:
    /// - `flask==3.0.0` → `flask`
    /// - `aiohttp>=3.0,<4` → `aiohttp`
    /// - `package[extra]>=1.0` → `package`
    pub fn extract_package_name(req: &str) -> String {
        req.split(|c| matches!(c, '=' | '>' | '<' | '~' | '!' | '[' | ';' | ' ' | '@'))
            .next()
            .unwrap_or("")
            .trim()
            .to_string()
    }

    /// 1-indexed line where `needle` first appears, preferring a line that
    /// starts with it (after indentation).
    pub fn line_of(content: &str, needle: &str) -> Option<usize> {
        content
            .lines()
            .position(|l| l.trim_start().starts_with(needle))
            .or_else(|| content.lines().position(|l| l.contains(needle)))
            .map(|idx| idx + 1)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_extract_package_name() {
            assert_eq!(extract_package_name("requests>=2.0"), "requests");
            assert_eq!(extract_package_name("aiohttp>=3.0,<4"), "aiohttp");
            assert_eq!(extract_package_name("package[extra]>=1.0"), "package");
            assert_eq!(extract_package_name("simple"), "simple");
            assert_eq!(extract_package_name("pkg @ https://x/y.whl"), "pkg");
        }

        #[test]
        fn test_line_of_prefers_line_start() {
            let content = "data = 1\na = 2\n";
            assert_eq!(line_of(content, "a ="), Some(2));
            assert_eq!(line_of(content, "missing"), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_skips_malformed_manifest() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("web")).unwrap();
        fs::write(temp.path().join("go.mod"), "module example.com/x\n\nrequire github.com/a/b v1.0.0\n").unwrap();
        fs::write(temp.path().join("web/package.json"), "{ broken").unwrap();

        let ctx = AnalyzerContext::new(temp.path());
        let deps = collect_dependencies(&ctx, &[ManifestKind::GoMod, ManifestKind::PackageJson]);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "github.com/a/b");
        assert_eq!(deps[0].file, "go.mod");
        assert_eq!(deps[0].line, 3);
    }

    #[test]
    fn test_requirements_variants_match() {
        assert!(ManifestKind::Requirements.matches("requirements.txt"));
        assert!(ManifestKind::Requirements.matches("requirements-dev.txt"));
        assert!(!ManifestKind::Requirements.matches("constraints.txt"));
    }
}
