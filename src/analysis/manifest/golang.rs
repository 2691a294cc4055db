//! go.mod parsing.
//!
//! Go declares root modules only; `require` entries may appear on a single
//! line or inside a `require ( ... )` block, and `replace` directives may
//! point a module at a local path or another module.

use std::collections::HashMap;

use crate::analysis::model::ExtractedDependency;

/// A parsed go.mod file.
#[derive(Debug, Default)]
pub struct GoModule {
    /// Root module path (e.g., "github.com/acme/api")
    pub module: String,
    /// Required modules in declaration order: (module path, version, line).
    pub requires: Vec<(String, String, usize)>,
    /// Replace directives: module path → local path or replacement module
    pub replaces: HashMap<String, String>,
}

impl GoModule {
    /// Parse go.mod content.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut parsed = GoModule::default();
        let mut in_require_block = false;
        let mut in_replace_block = false;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if let Some(module) = line.strip_prefix("module ") {
                parsed.module = module.trim().trim_matches('"').to_string();
                continue;
            }

            if line.starts_with("require (") || line == "require(" {
                in_require_block = true;
                continue;
            }
            if line.starts_with("replace (") || line == "replace(" {
                in_replace_block = true;
                continue;
            }
            if line == ")" {
                in_require_block = false;
                in_replace_block = false;
                continue;
            }

            if let Some(rest) = line.strip_prefix("require ") {
                if let Some((module, version)) = parse_require_line(rest) {
                    parsed.requires.push((module, version, line_no));
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix("replace ") {
                if let Some((from, to)) = parse_replace_line(rest) {
                    parsed.replaces.insert(from, to);
                }
                continue;
            }

            if in_require_block {
                if let Some((module, version)) = parse_require_line(line) {
                    parsed.requires.push((module, version, line_no));
                }
            } else if in_replace_block {
                if let Some((from, to)) = parse_replace_line(line) {
                    parsed.replaces.insert(from, to);
                }
            }
        }

        if parsed.module.is_empty() {
            anyhow::bail!("no module declaration found in go.mod");
        }
        Ok(parsed)
    }

    /// Required modules as dependencies. A replaced module's import path is
    /// its replacement.
    pub fn dependencies(&self, file: &str) -> Vec<ExtractedDependency> {
        self.requires
            .iter()
            .map(|(module, version, line)| {
                let version = (!version.is_empty()).then(|| version.clone());
                let mut dep = ExtractedDependency::new(module.clone(), version, file, *line);
                dep.import_path = Some(
                    self.replaces
                        .get(module)
                        .cloned()
                        .unwrap_or_else(|| module.clone()),
                );
                dep
            })
            .collect()
    }
}

/// Parse go.mod content straight into dependencies.
pub fn parse_go_mod(content: &str, file: &str) -> anyhow::Result<Vec<ExtractedDependency>> {
    Ok(GoModule::parse(content)?.dependencies(file))
}

/// Parse a require line: "google.golang.org/grpc v1.78.0 // indirect"
fn parse_require_line(line: &str) -> Option<(String, String)> {
    let line = line.split("//").next().unwrap_or("").trim();

    let mut parts = line.split_whitespace();
    let module = parts.next()?;
    if module == "(" {
        return None;
    }
    let version = parts.next().unwrap_or("");
    Some((module.to_string(), version.to_string()))
}

/// Parse a replace line: "example.com/lib => ./third_party/lib"
fn parse_replace_line(line: &str) -> Option<(String, String)> {
    let line = line.split("//").next().unwrap_or("").trim();

    let (from, to) = line.split_once("=>")?;
    let from = from.split_whitespace().next()?.to_string();
    let to = to.split_whitespace().next()?.to_string();
    Some((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_go_mod() -> &'static str {
        r#"
module github.com/acme/orders

go 1.22.0

require github.com/pkg/errors v0.9.1

require (
	github.com/go-chi/chi/v5 v5.0.12
	github.com/aws/aws-sdk-go v1.50.32
	github.com/spf13/pflag v1.0.5 // indirect
)

replace (
	github.com/acme/shared => ./shared
)
"#
    }

    #[test]
    fn test_parse_go_mod() {
        let parsed = GoModule::parse(sample_go_mod()).unwrap();
        assert_eq!(parsed.module, "github.com/acme/orders");
        assert_eq!(parsed.requires.len(), 4);
        assert_eq!(parsed.replaces["github.com/acme/shared"], "./shared");
    }

    #[test]
    fn test_dependencies_carry_lines_and_versions() {
        let deps = parse_go_mod(sample_go_mod(), "go.mod").unwrap();
        let errors = &deps[0];
        assert_eq!(errors.name, "github.com/pkg/errors");
        assert_eq!(errors.version.as_deref(), Some("v0.9.1"));
        assert_eq!(errors.line, 6);

        let chi = deps.iter().find(|d| d.name == "github.com/go-chi/chi/v5").unwrap();
        assert_eq!(chi.line, 9);
        assert_eq!(chi.import_path.as_deref(), Some("github.com/go-chi/chi/v5"));

        // Indirect dependencies are still declared dependencies.
        assert!(deps.iter().any(|d| d.name == "github.com/spf13/pflag"));
    }

    #[test]
    fn test_replaced_import_path() {
        let content = "module x.io/app\n\nrequire x.io/lib v1.0.0\nreplace x.io/lib => ../lib\n";
        let deps = parse_go_mod(content, "go.mod").unwrap();
        assert_eq!(deps[0].import_path.as_deref(), Some("../lib"));
    }

    #[test]
    fn test_missing_module_is_an_error() {
        assert!(parse_go_mod("go 1.21\n", "go.mod").is_err());
    }
}
