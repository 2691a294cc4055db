//! Python manifests: requirements*.txt and pyproject.toml.

use crate::analysis::model::ExtractedDependency;

use super::utils::{extract_package_name, line_of};

/// Parse a requirements file.
///
/// Comments, blank lines and pip options (`-r`, `-e`, `--index-url`) are
/// skipped. The version is the specifier as written (e.g. `>=2.0,<3`).
pub fn parse_requirements(content: &str, file: &str) -> Vec<ExtractedDependency> {
    let mut deps = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.split(" #").next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if let Some(dep) = requirement(line, file, idx + 1) {
            deps.push(dep);
        }
    }
    deps
}

/// Parse pyproject.toml: PEP 621 `[project] dependencies`, optional
/// dependency groups, and `[tool.poetry.dependencies]` (plus dev groups).
pub fn parse_pyproject(content: &str, file: &str) -> anyhow::Result<Vec<ExtractedDependency>> {
    let doc: toml::Value = toml::from_str(content)?;
    let mut deps = Vec::new();

    if let Some(project) = doc.get("project") {
        let mut specs: Vec<&str> = project
            .get("dependencies")
            .and_then(|d| d.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        if let Some(optional) = project.get("optional-dependencies").and_then(|o| o.as_table()) {
            for group in optional.values() {
                if let Some(items) = group.as_array() {
                    specs.extend(items.iter().filter_map(|v| v.as_str()));
                }
            }
        }
        for spec in specs {
            let name = extract_package_name(spec);
            let line = line_of(content, &format!("\"{}", name)).unwrap_or(1);
            if let Some(dep) = requirement(spec, file, line) {
                deps.push(dep);
            }
        }
    }

    let poetry = doc.get("tool").and_then(|t| t.get("poetry"));
    if let Some(poetry) = poetry {
        let mut tables = Vec::new();
        if let Some(main) = poetry.get("dependencies").and_then(|d| d.as_table()) {
            tables.push(main);
        }
        if let Some(dev) = poetry.get("dev-dependencies").and_then(|d| d.as_table()) {
            tables.push(dev);
        }
        if let Some(groups) = poetry.get("group").and_then(|g| g.as_table()) {
            for group in groups.values() {
                if let Some(table) = group.get("dependencies").and_then(|d| d.as_table()) {
                    tables.push(table);
                }
            }
        }
        for table in tables {
            for (name, spec) in table {
                if name.eq_ignore_ascii_case("python") {
                    continue;
                }
                let version = match spec {
                    toml::Value::String(s) => Some(s.clone()),
                    toml::Value::Table(t) => t.get("version").and_then(|v| v.as_str()).map(String::from),
                    _ => None,
                };
                let line = line_of(content, &format!("{} =", name))
                    .or_else(|| line_of(content, name))
                    .unwrap_or(1);
                deps.push(ExtractedDependency::new(name.clone(), version, file, line));
            }
        }
    }

    Ok(deps)
}

fn requirement(spec: &str, file: &str, line: usize) -> Option<ExtractedDependency> {
    let spec = spec.trim();
    let name = extract_package_name(spec);
    if name.is_empty() {
        return None;
    }
    let rest = spec[name.len()..].trim();
    // Drop extras and environment markers from the version specifier.
    let rest = match rest.strip_prefix('[') {
        Some(after) => after.split_once(']').map(|(_, v)| v).unwrap_or("").trim(),
        None => rest,
    };
    let version = rest.split(';').next().unwrap_or("").trim();
    let version = (!version.is_empty()).then(|| version.to_string());
    Some(ExtractedDependency::new(name, version, file, line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements() {
        let content = "# web\nflask==3.0.0\nrequests[socks]>=2.31 ; python_version > '3.8'\n-r base.txt\n\nboto3\n";
        let deps = parse_requirements(content, "requirements.txt");
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "flask");
        assert_eq!(deps[0].version.as_deref(), Some("==3.0.0"));
        assert_eq!(deps[1].name, "requests");
        assert_eq!(deps[1].version.as_deref(), Some(">=2.31"));
        assert_eq!(deps[1].line, 3);
        assert_eq!(deps[2].version, None);
    }

    #[test]
    fn test_pyproject_pep621() {
        let content = r#"
[project]
name = "svc"
dependencies = [
    "fastapi>=0.110",
    "pydantic",
]
"#;
        let deps = parse_pyproject(content, "pyproject.toml").unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "fastapi");
        assert_eq!(deps[0].version.as_deref(), Some(">=0.110"));
        assert_eq!(deps[0].line, 5);
    }

    #[test]
    fn test_pyproject_poetry() {
        let content = r#"
[tool.poetry.dependencies]
python = "^3.11"
django = "^5.0"
celery = { version = "5.3.6", extras = ["redis"] }
"#;
        let deps = parse_pyproject(content, "pyproject.toml").unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"django"));
        assert!(names.contains(&"celery"));
        assert!(!names.contains(&"python"));
        let celery = deps.iter().find(|d| d.name == "celery").unwrap();
        assert_eq!(celery.version.as_deref(), Some("5.3.6"));
        assert_eq!(celery.line, 5);
    }

    #[test]
    fn test_invalid_pyproject() {
        assert!(parse_pyproject("[project", "pyproject.toml").is_err());
    }
}
