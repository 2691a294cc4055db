//! Cargo.toml parsing.

use toml::Value;

use crate::analysis::model::ExtractedDependency;

use super::utils::line_of;

const SECTIONS: &[&str] = &["dependencies", "dev-dependencies", "build-dependencies"];

/// Parse `[dependencies]`, `[dev-dependencies]`, `[build-dependencies]`,
/// target-specific tables and `[workspace.dependencies]`.
///
/// Entries may be a version string or a table with `version`, `path` or
/// `git` keys; `package = "..."` renames are reported under the real crate
/// name with the key as import path.
pub fn parse_cargo_toml(content: &str, file: &str) -> anyhow::Result<Vec<ExtractedDependency>> {
    let doc: Value = toml::from_str(content)?;
    let mut deps = Vec::new();

    for section in SECTIONS {
        collect(doc.get(*section), content, file, &mut deps);
    }
    if let Some(targets) = doc.get("target").and_then(|t| t.as_table()) {
        for target in targets.values() {
            for section in SECTIONS {
                collect(target.get(*section), content, file, &mut deps);
            }
        }
    }
    collect(
        doc.get("workspace").and_then(|w| w.get("dependencies")),
        content,
        file,
        &mut deps,
    );

    Ok(deps)
}

fn collect(table: Option<&Value>, content: &str, file: &str, deps: &mut Vec<ExtractedDependency>) {
    let Some(table) = table.and_then(|t| t.as_table()) else {
        return;
    };
    for (key, spec) in table {
        let (name, version) = match spec {
            Value::String(v) => (key.clone(), Some(v.clone())),
            Value::Table(t) => {
                let name = t
                    .get("package")
                    .and_then(|p| p.as_str())
                    .unwrap_or(key)
                    .to_string();
                let version = t
                    .get("version")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .or_else(|| {
                        t.get("workspace")
                            .and_then(|w| w.as_bool())
                            .filter(|w| *w)
                            .map(|_| "workspace".to_string())
                    });
                (name, version)
            }
            _ => (key.clone(), None),
        };
        let line = line_of(content, &format!("{} =", key))
            .or_else(|| line_of(content, &format!("{}=", key)))
            .or_else(|| line_of(content, &format!(".{}]", key)))
            .unwrap_or(1);
        let mut dep = ExtractedDependency::new(name.clone(), version, file, line);
        if &name != key {
            dep.import_path = Some(key.clone());
        }
        deps.push(dep);
    }
}
