//! sfdx-project.json parsing.

use serde::Deserialize;

use crate::analysis::model::ExtractedDependency;

use super::utils::line_of;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SfdxProject {
    #[serde(default)]
    package_directories: Vec<PackageDirectory>,
    #[serde(default)]
    package_aliases: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageDirectory {
    #[serde(default)]
    dependencies: Vec<PackageDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageDependency {
    package: String,
    #[serde(default)]
    version_number: Option<String>,
}

/// Package dependencies declared under `packageDirectories[].dependencies`
/// plus every `packageAliases` entry not already listed. Alias values (the
/// 04t/0Ho package ids) are reported as the import path.
pub fn parse_sfdx_project(content: &str, file: &str) -> anyhow::Result<Vec<ExtractedDependency>> {
    let project: SfdxProject = serde_json::from_str(content)?;
    let mut deps: Vec<ExtractedDependency> = Vec::new();

    for dir in &project.package_directories {
        for dep in &dir.dependencies {
            let line = line_of(content, &format!("\"{}\"", dep.package)).unwrap_or(1);
            let mut extracted =
                ExtractedDependency::new(dep.package.clone(), dep.version_number.clone(), file, line);
            extracted.import_path = project
                .package_aliases
                .get(&dep.package)
                .and_then(|v| v.as_str())
                .map(String::from);
            deps.push(extracted);
        }
    }

    for (alias, id) in &project.package_aliases {
        if deps.iter().any(|d| &d.name == alias) {
            continue;
        }
        let line = line_of(content, &format!("\"{}\"", alias)).unwrap_or(1);
        let mut extracted = ExtractedDependency::new(alias.clone(), None, file, line);
        extracted.import_path = id.as_str().map(String::from);
        deps.push(extracted);
    }

    Ok(deps)
}
