//! package.json and composer.json parsing.
//!
//! Both are JSON objects mapping package names to version constraints; they
//! differ only in section names and in which entries are platform packages.

use serde_json::Value;

use crate::analysis::model::ExtractedDependency;

use super::utils::line_of;

/// Parse package.json `dependencies` and `devDependencies`.
pub fn parse_package_json(content: &str, file: &str) -> anyhow::Result<Vec<ExtractedDependency>> {
    json_sections(content, file, &["dependencies", "devDependencies"], |_| false)
}

/// Parse composer.json `require` and `require-dev`, skipping `php` and
/// `ext-*` platform requirements.
pub fn parse_composer_json(content: &str, file: &str) -> anyhow::Result<Vec<ExtractedDependency>> {
    json_sections(content, file, &["require", "require-dev"], |name| {
        name == "php" || name.starts_with("ext-") || name.starts_with("lib-")
    })
}

fn json_sections<F>(
    content: &str,
    file: &str,
    sections: &[&str],
    skip: F,
) -> anyhow::Result<Vec<ExtractedDependency>>
where
    F: Fn(&str) -> bool,
{
    let doc: Value = serde_json::from_str(content)?;
    let mut deps = Vec::new();
    for section in sections {
        let Some(entries) = doc.get(*section).and_then(|s| s.as_object()) else {
            continue;
        };
        for (name, version) in entries {
            if skip(name) {
                continue;
            }
            let line = line_of(content, &format!("\"{}\"", name)).unwrap_or(1);
            let version = version.as_str().map(|v| v.to_string());
            deps.push(ExtractedDependency::new(name.clone(), version, file, line));
        }
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_json() {
        let content = r#"{
  "name": "web",
  "dependencies": {
    "express": "^4.19.0"
  },
  "devDependencies": {
    "typescript": "~5.4.0"
  }
}"#;
        let deps = parse_package_json(content, "package.json").unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "express");
        assert_eq!(deps[0].version.as_deref(), Some("^4.19.0"));
        assert_eq!(deps[0].line, 4);
        assert_eq!(deps[1].name, "typescript");
    }

    #[test]
    fn test_composer_skips_platform() {
        let content = r#"{
  "require": {
    "php": ">=7.4",
    "ext-json": "*",
    "guzzlehttp/guzzle": "^7.0"
  },
  "require-dev": {
    "phpunit/phpunit": "^9"
  }
}"#;
        let deps = parse_composer_json(content, "composer.json").unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["guzzlehttp/guzzle", "phpunit/phpunit"]);
    }

    #[test]
    fn test_invalid_json() {
        assert!(parse_package_json("{ not json", "package.json").is_err());
    }
}
