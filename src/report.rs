//! Output formatting for repograph results.
//!
//! Two formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the full extraction result for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, AnalysisSummary, Language};
use crate::graph::GraphStatistics;

/// Endpoints listed in pretty output before eliding the rest.
const MAX_LISTED: usize = 20;

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub summary: AnalysisSummary,
    pub result: AnalysisResult,
}

impl JsonReport {
    pub fn new(path: &str, result: &AnalysisResult) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            path: path.to_string(),
            summary: result.summary(),
            result: result.clone(),
        }
    }
}

/// Write an analysis result as JSON.
pub fn write_json(path: &str, result: &AnalysisResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&JsonReport::new(path, result))?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

fn write_header() {
    println!();
    print!("  ");
    print!("{}", "repograph".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn write_label(label: &str, value: &str) {
    print!("  {}", format!("{:<10}", label).dimmed());
    println!("{}", value);
}

/// Write an analysis result in pretty (human-readable) format.
pub fn write_pretty(path: &str, config_path: Option<&str>, result: &AnalysisResult) {
    write_header();
    write_label("Scanning:", path);
    if let Some(config) = config_path {
        write_label("Config:", config);
    }
    write_label("Language:", &result.language);
    println!();

    write_counts(&result.summary());
    println!();

    if !result.endpoints.is_empty() {
        println!("  {} ({}):", "Endpoints".bold(), result.endpoints.len());
        for endpoint in result.endpoints.iter().take(MAX_LISTED) {
            print!("    {:<8}", endpoint.method.green());
            print!("{:<40}", endpoint.path);
            print!("{}", endpoint.file.blue());
            if endpoint.line > 0 {
                print!("{}", format!(":{}", endpoint.line).dimmed());
            }
            println!();
        }
        write_elided(result.endpoints.len());
        println!();
    }

    if !result.models.is_empty() {
        println!("  {} ({}):", "Models".bold(), result.models.len());
        for model in result.models.iter().take(MAX_LISTED) {
            print!("    {:<32}", model.name);
            print!("{:<12}", model.model_type.as_str().dimmed());
            println!("{} fields", model.fields.len());
        }
        write_elided(result.models.len());
        println!();
    }

    if let Some(infra) = &result.infrastructure {
        if !infra.is_empty() {
            println!(
                "  {} ({} resources)",
                "Infrastructure".bold(),
                infra.resources.len()
            );
            println!();
        }
    }

    if !result.errors.is_empty() {
        println!("  {} ({}):", "Errors".bold(), result.errors.len());
        for error in &result.errors {
            println!("    {} {}", "ERROR".red(), error);
        }
        println!();
    }

    if result.errors.is_empty() {
        println!("  {}", "✓ COMPLETE".green());
    } else {
        println!("  {}", "✗ PARTIAL".yellow());
    }
    println!();
}

fn write_counts(summary: &AnalysisSummary) {
    let counts = [
        ("models", summary.models),
        ("endpoints", summary.endpoints),
        ("side effects", summary.side_effects),
        ("config", summary.config),
        ("dependencies", summary.dependencies),
    ];
    print!(" ");
    for (label, count) in counts {
        let value = if count == 0 {
            count.to_string().dimmed()
        } else {
            count.to_string().bold()
        };
        print!(" {} {}", value, label.dimmed());
    }
    if summary.errors > 0 {
        print!("  {}", format!("{} errors", summary.errors).red());
    }
    println!();
}

fn write_elided(total: usize) {
    if total > MAX_LISTED {
        println!(
            "    {}",
            format!("... and {} more (use --format json)", total - MAX_LISTED).dimmed()
        );
    }
}

/// Write detected languages, primary first.
pub fn write_detect(path: &str, primary: Option<Language>, all: &[Language]) {
    write_header();
    write_label("Scanning:", path);
    match primary {
        Some(language) => write_label("Primary:", &language.as_str().green().to_string()),
        None => write_label("Primary:", &"none".red().to_string()),
    }
    let others: Vec<&str> = all
        .iter()
        .filter(|l| Some(**l) != primary)
        .map(Language::as_str)
        .collect();
    if !others.is_empty() {
        write_label("Also:", &others.join(", "));
    }
    println!();
}

/// Write knowledge graph statistics.
pub fn write_stats(store: &str, stats: &GraphStatistics, documents: usize, checkpoints: &[String]) {
    write_header();
    write_label("Store:", store);
    println!();

    print!("  {}", "Entities: ".bold());
    println!("{}", stats.total_entities);
    for (entity_type, count) in &stats.entity_counts {
        println!("    {:<16} {:>5}", entity_type, count);
    }
    println!();

    print!("  {}", "Relations: ".bold());
    println!("{}", stats.total_relations);
    for (relation_type, count) in &stats.relation_counts {
        println!("    {:<16} {:>5}", relation_type, count);
    }
    println!();

    write_label("Components:", &stats.connected_components.to_string());
    write_label("Documents:", &documents.to_string());
    if !checkpoints.is_empty() {
        write_label("Agents:", &checkpoints.join(", "));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ExtractedEndpoint;

    #[test]
    fn test_json_report_carries_summary() {
        let mut result = AnalysisResult::new("go");
        result
            .endpoints
            .push(ExtractedEndpoint::new("GET", "/users", "main.go", 3));
        result.errors.push("models: boom".to_string());

        let report = JsonReport::new("/repo", &result);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["path"], "/repo");
        assert_eq!(value["summary"]["endpoints"], 1);
        assert_eq!(value["summary"]["errors"], 1);
        assert_eq!(value["result"]["language"], "go");
        assert_eq!(value["result"]["endpoints"][0]["path"], "/users");
    }
}
