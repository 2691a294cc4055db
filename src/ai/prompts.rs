//! Prompt text and output schemas for each extraction category.

use serde_json::{json, Value};

use super::select::Category;

pub const SYSTEM_PROMPT: &str = "You are a senior software engineer documenting an unfamiliar \
codebase. You read source files and report only facts that are visible in the code. \
Never invent names, paths or keys. When nothing relevant is present, return an empty JSON array.";

/// Task description for one category.
pub fn instructions(category: Category, language: &str) -> String {
    let task = match category {
        Category::Endpoints => {
            "List every externally reachable entry point: HTTP routes, RPC handlers, \
             GraphQL resolvers, message consumers and CLI commands. Use the HTTP verb as \
             the method when there is one, otherwise a short upper-case kind such as \
             GRAPHQL, RPC or CONSUMER."
        }
        Category::Models => {
            "List the data models: classes, structs, interfaces, enums, schemas and \
             DTOs that carry domain data. Include their fields with declared types."
        }
        Category::Config => {
            "List every configuration input: environment variables, settings keys, \
             command line flags and constants that tune behaviour. Mark a key as not \
             required when the code supplies a default."
        }
        Category::SideEffects => {
            "List operations with effects outside the process: database queries, HTTP \
             calls, file writes, queue publishes, cache access, e-mail and cloud SDK calls."
        }
    };
    format!("The following files are written in {}.\n{}", language, task)
}

/// JSON schema of one output item for `category`.
pub fn item_schema(category: Category) -> Value {
    match category {
        Category::Endpoints => json!({
            "type": "object",
            "required": ["method", "path"],
            "properties": {
                "method": {"type": "string"},
                "path": {"type": "string"},
                "file": {"type": "string"},
                "line": {"type": "integer"},
                "handler": {"type": "string"},
                "description": {"type": "string"},
                "parameters": {"type": "array", "items": {"type": "string"}},
                "response_type": {"type": "string"}
            }
        }),
        Category::Models => json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {"type": "string"},
                "model_type": {
                    "type": "string",
                    "enum": ["class", "struct", "interface", "type_alias", "enum", "trait",
                             "protocol", "dataclass", "pydantic", "schema"]
                },
                "file": {"type": "string"},
                "line": {"type": "integer"},
                "description": {"type": "string"},
                "parent": {"type": "string"},
                "fields": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": {"type": "string"},
                            "type": {"type": "string"},
                            "description": {"type": "string"},
                            "required": {"type": "boolean"}
                        }
                    }
                },
                "methods": {"type": "array", "items": {"type": "string"}}
            }
        }),
        Category::Config => json!({
            "type": "object",
            "required": ["key"],
            "properties": {
                "key": {"type": "string"},
                "source": {"type": "string", "description": "env, file, constant, flag, ..."},
                "file": {"type": "string"},
                "line": {"type": "integer"},
                "default": {"type": "string"},
                "description": {"type": "string"},
                "required": {"type": "boolean"}
            }
        }),
        Category::SideEffects => json!({
            "type": "object",
            "required": ["category", "operation"],
            "properties": {
                "category": {
                    "type": "string",
                    "enum": ["database", "http", "file", "queue", "cache", "email",
                             "notification", "external_api", "cloud_service"]
                },
                "operation": {"type": "string"},
                "target": {"type": "string"},
                "file": {"type": "string"},
                "line": {"type": "integer"},
                "description": {"type": "string"}
            }
        }),
    }
}

/// Files rendered as `### File:` blocks, each cut to `max_chars` characters.
pub fn render_files<'a, I>(files: I, max_chars: usize) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (rel, content) in files {
        let truncated: String = content.chars().take(max_chars).collect();
        out.push_str("### File: ");
        out.push_str(rel);
        out.push_str("\n```\n");
        out.push_str(&truncated);
        if truncated.len() < content.len() {
            out.push_str("\n... (truncated)");
        }
        out.push_str("\n```\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_files_truncates() {
        let text = render_files([("a.go", "package main"), ("b.go", "0123456789")], 4);
        assert!(text.contains("### File: a.go\n```\npack\n... (truncated)"));
        assert!(text.contains("### File: b.go\n```\n0123\n"));
    }

    #[test]
    fn test_schema_names_required_keys() {
        assert_eq!(item_schema(Category::Config)["required"], json!(["key"]));
        assert!(instructions(Category::Endpoints, "go").starts_with("The following files are written in go."));
    }
}
