//! Tree-sitter backed locator for type declarations.
//!
//! Analyzers ask this module for the headers of struct, class, interface and
//! enum declarations. When the `tree-sitter` feature is disabled, or when a
//! grammar fails to load or parse, this returns `None` and the analyzer falls
//! back to its regex locator. Body parsing is done by the analyzer either way.

/// Grammars available to the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstLanguage {
    Go,
    Python,
    Rust,
    TypeScript,
    Tsx,
    JavaScript,
    C,
    Cpp,
}

/// A located type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    /// Declaration kind label (`struct`, `class`, `interface`, `enum`, `trait`, `type_alias`).
    pub kind: &'static str,
    /// Byte offset of the declaration start.
    pub start: usize,
    /// Byte offset one past the declaration end.
    pub end: usize,
    /// 1-indexed line of the declaration start.
    pub line: usize,
}

#[cfg(feature = "tree-sitter")]
mod backend {
    use streaming_iterator::StreamingIterator;
    use tree_sitter::{Language, Parser, Query, QueryCursor};
    use tracing::debug;

    use super::{AstLanguage, TypeDecl};

    const GO_QUERIES: &[(&str, &str)] = &[
        (
            "(type_spec name: (type_identifier) @name type: (struct_type)) @decl",
            "struct",
        ),
        (
            "(type_spec name: (type_identifier) @name type: (interface_type)) @decl",
            "interface",
        ),
    ];

    const PYTHON_QUERIES: &[(&str, &str)] =
        &[("(class_definition name: (identifier) @name) @decl", "class")];

    const RUST_QUERIES: &[(&str, &str)] = &[
        ("(struct_item name: (type_identifier) @name) @decl", "struct"),
        ("(enum_item name: (type_identifier) @name) @decl", "enum"),
        ("(trait_item name: (type_identifier) @name) @decl", "trait"),
    ];

    const TYPESCRIPT_QUERIES: &[(&str, &str)] = &[
        (
            "(interface_declaration name: (type_identifier) @name) @decl",
            "interface",
        ),
        ("(class_declaration name: (type_identifier) @name) @decl", "class"),
        (
            "(abstract_class_declaration name: (type_identifier) @name) @decl",
            "class",
        ),
        (
            "(type_alias_declaration name: (type_identifier) @name value: (object_type)) @decl",
            "type_alias",
        ),
        ("(enum_declaration name: (identifier) @name) @decl", "enum"),
    ];

    const JAVASCRIPT_QUERIES: &[(&str, &str)] =
        &[("(class_declaration name: (identifier) @name) @decl", "class")];

    const C_QUERIES: &[(&str, &str)] = &[
        (
            "(struct_specifier name: (type_identifier) @name body: (field_declaration_list)) @decl",
            "struct",
        ),
        (
            "(enum_specifier name: (type_identifier) @name body: (enumerator_list)) @decl",
            "enum",
        ),
    ];

    const CPP_QUERIES: &[(&str, &str)] = &[
        (
            "(struct_specifier name: (type_identifier) @name body: (field_declaration_list)) @decl",
            "struct",
        ),
        (
            "(class_specifier name: (type_identifier) @name body: (field_declaration_list)) @decl",
            "class",
        ),
        (
            "(enum_specifier name: (type_identifier) @name body: (enumerator_list)) @decl",
            "enum",
        ),
    ];

    fn grammar(lang: AstLanguage) -> (Language, &'static [(&'static str, &'static str)]) {
        match lang {
            AstLanguage::Go => (tree_sitter_go::LANGUAGE.into(), GO_QUERIES),
            AstLanguage::Python => (tree_sitter_python::LANGUAGE.into(), PYTHON_QUERIES),
            AstLanguage::Rust => (tree_sitter_rust::LANGUAGE.into(), RUST_QUERIES),
            AstLanguage::TypeScript => (
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                TYPESCRIPT_QUERIES,
            ),
            AstLanguage::Tsx => (tree_sitter_typescript::LANGUAGE_TSX.into(), TYPESCRIPT_QUERIES),
            AstLanguage::JavaScript => {
                (tree_sitter_javascript::LANGUAGE.into(), JAVASCRIPT_QUERIES)
            }
            AstLanguage::C => (tree_sitter_c::LANGUAGE.into(), C_QUERIES),
            AstLanguage::Cpp => (tree_sitter_cpp::LANGUAGE.into(), CPP_QUERIES),
        }
    }

    pub fn locate(lang: AstLanguage, source: &str) -> anyhow::Result<Vec<TypeDecl>> {
        let (language, queries) = grammar(lang);

        let mut parser = Parser::new();
        parser.set_language(&language)?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("parser returned no tree"))?;

        // One pattern per kind, so the match's pattern index selects the label.
        let query_src: String = queries.iter().map(|(q, _)| format!("{}\n", q)).collect();
        let query = Query::new(&language, &query_src)?;
        let names = query.capture_names();

        let bytes = source.as_bytes();
        let mut decls = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), bytes);
        while let Some(m) = matches.next() {
            let kind = queries
                .get(m.pattern_index)
                .map(|(_, kind)| *kind)
                .unwrap_or("struct");
            let mut name = None;
            let mut span = None;
            for capture in m.captures {
                match names[capture.index as usize] {
                    "name" => name = capture.node.utf8_text(bytes).ok().map(str::to_string),
                    "decl" => {
                        span = Some((
                            capture.node.start_byte(),
                            capture.node.end_byte(),
                            capture.node.start_position().row + 1,
                        ))
                    }
                    _ => {}
                }
            }
            if let (Some(name), Some((start, end, line))) = (name, span) {
                decls.push(TypeDecl {
                    name,
                    kind,
                    start,
                    end,
                    line,
                });
            }
        }
        decls.sort_by_key(|d| d.start);
        debug!(language = ?lang, count = decls.len(), "located declarations");
        Ok(decls)
    }
}

/// Locate type declarations with tree-sitter.
///
/// `None` means the AST backend is unavailable for this input and the caller
/// should use its regex locator.
#[cfg(feature = "tree-sitter")]
pub fn locate_type_declarations(lang: AstLanguage, source: &str) -> Option<Vec<TypeDecl>> {
    match backend::locate(lang, source) {
        Ok(decls) => Some(decls),
        Err(e) => {
            tracing::debug!(language = ?lang, error = %e, "AST locator failed, using patterns");
            None
        }
    }
}

#[cfg(not(feature = "tree-sitter"))]
pub fn locate_type_declarations(_lang: AstLanguage, _source: &str) -> Option<Vec<TypeDecl>> {
    None
}

#[cfg(all(test, feature = "tree-sitter"))]
mod tests {
    use super::*;

    #[test]
    fn test_go_structs_and_interfaces() {
        let src = "package x\n\ntype (\n\tA struct { X int }\n\tB interface { Run() }\n)\n\ntype C struct{}\n";
        let decls = locate_type_declarations(AstLanguage::Go, src).unwrap();
        let found: Vec<_> = decls.iter().map(|d| (d.name.as_str(), d.kind)).collect();
        assert_eq!(found, vec![("A", "struct"), ("B", "interface"), ("C", "struct")]);
        assert_eq!(decls[0].line, 4);
        assert!(src[decls[0].start..decls[0].end].starts_with("A struct"));
    }

    #[test]
    fn test_rust_kinds() {
        let src = "pub struct User { id: u64 }\nenum Role { Admin }\ntrait Store { fn get(&self); }\n";
        let decls = locate_type_declarations(AstLanguage::Rust, src).unwrap();
        let kinds: Vec<_> = decls.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec!["struct", "enum", "trait"]);
    }

    #[test]
    fn test_python_classes() {
        let src = "class A:\n    x: int\n\nclass B(A):\n    pass\n";
        let decls = locate_type_declarations(AstLanguage::Python, src).unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[1].name, "B");
        assert_eq!(decls[1].line, 4);
    }
}
