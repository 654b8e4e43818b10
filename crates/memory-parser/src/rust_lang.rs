//! Rust extractor, grounded on `drift-core::parsers::rust_lang::RustParser`
//! (tree-sitter query-based extraction of functions/structs/enums/traits,
//! `use` declarations, and call sites), adapted to the `LanguageExtractor`
//! interface and `memory-parser`'s record shapes. Doc comments (`///`) are
//! read from the sibling comment nodes immediately preceding a function,
//! since tree-sitter-rust does not attach them to the function node itself.

use std::cell::RefCell;

use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::extractor::LanguageExtractor;
use crate::types::{CallRecord, ClassRecord, FileParseResult, FunctionRecord, ImportRecord, Language, LineRange};

const FUNCTION_QUERY: &str = r#"
(function_item
    name: (identifier) @name
    parameters: (parameters) @params
    return_type: (_)? @return_type
) @function
"#;

const STRUCT_QUERY: &str = r#"
(struct_item
    name: (type_identifier) @name
) @struct

(enum_item
    name: (type_identifier) @name
) @enum

(trait_item
    name: (type_identifier) @name
) @trait

(impl_item
    trait: (type_identifier)? @trait_name
    type: (type_identifier) @impl_type
) @impl
"#;

const USE_QUERY: &str = r#"
(use_declaration
    argument: (_) @use_path
) @use
"#;

const CALL_QUERY: &str = r#"
(call_expression
    function: [
        (identifier) @callee
        (field_expression
            value: (_) @receiver
            field: (field_identifier) @callee
        )
        (scoped_identifier
            path: (_) @receiver
            name: (identifier) @callee
        )
    ]
) @call
"#;

pub struct RustExtractor {
    parser: RefCell<Parser>,
    function_query: Query,
    struct_query: Query,
    use_query: Query,
    call_query: Query,
}

impl RustExtractor {
    pub fn new() -> Result<Self, String> {
        let language = tree_sitter_rust::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&language).map_err(|e| format!("failed to set rust language: {e}"))?;

        Ok(Self {
            parser: RefCell::new(parser),
            function_query: Query::new(&language, FUNCTION_QUERY).map_err(|e| e.to_string())?,
            struct_query: Query::new(&language, STRUCT_QUERY).map_err(|e| e.to_string())?,
            use_query: Query::new(&language, USE_QUERY).map_err(|e| e.to_string())?,
            call_query: Query::new(&language, CALL_QUERY).map_err(|e| e.to_string())?,
        })
    }

    fn extract_functions(&self, root: &Node, source: &[u8], out: &mut Vec<FunctionRecord>) {
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&self.function_query, *root, source);
        for m in matches {
            let mut name = String::new();
            let mut params = String::new();
            let mut return_type = String::new();
            let mut function_node = None;

            for capture in m.captures {
                let text = capture.node.utf8_text(source).unwrap_or("").to_string();
                match self.function_query.capture_names()[capture.index as usize] {
                    "name" => name = text,
                    "params" => params = text,
                    "return_type" => return_type = text,
                    "function" => function_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = function_node else { continue };
            if name.is_empty() {
                continue;
            }

            let signature = if return_type.is_empty() {
                format!("{name}{params}")
            } else {
                format!("{name}{params} -> {return_type}")
            };

            out.push(FunctionRecord {
                name,
                signature,
                range: node_range(&node),
                docstring: extract_doc_comment(&node, source),
                containing_class: enclosing_impl_type(&node, source),
                is_async: has_async_modifier(&node),
            });
        }
    }

    fn extract_types(&self, root: &Node, source: &[u8], out: &mut Vec<ClassRecord>) {
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&self.struct_query, *root, source);
        for m in matches {
            let mut name = String::new();
            let mut trait_name = None;
            let mut type_node = None;

            for capture in m.captures {
                let text = capture.node.utf8_text(source).unwrap_or("").to_string();
                match self.struct_query.capture_names()[capture.index as usize] {
                    "name" | "impl_type" => name = text,
                    "trait_name" => trait_name = Some(text),
                    "struct" | "enum" | "trait" | "impl" => type_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = type_node else { continue };
            if name.is_empty() {
                continue;
            }

            out.push(ClassRecord {
                name,
                range: node_range(&node),
                extends: trait_name,
                implements: Vec::new(),
            });
        }
    }

    fn extract_imports(&self, root: &Node, source: &[u8], out: &mut Vec<ImportRecord>) {
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&self.use_query, *root, source);
        for m in matches {
            let mut path = String::new();
            let mut use_node = None;

            for capture in m.captures {
                let text = capture.node.utf8_text(source).unwrap_or("").to_string();
                match self.use_query.capture_names()[capture.index as usize] {
                    "use_path" => path = text,
                    "use" => use_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = use_node else { continue };
            if path.is_empty() {
                continue;
            }

            let (module, names) = split_use_path(&path);
            out.push(ImportRecord { module, names, range: node_range(&node) });
        }
    }

    fn extract_calls(&self, root: &Node, source: &[u8], out: &mut Vec<CallRecord>) {
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&self.call_query, *root, source);
        for m in matches {
            let mut callee = String::new();
            let mut receiver = None;
            let mut call_node = None;

            for capture in m.captures {
                let text = capture.node.utf8_text(source).unwrap_or("").to_string();
                match self.call_query.capture_names()[capture.index as usize] {
                    "callee" => callee = text,
                    "receiver" => receiver = Some(text),
                    "call" => call_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = call_node else { continue };
            if callee.is_empty() {
                continue;
            }

            out.push(CallRecord { callee, receiver, range: node_range(&node) });
        }
    }
}

impl LanguageExtractor for RustExtractor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extract(&self, file_path: &str, source: &str) -> FileParseResult {
        let mut parser = self.parser.borrow_mut();
        let Some(tree) = parser.parse(source, None) else {
            return FileParseResult::with_error(file_path, "tree-sitter failed to parse source");
        };
        drop(parser);

        let root = tree.root_node();
        let source_bytes = source.as_bytes();
        let mut result = FileParseResult::empty_for(file_path, Some(Language::Rust));

        self.extract_functions(&root, source_bytes, &mut result.functions);
        self.extract_types(&root, source_bytes, &mut result.classes);
        self.extract_imports(&root, source_bytes, &mut result.imports);
        self.extract_calls(&root, source_bytes, &mut result.calls);

        if root.has_error() {
            result.error = Some("source contains syntax errors; partial structure extracted".to_string());
        }
        result
    }
}

/// Doc comments (`///` or `/** */`) immediately above the item, joined in
/// source order. Rust attaches these as sibling `line_comment`/`block_comment`
/// nodes rather than a field on the item itself.
fn extract_doc_comment(node: &Node, source: &[u8]) -> Option<String> {
    let mut lines = Vec::new();
    let mut sibling = node.prev_sibling();
    while let Some(current) = sibling {
        if current.kind() != "line_comment" && current.kind() != "block_comment" {
            break;
        }
        let text = current.utf8_text(source).unwrap_or("");
        if let Some(stripped) = text.strip_prefix("///") {
            lines.push(stripped.trim().to_string());
        } else if text.starts_with("//") {
            break;
        }
        sibling = current.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join(" "))
}

fn has_async_modifier(node: &Node) -> bool {
    (0..node.child_count()).any(|i| node.child(i).map(|c| c.kind() == "async").unwrap_or(false))
}

/// Walk up from a function node to the nearest enclosing `impl_item`'s
/// target type name (the optional containing-class field).
fn enclosing_impl_type(function_node: &Node, source: &[u8]) -> Option<String> {
    let mut current = function_node.parent();
    while let Some(node) = current {
        if node.kind() == "impl_item" {
            let type_node = node.child_by_field_name("type")?;
            return type_node.utf8_text(source).ok().map(|s| s.to_string());
        }
        current = node.parent();
    }
    None
}

/// Rust `use` arguments can be a path, a brace-list, or a glob; split into
/// a leading module prefix and any named bindings for parity with the
/// import record shape other languages use.
fn split_use_path(path: &str) -> (String, Vec<String>) {
    if let Some(brace_start) = path.find('{') {
        let module = path[..brace_start].trim_end_matches("::").to_string();
        let names = path[brace_start + 1..]
            .trim_end_matches('}')
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        (module, names)
    } else {
        (path.to_string(), Vec::new())
    }
}

fn node_range(node: &Node) -> LineRange {
    LineRange { start_line: node.start_position().row as u32 + 1, end_line: node.end_position().row as u32 + 1 }
}
