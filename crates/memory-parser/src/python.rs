//! Python extractor, grounded on `drift-core::parsers::python::PythonParser`
//! (tree-sitter query-based extraction of functions/classes/imports/calls),
//! adapted to the `LanguageExtractor` interface and `memory-parser`'s record
//! shapes, plus docstring extraction — the function variant carries an
//! optional docstring.

use std::cell::RefCell;

use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::extractor::LanguageExtractor;
use crate::types::{CallRecord, ClassRecord, FileParseResult, FunctionRecord, ImportRecord, Language, LineRange};

const FUNCTION_QUERY: &str = r#"
(function_definition
    name: (identifier) @name
    parameters: (parameters) @params
    return_type: (type)? @return_type
    body: (block) @body
) @function
"#;

const CLASS_QUERY: &str = r#"
(class_definition
    name: (identifier) @name
    superclasses: (argument_list (identifier) @base)*
) @class
"#;

const IMPORT_QUERY: &str = r#"
(import_statement
    name: (dotted_name) @module
) @import

(import_from_statement
    module_name: (dotted_name) @module
    name: [
        (dotted_name) @name
        (aliased_import name: (dotted_name) @name)
    ]*
) @from_import
"#;

const CALL_QUERY: &str = r#"
(call
    function: [
        (identifier) @callee
        (attribute
            object: (_) @receiver
            attribute: (identifier) @callee
        )
    ]
) @call
"#;

pub struct PythonExtractor {
    parser: RefCell<Parser>,
    function_query: Query,
    class_query: Query,
    import_query: Query,
    call_query: Query,
}

impl PythonExtractor {
    pub fn new() -> Result<Self, String> {
        let language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&language).map_err(|e| format!("failed to set python language: {e}"))?;

        Ok(Self {
            parser: RefCell::new(parser),
            function_query: Query::new(&language, FUNCTION_QUERY).map_err(|e| e.to_string())?,
            class_query: Query::new(&language, CLASS_QUERY).map_err(|e| e.to_string())?,
            import_query: Query::new(&language, IMPORT_QUERY).map_err(|e| e.to_string())?,
            call_query: Query::new(&language, CALL_QUERY).map_err(|e| e.to_string())?,
        })
    }

    fn extract_functions(&self, root: &Node, source: &[u8], out: &mut Vec<FunctionRecord>) {
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&self.function_query, *root, source);
        for m in matches {
            let mut name = String::new();
            let mut params = String::new();
            let mut function_node = None;
            let mut body_node = None;

            for capture in m.captures {
                let text = capture.node.utf8_text(source).unwrap_or("").to_string();
                match self.function_query.capture_names()[capture.index as usize] {
                    "name" => name = text,
                    "params" => params = text,
                    "function" => function_node = Some(capture.node),
                    "body" => body_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = function_node else { continue };
            if name.is_empty() {
                continue;
            }

            let docstring = body_node.and_then(|body| extract_docstring(&body, source));
            let containing_class = enclosing_class_name(&node, source);

            out.push(FunctionRecord {
                signature: format!("{name}{params}"),
                name,
                range: node_range(&node),
                docstring,
                containing_class,
                is_async: node.child(0).map(|c| c.kind() == "async").unwrap_or(false),
            });
        }
    }

    fn extract_classes(&self, root: &Node, source: &[u8], out: &mut Vec<ClassRecord>) {
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&self.class_query, *root, source);
        for m in matches {
            let mut name = String::new();
            let mut bases = Vec::new();
            let mut class_node = None;

            for capture in m.captures {
                let text = capture.node.utf8_text(source).unwrap_or("").to_string();
                match self.class_query.capture_names()[capture.index as usize] {
                    "name" => name = text,
                    "base" => bases.push(text),
                    "class" => class_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = class_node else { continue };
            if name.is_empty() {
                continue;
            }

            out.push(ClassRecord {
                name,
                range: node_range(&node),
                extends: bases.first().cloned(),
                implements: bases.into_iter().skip(1).collect(),
            });
        }
    }

    fn extract_imports(&self, root: &Node, source: &[u8], out: &mut Vec<ImportRecord>) {
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&self.import_query, *root, source);
        for m in matches {
            let mut module = String::new();
            let mut names = Vec::new();
            let mut stmt_node = None;

            for capture in m.captures {
                let text = capture.node.utf8_text(source).unwrap_or("").to_string();
                match self.import_query.capture_names()[capture.index as usize] {
                    "module" => module = text,
                    "name" => names.push(text),
                    "import" | "from_import" => stmt_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = stmt_node else { continue };
            if module.is_empty() {
                continue;
            }

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

impl LanguageExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, file_path: &str, source: &str) -> FileParseResult {
        let mut parser = self.parser.borrow_mut();
        let Some(tree) = parser.parse(source, None) else {
            return FileParseResult::with_error(file_path, "tree-sitter failed to parse source");
        };
        drop(parser);

        let root = tree.root_node();
        let source_bytes = source.as_bytes();
        let mut result = FileParseResult::empty_for(file_path, Some(Language::Python));

        self.extract_functions(&root, source_bytes, &mut result.functions);
        self.extract_classes(&root, source_bytes, &mut result.classes);
        self.extract_imports(&root, source_bytes, &mut result.imports);
        self.extract_calls(&root, source_bytes, &mut result.calls);

        if root.has_error() {
            result.error = Some("source contains syntax errors; partial structure extracted".to_string());
        }
        result
    }
}

/// A function's docstring: the first statement in its body, if it is a bare
/// string literal expression.
fn extract_docstring(body: &Node, source: &[u8]) -> Option<String> {
    let first_stmt = body.named_child(0)?;
    if first_stmt.kind() != "expression_statement" {
        return None;
    }
    let expr = first_stmt.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let text = expr.utf8_text(source).ok()?;
    Some(text.trim_matches(['"', '\'']).trim().to_string())
}

/// Walk up from a function node to find the nearest enclosing
/// `class_definition`'s name, if any — the function variant carries an
/// optional containing-class name.
fn enclosing_class_name(function_node: &Node, source: &[u8]) -> Option<String> {
    let mut current = function_node.parent();
    while let Some(node) = current {
        if node.kind() == "class_definition" {
            let name_node = node.child_by_field_name("name")?;
            return name_node.utf8_text(source).ok().map(|s| s.to_string());
        }
        current = node.parent();
    }
    None
}

fn node_range(node: &Node) -> LineRange {
    LineRange { start_line: node.start_position().row as u32 + 1, end_line: node.end_position().row as u32 + 1 }
}
