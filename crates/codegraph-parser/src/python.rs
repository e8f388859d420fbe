//! Python extraction: functions, classes, module/class-scope variables,
//! imports, docstrings, and in-file call/inheritance references.
//!
//! Walker shape (scope stack, recurse into decorated/class bodies) follows
//! `rpg_parser::entities::extract_python_node`.

use crate::entities::{RawEntity, RawImport, RawParam, RawReference, RawSignature, ReferenceKind};
use codegraph_core::EntityKind;
use tree_sitter::Node;

pub struct PythonExtraction {
    pub entities: Vec<RawEntity>,
    pub references: Vec<RawReference>,
    pub imports: Vec<RawImport>,
    pub base_classes: Vec<(String, Vec<String>)>,
}

pub fn extract(source: &str, tree: &tree_sitter::Tree) -> PythonExtraction {
    let mut out = PythonExtraction {
        entities: Vec::new(),
        references: Vec::new(),
        imports: Vec::new(),
        base_classes: Vec::new(),
    };
    walk_block(tree.root_node(), source, None, &mut out);
    out
}

fn text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn line_of(node: Node, which: fn(Node) -> tree_sitter::Point) -> usize {
    which(node).row + 1
}

fn docstring_of(block: Node, source: &str) -> Option<String> {
    let first = block.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let raw = text(expr, source);
    Some(raw.trim_matches(|c| c == '"' || c == '\'').trim().to_string())
}

fn walk_block(node: Node, source: &str, current_class: Option<&str>, out: &mut PythonExtraction) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, source, current_class, out);
    }
}

fn walk_node(node: Node, source: &str, current_class: Option<&str>, out: &mut PythonExtraction) {
    match node.kind() {
        "decorated_definition" => {
            if let Some(inner) = node.child_by_field_name("definition") {
                let decorators = collect_decorators(node, source);
                walk_definition(inner, source, current_class, &decorators, out);
            }
        }
        "function_definition" | "class_definition" => {
            walk_definition(node, source, current_class, &[], out);
        }
        "import_statement" | "import_from_statement" => {
            extract_import(node, source, out);
        }
        "expression_statement" => {
            extract_module_or_class_variable(node, source, current_class, out);
            collect_calls_in(node, source, scope_id(current_class, "<module>"), out);
        }
        "if_statement" | "try_statement" | "with_statement" | "for_statement" | "while_statement" => {
            walk_block(node, source, current_class, out);
        }
        _ => {}
    }
}

fn walk_definition(
    node: Node,
    source: &str,
    current_class: Option<&str>,
    decorators: &[String],
    out: &mut PythonExtraction,
) {
    match node.kind() {
        "function_definition" => extract_function(node, source, current_class, decorators, out),
        "class_definition" => extract_class(node, source, decorators, out),
        _ => {}
    }
}

fn collect_decorators(decorated: Node, source: &str) -> Vec<String> {
    let mut cursor = decorated.walk();
    decorated
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|c| text(c, source).trim_start_matches('@').trim().to_string())
        .collect()
}

fn extract_function(
    node: Node,
    source: &str,
    current_class: Option<&str>,
    decorators: &[String],
    out: &mut PythonExtraction,
) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = text(name_node, source).to_string();
    let start = line_of(node, |n| n.start_position());
    let end = line_of(node, |n| n.end_position());

    let mut signature = RawSignature::default();
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for p in params.named_children(&mut cursor) {
            signature.parameters.push(extract_python_param(p, source));
        }
    }
    if let Some(ret) = node.child_by_field_name("return_type") {
        signature.return_type = Some(text(ret, source).to_string());
    }

    let is_async = text(node, source).trim_start().starts_with("async");
    let body_node = node.child_by_field_name("body");
    let docstring = body_node.and_then(|b| docstring_of(b, source));
    let body_text = body_node.map(|b| text(b, source).to_string());

    let mut entity = RawEntity::new(EntityKind::Function, &name, start, end);
    entity.signature = Some(signature);
    entity.docstring = docstring;
    entity.body = body_text.clone();
    entity.parent_class = current_class.map(str::to_string);
    entity.metadata.insert("is_async".into(), serde_json::json!(is_async));
    entity.metadata.insert(
        "is_generator".into(),
        serde_json::json!(body_text.as_deref().is_some_and(|b| b.contains("yield"))),
    );
    if !decorators.is_empty() {
        entity.metadata.insert("decorators".into(), serde_json::json!(decorators));
    }
    out.entities.push(entity);

    let self_scope = scope_id(current_class, &name);
    if let Some(body) = body_node {
        collect_calls_in(body, source, self_scope, out);
        walk_block(body, source, current_class, out);
    }
}

fn extract_python_param(node: Node, source: &str) -> RawParam {
    match node.kind() {
        "typed_parameter" | "typed_default_parameter" => {
            let name = node
                .named_child(0)
                .map(|n| text(n, source).to_string())
                .unwrap_or_default();
            let type_annotation = node.child_by_field_name("type").map(|t| text(t, source).to_string());
            RawParam { name, type_annotation }
        }
        "default_parameter" => {
            let name = node
                .child_by_field_name("name")
                .map(|n| text(n, source).to_string())
                .unwrap_or_default();
            RawParam { name, type_annotation: None }
        }
        _ => RawParam {
            name: text(node, source).to_string(),
            type_annotation: None,
        },
    }
}

fn extract_class(node: Node, source: &str, decorators: &[String], out: &mut PythonExtraction) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = text(name_node, source).to_string();
    let start = line_of(node, |n| n.start_position());
    let end = line_of(node, |n| n.end_position());

    let mut bases = Vec::new();
    if let Some(args) = node.child_by_field_name("superclasses") {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() == "identifier" || arg.kind() == "attribute" {
                let base_text = text(arg, source);
                let tail = base_text.rsplit('.').next().unwrap_or(base_text).to_string();
                bases.push(tail);
            }
        }
    }
    out.base_classes.push((name.clone(), bases));

    let body_node = node.child_by_field_name("body");
    let docstring = body_node.and_then(|b| docstring_of(b, source));
    let body_text = body_node.map(|b| text(b, source).to_string());

    let mut entity = RawEntity::new(EntityKind::Class, &name, start, end);
    entity.docstring = docstring;
    entity.body = body_text;
    if !decorators.is_empty() {
        entity.metadata.insert("decorators".into(), serde_json::json!(decorators));
    }
    out.entities.push(entity);

    if let Some(body) = body_node {
        walk_block(body, source, Some(&name), out);
    }
}

fn extract_module_or_class_variable(node: Node, source: &str, current_class: Option<&str>, out: &mut PythonExtraction) {
    let Some(assignment) = node.named_child(0) else { return };
    if assignment.kind() != "assignment" {
        return;
    }
    let Some(target) = assignment.child_by_field_name("left") else { return };
    if target.kind() != "identifier" {
        return;
    }
    let name = text(target, source).to_string();
    let line = line_of(node, |n| n.start_position());
    let mut entity = RawEntity::new(EntityKind::Variable, &name, line, line);
    entity.parent_class = current_class.map(str::to_string);
    out.entities.push(entity);
}

fn extract_import(node: Node, source: &str, out: &mut PythonExtraction) {
    let line = line_of(node, |n| n.start_position());
    if node.kind() == "import_statement" {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => out.imports.push(RawImport {
                    module: text(child, source).to_string(),
                    symbols: Vec::new(),
                    alias: None,
                    is_star: false,
                    line,
                }),
                "aliased_import" => {
                    let module = child
                        .child_by_field_name("name")
                        .map(|n| text(n, source).to_string())
                        .unwrap_or_default();
                    let alias = child.child_by_field_name("alias").map(|n| text(n, source).to_string());
                    out.imports.push(RawImport { module, symbols: Vec::new(), alias, is_star: false, line });
                }
                _ => {}
            }
        }
    } else if node.kind() == "import_from_statement" {
        let module = node
            .child_by_field_name("module_name")
            .map(|n| text(n, source).to_string())
            .unwrap_or_default();
        let mut symbols = Vec::new();
        let mut is_star = false;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" | "identifier" if text(child, source) != module => {
                    symbols.push(text(child, source).to_string());
                }
                "aliased_import" => {
                    if let Some(n) = child.child_by_field_name("name") {
                        symbols.push(text(n, source).to_string());
                    }
                }
                "wildcard_import" => is_star = true,
                _ => {}
            }
        }
        out.imports.push(RawImport { module, symbols, alias: None, is_star, line });
    }
}

fn scope_id(current_class: Option<&str>, name: &str) -> String {
    match current_class {
        Some(class) => format!("{class}.{name}"),
        None => name.to_string(),
    }
}

/// Walks every `call` expression under `node`, recording a reference from
/// `scope` to the called name. Attribute access uses the rightmost
/// component, per §4.1.
fn collect_calls_in(node: Node, source: &str, scope: String, out: &mut PythonExtraction) {
    if node.kind() == "call" {
        if let Some(func) = node.child_by_field_name("function") {
            let callee = match func.kind() {
                "identifier" => Some(text(func, source).to_string()),
                "attribute" => func
                    .child_by_field_name("attribute")
                    .map(|a| text(a, source).to_string()),
                _ => None,
            };
            if let Some(callee) = callee {
                out.references.push(RawReference {
                    from_entity: scope.clone(),
                    to_name: callee,
                    kind: ReferenceKind::Call,
                });
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_calls_in(child, source, scope.clone(), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse(source: &str) -> tree_sitter::Tree {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into()).unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn extracts_single_function() {
        let source = "def add(a, b):\n    return a + b\n";
        let tree = parse(source);
        let result = extract(source, &tree);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].kind, EntityKind::Function);
        assert_eq!(result.entities[0].name, "add");
        assert_eq!(result.entities[0].start_line, 1);
    }

    #[test]
    fn extracts_docstring_and_calls() {
        let source = "def outer():\n    \"\"\"does a thing\"\"\"\n    helper()\n";
        let tree = parse(source);
        let result = extract(source, &tree);
        assert_eq!(result.entities[0].docstring.as_deref(), Some("does a thing"));
        assert!(result.references.iter().any(|r| r.to_name == "helper"));
    }

    #[test]
    fn extracts_class_with_bases_and_methods() {
        let source = "class Dog(Animal):\n    def bark(self):\n        pass\n";
        let tree = parse(source);
        let result = extract(source, &tree);
        let class = result.entities.iter().find(|e| e.kind == EntityKind::Class).unwrap();
        assert_eq!(class.name, "Dog");
        assert_eq!(result.base_classes[0].1, vec!["Animal".to_string()]);
        let method = result.entities.iter().find(|e| e.name == "bark").unwrap();
        assert_eq!(method.parent_class.as_deref(), Some("Dog"));
    }

    #[test]
    fn overload_collision_reports_both_lines() {
        let source = "def process(x):\n    pass\n\n\ndef process(x, y):\n    pass\n";
        let tree = parse(source);
        let result = extract(source, &tree);
        let names: Vec<_> = result.entities.iter().filter(|e| e.name == "process").map(|e| e.start_line).collect();
        assert_eq!(names, vec![1, 5]);
    }
}
