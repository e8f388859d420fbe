//! Shared JavaScript/TypeScript extraction. The two grammars agree closely
//! enough on the node kinds this needs (`function_declaration`,
//! `class_declaration`, `method_definition`, `import_statement`) that one
//! walker serves both, the dispatcher in `crate::parse` just selects the
//! grammar to parse with.

use crate::entities::{RawEntity, RawImport, RawParam, RawReference, RawSignature, ReferenceKind};
use codegraph_core::EntityKind;
use tree_sitter::Node;

pub struct JsExtraction {
    pub entities: Vec<RawEntity>,
    pub references: Vec<RawReference>,
    pub imports: Vec<RawImport>,
    pub base_classes: Vec<(String, Vec<String>)>,
}

pub fn extract(source: &str, tree: &tree_sitter::Tree) -> JsExtraction {
    let mut out = JsExtraction {
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

/// JS/TS docstrings are the immediately preceding line comment or JSDoc
/// block, per §4.1 (unlike Python's leading string literal).
fn preceding_comment(node: Node, source: &str) -> Option<String> {
    let mut sibling = node.prev_sibling()?;
    if sibling.kind() != "comment" {
        return None;
    }
    let raw = text(sibling, source);
    Some(
        raw.trim_start_matches("/**")
            .trim_start_matches("//")
            .trim_end_matches("*/")
            .lines()
            .map(|l| l.trim().trim_start_matches('*').trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    )
    .filter(|s| !s.is_empty())
}

fn walk_block(node: Node, source: &str, current_class: Option<&str>, out: &mut JsExtraction) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, source, current_class, out);
    }
}

fn walk_node(node: Node, source: &str, current_class: Option<&str>, out: &mut JsExtraction) {
    match node.kind() {
        "function_declaration" => extract_function(node, source, current_class, out),
        "class_declaration" => extract_class(node, source, out),
        "import_statement" => extract_import(node, source, out),
        "lexical_declaration" | "variable_declaration" => extract_top_level_binding(node, source, current_class, out),
        "expression_statement" => {
            collect_calls_in(node, source, scope_id(current_class, "<module>"), out);
        }
        "export_statement" => {
            if let Some(inner) = node.named_child(0) {
                walk_node(inner, source, current_class, out);
            }
        }
        "if_statement" | "try_statement" | "for_statement" | "while_statement" => {
            walk_block(node, source, current_class, out);
        }
        _ => {}
    }
}

fn extract_function(node: Node, source: &str, current_class: Option<&str>, out: &mut JsExtraction) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = text(name_node, source).to_string();
    let start = line_of(node, |n| n.start_position());
    let end = line_of(node, |n| n.end_position());
    let signature = extract_signature(node, source);
    let is_async = text(node, source).trim_start().starts_with("async");
    let body_node = node.child_by_field_name("body");
    let body_text = body_node.map(|b| text(b, source).to_string());

    let mut entity = RawEntity::new(EntityKind::Function, &name, start, end);
    entity.signature = Some(signature);
    entity.docstring = preceding_comment(node, source);
    entity.body = body_text.clone();
    entity.parent_class = current_class.map(str::to_string);
    entity.metadata.insert("is_async".into(), serde_json::json!(is_async));
    entity.metadata.insert(
        "is_generator".into(),
        serde_json::json!(text(node, source).contains("function*")),
    );
    out.entities.push(entity);

    if let Some(body) = body_node {
        collect_calls_in(body, source, scope_id(current_class, &name), out);
        walk_block(body, source, current_class, out);
    }
}

fn extract_signature(node: Node, source: &str) -> RawSignature {
    let mut signature = RawSignature::default();
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for p in params.named_children(&mut cursor) {
            signature.parameters.push(extract_param(p, source));
        }
    }
    if let Some(ret) = node.child_by_field_name("return_type") {
        signature.return_type = Some(text(ret, source).trim_start_matches(':').trim().to_string());
    }
    signature
}

fn extract_param(node: Node, source: &str) -> RawParam {
    match node.kind() {
        "required_parameter" | "optional_parameter" => {
            let name = node
                .child_by_field_name("pattern")
                .map(|n| text(n, source).to_string())
                .unwrap_or_else(|| text(node, source).to_string());
            let type_annotation = node
                .child_by_field_name("type")
                .map(|t| text(t, source).trim_start_matches(':').trim().to_string());
            RawParam { name, type_annotation }
        }
        _ => RawParam {
            name: text(node, source).to_string(),
            type_annotation: None,
        },
    }
}

fn extract_class(node: Node, source: &str, out: &mut JsExtraction) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = text(name_node, source).to_string();
    let start = line_of(node, |n| n.start_position());
    let end = line_of(node, |n| n.end_position());

    let mut bases = Vec::new();
    if let Some(heritage) = node.child_by_field_name("superclass") {
        bases.push(text(heritage, source).trim().to_string());
    }
    out.base_classes.push((name.clone(), bases));

    let body_node = node.child_by_field_name("body");
    let mut entity = RawEntity::new(EntityKind::Class, &name, start, end);
    entity.docstring = preceding_comment(node, source);
    entity.body = body_node.map(|b| text(b, source).to_string());
    out.entities.push(entity);

    if let Some(body) = body_node {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() == "method_definition" {
                extract_method(member, source, &name, out);
            }
        }
    }
}

fn extract_method(node: Node, source: &str, class_name: &str, out: &mut JsExtraction) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = text(name_node, source).to_string();
    let start = line_of(node, |n| n.start_position());
    let end = line_of(node, |n| n.end_position());
    let signature = extract_signature(node, source);
    let body_node = node.child_by_field_name("body");

    let mut entity = RawEntity::new(EntityKind::Function, &name, start, end);
    entity.signature = Some(signature);
    entity.docstring = preceding_comment(node, source);
    entity.body = body_node.map(|b| text(b, source).to_string());
    entity.parent_class = Some(class_name.to_string());
    out.entities.push(entity);

    if let Some(body) = body_node {
        collect_calls_in(body, source, format!("{class_name}.{name}"), out);
    }
}

fn extract_top_level_binding(node: Node, source: &str, current_class: Option<&str>, out: &mut JsExtraction) {
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else { continue };
        let name = text(name_node, source).to_string();
        let value = declarator.child_by_field_name("value");
        let line = line_of(node, |n| n.start_position());

        if let Some(value_node) = value {
            if matches!(value_node.kind(), "arrow_function" | "function_expression") {
                let end = line_of(value_node, |n| n.end_position());
                let signature = extract_signature(value_node, source);
                let body_node = value_node.child_by_field_name("body");
                let mut entity = RawEntity::new(EntityKind::Function, &name, line, end);
                entity.signature = Some(signature);
                entity.docstring = preceding_comment(node, source);
                entity.body = body_node.map(|b| text(b, source).to_string());
                out.entities.push(entity);
                if let Some(body) = body_node {
                    collect_calls_in(body, source, scope_id(current_class, &name), out);
                }
                continue;
            }
        }

        let mut entity = RawEntity::new(EntityKind::Variable, &name, line, line);
        entity.parent_class = current_class.map(str::to_string);
        out.entities.push(entity);
    }
}

fn extract_import(node: Node, source: &str, out: &mut JsExtraction) {
    let Some(source_node) = node.child_by_field_name("source") else { return };
    let module = text(source_node, source).trim_matches(|c| c == '"' || c == '\'').to_string();
    let mut symbols = Vec::new();
    let mut is_star = false;
    let mut alias = None;

    if let Some(clause) = node.named_child(0) {
        if clause.kind() == "import_clause" {
            let mut cursor = clause.walk();
            for child in clause.named_children(&mut cursor) {
                match child.kind() {
                    "identifier" => alias = Some(text(child, source).to_string()),
                    "namespace_import" => is_star = true,
                    "named_imports" => {
                        let mut ic = child.walk();
                        for spec in child.named_children(&mut ic) {
                            if spec.kind() == "import_specifier" {
                                if let Some(n) = spec.child_by_field_name("name") {
                                    symbols.push(text(n, source).to_string());
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let line = line_of(node, |n| n.start_position());
    out.imports.push(RawImport { module, symbols, alias, is_star, line });
}

fn scope_id(current_class: Option<&str>, name: &str) -> String {
    match current_class {
        Some(class) => format!("{class}.{name}"),
        None => name.to_string(),
    }
}

fn collect_calls_in(node: Node, source: &str, scope: String, out: &mut JsExtraction) {
    if node.kind() == "call_expression" {
        if let Some(func) = node.child_by_field_name("function") {
            let callee = match func.kind() {
                "identifier" => Some(text(func, source).to_string()),
                "member_expression" => func.child_by_field_name("property").map(|p| text(p, source).to_string()),
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

    fn parse_js(source: &str) -> tree_sitter::Tree {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_javascript::LANGUAGE.into()).unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn extracts_function_declaration() {
        let source = "function add(a, b) {\n  return a + b;\n}\n";
        let tree = parse_js(source);
        let result = extract(source, &tree);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].name, "add");
    }

    #[test]
    fn extracts_class_and_methods_with_extends() {
        let source = "class Dog extends Animal {\n  bark() {\n    helper();\n  }\n}\n";
        let tree = parse_js(source);
        let result = extract(source, &tree);
        assert_eq!(result.base_classes[0], ("Dog".to_string(), vec!["Animal".to_string()]));
        let method = result.entities.iter().find(|e| e.name == "bark").unwrap();
        assert_eq!(method.parent_class.as_deref(), Some("Dog"));
        assert!(result.references.iter().any(|r| r.to_name == "helper"));
    }

    #[test]
    fn import_named_specifiers_are_collected() {
        let source = "import { helper } from '@app/helper';\n";
        let tree = parse_js(source);
        let result = extract(source, &tree);
        assert_eq!(result.imports[0].module, "@app/helper");
        assert_eq!(result.imports[0].symbols, vec!["helper".to_string()]);
    }
}
