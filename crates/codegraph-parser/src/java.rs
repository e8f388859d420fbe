//! Java extraction: classes, methods, fields, imports.

use crate::entities::{RawEntity, RawImport, RawParam, RawReference, RawSignature, ReferenceKind};
use codegraph_core::EntityKind;
use tree_sitter::Node;

pub struct JavaExtraction {
    pub entities: Vec<RawEntity>,
    pub references: Vec<RawReference>,
    pub imports: Vec<RawImport>,
    pub base_classes: Vec<(String, Vec<String>)>,
}

pub fn extract(source: &str, tree: &tree_sitter::Tree) -> JavaExtraction {
    let mut out = JavaExtraction {
        entities: Vec::new(),
        references: Vec::new(),
        imports: Vec::new(),
        base_classes: Vec::new(),
    };
    walk_block(tree.root_node(), source, &mut out);
    out
}

fn text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn line_of(node: Node, which: fn(Node) -> tree_sitter::Point) -> usize {
    which(node).row + 1
}

fn preceding_comment(node: Node, source: &str) -> Option<String> {
    let sibling = node.prev_sibling()?;
    if sibling.kind() != "line_comment" && sibling.kind() != "block_comment" {
        return None;
    }
    let raw = text(sibling, source);
    let cleaned: String = raw
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_start_matches("//")
        .trim_end_matches("*/")
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!cleaned.is_empty()).then_some(cleaned)
}

fn walk_block(node: Node, source: &str, out: &mut JavaExtraction) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "class_declaration" | "interface_declaration" => extract_class(child, source, out),
            "import_declaration" => extract_import(child, source, out),
            _ => walk_block(child, source, out),
        }
    }
}

fn extract_class(node: Node, source: &str, out: &mut JavaExtraction) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = text(name_node, source).to_string();
    let start = line_of(node, |n| n.start_position());
    let end = line_of(node, |n| n.end_position());

    let mut bases = Vec::new();
    if let Some(superclass) = node.child_by_field_name("superclass") {
        if let Some(type_node) = superclass.named_child(0) {
            bases.push(text(type_node, source).to_string());
        }
    }
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        let mut cursor = interfaces.walk();
        for iface in interfaces.named_children(&mut cursor) {
            bases.push(text(iface, source).to_string());
        }
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
            match member.kind() {
                "method_declaration" | "constructor_declaration" => extract_method(member, source, &name, out),
                "field_declaration" => extract_field(member, source, &name, out),
                _ => {}
            }
        }
    }
}

fn extract_method(node: Node, source: &str, class_name: &str, out: &mut JavaExtraction) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = text(name_node, source).to_string();
    let start = line_of(node, |n| n.start_position());
    let end = line_of(node, |n| n.end_position());

    let mut signature = RawSignature::default();
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for p in params.named_children(&mut cursor) {
            if p.kind() == "formal_parameter" {
                let param_name = p
                    .child_by_field_name("name")
                    .map(|n| text(n, source).to_string())
                    .unwrap_or_default();
                let type_annotation = p.child_by_field_name("type").map(|t| text(t, source).to_string());
                signature.parameters.push(RawParam { name: param_name, type_annotation });
            }
        }
    }
    signature.return_type = node.child_by_field_name("type").map(|t| text(t, source).to_string());

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

fn extract_field(node: Node, source: &str, class_name: &str, out: &mut JavaExtraction) {
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else { continue };
        let name = text(name_node, source).to_string();
        let line = line_of(node, |n| n.start_position());
        let mut entity = RawEntity::new(EntityKind::Variable, &name, line, line);
        entity.parent_class = Some(class_name.to_string());
        out.entities.push(entity);
    }
}

fn extract_import(node: Node, source: &str, out: &mut JavaExtraction) {
    let Some(path_node) = node.named_child(0) else { return };
    let full = text(path_node, source);
    let is_star = text(node, source).contains(".*");
    let line = line_of(node, |n| n.start_position());
    out.imports.push(RawImport {
        module: full.to_string(),
        symbols: vec![full.rsplit('.').next().unwrap_or(full).to_string()],
        alias: None,
        is_star,
        line,
    });
}

fn collect_calls_in(node: Node, source: &str, scope: String, out: &mut JavaExtraction) {
    if node.kind() == "method_invocation" {
        if let Some(name_node) = node.child_by_field_name("name") {
            out.references.push(RawReference {
                from_entity: scope.clone(),
                to_name: text(name_node, source).to_string(),
                kind: ReferenceKind::Call,
            });
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
        parser.set_language(&tree_sitter_java::LANGUAGE.into()).unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn extracts_class_with_method_and_call() {
        let source = "class Dog extends Animal {\n  void bark() {\n    helper();\n  }\n}\n";
        let tree = parse(source);
        let result = extract(source, &tree);
        assert_eq!(result.base_classes[0], ("Dog".to_string(), vec!["Animal".to_string()]));
        let method = result.entities.iter().find(|e| e.name == "bark").unwrap();
        assert_eq!(method.parent_class.as_deref(), Some("Dog"));
        assert!(result.references.iter().any(|r| r.to_name == "helper"));
    }
}
