//! `generate_for_entity`'s per-kind text formatting (§4.5).
//!
//! The function variant omits any part whose source field is absent, per
//! the spec's explicit note; class and other default missing parts to an
//! empty string instead, since the spec states their line layout
//! unconditionally.

use codegraph_core::{Entity, EntityKind};

pub fn format_for_entity(entity: &Entity) -> String {
    match entity.kind {
        EntityKind::Function => format_function(entity),
        EntityKind::Class => format_class(entity),
        _ => format_other(entity),
    }
}

fn format_function(entity: &Entity) -> String {
    let mut lines = vec![format!("Function: {}", entity.name)];
    if let Some(signature) = &entity.signature {
        lines.push(format!("Signature: {signature}"));
    }
    if let Some(docstring) = &entity.docstring {
        lines.push(format!("Docstring: {docstring}"));
    }
    if let Some(body) = &entity.body {
        lines.push(format!("Body: {}", truncate(body)));
    }
    lines.join("\n")
}

fn format_class(entity: &Entity) -> String {
    let methods = entity.body.as_deref().map(extract_method_names).unwrap_or_default();
    format!(
        "Class: {}\nDocstring: {}\nMethods: {}",
        entity.name,
        entity.docstring.as_deref().unwrap_or(""),
        methods.join(", ")
    )
}

fn format_other(entity: &Entity) -> String {
    format!(
        "{}: {}\nContent: {}",
        capitalize(entity.kind.as_str()),
        entity.name,
        truncate(entity.body.as_deref().unwrap_or(""))
    )
}

fn truncate(text: &str) -> String {
    text.chars().take(500).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

const NON_METHOD_KEYWORDS: [&str; 10] = ["if", "for", "while", "switch", "catch", "return", "new", "else", "try", "super"];

/// Pulls method-looking names out of a class body: a line beginning with
/// `def `/`function ` (Python/JS), or any line whose head before `(` ends in
/// a bare identifier that isn't a control-flow keyword (Java-style
/// `public void bark()`).
fn extract_method_names(body: &str) -> Vec<String> {
    let mut names = Vec::new();
    for raw_line in body.lines() {
        let line = raw_line.trim();
        if let Some(rest) = line.strip_prefix("def ") {
            if let Some(name) = rest.split(['(', ' ']).next() {
                names.push(name.trim_end_matches(':').to_string());
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("function ") {
            if let Some(name) = rest.split(['(', ' ']).next() {
                names.push(name.to_string());
            }
            continue;
        }
        let Some(paren_idx) = line.find('(') else { continue };
        let head = line[..paren_idx].trim();
        let Some(candidate) = head.rsplit(char::is_whitespace).next() else { continue };
        if is_identifier(candidate) && !NON_METHOD_KEYWORDS.contains(&candidate) {
            names.push(candidate.to_string());
        }
    }
    names.dedup();
    names
}

fn is_identifier(word: &str) -> bool {
    !word.is_empty()
        && word.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && word.chars().all(|c| c.is_alphanumeric() || c == '_')
}
