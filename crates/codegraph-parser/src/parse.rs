//! Per-file parsing entry point (§4.1): language detection, CST parse,
//! entity/relationship extraction, deterministic ids, DEFINES synthesis.

use crate::entities::{RawEntity, RawImport, RawReference, ReferenceKind};
use crate::{java, js_ts, overload, python};
use codegraph_core::model::external_module_id;
use codegraph_core::{Entity, EntityKind, Language, Relationship, RelationshipKind};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tree_sitter::Parser;

#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub errors: Vec<String>,
    pub parse_duration: Duration,
}

/// An import entity paired with its raw extraction data, surfaced for
/// `codegraph_parser::enrichment` to resolve against other files in the
/// project (§4.2). `entity_id` is already assigned and already present in
/// `ParseResult::entities`.
#[derive(Debug, Clone)]
pub struct ResolvableImport {
    pub raw: RawImport,
    pub entity_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct FileImports {
    pub file_entity_id: String,
    pub imports: Vec<ResolvableImport>,
}

pub struct ParseOutput {
    pub result: ParseResult,
    pub file_imports: FileImports,
}

/// Parses one file's content into entities and relationships.
///
/// `language_override` lets a caller pin the language when the extension is
/// ambiguous or absent; otherwise it is detected from `file_path`.
pub fn parse_file(
    file_path: &str,
    content: &str,
    project_id: &str,
    language_override: Option<Language>,
) -> ParseOutput {
    let started = Instant::now();
    let language = language_override.or_else(|| crate::languages::detect(file_path));

    let Some(language) = language else {
        let mut result = ParseResult::default();
        result.errors.push(format!("unsupported file extension: {file_path}"));
        result.parse_duration = started.elapsed();
        return ParseOutput {
            result,
            file_imports: FileImports::default(),
        };
    };

    let mut parser = Parser::new();
    let grammar = crate::languages::ts_language_for_path(file_path, language);
    if parser.set_language(&grammar).is_err() {
        let mut result = ParseResult::default();
        result.errors.push(format!("failed to load grammar for {language}"));
        result.parse_duration = started.elapsed();
        return ParseOutput {
            result,
            file_imports: FileImports::default(),
        };
    }

    let Some(tree) = parser.parse(content, None) else {
        let mut result = ParseResult::default();
        result.errors.push(format!("tree-sitter failed to parse {file_path}"));
        result.parse_duration = started.elapsed();
        return ParseOutput {
            result,
            file_imports: FileImports::default(),
        };
    };

    let mut errors = Vec::new();
    if tree.root_node().has_error() {
        errors.push(format!("{file_path}: syntax errors present, extraction continued on the recoverable subtree"));
    }

    let (mut raw_entities, references, imports, base_classes) = match language {
        Language::Python => {
            let ex = python::extract(content, &tree);
            (ex.entities, ex.references, ex.imports, ex.base_classes)
        }
        Language::Javascript | Language::Typescript => {
            let ex = js_ts::extract(content, &tree);
            (ex.entities, ex.references, ex.imports, ex.base_classes)
        }
        Language::Java => {
            let ex = java::extract(content, &tree);
            (ex.entities, ex.references, ex.imports, ex.base_classes)
        }
    };

    overload::disambiguate(&mut raw_entities);

    let line_count = content.lines().count().max(1);
    let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
    let file_raw = RawEntity::new(EntityKind::File, file_name, 1, line_count);
    let file_entity = file_raw.into_entity(project_id, file_path, language);
    let file_entity_id = file_entity.id.clone();

    let mut entities = vec![file_entity];
    let mut relationships = Vec::new();

    for raw in raw_entities {
        let entity = raw.into_entity(project_id, file_path, language);
        relationships.push(Relationship::new(file_entity_id.clone(), entity.id.clone(), RelationshipKind::Defines));
        entities.push(entity);
    }

    resolve_in_file_references(&entities, &references, &mut relationships);
    resolve_inheritance(&entities, &base_classes, &mut relationships);

    let mut resolvable_imports = Vec::with_capacity(imports.len());
    for import in imports {
        let display_name = import.alias.clone().unwrap_or_else(|| import.module.clone());
        let entity_id = codegraph_core::id::entity_id(project_id, EntityKind::Import, &display_name, import.line, file_path);

        let mut metadata = BTreeMap::new();
        metadata.insert("module".to_string(), serde_json::json!(import.module));
        metadata.insert("symbols".to_string(), serde_json::json!(import.symbols));
        metadata.insert("is_star".to_string(), serde_json::json!(import.is_star));

        entities.push(Entity {
            id: entity_id.clone(),
            project_id: project_id.to_string(),
            kind: EntityKind::Import,
            name: display_name,
            file_path: file_path.to_string(),
            start_line: import.line,
            end_line: import.line,
            language,
            signature: None,
            docstring: None,
            body: None,
            metadata,
        });
        relationships.push(Relationship::new(file_entity_id.clone(), entity_id.clone(), RelationshipKind::Defines));
        // Default target is the external module node; enrichment redirects
        // this to an internal file when the import resolves (§4.2).
        relationships.push(Relationship::new(
            file_entity_id.clone(),
            external_module_id(&import.module),
            RelationshipKind::Imports,
        ));
        resolvable_imports.push(ResolvableImport { raw: import, entity_id });
    }

    let result = ParseResult {
        entities,
        relationships,
        errors,
        parse_duration: started.elapsed(),
    };

    ParseOutput {
        result,
        file_imports: FileImports { file_entity_id, imports: resolvable_imports },
    }
}

fn resolve_in_file_references(entities: &[Entity], references: &[RawReference], relationships: &mut Vec<Relationship>) {
    let by_name: std::collections::HashMap<&str, &Entity> = entities
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Function | EntityKind::Class))
        .map(|e| (e.name.as_str(), e))
        .collect();

    for reference in references {
        if reference.kind != ReferenceKind::Call {
            continue;
        }
        let Some(&target) = by_name.get(reference.to_name.as_str()) else { continue };
        let Some(source) = resolve_scope(entities, &reference.from_entity) else { continue };
        if source.id == target.id {
            continue;
        }
        relationships.push(Relationship::new(source.id.clone(), target.id.clone(), RelationshipKind::Calls));
    }
}

fn resolve_inheritance(entities: &[Entity], base_classes: &[(String, Vec<String>)], relationships: &mut Vec<Relationship>) {
    let by_name: std::collections::HashMap<&str, &Entity> =
        entities.iter().filter(|e| e.kind == EntityKind::Class).map(|e| (e.name.as_str(), e)).collect();

    for (class_name, bases) in base_classes {
        let Some(&source) = by_name.get(class_name.as_str()) else { continue };
        for base in bases {
            if let Some(&target) = by_name.get(base.as_str()) {
                relationships.push(Relationship::new(source.id.clone(), target.id.clone(), RelationshipKind::Extends));
            }
        }
    }
}

fn resolve_scope<'a>(entities: &'a [Entity], scope: &str) -> Option<&'a Entity> {
    if scope == "<module>" {
        return entities.iter().find(|e| e.kind == EntityKind::File);
    }
    // scope is either `name` or `Class.name`; the lookup just needs the
    // tail function/method name since entity names are unique within file
    // after disambiguation.
    let name = scope.rsplit('.').next().unwrap_or(scope);
    entities.iter().find(|e| e.name == name && matches!(e.kind, EntityKind::Function))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_function_ingest_matches_scenario_one() {
        let output = parse_file("m.py", "def add(a,b):\n    return a+b\n", "P", None);
        let result = output.result;
        assert_eq!(result.entities.len(), 2);
        let defines = result
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Defines)
            .count();
        assert_eq!(defines, 1);
        let function = result.entities.iter().find(|e| e.kind == EntityKind::Function).unwrap();
        assert!(function.id.starts_with("P_function_add_1_"), "got {}", function.id);
    }

    #[test]
    fn unsupported_extension_yields_single_error() {
        let output = parse_file("m.rb", "puts 1", "P", None);
        assert_eq!(output.result.entities.len(), 0);
        assert_eq!(output.result.errors.len(), 1);
    }

    #[test]
    fn calls_resolve_within_file() {
        let source = "def helper():\n    pass\n\ndef outer():\n    helper()\n";
        let output = parse_file("m.py", source, "P", None);
        assert!(output.result.relationships.iter().any(|r| r.kind == RelationshipKind::Calls));
    }
}
