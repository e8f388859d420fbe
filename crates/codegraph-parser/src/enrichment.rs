//! Project-level enrichment (§4.2): runs after every file has been parsed
//! independently, when the full file set is known.
//!
//! Two jobs: guarantee a file entity exists for every input (already
//! satisfied unconditionally by `parse::parse_file`, which always
//! synthesizes one — `ensure_file_entity` below exists for callers that
//! assemble entities from some other source and need the same guarantee);
//! and resolve JS/TS imports against the project's own files, redirecting
//! the default `external:<module>` edge to an internal file match plus a
//! USES edge from the import entity to the resolved symbol.

use crate::parse::ResolvableImport;
use codegraph_core::{Entity, EntityKind, Language, Relationship, RelationshipKind};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One file's parse output, as needed by the cross-file resolution pass.
pub struct ParsedFile {
    pub path: String,
    pub language: Language,
    pub file_entity_id: String,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub imports: Vec<ResolvableImport>,
}

/// `compilerOptions.baseUrl`/`paths` from a `tsconfig.json`, used for alias
/// resolution (§4.2 job 2).
#[derive(Debug, Clone, Default)]
pub struct TsConfig {
    pub base_url: Option<String>,
    pub paths: BTreeMap<String, Vec<String>>,
}

pub fn parse_tsconfig(content: &str) -> Option<TsConfig> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    let compiler = value.get("compilerOptions")?;
    let base_url = compiler.get("baseUrl").and_then(|v| v.as_str()).map(str::to_string);
    let mut paths = BTreeMap::new();
    if let Some(obj) = compiler.get("paths").and_then(|v| v.as_object()) {
        for (alias, targets) in obj {
            if let Some(arr) = targets.as_array() {
                let targets: Vec<String> = arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
                if !targets.is_empty() {
                    paths.insert(alias.clone(), targets);
                }
            }
        }
    }
    Some(TsConfig { base_url, paths })
}

/// Returns a synthesized file entity iff `entities` contains none for
/// `path` yet — the defensive counterpart to `parse::parse_file`'s
/// unconditional synthesis, for callers assembling entities another way.
pub fn ensure_file_entity(entities: &[Entity], project_id: &str, path: &str, content: &str, language: Language) -> Option<Entity> {
    if entities.iter().any(|e| e.kind == EntityKind::File && e.file_path == path) {
        return None;
    }
    let line_count = content.lines().count().max(1);
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    let id = codegraph_core::id::entity_id(project_id, EntityKind::File, &name, 1, path);
    Some(Entity {
        id,
        project_id: project_id.to_string(),
        kind: EntityKind::File,
        name,
        file_path: path.to_string(),
        start_line: 1,
        end_line: line_count,
        language,
        signature: None,
        docstring: None,
        body: None,
        metadata: BTreeMap::new(),
    })
}

/// Resolves JS/TS imports in place: for every import that matches an
/// internal file, the default `external:<module>` IMPORTS edge on that
/// file is replaced with a file→file IMPORTS edge, and resolved named
/// imports get an IMPORT→symbol USES edge. Mutates each file's
/// `relationships`; returns nothing further since all new edges are
/// attached to the owning file.
pub fn resolve_imports(files: &mut [ParsedFile], tsconfig: Option<&TsConfig>) {
    let all_paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();

    let mut file_entity_by_path: HashMap<String, String> = HashMap::new();
    let mut symbol_index: HashMap<String, HashMap<String, String>> = HashMap::new();
    for f in files.iter() {
        file_entity_by_path.insert(f.path.clone(), f.file_entity_id.clone());
        let symbols = symbol_index.entry(f.path.clone()).or_default();
        for e in &f.entities {
            if matches!(e.kind, EntityKind::Function | EntityKind::Class | EntityKind::Variable) {
                symbols.insert(e.name.clone(), e.id.clone());
            }
        }
    }

    for idx in 0..files.len() {
        let (path, language, imports) = {
            let f = &files[idx];
            (f.path.clone(), f.language, f.imports.clone())
        };
        if !matches!(language, Language::Javascript | Language::Typescript) {
            continue;
        }

        let mut new_edges = Vec::new();
        let mut redirected_modules: HashSet<String> = HashSet::new();

        for import in &imports {
            if import.raw.is_star {
                continue;
            }
            let Some(target_path) = resolve_module(&path, &import.raw.module, &all_paths, tsconfig) else { continue };
            let Some(target_file_entity) = file_entity_by_path.get(&target_path) else { continue };

            redirected_modules.insert(import.raw.module.clone());

            let mut edge = Relationship::new(
                files[idx].file_entity_id.clone(),
                target_file_entity.clone(),
                RelationshipKind::Imports,
            );
            edge.metadata.insert("resolution".to_string(), serde_json::json!("file_match"));
            edge.metadata.insert("resolved_from_module".to_string(), serde_json::json!(import.raw.module));
            new_edges.push(edge);

            if let Some(target_symbols) = symbol_index.get(&target_path) {
                for symbol in &import.raw.symbols {
                    if let Some(symbol_id) = target_symbols.get(symbol) {
                        new_edges.push(Relationship::new(import.entity_id.clone(), symbol_id.clone(), RelationshipKind::Uses));
                    }
                }
            }
        }

        let f = &mut files[idx];
        f.relationships.retain(|r| {
            !(r.kind == RelationshipKind::Imports
                && r.source_id == f.file_entity_id
                && r.metadata
                    .get("resolved_from_module")
                    .and_then(|v| v.as_str())
                    .map(|m| redirected_modules.contains(m))
                    .unwrap_or_else(|| {
                        redirected_modules.iter().any(|m| r.target_id == codegraph_core::model::external_module_id(m))
                    }))
        });

        let mut seen: HashSet<(String, String, RelationshipKind)> = f.relationships.iter().map(|r| r.dedup_key()).collect();
        for edge in new_edges {
            if seen.insert(edge.dedup_key()) {
                f.relationships.push(edge);
            }
        }
    }
}

fn resolve_module(importer_path: &str, module: &str, all_paths: &[String], tsconfig: Option<&TsConfig>) -> Option<String> {
    const EXTENSIONS: [&str; 5] = [".ts", ".tsx", ".js", ".jsx", ".py"];
    let path_set: HashSet<&str> = all_paths.iter().map(String::as_str).collect();

    let find = |base: &str| -> Option<String> {
        if path_set.contains(base) {
            return Some(base.to_string());
        }
        for ext in EXTENSIONS {
            let candidate = format!("{base}{ext}");
            if path_set.contains(candidate.as_str()) {
                return Some(candidate);
            }
        }
        for ext in EXTENSIONS {
            let candidate = format!("{base}/index{ext}");
            if path_set.contains(candidate.as_str()) {
                return Some(candidate);
            }
        }
        None
    };

    if module.starts_with('.') {
        let importer_dir = importer_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let joined = normalize_relative(importer_dir, module);
        if let Some(found) = find(&joined) {
            return Some(found);
        }
    }

    if let Some(cfg) = tsconfig {
        for (alias, targets) in &cfg.paths {
            let prefix = alias.trim_end_matches('*');
            if !module.starts_with(prefix) {
                continue;
            }
            let suffix = &module[prefix.len()..];
            for target in targets {
                let target_prefix = target.trim_end_matches('*');
                let base = match &cfg.base_url {
                    Some(base_url) => format!("{}/{}{}", base_url.trim_end_matches('/'), target_prefix.trim_start_matches('/'), suffix),
                    None => format!("{target_prefix}{suffix}"),
                };
                if let Some(found) = find(&base) {
                    return Some(found);
                }
            }
        }
    }

    let stem = module.rsplit('/').next().unwrap_or(module);
    let matches: Vec<&String> = all_paths
        .iter()
        .filter(|p| {
            let file_name = p.rsplit('/').next().unwrap_or(p);
            let file_stem = file_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(file_name);
            file_stem == stem
        })
        .collect();
    if matches.len() == 1 {
        Some(matches[0].clone())
    } else {
        None
    }
}

fn normalize_relative(dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = if dir.is_empty() { Vec::new() } else { dir.split('/').collect() };
    for segment in relative.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::RawImport;

    fn file(path: &str, language: Language, entities: Vec<Entity>, imports: Vec<ResolvableImport>) -> ParsedFile {
        let file_entity_id = format!("file:{path}");
        let mut relationships = vec![];
        for import in &imports {
            relationships.push(Relationship::new(
                file_entity_id.clone(),
                codegraph_core::model::external_module_id(&import.raw.module),
                RelationshipKind::Imports,
            ));
        }
        ParsedFile { path: path.to_string(), language, file_entity_id, entities, relationships, imports }
    }

    fn import(module: &str, symbols: Vec<&str>) -> ResolvableImport {
        ResolvableImport {
            raw: RawImport {
                module: module.to_string(),
                symbols: symbols.into_iter().map(str::to_string).collect(),
                alias: None,
                is_star: false,
                line: 1,
            },
            entity_id: format!("import:{module}"),
        }
    }

    fn symbol_entity(id: &str, name: &str) -> Entity {
        Entity {
            id: id.to_string(),
            project_id: "P".to_string(),
            kind: EntityKind::Function,
            name: name.to_string(),
            file_path: "src/utils/helper.ts".to_string(),
            start_line: 1,
            end_line: 2,
            language: Language::Typescript,
            signature: None,
            docstring: None,
            body: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn scenario_three_resolves_alias_import_to_internal_file_and_symbol() {
        let mut cfg = TsConfig { base_url: Some("src".to_string()), paths: BTreeMap::new() };
        cfg.paths.insert("@app/*".to_string(), vec!["utils/*".to_string()]);

        let main = file(
            "src/main.ts",
            Language::Typescript,
            vec![],
            vec![import("@app/helper", vec!["helper"])],
        );
        let helper = file(
            "src/utils/helper.ts",
            Language::Typescript,
            vec![symbol_entity("helper_id", "helper")],
            vec![],
        );

        let mut files = vec![main, helper];
        resolve_imports(&mut files, Some(&cfg));

        let main = &files[0];
        assert!(main.relationships.iter().any(|r| r.kind == RelationshipKind::Imports && r.target_id == "file:src/utils/helper.ts"));
        assert!(!main
            .relationships
            .iter()
            .any(|r| r.kind == RelationshipKind::Imports && r.target_id.starts_with("external:")));
        assert!(main.relationships.iter().any(|r| r.kind == RelationshipKind::Uses && r.target_id == "helper_id"));
    }

    #[test]
    fn unresolvable_import_keeps_external_edge() {
        let main = file("src/main.ts", Language::Typescript, vec![], vec![import("left-pad", vec![])]);
        let mut files = vec![main];
        resolve_imports(&mut files, None);
        assert!(files[0]
            .relationships
            .iter()
            .any(|r| r.kind == RelationshipKind::Imports && r.target_id == "external:left-pad"));
    }

    #[test]
    fn relative_import_resolves_by_extension_candidate() {
        let main = file("src/main.ts", Language::Typescript, vec![], vec![import("./util", vec![])]);
        let util = file("src/util.ts", Language::Typescript, vec![], vec![]);
        let mut files = vec![main, util];
        resolve_imports(&mut files, None);
        assert!(files[0]
            .relationships
            .iter()
            .any(|r| r.kind == RelationshipKind::Imports && r.target_id == "file:src/util.ts"));
    }
}
