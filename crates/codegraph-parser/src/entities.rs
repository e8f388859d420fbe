//! Intermediate per-entity extraction result, independent of the final
//! deterministic id (assigned once the caller knows the project_id).
//!
//! Shape follows `rpg_parser::entities::RawEntity`, generalized to carry
//! the fields the spec's `Entity` needs (docstring, async/generator flags,
//! decorators) that the teacher's version didn't track.

use codegraph_core::{Entity, EntityKind, Language};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct RawParam {
    pub name: String,
    pub type_annotation: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawSignature {
    pub parameters: Vec<RawParam>,
    pub return_type: Option<String>,
}

impl RawSignature {
    pub fn render(&self, name: &str) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| match &p.type_annotation {
                Some(t) => format!("{}: {}", p.name, t),
                None => p.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        match &self.return_type {
            Some(ret) => format!("{name}({params}) -> {ret}"),
            None => format!("{name}({params})"),
        }
    }

    /// Parameter types in declaration order, when every parameter carries an
    /// annotation — used by overload disambiguation.
    pub fn recoverable_types(&self) -> Option<Vec<String>> {
        let mut types = Vec::with_capacity(self.parameters.len());
        for p in &self.parameters {
            types.push(p.type_annotation.clone()?);
        }
        Some(types)
    }
}

#[derive(Debug, Clone)]
pub struct RawEntity {
    pub kind: EntityKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<RawSignature>,
    pub docstring: Option<String>,
    pub body: Option<String>,
    /// For methods: the enclosing class name, used to scope CALLS/EXTENDS
    /// resolution and to build `method:Class.name` style identities.
    pub parent_class: Option<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl RawEntity {
    pub fn new(kind: EntityKind, name: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            kind,
            name: name.into(),
            start_line,
            end_line,
            signature: None,
            docstring: None,
            body: None,
            parent_class: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn rendered_signature(&self) -> Option<String> {
        self.signature.as_ref().map(|s| s.render(&self.name))
    }

    pub fn into_entity(self, project_id: &str, file_path: &str, language: Language) -> Entity {
        let id = crate::id_for(project_id, self.kind, &self.name, self.start_line, file_path);
        let signature = self.rendered_signature();
        Entity {
            id,
            project_id: project_id.to_string(),
            kind: self.kind,
            name: self.name,
            file_path: file_path.to_string(),
            start_line: self.start_line,
            end_line: self.end_line,
            language,
            signature,
            docstring: self.docstring,
            body: self.body.map(|b| Entity::truncate_body(&b)),
            metadata: self.metadata,
        }
    }
}

/// A raw, unresolved reference discovered while walking a function/class
/// body — resolved to an actual `Relationship` by `codegraph_parser::deps`
/// once the full in-file entity set is known.
#[derive(Debug, Clone)]
pub struct RawReference {
    pub from_entity: String,
    pub to_name: String,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Call,
    Extends,
    Implements,
}

#[derive(Debug, Clone)]
pub struct RawImport {
    pub module: String,
    pub symbols: Vec<String>,
    pub alias: Option<String>,
    pub is_star: bool,
    pub line: usize,
}
