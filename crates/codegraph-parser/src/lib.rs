//! Multi-language parsing: CST walk, deterministic ids, relationship
//! resolution, and the project-level enrichment pass (§4.1-§4.2).

pub mod entities;
pub mod enrichment;
pub mod java;
pub mod js_ts;
pub mod languages;
pub mod overload;
pub mod parse;
pub mod python;

pub use parse::{parse_file, FileImports, ParseOutput, ParseResult};

use codegraph_core::EntityKind;

/// Thin wrapper so extraction code (`entities::RawEntity::into_entity`)
/// doesn't need to depend on `codegraph_core::id` directly.
pub(crate) fn id_for(project_id: &str, kind: EntityKind, name: &str, start_line: usize, file_path: &str) -> String {
    codegraph_core::id::entity_id(project_id, kind, name, start_line, file_path)
}
