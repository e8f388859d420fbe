//! Deterministic entity identity.
//!
//! `(project_id, entity_kind, sanitized_name, start_line, stable_hash(file_path))`
//! guarantees no cross-file collisions for same-named symbols and stable
//! reattachment on re-ingest, per the data model contract.

use crate::model::EntityKind;

/// FNV-1a 64-bit hash. Chosen over a crate dependency because it is a dozen
/// lines of stable, allocation-free arithmetic — pulling in a hashing crate
/// for this one fixed-width, non-cryptographic use would be the kind of
/// dependency the rest of the workspace doesn't otherwise need.
fn stable_hash(input: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut hash = OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Replace characters that would be awkward in an id with `_`, collapsing
/// runs so `is_overloaded` renames (e.g. `process(int,int)`) stay readable.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build the deterministic id for an entity. `file_path` must already be
/// POSIX-normalized and project-relative.
pub fn entity_id(
    project_id: &str,
    kind: EntityKind,
    name: &str,
    start_line: usize,
    file_path: &str,
) -> String {
    let hash = stable_hash(file_path);
    format!(
        "{project_id}_{kind}_{name}_{start_line}_{hash:016x}",
        kind = kind.as_str(),
        name = sanitize_name(name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = entity_id("P", EntityKind::Function, "add", 1, "m.py");
        let b = entity_id("P", EntityKind::Function, "add", 1, "m.py");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_by_file_path() {
        let a = entity_id("P", EntityKind::Function, "add", 1, "m.py");
        let b = entity_id("P", EntityKind::Function, "add", 1, "other.py");
        assert_ne!(a, b);
    }

    #[test]
    fn matches_scenario_one_prefix() {
        // end-to-end scenario 1: function id starts with `P_function_add_1_`
        let id = entity_id("P", EntityKind::Function, "add", 1, "m.py");
        assert!(id.starts_with("P_function_add_1_"), "got {id}");
    }

    #[test]
    fn sanitize_collapses_separators() {
        assert_eq!(sanitize_name("process(int,int)"), "process_int_int");
        assert_eq!(sanitize_name("add"), "add");
    }
}
