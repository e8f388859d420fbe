//! Overload disambiguation (§4.1).
//!
//! After extraction, functions sharing `(file_path, name)` within one file
//! are renamed for global uniqueness: parameter-type-qualified when types
//! are recoverable from the signature, otherwise by appended start line.

use crate::entities::RawEntity;
use codegraph_core::EntityKind;
use std::collections::HashMap;

/// Mutates `entities` in place, renaming colliding functions and recording
/// `original_name`/`is_overloaded` in metadata. Classes and variables are
/// left untouched.
pub fn disambiguate(entities: &mut [RawEntity]) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, entity) in entities.iter().enumerate() {
        if entity.kind == EntityKind::Function {
            groups.entry(entity.name.clone()).or_default().push(idx);
        }
    }

    for (original_name, indices) in groups {
        if indices.len() < 2 {
            continue;
        }

        let mut renamed = Vec::with_capacity(indices.len());
        for &idx in &indices {
            let candidate = match entities[idx].signature.as_ref().and_then(|s| s.recoverable_types()) {
                Some(types) if !types.is_empty() => format!("{original_name}({})", types.join(",")),
                _ => format!("{original_name}_L{}", entities[idx].start_line),
            };
            renamed.push((idx, candidate));
        }

        // If the type-qualified name still collides (e.g. two overloads
        // with identical recovered types), fall back to the line suffix.
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (idx, name) in &renamed {
            *seen.entry(name.clone()).or_insert(0) += 1;
            let _ = idx;
        }
        for (idx, name) in renamed {
            let final_name = if seen.get(&name).copied().unwrap_or(0) > 1 {
                format!("{original_name}_L{}", entities[idx].start_line)
            } else {
                name
            };
            entities[idx]
                .metadata
                .insert("original_name".into(), serde_json::json!(original_name));
            entities[idx].metadata.insert("is_overloaded".into(), serde_json::json!(true));
            entities[idx].name = final_name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{RawParam, RawSignature};

    fn func(name: &str, line: usize) -> RawEntity {
        RawEntity::new(EntityKind::Function, name, line, line + 1)
    }

    #[test]
    fn singletons_are_unchanged() {
        let mut entities = vec![func("add", 1)];
        disambiguate(&mut entities);
        assert_eq!(entities[0].name, "add");
        assert!(!entities[0].metadata.contains_key("is_overloaded"));
    }

    #[test]
    fn untyped_collisions_get_line_suffix() {
        let mut entities = vec![func("process", 1), func("process", 5)];
        disambiguate(&mut entities);
        let names: Vec<_> = entities.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["process_L1", "process_L5"]);
        for e in &entities {
            assert_eq!(e.metadata["original_name"], serde_json::json!("process"));
            assert_eq!(e.metadata["is_overloaded"], serde_json::json!(true));
        }
    }

    #[test]
    fn typed_collisions_use_parameter_types() {
        let mut a = func("process", 1);
        a.signature = Some(RawSignature {
            parameters: vec![RawParam { name: "x".into(), type_annotation: Some("int".into()) }],
            return_type: None,
        });
        let mut b = func("process", 5);
        b.signature = Some(RawSignature {
            parameters: vec![
                RawParam { name: "x".into(), type_annotation: Some("int".into()) },
                RawParam { name: "y".into(), type_annotation: Some("int".into()) },
            ],
            return_type: None,
        });
        let mut entities = vec![a, b];
        disambiguate(&mut entities);
        assert_eq!(entities[0].name, "process(int)");
        assert_eq!(entities[1].name, "process(int,int)");
    }

    #[test]
    fn classes_are_never_disambiguated() {
        let mut entities = vec![
            RawEntity::new(EntityKind::Class, "Dup", 1, 10),
            RawEntity::new(EntityKind::Class, "Dup", 20, 30),
        ];
        disambiguate(&mut entities);
        assert_eq!(entities[0].name, "Dup");
        assert_eq!(entities[1].name, "Dup");
    }
}
