//! Cache key builders, grounded on
//! `original_source/backend/src/services/cache_service.py`'s
//! `build_*_key` methods. Key shape is fixed by spec.md §4.7:
//! `query:<op>:project:<pid>:…`, which `QueryCache::invalidate_project`
//! sweeps by substring match.

/// FNV-1a 64-bit hash, the same allocation-free technique
/// `codegraph_core::id::stable_hash` uses (not exported, so reimplemented
/// here rather than adding a hashing crate for one more fixed-width use).
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

pub fn callers_key(project_id: &str, entity_id: &str) -> String {
    format!("query:callers:project:{project_id}:function:{entity_id}")
}

pub fn dependencies_key(project_id: &str, entity_id: &str) -> String {
    format!("query:dependencies:project:{project_id}:function:{entity_id}")
}

pub fn impact_key(project_id: &str, entity_id: &str, max_depth: usize) -> String {
    format!("query:impact:project:{project_id}:function:{entity_id}:depth:{max_depth}")
}

pub fn search_key(project_ids: &[String], query: &str, top_k: usize) -> String {
    let mut sorted = project_ids.to_vec();
    sorted.sort();
    let projects = sorted.join(",");
    let hash = stable_hash(query);
    // The project list is part of every search key, so per-project
    // invalidation still sweeps it even though it is not `:project:<id>:`
    // shaped for a single id; cross-project searches are invalidated on
    // any member project's write, matching the "best-effort" contract.
    format!("query:search:projects:{projects}:project:{first}:query:{hash:016x}:top_k:{top_k}", first = sorted.first().cloned().unwrap_or_default())
}

pub fn graph_key(project_id: &str, filters_fingerprint: &str) -> String {
    format!("query:graph:project:{project_id}:filters:{filters_fingerprint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callers_key_matches_contract_shape() {
        assert_eq!(callers_key("P1", "E1"), "query:callers:project:P1:function:E1");
    }

    #[test]
    fn search_key_is_order_independent_in_project_ids() {
        let a = search_key(&["p2".to_string(), "p1".to_string()], "foo", 10);
        let b = search_key(&["p1".to_string(), "p2".to_string()], "foo", 10);
        assert_eq!(a, b);
    }
}
