//! Municipalities embedded in other entities' records.
//!
//! Exports carry no municipality file of their own; every neighborhood,
//! district or street repeats its `municipio` object. Loading the distinct
//! ones first lets references to `codigo_siafi` resolve.

use serde_json::Value;
use std::collections::HashSet;

/// Distinct `municipio` sub-objects carrying a `codigoSIAFI`, in first-seen order.
pub fn extract(records: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.get("municipio"))
        .filter(|m| m.get("codigoSIAFI").is_some_and(|c| !c.is_null()))
        .filter(|m| seen.insert(m.to_string()))
        .cloned()
        .collect()
}
