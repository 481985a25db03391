// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::dag::Params;

/// Separator between a dependency's task id and its output field.
pub const DEPENDENCY_KEY_SEPARATOR: &str = "__";

/// Key under which `field` of dependency `dep_task_id` is injected.
pub fn dependency_key(dep_task_id: &str, field: &str) -> String {
    format!("{}{}{}", dep_task_id, DEPENDENCY_KEY_SEPARATOR, field)
}

/// Merge dependency outputs into a task's params with prefixed keys.
///
/// Each output field of a completed dependency is inserted as
/// `"{dep_task_id}__{field}"`, so two dependencies producing the same field
/// never overwrite each other or the task's own params.
///
/// # Example
///
/// ```rust
/// use serde_json::{json, Map};
/// use the_conductor::utils::merge_params_with_prefixes;
///
/// let mut base = Map::new();
/// base.insert("channel".to_string(), json!("#ops"));
///
/// let mut sweep = Map::new();
/// sweep.insert("summary".to_string(), json!("3 new tickets"));
///
/// let merged = merge_params_with_prefixes(base, [("sweep", &sweep)]);
///
/// assert_eq!(merged["channel"], json!("#ops"));
/// assert_eq!(merged["sweep__summary"], json!("3 new tickets"));
/// ```
pub fn merge_params_with_prefixes<'a, I>(mut base: Params, dependency_outputs: I) -> Params
where
    I: IntoIterator<Item = (&'a str, &'a Params)>,
{
    for (dep_id, output) in dependency_outputs {
        for (field, value) in output {
            base.insert(dependency_key(dep_id, field), value.clone());
        }
    }
    base
}
