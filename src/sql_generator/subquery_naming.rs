//! Final subquery names.
//!
//! Stage names (`match_6`, `union_40`) repeat across union branches. Before
//! rendering every [`WithSelect`] gets `<prefix><n>` from a counter the
//! caller owns, and the from items of its scope are pointed at the new names.
//! Names are handed out in document order, so renaming the same tree with a
//! fresh counter is deterministic. Renaming without resetting the counter
//! keeps counting and yields different names.
//!
//! [`WithSelect`]: crate::query_planner::select_tree::WithSelect

use std::collections::HashMap;

use crate::query_planner::select_tree::{BaseSelect, ScopeSelect, UnionBranch};

pub fn name_subqueries(tree: &mut BaseSelect, prefix: &str, counter: &mut usize) {
    match tree {
        BaseSelect::Simple(_) => {}
        BaseSelect::Scope(scope) => name_scope(scope, prefix, counter),
        BaseSelect::Union(union) => {
            for branch in &mut union.unions {
                if let UnionBranch::Scope(scope) = branch {
                    name_scope(scope, prefix, counter);
                }
            }
        }
    }
}

fn name_scope(scope: &mut ScopeSelect, prefix: &str, counter: &mut usize) {
    let mut renamed: HashMap<String, String> = HashMap::new();
    for with in &mut scope.with_queries {
        *counter += 1;
        let name = format!("{}{}", prefix, counter);
        let old = std::mem::replace(&mut with.subquery_name, name.clone());
        renamed.insert(old, name);
        name_subqueries(&mut with.subquery, prefix, counter);
    }

    for select in scope.simple_selects_mut() {
        for item in select.all_from_items_mut() {
            if let Some(new_name) = item.source.as_ref().and_then(|s| renamed.get(s)) {
                item.source = Some(new_name.clone());
            }
        }
    }
}
