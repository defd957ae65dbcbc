//! Table resolution for node variables.
//!
//! Candidates are computed once per node variable: the tables carrying all of
//! its labels, narrowed to the endpoint tables of the relationships it takes
//! part in. Every stage select holding a table-less native node item is then
//! bound to its candidate; with several candidates the select is replaced by a
//! union of clones, one per combination:
//!
//! ```text
//! MATCH (p:Person)          Person -> employees, customers
//!
//! match_6                   Union
//!   FROM p                    ├── match_6 FROM employees AS p
//!                             └── match_6 FROM customers AS p
//! ```

use std::collections::HashMap;

use crate::open_cypher_parser::ast::Direction;
use crate::query_planner::{
    errors::{LoweringError, LoweringResult},
    plan_ctx::PlanCtx,
    scope::{ClauseId, StageRole},
    select_tree::{BaseSelect, SimpleSelect, UnionBranch, UnionSelect},
    transformed::Transformed,
    variables::{VarId, VarKind},
};

use super::analyzer_pass::AnalyzerPass;

pub struct SchemaResolution;

impl AnalyzerPass for SchemaResolution {
    fn analyze(
        &self,
        tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        infer_candidates(plan_ctx)?;
        check_optional_labels(plan_ctx)?;

        let BaseSelect::Scope(mut scope) = tree else {
            return Err(LoweringError::bug(
                "schema resolution expects the builder's stage chain",
            ));
        };

        let mut forked = 0;
        for with in &mut scope.with_queries {
            let BaseSelect::Simple(select) = with.subquery.as_ref() else {
                continue;
            };
            let resolved = resolve_select(select, plan_ctx)?;
            if let BaseSelect::Union(union) = &resolved {
                log::info!(
                    "SchemaResolution: {} forked into {} branches",
                    with.subquery_name,
                    union.unions.len()
                );
                forked += 1;
            }
            *with.subquery = resolved;
        }
        if scope.ret.all_from_items().any(|f| f.is_native()) {
            return Err(LoweringError::bug("the final stage reads a table directly"));
        }

        Ok(Transformed::from_changed(BaseSelect::Scope(scope), forked > 0))
    }
}

/// First stage using each variable.
fn first_uses(plan_ctx: &PlanCtx) -> HashMap<VarId, ClauseId> {
    let mut first = HashMap::new();
    for info in plan_ctx.deps().clauses() {
        for var in plan_ctx.deps().used_variables(info.clause) {
            first.entry(*var).or_insert(info.clause);
        }
    }
    first
}

/// Candidate tables of every node variable.
///
/// A relationship of an `OPTIONAL MATCH` only narrows the nodes that
/// pattern introduces; nodes bound earlier must keep the rows it fails on.
fn infer_candidates(plan_ctx: &mut PlanCtx) -> LoweringResult<()> {
    let schema = plan_ctx.schema();
    let first = first_uses(plan_ctx);
    let mut resolved = vec![];

    for id in plan_ctx.vars().ids() {
        let VarKind::Node { labels, .. } = &plan_ctx.vars().get(id)?.kind else {
            continue;
        };
        let by_label: Vec<String> = schema
            .tables_for_labels(labels)
            .iter()
            .map(|node| node.table.clone())
            .collect();
        if by_label.is_empty() {
            return Err(LoweringError::NoTableForLabels(labels.clone()));
        }

        let mut narrowed = by_label.clone();
        for info in plan_ctx.deps().clauses() {
            let optional = matches!(info.role, StageRole::MatchBranch { optional: true });
            if optional && first.get(&id) != Some(&info.clause) {
                continue;
            }
            for rel in plan_ctx.deps().relationships(info.clause) {
                let left = plan_ctx.vars().resolve_alias(rel.left);
                let right = plan_ctx.vars().resolve_alias(rel.right);
                for (endpoint, is_left) in [(left, true), (right, false)] {
                    if endpoint != id {
                        continue;
                    }
                    let (as_source, as_destination) = match (rel.direction, is_left) {
                        (Direction::Either, _) => (true, true),
                        (Direction::Outgoing, true) | (Direction::Incoming, false) => (true, false),
                        (Direction::Outgoing, false) | (Direction::Incoming, true) => (false, true),
                    };
                    let allowed = schema.endpoint_tables(&rel.labels, as_source, as_destination);
                    narrowed.retain(|table| allowed.contains(table));
                }
            }
        }

        let tables = if narrowed.is_empty() {
            // no edge fits; join population reports it against the labelled tables
            by_label
        } else {
            narrowed
        };
        log::debug!(
            "SchemaResolution: `{}` may live in {:?}",
            plan_ctx.vars().unique_name(id),
            tables
        );
        resolved.push((id, tables));
    }

    for (id, tables) in resolved {
        plan_ctx.set_node_candidates(id, tables);
    }
    Ok(())
}

/// Labels an `OPTIONAL MATCH` adds to a node bound earlier would have to
/// null-extend the rows whose table lacks them. Only labels every candidate
/// table already carries are accepted.
fn check_optional_labels(plan_ctx: &PlanCtx) -> LoweringResult<()> {
    for info in plan_ctx.deps().clauses() {
        for (var, labels) in plan_ctx.deps().label_checks(info.clause) {
            let node = plan_ctx.vars().resolve_alias(*var);
            let carrying: Vec<&str> = plan_ctx
                .schema()
                .tables_for_labels(labels)
                .into_iter()
                .map(|n| n.table.as_str())
                .collect();
            let lacking: Vec<&String> = plan_ctx
                .node_candidates(node)
                .iter()
                .filter(|table| !carrying.contains(&table.as_str()))
                .collect();
            if !lacking.is_empty() {
                return Err(LoweringError::invalid(format!(
                    "OPTIONAL MATCH labels {:?} on `{}` do not hold for {:?}; \
                     put them on the clause binding it",
                    labels,
                    plan_ctx.vars().get(*var)?.name,
                    lacking
                )));
            }
        }
    }
    Ok(())
}

fn resolve_select(select: &SimpleSelect, plan_ctx: &PlanCtx) -> LoweringResult<BaseSelect> {
    let mut slots: Vec<(usize, &[String])> = vec![];
    for (index, item) in select.from_items.iter().enumerate() {
        if !item.is_native() || item.source_table_name.is_some() || item.variables.len() != 1 {
            continue;
        }
        let var = item.variables[0];
        if !plan_ctx.vars().get(var)?.is_node() {
            continue;
        }
        let tables = plan_ctx.node_candidates(var);
        if tables.is_empty() {
            return Err(LoweringError::bug(format!(
                "no candidate tables computed for `{}`",
                plan_ctx.vars().unique_name(var)
            )));
        }
        slots.push((index, tables));
    }

    let count = slots
        .iter()
        .try_fold(1usize, |acc, (_, tables)| acc.checked_mul(tables.len()))
        .unwrap_or(usize::MAX);
    plan_ctx.check_union_combinations(count)?;

    let mut branches = Vec::with_capacity(count);
    for combination in 0..count {
        let mut branch = select.shallow_clone(true);
        let mut rest = combination;
        for (index, tables) in &slots {
            let pick = rest % tables.len();
            rest /= tables.len();
            branch.from_items[*index].source_table_name = Some(tables[pick].clone());
        }
        branches.push(branch);
    }

    match branches.len() {
        1 => Ok(BaseSelect::Simple(branches.remove(0))),
        _ => Ok(BaseSelect::Union(UnionSelect {
            clause: select.clause,
            unions: branches.into_iter().map(UnionBranch::Simple).collect(),
        })),
    }
}
