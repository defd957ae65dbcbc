//! Join population.
//!
//! Turns every relationship of a stage into joins through the join table of
//! the single traversal path connecting its endpoint tables:
//!
//! ```text
//! MATCH (a:Person)-[:WORKS_AT]->(c:Company)
//!
//! FROM persons AS a
//! JOIN employment AS __t1 ON a.id = __t1.src_id
//! JOIN companies AS c     ON __t1.dst_id = c.id
//! ```
//!
//! The far endpoint's from item moves into the join list when it can; when it
//! can't (it is the stage's only item, or it was joined already), both
//! conditions go to the join-table join. Multi-hop paths join every
//! intermediate table under a temporary alias.

use crate::graph_catalog::{SchemaMapping, TraversalHop, TraversalPath};
use crate::open_cypher_parser::ast::Direction;
use crate::query_planner::{
    errors::{LoweringError, LoweringResult},
    logical_expr::Expr,
    plan_ctx::PlanCtx,
    scope::Relationship,
    select_tree::{BaseJoin, BaseSelect, FromItem, JoinKind, ScopeSelect, SimpleSelect},
    transformed::Transformed,
    variables::{VarArena, VarId, VarKind},
};

use super::analyzer_pass::AnalyzerPass;

pub struct JoinPopulation;

impl AnalyzerPass for JoinPopulation {
    fn analyze(
        &self,
        mut tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let mut joins_added = 0;
        tree.for_each_scope_mut(&mut |scope| {
            if scope.is_leaf() {
                joins_added += populate_scope(scope, plan_ctx)?;
            }
            Ok(())
        })?;
        if joins_added > 0 {
            log::info!("JoinPopulation: added {} joins", joins_added);
        }
        Ok(Transformed::from_changed(tree, joins_added > 0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    /// Path source is the left endpoint.
    Forward,
    Backward,
    /// Undirected pattern over a self-referencing path: either way round.
    Both,
}

/// Endpoint tables of one relationship, traced before the stage is mutated.
struct PlannedRelationship {
    rel: Relationship,
    left_table: String,
    right_table: String,
}

fn populate_scope(scope: &mut ScopeSelect, plan_ctx: &mut PlanCtx) -> LoweringResult<usize> {
    let mut added = 0;
    for index in 0..scope.with_queries.len() {
        let planned = {
            let BaseSelect::Simple(select) = scope.with_queries[index].subquery.as_ref() else {
                return Err(LoweringError::bug(format!(
                    "stage {} of a leaf scope is not a simple select",
                    scope.with_queries[index].subquery_name
                )));
            };
            plan_stage(scope, select, plan_ctx)?
        };

        let BaseSelect::Simple(select) = scope.with_queries[index].subquery.as_mut() else {
            continue;
        };
        let before = select.joins.len();
        for relationship in planned {
            add_relationship_joins(select, &relationship, plan_ctx)?;
        }
        if select.join_kind == JoinKind::Left {
            finish_left_select(select);
        }
        added += select.joins.len() - before;
    }
    Ok(added)
}

fn plan_stage(
    scope: &ScopeSelect,
    select: &SimpleSelect,
    plan_ctx: &PlanCtx,
) -> LoweringResult<Vec<PlannedRelationship>> {
    plan_ctx
        .deps()
        .relationships(select.clause)
        .iter()
        .map(|rel| {
            Ok(PlannedRelationship {
                rel: rel.clone(),
                left_table: origin_table(scope, select, rel.left, plan_ctx.vars(), 0)?,
                right_table: origin_table(scope, select, rel.right, plan_ctx.vars(), 0)?,
            })
        })
        .collect()
}

/// Table behind `var` as seen from `select`, following from items into
/// earlier stages and aliases defined in the stages they pass through.
pub(crate) fn origin_table(
    scope: &ScopeSelect,
    select: &SimpleSelect,
    var: VarId,
    vars: &VarArena,
    depth: usize,
) -> LoweringResult<String> {
    let untraceable = || {
        LoweringError::bug(format!(
            "cannot trace the table behind `{}` in {}",
            vars.unique_name(var),
            select.clause
        ))
    };
    if depth > vars.len() + scope.with_queries.len() {
        return Err(untraceable());
    }

    if let Some(item) = select.supplier_of(var) {
        return match &item.source {
            None => item.source_table_name.clone().ok_or_else(untraceable),
            Some(stage) => match scope.stage(stage).map(|w| w.subquery.as_ref()) {
                Some(BaseSelect::Simple(source)) => origin_table(scope, source, var, vars, depth + 1),
                _ => Err(untraceable()),
            },
        };
    }

    if let VarKind::Alias { expr, defined_in } = &vars.get(var)?.kind {
        if *defined_in == select.clause {
            let target = match expr {
                Expr::Variable(inner) => Some(*inner),
                Expr::PropertyAccess(access) => vars
                    .map_entry(&access.base, &access.key, 0)
                    .and_then(Expr::as_variable),
                _ => None,
            };
            if let Some(inner) = target {
                return origin_table(scope, select, inner, vars, depth + 1);
            }
        }
    }
    Err(untraceable())
}

fn match_path<'s>(
    schema: &'s SchemaMapping,
    rel: &Relationship,
    left_table: &str,
    right_table: &str,
) -> LoweringResult<(&'s TraversalPath, Orientation)> {
    let mut matches = vec![];
    for edge in schema.edges_for_labels(&rel.labels) {
        for path in &edge.paths {
            let forward = path.source_table() == Some(left_table)
                && path.destination_table() == Some(right_table);
            let backward = path.source_table() == Some(right_table)
                && path.destination_table() == Some(left_table);
            let orientation = match rel.direction {
                Direction::Outgoing => forward.then_some(Orientation::Forward),
                Direction::Incoming => backward.then_some(Orientation::Backward),
                Direction::Either => match (forward, backward) {
                    (true, true) => Some(Orientation::Both),
                    (true, false) => Some(Orientation::Forward),
                    (false, true) => Some(Orientation::Backward),
                    (false, false) => None,
                },
            };
            if let Some(orientation) = orientation {
                matches.push((path, orientation));
            }
        }
    }

    match matches.as_slice() {
        [] => Err(LoweringError::NoEdgeFound(rel.labels.clone())),
        [(path, Orientation::Both)] if path.hops.len() > 1 => {
            Err(LoweringError::AmbiguousEdge(rel.labels.clone()))
        }
        [single] => Ok(*single),
        _ => Err(LoweringError::AmbiguousEdge(rel.labels.clone())),
    }
}

/// `lhs.c1 = rhs.d1 AND lhs.c2 = rhs.d2 ...`
fn equalities(
    lhs: VarId,
    lhs_table: &str,
    lhs_columns: &[String],
    rhs: VarId,
    rhs_table: &str,
    rhs_columns: &[String],
) -> LoweringResult<Expr> {
    if lhs_columns.len() != rhs_columns.len() {
        return Err(LoweringError::bug(format!(
            "column lists of {} and {} differ in length",
            lhs_table, rhs_table
        )));
    }
    Expr::and_all(lhs_columns.iter().zip(rhs_columns).map(|(l, r)| {
        Expr::eq(
            Expr::column(lhs, lhs_table, l),
            Expr::column(rhs, rhs_table, r),
        )
    }))
    .ok_or_else(|| LoweringError::bug(format!("join between {} and {} has no columns", lhs_table, rhs_table)))
}

/// One hop seen from the side the joins start at.
struct Step<'s> {
    near_table: &'s str,
    near_columns: &'s [String],
    join_table: &'s str,
    join_near_columns: &'s [String],
    join_far_columns: &'s [String],
    far_table: &'s str,
    far_columns: &'s [String],
}

impl<'s> Step<'s> {
    fn forward(hop: &'s TraversalHop) -> Self {
        Step {
            near_table: &hop.source_table,
            near_columns: &hop.source_columns,
            join_table: &hop.join_table,
            join_near_columns: &hop.join_table_source_columns,
            join_far_columns: &hop.join_table_destination_columns,
            far_table: &hop.destination_table,
            far_columns: &hop.destination_columns,
        }
    }

    fn backward(hop: &'s TraversalHop) -> Self {
        Step {
            near_table: &hop.destination_table,
            near_columns: &hop.destination_columns,
            join_table: &hop.join_table,
            join_near_columns: &hop.join_table_destination_columns,
            join_far_columns: &hop.join_table_source_columns,
            far_table: &hop.source_table,
            far_columns: &hop.source_columns,
        }
    }
}

/// A from item can become a join when it holds `var`, is not the anchor and
/// is not the last item left. Left selects only move table items.
fn is_movable(select: &SimpleSelect, var: VarId, anchor: VarId) -> bool {
    let Some(item) = select.from_items.iter().find(|f| f.supplies(var)) else {
        return false;
    };
    !item.supplies(anchor)
        && select.from_items.len() > 1
        && (select.join_kind == JoinKind::Inner || item.is_native())
}

fn take_from_item(select: &mut SimpleSelect, var: VarId) -> LoweringResult<FromItem> {
    let position = select
        .from_items
        .iter()
        .position(|f| f.supplies(var))
        .ok_or_else(|| LoweringError::bug("movable from item vanished"))?;
    Ok(select.from_items.remove(position))
}

fn add_relationship_joins(
    select: &mut SimpleSelect,
    planned: &PlannedRelationship,
    plan_ctx: &mut PlanCtx,
) -> LoweringResult<()> {
    let rel = &planned.rel;
    let (path, orientation) = match_path(
        plan_ctx.schema(),
        rel,
        &planned.left_table,
        &planned.right_table,
    )?;
    log::debug!(
        "JoinPopulation: {} {} -> {} through {} hop(s) ({:?})",
        select.clause,
        planned.left_table,
        planned.right_table,
        path.hops.len(),
        orientation
    );

    let (source_var, destination_var) = match orientation {
        Orientation::Backward => (rel.right, rel.left),
        Orientation::Forward | Orientation::Both => (rel.left, rel.right),
    };

    if orientation == Orientation::Both {
        return add_undirected_joins(select, rel, path, plan_ctx);
    }

    let reversed = !is_movable(select, destination_var, source_var)
        && is_movable(select, source_var, destination_var);
    let (near, far) = if reversed {
        (destination_var, source_var)
    } else {
        (source_var, destination_var)
    };
    let steps: Vec<Step<'_>> = if reversed {
        path.hops.iter().rev().map(Step::backward).collect()
    } else {
        path.hops.iter().map(Step::forward).collect()
    };
    let far_movable = is_movable(select, far, near);

    let mut previous = near;
    let last = steps.len().saturating_sub(1);
    for (index, step) in steps.iter().enumerate() {
        let join_var = match rel.rel {
            Some(rel_var) if index == 0 => rel_var,
            _ => plan_ctx.vars_mut().add_temp(None),
        };
        let near_condition = equalities(
            previous,
            step.near_table,
            step.near_columns,
            join_var,
            step.join_table,
            step.join_near_columns,
        )?;
        let far_table_var = if index == last {
            far
        } else {
            plan_ctx.vars_mut().add_temp(None)
        };
        let far_condition = equalities(
            join_var,
            step.join_table,
            step.join_far_columns,
            far_table_var,
            step.far_table,
            step.far_columns,
        )?;
        let join_item = FromItem::table(join_var, step.join_table);

        if index < last {
            select.joins.push(BaseJoin {
                joining_item: join_item,
                condition: near_condition,
            });
            select.joins.push(BaseJoin {
                joining_item: FromItem::table(far_table_var, step.far_table),
                condition: far_condition,
            });
            previous = far_table_var;
        } else if far_movable {
            select.joins.push(BaseJoin {
                joining_item: join_item,
                condition: near_condition,
            });
            let far_item = take_from_item(select, far)?;
            select.joins.push(BaseJoin {
                joining_item: far_item,
                condition: far_condition,
            });
        } else {
            select.joins.push(BaseJoin {
                joining_item: join_item,
                condition: Expr::and(near_condition, far_condition),
            });
        }
    }
    Ok(())
}

/// `(a)-[:R]-(b)` over a path from a table to itself: either endpoint may
/// sit on either end of the join table.
fn add_undirected_joins(
    select: &mut SimpleSelect,
    rel: &Relationship,
    path: &TraversalPath,
    plan_ctx: &mut PlanCtx,
) -> LoweringResult<()> {
    let hop = path
        .hops
        .first()
        .ok_or_else(|| LoweringError::bug("traversal path without hops"))?;
    let (near, far) = if !is_movable(select, rel.right, rel.left) && is_movable(select, rel.left, rel.right) {
        (rel.right, rel.left)
    } else {
        (rel.left, rel.right)
    };
    let join_var = match rel.rel {
        Some(rel_var) => rel_var,
        None => plan_ctx.vars_mut().add_temp(None),
    };
    let forward = Step::forward(hop);
    let backward = Step::backward(hop);

    let near_condition = |step: &Step<'_>| {
        equalities(near, step.near_table, step.near_columns, join_var, step.join_table, step.join_near_columns)
    };
    let far_condition = |step: &Step<'_>| {
        equalities(join_var, step.join_table, step.join_far_columns, far, step.far_table, step.far_columns)
    };
    let forward_near = near_condition(&forward)?;
    let backward_near = near_condition(&backward)?;
    let either_way = Expr::or(
        Expr::and(forward_near.clone(), far_condition(&forward)?),
        Expr::and(backward_near.clone(), far_condition(&backward)?),
    );
    let join_item = FromItem::table(join_var, &hop.join_table);

    if is_movable(select, far, near) {
        select.joins.push(BaseJoin {
            joining_item: join_item,
            condition: Expr::or(forward_near, backward_near),
        });
        let far_item = take_from_item(select, far)?;
        select.joins.push(BaseJoin {
            joining_item: far_item,
            condition: either_way,
        });
    } else {
        select.joins.push(BaseJoin {
            joining_item: join_item,
            condition: either_way,
        });
    }
    Ok(())
}

/// An optional stage left-joins its pattern as one group:
///
/// ```text
/// FROM SUB_1
/// LEFT JOIN (employment AS r JOIN companies AS c ON r.dst_id = c.id)
///        ON SUB_1.a.id = r.src_id AND <WHERE>
/// ```
///
/// The first join's condition is the group's `ON`. Conjuncts of later joins
/// that reach outside the group move there, as does the stage `WHERE`. A
/// stage that reads no earlier stage has nothing to null-extend and keeps
/// inner joins.
fn finish_left_select(select: &mut SimpleSelect) {
    if select.from_items.iter().all(FromItem::is_native) {
        log::debug!(
            "JoinPopulation: {} reads no earlier stage, joining it as a plain match",
            select.clause
        );
        select.join_kind = JoinKind::Inner;
        return;
    }

    let (natives, kept): (Vec<FromItem>, Vec<FromItem>) = std::mem::take(&mut select.from_items)
        .into_iter()
        .partition(FromItem::is_native);
    select.from_items = kept;
    let mut group: Vec<BaseJoin> = natives
        .into_iter()
        .map(|item| BaseJoin {
            joining_item: item,
            condition: Expr::boolean(true),
        })
        .collect();
    group.append(&mut select.joins);

    let mut escaping = vec![];
    let mut inside: Vec<VarId> = vec![];
    for (index, join) in group.iter_mut().enumerate() {
        inside.extend(join.joining_item.variables.iter().copied());
        if index == 0 {
            continue;
        }
        let condition = std::mem::replace(&mut join.condition, Expr::boolean(true));
        let (local, outer): (Vec<Expr>, Vec<Expr>) = condition
            .into_conjuncts()
            .into_iter()
            .partition(|c| c.variables().iter().all(|v| inside.contains(v)));
        join.condition = Expr::and_all(local).unwrap_or_else(|| Expr::boolean(true));
        escaping.extend(outer);
    }

    match group.first_mut() {
        Some(head) => {
            let mut conditions = std::mem::replace(&mut head.condition, Expr::boolean(true))
                .into_conjuncts();
            conditions.retain(|c| *c != Expr::boolean(true));
            conditions.extend(escaping);
            conditions.extend(select.where_condition.take());
            head.condition = Expr::and_all(conditions).unwrap_or_else(|| Expr::boolean(true));
        }
        None => log::debug!("JoinPopulation: {} has nothing to left-join", select.clause),
    }
    select.joins = group;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::schema_mapping::testing::{edge, hop, node, social_mapping};
    use crate::graph_catalog::SchemaMapping;
    use crate::open_cypher_parser::parse_query;
    use crate::query_planner::analyzer::analyze;
    use crate::query_planner::builder::build_select_tree;
    use crate::query_planner::logical_expr::Operator;
    use crate::query_planner::scope::analyze_dependencies;

    fn populate(schema: &SchemaMapping, query: &str) -> LoweringResult<ScopeSelect> {
        let ast = parse_query(query).map_err(LoweringError::from)?;
        let mut vars = VarArena::new();
        let deps = analyze_dependencies(&ast, &mut vars)?;
        let tree = build_select_tree(&deps)?;
        let mut ctx = PlanCtx::new(schema, vars, deps);
        match analyze(tree, &mut ctx)? {
            BaseSelect::Scope(scope) => Ok(scope),
            other => panic!("expected a scope, got {}", other),
        }
    }

    fn first_stage(scope: &ScopeSelect) -> &SimpleSelect {
        match scope.with_queries[0].subquery.as_ref() {
            BaseSelect::Simple(select) => select,
            other => panic!("expected a simple stage, got {}", other),
        }
    }

    fn joined_tables(select: &SimpleSelect) -> Vec<String> {
        select
            .joins
            .iter()
            .filter_map(|j| j.joining_item.source_table_name.clone())
            .collect()
    }

    #[test]
    fn test_directed_relationship_joins_through_join_table() {
        let scope = populate(
            &social_mapping(),
            "MATCH (a:Person)-[:WORKS_AT]->(c:Company) RETURN a",
        )
        .unwrap();
        let select = first_stage(&scope);
        assert_eq!(select.from_items.len(), 1);
        assert_eq!(joined_tables(select), vec!["employment", "companies"]);
    }

    #[test]
    fn test_incoming_relationship() {
        let scope = populate(
            &social_mapping(),
            "MATCH (c:Company)<-[:WORKS_AT]-(a:Person) RETURN c",
        )
        .unwrap();
        let select = first_stage(&scope);
        assert_eq!(select.from_items[0].source_table_name.as_deref(), Some("persons"));
        assert_eq!(joined_tables(select), vec!["employment", "companies"]);
        let Expr::Operator(near) = &select.joins[0].condition else {
            panic!("expected a join condition");
        };
        assert_eq!(
            near.operands[1],
            Expr::column(select.joins[0].joining_item.variables[0], "employment", "src_id")
        );
    }

    #[test]
    fn test_missing_edge_fails() {
        let err = populate(
            &social_mapping(),
            "MATCH (a:Person)-[:WORKS_AT]-(b:City) RETURN a",
        )
        .unwrap_err();
        assert_eq!(err, LoweringError::NoEdgeFound(vec!["WORKS_AT".to_string()]));
    }

    #[test]
    fn test_undirected_self_reference_is_disjunctive() {
        let scope = populate(
            &social_mapping(),
            "MATCH (a:Person)-[:KNOWS]-(b:Person) RETURN b",
        )
        .unwrap();
        let select = first_stage(&scope);
        assert_eq!(select.joins.len(), 2);
        assert!(matches!(
            &select.joins[0].condition,
            Expr::Operator(op) if op.operator == Operator::Or
        ));
    }

    #[test]
    fn test_fixed_length_joins_every_hop() {
        let scope = populate(
            &social_mapping(),
            "MATCH (a:Person)-[:KNOWS*2]->(b:Person) RETURN b",
        )
        .unwrap();
        let select = first_stage(&scope);
        assert_eq!(select.from_items.len(), 1);
        assert_eq!(
            joined_tables(select),
            vec!["knows", "persons", "knows", "persons"]
        );
    }

    #[test]
    fn test_multi_hop_path_uses_intermediate_table() {
        let schema = SchemaMapping::new(
            vec![
                node(&["Person"], "persons", &["id"], &[]),
                node(&["Team"], "teams", &["id"], &[]),
                node(&["Company"], "companies", &["id"], &[]),
            ],
            vec![edge(
                "PART_OF",
                vec![hop("persons", "membership", "teams"), hop("teams", "ownership", "companies")],
            )],
        );
        let scope = populate(&schema, "MATCH (p:Person)-[:PART_OF]->(c:Company) RETURN c").unwrap();
        assert_eq!(
            joined_tables(first_stage(&scope)),
            vec!["membership", "teams", "ownership", "companies"]
        );
    }

    #[test]
    fn test_optional_stage_left_joins_one_group() {
        let scope = populate(
            &social_mapping(),
            "MATCH (a:Person) OPTIONAL MATCH (a)-[r:WORKS_AT]->(c:Company) WHERE c.name = 'x' RETURN a, c",
        )
        .unwrap();
        let BaseSelect::Simple(optional) = scope.with_queries[1].subquery.as_ref() else {
            panic!("expected a simple stage");
        };
        assert_eq!(optional.join_kind, JoinKind::Left);
        assert_eq!(optional.from_items.len(), 1);
        assert!(!optional.from_items[0].is_native());
        assert_eq!(joined_tables(optional), vec!["employment", "companies"]);
        assert!(optional.where_condition.is_none());

        let a = optional.from_items[0].variables[0];
        let r = optional.joins[0].joining_item.variables[0];
        let c = optional.joins[1].joining_item.variables[0];
        let group_on = optional.joins[0].condition.variables();
        assert!(group_on.contains(&a) && group_on.contains(&c), "{:?}", group_on);

        let mut inner = optional.joins[1].condition.variables();
        inner.sort();
        let mut expected = vec![r, c];
        expected.sort();
        assert_eq!(inner, expected);
    }

    #[test]
    fn test_inner_conditions_reaching_outside_the_group_move_to_its_on() {
        let scope = populate(
            &social_mapping(),
            "MATCH (a:Person), (b:Person) OPTIONAL MATCH (a)-[:KNOWS]->(m:Person)-[:KNOWS]->(b) RETURN m",
        )
        .unwrap();
        let optional = scope
            .with_queries
            .iter()
            .find_map(|w| match w.subquery.as_ref() {
                BaseSelect::Simple(s) if s.join_kind == JoinKind::Left => Some(s),
                _ => None,
            })
            .unwrap();
        let mut inside = vec![];
        for join in &optional.joins[1..] {
            inside.extend(join.joining_item.variables.iter().copied());
        }
        inside.extend(optional.joins[0].joining_item.variables.iter().copied());
        for join in &optional.joins[1..] {
            assert!(
                join.condition.variables().iter().all(|v| inside.contains(v)),
                "{:?}",
                join.condition
            );
        }
    }

    #[test]
    fn test_optional_stage_without_earlier_stage_joins_plainly() {
        let scope = populate(
            &social_mapping(),
            "OPTIONAL MATCH (a:Person)-[:WORKS_AT]->(c:Company) RETURN c",
        )
        .unwrap();
        let select = first_stage(&scope);
        assert_eq!(select.join_kind, JoinKind::Inner);
        assert_eq!(joined_tables(select), vec!["employment", "companies"]);
    }

    #[test]
    fn test_two_paths_between_the_same_tables_are_ambiguous() {
        let mut works_at = edge("WORKS_AT", vec![hop("persons", "employment", "companies")]);
        works_at.paths.push(TraversalPath {
            hops: vec![hop("persons", "contracts", "companies")],
        });
        let schema = SchemaMapping::new(
            vec![
                node(&["Person"], "persons", &["id"], &[]),
                node(&["Company"], "companies", &["id"], &[]),
            ],
            vec![
                works_at,
                edge("ADVISES", vec![hop("persons", "advisory", "companies")]),
            ],
        );

        let err = populate(&schema, "MATCH (a:Person)-[:WORKS_AT]->(c:Company) RETURN c").unwrap_err();
        assert_eq!(err, LoweringError::AmbiguousEdge(vec!["WORKS_AT".to_string()]));

        assert!(populate(&schema, "MATCH (a:Person)-[:ADVISES]->(c:Company) RETURN c").is_ok());
    }

    #[test]
    fn test_alternative_labels_over_the_same_tables_are_ambiguous() {
        let schema = SchemaMapping::new(
            vec![
                node(&["Person"], "persons", &["id"], &[]),
                node(&["Company"], "companies", &["id"], &[]),
            ],
            vec![
                edge("WORKS_AT", vec![hop("persons", "employment", "companies")]),
                edge("ADVISES", vec![hop("persons", "advisory", "companies")]),
            ],
        );
        let err = populate(&schema, "MATCH (a:Person)-[:WORKS_AT|ADVISES]->(c:Company) RETURN c")
            .unwrap_err();
        assert_eq!(
            err,
            LoweringError::AmbiguousEdge(vec!["WORKS_AT".to_string(), "ADVISES".to_string()])
        );
    }

    #[test]
    fn test_undirected_multi_hop_self_reference_is_ambiguous() {
        let schema = SchemaMapping::new(
            vec![
                node(&["Person"], "persons", &["id"], &[]),
                node(&["Team"], "teams", &["id"], &[]),
            ],
            vec![edge(
                "TEAMMATE",
                vec![hop("persons", "membership", "teams"), hop("teams", "roster", "persons")],
            )],
        );
        let err = populate(&schema, "MATCH (a:Person)-[:TEAMMATE]-(b:Person) RETURN b").unwrap_err();
        assert_eq!(err, LoweringError::AmbiguousEdge(vec!["TEAMMATE".to_string()]));

        assert!(populate(&schema, "MATCH (a:Person)-[:TEAMMATE]->(b:Person) RETURN b").is_ok());
    }

    #[test]
    fn test_later_stage_traces_tables_through_sources() {
        let scope = populate(
            &social_mapping(),
            "MATCH (a:Person) WITH a AS b MATCH (b)-[:LIVES_IN]->(c:City) RETURN c",
        )
        .unwrap();
        let BaseSelect::Simple(select) = scope.with_queries[2].subquery.as_ref() else {
            panic!("expected a simple stage");
        };
        assert_eq!(joined_tables(select), vec!["residence", "cities"]);
    }
}
