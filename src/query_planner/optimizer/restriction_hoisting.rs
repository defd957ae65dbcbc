//! Hoists node restrictions into conditions.
//!
//! Inline property maps (`(a:Person {name: 'x'})`) and the row restrictions of
//! the table a node is bound to become equality conjuncts of the select that
//! reads the table. In an inner-join select they go to `WHERE`; in a left-join
//! select to the `ON` of the left-joined group, so unmatched rows survive.
//! Predicates are cleared from the arena afterwards.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult},
    logical_expr::{Expr, Literal, PropertyAccess},
    optimizer::optimizer_pass::OptimizerPass,
    plan_ctx::PlanCtx,
    select_tree::{BaseSelect, FromItem, JoinKind, SimpleSelect},
    transformed::Transformed,
    variables::VarId,
};

pub struct RestrictionHoisting;

impl OptimizerPass for RestrictionHoisting {
    fn optimize(
        &self,
        mut tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let mut hoisted = 0;
        {
            let ctx: &PlanCtx = plan_ctx;
            tree.for_each_simple_mut(&mut |select| {
                hoisted += hoist_select(select, ctx)?;
                Ok(())
            })?;
        }

        let nodes: Vec<VarId> = plan_ctx
            .vars()
            .ids()
            .filter(|id| !plan_ctx.vars().predicates(*id).is_empty())
            .collect();
        for id in nodes {
            plan_ctx.vars_mut().take_predicates(id);
        }

        if hoisted > 0 {
            log::info!("RestrictionHoisting: hoisted {} conditions", hoisted);
        }
        Ok(Transformed::from_changed(tree, hoisted > 0))
    }
}

/// Where the conditions of one table item end up.
#[derive(Clone, Copy)]
enum Target {
    Where,
    GroupOn,
}

fn hoist_select(select: &mut SimpleSelect, plan_ctx: &PlanCtx) -> LoweringResult<usize> {
    let mut pending: Vec<(Target, Vec<Expr>)> = vec![];
    for item in &select.from_items {
        pending.push((Target::Where, node_conditions(item, plan_ctx)?));
    }
    let join_target = match select.join_kind {
        JoinKind::Left => Target::GroupOn,
        JoinKind::Inner => Target::Where,
    };
    for join in &select.joins {
        pending.push((join_target, node_conditions(&join.joining_item, plan_ctx)?));
    }

    let mut hoisted = 0;
    for (target, conditions) in pending {
        hoisted += conditions.len();
        let Some(condition) = Expr::and_all(conditions) else {
            continue;
        };
        match target {
            Target::Where => {
                select.where_condition =
                    Some(Expr::conjoin(select.where_condition.take(), condition));
            }
            Target::GroupOn => {
                let join = select
                    .joins
                    .first_mut()
                    .ok_or_else(|| LoweringError::bug("left-joined group has no joins"))?;
                let existing = std::mem::replace(&mut join.condition, Expr::boolean(true));
                join.condition = Expr::and(existing, condition);
            }
        }
    }
    Ok(hoisted)
}

/// `v.key = value` per inline predicate, then `v.column = 'value'` per row
/// restriction of the bound table.
fn node_conditions(item: &FromItem, plan_ctx: &PlanCtx) -> LoweringResult<Vec<Expr>> {
    let (Some(table), [var]) = (&item.source_table_name, item.variables.as_slice()) else {
        return Ok(vec![]);
    };
    if !item.is_native() || !plan_ctx.vars().get(*var)?.is_node() {
        return Ok(vec![]);
    }
    let node = plan_ctx.schema().node_by_table(table).ok_or_else(|| {
        LoweringError::bug(format!("node table {} is not in the mapping", table))
    })?;

    let mut conditions: Vec<Expr> = plan_ctx
        .vars()
        .predicates(*var)
        .iter()
        .map(|predicate| {
            Expr::eq(
                Expr::PropertyAccess(PropertyAccess {
                    base: Box::new(Expr::Variable(*var)),
                    key: predicate.key.clone(),
                }),
                predicate.value.clone(),
            )
        })
        .collect();
    conditions.extend(node.row_restrictions.iter().map(|restriction| {
        Expr::eq(
            Expr::column(*var, table, &restriction.column),
            Expr::Literal(Literal::String(restriction.value.clone())),
        )
    }));
    Ok(conditions)
}

#[cfg(test)]
mod tests {
    use crate::graph_catalog::schema_mapping::testing::{edge, hop, node, social_mapping};
    use crate::graph_catalog::{RowRestriction, SchemaMapping};
    use crate::open_cypher_parser::parse_query;
    use crate::query_planner::errors::LoweringError;
    use crate::query_planner::logical_expr::{Expr, Literal};
    use crate::query_planner::select_tree::{BaseSelect, SimpleSelect};
    use crate::query_planner::{lower, LoweredQuery};

    fn lowered<'s>(schema: &'s SchemaMapping, query: &str) -> LoweredQuery<'s> {
        let ast = parse_query(query).map_err(LoweringError::from).unwrap();
        lower(&ast, schema).unwrap()
    }

    fn stage(lowered: &LoweredQuery<'_>, index: usize) -> SimpleSelect {
        let BaseSelect::Scope(scope) = &lowered.tree else {
            panic!("expected a scope");
        };
        match scope.with_queries[index].subquery.as_ref() {
            BaseSelect::Simple(select) => select.clone(),
            other => panic!("expected a simple stage, got {}", other),
        }
    }

    #[test]
    fn test_inline_predicate_goes_to_where_once() {
        let schema = social_mapping();
        let lowered = lowered(&schema, "MATCH (a:Person {name: 'Ann'}) RETURN a");
        let select = stage(&lowered, 0);
        let Some(Expr::Operator(condition)) = &select.where_condition else {
            panic!("expected a hoisted condition");
        };
        assert!(matches!(&condition.operands[0], Expr::PropertyAccess(p) if p.key == "name"));
        let a = select.from_items[0].variables[0];
        assert!(lowered.vars.predicates(a).is_empty());
    }

    #[test]
    fn test_row_restrictions_are_hoisted() {
        let mut people = node(&["Person"], "parties", &["id"], &[]);
        people.row_restrictions.push(RowRestriction {
            column: "kind".to_string(),
            value: "person".to_string(),
        });
        let schema = SchemaMapping::new(vec![people], vec![]);
        let lowered = lowered(&schema, "MATCH (a:Person) RETURN a");
        let select = stage(&lowered, 0);
        let a = select.from_items[0].variables[0];
        assert_eq!(
            select.where_condition,
            Some(Expr::eq(
                Expr::column(a, "parties", "kind"),
                Expr::Literal(Literal::String("person".to_string()))
            ))
        );
    }

    fn reads_property(expr: &Expr, key: &str) -> bool {
        match expr {
            Expr::PropertyAccess(p) => p.key == key,
            Expr::Operator(op) => op.operands.iter().any(|o| reads_property(o, key)),
            _ => false,
        }
    }

    #[test]
    fn test_optional_node_predicates_go_to_group_condition() {
        let schema = social_mapping();
        let lowered = lowered(
            &schema,
            "MATCH (a:Person) OPTIONAL MATCH (a)-[:WORKS_AT]->(c:Company {name: 'Acme'}) RETURN a, c",
        );
        let select = stage(&lowered, 1);
        assert!(select.where_condition.is_none());
        let c = select.joins[1].joining_item.variables[0];
        assert!(reads_property(&select.joins[0].condition, "name"));
        assert!(select.joins[0].condition.variables().contains(&c));
        assert!(!reads_property(&select.joins[1].condition, "name"));
    }

    #[test]
    fn test_optional_properties_of_bound_node_stay_in_optional_stage() {
        let schema = social_mapping();
        let lowered = lowered(
            &schema,
            "MATCH (a:Person) OPTIONAL MATCH (a {name: 'Ann'})-[:WORKS_AT]->(c:Company) RETURN a, c",
        );
        assert!(stage(&lowered, 0).where_condition.is_none());

        let optional = stage(&lowered, 1);
        assert!(optional.where_condition.is_none());
        assert!(reads_property(&optional.joins[0].condition, "name"));
        let a = optional.from_items[0].variables[0];
        assert!(optional.joins[0].condition.variables().contains(&a));
    }

    #[test]
    fn test_multi_hop_intermediate_tables_take_no_conditions() {
        let schema = SchemaMapping::new(
            vec![
                node(&["Person"], "persons", &["id"], &[]),
                node(&["Team"], "teams", &["id"], &[]),
            ],
            vec![edge(
                "IN",
                vec![hop("persons", "membership", "teams"), hop("teams", "nesting", "teams")],
            )],
        );
        let lowered = lowered(&schema, "MATCH (p:Person)-[:IN]->(t:Team) RETURN t");
        assert!(stage(&lowered, 0).where_condition.is_none());
    }
}
