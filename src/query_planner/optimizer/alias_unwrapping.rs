//! Strips display names from nested final projections.
//!
//! Only the outermost `ret` is shown to the client. A `ret` nested in a union
//! branch feeds the outer scope, which reads its unnamed columns by position,
//! so `p.name AS "p.name"` there becomes the bare `p.name`.

use crate::query_planner::{
    errors::LoweringResult, logical_expr::Expr, optimizer::optimizer_pass::OptimizerPass,
    plan_ctx::PlanCtx, select_tree::BaseSelect, transformed::Transformed,
};

pub struct AliasUnwrapping;

impl OptimizerPass for AliasUnwrapping {
    fn optimize(
        &self,
        mut tree: BaseSelect,
        _plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let mut top = matches!(tree, BaseSelect::Scope(_));
        let mut unwrapped = 0;
        tree.for_each_scope_mut(&mut |scope| {
            if std::mem::take(&mut top) {
                return Ok(());
            }
            for item in &mut scope.ret.exported_items {
                if let Expr::Aliased(aliased) = item {
                    let inner = std::mem::replace(aliased.expr.as_mut(), Expr::Star);
                    *item = inner;
                    unwrapped += 1;
                }
            }
            Ok(())
        })?;

        if unwrapped > 0 {
            log::debug!("AliasUnwrapping: unwrapped {} nested exports", unwrapped);
        }
        Ok(Transformed::from_changed(tree, unwrapped > 0))
    }
}

#[cfg(test)]
mod tests {
    use crate::graph_catalog::schema_mapping::testing::ambiguous_mapping;
    use crate::open_cypher_parser::parse_query;
    use crate::query_planner::lower;
    use crate::query_planner::logical_expr::Expr;
    use crate::query_planner::select_tree::{BaseSelect, UnionBranch};

    #[test]
    fn test_only_nested_projections_lose_their_names() {
        let schema = ambiguous_mapping();
        let ast = parse_query("MATCH (p:Person) RETURN p.name").unwrap();
        let lowered = lower(&ast, &schema).unwrap();
        let BaseSelect::Scope(outer) = &lowered.tree else {
            panic!("expected a scope");
        };
        assert!(matches!(&outer.ret.exported_items[0], Expr::Aliased(a) if a.name == "p.name"));

        let BaseSelect::Union(union) = outer.with_queries[0].subquery.as_ref() else {
            panic!("expected a union stage");
        };
        for branch in &union.unions {
            let UnionBranch::Scope(inner) = branch else {
                panic!("expected scope branches");
            };
            assert!(matches!(&inner.ret.exported_items[0], Expr::PropertyAccess(p) if p.key == "name"));
        }
    }
}
