//! Constant propagation.
//!
//! Aliases of literal-only expressions (`WITH 2 * 3 AS six`) are folded and
//! inlined wherever they are read. `length(p)` of a fixed-length path folds to
//! its hop count. Exports of the alias itself stay, so the stage keeps its
//! shape; the final projection gets the literal under the alias name.

use std::collections::HashMap;

use crate::query_planner::{
    errors::LoweringResult,
    logical_expr::{
        constant_folding::{fold_constants, is_literal_only},
        visitors::map_expression,
        AliasedExpr, Expr, Literal,
    },
    optimizer::optimizer_pass::OptimizerPass,
    plan_ctx::PlanCtx,
    select_tree::BaseSelect,
    transformed::Transformed,
    variables::{VarArena, VarId, VarKind},
};

pub struct ConstantPropagation;

impl OptimizerPass for ConstantPropagation {
    fn optimize(
        &self,
        mut tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let constants = fold_alias_exprs(plan_ctx)?;

        let mut rewrites = 0;
        {
            let vars = plan_ctx.vars();
            tree.for_each_simple_mut(&mut |select| {
                for item in &mut select.exported_items {
                    if matches!(item, Expr::Variable(_)) {
                        continue;
                    }
                    rewrites += rewrite(item, &constants, vars);
                }
                if let Some(condition) = &mut select.where_condition {
                    rewrites += rewrite(condition, &constants, vars);
                }
                for (key, _) in &mut select.order_by {
                    rewrites += rewrite(key, &constants, vars);
                }
                for join in &mut select.joins {
                    rewrites += rewrite(&mut join.condition, &constants, vars);
                }
                Ok(())
            })?;
        }

        if let BaseSelect::Scope(top) = &mut tree {
            for item in &mut top.ret.exported_items {
                let Expr::Variable(var) = item else {
                    continue;
                };
                if let Some(value) = constants.get(var) {
                    *item = Expr::Aliased(AliasedExpr {
                        name: plan_ctx.vars().get(*var)?.name.clone(),
                        expr: Box::new(value.clone()),
                    });
                    rewrites += 1;
                }
            }
        }

        if rewrites > 0 || !constants.is_empty() {
            log::info!(
                "ConstantPropagation: {} constant aliases, {} rewrites",
                constants.len(),
                rewrites
            );
        }
        Ok(Transformed::from_changed(tree, rewrites > 0))
    }
}

/// Folds every alias expression, returning the aliases that became constant.
/// Aliases may read earlier constant aliases, so this runs to a fixpoint.
fn fold_alias_exprs(plan_ctx: &mut PlanCtx) -> LoweringResult<HashMap<VarId, Expr>> {
    let aliases = plan_ctx.vars().alias_ids();
    let mut constants: HashMap<VarId, Expr> = HashMap::new();
    loop {
        let mut updates = vec![];
        for id in &aliases {
            if constants.contains_key(id) {
                continue;
            }
            let Some(expr) = plan_ctx.vars().get(*id)?.alias_expr() else {
                continue;
            };
            let mut folded = expr.clone();
            if rewrite(&mut folded, &constants, plan_ctx.vars()) > 0 || is_literal_only(&folded) {
                let folded = fold_constants(folded);
                updates.push((*id, folded));
            }
        }

        let mut new_constants = 0;
        for (id, folded) in updates {
            if is_literal_only(&folded) && !constants.contains_key(&id) {
                constants.insert(id, folded.clone());
                new_constants += 1;
            }
            plan_ctx.vars_mut().set_alias_expr(id, folded)?;
        }
        if new_constants == 0 {
            return Ok(constants);
        }
    }
}

/// Inlines `constants` and folds `length(p)` in `expr`; returns how many
/// nodes were replaced.
fn rewrite(expr: &mut Expr, constants: &HashMap<VarId, Expr>, vars: &VarArena) -> usize {
    let mut replaced = 0;
    let rewritten = map_expression(std::mem::replace(expr, Expr::Star), &mut |e| match e {
        Expr::Variable(var) => match constants.get(&var) {
            Some(value) => {
                replaced += 1;
                value.clone()
            }
            None => Expr::Variable(var),
        },
        Expr::ScalarFnCall(call) if call.name.eq_ignore_ascii_case("length") => {
            match fixed_path_length(&call.args, vars) {
                Some(hops) => {
                    replaced += 1;
                    Expr::Literal(Literal::Integer(i64::from(hops)))
                }
                None => Expr::ScalarFnCall(call),
            }
        }
        other => other,
    });
    *expr = if replaced > 0 {
        fold_constants(rewritten)
    } else {
        rewritten
    };
    replaced
}

fn fixed_path_length(args: &[Expr], vars: &VarArena) -> Option<u32> {
    let [Expr::Variable(var)] = args else {
        return None;
    };
    match vars.get(vars.resolve_alias(*var)).ok().map(|v| &v.kind) {
        Some(VarKind::Path { fixed_length }) => *fixed_length,
        _ => None,
    }
}
