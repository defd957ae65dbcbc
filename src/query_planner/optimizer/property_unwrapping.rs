//! Property access through map literals.
//!
//! Map values have no column representation, so every `m.key` whose base
//! statically evaluates to a map literal is replaced by the entry it reads:
//!
//! ```text
//! WITH {person: a, n: a.name} AS m RETURN m.person.age, m.n
//!   =>  RETURN a.age, a.name
//! ```
//!
//! Whatever access is left must read a node or relationship; a key missing
//! from a map or a property of a scalar is rejected.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult},
    logical_expr::{
        visitors::{map_expression, walk_expression, ExpressionVisitor},
        Expr, PropertyAccess,
    },
    optimizer::optimizer_pass::OptimizerPass,
    plan_ctx::PlanCtx,
    select_tree::BaseSelect,
    transformed::Transformed,
    variables::{VarArena, VarType},
};

pub struct PropertyUnwrapping;

impl OptimizerPass for PropertyUnwrapping {
    fn optimize(
        &self,
        mut tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let mut unwrapped = 0;

        let mut updates = vec![];
        for id in plan_ctx.vars().alias_ids() {
            let Some(expr) = plan_ctx.vars().get(id)?.alias_expr() else {
                continue;
            };
            let mut expr = expr.clone();
            let count = unwrap_all(&mut expr, plan_ctx.vars())?;
            if count > 0 {
                updates.push((id, expr, count));
            }
        }
        for (id, expr, count) in updates {
            plan_ctx.vars_mut().set_alias_expr(id, expr)?;
            unwrapped += count;
        }

        let vars = plan_ctx.vars();
        tree.for_each_simple_mut(&mut |select| {
            for expr in select.exprs_mut() {
                unwrapped += unwrap_all(expr, vars)?;
            }
            Ok(())
        })?;

        if unwrapped > 0 {
            log::info!("PropertyUnwrapping: unwrapped {} map accesses", unwrapped);
        }
        Ok(Transformed::from_changed(tree, unwrapped > 0))
    }
}

/// Substitutes until nothing changes; every round removes one access level.
fn unwrap_all(expr: &mut Expr, vars: &VarArena) -> LoweringResult<usize> {
    let mut total = 0;
    loop {
        let mut replaced = 0;
        *expr = map_expression(std::mem::replace(expr, Expr::Star), &mut |e| match e {
            Expr::PropertyAccess(access) => {
                match vars.map_entry(&access.base, &access.key, 0) {
                    Some(entry) => {
                        replaced += 1;
                        entry.clone()
                    }
                    None => Expr::PropertyAccess(access),
                }
            }
            other => other,
        });
        if replaced == 0 {
            return check_accesses(expr, vars).map(|()| total);
        }
        total += replaced;
    }
}

fn check_accesses(expr: &Expr, vars: &VarArena) -> LoweringResult<()> {
    let mut checker = AccessChecker { vars, error: None };
    walk_expression(expr, &mut checker);
    match checker.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct AccessChecker<'v> {
    vars: &'v VarArena,
    error: Option<LoweringError>,
}

impl ExpressionVisitor for AccessChecker<'_> {
    fn visit_property_access(&mut self, prop: &PropertyAccess) {
        if self.error.is_some() {
            return;
        }
        self.error = match self.vars.expr_type(&prop.base, 0) {
            VarType::Node | VarType::Relationship => None,
            VarType::Map => Some(LoweringError::invalid(format!(
                "map has no key `{}`",
                prop.key
            ))),
            VarType::Path | VarType::Scalar => Some(LoweringError::invalid(format!(
                "property `{}` is read from a value that is not a node or relationship",
                prop.key
            ))),
        };
    }
}
