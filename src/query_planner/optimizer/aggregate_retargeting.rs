//! Aggregate retargeting.
//!
//! A scope that reads a union recombines aggregates computed once per branch.
//! Counts of the branches are summed; `sum`, `min` and `max` recombine as
//! themselves. Averages and collections lose information per branch and are
//! rejected.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult},
    logical_expr::{visitors::transform_expression, AggregateFnCall, Expr},
    optimizer::optimizer_pass::OptimizerPass,
    plan_ctx::PlanCtx,
    select_tree::BaseSelect,
    transformed::Transformed,
};

pub struct AggregateRetargeting;

impl OptimizerPass for AggregateRetargeting {
    fn optimize(
        &self,
        mut tree: BaseSelect,
        _plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let mut retargeted = 0;
        tree.for_each_scope_mut(&mut |scope| {
            if scope.is_leaf() {
                return Ok(());
            }
            for select in scope.simple_selects_mut() {
                for expr in select.exprs_mut() {
                    let taken = std::mem::replace(expr, Expr::Star);
                    *expr = transform_expression(taken, &mut |e| match e {
                        Expr::AggregateFnCall(call) => {
                            let (call, changed) = recombining(call)?;
                            if changed {
                                retargeted += 1;
                            }
                            Ok::<_, LoweringError>(Expr::AggregateFnCall(call))
                        }
                        other => Ok(other),
                    })?;
                }
            }
            Ok(())
        })?;

        if retargeted > 0 {
            log::info!("AggregateRetargeting: retargeted {} aggregates", retargeted);
        }
        Ok(Transformed::from_changed(tree, retargeted > 0))
    }
}

/// The aggregate that combines per-branch results of `call`.
fn recombining(mut call: AggregateFnCall) -> LoweringResult<(AggregateFnCall, bool)> {
    match call.name.as_str() {
        "count" => {
            call.name = "sum".to_string();
            Ok((call, true))
        }
        "sum" | "min" | "max" => Ok((call, false)),
        other => Err(LoweringError::invalid(format!(
            "{}() cannot be recombined across union branches",
            other
        ))),
    }
}
