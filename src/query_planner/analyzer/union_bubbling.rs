//! Union bubbling.
//!
//! After schema resolution any stage of the chain may be a union. The chain is
//! distributed over those unions so that a union only ever appears as the
//! single stage of an outer scope:
//!
//! ```text
//! Scope                               Scope
//! ├── match_6  = Union(A1, A2)        ├── union_40 = Union
//! ├── match_20 = Union(B1, B2)   =>   │     ├── Scope(match_6 = A1, match_20 = B1, ret)
//! └── ret                             │     ├── Scope(match_6 = A2, match_20 = B1, ret)
//!                                     │     └── ... 4 combinations
//!                                     └── ret forwarding every exported column
//! ```
//!
//! Every clone keeps the original stage names, so from items keep pointing at
//! the sibling stage of their own combination.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult},
    logical_expr::{AggregateFnCall, AliasedExpr, Expr},
    plan_ctx::PlanCtx,
    select_tree::{
        BaseSelect, FromItem, JoinKind, ScopeSelect, SimpleSelect, UnionBranch, UnionSelect,
        WithSelect,
    },
    transformed::Transformed,
    variables::VarId,
};

use super::analyzer_pass::AnalyzerPass;

pub struct UnionBubbling;

impl AnalyzerPass for UnionBubbling {
    fn analyze(
        &self,
        tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let BaseSelect::Scope(scope) = tree else {
            return Err(LoweringError::bug(
                "union bubbling expects the builder's stage chain",
            ));
        };

        let arities: Vec<usize> = scope
            .with_queries
            .iter()
            .map(|with| match with.subquery.as_ref() {
                BaseSelect::Union(union) => union.unions.len(),
                _ => 1,
            })
            .collect();
        let count = arities
            .iter()
            .try_fold(1usize, |acc, arity| acc.checked_mul(*arity))
            .unwrap_or(usize::MAX);
        plan_ctx.check_union_combinations(count)?;
        if count == 1 {
            return Ok(Transformed::No(BaseSelect::Scope(scope)));
        }

        let union_name = format!("union_{}", scope.clause.position);
        let forwarding = forward_return(&scope.ret, &union_name, plan_ctx)?;

        let mut branches = Vec::with_capacity(count);
        for combination in 0..count {
            let mut branch = combination_scope(&scope, &arities, combination)?;
            branch.ret = forwarding.inner_ret.clone();
            validate_sources(&branch)?;
            branches.push(UnionBranch::Scope(branch));
        }
        log::info!(
            "UnionBubbling: distributed {} stages into {} combinations",
            arities.len(),
            count
        );

        Ok(Transformed::Yes(BaseSelect::Scope(ScopeSelect {
            clause: scope.clause,
            with_queries: vec![WithSelect::new(
                union_name,
                BaseSelect::Union(UnionSelect {
                    clause: scope.clause,
                    unions: branches,
                }),
            )],
            ret: forwarding.outer_ret,
        })))
    }
}

/// Picks one branch per unioned stage; `combination` is read in mixed radix
/// over `arities`.
fn combination_scope(
    scope: &ScopeSelect,
    arities: &[usize],
    combination: usize,
) -> LoweringResult<ScopeSelect> {
    let mut rest = combination;
    let mut with_queries = Vec::with_capacity(scope.with_queries.len());
    for (with, arity) in scope.with_queries.iter().zip(arities) {
        let pick = rest % arity;
        rest /= arity;
        let stage = match with.subquery.as_ref() {
            BaseSelect::Union(union) => match union.unions.get(pick) {
                Some(UnionBranch::Simple(select)) => BaseSelect::Simple(select.shallow_clone(true)),
                _ => {
                    return Err(LoweringError::bug(format!(
                        "{} has no simple branch {}",
                        with.subquery_name, pick
                    )))
                }
            },
            other => other.clone(),
        };
        with_queries.push(WithSelect::new(with.subquery_name.clone(), stage));
    }
    Ok(ScopeSelect {
        clause: scope.clause,
        with_queries,
        ret: scope.ret.shallow_clone(true),
    })
}

fn validate_sources(scope: &ScopeSelect) -> LoweringResult<()> {
    for select in scope.simple_selects() {
        for item in select.all_from_items() {
            if let Some(source) = &item.source {
                if scope.stage(source).is_none() {
                    return Err(LoweringError::bug(format!(
                        "{} reads from {} which is not a stage of its combination",
                        select.clause, source
                    )));
                }
            }
        }
    }
    Ok(())
}

struct Forwarding {
    inner_ret: SimpleSelect,
    outer_ret: SimpleSelect,
}

/// Re-aggregates the column of an aggregate computed per branch.
fn recombined(call: &AggregateFnCall, column: Expr) -> LoweringResult<Expr> {
    if call.distinct && matches!(call.name.as_str(), "count" | "sum") {
        return Err(LoweringError::invalid(format!(
            "{}(DISTINCT ...) cannot be recombined across union branches",
            call.name
        )));
    }
    Ok(Expr::AggregateFnCall(AggregateFnCall {
        name: call.name.clone(),
        args: vec![column],
        distinct: false,
    }))
}

fn nested_aggregate() -> LoweringError {
    LoweringError::invalid(
        "an aggregate nested in an expression cannot be recombined across union branches",
    )
}

/// Splits the final stage into the per-combination `ret` (no paging, no
/// ordering) and the outer `ret` reading the union.
fn forward_return(
    ret: &SimpleSelect,
    union_name: &str,
    plan_ctx: &mut PlanCtx,
) -> LoweringResult<Forwarding> {
    let mut inner = ret.shallow_clone(true);
    inner.distinct = false;
    inner.order_by.clear();
    inner.skip = None;
    inner.limit = None;

    let mut outer = SimpleSelect::new(ret.clause, JoinKind::Inner);
    outer.distinct = ret.distinct;
    outer.skip = ret.skip;
    outer.limit = ret.limit;

    let mut forwarded: Vec<VarId> = vec![];
    for (index, item) in ret.exported_items.iter().enumerate() {
        let exported = match item {
            Expr::Variable(var) => {
                if !forwarded.contains(var) {
                    forwarded.push(*var);
                }
                let var_ref = plan_ctx.vars().get(*var)?;
                match var_ref.alias_expr() {
                    Some(Expr::AggregateFnCall(call)) => Expr::Aliased(AliasedExpr {
                        name: var_ref.name.clone(),
                        expr: Box::new(recombined(call, Expr::Variable(*var))?),
                    }),
                    Some(expr) if expr.contains_aggregate() => return Err(nested_aggregate()),
                    _ => Expr::Variable(*var),
                }
            }
            Expr::Aliased(aliased) => {
                let temp = plan_ctx.vars_mut().add_temp(Some(format!("_{}", index)));
                forwarded.push(temp);
                let column = match aliased.expr.as_ref() {
                    Expr::AggregateFnCall(call) => recombined(call, Expr::Variable(temp))?,
                    expr if expr.contains_aggregate() => return Err(nested_aggregate()),
                    _ => Expr::Variable(temp),
                };
                Expr::Aliased(AliasedExpr {
                    name: aliased.name.clone(),
                    expr: Box::new(column),
                })
            }
            other => {
                return Err(LoweringError::bug(format!(
                    "unexpected final projection {:?}",
                    other
                )))
            }
        };
        outer.exported_items.push(exported);
    }

    for (key, order) in &ret.order_by {
        let position = ret
            .exported_items
            .iter()
            .position(|item| item == key || item.unaliased() == key);
        let mapped = match position {
            Some(position) => outer.exported_items[position].unaliased().clone(),
            None => {
                let column = format!("_{}", inner.exported_items.len());
                let temp = plan_ctx.vars_mut().add_temp(Some(column));
                forwarded.push(temp);
                inner.exported_items.push(key.clone());
                match key {
                    Expr::AggregateFnCall(call) => recombined(call, Expr::Variable(temp))?,
                    expr if expr.contains_aggregate() => return Err(nested_aggregate()),
                    _ => Expr::Variable(temp),
                }
            }
        };
        outer.order_by.push((mapped, *order));
    }

    outer.from_items = vec![FromItem::sourced(union_name, forwarded)];
    Ok(Forwarding {
        inner_ret: inner,
        outer_ret: outer,
    })
}
