//! Initial, schema-agnostic select tree.
//!
//! Every stage recorded by the dependency analysis becomes one [`SimpleSelect`]:
//! all stages but the final `RETURN` are wrapped into named [`WithSelect`]s of a
//! single [`ScopeSelect`] whose `ret` is the `RETURN` stage. From items stay
//! empty here; they are resolved by the analyzer.

use crate::query_planner::errors::{LoweringError, LoweringResult};
use crate::query_planner::logical_expr::constant_folding::evaluate_constant;
use crate::query_planner::logical_expr::{Expr, Literal};
use crate::query_planner::scope::{ClauseInfo, StageRole, VarDependencies};
use crate::query_planner::select_tree::{
    BaseSelect, JoinKind, ScopeSelect, SimpleSelect, WithSelect,
};

pub fn build_select_tree(deps: &VarDependencies) -> LoweringResult<BaseSelect> {
    let mut with_queries = Vec::with_capacity(deps.clauses().len());
    let mut ret = None;

    for info in deps.clauses() {
        let select = build_stage(info)?;
        if info.role == StageRole::Return {
            ret = Some(select);
        } else {
            with_queries.push(WithSelect::new(info.clause.stage_name(), BaseSelect::Simple(select)));
        }
    }

    let ret = ret.ok_or_else(|| LoweringError::bug("dependency analysis recorded no RETURN stage"))?;
    log::debug!(
        "build_select_tree: {} stages before {}",
        with_queries.len(),
        ret.clause
    );
    Ok(BaseSelect::Scope(ScopeSelect {
        clause: ret.clause,
        with_queries,
        ret,
    }))
}

fn build_stage(info: &ClauseInfo) -> LoweringResult<SimpleSelect> {
    let join_kind = match info.role {
        StageRole::MatchBranch { optional: true } => JoinKind::Left,
        _ => JoinKind::Inner,
    };
    let mut select = SimpleSelect::new(info.clause, join_kind);
    select.exported_items = info.projections.clone();
    select.where_condition = info.where_condition.clone();
    select.distinct = info.distinct;
    select.order_by = info.order_by.clone();
    select.skip = paging_value(info.skip.as_ref(), "SKIP")?;
    select.limit = paging_value(info.limit.as_ref(), "LIMIT")?;
    Ok(select)
}

/// Folds a SKIP/LIMIT expression to a non-negative integer.
fn paging_value(expr: Option<&Expr>, keyword: &str) -> LoweringResult<Option<u64>> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    match evaluate_constant(expr) {
        Some(Literal::Integer(n)) if n >= 0 => Ok(Some(n as u64)),
        Some(other) => Err(LoweringError::invalid(format!(
            "{} must be a non-negative integer, got {}",
            keyword, other
        ))),
        None => Err(LoweringError::invalid(format!(
            "{} must be a constant expression",
            keyword
        ))),
    }
}
