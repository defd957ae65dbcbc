//! Drops `WITH` aliases nothing reads.
//!
//! An alias exported by a stage is dead when its only occurrences inside the
//! scope are bare exports of intermediate stages: the defining export and
//! the pass-through exports of filter stages. Dead aliases are removed from
//! every export list and from item of the scope. Distinct and aggregating
//! stages are left alone since dropping a column there changes their rows.

use std::collections::HashSet;

use crate::query_planner::{
    errors::LoweringResult,
    logical_expr::Expr,
    optimizer::optimizer_pass::OptimizerPass,
    plan_ctx::PlanCtx,
    scope::{ClauseId, StageRole},
    select_tree::{BaseSelect, ScopeSelect, SimpleSelect},
    transformed::Transformed,
    variables::{VarArena, VarId, VarKind},
};

pub struct UnusedAliasPruning;

impl OptimizerPass for UnusedAliasPruning {
    fn optimize(
        &self,
        mut tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let mut pruned = 0;
        let ctx: &PlanCtx = plan_ctx;
        tree.for_each_scope_mut(&mut |scope| {
            loop {
                let dead = dead_aliases(scope, ctx);
                if dead.is_empty() {
                    return Ok(());
                }
                for var in dead {
                    log::debug!(
                        "UnusedAliasPruning: dropping `{}`",
                        ctx.vars().unique_name(var)
                    );
                    remove_alias(scope, var);
                    pruned += 1;
                }
            }
        })?;

        if pruned > 0 {
            log::info!("UnusedAliasPruning: pruned {} aliases", pruned);
        }
        Ok(Transformed::from_changed(tree, pruned > 0))
    }
}

fn stage_selects(scope: &ScopeSelect) -> Vec<&SimpleSelect> {
    scope
        .with_queries
        .iter()
        .filter_map(|w| match w.subquery.as_ref() {
            BaseSelect::Simple(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn dead_aliases(scope: &ScopeSelect, plan_ctx: &PlanCtx) -> Vec<VarId> {
    let vars = plan_ctx.vars();
    let stages = stage_selects(scope);

    let mut candidates: Vec<VarId> = vec![];
    let mut pinned: HashSet<VarId> = HashSet::new();
    for stage in &stages {
        let freezes = stage.distinct || stage.aggregates(vars);
        for item in &stage.exported_items {
            let Expr::Variable(var) = item else {
                continue;
            };
            if freezes {
                pinned.insert(*var);
            }
            if is_projected_alias(*var, stage.clause, plan_ctx) && !candidates.contains(var) {
                candidates.push(*var);
            }
        }
    }

    candidates
        .into_iter()
        .filter(|var| !pinned.contains(var) && references(scope, &stages, *var, vars) == 0)
        .collect()
}

fn is_projected_alias(var: VarId, clause: ClauseId, plan_ctx: &PlanCtx) -> bool {
    let defined_here = matches!(
        plan_ctx.vars().get(var).map(|v| &v.kind),
        Ok(VarKind::Alias { defined_in, .. }) if *defined_in == clause
    );
    defined_here && plan_ctx.stage_role(clause) == Some(StageRole::Projection)
}

/// Occurrences of `var` in the scope, not counting bare exports of stages.
fn references(scope: &ScopeSelect, stages: &[&SimpleSelect], var: VarId, vars: &VarArena) -> usize {
    let mut count = 0;
    for stage in stages {
        count += stage
            .exprs()
            .into_iter()
            .filter(|e| **e != Expr::Variable(var))
            .map(|e| e.count_references(var))
            .sum::<usize>();
    }
    count += scope
        .ret
        .exprs()
        .into_iter()
        .map(|e| e.count_references(var))
        .sum::<usize>();
    count += vars
        .alias_ids()
        .into_iter()
        .filter(|alias| *alias != var)
        .filter_map(|alias| vars.get(alias).ok().and_then(|v| v.alias_expr()))
        .map(|e| e.count_references(var))
        .sum::<usize>();
    count
}

fn remove_alias(scope: &mut ScopeSelect, var: VarId) {
    for select in scope.simple_selects_mut() {
        select.exported_items.retain(|item| *item != Expr::Variable(var));
        for item in select.all_from_items_mut() {
            item.variables.retain(|v| *v != var);
        }
    }
}
