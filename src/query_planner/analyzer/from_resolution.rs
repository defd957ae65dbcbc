//! From-item resolution.
//!
//! Decides, for every stage, which earlier stage supplies each variable it
//! needs. Variables nobody produced yet are native to the stage: node
//! variables get a table-backed from item (bound to a table by schema
//! resolution), relationship, path and alias variables are computed in place.
//!
//! ```text
//! MATCH (a)-->(b)          match_6   FROM a, b (native)
//! MATCH (b)-->(c)          match_22  FROM match_6(a, b), c (native)
//! RETURN a, c              return_32 FROM match_22(a, b, c)
//! ```
//!
//! Stages nobody consumed yet are roots; projections and filters consume
//! every root, so the final `RETURN` always reads from all of them.

use std::collections::HashMap;

use crate::query_planner::{
    errors::{LoweringError, LoweringResult},
    logical_expr::Expr,
    plan_ctx::PlanCtx,
    scope::{ClauseId, ClauseInfo, StageRole},
    select_tree::{BaseSelect, FromItem, ScopeSelect, SimpleSelect},
    transformed::Transformed,
    variables::{VarKind, VarId, VarType},
};

use super::analyzer_pass::AnalyzerPass;

pub struct FromResolution;

#[derive(Debug, Default)]
struct ResolutionState {
    /// Variable -> stage that most recently produced it.
    produced_by: HashMap<VarId, String>,
    stage_vars: HashMap<String, Vec<VarId>>,
    roots: Vec<String>,
}

impl ResolutionState {
    fn produced(&self, stage: &str) -> Vec<VarId> {
        self.stage_vars.get(stage).cloned().unwrap_or_default()
    }

    fn finish(&mut self, stage: String, stage_vars: Vec<VarId>) {
        for var in &stage_vars {
            self.produced_by.insert(*var, stage.clone());
        }
        self.stage_vars.insert(stage.clone(), stage_vars);
        self.roots.push(stage);
    }
}

impl AnalyzerPass for FromResolution {
    fn analyze(
        &self,
        tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>> {
        let BaseSelect::Scope(mut scope) = tree else {
            return Err(LoweringError::bug(
                "from resolution expects the builder's stage chain",
            ));
        };

        let mut state = ResolutionState::default();
        for info in plan_ctx.deps().clauses() {
            let select = stage_mut(&mut scope, info)?;
            resolve_stage(select, info, &mut state, plan_ctx)?;
            log::debug!(
                "FromResolution: {} reads {} item(s), roots now {:?}",
                info.clause,
                select.from_items.len(),
                state.roots
            );
        }
        Ok(Transformed::Yes(BaseSelect::Scope(scope)))
    }
}

fn stage_mut<'t>(scope: &'t mut ScopeSelect, info: &ClauseInfo) -> LoweringResult<&'t mut SimpleSelect> {
    if info.role == StageRole::Return {
        return Ok(&mut scope.ret);
    }
    let name = info.clause.stage_name();
    scope
        .with_queries
        .iter_mut()
        .find(|w| w.subquery_name == name)
        .and_then(|w| match w.subquery.as_mut() {
            BaseSelect::Simple(select) => Some(select),
            _ => None,
        })
        .ok_or_else(|| LoweringError::bug(format!("no stage select named {}", name)))
}

fn push_unique(list: &mut Vec<VarId>, var: VarId) {
    if !list.contains(&var) {
        list.push(var);
    }
}

fn defined_in(plan_ctx: &PlanCtx, var: VarId, clause: ClauseId) -> LoweringResult<bool> {
    Ok(matches!(
        plan_ctx.vars().get(var)?.kind,
        VarKind::Alias { defined_in, .. } if defined_in == clause
    ))
}

/// Used and transitively used variables still visible to the stage. Map
/// aliases computed elsewhere are replaced by the variables they carry.
fn needed_vars(plan_ctx: &PlanCtx, clause: ClauseId) -> LoweringResult<Vec<VarId>> {
    let deps = plan_ctx.deps();
    let vars = plan_ctx.vars();
    let used = deps.used_variables(clause);
    let reachable = deps.reachable_variables(clause);

    let mut needed = vec![];
    for var in deps.used_and_indirect_used_vars(clause) {
        let visible = used.contains(&var) || reachable.is_some_and(|r| r.contains_var(var));
        if !visible {
            continue;
        }
        if vars.var_type(var) != VarType::Map {
            push_unique(&mut needed, var);
            continue;
        }
        if defined_in(plan_ctx, var, clause)? {
            push_unique(&mut needed, var);
        }
        for underlying in vars.underlying_vars(var) {
            push_unique(&mut needed, underlying);
        }
    }
    Ok(needed)
}

fn resolve_stage(
    select: &mut SimpleSelect,
    info: &ClauseInfo,
    state: &mut ResolutionState,
    plan_ctx: &PlanCtx,
) -> LoweringResult<()> {
    let clause = info.clause;
    let name = clause.stage_name();
    let needed = needed_vars(plan_ctx, clause)?;

    let (from_items, stage_vars) = match info.role {
        StageRole::MatchBranch { .. } => resolve_match(&needed, clause, state, plan_ctx)?,
        StageRole::MatchFilter | StageRole::ProjectionFilter => {
            let mut from_items = vec![];
            let mut stage_vars = vec![];
            for root in std::mem::take(&mut state.roots) {
                let produced = state.produced(&root);
                for var in &produced {
                    push_unique(&mut stage_vars, *var);
                }
                from_items.push(FromItem::sourced(&root, produced));
            }
            if let Some(missing) = needed.iter().find(|v| !stage_vars.contains(v)) {
                return Err(LoweringError::bug(format!(
                    "filter {} reads `{}` which no stage produced",
                    clause,
                    plan_ctx.vars().unique_name(*missing)
                )));
            }
            (from_items, stage_vars)
        }
        StageRole::Projection | StageRole::Return => {
            let from_items = consume_roots(&needed, clause, state, plan_ctx)?;
            let mut stage_vars = vec![];
            if info.role == StageRole::Projection {
                for item in &info.projections {
                    if let Some(var) = item.as_variable() {
                        push_unique(&mut stage_vars, var);
                    }
                }
                for var in stage_vars.clone() {
                    if plan_ctx.vars().var_type(var) == VarType::Map {
                        for underlying in plan_ctx.vars().underlying_vars(var) {
                            push_unique(&mut stage_vars, underlying);
                        }
                    }
                }
            }
            (from_items, stage_vars)
        }
    };

    if from_items.is_empty() {
        return Err(LoweringError::invalid(format!(
            "{} does not read from any pattern",
            clause
        )));
    }

    match info.role {
        StageRole::Return => {}
        StageRole::Projection => {
            for var in &stage_vars {
                let export = Expr::Variable(*var);
                if !select.exported_items.contains(&export) {
                    select.exported_items.push(export);
                }
            }
        }
        _ => {
            select.exported_items = stage_vars.iter().map(|v| Expr::Variable(*v)).collect();
        }
    }
    select.from_items = from_items;
    if info.role != StageRole::Return {
        state.finish(name, stage_vars);
    }
    Ok(())
}

fn resolve_match(
    needed: &[VarId],
    clause: ClauseId,
    state: &mut ResolutionState,
    plan_ctx: &PlanCtx,
) -> LoweringResult<(Vec<FromItem>, Vec<VarId>)> {
    let mut from_items: Vec<FromItem> = vec![];
    let mut stage_vars = vec![];

    for var in needed {
        if let Some(producer) = state.produced_by.get(var).cloned() {
            if !from_items
                .iter()
                .any(|item| item.source.as_deref() == Some(producer.as_str()))
            {
                let produced = state.produced(&producer);
                for v in &produced {
                    push_unique(&mut stage_vars, *v);
                }
                log::debug!(
                    "FromResolution: {} sources `{}` from {}",
                    clause,
                    plan_ctx.vars().unique_name(*var),
                    producer
                );
                from_items.push(FromItem::sourced(&producer, produced));
                state.roots.retain(|root| *root != producer);
            }
            continue;
        }

        push_unique(&mut stage_vars, *var);
        match &plan_ctx.vars().get(*var)?.kind {
            VarKind::Node { .. } => from_items.push(FromItem::native(*var)),
            VarKind::Relationship { .. } | VarKind::Path { .. } => {}
            VarKind::Alias { defined_in, .. } if *defined_in == clause => {}
            _ => {
                return Err(LoweringError::bug(format!(
                    "`{}` is used in {} before any stage produced it",
                    plan_ctx.vars().unique_name(*var),
                    clause
                )))
            }
        }
    }
    Ok((from_items, stage_vars))
}

/// One from item per root, carrying the root's variables this stage needs.
fn consume_roots(
    needed: &[VarId],
    clause: ClauseId,
    state: &mut ResolutionState,
    plan_ctx: &PlanCtx,
) -> LoweringResult<Vec<FromItem>> {
    let roots = std::mem::take(&mut state.roots);
    for var in needed {
        match state.produced_by.get(var) {
            Some(producer) if roots.contains(producer) => {}
            Some(producer) => {
                return Err(LoweringError::bug(format!(
                    "`{}` comes from {} which is no longer visible to {}",
                    plan_ctx.vars().unique_name(*var),
                    producer,
                    clause
                )))
            }
            None if defined_in(plan_ctx, *var, clause)? => {}
            None => {
                return Err(LoweringError::bug(format!(
                    "`{}` is used in {} before any stage produced it",
                    plan_ctx.vars().unique_name(*var),
                    clause
                )))
            }
        }
    }

    Ok(roots
        .iter()
        .map(|root| {
            let produced = state
                .produced(root)
                .into_iter()
                .filter(|v| needed.contains(v))
                .collect();
            FromItem::sourced(root, produced)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::schema_mapping::testing::social_mapping;
    use crate::open_cypher_parser::parse_query;
    use crate::query_planner::builder::build_select_tree;
    use crate::query_planner::scope::analyze_dependencies;
    use crate::query_planner::variables::VarArena;

    fn resolve(query: &str) -> LoweringResult<(ScopeSelect, VarArena)> {
        let schema = social_mapping();
        let ast = parse_query(query).map_err(LoweringError::from)?;
        let mut vars = VarArena::new();
        let deps = analyze_dependencies(&ast, &mut vars)?;
        let tree = build_select_tree(&deps)?;
        let mut ctx = PlanCtx::new(&schema, vars, deps);
        let tree = FromResolution.analyze(tree, &mut ctx)?.get_plan();
        let (vars, _, _) = ctx.into_parts();
        match tree {
            BaseSelect::Scope(scope) => Ok((scope, vars)),
            other => panic!("expected a scope, got {}", other),
        }
    }

    fn stage(scope: &ScopeSelect, index: usize) -> &SimpleSelect {
        match scope.with_queries[index].subquery.as_ref() {
            BaseSelect::Simple(s) => s,
            other => panic!("expected a simple stage, got {}", other),
        }
    }

    fn names(vars: &VarArena, ids: &[VarId]) -> Vec<String> {
        ids.iter().map(|v| vars.unique_name(*v).to_string()).collect()
    }

    #[test]
    fn test_single_match_feeds_return() {
        let (scope, vars) = resolve("MATCH (a:Person) RETURN a.name").unwrap();
        assert_eq!(scope.with_queries.len(), 1);
        let matched = stage(&scope, 0);
        assert_eq!(matched.from_items.len(), 1);
        assert!(matched.from_items[0].is_native());

        assert_eq!(scope.ret.from_items.len(), 1);
        let source = &scope.ret.from_items[0];
        assert_eq!(source.source.as_deref(), Some("match_6"));
        assert_eq!(names(&vars, &source.variables), vec!["a_6"]);
    }

    #[test]
    fn test_later_match_sources_shared_variables() {
        let (scope, vars) = resolve("MATCH (a)-->(b) MATCH (b)-->(c) RETURN a, c").unwrap();
        let second = stage(&scope, 1);
        assert_eq!(second.from_items.len(), 2);
        assert_eq!(second.from_items[0].source.as_deref(), Some("match_6"));
        assert_eq!(names(&vars, &second.from_items[0].variables), vec!["a_6", "b_12"]);
        assert!(second.from_items[1].is_native());

        assert_eq!(scope.ret.from_items.len(), 1);
        assert_eq!(scope.ret.from_items[0].source.as_deref(), Some("match_22"));
    }

    #[test]
    fn test_disconnected_matches_are_all_roots() {
        let (scope, _) = resolve("MATCH (a) MATCH (b) RETURN a, b").unwrap();
        let sources: Vec<_> = scope
            .ret
            .from_items
            .iter()
            .map(|f| f.source.clone().unwrap_or_default())
            .collect();
        assert_eq!(sources, vec!["match_6", "match_16"]);
    }

    #[test]
    fn test_unreferenced_root_is_still_read() {
        let (scope, _) = resolve("MATCH (a) MATCH (b) RETURN a").unwrap();
        assert_eq!(scope.ret.from_items.len(), 2);
        assert!(scope.ret.from_items[1].variables.is_empty());
    }

    #[test]
    fn test_map_alias_forwards_its_variables() {
        let (scope, vars) = resolve("MATCH (a) WITH {x: a} AS m RETURN m.x").unwrap();
        let with = stage(&scope, 1);
        assert_eq!(with.exported_items.len(), 2);
        assert_eq!(names(&vars, &scope.ret.from_items[0].variables), vec!["a_6"]);
    }

    #[test]
    fn test_stage_without_input_is_rejected() {
        assert!(matches!(
            resolve("RETURN 1"),
            Err(LoweringError::InvalidExpression(_))
        ));
    }
}
