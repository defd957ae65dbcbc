//! Lowering context.
//!
//! [`PlanCtx`] is threaded through every analyzer and optimizer pass:
//! - the read-only schema mapping
//! - the variable arena (the only place variables are mutated)
//! - the dependency analysis result, immutable after construction
//! - candidate tables resolved per node variable
//! - the union combination limit

use std::collections::BTreeMap;

use crate::graph_catalog::SchemaMapping;
use crate::query_planner::errors::{LoweringError, LoweringResult};
use crate::query_planner::scope::{ClauseId, StageRole, VarDependencies};
use crate::query_planner::variables::{VarArena, VarId};

pub const DEFAULT_MAX_UNION_COMBINATIONS: usize = 256;

#[derive(Debug, Clone)]
pub struct PlanCtx<'s> {
    schema: &'s SchemaMapping,
    vars: VarArena,
    deps: VarDependencies,
    max_union_combinations: usize,
    /// Node variable -> tables it may be stored in.
    node_candidates: BTreeMap<VarId, Vec<String>>,
}

impl<'s> PlanCtx<'s> {
    pub fn new(schema: &'s SchemaMapping, vars: VarArena, deps: VarDependencies) -> Self {
        PlanCtx {
            schema,
            vars,
            deps,
            max_union_combinations: DEFAULT_MAX_UNION_COMBINATIONS,
            node_candidates: BTreeMap::new(),
        }
    }

    pub fn with_max_union_combinations(mut self, limit: usize) -> Self {
        self.max_union_combinations = limit;
        self
    }

    pub fn schema(&self) -> &'s SchemaMapping {
        self.schema
    }

    pub fn vars(&self) -> &VarArena {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarArena {
        &mut self.vars
    }

    pub fn deps(&self) -> &VarDependencies {
        &self.deps
    }

    pub fn max_union_combinations(&self) -> usize {
        self.max_union_combinations
    }

    /// Fails with `TooManyUnionCombinations` when `count` exceeds the limit.
    pub fn check_union_combinations(&self, count: usize) -> LoweringResult<()> {
        if count > self.max_union_combinations {
            return Err(LoweringError::TooManyUnionCombinations {
                count,
                limit: self.max_union_combinations,
            });
        }
        Ok(())
    }

    pub fn set_node_candidates(&mut self, var: VarId, tables: Vec<String>) {
        self.node_candidates.insert(var, tables);
    }

    pub fn node_candidates(&self, var: VarId) -> &[String] {
        self.node_candidates
            .get(&var)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn stage_role(&self, clause: ClauseId) -> Option<StageRole> {
        self.deps.clause_info(clause).map(|info| info.role)
    }

    pub fn into_parts(self) -> (VarArena, VarDependencies, BTreeMap<VarId, Vec<String>>) {
        (self.vars, self.deps, self.node_candidates)
    }
}
