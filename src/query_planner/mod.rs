//! Lowering pipeline: AST -> dependency analysis -> select tree -> analyzer
//! passes -> cleanup passes.

use std::collections::BTreeMap;

use crate::config::LoweringConfig;
use crate::graph_catalog::SchemaMapping;
use crate::open_cypher_parser::ast::CypherQuery;

use errors::{LoweringError, LoweringResult};
use plan_ctx::PlanCtx;
use scope::VarDependencies;
use select_tree::BaseSelect;
use variables::{VarArena, VarId};

pub mod analyzer;
pub mod builder;
pub mod errors;
pub mod logical_expr;
pub mod optimizer;
pub mod plan_ctx;
pub mod scope;
pub mod select_tree;
pub mod transformed;
pub mod variables;

/// A schema-resolved select tree together with the variables it refers to.
#[derive(Debug, Clone)]
pub struct LoweredQuery<'s> {
    pub tree: BaseSelect,
    pub vars: VarArena,
    pub dependencies: VarDependencies,
    pub schema: &'s SchemaMapping,
    /// Candidate tables of every node variable.
    pub node_tables: BTreeMap<VarId, Vec<String>>,
}

impl LoweredQuery<'_> {
    pub fn node_tables(&self, var: VarId) -> &[String] {
        self.node_tables
            .get(&self.vars.resolve_alias(var))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub fn lower<'s>(query: &CypherQuery<'_>, schema: &'s SchemaMapping) -> LoweringResult<LoweredQuery<'s>> {
    lower_with_config(query, schema, &LoweringConfig::default())
}

pub fn lower_with_config<'s>(
    query: &CypherQuery<'_>,
    schema: &'s SchemaMapping,
    config: &LoweringConfig,
) -> LoweringResult<LoweredQuery<'s>> {
    run_pipeline(query, schema, config).inspect_err(|err| {
        if err.is_internal() {
            log::error!("lowering failed on an internal error: {}", err);
        } else {
            log::debug!("lowering rejected the query: {}", err);
        }
    })
}

fn run_pipeline<'s>(
    query: &CypherQuery<'_>,
    schema: &'s SchemaMapping,
    config: &LoweringConfig,
) -> LoweringResult<LoweredQuery<'s>> {
    let mut vars = VarArena::new();
    let dependencies = scope::analyze_dependencies(query, &mut vars)?;
    let tree = builder::build_select_tree(&dependencies)?;

    let mut plan_ctx = PlanCtx::new(schema, vars, dependencies)
        .with_max_union_combinations(config.max_union_combinations);
    let tree = analyzer::analyze(tree, &mut plan_ctx)?;
    let tree = optimizer::optimize(tree, &mut plan_ctx)?;

    let (vars, dependencies, node_tables) = plan_ctx.into_parts();
    if tree.simple_selects().iter().any(|s| s.all_from_items().next().is_none()) {
        return Err(LoweringError::bug("lowered tree holds a select without from items"));
    }
    Ok(LoweredQuery {
        tree,
        vars,
        dependencies,
        schema,
        node_tables,
    })
}
