//! # Select tree analysis
//!
//! Turns the builder's stage chain into a tree whose every select reads
//! concrete tables or earlier stages. Passes run in a fixed order, each
//! relying on the previous ones:
//!
//! ```text
//! 1. FromResolution    - wire every stage to the stages producing its inputs
//! 2. SchemaResolution  - bind node variables to tables, fork ambiguous stages
//! 3. UnionBubbling     - lift stage unions into one union of whole queries
//! 4. JoinPopulation    - expand relationships into joins through join tables
//! ```

use crate::query_planner::{errors::LoweringResult, plan_ctx::PlanCtx, select_tree::BaseSelect};

use analyzer_pass::AnalyzerPass;
use from_resolution::FromResolution;
use join_population::JoinPopulation;
use schema_resolution::SchemaResolution;
use union_bubbling::UnionBubbling;

pub mod analyzer_pass;
pub mod from_resolution;
pub mod join_population;
pub mod schema_resolution;
pub mod union_bubbling;

pub fn analyze(tree: BaseSelect, plan_ctx: &mut PlanCtx) -> LoweringResult<BaseSelect> {
    log::debug!("analyze: input tree\n{}", tree);

    let tree = FromResolution.analyze(tree, plan_ctx)?.get_plan();
    let tree = SchemaResolution.analyze(tree, plan_ctx)?.get_plan();
    let tree = UnionBubbling.analyze(tree, plan_ctx)?.get_plan();
    let tree = JoinPopulation.analyze(tree, plan_ctx)?.get_plan();

    log::debug!("analyze: output tree\n{}", tree);
    Ok(tree)
}
