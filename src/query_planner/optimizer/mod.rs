//! Cleanup passes.
//!
//! Run after joins are populated, in this order:
//!
//! ```text
//! 1. RestrictionHoisting  - inline `{k: v}` predicates and row restrictions -> WHERE / ON
//! 2. ConstantPropagation  - inline literal aliases, fold `length(p)`
//! 3. UnusedAliasPruning   - drop WITH exports nothing reads
//! 4. PropertyUnwrapping   - `{k: e}.k` -> `e`
//! 5. AggregateRetargeting - count -> sum above union branches
//! 6. AliasUnwrapping      - only the outermost projection keeps output names
//! ```

use crate::query_planner::{errors::LoweringResult, plan_ctx::PlanCtx, select_tree::BaseSelect};

use aggregate_retargeting::AggregateRetargeting;
use alias_unwrapping::AliasUnwrapping;
use constant_propagation::ConstantPropagation;
use optimizer_pass::OptimizerPass;
use property_unwrapping::PropertyUnwrapping;
use restriction_hoisting::RestrictionHoisting;
use unused_alias_pruning::UnusedAliasPruning;

mod aggregate_retargeting;
mod alias_unwrapping;
mod constant_propagation;
pub mod optimizer_pass;
mod property_unwrapping;
mod restriction_hoisting;
mod unused_alias_pruning;

pub fn optimize(tree: BaseSelect, plan_ctx: &mut PlanCtx) -> LoweringResult<BaseSelect> {
    let passes: [(&str, &dyn OptimizerPass); 6] = [
        ("RestrictionHoisting", &RestrictionHoisting),
        ("ConstantPropagation", &ConstantPropagation),
        ("UnusedAliasPruning", &UnusedAliasPruning),
        ("PropertyUnwrapping", &PropertyUnwrapping),
        ("AggregateRetargeting", &AggregateRetargeting),
        ("AliasUnwrapping", &AliasUnwrapping),
    ];

    let mut tree = tree;
    for (name, pass) in passes {
        let transformed = pass.optimize(tree, plan_ctx)?;
        log::trace!("{}: changed = {}", name, transformed.is_yes());
        tree = transformed.get_plan();
    }
    Ok(tree)
}
