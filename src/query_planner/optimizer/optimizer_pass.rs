//! Optimizer pass trait.
//!
//! Cleanup passes share the analyzer's calling convention: they take the
//! whole tree by value and report whether they changed it.
//!
//! ```ignore
//! impl OptimizerPass for MyPass {
//!     fn optimize(&self, tree: BaseSelect, plan_ctx: &mut PlanCtx)
//!         -> LoweringResult<Transformed<BaseSelect>> {
//!         // rewrite tree here
//!     }
//! }
//! ```

use crate::query_planner::{
    errors::LoweringResult, plan_ctx::PlanCtx, select_tree::BaseSelect, transformed::Transformed,
};

pub trait OptimizerPass {
    fn optimize(
        &self,
        tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>>;
}
