use crate::query_planner::{
    errors::LoweringResult, plan_ctx::PlanCtx, select_tree::BaseSelect, transformed::Transformed,
};

pub trait AnalyzerPass {
    fn analyze(
        &self,
        tree: BaseSelect,
        plan_ctx: &mut PlanCtx,
    ) -> LoweringResult<Transformed<BaseSelect>>;
}
