//! SQL text from a lowered select tree.
//!
//! Every scope becomes a `WITH` list of named subqueries followed by its
//! final projection; unions become parenthesized branches joined by
//! `UNION ALL`. Names come from [`subquery_naming`], column groups of graph
//! variables from [`column_layout`].

use crate::config::LoweringConfig;
use crate::query_planner::LoweredQuery;

pub mod column_layout;
pub mod errors;
mod function_registry;
pub mod render_context;
mod render_expr;
pub mod subquery_naming;
mod to_sql;

pub use function_registry::get_function_mapping;
pub use to_sql::ToSql;

use column_layout::ColumnLayout;
use errors::RenderResult;
use render_context::RenderContext;

/// Names the subqueries of a copy of the tree and renders it. The naming
/// counter starts over for every call.
pub fn generate_sql(lowered: &LoweredQuery<'_>, config: &LoweringConfig) -> RenderResult<String> {
    let mut tree = lowered.tree.clone();
    let mut counter = 0;
    subquery_naming::name_subqueries(&mut tree, &config.subquery_prefix, &mut counter);
    log::debug!("generate_sql: named {} subqueries", counter);

    let layout = ColumnLayout::compute(lowered);
    let ctx = RenderContext::new(lowered, &layout, config);
    let sql = tree.to_sql(ctx)?;
    log::debug!("generate_sql: {}", sql);
    Ok(sql)
}
