use crate::open_cypher_parser::ast::SortOrder;
use crate::query_planner::{
    logical_expr::Expr,
    select_tree::{BaseJoin, BaseSelect, FromItem, JoinKind, ScopeSelect, SimpleSelect, UnionBranch, UnionSelect},
    variables::VarType,
};

use super::errors::{RenderError, RenderResult};
use super::render_context::{quote_ident, RenderContext, SelectContext};
use super::render_expr::render_expr;

/// Convert a select tree node to SQL
pub trait ToSql {
    fn to_sql(&self, ctx: RenderContext<'_>) -> RenderResult<String>;
}

impl ToSql for BaseSelect {
    fn to_sql(&self, ctx: RenderContext<'_>) -> RenderResult<String> {
        match self {
            BaseSelect::Simple(select) => select.to_sql(ctx),
            BaseSelect::Scope(scope) => scope.to_sql(ctx),
            BaseSelect::Union(union) => union.to_sql(ctx),
        }
    }
}

impl ToSql for ScopeSelect {
    fn to_sql(&self, ctx: RenderContext<'_>) -> RenderResult<String> {
        let mut ctes = Vec::with_capacity(self.with_queries.len());
        for with in &self.with_queries {
            ctes.push(format!(
                "{} AS ({})",
                quote_ident(&with.subquery_name),
                with.subquery.to_sql(ctx.nested())?
            ));
        }
        let ret = self.ret.to_sql(ctx)?;
        if ctes.is_empty() {
            return Ok(ret);
        }
        Ok(format!("WITH {} {}", ctes.join(", "), ret))
    }
}

impl ToSql for UnionSelect {
    fn to_sql(&self, ctx: RenderContext<'_>) -> RenderResult<String> {
        let separator = if ctx.config().union_all {
            " UNION ALL "
        } else {
            " UNION "
        };
        let mut branches = Vec::with_capacity(self.unions.len());
        for branch in &self.unions {
            let sql = match branch {
                UnionBranch::Simple(select) => select.to_sql(ctx)?,
                UnionBranch::Scope(scope) => scope.to_sql(ctx)?,
            };
            branches.push(format!("({})", sql));
        }
        Ok(branches.join(separator))
    }
}

/// One output column of a select.
struct OutputColumn {
    sql: String,
    name: String,
    aggregate: bool,
}

impl ToSql for SimpleSelect {
    fn to_sql(&self, ctx: RenderContext<'_>) -> RenderResult<String> {
        let Some((first, rest)) = self.from_items.split_first() else {
            return Err(RenderError::EmptyFromClause);
        };
        let sc = SelectContext::new(ctx, self);

        let mut columns = vec![];
        for (index, item) in self.exported_items.iter().enumerate() {
            columns.extend(output_columns(&sc, index, item)?);
        }
        if columns.is_empty() {
            if ctx.is_outermost() {
                return Err(RenderError::invalid("the query returns no columns"));
            }
            columns.push(OutputColumn {
                sql: "1".to_string(),
                name: "__row".to_string(),
                aggregate: false,
            });
        }

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(
            &columns
                .iter()
                .map(|c| format!("{} AS {}", c.sql, quote_ident(&c.name)))
                .collect::<Vec<_>>()
                .join(", "),
        );

        sql.push_str(" FROM ");
        sql.push_str(&from_item_sql(&sc, first)?);
        for item in rest {
            sql.push_str(" CROSS JOIN ");
            sql.push_str(&from_item_sql(&sc, item)?);
        }
        match self.join_kind {
            JoinKind::Inner => {
                for join in &self.joins {
                    sql.push_str(&inner_join_sql(&sc, join)?);
                }
            }
            JoinKind::Left => {
                if let Some((head, rest)) = self.joins.split_first() {
                    let mut group = from_item_sql(&sc, &head.joining_item)?;
                    for join in rest {
                        group.push_str(&inner_join_sql(&sc, join)?);
                    }
                    if !rest.is_empty() {
                        group = format!("({})", group);
                    }
                    sql.push_str(&format!(
                        " LEFT JOIN {} ON {}",
                        group,
                        render_expr(&head.condition, &sc)?
                    ));
                }
            }
        }

        if let Some(condition) = &self.where_condition {
            sql.push_str(" WHERE ");
            sql.push_str(&render_expr(condition, &sc)?);
        }

        if columns.iter().any(|c| c.aggregate) {
            let keys: Vec<String> = columns
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.aggregate)
                .map(|(i, _)| (i + 1).to_string())
                .collect();
            if !keys.is_empty() {
                sql.push_str(" GROUP BY ");
                sql.push_str(&keys.join(", "));
            }
        }

        if !self.order_by.is_empty() {
            let mut keys = Vec::with_capacity(self.order_by.len());
            for (key, order) in &self.order_by {
                let direction = match order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                keys.push(format!("{} {}", render_expr(key, &sc)?, direction));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(skip) = self.skip {
            sql.push_str(&format!(" OFFSET {}", skip));
        }
        Ok(sql)
    }
}

fn inner_join_sql(sc: &SelectContext<'_>, join: &BaseJoin) -> RenderResult<String> {
    Ok(format!(
        " JOIN {} ON {}",
        from_item_sql(sc, &join.joining_item)?,
        render_expr(&join.condition, sc)?
    ))
}

fn from_item_sql(sc: &SelectContext<'_>, item: &FromItem) -> RenderResult<String> {
    if let Some(source) = &item.source {
        return Ok(quote_ident(source));
    }
    let var = item
        .variables
        .first()
        .ok_or_else(|| RenderError::invalid("a table item binds no variable"))?;
    let alias = &sc.ctx.var(*var)?.unique_name;
    let table = item
        .source_table_name
        .as_deref()
        .ok_or_else(|| RenderError::UnknownTable(alias.clone()))?;
    Ok(format!("{} AS {}", quote_ident(table), quote_ident(alias)))
}

/// Columns an export expands into. Nodes and relationships expand into their
/// slots; the outermost projection leaves out physical join keys.
fn output_columns(
    sc: &SelectContext<'_>,
    index: usize,
    item: &Expr,
) -> RenderResult<Vec<OutputColumn>> {
    let ctx = sc.ctx;
    match item {
        Expr::Variable(var) => match sc.var_type(*var) {
            VarType::Node | VarType::Relationship => {
                let mut columns = vec![];
                for slot in ctx.slots(*var) {
                    if ctx.is_outermost() && slot.is_physical() {
                        continue;
                    }
                    columns.push(OutputColumn {
                        sql: sc.slot_sql(*var, slot)?,
                        name: ctx.export_column(*var, Some(slot))?,
                        aggregate: false,
                    });
                }
                if columns.is_empty() && ctx.is_outermost() {
                    return Err(RenderError::invalid(format!(
                        "relationship `{}` is returned but none of its properties are read",
                        ctx.var(*var)?.name
                    )));
                }
                Ok(columns)
            }
            VarType::Scalar => Ok(vec![OutputColumn {
                sql: sc.scalar_sql(*var)?,
                name: ctx.export_column(*var, None)?,
                aggregate: sc.is_aggregate(item),
            }]),
            VarType::Path | VarType::Map if ctx.is_outermost() => Err(RenderError::invalid(
                format!("`{}` cannot be returned as columns", ctx.var(*var)?.name),
            )),
            VarType::Path | VarType::Map => Ok(vec![]),
        },
        Expr::Aliased(aliased) => Ok(vec![OutputColumn {
            sql: render_expr(&aliased.expr, sc)?,
            name: aliased.name.clone(),
            aggregate: sc.is_aggregate(&aliased.expr),
        }]),
        other => Ok(vec![OutputColumn {
            sql: render_expr(other, sc)?,
            name: format!("_{}", index),
            aggregate: sc.is_aggregate(other),
        }]),
    }
}
