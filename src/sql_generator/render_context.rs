//! What a select needs to know while it renders: which from item supplies
//! each variable, and under which column name.

use crate::config::LoweringConfig;
use crate::graph_catalog::SchemaMapping;
use crate::query_planner::{
    errors::LoweringError,
    logical_expr::Expr,
    select_tree::{FromItem, SimpleSelect},
    variables::{Var, VarArena, VarId, VarKind, VarType},
    LoweredQuery,
};

use super::column_layout::{ColumnLayout, Slot};
use super::errors::{RenderError, RenderResult};
use super::render_expr::render_expr;

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Tree-wide rendering state. `outermost` is true only for the final
/// projection the client sees.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    lowered: &'a LoweredQuery<'a>,
    layout: &'a ColumnLayout,
    config: &'a LoweringConfig,
    outermost: bool,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        lowered: &'a LoweredQuery<'a>,
        layout: &'a ColumnLayout,
        config: &'a LoweringConfig,
    ) -> Self {
        RenderContext {
            lowered,
            layout,
            config,
            outermost: true,
        }
    }

    pub fn nested(self) -> Self {
        RenderContext {
            outermost: false,
            ..self
        }
    }

    pub fn is_outermost(&self) -> bool {
        self.outermost
    }

    pub fn config(&self) -> &'a LoweringConfig {
        self.config
    }

    pub fn vars(&self) -> &'a VarArena {
        &self.lowered.vars
    }

    pub fn schema(&self) -> &'a SchemaMapping {
        self.lowered.schema
    }

    pub fn var(&self, id: VarId) -> RenderResult<&'a Var> {
        Ok(self.lowered.vars.get(id)?)
    }

    pub fn slots(&self, id: VarId) -> Vec<&'a Slot> {
        self.layout.slots(&self.lowered.vars, id)
    }

    /// Column `var` (or one of its slots) is exported under between stages.
    pub fn nested_column(&self, var: VarId, slot: Option<&Slot>) -> RenderResult<String> {
        let v = self.var(var)?;
        let base = match &v.kind {
            VarKind::Temp { column: Some(column) } => column.as_str(),
            _ => v.unique_name.as_str(),
        };
        Ok(match slot {
            Some(slot) => format!("{}.{}", base, slot.suffix()),
            None => base.to_string(),
        })
    }

    /// Column name the client sees.
    pub fn display_column(&self, var: VarId, slot: Option<&Slot>) -> RenderResult<String> {
        let v = self.var(var)?;
        Ok(match slot {
            Some(slot) => format!("{}.{}", v.name, slot.suffix()),
            None => v.name.clone(),
        })
    }

    pub fn export_column(&self, var: VarId, slot: Option<&Slot>) -> RenderResult<String> {
        if self.outermost {
            self.display_column(var, slot)
        } else {
            self.nested_column(var, slot)
        }
    }
}

/// Rendering state of one select.
#[derive(Clone, Copy)]
pub struct SelectContext<'a> {
    pub ctx: RenderContext<'a>,
    pub select: &'a SimpleSelect,
}

impl<'a> SelectContext<'a> {
    pub fn new(ctx: RenderContext<'a>, select: &'a SimpleSelect) -> Self {
        SelectContext { ctx, select }
    }

    pub fn supplier(&self, var: VarId) -> Option<&'a FromItem> {
        self.select.supplier_of(var)
    }

    /// Alias expression of `var` when this select computes it.
    fn local_alias(&self, var: VarId) -> RenderResult<Option<&'a Expr>> {
        Ok(match &self.ctx.var(var)?.kind {
            VarKind::Alias { expr, defined_in } if *defined_in == self.select.clause => Some(expr),
            _ => None,
        })
    }

    /// SQL of one slot of a node or relationship variable.
    pub fn slot_sql(&self, var: VarId, slot: &Slot) -> RenderResult<String> {
        let mut current = var;
        for _ in 0..=self.ctx.vars().len() {
            if let Some(item) = self.supplier(current) {
                return match &item.source {
                    Some(source) => Ok(format!(
                        "{}.{}",
                        quote_ident(source),
                        quote_ident(&self.ctx.nested_column(current, Some(slot))?)
                    )),
                    None => self.native_slot(item, current, slot),
                };
            }
            match self.local_alias(current)? {
                Some(Expr::Variable(inner)) => current = *inner,
                Some(_) => {
                    return Err(RenderError::invalid(format!(
                        "`{}` does not evaluate to a node or relationship",
                        self.ctx.var(current)?.name
                    )))
                }
                None => {
                    return Err(RenderError::MissingSubquery(
                        self.ctx.var(current)?.unique_name.clone(),
                    ))
                }
            }
        }
        Err(RenderError::Lowering(LoweringError::bug(format!(
            "alias chain of `{}` does not end",
            self.ctx.var(var)?.unique_name
        ))))
    }

    fn native_slot(&self, item: &FromItem, var: VarId, slot: &Slot) -> RenderResult<String> {
        let v = self.ctx.var(var)?;
        let table = item
            .source_table_name
            .as_deref()
            .ok_or_else(|| RenderError::UnknownTable(v.unique_name.clone()))?;
        let column = match &v.kind {
            VarKind::Node { .. } => {
                let node = self
                    .ctx
                    .schema()
                    .node_by_table(table)
                    .ok_or_else(|| RenderError::UnknownTable(table.to_string()))?;
                match slot {
                    Slot::Id(k) => node.id_columns.get(*k).map(String::as_str),
                    Slot::Property(key) => node.attribute_column(key),
                    Slot::Physical { table: t, column } => (t == table).then_some(column.as_str()),
                }
            }
            _ => match slot {
                Slot::Id(_) => None,
                Slot::Property(key) => Some(key.as_str()),
                Slot::Physical { table: t, column } => (t == table).then_some(column.as_str()),
            },
        };
        Ok(match column {
            Some(column) => format!("{}.{}", quote_ident(&v.unique_name), quote_ident(column)),
            None => "NULL".to_string(),
        })
    }

    /// SQL of a scalar variable.
    pub fn scalar_sql(&self, var: VarId) -> RenderResult<String> {
        if let Some(item) = self.supplier(var) {
            return match &item.source {
                Some(source) => Ok(format!(
                    "{}.{}",
                    quote_ident(source),
                    quote_ident(&self.ctx.nested_column(var, None)?)
                )),
                None => Err(RenderError::invalid(format!(
                    "`{}` names a table, not a value",
                    self.ctx.var(var)?.name
                ))),
            };
        }
        match self.local_alias(var)? {
            Some(expr) => render_expr(expr, self),
            None => Err(RenderError::MissingSubquery(
                self.ctx.var(var)?.unique_name.clone(),
            )),
        }
    }

    /// True when `expr` aggregates in this select, also through aliases it
    /// computes.
    pub fn is_aggregate(&self, expr: &Expr) -> bool {
        self.is_aggregate_at(expr, 0)
    }

    fn is_aggregate_at(&self, expr: &Expr, depth: usize) -> bool {
        if expr.contains_aggregate() {
            return true;
        }
        if depth > self.ctx.vars().len() {
            return false;
        }
        expr.variables().into_iter().any(|var| {
            self.supplier(var).is_none()
                && matches!(
                    self.local_alias(var),
                    Ok(Some(alias)) if self.is_aggregate_at(alias, depth + 1)
                )
        })
    }

    pub fn var_type(&self, var: VarId) -> VarType {
        self.ctx.vars().var_type(var)
    }
}
