//! Output columns of graph-valued variables.
//!
//! A node or relationship travels between stages as a group of columns, one
//! per slot. Node variables always carry their id slots `__id0..`, whose
//! count is the widest id arity among the node's candidate tables. On top of
//! that a variable carries every property the query reads from it and every
//! physical column a later join condition needs. Slots are keyed by the
//! variable an alias chain resolves to, so `WITH a AS b` exports the same
//! layout under `b`'s name. Every union branch exports the same layout and
//! pads slots its table lacks with `NULL`.

use std::collections::{BTreeMap, BTreeSet};

use crate::query_planner::{
    logical_expr::{
        visitors::{walk_expression, ExpressionVisitor},
        ColumnRef, Expr, PropertyAccess,
    },
    variables::{VarArena, VarId, VarKind, VarType},
    LoweredQuery,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Slot {
    Id(usize),
    Property(String),
    Physical { table: String, column: String },
}

impl Slot {
    /// Column name suffix, e.g. `__id0`, `name`, `#persons.id`.
    pub fn suffix(&self) -> String {
        match self {
            Slot::Id(k) => format!("__id{}", k),
            Slot::Property(key) => key.clone(),
            Slot::Physical { table, column } => format!("#{}.{}", table, column),
        }
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Slot::Physical { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnLayout {
    slots: BTreeMap<VarId, BTreeSet<Slot>>,
}

impl ColumnLayout {
    pub fn compute(lowered: &LoweredQuery<'_>) -> Self {
        let mut layout = ColumnLayout::default();
        for id in lowered.vars.ids() {
            if let Ok(var) = lowered.vars.get(id) {
                if let VarKind::Node { .. } = var.kind {
                    let arity = lowered.schema.id_arity(lowered.node_tables(id));
                    layout
                        .slots
                        .entry(id)
                        .or_default()
                        .extend((0..arity).map(Slot::Id));
                }
            }
        }

        let mut demand = SlotDemand {
            vars: &lowered.vars,
            layout: &mut layout,
        };
        for select in lowered.tree.simple_selects() {
            for expr in select.exprs() {
                walk_expression(expr, &mut demand);
            }
        }
        for alias in lowered.vars.alias_ids() {
            if let Some(expr) = lowered.vars.get(alias).ok().and_then(|v| v.alias_expr()) {
                walk_expression(expr, &mut demand);
            }
        }
        log::debug!("ColumnLayout: {} graph variables laid out", layout.slots.len());
        layout
    }

    /// Slots of `var`, looking through alias chains.
    pub fn slots(&self, vars: &VarArena, var: VarId) -> Vec<&Slot> {
        self.slots
            .get(&vars.resolve_alias(var))
            .map(|slots| slots.iter().collect())
            .unwrap_or_default()
    }
}

struct SlotDemand<'a> {
    vars: &'a VarArena,
    layout: &'a mut ColumnLayout,
}

impl SlotDemand<'_> {
    fn demand(&mut self, var: VarId, slot: Slot) {
        let root = self.vars.resolve_alias(var);
        if matches!(self.vars.var_type(root), VarType::Node | VarType::Relationship) {
            self.layout.slots.entry(root).or_default().insert(slot);
        }
    }
}

impl ExpressionVisitor for SlotDemand<'_> {
    fn visit_property_access(&mut self, prop: &PropertyAccess) {
        if let Expr::Variable(base) = prop.base.as_ref() {
            self.demand(*base, Slot::Property(prop.key.clone()));
        }
    }

    fn visit_column(&mut self, column: &ColumnRef) {
        self.demand(
            column.var,
            Slot::Physical {
                table: column.table.clone(),
                column: column.column.clone(),
            },
        );
    }
}
