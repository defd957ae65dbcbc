//! Expression Visitor Pattern
//!
//! [`walk_expression`] traverses an [`Expr`] tree pre-order and calls the
//! matching `visit_*` hook of an [`ExpressionVisitor`]. [`transform_expression`]
//! and [`map_expression`] rebuild a tree bottom-up.
//!
//! # Example
//!
//! ```ignore
//! struct PropertyCollector {
//!     keys: Vec<String>,
//! }
//!
//! impl ExpressionVisitor for PropertyCollector {
//!     fn visit_property_access(&mut self, prop: &PropertyAccess) {
//!         self.keys.push(prop.key.clone());
//!     }
//! }
//! ```

use std::convert::Infallible;

use super::{AggregateFnCall, ColumnRef, Expr, PropertyAccess, ScalarFnCall};
use crate::query_planner::variables::VarId;

/// Default implementations do nothing, so visitors only override the hooks
/// they care about.
pub trait ExpressionVisitor {
    fn visit_variable(&mut self, _var: VarId) {}

    fn visit_property_access(&mut self, _prop: &PropertyAccess) {}

    fn visit_column(&mut self, _column: &ColumnRef) {}

    fn visit_scalar_fn(&mut self, _call: &ScalarFnCall) {}

    fn visit_aggregate_fn(&mut self, _call: &AggregateFnCall) {}
}

pub fn walk_expression<V: ExpressionVisitor + ?Sized>(expr: &Expr, visitor: &mut V) {
    match expr {
        Expr::Variable(id) => visitor.visit_variable(*id),
        Expr::Column(column) => visitor.visit_column(column),
        Expr::PropertyAccess(prop) => {
            visitor.visit_property_access(prop);
            walk_expression(&prop.base, visitor);
        }
        Expr::Operator(app) => {
            for operand in &app.operands {
                walk_expression(operand, visitor);
            }
        }
        Expr::List(items) => {
            for item in items {
                walk_expression(item, visitor);
            }
        }
        Expr::Map(entries) => {
            for (_, value) in entries {
                walk_expression(value, visitor);
            }
        }
        Expr::ScalarFnCall(call) => {
            visitor.visit_scalar_fn(call);
            for arg in &call.args {
                walk_expression(arg, visitor);
            }
        }
        Expr::AggregateFnCall(call) => {
            visitor.visit_aggregate_fn(call);
            for arg in &call.args {
                walk_expression(arg, visitor);
            }
        }
        Expr::Case(case) => {
            if let Some(e) = &case.expr {
                walk_expression(e, visitor);
            }
            for (when, then) in &case.when_then {
                walk_expression(when, visitor);
                walk_expression(then, visitor);
            }
            if let Some(e) = &case.else_expr {
                walk_expression(e, visitor);
            }
        }
        Expr::Aliased(aliased) => walk_expression(&aliased.expr, visitor),
        Expr::Literal(_) | Expr::Parameter(_) | Expr::Star => {}
    }
}

/// Rebuilds `expr` bottom-up; `f` receives every node after its children were
/// rebuilt and may replace it.
pub fn transform_expression<E, F>(expr: Expr, f: &mut F) -> Result<Expr, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    let rebuilt = match expr {
        Expr::PropertyAccess(mut prop) => {
            prop.base = Box::new(transform_expression(*prop.base, f)?);
            Expr::PropertyAccess(prop)
        }
        Expr::Operator(mut app) => {
            app.operands = transform_all(app.operands, f)?;
            Expr::Operator(app)
        }
        Expr::List(items) => Expr::List(transform_all(items, f)?),
        Expr::Map(entries) => Expr::Map(
            entries
                .into_iter()
                .map(|(k, v)| Ok((k, transform_expression(v, f)?)))
                .collect::<Result<_, E>>()?,
        ),
        Expr::ScalarFnCall(mut call) => {
            call.args = transform_all(call.args, f)?;
            Expr::ScalarFnCall(call)
        }
        Expr::AggregateFnCall(mut call) => {
            call.args = transform_all(call.args, f)?;
            Expr::AggregateFnCall(call)
        }
        Expr::Case(mut case) => {
            case.expr = match case.expr {
                Some(e) => Some(Box::new(transform_expression(*e, f)?)),
                None => None,
            };
            case.when_then = case
                .when_then
                .into_iter()
                .map(|(w, t)| Ok((transform_expression(w, f)?, transform_expression(t, f)?)))
                .collect::<Result<_, E>>()?;
            case.else_expr = match case.else_expr {
                Some(e) => Some(Box::new(transform_expression(*e, f)?)),
                None => None,
            };
            Expr::Case(case)
        }
        Expr::Aliased(mut aliased) => {
            aliased.expr = Box::new(transform_expression(*aliased.expr, f)?);
            Expr::Aliased(aliased)
        }
        leaf @ (Expr::Literal(_)
        | Expr::Variable(_)
        | Expr::Parameter(_)
        | Expr::Star
        | Expr::Column(_)) => leaf,
    };
    f(rebuilt)
}

fn transform_all<E, F>(exprs: Vec<Expr>, f: &mut F) -> Result<Vec<Expr>, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    exprs
        .into_iter()
        .map(|e| transform_expression(e, f))
        .collect()
}

/// Infallible [`transform_expression`].
pub fn map_expression<F>(expr: Expr, f: &mut F) -> Expr
where
    F: FnMut(Expr) -> Expr,
{
    let result: Result<Expr, Infallible> = transform_expression(expr, &mut |e| Ok(f(e)));
    match result {
        Ok(expr) => expr,
        Err(never) => match never {},
    }
}
