use crate::query_planner::{
    logical_expr::{Case, Expr, Literal, Operator, OperatorApplication},
    variables::VarType,
};

use super::column_layout::Slot;
use super::errors::{RenderError, RenderResult};
use super::function_registry::render_call;
use super::render_context::{quote_literal, SelectContext};

/// Renders `expr` as it reads inside the select of `sc`.
pub fn render_expr(expr: &Expr, sc: &SelectContext<'_>) -> RenderResult<String> {
    match expr {
        Expr::Literal(literal) => Ok(render_literal(literal)),
        Expr::Parameter(name) => Ok(format!("${}", name)),
        Expr::Star => Ok("*".to_string()),
        Expr::Variable(var) => match sc.var_type(*var) {
            // a node compares by its first id column
            VarType::Node => sc.slot_sql(*var, &Slot::Id(0)),
            VarType::Scalar => sc.scalar_sql(*var),
            VarType::Relationship => Err(RenderError::invalid(format!(
                "relationship `{}` can only be read through its properties",
                sc.ctx.var(*var)?.name
            ))),
            VarType::Path => Err(RenderError::invalid(format!(
                "path `{}` has no value outside length() of a fixed-length pattern",
                sc.ctx.var(*var)?.name
            ))),
            VarType::Map => Err(RenderError::invalid(format!(
                "map `{}` can only be read through its keys",
                sc.ctx.var(*var)?.name
            ))),
        },
        Expr::PropertyAccess(prop) => match prop.base.as_ref() {
            Expr::Variable(base)
                if matches!(sc.var_type(*base), VarType::Node | VarType::Relationship) =>
            {
                sc.slot_sql(*base, &Slot::Property(prop.key.clone()))
            }
            _ => Err(RenderError::invalid(format!(
                "property `{}` is read from a value that is not a node or relationship",
                prop.key
            ))),
        },
        Expr::Column(column) => sc.slot_sql(
            column.var,
            &Slot::Physical {
                table: column.table.clone(),
                column: column.column.clone(),
            },
        ),
        Expr::Operator(app) => render_operator(app, sc),
        Expr::List(items) => Ok(format!("ARRAY[{}]", render_all(items, sc)?.join(", "))),
        Expr::Map(_) => Err(RenderError::invalid(
            "map literals have no SQL value; read their keys instead",
        )),
        Expr::ScalarFnCall(call) => Ok(render_call(&call.name, render_all(&call.args, sc)?)),
        Expr::AggregateFnCall(call) => {
            let mut args = render_all(&call.args, sc)?;
            if call.distinct {
                if let Some(first) = args.first_mut() {
                    *first = format!("DISTINCT {}", first);
                }
            }
            Ok(render_call(&call.name, args))
        }
        Expr::Case(case) => render_case(case, sc),
        Expr::Aliased(aliased) => render_expr(&aliased.expr, sc),
    }
}

fn render_all(exprs: &[Expr], sc: &SelectContext<'_>) -> RenderResult<Vec<String>> {
    exprs.iter().map(|e| render_expr(e, sc)).collect()
}

pub fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Integer(i) => i.to_string(),
        Literal::Float(f) => format!("{:?}", f),
        Literal::Boolean(true) => "TRUE".to_string(),
        Literal::Boolean(false) => "FALSE".to_string(),
        Literal::String(s) => quote_literal(s),
        Literal::Null => "NULL".to_string(),
    }
}

/// Check if an expression is a string literal or a `+` chain holding one
fn contains_string_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(Literal::String(_)) => true,
        Expr::Operator(op) if op.operator == Operator::Addition => {
            op.operands.iter().any(contains_string_literal)
        }
        _ => false,
    }
}

fn binary_symbol(operator: Operator) -> Option<&'static str> {
    Some(match operator {
        Operator::Addition => "+",
        Operator::Subtraction => "-",
        Operator::Multiplication => "*",
        Operator::Division => "/",
        Operator::ModuloDivision => "%",
        Operator::Equal => "=",
        Operator::NotEqual => "<>",
        Operator::LessThan => "<",
        Operator::GreaterThan => ">",
        Operator::LessThanEqual => "<=",
        Operator::GreaterThanEqual => ">=",
        Operator::RegexMatch => "~",
        Operator::And => "AND",
        Operator::Or => "OR",
        // boolean XOR is inequality
        Operator::Xor => "<>",
        _ => return None,
    })
}

fn render_operator(app: &OperatorApplication, sc: &SelectContext<'_>) -> RenderResult<String> {
    // `x IN [a, b]` keeps the list inline
    if let (Operator::In, [lhs, Expr::List(items)]) = (app.operator, app.operands.as_slice()) {
        if items.is_empty() {
            return Ok("FALSE".to_string());
        }
        return Ok(format!(
            "({} IN ({}))",
            render_expr(lhs, sc)?,
            render_all(items, sc)?.join(", ")
        ));
    }

    let operands = render_all(&app.operands, sc)?;
    let sql = match (app.operator, operands.as_slice()) {
        (Operator::Not, [x]) => format!("(NOT {})", x),
        (Operator::IsNull, [x]) => format!("({} IS NULL)", x),
        (Operator::IsNotNull, [x]) => format!("({} IS NOT NULL)", x),
        (Operator::Exponentiation, [l, r]) => format!("power({}, {})", l, r),
        (Operator::StartsWith, [l, r]) => format!("({} LIKE ({} || '%'))", l, r),
        (Operator::EndsWith, [l, r]) => format!("({} LIKE ('%' || {}))", l, r),
        (Operator::Contains, [l, r]) => format!("({} LIKE ('%' || {} || '%'))", l, r),
        (Operator::In, [l, r]) => format!("({} = ANY({}))", l, r),
        (Operator::Addition, [l, r]) if app.operands.iter().any(contains_string_literal) => {
            format!("({} || {})", l, r)
        }
        (operator, [l, r]) => match binary_symbol(operator) {
            Some(symbol) => format!("({} {} {})", l, symbol, r),
            None => {
                return Err(RenderError::invalid(format!(
                    "{:?} is not a binary operator",
                    operator
                )))
            }
        },
        (operator, operands) => {
            return Err(RenderError::invalid(format!(
                "{:?} does not take {} operand(s)",
                operator,
                operands.len()
            )))
        }
    };
    Ok(sql)
}

fn render_case(case: &Case, sc: &SelectContext<'_>) -> RenderResult<String> {
    let mut sql = String::from("CASE");
    if let Some(subject) = &case.expr {
        sql.push(' ');
        sql.push_str(&render_expr(subject, sc)?);
    }
    for (when, then) in &case.when_then {
        sql.push_str(&format!(
            " WHEN {} THEN {}",
            render_expr(when, sc)?,
            render_expr(then, sc)?
        ));
    }
    if let Some(otherwise) = &case.else_expr {
        sql.push_str(&format!(" ELSE {}", render_expr(otherwise, sc)?));
    }
    sql.push_str(" END");
    Ok(sql)
}
