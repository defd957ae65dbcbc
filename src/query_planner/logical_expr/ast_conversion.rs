//! AST expression -> [`Expr`] conversion.
//!
//! Names are resolved through a caller supplied resolver so the same conversion
//! serves every scope (pre-projection, post-projection, empty for LIMIT/SKIP).

use crate::open_cypher_parser::ast;
use crate::query_planner::errors::{LoweringError, LoweringResult};
use crate::query_planner::variables::VarId;

use super::{
    is_aggregate_function, AggregateFnCall, Case, Expr, Literal, OperatorApplication,
    PropertyAccess, ScalarFnCall,
};

pub fn convert_literal(lit: &ast::Literal<'_>) -> Literal {
    match lit {
        ast::Literal::Integer(i) => Literal::Integer(*i),
        ast::Literal::Float(f) => Literal::Float(*f),
        ast::Literal::Boolean(b) => Literal::Boolean(*b),
        ast::Literal::String(s) => Literal::String(s.to_string()),
        ast::Literal::Null => Literal::Null,
    }
}

pub fn convert_expression<R>(expr: &ast::Expression<'_>, resolve: &mut R) -> LoweringResult<Expr>
where
    R: FnMut(&str) -> LoweringResult<VarId>,
{
    match expr {
        ast::Expression::Literal(lit) => Ok(Expr::Literal(convert_literal(lit))),
        ast::Expression::Variable(name) => Ok(Expr::Variable(resolve(name)?)),
        ast::Expression::Parameter(name) => Ok(Expr::Parameter(name.to_string())),
        ast::Expression::List(items) => Ok(Expr::List(convert_all(items, resolve)?)),
        ast::Expression::Map(entries) => {
            let mut converted = Vec::with_capacity(entries.len());
            for kv in entries {
                converted.push((kv.key.to_string(), convert_expression(&kv.value, resolve)?));
            }
            Ok(Expr::Map(converted))
        }
        ast::Expression::PropertyAccess(access) => Ok(Expr::PropertyAccess(PropertyAccess {
            base: Box::new(convert_expression(&access.base, resolve)?),
            key: access.key.to_string(),
        })),
        ast::Expression::OperatorApplication(app) => {
            Ok(Expr::Operator(OperatorApplication {
                operator: app.operator,
                operands: convert_all(&app.operands, resolve)?,
            }))
        }
        ast::Expression::FunctionCall(call) => convert_function_call(call, resolve),
        ast::Expression::Case(case) => {
            let operand = match &case.expr {
                Some(e) => Some(Box::new(convert_expression(e, resolve)?)),
                None => None,
            };
            let mut when_then = Vec::with_capacity(case.when_then.len());
            for (when, then) in &case.when_then {
                when_then.push((
                    convert_expression(when, resolve)?,
                    convert_expression(then, resolve)?,
                ));
            }
            let else_expr = match &case.else_expr {
                Some(e) => Some(Box::new(convert_expression(e, resolve)?)),
                None => None,
            };
            Ok(Expr::Case(Case {
                expr: operand,
                when_then,
                else_expr,
            }))
        }
        ast::Expression::Star => Err(LoweringError::invalid(
            "`*` is only allowed as the argument of count(*)",
        )),
    }
}

fn convert_all<R>(exprs: &[ast::Expression<'_>], resolve: &mut R) -> LoweringResult<Vec<Expr>>
where
    R: FnMut(&str) -> LoweringResult<VarId>,
{
    exprs.iter().map(|e| convert_expression(e, resolve)).collect()
}

fn convert_function_call<R>(call: &ast::FunctionCall<'_>, resolve: &mut R) -> LoweringResult<Expr>
where
    R: FnMut(&str) -> LoweringResult<VarId>,
{
    if is_aggregate_function(call.name) {
        let name = call.name.to_lowercase();
        let args = match call.args.as_slice() {
            [ast::Expression::Star] if name == "count" => vec![Expr::Star],
            args => convert_all(args, resolve)?,
        };
        return Ok(Expr::AggregateFnCall(AggregateFnCall {
            name,
            args,
            distinct: call.distinct,
        }));
    }

    if call.distinct {
        return Err(LoweringError::invalid(format!(
            "DISTINCT is only allowed in aggregate functions, not in {}()",
            call.name
        )));
    }
    Ok(Expr::ScalarFnCall(ScalarFnCall {
        name: call.name.to_string(),
        args: convert_all(&call.args, resolve)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::{Expression, FunctionCall};

    fn resolver(name: &str) -> LoweringResult<VarId> {
        match name {
            "a" => Ok(VarId::from_raw(0)),
            "b" => Ok(VarId::from_raw(1)),
            other => Err(LoweringError::UndefinedVariable(other.to_string())),
        }
    }

    #[test]
    fn test_aggregates_are_split_from_scalar_calls() {
        let count = Expression::FunctionCall(FunctionCall {
            name: "COUNT",
            args: vec![Expression::Star],
            distinct: false,
        });
        let converted = convert_expression(&count, &mut resolver).unwrap();
        assert_eq!(
            converted,
            Expr::AggregateFnCall(AggregateFnCall {
                name: "count".to_string(),
                args: vec![Expr::Star],
                distinct: false,
            })
        );

        let upper = Expression::FunctionCall(FunctionCall {
            name: "toUpper",
            args: vec![Expression::Variable("a")],
            distinct: false,
        });
        assert!(matches!(
            convert_expression(&upper, &mut resolver).unwrap(),
            Expr::ScalarFnCall(ScalarFnCall { ref name, .. }) if name == "toUpper"
        ));
    }

    #[test]
    fn test_undefined_variable_surfaces() {
        let expr = Expression::List(vec![Expression::Variable("a"), Expression::Variable("zz")]);
        assert_eq!(
            convert_expression(&expr, &mut resolver),
            Err(LoweringError::UndefinedVariable("zz".to_string()))
        );
    }

    #[test]
    fn test_misplaced_star_and_distinct() {
        assert!(matches!(
            convert_expression(&Expression::Star, &mut resolver),
            Err(LoweringError::InvalidExpression(_))
        ));
        let sum_star = Expression::FunctionCall(FunctionCall {
            name: "sum",
            args: vec![Expression::Star],
            distinct: false,
        });
        assert!(convert_expression(&sum_star, &mut resolver).is_err());
        let distinct_scalar = Expression::FunctionCall(FunctionCall {
            name: "abs",
            args: vec![Expression::Variable("b")],
            distinct: true,
        });
        assert!(matches!(
            convert_expression(&distinct_scalar, &mut resolver),
            Err(LoweringError::InvalidExpression(_))
        ));
    }
}
