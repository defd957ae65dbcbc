//! Constant folding over literal-only expressions.
//!
//! Used for LIMIT/SKIP evaluation and for propagating literal aliases. Folding
//! follows SQL three-valued logic for `null`; integer arithmetic is checked and
//! an overflow leaves the expression unfolded.

use super::{visitors::map_expression, Expr, Literal, Operator, OperatorApplication};

/// True when `expr` is built only from literals, lists and operators.
pub fn is_literal_only(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) => true,
        Expr::List(items) => items.iter().all(is_literal_only),
        Expr::Operator(app) => app.operands.iter().all(is_literal_only),
        _ => false,
    }
}

/// Evaluates `expr` to a single literal, if it is constant.
pub fn evaluate_constant(expr: &Expr) -> Option<Literal> {
    match fold_constants(expr.clone()) {
        Expr::Literal(lit) => Some(lit),
        _ => None,
    }
}

/// Folds every constant operator application in `expr`, bottom-up.
pub fn fold_constants(expr: Expr) -> Expr {
    map_expression(expr, &mut |e| match e {
        Expr::Operator(app) => fold_operator(app),
        other => other,
    })
}

fn fold_operator(app: OperatorApplication) -> Expr {
    let folded = {
        let literals: Option<Vec<&Literal>> = app
            .operands
            .iter()
            .map(|o| match o {
                Expr::Literal(lit) => Some(lit),
                _ => None,
            })
            .collect();
        match literals.as_deref() {
            Some([operand]) => fold_unary(app.operator, operand),
            Some([lhs, rhs]) => fold_binary(app.operator, lhs, rhs),
            _ => None,
        }
    };
    match folded {
        Some(lit) => Expr::Literal(lit),
        None => Expr::Operator(app),
    }
}

fn fold_unary(op: Operator, operand: &Literal) -> Option<Literal> {
    match (op, operand) {
        (Operator::Not, Literal::Boolean(b)) => Some(Literal::Boolean(!b)),
        (Operator::Not, Literal::Null) => Some(Literal::Null),
        (Operator::IsNull, lit) => Some(Literal::Boolean(*lit == Literal::Null)),
        (Operator::IsNotNull, lit) => Some(Literal::Boolean(*lit != Literal::Null)),
        _ => None,
    }
}

fn fold_binary(op: Operator, lhs: &Literal, rhs: &Literal) -> Option<Literal> {
    use Literal::*;

    match op {
        Operator::And => match (lhs, rhs) {
            (Boolean(false), _) | (_, Boolean(false)) => Some(Boolean(false)),
            (Boolean(true), Boolean(true)) => Some(Boolean(true)),
            (Null, Boolean(true)) | (Boolean(true), Null) | (Null, Null) => Some(Null),
            _ => None,
        },
        Operator::Or => match (lhs, rhs) {
            (Boolean(true), _) | (_, Boolean(true)) => Some(Boolean(true)),
            (Boolean(false), Boolean(false)) => Some(Boolean(false)),
            (Null, Boolean(false)) | (Boolean(false), Null) | (Null, Null) => Some(Null),
            _ => None,
        },
        Operator::Xor => match (lhs, rhs) {
            (Boolean(a), Boolean(b)) => Some(Boolean(a != b)),
            (Null, _) | (_, Null) => Some(Null),
            _ => None,
        },
        _ if matches!(lhs, Null) || matches!(rhs, Null) => match op {
            Operator::Addition
            | Operator::Subtraction
            | Operator::Multiplication
            | Operator::Division
            | Operator::ModuloDivision
            | Operator::Exponentiation => Some(Null),
            _ if op.is_comparison() => Some(Null),
            _ => None,
        },
        Operator::Addition => match (lhs, rhs) {
            (String(a), String(b)) => Some(String(format!("{}{}", a, b))),
            _ => arithmetic(lhs, rhs, i64::checked_add, |a, b| a + b),
        },
        Operator::Subtraction => arithmetic(lhs, rhs, i64::checked_sub, |a, b| a - b),
        Operator::Multiplication => arithmetic(lhs, rhs, i64::checked_mul, |a, b| a * b),
        Operator::Division => match (lhs, rhs) {
            (_, Integer(0)) => None,
            _ => arithmetic(lhs, rhs, i64::checked_div, |a, b| a / b),
        },
        Operator::ModuloDivision => match (lhs, rhs) {
            (_, Integer(0)) => None,
            _ => arithmetic(lhs, rhs, i64::checked_rem, |a, b| a % b),
        },
        Operator::Exponentiation => {
            let (a, b) = (as_float(lhs)?, as_float(rhs)?);
            Some(Float(a.powf(b)))
        }
        op if op.is_comparison() => compare(op, lhs, rhs).map(Boolean),
        _ => None,
    }
}

fn as_float(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Integer(i) => Some(*i as f64),
        Literal::Float(f) => Some(*f),
        _ => None,
    }
}

fn arithmetic(
    lhs: &Literal,
    rhs: &Literal,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Option<Literal> {
    match (lhs, rhs) {
        (Literal::Integer(a), Literal::Integer(b)) => int_op(*a, *b).map(Literal::Integer),
        _ => Some(Literal::Float(float_op(as_float(lhs)?, as_float(rhs)?))),
    }
}

fn compare(op: Operator, lhs: &Literal, rhs: &Literal) -> Option<bool> {
    use std::cmp::Ordering;

    let ordering = match (lhs, rhs) {
        (Literal::String(a), Literal::String(b)) => a.cmp(b),
        (Literal::Boolean(a), Literal::Boolean(b)) => a.cmp(b),
        (Literal::Integer(a), Literal::Integer(b)) => a.cmp(b),
        _ => as_float(lhs)?.partial_cmp(&as_float(rhs)?)?,
    };
    Some(match op {
        Operator::Equal => ordering == Ordering::Equal,
        Operator::NotEqual => ordering != Ordering::Equal,
        Operator::LessThan => ordering == Ordering::Less,
        Operator::GreaterThan => ordering == Ordering::Greater,
        Operator::LessThanEqual => ordering != Ordering::Greater,
        Operator::GreaterThanEqual => ordering != Ordering::Less,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_planner::variables::VarId;
    use test_case::test_case;

    fn int(i: i64) -> Expr {
        Expr::Literal(Literal::Integer(i))
    }

    fn op(operator: Operator, lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(operator, lhs, rhs)
    }

    #[test_case(op(Operator::Addition, int(2), int(3)), Literal::Integer(5); "integer addition")]
    #[test_case(op(Operator::Multiplication, op(Operator::Subtraction, int(10), int(4)), int(2)), Literal::Integer(12); "nested")]
    #[test_case(op(Operator::Addition, int(1), Expr::Literal(Literal::Float(0.5))), Literal::Float(1.5); "int float mix")]
    #[test_case(op(Operator::Exponentiation, int(2), int(3)), Literal::Float(8.0); "power is float")]
    #[test_case(op(Operator::Addition, Expr::Literal(Literal::String("ab".into())), Expr::Literal(Literal::String("c".into()))), Literal::String("abc".into()); "string concat")]
    #[test_case(op(Operator::LessThan, int(1), int(2)), Literal::Boolean(true); "comparison")]
    #[test_case(op(Operator::And, Expr::Literal(Literal::Null), Expr::boolean(false)), Literal::Boolean(false); "null and false")]
    #[test_case(op(Operator::Or, Expr::Literal(Literal::Null), Expr::boolean(false)), Literal::Null; "null or false")]
    #[test_case(op(Operator::Equal, int(1), Expr::Literal(Literal::Null)), Literal::Null; "null comparison")]
    fn test_folds_to(expr: Expr, expected: Literal) {
        assert_eq!(evaluate_constant(&expr), Some(expected));
    }

    #[test]
    fn test_unfoldable_expressions_stay() {
        assert_eq!(evaluate_constant(&op(Operator::Division, int(1), int(0))), None);
        assert_eq!(evaluate_constant(&op(Operator::Addition, int(i64::MAX), int(1))), None);
        let with_var = op(Operator::Addition, Expr::Variable(VarId::from_raw(0)), int(1));
        assert_eq!(evaluate_constant(&with_var), None);
    }

    #[test]
    fn test_partial_folding_keeps_variables() {
        let v = Expr::Variable(VarId::from_raw(0));
        let expr = op(Operator::Addition, v.clone(), op(Operator::Multiplication, int(2), int(3)));
        assert_eq!(fold_constants(expr), op(Operator::Addition, v, int(6)));
    }

    #[test]
    fn test_is_literal_only() {
        assert!(is_literal_only(&op(Operator::Addition, int(1), int(2))));
        assert!(is_literal_only(&Expr::List(vec![int(1)])));
        assert!(!is_literal_only(&Expr::Parameter("p".into())));
        assert!(!is_literal_only(&Expr::Variable(VarId::from_raw(0))));
    }
}
