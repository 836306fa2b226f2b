//! Compile-time evaluation of constant initializers and array sizes
//!
//! Follows the type checker's promotion rules: an arithmetic operator with a
//! real operand yields a real, otherwise an integer.

use thiserror::Error;

use crate::frontend::ast::{Ast, NodeId, NodeKind};
use crate::types::ConstValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConstError {
    #[error("expression is not a compile-time constant")]
    NotConstant,
    #[error("division by zero in constant expression")]
    DivisionByZero,
    #[error("negative exponent in integer constant expression")]
    NegativeExponent,
    #[error("arithmetic overflow in constant expression")]
    Overflow,
    #[error("operand types do not match in constant expression")]
    TypeMismatch,
    /// Depends on something already reported
    #[error("constant depends on an erroneous declaration")]
    Poisoned,
}

pub type ConstResult = std::result::Result<ConstValue, ConstError>;

/// Evaluate `node`, resolving identifiers through `lookup`
pub fn evaluate(ast: &Ast, node: NodeId, lookup: &dyn Fn(&str) -> ConstResult) -> ConstResult {
    let n = ast.node(node);
    match n.kind {
        NodeKind::IntLit => n.text().parse::<i64>().map(ConstValue::Int).map_err(|_| ConstError::Overflow),
        NodeKind::RealLit => n
            .text()
            .parse::<f64>()
            .map(ConstValue::Real)
            .map_err(|_| ConstError::NotConstant),
        NodeKind::True => Ok(ConstValue::Bool(true)),
        NodeKind::False => Ok(ConstValue::Bool(false)),
        NodeKind::SimpleVar => lookup(n.text()),
        NodeKind::Undefined => Err(ConstError::Poisoned),
        NodeKind::Not => {
            let inner = operand(ast, node, 0, lookup)?;
            match inner {
                ConstValue::Bool(b) => Ok(ConstValue::Bool(!b)),
                _ => Err(ConstError::TypeMismatch),
            }
        }
        kind if kind.is_arithmetic() || kind.is_ordering() || kind.is_equality() || kind.is_logical() => {
            let lhs = operand(ast, node, 0, lookup)?;
            let rhs = operand(ast, node, 1, lookup)?;
            binary(kind, lhs, rhs)
        }
        _ => Err(ConstError::NotConstant),
    }
}

fn operand(ast: &Ast, node: NodeId, index: usize, lookup: &dyn Fn(&str) -> ConstResult) -> ConstResult {
    match ast.child(node, index) {
        Some(child) => evaluate(ast, child, lookup),
        None => Err(ConstError::Poisoned),
    }
}

/// Apply a binary operator to two folded values
pub fn binary(kind: NodeKind, lhs: ConstValue, rhs: ConstValue) -> ConstResult {
    use ConstValue::*;

    if kind.is_logical() {
        let (Bool(a), Bool(b)) = (lhs, rhs) else {
            return Err(ConstError::TypeMismatch);
        };
        return Ok(Bool(match kind {
            NodeKind::And => a && b,
            NodeKind::Or => a || b,
            _ => a ^ b,
        }));
    }

    if kind.is_equality() {
        let equal = match (lhs, rhs) {
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (a, b) => match (a.as_real(), b.as_real()) {
                (Some(x), Some(y)) => x == y,
                _ => return Err(ConstError::TypeMismatch),
            },
        };
        return Ok(Bool(if kind == NodeKind::Eq { equal } else { !equal }));
    }

    if kind.is_ordering() {
        let ordering = match (lhs, rhs) {
            (Int(a), Int(b)) => a.partial_cmp(&b),
            (a, b) => match (a.as_real(), b.as_real()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => return Err(ConstError::TypeMismatch),
            },
        };
        // NaN compares false with everything
        let Some(ordering) = ordering else {
            return Ok(Bool(false));
        };
        return Ok(Bool(match kind {
            NodeKind::Gt => ordering.is_gt(),
            NodeKind::Ge => ordering.is_ge(),
            NodeKind::Lt => ordering.is_lt(),
            _ => ordering.is_le(),
        }));
    }

    match (kind, lhs, rhs) {
        (NodeKind::Pow, Int(base), Int(exp)) => int_pow(base, exp).map(Int),
        (NodeKind::Pow, base, Int(exp)) => {
            let base = base.as_real().ok_or(ConstError::TypeMismatch)?;
            finite(match i32::try_from(exp) {
                Ok(e) => base.powi(e),
                Err(_) => base.powf(exp as f64),
            })
        }
        (NodeKind::Pow, _, _) => Err(ConstError::TypeMismatch),
        (NodeKind::Mod, Int(a), Int(b)) => {
            if b == 0 {
                return Err(ConstError::DivisionByZero);
            }
            a.checked_rem(b).map(Int).ok_or(ConstError::Overflow)
        }
        (NodeKind::Mod, _, _) => Err(ConstError::TypeMismatch),
        (_, Int(a), Int(b)) => {
            let result = match kind {
                NodeKind::Add => a.checked_add(b),
                NodeKind::Sub => a.checked_sub(b),
                NodeKind::Mul => a.checked_mul(b),
                NodeKind::Div => {
                    if b == 0 {
                        return Err(ConstError::DivisionByZero);
                    }
                    a.checked_div(b)
                }
                _ => return Err(ConstError::NotConstant),
            };
            result.map(Int).ok_or(ConstError::Overflow)
        }
        (_, a, b) => {
            let (Some(x), Some(y)) = (a.as_real(), b.as_real()) else {
                return Err(ConstError::TypeMismatch);
            };
            finite(match kind {
                NodeKind::Add => x + y,
                NodeKind::Sub => x - y,
                NodeKind::Mul => x * y,
                NodeKind::Div => {
                    if y == 0.0 {
                        return Err(ConstError::DivisionByZero);
                    }
                    x / y
                }
                _ => return Err(ConstError::NotConstant),
            })
        }
    }
}

/// Reject infinities and NaN produced by real arithmetic
fn finite(x: f64) -> ConstResult {
    if x.is_finite() {
        Ok(ConstValue::Real(x))
    } else {
        Err(ConstError::Overflow)
    }
}

/// Integer power by repeated squaring
fn int_pow(base: i64, exp: i64) -> Result<i64, ConstError> {
    if exp < 0 {
        return Err(ConstError::NegativeExponent);
    }
    let mut result: i64 = 1;
    let mut base = base;
    let mut exp = exp;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.checked_mul(base).ok_or(ConstError::Overflow)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = base.checked_mul(base).ok_or(ConstError::Overflow)?;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;

    /// Fold the initializer of the first constant in `constants`
    fn fold(constants: &str) -> ConstResult {
        let source = format!("cd25 p constants {} main begin end cd25 p", constants);
        let (ast, diags) = parse_source(&source);
        assert!(diags.is_empty(), "{:?}", diags);
        let globals = ast.child(ast.root().unwrap(), 1).unwrap();
        let consts = ast.child(globals, 0).unwrap();
        let init = ast.child(consts, 0).unwrap();
        let expr = ast.child(init, 0).unwrap();
        evaluate(&ast, expr, &|name| match name {
            "N" => Ok(ConstValue::Int(10)),
            "BAD" => Err(ConstError::Poisoned),
            _ => Err(ConstError::NotConstant),
        })
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(fold("A is 1 + 2 * 3"), Ok(ConstValue::Int(7)));
        assert_eq!(fold("A is 7 / 2"), Ok(ConstValue::Int(3)));
        assert_eq!(fold("A is 7 % 3"), Ok(ConstValue::Int(1)));
        assert_eq!(fold("A is N * N"), Ok(ConstValue::Int(100)));
    }

    #[test]
    fn test_promotion_to_real() {
        assert_eq!(fold("A is 1 + 0.5"), Ok(ConstValue::Real(1.5)));
        assert_eq!(fold("A is 2.0 ^ 3"), Ok(ConstValue::Real(8.0)));
    }

    #[test]
    fn test_power_by_squaring() {
        assert_eq!(fold("A is 2 ^ 10"), Ok(ConstValue::Int(1024)));
        assert_eq!(fold("A is 3 ^ 0"), Ok(ConstValue::Int(1)));
        assert_eq!(fold("A is 2 ^ 3 ^ 2"), Ok(ConstValue::Int(512)));
    }

    #[test]
    fn test_failures() {
        assert_eq!(fold("A is 1 / 0"), Err(ConstError::DivisionByZero));
        assert_eq!(fold("A is 1 % 0"), Err(ConstError::DivisionByZero));
        assert_eq!(fold("A is 2 ^ (0 - 1)"), Err(ConstError::NegativeExponent));
        assert_eq!(fold("A is 2 ^ 64"), Err(ConstError::Overflow));
        assert_eq!(fold("A is x + 1"), Err(ConstError::NotConstant));
        assert_eq!(fold("A is BAD + 1"), Err(ConstError::Poisoned));
    }

    #[test]
    fn test_non_finite_reals_are_rejected() {
        assert_eq!(fold("A is 1.0 / 0.0"), Err(ConstError::DivisionByZero));
        assert_eq!(fold("A is 0.0 / 0.0"), Err(ConstError::DivisionByZero));
        assert_eq!(fold("A is 1 / 0.0"), Err(ConstError::DivisionByZero));
        assert_eq!(fold("A is 10.0 ^ 400"), Err(ConstError::Overflow));
        assert_eq!(fold("A is 10.0 ^ 2"), Ok(ConstValue::Real(100.0)));
    }

    #[test]
    fn test_boolean_and_relational() {
        assert_eq!(fold("A is ((1 < 2) and (2.5 >= 2))"), Ok(ConstValue::Bool(true)));
        assert_eq!(fold("A is ((not 1 == 1) xor true)"), Ok(ConstValue::Bool(true)));
        assert_eq!(fold("A is (true == false)"), Ok(ConstValue::Bool(false)));
    }
}
