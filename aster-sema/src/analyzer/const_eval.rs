// Compile-time constant evaluation: literals, arithmetic over
// constants, `sizeof(T)` and references to other constants. Operator
// precedence is already encoded in the tree shape by the parser.

use crate::symbols::{ConstValue, SymbolKind, SymbolTable};
use aster_ast::{BinaryOp, Expr, Literal, NodeRef, UnaryOp};
use std::sync::Arc;

/// Evaluate an expression to a constant, or `None` when it is not
/// compile-time evaluable (including division by zero).
pub fn evaluate_const(expr: &NodeRef, scope: &Arc<SymbolTable>) -> Option<ConstValue> {
    let value = match expr.as_expr()? {
        Expr::Literal(literal) => match literal {
            Literal::Integer(value) => ConstValue::Int(*value),
            Literal::Float(value) => ConstValue::Float(*value),
            Literal::Bool(value) => ConstValue::Bool(*value),
            Literal::Str(value) => ConstValue::Str(value.clone()),
            Literal::Char(value) => ConstValue::Int(*value as i64),
            Literal::Unit => return None,
        },
        Expr::Identifier(name) => {
            let entry = scope.lookup_safe(name)?;
            if entry.kind != SymbolKind::Const {
                return None;
            }
            entry.mark_used();
            entry.const_value.clone()?
        }
        Expr::Unary { op, operand } => {
            let inner = evaluate_const(operand, scope)?;
            match (op, inner) {
                (UnaryOp::Negate, ConstValue::Int(value)) => {
                    ConstValue::Int(value.checked_neg()?)
                }
                (UnaryOp::Negate, ConstValue::Float(value)) => ConstValue::Float(-value),
                (UnaryOp::Not, ConstValue::Bool(value)) => ConstValue::Bool(!value),
                _ => return None,
            }
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate_const(left, scope)?;
            let right = evaluate_const(right, scope)?;
            eval_binary(*op, left, right)?
        }
        Expr::Call { callee, args } => {
            // sizeof(T) over a resolvable type name.
            let Expr::Identifier(name) = callee.as_expr()? else {
                return None;
            };
            if name != "sizeof" || args.len() != 1 {
                return None;
            }
            let Expr::Identifier(type_name) = args.get(0)?.as_expr()? else {
                return None;
            };
            let entry = scope.lookup_safe(type_name)?;
            if entry.kind != SymbolKind::Type {
                return None;
            }
            let size = entry.ty.as_ref()?.size;
            ConstValue::Int(i64::try_from(size).ok()?)
        }
        _ => return None,
    };

    expr.flags().set_constant_expr(true);
    Some(value)
}

fn eval_binary(op: BinaryOp, left: ConstValue, right: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;

    let value = match (op, left, right) {
        (BinaryOp::Add, Int(a), Int(b)) => Int(a.checked_add(b)?),
        (BinaryOp::Sub, Int(a), Int(b)) => Int(a.checked_sub(b)?),
        (BinaryOp::Mul, Int(a), Int(b)) => Int(a.checked_mul(b)?),
        (BinaryOp::Div, Int(a), Int(b)) => Int(a.checked_div(b)?),
        (BinaryOp::Mod, Int(a), Int(b)) => Int(a.checked_rem(b)?),

        (BinaryOp::Add, Float(a), Float(b)) => Float(a + b),
        (BinaryOp::Sub, Float(a), Float(b)) => Float(a - b),
        (BinaryOp::Mul, Float(a), Float(b)) => Float(a * b),
        (BinaryOp::Div, Float(a), Float(b)) => Float(a / b),

        (BinaryOp::BitAnd, Int(a), Int(b)) => Int(a & b),
        (BinaryOp::BitOr, Int(a), Int(b)) => Int(a | b),
        (BinaryOp::BitXor, Int(a), Int(b)) => Int(a ^ b),
        (BinaryOp::Shl, Int(a), Int(b)) => Int(a.checked_shl(u32::try_from(b).ok()?)?),
        (BinaryOp::Shr, Int(a), Int(b)) => Int(a.checked_shr(u32::try_from(b).ok()?)?),

        (BinaryOp::Eq, Int(a), Int(b)) => Bool(a == b),
        (BinaryOp::NotEq, Int(a), Int(b)) => Bool(a != b),
        (BinaryOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinaryOp::LtEq, Int(a), Int(b)) => Bool(a <= b),
        (BinaryOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinaryOp::GtEq, Int(a), Int(b)) => Bool(a >= b),

        (BinaryOp::And, Bool(a), Bool(b)) => Bool(a && b),
        (BinaryOp::Or, Bool(a), Bool(b)) => Bool(a || b),

        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolEntry;
    use crate::types::{PrimitiveKind, TypeDescriptor};
    use aster_diagnostics::SourceLocation;
    use aster_ast::Node;

    fn loc() -> SourceLocation {
        SourceLocation::unknown()
    }

    fn int(value: i64) -> NodeRef {
        Node::expr(Expr::Literal(Literal::Integer(value)), loc())
    }

    fn binary(op: BinaryOp, left: NodeRef, right: NodeRef) -> NodeRef {
        Node::expr(Expr::Binary { op, left, right }, loc())
    }

    #[test]
    fn test_arithmetic_with_precedence_shape() {
        // 2 + 3 * 4, parsed as 2 + (3 * 4)
        let scope = SymbolTable::new();
        let expr = binary(
            BinaryOp::Add,
            int(2),
            binary(BinaryOp::Mul, int(3), int(4)),
        );
        assert_eq!(evaluate_const(&expr, &scope), Some(ConstValue::Int(14)));
        assert!(expr.flags().is_constant_expr());
    }

    #[test]
    fn test_division_by_zero_is_not_const() {
        let scope = SymbolTable::new();
        let expr = binary(BinaryOp::Div, int(1), int(0));
        assert_eq!(evaluate_const(&expr, &scope), None);
    }

    #[test]
    fn test_const_reference() {
        let scope = SymbolTable::new();
        scope.insert_safe(
            "LIMIT",
            SymbolEntry::new(
                "LIMIT",
                SymbolKind::Const,
                Some(TypeDescriptor::primitive(PrimitiveKind::I32)),
            )
            .with_const_value(ConstValue::Int(64)),
        );

        let expr = binary(
            BinaryOp::Mul,
            Node::expr(Expr::Identifier("LIMIT".to_string()), loc()),
            int(2),
        );
        assert_eq!(evaluate_const(&expr, &scope), Some(ConstValue::Int(128)));
    }

    #[test]
    fn test_sizeof() {
        let scope = SymbolTable::new();
        scope.insert_safe(
            "i64",
            SymbolEntry::new(
                "i64",
                SymbolKind::Type,
                Some(TypeDescriptor::primitive(PrimitiveKind::I64)),
            ),
        );

        let call = Node::expr(
            Expr::Call {
                callee: Node::expr(Expr::Identifier("sizeof".to_string()), loc()),
                args: vec![Node::expr(Expr::Identifier("i64".to_string()), loc())].into(),
            },
            loc(),
        );
        assert_eq!(evaluate_const(&call, &scope), Some(ConstValue::Int(8)));
    }

    #[test]
    fn test_non_const_rejected() {
        let scope = SymbolTable::new();
        let call = Node::expr(
            Expr::Call {
                callee: Node::expr(Expr::Identifier("compute".to_string()), loc()),
                args: aster_ast::NodeList::new(),
            },
            loc(),
        );
        assert_eq!(evaluate_const(&call, &scope), None);
    }
}
