//! Typed symbolic values.

use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// Static type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    /// 64-bit float.
    Double,
    /// Signed integer.
    Integer,
    /// Truth value.
    Boolean,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical negation.
    Not,
    /// Absolute value.
    Abs,
    /// Round toward negative infinity.
    Floor,
    /// Square root.
    Sqrt,
    /// Natural exponential.
    Exp,
    /// Sine (radians).
    Sin,
    /// Cosine (radians).
    Cos,
    /// Integer to double conversion.
    ToDouble,
    /// Double to integer conversion (truncating).
    ToInteger,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division (truncating for integers).
    Div,
    /// Remainder.
    Mod,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Logical and.
    And,
    /// Logical or.
    Or,
}

impl BinaryOp {
    /// Whether the operator yields a boolean.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::And | Self::Or
        )
    }
}

/// A node of the expression IR.
///
/// Builders fold constant operands, so `Expression::integer(2) * 3` is the
/// literal `6` rather than a product node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Double literal.
    Double(f64),
    /// Integer literal.
    Integer(i64),
    /// Boolean literal.
    Boolean(bool),
    /// Reference to a declared variable or scalar parameter.
    Variable {
        /// Variable name.
        name: String,
        /// Declared type.
        ty: ExpressionType,
    },
    /// Index of the kernel lane being executed.
    KernelIndex,
    /// Element of an array.
    Load {
        /// Array name.
        array: String,
        /// Element index.
        index: Box<Expression>,
    },
    /// Number of elements of an array.
    Length(String),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expression>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// `condition ? then : otherwise`; only the selected branch is evaluated.
    Conditional {
        /// Guard.
        condition: Box<Expression>,
        /// Value when the guard holds.
        then: Box<Expression>,
        /// Value otherwise.
        otherwise: Box<Expression>,
    },
}

impl Expression {
    /// Double literal.
    pub fn double(value: f64) -> Self {
        Self::Double(value)
    }

    /// Integer literal.
    pub fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    /// Boolean literal.
    pub fn boolean(value: bool) -> Self {
        Self::Boolean(value)
    }

    /// Reference to a variable.
    pub fn var(name: impl Into<String>, ty: ExpressionType) -> Self {
        Self::Variable {
            name: name.into(),
            ty,
        }
    }

    /// Index of the current kernel lane.
    pub fn kernel_index() -> Self {
        Self::KernelIndex
    }

    /// `array[index]`.
    pub fn load(array: impl Into<String>, index: impl Into<Expression>) -> Self {
        Self::Load {
            array: array.into(),
            index: Box::new(index.into()),
        }
    }

    /// Length of `array`.
    pub fn length(array: impl Into<String>) -> Self {
        Self::Length(array.into())
    }

    /// `condition ? then : otherwise`, folded when the guard is a literal.
    pub fn conditional(
        condition: impl Into<Expression>,
        then: impl Into<Expression>,
        otherwise: impl Into<Expression>,
    ) -> Self {
        match condition.into() {
            Self::Boolean(true) => then.into(),
            Self::Boolean(false) => otherwise.into(),
            condition => Self::Conditional {
                condition: Box::new(condition),
                then: Box::new(then.into()),
                otherwise: Box::new(otherwise.into()),
            },
        }
    }

    /// Static type.
    pub fn ty(&self) -> ExpressionType {
        match self {
            Self::Double(_) | Self::Load { .. } => ExpressionType::Double,
            Self::Integer(_) | Self::KernelIndex | Self::Length(_) => ExpressionType::Integer,
            Self::Boolean(_) => ExpressionType::Boolean,
            Self::Variable { ty, .. } => *ty,
            Self::Unary { op, operand } => match op {
                UnaryOp::Neg | UnaryOp::Abs => operand.ty(),
                UnaryOp::Not => ExpressionType::Boolean,
                UnaryOp::ToInteger => ExpressionType::Integer,
                UnaryOp::Floor
                | UnaryOp::Sqrt
                | UnaryOp::Exp
                | UnaryOp::Sin
                | UnaryOp::Cos
                | UnaryOp::ToDouble => ExpressionType::Double,
            },
            Self::Binary { op, left, right } => {
                if op.is_predicate() {
                    ExpressionType::Boolean
                } else if left.ty() == ExpressionType::Integer
                    && right.ty() == ExpressionType::Integer
                {
                    ExpressionType::Integer
                } else {
                    ExpressionType::Double
                }
            }
            Self::Conditional {
                then, otherwise, ..
            } => {
                if then.ty() == otherwise.ty() {
                    then.ty()
                } else {
                    ExpressionType::Double
                }
            }
        }
    }

    /// Literal integer value, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Literal numeric value, if this is one.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Whether the expression contains no variables, loads or lane index.
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Double(_) | Self::Integer(_) | Self::Boolean(_) => true,
            Self::Variable { .. } | Self::KernelIndex | Self::Load { .. } | Self::Length(_) => {
                false
            }
            Self::Unary { operand, .. } => operand.is_constant(),
            Self::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Self::Conditional {
                condition,
                then,
                otherwise,
            } => condition.is_constant() && then.is_constant() && otherwise.is_constant(),
        }
    }

    /// Applies a unary operator, folding literals.
    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        match (op, &operand) {
            (UnaryOp::Neg, Self::Double(v)) => Self::Double(-v),
            (UnaryOp::Neg, Self::Integer(v)) if *v != i64::MIN => Self::Integer(-v),
            (UnaryOp::Not, Self::Boolean(v)) => Self::Boolean(!v),
            (UnaryOp::ToDouble, Self::Integer(v)) => Self::Double(*v as f64),
            (UnaryOp::ToDouble, Self::Double(_)) => operand,
            (UnaryOp::ToInteger, Self::Integer(_)) => operand,
            (UnaryOp::Cos, Self::Double(v)) => Self::Double(v.cos()),
            (UnaryOp::Sin, Self::Double(v)) => Self::Double(v.sin()),
            _ => Self::Unary {
                op,
                operand: Box::new(operand),
            },
        }
    }

    /// Applies a binary operator, folding literals and arithmetic identities.
    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        if let Some(folded) = fold(op, &left, &right) {
            return folded;
        }
        let same_type = left.ty() == right.ty();
        match (op, left.as_double(), right.as_double()) {
            (BinaryOp::Add, Some(l), _) if l == 0.0 && same_type => return right,
            (BinaryOp::Add | BinaryOp::Sub, _, Some(r)) if r == 0.0 && same_type => return left,
            (BinaryOp::Mul, Some(l), _) if l == 1.0 && same_type => return right,
            (BinaryOp::Mul | BinaryOp::Div, _, Some(r)) if r == 1.0 && same_type => return left,
            _ => {}
        }
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Minimum of two values.
    pub fn min(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Min, self, other.into())
    }

    /// Maximum of two values.
    pub fn max(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Max, self, other.into())
    }

    /// `self == other`.
    pub fn equal(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Eq, self, other.into())
    }

    /// `self != other`.
    pub fn not_equal(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Ne, self, other.into())
    }

    /// `self < other`.
    pub fn less_than(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Lt, self, other.into())
    }

    /// `self <= other`.
    pub fn less_or_equal(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Le, self, other.into())
    }

    /// `self > other`.
    pub fn greater_than(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Gt, self, other.into())
    }

    /// `self >= other`.
    pub fn greater_or_equal(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Ge, self, other.into())
    }

    /// Logical and.
    pub fn and(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::And, self, other.into())
    }

    /// Logical or.
    pub fn or(self, other: impl Into<Expression>) -> Self {
        Self::binary(BinaryOp::Or, self, other.into())
    }

    /// Logical negation.
    pub fn not(self) -> Self {
        Self::unary(UnaryOp::Not, self)
    }

    /// Absolute value.
    pub fn abs(self) -> Self {
        Self::unary(UnaryOp::Abs, self)
    }

    /// Floor.
    pub fn floor(self) -> Self {
        Self::unary(UnaryOp::Floor, self)
    }

    /// Square root.
    pub fn sqrt(self) -> Self {
        Self::unary(UnaryOp::Sqrt, self)
    }

    /// Natural exponential.
    pub fn exp(self) -> Self {
        Self::unary(UnaryOp::Exp, self)
    }

    /// Sine.
    pub fn sin(self) -> Self {
        Self::unary(UnaryOp::Sin, self)
    }

    /// Cosine.
    pub fn cos(self) -> Self {
        Self::unary(UnaryOp::Cos, self)
    }

    /// Conversion to double.
    pub fn to_double(self) -> Self {
        Self::unary(UnaryOp::ToDouble, self)
    }

    /// Truncating conversion to integer.
    pub fn to_integer(self) -> Self {
        Self::unary(UnaryOp::ToInteger, self)
    }
}

fn fold(op: BinaryOp, left: &Expression, right: &Expression) -> Option<Expression> {
    use Expression::{Double, Integer};

    match (left, right) {
        (Integer(l), Integer(r)) => {
            let (l, r) = (*l, *r);
            Some(match op {
                BinaryOp::Add => Integer(l.checked_add(r)?),
                BinaryOp::Sub => Integer(l.checked_sub(r)?),
                BinaryOp::Mul => Integer(l.checked_mul(r)?),
                BinaryOp::Div => Integer(l.checked_div(r)?),
                BinaryOp::Mod => Integer(l.checked_rem(r)?),
                BinaryOp::Min => Integer(l.min(r)),
                BinaryOp::Max => Integer(l.max(r)),
                BinaryOp::Eq => Expression::Boolean(l == r),
                BinaryOp::Ne => Expression::Boolean(l != r),
                BinaryOp::Lt => Expression::Boolean(l < r),
                BinaryOp::Le => Expression::Boolean(l <= r),
                BinaryOp::Gt => Expression::Boolean(l > r),
                BinaryOp::Ge => Expression::Boolean(l >= r),
                _ => return None,
            })
        }
        (Double(_) | Integer(_), Double(_) | Integer(_)) => {
            let (l, r) = (left.as_double()?, right.as_double()?);
            Some(match op {
                BinaryOp::Add => Double(l + r),
                BinaryOp::Sub => Double(l - r),
                BinaryOp::Mul => Double(l * r),
                BinaryOp::Div => Double(l / r),
                BinaryOp::Min => Double(l.min(r)),
                BinaryOp::Max => Double(l.max(r)),
                _ => return None,
            })
        }
        (Expression::Boolean(l), Expression::Boolean(r)) => match op {
            BinaryOp::And => Some(Expression::Boolean(*l && *r)),
            BinaryOp::Or => Some(Expression::Boolean(*l || *r)),
            _ => None,
        },
        _ => None,
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Expression {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<usize> for Expression {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Expression>> $trait<T> for Expression {
            type Output = Expression;

            fn $method(self, rhs: T) -> Expression {
                Expression::binary($op, self, rhs.into())
            }
        }
    };
}

binary_operator!(Add, add, BinaryOp::Add);
binary_operator!(Sub, sub, BinaryOp::Sub);
binary_operator!(Mul, mul, BinaryOp::Mul);
binary_operator!(Div, div, BinaryOp::Div);
binary_operator!(Rem, rem, BinaryOp::Mod);

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::unary(UnaryOp::Neg, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_folding() {
        assert_eq!(Expression::integer(2) * 3 + 1, Expression::Integer(7));
        assert_eq!(Expression::integer(7) / 2, Expression::Integer(3));
        assert_eq!(Expression::integer(7) % 4, Expression::Integer(3));
        assert_eq!(Expression::integer(3).less_than(4), Expression::Boolean(true));
    }

    #[test]
    fn test_overflowing_literals_stay_unfolded() {
        let min = Expression::integer(i64::MIN);
        assert!(matches!(min.clone() / -1, Expression::Binary { .. }));
        assert!(matches!(min.clone() % -1, Expression::Binary { .. }));
        assert!(matches!(-min.clone(), Expression::Unary { .. }));
        assert!(matches!(Expression::integer(1) / 0, Expression::Binary { .. }));
        assert_eq!(-Expression::integer(5), Expression::Integer(-5));
        assert_eq!(Expression::integer(i64::MIN + 1) / -1, Expression::Integer(i64::MAX));
    }

    #[test]
    fn test_identity_folding_keeps_type() {
        let i = Expression::var("i", ExpressionType::Integer);
        assert_eq!(i.clone() + 0, i);
        assert_eq!(i.clone() * 1, i);
        // Multiplying an integer by 1.0 must still promote to double.
        assert_eq!((i.clone() * 1.0).ty(), ExpressionType::Double);
    }

    #[test]
    fn test_types() {
        let k = Expression::kernel_index();
        assert_eq!((k.clone() * 2).ty(), ExpressionType::Integer);
        assert_eq!((k.clone() * 2.0).ty(), ExpressionType::Double);
        assert_eq!(k.clone().less_than(4).ty(), ExpressionType::Boolean);
        assert_eq!(Expression::load("a", k.clone()).ty(), ExpressionType::Double);
        assert_eq!(k.to_double().cos().ty(), ExpressionType::Double);
    }

    #[test]
    fn test_conditional_folds_literal_guard() {
        let c = Expression::conditional(true, 1.0, 2.0);
        assert_eq!(c, Expression::Double(1.0));
        let k = Expression::kernel_index();
        let c = Expression::conditional(k.less_than(2), 1.0, 2.0);
        assert!(matches!(c, Expression::Conditional { .. }));
        assert!(!c.is_constant());
    }
}
