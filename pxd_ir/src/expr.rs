use serde_derive::{Deserialize, Serialize};

/// Notation an integer literal was written in.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum IntegerBase {
    Decimal,
    Hex,
    Octal,
    Binary,
}

impl IntegerBase {
    /// Classify a raw literal by its prefix (`0x`, `0b`, leading `0`).
    pub fn detect(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("0x") {
            IntegerBase::Hex
        } else if lower.starts_with("0b") {
            IntegerBase::Binary
        } else if lower.starts_with("0o")
            || (lower.len() > 1
                && lower.starts_with('0')
                && lower[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            IntegerBase::Octal
        } else {
            IntegerBase::Decimal
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct IntegerLiteral {
    pub base: IntegerBase,
    /* Source spelling including prefix and suffix, e.g. "0xFFu" */
    pub raw: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum UnaryOperator {
    Neg,
    Plus,
    BitNot,
    LogicalNot,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct BinaryExpr {
    pub op: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct UnaryExpr {
    pub op: UnaryOperator,
    pub operand: Box<Expression>,
}

/// Constant expression used for array bounds, enum initializers and macro values.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub enum Expression {
    IntegerLiteral(IntegerLiteral),
    FloatLiteral(String),
    StringLiteral(String),
    /// Raw spelling including quotes, e.g. `'A'` or `'\n'`.
    CharLiteral(String),
    /// Reference to an enum constant or macro.
    Identifier(String),
    BinaryOp(BinaryExpr),
    UnaryOp(UnaryExpr),
    /// Source text the front end could not break down (casts, calls, ...).
    Opaque(String),
}

impl Expression {
    pub fn int(raw: &str) -> Self {
        Expression::IntegerLiteral(IntegerLiteral {
            base: IntegerBase::detect(raw),
            raw: raw.to_string(),
        })
    }

    pub fn ident(name: &str) -> Self {
        Expression::Identifier(name.to_string())
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::UnaryOp(UnaryExpr {
            op,
            operand: Box::new(operand),
        })
    }
}
