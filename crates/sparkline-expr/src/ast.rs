//! Syntax tree produced by the parser.

use std::collections::BTreeSet;

use crate::builtins::Builtin;

/// Literal constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Pos,
    /// `not x`
    Not,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (true division)
    Div,
    /// `//` (floor division)
    FloorDiv,
    /// `%` (sign follows the divisor)
    Mod,
    /// `**`
    Pow,
}

impl BinaryOp {
    /// The operator as written in source.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

/// Comparison operators. Chains like `a < b < c` are kept together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl CmpOp {
    /// The operator as written in source.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A constant
    Literal(Literal),
    /// A root variable looked up in the scope
    Name(String),
    /// `target.attr`
    Attr {
        /// Receiver
        target: Box<Node>,
        /// Attribute name
        attr: String,
    },
    /// `target[index]`
    Index {
        /// Receiver
        target: Box<Node>,
        /// Subscript expression
        index: Box<Node>,
    },
    /// Call of a whitelisted builtin
    Call {
        /// Resolved builtin
        func: Builtin,
        /// Argument expressions
        args: Vec<Node>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Node>,
    },
    /// Arithmetic operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Node>,
        /// Right operand
        rhs: Box<Node>,
    },
    /// Comparison chain `first op1 x1 op2 x2 ...`
    Compare {
        /// Leftmost operand
        first: Box<Node>,
        /// Remaining (operator, operand) pairs
        rest: Vec<(CmpOp, Node)>,
    },
    /// Short-circuit `and`
    And(Box<Node>, Box<Node>),
    /// Short-circuit `or`
    Or(Box<Node>, Box<Node>),
}

impl Node {
    /// Collects the root variable names referenced anywhere in this tree.
    pub fn collect_names<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::Name(name) => {
                names.insert(name);
            }
            Self::Attr { target, .. } => target.collect_names(names),
            Self::Index { target, index } => {
                target.collect_names(names);
                index.collect_names(names);
            }
            Self::Call { args, .. } => args.iter().for_each(|a| a.collect_names(names)),
            Self::Unary { operand, .. } => operand.collect_names(names),
            Self::Binary { lhs, rhs, .. } | Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.collect_names(names);
                rhs.collect_names(names);
            }
            Self::Compare { first, rest } => {
                first.collect_names(names);
                rest.iter().for_each(|(_, n)| n.collect_names(names));
            }
        }
    }
}
