//! Recursive-descent parser following Python's expression precedence.
//!
//! From loosest to tightest binding:
//!
//! | level | forms |
//! |---|---|
//! | or | `a or b` |
//! | and | `a and b` |
//! | not | `not a` |
//! | comparison | `a < b`, chains `a < b <= c` |
//! | sum | `+ -` |
//! | term | `* / // %` |
//! | factor | unary `- +` |
//! | power | `a ** b` (right associative, binds tighter than unary on its left) |
//! | postfix | `.attr`, `[index]`, `builtin(args)` |

use crate::ast::{BinaryOp, CmpOp, Literal, Node, UnaryOp};
use crate::builtins::Builtin;
use crate::error::ExprError;
use crate::token::{tokenize, Token, TokenKind};

/// Maximum nesting depth accepted by the parser.
pub const MAX_DEPTH: usize = 64;

/// Parses `source` into a syntax tree.
///
/// # Errors
///
/// Returns the first lexical or syntactic error encountered.
pub fn parse(source: &str) -> Result<Node, ExprError> {
    let tokens = tokenize(source)?;
    if matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::Eof)) {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.or_expr()?;
    parser.expect(&TokenKind::Eof, "end of input")?;
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize() always terminates with Eof and advance() never moves past it.
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<Token, ExprError> {
        if &self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &'static str) -> ExprError {
        let token = self.peek();
        ExprError::UnexpectedToken {
            found: token.kind.to_string(),
            expected,
            pos: token.pos,
        }
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Releases the levels an operator loop took for its left-nested chain.
    fn ascend_by(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn or_expr(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.and_expr()?;
        let mut nested = 0;
        while self.eat(&TokenKind::Or) {
            self.descend()?;
            nested += 1;
            let rhs = self.and_expr()?;
            lhs = Node::Or(Box::new(lhs), Box::new(rhs));
        }
        self.ascend_by(nested);
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.not_expr()?;
        let mut nested = 0;
        while self.eat(&TokenKind::And) {
            self.descend()?;
            nested += 1;
            let rhs = self.not_expr()?;
            lhs = Node::And(Box::new(lhs), Box::new(rhs));
        }
        self.ascend_by(nested);
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Node, ExprError> {
        if self.eat(&TokenKind::Not) {
            self.descend()?;
            let operand = self.not_expr()?;
            self.ascend();
            return Ok(Node::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node, ExprError> {
        let first = self.sum()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::Le => CmpOp::Le,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::Ge => CmpOp::Ge,
                TokenKind::EqEq => CmpOp::Eq,
                TokenKind::Ne => CmpOp::Ne,
                _ => break,
            };
            self.advance();
            rest.push((op, self.sum()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Node::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn sum(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.term()?;
        let mut nested = 0;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.descend()?;
            nested += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
        self.ascend_by(nested);
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Node, ExprError> {
        let mut lhs = self.factor()?;
        let mut nested = 0;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::SlashSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.descend()?;
            nested += 1;
            let rhs = self.factor()?;
            lhs = binary(op, lhs, rhs);
        }
        self.ascend_by(nested);
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Node, ExprError> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Pos),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            self.descend()?;
            let operand = self.factor()?;
            self.ascend();
            return Ok(Node::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.power()
    }

    fn power(&mut self) -> Result<Node, ExprError> {
        let base = self.postfix()?;
        if self.eat(&TokenKind::StarStar) {
            self.descend()?;
            let exponent = self.factor()?;
            self.ascend();
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Node, ExprError> {
        let mut node = self.atom()?;
        let mut nested = 0;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    self.descend()?;
                    nested += 1;
                    let token = self.advance();
                    let TokenKind::Ident(attr) = token.kind else {
                        return Err(ExprError::UnexpectedToken {
                            found: token.kind.to_string(),
                            expected: "attribute name",
                            pos: token.pos,
                        });
                    };
                    node = Node::Attr {
                        target: Box::new(node),
                        attr,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.descend()?;
                    nested += 1;
                    let index = self.or_expr()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    node = Node::Index {
                        target: Box::new(node),
                        index: Box::new(index),
                    };
                }
                TokenKind::LParen => {
                    return Err(ExprError::NotCallable {
                        pos: self.peek().pos,
                    });
                }
                _ => break,
            }
        }
        self.ascend_by(nested);
        Ok(node)
    }

    fn atom(&mut self) -> Result<Node, ExprError> {
        let token = self.advance();
        let node = match token.kind {
            TokenKind::Int(v) => Node::Literal(Literal::Int(v)),
            TokenKind::Float(v) => Node::Literal(Literal::Float(v)),
            TokenKind::Str(s) => Node::Literal(Literal::Str(s)),
            TokenKind::True => Node::Literal(Literal::Bool(true)),
            TokenKind::False => Node::Literal(Literal::Bool(false)),
            TokenKind::None => Node::Literal(Literal::None),
            TokenKind::Ident(name) => {
                if self.peek().kind == TokenKind::LParen {
                    return self.call(name, token.pos);
                }
                Node::Name(name)
            }
            TokenKind::LParen => {
                self.descend()?;
                let inner = self.or_expr()?;
                self.ascend();
                self.expect(&TokenKind::RParen, "')'")?;
                inner
            }
            other => {
                return Err(ExprError::UnexpectedToken {
                    found: other.to_string(),
                    expected: "an expression",
                    pos: token.pos,
                });
            }
        };
        Ok(node)
    }

    fn call(&mut self, name: String, pos: usize) -> Result<Node, ExprError> {
        let func = Builtin::from_name(&name).ok_or(ExprError::UnknownFunction { name, pos })?;
        self.expect(&TokenKind::LParen, "'('")?;
        self.descend()?;

        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.or_expr()?);
                if self.eat(&TokenKind::Comma) {
                    // Trailing comma
                    if self.eat(&TokenKind::RParen) {
                        break;
                    }
                    continue;
                }
                self.expect(&TokenKind::RParen, "',' or ')'")?;
                break;
            }
        }
        self.ascend();
        Ok(Node::Call { func, args })
    }
}

fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
    Node::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
