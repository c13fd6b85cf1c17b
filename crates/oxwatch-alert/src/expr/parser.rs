use super::lexer::Token;
use crate::error::{ExprError, Result};
use oxwatch_common::types::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Pos(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `a < b <= c` keeps every operand so each is evaluated once.
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// Deepest expression tree the parser builds, and deepest descent it makes
/// while building one. Input past it is rejected as malformed.
const MAX_DEPTH: usize = 256;

/// A parsed subtree with its height.
type Node = (Expr, usize);

fn height<'e>(children: impl IntoIterator<Item = &'e Node>) -> usize {
    1 + children.into_iter().map(|(_, d)| *d).max().unwrap_or(0)
}

/// Recursive descent parser with Python-like precedence:
/// `or` < `and` < `not` < comparisons < `+ -` < `* / // %` < unary < `**`.
pub(crate) struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
            nesting: 0,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(ExprError::malformed(self.src, "empty expression"));
        }
        let (expr, _) = self.or()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(self.unexpected(&token.clone())),
        }
    }

    fn too_deep(&self) -> ExprError {
        ExprError::malformed(self.src, "expression nested too deeply")
    }

    /// Runs `f` one level deeper, failing once the descent passes [`MAX_DEPTH`].
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<Node>) -> Result<Node> {
        if self.nesting >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let node = f(self);
        self.nesting -= 1;
        node
    }

    fn node(&self, expr: Expr, depth: usize) -> Result<Node> {
        if depth > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok((expr, depth))
    }

    fn boxed(&self, wrap: impl FnOnce(Box<Expr>) -> Expr, (inner, depth): Node) -> Result<Node> {
        self.node(wrap(Box::new(inner)), depth + 1)
    }

    fn pair(
        &self,
        wrap: impl FnOnce(Box<Expr>, Box<Expr>) -> Expr,
        left: Node,
        right: Node,
    ) -> Result<Node> {
        let depth = height([&left, &right]);
        self.node(wrap(Box::new(left.0), Box::new(right.0)), depth)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if &t == token => Ok(()),
            Some(t) => Err(self.unexpected(&t)),
            None => Err(ExprError::malformed(
                self.src,
                format!("expected '{token}' before end of expression"),
            )),
        }
    }

    fn unexpected(&self, token: &Token) -> ExprError {
        ExprError::malformed(self.src, format!("unexpected '{token}'"))
    }

    fn or(&mut self) -> Result<Node> {
        self.nested(|p| {
            let mut left = p.and()?;
            while p.eat(&Token::Or) {
                let right = p.and()?;
                left = p.pair(Expr::Or, left, right)?;
            }
            Ok(left)
        })
    }

    fn and(&mut self) -> Result<Node> {
        let mut left = self.not()?;
        while self.eat(&Token::And) {
            let right = self.not()?;
            left = self.pair(Expr::And, left, right)?;
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Node> {
        if self.eat(&Token::Not) {
            let inner = self.nested(Self::not)?;
            return self.boxed(Expr::Not, inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node> {
        let first = self.additive()?;
        let mut depth = first.1;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::Ne) => CompareOp::Ne,
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let (operand, d) = self.additive()?;
            depth = depth.max(d);
            rest.push((op, operand));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            self.node(Expr::Compare(Box::new(first.0), rest), depth + 1)
        }
    }

    fn additive(&mut self) -> Result<Node> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = self.pair(|l, r| Expr::Binary(op, l, r), left, right)?;
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Node> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = self.pair(|l, r| Expr::Binary(op, l, r), left, right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Node> {
        self.nested(|p| {
            if p.eat(&Token::Minus) {
                let inner = p.unary()?;
                return p.boxed(Expr::Neg, inner);
            }
            if p.eat(&Token::Plus) {
                let inner = p.unary()?;
                return p.boxed(Expr::Pos, inner);
            }
            p.power()
        })
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.postfix()?;
        if self.eat(&Token::DoubleStar) {
            // right associative, and binds tighter than a unary minus on its left
            let exponent = self.unary()?;
            return self.pair(|b, e| Expr::Binary(BinaryOp::Pow, b, e), base, exponent);
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Node> {
        let mut expr = self.primary()?;
        while self.eat(&Token::LBracket) {
            let index = self.or()?;
            self.expect(&Token::RBracket)?;
            expr = self.pair(Expr::Index, expr, index)?;
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Node> {
        let token = self
            .advance()
            .ok_or_else(|| ExprError::malformed(self.src, "unexpected end of expression"))?;

        match token {
            Token::Int(i) => Ok((Expr::Literal(Value::Int(i)), 1)),
            Token::Float(f) => Ok((Expr::Literal(Value::Float(f)), 1)),
            Token::Str(s) => Ok((Expr::Literal(Value::Str(s)), 1)),
            Token::True => Ok((Expr::Literal(Value::Bool(true)), 1)),
            Token::False => Ok((Expr::Literal(Value::Bool(false)), 1)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.items(&Token::RParen)?;
                    let depth = height(&args);
                    self.node(Expr::Call(name, args.into_iter().map(|(e, _)| e).collect()), depth)
                } else {
                    Ok((Expr::Name(name), 1))
                }
            }
            Token::LParen => {
                let inner = self.or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let items = self.items(&Token::RBracket)?;
                let depth = height(&items);
                self.node(Expr::List(items.into_iter().map(|(e, _)| e).collect()), depth)
            }
            other => Err(self.unexpected(&other)),
        }
    }

    /// Comma separated expressions up to `close`; a trailing comma is allowed.
    fn items(&mut self, close: &Token) -> Result<Vec<Node>> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.or()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma)?;
            if self.eat(close) {
                return Ok(items);
            }
        }
    }
}
