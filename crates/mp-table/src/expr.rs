//! Expression engine for selections and weights over table columns.
//!
//! Supports arithmetic (`+ - * / %`), comparisons (`== != < <= > >=`),
//! boolean operators (`&& || !`) and the built-in functions `abs`, `sqrt`,
//! `log`, `exp`, `pow`, `min`, `max`.
//!
//! Column references may be qualified with a friend alias (`nn.score`);
//! the qualifier is kept as part of the referenced name and resolved by
//! [`JoinedView`](crate::JoinedView).

use std::fmt;

use crate::error::{Result, TableError};

// ── AST ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Var(usize), // index into required_branches
    Neg(Box<Expr>),
    Not(Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Abs,
    Sqrt,
    Log,
    Exp,
    Pow,
    Min,
    Max,
}

impl Func {
    fn from_name(name: &str) -> Option<(Self, usize)> {
        Some(match name {
            "abs" => (Func::Abs, 1),
            "sqrt" => (Func::Sqrt, 1),
            "log" => (Func::Log, 1),
            "exp" => (Func::Exp, 1),
            "pow" => (Func::Pow, 2),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            _ => return None,
        })
    }
}

// ── Compiled expression ────────────────────────────────────────

/// A compiled expression ready for evaluation.
///
/// Compilation happens once; evaluation walks the AST per row with the
/// referenced column values supplied positionally.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    ast: Expr,
    /// Column names referenced by this expression (ordered by first occurrence).
    pub required_branches: Vec<String>,
}

impl CompiledExpr {
    /// Parse and compile an expression string.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(TableError::Expression("empty expression".into()));
        }
        let mut parser = Parser::new(&tokens);
        let ast = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(TableError::Expression(format!(
                "unexpected token after expression: {tok:?} in '{input}'"
            )));
        }
        let branches = std::mem::take(&mut parser.branches);
        Ok(CompiledExpr { source: input.trim().to_string(), ast, required_branches: branches })
    }

    /// Source text this expression was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Alias qualifiers used by column references (`nn` for `nn.score`), deduplicated.
    pub fn qualifiers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for b in &self.required_branches {
            if let Some((q, _)) = b.split_once('.') {
                if !out.contains(&q) {
                    out.push(q);
                }
            }
        }
        out
    }

    /// Rewrite references `alias.col` to the local column `col`.
    ///
    /// Used when a friend source becomes the target of a join: its own
    /// columns are then addressed without qualification.
    pub fn strip_qualifier(&self, alias: &str) -> CompiledExpr {
        let prefix = format!("{alias}.");
        let mut branches: Vec<String> = Vec::with_capacity(self.required_branches.len());
        let remap: Vec<usize> = self
            .required_branches
            .iter()
            .map(|b| {
                let name = b.strip_prefix(&prefix).unwrap_or(b);
                match branches.iter().position(|x| x == name) {
                    Some(i) => i,
                    None => {
                        branches.push(name.to_string());
                        branches.len() - 1
                    }
                }
            })
            .collect();
        CompiledExpr {
            source: strip_in_source(&self.source, &prefix),
            ast: remap_vars(&self.ast, &remap),
            required_branches: branches,
        }
    }

    /// Evaluate the expression for a single row.
    ///
    /// `values` must have the same length and order as `required_branches`.
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        eval_expr(&self.ast, values)
    }

    /// Evaluate the expression for `n_rows` rows (column-wise input).
    ///
    /// `columns` must have the same length and order as `required_branches`;
    /// each column must hold at least `n_rows` entries.
    pub fn eval_bulk(&self, columns: &[&[f64]], n_rows: usize) -> Vec<f64> {
        let mut row = vec![0.0f64; columns.len()];
        let mut out = Vec::with_capacity(n_rows);
        for i in 0..n_rows {
            for (j, col) in columns.iter().enumerate() {
                row[j] = col[i];
            }
            out.push(eval_expr(&self.ast, &row));
        }
        out
    }
}

impl fmt::Display for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Selection truthiness: finite and non-zero.
#[inline]
pub fn is_selected(v: f64) -> bool {
    v != 0.0 && v.is_finite()
}

/// Drop `prefix` where it starts a column reference.
fn strip_in_source(source: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(pos) = rest.find(prefix) {
        out.push_str(&rest[..pos]);
        let joined = out.chars().last().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if joined || out.ends_with('.') {
            out.push_str(prefix);
        }
        rest = &rest[pos + prefix.len()..];
    }
    out.push_str(rest);
    out
}

fn remap_vars(e: &Expr, remap: &[usize]) -> Expr {
    match e {
        Expr::Number(n) => Expr::Number(*n),
        Expr::Var(i) => Expr::Var(remap[*i]),
        Expr::Neg(a) => Expr::Neg(Box::new(remap_vars(a, remap))),
        Expr::Not(a) => Expr::Not(Box::new(remap_vars(a, remap))),
        Expr::BinOp(op, a, b) => {
            Expr::BinOp(*op, Box::new(remap_vars(a, remap)), Box::new(remap_vars(b, remap)))
        }
        Expr::Call(f, args) => Expr::Call(*f, args.iter().map(|a| remap_vars(a, remap)).collect()),
    }
}

// ── Evaluation ─────────────────────────────────────────────────

#[inline]
fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn eval_expr(e: &Expr, vals: &[f64]) -> f64 {
    match e {
        Expr::Number(n) => *n,
        Expr::Var(i) => vals[*i],
        Expr::Neg(a) => -eval_expr(a, vals),
        Expr::Not(a) => truth(!is_selected(eval_expr(a, vals))),
        Expr::BinOp(BinOp::And, a, b) => {
            truth(is_selected(eval_expr(a, vals)) && is_selected(eval_expr(b, vals)))
        }
        Expr::BinOp(BinOp::Or, a, b) => {
            truth(is_selected(eval_expr(a, vals)) || is_selected(eval_expr(b, vals)))
        }
        Expr::BinOp(op, a, b) => apply_binop(*op, eval_expr(a, vals), eval_expr(b, vals)),
        Expr::Call(f, args) => {
            let a0 = || eval_expr(&args[0], vals);
            let a1 = || eval_expr(&args[1], vals);
            match f {
                Func::Abs => a0().abs(),
                Func::Sqrt => a0().sqrt(),
                Func::Log => a0().ln(),
                Func::Exp => a0().exp(),
                Func::Pow => a0().powf(a1()),
                Func::Min => a0().min(a1()),
                Func::Max => a0().max(a1()),
            }
        }
    }
}

fn apply_binop(op: BinOp, lhs: f64, rhs: f64) -> f64 {
    match op {
        BinOp::Add => lhs + rhs,
        BinOp::Sub => lhs - rhs,
        BinOp::Mul => lhs * rhs,
        BinOp::Div => lhs / rhs,
        BinOp::Rem => lhs % rhs,
        BinOp::Eq => truth(lhs == rhs),
        BinOp::Ne => truth(lhs != rhs),
        BinOp::Lt => truth(lhs < rhs),
        BinOp::Le => truth(lhs <= rhs),
        BinOp::Gt => truth(lhs > rhs),
        BinOp::Ge => truth(lhs >= rhs),
        BinOp::And => truth(is_selected(lhs) && is_selected(rhs)),
        BinOp::Or => truth(is_selected(lhs) || is_selected(rhs)),
    }
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let two = bytes.get(i..i + 2);
        let pair = match two {
            Some(b"&&") => Some(Token::And),
            Some(b"||") => Some(Token::Or),
            Some(b"==") => Some(Token::Eq),
            Some(b"!=") => Some(Token::Ne),
            Some(b"<=") => Some(Token::Le),
            Some(b">=") => Some(Token::Ge),
            _ => None,
        };
        if let Some(t) = pair {
            tokens.push(t);
            i += 2;
            continue;
        }

        let single = match c {
            b'+' => Some(Token::Plus),
            b'-' => Some(Token::Minus),
            b'*' => Some(Token::Star),
            b'/' => Some(Token::Slash),
            b'%' => Some(Token::Percent),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b',' => Some(Token::Comma),
            b'<' => Some(Token::Lt),
            b'>' => Some(Token::Gt),
            b'!' => Some(Token::Not),
            _ => None,
        };
        if let Some(t) = single {
            tokens.push(t);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == b'.' {
            let start = i;
            while i < bytes.len() {
                let d = bytes[i];
                let exp_sign = (d == b'+' || d == b'-')
                    && i > start
                    && (bytes[i - 1] == b'e' || bytes[i - 1] == b'E');
                if d.is_ascii_digit() || d == b'.' || d == b'e' || d == b'E' || exp_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            let s = &input[start..i];
            let n: f64 = s
                .parse()
                .map_err(|_| TableError::Expression(format!("invalid number: '{s}'")))?;
            tokens.push(Token::Num(n));
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
            {
                i += 1;
            }
            let ident = &input[start..i];
            if ident.ends_with('.') || ident.contains("..") {
                return Err(TableError::Expression(format!("malformed column name: '{ident}'")));
            }
            tokens.push(Token::Ident(ident.to_string()));
        } else {
            let ch = input[i..].chars().next().unwrap_or('?');
            return Err(TableError::Expression(format!("unexpected character: '{ch}'")));
        }
    }

    Ok(tokens)
}

// ── Parser (recursive descent) ─────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    branches: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0, branches: Vec::new() }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => {
                Err(TableError::Expression(format!("expected {expected:?}, got {other:?}")))
            }
        }
    }

    fn resolve_var(&mut self, name: &str) -> usize {
        if let Some(i) = self.branches.iter().position(|b| b == name) {
            i
        } else {
            self.branches.push(name.to_string());
            self.branches.len() - 1
        }
    }

    // ── Grammar rules ──────────────────────────────────────────

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::BinOp(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = Expr::BinOp(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_add()?;
        Ok(Expr::BinOp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            Some(Token::Not) => {
                self.advance();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.advance().cloned() {
            Some(Token::Num(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let e = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Ident(name)) if matches!(self.peek(), Some(Token::LParen)) => {
                self.advance(); // '('
                let (func, arity) = Func::from_name(&name).ok_or_else(|| {
                    TableError::Expression(format!("unknown function: '{name}'"))
                })?;
                let mut args = vec![self.parse_or()?];
                while matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                    args.push(self.parse_or()?);
                }
                self.expect(&Token::RParen)?;
                if args.len() != arity {
                    return Err(TableError::Expression(format!(
                        "{name}() takes {arity} argument(s), got {}",
                        args.len()
                    )));
                }
                Ok(Expr::Call(func, args))
            }
            Some(Token::Ident(name)) => Ok(Expr::Var(self.resolve_var(&name))),
            other => Err(TableError::Expression(format!(
                "expected number, column, or '(', got {other:?}"
            ))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
