// ABOUTME: Recursive-descent parser with multi-token lookahead for range headers

use crate::ast::{BinOp, Block, Expr, ForKind, ForRange, ForStmt, Module, Stmt, UnaryOp};
use crate::error::{ParseError, Pos};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use std::collections::VecDeque;

/// Parse a whole module (top-level statement list).
pub fn parse_module(src: &str, path: &str) -> Result<Module, ParseError> {
    let mut parser = Parser::new(Lexer::new(src))?;
    let mut stmts = Vec::new();
    loop {
        parser.skip_semis()?;
        if parser.cur.kind == TokenKind::Eof {
            break;
        }
        stmts.push(parser.parse_stmt(true)?);
    }
    Ok(Module {
        path: path.to_string(),
        stmts,
    })
}

/// Parse a single expression, positioned inside the host's own source.
pub fn parse_expression(src: &str, start: Pos) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(Lexer::new_at(src, start))?;
    parser.skip_semis()?;
    let expr = parser.parse_expr()?;
    parser.skip_semis()?;
    if parser.cur.kind != TokenKind::Eof {
        return Err(ParseError::new(
            parser.cur.pos,
            format!("unexpected {} after expression", parser.cur.kind.describe()),
        ));
    }
    Ok(expr)
}

struct Parser {
    lexer: Lexer,
    cur: Token,
    peek: Token,
    /// Overflow lookahead beyond `peek`, filled on demand by `kind_at`.
    buf: VecDeque<Token>,
    loop_depth: u32,
}

impl Parser {
    fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        let parser = Self {
            lexer,
            cur,
            peek,
            buf: VecDeque::new(),
            loop_depth: 0,
        };
        parser.check_cur()?;
        Ok(parser)
    }

    fn check_cur(&self) -> Result<(), ParseError> {
        if let TokenKind::Illegal(msg) = &self.cur.kind {
            return Err(ParseError::new(self.cur.pos, msg.clone()));
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        let next = match self.buf.pop_front() {
            Some(tok) => tok,
            None => self.lexer.next_token(),
        };
        self.cur = std::mem::replace(&mut self.peek, next);
        self.check_cur()
    }

    /// Token kind at offset `n` from the current token (0 = current,
    /// 1 = peek, up to 4 for range-header detection).
    fn kind_at(&mut self, n: usize) -> TokenKind {
        match n {
            0 => self.cur.kind.clone(),
            1 => self.peek.kind.clone(),
            _ => {
                while self.buf.len() < n - 1 {
                    let tok = self.lexer.next_token();
                    self.buf.push_back(tok);
                }
                self.buf[n - 2].kind.clone()
            }
        }
    }

    fn skip_semis(&mut self) -> Result<(), ParseError> {
        while matches!(self.cur.kind, TokenKind::Semi | TokenKind::AutoSemi) {
            self.advance()?;
        }
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Pos, ParseError> {
        if self.cur.kind == kind {
            let pos = self.cur.pos;
            self.advance()?;
            Ok(pos)
        } else {
            Err(ParseError::new(
                self.cur.pos,
                format!("expected {}, found {}", what, self.cur.kind.describe()),
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Pos), ParseError> {
        match &self.cur.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let pos = self.cur.pos;
                self.advance()?;
                Ok((name, pos))
            }
            other => Err(ParseError::new(
                self.cur.pos,
                format!("expected {}, found {}", what, other.describe()),
            )),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_stmt(&mut self, top: bool) -> Result<Stmt, ParseError> {
        match self.cur.kind {
            TokenKind::Export => {
                if !top {
                    return Err(ParseError::new(
                        self.cur.pos,
                        "export is only allowed at module top level",
                    ));
                }
                self.advance()?;
                match self.cur.kind {
                    TokenKind::Let | TokenKind::Const => self.parse_let(true),
                    TokenKind::Fn => self.parse_fn(true),
                    _ => Err(ParseError::new(
                        self.cur.pos,
                        "export must be followed by let, const or fn",
                    )),
                }
            }
            TokenKind::Let | TokenKind::Const => self.parse_let(false),
            TokenKind::Fn => self.parse_fn(false),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                let pos = self.cur.pos;
                if self.loop_depth == 0 {
                    return Err(ParseError::new(pos, "break outside loop"));
                }
                self.advance()?;
                Ok(Stmt::Break(pos))
            }
            TokenKind::Continue => {
                let pos = self.cur.pos;
                if self.loop_depth == 0 {
                    return Err(ParseError::new(pos, "continue outside loop"));
                }
                self.advance()?;
                Ok(Stmt::Continue(pos))
            }
            TokenKind::Return => {
                let pos = self.cur.pos;
                self.advance()?;
                let value = if matches!(
                    self.cur.kind,
                    TokenKind::Semi | TokenKind::AutoSemi | TokenKind::RBrace | TokenKind::Eof
                ) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                Ok(Stmt::Return { value, pos })
            }
            TokenKind::Ident(_) if self.peek.kind == TokenKind::Assign => self.parse_assign(),
            _ => Ok(Stmt::ExprStmt(self.parse_expr()?)),
        }
    }

    fn parse_let(&mut self, export: bool) -> Result<Stmt, ParseError> {
        let pos = self.cur.pos;
        let is_const = self.cur.kind == TokenKind::Const;
        self.advance()?;
        let (name, _) = self.expect_ident("binding name")?;
        self.expect(TokenKind::Assign, "'='")?;
        let value = self.parse_expr()?;
        Ok(Stmt::Let {
            name,
            value,
            is_const,
            export,
            pos,
        })
    }

    fn parse_assign(&mut self) -> Result<Stmt, ParseError> {
        let (name, pos) = self.expect_ident("assignment target")?;
        self.expect(TokenKind::Assign, "'='")?;
        let value = self.parse_expr()?;
        Ok(Stmt::Assign { name, value, pos })
    }

    fn parse_fn(&mut self, export: bool) -> Result<Stmt, ParseError> {
        let pos = self.cur.pos;
        self.advance()?; // fn
        let (name, _) = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while self.cur.kind != TokenKind::RParen {
            let (param, param_pos) = self.expect_ident("parameter name")?;
            if params.contains(&param) {
                return Err(ParseError::new(
                    param_pos,
                    format!("duplicate parameter name '{}'", param),
                ));
            }
            params.push(param);
            if self.cur.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        // The body is a fresh loop context: break/continue may not cross a
        // function boundary.
        let saved_depth = self.loop_depth;
        self.loop_depth = 0;
        let body = self.parse_block();
        self.loop_depth = saved_depth;
        Ok(Stmt::FnDef {
            name,
            params,
            body: body?,
            export,
            pos,
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let pos = self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        self.skip_semis()?;
        while !matches!(self.cur.kind, TokenKind::RBrace | TokenKind::Eof) {
            stmts.push(self.parse_stmt(false)?);
            self.skip_semis()?;
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Block { stmts, pos })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.cur.pos;
        self.advance()?; // if
        let cond = self.parse_expr()?;
        let then = self.parse_block()?;
        let mut elifs = Vec::new();
        let mut els = None;
        loop {
            // A newline after `}` inserted a terminator; look past it for
            // elif/else chains written across lines.
            self.skip_semis()?;
            match self.cur.kind {
                TokenKind::Elif => {
                    self.advance()?;
                    let c = self.parse_expr()?;
                    let b = self.parse_block()?;
                    elifs.push((c, b));
                }
                TokenKind::Else => {
                    self.advance()?;
                    els = Some(self.parse_block()?);
                    break;
                }
                _ => break,
            }
        }
        Ok(Stmt::If {
            cond,
            then,
            elifs,
            els,
            pos,
        })
    }

    // ========================================================================
    // for loops: unconditional, condition-only, classic, range
    // ========================================================================

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.cur.pos;
        self.advance()?; // for

        if self.cur.kind == TokenKind::Const {
            return Err(ParseError::new(
                self.cur.pos,
                "const is not allowed in a for loop header",
            ));
        }

        let kind = if self.cur.kind == TokenKind::LBrace {
            ForKind::Cond(None)
        } else if self.looks_like_range() {
            ForKind::Range(self.parse_range_header()?)
        } else if self.cur.kind == TokenKind::Semi {
            self.advance()?;
            self.parse_classic_tail(None)?
        } else if matches!(self.cur.kind, TokenKind::Let)
            || (matches!(self.cur.kind, TokenKind::Ident(_))
                && self.peek.kind == TokenKind::Assign)
        {
            let init = self.parse_for_init()?;
            self.expect(TokenKind::Semi, "';'")?;
            self.parse_classic_tail(Some(Box::new(init)))?
        } else {
            let expr = self.parse_expr()?;
            if self.cur.kind == TokenKind::Semi {
                self.advance()?;
                self.parse_classic_tail(Some(Box::new(Stmt::ExprStmt(expr))))?
            } else {
                ForKind::Cond(Some(expr))
            }
        };

        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;

        Ok(Stmt::For(ForStmt {
            kind,
            body: body?,
            pos,
        }))
    }

    /// `[let] IDENT [, IDENT] range` needs up to four tokens of lookahead.
    fn looks_like_range(&mut self) -> bool {
        let mut idx = 0;
        if matches!(self.kind_at(0), TokenKind::Let) {
            idx = 1;
        }
        if !matches!(self.kind_at(idx), TokenKind::Ident(_)) {
            return false;
        }
        match self.kind_at(idx + 1) {
            TokenKind::Range => true,
            TokenKind::Comma => {
                matches!(self.kind_at(idx + 2), TokenKind::Ident(_))
                    && matches!(self.kind_at(idx + 3), TokenKind::Range)
            }
            _ => false,
        }
    }

    fn parse_range_header(&mut self) -> Result<ForRange, ParseError> {
        let declare = self.cur.kind == TokenKind::Let;
        if declare {
            self.advance()?;
        }
        let (key, _) = self.expect_ident("loop variable")?;
        let value = if self.cur.kind == TokenKind::Comma {
            self.advance()?;
            let (name, name_pos) = self.expect_ident("loop variable")?;
            if name == key && name != "_" {
                return Err(ParseError::new(
                    name_pos,
                    "for range variables must be distinct",
                ));
            }
            Some(name)
        } else {
            None
        };
        self.expect(TokenKind::Range, "'range'")?;
        let source = self.parse_expr()?;
        Ok(ForRange {
            key,
            value,
            source,
            declare,
        })
    }

    fn parse_for_init(&mut self) -> Result<Stmt, ParseError> {
        match self.cur.kind {
            TokenKind::Let => self.parse_let(false),
            TokenKind::Ident(_) if self.peek.kind == TokenKind::Assign => self.parse_assign(),
            _ => Ok(Stmt::ExprStmt(self.parse_expr()?)),
        }
    }

    fn parse_classic_tail(&mut self, init: Option<Box<Stmt>>) -> Result<ForKind, ParseError> {
        let cond = if self.cur.kind == TokenKind::Semi {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semi, "';'")?;
        let post = if self.cur.kind == TokenKind::LBrace {
            None
        } else {
            if matches!(self.cur.kind, TokenKind::Let | TokenKind::Const) {
                return Err(ParseError::new(
                    self.cur.pos,
                    "declarations are not allowed in a for post statement",
                ));
            }
            let stmt = match self.cur.kind {
                TokenKind::Ident(_) if self.peek.kind == TokenKind::Assign => self.parse_assign()?,
                _ => Stmt::ExprStmt(self.parse_expr()?),
            };
            Some(Box::new(stmt))
        };
        Ok(ForKind::Classic { init, cond, post })
    }

    // ========================================================================
    // Expressions, lowest to highest precedence
    // ========================================================================

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_coalesce()?;
        if self.cur.kind != TokenKind::Question {
            return Ok(cond);
        }
        let pos = self.cur.pos;
        self.advance()?;
        let then = self.parse_expr()?;
        self.expect(TokenKind::Colon, "':'")?;
        // Right-associative: the else branch swallows any further ternary.
        let els = self.parse_expr()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            els: Box::new(els),
            pos,
        })
    }

    fn parse_coalesce(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_or()?;
        while self.cur.kind == TokenKind::Coalesce {
            let pos = self.cur.pos;
            self.advance()?;
            let right = self.parse_or()?;
            left = Expr::Binary {
                op: BinOp::Coalesce,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.cur.kind == TokenKind::Or {
            let pos = self.cur.pos;
            self.advance()?;
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.cur.kind == TokenKind::And {
            let pos = self.cur.pos;
            self.advance()?;
            let right = self.parse_equality()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                _ => break,
            };
            let pos = self.cur.pos;
            self.advance()?;
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::GtEq => BinOp::GtEq,
                _ => break,
            };
            let pos = self.cur.pos;
            self.advance()?;
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let pos = self.cur.pos;
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let pos = self.cur.pos;
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.cur.kind {
            TokenKind::Try => {
                let pos = self.cur.pos;
                self.advance()?;
                let expr = self.parse_unary()?;
                Ok(Expr::Try {
                    expr: Box::new(expr),
                    pos,
                })
            }
            TokenKind::Not => {
                let pos = self.cur.pos;
                self.advance()?;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                    pos,
                })
            }
            TokenKind::Minus => {
                let pos = self.cur.pos;
                self.advance()?;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                    pos,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.cur.kind {
                TokenKind::LParen => {
                    let pos = self.cur.pos;
                    self.advance()?;
                    let mut args = Vec::new();
                    while self.cur.kind != TokenKind::RParen {
                        args.push(self.parse_expr()?);
                        if self.cur.kind == TokenKind::Comma {
                            self.advance()?;
                        } else {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        pos,
                    };
                }
                TokenKind::LBracket => {
                    let pos = self.cur.pos;
                    self.advance()?;
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        pos,
                    };
                }
                TokenKind::Dot => {
                    let pos = self.cur.pos;
                    self.advance()?;
                    let (name, _) = self.expect_ident("member name")?;
                    expr = Expr::Member {
                        target: Box::new(expr),
                        name,
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.cur.pos;
        match self.cur.kind.clone() {
            TokenKind::Number(n) => {
                self.advance()?;
                Ok(Expr::NumLit(n, pos))
            }
            TokenKind::Str(s) => {
                self.advance()?;
                Ok(Expr::StrLit(s, pos))
            }
            TokenKind::True => {
                self.advance()?;
                Ok(Expr::BoolLit(true, pos))
            }
            TokenKind::False => {
                self.advance()?;
                Ok(Expr::BoolLit(false, pos))
            }
            TokenKind::Null => {
                self.advance()?;
                Ok(Expr::NullLit(pos))
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                Ok(Expr::Ident(name, pos))
            }
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_list_literal(pos),
            TokenKind::LBrace => self.parse_dict_literal(pos),
            other => Err(ParseError::new(
                pos,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    fn parse_list_literal(&mut self, pos: Pos) -> Result<Expr, ParseError> {
        self.advance()?; // [
        let mut items = Vec::new();
        while self.cur.kind != TokenKind::RBracket {
            items.push(self.parse_expr()?);
            if self.cur.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBracket, "']'")?;
        Ok(Expr::ListLit(items, pos))
    }

    fn parse_dict_literal(&mut self, pos: Pos) -> Result<Expr, ParseError> {
        self.advance()?; // {
        let mut pairs = Vec::new();
        // Braces do not suppress auto-semi insertion, so terminators from
        // embedded newlines are skipped here.
        self.skip_semis()?;
        while self.cur.kind != TokenKind::RBrace {
            let key = match self.cur.kind.clone() {
                TokenKind::Ident(name) => {
                    self.advance()?;
                    name
                }
                TokenKind::Str(s) => {
                    self.advance()?;
                    s
                }
                other => {
                    return Err(ParseError::new(
                        self.cur.pos,
                        format!("expected dict key, found {}", other.describe()),
                    ));
                }
            };
            self.expect(TokenKind::Colon, "':'")?;
            pairs.push((key, self.parse_expr()?));
            self.skip_semis()?;
            if self.cur.kind == TokenKind::Comma {
                self.advance()?;
                self.skip_semis()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Expr::DictLit(pairs, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(src: &str) -> Module {
        parse_module(src, "test").unwrap()
    }

    fn expr(src: &str) -> Expr {
        parse_expression(src, Pos::default()).unwrap()
    }

    #[test]
    fn test_precedence_mul_over_add() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let e = expr("1 + 2 * 3");
        assert_eq!(format!("{}", e), "(1 + (2 * 3))");
    }

    #[test]
    fn test_comparison_below_equality() {
        let e = expr("a < b == c < d");
        assert_eq!(format!("{}", e), "((a < b) == (c < d))");
    }

    #[test]
    fn test_logical_chain() {
        let e = expr("a or b and not c");
        assert_eq!(format!("{}", e), "(a or (b and (not c)))");
    }

    #[test]
    fn test_coalesce_above_ternary() {
        let e = expr("a ?? b ? 1 : 2");
        assert_eq!(format!("{}", e), "((a ?? b) ? 1 : 2)");
    }

    #[test]
    fn test_ternary_right_associative() {
        let e = expr("a ? 1 : b ? 2 : 3");
        assert_eq!(format!("{}", e), "(a ? 1 : (b ? 2 : 3))");
    }

    #[test]
    fn test_try_binds_whole_postfix() {
        let e = expr("try foo(1)[0].bar");
        assert_eq!(format!("{}", e), "(try foo(1)[0].bar)");
    }

    #[test]
    fn test_postfix_chain() {
        let e = expr("a.b[0](1, 2).c");
        assert_eq!(format!("{}", e), "a.b[0](1, 2).c");
    }

    #[test]
    fn test_list_literal_trailing_comma_and_newlines() {
        let e = expr("[\n  1,\n  2,\n]");
        assert_eq!(format!("{}", e), "[1, 2]");
    }

    #[test]
    fn test_dict_literal_keys() {
        let e = expr("{a: 1, 'b c': 2,}");
        match e {
            Expr::DictLit(pairs, _) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0].0, "a");
                assert_eq!(pairs[1].0, "b c");
            }
            other => panic!("Expected dict literal, got {:?}", other),
        }
    }

    #[test]
    fn test_dict_literal_across_lines() {
        // braces do not suppress auto-semi; the parser collapses them
        let e = expr("{\n  a: 1,\n  b: 2\n}");
        match e {
            Expr::DictLit(pairs, _) => assert_eq!(pairs.len(), 2),
            other => panic!("Expected dict literal, got {:?}", other),
        }
    }

    #[test]
    fn test_module_statements_split_by_newlines() {
        let m = module("let a = 1\nlet b = 2\na = b");
        assert_eq!(m.stmts.len(), 3);
        assert!(matches!(m.stmts[2], Stmt::Assign { .. }));
    }

    #[test]
    fn test_export_only_at_top() {
        assert!(parse_module("export let a = 1", "t").is_ok());
        let err = parse_module("fn f() { export let a = 1 }", "t").unwrap_err();
        assert!(err.message.contains("top level"));
    }

    #[test]
    fn test_break_outside_loop_is_parse_error() {
        let err = parse_module("break", "t").unwrap_err();
        assert!(err.message.contains("break outside loop"));
    }

    #[test]
    fn test_continue_does_not_cross_fn_boundary() {
        let err = parse_module("for { fn f() { continue } }", "t").unwrap_err();
        assert!(err.message.contains("continue outside loop"));
    }

    #[test]
    fn test_for_classic() {
        let m = module("for let i = 0; i < 5; i = i + 1 { i }");
        match &m.stmts[0] {
            Stmt::For(f) => match &f.kind {
                ForKind::Classic { init, cond, post } => {
                    assert!(init.is_some());
                    assert!(cond.is_some());
                    assert!(post.is_some());
                }
                other => panic!("Expected classic for, got {:?}", other),
            },
            other => panic!("Expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_for_range_with_let_pair() {
        // requires the 4-token lookahead
        let m = module("for let i, v range xs { v }");
        match &m.stmts[0] {
            Stmt::For(f) => match &f.kind {
                ForKind::Range(r) => {
                    assert!(r.declare);
                    assert_eq!(r.key, "i");
                    assert_eq!(r.value.as_deref(), Some("v"));
                }
                other => panic!("Expected range for, got {:?}", other),
            },
            other => panic!("Expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_for_range_without_let() {
        let m = module("let k = 0\nfor k range xs { k }");
        match &m.stmts[1] {
            Stmt::For(f) => match &f.kind {
                ForKind::Range(r) => {
                    assert!(!r.declare);
                    assert_eq!(r.key, "k");
                    assert!(r.value.is_none());
                }
                other => panic!("Expected range for, got {:?}", other),
            },
            other => panic!("Expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_for_range_rejects_duplicate_names() {
        let err = parse_module("for let x, x range xs { }", "t").unwrap_err();
        assert!(err.message.contains("distinct"));
        // both `_` is allowed
        assert!(parse_module("for let _, _ range xs { }", "t").is_ok());
    }

    #[test]
    fn test_for_condition_only() {
        let m = module("for x < 3 { x = x + 1 }");
        match &m.stmts[0] {
            Stmt::For(f) => assert!(matches!(f.kind, ForKind::Cond(Some(_)))),
            other => panic!("Expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_for_unconditional() {
        let m = module("for { break }");
        match &m.stmts[0] {
            Stmt::For(f) => assert!(matches!(f.kind, ForKind::Cond(None))),
            other => panic!("Expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_for_post_rejects_let() {
        let err = parse_module("for let i = 0; i < 5; let j = 1 { }", "t").unwrap_err();
        assert!(err.message.contains("post"));
    }

    #[test]
    fn test_for_rejects_const() {
        let err = parse_module("for const i = 0; ; { }", "t").unwrap_err();
        assert!(err.message.contains("const"));
    }

    #[test]
    fn test_if_elif_else_chain_across_lines() {
        let m = module("if a {\n 1\n}\nelif b {\n 2\n}\nelse {\n 3\n}");
        match &m.stmts[0] {
            Stmt::If { elifs, els, .. } => {
                assert_eq!(elifs.len(), 1);
                assert!(els.is_some());
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_return_with_and_without_value() {
        let m = module("fn f() { return }\nfn g() { return 1 }");
        for stmt in &m.stmts {
            assert!(matches!(stmt, Stmt::FnDef { .. }));
        }
    }

    #[test]
    fn test_duplicate_params_rejected() {
        let err = parse_module("fn f(a, a) { }", "t").unwrap_err();
        assert!(err.message.contains("duplicate parameter"));
    }

    #[test]
    fn test_expression_entry_reports_host_positions() {
        let err = parse_expression("1 +", Pos::new(40, 7)).unwrap_err();
        assert_eq!(err.pos.line, 40);
    }

    #[test]
    fn test_expression_entry_rejects_trailing_input() {
        let err = parse_expression("1 2", Pos::default()).unwrap_err();
        assert!(err.message.contains("after expression"));
    }

    #[test]
    fn test_illegal_token_surfaces_message() {
        let err = parse_module("let a = 'oops", "t").unwrap_err();
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn test_pretty_print_reparse_is_stable() {
        let sources = [
            "1 + 2 * 3",
            "a ? b : c ?? d",
            "try f(x)[1].y",
            "not (a and b) or c",
            "[1, 'two', {k: 3}]",
            "{a: [1, 2], 'b': x.y}",
        ];
        for src in sources {
            let first = expr(src);
            let printed = format!("{}", first);
            let second = parse_expression(&printed, Pos::default()).unwrap();
            assert_eq!(
                printed,
                format!("{}", second),
                "pretty-print not stable for {}",
                src
            );
        }
    }
}
