// ABOUTME: Byte scanner producing positioned tokens with automatic statement terminators

use crate::error::Pos;
use crate::token::{Token, TokenKind};

/// Scanner over a single script source.
///
/// Tracks paren and bracket depth so that newlines inside `()` / `[]` stay
/// plain whitespace, and remembers whether the previously emitted token can
/// end a statement so that a newline (or EOF) after it yields an `AutoSemi`.
pub struct Lexer {
    chars: Vec<char>,
    i: usize,
    line: u32,
    col: u32,
    paren_depth: u32,
    bracket_depth: u32,
    last_terminable: bool,
    eof_semi_emitted: bool,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Self::new_at(src, Pos::default())
    }

    /// Start scanning at a caller-supplied position so diagnostics point back
    /// into the host's own source file.
    pub fn new_at(src: &str, start: Pos) -> Self {
        Self {
            chars: src.chars().collect(),
            i: 0,
            line: start.line.max(1),
            col: start.col.max(1),
            paren_depth: 0,
            bracket_depth: 0,
            last_terminable: false,
            eof_semi_emitted: false,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.i + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.i).copied()?;
        self.i += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn emit(&mut self, kind: TokenKind, pos: Pos) -> Token {
        self.last_terminable = kind.is_terminable();
        Token::new(kind, pos)
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            match self.peek_char() {
                None => {
                    let pos = self.pos();
                    if self.last_terminable && !self.eof_semi_emitted {
                        self.eof_semi_emitted = true;
                        self.last_terminable = false;
                        return Token::new(TokenKind::AutoSemi, pos);
                    }
                    return Token::new(TokenKind::Eof, pos);
                }
                Some(' ') | Some('\t') => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('\n') | Some('\r') => {
                    let pos = self.pos();
                    let c = self.bump();
                    if c == Some('\r') {
                        if self.peek_char() == Some('\n') {
                            self.bump();
                        } else {
                            // CR alone still starts a new line
                            self.line += 1;
                            self.col = 1;
                        }
                    }
                    if self.paren_depth == 0 && self.bracket_depth == 0 && self.last_terminable {
                        self.last_terminable = false;
                        return Token::new(TokenKind::AutoSemi, pos);
                    }
                }
                Some(c) => {
                    let pos = self.pos();
                    if c.is_ascii_alphabetic() || c == '_' {
                        return self.scan_ident(pos);
                    }
                    if c.is_ascii_digit() {
                        return self.scan_number(pos);
                    }
                    if c == '\'' || c == '"' {
                        return self.scan_string(pos);
                    }
                    return self.scan_operator(pos);
                }
            }
        }
    }

    fn scan_ident(&mut self, pos: Pos) -> Token {
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&name).unwrap_or(TokenKind::Ident(name));
        self.emit(kind, pos)
    }

    fn scan_number(&mut self, pos: Pos) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') {
            if let Some(next) = self.peek_char_at(1) {
                if next.is_ascii_digit() {
                    text.push('.');
                    self.bump();
                    while let Some(c) = self.peek_char() {
                        if c.is_ascii_digit() {
                            text.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
            }
        }
        let kind = match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Illegal(format!("invalid number literal '{}'", text)),
        };
        self.emit(kind, pos)
    }

    fn scan_string(&mut self, pos: Pos) -> Token {
        let quote = match self.bump() {
            Some(q) => q,
            None => return self.emit(TokenKind::Illegal("unterminated string literal".into()), pos),
        };
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None | Some('\n') | Some('\r') => {
                    return self.emit(TokenKind::Illegal("unterminated string literal".into()), pos);
                }
                Some(c) if c == quote => {
                    self.bump();
                    return self.emit(TokenKind::Str(text), pos);
                }
                Some('\\') => {
                    self.bump();
                    match self.peek_char() {
                        Some('n') => {
                            text.push('\n');
                            self.bump();
                        }
                        Some('r') => {
                            text.push('\r');
                            self.bump();
                        }
                        Some('t') => {
                            text.push('\t');
                            self.bump();
                        }
                        Some('\\') => {
                            text.push('\\');
                            self.bump();
                        }
                        Some('\'') => {
                            text.push('\'');
                            self.bump();
                        }
                        Some('"') => {
                            text.push('"');
                            self.bump();
                        }
                        Some(other) => {
                            return self.emit(
                                TokenKind::Illegal(format!("invalid escape sequence '\\{}'", other)),
                                pos,
                            );
                        }
                        None => {
                            return self
                                .emit(TokenKind::Illegal("unterminated string literal".into()), pos);
                        }
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    fn scan_operator(&mut self, pos: Pos) -> Token {
        let c = match self.bump() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, pos),
        };
        let kind = match c {
            '=' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::NotEq
                } else {
                    TokenKind::Illegal("unexpected '!' (use 'not' or '!=')".into())
                }
            }
            '<' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '?' => {
                if self.peek_char() == Some('?') {
                    self.bump();
                    TokenKind::Coalesce
                } else {
                    TokenKind::Question
                }
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semi,
            '(' => {
                self.paren_depth += 1;
                TokenKind::LParen
            }
            ')' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                TokenKind::RParen
            }
            '[' => {
                self.bracket_depth += 1;
                TokenKind::LBracket
            }
            ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RBracket
            }
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            other => TokenKind::Illegal(format!("unexpected character '{}'", other)),
        };
        self.emit(kind, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn test_basic_tokens() {
        let got = kinds("let x = 1 + 2.5");
        assert_eq!(
            got,
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.5),
                TokenKind::AutoSemi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_inserts_auto_semi_after_terminable() {
        let got = kinds("a\nb");
        assert_eq!(
            got,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::AutoSemi,
                TokenKind::Ident("b".into()),
                TokenKind::AutoSemi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_after_operator_is_whitespace() {
        let got = kinds("1 +\n2");
        assert_eq!(
            got,
            vec![
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.0),
                TokenKind::AutoSemi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_inside_parens_suppressed() {
        let got = kinds("f(1,\n2)");
        assert!(!got.contains(&TokenKind::Semi));
        assert_eq!(
            got.iter()
                .filter(|k| matches!(k, TokenKind::AutoSemi))
                .count(),
            1 // only the EOF one after ')'
        );
    }

    #[test]
    fn test_newline_inside_brackets_suppressed() {
        let got = kinds("[1,\n2,\n3]");
        assert_eq!(
            got.iter()
                .filter(|k| matches!(k, TokenKind::AutoSemi))
                .count(),
            1
        );
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        let got = kinds("a # trailing comment\nb");
        assert_eq!(
            got,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::AutoSemi,
                TokenKind::Ident("b".into()),
                TokenKind::AutoSemi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let got = kinds(r#"'a\n\t\'b' "c\"d""#);
        assert_eq!(got[0], TokenKind::Str("a\n\t'b".into()));
        assert_eq!(got[1], TokenKind::Str("c\"d".into()));
    }

    #[test]
    fn test_unterminated_string_is_illegal() {
        let got = kinds("'abc");
        assert!(matches!(got[0], TokenKind::Illegal(_)));
    }

    #[test]
    fn test_stray_bang_is_illegal() {
        let got = kinds("!x");
        assert!(matches!(got[0], TokenKind::Illegal(_)));
    }

    #[test]
    fn test_two_char_operators() {
        let got = kinds("a == b != c <= d >= e ?? f");
        assert!(got.contains(&TokenKind::Eq));
        assert!(got.contains(&TokenKind::NotEq));
        assert!(got.contains(&TokenKind::LtEq));
        assert!(got.contains(&TokenKind::GtEq));
        assert!(got.contains(&TokenKind::Coalesce));
    }

    #[test]
    fn test_positions_are_one_based() {
        let mut lexer = Lexer::new("let x\ny");
        let t1 = lexer.next_token();
        assert_eq!(t1.pos, Pos::new(1, 1));
        let t2 = lexer.next_token();
        assert_eq!(t2.pos, Pos::new(1, 5));
        let semi = lexer.next_token();
        assert_eq!(semi.kind, TokenKind::AutoSemi);
        let t3 = lexer.next_token();
        assert_eq!(t3.pos, Pos::new(2, 1));
    }

    #[test]
    fn test_start_position_offset() {
        let mut lexer = Lexer::new_at("x", Pos::new(12, 9));
        let tok = lexer.next_token();
        assert_eq!(tok.pos, Pos::new(12, 9));
    }

    #[test]
    fn test_eof_emits_single_auto_semi() {
        let got = kinds("x");
        assert_eq!(
            got,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::AutoSemi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_without_fraction_keeps_dot_as_member() {
        let got = kinds("1.x");
        assert_eq!(got[0], TokenKind::Number(1.0));
        assert_eq!(got[1], TokenKind::Dot);
        assert_eq!(got[2], TokenKind::Ident("x".into()));
    }

    #[test]
    fn test_crlf_counts_one_line() {
        let mut lexer = Lexer::new("a\r\nb");
        lexer.next_token(); // a
        lexer.next_token(); // auto-semi
        let b = lexer.next_token();
        assert_eq!(b.pos, Pos::new(2, 1));
    }
}
