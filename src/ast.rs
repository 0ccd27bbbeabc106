// ABOUTME: AST node types for statements, expressions and modules

use crate::error::Pos;
use std::fmt;

/// A parsed script: its source path plus ordered top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub path: String,
    pub stmts: Vec<Stmt>,
}

/// A braced statement list with the position of its opening brace.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
        is_const: bool,
        export: bool,
        pos: Pos,
    },
    Assign {
        name: String,
        value: Expr,
        pos: Pos,
    },
    Return {
        value: Option<Expr>,
        pos: Pos,
    },
    ExprStmt(Expr),
    FnDef {
        name: String,
        params: Vec<String>,
        body: Block,
        export: bool,
        pos: Pos,
    },
    If {
        cond: Expr,
        then: Block,
        elifs: Vec<(Expr, Block)>,
        els: Option<Block>,
        pos: Pos,
    },
    For(ForStmt),
    Break(Pos),
    Continue(Pos),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub kind: ForKind,
    pub body: Block,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForKind {
    /// `for init?; cond?; post? { ... }`
    Classic {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
    },
    /// `for cond { ... }` or bare `for { ... }`
    Cond(Option<Expr>),
    /// `for [let] key[, value] range source { ... }`
    Range(ForRange),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForRange {
    pub key: String,
    pub value: Option<String>,
    pub source: Expr,
    /// True when the header introduced the loop variables with `let`.
    pub declare: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Coalesce,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String, Pos),
    NullLit(Pos),
    BoolLit(bool, Pos),
    NumLit(f64, Pos),
    StrLit(String, Pos),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
        pos: Pos,
    },
    Try {
        expr: Box<Expr>,
        pos: Pos,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: Pos,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    Member {
        target: Box<Expr>,
        name: String,
        pos: Pos,
    },
    ListLit(Vec<Expr>, Pos),
    DictLit(Vec<(String, Expr)>, Pos),
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Ident(_, p)
            | Expr::NullLit(p)
            | Expr::BoolLit(_, p)
            | Expr::NumLit(_, p)
            | Expr::StrLit(_, p)
            | Expr::ListLit(_, p)
            | Expr::DictLit(_, p) => *p,
            Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Ternary { pos, .. }
            | Expr::Try { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Member { pos, .. } => *pos,
        }
    }
}

// Canonical source rendering. Every expression prints fully parenthesized so
// that re-parsing yields a structurally identical tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name, _) => write!(f, "{}", name),
            Expr::NullLit(_) => write!(f, "null"),
            Expr::BoolLit(b, _) => write!(f, "{}", b),
            Expr::NumLit(n, _) => write!(f, "{}", crate::value::fmt_number(*n)),
            Expr::StrLit(s, _) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '\n' => write!(f, "\\n")?,
                        '\r' => write!(f, "\\r")?,
                        '\t' => write!(f, "\\t")?,
                        '\\' => write!(f, "\\\\")?,
                        '"' => write!(f, "\\\"")?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "\"")
            }
            Expr::Unary { op, expr, .. } => match op {
                UnaryOp::Not => write!(f, "(not {})", expr),
                UnaryOp::Neg => write!(f, "(-{})", expr),
            },
            Expr::Binary {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Ternary {
                cond, then, els, ..
            } => write!(f, "({} ? {} : {})", cond, then, els),
            Expr::Try { expr, .. } => write!(f, "(try {})", expr),
            Expr::Call { callee, args, .. } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Index { target, index, .. } => write!(f, "{}[{}]", target, index),
            Expr::Member { target, name, .. } => write!(f, "{}.{}", target, name),
            Expr::ListLit(items, _) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::DictLit(pairs, _) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", key.replace('\\', "\\\\").replace('"', "\\\""), value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for stmt in &self.stmts {
            write!(f, "{}; ", stmt)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Let {
                name,
                value,
                is_const,
                export,
                ..
            } => {
                if *export {
                    write!(f, "export ")?;
                }
                let kw = if *is_const { "const" } else { "let" };
                write!(f, "{} {} = {}", kw, name, value)
            }
            Stmt::Assign { name, value, .. } => write!(f, "{} = {}", name, value),
            Stmt::Return { value, .. } => match value {
                Some(v) => write!(f, "return {}", v),
                None => write!(f, "return"),
            },
            Stmt::ExprStmt(e) => write!(f, "{}", e),
            Stmt::FnDef {
                name,
                params,
                body,
                export,
                ..
            } => {
                if *export {
                    write!(f, "export ")?;
                }
                write!(f, "fn {}({}) {}", name, params.join(", "), body)
            }
            Stmt::If {
                cond,
                then,
                elifs,
                els,
                ..
            } => {
                write!(f, "if {} {}", cond, then)?;
                for (c, b) in elifs {
                    write!(f, " elif {} {}", c, b)?;
                }
                if let Some(b) = els {
                    write!(f, " else {}", b)?;
                }
                Ok(())
            }
            Stmt::For(fs) => {
                write!(f, "for ")?;
                match &fs.kind {
                    ForKind::Classic { init, cond, post } => {
                        if let Some(init) = init {
                            write!(f, "{}", init)?;
                        }
                        write!(f, "; ")?;
                        if let Some(cond) = cond {
                            write!(f, "{}", cond)?;
                        }
                        write!(f, "; ")?;
                        if let Some(post) = post {
                            write!(f, "{} ", post)?;
                        }
                    }
                    ForKind::Cond(Some(cond)) => write!(f, "{} ", cond)?,
                    ForKind::Cond(None) => {}
                    ForKind::Range(r) => {
                        if r.declare {
                            write!(f, "let ")?;
                        }
                        write!(f, "{}", r.key)?;
                        if let Some(v) = &r.value {
                            write!(f, ", {}", v)?;
                        }
                        write!(f, " range {} ", r.source)?;
                    }
                }
                write!(f, "{}", fs.body)
            }
            Stmt::Break(_) => write!(f, "break"),
            Stmt::Continue(_) => write!(f, "continue"),
        }
    }
}
