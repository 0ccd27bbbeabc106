// ABOUTME: Error types and stack-frame machinery for the scripting engine

use std::fmt;
use thiserror::Error;

/// 1-based source position (line, column) carried on tokens, AST nodes and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self { line: 1, col: 1 }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// What kind of call boundary a stack frame records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Fn,
    Native,
    Expr,
}

/// One entry of the captured call stack attached to an evaluation error.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub pos: Pos,
    pub name: String,
}

impl Frame {
    pub fn new(kind: FrameKind, pos: Pos, name: impl Into<String>) -> Self {
        Self {
            kind,
            pos,
            name: name.into(),
        }
    }
}

/// Syntax violation reported by the lexer or parser.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("parse error at {pos}: {message}")]
pub struct ParseError {
    pub pos: Pos,
    pub message: String,
}

impl ParseError {
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

/// Any failure during evaluation.
///
/// `abort` distinguishes the uncatchable class (step limit, timeout, external
/// cancel) from ordinary runtime errors; `try` recovers only the latter.
/// Frames accumulate as the error unwinds call boundaries, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub pos: Pos,
    pub message: String,
    pub abort: bool,
    pub frames: Vec<Frame>,
}

impl EvalError {
    /// Recoverable runtime error (catchable by `try`).
    pub fn runtime(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
            abort: false,
            frames: Vec::new(),
        }
    }

    /// Uncatchable abort (step limit, timeout, cancellation).
    pub fn abort(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
            abort: true,
            frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)?;
        for frame in &self.frames {
            write!(f, "\n  at {} in {}", frame.pos, frame.name)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// Host-facing error produced by the engine facade and the module cache.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    Parse { path: String, err: ParseError },
    Eval { path: String, err: EvalError },
    Setup { message: String },
    Module { path: String, message: String },
}

impl EngineError {
    pub fn setup(message: impl Into<String>) -> Self {
        EngineError::Setup {
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Parse { path, err } => {
                if path.is_empty() {
                    write!(f, "{}", err)
                } else {
                    write!(f, "{}: {}", path, err)
                }
            }
            EngineError::Eval { path, err } => {
                if path.is_empty() {
                    write!(f, "{}", err)
                } else {
                    write!(f, "{}: {}", path, err)
                }
            }
            EngineError::Setup { message } => write!(f, "{}", message),
            EngineError::Module { path, message } => write!(f, "module {}: {}", path, message),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_display() {
        assert_eq!(format!("{}", Pos::new(3, 14)), "3:14");
    }

    #[test]
    fn test_eval_error_pretty_frames() {
        let err = EvalError::runtime(Pos::new(2, 5), "division by zero")
            .with_frame(Frame::new(FrameKind::Fn, Pos::new(7, 1), "divide"))
            .with_frame(Frame::new(FrameKind::Expr, Pos::new(1, 1), "assert[0]"));

        let pretty = format!("{}", err);
        assert_eq!(
            pretty,
            "2:5: division by zero\n  at 7:1 in divide\n  at 1:1 in assert[0]"
        );
    }

    #[test]
    fn test_abort_flag_distinguishes_error_classes() {
        let runtime = EvalError::runtime(Pos::default(), "boom");
        let abort = EvalError::abort(Pos::default(), "step limit exceeded");
        assert!(!runtime.abort);
        assert!(abort.abort);
    }

    #[test]
    fn test_engine_error_attaches_path() {
        let err = EngineError::Parse {
            path: "scripts/assert.http".to_string(),
            err: ParseError::new(Pos::new(4, 2), "unexpected token"),
        };
        let text = format!("{}", err);
        assert!(text.starts_with("scripts/assert.http: parse error at 4:2"));
    }
}
