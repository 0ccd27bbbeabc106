// ABOUTME: Resource limits and the per-evaluation execution context with tick enforcement

use crate::error::{EvalError, Pos};
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Resource caps consulted by the VM. Zero means unlimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_steps: u64,
    pub max_call: usize,
    pub max_str: usize,
    pub max_list: usize,
    pub max_dict: usize,
    pub timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_call: 64,
            max_str: 65_536,
            max_list: 2_000,
            max_dict: 2_000,
            timeout: Duration::ZERO,
        }
    }
}

impl Limits {
    /// Fully unlimited, for hosts that bound evaluation externally.
    pub fn unlimited() -> Self {
        Self {
            max_steps: 0,
            max_call: 0,
            max_str: 0,
            max_list: 0,
            max_dict: 0,
            timeout: Duration::ZERO,
        }
    }
}

pub type CancelHook = Rc<dyn Fn() -> Option<String>>;
pub type ClockHook = Rc<dyn Fn() -> DateTime<Utc>>;
pub type UuidHook = Rc<dyn Fn() -> String>;
pub type FileHook = Rc<dyn Fn(&Path) -> std::io::Result<String>>;

/// Host-supplied hooks and knobs, reused across evaluations.
#[derive(Clone, Default)]
pub struct Context {
    /// Polled at every tick; a Some(reason) aborts with `canceled: <reason>`.
    pub cancel: Option<CancelHook>,
    /// Clock override. Time builtins error without one.
    pub now: Option<ClockHook>,
    /// UUID override; otherwise `uuid()` needs `allow_random`.
    pub uuid: Option<UuidHook>,
    /// File reader override for `json.file` and module loading.
    pub read_file: Option<FileHook>,
    /// Base directory for relative module paths and file reads.
    pub base_dir: Option<PathBuf>,
    /// Whether builtins may draw on OS randomness.
    pub allow_random: bool,
}

/// One evaluation's view of the world: limits plus a fresh step counter and
/// start instant, alongside the host hooks.
pub struct ExecContext {
    pub limits: Limits,
    steps: Cell<u64>,
    started: Instant,
    pub cancel: Option<CancelHook>,
    pub now: Option<ClockHook>,
    pub uuid: Option<UuidHook>,
    pub read_file: Option<FileHook>,
    pub base_dir: Option<PathBuf>,
    pub allow_random: bool,
}

impl ExecContext {
    pub fn new(limits: Limits, ctx: &Context) -> Rc<Self> {
        Rc::new(Self {
            limits,
            steps: Cell::new(0),
            started: Instant::now(),
            cancel: ctx.cancel.clone(),
            now: ctx.now.clone(),
            uuid: ctx.uuid.clone(),
            read_file: ctx.read_file.clone(),
            base_dir: ctx.base_dir.clone(),
            allow_random: ctx.allow_random,
        })
    }

    /// Derived context for compiling a loaded module: same limits and hooks,
    /// but no host I/O, so modules see only the pure stdlib.
    pub fn sub_context(&self) -> Rc<Self> {
        Rc::new(Self {
            limits: self.limits.clone(),
            steps: Cell::new(0),
            started: Instant::now(),
            cancel: self.cancel.clone(),
            now: self.now.clone(),
            uuid: self.uuid.clone(),
            read_file: None,
            base_dir: None,
            allow_random: self.allow_random,
        })
    }

    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// Per-step hook: counts steps and raises uncatchable aborts for the
    /// step limit, the wall-clock timeout, and external cancellation.
    pub fn tick(&self, pos: Pos) -> Result<(), EvalError> {
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        if self.limits.max_steps > 0 && steps > self.limits.max_steps {
            return Err(EvalError::abort(pos, "step limit exceeded"));
        }
        if self.limits.timeout > Duration::ZERO && self.started.elapsed() >= self.limits.timeout {
            return Err(EvalError::abort(pos, "timeout exceeded"));
        }
        if let Some(cancel) = &self.cancel {
            if let Some(reason) = cancel() {
                return Err(EvalError::abort(pos, format!("canceled: {}", reason)));
            }
        }
        Ok(())
    }

    pub fn check_str_len(&self, len: usize, pos: Pos) -> Result<(), EvalError> {
        if self.limits.max_str > 0 && len > self.limits.max_str {
            return Err(EvalError::runtime(
                pos,
                format!(
                    "string exceeds size limit ({} > {} bytes)",
                    len, self.limits.max_str
                ),
            ));
        }
        Ok(())
    }

    /// Shallow size check applied when a value is bound, returned from a
    /// native, or constructed.
    pub fn check_value(&self, value: &Value, pos: Pos) -> Result<(), EvalError> {
        match value {
            Value::Str(s) => self.check_str_len(s.len(), pos),
            Value::List(items) => {
                if self.limits.max_list > 0 && items.len() > self.limits.max_list {
                    return Err(EvalError::runtime(
                        pos,
                        format!(
                            "list exceeds size limit ({} > {} items)",
                            items.len(),
                            self.limits.max_list
                        ),
                    ));
                }
                Ok(())
            }
            Value::Dict(map) => {
                if self.limits.max_dict > 0 && map.len() > self.limits.max_dict {
                    return Err(EvalError::runtime(
                        pos,
                        format!(
                            "dict exceeds size limit ({} > {} entries)",
                            map.len(),
                            self.limits.max_dict
                        ),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_match_engine_defaults() {
        let limits = Limits::default();
        assert_eq!(limits.max_steps, 10_000);
        assert_eq!(limits.max_call, 64);
        assert_eq!(limits.max_str, 65_536);
        assert_eq!(limits.max_list, 2_000);
        assert_eq!(limits.max_dict, 2_000);
        assert_eq!(limits.timeout, Duration::ZERO);
    }

    #[test]
    fn test_tick_enforces_step_limit() {
        let limits = Limits {
            max_steps: 3,
            ..Limits::unlimited()
        };
        let exec = ExecContext::new(limits, &Context::default());
        let pos = Pos::default();

        assert!(exec.tick(pos).is_ok());
        assert!(exec.tick(pos).is_ok());
        assert!(exec.tick(pos).is_ok());
        let err = exec.tick(pos).unwrap_err();
        assert!(err.abort);
        assert!(err.message.contains("step limit exceeded"));
    }

    #[test]
    fn test_tick_polls_cancellation() {
        let ctx = Context {
            cancel: Some(Rc::new(|| Some("shutdown".to_string()))),
            ..Context::default()
        };
        let exec = ExecContext::new(Limits::unlimited(), &ctx);
        let err = exec.tick(Pos::default()).unwrap_err();
        assert!(err.abort);
        assert_eq!(err.message, "canceled: shutdown");
    }

    #[test]
    fn test_zero_means_unlimited() {
        let exec = ExecContext::new(Limits::unlimited(), &Context::default());
        for _ in 0..100_000 {
            exec.tick(Pos::default()).unwrap();
        }
    }

    #[test]
    fn test_value_size_checks() {
        let limits = Limits {
            max_str: 4,
            max_list: 2,
            max_dict: 1,
            ..Limits::unlimited()
        };
        let exec = ExecContext::new(limits, &Context::default());
        let pos = Pos::default();

        assert!(exec.check_value(&Value::Str("abcd".into()), pos).is_ok());
        assert!(exec.check_value(&Value::Str("abcde".into()), pos).is_err());

        let small = Value::List(vec![Value::Null, Value::Null]);
        let big = Value::List(vec![Value::Null, Value::Null, Value::Null]);
        assert!(exec.check_value(&small, pos).is_ok());
        let err = exec.check_value(&big, pos).unwrap_err();
        assert!(!err.abort, "size violations are recoverable runtime errors");
    }

    #[test]
    fn test_sub_context_strips_host_io() {
        let ctx = Context {
            read_file: Some(Rc::new(|_| Ok(String::new()))),
            base_dir: Some(PathBuf::from("/tmp")),
            ..Context::default()
        };
        let exec = ExecContext::new(Limits::default(), &ctx);
        let sub = exec.sub_context();
        assert!(sub.read_file.is_none());
        assert!(sub.base_dir.is_none());
    }
}
