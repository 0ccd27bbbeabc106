// ABOUTME: Standard library registry: pure namespaces plus top-level core builtins

pub mod base64;
pub mod core;
pub mod crypto;
pub mod dict;
pub mod encoding;
pub mod headers;
pub mod json;
pub mod list;
pub mod math;
pub mod query;
pub mod text;
pub mod time;
pub mod url;

use crate::error::{EvalError, Pos};
use crate::value::{NativeFn, Value};
use crate::vm::Vm;
use std::collections::HashMap;

/// Namespaces addressable at the top level as well as through `stdlib.*`.
const TOP_NAMESPACES: &[&str] = &[
    "crypto", "base64", "url", "time", "json", "headers", "query", "encoding",
];

/// Fresh snapshot of the whole standard library. Each call returns new maps
/// so one evaluation's env can never leak mutated builtins into another.
pub fn stdlib() -> HashMap<String, Value> {
    let mut root = HashMap::new();
    core::register(&mut root);

    let mut namespaces: HashMap<String, Value> = HashMap::new();
    namespaces.insert("text".to_string(), text::namespace());
    namespaces.insert("list".to_string(), list::namespace());
    namespaces.insert("dict".to_string(), dict::namespace());
    namespaces.insert("math".to_string(), math::namespace());
    namespaces.insert("crypto".to_string(), crypto::namespace());
    namespaces.insert("base64".to_string(), base64::namespace());
    namespaces.insert("url".to_string(), url::namespace());
    namespaces.insert("time".to_string(), time::namespace());
    namespaces.insert("json".to_string(), json::namespace());
    namespaces.insert("headers".to_string(), headers::namespace());
    namespaces.insert("query".to_string(), query::namespace());
    namespaces.insert("encoding".to_string(), encoding::namespace());

    for name in TOP_NAMESPACES {
        if let Some(ns) = namespaces.get(*name) {
            root.insert((*name).to_string(), ns.clone());
        }
    }

    let all = Value::Dict(namespaces);
    root.insert("stdlib".to_string(), all.clone());
    root.insert("rts".to_string(), all);
    root
}

// ============================================================================
// Argument validation helpers shared by every namespace
// ============================================================================

pub(crate) fn native<F>(name: &'static str, f: F) -> Value
where
    F: Fn(&mut Vm, Pos, &[Value]) -> Result<Value, EvalError> + 'static,
{
    Value::Native(NativeFn::new(name, f))
}

pub(crate) fn arity_exact(sig: &str, args: &[Value], n: usize, pos: Pos) -> Result<(), EvalError> {
    if args.len() != n {
        return Err(EvalError::runtime(pos, format!("usage: {}", sig)));
    }
    Ok(())
}

pub(crate) fn arity_range(
    sig: &str,
    args: &[Value],
    min: usize,
    max: usize,
    pos: Pos,
) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        return Err(EvalError::runtime(pos, format!("usage: {}", sig)));
    }
    Ok(())
}

pub(crate) fn type_err(sig: &str, expected: &str, got: &Value, i: usize, pos: Pos) -> EvalError {
    EvalError::runtime(
        pos,
        format!(
            "{}: expected {}, got {} at argument {}",
            sig,
            expected,
            got.type_name(),
            i + 1
        ),
    )
}

pub(crate) fn want_str<'a>(
    sig: &str,
    args: &'a [Value],
    i: usize,
    pos: Pos,
) -> Result<&'a str, EvalError> {
    match &args[i] {
        Value::Str(s) => Ok(s),
        other => Err(type_err(sig, "string", other, i, pos)),
    }
}

pub(crate) fn want_num(sig: &str, args: &[Value], i: usize, pos: Pos) -> Result<f64, EvalError> {
    match &args[i] {
        Value::Number(n) => Ok(*n),
        other => Err(type_err(sig, "number", other, i, pos)),
    }
}

pub(crate) fn want_int(sig: &str, args: &[Value], i: usize, pos: Pos) -> Result<i64, EvalError> {
    match &args[i] {
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
        other => Err(type_err(sig, "integer", other, i, pos)),
    }
}

pub(crate) fn want_list<'a>(
    sig: &str,
    args: &'a [Value],
    i: usize,
    pos: Pos,
) -> Result<&'a [Value], EvalError> {
    match &args[i] {
        Value::List(items) => Ok(items),
        other => Err(type_err(sig, "list", other, i, pos)),
    }
}

pub(crate) fn want_dict<'a>(
    sig: &str,
    args: &'a [Value],
    i: usize,
    pos: Pos,
) -> Result<&'a HashMap<String, Value>, EvalError> {
    match &args[i] {
        Value::Dict(map) => Ok(map),
        other => Err(type_err(sig, "dict", other, i, pos)),
    }
}

pub(crate) fn want_callable<'a>(
    sig: &str,
    args: &'a [Value],
    i: usize,
    pos: Pos,
) -> Result<&'a Value, EvalError> {
    match &args[i] {
        v @ (Value::Func(_) | Value::Native(_)) => Ok(v),
        other => Err(type_err(sig, "function", other, i, pos)),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::context::{Context, ExecContext, Limits};
    use crate::env::Env;
    use crate::parser;

    /// Evaluate an expression against a full stdlib prelude.
    pub fn eval_with(ctx: &Context, limits: Limits, src: &str) -> Result<Value, EvalError> {
        let expr = parser::parse_expression(src, Pos::default()).unwrap();
        let prelude = Env::sealed(stdlib());
        let env = Env::with_parent(prelude);
        let exec = ExecContext::new(limits, ctx);
        let mut vm = Vm::new(exec);
        vm.eval(&expr, &env)
    }

    pub fn eval(src: &str) -> Result<Value, EvalError> {
        eval_with(&Context::default(), Limits::default(), src)
    }

    pub fn eval_ok(src: &str) -> Value {
        match eval(src) {
            Ok(v) => v,
            Err(e) => panic!("eval of {:?} failed: {}", src, e),
        }
    }

    pub fn num(src: &str) -> f64 {
        match eval_ok(src) {
            Value::Number(n) => n,
            other => panic!("Expected number from {:?}, got {:?}", src, other),
        }
    }

    pub fn s(src: &str) -> String {
        match eval_ok(src) {
            Value::Str(s) => s,
            other => panic!("Expected string from {:?}, got {:?}", src, other),
        }
    }

    pub fn b(src: &str) -> bool {
        match eval_ok(src) {
            Value::Bool(b) => b,
            other => panic!("Expected bool from {:?}, got {:?}", src, other),
        }
    }
}
