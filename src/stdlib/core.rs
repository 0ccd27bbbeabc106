// ABOUTME: Top-level core builtins: len, contains, match, conversions, typeof, uuid, fail

use crate::error::EvalError;
use crate::stdlib::{arity_exact, arity_range, native, want_str};
use crate::value::{stringify, values_equal, Value};
use regex::Regex;
use std::collections::HashMap;
use uuid::Uuid;

pub fn register(root: &mut HashMap<String, Value>) {
    root.insert(
        "fail".to_string(),
        native("fail", |_, pos, args| {
            arity_range("fail([message])", args, 0, 1, pos)?;
            let message = match args.first() {
                Some(v) => stringify(v, pos)?,
                None => "fail".to_string(),
            };
            Err(EvalError::runtime(pos, message))
        }),
    );

    root.insert(
        "len".to_string(),
        native("len", |_, pos, args| {
            arity_exact("len(value)", args, 1, pos)?;
            let n = match &args[0] {
                Value::Str(s) => s.len(),
                Value::List(items) => items.len(),
                Value::Dict(map) => map.len(),
                other => {
                    return Err(EvalError::runtime(
                        pos,
                        format!("len(value): expected string, list or dict, got {}", other.type_name()),
                    ));
                }
            };
            Ok(Value::Number(n as f64))
        }),
    );

    root.insert(
        "contains".to_string(),
        native("contains", |_, pos, args| {
            arity_exact("contains(haystack, needle)", args, 2, pos)?;
            let found = match (&args[0], &args[1]) {
                (Value::Str(hay), Value::Str(needle)) => hay.contains(needle.as_str()),
                (Value::Str(_), other) => {
                    return Err(EvalError::runtime(
                        pos,
                        format!(
                            "contains(haystack, needle): expected string, got {} at argument 2",
                            other.type_name()
                        ),
                    ));
                }
                (Value::List(items), needle) => items.iter().any(|v| values_equal(v, needle)),
                (Value::Dict(map), Value::Str(key)) => map.contains_key(key),
                (Value::Dict(_), other) => {
                    return Err(EvalError::runtime(
                        pos,
                        format!(
                            "contains(haystack, needle): expected string key, got {} at argument 2",
                            other.type_name()
                        ),
                    ));
                }
                (other, _) => {
                    return Err(EvalError::runtime(
                        pos,
                        format!(
                            "contains(haystack, needle): expected string, list or dict, got {}",
                            other.type_name()
                        ),
                    ));
                }
            };
            Ok(Value::Bool(found))
        }),
    );

    root.insert(
        "match".to_string(),
        native("match", |vm, pos, args| {
            arity_exact("match(pattern, text)", args, 2, pos)?;
            let pattern = want_str("match(pattern, text)", args, 0, pos)?;
            let text = want_str("match(pattern, text)", args, 1, pos)?;
            let max = vm.ctx().limits.max_str;
            if max > 0 && pattern.len() > max {
                return Err(EvalError::runtime(pos, "match: pattern too long"));
            }
            // compiled per call; scripts are short-lived
            let re = Regex::new(pattern)
                .map_err(|e| EvalError::runtime(pos, format!("match: invalid pattern: {}", e)))?;
            Ok(Value::Bool(re.is_match(text)))
        }),
    );

    root.insert(
        "str".to_string(),
        native("str", |vm, pos, args| {
            arity_exact("str(value)", args, 1, pos)?;
            let out = stringify(&args[0], pos)?;
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    root.insert(
        "num".to_string(),
        native("num", |_, pos, args| {
            arity_range("num(value[, default])", args, 1, 2, pos)?;
            match coerce_num(&args[0]) {
                Some(n) => Ok(Value::Number(n)),
                None => fallback("num", args, pos),
            }
        }),
    );

    root.insert(
        "int".to_string(),
        native("int", |_, pos, args| {
            arity_range("int(value[, default])", args, 1, 2, pos)?;
            match coerce_int(&args[0]) {
                Some(n) => Ok(Value::Number(n)),
                None => fallback("int", args, pos),
            }
        }),
    );

    root.insert(
        "bool".to_string(),
        native("bool", |_, pos, args| {
            arity_range("bool(value[, default])", args, 1, 2, pos)?;
            match coerce_bool(&args[0]) {
                Some(b) => Ok(Value::Bool(b)),
                None => fallback("bool", args, pos),
            }
        }),
    );

    root.insert(
        "default".to_string(),
        native("default", |_, pos, args| {
            arity_exact("default(value, fallback)", args, 2, pos)?;
            Ok(if args[0].is_null() {
                args[1].clone()
            } else {
                args[0].clone()
            })
        }),
    );

    root.insert(
        "typeof".to_string(),
        native("typeof", |_, pos, args| {
            arity_exact("typeof(value)", args, 1, pos)?;
            Ok(Value::Str(args[0].type_name()))
        }),
    );

    root.insert(
        "uuid".to_string(),
        native("uuid", |vm, pos, args| {
            arity_exact("uuid()", args, 0, pos)?;
            if let Some(hook) = &vm.ctx().uuid {
                return Ok(Value::Str(hook()));
            }
            if vm.ctx().allow_random {
                return Ok(Value::Str(Uuid::new_v4().to_string()));
            }
            Err(EvalError::runtime(
                pos,
                "uuid is not available: randomness is disabled",
            ))
        }),
    );
}

fn fallback(name: &str, args: &[Value], pos: crate::error::Pos) -> Result<Value, EvalError> {
    match args.get(1) {
        Some(def) => Ok(def.clone()),
        None => Err(EvalError::runtime(
            pos,
            format!("{}: cannot convert {}", name, args[0].type_name()),
        )),
    }
}

fn coerce_num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if n.is_finite() => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn coerce_int(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s.trim().parse::<i64>().ok().map(|n| n as f64),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) if n.is_finite() => Some(*n != 0.0),
        Value::Str(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
            other => other.parse::<f64>().ok().map(|n| n != 0.0),
        },
        _ => None,
    }
}
