// ABOUTME: json namespace: parse, stringify with indent control, path get, file loading

use crate::error::EvalError;
use crate::jsonpath;
use crate::stdlib::{arity_exact, arity_range, native, want_str};
use crate::value::{from_json, to_json, Value};
use serde::Serialize as _;
use std::collections::HashMap;
use std::path::PathBuf;

fn indent_from_arg(arg: &Value, pos: crate::error::Pos) -> Result<String, EvalError> {
    match arg {
        Value::Number(n) => {
            if n.fract() != 0.0 || *n < 0.0 || *n > 32.0 {
                return Err(EvalError::runtime(
                    pos,
                    "json.stringify: indent must be an integer between 0 and 32",
                ));
            }
            Ok(" ".repeat(*n as usize))
        }
        Value::Str(s) => {
            if !s.chars().all(|c| c == ' ') {
                return Err(EvalError::runtime(
                    pos,
                    "json.stringify: indent string must contain only spaces",
                ));
            }
            Ok(s.clone())
        }
        other => Err(EvalError::runtime(
            pos,
            format!(
                "json.stringify(value[, indent]): expected string or number, got {} at argument 2",
                other.type_name()
            ),
        )),
    }
}

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "parse".to_string(),
        native("json.parse", |vm, pos, args| {
            arity_exact("json.parse(text)", args, 1, pos)?;
            let text = want_str("json.parse(text)", args, 0, pos)?;
            let json: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| EvalError::runtime(pos, format!("json.parse: {}", e)))?;
            let value = from_json(&json);
            vm.ctx().check_value(&value, pos)?;
            Ok(value)
        }),
    );

    ns.insert(
        "stringify".to_string(),
        native("json.stringify", |vm, pos, args| {
            arity_range("json.stringify(value[, indent])", args, 1, 2, pos)?;
            let json = to_json(&args[0]).map_err(|msg| EvalError::runtime(pos, msg))?;
            let indent = match args.get(1) {
                Some(arg) => indent_from_arg(arg, pos)?,
                None => String::new(),
            };
            let out = if indent.is_empty() {
                serde_json::to_string(&json)
                    .map_err(|e| EvalError::runtime(pos, format!("json.stringify: {}", e)))?
            } else {
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
                json.serialize(&mut serializer)
                    .map_err(|e| EvalError::runtime(pos, format!("json.stringify: {}", e)))?;
                String::from_utf8(buf)
                    .map_err(|e| EvalError::runtime(pos, format!("json.stringify: {}", e)))?
            };
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    ns.insert(
        "get".to_string(),
        native("json.get", |_, pos, args| {
            arity_range("json.get(value[, path])", args, 1, 2, pos)?;
            match args.get(1) {
                None => Ok(args[0].clone()),
                Some(Value::Str(path)) => {
                    Ok(jsonpath::resolve(&args[0], path).unwrap_or(Value::Null))
                }
                Some(other) => Err(EvalError::runtime(
                    pos,
                    format!(
                        "json.get(value[, path]): expected string, got {} at argument 2",
                        other.type_name()
                    ),
                )),
            }
        }),
    );

    ns.insert(
        "file".to_string(),
        native("json.file", |vm, pos, args| {
            arity_exact("json.file(path)", args, 1, pos)?;
            let path = want_str("json.file(path)", args, 0, pos)?;
            let Some(read_file) = &vm.ctx().read_file else {
                return Err(EvalError::runtime(
                    pos,
                    "json.file: file access is not available in this context",
                ));
            };
            let mut resolved = PathBuf::from(path);
            if resolved.is_relative() {
                if let Some(base) = &vm.ctx().base_dir {
                    resolved = base.join(resolved);
                }
            }
            let text = read_file(&resolved)
                .map_err(|e| EvalError::runtime(pos, format!("json.file: {}: {}", path, e)))?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| EvalError::runtime(pos, format!("json.file: {}: {}", path, e)))?;
            let value = from_json(&json);
            vm.ctx().check_value(&value, pos)?;
            Ok(value)
        }),
    );

    Value::Dict(ns)
}
