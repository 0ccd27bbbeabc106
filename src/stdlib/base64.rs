// ABOUTME: base64 namespace: standard-alphabet encode/decode

use crate::error::EvalError;
use crate::stdlib::{arity_exact, native, want_str};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::HashMap;

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "encode".to_string(),
        native("base64.encode", |vm, pos, args| {
            arity_exact("base64.encode(text)", args, 1, pos)?;
            let text = want_str("base64.encode(text)", args, 0, pos)?;
            let out = STANDARD.encode(text.as_bytes());
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    ns.insert(
        "decode".to_string(),
        native("base64.decode", |vm, pos, args| {
            arity_exact("base64.decode(text)", args, 1, pos)?;
            let text = want_str("base64.decode(text)", args, 0, pos)?;
            let bytes = STANDARD
                .decode(text.trim())
                .map_err(|e| EvalError::runtime(pos, format!("base64.decode: {}", e)))?;
            let out = String::from_utf8(bytes)
                .map_err(|_| EvalError::runtime(pos, "base64.decode: result is not valid UTF-8"))?;
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    Value::Dict(ns)
}
