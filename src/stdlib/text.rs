// ABOUTME: text namespace: case, trim, split/join, replace, affix predicates

use crate::error::EvalError;
use crate::stdlib::{arity_exact, native, want_list, want_str};
use crate::value::Value;
use std::collections::HashMap;

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "lower".to_string(),
        native("text.lower", |_, pos, args| {
            arity_exact("text.lower(s)", args, 1, pos)?;
            Ok(Value::Str(want_str("text.lower(s)", args, 0, pos)?.to_lowercase()))
        }),
    );

    ns.insert(
        "upper".to_string(),
        native("text.upper", |_, pos, args| {
            arity_exact("text.upper(s)", args, 1, pos)?;
            Ok(Value::Str(want_str("text.upper(s)", args, 0, pos)?.to_uppercase()))
        }),
    );

    ns.insert(
        "trim".to_string(),
        native("text.trim", |_, pos, args| {
            arity_exact("text.trim(s)", args, 1, pos)?;
            Ok(Value::Str(want_str("text.trim(s)", args, 0, pos)?.trim().to_string()))
        }),
    );

    ns.insert(
        "split".to_string(),
        native("text.split", |vm, pos, args| {
            arity_exact("text.split(s, sep)", args, 2, pos)?;
            let s = want_str("text.split(s, sep)", args, 0, pos)?;
            let sep = want_str("text.split(s, sep)", args, 1, pos)?;
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::Str(c.to_string())).collect()
            } else {
                s.split(sep).map(|p| Value::Str(p.to_string())).collect()
            };
            let out = Value::List(parts);
            vm.ctx().check_value(&out, pos)?;
            Ok(out)
        }),
    );

    ns.insert(
        "join".to_string(),
        native("text.join", |vm, pos, args| {
            arity_exact("text.join(list, sep)", args, 2, pos)?;
            let items = want_list("text.join(list, sep)", args, 0, pos)?;
            let sep = want_str("text.join(list, sep)", args, 1, pos)?;
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::Str(s) => parts.push(s.clone()),
                    other => {
                        return Err(EvalError::runtime(
                            pos,
                            format!(
                                "text.join(list, sep): expected string, got {} at element {}",
                                other.type_name(),
                                i
                            ),
                        ));
                    }
                }
            }
            let out = parts.join(sep);
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    ns.insert(
        "replace".to_string(),
        native("text.replace", |vm, pos, args| {
            arity_exact("text.replace(s, old, new)", args, 3, pos)?;
            let s = want_str("text.replace(s, old, new)", args, 0, pos)?;
            let old = want_str("text.replace(s, old, new)", args, 1, pos)?;
            let new = want_str("text.replace(s, old, new)", args, 2, pos)?;
            let out = s.replace(old, new);
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    ns.insert(
        "startsWith".to_string(),
        native("text.startsWith", |_, pos, args| {
            arity_exact("text.startsWith(s, prefix)", args, 2, pos)?;
            let s = want_str("text.startsWith(s, prefix)", args, 0, pos)?;
            let prefix = want_str("text.startsWith(s, prefix)", args, 1, pos)?;
            Ok(Value::Bool(s.starts_with(prefix)))
        }),
    );

    ns.insert(
        "endsWith".to_string(),
        native("text.endsWith", |_, pos, args| {
            arity_exact("text.endsWith(s, suffix)", args, 2, pos)?;
            let s = want_str("text.endsWith(s, suffix)", args, 0, pos)?;
            let suffix = want_str("text.endsWith(s, suffix)", args, 1, pos)?;
            Ok(Value::Bool(s.ends_with(suffix)))
        }),
    );

    Value::Dict(ns)
}
