// ABOUTME: dict namespace: deterministic iteration, pure set/merge/remove, projections

use crate::stdlib::{arity_exact, arity_range, native, want_dict, want_list, want_str};
use crate::value::Value;
use std::collections::HashMap;

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "keys".to_string(),
        native("dict.keys", |_, pos, args| {
            arity_exact("dict.keys(dict)", args, 1, pos)?;
            let map = want_dict("dict.keys(dict)", args, 0, pos)?;
            Ok(Value::List(
                sorted_keys(map).into_iter().map(Value::Str).collect(),
            ))
        }),
    );

    ns.insert(
        "values".to_string(),
        native("dict.values", |_, pos, args| {
            arity_exact("dict.values(dict)", args, 1, pos)?;
            let map = want_dict("dict.values(dict)", args, 0, pos)?;
            Ok(Value::List(
                sorted_keys(map)
                    .into_iter()
                    .map(|k| map[&k].clone())
                    .collect(),
            ))
        }),
    );

    ns.insert(
        "items".to_string(),
        native("dict.items", |_, pos, args| {
            arity_exact("dict.items(dict)", args, 1, pos)?;
            let map = want_dict("dict.items(dict)", args, 0, pos)?;
            Ok(Value::List(
                sorted_keys(map)
                    .into_iter()
                    .map(|k| {
                        let value = map[&k].clone();
                        Value::List(vec![Value::Str(k), value])
                    })
                    .collect(),
            ))
        }),
    );

    ns.insert(
        "set".to_string(),
        native("dict.set", |vm, pos, args| {
            arity_exact("dict.set(dict, key, value)", args, 3, pos)?;
            let map = want_dict("dict.set(dict, key, value)", args, 0, pos)?;
            let key = want_str("dict.set(dict, key, value)", args, 1, pos)?;
            let mut out = map.clone();
            out.insert(key.to_string(), args[2].clone());
            let out = Value::Dict(out);
            vm.ctx().check_value(&out, pos)?;
            Ok(out)
        }),
    );

    ns.insert(
        "merge".to_string(),
        native("dict.merge", |vm, pos, args| {
            arity_exact("dict.merge(a, b)", args, 2, pos)?;
            let a = want_dict("dict.merge(a, b)", args, 0, pos)?;
            let b = want_dict("dict.merge(a, b)", args, 1, pos)?;
            let mut out = a.clone();
            for (k, v) in b {
                out.insert(k.clone(), v.clone());
            }
            let out = Value::Dict(out);
            vm.ctx().check_value(&out, pos)?;
            Ok(out)
        }),
    );

    ns.insert(
        "remove".to_string(),
        native("dict.remove", |_, pos, args| {
            arity_exact("dict.remove(dict, key)", args, 2, pos)?;
            let map = want_dict("dict.remove(dict, key)", args, 0, pos)?;
            let key = want_str("dict.remove(dict, key)", args, 1, pos)?;
            let mut out = map.clone();
            out.remove(key);
            Ok(Value::Dict(out))
        }),
    );

    ns.insert(
        "get".to_string(),
        native("dict.get", |_, pos, args| {
            arity_range("dict.get(dict, key[, default])", args, 2, 3, pos)?;
            let map = want_dict("dict.get(dict, key[, default])", args, 0, pos)?;
            let key = want_str("dict.get(dict, key[, default])", args, 1, pos)?;
            Ok(match map.get(key) {
                Some(v) => v.clone(),
                None => args.get(2).cloned().unwrap_or(Value::Null),
            })
        }),
    );

    ns.insert(
        "has".to_string(),
        native("dict.has", |_, pos, args| {
            arity_exact("dict.has(dict, key)", args, 2, pos)?;
            let map = want_dict("dict.has(dict, key)", args, 0, pos)?;
            let key = want_str("dict.has(dict, key)", args, 1, pos)?;
            Ok(Value::Bool(map.contains_key(key)))
        }),
    );

    ns.insert(
        "pick".to_string(),
        native("dict.pick", |_, pos, args| {
            arity_exact("dict.pick(dict, keys)", args, 2, pos)?;
            let map = want_dict("dict.pick(dict, keys)", args, 0, pos)?;
            let keys = want_list("dict.pick(dict, keys)", args, 1, pos)?;
            let mut out = HashMap::new();
            for key in keys {
                if let Value::Str(k) = key {
                    if let Some(v) = map.get(k) {
                        out.insert(k.clone(), v.clone());
                    }
                }
            }
            Ok(Value::Dict(out))
        }),
    );

    ns.insert(
        "omit".to_string(),
        native("dict.omit", |_, pos, args| {
            arity_exact("dict.omit(dict, keys)", args, 2, pos)?;
            let map = want_dict("dict.omit(dict, keys)", args, 0, pos)?;
            let keys = want_list("dict.omit(dict, keys)", args, 1, pos)?;
            let mut out = map.clone();
            for key in keys {
                if let Value::Str(k) = key {
                    out.remove(k);
                }
            }
            Ok(Value::Dict(out))
        }),
    );

    Value::Dict(ns)
}
