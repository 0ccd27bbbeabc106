// ABOUTME: headers namespace: case-insensitive operations over header dicts

use crate::error::{EvalError, Pos};
use crate::stdlib::{arity_exact, native, want_dict, want_str};
use crate::value::Value;
use std::collections::HashMap;

/// Header values are strings or lists of strings.
fn check_header_value(sig: &str, value: &Value, pos: Pos) -> Result<(), EvalError> {
    match value {
        Value::Str(_) => Ok(()),
        Value::List(items) => {
            for item in items {
                if !matches!(item, Value::Str(_)) {
                    return Err(EvalError::runtime(
                        pos,
                        format!(
                            "{}: header values must be strings, got {}",
                            sig,
                            item.type_name()
                        ),
                    ));
                }
            }
            Ok(())
        }
        other => Err(EvalError::runtime(
            pos,
            format!(
                "{}: header values must be strings or lists of strings, got {}",
                sig,
                other.type_name()
            ),
        )),
    }
}

fn remove_ci(map: &mut HashMap<String, Value>, name: &str) {
    let keys: Vec<String> = map
        .keys()
        .filter(|k| k.eq_ignore_ascii_case(name))
        .cloned()
        .collect();
    for key in keys {
        map.remove(&key);
    }
}

fn get_ci<'a>(map: &'a HashMap<String, Value>, name: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "normalize".to_string(),
        native("headers.normalize", |_, pos, args| {
            arity_exact("headers.normalize(headers)", args, 1, pos)?;
            let map = want_dict("headers.normalize(headers)", args, 0, pos)?;
            let mut out: HashMap<String, Value> = HashMap::new();
            for (name, value) in map {
                check_header_value("headers.normalize(headers)", value, pos)?;
                let key = name.to_lowercase();
                match out.remove(&key) {
                    None => {
                        out.insert(key, value.clone());
                    }
                    Some(existing) => {
                        // fold repeated names into one list
                        let mut items = match existing {
                            Value::List(items) => items,
                            single => vec![single],
                        };
                        match value {
                            Value::List(more) => items.extend(more.clone()),
                            single => items.push(single.clone()),
                        }
                        out.insert(key, Value::List(items));
                    }
                }
            }
            Ok(Value::Dict(out))
        }),
    );

    ns.insert(
        "get".to_string(),
        native("headers.get", |_, pos, args| {
            arity_exact("headers.get(headers, name)", args, 2, pos)?;
            let map = want_dict("headers.get(headers, name)", args, 0, pos)?;
            let name = want_str("headers.get(headers, name)", args, 1, pos)?;
            Ok(match get_ci(map, name) {
                Some(Value::List(items)) => items.first().cloned().unwrap_or(Value::Null),
                Some(value) => value.clone(),
                None => Value::Null,
            })
        }),
    );

    ns.insert(
        "has".to_string(),
        native("headers.has", |_, pos, args| {
            arity_exact("headers.has(headers, name)", args, 2, pos)?;
            let map = want_dict("headers.has(headers, name)", args, 0, pos)?;
            let name = want_str("headers.has(headers, name)", args, 1, pos)?;
            Ok(Value::Bool(get_ci(map, name).is_some()))
        }),
    );

    ns.insert(
        "set".to_string(),
        native("headers.set", |_, pos, args| {
            arity_exact("headers.set(headers, name, value)", args, 3, pos)?;
            let map = want_dict("headers.set(headers, name, value)", args, 0, pos)?;
            let name = want_str("headers.set(headers, name, value)", args, 1, pos)?;
            check_header_value("headers.set(headers, name, value)", &args[2], pos)?;
            let mut out = map.clone();
            remove_ci(&mut out, name);
            out.insert(name.to_string(), args[2].clone());
            Ok(Value::Dict(out))
        }),
    );

    ns.insert(
        "remove".to_string(),
        native("headers.remove", |_, pos, args| {
            arity_exact("headers.remove(headers, name)", args, 2, pos)?;
            let map = want_dict("headers.remove(headers, name)", args, 0, pos)?;
            let name = want_str("headers.remove(headers, name)", args, 1, pos)?;
            let mut out = map.clone();
            remove_ci(&mut out, name);
            Ok(Value::Dict(out))
        }),
    );

    ns.insert(
        "merge".to_string(),
        native("headers.merge", |_, pos, args| {
            arity_exact("headers.merge(a, b)", args, 2, pos)?;
            let a = want_dict("headers.merge(a, b)", args, 0, pos)?;
            let b = want_dict("headers.merge(a, b)", args, 1, pos)?;
            let mut out = a.clone();
            for (name, value) in b {
                if value.is_null() {
                    // a null value deletes the header
                    remove_ci(&mut out, name);
                    continue;
                }
                check_header_value("headers.merge(a, b)", value, pos)?;
                remove_ci(&mut out, name);
                out.insert(name.clone(), value.clone());
            }
            Ok(Value::Dict(out))
        }),
    );

    Value::Dict(ns)
}
