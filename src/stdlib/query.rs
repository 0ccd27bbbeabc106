// ABOUTME: query namespace: parse/encode/merge of URL query strings

use crate::error::{EvalError, Pos};
use crate::stdlib::url::{decode_component, encode_component};
use crate::stdlib::{arity_exact, native, want_dict, want_str};
use crate::value::{stringify, Value};
use std::collections::HashMap;
use url::Url;

/// Split a raw query string into decoded pairs, preserving order.
pub(crate) fn split_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (
                decode_component(key).unwrap_or_else(|_| key.to_string()),
                decode_component(value).unwrap_or_else(|_| value.to_string()),
            )
        })
        .collect()
}

fn pairs_to_dict(pairs: Vec<(String, String)>) -> Value {
    let mut out: HashMap<String, Value> = HashMap::new();
    for (key, value) in pairs {
        match out.remove(&key) {
            None => {
                out.insert(key, Value::Str(value));
            }
            Some(Value::Str(first)) => {
                out.insert(key, Value::List(vec![Value::Str(first), Value::Str(value)]));
            }
            Some(Value::List(mut items)) => {
                items.push(Value::Str(value));
                out.insert(key, Value::List(items));
            }
            Some(other) => {
                out.insert(key, other);
            }
        }
    }
    Value::Dict(out)
}

/// The query part of `urlOrQuery`: a full URL's query, the part after `?`,
/// or the whole string when it is already a bare query.
fn query_part(input: &str) -> String {
    if input.contains("://") {
        if let Ok(url) = Url::parse(input) {
            return url.query().unwrap_or("").to_string();
        }
    }
    match input.split_once('?') {
        Some((_, query)) => query.to_string(),
        None => input.to_string(),
    }
}

fn value_to_pairs(
    sig: &str,
    key: &str,
    value: &Value,
    pos: Pos,
) -> Result<Vec<(String, String)>, EvalError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push((key.to_string(), stringify(item, pos)?));
            }
            Ok(out)
        }
        Value::Dict(_) => Err(EvalError::runtime(
            pos,
            format!("{}: cannot encode a dict as a query value", sig),
        )),
        other => Ok(vec![(key.to_string(), stringify(other, pos)?)]),
    }
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "parse".to_string(),
        native("query.parse", |vm, pos, args| {
            arity_exact("query.parse(urlOrQuery)", args, 1, pos)?;
            let input = want_str("query.parse(urlOrQuery)", args, 0, pos)?;
            let out = pairs_to_dict(split_pairs(&query_part(input)));
            vm.ctx().check_value(&out, pos)?;
            Ok(out)
        }),
    );

    ns.insert(
        "encode".to_string(),
        native("query.encode", |vm, pos, args| {
            arity_exact("query.encode(map)", args, 1, pos)?;
            let map = want_dict("query.encode(map)", args, 0, pos)?;
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut pairs = Vec::new();
            for key in keys {
                pairs.extend(value_to_pairs("query.encode(map)", key, &map[key.as_str()], pos)?);
            }
            let out = encode_pairs(&pairs);
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    ns.insert(
        "merge".to_string(),
        native("query.merge", |vm, pos, args| {
            arity_exact("query.merge(url, map)", args, 2, pos)?;
            let input = want_str("query.merge(url, map)", args, 0, pos)?;
            let map = want_dict("query.merge(url, map)", args, 1, pos)?;

            let (base, raw_query) = match input.split_once('?') {
                Some((base, query)) => (base, query),
                None => (input, ""),
            };
            let mut pairs = split_pairs(raw_query);

            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                let value = &map[key.as_str()];
                // every merged key replaces existing values; null just deletes
                pairs.retain(|(k, _)| k != key.as_str());
                pairs.extend(value_to_pairs("query.merge(url, map)", key, value, pos)?);
            }

            let encoded = encode_pairs(&pairs);
            let out = if encoded.is_empty() {
                base.to_string()
            } else {
                format!("{}?{}", base, encoded)
            };
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    Value::Dict(ns)
}
