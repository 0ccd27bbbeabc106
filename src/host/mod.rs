// ABOUTME: Host-object surface: ambient env/vars, request, response, trace, stream

pub mod ambient;
pub mod module;
pub mod request;
pub mod response;
pub mod result;
pub mod stream;
pub mod trace;

use crate::value::Value;
use std::collections::HashMap;

/// Capability for mutating the host's variable store.
pub trait VarsMutator {
    fn set_var(&self, name: &str, value: &str);
}

/// Capability for mutating the host's global (cross-file) variable store.
pub trait GlobalsMutator {
    fn set_global(&self, name: &str, value: &str, secret: bool);
    fn delete_global(&self, name: &str);
}

/// Capability for mutating the request under assembly. Bound only for the
/// duration of an evaluation; absent capability means the request is
/// read-only.
pub trait RequestMutator {
    fn set_method(&self, method: &str);
    fn set_url(&self, url: &str);
    fn set_header(&self, name: &str, value: &str);
    fn add_header(&self, name: &str, value: &str);
    fn remove_header(&self, name: &str);
    fn set_query_param(&self, name: &str, value: &str);
    fn set_body(&self, body: &str);
}

/// First header value matching `name`, case-insensitively.
pub(crate) fn header_get<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Header list as a dict value: single values map to strings, repeated
/// names to lists, preserving first-seen name casing.
pub(crate) fn headers_to_dict(headers: &[(String, String)]) -> Value {
    let mut out: HashMap<String, Value> = HashMap::new();
    for (name, value) in headers {
        let key = headers_key(&out, name);
        match out.remove(&key) {
            None => {
                out.insert(name.clone(), Value::Str(value.clone()));
            }
            Some(Value::Str(first)) => {
                out.insert(
                    key,
                    Value::List(vec![Value::Str(first), Value::Str(value.clone())]),
                );
            }
            Some(Value::List(mut items)) => {
                items.push(Value::Str(value.clone()));
                out.insert(key, Value::List(items));
            }
            Some(other) => {
                out.insert(key, other);
            }
        }
    }
    Value::Dict(out)
}

fn headers_key(map: &HashMap<String, Value>, name: &str) -> String {
    map.keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

/// Case-insensitive lookup over a plain string map (env/vars semantics).
pub(crate) fn ci_get<'a>(map: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    if let Some(v) = map.get(name) {
        return Some(v.as_str());
    }
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_get_case_insensitive() {
        let headers = vec![("Content-Type".to_string(), "text/plain".to_string())];
        assert_eq!(header_get(&headers, "content-type"), Some("text/plain"));
        assert_eq!(header_get(&headers, "CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(header_get(&headers, "accept"), None);
    }

    #[test]
    fn test_headers_to_dict_groups_repeats() {
        let headers = vec![
            ("Set-Cookie".to_string(), "a=1".to_string()),
            ("set-cookie".to_string(), "b=2".to_string()),
            ("Host".to_string(), "example.com".to_string()),
        ];
        match headers_to_dict(&headers) {
            Value::Dict(map) => {
                match map.get("Set-Cookie") {
                    Some(Value::List(items)) => assert_eq!(items.len(), 2),
                    other => panic!("Expected list of cookies, got {:?}", other),
                }
                assert!(matches!(map.get("Host"), Some(Value::Str(_))));
            }
            other => panic!("Expected dict, got {:?}", other),
        }
    }

    #[test]
    fn test_ci_get_prefers_exact_match() {
        let mut map = HashMap::new();
        map.insert("Mode".to_string(), "upper".to_string());
        map.insert("mode".to_string(), "lower".to_string());
        assert_eq!(ci_get(&map, "mode"), Some("lower"));
        assert!(ci_get(&map, "MODE").is_some());
    }
}
