// ABOUTME: Response/last host objects with lazily cached JSON body parsing

use crate::error::{EvalError, Pos};
use crate::host::{header_get, headers_to_dict};
use crate::jsonpath;
use crate::value::{from_json, HostObject, NativeFn, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Host-supplied view of an HTTP response.
#[derive(Debug, Clone, Default)]
pub struct ResponseData {
    pub status: u16,
    pub status_text: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// The body parses at most once; the parse result (value or error) is cached
/// and replayed on every later `.json()` call.
type JsonCache = Rc<RefCell<Option<Result<Value, String>>>>;

pub struct ResponseObject {
    data: Rc<ResponseData>,
    json_cache: JsonCache,
}

impl ResponseObject {
    pub fn new(data: Rc<ResponseData>) -> Value {
        Value::Object(Rc::new(ResponseObject {
            data,
            json_cache: Rc::new(RefCell::new(None)),
        }))
    }
}

fn parse_body(data: &ResponseData) -> Result<Value, String> {
    match &data.body {
        None => Ok(Value::Null),
        Some(bytes) if bytes.is_empty() => Ok(Value::Null),
        Some(bytes) => serde_json::from_slice::<serde_json::Value>(bytes)
            .map(|json| from_json(&json))
            .map_err(|e| format!("response body is not valid JSON: {}", e)),
    }
}

impl HostObject for ResponseObject {
    fn type_name(&self) -> &str {
        "response"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "status" | "statusCode" => Some(Value::Number(f64::from(self.data.status))),
            "statusText" => Some(Value::Str(self.data.status_text.clone())),
            "url" => Some(Value::Str(self.data.url.clone())),
            "headers" => Some(headers_to_dict(&self.data.headers)),
            "header" => {
                let data = self.data.clone();
                Some(Value::Native(NativeFn::new(
                    "response.header",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: response.header(name)"));
                        }
                        let name = match &args[0] {
                            Value::Str(s) => s,
                            other => {
                                return Err(EvalError::runtime(
                                    pos,
                                    format!(
                                        "response.header(name): expected string, got {} at argument 1",
                                        other.type_name()
                                    ),
                                ));
                            }
                        };
                        Ok(Value::Str(
                            header_get(&data.headers, name).unwrap_or("").to_string(),
                        ))
                    },
                )))
            }
            "text" => {
                let data = self.data.clone();
                Some(Value::Native(NativeFn::new(
                    "response.text",
                    move |vm, pos, args| {
                        if !args.is_empty() {
                            return Err(EvalError::runtime(pos, "usage: response.text()"));
                        }
                        let bytes = match &data.body {
                            Some(b) => b.as_slice(),
                            None => &[],
                        };
                        let max = vm.ctx().limits.max_str;
                        if max > 0 && bytes.len() > max {
                            return Err(EvalError::runtime(
                                pos,
                                format!("response text too long ({} > {} bytes)", bytes.len(), max),
                            ));
                        }
                        Ok(Value::Str(String::from_utf8_lossy(bytes).into_owned()))
                    },
                )))
            }
            "json" => {
                let data = self.data.clone();
                let cache = self.json_cache.clone();
                Some(Value::Native(NativeFn::new(
                    "response.json",
                    move |_, pos, args| {
                        if args.len() > 1 {
                            return Err(EvalError::runtime(pos, "usage: response.json([path])"));
                        }
                        let parsed = {
                            let mut cache = cache.borrow_mut();
                            cache.get_or_insert_with(|| parse_body(&data)).clone()
                        };
                        let value = parsed.map_err(|msg| EvalError::runtime(pos, msg))?;
                        match args.first() {
                            None => Ok(value),
                            Some(Value::Str(path)) => {
                                Ok(jsonpath::resolve(&value, path).unwrap_or(Value::Null))
                            }
                            Some(other) => Err(EvalError::runtime(
                                pos,
                                format!(
                                    "response.json([path]): expected string, got {} at argument 1",
                                    other.type_name()
                                ),
                            )),
                        }
                    },
                )))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ExecContext, Limits};
    use crate::vm::Vm;

    fn response(body: Option<&str>) -> Value {
        ResponseObject::new(Rc::new(ResponseData {
            status: 200,
            status_text: "200 OK".to_string(),
            url: "https://api.test/thing".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.map(|b| b.as_bytes().to_vec()),
        }))
    }

    fn get(value: &Value, name: &str) -> Value {
        match value {
            Value::Object(o) => o.get_member(name).unwrap(),
            other => panic!("Expected object, got {:?}", other),
        }
    }

    fn call(value: Value, args: &[Value]) -> Result<Value, EvalError> {
        let mut vm = Vm::new(ExecContext::new(Limits::default(), &Context::default()));
        match value {
            Value::Native(native) => native.call(&mut vm, Pos::default(), args),
            other => panic!("Expected native, got {:?}", other),
        }
    }

    #[test]
    fn test_status_members() {
        let resp = response(None);
        assert!(matches!(get(&resp, "status"), Value::Number(n) if n == 200.0));
        assert!(matches!(get(&resp, "statusCode"), Value::Number(n) if n == 200.0));
        assert!(matches!(get(&resp, "statusText"), Value::Str(s) if s == "200 OK"));
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        // scenario S5
        let resp = response(Some(r#"{"ok":true}"#));
        match call(get(&resp, "header"), &[Value::Str("Content-Type".into())]).unwrap() {
            Value::Str(s) => assert_eq!(s, "application/json"),
            other => panic!("Expected content type, got {:?}", other),
        }
    }

    #[test]
    fn test_json_parses_and_navigates() {
        // scenario S5
        let resp = response(Some(r#"{"ok":true,"items":[{"id":7}]}"#));
        match call(get(&resp, "json"), &[]).unwrap() {
            Value::Dict(map) => assert!(matches!(map.get("ok"), Some(Value::Bool(true)))),
            other => panic!("Expected dict, got {:?}", other),
        }
        match call(get(&resp, "json"), &[Value::Str("items[0].id".into())]).unwrap() {
            Value::Number(n) => assert_eq!(n, 7.0),
            other => panic!("Expected 7, got {:?}", other),
        }
        // unresolved path is null, not an error
        assert!(matches!(
            call(get(&resp, "json"), &[Value::Str("items[9].id".into())]).unwrap(),
            Value::Null
        ));
    }

    #[test]
    fn test_json_missing_body_is_null() {
        let resp = response(None);
        assert!(matches!(call(get(&resp, "json"), &[]).unwrap(), Value::Null));
    }

    #[test]
    fn test_json_parse_error_is_cached() {
        let resp = response(Some("not json"));
        let first = call(get(&resp, "json"), &[]).unwrap_err();
        let second = call(get(&resp, "json"), &[]).unwrap_err();
        assert!(first.message.contains("not valid JSON"));
        assert_eq!(first.message, second.message);
    }

    #[test]
    fn test_json_reuses_cached_parse() {
        let resp = response(Some(r#"{"n":1}"#));
        let a = call(get(&resp, "json"), &[]).unwrap();
        let b = call(get(&resp, "json"), &[]).unwrap();
        assert!(a.deep_eq(&b));
    }

    #[test]
    fn test_text_respects_max_str() {
        let resp = response(Some("hello world"));
        match call(get(&resp, "text"), &[]).unwrap() {
            Value::Str(s) => assert_eq!(s, "hello world"),
            other => panic!("Expected body, got {:?}", other),
        }

        let tiny = Limits {
            max_str: 4,
            ..Limits::unlimited()
        };
        let mut vm = Vm::new(ExecContext::new(tiny, &Context::default()));
        let text = get(&response(Some("hello world")), "text");
        match text {
            Value::Native(native) => {
                let err = native.call(&mut vm, Pos::default(), &[]).unwrap_err();
                assert!(err.message.contains("too long"));
            }
            other => panic!("Expected native, got {:?}", other),
        }
    }
}
