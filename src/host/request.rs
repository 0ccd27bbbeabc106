// ABOUTME: The mutable request host object backed by a capability-scoped mutator

use crate::error::{EvalError, Pos};
use crate::host::{header_get, headers_to_dict, RequestMutator};
use crate::value::{HostObject, NativeFn, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Snapshot of the request under assembly. The engine hands this in per
/// evaluation; mutations update both the host (through the mutator) and this
/// local state so later reads observe them.
#[derive(Debug, Clone, Default)]
pub struct RequestState {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Query parameters, when the host has already parsed them. Absent means
    /// derive from the URL on demand.
    pub query: Option<Vec<(String, String)>>,
}

pub struct RequestObject {
    state: Rc<RefCell<RequestState>>,
    mutator: Option<Rc<dyn RequestMutator>>,
}

impl RequestObject {
    pub fn new(
        state: Rc<RefCell<RequestState>>,
        mutator: Option<Rc<dyn RequestMutator>>,
    ) -> Value {
        Value::Object(Rc::new(RequestObject { state, mutator }))
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let state = self.state.borrow();
        if let Some(query) = &state.query {
            return query.clone();
        }
        match state.url.split_once('?') {
            Some((_, raw)) => crate::stdlib::query::split_pairs(raw),
            None => Vec::new(),
        }
    }

}

fn want_str(sig: &str, args: &[Value], i: usize, pos: Pos) -> Result<String, EvalError> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(EvalError::runtime(
            pos,
            format!(
                "{}: expected string, got {} at argument {}",
                sig,
                other.type_name(),
                i + 1
            ),
        )),
        None => Err(EvalError::runtime(pos, format!("usage: {}", sig))),
    }
}

impl HostObject for RequestObject {
    fn type_name(&self) -> &str {
        "request"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "method" => Some(Value::Str(self.state.borrow().method.clone())),
            "url" => Some(Value::Str(self.state.borrow().url.clone())),
            "headers" => Some(headers_to_dict(&self.state.borrow().headers)),
            "header" => {
                let state = self.state.clone();
                Some(Value::Native(NativeFn::new(
                    "request.header",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: request.header(name)"));
                        }
                        let name = want_str("request.header(name)", args, 0, pos)?;
                        let state = state.borrow();
                        Ok(Value::Str(
                            header_get(&state.headers, &name).unwrap_or("").to_string(),
                        ))
                    },
                )))
            }
            "query" => {
                let mut out: HashMap<String, Value> = HashMap::new();
                for (key, value) in self.query_pairs() {
                    match out.remove(&key) {
                        None => {
                            out.insert(key, Value::Str(value));
                        }
                        Some(Value::Str(first)) => {
                            out.insert(
                                key,
                                Value::List(vec![Value::Str(first), Value::Str(value)]),
                            );
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
                Some(Value::Dict(out))
            }
            "setMethod" => {
                let state = self.state.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "request.setMethod",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: request.setMethod(method)"));
                        }
                        let method = want_str("request.setMethod(method)", args, 0, pos)?;
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "request is read-only"));
                        };
                        mutator.set_method(&method);
                        state.borrow_mut().method = method;
                        Ok(Value::Null)
                    },
                )))
            }
            "setURL" => {
                let state = self.state.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "request.setURL",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: request.setURL(url)"));
                        }
                        let url = want_str("request.setURL(url)", args, 0, pos)?;
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "request is read-only"));
                        };
                        mutator.set_url(&url);
                        let mut state = state.borrow_mut();
                        state.url = url;
                        state.query = None;
                        Ok(Value::Null)
                    },
                )))
            }
            "setHeader" => {
                let state = self.state.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "request.setHeader",
                    move |_, pos, args| {
                        if args.len() != 2 {
                            return Err(EvalError::runtime(
                                pos,
                                "usage: request.setHeader(name, value)",
                            ));
                        }
                        let name = want_str("request.setHeader(name, value)", args, 0, pos)?;
                        let value = want_str("request.setHeader(name, value)", args, 1, pos)?;
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "request is read-only"));
                        };
                        mutator.set_header(&name, &value);
                        let mut state = state.borrow_mut();
                        state.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
                        state.headers.push((name, value));
                        Ok(Value::Null)
                    },
                )))
            }
            "addHeader" => {
                let state = self.state.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "request.addHeader",
                    move |_, pos, args| {
                        if args.len() != 2 {
                            return Err(EvalError::runtime(
                                pos,
                                "usage: request.addHeader(name, value)",
                            ));
                        }
                        let name = want_str("request.addHeader(name, value)", args, 0, pos)?;
                        let value = want_str("request.addHeader(name, value)", args, 1, pos)?;
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "request is read-only"));
                        };
                        mutator.add_header(&name, &value);
                        state.borrow_mut().headers.push((name, value));
                        Ok(Value::Null)
                    },
                )))
            }
            "removeHeader" => {
                let state = self.state.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "request.removeHeader",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: request.removeHeader(name)"));
                        }
                        let name = want_str("request.removeHeader(name)", args, 0, pos)?;
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "request is read-only"));
                        };
                        mutator.remove_header(&name);
                        state
                            .borrow_mut()
                            .headers
                            .retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
                        Ok(Value::Null)
                    },
                )))
            }
            "setQueryParam" => {
                let state = self.state.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "request.setQueryParam",
                    move |_, pos, args| {
                        if args.len() != 2 {
                            return Err(EvalError::runtime(
                                pos,
                                "usage: request.setQueryParam(name, value)",
                            ));
                        }
                        let name = want_str("request.setQueryParam(name, value)", args, 0, pos)?;
                        let value = want_str("request.setQueryParam(name, value)", args, 1, pos)?;
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "request is read-only"));
                        };
                        mutator.set_query_param(&name, &value);
                        let mut state = state.borrow_mut();
                        let mut pairs = match state.query.take() {
                            Some(pairs) => pairs,
                            None => match state.url.split_once('?') {
                                Some((_, raw)) => crate::stdlib::query::split_pairs(raw),
                                None => Vec::new(),
                            },
                        };
                        pairs.retain(|(k, _)| k != &name);
                        pairs.push((name, value));
                        state.query = Some(pairs);
                        Ok(Value::Null)
                    },
                )))
            }
            "setBody" => {
                let state = self.state.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "request.setBody",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: request.setBody(body)"));
                        }
                        let body = want_str("request.setBody(body)", args, 0, pos)?;
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "request is read-only"));
                        };
                        mutator.set_body(&body);
                        state.borrow_mut().body = Some(body);
                        Ok(Value::Null)
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

    fn state() -> Rc<RefCell<RequestState>> {
        Rc::new(RefCell::new(RequestState {
            method: "GET".to_string(),
            url: "https://api.test/items?page=2&tag=a&tag=b".to_string(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
            query: None,
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
    fn test_read_surface() {
        let req = RequestObject::new(state(), None);
        assert!(matches!(get(&req, "method"), Value::Str(s) if s == "GET"));
        assert!(matches!(get(&req, "url"), Value::Str(s) if s.starts_with("https://")));

        match call(get(&req, "header"), &[Value::Str("accept".into())]).unwrap() {
            Value::Str(s) => assert_eq!(s, "application/json"),
            other => panic!("Expected header value, got {:?}", other),
        }
        // missing header is empty string, not null
        match call(get(&req, "header"), &[Value::Str("x-nope".into())]).unwrap() {
            Value::Str(s) => assert_eq!(s, ""),
            other => panic!("Expected empty string, got {:?}", other),
        }
    }

    #[test]
    fn test_query_parsed_from_url() {
        let req = RequestObject::new(state(), None);
        match get(&req, "query") {
            Value::Dict(map) => {
                assert!(matches!(map.get("page"), Some(Value::Str(s)) if s == "2"));
                match map.get("tag") {
                    Some(Value::List(items)) => assert_eq!(items.len(), 2),
                    other => panic!("Expected multi-value list, got {:?}", other),
                }
            }
            other => panic!("Expected dict, got {:?}", other),
        }
    }

    #[test]
    fn test_mutation_without_mutator_fails() {
        let req = RequestObject::new(state(), None);
        let err = call(get(&req, "setMethod"), &[Value::Str("POST".into())]).unwrap_err();
        assert_eq!(err.message, "request is read-only");
    }

    #[derive(Default)]
    struct RecordingMutator(RefCell<Vec<String>>);
    impl RequestMutator for RecordingMutator {
        fn set_method(&self, m: &str) {
            self.0.borrow_mut().push(format!("method {}", m));
        }
        fn set_url(&self, u: &str) {
            self.0.borrow_mut().push(format!("url {}", u));
        }
        fn set_header(&self, n: &str, v: &str) {
            self.0.borrow_mut().push(format!("set {}={}", n, v));
        }
        fn add_header(&self, n: &str, v: &str) {
            self.0.borrow_mut().push(format!("add {}={}", n, v));
        }
        fn remove_header(&self, n: &str) {
            self.0.borrow_mut().push(format!("remove {}", n));
        }
        fn set_query_param(&self, n: &str, v: &str) {
            self.0.borrow_mut().push(format!("query {}={}", n, v));
        }
        fn set_body(&self, b: &str) {
            self.0.borrow_mut().push(format!("body {}", b));
        }
    }

    #[test]
    fn test_mutations_update_host_and_local_state() {
        let recorder = Rc::new(RecordingMutator::default());
        let st = state();
        let req = RequestObject::new(st.clone(), Some(recorder.clone()));

        call(get(&req, "setMethod"), &[Value::Str("POST".into())]).unwrap();
        call(
            get(&req, "setHeader"),
            &[Value::Str("accept".into()), Value::Str("text/xml".into())],
        )
        .unwrap();
        call(
            get(&req, "addHeader"),
            &[Value::Str("X-Extra".into()), Value::Str("1".into())],
        )
        .unwrap();
        call(get(&req, "removeHeader"), &[Value::Str("X-Extra".into())]).unwrap();
        call(get(&req, "setBody"), &[Value::Str("{}".into())]).unwrap();

        let log = recorder.0.borrow();
        assert_eq!(
            *log,
            vec![
                "method POST",
                "set accept=text/xml",
                "add X-Extra=1",
                "remove X-Extra",
                "body {}"
            ]
        );

        // local snapshot reflects every change
        let snapshot = st.borrow();
        assert_eq!(snapshot.method, "POST");
        assert_eq!(snapshot.headers.len(), 1);
        assert_eq!(snapshot.headers[0].1, "text/xml");
        assert_eq!(snapshot.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_set_query_param_replaces() {
        let recorder = Rc::new(RecordingMutator::default());
        let st = state();
        let req = RequestObject::new(st.clone(), Some(recorder));

        call(
            get(&req, "setQueryParam"),
            &[Value::Str("page".into()), Value::Str("9".into())],
        )
        .unwrap();

        match get(&req, "query") {
            Value::Dict(map) => {
                assert!(matches!(map.get("page"), Some(Value::Str(s)) if s == "9"));
            }
            other => panic!("Expected dict, got {:?}", other),
        }
    }
}
