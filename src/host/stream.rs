// ABOUTME: Stream host object over a caller-supplied SSE/WS streaming record

use crate::value::{from_json, HostObject, NativeFn, Value};
use serde::Serialize;
use std::rc::Rc;

/// Record of a streaming exchange captured by the host client.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamRecord {
    /// "sse" or "ws"
    pub kind: String,
    pub summary: String,
    pub events: Vec<StreamEvent>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamEvent {
    pub name: String,
    pub data: String,
}

pub struct StreamObject {
    record: Rc<StreamRecord>,
    enabled: bool,
}

impl StreamObject {
    pub fn new(record: Rc<StreamRecord>, enabled: bool) -> Value {
        Value::Object(Rc::new(StreamObject { record, enabled }))
    }
}

impl HostObject for StreamObject {
    fn type_name(&self) -> &str {
        "stream"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "enabled" => {
                let enabled = self.enabled;
                Some(Value::Native(NativeFn::new("stream.enabled", move |_, _, _| {
                    Ok(Value::Bool(enabled))
                })))
            }
            "kind" => {
                let record = self.record.clone();
                Some(Value::Native(NativeFn::new("stream.kind", move |_, _, _| {
                    Ok(Value::Str(record.kind.clone()))
                })))
            }
            "summary" => {
                let record = self.record.clone();
                Some(Value::Native(NativeFn::new("stream.summary", move |_, _, _| {
                    Ok(Value::Str(record.summary.clone()))
                })))
            }
            "events" => {
                let record = self.record.clone();
                Some(Value::Native(NativeFn::new("stream.events", move |_, pos, _| {
                    let json = serde_json::to_value(&record.events).map_err(|e| {
                        crate::error::EvalError::runtime(
                            pos,
                            format!("cannot serialize stream events: {}", e),
                        )
                    })?;
                    Ok(from_json(&json))
                })))
            }
            _ => None,
        }
    }

    fn to_interface(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self.record.as_ref()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ExecContext, Limits};
    use crate::error::Pos;
    use crate::vm::Vm;

    fn sample() -> Value {
        StreamObject::new(
            Rc::new(StreamRecord {
                kind: "sse".to_string(),
                summary: "3 events in 1.2s".to_string(),
                events: vec![
                    StreamEvent {
                        name: "message".to_string(),
                        data: "one".to_string(),
                    },
                    StreamEvent {
                        name: "message".to_string(),
                        data: "two".to_string(),
                    },
                ],
            }),
            true,
        )
    }

    fn call0(value: &Value, name: &str) -> Value {
        let mut vm = Vm::new(ExecContext::new(Limits::default(), &Context::default()));
        match value {
            Value::Object(o) => match o.get_member(name).unwrap() {
                Value::Native(native) => native.call(&mut vm, Pos::default(), &[]).unwrap(),
                other => panic!("Expected native, got {:?}", other),
            },
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_surface() {
        let stream = sample();
        assert!(matches!(call0(&stream, "enabled"), Value::Bool(true)));
        assert!(matches!(call0(&stream, "kind"), Value::Str(s) if s == "sse"));
        assert!(matches!(call0(&stream, "summary"), Value::Str(s) if s.contains("events")));
    }

    #[test]
    fn test_events_materialize_as_dicts() {
        match call0(&sample(), "events") {
            Value::List(items) => {
                assert_eq!(items.len(), 2);
                match &items[0] {
                    Value::Dict(map) => {
                        assert!(matches!(map.get("name"), Some(Value::Str(s)) if s == "message"));
                        assert!(matches!(map.get("data"), Some(Value::Str(s)) if s == "one"));
                    }
                    other => panic!("Expected dict event, got {:?}", other),
                }
            }
            other => panic!("Expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_disabled_stream() {
        let stream = StreamObject::new(Rc::new(StreamRecord::default()), false);
        assert!(matches!(call0(&stream, "enabled"), Value::Bool(false)));
        match call0(&stream, "events") {
            Value::List(items) => assert!(items.is_empty()),
            other => panic!("Expected empty list, got {:?}", other),
        }
    }
}
