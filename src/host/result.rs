// ABOUTME: The `result` object produced by try expressions

use crate::value::{to_json, HostObject, Value};
use std::rc::Rc;

/// Outcome of a `try` expression: `ok`, `value`, `error`. Its truthiness is
/// the `ok` flag, so `if try expr { ... }` reads as "the expression
/// succeeded".
pub struct TryResult {
    pub ok: bool,
    pub value: Value,
    pub error: Option<String>,
}

impl TryResult {
    pub fn ok(value: Value) -> Value {
        Value::Object(Rc::new(TryResult {
            ok: true,
            value,
            error: None,
        }))
    }

    pub fn err(message: impl Into<String>) -> Value {
        Value::Object(Rc::new(TryResult {
            ok: false,
            value: Value::Null,
            error: Some(message.into()),
        }))
    }
}

impl HostObject for TryResult {
    fn type_name(&self) -> &str {
        "result"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "ok" => Some(Value::Bool(self.ok)),
            "value" => Some(self.value.clone()),
            "error" => Some(match &self.error {
                Some(msg) => Value::Str(msg.clone()),
                None => Value::Null,
            }),
            _ => None,
        }
    }

    fn truthy(&self) -> bool {
        self.ok
    }

    fn to_interface(&self) -> Option<serde_json::Value> {
        let value = to_json(&self.value).unwrap_or(serde_json::Value::Null);
        Some(serde_json::json!({
            "ok": self.ok,
            "value": value,
            "error": self.error,
        }))
    }
}
