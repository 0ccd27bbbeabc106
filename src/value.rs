// ABOUTME: Runtime value types, truthiness/equality rules and JSON conversion

use crate::ast::Block;
use crate::env::Env;
use crate::error::{EvalError, Pos};
use crate::vm::Vm;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A user-defined function: first-class, closing over its defining scope.
#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub env: Rc<Env>,
    pub pos: Pos,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The captured env is omitted: closures may reference themselves
        // through it and a derived Debug would recurse forever.
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("pos", &self.pos)
            .finish()
    }
}

/// A host-provided callable.
///
/// Stdlib builtins and host-object bound methods share this shape; the
/// closure receives the VM so it can consult limits, hooks, and call back
/// into user functions (`list.map` and friends).
#[derive(Clone)]
pub struct NativeFn {
    pub name: Rc<str>,
    f: Rc<dyn Fn(&mut Vm, Pos, &[Value]) -> Result<Value, EvalError>>,
}

impl NativeFn {
    pub fn new<F>(name: impl Into<Rc<str>>, f: F) -> Self
    where
        F: Fn(&mut Vm, Pos, &[Value]) -> Result<Value, EvalError> + 'static,
    {
        Self {
            name: name.into(),
            f: Rc::new(f),
        }
    }

    pub fn call(&self, vm: &mut Vm, pos: Pos, args: &[Value]) -> Result<Value, EvalError> {
        (self.f)(vm, pos, args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

/// Capability set implemented by every non-primitive root value the host
/// exposes (env, vars, request, response, trace, stream, try-results,
/// module objects).
pub trait HostObject {
    fn type_name(&self) -> &str;

    fn get_member(&self, name: &str) -> Option<Value>;

    fn index(&self, key: &Value, pos: Pos) -> Result<Value, EvalError> {
        match key {
            Value::Str(name) => Ok(self.get_member(name).unwrap_or(Value::Null)),
            other => Err(EvalError::runtime(
                pos,
                format!("{} index must be a string, got {}", self.type_name(), other.type_name()),
            )),
        }
    }

    fn truthy(&self) -> bool {
        true
    }

    /// JSON view of the object, for stringification. None means the object
    /// has no serializable form.
    fn to_interface(&self) -> Option<serde_json::Value> {
        None
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
    Dict(HashMap<String, Value>),
    Func(Rc<Function>),
    Native(NativeFn),
    Object(Rc<dyn HostObject>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Dict(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "Dict{{")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {:?}", k, map[k.as_str()])?;
                }
                write!(f, "}}")
            }
            Value::Func(func) => write!(f, "Func({})", func.name),
            Value::Native(n) => write!(f, "Native({})", n.name),
            Value::Object(o) => write!(f, "Object({})", o.type_name()),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Dict(_) => "dict".to_string(),
            Value::Func(_) => "function".to_string(),
            Value::Native(_) => "native".to_string(),
            Value::Object(o) => o.type_name().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
            Value::Func(_) | Value::Native(_) => true,
            Value::Object(o) => o.truthy(),
        }
    }

    /// Deep structural equality, for tests and assertions outside the
    /// language. The language's own `==` is `values_equal`.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.deep_eq(w)))
            }
            _ => values_equal(self, other),
        }
    }
}

/// Language `==`: by tag, structural for primitives only. Composites and
/// objects never compare equal (documented limitation).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => false,
    }
}

/// Minimal round-trip decimal rendering; integral values print without a
/// fractional part.
pub fn fmt_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Convert a runtime value into a serde_json value. Functions, natives and
/// objects without a JSON interface are rejected with a message naming the
/// offending type.
pub fn to_json(value: &Value) -> Result<serde_json::Value, String> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => {
            if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                Ok(serde_json::Value::Number(serde_json::Number::from(*n as i64)))
            } else if let Some(num) = serde_json::Number::from_f64(*n) {
                Ok(serde_json::Value::Number(num))
            } else {
                Err(format!("cannot convert number {} to JSON", n))
            }
        }
        Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
        Value::List(items) => {
            let converted: Result<Vec<_>, _> = items.iter().map(to_json).collect();
            Ok(serde_json::Value::Array(converted?))
        }
        Value::Dict(map) => {
            // serde_json::Map is BTreeMap-backed, so keys come out sorted.
            let mut out = serde_json::Map::new();
            for (key, val) in map {
                out.insert(key.clone(), to_json(val)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        Value::Object(o) => o
            .to_interface()
            .ok_or_else(|| format!("cannot convert {} to JSON", o.type_name())),
        other => Err(format!("cannot convert {} to JSON", other.type_name())),
    }
}

/// Convert parsed JSON into a runtime value.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(arr) => Value::List(arr.iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            let mut map = HashMap::new();
            for (key, val) in obj {
                map.insert(key.clone(), from_json(val));
            }
            Value::Dict(map)
        }
    }
}

/// The stringification rule shared by `+` concatenation, `str()` and
/// `eval_str`: strings pass through, numbers render minimally, null is
/// empty, composites and JSON-capable objects render as JSON.
pub fn stringify(value: &Value, pos: Pos) -> Result<String, EvalError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        Value::Number(n) => Ok(fmt_number(*n)),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Null => Ok(String::new()),
        Value::List(_) | Value::Dict(_) | Value::Object(_) => {
            let json = to_json(value).map_err(|msg| EvalError::runtime(pos, msg))?;
            serde_json::to_string(&json)
                .map_err(|e| EvalError::runtime(pos, format!("cannot stringify value: {}", e)))
        }
        other => Err(EvalError::runtime(
            pos,
            format!("cannot convert {} to string", other.type_name()),
        )),
    }
}
