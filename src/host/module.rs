// ABOUTME: Module objects exposing a compiled module's exports under its use-alias

use crate::value::{HostObject, Value};
use std::collections::HashMap;
use std::rc::Rc;

pub struct ModuleObject {
    alias: String,
    exports: Rc<HashMap<String, Value>>,
}

impl ModuleObject {
    pub fn new(alias: impl Into<String>, exports: Rc<HashMap<String, Value>>) -> Value {
        Value::Object(Rc::new(ModuleObject {
            alias: alias.into(),
            exports,
        }))
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl HostObject for ModuleObject {
    fn type_name(&self) -> &str {
        "module"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        self.exports.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Pos;
    use crate::value::values_equal;

    #[test]
    fn test_exports_visible_by_member_and_index() {
        let mut exports = HashMap::new();
        exports.insert("answer".to_string(), Value::Number(42.0));
        let module = ModuleObject::new("util", Rc::new(exports));

        match &module {
            Value::Object(o) => {
                assert!(matches!(o.get_member("answer"), Some(Value::Number(n)) if n == 42.0));
                assert!(o.get_member("missing").is_none());

                let by_index = o
                    .index(&Value::Str("answer".to_string()), Pos::default())
                    .unwrap();
                assert!(values_equal(&by_index, &Value::Number(42.0)));
                // missing index resolves to null at the language boundary
                let missing = o
                    .index(&Value::Str("nope".to_string()), Pos::default())
                    .unwrap();
                assert!(missing.is_null());
            }
            other => panic!("Expected object, got {:?}", other),
        }
    }
}
