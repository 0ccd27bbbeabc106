// ABOUTME: Ambient env and vars host objects with capability-scoped mutation

use crate::error::{EvalError, Pos};
use crate::host::{ci_get, GlobalsMutator, VarsMutator};
use crate::value::{stringify, HostObject, NativeFn, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

fn require_value(
    obj_name: &str,
    found: Option<&str>,
    name: &str,
    custom: Option<String>,
    pos: Pos,
) -> Result<Value, EvalError> {
    match found {
        Some(v) if !v.trim().is_empty() => Ok(Value::Str(v.to_string())),
        _ => Err(EvalError::runtime(
            pos,
            custom.unwrap_or_else(|| format!("{}: required value \"{}\" is not set", obj_name, name)),
        )),
    }
}

fn want_name(sig: &str, args: &[Value], pos: Pos) -> Result<String, EvalError> {
    match args.first() {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(EvalError::runtime(
            pos,
            format!("{}: expected string, got {} at argument 1", sig, other.type_name()),
        )),
        None => Err(EvalError::runtime(pos, format!("usage: {}", sig))),
    }
}

fn optional_message(sig: &str, args: &[Value], pos: Pos) -> Result<Option<String>, EvalError> {
    match args.get(1) {
        None => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s.clone())),
        Some(other) => Err(EvalError::runtime(
            pos,
            format!("{}: expected string, got {} at argument 2", sig, other.type_name()),
        )),
    }
}

// ============================================================================
// env: read-only ambient values
// ============================================================================

pub struct EnvObject {
    map: Rc<HashMap<String, String>>,
}

impl EnvObject {
    pub fn new(map: HashMap<String, String>) -> Value {
        Value::Object(Rc::new(EnvObject { map: Rc::new(map) }))
    }
}

impl HostObject for EnvObject {
    fn type_name(&self) -> &str {
        "env"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "get" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new("env.get", move |_, pos, args| {
                    if args.len() != 1 {
                        return Err(EvalError::runtime(pos, "usage: env.get(name)"));
                    }
                    let name = want_name("env.get(name)", args, pos)?;
                    Ok(match ci_get(&map, &name) {
                        Some(v) => Value::Str(v.to_string()),
                        None => Value::Null,
                    })
                })))
            }
            "has" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new("env.has", move |_, pos, args| {
                    if args.len() != 1 {
                        return Err(EvalError::runtime(pos, "usage: env.has(name)"));
                    }
                    let name = want_name("env.has(name)", args, pos)?;
                    Ok(Value::Bool(ci_get(&map, &name).is_some()))
                })))
            }
            "require" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new(
                    "env.require",
                    move |_, pos, args| {
                        if args.is_empty() || args.len() > 2 {
                            return Err(EvalError::runtime(pos, "usage: env.require(name[, message])"));
                        }
                        let name = want_name("env.require(name[, message])", args, pos)?;
                        let custom = optional_message("env.require(name[, message])", args, pos)?;
                        require_value("env", ci_get(&map, &name), &name, custom, pos)
                    },
                )))
            }
            other => ci_get(&self.map, other).map(|v| Value::Str(v.to_string())),
        }
    }

    fn index(&self, key: &Value, pos: Pos) -> Result<Value, EvalError> {
        match key {
            Value::Str(name) => Ok(match ci_get(&self.map, name) {
                Some(v) => Value::Str(v.to_string()),
                None => Value::Null,
            }),
            other => Err(EvalError::runtime(
                pos,
                format!("env index must be a string, got {}", other.type_name()),
            )),
        }
    }
}

// ============================================================================
// vars: mutable request-scoped values plus nested vars.global
// ============================================================================

pub struct VarsObject {
    map: Rc<RefCell<HashMap<String, String>>>,
    mutator: Option<Rc<dyn VarsMutator>>,
    global: Rc<GlobalObject>,
}

impl VarsObject {
    pub fn new(
        vars: HashMap<String, String>,
        globals: HashMap<String, String>,
        mutator: Option<Rc<dyn VarsMutator>>,
        globals_mutator: Option<Rc<dyn GlobalsMutator>>,
    ) -> Value {
        Value::Object(Rc::new(VarsObject {
            map: Rc::new(RefCell::new(vars)),
            mutator,
            global: Rc::new(GlobalObject {
                map: Rc::new(RefCell::new(globals)),
                mutator: globals_mutator,
            }),
        }))
    }
}

impl HostObject for VarsObject {
    fn type_name(&self) -> &str {
        "vars"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "global" => Some(Value::Object(self.global.clone())),
            "get" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new("vars.get", move |_, pos, args| {
                    if args.len() != 1 {
                        return Err(EvalError::runtime(pos, "usage: vars.get(name)"));
                    }
                    let name = want_name("vars.get(name)", args, pos)?;
                    Ok(match ci_get(&map.borrow(), &name) {
                        Some(v) => Value::Str(v.to_string()),
                        None => Value::Null,
                    })
                })))
            }
            "has" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new("vars.has", move |_, pos, args| {
                    if args.len() != 1 {
                        return Err(EvalError::runtime(pos, "usage: vars.has(name)"));
                    }
                    let name = want_name("vars.has(name)", args, pos)?;
                    Ok(Value::Bool(ci_get(&map.borrow(), &name).is_some()))
                })))
            }
            "require" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new(
                    "vars.require",
                    move |_, pos, args| {
                        if args.is_empty() || args.len() > 2 {
                            return Err(EvalError::runtime(
                                pos,
                                "usage: vars.require(name[, message])",
                            ));
                        }
                        let name = want_name("vars.require(name[, message])", args, pos)?;
                        let custom =
                            optional_message("vars.require(name[, message])", args, pos)?;
                        require_value("vars", ci_get(&map.borrow(), &name), &name, custom, pos)
                    },
                )))
            }
            "set" => {
                let map = self.map.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new("vars.set", move |_, pos, args| {
                    if args.len() != 2 {
                        return Err(EvalError::runtime(pos, "usage: vars.set(name, value)"));
                    }
                    let name = want_name("vars.set(name, value)", args, pos)?;
                    let value = stringify(&args[1], pos)?;
                    let Some(mutator) = &mutator else {
                        return Err(EvalError::runtime(pos, "vars is read-only"));
                    };
                    mutator.set_var(&name, &value);
                    // keep the local cache in sync so later reads in this
                    // evaluation observe the write
                    map.borrow_mut().insert(name, value);
                    Ok(Value::Null)
                })))
            }
            other => ci_get(&self.map.borrow(), other).map(|v| Value::Str(v.to_string())),
        }
    }

    fn index(&self, key: &Value, pos: Pos) -> Result<Value, EvalError> {
        match key {
            Value::Str(name) => Ok(match ci_get(&self.map.borrow(), name) {
                Some(v) => Value::Str(v.to_string()),
                None => Value::Null,
            }),
            other => Err(EvalError::runtime(
                pos,
                format!("vars index must be a string, got {}", other.type_name()),
            )),
        }
    }
}

pub struct GlobalObject {
    map: Rc<RefCell<HashMap<String, String>>>,
    mutator: Option<Rc<dyn GlobalsMutator>>,
}

impl HostObject for GlobalObject {
    fn type_name(&self) -> &str {
        "globals"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "get" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new(
                    "vars.global.get",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: vars.global.get(name)"));
                        }
                        let name = want_name("vars.global.get(name)", args, pos)?;
                        Ok(match ci_get(&map.borrow(), &name) {
                            Some(v) => Value::Str(v.to_string()),
                            None => Value::Null,
                        })
                    },
                )))
            }
            "has" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new(
                    "vars.global.has",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: vars.global.has(name)"));
                        }
                        let name = want_name("vars.global.has(name)", args, pos)?;
                        Ok(Value::Bool(ci_get(&map.borrow(), &name).is_some()))
                    },
                )))
            }
            "require" => {
                let map = self.map.clone();
                Some(Value::Native(NativeFn::new(
                    "vars.global.require",
                    move |_, pos, args| {
                        if args.is_empty() || args.len() > 2 {
                            return Err(EvalError::runtime(
                                pos,
                                "usage: vars.global.require(name[, message])",
                            ));
                        }
                        let name = want_name("vars.global.require(name[, message])", args, pos)?;
                        let custom =
                            optional_message("vars.global.require(name[, message])", args, pos)?;
                        require_value(
                            "vars.global",
                            ci_get(&map.borrow(), &name),
                            &name,
                            custom,
                            pos,
                        )
                    },
                )))
            }
            "set" => {
                let map = self.map.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "vars.global.set",
                    move |_, pos, args| {
                        if args.len() < 2 || args.len() > 3 {
                            return Err(EvalError::runtime(
                                pos,
                                "usage: vars.global.set(name, value[, secret])",
                            ));
                        }
                        let name = want_name("vars.global.set(name, value[, secret])", args, pos)?;
                        let value = stringify(&args[1], pos)?;
                        let secret = match args.get(2) {
                            None => false,
                            Some(Value::Bool(b)) => *b,
                            Some(other) => {
                                return Err(EvalError::runtime(
                                    pos,
                                    format!(
                                        "vars.global.set(name, value[, secret]): expected bool, got {} at argument 3",
                                        other.type_name()
                                    ),
                                ));
                            }
                        };
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "vars.global is read-only"));
                        };
                        mutator.set_global(&name, &value, secret);
                        map.borrow_mut().insert(name, value);
                        Ok(Value::Null)
                    },
                )))
            }
            "delete" => {
                let map = self.map.clone();
                let mutator = self.mutator.clone();
                Some(Value::Native(NativeFn::new(
                    "vars.global.delete",
                    move |_, pos, args| {
                        if args.len() != 1 {
                            return Err(EvalError::runtime(pos, "usage: vars.global.delete(name)"));
                        }
                        let name = want_name("vars.global.delete(name)", args, pos)?;
                        let Some(mutator) = &mutator else {
                            return Err(EvalError::runtime(pos, "vars.global is read-only"));
                        };
                        mutator.delete_global(&name);
                        let existing: Option<String> = {
                            let map = map.borrow();
                            map.keys().find(|k| k.eq_ignore_ascii_case(&name)).cloned()
                        };
                        if let Some(key) = existing {
                            map.borrow_mut().remove(&key);
                        }
                        Ok(Value::Null)
                    },
                )))
            }
            other => ci_get(&self.map.borrow(), other).map(|v| Value::Str(v.to_string())),
        }
    }

    fn index(&self, key: &Value, pos: Pos) -> Result<Value, EvalError> {
        match key {
            Value::Str(name) => Ok(match ci_get(&self.map.borrow(), name) {
                Some(v) => Value::Str(v.to_string()),
                None => Value::Null,
            }),
            other => Err(EvalError::runtime(
                pos,
                format!("globals index must be a string, got {}", other.type_name()),
            )),
        }
    }
}
