// ABOUTME: math namespace: abs/min/max/clamp and rounding

use crate::error::EvalError;
use crate::stdlib::{arity_exact, native, want_num};
use crate::value::Value;
use std::collections::HashMap;

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "abs".to_string(),
        native("math.abs", |_, pos, args| {
            arity_exact("math.abs(x)", args, 1, pos)?;
            Ok(Value::Number(want_num("math.abs(x)", args, 0, pos)?.abs()))
        }),
    );

    ns.insert(
        "min".to_string(),
        native("math.min", |_, pos, args| {
            arity_exact("math.min(a, b)", args, 2, pos)?;
            let a = want_num("math.min(a, b)", args, 0, pos)?;
            let b = want_num("math.min(a, b)", args, 1, pos)?;
            Ok(Value::Number(a.min(b)))
        }),
    );

    ns.insert(
        "max".to_string(),
        native("math.max", |_, pos, args| {
            arity_exact("math.max(a, b)", args, 2, pos)?;
            let a = want_num("math.max(a, b)", args, 0, pos)?;
            let b = want_num("math.max(a, b)", args, 1, pos)?;
            Ok(Value::Number(a.max(b)))
        }),
    );

    ns.insert(
        "clamp".to_string(),
        native("math.clamp", |_, pos, args| {
            arity_exact("math.clamp(x, lo, hi)", args, 3, pos)?;
            let x = want_num("math.clamp(x, lo, hi)", args, 0, pos)?;
            let lo = want_num("math.clamp(x, lo, hi)", args, 1, pos)?;
            let hi = want_num("math.clamp(x, lo, hi)", args, 2, pos)?;
            if lo > hi {
                return Err(EvalError::runtime(
                    pos,
                    format!("math.clamp(x, lo, hi): lo ({}) must not exceed hi ({})", lo, hi),
                ));
            }
            Ok(Value::Number(x.clamp(lo, hi)))
        }),
    );

    ns.insert(
        "floor".to_string(),
        native("math.floor", |_, pos, args| {
            arity_exact("math.floor(x)", args, 1, pos)?;
            Ok(Value::Number(want_num("math.floor(x)", args, 0, pos)?.floor()))
        }),
    );

    ns.insert(
        "ceil".to_string(),
        native("math.ceil", |_, pos, args| {
            arity_exact("math.ceil(x)", args, 1, pos)?;
            Ok(Value::Number(want_num("math.ceil(x)", args, 0, pos)?.ceil()))
        }),
    );

    ns.insert(
        "round".to_string(),
        native("math.round", |_, pos, args| {
            arity_exact("math.round(x)", args, 1, pos)?;
            Ok(Value::Number(want_num("math.round(x)", args, 0, pos)?.round()))
        }),
    );

    Value::Dict(ns)
}

#[cfg(test)]
mod tests {
    use crate::stdlib::testutil::{eval, num};

    #[test]
    fn test_abs_min_max() {
        assert_eq!(num("stdlib.math.abs(-3)"), 3.0);
        assert_eq!(num("stdlib.math.min(2, 5)"), 2.0);
        assert_eq!(num("stdlib.math.max(2, 5)"), 5.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(num("stdlib.math.clamp(7, 0, 5)"), 5.0);
        assert_eq!(num("stdlib.math.clamp(-1, 0, 5)"), 0.0);
        assert_eq!(num("stdlib.math.clamp(3, 0, 5)"), 3.0);
        assert!(eval("stdlib.math.clamp(1, 5, 0)").is_err());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(num("stdlib.math.floor(1.9)"), 1.0);
        assert_eq!(num("stdlib.math.ceil(1.1)"), 2.0);
        assert_eq!(num("stdlib.math.round(1.5)"), 2.0);
        assert_eq!(num("stdlib.math.round(-1.5)"), -2.0);
    }

    #[test]
    fn test_type_errors() {
        assert!(eval("stdlib.math.abs('x')").is_err());
    }
}
