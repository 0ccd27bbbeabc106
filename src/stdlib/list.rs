// ABOUTME: list namespace: building, sorting, higher-order helpers, slicing

use crate::error::EvalError;
use crate::stdlib::{arity_exact, arity_range, native, want_callable, want_int, want_list};
use crate::value::{values_equal, Value};
use std::collections::HashMap;

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "append".to_string(),
        native("list.append", |vm, pos, args| {
            arity_exact("list.append(list, value)", args, 2, pos)?;
            let items = want_list("list.append(list, value)", args, 0, pos)?;
            let mut out = items.to_vec();
            out.push(args[1].clone());
            let out = Value::List(out);
            vm.ctx().check_value(&out, pos)?;
            Ok(out)
        }),
    );

    ns.insert(
        "concat".to_string(),
        native("list.concat", |vm, pos, args| {
            arity_exact("list.concat(a, b)", args, 2, pos)?;
            let a = want_list("list.concat(a, b)", args, 0, pos)?;
            let b = want_list("list.concat(a, b)", args, 1, pos)?;
            let mut out = a.to_vec();
            out.extend_from_slice(b);
            let out = Value::List(out);
            vm.ctx().check_value(&out, pos)?;
            Ok(out)
        }),
    );

    ns.insert(
        "sort".to_string(),
        native("list.sort", |_, pos, args| {
            arity_exact("list.sort(list)", args, 1, pos)?;
            let items = want_list("list.sort(list)", args, 0, pos)?;
            if items.is_empty() {
                return Ok(Value::List(Vec::new()));
            }
            match &items[0] {
                Value::Number(_) => {
                    let mut nums = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::Number(n) => nums.push(*n),
                            other => {
                                return Err(EvalError::runtime(
                                    pos,
                                    format!(
                                        "list.sort(list): mixed kinds; expected number, got {}",
                                        other.type_name()
                                    ),
                                ));
                            }
                        }
                    }
                    nums.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                    Ok(Value::List(nums.into_iter().map(Value::Number).collect()))
                }
                Value::Str(_) => {
                    let mut strs = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::Str(s) => strs.push(s.clone()),
                            other => {
                                return Err(EvalError::runtime(
                                    pos,
                                    format!(
                                        "list.sort(list): mixed kinds; expected string, got {}",
                                        other.type_name()
                                    ),
                                ));
                            }
                        }
                    }
                    strs.sort();
                    Ok(Value::List(strs.into_iter().map(Value::Str).collect()))
                }
                other => Err(EvalError::runtime(
                    pos,
                    format!(
                        "list.sort(list): can only sort numbers or strings, got {}",
                        other.type_name()
                    ),
                )),
            }
        }),
    );

    ns.insert(
        "map".to_string(),
        native("list.map", |vm, pos, args| {
            arity_exact("list.map(list, fn)", args, 2, pos)?;
            let items = want_list("list.map(list, fn)", args, 0, pos)?.to_vec();
            let f = want_callable("list.map(list, fn)", args, 1, pos)?.clone();
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(vm.call_value(&f, vec![item], pos)?);
            }
            let out = Value::List(out);
            vm.ctx().check_value(&out, pos)?;
            Ok(out)
        }),
    );

    ns.insert(
        "filter".to_string(),
        native("list.filter", |vm, pos, args| {
            arity_exact("list.filter(list, fn)", args, 2, pos)?;
            let items = want_list("list.filter(list, fn)", args, 0, pos)?.to_vec();
            let f = want_callable("list.filter(list, fn)", args, 1, pos)?.clone();
            let mut out = Vec::new();
            for item in items {
                if vm.call_value(&f, vec![item.clone()], pos)?.truthy() {
                    out.push(item);
                }
            }
            Ok(Value::List(out))
        }),
    );

    ns.insert(
        "any".to_string(),
        native("list.any", |vm, pos, args| {
            arity_exact("list.any(list, fn)", args, 2, pos)?;
            let items = want_list("list.any(list, fn)", args, 0, pos)?.to_vec();
            let f = want_callable("list.any(list, fn)", args, 1, pos)?.clone();
            for item in items {
                if vm.call_value(&f, vec![item], pos)?.truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }),
    );

    ns.insert(
        "all".to_string(),
        native("list.all", |vm, pos, args| {
            arity_exact("list.all(list, fn)", args, 2, pos)?;
            let items = want_list("list.all(list, fn)", args, 0, pos)?.to_vec();
            let f = want_callable("list.all(list, fn)", args, 1, pos)?.clone();
            for item in items {
                if !vm.call_value(&f, vec![item], pos)?.truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }),
    );

    ns.insert(
        "slice".to_string(),
        native("list.slice", |_, pos, args| {
            arity_range("list.slice(list, start[, end])", args, 2, 3, pos)?;
            let items = want_list("list.slice(list, start[, end])", args, 0, pos)?;
            let len = items.len() as i64;
            let start = want_int("list.slice(list, start[, end])", args, 1, pos)?;
            let end = match args.get(2) {
                Some(_) => want_int("list.slice(list, start[, end])", args, 2, pos)?,
                None => len,
            };
            // Python-style: negatives count from the end, out-of-range clamps
            let norm = |i: i64| -> usize {
                let i = if i < 0 { i + len } else { i };
                i.clamp(0, len) as usize
            };
            let (start, end) = (norm(start), norm(end));
            if start >= end {
                return Ok(Value::List(Vec::new()));
            }
            Ok(Value::List(items[start..end].to_vec()))
        }),
    );

    ns.insert(
        "unique".to_string(),
        native("list.unique", |_, pos, args| {
            arity_exact("list.unique(list)", args, 1, pos)?;
            let items = want_list("list.unique(list)", args, 0, pos)?;
            let mut out: Vec<Value> = Vec::new();
            for item in items {
                // only primitives participate; composites are dropped
                let primitive = matches!(
                    item,
                    Value::Null | Value::Bool(_) | Value::Number(_) | Value::Str(_)
                );
                if !primitive {
                    continue;
                }
                if !out.iter().any(|seen| values_equal(seen, item)) {
                    out.push(item.clone());
                }
            }
            Ok(Value::List(out))
        }),
    );

    Value::Dict(ns)
}

#[cfg(test)]
mod tests {
    use crate::stdlib::testutil::{b, eval, eval_ok, num};
    use crate::value::Value;

    fn nums(src: &str) -> Vec<f64> {
        match eval_ok(src) {
            Value::List(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::Number(n) => n,
                    other => panic!("Expected number, got {:?}", other),
                })
                .collect(),
            other => panic!("Expected list from {:?}, got {:?}", src, other),
        }
    }

    #[test]
    fn test_append_and_concat_are_pure() {
        assert_eq!(nums("stdlib.list.append([1, 2], 3)"), vec![1.0, 2.0, 3.0]);
        assert_eq!(nums("stdlib.list.concat([1], [2, 3])"), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sort_numbers_and_strings() {
        assert_eq!(nums("stdlib.list.sort([3, 1, 2])"), vec![1.0, 2.0, 3.0]);
        match eval_ok("stdlib.list.sort(['b', 'a'])") {
            Value::List(items) => {
                assert!(matches!(&items[0], Value::Str(s) if s == "a"));
            }
            other => panic!("Expected list, got {:?}", other),
        }
        assert!(eval("stdlib.list.sort([1, 'a'])").is_err());
        assert!(eval("stdlib.list.sort([true])").is_err());
    }

    #[test]
    fn test_map_calls_back_into_the_vm() {
        match eval_ok("stdlib.list.map([0, 2], bool)") {
            Value::List(items) => {
                assert!(matches!(items[0], Value::Bool(false)));
                assert!(matches!(items[1], Value::Bool(true)));
            }
            other => panic!("Expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_higher_order_helpers() {
        // callable argument enforcement
        assert!(eval("stdlib.list.map([1], 5)").is_err());
        assert!(b("stdlib.list.any([0, 0, 2], bool)"));
        assert!(!b("stdlib.list.all([1, 0], bool)"));
        assert_eq!(num("len(stdlib.list.filter([0, 1, 2, 0], bool))"), 2.0);
    }

    #[test]
    fn test_slice_negative_and_clamped() {
        assert_eq!(nums("stdlib.list.slice([1, 2, 3, 4], 1)"), vec![2.0, 3.0, 4.0]);
        assert_eq!(nums("stdlib.list.slice([1, 2, 3, 4], 1, 3)"), vec![2.0, 3.0]);
        assert_eq!(nums("stdlib.list.slice([1, 2, 3, 4], -2)"), vec![3.0, 4.0]);
        assert_eq!(nums("stdlib.list.slice([1, 2, 3], 0, 99)"), vec![1.0, 2.0, 3.0]);
        assert_eq!(nums("stdlib.list.slice([1, 2, 3], 5)"), Vec::<f64>::new());
    }

    #[test]
    fn test_unique_primitives_first_wins() {
        assert_eq!(nums("stdlib.list.unique([1, 2, 1, 3, 2])"), vec![1.0, 2.0, 3.0]);
        // composites are dropped
        assert_eq!(num("len(stdlib.list.unique([[1], {a: 1}, 5]))"), 1.0);
    }
}
