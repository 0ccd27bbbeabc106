// ABOUTME: time namespace driven by the context clock hook; no ambient clock

use crate::error::{EvalError, Pos};
use crate::stdlib::{arity_exact, native, want_num, want_str};
use crate::value::Value;
use crate::vm::Vm;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::fmt::Write as _;

fn clock(vm: &Vm, pos: Pos) -> Result<DateTime<Utc>, EvalError> {
    match &vm.ctx().now {
        Some(hook) => Ok(hook()),
        None => Err(EvalError::runtime(
            pos,
            "time: no clock available (context has no now hook)",
        )),
    }
}

fn format_dt(dt: &DateTime<Utc>, layout: &str, pos: Pos) -> Result<String, EvalError> {
    let mut out = String::new();
    // write! surfaces bad strftime specifiers as an error instead of a panic
    write!(out, "{}", dt.format(layout))
        .map_err(|_| EvalError::runtime(pos, format!("time: invalid layout '{}'", layout)))?;
    Ok(out)
}

fn to_seconds(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}

fn from_seconds(ts: f64, pos: Pos) -> Result<DateTime<Utc>, EvalError> {
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9).round() as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .ok_or_else(|| EvalError::runtime(pos, format!("time: timestamp {} out of range", ts)))
}

fn parse_with_layout(layout: &str, value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(value, layout) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, layout) {
        return Some(ndt.and_utc());
    }
    if let Ok(nd) = NaiveDate::parse_from_str(value, layout) {
        return Some(nd.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "nowISO".to_string(),
        native("time.nowISO", |vm, pos, args| {
            arity_exact("time.nowISO()", args, 0, pos)?;
            let now = clock(vm, pos)?;
            Ok(Value::Str(now.to_rfc3339_opts(SecondsFormat::Secs, true)))
        }),
    );

    ns.insert(
        "nowUnix".to_string(),
        native("time.nowUnix", |vm, pos, args| {
            arity_exact("time.nowUnix()", args, 0, pos)?;
            Ok(Value::Number(clock(vm, pos)?.timestamp() as f64))
        }),
    );

    ns.insert(
        "nowUnixMs".to_string(),
        native("time.nowUnixMs", |vm, pos, args| {
            arity_exact("time.nowUnixMs()", args, 0, pos)?;
            Ok(Value::Number(clock(vm, pos)?.timestamp_millis() as f64))
        }),
    );

    ns.insert(
        "format".to_string(),
        native("time.format", |vm, pos, args| {
            arity_exact("time.format(layout)", args, 1, pos)?;
            let layout = want_str("time.format(layout)", args, 0, pos)?;
            let now = clock(vm, pos)?;
            Ok(Value::Str(format_dt(&now, layout, pos)?))
        }),
    );

    ns.insert(
        "parse".to_string(),
        native("time.parse", |_, pos, args| {
            arity_exact("time.parse(layout, value)", args, 2, pos)?;
            let layout = want_str("time.parse(layout, value)", args, 0, pos)?;
            let value = want_str("time.parse(layout, value)", args, 1, pos)?;
            match parse_with_layout(layout, value) {
                Some(dt) => Ok(Value::Number(to_seconds(&dt))),
                None => Err(EvalError::runtime(
                    pos,
                    format!("time.parse: cannot parse {:?} with layout {:?}", value, layout),
                )),
            }
        }),
    );

    ns.insert(
        "formatUnix".to_string(),
        native("time.formatUnix", |_, pos, args| {
            arity_exact("time.formatUnix(ts, layout)", args, 2, pos)?;
            let ts = want_num("time.formatUnix(ts, layout)", args, 0, pos)?;
            let layout = want_str("time.formatUnix(ts, layout)", args, 1, pos)?;
            let dt = from_seconds(ts, pos)?;
            Ok(Value::Str(format_dt(&dt, layout, pos)?))
        }),
    );

    ns.insert(
        "addUnix".to_string(),
        native("time.addUnix", |_, pos, args| {
            arity_exact("time.addUnix(ts, seconds)", args, 2, pos)?;
            let ts = want_num("time.addUnix(ts, seconds)", args, 0, pos)?;
            let delta = want_num("time.addUnix(ts, seconds)", args, 1, pos)?;
            Ok(Value::Number(ts + delta))
        }),
    );

    Value::Dict(ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Limits};
    use crate::stdlib::testutil::{eval, eval_with, num, s};
    use std::rc::Rc;

    fn fixed_ctx() -> Context {
        Context {
            now: Some(Rc::new(|| {
                DateTime::parse_from_rfc3339("2026-08-01T12:30:45.5Z")
                    .unwrap()
                    .with_timezone(&Utc)
            })),
            ..Context::default()
        }
    }

    fn f(src: &str) -> Value {
        eval_with(&fixed_ctx(), Limits::default(), src).unwrap()
    }

    #[test]
    fn test_time_errors_without_clock() {
        let err = eval("time.nowISO()").unwrap_err();
        assert!(err.message.contains("no clock"));
    }

    #[test]
    fn test_now_variants_with_fixed_clock() {
        assert!(matches!(f("time.nowISO()"), Value::Str(s) if s == "2026-08-01T12:30:45Z"));
        assert!(matches!(f("time.nowUnix()"), Value::Number(n) if n == 1785587445.0));
        assert!(matches!(f("time.nowUnixMs()"), Value::Number(n) if n == 1785587445500.0));
    }

    #[test]
    fn test_format_and_format_unix() {
        assert!(matches!(f("time.format('%Y-%m-%d')"), Value::Str(s) if s == "2026-08-01"));
        assert_eq!(s("time.formatUnix(0, '%Y-%m-%dT%H:%M:%S')"), "1970-01-01T00:00:00");
    }

    #[test]
    fn test_parse_layouts() {
        assert_eq!(num("time.parse('%Y-%m-%d %H:%M:%S', '1970-01-01 00:01:00')"), 60.0);
        assert_eq!(num("time.parse('%Y-%m-%d', '1970-01-02')"), 86400.0);
        // fractional seconds survive
        assert_eq!(
            num("time.parse('%Y-%m-%d %H:%M:%S%.f', '1970-01-01 00:00:01.250')"),
            1.25
        );
        assert!(eval("time.parse('%Y', 'nope')").is_err());
    }

    #[test]
    fn test_add_unix() {
        assert_eq!(num("time.addUnix(100, 30)"), 130.0);
        assert_eq!(num("time.addUnix(100, -30)"), 70.0);
    }
}
