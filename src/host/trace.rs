// ABOUTME: Trace host object surfacing HTTP phase timings and budget breaches

use crate::value::{HostObject, NativeFn, Value};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

/// Telemetry produced by the host's HTTP tracer.
#[derive(Debug, Clone, Default)]
pub struct TraceReport {
    pub enabled: bool,
    pub error: String,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub phases: Vec<TracePhase>,
    pub budgets: Option<TraceBudgets>,
    pub breaches: Vec<BudgetBreach>,
}

#[derive(Debug, Clone, Default)]
pub struct TracePhase {
    pub name: String,
    pub duration: Duration,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub error: String,
    pub addr: String,
    pub reused: bool,
    pub cached: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TraceBudgets {
    pub enabled: bool,
    pub total: Option<Duration>,
    pub phases: HashMap<String, Duration>,
}

#[derive(Debug, Clone)]
pub struct BudgetBreach {
    pub phase: String,
    pub limit: Duration,
    pub actual: Duration,
}

pub struct TraceObject {
    report: Rc<TraceReport>,
}

impl TraceObject {
    pub fn new(report: Rc<TraceReport>) -> Value {
        Value::Object(Rc::new(TraceObject { report }))
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn duration_string(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 1.0 {
        format!("{:.3}s", secs)
    } else {
        format!("{:.1}ms", ms(d))
    }
}

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn phase_dict(phase: &TracePhase) -> Value {
    let mut map = HashMap::new();
    map.insert("name".to_string(), Value::Str(phase.name.clone()));
    map.insert("durationMs".to_string(), Value::Number(ms(phase.duration)));
    map.insert(
        "durationSeconds".to_string(),
        Value::Number(phase.duration.as_secs_f64()),
    );
    if let Some(start) = &phase.start {
        map.insert("start".to_string(), Value::Str(rfc3339(start)));
    }
    if let Some(end) = &phase.end {
        map.insert("end".to_string(), Value::Str(rfc3339(end)));
    }
    map.insert("error".to_string(), Value::Str(phase.error.clone()));

    let mut meta = HashMap::new();
    meta.insert("addr".to_string(), Value::Str(phase.addr.clone()));
    meta.insert("reused".to_string(), Value::Bool(phase.reused));
    meta.insert("cached".to_string(), Value::Bool(phase.cached));
    map.insert("meta".to_string(), Value::Dict(meta));

    Value::Dict(map)
}

impl HostObject for TraceObject {
    fn type_name(&self) -> &str {
        "trace"
    }

    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "enabled" => {
                let report = self.report.clone();
                Some(Value::Native(NativeFn::new("trace.enabled", move |_, _, _| {
                    Ok(Value::Bool(report.enabled))
                })))
            }
            "durationMs" => Some(Value::Number(ms(self.report.duration))),
            "durationSeconds" => Some(Value::Number(self.report.duration.as_secs_f64())),
            "durationString" => Some(Value::Str(duration_string(self.report.duration))),
            "error" => Some(Value::Str(self.report.error.clone())),
            "started" => Some(match &self.report.started {
                Some(dt) => Value::Str(rfc3339(dt)),
                None => Value::Null,
            }),
            "completed" => Some(match &self.report.completed {
                Some(dt) => Value::Str(rfc3339(dt)),
                None => Value::Null,
            }),
            "phases" => {
                let report = self.report.clone();
                Some(Value::Native(NativeFn::new("trace.phases", move |_, _, _| {
                    Ok(Value::List(report.phases.iter().map(phase_dict).collect()))
                })))
            }
            "phaseNames" => {
                let report = self.report.clone();
                Some(Value::Native(NativeFn::new(
                    "trace.phaseNames",
                    move |_, _, _| {
                        let mut seen = Vec::new();
                        for phase in &report.phases {
                            let key = phase.name.to_lowercase();
                            if !seen.contains(&key) {
                                seen.push(key);
                            }
                        }
                        Ok(Value::List(seen.into_iter().map(Value::Str).collect()))
                    },
                )))
            }
            "getPhase" => {
                let report = self.report.clone();
                Some(Value::Native(NativeFn::new(
                    "trace.getPhase",
                    move |_, pos, args| {
                        let name = match args.first() {
                            Some(Value::Str(s)) => s.to_lowercase(),
                            _ => {
                                return Err(crate::error::EvalError::runtime(
                                    pos,
                                    "usage: trace.getPhase(name)",
                                ));
                            }
                        };
                        let matching: Vec<&TracePhase> = report
                            .phases
                            .iter()
                            .filter(|p| p.name.to_lowercase() == name)
                            .collect();
                        if matching.is_empty() {
                            return Ok(Value::Null);
                        }
                        let total: Duration = matching.iter().map(|p| p.duration).sum();
                        let mut out = HashMap::new();
                        out.insert("name".to_string(), Value::Str(name));
                        out.insert("count".to_string(), Value::Number(matching.len() as f64));
                        out.insert("totalMs".to_string(), Value::Number(ms(total)));
                        out.insert(
                            "totalSeconds".to_string(),
                            Value::Number(total.as_secs_f64()),
                        );
                        out.insert(
                            "segments".to_string(),
                            Value::List(matching.into_iter().map(phase_dict).collect()),
                        );
                        Ok(Value::Dict(out))
                    },
                )))
            }
            "budgets" => {
                let report = self.report.clone();
                Some(Value::Native(NativeFn::new("trace.budgets", move |_, _, _| {
                    let Some(budgets) = &report.budgets else {
                        return Ok(Value::Null);
                    };
                    let mut out = HashMap::new();
                    out.insert("enabled".to_string(), Value::Bool(budgets.enabled));
                    out.insert(
                        "totalMs".to_string(),
                        match budgets.total {
                            Some(total) => Value::Number(ms(total)),
                            None => Value::Null,
                        },
                    );
                    let mut phases = HashMap::new();
                    for (name, limit) in &budgets.phases {
                        phases.insert(name.to_lowercase(), Value::Number(ms(*limit)));
                    }
                    out.insert("phases".to_string(), Value::Dict(phases));
                    Ok(Value::Dict(out))
                })))
            }
            "breaches" => {
                let report = self.report.clone();
                Some(Value::Native(NativeFn::new(
                    "trace.breaches",
                    move |_, _, _| {
                        let items = report
                            .breaches
                            .iter()
                            .map(|b| {
                                let mut map = HashMap::new();
                                map.insert("phase".to_string(), Value::Str(b.phase.to_lowercase()));
                                map.insert("limitMs".to_string(), Value::Number(ms(b.limit)));
                                map.insert("actualMs".to_string(), Value::Number(ms(b.actual)));
                                Value::Dict(map)
                            })
                            .collect();
                        Ok(Value::List(items))
                    },
                )))
            }
            "withinBudget" => {
                let report = self.report.clone();
                Some(Value::Native(NativeFn::new(
                    "trace.withinBudget",
                    move |_, _, _| Ok(Value::Bool(report.breaches.is_empty())),
                )))
            }
            "hasBudgets" => {
                let report = self.report.clone();
                Some(Value::Native(NativeFn::new(
                    "trace.hasBudgets",
                    move |_, _, _| Ok(Value::Bool(report.budgets.is_some())),
                )))
            }
            _ => None,
        }
    }
}
