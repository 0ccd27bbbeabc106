// ABOUTME: Engine facade: pre-env assembly and the eval/eval_str/exec_module API

use crate::cache::{Compiled, ModuleCache};
use crate::context::{Context, ExecContext, Limits};
use crate::env::Env;
use crate::error::{EngineError, Frame, FrameKind, Pos};
use crate::host::ambient::{EnvObject, VarsObject};
use crate::host::module::ModuleObject;
use crate::host::request::{RequestObject, RequestState};
use crate::host::response::{ResponseData, ResponseObject};
use crate::host::stream::{StreamObject, StreamRecord};
use crate::host::trace::{TraceObject, TraceReport};
use crate::host::{GlobalsMutator, RequestMutator, VarsMutator};
use crate::parser;
use crate::value::{stringify, Value};
use crate::vm::Vm;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Where the evaluated source lives inside the host's own file, for
/// diagnostics pointing back at it.
#[derive(Debug, Clone, Default)]
pub struct Origin {
    pub path: String,
    pub line: u32,
    pub col: u32,
}

impl Origin {
    pub fn new(path: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            path: path.into(),
            line,
            col,
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line.max(1), self.col.max(1))
    }
}

/// A module import requested by the host: `alias` becomes a pre-env binding
/// for the module at `path`.
#[derive(Debug, Clone)]
pub struct UseDirective {
    pub alias: String,
    pub path: String,
}

/// Everything the host supplies for one evaluation.
#[derive(Clone, Default)]
pub struct Runtime {
    pub env: HashMap<String, String>,
    pub vars: HashMap<String, String>,
    pub globals: HashMap<String, String>,
    /// Primary response; exposed as `response` (and as `last` when no
    /// separate last response is given).
    pub response: Option<Rc<ResponseData>>,
    pub last: Option<Rc<ResponseData>>,
    pub trace: Option<Rc<TraceReport>>,
    pub stream: Option<Rc<StreamRecord>>,
    pub request: Option<Rc<RefCell<RequestState>>>,
    pub request_mut: Option<Rc<dyn RequestMutator>>,
    pub vars_mut: Option<Rc<dyn VarsMutator>>,
    pub globals_mut: Option<Rc<dyn GlobalsMutator>>,
    pub uses: Vec<UseDirective>,
    /// Single-symbol conveniences for the host's assertion mini-language
    /// (e.g. `status`, `header`, `text`).
    pub extras: HashMap<String, Value>,
    /// Name of the evaluation site; becomes the outermost stack frame.
    pub site: Option<String>,
}

pub struct Engine {
    limits: Limits,
    cache: ModuleCache,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            cache: ModuleCache::new(),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Parse `source` as a single expression and evaluate it under the
    /// pre-env.
    pub fn eval(
        &self,
        ctx: &Context,
        rt: &Runtime,
        source: &str,
        origin: &Origin,
    ) -> Result<Value, EngineError> {
        let exec = ExecContext::new(self.limits.clone(), ctx);
        let prelude = self.build_prelude(&exec, rt)?;
        let expr = parser::parse_expression(source, origin.pos()).map_err(|err| {
            EngineError::Parse {
                path: origin.path.clone(),
                err,
            }
        })?;
        let env = Env::with_parent(prelude);
        let mut vm = Vm::new(exec);
        vm.eval(&expr, &env).map_err(|err| {
            let err = match &rt.site {
                Some(site) => err.with_frame(Frame::new(FrameKind::Expr, origin.pos(), site)),
                None => err,
            };
            EngineError::Eval {
                path: origin.path.clone(),
                err,
            }
        })
    }

    /// Evaluate then stringify with the same rules as `+` and `str()`.
    pub fn eval_str(
        &self,
        ctx: &Context,
        rt: &Runtime,
        source: &str,
        origin: &Origin,
    ) -> Result<String, EngineError> {
        let value = self.eval(ctx, rt, source, origin)?;
        let out = stringify(&value, origin.pos()).map_err(|err| EngineError::Eval {
            path: origin.path.clone(),
            err,
        })?;
        if self.limits.max_str > 0 && out.len() > self.limits.max_str {
            return Err(EngineError::Eval {
                path: origin.path.clone(),
                err: crate::error::EvalError::runtime(
                    origin.pos(),
                    format!(
                        "string exceeds size limit ({} > {} bytes)",
                        out.len(),
                        self.limits.max_str
                    ),
                ),
            });
        }
        Ok(out)
    }

    /// Parse `source` as a module, execute its top level, and return the
    /// compiled handle.
    pub fn exec_module(
        &self,
        ctx: &Context,
        rt: &Runtime,
        source: &str,
        origin: &Origin,
    ) -> Result<Compiled, EngineError> {
        let exec = ExecContext::new(self.limits.clone(), ctx);
        let prelude = self.build_prelude(&exec, rt)?;
        let module = parser::parse_module(source, &origin.path).map_err(|err| {
            EngineError::Parse {
                path: origin.path.clone(),
                err,
            }
        })?;
        let module_env = Env::with_parent(prelude);
        let mut vm = Vm::new(exec);
        let exports = vm.run_module(&module, &module_env).map_err(|err| {
            let err = match &rt.site {
                Some(site) => err.with_frame(Frame::new(FrameKind::Expr, origin.pos(), site)),
                None => err,
            };
            EngineError::Eval {
                path: origin.path.clone(),
                err,
            }
        })?;
        Ok(Compiled {
            module: Rc::new(module),
            env: module_env,
            exports: Rc::new(exports),
        })
    }

    /// Stdlib snapshot, host objects, extras, then use-directive modules.
    /// Every binding is const and the result is sealed against top-level
    /// redefinition.
    fn build_prelude(
        &self,
        exec: &Rc<ExecContext>,
        rt: &Runtime,
    ) -> Result<Rc<Env>, EngineError> {
        let mut pre = crate::stdlib::stdlib();

        pre.insert("env".to_string(), EnvObject::new(rt.env.clone()));
        pre.insert(
            "vars".to_string(),
            VarsObject::new(
                rt.vars.clone(),
                rt.globals.clone(),
                rt.vars_mut.clone(),
                rt.globals_mut.clone(),
            ),
        );

        let primary = rt.response.clone().or_else(|| rt.last.clone());
        let last = rt.last.clone().or_else(|| rt.response.clone());
        if let Some(data) = primary {
            let response_obj = ResponseObject::new(data.clone());
            match &last {
                // same underlying response: share the object and its JSON cache
                Some(last_data) if Rc::ptr_eq(last_data, &data) => {
                    pre.insert("response".to_string(), response_obj.clone());
                    pre.insert("last".to_string(), response_obj);
                }
                Some(last_data) => {
                    pre.insert("response".to_string(), response_obj);
                    pre.insert("last".to_string(), ResponseObject::new(last_data.clone()));
                }
                None => {
                    pre.insert("response".to_string(), response_obj);
                }
            }
        }

        let trace = rt.trace.clone().unwrap_or_default();
        pre.insert("trace".to_string(), TraceObject::new(trace));

        let stream_enabled = rt.stream.is_some();
        let stream = rt.stream.clone().unwrap_or_default();
        pre.insert(
            "stream".to_string(),
            StreamObject::new(stream, stream_enabled),
        );

        if let Some(state) = &rt.request {
            pre.insert(
                "request".to_string(),
                RequestObject::new(state.clone(), rt.request_mut.clone()),
            );
        }

        for (name, value) in &rt.extras {
            if pre.contains_key(name) {
                return Err(EngineError::setup(format!(
                    "extra binding collides with existing name: {}",
                    name
                )));
            }
            pre.insert(name.clone(), value.clone());
        }

        for directive in &rt.uses {
            if directive.alias.is_empty() {
                return Err(EngineError::setup(format!(
                    "use of module {} needs a non-empty alias",
                    directive.path
                )));
            }
            if pre.contains_key(&directive.alias) {
                return Err(EngineError::setup(format!(
                    "module alias collides with existing name: {}",
                    directive.alias
                )));
            }
            let (comp, _abs) =
                self.cache
                    .load(exec, exec.base_dir.as_deref(), &directive.path)?;
            pre.insert(
                directive.alias.clone(),
                ModuleObject::new(directive.alias.clone(), comp.exports.clone()),
            );
        }

        debug!("pre-env assembled with {} bindings", pre.len());
        Ok(Env::sealed(pre))
    }
}
