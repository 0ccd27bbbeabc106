// ABOUTME: Tree-walking evaluator with control-flow unwinding and resource ticking

use crate::ast::{BinOp, Block, Expr, ForKind, ForStmt, Module, Stmt, UnaryOp};
use crate::context::ExecContext;
use crate::env::{AssignError, Env};
use crate::error::{EvalError, Frame, FrameKind, Pos};
use crate::host::result::TryResult;
use crate::value::{stringify, values_equal, Function, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// Statement-level control signal. Return unwinds to the nearest call
/// boundary, break/continue to the nearest loop; Fail carries an error.
pub enum Unwind {
    Return(Value, Pos),
    Break(Pos),
    Continue(Pos),
    Fail(EvalError),
}

impl From<EvalError> for Unwind {
    fn from(err: EvalError) -> Self {
        Unwind::Fail(err)
    }
}

/// The evaluator. Owns only its execution context, the user call depth, and
/// the export accumulator for module runs.
pub struct Vm {
    ctx: Rc<ExecContext>,
    depth: usize,
    exports: HashMap<String, Value>,
}

impl Vm {
    pub fn new(ctx: Rc<ExecContext>) -> Self {
        Self {
            ctx,
            depth: 0,
            exports: HashMap::new(),
        }
    }

    pub fn ctx(&self) -> &ExecContext {
        &self.ctx
    }

    /// Execute a module's top-level statements, returning its exports.
    pub fn run_module(
        &mut self,
        module: &Module,
        env: &Rc<Env>,
    ) -> Result<HashMap<String, Value>, EvalError> {
        self.exports.clear();
        for stmt in &module.stmts {
            match self.exec_stmt(stmt, env, true) {
                Ok(()) => {}
                Err(Unwind::Return(_, pos)) => {
                    return Err(EvalError::runtime(pos, "return outside function"));
                }
                Err(Unwind::Break(pos)) => {
                    return Err(EvalError::runtime(pos, "break outside loop"));
                }
                Err(Unwind::Continue(pos)) => {
                    return Err(EvalError::runtime(pos, "continue outside loop"));
                }
                Err(Unwind::Fail(err)) => return Err(err),
            }
        }
        Ok(std::mem::take(&mut self.exports))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Rc<Env>, top: bool) -> Result<(), Unwind> {
        match stmt {
            Stmt::Let {
                name,
                value,
                is_const,
                export,
                pos,
            } => {
                self.ctx.tick(*pos)?;
                let value = self.eval(value, env)?;
                self.ctx.check_value(&value, *pos)?;
                self.check_definable(name, env, top, *pos)?;
                if *is_const {
                    env.define_const(name, value.clone());
                } else {
                    env.define(name, value.clone());
                }
                if *export {
                    self.exports.insert(name.clone(), value);
                }
                Ok(())
            }
            Stmt::Assign { name, value, pos } => {
                self.ctx.tick(*pos)?;
                let value = self.eval(value, env)?;
                self.ctx.check_value(&value, *pos)?;
                env.set(name, value).map_err(|e| match e {
                    AssignError::Undefined => {
                        EvalError::runtime(*pos, format!("assign to undefined name: {}", name))
                    }
                    AssignError::Const => {
                        EvalError::runtime(*pos, format!("assign to const: {}", name))
                    }
                })?;
                Ok(())
            }
            Stmt::Return { value, pos } => {
                self.ctx.tick(*pos)?;
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Null,
                };
                Err(Unwind::Return(value, *pos))
            }
            Stmt::ExprStmt(expr) => {
                self.eval(expr, env)?;
                Ok(())
            }
            Stmt::FnDef {
                name,
                params,
                body,
                export,
                pos,
            } => {
                self.ctx.tick(*pos)?;
                self.check_definable(name, env, top, *pos)?;
                let function = Value::Func(Rc::new(Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    env: env.clone(),
                    pos: *pos,
                }));
                env.define(name, function.clone());
                if *export {
                    self.exports.insert(name.clone(), function);
                }
                Ok(())
            }
            Stmt::If {
                cond,
                then,
                elifs,
                els,
                pos,
            } => {
                self.ctx.tick(*pos)?;
                if self.eval(cond, env)?.truthy() {
                    return self.exec_block(then, env);
                }
                for (elif_cond, elif_block) in elifs {
                    if self.eval(elif_cond, env)?.truthy() {
                        return self.exec_block(elif_block, env);
                    }
                }
                if let Some(block) = els {
                    return self.exec_block(block, env);
                }
                Ok(())
            }
            Stmt::For(for_stmt) => {
                self.ctx.tick(for_stmt.pos)?;
                self.exec_for(for_stmt, env)
            }
            Stmt::Break(pos) => {
                self.ctx.tick(*pos)?;
                Err(Unwind::Break(*pos))
            }
            Stmt::Continue(pos) => {
                self.ctx.tick(*pos)?;
                Err(Unwind::Continue(*pos))
            }
        }
    }

    fn check_definable(
        &self,
        name: &str,
        env: &Rc<Env>,
        top: bool,
        pos: Pos,
    ) -> Result<(), EvalError> {
        if env.has_local(name) || (top && env.sealed_has(name)) {
            return Err(EvalError::runtime(
                pos,
                format!("name already defined: {}", name),
            ));
        }
        Ok(())
    }

    fn exec_block(&mut self, block: &Block, parent: &Rc<Env>) -> Result<(), Unwind> {
        let env = Env::with_parent(parent.clone());
        self.exec_stmts(&block.stmts, &env)
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], env: &Rc<Env>) -> Result<(), Unwind> {
        for stmt in stmts {
            self.exec_stmt(stmt, env, false)?;
        }
        Ok(())
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn exec_for(&mut self, for_stmt: &ForStmt, env: &Rc<Env>) -> Result<(), Unwind> {
        match &for_stmt.kind {
            ForKind::Classic { init, cond, post } => {
                // The init binding lives in the loop's own scope.
                let loop_env = Env::with_parent(env.clone());
                if let Some(init) = init {
                    self.exec_stmt(init, &loop_env, false)?;
                }
                loop {
                    self.ctx.tick(for_stmt.pos)?;
                    if let Some(cond) = cond {
                        if !self.eval(cond, &loop_env)?.truthy() {
                            break;
                        }
                    }
                    match self.exec_block(&for_stmt.body, &loop_env) {
                        Ok(()) | Err(Unwind::Continue(_)) => {}
                        Err(Unwind::Break(_)) => break,
                        Err(other) => return Err(other),
                    }
                    if let Some(post) = post {
                        self.exec_stmt(post, &loop_env, false)?;
                    }
                }
                Ok(())
            }
            ForKind::Cond(cond) => loop {
                self.ctx.tick(for_stmt.pos)?;
                if let Some(cond) = cond {
                    if !self.eval(cond, env)?.truthy() {
                        return Ok(());
                    }
                }
                match self.exec_block(&for_stmt.body, env) {
                    Ok(()) | Err(Unwind::Continue(_)) => {}
                    Err(Unwind::Break(_)) => return Ok(()),
                    Err(other) => return Err(other),
                }
            },
            ForKind::Range(range) => self.exec_for_range(for_stmt, range, env),
        }
    }

    fn exec_for_range(
        &mut self,
        for_stmt: &ForStmt,
        range: &crate::ast::ForRange,
        env: &Rc<Env>,
    ) -> Result<(), Unwind> {
        let pos = for_stmt.pos;
        let source = self.eval(&range.source, env)?;

        let pairs: Vec<(Value, Value)> = match &source {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Value::Number(i as f64), item.clone()))
                .collect(),
            Value::Dict(map) => {
                // Deterministic: keys iterate in lexicographic order.
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                keys.into_iter()
                    .map(|k| (Value::Str(k.clone()), map[k.as_str()].clone()))
                    .collect()
            }
            Value::Str(s) => s
                .char_indices()
                .map(|(i, c)| (Value::Number(i as f64), Value::Str(c.to_string())))
                .collect(),
            other => {
                return Err(Unwind::Fail(EvalError::runtime(
                    pos,
                    format!("range over non-iterable value ({})", other.type_name()),
                )));
            }
        };

        for (key, value) in pairs {
            self.ctx.tick(pos)?;
            let iter_env = if range.declare {
                let iter_env = Env::with_parent(env.clone());
                if range.key != "_" {
                    iter_env.define_const(&range.key, key);
                }
                if let Some(name) = &range.value {
                    if name != "_" {
                        iter_env.define_const(name, value);
                    }
                }
                iter_env
            } else {
                if range.key != "_" {
                    self.assign_existing(&range.key, key, env, pos)?;
                }
                if let Some(name) = &range.value {
                    if name != "_" {
                        self.assign_existing(name, value, env, pos)?;
                    }
                }
                env.clone()
            };
            match self.exec_block(&for_stmt.body, &iter_env) {
                Ok(()) | Err(Unwind::Continue(_)) => {}
                Err(Unwind::Break(_)) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    fn assign_existing(
        &self,
        name: &str,
        value: Value,
        env: &Rc<Env>,
        pos: Pos,
    ) -> Result<(), EvalError> {
        env.set(name, value).map_err(|e| match e {
            AssignError::Undefined => {
                EvalError::runtime(pos, format!("assign to undefined name: {}", name))
            }
            AssignError::Const => EvalError::runtime(pos, format!("assign to const: {}", name)),
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn eval(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value, EvalError> {
        self.ctx.tick(expr.pos())?;
        match expr {
            Expr::Ident(name, pos) => env
                .get(name)
                .ok_or_else(|| EvalError::runtime(*pos, format!("undefined name: {}", name))),
            Expr::NullLit(_) => Ok(Value::Null),
            Expr::BoolLit(b, _) => Ok(Value::Bool(*b)),
            Expr::NumLit(n, _) => Ok(Value::Number(*n)),
            Expr::StrLit(s, pos) => {
                self.ctx.check_str_len(s.len(), *pos)?;
                Ok(Value::Str(s.clone()))
            }
            Expr::ListLit(items, pos) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, env)?);
                }
                let list = Value::List(out);
                self.ctx.check_value(&list, *pos)?;
                Ok(list)
            }
            Expr::DictLit(pairs, pos) => {
                let mut map = HashMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let value = self.eval(value, env)?;
                    map.insert(key.clone(), value);
                }
                let dict = Value::Dict(map);
                self.ctx.check_value(&dict, *pos)?;
                Ok(dict)
            }
            Expr::Unary { op, expr, pos } => {
                let value = self.eval(expr, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(EvalError::runtime(
                            *pos,
                            format!("cannot negate {}", other.type_name()),
                        )),
                    },
                }
            }
            Expr::Binary {
                op,
                left,
                right,
                pos,
            } => self.eval_binary(*op, left, right, env, *pos),
            Expr::Ternary {
                cond, then, els, ..
            } => {
                if self.eval(cond, env)?.truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(els, env)
                }
            }
            Expr::Try { expr, .. } => match self.eval(expr, env) {
                Ok(value) => Ok(TryResult::ok(value)),
                Err(err) if err.abort => Err(err),
                Err(err) => Ok(TryResult::err(err.message)),
            },
            Expr::Call { callee, args, pos } => {
                let callee = self.eval(callee, env)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg, env)?);
                }
                self.call_value(&callee, evaluated, *pos)
            }
            Expr::Index { target, index, pos } => {
                let target = self.eval(target, env)?;
                let index = self.eval(index, env)?;
                self.index_value(&target, &index, *pos)
            }
            Expr::Member { target, name, pos } => {
                let target = self.eval(target, env)?;
                self.member_value(&target, name, *pos)
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        env: &Rc<Env>,
        pos: Pos,
    ) -> Result<Value, EvalError> {
        // Short-circuit forms evaluate the right side only when needed.
        match op {
            BinOp::And => {
                let l = self.eval(left, env)?;
                if !l.truthy() {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(right, env)?;
                return Ok(Value::Bool(r.truthy()));
            }
            BinOp::Or => {
                let l = self.eval(left, env)?;
                if l.truthy() {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(right, env)?;
                return Ok(Value::Bool(r.truthy()));
            }
            BinOp::Coalesce => {
                let l = self.eval(left, env)?;
                if l.is_null() {
                    return self.eval(right, env);
                }
                return Ok(l);
            }
            _ => {}
        }

        let l = self.eval(left, env)?;
        let r = self.eval(right, env)?;
        match op {
            BinOp::Add => match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                _ => {
                    let mut out = stringify(&l, pos)?;
                    out.push_str(&stringify(&r, pos)?);
                    self.ctx.check_str_len(out.len(), pos)?;
                    Ok(Value::Str(out))
                }
            },
            BinOp::Sub => self.numeric_op(&l, &r, pos, "-", |a, b| a - b),
            BinOp::Mul => self.numeric_op(&l, &r, pos, "*", |a, b| a * b),
            BinOp::Div => {
                let (a, b) = self.numeric_pair(&l, &r, pos, "/")?;
                if b == 0.0 {
                    return Err(EvalError::runtime(pos, "division by zero"));
                }
                Ok(Value::Number(a / b))
            }
            BinOp::Mod => {
                let (a, b) = self.numeric_pair(&l, &r, pos, "%")?;
                if b == 0.0 {
                    return Err(EvalError::runtime(pos, "division by zero"));
                }
                // IEEE remainder, sign follows the dividend
                Ok(Value::Number(a % b))
            }
            BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
            BinOp::NotEq => Ok(Value::Bool(!values_equal(&l, &r))),
            BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => self.compare(op, &l, &r, pos),
            BinOp::And | BinOp::Or | BinOp::Coalesce => unreachable!("handled above"),
        }
    }

    fn numeric_pair(
        &self,
        l: &Value,
        r: &Value,
        pos: Pos,
        op: &str,
    ) -> Result<(f64, f64), EvalError> {
        match (l, r) {
            (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
            _ => Err(EvalError::runtime(
                pos,
                format!(
                    "operator '{}' requires numbers, got {} and {}",
                    op,
                    l.type_name(),
                    r.type_name()
                ),
            )),
        }
    }

    fn numeric_op(
        &self,
        l: &Value,
        r: &Value,
        pos: Pos,
        op: &str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, EvalError> {
        let (a, b) = self.numeric_pair(l, r, pos, op)?;
        Ok(Value::Number(f(a, b)))
    }

    fn compare(&self, op: BinOp, l: &Value, r: &Value, pos: Pos) -> Result<Value, EvalError> {
        let ordering_holds = match (l, r) {
            (Value::Number(a), Value::Number(b)) => match op {
                BinOp::Lt => a < b,
                BinOp::LtEq => a <= b,
                BinOp::Gt => a > b,
                BinOp::GtEq => a >= b,
                _ => unreachable!(),
            },
            (Value::Str(a), Value::Str(b)) => match op {
                BinOp::Lt => a < b,
                BinOp::LtEq => a <= b,
                BinOp::Gt => a > b,
                BinOp::GtEq => a >= b,
                _ => unreachable!(),
            },
            _ => {
                return Err(EvalError::runtime(
                    pos,
                    format!("cannot compare {} with {}", l.type_name(), r.type_name()),
                ));
            }
        };
        Ok(Value::Bool(ordering_holds))
    }

    fn index_value(&self, target: &Value, index: &Value, pos: Pos) -> Result<Value, EvalError> {
        match target {
            Value::List(items) => match index {
                Value::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                    let i = *n as i64;
                    if i < 0 || i as usize >= items.len() {
                        Ok(Value::Null)
                    } else {
                        Ok(items[i as usize].clone())
                    }
                }
                other => Err(EvalError::runtime(
                    pos,
                    format!("list index must be an integer, got {}", other.type_name()),
                )),
            },
            Value::Dict(map) => match index {
                Value::Str(key) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
                other => Err(EvalError::runtime(
                    pos,
                    format!("dict key must be a string, got {}", other.type_name()),
                )),
            },
            Value::Object(obj) => obj.index(index, pos),
            other => Err(EvalError::runtime(
                pos,
                format!("cannot index {}", other.type_name()),
            )),
        }
    }

    fn member_value(&self, target: &Value, name: &str, pos: Pos) -> Result<Value, EvalError> {
        match target {
            Value::Dict(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            Value::Object(obj) => Ok(obj.get_member(name).unwrap_or(Value::Null)),
            other => Err(EvalError::runtime(
                pos,
                format!("member on non-object ({})", other.type_name()),
            )),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        pos: Pos,
    ) -> Result<Value, EvalError> {
        match callee {
            Value::Func(function) => self.call_function(function, args, pos),
            Value::Native(native) => {
                let result = native
                    .call(self, pos, &args)
                    .map_err(|e| self.frame_error(e, FrameKind::Native, pos, &native.name))?;
                self.ctx.check_value(&result, pos)?;
                Ok(result)
            }
            other => Err(EvalError::runtime(
                pos,
                format!("not callable: {}", other.type_name()),
            )),
        }
    }

    fn frame_error(&self, err: EvalError, kind: FrameKind, pos: Pos, name: &str) -> EvalError {
        err.with_frame(Frame::new(kind, pos, name))
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        pos: Pos,
    ) -> Result<Value, EvalError> {
        if args.len() != function.params.len() {
            let plural = if function.params.len() == 1 { "" } else { "s" };
            return Err(EvalError::runtime(
                pos,
                format!(
                    "{}: expected {} argument{}, got {}",
                    function.name,
                    function.params.len(),
                    plural,
                    args.len()
                ),
            ));
        }
        if self.ctx.limits.max_call > 0 && self.depth + 1 > self.ctx.limits.max_call {
            return Err(EvalError::runtime(pos, "call depth limit exceeded"));
        }

        let fn_env = Env::with_parent(function.env.clone());
        for (param, arg) in function.params.iter().zip(args) {
            self.ctx.check_value(&arg, pos)?;
            // Parameters are plain mutable locals.
            fn_env.define(param, arg);
        }

        self.depth += 1;
        let result = self.exec_stmts(&function.body.stmts, &fn_env);
        self.depth -= 1;

        match result {
            Ok(()) => Ok(Value::Null),
            Err(Unwind::Return(value, ret_pos)) => {
                self.ctx.check_value(&value, ret_pos)?;
                Ok(value)
            }
            Err(Unwind::Break(p)) => Err(EvalError::runtime(p, "break outside loop")),
            Err(Unwind::Continue(p)) => Err(EvalError::runtime(p, "continue outside loop")),
            Err(Unwind::Fail(err)) => {
                Err(self.frame_error(err, FrameKind::Fn, pos, &function.name))
            }
        }
    }
}
