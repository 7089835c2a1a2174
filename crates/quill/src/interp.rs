//! The tree-walking interpreter.
//!
//! An [`Interpreter`] lives for one render. It owns the [`Scope`] and borrows
//! the output sink, the template's functions and the engine's shared
//! functions and methods. Statements return `Result<(), RenderError>`;
//! expressions return [`EvalResult`] and pick up the location of the
//! statement that evaluates them.

use std::{borrow::Cow, io, mem};

use log::trace;

use quill_core::{
    EvalResult, Location, RenderError, RenderErrorKind, Value, Vars,
    ast::{
        Call, CallTarget, ElseBranch, Expr, ExprList, For, ForForm, IncDecOp, Include,
        LogicalOp, Set, Stat, Switch,
    },
    directive::DirectiveContext,
    iter::{ForIter, LoopStatus},
    ops,
    output::Output,
    scope::{Assignment, Jump, Scope},
};

use crate::{
    engine::Runtime,
    env::FunctionTable,
    methods::{MethodRegistry, range_item},
};

/// Name the loop status is bound to inside a `#for` body.
const LOOP_STATUS: &str = "for";

/// Write a value the way `#(...)` does.
pub(crate) fn write_value(out: &mut dyn Output, value: &Value) -> io::Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Str(s) => out.write_str(s),
        Value::Int(i) => out.write_int(*i),
        Value::Float(f) => out.write_float(*f),
        Value::Bool(b) => out.write_str(if *b { "true" } else { "false" }),
        other => out.write_display(other),
    }
}

pub(crate) struct Interpreter<'r> {
    scope: Scope<'r>,
    out: &'r mut dyn Output,
    functions: &'r FunctionTable,
    shared_functions: &'r FunctionTable,
    methods: &'r MethodRegistry,
    max_call_depth: Option<usize>,
    call_depth: usize,
    /// Location of the directive currently executing, for [`DirectiveContext`].
    location: Location,
}

impl<'r> Interpreter<'r> {
    /// An interpreter over `root` with the template's own `functions`.
    pub(crate) fn new(
        root: Vars,
        runtime: &'r Runtime,
        functions: &'r FunctionTable,
        shared_functions: &'r FunctionTable,
        out: &'r mut dyn Output,
        location: Location,
    ) -> Self {
        Self {
            scope: Scope::new(root, Some(&runtime.shared_vars)),
            out,
            functions,
            shared_functions,
            methods: &runtime.methods,
            max_call_depth: runtime.config.max_call_depth(),
            call_depth: 0,
            location,
        }
    }

    pub(crate) fn exec(&mut self, stat: &Stat) -> Result<(), RenderError> {
        match stat {
            Stat::Text(text) => self
                .out
                .write_str(&text.text)
                .map_err(|err| RenderErrorKind::from(err).at(&text.location)),
            Stat::Output(output) => {
                let value = self.eval(&output.expr).map_err(|k| k.at(&output.location))?;
                write_value(self.out, &value)
                    .map_err(|err| RenderErrorKind::from(err).at(&output.location))
            }
            Stat::If(branch) => {
                let mut branch = branch;
                loop {
                    let cond = self.eval_all(&branch.cond).map_err(|k| k.at(&branch.location))?;
                    if cond.is_truthy() {
                        return self.exec(&branch.then);
                    }
                    match &branch.otherwise {
                        None => return Ok(()),
                        Some(ElseBranch::Else(otherwise)) => return self.exec(otherwise),
                        Some(ElseBranch::ElseIf(next)) => branch = &**next,
                    }
                }
            }
            Stat::For(for_stat) => self.exec_for(for_stat),
            Stat::Switch(switch) => self.exec_switch(switch),
            Stat::Call(call) => self.exec_call(call),
            Stat::Include(include) => self.exec_include(include),
            Stat::Set(set) => self.exec_set(set),
            Stat::Break(_) => {
                self.scope.ctrl_mut().set_jump(Jump::Break);
                Ok(())
            }
            Stat::Continue(_) => {
                self.scope.ctrl_mut().set_jump(Jump::Continue);
                Ok(())
            }
            Stat::Return(_) => {
                self.scope.ctrl_mut().set_jump(Jump::Return);
                Ok(())
            }
            Stat::List(list) => {
                for stat in list.iter() {
                    if self.scope.ctrl().is_jump() {
                        break;
                    }
                    self.exec(stat)?;
                }
                Ok(())
            }
            Stat::Custom(custom) => {
                let saved = mem::replace(&mut self.location, custom.location.clone());
                let result = custom.directive.exec(self);
                self.location = saved;
                result
            }
        }
    }

    /// Consume the jump left by a loop body. Returns `true` when the loop
    /// must stop.
    fn take_loop_jump(&mut self) -> bool {
        let ctrl = self.scope.ctrl_mut();
        match ctrl.jump() {
            Jump::None => false,
            Jump::Continue => {
                ctrl.clear_jump();
                false
            }
            Jump::Break => {
                ctrl.clear_jump();
                true
            }
            Jump::Return => true,
        }
    }

    fn exec_for(&mut self, for_stat: &For) -> Result<(), RenderError> {
        let outer = self.scope.get(LOOP_STATUS).cloned().unwrap_or_default();

        self.scope.push();
        let result = self.run_loop(for_stat, outer);
        self.scope.pop();
        let iterations = result?;

        match &for_stat.otherwise {
            Some(otherwise) if iterations == 0 => self.exec(otherwise),
            _ => Ok(()),
        }
    }

    /// Run the loop inside its own frame, returning the number of
    /// iterations started.
    fn run_loop(&mut self, for_stat: &For, outer: Value) -> Result<usize, RenderError> {
        let location = &for_stat.location;
        let mut index = 0;
        match &for_stat.form {
            ForForm::Each { var, source } => {
                let source = self.eval(source).map_err(|k| k.at(location))?;
                let items = ForIter::new(&source);
                let (size, kind) = (items.size(), items.kind());
                for item in items {
                    self.scope.clear_locals();
                    self.scope.set_local(var.as_str(), item);
                    let status = LoopStatus::new(index, size, kind, outer.clone());
                    self.scope.set_local(LOOP_STATUS, Value::object(status));
                    self.exec(&for_stat.body)?;
                    index += 1;
                    if self.take_loop_jump() {
                        break;
                    }
                }
            }
            ForForm::Counter { init, cond, update } => {
                self.with_assignment(Assignment::Local, |interp| interp.eval_all(init))
                    .map_err(|k| k.at(location))?;
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(cond).map_err(|k| k.at(location))?.is_truthy() {
                            break;
                        }
                    }
                    self.scope.push();
                    let status = LoopStatus::new(index, None, "counter loop", outer.clone());
                    self.scope.set_local(LOOP_STATUS, Value::object(status));
                    let result = self.exec(&for_stat.body);
                    self.scope.pop();
                    result?;
                    index += 1;
                    if self.take_loop_jump() {
                        break;
                    }
                    self.eval_all(update).map_err(|k| k.at(location))?;
                }
            }
        }
        Ok(index)
    }

    fn exec_switch(&mut self, switch: &Switch) -> Result<(), RenderError> {
        let value = self.eval(&switch.value).map_err(|k| k.at(&switch.location))?;
        for case in &switch.cases {
            for candidate in case.values.iter() {
                let candidate = self.eval(candidate).map_err(|k| k.at(&case.location))?;
                if candidate.loose_eq(&value) {
                    return self.exec(&case.body);
                }
            }
        }
        match &switch.default {
            Some(default) => self.exec(default),
            None => Ok(()),
        }
    }

    fn exec_call(&mut self, call: &Call) -> Result<(), RenderError> {
        let location = &call.location;
        let name = match &call.target {
            CallTarget::Named(name) => Cow::Borrowed(name.as_str()),
            CallTarget::Dynamic(expr) => match self.eval(expr).map_err(|k| k.at(location))? {
                Value::Str(name) => Cow::Owned(name.to_string()),
                other => {
                    return Err(RenderErrorKind::type_error(format!(
                        "function name must be a string, found {}",
                        other.type_name()
                    ))
                    .at(location));
                }
            },
        };

        let (functions, shared_functions) = (self.functions, self.shared_functions);
        let Some(define) = functions
            .get(&name)
            .or_else(|| shared_functions.get(&name))
        else {
            if call.if_defined {
                return Ok(());
            }
            return Err(RenderErrorKind::UndefinedFunction(name.into_owned()).at(location));
        };

        if define.params.len() != call.args.len() {
            return Err(RenderErrorKind::ArityMismatch {
                name: define.name.clone(),
                expected: define.params.len(),
                found: call.args.len(),
            }
            .at(location));
        }
        if let Some(max) = self.max_call_depth.filter(|&max| self.call_depth >= max) {
            return Err(RenderErrorKind::CallDepthExceeded(max).at(location));
        }

        let args = call
            .args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<EvalResult<Vec<_>>>()
            .map_err(|k| k.at(location))?;

        trace!(function = define.name.as_str(), depth = self.call_depth; "Calling template function");
        self.scope.push_isolated();
        for (param, arg) in define.params.iter().zip(args) {
            self.scope.set_local(param.as_str(), arg);
        }
        self.call_depth += 1;
        let result = self.exec(&define.body);
        self.call_depth -= 1;
        self.scope.pop();
        self.scope.ctrl_mut().clear_jump();
        result
    }

    fn exec_include(&mut self, include: &Include) -> Result<(), RenderError> {
        self.scope.push();
        let result = self
            .with_assignment(Assignment::Local, |interp| {
                interp.eval_all(&include.assigns)
            })
            .map_err(|k| k.at(&include.location))
            .and_then(|_| self.exec(&include.body));
        self.scope.pop();
        result
    }

    fn exec_set(&mut self, set: &Set) -> Result<(), RenderError> {
        self.with_assignment(set.mode, |interp| interp.eval_all(&set.exprs))
            .map(drop)
            .map_err(|k| k.at(&set.location))
    }

    /// Run `f` with the assignment mode switched to `mode`.
    fn with_assignment<T>(
        &mut self,
        mode: Assignment,
        f: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        let previous = self.scope.ctrl_mut().set_assignment(mode);
        let result = f(self);
        self.scope.ctrl_mut().set_assignment(previous);
        result
    }

    /// Evaluate every expression, yielding the last value.
    fn eval_all(&mut self, exprs: &ExprList) -> EvalResult<Value> {
        let mut last = Value::Null;
        for expr in exprs.iter() {
            last = self.eval(expr)?;
        }
        Ok(last)
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Id(name) => Ok(self.scope.get(name).cloned().unwrap_or_default()),
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::list(items))
            }
            Expr::Range(start, end) => {
                let (start, end) = (self.eval(start)?, self.eval(end)?);
                match (start.as_int(), end.as_int()) {
                    (Some(start), Some(end)) => Ok(Value::range(start, end)),
                    _ => Err(RenderErrorKind::type_error(format!(
                        "range bounds must be ints, found {} and {}",
                        start.type_name(),
                        end.type_name()
                    ))),
                }
            }
            Expr::Map(entries) => {
                let mut map = Vars::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::from(map))
            }
            Expr::Unary(op, operand) => {
                let operand = self.eval(operand)?;
                ops::unary(*op, &operand)
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                ops::binary(*op, &lhs, &rhs)
            }
            Expr::Logical(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                match op {
                    LogicalOp::And if !lhs.is_truthy() => Ok(Value::Bool(false)),
                    LogicalOp::Or if lhs.is_truthy() => Ok(Value::Bool(true)),
                    LogicalOp::And | LogicalOp::Or => {
                        Ok(Value::Bool(self.eval(rhs)?.is_truthy()))
                    }
                    LogicalOp::Coalesce if lhs.is_null() => self.eval(rhs),
                    LogicalOp::Coalesce => Ok(lhs),
                }
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op.binary() {
                    Some(binary) => {
                        let current = self.eval(target)?;
                        let rhs = self.eval(value)?;
                        ops::binary(binary, &current, &rhs)?
                    }
                    None => self.eval(value)?,
                };
                self.store(target, value.clone())?;
                Ok(value)
            }
            Expr::IncDec { op, prefix, target } => {
                let current = self.eval(target)?;
                let delta = match op {
                    IncDecOp::Inc => 1,
                    IncDecOp::Dec => -1,
                };
                let updated = match &current {
                    Value::Int(i) => i.checked_add(delta).map(Value::Int).ok_or_else(|| {
                        RenderErrorKind::Arithmetic(format!("integer overflow in {i} + {delta}"))
                    })?,
                    Value::Float(f) => Value::Float(f + delta as f64),
                    other => {
                        return Err(RenderErrorKind::type_error(format!(
                            "cannot increment or decrement {}",
                            other.type_name()
                        )));
                    }
                };
                self.store(target, updated.clone())?;
                Ok(if *prefix { updated } else { current })
            }
            Expr::Field {
                target,
                name,
                null_safe,
            } => {
                let target = self.eval(target)?;
                if target.is_null() {
                    return if *null_safe {
                        Ok(Value::Null)
                    } else {
                        Err(RenderErrorKind::type_error(format!(
                            "cannot read field `{name}` of null"
                        )))
                    };
                }
                field(&target, name)
            }
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::Method {
                target,
                name,
                args,
                null_safe,
            } => {
                let target = self.eval(target)?;
                if target.is_null() {
                    return if *null_safe {
                        Ok(Value::Null)
                    } else {
                        Err(RenderErrorKind::type_error(format!(
                            "cannot call method `{name}` on null"
                        )))
                    };
                }
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.methods.call(&target, name, &args)
            }
            Expr::SharedMethod { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.methods.call_shared(name, &args)
            }
        }
    }

    /// Write `value` into an assignment target.
    fn store(&mut self, target: &Expr, value: Value) -> EvalResult<()> {
        match target {
            Expr::Id(name) => {
                self.scope.assign(name.as_str(), value);
                Ok(())
            }
            Expr::Field { target, name, .. } => match self.eval(target)? {
                Value::Map(map) => {
                    map.insert(name.as_str(), value);
                    Ok(())
                }
                Value::Entry(entry) if name == "value" => {
                    entry.set_value(value);
                    Ok(())
                }
                other => Err(RenderErrorKind::type_error(format!(
                    "cannot assign field `{name}` of {}",
                    other.type_name()
                ))),
            },
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                match target {
                    Value::List(list) => {
                        let mut items = list.write();
                        let i = list_index(items.len(), &index)?;
                        items[i] = value;
                        Ok(())
                    }
                    Value::Map(map) => {
                        map.insert(map_key(&index), value);
                        Ok(())
                    }
                    other => Err(RenderErrorKind::type_error(format!(
                        "cannot assign an element of {}",
                        other.type_name()
                    ))),
                }
            }
            _ => Err(RenderErrorKind::type_error("invalid assignment target")),
        }
    }
}

fn map_key(index: &Value) -> String {
    match index {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn list_index(len: usize, index: &Value) -> EvalResult<usize> {
    let index = index.as_int().ok_or_else(|| {
        RenderErrorKind::type_error(format!("index must be an int, found {}", index.type_name()))
    })?;
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(RenderErrorKind::IndexOutOfRange { index, len })
}

fn field(target: &Value, name: &str) -> EvalResult<Value> {
    let undefined = || RenderErrorKind::UndefinedField {
        name: name.to_string(),
        type_name: target.type_name(),
    };
    match target {
        Value::Map(map) => Ok(map.get(name).unwrap_or_default()),
        Value::Entry(entry) => match name {
            "key" => Ok(Value::str(entry.key())),
            "value" => Ok(entry.value()),
            _ => Err(undefined()),
        },
        Value::Object(object) => object.field(name)?.ok_or_else(undefined),
        _ => Err(undefined()),
    }
}

fn index_value(target: &Value, index: &Value) -> EvalResult<Value> {
    match target {
        Value::List(list) => {
            let items = list.read();
            Ok(items[list_index(items.len(), index)?].clone())
        }
        Value::Array(items) => Ok(items[list_index(items.len(), index)?].clone()),
        Value::Range(range) => {
            let index = index.as_int().ok_or_else(|| {
                RenderErrorKind::type_error(format!(
                    "index must be an int, found {}",
                    index.type_name()
                ))
            })?;
            range_item(range, index)
        }
        Value::Str(s) => {
            let len = s.chars().count();
            let i = list_index(len, index)?;
            Ok(s.chars().nth(i).map(|c| Value::str(c.to_string())).unwrap_or_default())
        }
        Value::Map(map) => Ok(map.get(&map_key(index)).unwrap_or_default()),
        other => Err(RenderErrorKind::type_error(format!(
            "cannot index {}",
            other.type_name()
        ))),
    }
}

impl DirectiveContext for Interpreter<'_> {
    fn location(&self) -> &Location {
        &self.location
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RenderError> {
        Interpreter::eval(self, expr).map_err(|k| k.at(&self.location))
    }

    fn exec(&mut self, stat: &Stat) -> Result<(), RenderError> {
        Interpreter::exec(self, stat)
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.scope.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: Value) {
        self.scope.set(name, value);
    }

    fn set_local(&mut self, name: &str, value: Value) {
        self.scope.set_local(name, value);
    }

    fn push_frame(&mut self) {
        self.scope.push();
    }

    fn pop_frame(&mut self) {
        self.scope.pop();
    }

    fn write_str(&mut self, s: &str) -> Result<(), RenderError> {
        self.out
            .write_str(s)
            .map_err(|err| RenderErrorKind::from(err).at(&self.location))
    }

    fn write_value(&mut self, value: &Value) -> Result<(), RenderError> {
        write_value(self.out, value).map_err(|err| RenderErrorKind::from(err).at(&self.location))
    }
}

#[cfg(test)]
mod tests {
    use quill_core::{ast::BinaryOp, output::CharOutput};

    use super::*;
    use crate::config::EngineConfig;

    fn eval_with(vars: Vars, expr: &Expr) -> EvalResult<Value> {
        let runtime = Runtime::new(EngineConfig::default(), Vars::new(), MethodRegistry::new());
        let functions = FunctionTable::new();
        let mut out = CharOutput::new(String::new());
        let mut interp = Interpreter::new(
            vars,
            &runtime,
            &functions,
            &functions,
            &mut out,
            Location::new("test", 1),
        );
        interp.eval(expr)
    }

    fn id(name: &str) -> Box<Expr> {
        Box::new(Expr::Id(name.to_string()))
    }

    #[test]
    fn test_short_circuit_skips_rhs() {
        // `false && (1 / 0)` must not divide.
        let div = Expr::Binary(
            BinaryOp::Div,
            Box::new(Expr::Const(Value::Int(1))),
            Box::new(Expr::Const(Value::Int(0))),
        );
        let expr = Expr::Logical(
            LogicalOp::And,
            Box::new(Expr::Const(Value::Bool(false))),
            Box::new(div),
        );
        assert_eq!(eval_with(Vars::new(), &expr).unwrap().as_bool(), Some(false));
    }

    #[test]
    fn test_null_safe_field() {
        let safe = Expr::Field {
            target: id("missing"),
            name: "name".to_string(),
            null_safe: true,
        };
        assert!(eval_with(Vars::new(), &safe).unwrap().is_null());

        let unsafe_access = Expr::Field {
            target: id("missing"),
            name: "name".to_string(),
            null_safe: false,
        };
        assert!(matches!(
            eval_with(Vars::new(), &unsafe_access),
            Err(RenderErrorKind::Type(_))
        ));
    }

    #[test]
    fn test_postfix_increment_yields_old_value() {
        let mut vars = Vars::new();
        vars.insert("n".to_string(), Value::Int(4));
        let expr = Expr::IncDec {
            op: IncDecOp::Inc,
            prefix: false,
            target: id("n"),
        };
        assert_eq!(eval_with(vars, &expr).unwrap().as_int(), Some(4));
    }

    #[test]
    fn test_index_errors() {
        let mut vars = Vars::new();
        vars.insert("xs".to_string(), Value::list([Value::Int(1)]));
        let expr = Expr::Index {
            target: id("xs"),
            index: Box::new(Expr::Const(Value::Int(3))),
        };
        assert!(matches!(
            eval_with(vars, &expr),
            Err(RenderErrorKind::IndexOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_write_value_skips_null() {
        let mut out = CharOutput::new(String::new());
        write_value(&mut out, &Value::Null).unwrap();
        write_value(&mut out, &Value::Int(7)).unwrap();
        write_value(&mut out, &Value::Bool(true)).unwrap();
        assert_eq!(out.into_inner().unwrap(), "7true");
    }
}
