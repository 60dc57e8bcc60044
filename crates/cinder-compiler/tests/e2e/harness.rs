//! Test harness for end-to-end compilation and execution
//!
//! Compiles Cinder source with [`CompilationUnit`] and runs the result on a
//! small reference interpreter for the instruction set. The interpreter is
//! deliberately naive: values are reference counted, every frame gets a
//! fresh register file and exceptions unwind through Rust's call stack.

use cinder_bytecode::{
    BinaryOp, CompiledModule, ExportKind, FunctionProto, Instruction, StaticMember, StaticValue,
    Target, UnaryOp,
};
use cinder_compiler::value::{eval_binary, eval_unary, ConstValue};
use cinder_compiler::{CompilationUnit, CompileOptions};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Values
// ============================================================================

pub type ObjectRef = Rc<RefCell<Object>>;

#[derive(Default)]
pub struct Object {
    pub type_name: Option<String>,
    pub proto: Option<ObjectRef>,
    pub members: FxHashMap<String, Value>,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.members.keys().collect();
        names.sort();
        write!(f, "<{} {:?}>", self.type_name.as_deref().unwrap_or("object"), names)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
    Array(Rc<RefCell<Vec<Value>>>),
    Function { module: usize, index: u32 },
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (
                Value::Function { module: m1, index: i1 },
                Value::Function { module: m2, index: i2 },
            ) => m1 == m2 && i1 == i2,
            (Value::Object(_) | Value::Array(_) | Value::Function { .. }, _)
            | (_, Value::Object(_) | Value::Array(_) | Value::Function { .. }) => false,
            (a, b) => a.to_const() == b.to_const(),
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Member of an object, following the prototype chain.
    pub fn member(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(object) => lookup(object, name),
            _ => None,
        }
    }

    fn to_const(&self) -> ConstValue {
        match self {
            Value::Null => ConstValue::Null,
            Value::Bool(b) => ConstValue::Bool(*b),
            Value::Number(n) => ConstValue::Number(*n),
            Value::String(s) => ConstValue::String(s.to_string()),
            Value::Object(_) => ConstValue::String("[object]".into()),
            Value::Array(_) => ConstValue::String("[array]".into()),
            Value::Function { .. } => ConstValue::String("[function]".into()),
        }
    }

    fn from_const(value: ConstValue) -> Self {
        match value {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(b),
            ConstValue::Number(n) => Value::Number(n),
            ConstValue::String(s) => Value::String(Rc::from(s.as_str())),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Object(_) | Value::Array(_) | Value::Function { .. } => true,
            other => other.to_const().truthy(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Function { .. } => "function",
            other => other.to_const().type_name(),
        }
    }
}

fn lookup(object: &ObjectRef, name: &str) -> Option<Value> {
    let object = object.borrow();
    match object.members.get(name) {
        Some(value) => Some(value.clone()),
        None => object.proto.as_ref().and_then(|p| lookup(p, name)),
    }
}

// ============================================================================
// Machine
// ============================================================================

/// Why execution stopped early.
#[derive(Debug)]
pub enum Fault {
    /// Uncaught `throw` or runtime error
    Thrown(Value),
    /// Step budget exhausted
    StepLimit,
    /// Bytecode the interpreter cannot run
    Malformed(String),
}

fn thrown(message: impl Into<String>) -> Fault {
    Fault::Thrown(Value::str(&message.into()))
}

struct Loaded {
    code: Rc<CompiledModule>,
    globals: Vec<Value>,
    prototypes: FxHashMap<u32, ObjectRef>,
}

enum Flow {
    Next,
    Jump(usize),
    Return(Value),
}

struct Frame<'f> {
    module: usize,
    code: &'f CompiledModule,
    base: usize,
    this: Option<Value>,
    exception: Value,
}

pub struct Machine {
    modules: Vec<Loaded>,
    stack: Vec<Value>,
    steps: u64,
    pub step_limit: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            stack: Vec::new(),
            steps: 0,
            step_limit: 1_000_000,
        }
    }

    /// Load `module` and run its top-level code. Modules it imports must
    /// have been loaded first.
    pub fn load(&mut self, module: CompiledModule) -> Result<(), Fault> {
        let code = Rc::new(module);
        self.modules.push(Loaded {
            globals: vec![Value::Null; code.globals.len()],
            code: code.clone(),
            prototypes: FxHashMap::default(),
        });
        let index = self.modules.len() - 1;
        self.execute(index, &code, &code.main, None, Vec::new())?;
        if !self.stack.is_empty() {
            return Err(Fault::Malformed(format!(
                "{} value(s) left on the stack",
                self.stack.len()
            )));
        }
        Ok(())
    }

    /// Global `name` of the most recently loaded module.
    pub fn global(&self, name: &str) -> Value {
        let loaded = self.modules.last().expect("no module loaded");
        let index = loaded
            .code
            .global_index(name)
            .unwrap_or_else(|| panic!("no global `{}`", name));
        loaded.globals[index as usize].clone()
    }

    pub fn call(&mut self, callee: &Value, this: Option<Value>, args: Vec<Value>) -> Result<Value, Fault> {
        let Value::Function { module, index } = *callee else {
            return Err(thrown(format!("{} is not callable", callee.type_name())));
        };
        let code = self.modules[module].code.clone();
        let function = code
            .functions
            .get(index as usize)
            .ok_or_else(|| Fault::Malformed(format!("no function {}", index)))?;
        self.execute(module, &code, function, this, args)
    }

    fn execute(
        &mut self,
        module: usize,
        code: &CompiledModule,
        function: &FunctionProto,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, Fault> {
        let base = self.stack.len();
        for i in 0..function.param_count as usize {
            self.stack.push(args.get(i).cloned().unwrap_or(Value::Null));
        }
        let mut regs = vec![Value::Null; function.register_count as usize];
        let mut handlers: Vec<(usize, usize)> = Vec::new();
        let mut frame = Frame {
            module,
            code,
            base,
            this,
            exception: Value::Null,
        };
        let mut pc = 0;

        let result = loop {
            self.steps += 1;
            if self.steps > self.step_limit {
                break Err(Fault::StepLimit);
            }
            let Some(instr) = function.code.code.get(pc).copied() else {
                break Err(Fault::Malformed(format!("ran off the end of `{}`", function.name)));
            };
            pc += 1;

            let flow = match instr {
                Instruction::EnterTry { handler } => {
                    offset(handler).map(|target| {
                        handlers.push((target, self.stack.len()));
                        Flow::Next
                    })
                }
                Instruction::ExitTry => {
                    handlers.pop();
                    Ok(Flow::Next)
                }
                instr => self.step(&mut frame, &mut regs, instr),
            };
            match flow {
                Ok(Flow::Next) => {}
                Ok(Flow::Jump(target)) => pc = target,
                Ok(Flow::Return(value)) => break Ok(value),
                Err(Fault::Thrown(value)) if !handlers.is_empty() => {
                    let (target, height) = handlers.pop().unwrap_or_default();
                    self.stack.truncate(height);
                    frame.exception = value;
                    pc = target;
                }
                Err(fault) => break Err(fault),
            }
        };
        self.stack.truncate(base);
        result
    }

    fn step(&mut self, frame: &mut Frame<'_>, regs: &mut [Value], instr: Instruction) -> Result<Flow, Fault> {
        let reg = |r: u8| r as usize;
        match instr {
            Instruction::Nop | Instruction::EnterTry { .. } | Instruction::ExitTry => {}
            Instruction::Move { dst, src } => regs[reg(dst)] = regs[reg(src)].clone(),
            Instruction::LoadNull { dst } => regs[reg(dst)] = Value::Null,
            Instruction::LoadBool { dst, value } => regs[reg(dst)] = Value::Bool(value),
            Instruction::LoadInt { dst, value } => regs[reg(dst)] = Value::Number(value as f64),
            Instruction::LoadConst { dst, index } => {
                regs[reg(dst)] = self.load_static(frame.module, index)?;
            }
            Instruction::LoadGlobal { dst, index } => {
                regs[reg(dst)] = self.modules[frame.module].globals[index as usize].clone();
            }
            Instruction::StoreGlobal { index, src } => {
                self.modules[frame.module].globals[index as usize] = regs[reg(src)].clone();
            }
            Instruction::LoadImport { dst, module, export } => {
                regs[reg(dst)] = self.load_import(frame.code, module, export)?;
            }
            Instruction::LoadFunction { dst, index } => {
                regs[reg(dst)] = Value::Function {
                    module: frame.module,
                    index,
                };
            }
            Instruction::LoadThis { dst } => regs[reg(dst)] = frame.this.clone().unwrap_or(Value::Null),

            Instruction::Push { src } => self.stack.push(regs[reg(src)].clone()),
            Instruction::Pop { count } => {
                let len = self.stack.len();
                if (count as usize) > len - frame.base {
                    return Err(Fault::Malformed("pop below frame base".into()));
                }
                self.stack.truncate(len - count as usize);
            }
            Instruction::LoadStack { dst, slot } => {
                regs[reg(dst)] = self
                    .stack
                    .get(frame.base + slot as usize)
                    .cloned()
                    .ok_or_else(|| Fault::Malformed(format!("slot {} not pushed", slot)))?;
            }
            Instruction::StoreStack { slot, src } => {
                let value = regs[reg(src)].clone();
                let cell = self
                    .stack
                    .get_mut(frame.base + slot as usize)
                    .ok_or_else(|| Fault::Malformed(format!("slot {} not pushed", slot)))?;
                *cell = value;
            }

            Instruction::Unary { op, dst, src } => {
                let value = &regs[reg(src)];
                regs[reg(dst)] = match op {
                    UnaryOp::Typeof => Value::str(value.type_name()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    op => Value::from_const(eval_unary(op, &value.to_const())),
                };
            }
            Instruction::Binary { op, dst, lhs, rhs } => {
                let (a, b) = (&regs[reg(lhs)], &regs[reg(rhs)]);
                regs[reg(dst)] = match op {
                    BinaryOp::Eq => Value::Bool(a == b),
                    BinaryOp::Ne => Value::Bool(a != b),
                    op => Value::from_const(eval_binary(op, &a.to_const(), &b.to_const())),
                };
            }

            Instruction::Jump { target } => return Ok(Flow::Jump(offset(target)?)),
            Instruction::JumpIfFalse { cond, target } => {
                if !regs[reg(cond)].truthy() {
                    return Ok(Flow::Jump(offset(target)?));
                }
            }
            Instruction::JumpIfTrue { cond, target } => {
                if regs[reg(cond)].truthy() {
                    return Ok(Flow::Jump(offset(target)?));
                }
            }
            Instruction::Call { base, argc } => {
                let callee = regs[reg(base)].clone();
                let args = regs[reg(base) + 1..=reg(base) + argc as usize].to_vec();
                regs[reg(base)] = self.call(&callee, None, args)?;
            }
            Instruction::CallMethod {
                base,
                name,
                argc,
                yields_receiver,
            } => {
                let receiver = regs[reg(base)].clone();
                let name = self.string(frame.code, name)?;
                let method = self.get_member(&receiver, &name)?;
                let args = regs[reg(base) + 1..=reg(base) + argc as usize].to_vec();
                let result = self.call(&method, Some(receiver.clone()), args)?;
                regs[reg(base)] = if yields_receiver { receiver } else { result };
            }
            Instruction::Return { src } => return Ok(Flow::Return(regs[reg(src)].clone())),
            Instruction::ReturnNull => return Ok(Flow::Return(Value::Null)),

            Instruction::NewObject { dst } => {
                regs[reg(dst)] = Value::Object(Rc::new(RefCell::new(Object::default())));
            }
            Instruction::NewArray { dst, start, count } => {
                let items = regs[reg(start)..reg(start) + count as usize].to_vec();
                regs[reg(dst)] = Value::Array(Rc::new(RefCell::new(items)));
            }
            Instruction::Instantiate { dst } => {
                let Value::Object(proto) = regs[reg(dst)].clone() else {
                    return Err(thrown("new of a non-object"));
                };
                let type_name = proto.borrow().type_name.clone();
                regs[reg(dst)] = Value::Object(Rc::new(RefCell::new(Object {
                    type_name,
                    proto: Some(proto),
                    members: FxHashMap::default(),
                })));
            }
            Instruction::GetMember { dst, object, name } => {
                let name = self.string(frame.code, name)?;
                regs[reg(dst)] = self.get_member(&regs[reg(object)], &name)?;
            }
            Instruction::SetMember { object, name, src } => {
                let name = self.string(frame.code, name)?;
                let Value::Object(target) = &regs[reg(object)] else {
                    return Err(thrown(format!("cannot set `{}`", name)));
                };
                target.borrow_mut().members.insert(name, regs[reg(src)].clone());
            }
            Instruction::HasMember { dst, object, name } => {
                let name = self.string(frame.code, name)?;
                regs[reg(dst)] = Value::Bool(regs[reg(object)].member(&name).is_some());
            }
            Instruction::GetIndex { dst, object, index } => {
                regs[reg(dst)] = match (&regs[reg(object)], &regs[reg(index)]) {
                    (Value::Array(items), Value::Number(i)) => items
                        .borrow()
                        .get(*i as usize)
                        .cloned()
                        .unwrap_or(Value::Null),
                    (object @ Value::Object(_), Value::String(key)) => object.member(key).unwrap_or(Value::Null),
                    _ => return Err(thrown("invalid index")),
                };
            }
            Instruction::SetIndex { object, index, src } => {
                let value = regs[reg(src)].clone();
                match (&regs[reg(object)], &regs[reg(index)]) {
                    (Value::Array(items), Value::Number(i)) => {
                        let mut items = items.borrow_mut();
                        let i = *i as usize;
                        if i >= items.len() {
                            items.resize(i + 1, Value::Null);
                        }
                        items[i] = value;
                    }
                    (Value::Object(target), Value::String(key)) => {
                        target.borrow_mut().members.insert(key.to_string(), value);
                    }
                    _ => return Err(thrown("invalid index")),
                }
            }
            Instruction::LoadException { dst } => regs[reg(dst)] = frame.exception.clone(),
            Instruction::Throw { src } => return Err(Fault::Thrown(regs[reg(src)].clone())),
        }
        Ok(Flow::Next)
    }

    fn get_member(&self, value: &Value, name: &str) -> Result<Value, Fault> {
        match value {
            Value::Object(_) => Ok(value.member(name).unwrap_or(Value::Null)),
            Value::Array(items) if name == "length" => Ok(Value::Number(items.borrow().len() as f64)),
            Value::String(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
            other => Err(thrown(format!("cannot read `{}` of {}", name, other.type_name()))),
        }
    }

    fn string(&self, code: &CompiledModule, index: u32) -> Result<String, Fault> {
        code.statics
            .string(index)
            .map(str::to_string)
            .ok_or_else(|| Fault::Malformed(format!("static {} is not a string", index)))
    }

    fn load_static(&mut self, module: usize, index: u32) -> Result<Value, Fault> {
        let code = self.modules[module].code.clone();
        match code.statics.get(index) {
            Some(StaticValue::Number(n)) => Ok(Value::Number(*n)),
            Some(StaticValue::String(s)) => Ok(Value::str(s)),
            Some(StaticValue::Prototype(_)) => self.prototype(module, index).map(Value::Object),
            None => Err(Fault::Malformed(format!("no static {}", index))),
        }
    }

    /// The prototype object for static `index`, created once per module.
    fn prototype(&mut self, module: usize, index: u32) -> Result<ObjectRef, Fault> {
        if let Some(object) = self.modules[module].prototypes.get(&index) {
            return Ok(object.clone());
        }
        let code = self.modules[module].code.clone();
        let proto = code
            .statics
            .prototype(index)
            .ok_or_else(|| Fault::Malformed(format!("static {} is not a prototype", index)))?;
        let parent = match proto.parent {
            Some(parent) => Some(self.prototype(module, parent)?),
            None => None,
        };
        let mut members = FxHashMap::default();
        for (name, member) in &proto.members {
            let value = match member {
                StaticMember::Null => Value::Null,
                StaticMember::Bool(b) => Value::Bool(*b),
                StaticMember::Number(n) => Value::Number(*n),
                StaticMember::String(s) => Value::str(s),
                StaticMember::Function(index) => Value::Function {
                    module,
                    index: *index,
                },
                StaticMember::Static(index) => self.load_static(module, *index)?,
            };
            members.insert(name.clone(), value);
        }
        let object = Rc::new(RefCell::new(Object {
            type_name: Some(proto.type_name.clone()),
            proto: parent,
            members,
        }));
        self.modules[module].prototypes.insert(index, object.clone());
        Ok(object)
    }

    fn load_import(&mut self, code: &CompiledModule, module: u16, export: u16) -> Result<Value, Fault> {
        let import = code
            .imports
            .get(module as usize)
            .ok_or_else(|| Fault::Malformed(format!("no import {}", module)))?;
        let name = import
            .names
            .get(export as usize)
            .ok_or_else(|| Fault::Malformed(format!("no import name {}", export)))?;
        let source = self
            .modules
            .iter()
            .position(|m| m.code.name == import.module)
            .ok_or_else(|| Fault::Malformed(format!("module `{}` not loaded", import.module)))?;
        let target = self.modules[source]
            .code
            .export(name)
            .cloned()
            .ok_or_else(|| Fault::Malformed(format!("`{}` not exported", name)))?;
        match target.kind {
            ExportKind::Type => self.prototype(source, target.index).map(Value::Object),
            _ => Ok(self.modules[source].globals[target.index as usize].clone()),
        }
    }
}

fn offset(target: Target) -> Result<usize, Fault> {
    match target {
        Target::Offset(offset) => Ok(offset as usize),
        Target::Label(label) => Err(Fault::Malformed(format!("unresolved label {}", label))),
    }
}

// ============================================================================
// Compile helpers
// ============================================================================

/// Compile `source` as module `test`, panicking with the diagnostics on
/// failure.
pub fn compile_with(options: CompileOptions, source: &str) -> CompiledModule {
    let mut unit = CompilationUnit::new(options);
    let outcome = unit.compile_module("test", source);
    match outcome.compiled {
        Some(module) => module,
        None => panic!(
            "compile failed\nsource:\n{}\ndiagnostics: {:#?}\ninternal: {:?}",
            source, outcome.diagnostics, outcome.internal_error
        ),
    }
}

pub fn compile(source: &str) -> CompiledModule {
    compile_with(CompileOptions::default(), source)
}

/// Compile and run, returning the machine for inspecting globals.
pub fn run_with(options: CompileOptions, source: &str) -> Machine {
    let module = compile_with(options, source);
    let mut machine = Machine::new();
    if let Err(fault) = machine.load(module) {
        panic!("execution failed: {:?}\nsource:\n{}", fault, source);
    }
    machine
}

pub fn run(source: &str) -> Machine {
    run_with(CompileOptions::default(), source)
}

/// Run `source` with and without the optimizer and return global `name`
/// from both.
pub fn run_both(source: &str, name: &str) -> (Value, Value) {
    let plain = run_with(
        CompileOptions {
            optimize: false,
            ..CompileOptions::default()
        },
        source,
    );
    let optimized = run(source);
    (plain.global(name), optimized.global(name))
}

/// Assert global `name` is the number `expected` with and without the
/// optimizer.
pub fn expect_number(source: &str, name: &str, expected: f64) {
    let (plain, optimized) = run_both(source, name);
    assert_eq!(plain, Value::Number(expected), "unoptimized, source:\n{}", source);
    assert_eq!(optimized, Value::Number(expected), "optimized, source:\n{}", source);
}

pub fn expect_string(source: &str, name: &str, expected: &str) {
    let (plain, optimized) = run_both(source, name);
    assert_eq!(plain, Value::str(expected), "unoptimized, source:\n{}", source);
    assert_eq!(optimized, Value::str(expected), "optimized, source:\n{}", source);
}
