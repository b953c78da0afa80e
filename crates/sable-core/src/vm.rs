use std::collections::VecDeque;

use rustc_hash::FxHashMap;

#[cfg(feature = "profiler")]
use coz;

use crate::{
    SableRuntimeError, Value,
    chunk::{OpCode, SourceLocation},
    compiler::{FRAME_MAX, Program, STACK_MAX},
    debug_log,
    error::Trace,
    memory::{
        BoundMethodObject, ClassObject, ClosureObject, InstanceObject, NativeFn,
        NativeFunctionObject, ObjHandle, ObjectHeap, ObjectKind, StringObject, UpvalueObject,
    },
};

pub type RuntimeResult<T> = Result<T, SableRuntimeError>;

macro_rules! push_value {
    ($vm:expr, $value:expr) => {
        if $vm.stack_top >= STACK_MAX {
            Err(SableRuntimeError::new(
                format!(
                    "Stack overflow: maximum stack size of {} exceeded",
                    STACK_MAX
                ),
                $vm.get_previous_loc(),
            ))
        } else {
            $vm.stack[$vm.stack_top] = $value;
            $vm.stack_top += 1;
            Ok(())
        }
    };
}

macro_rules! pop_value {
    ($vm:expr) => {{
        debug_assert!($vm.stack_top > 0, "Stack underflow: unexpected empty stack.");
        $vm.stack_top -= 1;
        $vm.stack[$vm.stack_top]
    }};
}

macro_rules! peek_value {
    ($vm:expr, $distance:expr) => {
        if $vm.stack_top > $distance {
            $vm.stack[$vm.stack_top - 1 - $distance]
        } else {
            Value::nil()
        }
    };
}

macro_rules! get_current_frame {
    ($vm:expr) => {
        &$vm.frames[$vm.frame_count - 1]
    };
}

macro_rules! read_byte {
    ($vm:expr) => {{
        let frame = get_current_frame!($vm);
        let byte = $vm.heap.get_function(frame.function).chunk.code[frame.ip];
        $vm.frames[$vm.frame_count - 1].ip += 1;
        byte
    }};
}

macro_rules! read_short {
    ($vm:expr) => {{
        let high_byte = read_byte!($vm) as usize;
        let low_byte = read_byte!($vm) as usize;
        (high_byte << 8) | low_byte
    }};
}

macro_rules! read_constant {
    ($vm:expr) => {{
        let index = read_byte!($vm) as usize;
        let frame = get_current_frame!($vm);
        $vm.heap.get_function(frame.function).chunk.constants[index]
    }};
}

macro_rules! read_string {
    ($vm:expr) => {
        match read_constant!($vm).as_object() {
            Some(handle) => handle,
            None => panic!("Expected string constant"),
        }
    };
}

#[derive(Debug, Clone, Default)]
struct CallFrame {
    closure: ObjHandle,
    /// The closure's function, cached so instruction fetch is one lookup.
    function: ObjHandle,
    ip: usize,
    value_slot: usize,
}

/// Stack-based bytecode interpreter. Owns the object heap for the duration
/// of a run and drives the collector at allocation points.
pub struct Vm {
    is_debug: bool,
    is_gc_enabled: bool,
    stack_top: usize,
    frame_count: usize,
    stack: Vec<Value>,
    frames: [CallFrame; FRAME_MAX],
    globals: FxHashMap<ObjHandle, Value>,
    /// Open upvalues ordered by the stack slot they alias, innermost last.
    open_upvalues: Vec<(usize, ObjHandle)>,
    heap: ObjectHeap,
    init_handle: ObjHandle,
    captured_output: Option<Vec<String>>,
}

impl Vm {
    pub fn new(mut heap: ObjectHeap) -> Self {
        let init_handle = heap.intern("init");

        let vm = Self {
            is_debug: false,
            is_gc_enabled: true,
            stack_top: 0,
            frame_count: 0,
            stack: vec![Value::nil(); STACK_MAX],
            frames: std::array::from_fn(|_| CallFrame::default()),
            globals: FxHashMap::default(),
            open_upvalues: Vec::with_capacity(8),
            heap,
            init_handle,
            captured_output: None,
        };

        vm.add_native_function("clock", 0, native_clock)
    }

    pub fn set_debug(mut self, is_debug: bool) -> Self {
        self.is_debug = is_debug;
        self
    }

    pub fn set_gc_status(mut self, is_enabled: bool) -> Self {
        self.is_gc_enabled = is_enabled;
        self
    }

    /// Routes `print` output into a buffer readable with `take_output`,
    /// instead of stdout.
    pub fn capture_output(mut self) -> Self {
        self.captured_output = Some(Vec::new());
        self
    }

    pub fn take_output(&mut self) -> Vec<String> {
        self.captured_output.take().unwrap_or_default()
    }

    pub fn add_native_function(mut self, name: &str, arity: usize, function: NativeFn) -> Self {
        let name_handle = self.heap.intern(name);
        let handle = self.heap.allocate(ObjectKind::Native(NativeFunctionObject {
            name: name_handle,
            arity,
            function,
        }));

        self.globals.insert(name_handle, Value::object(handle));
        self
    }

    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        &mut self.heap
    }

    pub fn globals(&self) -> &FxHashMap<ObjHandle, Value> {
        &self.globals
    }

    pub fn get_global(&mut self, name: &str) -> Option<Value> {
        let handle = self.heap.intern(name);
        self.globals.get(&handle).copied()
    }

    /// Runs a compiled script to completion or to its first runtime error.
    /// Globals persist across runs; the stack and frames do not, so a REPL
    /// can keep interpreting after a failed line.
    pub fn interpret(&mut self, program: Program) -> RuntimeResult<()> {
        self.reset_stack();

        let function_handle = program.handle();
        let upvalue_count = self.heap.get_function(function_handle).upvalue_count;

        let closure = self.heap.allocate(ObjectKind::Closure(ClosureObject::new(
            function_handle,
            upvalue_count,
        )));
        push_value!(self, Value::object(closure))?;
        self.call(closure, 0)?;

        #[cfg(feature = "profiler")]
        coz::scope!("vm_interpret");

        let _ = self
            .run()
            .map_err(|e| e.with_stack_trace(self.get_stack_trace()))?;

        #[cfg(feature = "profiler")]
        coz::progress!("execution_complete");

        Ok(())
    }

    fn reset_stack(&mut self) {
        self.stack_top = 0;
        self.frame_count = 0;
        self.open_upvalues.clear();
    }

    fn run(&mut self) -> RuntimeResult<Value> {
        loop {
            #[cfg(feature = "profiler")]
            coz::progress!("vm_instructions");

            #[cfg(debug_assertions)]
            {
                if self.is_debug {
                    self.debug_print();
                }
            }

            let opcode: OpCode = read_byte!(self).into();

            match opcode {
                OpCode::Constant => {
                    let constant = read_constant!(self);
                    push_value!(self, constant)?;
                }
                OpCode::Nil => {
                    push_value!(self, Value::nil())?;
                }
                OpCode::True => {
                    push_value!(self, Value::boolean(true))?;
                }
                OpCode::False => {
                    push_value!(self, Value::boolean(false))?;
                }
                OpCode::Pop => {
                    pop_value!(self);
                }
                OpCode::GetLocal => {
                    let slot = read_byte!(self);
                    let absolute_slot = get_current_frame!(self).value_slot + slot as usize;
                    debug_assert!(
                        absolute_slot < STACK_MAX,
                        "Local slot {} out of bounds",
                        absolute_slot
                    );

                    let value = self.stack[absolute_slot];
                    push_value!(self, value)?;
                }
                OpCode::SetLocal => {
                    let slot = read_byte!(self);
                    let value = peek_value!(self, 0);
                    let absolute_slot = get_current_frame!(self).value_slot + slot as usize;

                    self.stack[absolute_slot] = value;
                }
                OpCode::GetUpvalue => {
                    let slot = read_byte!(self) as usize;
                    let closure_handle = get_current_frame!(self).closure;
                    let upvalue_handle = self.heap.get_closure(closure_handle).upvalues[slot];

                    let value = match *self.heap.get_upvalue(upvalue_handle) {
                        UpvalueObject::Open(stack_slot) => self.stack[stack_slot],
                        UpvalueObject::Closed(value) => value,
                    };
                    push_value!(self, value)?;
                }
                OpCode::SetUpvalue => {
                    let slot = read_byte!(self) as usize;
                    let value = peek_value!(self, 0);
                    let closure_handle = get_current_frame!(self).closure;
                    let upvalue_handle = self.heap.get_closure(closure_handle).upvalues[slot];

                    match *self.heap.get_upvalue(upvalue_handle) {
                        UpvalueObject::Open(stack_slot) => self.stack[stack_slot] = value,
                        UpvalueObject::Closed(_) => {
                            *self.heap.get_upvalue_mut(upvalue_handle) =
                                UpvalueObject::Closed(value);
                        }
                    }
                }
                OpCode::GetGlobal => {
                    let name = read_string!(self);
                    let value = *self.globals.get(&name).ok_or_else(|| {
                        self.runtime_error(format!(
                            "Undefined variable '{}'.",
                            self.heap.get_string(name).chars
                        ))
                    })?;
                    push_value!(self, value)?;
                }
                OpCode::SetGlobal => {
                    let name = read_string!(self);

                    if !self.globals.contains_key(&name) {
                        return Err(self.runtime_error(format!(
                            "Undefined variable '{}'.",
                            self.heap.get_string(name).chars
                        )));
                    }
                    let value = peek_value!(self, 0);
                    self.globals.insert(name, value);
                }
                OpCode::DefineGlobal => {
                    let name = read_string!(self);
                    let value = pop_value!(self);
                    self.globals.insert(name, value);
                }
                OpCode::Equal => {
                    let b = pop_value!(self);
                    let a = pop_value!(self);
                    push_value!(self, Value::boolean(a == b))?;
                }
                OpCode::Greater => {
                    self.binary_number_operation(|a, b| Value::boolean(a > b))?;
                }
                OpCode::Less => {
                    self.binary_number_operation(|a, b| Value::boolean(a < b))?;
                }
                OpCode::Add => {
                    let a = peek_value!(self, 1);
                    let b = peek_value!(self, 0);

                    match (a.as_number(), b.as_number()) {
                        (Some(a), Some(b)) => {
                            pop_value!(self);
                            pop_value!(self);
                            push_value!(self, Value::number(a + b))?;
                        }
                        _ if self.both_strings(a, b) => {
                            // Collect before the operands leave the stack so
                            // the new string's inputs stay rooted.
                            self.maybe_collect();
                            pop_value!(self);
                            pop_value!(self);
                            let result = self.concatenate(a, b);
                            push_value!(self, Value::object(result))?;
                        }
                        _ => {
                            return Err(self.runtime_error(
                                "Operands must be two numbers or two strings.".to_string(),
                            ));
                        }
                    }
                }
                OpCode::Subtract => {
                    self.binary_number_operation(|a, b| Value::number(a - b))?;
                }
                OpCode::Multiply => {
                    self.binary_number_operation(|a, b| Value::number(a * b))?;
                }
                OpCode::Divide => {
                    // IEEE-754 semantics throughout: dividing by zero yields
                    // an infinity or NaN, never an error.
                    self.binary_number_operation(|a, b| Value::number(a / b))?;
                }
                OpCode::Not => {
                    let value = pop_value!(self);
                    push_value!(self, Value::boolean(!value.is_truthy()))?;
                }
                OpCode::Negate => {
                    match peek_value!(self, 0).as_number() {
                        Some(number) => {
                            self.stack[self.stack_top - 1] = Value::number(-number);
                        }
                        None => {
                            return Err(
                                self.runtime_error("Operand must be a number.".to_string())
                            );
                        }
                    }
                }
                OpCode::Print => {
                    let value = pop_value!(self);
                    let text = value.to_display_string(&self.heap);
                    match &mut self.captured_output {
                        Some(lines) => lines.push(text),
                        None => println!("{}", text),
                    }
                }
                OpCode::Jump => {
                    let offset = read_short!(self);
                    self.frames[self.frame_count - 1].ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = read_short!(self);
                    if !peek_value!(self, 0).is_truthy() {
                        self.frames[self.frame_count - 1].ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = read_short!(self);
                    self.frames[self.frame_count - 1].ip -= offset;
                }
                OpCode::Call => {
                    let arg_count = read_byte!(self) as usize;
                    let callee = peek_value!(self, arg_count);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Closure => {
                    let constant = read_constant!(self);
                    self.create_closure(constant)?;
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack_top - 1);
                    pop_value!(self);
                }
                OpCode::Return => {
                    let result = pop_value!(self);
                    let value_slot = get_current_frame!(self).value_slot;

                    self.close_upvalues(value_slot);
                    self.frame_count -= 1;

                    #[cfg(feature = "profiler")]
                    coz::progress!("function_returns");

                    if self.frame_count == 0 {
                        self.stack_top = 0;
                        return Ok(result);
                    }

                    // The return value lands where the callee used to sit.
                    self.stack_top = value_slot + 1;
                    self.stack[value_slot] = result;
                }
                OpCode::Class => {
                    let name = read_string!(self);
                    let handle = self
                        .with_gc_check(|heap| heap.allocate(ObjectKind::Class(ClassObject::new(name))));
                    push_value!(self, Value::object(handle))?;
                }
                OpCode::Method => {
                    let name = read_string!(self);
                    self.define_method(name);
                }
                OpCode::Inherit => {
                    let superclass = peek_value!(self, 1);
                    let subclass = peek_value!(self, 0);

                    let superclass_handle = match self.class_handle(superclass) {
                        Some(handle) => handle,
                        None => {
                            return Err(
                                self.runtime_error("Superclass must be a class.".to_string())
                            );
                        }
                    };
                    let subclass_handle = self
                        .class_handle(subclass)
                        .expect("INHERIT operates on a class declaration");

                    // Copy the whole method table down; later METHOD
                    // instructions overwrite inherited entries, and lookups
                    // never have to walk a superclass chain.
                    let methods = self.heap.get_class(superclass_handle).methods.clone();
                    self.heap.get_class_mut(subclass_handle).methods.extend(methods);

                    pop_value!(self);
                }
                OpCode::GetProperty => {
                    let name = read_string!(self);
                    self.get_property(name)?;
                }
                OpCode::SetProperty => {
                    let name = read_string!(self);
                    self.set_property(name)?;
                }
                OpCode::GetSuper => {
                    let name = read_string!(self);
                    let superclass = pop_value!(self);
                    let superclass_handle = self
                        .class_handle(superclass)
                        .expect("GET_SUPER operates on the bound superclass");

                    if !self.bind_method(superclass_handle, name)? {
                        return Err(self.runtime_error(format!(
                            "Undefined property '{}'.",
                            self.heap.get_string(name).chars
                        )));
                    }
                }
                OpCode::Invoke => {
                    let name = read_string!(self);
                    let arg_count = read_byte!(self) as usize;
                    self.invoke(name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name = read_string!(self);
                    let arg_count = read_byte!(self) as usize;
                    let superclass = pop_value!(self);
                    let superclass_handle = self
                        .class_handle(superclass)
                        .expect("SUPER_INVOKE operates on the bound superclass");

                    self.invoke_from_class(superclass_handle, name, arg_count)?;
                }
            }
        }
    }

    fn both_strings(&self, a: Value, b: Value) -> bool {
        self.string_object(a).is_some() && self.string_object(b).is_some()
    }

    fn string_object(&self, value: Value) -> Option<&StringObject> {
        let handle = value.as_object()?;
        match &self.heap.get(handle).kind {
            ObjectKind::String(string) => Some(string),
            _ => None,
        }
    }

    fn concatenate(&mut self, a: Value, b: Value) -> ObjHandle {
        #[cfg(feature = "profiler")]
        coz::scope!("string_concatenation");

        let left = self
            .string_object(a)
            .expect("concatenation operands are strings");
        let right = self
            .string_object(b)
            .expect("concatenation operands are strings");

        let mut combined = String::with_capacity(left.chars.len() + right.chars.len());
        combined.push_str(&left.chars);
        combined.push_str(&right.chars);

        self.heap.intern(&combined)
    }

    fn binary_number_operation(
        &mut self,
        op: impl FnOnce(f64, f64) -> Value,
    ) -> RuntimeResult<()> {
        #[cfg(feature = "profiler")]
        coz::scope!("binary_operation");

        let b = pop_value!(self);
        let a = pop_value!(self);

        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => {
                push_value!(self, op(a, b))?;
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be numbers.".to_string())),
        }
    }

    fn create_closure(&mut self, constant: Value) -> RuntimeResult<()> {
        let function_handle = constant
            .as_object()
            .expect("CLOSURE operand references a function");
        let upvalue_count = self.heap.get_function(function_handle).upvalue_count;

        let closure_handle = self.with_gc_check(|heap| {
            heap.allocate(ObjectKind::Closure(ClosureObject::new(
                function_handle,
                upvalue_count,
            )))
        });

        // On the stack straight away so a collection triggered while
        // capturing upvalues sees the closure as reachable.
        push_value!(self, Value::object(closure_handle))?;

        for i in 0..upvalue_count {
            let is_local = read_byte!(self) != 0;
            let index = read_byte!(self) as usize;

            let upvalue_handle = if is_local {
                let stack_slot = get_current_frame!(self).value_slot + index;
                self.capture_upvalue(stack_slot)
            } else {
                let enclosing = get_current_frame!(self).closure;
                self.heap.get_closure(enclosing).upvalues[index]
            };

            self.heap.get_closure_mut(closure_handle).upvalues[i] = upvalue_handle;
        }

        Ok(())
    }

    /// Produces the upvalue aliasing `stack_slot`, sharing an existing open
    /// one when two closures capture the same variable.
    fn capture_upvalue(&mut self, stack_slot: usize) -> ObjHandle {
        for (open_slot, handle) in &self.open_upvalues {
            if *open_slot == stack_slot {
                return *handle;
            }
        }

        let handle = self
            .with_gc_check(|heap| heap.allocate(ObjectKind::Upvalue(UpvalueObject::Open(stack_slot))));

        // Keep the list ordered by stack depth so closing can stop early.
        let position = self
            .open_upvalues
            .iter()
            .position(|(slot, _)| *slot > stack_slot)
            .unwrap_or(self.open_upvalues.len());
        self.open_upvalues.insert(position, (stack_slot, handle));

        handle
    }

    /// Closes every open upvalue at or above `last_slot`: the value moves
    /// out of its dying stack slot into the upvalue's own storage.
    fn close_upvalues(&mut self, last_slot: usize) {
        while let Some((slot, handle)) = self.open_upvalues.last().copied() {
            if slot < last_slot {
                break;
            }

            let value = self.stack[slot];
            *self.heap.get_upvalue_mut(handle) = UpvalueObject::Closed(value);
            self.open_upvalues.pop();
        }
    }

    fn call_value(&mut self, callee: Value, arg_count: usize) -> RuntimeResult<()> {
        enum Callee {
            Closure,
            Native(NativeFunctionObject),
            Class,
            Bound(Value, ObjHandle),
            NotCallable,
        }

        let Some(handle) = callee.as_object() else {
            return Err(self.runtime_error("Can only call functions and classes.".to_string()));
        };

        let kind = match &self.heap.get(handle).kind {
            ObjectKind::Closure(_) => Callee::Closure,
            ObjectKind::Native(native) => Callee::Native(native.clone()),
            ObjectKind::Class(_) => Callee::Class,
            ObjectKind::BoundMethod(bound) => Callee::Bound(bound.receiver, bound.method),
            _ => Callee::NotCallable,
        };

        match kind {
            Callee::Closure => self.call(handle, arg_count),
            Callee::Native(native) => self.call_native_function(native, arg_count),
            Callee::Class => self.instantiate_class(handle, arg_count),
            Callee::Bound(receiver, method) => {
                self.stack[self.stack_top - arg_count - 1] = receiver;
                self.call(method, arg_count)
            }
            Callee::NotCallable => {
                Err(self.runtime_error("Can only call functions and classes.".to_string()))
            }
        }
    }

    fn call(&mut self, closure_handle: ObjHandle, arg_count: usize) -> RuntimeResult<()> {
        #[cfg(feature = "profiler")]
        coz::scope!("call_function");

        let closure = self.heap.get_closure(closure_handle);
        let function_handle = closure.function;
        let arity = self.heap.get_function(function_handle).arity;

        if arg_count != arity {
            return Err(self.runtime_error(format!(
                "Expected {} arguments but got {}.",
                arity, arg_count
            )));
        }

        if self.frame_count >= FRAME_MAX {
            return Err(self.runtime_error("Stack overflow.".to_string()));
        }

        let value_slot = self.stack_top - arg_count - 1;
        let frame = &mut self.frames[self.frame_count];
        frame.closure = closure_handle;
        frame.function = function_handle;
        frame.ip = 0;
        frame.value_slot = value_slot;
        self.frame_count += 1;

        Ok(())
    }

    fn call_native_function(
        &mut self,
        native: NativeFunctionObject,
        arg_count: usize,
    ) -> RuntimeResult<()> {
        if arg_count != native.arity {
            return Err(self.runtime_error(format!(
                "Expected {} arguments but got {}.",
                native.arity, arg_count
            )));
        }

        let args_start = self.stack_top - arg_count;
        let args: Vec<Value> = self.stack[args_start..self.stack_top].to_vec();

        self.stack_top = args_start - 1; // also pops the callee

        let loc = self.get_previous_loc();
        let value = (native.function)(&args, &mut self.heap)
            .map_err(|e| e.into_runtime_error(loc))?;

        push_value!(self, value)?;
        Ok(())
    }

    fn instantiate_class(&mut self, class_handle: ObjHandle, arg_count: usize) -> RuntimeResult<()> {
        let instance_handle = self.with_gc_check(|heap| {
            heap.allocate(ObjectKind::Instance(InstanceObject::new(class_handle)))
        });
        self.stack[self.stack_top - arg_count - 1] = Value::object(instance_handle);

        let initializer = self
            .heap
            .get_class(class_handle)
            .methods
            .get(&self.init_handle)
            .copied();

        if let Some(initializer) = initializer {
            let closure = initializer
                .as_object()
                .expect("methods are closure references");
            self.call(closure, arg_count)
        } else if arg_count != 0 {
            Err(self.runtime_error(format!("Expected 0 arguments but got {}.", arg_count)))
        } else {
            Ok(())
        }
    }

    fn define_method(&mut self, name: ObjHandle) {
        let method = peek_value!(self, 0);
        let class = peek_value!(self, 1)
            .as_object()
            .expect("METHOD operates on a class declaration");

        self.heap.get_class_mut(class).methods.insert(name, method);
        pop_value!(self);
    }

    fn class_handle(&self, value: Value) -> Option<ObjHandle> {
        let handle = value.as_object()?;
        matches!(self.heap.get(handle).kind, ObjectKind::Class(_)).then_some(handle)
    }

    fn get_property(&mut self, name: ObjHandle) -> RuntimeResult<()> {
        let object = peek_value!(self, 0);

        let instance_handle = object
            .as_object()
            .filter(|&h| matches!(self.heap.get(h).kind, ObjectKind::Instance(_)))
            .ok_or_else(|| self.runtime_error("Only instances have properties.".to_string()))?;

        let (field, class) = {
            let instance = self.heap.get_instance(instance_handle);
            (instance.fields.get(&name).copied(), instance.class)
        };

        // Fields shadow methods.
        if let Some(value) = field {
            pop_value!(self);
            push_value!(self, value)?;
            return Ok(());
        }

        if !self.bind_method(class, name)? {
            return Err(self.runtime_error(format!(
                "Undefined property '{}'.",
                self.heap.get_string(name).chars
            )));
        }

        Ok(())
    }

    /// Wraps the named method of `class` around the receiver on top of the
    /// stack. Returns false when the class has no such method.
    fn bind_method(&mut self, class: ObjHandle, name: ObjHandle) -> RuntimeResult<bool> {
        let Some(method) = self.heap.get_class(class).methods.get(&name).copied() else {
            return Ok(false);
        };

        let closure = method.as_object().expect("methods are closure references");
        let receiver = peek_value!(self, 0);
        let bound = self.with_gc_check(|heap| {
            heap.allocate(ObjectKind::BoundMethod(BoundMethodObject::new(
                receiver, closure,
            )))
        });

        pop_value!(self);
        push_value!(self, Value::object(bound))?;
        Ok(true)
    }

    fn set_property(&mut self, name: ObjHandle) -> RuntimeResult<()> {
        let target = peek_value!(self, 1);

        let instance_handle = target
            .as_object()
            .filter(|&h| matches!(self.heap.get(h).kind, ObjectKind::Instance(_)))
            .ok_or_else(|| self.runtime_error("Only instances have fields.".to_string()))?;

        let value = peek_value!(self, 0);
        self.heap
            .get_instance_mut(instance_handle)
            .fields
            .insert(name, value);

        let value = pop_value!(self);
        pop_value!(self); // the instance
        push_value!(self, value)?; // assignment evaluates to the stored value
        Ok(())
    }

    fn invoke(&mut self, name: ObjHandle, arg_count: usize) -> RuntimeResult<()> {
        let receiver = peek_value!(self, arg_count);

        let instance_handle = receiver
            .as_object()
            .filter(|&h| matches!(self.heap.get(h).kind, ObjectKind::Instance(_)))
            .ok_or_else(|| self.runtime_error("Only instances have methods.".to_string()))?;

        let (field, class) = {
            let instance = self.heap.get_instance(instance_handle);
            (instance.fields.get(&name).copied(), instance.class)
        };

        // A field holding a callable takes precedence over a method of the
        // same name, exactly as a GET_PROPERTY/CALL pair would behave.
        if let Some(field) = field {
            self.stack[self.stack_top - arg_count - 1] = field;
            return self.call_value(field, arg_count);
        }

        self.invoke_from_class(class, name, arg_count)
    }

    fn invoke_from_class(
        &mut self,
        class: ObjHandle,
        name: ObjHandle,
        arg_count: usize,
    ) -> RuntimeResult<()> {
        let Some(method) = self.heap.get_class(class).methods.get(&name).copied() else {
            return Err(self.runtime_error(format!(
                "Undefined property '{}'.",
                self.heap.get_string(name).chars
            )));
        };

        let closure = method.as_object().expect("methods are closure references");
        self.call(closure, arg_count)
    }

    fn maybe_collect(&mut self) {
        if self.is_gc_enabled && self.heap.should_collect_garbage() {
            debug_log!(self.is_debug, "-- gc requested by vm");
            let roots = self.gather_roots();
            self.heap.collect_garbage(roots);
        }
    }

    fn with_gc_check<T>(&mut self, op: impl FnOnce(&mut ObjectHeap) -> T) -> T {
        self.maybe_collect();
        op(&mut self.heap)
    }

    /// Everything the collector must treat as live: the operand stack, both
    /// keys and values of the global table, each active frame's closure, and
    /// every still-open upvalue.
    pub fn gather_roots(&self) -> VecDeque<Value> {
        let capacity =
            self.stack_top + self.globals.len() * 2 + self.frame_count + self.open_upvalues.len();
        let mut roots = VecDeque::with_capacity(capacity + 1);

        roots.extend(&self.stack[..self.stack_top]);

        for (name, value) in &self.globals {
            roots.push_back(Value::object(*name));
            roots.push_back(*value);
        }

        for frame in &self.frames[..self.frame_count] {
            roots.push_back(Value::object(frame.closure));
        }

        for (_, handle) in &self.open_upvalues {
            roots.push_back(Value::object(*handle));
        }

        roots.push_back(Value::object(self.init_handle));

        roots
    }

    pub fn collect_garbage(&mut self) {
        let roots = self.gather_roots();
        self.heap.collect_garbage(roots);
    }

    fn runtime_error(&self, message: String) -> SableRuntimeError {
        SableRuntimeError::new(message, self.get_previous_loc())
    }

    fn get_previous_loc(&self) -> SourceLocation {
        if self.frame_count == 0 {
            return SourceLocation::default();
        }

        let frame = get_current_frame!(self);
        if frame.ip == 0 {
            return SourceLocation::default();
        }

        self.heap
            .get_function(frame.function)
            .chunk
            .locs
            .get(frame.ip - 1)
            .copied()
            .unwrap_or_default()
    }

    fn get_stack_trace(&self) -> Vec<Trace> {
        let mut traces = Vec::new();

        for frame in self.frames[..self.frame_count].iter().rev() {
            let function = self.heap.get_function(frame.function);
            let name = self.heap.function_display_name(function);

            let loc = if frame.ip > 0 {
                function
                    .chunk
                    .locs
                    .get(frame.ip - 1)
                    .copied()
                    .unwrap_or_default()
            } else {
                SourceLocation::default()
            };

            traces.push(Trace::new(&name, loc));
        }

        traces
    }

    #[cfg(debug_assertions)]
    fn debug_print(&self) {
        print!("          ");
        for value in &self.stack[..self.stack_top] {
            print!("[ {} ]", value.to_display_string(&self.heap));
        }
        println!();

        let frame = get_current_frame!(self);
        crate::debug::disassemble_instruction(
            &self.heap.get_function(frame.function).chunk,
            &self.heap,
            frame.ip,
        );
    }
}

fn native_clock(
    _args: &[Value],
    _heap: &mut ObjectHeap,
) -> Result<Value, crate::NativeFunctionError> {
    let seconds = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| crate::NativeFunctionError::new("System clock unavailable."))?
        .as_secs_f64();

    Ok(Value::number(seconds))
}
