use rustc_hash::FxHashMap;

use crate::{NativeFunctionError, Value, chunk::Chunk, memory::ObjHandle};

/// One heap slot: the object payload plus the collector's mark bit.
#[derive(Debug, Clone)]
pub struct HeapObject {
    pub is_marked: bool,
    pub kind: ObjectKind,
}

impl HeapObject {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            is_marked: false,
            kind,
        }
    }

    /// Rough live-byte contribution of this object, used to drive the GC
    /// threshold. Not exact accounting, but monotone in the real footprint.
    pub fn size_estimate(&self) -> usize {
        let payload = match &self.kind {
            ObjectKind::String(string) => string.chars.len(),
            ObjectKind::Function(function) => {
                function.chunk.code.len()
                    + function.chunk.locs.len() * std::mem::size_of::<crate::chunk::SourceLocation>()
                    + function.chunk.constants.len() * std::mem::size_of::<Value>()
            }
            ObjectKind::Closure(closure) => {
                closure.upvalues.len() * std::mem::size_of::<ObjHandle>()
            }
            ObjectKind::Upvalue(_) => 0,
            ObjectKind::Class(class) => {
                class.methods.len() * (std::mem::size_of::<ObjHandle>() + std::mem::size_of::<Value>())
            }
            ObjectKind::Instance(instance) => {
                instance.fields.len()
                    * (std::mem::size_of::<ObjHandle>() + std::mem::size_of::<Value>())
            }
            ObjectKind::BoundMethod(_) => 0,
            ObjectKind::Native(_) => 0,
        };

        std::mem::size_of::<HeapObject>() + payload
    }
}

/// Closed union over every kind of heap object. The collector's blacken pass
/// and the VM's stringification are exhaustive matches over this enum, so a
/// new variant cannot be added without handling it everywhere.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    String(StringObject),
    Function(FunctionObject),
    Closure(ClosureObject),
    Upvalue(UpvalueObject),
    Class(ClassObject),
    Instance(InstanceObject),
    BoundMethod(BoundMethodObject),
    Native(NativeFunctionObject),
}

/// An immutable, interned character sequence with its precomputed hash.
#[derive(Debug, Clone, PartialEq)]
pub struct StringObject {
    pub chars: Box<str>,
    pub hash: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionObject {
    pub arity: usize,
    /// Interned name, or handle 0 for the top-level script.
    pub name: ObjHandle,
    pub upvalue_count: usize,
    pub chunk: Chunk,
}

impl FunctionObject {
    pub fn new(name: ObjHandle, arity: usize) -> Self {
        Self {
            name,
            arity,
            upvalue_count: 0,
            chunk: Chunk::new(),
        }
    }
}

/// A function plus its captured lexical environment, one upvalue handle per
/// capture in resolution order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureObject {
    pub function: ObjHandle,
    pub upvalues: Vec<ObjHandle>,
}

impl ClosureObject {
    pub fn new(function: ObjHandle, upvalue_count: usize) -> Self {
        Self {
            function,
            // Handle 0 marks a capture slot the CLOSURE instruction has not
            // filled in yet.
            upvalues: vec![0; upvalue_count],
        }
    }
}

/// A captured variable. Open while its stack slot is still live, closed once
/// the owning scope ends. The transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpvalueObject {
    Open(usize),
    Closed(Value),
}

#[derive(Debug, Clone)]
pub struct ClassObject {
    pub name: ObjHandle,
    /// Method-name string handle to closure value. Inheritance copies the
    /// superclass's table in at INHERIT, so lookup never walks a chain.
    pub methods: FxHashMap<ObjHandle, Value>,
}

impl ClassObject {
    pub fn new(name: ObjHandle) -> Self {
        Self {
            name,
            methods: FxHashMap::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceObject {
    pub class: ObjHandle,
    pub fields: FxHashMap<ObjHandle, Value>,
}

impl InstanceObject {
    pub fn new(class: ObjHandle) -> Self {
        Self {
            class,
            fields: FxHashMap::default(),
        }
    }
}

/// A method read off an instance without being immediately invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundMethodObject {
    pub receiver: Value,
    pub method: ObjHandle,
}

impl BoundMethodObject {
    pub fn new(receiver: Value, method: ObjHandle) -> Self {
        Self { receiver, method }
    }
}

pub type NativeFn =
    fn(args: &[Value], heap: &mut crate::memory::ObjectHeap) -> Result<Value, NativeFunctionError>;

#[derive(Debug, Clone)]
pub struct NativeFunctionObject {
    pub name: ObjHandle,
    pub arity: usize,
    pub function: NativeFn,
}
