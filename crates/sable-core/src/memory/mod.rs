mod arena;
mod heap;
mod interner;
mod object;

/// Stable handle into the object heap. Handle 0 is reserved as a sentinel and
/// never refers to a live object.
pub type ObjHandle = u32;

pub use arena::Arena;
pub use heap::ObjectHeap;
pub use object::{
    BoundMethodObject, ClassObject, ClosureObject, FunctionObject, HeapObject, InstanceObject,
    NativeFn, NativeFunctionObject, ObjectKind, StringObject, UpvalueObject,
};
