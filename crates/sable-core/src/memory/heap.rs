use std::collections::VecDeque;

use crate::{
    Value, debug_log,
    memory::{
        Arena, BoundMethodObject, ClassObject, ClosureObject, FunctionObject, HeapObject,
        InstanceObject, NativeFunctionObject, ObjHandle, ObjectKind, StringObject, UpvalueObject,
        interner::{StringTable, hash_str, is_same_string},
    },
};

const GC_HEAP_GROW_FACTOR: usize = 2;
const INITIAL_GC_THRESHOLD: usize = 1024 * 1024;

/// Owns every runtime object behind stable slot handles, and reclaims dead
/// ones with a mark-sweep pass over the whole arena. The heap has a single
/// logical owner at any time (compiler or VM); allocation and collection
/// never interleave with each other.
#[derive(Debug, Clone)]
pub struct ObjectHeap {
    objects: Arena<HeapObject>,
    strings: StringTable,
    bytes_allocated: usize,
    bytes_until_gc: usize,
    is_debug: bool,
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            objects: Arena::with_capacity(capacity),
            strings: StringTable::new(),
            bytes_allocated: 0,
            bytes_until_gc: INITIAL_GC_THRESHOLD,
            is_debug: false,
        }
    }

    pub fn set_debug(mut self, is_debug: bool) -> Self {
        self.is_debug = is_debug;
        self
    }

    /// Lowers (or raises) the first collection threshold. Tests use this to
    /// force frequent collections.
    pub fn set_bytes_until_gc(mut self, bytes: usize) -> Self {
        self.bytes_until_gc = bytes;
        self
    }

    pub fn allocate(&mut self, kind: ObjectKind) -> ObjHandle {
        let object = HeapObject::new(kind);
        self.bytes_allocated += object.size_estimate();
        let handle = self.objects.insert(object);
        debug_log!(
            self.is_debug,
            "Allocated object {} ({} bytes live)",
            handle,
            self.bytes_allocated
        );
        handle
    }

    fn free(&mut self, handle: ObjHandle) {
        if let Some(object) = self.objects.remove(handle) {
            self.bytes_allocated = self
                .bytes_allocated
                .saturating_sub(object.size_estimate());
            debug_log!(self.is_debug, "Freed object {}", handle);
        }
    }

    pub fn get(&self, handle: ObjHandle) -> &HeapObject {
        &self.objects[handle]
    }

    pub fn get_mut(&mut self, handle: ObjHandle) -> &mut HeapObject {
        &mut self.objects[handle]
    }

    pub fn object_count(&self) -> usize {
        // The reserved sentinel slot does not count.
        self.objects.len() - 1
    }

    pub fn contains(&self, handle: ObjHandle) -> bool {
        self.objects.get(handle).is_some()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn iter_objects(&self) -> impl Iterator<Item = (ObjHandle, &HeapObject)> {
        self.objects.iter()
    }

    pub fn get_string(&self, handle: ObjHandle) -> &StringObject {
        match &self.get(handle).kind {
            ObjectKind::String(string) => string,
            kind => panic!("Expected string object, found {:?}", kind),
        }
    }

    pub fn get_function(&self, handle: ObjHandle) -> &FunctionObject {
        match &self.get(handle).kind {
            ObjectKind::Function(function) => function,
            kind => panic!("Expected function object, found {:?}", kind),
        }
    }

    pub fn get_closure(&self, handle: ObjHandle) -> &ClosureObject {
        match &self.get(handle).kind {
            ObjectKind::Closure(closure) => closure,
            kind => panic!("Expected closure object, found {:?}", kind),
        }
    }

    pub fn get_closure_mut(&mut self, handle: ObjHandle) -> &mut ClosureObject {
        match &mut self.get_mut(handle).kind {
            ObjectKind::Closure(closure) => closure,
            kind => panic!("Expected closure object, found {:?}", kind),
        }
    }

    pub fn get_upvalue(&self, handle: ObjHandle) -> &UpvalueObject {
        match &self.get(handle).kind {
            ObjectKind::Upvalue(upvalue) => upvalue,
            kind => panic!("Expected upvalue object, found {:?}", kind),
        }
    }

    pub fn get_upvalue_mut(&mut self, handle: ObjHandle) -> &mut UpvalueObject {
        match &mut self.get_mut(handle).kind {
            ObjectKind::Upvalue(upvalue) => upvalue,
            kind => panic!("Expected upvalue object, found {:?}", kind),
        }
    }

    pub fn get_class(&self, handle: ObjHandle) -> &ClassObject {
        match &self.get(handle).kind {
            ObjectKind::Class(class) => class,
            kind => panic!("Expected class object, found {:?}", kind),
        }
    }

    pub fn get_class_mut(&mut self, handle: ObjHandle) -> &mut ClassObject {
        match &mut self.get_mut(handle).kind {
            ObjectKind::Class(class) => class,
            kind => panic!("Expected class object, found {:?}", kind),
        }
    }

    pub fn get_instance(&self, handle: ObjHandle) -> &InstanceObject {
        match &self.get(handle).kind {
            ObjectKind::Instance(instance) => instance,
            kind => panic!("Expected instance object, found {:?}", kind),
        }
    }

    pub fn get_instance_mut(&mut self, handle: ObjHandle) -> &mut InstanceObject {
        match &mut self.get_mut(handle).kind {
            ObjectKind::Instance(instance) => instance,
            kind => panic!("Expected instance object, found {:?}", kind),
        }
    }

    pub fn get_bound_method(&self, handle: ObjHandle) -> &BoundMethodObject {
        match &self.get(handle).kind {
            ObjectKind::BoundMethod(bound) => bound,
            kind => panic!("Expected bound method object, found {:?}", kind),
        }
    }

    pub fn get_native(&self, handle: ObjHandle) -> &NativeFunctionObject {
        match &self.get(handle).kind {
            ObjectKind::Native(native) => native,
            kind => panic!("Expected native function object, found {:?}", kind),
        }
    }

    pub fn function_display_name(&self, function: &FunctionObject) -> String {
        if function.name == 0 {
            "<script>".to_string()
        } else {
            format!("<fn {}>", self.get_string(function.name).chars)
        }
    }

    /// Returns the unique handle for `s`, allocating a new string object only
    /// when no live string with the same content exists. Two interned strings
    /// with equal content always share one handle.
    pub fn intern(&mut self, s: &str) -> ObjHandle {
        let mut key = hash_str(s);

        loop {
            match self.strings.get(key) {
                None => {
                    let handle = self.allocate(ObjectKind::String(StringObject {
                        chars: s.into(),
                        hash: key,
                    }));
                    self.strings.insert(key, handle);
                    return handle;
                }
                Some(handle) => {
                    if is_same_string(self.get(handle), s) {
                        return handle;
                    }
                    // Distinct string with a colliding hash; probe onward.
                    key = key.wrapping_add(1);
                }
            }
        }
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    /// True when the live-byte estimate has outgrown the collection
    /// threshold, or when the next allocation would force the arena to grow.
    pub fn should_collect_garbage(&self) -> bool {
        self.bytes_allocated > self.bytes_until_gc || self.objects.needs_growth()
    }

    /// Synchronous stop-the-world mark-sweep. `roots` is the gray worklist
    /// seed: the caller supplies every value reachable from its own state
    /// (VM stack, globals, frames, open upvalues, in-flight compiler chain).
    pub fn collect_garbage(&mut self, roots: VecDeque<Value>) {
        debug_log!(self.is_debug, "-- gc begin ({} roots)", roots.len());

        self.trace_references(roots);

        // Interning entries are weak references; purge the dead ones before
        // their slots are reused.
        self.strings.sweep(&self.objects);

        let mut dead: Vec<ObjHandle> = Vec::new();
        for (handle, object) in self.objects.iter_mut() {
            if object.is_marked {
                object.is_marked = false;
            } else {
                dead.push(handle);
            }
        }

        for handle in dead {
            self.free(handle);
        }

        self.objects.recompute_fragmentation();

        // Per-object estimates drift as objects grow after allocation;
        // re-measure the survivors so the next threshold is grounded.
        self.bytes_allocated = self
            .objects
            .iter()
            .map(|(_, object)| object.size_estimate())
            .sum();
        self.bytes_until_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;

        debug_log!(
            self.is_debug,
            "-- gc end ({} bytes live, next at {})",
            self.bytes_allocated,
            self.bytes_until_gc
        );
    }

    fn trace_references(&mut self, mut gray_list: VecDeque<Value>) {
        while let Some(value) = gray_list.pop_front() {
            let Some(handle) = value.as_object() else {
                continue;
            };
            self.blacken(handle, &mut gray_list);
        }
    }

    /// Marks one object and queues everything it references. Already-marked
    /// objects are not re-queued, which keeps cycles from looping forever.
    fn blacken(&mut self, handle: ObjHandle, gray_list: &mut VecDeque<Value>) {
        let Some(object) = self.objects.get_mut(handle) else {
            return;
        };
        if object.is_marked {
            return;
        }
        object.is_marked = true;
        debug_log!(self.is_debug, "Blackened object {}", handle);

        match &object.kind {
            ObjectKind::String(_) => (),
            ObjectKind::Function(function) => {
                if function.name != 0 {
                    gray_list.push_back(Value::object(function.name));
                }
                gray_list.extend(function.chunk.constants.iter().copied());
            }
            ObjectKind::Closure(closure) => {
                gray_list.push_back(Value::object(closure.function));
                for upvalue in &closure.upvalues {
                    if *upvalue != 0 {
                        gray_list.push_back(Value::object(*upvalue));
                    }
                }
            }
            ObjectKind::Upvalue(upvalue) => match upvalue {
                // An open upvalue aliases a live stack slot, and the stack is
                // itself a root set; only closed storage needs tracing.
                UpvalueObject::Open(_) => (),
                UpvalueObject::Closed(value) => gray_list.push_back(*value),
            },
            ObjectKind::Class(class) => {
                gray_list.push_back(Value::object(class.name));
                for (name, method) in &class.methods {
                    gray_list.push_back(Value::object(*name));
                    gray_list.push_back(*method);
                }
            }
            ObjectKind::Instance(instance) => {
                gray_list.push_back(Value::object(instance.class));
                for (name, value) in &instance.fields {
                    gray_list.push_back(Value::object(*name));
                    gray_list.push_back(*value);
                }
            }
            ObjectKind::BoundMethod(bound) => {
                gray_list.push_back(bound.receiver);
                gray_list.push_back(Value::object(bound.method));
            }
            ObjectKind::Native(native) => {
                gray_list.push_back(Value::object(native.name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_by_content() {
        let mut heap = ObjectHeap::new();

        let a = heap.intern("hello");
        let b = heap.intern("world");
        let c = heap.intern("hello");

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(&*heap.get_string(a).chars, "hello");
        assert_eq!(heap.string_count(), 2);
    }

    #[test]
    fn interned_equality_is_handle_equality() {
        let mut heap = ObjectHeap::new();

        let left = Value::object(heap.intern("answer"));
        let right = Value::object(heap.intern("answer"));

        assert_eq!(left, right);
    }

    #[test]
    fn unreachable_objects_are_swept() {
        let mut heap = ObjectHeap::new();

        let keep = heap.intern("keep");
        let _drop1 = heap.intern("drop me");
        let _drop2 = heap.allocate(ObjectKind::Function(FunctionObject::new(0, 0)));
        assert_eq!(heap.object_count(), 3);

        let roots = VecDeque::from([Value::object(keep)]);
        heap.collect_garbage(roots);

        assert_eq!(heap.object_count(), 1);
        assert_eq!(&*heap.get_string(keep).chars, "keep");
    }

    #[test]
    fn swept_strings_leave_the_intern_table() {
        let mut heap = ObjectHeap::new();

        heap.intern("transient");
        heap.collect_garbage(VecDeque::new());
        assert_eq!(heap.string_count(), 0);

        // Re-interning after the sweep must produce a live string again.
        let revived = heap.intern("transient");
        assert_eq!(&*heap.get_string(revived).chars, "transient");
    }

    #[test]
    fn closures_keep_functions_and_upvalues_alive() {
        let mut heap = ObjectHeap::new();

        let name = heap.intern("f");
        let function = heap.allocate(ObjectKind::Function(FunctionObject::new(name, 0)));
        let captured = heap.intern("captured");
        let upvalue = heap.allocate(ObjectKind::Upvalue(UpvalueObject::Closed(Value::object(
            captured,
        ))));
        let closure = heap.allocate(ObjectKind::Closure(ClosureObject {
            function,
            upvalues: vec![upvalue],
        }));

        heap.collect_garbage(VecDeque::from([Value::object(closure)]));

        assert!(heap.contains(closure));
        assert!(heap.contains(function));
        assert!(heap.contains(upvalue));
        assert!(heap.contains(captured));
        assert!(heap.contains(name));
    }

    #[test]
    fn instances_keep_class_methods_and_fields_alive() {
        let mut heap = ObjectHeap::new();

        let class_name = heap.intern("Point");
        let class = heap.allocate(ObjectKind::Class(ClassObject::new(class_name)));
        let field_name = heap.intern("x");
        let field_value = heap.intern("field value");

        let instance = heap.allocate(ObjectKind::Instance(InstanceObject::new(class)));
        heap.get_instance_mut(instance)
            .fields
            .insert(field_name, Value::object(field_value));

        heap.collect_garbage(VecDeque::from([Value::object(instance)]));

        for handle in [instance, class, class_name, field_name, field_value] {
            assert!(heap.contains(handle));
        }
    }

    #[test]
    fn cycles_do_not_hang_the_collector() {
        let mut heap = ObjectHeap::new();

        let class_name = heap.intern("Node");
        let class = heap.allocate(ObjectKind::Class(ClassObject::new(class_name)));
        let a = heap.allocate(ObjectKind::Instance(InstanceObject::new(class)));
        let b = heap.allocate(ObjectKind::Instance(InstanceObject::new(class)));

        let next = heap.intern("next");
        heap.get_instance_mut(a).fields.insert(next, Value::object(b));
        heap.get_instance_mut(b).fields.insert(next, Value::object(a));

        heap.collect_garbage(VecDeque::from([Value::object(a)]));
        assert!(heap.contains(a));
        assert!(heap.contains(b));

        // Drop the cycle entirely; both instances must be reclaimed.
        heap.collect_garbage(VecDeque::new());
        assert!(!heap.contains(a));
        assert!(!heap.contains(b));
    }
}
