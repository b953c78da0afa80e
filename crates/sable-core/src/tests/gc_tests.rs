use std::collections::VecDeque;

use crate::tests::run_source_gc_stressed;
use crate::{CompilerPipeline, ObjectHeap, SourceMap, Value, Vm};

#[test]
fn gc_pressure_does_not_disturb_reachable_globals() {
    let source = r#"
        var kept = "start";
        var i = 0;
        while (i < 200) {
            kept = kept + "+";
            var transient = "garbage " + "string";
            i = i + 1;
        }
        print i;
        print kept == "start" + "+";
    "#;
    let (_, output) = run_source_gc_stressed(source);
    // 200 iterations appended 200 markers; a one-marker string must differ.
    assert_eq!(output, vec!["200", "false"]);
}

#[test]
fn values_captured_by_closures_survive_collection_cycles() {
    let source = r#"
        fun make() {
            var kept = "closure" + " " + "payload";
            fun read() { return kept; }
            return read;
        }
        var reader = make();
        var i = 0;
        while (i < 200) {
            var junk = "junk " + "junk";
            i = i + 1;
        }
        print reader();
    "#;
    let (_, output) = run_source_gc_stressed(source);
    assert_eq!(output, vec!["closure payload"]);
}

#[test]
fn instances_and_their_fields_survive_collection_cycles() {
    let source = r#"
        class Node {
            init(label) { this.label = label; }
        }
        var head = Node("head" + " " + "node");
        var i = 0;
        while (i < 200) {
            Node("transient " + "node");
            i = i + 1;
        }
        print head.label;
    "#;
    let (_, output) = run_source_gc_stressed(source);
    assert_eq!(output, vec!["head node"]);
}

#[test]
fn transient_strings_are_reclaimed() {
    let source = r#"
        var i = 0;
        while (i < 100) {
            var transient = "left" + " and " + "right";
            i = i + 1;
        }
    "#;
    let (mut vm, _) = run_source_gc_stressed(source);

    let before = vm.heap().object_count();
    vm.collect_garbage();
    let after = vm.heap().object_count();

    assert!(after <= before);
    // The concatenation products are unreachable once the run completes.
    let alive = vm.heap().string_count();
    vm.collect_garbage();
    assert!(vm.heap().string_count() <= alive);
}

#[test]
fn interning_still_deduplicates_after_a_sweep() {
    let source = r#"
        var i = 0;
        while (i < 50) {
            var tmp = "throwaway" + " text";
            i = i + 1;
        }
        var a = "sur" + "vivor";
        var b = "survi" + "vor";
        print a == b;
    "#;
    let (_, output) = run_source_gc_stressed(source);
    // Handle equality only holds if both concatenations interned to the
    // same live string object.
    assert_eq!(output, vec!["true"]);
}

#[test]
fn collection_during_compilation_keeps_in_flight_functions_alive() {
    let source = r#"
        fun outer() {
            fun middle() {
                fun inner() {
                    return "deeply " + "nested";
                }
                return inner;
            }
            return middle;
        }
        print outer()()();
    "#;

    let source_map = SourceMap::from_source(source.to_string());
    // A one-byte threshold forces a collection at every allocation point,
    // including the ones inside nested function compilation.
    let mut heap = ObjectHeap::new().set_bytes_until_gc(1);

    let program = CompilerPipeline::new(source_map, &mut heap)
        .run()
        .expect("compilation should survive constant collection pressure");

    let mut vm = Vm::new(heap).capture_output();
    vm.interpret(program).expect("program should run");
    assert_eq!(vm.take_output(), vec!["deeply nested"]);
}

#[test]
fn collect_with_no_roots_empties_the_heap() {
    let mut heap = ObjectHeap::new();
    for i in 0..64 {
        heap.intern(&format!("string number {}", i));
    }
    assert_eq!(heap.object_count(), 64);

    heap.collect_garbage(VecDeque::new());
    assert_eq!(heap.object_count(), 0);
    assert_eq!(heap.string_count(), 0);
}

#[test]
fn repeated_collections_are_stable() {
    let mut heap = ObjectHeap::new();
    let keep = heap.intern("keeper");

    for _ in 0..5 {
        heap.collect_garbage(VecDeque::from([Value::object(keep)]));
        assert!(heap.contains(keep));
        assert_eq!(&*heap.get_string(keep).chars, "keeper");
    }
}
