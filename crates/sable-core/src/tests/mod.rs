pub mod compiler_error_tests;
pub mod gc_tests;
pub mod parser_tests;
pub mod vm_class_tests;
pub mod vm_closure_tests;
pub mod vm_tests;

use crate::{
    CompilerPipeline, ObjectHeap, SableCompilerError, SableRuntimeError, SourceMap, Vm,
};

/// Compiles and runs `source`, panicking on any compile or runtime error.
/// Returns the finished VM and everything the program printed.
pub fn run_source(source: &str) -> (Vm, Vec<String>) {
    run_source_with_heap(source, ObjectHeap::new())
}

/// Same as `run_source` but with an aggressively low collection threshold,
/// so the GC fires throughout the run.
pub fn run_source_gc_stressed(source: &str) -> (Vm, Vec<String>) {
    run_source_with_heap(source, ObjectHeap::new().set_bytes_until_gc(1))
}

fn run_source_with_heap(source: &str, mut heap: ObjectHeap) -> (Vm, Vec<String>) {
    let source_map = SourceMap::from_source(source.to_string());

    let program = match CompilerPipeline::new(source_map, &mut heap).run() {
        Ok(program) => program,
        Err(errors) => {
            for error in errors.all() {
                eprintln!("{}", error);
            }
            panic!("Unexpected compile errors.");
        }
    };

    let mut vm = Vm::new(heap).capture_output();
    match vm.interpret(program) {
        Ok(()) => {
            let output = vm.take_output();
            (vm, output)
        }
        Err(error) => panic!("Unexpected runtime error: {}", error),
    }
}

/// Compiles and runs `source`, expecting a runtime error.
pub fn expect_runtime_error(source: &str) -> SableRuntimeError {
    let source_map = SourceMap::from_source(source.to_string());
    let mut heap = ObjectHeap::new();

    let program = match CompilerPipeline::new(source_map, &mut heap).run() {
        Ok(program) => program,
        Err(errors) => {
            for error in errors.all() {
                eprintln!("{}", error);
            }
            panic!("Unexpected compile errors.");
        }
    };

    let mut vm = Vm::new(heap).capture_output();
    match vm.interpret(program) {
        Ok(()) => panic!("Expected a runtime error but the program completed."),
        Err(error) => error,
    }
}

/// Compiles `source`, expecting at least one accumulated diagnostic.
pub fn expect_compile_errors(source: &str) -> Vec<SableCompilerError> {
    let source_map = SourceMap::from_source(source.to_string());
    let mut heap = ObjectHeap::new();

    match CompilerPipeline::new(source_map, &mut heap).run() {
        Ok(_) => panic!("Expected compile errors but compilation succeeded."),
        Err(errors) => errors.into_errors(),
    }
}

pub fn assert_has_error(errors: &[SableCompilerError], expected_message: &str) {
    assert!(
        errors.iter().any(|e| e.message.contains(expected_message)),
        "Expected error containing '{}' but got: {:?}",
        expected_message,
        errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>()
    );
}
