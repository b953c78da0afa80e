use crate::tests::{assert_has_error, expect_compile_errors, run_source};

#[test]
fn duplicate_local_declaration_is_rejected() {
    let source = r#"
        {
            var twice = 1;
            var twice = 2;
        }
    "#;
    let errors = expect_compile_errors(source);
    assert_has_error(&errors, "Variable with this name already declared in this scope.");
}

#[test]
fn shadowing_in_an_inner_block_is_allowed() {
    let source = r#"
        {
            var name = "outer";
            {
                var name = "inner";
                print name;
            }
        }
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["inner"]);
}

#[test]
fn reading_a_local_in_its_own_initializer_is_rejected() {
    let source = r#"
        var a = "outer";
        {
            var a = a;
        }
    "#;
    let errors = expect_compile_errors(source);
    assert_has_error(&errors, "Cannot read local variable in its own initializer.");
}

#[test]
fn return_at_top_level_is_rejected() {
    let errors = expect_compile_errors("return 1;");
    assert_has_error(&errors, "Cannot return from top-level code.");
}

#[test]
fn returning_a_value_from_an_initializer_is_rejected() {
    let source = r#"
        class Broken {
            init() { return 7; }
        }
    "#;
    let errors = expect_compile_errors(source);
    assert_has_error(&errors, "Cannot return a value from an initializer.");
}

#[test]
fn bare_return_in_an_initializer_is_allowed() {
    let source = r#"
        class Fine {
            init() { return; }
        }
        Fine();
    "#;
    run_source(source);
}

#[test]
fn this_outside_a_class_is_rejected() {
    let errors = expect_compile_errors("print this;");
    assert_has_error(&errors, "Cannot use 'this' outside of a class.");

    let errors = expect_compile_errors("fun f() { return this; }");
    assert_has_error(&errors, "Cannot use 'this' outside of a class.");
}

#[test]
fn super_outside_a_class_is_rejected() {
    let errors = expect_compile_errors("print super.method;");
    assert_has_error(&errors, "Cannot use 'super' outside of a class.");
}

#[test]
fn super_in_a_class_without_a_superclass_is_rejected() {
    let source = r#"
        class Orphan {
            method() { return super.method(); }
        }
    "#;
    let errors = expect_compile_errors(source);
    assert_has_error(&errors, "Cannot use 'super' in a class with no superclass.");
}

#[test]
fn a_class_cannot_inherit_from_itself() {
    let errors = expect_compile_errors("class Loop < Loop {}");
    assert_has_error(&errors, "A class cannot inherit from itself.");
}

#[test]
fn invalid_assignment_target_is_rejected() {
    let errors = expect_compile_errors("1 + 2 = 3;");
    assert_has_error(&errors, "Invalid assignment target.");
}

#[test]
fn the_256th_local_variable_is_rejected() {
    // Slot 0 is reserved, so locals 1..=255 fit and number 256 overflows.
    let mut source = String::from("{\n");
    for i in 0..256 {
        source.push_str(&format!("var local_{} = {};\n", i, i));
    }
    source.push_str("}\n");

    let errors = expect_compile_errors(&source);
    assert_has_error(&errors, "Too many local variables in function.");
}

#[test]
fn two_hundred_fifty_five_locals_are_accepted() {
    let mut source = String::from("{\n");
    for i in 0..255 {
        source.push_str(&format!("var local_{} = {};\n", i, i));
    }
    source.push_str("}\n");

    run_source(&source);
}

#[test]
fn more_than_255_arguments_are_rejected() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("fun f() {{}} f({});", args.join(", "));

    let errors = expect_compile_errors(&source);
    assert_has_error(&errors, "Cannot have more than 255 arguments.");
}

#[test]
fn more_than_255_parameters_are_rejected() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));

    let errors = expect_compile_errors(&source);
    assert_has_error(&errors, "Cannot have more than 255 parameters.");
}

#[test]
fn overflowing_the_constant_pool_is_rejected() {
    // Constants are deduplicated, so 300 distinct numbers are needed to
    // overflow the 256-entry pool.
    let mut source = String::new();
    for i in 0..300 {
        source.push_str(&format!("print {}.5;\n", i));
    }

    let errors = expect_compile_errors(&source);
    assert_has_error(&errors, "Too many constants in one chunk.");
}

#[test]
fn a_jump_distance_over_u16_max_is_rejected() {
    // Each assignment statement emits well over eight bytes, so ten
    // thousand of them inside one then-branch overflow the 16-bit offset.
    let mut source = String::from("var x = 0;\nif (true) {\n");
    for _ in 0..10000 {
        source.push_str("x = x + 1;\n");
    }
    source.push_str("}\n");

    let errors = expect_compile_errors(&source);
    assert_has_error(&errors, "Too much code to jump over.");
}

#[test]
fn an_oversized_loop_body_is_rejected() {
    let mut source = String::from("var x = 0;\nwhile (x < 1) {\n");
    for _ in 0..10000 {
        source.push_str("x = x + 1;\n");
    }
    source.push_str("}\n");

    let errors = expect_compile_errors(&source);
    assert_has_error(&errors, "Loop body too large.");
}

#[test]
fn multiple_errors_are_accumulated_in_one_pass() {
    let source = r#"
        return 1;
        print this;
        {
            var dup = 1;
            var dup = 2;
        }
    "#;
    let errors = expect_compile_errors(source);
    assert!(errors.len() >= 3, "expected 3+ errors, got {}", errors.len());
    assert_has_error(&errors, "Cannot return from top-level code.");
    assert_has_error(&errors, "Cannot use 'this' outside of a class.");
    assert_has_error(&errors, "Variable with this name already declared in this scope.");
}
