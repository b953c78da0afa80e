use crate::tests::{expect_runtime_error, run_source};

#[test]
fn prints_arithmetic_result() {
    let (_, output) = run_source("print 1 + 2;");
    assert_eq!(output, vec!["3"]);
}

#[test]
fn arithmetic_follows_precedence() {
    let (_, output) = run_source("print 1 + 2 * 3 - 4 / 2;");
    assert_eq!(output, vec!["5"]);

    let (_, output) = run_source("print (1 + 2) * 3;");
    assert_eq!(output, vec!["9"]);
}

#[test]
fn division_follows_ieee_754() {
    let (_, output) = run_source("print 1 / 0;");
    assert_eq!(output, vec!["inf"]);

    let (_, output) = run_source("print -1 / 0;");
    assert_eq!(output, vec!["-inf"]);

    let (_, output) = run_source("print 0 / 0;");
    assert_eq!(output, vec!["NaN"]);
}

#[test]
fn block_scoped_shadowing() {
    let source = r#"
        var a = 1;
        {
            var a = 2;
            print a;
        }
        print a;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["2", "1"]);
}

#[test]
fn globals_define_and_assign() {
    let source = r#"
        var answer = 3.14;
        print answer;
        answer = 42;
        print answer;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["3.14", "42"]);
}

#[test]
fn global_state_is_observable_after_the_run() {
    let (mut vm, _) = run_source("var total = 6 * 7;");
    let total = vm.get_global("total").expect("total should be defined");
    assert_eq!(total.as_number(), Some(42.0));
}

#[test]
fn string_concatenation() {
    let source = r#"
        var greeting = "hello" + " " + "world";
        print greeting;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["hello world"]);
}

#[test]
fn equality_semantics() {
    let source = r#"
        print 1 == 1;
        print 1 == 2;
        print "a" + "b" == "ab";
        print nil == nil;
        print nil == false;
        print true == true;
        print 1 != 2;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(
        output,
        vec!["true", "false", "true", "true", "false", "true", "true"]
    );
}

#[test]
fn comparison_operators() {
    let source = r#"
        print 1 < 2;
        print 2 <= 2;
        print 3 > 4;
        print 4 >= 5;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["true", "true", "false", "false"]);
}

#[test]
fn truthiness_treats_only_nil_and_false_as_false() {
    let source = r#"
        if (0) print "zero is truthy";
        if ("") print "empty string is truthy";
        if (nil) print "unreachable"; else print "nil is falsey";
        if (false) print "unreachable"; else print "false is falsey";
    "#;
    let (_, output) = run_source(source);
    assert_eq!(
        output,
        vec![
            "zero is truthy",
            "empty string is truthy",
            "nil is falsey",
            "false is falsey"
        ]
    );
}

#[test]
fn logical_operators_short_circuit() {
    let source = r#"
        print true and "right";
        print false and "skipped";
        print nil or "fallback";
        print "left" or "skipped";
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["right", "false", "fallback", "left"]);
}

#[test]
fn unary_operators() {
    let source = r#"
        print -3;
        print --3;
        print !true;
        print !nil;
        print !0;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["-3", "3", "false", "true", "false"]);
}

#[test]
fn while_loop_accumulates() {
    let source = r#"
        var sum = 0;
        var i = 1;
        while (i <= 10) {
            sum = sum + i;
            i = i + 1;
        }
        print sum;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["55"]);
}

#[test]
fn for_loop_desugars_to_while() {
    let source = r#"
        var product = 1;
        for (var i = 1; i <= 5; i = i + 1) {
            product = product * i;
        }
        print product;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["120"]);
}

#[test]
fn if_else_branches() {
    let source = r#"
        if (1 < 2) print "then"; else print "else";
        if (1 > 2) print "then"; else print "else";
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["then", "else"]);
}

#[test]
fn function_calls_and_returns() {
    let source = r#"
        fun add(a, b) {
            return a + b;
        }
        print add(1, 2);
        print add("foo", "bar");
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["3", "foobar"]);
}

#[test]
fn recursion_works() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(12);
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["144"]);
}

#[test]
fn function_values_print_by_name() {
    let source = r#"
        fun greet() {}
        print greet;
        print clock;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["<fn greet>", "<native fn>"]);
}

#[test]
fn clock_native_returns_a_number() {
    let (_, output) = run_source("print clock() > 0;");
    assert_eq!(output, vec!["true"]);
}

#[test]
fn reading_an_undefined_global_is_a_runtime_error() {
    let error = expect_runtime_error("print missing;");
    assert!(error.message.contains("Undefined variable 'missing'."));
}

#[test]
fn assigning_an_undefined_global_is_a_runtime_error() {
    let error = expect_runtime_error("missing = 1;");
    assert!(error.message.contains("Undefined variable 'missing'."));
}

#[test]
fn subtracting_a_number_from_a_string_is_a_runtime_error() {
    let error = expect_runtime_error(r#"var x = "a" - 1;"#);
    assert!(error.message.contains("Operands must be numbers."));
}

#[test]
fn adding_mismatched_operands_is_a_runtime_error() {
    let error = expect_runtime_error(r#"var x = "a" + 1;"#);
    assert!(
        error
            .message
            .contains("Operands must be two numbers or two strings.")
    );
}

#[test]
fn negating_a_string_is_a_runtime_error() {
    let error = expect_runtime_error(r#"var x = -"a";"#);
    assert!(error.message.contains("Operand must be a number."));
}

#[test]
fn calling_a_number_is_a_runtime_error() {
    let error = expect_runtime_error("var x = 7; x();");
    assert!(error.message.contains("Can only call functions and classes."));
}

#[test]
fn wrong_arity_is_a_runtime_error() {
    let error = expect_runtime_error("fun one(a) {} one(1, 2);");
    assert!(error.message.contains("Expected 1 arguments but got 2."));
}

#[test]
fn unbounded_recursion_overflows_the_frame_stack() {
    let error = expect_runtime_error("fun f() { f(); } f();");
    assert!(error.message.contains("Stack overflow."));
}

#[test]
fn runtime_errors_carry_a_stack_trace() {
    let source = r#"
        fun inner() { return 1 - "one"; }
        fun outer() { return inner(); }
        outer();
    "#;
    let error = expect_runtime_error(source);
    let trace = error.to_string();
    assert!(trace.contains("<fn inner>"));
    assert!(trace.contains("<fn outer>"));
    assert!(trace.contains("<script>"));
}

#[test]
fn runtime_error_reports_the_failing_line() {
    let error = expect_runtime_error("var a = 1;\nvar b = a + nil;");
    assert!(error.message.contains("line 2"));
}
