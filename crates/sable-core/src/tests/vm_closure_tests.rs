use crate::tests::run_source;

#[test]
fn closure_counter_shares_its_upvalue_across_calls() {
    let source = r#"
        fun make() {
            var i = 0;
            fun inc() {
                i = i + 1;
                return i;
            }
            return inc;
        }
        var c = make();
        print c();
        print c();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["1", "2"]);
}

#[test]
fn two_closures_share_one_captured_variable() {
    let source = r#"
        fun make() {
            var value = 0;
            fun set(v) { value = v; }
            fun get() { return value; }
            set(10);
            print get();
            return get;
        }
        var get = make();
        print get();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["10", "10"]);
}

#[test]
fn upvalues_close_when_their_scope_ends() {
    let source = r#"
        var closure;
        {
            var local = "captured";
            fun reader() { return local; }
            closure = reader;
        }
        print closure();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["captured"]);
}

#[test]
fn closed_upvalues_are_independent_per_invocation() {
    let source = r#"
        fun make(start) {
            fun inc() {
                start = start + 1;
                return start;
            }
            return inc;
        }
        var a = make(0);
        var b = make(100);
        print a();
        print b();
        print a();
        print b();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["1", "101", "2", "102"]);
}

#[test]
fn transitive_capture_reaches_through_two_levels() {
    let source = r#"
        fun outer() {
            var x = "outer value";
            fun middle() {
                fun inner() {
                    return x;
                }
                return inner;
            }
            return middle();
        }
        print outer()();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["outer value"]);
}

#[test]
fn assignment_through_an_open_upvalue_writes_the_stack_slot() {
    let source = r#"
        fun main() {
            var state = "before";
            fun update() { state = "after"; }
            update();
            print state;
        }
        main();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["after"]);
}

#[test]
fn sibling_closures_capturing_the_same_block_local_share_it() {
    let source = r#"
        var first;
        var second;
        {
            var shared = 0;
            fun bump() { shared = shared + 1; return shared; }
            fun read() { return shared; }
            first = bump;
            second = read;
        }
        first();
        first();
        print second();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["2"]);
}

#[test]
fn loop_body_closures_capture_distinct_iteration_scopes() {
    let source = r#"
        var a;
        var b;
        var i = 0;
        while (i < 2) {
            var captured = i;
            fun reader() { return captured; }
            if (i == 0) a = reader; else b = reader;
            i = i + 1;
        }
        print a();
        print b();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["0", "1"]);
}
