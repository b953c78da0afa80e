use crate::tests::{expect_runtime_error, run_source};

#[test]
fn instances_store_and_read_fields() {
    let source = r#"
        class Box {}
        var box = Box();
        box.contents = "treasure";
        print box.contents;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["treasure"]);
}

#[test]
fn methods_bind_this_to_the_receiver() {
    let source = r#"
        class Greeter {
            greet() {
                return "hello, " + this.name;
            }
        }
        var g = Greeter();
        g.name = "world";
        print g.greet();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["hello, world"]);
}

#[test]
fn initializer_runs_and_returns_the_receiver() {
    let source = r#"
        class Point {
            init(x, y) {
                this.x = x;
                this.y = y;
            }
        }
        var p = Point(3, 4);
        print p.x + p.y;
        print Point(1, 2);
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["7", "Point instance"]);
}

#[test]
fn early_return_in_initializer_still_yields_the_receiver() {
    let source = r#"
        class Guard {
            init(flag) {
                if (flag) return;
                this.touched = true;
            }
        }
        print Guard(true);
        var g = Guard(false);
        print g.touched;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["Guard instance", "true"]);
}

#[test]
fn class_values_print_by_name() {
    let source = r#"
        class Widget {}
        print Widget;
        print Widget();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["Widget", "Widget instance"]);
}

#[test]
fn calling_a_class_with_arguments_but_no_initializer_fails() {
    let error = expect_runtime_error("class Empty {} Empty(1);");
    assert!(error.message.contains("Expected 0 arguments but got 1."));
}

#[test]
fn initializer_arity_is_enforced() {
    let source = r#"
        class Pair { init(a, b) {} }
        Pair(1);
    "#;
    let error = expect_runtime_error(source);
    assert!(error.message.contains("Expected 2 arguments but got 1."));
}

#[test]
fn bound_methods_remember_their_receiver() {
    let source = r#"
        class Counter {
            init() { this.count = 0; }
            bump() {
                this.count = this.count + 1;
                return this.count;
            }
        }
        var counter = Counter();
        var bump = counter.bump;
        bump();
        bump();
        print counter.count;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["2"]);
}

#[test]
fn fields_shadow_methods() {
    let source = r#"
        class Thing {
            label() { return "method"; }
        }
        var t = Thing();
        print t.label();
        fun replacement() { return "field"; }
        t.label = replacement;
        print t.label();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["method", "field"]);
}

#[test]
fn methods_call_each_other_through_this() {
    let source = r#"
        class Chain {
            first() { return this.second(); }
            second() { return "end of chain"; }
        }
        print Chain().first();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["end of chain"]);
}

#[test]
fn subclasses_inherit_methods() {
    let source = r#"
        class Animal {
            speak() { return "..."; }
        }
        class Dog < Animal {}
        print Dog().speak();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["..."]);
}

#[test]
fn overriding_replaces_the_inherited_method() {
    let source = r#"
        class Animal {
            speak() { return "..."; }
        }
        class Dog < Animal {
            speak() { return "woof"; }
        }
        print Dog().speak();
        print Animal().speak();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["woof", "..."]);
}

#[test]
fn super_dispatches_to_the_superclass_after_an_override() {
    let source = r#"
        class A {
            method() { return "A.method"; }
        }
        class B < A {
            method() { return "B.method"; }
            test() { return super.method(); }
        }
        print B().test();
        print B().method();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["A.method", "B.method"]);
}

#[test]
fn super_works_through_a_second_level_of_inheritance() {
    let source = r#"
        class A {
            describe() { return "A"; }
        }
        class B < A {
            describe() { return "B then " + super.describe(); }
        }
        class C < B {
            describe() { return "C then " + super.describe(); }
        }
        print C().describe();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["C then B then A"]);
}

#[test]
fn super_method_reference_without_a_call_binds_this() {
    let source = r#"
        class A {
            name() { return this.label; }
        }
        class B < A {
            name() { return "overridden"; }
            original() {
                var method = super.name;
                return method();
            }
        }
        var b = B();
        b.label = "from A";
        print b.original();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["from A"]);
}

#[test]
fn inherited_initializer_runs_for_the_subclass() {
    let source = r#"
        class Base {
            init(value) { this.value = value; }
        }
        class Derived < Base {}
        print Derived(9).value;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["9"]);
}

#[test]
fn subclass_initializer_can_delegate_through_super() {
    let source = r#"
        class Base {
            init(value) { this.value = value; }
        }
        class Derived < Base {
            init(value) {
                super.init(value * 2);
            }
        }
        print Derived(21).value;
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["42"]);
}

#[test]
fn reading_an_undefined_property_is_a_runtime_error() {
    let error = expect_runtime_error("class Empty {} print Empty().missing;");
    assert!(error.message.contains("Undefined property 'missing'."));
}

#[test]
fn invoking_an_undefined_method_is_a_runtime_error() {
    let error = expect_runtime_error("class Empty {} Empty().missing();");
    assert!(error.message.contains("Undefined property 'missing'."));
}

#[test]
fn property_access_on_non_instances_is_a_runtime_error() {
    let error = expect_runtime_error("var x = 3; print x.field;");
    assert!(error.message.contains("Only instances have properties."));

    let error = expect_runtime_error(r#"var s = "text"; s.field = 1;"#);
    assert!(error.message.contains("Only instances have fields."));
}

#[test]
fn method_invocation_on_non_instances_is_a_runtime_error() {
    let error = expect_runtime_error("var x = 3; x.method();");
    assert!(error.message.contains("Only instances have methods."));
}

#[test]
fn inheriting_from_a_non_class_is_a_runtime_error() {
    let error = expect_runtime_error("var NotAClass = 7; class Sub < NotAClass {}");
    assert!(error.message.contains("Superclass must be a class."));
}

#[test]
fn invoke_path_calls_a_callable_field() {
    let source = r#"
        class Holder {}
        fun handler() { return "called the field"; }
        var h = Holder();
        h.callback = handler;
        print h.callback();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["called the field"]);
}

#[test]
fn classes_declared_in_local_scope_work() {
    let source = r#"
        fun build() {
            class Local {
                tag() { return "local class"; }
            }
            return Local();
        }
        print build().tag();
    "#;
    let (_, output) = run_source(source);
    assert_eq!(output, vec!["local class"]);
}
