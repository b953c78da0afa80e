use crate::{Parser, SourceMap, ast};

fn parse(source: &str) -> (ast::Program, crate::ErrorReporter) {
    let source_map = SourceMap::from_source(source.to_string());
    let mut parser = Parser::new(&source_map);
    let program = parser.parse();
    (program, parser.into_reporter())
}

#[test]
fn parses_a_variable_declaration() {
    let (program, errors) = parse("var answer = 42;");
    assert!(!errors.has_errors());
    assert_eq!(program.decls.len(), 1);

    match &program.decls[0] {
        ast::Decl::Variable(var_decl) => {
            assert_eq!(&*var_decl.name.name, "answer");
            assert!(matches!(
                &var_decl.initializer,
                Some(ast::Expr::Number(ast::NumberLiteral { value, .. })) if *value == 42.0
            ));
        }
        other => panic!("expected variable declaration, got {:?}", other),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let (program, errors) = parse("1 + 2 * 3;");
    assert!(!errors.has_errors());

    let ast::Decl::Stmt(stmt) = &program.decls[0] else {
        panic!("expected statement");
    };
    let ast::Stmt::Expr(expr_stmt) = stmt.as_ref() else {
        panic!("expected expression statement");
    };
    let ast::Expr::Term(term) = &expr_stmt.expr else {
        panic!("expected the addition at the root");
    };
    assert!(matches!(*term.right, ast::Expr::Factor(_)));
}

#[test]
fn parses_class_with_superclass_and_methods() {
    let (program, errors) = parse(
        r#"
        class Dog < Animal {
            init(name) { this.name = name; }
            speak() { return "woof"; }
        }
    "#,
    );
    assert!(!errors.has_errors());

    let ast::Decl::Class(class_decl) = &program.decls[0] else {
        panic!("expected class declaration");
    };
    assert_eq!(&*class_decl.name.name, "Dog");
    assert_eq!(
        class_decl.superclass.as_ref().map(|s| &*s.name),
        Some("Animal")
    );
    assert_eq!(class_decl.methods.len(), 2);
}

#[test]
fn for_loop_clauses_are_all_optional() {
    let (program, errors) = parse("for (;;) {}");
    assert!(!errors.has_errors());

    let ast::Decl::Stmt(stmt) = &program.decls[0] else {
        panic!("expected statement");
    };
    let ast::Stmt::For(for_stmt) = stmt.as_ref() else {
        panic!("expected for statement");
    };
    assert!(for_stmt.initializer.is_none());
    assert!(for_stmt.condition.is_none());
    assert!(for_stmt.increment.is_none());
}

#[test]
fn property_calls_nest_left_to_right() {
    let (program, errors) = parse("object.first().second;");
    assert!(!errors.has_errors());

    let ast::Decl::Stmt(stmt) = &program.decls[0] else {
        panic!("expected statement");
    };
    let ast::Stmt::Expr(expr_stmt) = stmt.as_ref() else {
        panic!("expected expression statement");
    };
    let ast::Expr::Property(outer) = &expr_stmt.expr else {
        panic!("expected outer property access");
    };
    assert_eq!(&*outer.name.name, "second");
    assert!(matches!(*outer.object, ast::Expr::Call(_)));
}

#[test]
fn missing_semicolon_is_reported() {
    let (_, errors) = parse("var x = 1");
    assert!(errors.has_errors());
    assert!(
        errors
            .errors()
            .iter()
            .any(|e| e.message.contains("Expect ';' after variable declaration."))
    );
}

#[test]
fn parser_recovers_and_reports_multiple_errors() {
    let source = r#"
        var = 1;
        print 2;
        var y 3;
    "#;
    let (program, errors) = parse(source);

    assert!(errors.errors().len() >= 2);
    // The statement between the two bad declarations still parsed.
    assert!(
        program
            .decls
            .iter()
            .any(|decl| matches!(decl, ast::Decl::Stmt(stmt) if matches!(stmt.as_ref(), ast::Stmt::Print(_))))
    );
}

#[test]
fn spans_cover_their_source_text() {
    let source = "var spanned = 1;";
    let (program, errors) = parse(source);
    assert!(!errors.has_errors());

    let span = program.decls[0].span();
    assert_eq!(span.start, 0);
    assert_eq!(span.end, source.len());
}
