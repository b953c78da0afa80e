use crate::{ErrorReporter, tokenizer::Token};

/// Represents a position in the source code for error reporting and debugging
#[derive(Debug, Clone, PartialEq, Default, Copy)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn from_token(token: &Token) -> Self {
        Self {
            start: token.start,
            end: token.end,
        }
    }

    pub fn combine(start: SourceSpan, end: SourceSpan) -> Self {
        Self {
            start: start.start,
            end: end.end,
        }
    }
}

/// Root AST node representing a complete program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub span: SourceSpan,
}

/// Top-level declarations
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Class(ClassDecl),
    Function(FunctionDecl),
    Variable(VariableDecl),
    Stmt(Box<Stmt>),
}

impl Decl {
    pub fn span(&self) -> SourceSpan {
        match self {
            Decl::Class(decl) => decl.span,
            Decl::Function(decl) => decl.span,
            Decl::Variable(decl) => decl.span,
            Decl::Stmt(stmt) => stmt.span(),
        }
    }
}

/// Class declaration: class IDENTIFIER ( < IDENTIFIER )? { method* }
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Identifier,
    pub superclass: Option<Identifier>,
    pub methods: Vec<FunctionExpr>,
    pub span: SourceSpan,
}

/// Function declaration: fun function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub function: FunctionExpr,
    pub span: SourceSpan,
}

/// Function expression: IDENTIFIER ( parameters? ) block
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub name: Identifier,
    pub parameters: Vec<Identifier>,
    pub body: BlockStmt,
    pub span: SourceSpan,
}

/// Variable declaration: var IDENTIFIER ( = expression )? ;
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: Identifier,
    pub initializer: Option<Expr>,
    pub span: SourceSpan,
}

/// All possible statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(ExprStmt),
    Print(PrintStmt),
    Block(BlockStmt),
    If(IfStmt),
    While(WhileStmt),
    For(Box<ForStmt>),
    Return(ReturnStmt),
}

impl Stmt {
    pub fn span(&self) -> SourceSpan {
        match self {
            Stmt::Expr(stmt) => stmt.span,
            Stmt::Print(stmt) => stmt.span,
            Stmt::Block(stmt) => stmt.span,
            Stmt::If(stmt) => stmt.span,
            Stmt::While(stmt) => stmt.span,
            Stmt::For(stmt) => stmt.span,
            Stmt::Return(stmt) => stmt.span,
        }
    }
}

/// Expression statement: expression ;
#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: SourceSpan,
}

/// Print statement: print expression ;
#[derive(Debug, Clone, PartialEq)]
pub struct PrintStmt {
    pub expr: Expr,
    pub span: SourceSpan,
}

/// Block statement: { declaration* }
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStmt {
    pub decls: Vec<Decl>,
    pub span: SourceSpan,
}

/// If statement: if ( expression ) statement ( else statement )?
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub span: SourceSpan,
}

/// While statement: while ( expression ) statement
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub span: SourceSpan,
}

/// For statement: for ( ( varDecl | exprStmt | ; ) expression? ; expression? ) statement
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub initializer: Option<ForInitializer>,
    pub condition: Option<Expr>,
    pub increment: Option<Expr>,
    pub body: Box<Stmt>,
    pub span: SourceSpan,
}

/// Initializer for a for loop
#[derive(Debug, Clone, PartialEq)]
pub enum ForInitializer {
    Variable(VariableDecl),
    Expr(Expr),
}

/// Return statement: return expression? ;
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: SourceSpan,
}

/// All possible expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Assignment(AssignmentExpr),
    LogicalOr(LogicalOrExpr),
    LogicalAnd(LogicalAndExpr),
    Equality(EqualityExpr),
    Comparison(ComparisonExpr),
    Term(TermExpr),
    Factor(FactorExpr),
    Unary(UnaryExpr),
    Call(CallExpr),
    Property(PropertyExpr),
    This(ThisExpr),
    Super(SuperExpr),
    Variable(Identifier),
    Number(NumberLiteral),
    String(StringLiteral),
    Boolean(BooleanLiteral),
    Nil(NilLiteral),
}

impl Expr {
    pub fn span(&self) -> SourceSpan {
        match self {
            Expr::Assignment(expr) => expr.span,
            Expr::LogicalOr(expr) => expr.span,
            Expr::LogicalAnd(expr) => expr.span,
            Expr::Equality(expr) => expr.span,
            Expr::Comparison(expr) => expr.span,
            Expr::Term(expr) => expr.span,
            Expr::Factor(expr) => expr.span,
            Expr::Unary(expr) => expr.span,
            Expr::Call(expr) => expr.span,
            Expr::Property(expr) => expr.span,
            Expr::This(expr) => expr.span,
            Expr::Super(expr) => expr.span,
            Expr::Variable(identifier) => identifier.span,
            Expr::Number(literal) => literal.span,
            Expr::String(literal) => literal.span,
            Expr::Boolean(literal) => literal.span,
            Expr::Nil(literal) => literal.span,
        }
    }
}

/// Assignment: target = expression
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExpr {
    pub target: AssignmentTarget,
    pub value: Box<Expr>,
    pub span: SourceSpan,
}

/// Valid assignment targets
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentTarget {
    Identifier(Identifier),
    Property(PropertyExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalOrExpr {
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalAndExpr {
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EqualityOperator {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EqualityExpr {
    pub left: Box<Expr>,
    pub operator: EqualityOperator,
    pub right: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonOperator {
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpr {
    pub left: Box<Expr>,
    pub operator: ComparisonOperator,
    pub right: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TermOperator {
    Add,
    Subtract,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermExpr {
    pub left: Box<Expr>,
    pub operator: TermOperator,
    pub right: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FactorOperator {
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorExpr {
    pub left: Box<Expr>,
    pub operator: FactorOperator,
    pub right: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Minus,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub operator: UnaryOperator,
    pub operand: Box<Expr>,
    pub span: SourceSpan,
}

/// Call: callee ( arguments? )
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub arguments: Vec<Expr>,
    pub span: SourceSpan,
}

/// Property access: object . IDENTIFIER
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyExpr {
    pub object: Box<Expr>,
    pub name: Identifier,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThisExpr {
    pub span: SourceSpan,
}

/// Superclass method reference: super . IDENTIFIER
#[derive(Debug, Clone, PartialEq)]
pub struct SuperExpr {
    pub method: Identifier,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: Box<str>,
    pub span: SourceSpan,
}

impl Identifier {
    pub fn new(name: Box<str>, span: SourceSpan) -> Self {
        Self { name, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    pub value: f64,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub value: Box<str>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanLiteral {
    pub value: bool,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NilLiteral {
    pub span: SourceSpan,
}

/// Walks an AST, dispatching each node to the matching visit method. The
/// dispatch methods have default implementations; implementors supply the
/// per-node behavior.
pub trait AstVisitor {
    type Error;

    fn visit_program(
        &mut self,
        program: &Program,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        for decl in &program.decls {
            self.visit_declaration(decl, errors)?;
        }
        Ok(())
    }

    fn visit_declaration(
        &mut self,
        decl: &Decl,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        match decl {
            Decl::Class(class_decl) => self.visit_class_declaration(class_decl, errors),
            Decl::Function(func_decl) => self.visit_function_declaration(func_decl, errors),
            Decl::Variable(var_decl) => self.visit_variable_declaration(var_decl, errors),
            Decl::Stmt(stmt) => self.visit_statement(stmt, errors),
        }
    }

    fn visit_statement(
        &mut self,
        stmt: &Stmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        match stmt {
            Stmt::Expr(expr_stmt) => self.visit_expression_statement(expr_stmt, errors),
            Stmt::Print(print_stmt) => self.visit_print_statement(print_stmt, errors),
            Stmt::Block(block_stmt) => self.visit_block_statement(block_stmt, errors),
            Stmt::If(if_stmt) => self.visit_if_statement(if_stmt, errors),
            Stmt::While(while_stmt) => self.visit_while_statement(while_stmt, errors),
            Stmt::For(for_stmt) => self.visit_for_statement(for_stmt, errors),
            Stmt::Return(return_stmt) => self.visit_return_statement(return_stmt, errors),
        }
    }

    fn visit_expression(
        &mut self,
        expr: &Expr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        match expr {
            Expr::Assignment(assignment) => self.visit_assignment_expression(assignment, errors),
            Expr::LogicalOr(logical_or) => self.visit_logical_or_expression(logical_or, errors),
            Expr::LogicalAnd(logical_and) => {
                self.visit_logical_and_expression(logical_and, errors)
            }
            Expr::Equality(equality) => self.visit_equality_expression(equality, errors),
            Expr::Comparison(comparison) => self.visit_comparison_expression(comparison, errors),
            Expr::Term(term) => self.visit_term_expression(term, errors),
            Expr::Factor(factor) => self.visit_factor_expression(factor, errors),
            Expr::Unary(unary) => self.visit_unary_expression(unary, errors),
            Expr::Call(call) => self.visit_call_expression(call, errors),
            Expr::Property(property) => self.visit_property_expression(property, errors),
            Expr::This(this_expr) => self.visit_this_expression(this_expr, errors),
            Expr::Super(super_expr) => self.visit_super_expression(super_expr, errors),
            Expr::Variable(identifier) => self.visit_identifier(identifier, errors),
            Expr::Number(number) => self.visit_number_literal(number, errors),
            Expr::String(string) => self.visit_string_literal(string, errors),
            Expr::Boolean(boolean) => self.visit_boolean_literal(boolean, errors),
            Expr::Nil(nil) => self.visit_nil_literal(nil, errors),
        }
    }

    fn visit_class_declaration(
        &mut self,
        class_decl: &ClassDecl,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_function_declaration(
        &mut self,
        func_decl: &FunctionDecl,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_variable_declaration(
        &mut self,
        var_decl: &VariableDecl,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_expression_statement(
        &mut self,
        expr_stmt: &ExprStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_print_statement(
        &mut self,
        print_stmt: &PrintStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_block_statement(
        &mut self,
        block_stmt: &BlockStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_if_statement(
        &mut self,
        if_stmt: &IfStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_while_statement(
        &mut self,
        while_stmt: &WhileStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_for_statement(
        &mut self,
        for_stmt: &ForStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_return_statement(
        &mut self,
        return_stmt: &ReturnStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_assignment_expression(
        &mut self,
        assignment: &AssignmentExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_logical_or_expression(
        &mut self,
        logical_or: &LogicalOrExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_logical_and_expression(
        &mut self,
        logical_and: &LogicalAndExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_equality_expression(
        &mut self,
        equality: &EqualityExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_comparison_expression(
        &mut self,
        comparison: &ComparisonExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_term_expression(
        &mut self,
        term: &TermExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_factor_expression(
        &mut self,
        factor: &FactorExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_unary_expression(
        &mut self,
        unary: &UnaryExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_call_expression(
        &mut self,
        call: &CallExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_property_expression(
        &mut self,
        property: &PropertyExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_this_expression(
        &mut self,
        this_expr: &ThisExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_super_expression(
        &mut self,
        super_expr: &SuperExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_identifier(
        &mut self,
        identifier: &Identifier,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_number_literal(
        &mut self,
        number: &NumberLiteral,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_string_literal(
        &mut self,
        string: &StringLiteral,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_boolean_literal(
        &mut self,
        boolean: &BooleanLiteral,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;

    fn visit_nil_literal(
        &mut self,
        nil: &NilLiteral,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error>;
}
