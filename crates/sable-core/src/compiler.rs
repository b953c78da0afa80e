use std::collections::VecDeque;

use crate::{
    ErrorReporter, SableCompilerError, SablePipelineError, SourceMap, Value,
    ast::{self, AstVisitor, SourceSpan},
    chunk::{Chunk, OpCode, SourceLocation},
    memory::{FunctionObject, ObjHandle, ObjectHeap, ObjectKind},
};

pub const FRAME_MAX: usize = 64;
pub const STACK_MAX: usize = FRAME_MAX * 256;

/// Locals per function, counting the reserved slot 0. Slot indices must fit
/// in the single operand byte of GET/SET_LOCAL.
const LOCAL_MAX: usize = u8::MAX as usize + 1;
const UPVALUE_MAX: usize = u8::MAX as usize + 1;

type CompileResult<T> = Result<T, SableCompilerError>;

/// Handle to a compiled top-level script function, ready for the VM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Program(ObjHandle);

impl Program {
    pub fn new(handle: ObjHandle) -> Self {
        Self(handle)
    }

    pub fn handle(&self) -> ObjHandle {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum FunctionKind {
    #[default]
    Script,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone)]
struct Local {
    name: Box<str>,
    /// Block depth once initialized; `None` between declaration and the end
    /// of the initializer expression.
    depth: Option<usize>,
    is_captured: bool,
}

impl Local {
    fn new(name: Box<str>) -> Self {
        Self {
            name,
            depth: None,
            is_captured: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct UpvalueDescriptor {
    index: u8,
    is_local: bool,
}

/// Per-function compile state. These form a stack that mirrors the lexical
/// nesting of function literals, innermost last.
#[derive(Debug, Default)]
struct Compiler {
    kind: FunctionKind,
    function: FunctionObject,
    locals: Vec<Local>,
    scope_depth: usize,
    upvalues: Vec<UpvalueDescriptor>,
}

impl Compiler {
    fn new(name: ObjHandle, arity: usize, kind: FunctionKind) -> Self {
        // Slot 0 belongs to the callee: the receiver inside methods, unnamed
        // (and unresolvable) everywhere else.
        let mut reserved = if matches!(kind, FunctionKind::Method | FunctionKind::Initializer) {
            Local::new("this".into())
        } else {
            Local::new("".into())
        };
        reserved.depth = Some(0);

        Self {
            kind,
            function: FunctionObject::new(name, arity),
            locals: vec![reserved],
            scope_depth: 0,
            upvalues: Vec::new(),
        }
    }
}

/// Tracks the innermost class declaration being compiled, for validating
/// `this`/`super` usage.
#[derive(Debug, Clone)]
struct ClassCompiler {
    #[allow(dead_code)]
    name: Box<str>,
    has_superclass: bool,
}

/// Single-pass bytecode compiler: walks the AST once, resolving variables
/// and emitting instructions as it goes, backpatching forward jumps.
/// Compilation never aborts on the first diagnosable error; errors are
/// accumulated and the result discarded if any occurred.
pub struct CompilerVisitor<'a> {
    source_map: &'a SourceMap,
    heap: &'a mut ObjectHeap,
    compilers: Vec<Compiler>,
    class_compilers: Vec<ClassCompiler>,
    /// Values owned by the caller that must survive compile-time
    /// collections, e.g. a REPL's live globals.
    extra_roots: Vec<Value>,
}

impl<'a> CompilerVisitor<'a> {
    pub fn new(source_map: &'a SourceMap, heap: &'a mut ObjectHeap) -> Self {
        Self {
            source_map,
            heap,
            compilers: vec![Compiler::new(0, 0, FunctionKind::Script)],
            class_compilers: Vec::new(),
            extra_roots: Vec::new(),
        }
    }

    pub fn with_roots(mut self, roots: impl IntoIterator<Item = Value>) -> Self {
        self.extra_roots.extend(roots);
        self
    }

    pub fn compile(
        mut self,
        program: &ast::Program,
        mut errors: ErrorReporter,
    ) -> Result<Program, SablePipelineError> {
        self.visit_program(program, &mut errors)
            .unwrap_or_else(|error| errors.report_error(error));

        self.emit_return(program.span);

        if errors.has_errors() {
            return Err(SablePipelineError::new(errors.take_errors()));
        }

        let script = self
            .compilers
            .pop()
            .expect("script compiler should remain on the stack")
            .function;
        let handle = self.heap.allocate(ObjectKind::Function(script));

        Ok(Program::new(handle))
    }

    fn current(&self) -> &Compiler {
        self.compilers.last().expect("compiler stack is never empty")
    }

    fn current_mut(&mut self) -> &mut Compiler {
        self.compilers
            .last_mut()
            .expect("compiler stack is never empty")
    }

    fn current_chunk_mut(&mut self) -> &mut Chunk {
        &mut self.current_mut().function.chunk
    }

    /// Runs a collection if the heap asks for one, rooted by every function
    /// under construction. Nested function compilation can allocate enough
    /// to trigger this long before any VM exists.
    fn maybe_collect(&mut self) {
        if self.heap.should_collect_garbage() {
            let roots = self.gather_roots();
            self.heap.collect_garbage(roots);
        }
    }

    fn gather_roots(&self) -> VecDeque<Value> {
        let mut roots = VecDeque::new();
        for compiler in &self.compilers {
            if compiler.function.name != 0 {
                roots.push_back(Value::object(compiler.function.name));
            }
            roots.extend(compiler.function.chunk.constants.iter().copied());
        }
        roots.extend(self.extra_roots.iter().copied());
        roots
    }

    fn intern_string(&mut self, s: &str) -> ObjHandle {
        self.maybe_collect();
        self.heap.intern(s)
    }

    fn emit_opcode(&mut self, opcode: OpCode, span: SourceSpan) {
        let line = self.source_map.get_line_number(span.start);
        let col = self.source_map.get_column_number(span.start);
        self.current_chunk_mut()
            .write_opcode(opcode, SourceLocation::new(line, col));
    }

    fn emit_byte(&mut self, byte: u8, span: SourceSpan) {
        let line = self.source_map.get_line_number(span.start);
        let col = self.source_map.get_column_number(span.start);
        self.current_chunk_mut()
            .write(byte, SourceLocation::new(line, col));
    }

    fn emit_opcode_and_byte(&mut self, opcode: OpCode, byte: u8, span: SourceSpan) {
        self.emit_opcode(opcode, span);
        self.emit_byte(byte, span);
    }

    /// Emits a forward jump with a placeholder offset and returns the
    /// position to patch once the target is known.
    fn emit_jump(&mut self, opcode: OpCode, span: SourceSpan) -> usize {
        self.emit_opcode(opcode, span);
        self.emit_byte(0xff, span);
        self.emit_byte(0xff, span);
        self.current_chunk_mut().code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize, span: SourceSpan) -> CompileResult<()> {
        let jump = self.current_chunk_mut().code.len() - offset - 2;

        if jump > u16::MAX as usize {
            return Err(SableCompilerError::new_compile_error(
                "Too much code to jump over.".to_string(),
                span,
            ));
        }

        self.current_chunk_mut().code[offset] = ((jump >> 8) & 0xff) as u8;
        self.current_chunk_mut().code[offset + 1] = (jump & 0xff) as u8;

        Ok(())
    }

    fn emit_loop(&mut self, loop_start: usize, span: SourceSpan) -> CompileResult<()> {
        self.emit_opcode(OpCode::Loop, span);
        let offset = self.current_chunk_mut().code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            return Err(SableCompilerError::new_compile_error(
                "Loop body too large.".to_string(),
                span,
            ));
        }

        self.emit_byte(((offset >> 8) & 0xff) as u8, span);
        self.emit_byte((offset & 0xff) as u8, span);

        Ok(())
    }

    fn make_constant(&mut self, value: Value, span: SourceSpan) -> CompileResult<u8> {
        let index = self.current_chunk_mut().add_constant(value);

        if index > u8::MAX as usize {
            Err(SableCompilerError::new_compile_error(
                "Too many constants in one chunk.".to_string(),
                span,
            ))
        } else {
            Ok(index as u8)
        }
    }

    fn emit_constant(&mut self, value: Value, span: SourceSpan) -> CompileResult<()> {
        let byte = self.make_constant(value, span)?;
        self.emit_opcode_and_byte(OpCode::Constant, byte, span);
        Ok(())
    }

    fn emit_return(&mut self, span: SourceSpan) {
        if matches!(self.current().kind, FunctionKind::Initializer) {
            self.emit_opcode_and_byte(OpCode::GetLocal, 0, span);
        } else {
            self.emit_opcode(OpCode::Nil, span);
        }
        self.emit_opcode(OpCode::Return, span);
    }

    fn begin_scope(&mut self) {
        self.current_mut().scope_depth += 1;
    }

    /// Discards every local declared in the closing block, in reverse
    /// declaration order. Captured locals are closed into their upvalues
    /// instead of popped.
    fn end_scope(&mut self, span: SourceSpan) {
        let current = self.current_mut();
        current.scope_depth -= 1;
        let scope_depth = current.scope_depth;

        let mut instructions = Vec::new();
        while let Some(local) = current.locals.last() {
            match local.depth {
                Some(depth) if depth > scope_depth => {
                    instructions.push(if local.is_captured {
                        OpCode::CloseUpvalue
                    } else {
                        OpCode::Pop
                    });
                    current.locals.pop();
                }
                _ => break,
            }
        }

        for instruction in instructions {
            self.emit_opcode(instruction, span);
        }
    }

    fn add_local(&mut self, name: &str, span: SourceSpan) -> CompileResult<()> {
        let current = self.current_mut();
        if current.locals.len() >= LOCAL_MAX {
            return Err(SableCompilerError::new_compile_error(
                "Too many local variables in function.".to_string(),
                span,
            ));
        }

        current.locals.push(Local::new(name.into()));
        Ok(())
    }

    fn declare_variable(&mut self, name: &str, span: SourceSpan) -> CompileResult<()> {
        if self.current().scope_depth == 0 {
            // Globals are late-bound by name; nothing to declare.
            return Ok(());
        }

        let current = self.current();
        for local in current.locals.iter().rev() {
            if local
                .depth
                .map(|depth| depth < current.scope_depth)
                .unwrap_or(false)
            {
                break;
            }

            if &*local.name == name {
                return Err(SableCompilerError::new_compile_error(
                    "Variable with this name already declared in this scope.".to_string(),
                    span,
                ));
            }
        }

        self.add_local(name, span)
    }

    fn mark_initialized(&mut self) {
        let current = self.current_mut();
        if current.scope_depth == 0 {
            return;
        }
        let depth = current.scope_depth;
        if let Some(local) = current.locals.last_mut() {
            local.depth = Some(depth);
        }
    }

    /// Interns `name` and immediately parks it in the constant pool. The
    /// pool entry doubles as a GC root, so the string cannot be collected
    /// while later emission still refers to it.
    fn identifier_constant(&mut self, name: &str, span: SourceSpan) -> CompileResult<u8> {
        let handle = self.intern_string(name);
        self.make_constant(Value::object(handle), span)
    }

    /// Declares `name` and, at global scope, returns the pool index of its
    /// interned name for the later DEFINE_GLOBAL.
    fn parse_variable(&mut self, name: &str, span: SourceSpan) -> CompileResult<Option<u8>> {
        self.declare_variable(name, span)?;

        if self.current().scope_depth > 0 {
            Ok(None)
        } else {
            self.identifier_constant(name, span).map(Some)
        }
    }

    fn define_variable(&mut self, constant: Option<u8>, span: SourceSpan) -> CompileResult<()> {
        if self.current().scope_depth > 0 {
            self.mark_initialized();
            return Ok(());
        }

        let constant = constant.expect("global definitions carry an interned name");
        self.emit_opcode_and_byte(OpCode::DefineGlobal, constant, span);
        Ok(())
    }

    fn resolve_local(
        &self,
        compiler_index: usize,
        name: &str,
        span: SourceSpan,
    ) -> CompileResult<Option<usize>> {
        let compiler = &self.compilers[compiler_index];
        for (i, local) in compiler.locals.iter().enumerate().rev() {
            if &*local.name == name {
                if local.depth.is_none() {
                    return Err(SableCompilerError::new_compile_error(
                        "Cannot read local variable in its own initializer.".to_string(),
                        span,
                    ));
                }
                return Ok(Some(i));
            }
        }

        Ok(None)
    }

    /// Searches enclosing functions for `name`, threading an upvalue
    /// descriptor through every nesting level between the defining function
    /// and this one.
    fn resolve_upvalue(
        &mut self,
        compiler_index: usize,
        name: &str,
        span: SourceSpan,
    ) -> CompileResult<Option<usize>> {
        if compiler_index == 0 {
            return Ok(None);
        }
        let enclosing = compiler_index - 1;

        if let Some(local_index) = self.resolve_local(enclosing, name, span)? {
            self.compilers[enclosing].locals[local_index].is_captured = true;
            return self
                .add_upvalue(compiler_index, local_index, true, span)
                .map(Some);
        }

        if let Some(upvalue_index) = self.resolve_upvalue(enclosing, name, span)? {
            return self
                .add_upvalue(compiler_index, upvalue_index, false, span)
                .map(Some);
        }

        Ok(None)
    }

    fn add_upvalue(
        &mut self,
        compiler_index: usize,
        index: usize,
        is_local: bool,
        span: SourceSpan,
    ) -> CompileResult<usize> {
        let compiler = &mut self.compilers[compiler_index];

        for (i, upvalue) in compiler.upvalues.iter().enumerate() {
            if upvalue.index == index as u8 && upvalue.is_local == is_local {
                return Ok(i);
            }
        }

        if compiler.upvalues.len() >= UPVALUE_MAX {
            return Err(SableCompilerError::new_compile_error(
                "Too many closure variables in function.".to_string(),
                span,
            ));
        }

        compiler.upvalues.push(UpvalueDescriptor {
            index: index as u8,
            is_local,
        });
        compiler.function.upvalue_count = compiler.upvalues.len();

        Ok(compiler.upvalues.len() - 1)
    }

    /// Emits the read or write for a bare name: local slot, upvalue index,
    /// or late-bound global, in that resolution order.
    fn handle_variable(
        &mut self,
        name: &str,
        span: SourceSpan,
        is_assignment: bool,
    ) -> CompileResult<()> {
        let top = self.compilers.len() - 1;

        let (index, get_op, set_op) = if let Some(index) = self.resolve_local(top, name, span)? {
            (index as u8, OpCode::GetLocal, OpCode::SetLocal)
        } else if let Some(index) = self.resolve_upvalue(top, name, span)? {
            (index as u8, OpCode::GetUpvalue, OpCode::SetUpvalue)
        } else {
            let index = self.identifier_constant(name, span)?;
            (index, OpCode::GetGlobal, OpCode::SetGlobal)
        };

        let op = if is_assignment { set_op } else { get_op };
        self.emit_opcode_and_byte(op, index, span);

        Ok(())
    }

    fn handle_function(
        &mut self,
        kind: FunctionKind,
        func_expr: &ast::FunctionExpr,
        errors: &mut ErrorReporter,
    ) -> CompileResult<()> {
        let global = if matches!(kind, FunctionKind::Function) {
            let handle = self.parse_variable(&func_expr.name.name, func_expr.name.span)?;
            // A function may refer to itself; its name is usable before the
            // body finishes compiling.
            self.mark_initialized();
            handle
        } else {
            None
        };

        let name_handle = self.intern_string(&func_expr.name.name);
        self.compilers.push(Compiler::new(
            name_handle,
            func_expr.parameters.len(),
            kind,
        ));

        match self.compile_function_body(func_expr, errors) {
            Ok(()) => (),
            Err(error) => {
                self.compilers.pop();
                return Err(error);
            }
        }

        // Collect while the finished function is still rooted by the
        // compiler chain, then move it onto the heap.
        self.maybe_collect();
        let compiler = self
            .compilers
            .pop()
            .expect("function compiler should be on the stack");
        let upvalues = compiler.upvalues;
        let function_handle = self.heap.allocate(ObjectKind::Function(compiler.function));

        let constant = self.make_constant(Value::object(function_handle), func_expr.name.span)?;
        self.emit_opcode_and_byte(OpCode::Closure, constant, func_expr.name.span);

        for upvalue in upvalues {
            self.emit_byte(upvalue.is_local as u8, func_expr.name.span);
            self.emit_byte(upvalue.index, func_expr.name.span);
        }

        if matches!(kind, FunctionKind::Function) {
            self.define_variable(global, func_expr.name.span)?;
        }

        Ok(())
    }

    fn compile_function_body(
        &mut self,
        func_expr: &ast::FunctionExpr,
        errors: &mut ErrorReporter,
    ) -> CompileResult<()> {
        self.begin_scope();

        if func_expr.parameters.len() > 255 {
            return Err(SableCompilerError::new_compile_error(
                "Cannot have more than 255 parameters.".to_string(),
                func_expr.span,
            ));
        }

        for parameter in &func_expr.parameters {
            let handle = self.parse_variable(&parameter.name, parameter.span)?;
            self.define_variable(handle, parameter.span)?;
        }

        for decl in &func_expr.body.decls {
            self.visit_declaration(decl, errors)?;
        }

        self.emit_return(func_expr.span);
        Ok(())
    }

    fn compile_class_body(
        &mut self,
        class_decl: &ast::ClassDecl,
        errors: &mut ErrorReporter,
    ) -> CompileResult<()> {
        if let Some(superclass) = &class_decl.superclass {
            if class_decl.name.name == superclass.name {
                return Err(SableCompilerError::new_compile_error(
                    "A class cannot inherit from itself.".to_string(),
                    superclass.span,
                ));
            }

            self.handle_variable(&superclass.name, superclass.span, false)?;

            // The superclass value just pushed becomes a synthetic `super`
            // local in its own scope, captured by method closures.
            self.begin_scope();
            self.add_local("super", class_decl.span)?;
            self.define_variable(None, class_decl.span)?;

            self.handle_variable(&class_decl.name.name, class_decl.name.span, false)?;
            self.emit_opcode(OpCode::Inherit, superclass.span);

            self.class_compilers
                .last_mut()
                .expect("class compiler should be on the stack")
                .has_superclass = true;
        }

        self.handle_variable(&class_decl.name.name, class_decl.name.span, false)?;

        for method in &class_decl.methods {
            // A method named with the constructor marker compiles as an
            // initializer: it returns the receiver implicitly.
            let kind = if &*method.name.name == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };

            self.handle_function(kind, method, errors)?;

            let constant = self.identifier_constant(&method.name.name, method.name.span)?;
            self.emit_opcode_and_byte(OpCode::Method, constant, method.name.span);
        }

        self.emit_opcode(OpCode::Pop, class_decl.span);

        if self
            .class_compilers
            .last()
            .map(|c| c.has_superclass)
            .unwrap_or(false)
        {
            self.end_scope(class_decl.span);
        }

        Ok(())
    }

    fn check_super_usage(&self, span: SourceSpan) -> CompileResult<()> {
        match self.class_compilers.last() {
            None => Err(SableCompilerError::new_compile_error(
                "Cannot use 'super' outside of a class.".to_string(),
                span,
            )),
            Some(class) if !class.has_superclass => Err(SableCompilerError::new_compile_error(
                "Cannot use 'super' in a class with no superclass.".to_string(),
                span,
            )),
            Some(_) => Ok(()),
        }
    }

    fn compile_argument_list(
        &mut self,
        arguments: &[ast::Expr],
        span: SourceSpan,
        errors: &mut ErrorReporter,
    ) -> CompileResult<u8> {
        if arguments.len() > 255 {
            return Err(SableCompilerError::new_compile_error(
                "Cannot have more than 255 arguments.".to_string(),
                span,
            ));
        }

        for argument in arguments {
            self.visit_expression(argument, errors)?;
        }

        Ok(arguments.len() as u8)
    }
}

impl<'a> AstVisitor for CompilerVisitor<'a> {
    type Error = SableCompilerError;

    /// Per-declaration error recovery: a failed declaration is recorded and
    /// compilation continues with the next one, so a single pass can surface
    /// every diagnostic.
    fn visit_declaration(
        &mut self,
        decl: &ast::Decl,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        let result = match decl {
            ast::Decl::Class(class_decl) => self.visit_class_declaration(class_decl, errors),
            ast::Decl::Function(func_decl) => self.visit_function_declaration(func_decl, errors),
            ast::Decl::Variable(var_decl) => self.visit_variable_declaration(var_decl, errors),
            ast::Decl::Stmt(stmt) => self.visit_statement(stmt, errors),
        };

        if let Err(error) = result {
            errors.report_error(error);
        }
        Ok(())
    }

    fn visit_class_declaration(
        &mut self,
        class_decl: &ast::ClassDecl,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.declare_variable(&class_decl.name.name, class_decl.name.span)?;

        let constant = self.identifier_constant(&class_decl.name.name, class_decl.name.span)?;
        self.emit_opcode_and_byte(OpCode::Class, constant, class_decl.name.span);
        self.define_variable(Some(constant), class_decl.name.span)?;

        self.class_compilers.push(ClassCompiler {
            name: class_decl.name.name.clone(),
            has_superclass: false,
        });

        let result = self.compile_class_body(class_decl, errors);
        self.class_compilers.pop();
        result
    }

    fn visit_function_declaration(
        &mut self,
        func_decl: &ast::FunctionDecl,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.handle_function(FunctionKind::Function, &func_decl.function, errors)
    }

    fn visit_variable_declaration(
        &mut self,
        var_decl: &ast::VariableDecl,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        let global = self.parse_variable(&var_decl.name.name, var_decl.name.span)?;

        if let Some(initializer) = &var_decl.initializer {
            self.visit_expression(initializer, errors)?;
        } else {
            self.emit_opcode(OpCode::Nil, var_decl.span);
        }

        self.define_variable(global, var_decl.name.span)
    }

    fn visit_expression_statement(
        &mut self,
        expr_stmt: &ast::ExprStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&expr_stmt.expr, errors)?;
        self.emit_opcode(OpCode::Pop, expr_stmt.span);
        Ok(())
    }

    fn visit_print_statement(
        &mut self,
        print_stmt: &ast::PrintStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&print_stmt.expr, errors)?;
        self.emit_opcode(OpCode::Print, print_stmt.span);
        Ok(())
    }

    fn visit_block_statement(
        &mut self,
        block_stmt: &ast::BlockStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.begin_scope();
        for decl in &block_stmt.decls {
            self.visit_declaration(decl, errors)?;
        }
        self.end_scope(block_stmt.span);
        Ok(())
    }

    fn visit_if_statement(
        &mut self,
        if_stmt: &ast::IfStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&if_stmt.condition, errors)?;

        let then_jump = self.emit_jump(OpCode::JumpIfFalse, if_stmt.then_branch.span());
        self.emit_opcode(OpCode::Pop, if_stmt.then_branch.span());
        self.visit_statement(&if_stmt.then_branch, errors)?;

        let else_jump = self.emit_jump(OpCode::Jump, if_stmt.span);
        self.patch_jump(then_jump, if_stmt.then_branch.span())?;
        self.emit_opcode(OpCode::Pop, if_stmt.span);

        if let Some(else_branch) = &if_stmt.else_branch {
            self.visit_statement(else_branch, errors)?;
        }
        self.patch_jump(else_jump, if_stmt.span)?;

        Ok(())
    }

    fn visit_while_statement(
        &mut self,
        while_stmt: &ast::WhileStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        let loop_start = self.current_chunk_mut().code.len();
        self.visit_expression(&while_stmt.condition, errors)?;

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse, while_stmt.body.span());
        self.emit_opcode(OpCode::Pop, while_stmt.body.span());
        self.visit_statement(&while_stmt.body, errors)?;
        self.emit_loop(loop_start, while_stmt.body.span())?;

        self.patch_jump(exit_jump, while_stmt.body.span())?;
        self.emit_opcode(OpCode::Pop, while_stmt.span);

        Ok(())
    }

    fn visit_for_statement(
        &mut self,
        for_stmt: &ast::ForStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.begin_scope();

        match &for_stmt.initializer {
            Some(ast::ForInitializer::Variable(var_decl)) => {
                self.visit_variable_declaration(var_decl, errors)?;
            }
            Some(ast::ForInitializer::Expr(expr)) => {
                self.visit_expression(expr, errors)?;
                self.emit_opcode(OpCode::Pop, expr.span());
            }
            None => (),
        }

        let mut loop_start = self.current_chunk_mut().code.len();

        let exit_jump = match &for_stmt.condition {
            Some(condition) => {
                self.visit_expression(condition, errors)?;
                let exit_jump = self.emit_jump(OpCode::JumpIfFalse, condition.span());
                self.emit_opcode(OpCode::Pop, condition.span());
                Some(exit_jump)
            }
            None => None,
        };

        if let Some(increment) = &for_stmt.increment {
            // The increment textually precedes the body but runs after it:
            // jump over it, run the body, loop back to it, then loop to the
            // condition.
            let body_jump = self.emit_jump(OpCode::Jump, increment.span());
            let increment_start = self.current_chunk_mut().code.len();

            self.visit_expression(increment, errors)?;
            self.emit_opcode(OpCode::Pop, increment.span());
            self.emit_loop(loop_start, increment.span())?;

            loop_start = increment_start;
            self.patch_jump(body_jump, increment.span())?;
        }

        self.visit_statement(&for_stmt.body, errors)?;
        self.emit_loop(loop_start, for_stmt.body.span())?;

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump, for_stmt.span)?;
            self.emit_opcode(OpCode::Pop, for_stmt.span);
        }

        self.end_scope(for_stmt.span);
        Ok(())
    }

    fn visit_return_statement(
        &mut self,
        return_stmt: &ast::ReturnStmt,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        if matches!(self.current().kind, FunctionKind::Script) {
            return Err(SableCompilerError::new_compile_error(
                "Cannot return from top-level code.".to_string(),
                return_stmt.span,
            ));
        }

        match &return_stmt.value {
            Some(value) => {
                if matches!(self.current().kind, FunctionKind::Initializer) {
                    return Err(SableCompilerError::new_compile_error(
                        "Cannot return a value from an initializer.".to_string(),
                        return_stmt.span,
                    ));
                }

                self.visit_expression(value, errors)?;
                self.emit_opcode(OpCode::Return, return_stmt.span);
            }
            None => self.emit_return(return_stmt.span),
        }

        Ok(())
    }

    fn visit_assignment_expression(
        &mut self,
        assignment: &ast::AssignmentExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        match &assignment.target {
            ast::AssignmentTarget::Identifier(identifier) => {
                self.visit_expression(&assignment.value, errors)?;
                self.handle_variable(&identifier.name, identifier.span, true)?;
            }
            ast::AssignmentTarget::Property(property) => {
                self.visit_expression(&property.object, errors)?;
                self.visit_expression(&assignment.value, errors)?;

                let constant = self.identifier_constant(&property.name.name, property.name.span)?;
                self.emit_opcode_and_byte(OpCode::SetProperty, constant, property.name.span);
            }
        }

        Ok(())
    }

    fn visit_logical_or_expression(
        &mut self,
        logical_or: &ast::LogicalOrExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&logical_or.left, errors)?;

        let else_jump = self.emit_jump(OpCode::JumpIfFalse, logical_or.span);
        let end_jump = self.emit_jump(OpCode::Jump, logical_or.span);

        self.patch_jump(else_jump, logical_or.span)?;
        self.emit_opcode(OpCode::Pop, logical_or.span);

        self.visit_expression(&logical_or.right, errors)?;
        self.patch_jump(end_jump, logical_or.span)?;

        Ok(())
    }

    fn visit_logical_and_expression(
        &mut self,
        logical_and: &ast::LogicalAndExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&logical_and.left, errors)?;

        let end_jump = self.emit_jump(OpCode::JumpIfFalse, logical_and.span);
        self.emit_opcode(OpCode::Pop, logical_and.span);

        self.visit_expression(&logical_and.right, errors)?;
        self.patch_jump(end_jump, logical_and.span)?;

        Ok(())
    }

    fn visit_equality_expression(
        &mut self,
        equality: &ast::EqualityExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&equality.left, errors)?;
        self.visit_expression(&equality.right, errors)?;
        self.emit_opcode(OpCode::Equal, equality.span);

        if let ast::EqualityOperator::NotEqual = equality.operator {
            self.emit_opcode(OpCode::Not, equality.span);
        }
        Ok(())
    }

    fn visit_comparison_expression(
        &mut self,
        comparison: &ast::ComparisonExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&comparison.left, errors)?;
        self.visit_expression(&comparison.right, errors)?;

        // >= and <= are the negations of < and >.
        match comparison.operator {
            ast::ComparisonOperator::Greater => self.emit_opcode(OpCode::Greater, comparison.span),
            ast::ComparisonOperator::Less => self.emit_opcode(OpCode::Less, comparison.span),
            ast::ComparisonOperator::GreaterEqual => {
                self.emit_opcode(OpCode::Less, comparison.span);
                self.emit_opcode(OpCode::Not, comparison.span);
            }
            ast::ComparisonOperator::LessEqual => {
                self.emit_opcode(OpCode::Greater, comparison.span);
                self.emit_opcode(OpCode::Not, comparison.span);
            }
        }
        Ok(())
    }

    fn visit_term_expression(
        &mut self,
        term: &ast::TermExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&term.left, errors)?;
        self.visit_expression(&term.right, errors)?;
        self.emit_opcode(term.operator.into(), term.span);
        Ok(())
    }

    fn visit_factor_expression(
        &mut self,
        factor: &ast::FactorExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&factor.left, errors)?;
        self.visit_expression(&factor.right, errors)?;
        self.emit_opcode(factor.operator.into(), factor.span);
        Ok(())
    }

    fn visit_unary_expression(
        &mut self,
        unary: &ast::UnaryExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&unary.operand, errors)?;
        self.emit_opcode(unary.operator.into(), unary.span);
        Ok(())
    }

    fn visit_call_expression(
        &mut self,
        call: &ast::CallExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        // Calls through a property access or `super` compile to fused invoke
        // instructions, skipping the intermediate bound-method object.
        match call.callee.as_ref() {
            ast::Expr::Property(property) => {
                self.visit_expression(&property.object, errors)?;
                let arg_count = self.compile_argument_list(&call.arguments, call.span, errors)?;

                let constant = self.identifier_constant(&property.name.name, property.name.span)?;
                self.emit_opcode_and_byte(OpCode::Invoke, constant, call.span);
                self.emit_byte(arg_count, call.span);
            }
            ast::Expr::Super(super_expr) => {
                self.check_super_usage(super_expr.span)?;

                self.handle_variable("this", super_expr.span, false)?;
                let arg_count = self.compile_argument_list(&call.arguments, call.span, errors)?;
                self.handle_variable("super", super_expr.span, false)?;

                let constant =
                    self.identifier_constant(&super_expr.method.name, super_expr.method.span)?;
                self.emit_opcode_and_byte(OpCode::SuperInvoke, constant, call.span);
                self.emit_byte(arg_count, call.span);
            }
            callee => {
                self.visit_expression(callee, errors)?;
                let arg_count = self.compile_argument_list(&call.arguments, call.span, errors)?;
                self.emit_opcode_and_byte(OpCode::Call, arg_count, call.span);
            }
        }

        Ok(())
    }

    fn visit_property_expression(
        &mut self,
        property: &ast::PropertyExpr,
        errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.visit_expression(&property.object, errors)?;

        let constant = self.identifier_constant(&property.name.name, property.name.span)?;
        self.emit_opcode_and_byte(OpCode::GetProperty, constant, property.name.span);
        Ok(())
    }

    fn visit_this_expression(
        &mut self,
        this_expr: &ast::ThisExpr,
        _errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        if self.class_compilers.is_empty() {
            return Err(SableCompilerError::new_compile_error(
                "Cannot use 'this' outside of a class.".to_string(),
                this_expr.span,
            ));
        }

        self.handle_variable("this", this_expr.span, false)
    }

    fn visit_super_expression(
        &mut self,
        super_expr: &ast::SuperExpr,
        _errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.check_super_usage(super_expr.span)?;

        self.handle_variable("this", super_expr.span, false)?;
        self.handle_variable("super", super_expr.span, false)?;

        let constant = self.identifier_constant(&super_expr.method.name, super_expr.method.span)?;
        self.emit_opcode_and_byte(OpCode::GetSuper, constant, super_expr.method.span);
        Ok(())
    }

    fn visit_identifier(
        &mut self,
        identifier: &ast::Identifier,
        _errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.handle_variable(&identifier.name, identifier.span, false)
    }

    fn visit_number_literal(
        &mut self,
        number: &ast::NumberLiteral,
        _errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.emit_constant(Value::number(number.value), number.span)
    }

    fn visit_string_literal(
        &mut self,
        string: &ast::StringLiteral,
        _errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        let handle = self.intern_string(&string.value);
        self.emit_constant(Value::object(handle), string.span)
    }

    fn visit_boolean_literal(
        &mut self,
        boolean: &ast::BooleanLiteral,
        _errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.emit_opcode(boolean.value.into(), boolean.span);
        Ok(())
    }

    fn visit_nil_literal(
        &mut self,
        nil: &ast::NilLiteral,
        _errors: &mut ErrorReporter,
    ) -> Result<(), Self::Error> {
        self.emit_opcode(OpCode::Nil, nil.span);
        Ok(())
    }
}
