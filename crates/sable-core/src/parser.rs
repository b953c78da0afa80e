use crate::{
    ErrorReporter, SableCompilerError, SourceMap,
    ast::{self, SourceSpan},
    tokenizer::{Token, TokenType, Tokenizer},
};

type ParseResult<T> = Result<T, SableCompilerError>;

/// Recursive-descent parser producing an owned AST. Syntax errors are
/// accumulated in the reporter; after each bad declaration the parser
/// resynchronizes at a statement boundary and keeps going.
pub struct Parser<'a> {
    source_map: &'a SourceMap,
    tokens: Tokenizer<'a>,
    previous_token: Option<Token>,
    current_token: Option<Token>,
    errors: ErrorReporter,
}

impl<'a> Parser<'a> {
    pub fn new(source_map: &'a SourceMap) -> Self {
        let tokens = Tokenizer::new(source_map);
        let mut parser = Self {
            source_map,
            tokens,
            previous_token: None,
            current_token: None,
            errors: ErrorReporter::new(),
        };

        parser.advance();
        parser
    }

    pub fn into_reporter(self) -> ErrorReporter {
        self.errors
    }

    pub fn parse(&mut self) -> ast::Program {
        let start_span = self.get_current_span();
        let mut decls = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(decl) => decls.push(decl),
                Err(error) => {
                    self.errors.report_error(error);
                    self.synchronize();
                }
            }
        }

        let span = SourceSpan::combine(start_span, self.get_previous_span());
        ast::Program { decls, span }
    }

    fn declaration(&mut self) -> ParseResult<ast::Decl> {
        if self.match_token(TokenType::Class) {
            self.class_declaration().map(ast::Decl::Class)
        } else if self.match_token(TokenType::Fun) {
            let span_start = self.get_previous_span();
            let function = self.function("function")?;
            let span = SourceSpan::combine(span_start, function.span);
            Ok(ast::Decl::Function(ast::FunctionDecl { function, span }))
        } else if self.match_token(TokenType::Var) {
            self.variable_declaration().map(ast::Decl::Variable)
        } else {
            self.statement().map(|stmt| ast::Decl::Stmt(Box::new(stmt)))
        }
    }

    fn class_declaration(&mut self) -> ParseResult<ast::ClassDecl> {
        let span_start = self.get_previous_span();

        self.consume(TokenType::Identifier, "Expect class name.")?;
        let name = self.get_identifier()?;

        let superclass = if self.match_token(TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(self.get_identifier()?)
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;
        let span = SourceSpan::combine(span_start, self.get_previous_span());

        Ok(ast::ClassDecl {
            name,
            superclass,
            methods,
            span,
        })
    }

    fn function(&mut self, kind: &str) -> ParseResult<ast::FunctionExpr> {
        self.consume(TokenType::Identifier, &format!("Expect {} name.", kind))?;
        let name = self.get_identifier()?;
        let span_start = name.span;

        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut parameters = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                self.consume(TokenType::Identifier, "Expect parameter name.")?;
                parameters.push(self.get_identifier()?);

                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;
        let span = SourceSpan::combine(span_start, body.span);

        Ok(ast::FunctionExpr {
            name,
            parameters,
            body,
            span,
        })
    }

    fn variable_declaration(&mut self) -> ParseResult<ast::VariableDecl> {
        let span_start = self.get_previous_span();

        self.consume(TokenType::Identifier, "Expect variable name.")?;
        let name = self.get_identifier()?;

        let initializer = if self.match_token(TokenType::Equals) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        let span = SourceSpan::combine(span_start, self.get_previous_span());

        Ok(ast::VariableDecl {
            name,
            initializer,
            span,
        })
    }

    fn statement(&mut self) -> ParseResult<ast::Stmt> {
        if self.match_token(TokenType::Print) {
            self.print_statement()
        } else if self.match_token(TokenType::LeftBrace) {
            self.block().map(ast::Stmt::Block)
        } else if self.match_token(TokenType::If) {
            self.if_statement()
        } else if self.match_token(TokenType::While) {
            self.while_statement()
        } else if self.match_token(TokenType::For) {
            self.for_statement()
        } else if self.match_token(TokenType::Return) {
            self.return_statement()
        } else {
            self.expression_statement()
        }
    }

    fn print_statement(&mut self) -> ParseResult<ast::Stmt> {
        let span_start = self.get_previous_span();
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        let span = SourceSpan::combine(span_start, self.get_previous_span());

        Ok(ast::Stmt::Print(ast::PrintStmt { expr, span }))
    }

    fn block(&mut self) -> ParseResult<ast::BlockStmt> {
        let span_start = self.get_previous_span();
        let mut decls = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(decl) => decls.push(decl),
                Err(error) => {
                    self.errors.report_error(error);
                    self.synchronize();
                }
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        let span = SourceSpan::combine(span_start, self.get_previous_span());

        Ok(ast::BlockStmt { decls, span })
    }

    fn if_statement(&mut self) -> ParseResult<ast::Stmt> {
        let span_start = self.get_previous_span();

        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        let span = SourceSpan::combine(span_start, self.get_previous_span());
        Ok(ast::Stmt::If(ast::IfStmt {
            condition,
            then_branch,
            else_branch,
            span,
        }))
    }

    fn while_statement(&mut self) -> ParseResult<ast::Stmt> {
        let span_start = self.get_previous_span();

        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;

        let body = Box::new(self.statement()?);
        let span = SourceSpan::combine(span_start, self.get_previous_span());

        Ok(ast::Stmt::While(ast::WhileStmt {
            condition,
            body,
            span,
        }))
    }

    fn for_statement(&mut self) -> ParseResult<ast::Stmt> {
        let span_start = self.get_previous_span();

        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(TokenType::Semicolon) {
            None
        } else if self.match_token(TokenType::Var) {
            Some(ast::ForInitializer::Variable(self.variable_declaration()?))
        } else {
            let expr = self.expression()?;
            self.consume(TokenType::Semicolon, "Expect ';' after loop initializer.")?;
            Some(ast::ForInitializer::Expr(expr))
        };

        let condition = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let body = Box::new(self.statement()?);
        let span = SourceSpan::combine(span_start, self.get_previous_span());

        Ok(ast::Stmt::For(Box::new(ast::ForStmt {
            initializer,
            condition,
            increment,
            body,
            span,
        })))
    }

    fn return_statement(&mut self) -> ParseResult<ast::Stmt> {
        let span_start = self.get_previous_span();

        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        let span = SourceSpan::combine(span_start, self.get_previous_span());

        Ok(ast::Stmt::Return(ast::ReturnStmt { value, span }))
    }

    fn expression_statement(&mut self) -> ParseResult<ast::Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        let span = SourceSpan::combine(expr.span(), self.get_previous_span());

        Ok(ast::Stmt::Expr(ast::ExprStmt { expr, span }))
    }

    fn expression(&mut self) -> ParseResult<ast::Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<ast::Expr> {
        let expr = self.logical_or()?;

        if self.match_token(TokenType::Equals) {
            let equals_span = self.get_previous_span();
            let value = Box::new(self.assignment()?);
            let span = SourceSpan::combine(expr.span(), value.span());

            let target = match expr {
                ast::Expr::Variable(identifier) => ast::AssignmentTarget::Identifier(identifier),
                ast::Expr::Property(property) => ast::AssignmentTarget::Property(property),
                _ => {
                    return Err(SableCompilerError::new_syntax_error(
                        "Invalid assignment target.".to_string(),
                        equals_span,
                    ));
                }
            };

            return Ok(ast::Expr::Assignment(ast::AssignmentExpr {
                target,
                value,
                span,
            }));
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> ParseResult<ast::Expr> {
        let mut expr = self.logical_and()?;

        while self.match_token(TokenType::Or) {
            let right = self.logical_and()?;
            let span = SourceSpan::combine(expr.span(), right.span());
            expr = ast::Expr::LogicalOr(ast::LogicalOrExpr {
                left: Box::new(expr),
                right: Box::new(right),
                span,
            });
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> ParseResult<ast::Expr> {
        let mut expr = self.equality()?;

        while self.match_token(TokenType::And) {
            let right = self.equality()?;
            let span = SourceSpan::combine(expr.span(), right.span());
            expr = ast::Expr::LogicalAnd(ast::LogicalAndExpr {
                left: Box::new(expr),
                right: Box::new(right),
                span,
            });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<ast::Expr> {
        let mut expr = self.comparison()?;

        loop {
            let operator = if self.match_token(TokenType::EqualsEquals) {
                ast::EqualityOperator::Equal
            } else if self.match_token(TokenType::BangEquals) {
                ast::EqualityOperator::NotEqual
            } else {
                break;
            };

            let right = self.comparison()?;
            let span = SourceSpan::combine(expr.span(), right.span());
            expr = ast::Expr::Equality(ast::EqualityExpr {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            });
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<ast::Expr> {
        let mut expr = self.term()?;

        loop {
            let operator = if self.match_token(TokenType::Greater) {
                ast::ComparisonOperator::Greater
            } else if self.match_token(TokenType::GreaterEquals) {
                ast::ComparisonOperator::GreaterEqual
            } else if self.match_token(TokenType::Less) {
                ast::ComparisonOperator::Less
            } else if self.match_token(TokenType::LessEquals) {
                ast::ComparisonOperator::LessEqual
            } else {
                break;
            };

            let right = self.term()?;
            let span = SourceSpan::combine(expr.span(), right.span());
            expr = ast::Expr::Comparison(ast::ComparisonExpr {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            });
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<ast::Expr> {
        let mut expr = self.factor()?;

        loop {
            let operator = if self.match_token(TokenType::Plus) {
                ast::TermOperator::Add
            } else if self.match_token(TokenType::Minus) {
                ast::TermOperator::Subtract
            } else {
                break;
            };

            let right = self.factor()?;
            let span = SourceSpan::combine(expr.span(), right.span());
            expr = ast::Expr::Term(ast::TermExpr {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            });
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<ast::Expr> {
        let mut expr = self.unary()?;

        loop {
            let operator = if self.match_token(TokenType::Star) {
                ast::FactorOperator::Multiply
            } else if self.match_token(TokenType::Slash) {
                ast::FactorOperator::Divide
            } else {
                break;
            };

            let right = self.unary()?;
            let span = SourceSpan::combine(expr.span(), right.span());
            expr = ast::Expr::Factor(ast::FactorExpr {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<ast::Expr> {
        let operator = if self.match_token(TokenType::Bang) {
            Some(ast::UnaryOperator::Not)
        } else if self.match_token(TokenType::Minus) {
            Some(ast::UnaryOperator::Minus)
        } else {
            None
        };

        if let Some(operator) = operator {
            let operator_span = self.get_previous_span();
            let operand = self.unary()?;
            let span = SourceSpan::combine(operator_span, operand.span());
            return Ok(ast::Expr::Unary(ast::UnaryExpr {
                operator,
                operand: Box::new(operand),
                span,
            }));
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<ast::Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(TokenType::LeftParen) {
                let arguments = self.argument_list()?;
                let span = SourceSpan::combine(expr.span(), self.get_previous_span());
                expr = ast::Expr::Call(ast::CallExpr {
                    callee: Box::new(expr),
                    arguments,
                    span,
                });
            } else if self.match_token(TokenType::Dot) {
                self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                let name = self.get_identifier()?;
                let span = SourceSpan::combine(expr.span(), name.span);
                expr = ast::Expr::Property(ast::PropertyExpr {
                    object: Box::new(expr),
                    name,
                    span,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn argument_list(&mut self) -> ParseResult<Vec<ast::Expr>> {
        let mut arguments = Vec::new();

        if !self.check(TokenType::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(arguments)
    }

    fn primary(&mut self) -> ParseResult<ast::Expr> {
        if self.match_token(TokenType::Number) {
            let span = self.get_previous_span();
            let lexeme: String = self
                .previous_token
                .as_ref()
                .map(|t| t.lexeme(self.source_map).iter().collect())
                .unwrap_or_default();
            let value = lexeme.parse::<f64>().map_err(|_| {
                SableCompilerError::new_syntax_error("Invalid number literal.".to_string(), span)
            })?;
            return Ok(ast::Expr::Number(ast::NumberLiteral { value, span }));
        }

        if self.match_token(TokenType::String) {
            let span = self.get_previous_span();
            let lexeme: String = self
                .previous_token
                .as_ref()
                .map(|t| t.lexeme(self.source_map).iter().collect())
                .unwrap_or_default();
            // Trim the surrounding quotes.
            let value = lexeme[1..lexeme.len() - 1].to_string().into_boxed_str();
            return Ok(ast::Expr::String(ast::StringLiteral { value, span }));
        }

        if self.match_token(TokenType::True) {
            return Ok(ast::Expr::Boolean(ast::BooleanLiteral {
                value: true,
                span: self.get_previous_span(),
            }));
        }

        if self.match_token(TokenType::False) {
            return Ok(ast::Expr::Boolean(ast::BooleanLiteral {
                value: false,
                span: self.get_previous_span(),
            }));
        }

        if self.match_token(TokenType::Nil) {
            return Ok(ast::Expr::Nil(ast::NilLiteral {
                span: self.get_previous_span(),
            }));
        }

        if self.match_token(TokenType::This) {
            return Ok(ast::Expr::This(ast::ThisExpr {
                span: self.get_previous_span(),
            }));
        }

        if self.match_token(TokenType::Super) {
            let span_start = self.get_previous_span();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            let method = self.get_identifier()?;
            let span = SourceSpan::combine(span_start, method.span);
            return Ok(ast::Expr::Super(ast::SuperExpr { method, span }));
        }

        if self.match_token(TokenType::Identifier) {
            return Ok(ast::Expr::Variable(self.get_identifier()?));
        }

        if self.match_token(TokenType::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(expr);
        }

        let span = self.get_current_span();
        if !self.is_at_end() {
            self.advance();
        }
        Err(SableCompilerError::new_syntax_error(
            "Expect expression.".to_string(),
            span,
        ))
    }

    fn advance(&mut self) {
        self.previous_token = self.current_token.take();

        while let Some(token) = self.tokens.next() {
            if token.token_type == TokenType::Error {
                self.handle_tokenizer_error(&token);
                continue;
            }

            self.current_token = Some(token);
            break;
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<()> {
        if self.check(token_type) {
            self.advance();
            return Ok(());
        }

        let span = self.get_current_span();
        Err(SableCompilerError::new_syntax_error(
            message.to_string(),
            span,
        ))
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if !self.check(token_type) {
            return false;
        }

        self.advance();
        true
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current_token
            .as_ref()
            .map(|t| t.token_type == token_type)
            .unwrap_or(false)
    }

    fn handle_tokenizer_error(&mut self, token: &Token) {
        let message = token
            .error_message
            .as_deref()
            .unwrap_or("Tokenization error")
            .to_string();

        self.errors
            .report_error(SableCompilerError::new_syntax_error(
                message,
                SourceSpan::from_token(token),
            ));
    }

    fn get_identifier(&mut self) -> ParseResult<ast::Identifier> {
        let token = self.previous_token.as_ref();
        let span = token.map(SourceSpan::from_token).unwrap_or_default();

        if let Some(token) = token {
            let name: String = token.lexeme(self.source_map).iter().collect();
            Ok(ast::Identifier::new(name.into_boxed_str(), span))
        } else {
            Err(SableCompilerError::new_syntax_error(
                "Expect identifier.".to_string(),
                span,
            ))
        }
    }

    fn get_current_span(&self) -> SourceSpan {
        self.current_token
            .as_ref()
            .map(SourceSpan::from_token)
            .unwrap_or_default()
    }

    fn get_previous_span(&self) -> SourceSpan {
        self.previous_token
            .as_ref()
            .map(SourceSpan::from_token)
            .unwrap_or_default()
    }

    fn synchronize(&mut self) {
        loop {
            let current_token_type = match self.current_token.as_ref() {
                Some(token) => token.token_type,
                None => return,
            };

            if current_token_type == TokenType::Eof {
                return;
            }

            if let Some(prev_token) = &self.previous_token
                && prev_token.token_type == TokenType::Semicolon
            {
                return;
            }

            match current_token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        match &self.current_token {
            Some(token) => token.token_type == TokenType::Eof,
            None => true,
        }
    }
}
