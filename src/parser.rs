//! Recursive-descent parser: token stream to `Program` AST. Consumes
//! single-token lookahead via a `Tokens` cursor (`peek`/`next`), with
//! genuine hand-written recursive descent — one method per grammar
//! production — rather than a combinator-DSL, which would be a
//! heavier generalization this single-token-lookahead grammar does
//! not need.

use crate::ast::{BinaryOperator, ClassMember, Expression, Parameter, Program, Statement, UnaryOperator};
use crate::diagnostics::CompileError;
use crate::lexer::{Token, TokenCategory};

/// Cursor over a token stream.
struct Tokens {
    tokens: Vec<Token>,
    index: usize,
}

impl Tokens {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    fn peek(&self) -> &Token {
        // The lexer always appends a trailing Eof token, so this never runs past the end.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

}

pub struct Parser {
    tokens: Tokens,
    source: String,
}

type PResult<T> = Result<T, CompileError>;

impl Parser {
    pub fn new(tokens: Vec<Token>, source: impl Into<String>) -> Self {
        Self {
            tokens: Tokens::new(tokens),
            source: source.into(),
        }
    }

    fn error(&self, message: impl Into<String>, token: &Token) -> CompileError {
        CompileError::at(message, self.source.clone(), token.location())
    }

    fn unexpected(&self, expected: &str, token: &Token) -> CompileError {
        self.error(
            format!("expected {expected}, found {}", token.describe()),
            token,
        )
    }

    fn check_symbol(&self, symbol: &str) -> bool {
        self.tokens.peek().is_symbol(symbol)
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        self.tokens.peek().is_keyword(keyword)
    }

    fn eat_symbol(&mut self, symbol: &str) -> PResult<Token> {
        if self.check_symbol(symbol) {
            Ok(self.tokens.advance())
        } else {
            let token = self.tokens.peek().clone();
            Err(self.unexpected(&format!("'{symbol}'"), &token))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> PResult<Token> {
        if self.check_keyword(keyword) {
            Ok(self.tokens.advance())
        } else {
            let token = self.tokens.peek().clone();
            Err(self.unexpected(&format!("'{keyword}'"), &token))
        }
    }

    fn eat_identifier(&mut self) -> PResult<String> {
        let token = self.tokens.peek().clone();
        if token.category == TokenCategory::Identifier {
            self.tokens.advance();
            Ok(token.lexeme)
        } else {
            Err(self.unexpected("an identifier", &token))
        }
    }

    /// Semicolons are accepted but never required anywhere in the
    /// grammar.
    fn eat_optional_semicolon(&mut self) {
        if self.check_symbol(";") {
            self.tokens.advance();
        }
    }

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut statements = Vec::new();
        while self.tokens.peek().category != TokenCategory::Eof {
            statements.push(self.parse_top_level()?);
        }
        Ok(statements)
    }

    fn parse_top_level(&mut self) -> PResult<Statement> {
        if self.check_keyword("import") {
            self.parse_import()
        } else if self.check_keyword("class") {
            self.parse_class()
        } else if self.check_keyword("let") {
            self.parse_var_decl()
        } else {
            self.parse_expr_stmt()
        }
    }

    fn parse_import(&mut self) -> PResult<Statement> {
        self.eat_keyword("import")?;
        let module = self.eat_identifier()?;
        let alias = if self.check_keyword("as") {
            self.tokens.advance();
            Some(self.eat_identifier()?)
        } else {
            None
        };
        self.eat_optional_semicolon();
        Ok(Statement::Import { module, alias })
    }

    fn parse_class(&mut self) -> PResult<Statement> {
        self.eat_keyword("class")?;
        let name = self.eat_identifier()?;
        let super_name = if self.check_keyword("extends") {
            self.tokens.advance();
            Some(self.eat_identifier()?)
        } else {
            None
        };

        self.eat_symbol("{")?;
        let mut members = Vec::new();
        while !self.check_symbol("}") {
            members.push(self.parse_member()?);
        }
        self.eat_symbol("}")?;

        Ok(Statement::ClassDeclaration {
            name,
            super_name,
            members,
        })
    }

    fn parse_member(&mut self) -> PResult<ClassMember> {
        if self.check_keyword("constructor") {
            self.tokens.advance();
            let params = self.parse_params()?;
            let body = self.parse_block()?;
            return Ok(ClassMember::Constructor { params, body });
        }

        let name = self.eat_identifier()?;

        if self.check_symbol("(") {
            let params = self.parse_params()?;
            self.eat_symbol(":")?;
            let return_type = self.eat_identifier()?;
            let body = self.parse_block()?;
            return Ok(ClassMember::Method {
                name,
                params,
                return_type,
                body,
            });
        }

        self.eat_symbol(":")?;
        let type_name = self.eat_identifier()?;
        self.eat_optional_semicolon();
        Ok(ClassMember::Field { name, type_name })
    }

    fn parse_params(&mut self) -> PResult<Vec<Parameter>> {
        self.eat_symbol("(")?;
        let mut params = Vec::new();
        if !self.check_symbol(")") {
            params.push(self.parse_param()?);
            while self.check_symbol(",") {
                self.tokens.advance();
                params.push(self.parse_param()?);
            }
        }
        self.eat_symbol(")")?;
        Ok(params)
    }

    fn parse_param(&mut self) -> PResult<Parameter> {
        let name = self.eat_identifier()?;
        self.eat_symbol(":")?;
        let type_name = self.eat_identifier()?;
        Ok(Parameter { name, type_name })
    }

    fn parse_block(&mut self) -> PResult<Vec<Statement>> {
        self.eat_symbol("{")?;
        let mut statements = Vec::new();
        while !self.check_symbol("}") {
            statements.push(self.parse_stmt()?);
        }
        self.eat_symbol("}")?;
        Ok(statements)
    }

    fn parse_stmt(&mut self) -> PResult<Statement> {
        if self.check_keyword("let") {
            self.parse_var_decl()
        } else if self.check_keyword("if") {
            self.parse_if()
        } else if self.check_keyword("return") {
            self.parse_return()
        } else {
            self.parse_expr_stmt()
        }
    }

    fn parse_var_decl(&mut self) -> PResult<Statement> {
        self.eat_keyword("let")?;
        let name = self.eat_identifier()?;
        self.eat_symbol(":")?;
        let type_name = self.eat_identifier()?;
        let initializer = if self.check_symbol("=") {
            self.tokens.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.eat_optional_semicolon();
        Ok(Statement::VariableDeclaration {
            name,
            type_name,
            initializer,
        })
    }

    fn parse_if(&mut self) -> PResult<Statement> {
        self.eat_keyword("if")?;
        self.eat_symbol("(")?;
        let condition = self.parse_expr()?;
        self.eat_symbol(")")?;
        let then_body = self.parse_block()?;
        let else_body = if self.check_keyword("else") {
            self.tokens.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_return(&mut self) -> PResult<Statement> {
        self.eat_keyword("return")?;
        let expr = if self.check_symbol(";") || self.check_symbol("}") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.eat_optional_semicolon();
        Ok(Statement::Return(expr))
    }

    fn parse_expr_stmt(&mut self) -> PResult<Statement> {
        let expr = self.parse_expr()?;
        self.eat_optional_semicolon();
        Ok(Statement::Expression(expr))
    }

    fn parse_expr(&mut self) -> PResult<Expression> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<Expression> {
        let left = self.parse_binary()?;

        if self.check_symbol("=") {
            let eq_token = self.tokens.advance();
            if !matches!(left, Expression::Identifier(_) | Expression::FieldAccess { .. }) {
                return Err(self.error("invalid assignment target", &eq_token));
            }
            let value = self.parse_assignment()?;
            return Ok(Expression::Assignment {
                target: Box::new(left),
                value: Box::new(value),
            });
        }

        Ok(left)
    }

    fn parse_binary(&mut self) -> PResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let token = self.tokens.peek().clone();
            if token.category != TokenCategory::Symbol {
                break;
            }
            let Some(op) = BinaryOperator::from_symbol(&token.lexeme) else {
                break;
            };

            self.tokens.advance();
            let right = self.parse_unary()?;
            left = Expression::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expression> {
        if self.check_symbol("+") || self.check_symbol("-") {
            let token = self.tokens.advance();
            let op = if token.lexeme == "+" {
                UnaryOperator::Plus
            } else {
                UnaryOperator::Minus
            };
            let expr = self.parse_unary()?;
            return Ok(Expression::UnaryOp {
                op,
                expr: Box::new(expr),
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expression> {
        let token = self.tokens.peek().clone();

        let primary = match token.category {
            TokenCategory::Number => {
                self.tokens.advance();
                let value: i64 = token
                    .lexeme
                    .parse()
                    .map_err(|_| self.error("invalid integer literal", &token))?;
                Expression::IntegerLiteral(value)
            }
            TokenCategory::String => {
                self.tokens.advance();
                Expression::StringLiteral(token.lexeme.clone())
            }
            TokenCategory::Keyword if token.lexeme == "true" => {
                self.tokens.advance();
                Expression::BooleanLiteral(true)
            }
            TokenCategory::Keyword if token.lexeme == "false" => {
                self.tokens.advance();
                Expression::BooleanLiteral(false)
            }
            TokenCategory::Keyword if token.lexeme == "this" => {
                self.tokens.advance();
                return self.parse_suffixes(Expression::This);
            }
            TokenCategory::Keyword if token.lexeme == "super" => {
                self.tokens.advance();
                let method = if self.check_symbol(".") {
                    self.tokens.advance();
                    Some(self.eat_identifier()?)
                } else {
                    None
                };
                return self.parse_suffixes(Expression::Super { method });
            }
            TokenCategory::Keyword if token.lexeme == "new" => {
                self.tokens.advance();
                let class_name = self.eat_identifier()?;
                let args = self.parse_args()?;
                Expression::New { class_name, args }
            }
            TokenCategory::Identifier => {
                self.tokens.advance();
                return self.parse_suffixes(Expression::Identifier(token.lexeme.clone()));
            }
            _ => return Err(self.unexpected("an expression", &token)),
        };

        self.parse_suffixes(primary)
    }

    /// Zero-or-more suffix chain of `.` field access or `(...)` calls,
    /// accepted after `this`, `super`, identifiers and `new` results.
    fn parse_suffixes(&mut self, mut expr: Expression) -> PResult<Expression> {
        loop {
            if self.check_symbol(".") {
                self.tokens.advance();
                let field = self.eat_identifier()?;
                expr = Expression::FieldAccess {
                    object: Box::new(expr),
                    field,
                };
            } else if self.check_symbol("(") {
                let args = self.parse_args()?;
                expr = Expression::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> PResult<Vec<Expression>> {
        self.eat_symbol("(")?;
        let mut args = Vec::new();
        if !self.check_symbol(")") {
            args.push(self.parse_expr()?);
            while self.check_symbol(",") {
                self.tokens.advance();
                args.push(self.parse_expr()?);
            }
        }
        self.eat_symbol(")")?;
        Ok(args)
    }
}

pub fn parse(tokens: Vec<Token>, source: impl Into<String>) -> PResult<Program> {
    Parser::new(tokens, source).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_src(src: &str) -> Program {
        let tokens = lex(src).expect("lex should succeed");
        parse(tokens, src).expect("parse should succeed")
    }

    #[test]
    fn parses_flat_precedence_left_to_right() {
        let program = parse_src("print(1 + 2 * 3);");
        let Statement::Expression(Expression::Call { args, .. }) = &program[0] else {
            panic!("expected a call statement");
        };
        assert_eq!(
            args[0],
            Expression::BinaryOp {
                op: BinaryOperator::Multiply,
                left: Box::new(Expression::BinaryOp {
                    op: BinaryOperator::Add,
                    left: Box::new(Expression::IntegerLiteral(1)),
                    right: Box::new(Expression::IntegerLiteral(2)),
                }),
                right: Box::new(Expression::IntegerLiteral(3)),
            }
        );
    }

    #[test]
    fn parses_variable_and_reassignment() {
        let program = parse_src("let x: int = 0; x = x + 1;");
        assert!(matches!(program[0], Statement::VariableDeclaration { .. }));
        let Statement::Expression(Expression::Assignment { target, .. }) = &program[1] else {
            panic!("expected an assignment statement");
        };
        assert_eq!(**target, Expression::Identifier("x".into()));
    }

    #[test]
    fn parses_class_with_constructor_and_method() {
        let src = r#"
            class Dog {
                name: String;
                constructor(name: String) {
                    this.name = name;
                }
                bark(): String {
                    return this.name;
                }
            }
        "#;
        let program = parse_src(src);
        let Statement::ClassDeclaration { members, .. } = &program[0] else {
            panic!("expected a class declaration");
        };
        assert_eq!(members.len(), 3);
        assert!(matches!(members[0], ClassMember::Field { .. }));
        assert!(matches!(members[1], ClassMember::Constructor { .. }));
        assert!(matches!(members[2], ClassMember::Method { .. }));
    }

    #[test]
    fn parses_inheritance() {
        let program = parse_src("class Employee extends Person {}");
        let Statement::ClassDeclaration { super_name, .. } = &program[0] else {
            panic!("expected a class declaration");
        };
        assert_eq!(super_name.as_deref(), Some("Person"));
    }

    #[test]
    fn semicolons_are_optional_everywhere() {
        let with_semi = parse_src("let x: int = 0; print(x);");
        let without_semi = parse_src("let x: int = 0 print(x)");
        assert_eq!(with_semi, without_semi);
    }

    #[test]
    fn assignment_to_non_lvalue_is_a_syntax_error() {
        let tokens = lex("1 = 2;").unwrap();
        let err = parse(tokens, "1 = 2;").unwrap_err();
        assert!(err.message.contains("assignment target"));
    }

    #[test]
    fn reports_position_of_offending_token() {
        let src = "let x int = 0;";
        let tokens = lex(src).unwrap();
        let err = parse(tokens, src).unwrap_err();
        let location = err.location.unwrap();
        assert_eq!((location.line, location.column), (1, 7));
    }

    #[test]
    fn parsing_is_deterministic() {
        let src = "class A extends B { constructor() {} greet(): String { return \"hi\"; } }";
        assert_eq!(parse_src(src), parse_src(src));
    }
}
