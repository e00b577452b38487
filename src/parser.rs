//! Recursive-descent parser for Artemis.
//!
//! Translates the shift/reduce grammar of §4.2 into hand-written descent,
//! since the grammar is small and LL(2)-ish once `declare`/`assign`/
//! `expression` ambiguities are resolved by parsing a full expression first
//! and inspecting what follows (see `parse_statement`). Precedence for
//! binary operators: `+ -` bind tighter than comparisons but looser than
//! `* /`; comparisons are non-associative (only one per expression level).
//!
//! Parse failures bubble up as a single fatal `Err(String)`, matching
//! §4.2's "Parsing failed" contract.

use crate::ast::*;
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, String>;

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser {
            tokens: tokenize(source),
            pos: 0,
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn advance(&mut self) -> TokenKind {
        let k = self.tokens[self.pos].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        k
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn expect(&mut self, kind: &TokenKind) -> PResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(format!(
                "Parsing failed: expected {kind:?}, found {:?} at line {}",
                self.peek(),
                self.line()
            ))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.advance() {
            TokenKind::Ident(name) => Ok(name),
            other => Err(format!(
                "Parsing failed: expected identifier, found {other:?} at line {}",
                self.line()
            )),
        }
    }

    // ---------------------------------------------------------------
    // Program
    // ---------------------------------------------------------------

    pub fn parse(&mut self) -> PResult<Program> {
        let mut using = Vec::new();
        while self.check(&TokenKind::Using) {
            self.advance();
            let module = self.expect_ident()?;
            using.push(Using { module });
        }

        let mut items = Vec::new();
        if self.check(&TokenKind::Eof) {
            return Err("Parsing failed: program has no top-level declarations".to_string());
        }
        while !self.check(&TokenKind::Eof) {
            items.push(self.parse_top_level()?);
        }
        Ok(Program { using, items })
    }

    fn parse_top_level(&mut self) -> PResult<TopLevel> {
        if self.check(&TokenKind::Class) {
            Ok(TopLevel::Class(self.parse_class()?))
        } else {
            Ok(TopLevel::Function(self.parse_function()?))
        }
    }

    fn parse_type(&mut self) -> PResult<TypeName> {
        match self.advance() {
            TokenKind::TypeInt => Ok(TypeName::Int),
            TokenKind::TypeFloat => Ok(TypeName::Float),
            TokenKind::TypeBool => Ok(TypeName::Bool),
            TokenKind::TypeString => Ok(TypeName::String),
            TokenKind::TypeVoid => Ok(TypeName::Void),
            other => Err(format!(
                "Parsing failed: expected type name, found {other:?} at line {}",
                self.line()
            )),
        }
    }

    fn parse_function(&mut self) -> PResult<Function> {
        let return_type = self.parse_type()?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let params = self.parse_param_list()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_statements()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Function {
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let ty = self.parse_type()?;
            let name = self.expect_ident()?;
            params.push(Param { ty, name });
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(params)
    }

    // ---------------------------------------------------------------
    // Classes
    // ---------------------------------------------------------------

    fn parse_class(&mut self) -> PResult<Class> {
        self.expect(&TokenKind::Class)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            members.push(self.parse_class_member()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Class { name, members })
    }

    fn parse_class_member(&mut self) -> PResult<ClassMember> {
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;
        if self.check(&TokenKind::LParen) {
            self.advance();
            let params = self.parse_param_list()?;
            self.expect(&TokenKind::RParen)?;
            self.expect(&TokenKind::LBrace)?;
            let body = self.parse_statements()?;
            self.expect(&TokenKind::RBrace)?;
            Ok(ClassMember::Method(Method {
                return_type: ty,
                name,
                params,
                body,
            }))
        } else if self.check(&TokenKind::Assign) {
            self.advance();
            let default = self.parse_expression()?;
            Ok(ClassMember::Field(Field {
                ty,
                name,
                default: Some(default),
            }))
        } else {
            Ok(ClassMember::Field(Field {
                ty,
                name,
                default: None,
            }))
        }
    }

    // ---------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------

    fn parse_statements(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.peek() {
            TokenKind::Return => {
                self.advance();
                if self.starts_expression() {
                    let e = self.parse_expression()?;
                    Ok(Stmt::Return(e))
                } else {
                    Ok(Stmt::ReturnVoid)
                }
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break)
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue)
            }
            TokenKind::If => self.parse_if_chain(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for_in(),
            TokenKind::TypeList => self.parse_declare_list(),
            TokenKind::TypeAny => self.parse_declare_custom(),
            TokenKind::TypeInt | TokenKind::TypeFloat | TokenKind::TypeBool | TokenKind::TypeString => {
                self.parse_declare()
            }
            _ => self.parse_expr_or_assign_statement(),
        }
    }

    fn parse_declare(&mut self) -> PResult<Stmt> {
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_expression()?;
        Ok(Stmt::Declare { ty, name, value })
    }

    fn parse_declare_list(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::TypeList)?;
        self.expect(&TokenKind::Colon)?;
        let elem_ty = self.parse_type()?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_expression()?;
        Ok(Stmt::DeclareList {
            elem_ty,
            name,
            value,
        })
    }

    fn parse_declare_custom(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::TypeAny)?;
        self.expect(&TokenKind::Colon)?;
        let class_name = self.expect_ident()?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_expression()?;
        Ok(Stmt::DeclareCustom {
            class_name,
            name,
            value,
        })
    }

    fn parse_if_chain(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)?;
        let guard = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_statements()?;
        self.expect(&TokenKind::RBrace)?;

        let mut branches = vec![(Some(guard), body)];
        loop {
            if self.check(&TokenKind::Else) && *self.peek_at(1) == TokenKind::If {
                self.advance(); // else
                self.advance(); // if
                self.expect(&TokenKind::LParen)?;
                let guard = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                self.expect(&TokenKind::LBrace)?;
                let body = self.parse_statements()?;
                self.expect(&TokenKind::RBrace)?;
                branches.push((Some(guard), body));
            } else if self.check(&TokenKind::Else) {
                self.advance();
                self.expect(&TokenKind::LBrace)?;
                let body = self.parse_statements()?;
                self.expect(&TokenKind::RBrace)?;
                branches.push((None, body));
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::IfChain { branches })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let guard = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_statements()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::While { guard, body })
    }

    fn parse_for_in(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LParen)?;
        let elem_ty = self.parse_type()?;
        let var = self.expect_ident()?;
        self.expect(&TokenKind::In)?;
        let list = self.expect_ident()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_statements()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::ForIn {
            elem_ty,
            var,
            list,
            body,
        })
    }

    /// Parses `ID = expr`, `expression.field = expr`, or a bare expression
    /// statement by parsing a full expression first and then checking for a
    /// trailing `=` (§4.2's declare/assign ambiguity resolved here).
    fn parse_expr_or_assign_statement(&mut self) -> PResult<Stmt> {
        let expr = self.parse_expression()?;
        if self.check(&TokenKind::Assign) {
            self.advance();
            let value = self.parse_expression()?;
            let target = match expr {
                Expr::Var(name) => AssignTarget::Name(name),
                Expr::GetAttr { object, field } => AssignTarget::Attr(object, field),
                other => {
                    return Err(format!(
                        "Parsing failed: invalid assignment target {other:?} at line {}",
                        self.line()
                    ))
                }
            };
            Ok(Stmt::Assign { target, value })
        } else {
            Ok(Stmt::Expr(expr))
        }
    }

    fn starts_expression(&self) -> bool {
        !matches!(
            self.peek(),
            TokenKind::RBrace | TokenKind::Eof
        )
    }

    // ---------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::NotEq,
            TokenKind::LtEq => BinOp::LtEq,
            TokenKind::GtEq => BinOp::GtEq,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Gt => BinOp::Gt,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Expr::Binop {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binop {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_postfix()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_postfix()?;
            lhs = Expr::Binop {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    /// Parses a primary expression followed by any chain of `.field`,
    /// `.method(args)`, `++`, or `--` postfix operators.
    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        let mut first = true;
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let name = self.expect_ident()?;
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(&TokenKind::RParen)?;
                    expr = if first {
                        match &expr {
                            Expr::Var(recv) => Expr::CallMethod {
                                receiver: Receiver::Name(recv.clone()),
                                method: name,
                                args,
                            },
                            Expr::This => Expr::CallMethod {
                                receiver: Receiver::This,
                                method: name,
                                args,
                            },
                            _ => Expr::CallMethodExpr {
                                receiver: Box::new(expr),
                                method: name,
                                args,
                            },
                        }
                    } else {
                        Expr::CallMethodExpr {
                            receiver: Box::new(expr),
                            method: name,
                            args,
                        }
                    };
                } else {
                    expr = Expr::GetAttr {
                        object: Box::new(expr),
                        field: name,
                    };
                }
                first = false;
                continue;
            }
            if self.check(&TokenKind::PlusPlus) {
                self.advance();
                expr = Expr::PostInc(Box::new(expr));
                continue;
            }
            if self.check(&TokenKind::MinusMinus) {
                self.advance();
                expr = Expr::PostDec(Box::new(expr));
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match self.peek().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Float(f))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::This)
            }
            TokenKind::LParen => {
                self.advance();
                let e = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(e)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    elements.push(self.parse_expression()?);
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        elements.push(self.parse_expression()?);
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(Expr::ListLiteral(elements))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(&TokenKind::RParen)?;
                    // `name(args)` is either a function call or an object
                    // construction; which one is decided in codegen by
                    // consulting the class registry (§4.5), not here.
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(format!(
                "Parsing failed: unexpected token {other:?} at line {}",
                self.line()
            )),
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }
        args.push(self.parse_expression()?);
        while self.check(&TokenKind::Comma) {
            self.advance();
            args.push(self.parse_expression()?);
        }
        Ok(args)
    }
}

/// Parses a complete Artemis source file.
pub fn parse(source: &str) -> Result<Program, String> {
    Parser::new(source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello_world_style_program() {
        let src = "using io\nint _exec() { io.print('hi'); return 0; }";
        let program = parse(src).unwrap();
        assert_eq!(program.using, vec![Using { module: "io".to_string() }]);
        assert_eq!(program.items.len(), 1);
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let program = parse("int _exec() { int x = 2 + 3 * 4; return x; }").unwrap();
        let TopLevel::Function(f) = &program.items[0] else { panic!() };
        let Stmt::Declare { value, .. } = &f.body[0] else { panic!() };
        // 2 + (3 * 4): the top-level op must be '+'.
        let Expr::Binop { op, rhs, .. } = value else { panic!() };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(**rhs, Expr::Binop { op: BinOp::Mul, .. }));
    }

    #[test]
    fn parses_class_with_field_and_method() {
        let src = "class P { int x  int get_x() { return this.x; } }";
        let program = parse(src).unwrap();
        let TopLevel::Class(c) = &program.items[0] else { panic!() };
        assert_eq!(c.members.len(), 2);
        assert!(matches!(c.members[0], ClassMember::Field(_)));
        assert!(matches!(c.members[1], ClassMember::Method(_)));
    }

    #[test]
    fn parses_if_else_chain() {
        let src = "int _exec() { if (true) { return 1; } else if (false) { return 2; } else { return 3; } }";
        let program = parse(src).unwrap();
        let TopLevel::Function(f) = &program.items[0] else { panic!() };
        let Stmt::IfChain { branches } = &f.body[0] else { panic!() };
        assert_eq!(branches.len(), 3);
        assert!(branches[2].0.is_none());
    }

    #[test]
    fn parses_list_declaration_and_for_in() {
        let src = "int _exec() { list:int xs = [1, 2, 3]; for (int v in xs) { v; } return 0; }";
        let program = parse(src).unwrap();
        let TopLevel::Function(f) = &program.items[0] else { panic!() };
        assert!(matches!(f.body[0], Stmt::DeclareList { .. }));
        assert!(matches!(f.body[1], Stmt::ForIn { .. }));
    }

    #[test]
    fn rejects_malformed_program() {
        assert!(parse("int _exec( { }").is_err());
    }
}
