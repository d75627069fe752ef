//! Abstract syntax tree produced by the parser.
//!
//! A closed set of tagged variants for the class-based source language
//! this crate targets. AST nodes are built once by the parser and never
//! mutated afterwards.

use serde::{Deserialize, Serialize};

pub type Program = Vec<Statement>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassMember {
    Field {
        name: String,
        type_name: String,
    },
    Method {
        name: String,
        params: Vec<Parameter>,
        return_type: String,
        body: Vec<Statement>,
    },
    Constructor {
        params: Vec<Parameter>,
        body: Vec<Statement>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    Import {
        module: String,
        alias: Option<String>,
    },
    ClassDeclaration {
        name: String,
        super_name: Option<String>,
        members: Vec<ClassMember>,
    },
    VariableDeclaration {
        name: String,
        type_name: String,
        initializer: Option<Expression>,
    },
    FunctionDeclaration {
        name: String,
        params: Vec<Parameter>,
        return_type: String,
        body: Vec<Statement>,
    },
    Expression(Expression),
    Return(Option<Expression>),
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Option<Vec<Statement>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Self::Add,
            "-" => Self::Subtract,
            "*" => Self::Multiply,
            "/" => Self::Divide,
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            "<" => Self::LessThan,
            ">" => Self::GreaterThan,
            "<=" => Self::LessOrEqual,
            ">=" => Self::GreaterOrEqual,
            _ => return None,
        })
    }

    pub fn as_c_operator(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Plus,
    Minus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    IntegerLiteral(i64),
    StringLiteral(String),
    BooleanLiteral(bool),
    Identifier(String),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    New {
        class_name: String,
        args: Vec<Expression>,
    },
    FieldAccess {
        object: Box<Expression>,
        field: String,
    },
    This,
    Super {
        method: Option<String>,
    },
    Assignment {
        target: Box<Expression>,
        value: Box<Expression>,
    },
}
