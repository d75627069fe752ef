//! Declaration-level type checker.
//!
//! Three passes over the `Program`: header collection, member
//! population, then validation of supertypes and variable types.
//! Deliberately does not recurse into method/constructor bodies —
//! body-level checks are out of scope. Errors accumulate into an
//! `ErrorCollector` rather than aborting at the first one.

use std::collections::HashMap;

use crate::ast::{ClassMember, Program, Statement};
use crate::diagnostics::{CompileError, ErrorCollector};

const BUILTIN_TYPES: &[&str] = &["int", "string", "bool", "void"];

fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.iter().any(|b| b.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub param_types: Vec<String>,
    pub return_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorSignature {
    pub param_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassInfo {
    pub super_name: Option<String>,
    pub fields: Vec<(String, String)>,
    pub methods: HashMap<String, MethodSignature>,
    pub constructor: Option<ConstructorSignature>,
}

pub type ClassTable = HashMap<String, ClassInfo>;

/// `isSubtype(a, b)`: reflexive, `false` if either side is `void`,
/// otherwise `true` iff following `super_name` links from `a`
/// eventually reaches `b`.
pub fn is_subtype(table: &ClassTable, a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case("void") || b.eq_ignore_ascii_case("void") {
        return false;
    }
    if a == b {
        return true;
    }

    let mut current = a;
    while let Some(info) = table.get(current) {
        match &info.super_name {
            Some(super_name) if super_name == b => return true,
            Some(super_name) => current = super_name.as_str(),
            None => break,
        }
    }
    false
}

pub struct TypeChecker<'a> {
    program: &'a Program,
    source: &'a str,
}

impl<'a> TypeChecker<'a> {
    pub fn new(program: &'a Program, source: &'a str) -> Self {
        Self { program, source }
    }

    pub fn check(&self) -> (ClassTable, ErrorCollector) {
        let mut errors = ErrorCollector::new();
        let mut table = self.collect_headers(&mut errors);
        self.populate_members(&mut table);
        self.validate(&table, &mut errors);
        (table, errors)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(message, self.source)
    }

    fn collect_headers(&self, errors: &mut ErrorCollector) -> ClassTable {
        let mut table = ClassTable::new();
        for statement in self.program {
            if let Statement::ClassDeclaration { name, .. } = statement {
                if table.contains_key(name) {
                    errors.push(self.error(format!("Duplicate class {name}")));
                    continue;
                }
                table.insert(name.clone(), ClassInfo::default());
            }
        }
        table
    }

    fn populate_members(&self, table: &mut ClassTable) {
        for statement in self.program {
            let Statement::ClassDeclaration {
                name,
                super_name,
                members,
            } = statement
            else {
                continue;
            };

            // A duplicate declaration was already reported during header
            // collection; keep the first one's entry untouched.
            let Some(info) = table.get_mut(name) else {
                continue;
            };
            if info.super_name.is_some() || !info.fields.is_empty() || info.constructor.is_some() {
                continue;
            }

            info.super_name = super_name.clone();

            for member in members {
                match member {
                    ClassMember::Field { name, type_name } => {
                        info.fields.push((name.clone(), type_name.clone()));
                    }
                    ClassMember::Method {
                        name,
                        params,
                        return_type,
                        ..
                    } => {
                        info.methods.insert(
                            name.clone(),
                            MethodSignature {
                                param_types: params.iter().map(|p| p.type_name.clone()).collect(),
                                return_type: return_type.clone(),
                            },
                        );
                    }
                    ClassMember::Constructor { params, .. } => {
                        info.constructor = Some(ConstructorSignature {
                            param_types: params.iter().map(|p| p.type_name.clone()).collect(),
                        });
                    }
                }
            }
        }
    }

    fn type_exists(&self, table: &ClassTable, name: &str) -> bool {
        is_builtin_type(name) || table.contains_key(name)
    }

    fn validate(&self, table: &ClassTable, errors: &mut ErrorCollector) {
        for statement in self.program {
            match statement {
                Statement::ClassDeclaration {
                    name, super_name, ..
                } => {
                    if let Some(super_name) = super_name {
                        if !table.contains_key(super_name) {
                            errors.push(self.error(format!(
                                "Class {name} extends unknown {super_name}"
                            )));
                        }
                    }
                }
                Statement::VariableDeclaration {
                    name, type_name, ..
                } => {
                    if !self.type_exists(table, type_name) {
                        errors.push(self.error(format!("Unknown type {type_name} in var {name}")));
                    }
                }
                _ => {}
            }
        }
    }
}

pub fn check(program: &Program, source: &str) -> (ClassTable, ErrorCollector) {
    TypeChecker::new(program, source).check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn check_src(src: &str) -> (ClassTable, ErrorCollector) {
        let tokens = lex(src).unwrap();
        let program = parse(tokens, src).unwrap();
        check(&program, src)
    }

    #[test]
    fn duplicate_class_is_one_error() {
        let (_, errors) = check_src("class Foo {} class Foo {}");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.iter().next().unwrap().message, "Duplicate class Foo");
    }

    #[test]
    fn unknown_supertype_is_reported() {
        let (_, errors) = check_src("class A extends B {}");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.iter().next().unwrap().message,
            "Class A extends unknown B"
        );
    }

    #[test]
    fn unknown_variable_type_is_reported() {
        let (_, errors) = check_src("let x: Bogus = 0;");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.iter().next().unwrap().message,
            "Unknown type Bogus in var x"
        );
    }

    #[test]
    fn builtin_types_are_case_insensitive() {
        let (_, errors) = check_src("let x: INT = 0; let y: Bool = true;");
        assert!(errors.is_empty());
    }

    #[test]
    fn well_formed_program_has_no_errors() {
        let (table, errors) = check_src(
            r#"
            class Person {
                name: string;
                greet(): string { return this.name; }
            }
            class Employee extends Person {}
            let e: Employee = new Employee();
            "#,
        );
        assert!(errors.is_empty());
        assert!(is_subtype(&table, "Employee", "Person"));
        assert!(!is_subtype(&table, "Person", "Employee"));
        assert!(is_subtype(&table, "Person", "Person"));
    }

    #[test]
    fn checker_is_idempotent() {
        let src = "class A extends B {} let x: Bogus = 0;";
        let tokens = lex(src).unwrap();
        let program = parse(tokens, src).unwrap();
        let (table1, errors1) = check(&program, src);
        let (table2, errors2) = check(&program, src);
        assert_eq!(table1, table2);
        assert_eq!(errors1, errors2);
    }
}
