//! Tree-walking interpreter.
//!
//! A mutable `Object` model with inheritance-aware method dispatch.
//! Method frames are a *fresh clone* of the caller's environment
//! rather than a parent-pointer chain — an explicit, not incidental,
//! design choice that this module preserves literally.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::io::Write;
use std::rc::Rc;

use crate::ast::{BinaryOperator, ClassMember, Expression, Program, Statement, UnaryOperator};
use crate::typechecker::ClassTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError(pub String);

impl Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RuntimeError {}

fn error(message: impl Into<String>) -> RuntimeError {
    RuntimeError(message.into())
}

/// Integer division rounding toward negative infinity, unlike `/`'s
/// truncation-toward-zero or `div_euclid`'s always-nonnegative
/// remainder. `7 / -2` is `-4`; `-7 / -2` is `3`.
fn floor_div(l: i64, r: i64) -> i64 {
    let q = l / r;
    if (l % r != 0) && ((l % r < 0) != (r < 0)) {
        q - 1
    } else {
        q
    }
}

type RResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone)]
pub struct ObjectData {
    pub class_name: String,
    pub fields: HashMap<String, Value>,
}

pub type ObjectRef = Rc<RefCell<ObjectData>>;

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    StringValue(String),
    BooleanValue(bool),
    Object(ObjectRef),
    ClassRef(String),
    Null,
}

impl Value {
    /// The value-to-string rule used by `print` and by string
    /// concatenation.
    pub fn display(&self) -> String {
        match self {
            Value::Integer(n) => n.to_string(),
            Value::StringValue(s) => s.clone(),
            Value::BooleanValue(b) => b.to_string(),
            Value::Object(obj) => format!("<{} object>", obj.borrow().class_name),
            Value::ClassRef(name) => format!("<{name} class>"),
            Value::Null => "null".to_owned(),
        }
    }

    fn truthy(&self) -> RResult<bool> {
        match self {
            Value::Integer(n) => Ok(*n != 0),
            Value::BooleanValue(b) => Ok(*b),
            other => Err(error(format!(
                "invalid condition value: {}",
                other.display()
            ))),
        }
    }
}

/// A name-to-value mapping.
pub type Environment = HashMap<String, Value>;

/// Signals a `return` bubbling up out of the innermost
/// method/constructor frame; `None` means execution fell through.
enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<'a> {
    class_table: &'a ClassTable,
    classes: HashMap<String, &'a Vec<ClassMember>>,
    globals: Environment,
    out: &'a mut dyn Write,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a Program, class_table: &'a ClassTable, out: &'a mut dyn Write) -> Self {
        let mut classes = HashMap::new();
        let mut globals = Environment::new();

        for statement in program {
            if let Statement::ClassDeclaration { name, members, .. } = statement {
                classes.insert(name.clone(), members);
                globals.insert(name.clone(), Value::ClassRef(name.clone()));
            }
        }

        Self {
            class_table,
            classes,
            globals,
            out,
        }
    }

    pub fn run(&mut self, program: &Program) -> RResult<()> {
        let mut env = Environment::new();
        for statement in program {
            if let Flow::Return(_) = self.run_statement(statement, &mut env)? {
                break;
            }
        }
        Ok(())
    }

    fn lookup(&self, env: &Environment, name: &str) -> RResult<Value> {
        if let Some(value) = env.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        Err(error(format!("unknown identifier '{name}'")))
    }

    fn run_statement(&mut self, statement: &Statement, env: &mut Environment) -> RResult<Flow> {
        match statement {
            Statement::Import { .. } => Ok(Flow::Normal),
            Statement::ClassDeclaration { .. } => Ok(Flow::Normal),
            Statement::FunctionDeclaration { .. } => Ok(Flow::Normal),
            Statement::VariableDeclaration {
                name, initializer, ..
            } => {
                let value = match initializer {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Null,
                };
                env.insert(name.clone(), value);
                Ok(Flow::Normal)
            }
            Statement::Expression(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Statement::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                if self.eval(condition, env)?.truthy()? {
                    self.run_block(then_body, env)
                } else if let Some(else_body) = else_body {
                    self.run_block(else_body, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
        }
    }

    fn run_block(&mut self, body: &[Statement], env: &mut Environment) -> RResult<Flow> {
        for statement in body {
            match self.run_statement(statement, env)? {
                Flow::Normal => continue,
                returned @ Flow::Return(_) => return Ok(returned),
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs a method/constructor body in its own frame and collapses a
    /// `return` into its carried value (`Null` if the body falls
    /// through without one).
    fn run_frame(&mut self, body: &[Statement], env: &mut Environment) -> RResult<Value> {
        match self.run_block(body, env)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }

    fn eval(&mut self, expr: &Expression, env: &mut Environment) -> RResult<Value> {
        match expr {
            Expression::IntegerLiteral(n) => Ok(Value::Integer(*n)),
            Expression::StringLiteral(s) => Ok(Value::StringValue(s.clone())),
            Expression::BooleanLiteral(b) => Ok(Value::BooleanValue(*b)),
            Expression::Identifier(name) => self.lookup(env, name),
            Expression::This => self.lookup(env, "this"),
            Expression::Super { .. } => self.lookup(env, "this"),
            Expression::BinaryOp { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.eval_binary(*op, left, right)
            }
            Expression::UnaryOp { op, expr } => {
                let value = self.eval(expr, env)?;
                self.eval_unary(*op, value)
            }
            Expression::New { class_name, args } => self.eval_new(class_name, args, env),
            Expression::FieldAccess { object, field } => {
                let receiver = self.eval(object, env)?;
                self.eval_field_access(&receiver, field)
            }
            Expression::Call { callee, args } => self.eval_call(callee, args, env),
            Expression::Assignment { target, value } => {
                let value = self.eval(value, env)?;
                self.eval_assignment(target, value, env)
            }
        }
    }

    fn eval_new(
        &mut self,
        class_name: &str,
        args: &[Expression],
        env: &mut Environment,
    ) -> RResult<Value> {
        if !self.classes.contains_key(class_name) {
            return Err(error(format!("unknown class '{class_name}'")));
        }

        let mut fields = HashMap::new();
        let mut current = Some(class_name.to_owned());
        while let Some(name) = current {
            let Some(info) = self.class_table.get(name.as_str()) else {
                break;
            };
            for (field_name, _) in &info.fields {
                fields.entry(field_name.clone()).or_insert(Value::Null);
            }
            current = info.super_name.clone();
        }

        let object: ObjectRef = Rc::new(RefCell::new(ObjectData {
            class_name: class_name.to_owned(),
            fields,
        }));

        if let Some((owner, ClassMember::Constructor { params, body })) =
            self.find_constructor(class_name)
        {
            let arg_values = self.eval_args(args, env)?;
            if arg_values.len() != params.len() {
                return Err(error(format!(
                    "constructor of '{owner}' expects {} argument(s), got {}",
                    params.len(),
                    arg_values.len()
                )));
            }

            let mut frame = env.clone();
            frame.insert("this".to_owned(), Value::Object(object.clone()));
            frame.insert("__class__".to_owned(), Value::ClassRef(owner.clone()));
            for (param, value) in params.iter().zip(arg_values) {
                frame.insert(param.name.clone(), value);
            }

            self.run_frame(body, &mut frame)?;
        }

        Ok(Value::Object(object))
    }

    fn find_constructor(&self, class_name: &str) -> Option<(String, ClassMember)> {
        let members = self.classes.get(class_name)?;
        for member in *members {
            if let ClassMember::Constructor { .. } = member {
                return Some((class_name.to_owned(), member.clone()));
            }
        }
        None
    }

    /// Resolves `method` by walking up the `super_name` chain starting
    /// at `class_name`, returning the defining class's name alongside
    /// the member.
    fn find_method(&self, class_name: &str, method: &str) -> Option<(String, ClassMember)> {
        let mut current = class_name.to_owned();
        loop {
            let members = self.classes.get(current.as_str())?;
            for member in *members {
                if let ClassMember::Method { name, .. } = member {
                    if name == method {
                        return Some((current.clone(), member.clone()));
                    }
                }
            }
            current = self.class_table.get(current.as_str())?.super_name.clone()?;
        }
    }

    fn eval_field_access(&self, receiver: &Value, field: &str) -> RResult<Value> {
        match receiver {
            Value::Object(obj) => Ok(obj.borrow().fields.get(field).cloned().unwrap_or(Value::Null)),
            Value::ClassRef(name) => Ok(Value::ClassRef(name.clone())),
            other => Err(error(format!(
                "cannot access field '{field}' on {}",
                other.display()
            ))),
        }
    }

    fn eval_args(&mut self, args: &[Expression], env: &mut Environment) -> RResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, env)).collect()
    }

    fn eval_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        env: &mut Environment,
    ) -> RResult<Value> {
        if let Expression::Identifier(name) = callee {
            if name == "print" {
                return self.eval_print(args, env);
            }
        }

        if let Expression::Super { method } = callee {
            return self.eval_super_call(method.as_deref(), args, env);
        }

        let Expression::FieldAccess { object, field } = callee else {
            return Err(error("call target must be 'print' or a method access"));
        };

        let receiver = self.eval(object, env)?;
        let arg_values = self.eval_args(args, env)?;

        match &receiver {
            Value::Object(obj) => {
                let class_name = obj.borrow().class_name.clone();
                let Some((owner, ClassMember::Method { params, body, .. })) =
                    self.find_method(&class_name, field)
                else {
                    return Err(error(format!(
                        "method '{field}' not found on class '{class_name}'"
                    )));
                };
                self.invoke(&owner, &params, &body, arg_values, Some(receiver.clone()), env)
            }
            Value::ClassRef(class_name) => {
                let Some((owner, ClassMember::Method { params, body, .. })) =
                    self.find_method(class_name, field)
                else {
                    return Err(error(format!(
                        "method '{field}' not found on class '{class_name}'"
                    )));
                };
                self.invoke(&owner, &params, &body, arg_values, None, env)
            }
            other => Err(error(format!(
                "cannot call method '{field}' on {}",
                other.display()
            ))),
        }
    }

    /// `super.method(...)`: resolves `method` starting one class above
    /// the class whose body is currently executing, bypassing any
    /// override made by that class itself, and invokes it with the
    /// current `this`.
    fn eval_super_call(
        &mut self,
        method: Option<&str>,
        args: &[Expression],
        env: &mut Environment,
    ) -> RResult<Value> {
        let method =
            method.ok_or_else(|| error("'super(...)' constructor calls are not supported"))?;
        let Some(Value::ClassRef(current_class)) = env.get("__class__").cloned() else {
            return Err(error("'super' used outside of a method body"));
        };
        let this = self.lookup(env, "this")?;
        let super_name = self
            .class_table
            .get(current_class.as_str())
            .and_then(|info| info.super_name.clone())
            .ok_or_else(|| error(format!("class '{current_class}' has no superclass")))?;

        let Some((owner, ClassMember::Method { params, body, .. })) =
            self.find_method(&super_name, method)
        else {
            return Err(error(format!(
                "method '{method}' not found on superclass '{super_name}'"
            )));
        };

        let arg_values = self.eval_args(args, env)?;
        self.invoke(&owner, &params, &body, arg_values, Some(this), env)
    }

    fn invoke(
        &mut self,
        owner: &str,
        params: &[crate::ast::Parameter],
        body: &[Statement],
        arg_values: Vec<Value>,
        this: Option<Value>,
        caller_env: &Environment,
    ) -> RResult<Value> {
        let mut frame = caller_env.clone();
        frame.insert("__class__".to_owned(), Value::ClassRef(owner.to_owned()));
        if let Some(this) = this {
            frame.insert("this".to_owned(), this);
        }
        for (param, value) in params.iter().zip(arg_values) {
            frame.insert(param.name.clone(), value);
        }
        self.run_frame(body, &mut frame)
    }

    fn eval_print(&mut self, args: &[Expression], env: &mut Environment) -> RResult<Value> {
        let values = self.eval_args(args, env)?;
        let rendered: Vec<String> = values.iter().map(Value::display).collect();
        writeln!(self.out, "{}", rendered.join(" ")).map_err(|e| error(e.to_string()))?;
        Ok(Value::Null)
    }

    fn eval_assignment(
        &mut self,
        target: &Expression,
        value: Value,
        env: &mut Environment,
    ) -> RResult<Value> {
        match target {
            Expression::Identifier(name) => {
                env.insert(name.clone(), value.clone());
                Ok(value)
            }
            Expression::FieldAccess { object, field } => {
                let receiver = self.eval(object, env)?;
                let Value::Object(obj) = receiver else {
                    return Err(error("cannot assign to a field of a non-object value"));
                };
                obj.borrow_mut().fields.insert(field.clone(), value.clone());
                Ok(value)
            }
            _ => Err(error("invalid assignment target")),
        }
    }

    fn eval_binary(&self, op: BinaryOperator, left: Value, right: Value) -> RResult<Value> {
        use BinaryOperator::*;

        if op == Add {
            if matches!(left, Value::StringValue(_)) || matches!(right, Value::StringValue(_)) {
                return Ok(Value::StringValue(format!(
                    "{}{}",
                    left.display(),
                    right.display()
                )));
            }
        }

        let (Value::Integer(l), Value::Integer(r)) = (&left, &right) else {
            return Err(error(format!(
                "unsupported operand types for binary operator: {} and {}",
                left.display(),
                right.display()
            )));
        };
        let (l, r) = (*l, *r);

        Ok(match op {
            Add => Value::Integer(l + r),
            Subtract => Value::Integer(l - r),
            Multiply => Value::Integer(l * r),
            Divide => {
                if r == 0 {
                    return Err(error("division by zero"));
                }
                Value::Integer(floor_div(l, r))
            }
            Equal => Value::Integer((l == r) as i64),
            NotEqual => Value::Integer((l != r) as i64),
            LessThan => Value::Integer((l < r) as i64),
            GreaterThan => Value::Integer((l > r) as i64),
            LessOrEqual => Value::Integer((l <= r) as i64),
            GreaterOrEqual => Value::Integer((l >= r) as i64),
        })
    }

    fn eval_unary(&self, op: UnaryOperator, value: Value) -> RResult<Value> {
        let Value::Integer(n) = value else {
            return Err(error(format!(
                "unsupported operand type for unary operator: {}",
                value.display()
            )));
        };
        Ok(match op {
            UnaryOperator::Plus => Value::Integer(n),
            UnaryOperator::Minus => Value::Integer(-n),
        })
    }
}

pub fn interpret(
    program: &Program,
    class_table: &ClassTable,
    out: &mut dyn Write,
) -> RResult<()> {
    let mut interpreter = Interpreter::new(program, class_table, out);
    interpreter.run(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use crate::typechecker::check;

    fn run_src(src: &str) -> String {
        let tokens = lex(src).unwrap();
        let program = parse(tokens, src).unwrap();
        let (table, errors) = check(&program, src);
        assert!(errors.is_empty(), "unexpected type errors: {errors}");
        let mut out = Vec::new();
        interpret(&program, &table, &mut out).expect("interpretation should succeed");
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn s1_arithmetic_print_is_left_to_right() {
        assert_eq!(run_src("print(1 + 2 * 3);"), "9\n");
    }

    #[test]
    fn division_rounds_toward_negative_infinity() {
        assert_eq!(run_src("print(7 / -2);"), "-4\n");
        assert_eq!(run_src("print(-7 / -2);"), "3\n");
        assert_eq!(run_src("print(-7 / 2);"), "-4\n");
        assert_eq!(run_src("print(7 / 2);"), "3\n");
    }

    #[test]
    fn s2_variable_and_reassignment() {
        assert_eq!(
            run_src("let x: int = 0; x = x + 1; x = x + 1; print(x);"),
            "2\n"
        );
    }

    #[test]
    fn s3_class_with_constructor_and_method() {
        let src = r#"
            class Dog {
                name: string;
                constructor(name: string) { this.name = name; }
                bark(): string { return this.name + " says woof!"; }
            }
            let d: Dog = new Dog("Rex");
            print(d.bark());
        "#;
        assert_eq!(run_src(src), "Rex says woof!\n");
    }

    #[test]
    fn s4_inheritance_dispatch_reaches_super_impl() {
        let src = r#"
            class Person {
                greet(): string { return "hi from person"; }
            }
            class Employee extends Person {}
            let e: Employee = new Employee();
            print(e.greet());
        "#;
        assert_eq!(run_src(src), "hi from person\n");
    }

    #[test]
    fn inheritance_dispatch_prefers_override() {
        let src = r#"
            class Person {
                greet(): string { return "hi from person"; }
            }
            class Employee extends Person {
                greet(): string { return "hi from employee"; }
            }
            let e: Employee = new Employee();
            print(e.greet());
        "#;
        assert_eq!(run_src(src), "hi from employee\n");
    }

    #[test]
    fn super_call_bypasses_the_overriding_method() {
        let src = r#"
            class Person {
                greet(): string { return "hi from person"; }
            }
            class Employee extends Person {
                greet(): string { return super.greet() + " (employee)"; }
            }
            let e: Employee = new Employee();
            print(e.greet());
        "#;
        assert_eq!(run_src(src), "hi from person (employee)\n");
    }

    #[test]
    fn super_outside_a_method_is_a_runtime_error() {
        let src = "print(super.greet());";
        let tokens = lex(src).unwrap();
        let program = parse(tokens, src).unwrap();
        let (table, _) = check(&program, src);
        let mut out = Vec::new();
        let err = interpret(&program, &table, &mut out).unwrap_err();
        assert!(err.0.contains("super"));
    }

    #[test]
    fn if_else_picks_exactly_one_branch() {
        let src = "if (1) { print(\"yes\"); } else { print(\"no\"); }";
        assert_eq!(run_src(src), "yes\n");
    }

    #[test]
    fn print_joins_with_single_space() {
        assert_eq!(run_src("print(1, \"two\", true);"), "1 two true\n");
    }

    #[test]
    fn unknown_identifier_is_a_runtime_error() {
        let tokens = lex("print(missing);").unwrap();
        let program = parse(tokens, "print(missing);").unwrap();
        let (table, _) = check(&program, "print(missing);");
        let mut out = Vec::new();
        let err = interpret(&program, &table, &mut out).unwrap_err();
        assert!(err.0.contains("missing"));
    }
}
