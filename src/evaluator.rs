use crate::ast::{BinaryOp, Expr, Parameter, Program, Stmt, UnaryOp};
use crate::error::{LangError, Span};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

/// A variable scope with an optional parent. Scopes are shared
/// (`Rc<RefCell<_>>`) because a function value keeps its defining scope
/// alive as its closure after the block that created it is gone.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    parent: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            parent: None,
        }
    }

    pub fn with_parent(parent: Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Bind in the current scope, silently overwriting.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Resolve through the scope chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.borrow().get(name),
            None => None,
        }
    }

    /// Overwrite an existing binding somewhere on the chain. Returns false
    /// when the name was never declared; assignment does not create
    /// bindings.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().assign(name, value),
            None => false,
        }
    }

    /// Non-failing probe form of `get`.
    pub fn is_defined(&self, name: &str) -> bool {
        if self.values.contains_key(name) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow().is_defined(name),
            None => false,
        }
    }
}

/// A user-declared function. The body is shared so calls do not clone the
/// statement tree; the closure is the environment that was active at the
/// declaration site.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<RefCell<Environment>>,
}

/// Statement outcome. `Return` carries a value up to the nearest
/// function-call boundary instead of unwinding.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// One interpreter session: the global scope, the currently active scope,
/// the process-wide function table and the output sink. Shared across
/// `run_source` calls until `reset`.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    functions: HashMap<String, Function>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Build an interpreter writing program output to `output` instead of
    /// stdout (the GUI shells and the tests inject a sink here).
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        Self {
            environment: Rc::clone(&globals),
            globals,
            functions: HashMap::new(),
            output,
        }
    }

    /// Tokenize, parse and interpret `source` against the shared session
    /// state. This is the REPL entry point.
    pub fn run_source(&mut self, source: &str) -> Result<(), LangError> {
        let tokens = Lexer::new(source.to_string()).scan_tokens()?;
        let program = Parser::new(tokens).parse()?;
        self.interpret(&program)
    }

    /// Execute every top-level statement in order. A `return` that reaches
    /// this level never crossed a call boundary and is an error.
    pub fn interpret(&mut self, program: &Program) -> Result<(), LangError> {
        for statement in &program.statements {
            if let Flow::Return(_) = self.execute(statement)? {
                return Err(LangError::runtime_error(
                    statement.span().clone(),
                    "Return outside function".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Drop all variables and functions together and start from an empty
    /// session.
    pub fn reset(&mut self) {
        self.globals = Rc::new(RefCell::new(Environment::new()));
        self.environment = Rc::clone(&self.globals);
        self.functions.clear();
    }

    /// The global scope, for shells that probe session state.
    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        Rc::clone(&self.globals)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow, LangError> {
        match stmt {
            Stmt::VariableDeclaration {
                name, initializer, ..
            } => {
                // Declared type is advisory; no runtime check happens here
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Void,
                };
                self.environment.borrow_mut().define(name, value);
                Ok(Flow::Normal)
            }

            Stmt::Assignment { name, value, span } => {
                let value = self.evaluate(value)?;
                if self.environment.borrow_mut().assign(name, value) {
                    Ok(Flow::Normal)
                } else {
                    Err(LangError::runtime_error(
                        span.clone(),
                        format!("Undefined variable: {}", name),
                    )
                    .with_help(format!("Declare it first, e.g. int32 {} = 0;", name)))
                }
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                // Branches run directly in the current scope
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_all(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_all(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                // No per-iteration scope; the body mutates enclosing bindings
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute_all(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                // One scope wraps initializer, condition, increment and
                // body, restored on every exit path
                let previous = Rc::clone(&self.environment);
                self.environment = Rc::new(RefCell::new(Environment::with_parent(Rc::clone(
                    &previous,
                ))));

                let result = (|| {
                    if let Some(init) = initializer {
                        self.execute(init)?;
                    }
                    loop {
                        if let Some(cond) = condition {
                            if !self.evaluate(cond)?.is_truthy() {
                                break;
                            }
                        }
                        if let Flow::Return(value) = self.execute_all(body)? {
                            return Ok(Flow::Return(value));
                        }
                        if let Some(inc) = increment {
                            self.execute(inc)?;
                        }
                    }
                    Ok(Flow::Normal)
                })();

                self.environment = previous;
                result
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Void,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Expression { expr, .. } => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Block { statements, .. } => {
                let previous = Rc::clone(&self.environment);
                self.environment = Rc::new(RefCell::new(Environment::with_parent(Rc::clone(
                    &previous,
                ))));
                let result = self.execute_all(statements);
                self.environment = previous;
                result
            }

            Stmt::FunctionDeclaration {
                name,
                parameters,
                body,
                ..
            } => {
                // The active scope becomes the closure; the table itself is
                // process-wide, so declarations are not block-scoped and a
                // redeclaration overwrites
                let function = Function {
                    name: name.clone(),
                    parameters: parameters.clone(),
                    body: Rc::new(body.clone()),
                    closure: Rc::clone(&self.environment),
                };
                self.functions.insert(name.clone(), function);
                Ok(Flow::Normal)
            }
        }
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow, LangError> {
        for statement in statements {
            if let Flow::Return(value) = self.execute(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, LangError> {
        match expr {
            Expr::NumberLiteral { text, span } => number_literal(text, span),
            Expr::StringLiteral { value, .. } => Ok(Value::String(value.clone())),
            Expr::BooleanLiteral { value, .. } => Ok(Value::Bool(*value)),

            Expr::Identifier { name, span } => {
                self.environment.borrow().get(name).ok_or_else(|| {
                    LangError::runtime_error(
                        span.clone(),
                        format!("Undefined variable: {}", name),
                    )
                })
            }

            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary_op(*operator, left, right, span)
            }

            Expr::Unary {
                operator, operand, span,
            } => {
                let operand = self.evaluate(operand)?;
                unary_op(*operator, operand, span)
            }

            Expr::Call {
                name,
                arguments,
                span,
            } => self.call_function(name, arguments, span),
        }
    }

    fn call_function(
        &mut self,
        name: &str,
        arguments: &[Expr],
        span: &Span,
    ) -> Result<Value, LangError> {
        // print/println are intercepted before the function table is
        // consulted; they write each argument in order with no separator
        if name == "print" || name == "println" {
            for argument in arguments {
                let value = self.evaluate(argument)?;
                write!(self.output, "{}", value)
                    .map_err(|e| output_error(&e, span))?;
            }
            if name == "println" {
                writeln!(self.output).map_err(|e| output_error(&e, span))?;
            }
            self.output.flush().map_err(|e| output_error(&e, span))?;
            return Ok(Value::Void);
        }

        let function = match self.functions.get(name) {
            Some(function) => function.clone(),
            None => {
                return Err(LangError::runtime_error(
                    span.clone(),
                    format!("Undefined function: {}", name),
                ));
            }
        };

        if arguments.len() != function.parameters.len() {
            return Err(LangError::runtime_error(
                span.clone(),
                format!(
                    "Expected {} arguments but got {}",
                    function.parameters.len(),
                    arguments.len()
                ),
            ));
        }

        // Arguments are evaluated in the caller's environment, then bound
        // in declaration order in a fresh child of the closure — not of
        // the caller, which is what makes scoping lexical
        let call_env = Rc::new(RefCell::new(Environment::with_parent(Rc::clone(
            &function.closure,
        ))));
        for (parameter, argument) in function.parameters.iter().zip(arguments) {
            let value = self.evaluate(argument)?;
            call_env.borrow_mut().define(&parameter.name, value);
        }

        let previous = Rc::clone(&self.environment);
        self.environment = call_env;
        let result = self.execute_all(&function.body);
        self.environment = previous;

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Void),
        }
    }
}

/// Number tokens keep their raw text; a dot makes a Double, anything else
/// must fit a signed 64-bit integer.
fn number_literal(text: &str, span: &Span) -> Result<Value, LangError> {
    if text.contains('.') {
        text.parse::<f64>().map(Value::Double).map_err(|_| {
            LangError::runtime_error(span.clone(), format!("Invalid number literal: {}", text))
        })
    } else {
        text.parse::<i64>().map(Value::Int).map_err(|_| {
            LangError::runtime_error(
                span.clone(),
                format!("Integer literal out of range: {}", text),
            )
            .with_help("Integer values are signed 64-bit.".to_string())
        })
    }
}

/// Integer arithmetic wraps (two's-complement 64-bit); mixed arithmetic
/// promotes to Double.
fn binary_op(
    operator: BinaryOp,
    left: Value,
    right: Value,
    span: &Span,
) -> Result<Value, LangError> {
    match operator {
        BinaryOp::Add => {
            if let (Value::Int(l), Value::Int(r)) = (&left, &right) {
                return Ok(Value::Int(l.wrapping_add(*r)));
            }
            if matches!(left, Value::Double(_)) || matches!(right, Value::Double(_)) {
                return Ok(Value::Double(
                    to_double(&left, span)? + to_double(&right, span)?,
                ));
            }
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                return Ok(Value::String(format!("{}{}", left, right)));
            }
            Err(LangError::runtime_error(
                span.clone(),
                format!("Cannot add {} and {}", left.type_name(), right.type_name()),
            ))
        }

        BinaryOp::Subtract => {
            if let (Value::Int(l), Value::Int(r)) = (&left, &right) {
                return Ok(Value::Int(l.wrapping_sub(*r)));
            }
            Ok(Value::Double(
                to_double(&left, span)? - to_double(&right, span)?,
            ))
        }

        BinaryOp::Multiply => {
            if let (Value::Int(l), Value::Int(r)) = (&left, &right) {
                return Ok(Value::Int(l.wrapping_mul(*r)));
            }
            Ok(Value::Double(
                to_double(&left, span)? * to_double(&right, span)?,
            ))
        }

        BinaryOp::Divide => {
            if let (Value::Int(l), Value::Int(r)) = (&left, &right) {
                if *r == 0 {
                    return Err(division_by_zero(span));
                }
                return Ok(Value::Int(l.wrapping_div(*r)));
            }
            let divisor = to_double(&right, span)?;
            if divisor == 0.0 {
                return Err(division_by_zero(span));
            }
            Ok(Value::Double(to_double(&left, span)? / divisor))
        }

        BinaryOp::Modulo => {
            if let (Value::Int(l), Value::Int(r)) = (&left, &right) {
                if *r == 0 {
                    return Err(division_by_zero(span));
                }
                return Ok(Value::Int(l.wrapping_rem(*r)));
            }
            Err(LangError::runtime_error(
                span.clone(),
                format!(
                    "Cannot take modulo of {} and {}",
                    left.type_name(),
                    right.type_name()
                ),
            )
            .with_help("'%' is defined for integers only.".to_string()))
        }

        BinaryOp::Equal => Ok(Value::Bool(is_equal(&left, &right, span)?)),
        BinaryOp::NotEqual => Ok(Value::Bool(!is_equal(&left, &right, span)?)),

        BinaryOp::Greater => Ok(Value::Bool(
            to_double(&left, span)? > to_double(&right, span)?,
        )),
        BinaryOp::GreaterEqual => Ok(Value::Bool(
            to_double(&left, span)? >= to_double(&right, span)?,
        )),
        BinaryOp::Less => Ok(Value::Bool(
            to_double(&left, span)? < to_double(&right, span)?,
        )),
        BinaryOp::LessEqual => Ok(Value::Bool(
            to_double(&left, span)? <= to_double(&right, span)?,
        )),

        // Both operands were already evaluated: no short-circuit
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

fn unary_op(operator: UnaryOp, operand: Value, span: &Span) -> Result<Value, LangError> {
    match operator {
        UnaryOp::Negate => match operand {
            Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
            Value::Double(n) => Ok(Value::Double(-n)),
            _ => Err(LangError::runtime_error(
                span.clone(),
                format!("Operand must be a number, got {}", operand.type_name()),
            )),
        },
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
    }
}

/// Kind-aware equality: exact for Int/Int, Bool/Bool and String/String;
/// epsilon-based (1e-7) when a Double is involved; unequal otherwise. A
/// Double compared with a non-number is a conversion error.
fn is_equal(left: &Value, right: &Value, span: &Span) -> Result<bool, LangError> {
    if let (Value::Int(l), Value::Int(r)) = (left, right) {
        return Ok(l == r);
    }
    if matches!(left, Value::Double(_)) || matches!(right, Value::Double(_)) {
        return Ok((to_double(left, span)? - to_double(right, span)?).abs() < 1e-7);
    }
    if let (Value::Bool(l), Value::Bool(r)) = (left, right) {
        return Ok(l == r);
    }
    if let (Value::String(l), Value::String(r)) = (left, right) {
        return Ok(l == r);
    }
    Ok(false)
}

fn to_double(value: &Value, span: &Span) -> Result<f64, LangError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Double(n) => Ok(*n),
        _ => Err(LangError::runtime_error(
            span.clone(),
            format!("Cannot convert to number: {}", value.type_name()),
        )),
    }
}

fn division_by_zero(span: &Span) -> LangError {
    LangError::runtime_error(span.clone(), "Division by zero".to_string())
}

fn output_error(error: &io::Error, span: &Span) -> LangError {
    LangError::runtime_error(span.clone(), format!("Failed to write output: {}", error))
}
