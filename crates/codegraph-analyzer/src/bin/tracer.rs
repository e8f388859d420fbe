//! `codegraph-analyzer-tracer` (§4.9): a deterministic, bounded
//! interpreter over a Python-subset CST. Reads a `TracePayload` from
//! stdin, walks the tree-sitter-python tree statement by statement,
//! emits one `TraceStep` per executed statement, and writes a
//! `TraceResult` to stdout. Not a CPython embed — literals, arithmetic,
//! comparison and boolean operators, assignment, if/elif/else, for/while,
//! function def/call/return, and print only.

use codegraph_analyzer::types::{LineAction, TracePayload, TraceResult, TraceStep, VARIABLE_KEY_LIMIT, VARIABLE_VALUE_CHAR_LIMIT};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use tree_sitter::{Node, Parser};

fn main() {
    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        emit(TraceResult {
            steps: Vec::new(),
            final_output: String::new(),
            error: Some("failed to read stdin".to_string()),
            error_code: Some("io_error".to_string()),
            truncated: false,
        });
        return;
    }

    let payload: TracePayload = match serde_json::from_str(&input) {
        Ok(p) => p,
        Err(e) => {
            emit(TraceResult {
                steps: Vec::new(),
                final_output: String::new(),
                error: Some(format!("malformed payload: {e}")),
                error_code: Some("invalid_request".to_string()),
                truncated: false,
            });
            return;
        }
    };

    let mut parser = Parser::new();
    if parser.set_language(&tree_sitter_python::LANGUAGE.into()).is_err() {
        emit(TraceResult {
            steps: Vec::new(),
            final_output: String::new(),
            error: Some("failed to load the python grammar".to_string()),
            error_code: Some("internal_error".to_string()),
            truncated: false,
        });
        return;
    }
    let Some(tree) = parser.parse(&payload.code, None) else {
        emit(TraceResult {
            steps: Vec::new(),
            final_output: String::new(),
            error: Some("syntax error".to_string()),
            error_code: Some("parse_error".to_string()),
            truncated: false,
        });
        return;
    };

    let mut interp = Interpreter::new(&payload.code, &payload.line_actions, payload.max_steps);
    let result = interp.run(tree.root_node());
    emit(interp.into_result(result));
}

fn emit(result: TraceResult) {
    let out = serde_json::to_string(&result).unwrap_or_else(|_| "{\"steps\":[],\"final_output\":\"\",\"truncated\":false}".to_string());
    let _ = std::io::stdout().write_all(out.as_bytes());
}

#[derive(Debug, Clone)]
enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    None,
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::None => false,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn repr(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format!("{f}"),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::List(items) => format!("[{}]", items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")),
            Value::None => "None".to_string(),
        }
    }
}

enum Flow {
    Normal,
    Return(Value),
}

struct FunctionDef<'a> {
    params: Vec<String>,
    body: Node<'a>,
}

struct Interpreter<'a> {
    source: &'a str,
    line_actions: &'a BTreeMap<usize, LineAction>,
    max_steps: usize,
    steps: Vec<TraceStep>,
    scopes: Vec<HashMap<String, Value>>,
    call_stack: Vec<String>,
    functions: HashMap<String, FunctionDef<'a>>,
    output: String,
    truncated: bool,
}

impl<'a> Interpreter<'a> {
    fn new(source: &'a str, line_actions: &'a BTreeMap<usize, LineAction>, max_steps: usize) -> Self {
        Self {
            source,
            line_actions,
            max_steps,
            steps: Vec::new(),
            scopes: vec![HashMap::new()],
            call_stack: Vec::new(),
            functions: HashMap::new(),
            output: String::new(),
            truncated: false,
        }
    }

    fn text(&self, node: Node<'a>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn run(&mut self, root: Node<'a>) -> Result<Flow, String> {
        self.exec_block(root)
    }

    fn into_result(self, outcome: Result<Flow, String>) -> TraceResult {
        let (error, error_code) = match outcome {
            Ok(_) => (None, None),
            Err(message) => (Some(message), Some("execution_error".to_string())),
        };
        TraceResult { steps: self.steps, final_output: self.output, error, error_code, truncated: self.truncated }
    }

    fn budget_exhausted(&mut self) -> bool {
        if self.steps.len() >= self.max_steps {
            self.truncated = true;
            true
        } else {
            false
        }
    }

    fn record(&mut self, line: usize, action: LineAction, description: String, output_delta: Option<String>) {
        let variables = self.snapshot_variables();
        self.steps.push(TraceStep {
            line,
            action,
            description,
            variables,
            call_stack: self.call_stack.clone(),
            output: output_delta,
        });
    }

    fn snapshot_variables(&self) -> BTreeMap<String, String> {
        let scope = self.scopes.last().expect("interpreter always has at least one scope");
        let mut names: Vec<&String> = scope.keys().collect();
        names.sort();
        names.truncate(VARIABLE_KEY_LIMIT);
        names
            .into_iter()
            .map(|name| {
                let mut repr = scope[name].repr();
                if repr.chars().count() > VARIABLE_VALUE_CHAR_LIMIT {
                    repr = repr.chars().take(VARIABLE_VALUE_CHAR_LIMIT).collect::<String>() + "\u{2026}";
                }
                (name.clone(), repr)
            })
            .collect()
    }

    fn default_action(&self, node: Node) -> LineAction {
        let line = node.start_position().row + 1;
        self.line_actions.get(&line).copied().unwrap_or(LineAction::Execute)
    }

    fn exec_block(&mut self, node: Node<'a>) -> Result<Flow, String> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            if self.budget_exhausted() {
                return Ok(Flow::Normal);
            }
            match self.exec_statement(child)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_statement(&mut self, node: Node<'a>) -> Result<Flow, String> {
        let line = node.start_position().row + 1;
        match node.kind() {
            "function_definition" => {
                let Some(name_node) = node.child_by_field_name("name") else { return Ok(Flow::Normal) };
                let name = self.text(name_node).to_string();
                let params = node
                    .child_by_field_name("parameters")
                    .map(|p| {
                        let mut cursor = p.walk();
                        p.named_children(&mut cursor).map(|n| self.text(n).to_string()).collect()
                    })
                    .unwrap_or_default();
                let body = node.child_by_field_name("body").ok_or("function has no body")?;
                self.functions.insert(name.clone(), FunctionDef { params, body });
                self.record(line, LineAction::Execute, format!("def {name}"), None);
                Ok(Flow::Normal)
            }
            "expression_statement" => {
                let action = self.default_action(node);
                if let Some(inner) = node.named_child(0) {
                    if inner.kind() == "assignment" {
                        self.exec_assignment(inner)?;
                        self.record(line, LineAction::Assign, format!("assign: {}", self.text(inner)), None);
                        return Ok(Flow::Normal);
                    }
                    let before_len = self.output.len();
                    self.eval(inner)?;
                    let delta = self.output.get(before_len..).map(str::to_string).filter(|s| !s.is_empty());
                    let step_action = if inner.kind() == "call" { LineAction::Call } else { action };
                    self.record(line, step_action, self.text(node).to_string(), delta);
                }
                Ok(Flow::Normal)
            }
            "if_statement" => self.exec_if(node),
            "for_statement" => self.exec_for(node),
            "while_statement" => self.exec_while(node),
            "return_statement" => {
                let value = match node.named_child(0) {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                self.record(line, LineAction::Return, format!("return {}", value.repr()), None);
                Ok(Flow::Return(value))
            }
            "pass_statement" => {
                self.record(line, LineAction::Execute, "pass".to_string(), None);
                Ok(Flow::Normal)
            }
            _ => Ok(Flow::Normal),
        }
    }

    fn exec_assignment(&mut self, node: Node<'a>) -> Result<(), String> {
        let target = node.child_by_field_name("left").ok_or("assignment missing a target")?;
        let value_node = node.child_by_field_name("right").ok_or("assignment missing a value")?;
        let value = self.eval(value_node)?;
        if target.kind() == "identifier" {
            let name = self.text(target).to_string();
            self.scopes.last_mut().expect("scope").insert(name, value);
        }
        Ok(())
    }

    fn exec_if(&mut self, node: Node<'a>) -> Result<Flow, String> {
        let line = node.start_position().row + 1;
        let condition = node.child_by_field_name("condition").ok_or("if missing a condition")?;
        let cond_value = self.eval(condition)?;
        self.record(line, LineAction::Condition, format!("if {}", self.text(condition)), None);
        if cond_value.truthy() {
            let body = node.child_by_field_name("consequence").ok_or("if missing a body")?;
            return self.exec_block(body);
        }

        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            match clause.kind() {
                "elif_clause" => {
                    let elif_cond = clause.child_by_field_name("condition").ok_or("elif missing a condition")?;
                    let elif_line = clause.start_position().row + 1;
                    let value = self.eval(elif_cond)?;
                    self.record(elif_line, LineAction::Condition, format!("elif {}", self.text(elif_cond)), None);
                    if value.truthy() {
                        let body = clause.child_by_field_name("consequence").ok_or("elif missing a body")?;
                        return self.exec_block(body);
                    }
                }
                "else_clause" => {
                    let body = clause.child_by_field_name("body").ok_or("else missing a body")?;
                    return self.exec_block(body);
                }
                _ => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for(&mut self, node: Node<'a>) -> Result<Flow, String> {
        let line = node.start_position().row + 1;
        let target = node.child_by_field_name("left").ok_or("for missing a loop variable")?;
        let iterable = node.child_by_field_name("right").ok_or("for missing an iterable")?;
        let body = node.child_by_field_name("body").ok_or("for missing a body")?;
        if target.kind() != "identifier" {
            return Err("only a single loop variable is supported".to_string());
        }
        let name = self.text(target).to_string();
        let items = self.eval_iterable(iterable)?;
        self.record(line, LineAction::Loop, format!("for {name} in {}", self.text(iterable)), None);

        for item in items {
            if self.budget_exhausted() {
                break;
            }
            self.scopes.last_mut().expect("scope").insert(name.clone(), item);
            match self.exec_block(body)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_while(&mut self, node: Node<'a>) -> Result<Flow, String> {
        let line = node.start_position().row + 1;
        let condition = node.child_by_field_name("condition").ok_or("while missing a condition")?;
        let body = node.child_by_field_name("body").ok_or("while missing a body")?;
        loop {
            if self.budget_exhausted() {
                break;
            }
            let value = self.eval(condition)?;
            self.record(line, LineAction::Loop, format!("while {}", self.text(condition)), None);
            if !value.truthy() {
                break;
            }
            match self.exec_block(body)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_iterable(&mut self, node: Node<'a>) -> Result<Vec<Value>, String> {
        if node.kind() == "call" {
            if let Some(func) = node.child_by_field_name("function") {
                if func.kind() == "identifier" && self.text(func) == "range" {
                    let args = self.eval_arguments(node)?;
                    return Ok(range_values(&args)?.into_iter().map(Value::Int).collect());
                }
            }
        }
        match self.eval(node)? {
            Value::List(items) => Ok(items),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(format!("{} is not iterable", other.repr())),
        }
    }

    fn eval_arguments(&mut self, call: Node<'a>) -> Result<Vec<Value>, String> {
        let Some(args) = call.child_by_field_name("arguments") else { return Ok(Vec::new()) };
        let mut cursor = args.walk();
        let nodes: Vec<Node> = args.named_children(&mut cursor).collect();
        let mut out = Vec::with_capacity(nodes.len());
        for arg in nodes {
            out.push(self.eval(arg)?);
        }
        Ok(out)
    }

    fn eval(&mut self, node: Node<'a>) -> Result<Value, String> {
        match node.kind() {
            "integer" => self.text(node).replace('_', "").parse::<i64>().map(Value::Int).map_err(|e| e.to_string()),
            "float" => self.text(node).replace('_', "").parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "none" => Ok(Value::None),
            "string" => Ok(Value::Str(string_literal_value(self.text(node)))),
            "identifier" => {
                let name = self.text(node);
                for scope in self.scopes.iter().rev() {
                    if let Some(value) = scope.get(name) {
                        return Ok(value.clone());
                    }
                }
                Err(format!("name '{name}' is not defined"))
            }
            "list" => {
                let mut cursor = node.walk();
                let items: Vec<Node> = node.named_children(&mut cursor).collect();
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::List(values))
            }
            "parenthesized_expression" => {
                let inner = node.named_child(0).ok_or("empty parenthesized expression")?;
                self.eval(inner)
            }
            "unary_operator" => {
                let operand = node.child_by_field_name("argument").ok_or("unary operator missing an operand")?;
                let value = self.eval(operand)?;
                let op = node.child_by_field_name("operator").map(|n| self.text(n)).unwrap_or("");
                match op {
                    "-" => value.as_f64().map(|f| negate(&value, f)).ok_or_else(|| "unsupported operand for unary -".to_string()),
                    "+" => Ok(value),
                    _ => Err(format!("unsupported unary operator {op}")),
                }
            }
            "not_operator" => {
                let operand = node.child_by_field_name("argument").ok_or("not missing an operand")?;
                let value = self.eval(operand)?;
                Ok(Value::Bool(!value.truthy()))
            }
            "boolean_operator" => {
                let left = node.child_by_field_name("left").ok_or("boolean operator missing a left operand")?;
                let right = node.child_by_field_name("right").ok_or("boolean operator missing a right operand")?;
                let op = node.child_by_field_name("operator").map(|n| self.text(n)).unwrap_or("and");
                let left_value = self.eval(left)?;
                if op == "and" {
                    if left_value.truthy() { self.eval(right) } else { Ok(left_value) }
                } else if left_value.truthy() {
                    Ok(left_value)
                } else {
                    self.eval(right)
                }
            }
            "comparison_operator" => {
                // Flat sequence `expr (operator expr)+`; chained comparisons
                // beyond the first pair are not evaluated, a bounded-
                // interpreter simplification.
                let left = node.child(0).ok_or("comparison missing a left operand")?;
                let op_node = node.child(1).ok_or("comparison missing an operator")?;
                let right = node.child(2).ok_or("comparison missing a right operand")?;
                let op = self.text(op_node);
                let left_value = self.eval(left)?;
                let right_value = self.eval(right)?;
                compare(&left_value, op, &right_value)
            }
            "binary_operator" => {
                let left = node.child_by_field_name("left").ok_or("binary operator missing a left operand")?;
                let right = node.child_by_field_name("right").ok_or("binary operator missing a right operand")?;
                let op = node.child_by_field_name("operator").map(|n| self.text(n)).unwrap_or("+");
                let left_value = self.eval(left)?;
                let right_value = self.eval(right)?;
                arithmetic(&left_value, op, &right_value)
            }
            "call" => self.eval_call(node),
            "attribute" => Err(format!("unsupported attribute access: {}", self.text(node))),
            other => Err(format!("unsupported expression: {other}")),
        }
    }

    fn eval_call(&mut self, node: Node<'a>) -> Result<Value, String> {
        let func = node.child_by_field_name("function").ok_or("call missing a callee")?;
        if func.kind() != "identifier" {
            return Err(format!("unsupported callee: {}", self.text(func)));
        }
        let name = self.text(func).to_string();
        let args = self.eval_arguments(node)?;

        match name.as_str() {
            "print" => {
                let rendered = args.iter().map(Value::repr).collect::<Vec<_>>().join(" ");
                self.output.push_str(&rendered);
                self.output.push('\n');
                Ok(Value::None)
            }
            "len" => match args.first() {
                Some(Value::List(items)) => Ok(Value::Int(items.len() as i64)),
                Some(Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
                _ => Err("len() requires a list or string".to_string()),
            },
            "str" => Ok(Value::Str(args.first().map(Value::repr).unwrap_or_default())),
            "int" => args.first().and_then(Value::as_f64).map(|f| Value::Int(f as i64)).ok_or_else(|| "int() requires a number".to_string()),
            "float" => args.first().and_then(Value::as_f64).map(Value::Float).ok_or_else(|| "float() requires a number".to_string()),
            "range" => Ok(Value::List(range_values(&args)?.into_iter().map(Value::Int).collect())),
            _ => self.call_user_function(&name, args),
        }
    }

    fn call_user_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, String> {
        let Some(def) = self.functions.get(name) else {
            return Err(format!("name '{name}' is not defined"));
        };
        if args.len() != def.params.len() {
            return Err(format!("{name}() takes {} arguments but {} were given", def.params.len(), args.len()));
        }
        let mut frame = HashMap::new();
        for (param, value) in def.params.iter().zip(args) {
            frame.insert(param.clone(), value);
        }
        let body = def.body;

        self.call_stack.push(name.to_string());
        self.scopes.push(frame);
        self.record(body.start_position().row + 1, LineAction::Call, format!("call {name}"), None);
        let outcome = self.exec_block(body);
        self.scopes.pop();
        self.call_stack.pop();

        match outcome? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::None),
        }
    }
}

fn negate(original: &Value, f: f64) -> Value {
    match original {
        Value::Int(_) => Value::Int(-(f as i64)),
        _ => Value::Float(-f),
    }
}

fn string_literal_value(raw: &str) -> String {
    let trimmed = raw.trim_start_matches(['r', 'R', 'f', 'F', 'b', 'B']);
    trimmed.trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn range_values(args: &[Value]) -> Result<Vec<i64>, String> {
    let as_int = |v: &Value| v.as_f64().map(|f| f as i64).ok_or_else(|| "range() requires numeric arguments".to_string());
    let (start, stop, step) = match args {
        [stop] => (0, as_int(stop)?, 1),
        [start, stop] => (as_int(start)?, as_int(stop)?, 1),
        [start, stop, step] => (as_int(start)?, as_int(stop)?, as_int(step)?),
        _ => return Err("range() takes 1 to 3 arguments".to_string()),
    };
    if step == 0 {
        return Err("range() step must not be zero".to_string());
    }
    let mut out = Vec::new();
    let mut n = start;
    if step > 0 {
        while n < stop {
            out.push(n);
            n += step;
        }
    } else {
        while n > stop {
            out.push(n);
            n += step;
        }
    }
    Ok(out)
}

fn arithmetic(left: &Value, op: &str, right: &Value) -> Result<Value, String> {
    if op == "+" {
        if let (Value::Str(a), Value::Str(b)) = (left, right) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
        if let (Value::List(a), Value::List(b)) = (left, right) {
            let mut out = a.clone();
            out.extend(b.clone());
            return Ok(Value::List(out));
        }
    }
    let (a, b) = (
        left.as_f64().ok_or_else(|| format!("unsupported operand for {op}: {}", left.repr()))?,
        right.as_f64().ok_or_else(|| format!("unsupported operand for {op}: {}", right.repr()))?,
    );
    let both_int = matches!(left, Value::Int(_) | Value::Bool(_)) && matches!(right, Value::Int(_) | Value::Bool(_));
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => return Ok(Value::Float(a / b)),
        "//" => (a / b).floor(),
        "%" => a.rem_euclid(b),
        "**" => a.powf(b),
        _ => return Err(format!("unsupported binary operator {op}")),
    };
    if both_int && op != "**" {
        Ok(Value::Int(result as i64))
    } else {
        Ok(Value::Float(result))
    }
}

fn compare(left: &Value, op: &str, right: &Value) -> Result<Value, String> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => left.as_f64().and_then(|a| right.as_f64().map(|b| a.partial_cmp(&b))).flatten(),
    };
    let result = match op {
        "==" => return Ok(Value::Bool(values_equal(left, right))),
        "!=" => return Ok(Value::Bool(!values_equal(left, right))),
        "<" => ordering.is_some_and(std::cmp::Ordering::is_lt),
        "<=" => ordering.is_some_and(std::cmp::Ordering::is_le),
        ">" => ordering.is_some_and(std::cmp::Ordering::is_gt),
        ">=" => ordering.is_some_and(std::cmp::Ordering::is_ge),
        _ => return Err(format!("unsupported comparison operator {op}")),
    };
    Ok(Value::Bool(result))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y)),
        (Value::None, Value::None) => true,
        _ => left.as_f64().zip(right.as_f64()).is_some_and(|(a, b)| a == b),
    }
}
