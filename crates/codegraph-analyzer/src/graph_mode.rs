//! Graph mode (§4.9): `DefinitionCollector` then `EdgeCollector` over a
//! submitted Python snippet, grounded on the scope-stack walk
//! `codegraph_parser::python::extract` already uses for full-file
//! extraction, generalized here to two explicit passes so `EdgeCollector`
//! can resolve calls to definitions that appear later in the source.

use crate::error::{AnalyzerError, AnalyzerResult};
use crate::types::{EdgeKind, GraphAnalysis, GraphEdge, GraphNode, NodeKind};
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

const MODULE_NODE_ID: &str = "module:__main__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    Function,
}

#[derive(Debug, Clone)]
struct ScopeFrame {
    name: String,
    kind: ScopeKind,
}

#[derive(Default)]
struct ClassInfo {
    id: String,
    methods: HashMap<String, String>,
    bases: Vec<String>,
}

#[derive(Default)]
struct Definitions {
    nodes: Vec<GraphNode>,
    /// Non-method function ids, keyed by their unqualified name (nearest
    /// lexical match wins; last writer in source order is kept, which
    /// favors inner/later redefinitions the way plain name lookup would).
    functions: HashMap<String, String>,
    classes: HashMap<String, ClassInfo>,
    /// import alias -> module (or module.symbol) it resolves to.
    aliases: HashMap<String, String>,
}

pub fn analyze(source: &str) -> AnalyzerResult<GraphAnalysis> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| AnalyzerError::Parse(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AnalyzerError::Parse("tree-sitter failed to produce a tree".to_string()))?;

    let mut defs = Definitions::default();
    defs.nodes.push(GraphNode { id: MODULE_NODE_ID.to_string(), kind: NodeKind::Module, name: "__main__".to_string(), line: 0 });

    let root = tree.root_node();
    let module_scope = vec![ScopeFrame { name: "__main__".to_string(), kind: ScopeKind::Module }];
    collect_definitions(root, source, &module_scope, &mut defs);

    let mut edges = Vec::new();
    collect_edges(root, source, &module_scope, &defs, MODULE_NODE_ID, &mut edges);

    let mut nodes = defs.nodes;
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    nodes.dedup_by(|a, b| a.id == b.id);
    edges.sort_by(|a, b| (a.from.as_str(), a.to.as_str()).cmp(&(b.from.as_str(), b.to.as_str())));
    edges.dedup_by(|a, b| a.from == b.from && a.to == b.to && a.kind == b.kind);

    Ok(GraphAnalysis { nodes, edges })
}

fn text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

fn qualified_name(scope: &[ScopeFrame], name: &str) -> String {
    let path: Vec<&str> = scope.iter().filter(|f| f.kind != ScopeKind::Module).map(|f| f.name.as_str()).collect();
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{name}", path.join("."))
    }
}

fn enclosing_class<'a>(scope: &'a [ScopeFrame]) -> Option<&'a str> {
    scope.iter().rev().find(|f| f.kind == ScopeKind::Class).map(|f| f.name.as_str())
}

fn current_scope_node_id(scope: &[ScopeFrame]) -> String {
    match scope.last() {
        Some(frame) if frame.kind == ScopeKind::Function => {
            if let Some(class) = enclosing_class(&scope[..scope.len() - 1]) {
                format!("method:{class}.{}", frame.name)
            } else {
                format!("func:{}", qualified_name(&scope[..scope.len() - 1], &frame.name))
            }
        }
        Some(frame) if frame.kind == ScopeKind::Class => format!("class:{}", qualified_name(&scope[..scope.len() - 1], &frame.name)),
        _ => MODULE_NODE_ID.to_string(),
    }
}

fn collect_definitions(node: Node, source: &str, scope: &[ScopeFrame], defs: &mut Definitions) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "decorated_definition" => {
                if let Some(inner) = child.child_by_field_name("definition") {
                    collect_one_definition(inner, source, scope, defs);
                }
            }
            "function_definition" | "class_definition" => collect_one_definition(child, source, scope, defs),
            "import_statement" | "import_from_statement" => collect_import(child, source, defs),
            "if_statement" | "try_statement" | "with_statement" | "for_statement" | "while_statement" => {
                collect_definitions(child, source, scope, defs);
            }
            _ => {}
        }
    }
}

fn collect_one_definition(node: Node, source: &str, scope: &[ScopeFrame], defs: &mut Definitions) {
    match node.kind() {
        "function_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = text(name_node, source).to_string();
            let line = line_of(node);
            let in_class = enclosing_class(scope);
            let id = match in_class {
                Some(class) => format!("method:{class}.{name}"),
                None => format!("func:{}", qualified_name(scope, &name)),
            };
            let kind = if in_class.is_some() { NodeKind::Method } else { NodeKind::Function };
            defs.nodes.push(GraphNode { id: id.clone(), kind, name: name.clone(), line });
            if let Some(class) = in_class {
                if let Some(info) = defs.classes.get_mut(class) {
                    info.methods.insert(name.clone(), id);
                }
            } else {
                defs.functions.insert(name.clone(), id);
            }

            let mut inner_scope = scope.to_vec();
            inner_scope.push(ScopeFrame { name, kind: ScopeKind::Function });
            if let Some(body) = node.child_by_field_name("body") {
                collect_definitions(body, source, &inner_scope, defs);
            }
        }
        "class_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = text(name_node, source).to_string();
            let line = line_of(node);
            let id = format!("class:{}", qualified_name(scope, &name));
            defs.nodes.push(GraphNode { id: id.clone(), kind: NodeKind::Class, name: name.clone(), line });

            let mut bases = Vec::new();
            if let Some(args) = node.child_by_field_name("superclasses") {
                let mut cursor = args.walk();
                for arg in args.named_children(&mut cursor) {
                    if arg.kind() == "identifier" || arg.kind() == "attribute" {
                        let base_text = text(arg, source);
                        bases.push(base_text.rsplit('.').next().unwrap_or(base_text).to_string());
                    }
                }
            }
            defs.classes.insert(name.clone(), ClassInfo { id, methods: HashMap::new(), bases });

            let mut inner_scope = scope.to_vec();
            inner_scope.push(ScopeFrame { name, kind: ScopeKind::Class });
            if let Some(body) = node.child_by_field_name("body") {
                collect_definitions(body, source, &inner_scope, defs);
            }
        }
        _ => {}
    }
}

fn collect_import(node: Node, source: &str, defs: &mut Definitions) {
    if node.kind() == "import_statement" {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    let module = text(child, source).to_string();
                    defs.aliases.insert(module.clone(), module);
                }
                "aliased_import" => {
                    let module = child.child_by_field_name("name").map(|n| text(n, source).to_string()).unwrap_or_default();
                    if let Some(alias_node) = child.child_by_field_name("alias") {
                        defs.aliases.insert(text(alias_node, source).to_string(), module);
                    }
                }
                _ => {}
            }
        }
    } else if node.kind() == "import_from_statement" {
        let module = node.child_by_field_name("module_name").map(|n| text(n, source).to_string()).unwrap_or_default();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" | "identifier" if text(child, source) != module => {
                    let symbol = text(child, source).to_string();
                    defs.aliases.insert(symbol.clone(), format!("{module}.{symbol}"));
                }
                "aliased_import" => {
                    if let (Some(n), Some(a)) = (child.child_by_field_name("name"), child.child_by_field_name("alias")) {
                        defs.aliases.insert(text(a, source).to_string(), format!("{module}.{}", text(n, source)));
                    }
                }
                _ => {}
            }
        }
    }
}

fn collect_edges(node: Node, source: &str, scope: &[ScopeFrame], defs: &Definitions, from: &str, edges: &mut Vec<GraphEdge>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "decorated_definition" => {
                if let Some(inner) = child.child_by_field_name("definition") {
                    collect_edges_for_definition(inner, source, scope, defs, edges);
                }
            }
            "function_definition" | "class_definition" => collect_edges_for_definition(child, source, scope, defs, edges),
            "import_statement" | "import_from_statement" => {
                emit_import_edges(child, source, from, edges);
            }
            "expression_statement" | "if_statement" | "try_statement" | "with_statement" | "for_statement" | "while_statement"
            | "return_statement" | "assert_statement" => {
                collect_calls(child, source, scope, defs, from, edges);
                collect_edges(child, source, scope, defs, from, edges);
            }
            _ => {}
        }
    }
}

fn collect_edges_for_definition(node: Node, source: &str, scope: &[ScopeFrame], defs: &Definitions, edges: &mut Vec<GraphEdge>) {
    match node.kind() {
        "function_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = text(name_node, source).to_string();
            let mut inner_scope = scope.to_vec();
            inner_scope.push(ScopeFrame { name, kind: ScopeKind::Function });
            let from = current_scope_node_id(&inner_scope);
            if let Some(body) = node.child_by_field_name("body") {
                collect_edges(body, source, &inner_scope, defs, &from, edges);
            }
        }
        "class_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = text(name_node, source).to_string();
            let class_id = format!("class:{}", qualified_name(scope, &name));
            if let Some(info) = defs.classes.get(&name) {
                for base in &info.bases {
                    edges.push(GraphEdge { from: class_id.clone(), to: resolve_type_name(base, defs), kind: EdgeKind::Extends });
                }
            }
            let mut inner_scope = scope.to_vec();
            inner_scope.push(ScopeFrame { name, kind: ScopeKind::Class });
            if let Some(body) = node.child_by_field_name("body") {
                collect_edges(body, source, &inner_scope, defs, &class_id, edges);
            }
        }
        _ => {}
    }
}

fn emit_import_edges(node: Node, source: &str, from: &str, edges: &mut Vec<GraphEdge>) {
    let modules: Vec<String> = if node.kind() == "import_statement" {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => out.push(text(child, source).to_string()),
                "aliased_import" => {
                    if let Some(n) = child.child_by_field_name("name") {
                        out.push(text(n, source).to_string());
                    }
                }
                _ => {}
            }
        }
        out
    } else {
        node.child_by_field_name("module_name").map(|n| vec![text(n, source).to_string()]).unwrap_or_default()
    };
    for module in modules {
        let module_id = format!("module:{module}");
        edges.push(GraphEdge { from: from.to_string(), to: module_id, kind: EdgeKind::Imports });
    }
}

/// Resolves a base-class or call-root name to a node id, per §4.9: a known
/// local class wins, then a known import alias, otherwise an external node.
fn resolve_type_name(name: &str, defs: &Definitions) -> String {
    if let Some(info) = defs.classes.get(name) {
        return info.id.clone();
    }
    if let Some(target) = defs.aliases.get(name) {
        return format!("external_class:{target}");
    }
    format!("external_class:{name}")
}

fn collect_calls(node: Node, source: &str, scope: &[ScopeFrame], defs: &Definitions, from: &str, edges: &mut Vec<GraphEdge>) {
    if node.kind() == "call" {
        if let Some(func) = node.child_by_field_name("function") {
            if let Some(target) = resolve_call(func, source, scope, defs) {
                edges.push(GraphEdge { from: from.to_string(), to: target, kind: EdgeKind::Calls });
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_calls(child, source, scope, defs, from, edges);
    }
}

/// `Name(...)`: lexical lookup biased to the nearest enclosing class's
/// methods; `self.x()` / `cls.x()`: bind into the enclosing class; the
/// general `Root.Tail(...)` shape: known class root -> method id, known
/// import alias -> `external_func:<alias_target>.<tail>`, else external.
fn resolve_call(func: Node, source: &str, scope: &[ScopeFrame], defs: &Definitions) -> Option<String> {
    match func.kind() {
        "identifier" => {
            let name = text(func, source);
            if let Some(class) = enclosing_class(scope) {
                if let Some(info) = defs.classes.get(class) {
                    if let Some(id) = info.methods.get(name) {
                        return Some(id.clone());
                    }
                }
            }
            if let Some(id) = defs.functions.get(name) {
                return Some(id.clone());
            }
            Some(format!("external_func:{name}"))
        }
        "attribute" => {
            let root = func.child_by_field_name("object")?;
            let tail_node = func.child_by_field_name("attribute")?;
            let tail = text(tail_node, source);
            if root.kind() == "identifier" {
                let root_name = text(root, source);
                if root_name == "self" || root_name == "cls" {
                    let class = enclosing_class(scope)?;
                    if let Some(info) = defs.classes.get(class) {
                        if let Some(id) = info.methods.get(tail) {
                            return Some(id.clone());
                        }
                    }
                    return Some(format!("external_func:{tail}"));
                }
                if let Some(info) = defs.classes.get(root_name) {
                    if let Some(id) = info.methods.get(tail) {
                        return Some(id.clone());
                    }
                    return Some(format!("external_func:{root_name}.{tail}"));
                }
                if let Some(target) = defs.aliases.get(root_name) {
                    return Some(format!("external_func:{target}.{tail}"));
                }
                return Some(format!("external_func:{root_name}.{tail}"));
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeKind, NodeKind};

    #[test]
    fn single_function_yields_module_and_function_nodes() {
        let source = "def add(a, b):\n    return a + b\n";
        let result = analyze(source).unwrap();
        assert!(result.nodes.iter().any(|n| n.id == MODULE_NODE_ID && n.kind == NodeKind::Module));
        let func = result.nodes.iter().find(|n| n.name == "add").unwrap();
        assert_eq!(func.id, "func:add");
        assert_eq!(func.kind, NodeKind::Function);
    }

    #[test]
    fn class_with_method_and_extends() {
        let source = "class Animal:\n    pass\n\nclass Dog(Animal):\n    def bark(self):\n        pass\n";
        let result = analyze(source).unwrap();
        let dog = result.nodes.iter().find(|n| n.name == "Dog").unwrap();
        assert_eq!(dog.id, "class:Dog");
        let method = result.nodes.iter().find(|n| n.name == "bark").unwrap();
        assert_eq!(method.id, "method:Dog.bark");
        assert!(result
            .edges
            .iter()
            .any(|e| e.from == "class:Dog" && e.to == "class:Animal" && e.kind == EdgeKind::Extends));
    }

    #[test]
    fn self_call_binds_to_enclosing_class_method() {
        let source = "class Greeter:\n    def hello(self):\n        pass\n\n    def run(self):\n        self.hello()\n";
        let result = analyze(source).unwrap();
        assert!(result
            .edges
            .iter()
            .any(|e| e.from == "method:Greeter.run" && e.to == "method:Greeter.hello" && e.kind == EdgeKind::Calls));
    }

    #[test]
    fn unresolved_call_becomes_an_external_function_node() {
        let source = "def run():\n    mystery()\n";
        let result = analyze(source).unwrap();
        assert!(result.edges.iter().any(|e| e.from == "func:run" && e.to == "external_func:mystery"));
    }

    #[test]
    fn import_yields_module_edge_and_alias_binding() {
        let source = "import numpy as np\n\ndef run():\n    np.array()\n";
        let result = analyze(source).unwrap();
        assert!(result.edges.iter().any(|e| e.to == "module:numpy" && e.kind == EdgeKind::Imports));
        assert!(result.edges.iter().any(|e| e.from == "func:run" && e.to == "external_func:numpy.array"));
    }
}
