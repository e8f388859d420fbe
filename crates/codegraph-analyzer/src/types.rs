//! Shared request/response shapes for both analyzer modes (§4.9), and the
//! tracer subprocess's stdin/stdout contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzeMode {
    Graph,
    Execution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub mode: AnalyzeMode,
    pub code: String,
    pub language: String,
    pub max_steps: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub allow_execution: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    Function,
    Method,
    ExternalModule,
    ExternalFunction,
    ExternalClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Calls,
    Imports,
    Extends,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// Output of graph mode (§4.9): sorted, de-duplicated nodes and edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphAnalysis {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineAction {
    Execute,
    Call,
    Return,
    Assign,
    Condition,
    Loop,
}

/// stdin payload delivered to the tracer subprocess (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracePayload {
    pub code: String,
    pub line_actions: BTreeMap<usize, LineAction>,
    pub max_steps: usize,
    pub timeout_ms: u64,
    pub import_whitelist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub line: usize,
    pub action: LineAction,
    pub description: String,
    pub variables: BTreeMap<String, String>,
    pub call_stack: Vec<String>,
    pub output: Option<String>,
}

/// stdout payload emitted by the tracer subprocess (§4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceResult {
    pub steps: Vec<TraceStep>,
    pub final_output: String,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub truncated: bool,
}

pub const VARIABLE_KEY_LIMIT: usize = 50;
pub const VARIABLE_VALUE_CHAR_LIMIT: usize = 200;
