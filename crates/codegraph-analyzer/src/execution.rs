//! Execution mode's host-side supervisor (§4.9): precomputes line actions
//! by AST classification, spawns the `codegraph-analyzer-tracer` child
//! process under a `sh -lc 'ulimit ...; exec ...'` wrapper (the resource-cap
//! idiom `rpg_mcp::generation::run_command` uses for its own sandboxed
//! command execution), enforces the wall-clock timeout itself, and kills
//! the child on expiry.

use crate::error::{AnalyzerError, AnalyzerResult};
use crate::types::{LineAction, TracePayload, TraceResult};
use codegraph_core::config::AnalyzerConfig;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tree_sitter::{Node, Parser};

/// Default address-space cap for the tracer child, in kilobytes (`ulimit -v`).
const DEFAULT_ADDRESS_SPACE_KB: u64 = 256 * 1024;
/// Default output file-size cap for the tracer child, in 512-byte blocks (`ulimit -f`).
const DEFAULT_FILE_SIZE_BLOCKS: u64 = 20_000;

pub struct ExecutionSupervisor {
    config: AnalyzerConfig,
    tracer_path: PathBuf,
}

impl ExecutionSupervisor {
    pub fn new(config: AnalyzerConfig) -> Self {
        let tracer_path = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|dir| dir.join("codegraph-analyzer-tracer")))
            .unwrap_or_else(|| PathBuf::from("codegraph-analyzer-tracer"));
        Self { config, tracer_path }
    }

    pub fn with_tracer_path(mut self, path: PathBuf) -> Self {
        self.tracer_path = path;
        self
    }

    /// Runs a bounded trace of `code`, honoring the policy gate, the
    /// configured code-length cap, and the max_steps/timeout clamps (§4.9).
    pub async fn trace(
        &self,
        code: &str,
        max_steps: Option<usize>,
        timeout_ms: Option<u64>,
        allow_execution: bool,
    ) -> AnalyzerResult<TraceResult> {
        if !self.config.execution_enabled {
            return Err(AnalyzerError::SandboxBlocked("execution mode is disabled".to_string()));
        }
        if !self.config.execution_allow_in_production && !allow_execution {
            return Err(AnalyzerError::SandboxBlocked(
                "execution mode requires an explicit allow flag outside development".to_string(),
            ));
        }
        if code.chars().count() > self.config.max_code_chars {
            return Err(AnalyzerError::InvalidRequest(format!(
                "code exceeds the {}-character limit",
                self.config.max_code_chars
            )));
        }

        let max_steps = max_steps.unwrap_or(self.config.default_max_steps).min(self.config.max_steps_cap);
        let timeout_ms = timeout_ms.unwrap_or(self.config.default_timeout_ms).min(self.config.max_timeout_ms);

        let line_actions = classify_lines(code)?;
        let payload = TracePayload {
            code: code.to_string(),
            line_actions,
            max_steps,
            timeout_ms,
            import_whitelist: self.config.import_whitelist.clone(),
        };

        self.run_tracer(&payload, timeout_ms).await
    }

    async fn run_tracer(&self, payload: &TracePayload, timeout_ms: u64) -> AnalyzerResult<TraceResult> {
        let cpu_seconds = timeout_ms / 1000 + 1;
        let wrapped = format!(
            "ulimit -t {cpu_seconds} -v {} -f {}; exec \"$0\"",
            DEFAULT_ADDRESS_SPACE_KB, DEFAULT_FILE_SIZE_BLOCKS
        );

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(wrapped)
            .arg(&self.tracer_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(AnalyzerError::from)?;

        let payload_bytes = serde_json::to_vec(payload).map_err(|e| AnalyzerError::Subprocess(e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload_bytes).await.map_err(AnalyzerError::from)?;
        }

        // Drain stdout concurrently with the wait, so a trace larger than
        // the OS pipe buffer can't deadlock the child against the parent.
        let mut stdout = child.stdout.take();
        let read_stdout = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(out) = stdout.as_mut() {
                let _ = out.read_to_end(&mut buf).await;
            }
            buf
        });

        let wait = tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait()).await;

        match wait {
            Err(_elapsed) => {
                let _ = child.kill().await;
                read_stdout.abort();
                Ok(TraceResult {
                    steps: Vec::new(),
                    final_output: String::new(),
                    error: Some("execution timed out".to_string()),
                    error_code: Some("timeout".to_string()),
                    truncated: true,
                })
            }
            Ok(Err(e)) => Err(AnalyzerError::from(e)),
            Ok(Ok(_status)) => {
                let buf = read_stdout.await.unwrap_or_default();
                serde_json::from_slice(&buf)
                    .map_err(|e| AnalyzerError::Subprocess(format!("malformed tracer output: {e}")))
            }
        }
    }
}

/// Classifies every top-level-statement line in `code` by its AST node
/// kind, per §4.9: call and return actions are assigned by the tracer
/// itself once it observes the actual executed statement, overriding
/// whatever this pre-pass recorded.
fn classify_lines(code: &str) -> AnalyzerResult<BTreeMap<usize, LineAction>> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into()).map_err(|e| AnalyzerError::Parse(e.to_string()))?;
    let tree = parser.parse(code, None).ok_or_else(|| AnalyzerError::Parse("tree-sitter failed to produce a tree".to_string()))?;

    let mut actions = BTreeMap::new();
    classify_node(tree.root_node(), &mut actions);
    Ok(actions)
}

fn classify_node(node: Node, actions: &mut BTreeMap<usize, LineAction>) {
    let line = node.start_position().row + 1;
    let action = match node.kind() {
        "if_statement" | "elif_clause" => Some(LineAction::Condition),
        "for_statement" | "while_statement" => Some(LineAction::Loop),
        "assignment" | "augmented_assignment" => Some(LineAction::Assign),
        "return_statement" => Some(LineAction::Return),
        "call" => Some(LineAction::Call),
        "expression_statement" | "function_definition" | "class_definition" | "pass_statement" => Some(LineAction::Execute),
        _ => None,
    };
    if let Some(action) = action {
        actions.entry(line).or_insert(action);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        classify_node(child, actions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_condition_loop_and_assign_lines() {
        let code = "x = 1\nif x > 0:\n    for i in range(x):\n        pass\n";
        let actions = classify_lines(code).unwrap();
        assert_eq!(actions.get(&1), Some(&LineAction::Assign));
        assert_eq!(actions.get(&2), Some(&LineAction::Condition));
        assert_eq!(actions.get(&3), Some(&LineAction::Loop));
    }

    #[tokio::test]
    async fn policy_gate_blocks_when_execution_disabled() {
        let mut config = AnalyzerConfig::default();
        config.execution_enabled = false;
        let supervisor = ExecutionSupervisor::new(config);
        let err = supervisor.trace("print(1)", None, None, true).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::SandboxBlocked(_)));
    }

    #[tokio::test]
    async fn policy_gate_requires_allow_flag_outside_dev() {
        let config = AnalyzerConfig::default();
        let supervisor = ExecutionSupervisor::new(config);
        let err = supervisor.trace("print(1)", None, None, false).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::SandboxBlocked(_)));
    }
}
