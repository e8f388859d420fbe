//! Sandboxed code analysis (§4.9): graph-mode AST extraction and
//! execution-mode subprocess tracing over a submitted snippet. Language
//! restricted to Python in this implementation; the request/response
//! contract is language-agnostic.

pub mod error;
pub mod execution;
pub mod graph_mode;
pub mod types;

use codegraph_core::config::AnalyzerConfig;
use execution::ExecutionSupervisor;
use types::{AnalyzeMode, AnalyzeRequest, GraphAnalysis, TraceResult};

pub use error::{AnalyzerError, AnalyzerResult};
pub use types::{EdgeKind, GraphEdge, GraphNode, NodeKind};

/// Either analysis outcome, returned by [`Analyzer::analyze`] depending on
/// the request's `mode`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum AnalyzeOutcome {
    Graph(GraphAnalysis),
    Execution(TraceResult),
}

pub struct Analyzer {
    config: AnalyzerConfig,
    execution: ExecutionSupervisor,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let execution = ExecutionSupervisor::new(config.clone());
        Self { config, execution }
    }

    /// Dispatches on `request.mode`, rejecting unsupported languages and
    /// oversized inputs uniformly across both modes (§4.9 Policy gating).
    pub async fn analyze(&self, request: AnalyzeRequest) -> AnalyzerResult<AnalyzeOutcome> {
        if request.language != "python" {
            return Err(AnalyzerError::InvalidRequest(format!("unsupported language: {}", request.language)));
        }
        if request.code.chars().count() > self.config.max_code_chars {
            return Err(AnalyzerError::InvalidRequest(format!("code exceeds the {}-character limit", self.config.max_code_chars)));
        }

        match request.mode {
            AnalyzeMode::Graph => graph_mode::analyze(&request.code).map(AnalyzeOutcome::Graph),
            AnalyzeMode::Execution => self
                .execution
                .trace(&request.code, request.max_steps, request.timeout_ms, request.allow_execution)
                .await
                .map(AnalyzeOutcome::Execution),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unsupported_language() {
        let analyzer = Analyzer::new(AnalyzerConfig::default());
        let request = AnalyzeRequest {
            mode: AnalyzeMode::Graph,
            code: "fn main() {}".to_string(),
            language: "rust".to_string(),
            max_steps: None,
            timeout_ms: None,
            allow_execution: false,
        };
        let err = analyzer.analyze(request).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_code() {
        let mut config = AnalyzerConfig::default();
        config.max_code_chars = 10;
        let analyzer = Analyzer::new(config);
        let request = AnalyzeRequest {
            mode: AnalyzeMode::Graph,
            code: "def f():\n    pass\n".to_string(),
            language: "python".to_string(),
            max_steps: None,
            timeout_ms: None,
            allow_execution: false,
        };
        let err = analyzer.analyze(request).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn graph_mode_runs_end_to_end() {
        let analyzer = Analyzer::new(AnalyzerConfig::default());
        let request = AnalyzeRequest {
            mode: AnalyzeMode::Graph,
            code: "def add(a, b):\n    return a + b\n".to_string(),
            language: "python".to_string(),
            max_steps: None,
            timeout_ms: None,
            allow_execution: false,
        };
        let outcome = analyzer.analyze(request).await.unwrap();
        let AnalyzeOutcome::Graph(graph) = outcome else { panic!("expected graph outcome") };
        assert!(graph.nodes.iter().any(|n| n.name == "add"));
    }
}
