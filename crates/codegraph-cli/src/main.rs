//! CLI binary for codegraph: ingest projects, run structural/semantic
//! queries, and drive the sandboxed analyzer, all against the local
//! file-backed store adapters (§4.2, §4.6-§4.9).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codegraph_analyzer::Analyzer;
use codegraph_core::config::CoreConfig;
use codegraph_core::graph_store::{GraphFilters, ViewMode};
use codegraph_core::local::{LocalGraphStore, LocalVectorStore};
use codegraph_core::session_store::SessionStore;
use codegraph_core::{GraphStore, VectorStore};
use codegraph_embed::EmbeddingClient;
use codegraph_ingest::dispatch::InProcessDispatch;
use codegraph_ingest::{IngestionCoordinator, PipelineRunner};
use codegraph_query::{ContextAssembler, QueryEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "codegraph", about = "Code-intelligence ingestion, query, and analysis engine")]
struct Cli {
    /// Project root directory (defaults to current directory). Holds the
    /// `.codegraph/` data directory and optional `config.toml`.
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local directory as a new project and wait for ingestion to finish
    Upload {
        /// Directory to ingest
        path: PathBuf,
        /// Project name
        #[arg(short, long)]
        name: String,
        /// Owner id recorded on the project
        #[arg(short, long, default_value = "local")]
        owner: String,
    },

    /// Shallow-clone a git repository and ingest it
    UploadScm {
        /// Repository URL
        repo_url: String,
        /// Branch to clone
        #[arg(short, long, default_value = "main")]
        branch: String,
        /// Project name
        #[arg(short, long)]
        name: String,
        /// Owner id recorded on the project
        #[arg(short, long, default_value = "local")]
        owner: String,
    },

    /// Poll a session's ingestion status
    Status {
        session_id: String,
    },

    /// Project management
    Projects {
        #[command(subcommand)]
        action: ProjectsAction,
    },

    /// Structural and semantic queries
    Query {
        #[command(subcommand)]
        action: QueryAction,
    },

    /// Render the project's dependency graph
    Graph {
        project_id: String,
        /// View mode: file or symbol
        #[arg(long, default_value = "symbol")]
        view: String,
        #[arg(long, default_value = "500")]
        max_nodes: usize,
        #[arg(long, default_value = "2000")]
        max_edges: usize,
    },

    /// Sandboxed code analysis (graph extraction or bounded execution trace)
    Analyze {
        /// Path to a Python source file
        file: PathBuf,
        /// Run execution-mode tracing instead of graph-mode extraction
        #[arg(long)]
        trace: bool,
        /// Permit execution mode outside development (ignored in graph mode)
        #[arg(long)]
        allow_execution: bool,
        #[arg(long)]
        max_steps: Option<usize>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ProjectsAction {
    /// List all known projects
    List,
    /// Fetch one project's metadata
    Get { project_id: String },
    /// Delete a project and its graph/vectors
    Delete { project_id: String },
}

#[derive(Subcommand)]
enum QueryAction {
    /// Entities that call the given entity
    Callers { entity_id: String, #[arg(short, long)] project: String },
    /// Entities the given entity calls or uses
    Dependencies { entity_id: String, #[arg(short, long)] project: String },
    /// Transitive call-graph impact of changing an entity
    Impact {
        entity_id: String,
        #[arg(short, long)]
        project: String,
        #[arg(long, default_value = "5")]
        depth: usize,
    },
    /// Semantic search over one or more projects
    Search {
        query: String,
        /// Project ids to search (repeatable)
        #[arg(short, long = "project")]
        projects: Vec<String>,
        #[arg(long, default_value = "10")]
        top_k: usize,
    },
    /// Assemble a token-budgeted context pack for a query
    Context {
        query: String,
        #[arg(short, long)]
        project: String,
        #[arg(long, default_value = "4000")]
        budget: usize,
    },
}

struct Runtime {
    core_config: CoreConfig,
    coordinator: IngestionCoordinator,
    engine: Arc<QueryEngine>,
    context_assembler: ContextAssembler,
    graph_store: Arc<dyn GraphStore>,
    analyzer: Analyzer,
}

impl Runtime {
    fn build(project_root: &Path) -> Result<Self> {
        let core_config = CoreConfig::load(project_root)?;
        let data_dir = PathBuf::from(&core_config.data_dir);

        let graph_store: Arc<dyn GraphStore> = Arc::new(LocalGraphStore::new(&data_dir));
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(LocalVectorStore::new(&data_dir, core_config.embedding.dimension));
        let sessions = Arc::new(SessionStore::new(&data_dir));

        let model_cache = data_dir.join("models");
        let embedding_client = Arc::new(
            EmbeddingClient::new(&core_config.embedding, &model_cache)
                .context("loading the local embedding model")?,
        );

        let runner = Arc::new(PipelineRunner {
            graph_store: graph_store.clone(),
            vector_store: vector_store.clone(),
            embedding_client: embedding_client.clone(),
            embedding_config: core_config.embedding.clone(),
            sessions: sessions.clone(),
        });

        let coordinator = IngestionCoordinator::new(
            sessions,
            Arc::new(InProcessDispatch),
            runner,
            core_config.upload.clone(),
        );

        let engine = Arc::new(QueryEngine::new(
            graph_store.clone(),
            vector_store,
            embedding_client,
            core_config.query.clone(),
        ));
        let context_assembler = ContextAssembler::new(engine.clone(), graph_store.clone());
        let analyzer = Analyzer::new(core_config.analyzer.clone());

        Ok(Self { core_config, coordinator, engine, context_assembler, graph_store, analyzer })
    }
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.root {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;
    let runtime = Runtime::build(&project_root)?;

    match cli.command {
        Commands::Upload { path, name, owner } => cmd_upload(&runtime, &path, &name, &owner).await,
        Commands::UploadScm { repo_url, branch, name, owner } => {
            cmd_upload_scm(&runtime, &repo_url, &branch, &name, &owner).await
        }
        Commands::Status { session_id } => cmd_status(&runtime, &session_id).await,
        Commands::Projects { action } => cmd_projects(&runtime, action).await,
        Commands::Query { action } => cmd_query(&runtime, action).await,
        Commands::Graph { project_id, view, max_nodes, max_edges } => {
            cmd_graph(&runtime, &project_id, &view, max_nodes, max_edges).await
        }
        Commands::Analyze { file, trace, allow_execution, max_steps, timeout_ms } => {
            cmd_analyze(&runtime, &file, trace, allow_execution, max_steps, timeout_ms).await
        }
    }
}

async fn cmd_upload(runtime: &Runtime, path: &Path, name: &str, owner: &str) -> Result<()> {
    let files = codegraph_ingest::upload::collect_project_files(path, &runtime.core_config.upload)
        .context("collecting project files")?;
    eprintln!("Collected {} files from {}", files.len(), path.display());

    let session = runtime.coordinator.upload_project(name, owner, files).await?;
    eprintln!("Session {} opened for project {}", session.session_id, session.project_id);
    wait_for_completion(runtime, &session.session_id).await
}

async fn cmd_upload_scm(runtime: &Runtime, repo_url: &str, branch: &str, name: &str, owner: &str) -> Result<()> {
    eprintln!("Cloning {repo_url} ({branch})...");
    let session = runtime
        .coordinator
        .upload_from_source_control(name, owner, repo_url, branch)
        .await?;
    eprintln!("Session {} opened for project {}", session.session_id, session.project_id);
    wait_for_completion(runtime, &session.session_id).await
}

/// Ingestion dispatches the pipeline onto a background task (§4.6), so the
/// CLI polls the persisted session until it leaves `Pending`/`Processing`.
async fn wait_for_completion(runtime: &Runtime, session_id: &str) -> Result<()> {
    use codegraph_core::model::SessionStatus;
    use indicatif::{ProgressBar, ProgressStyle};

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  [{bar:30.cyan/blue}] {pos}/100 {msg}")
            .expect("valid template")
            .progress_chars("##-"),
    );

    loop {
        let session = runtime.coordinator.get_session(session_id).await?;
        match session.status {
            SessionStatus::Completed => {
                bar.finish_and_clear();
                eprintln!(
                    "Ingestion complete: {} files, {} entities",
                    session.files_processed, session.entities_extracted
                );
                runtime.engine.invalidate_project(&session.project_id).await;
                return Ok(());
            }
            SessionStatus::Failed => {
                bar.finish_and_clear();
                for error in &session.errors {
                    eprintln!("error: {error}");
                }
                anyhow::bail!("ingestion failed for session {session_id}");
            }
            SessionStatus::Pending | SessionStatus::Processing => {
                bar.set_position((session.progress * 100.0) as u64);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
    }
}

async fn cmd_status(runtime: &Runtime, session_id: &str) -> Result<()> {
    let session = runtime.coordinator.get_session(session_id).await?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

async fn cmd_projects(runtime: &Runtime, action: ProjectsAction) -> Result<()> {
    match action {
        ProjectsAction::List => {
            let projects = runtime.graph_store.list_projects().await?;
            for project in projects {
                println!(
                    "{}  {}  files={} entities={}",
                    project.id, project.name, project.file_count, project.entity_count
                );
            }
        }
        ProjectsAction::Get { project_id } => {
            let project = runtime
                .graph_store
                .get_project(&project_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("project not found: {project_id}"))?;
            println!("{}", serde_json::to_string_pretty(&project)?);
        }
        ProjectsAction::Delete { project_id } => {
            runtime.graph_store.delete_project(&project_id).await?;
            runtime.engine.invalidate_project(&project_id).await;
            eprintln!("Deleted project {project_id}");
        }
    }
    Ok(())
}

async fn cmd_query(runtime: &Runtime, action: QueryAction) -> Result<()> {
    match action {
        QueryAction::Callers { entity_id, project } => {
            let result = runtime.engine.find_callers(&entity_id, &project).await?;
            print_entities(&result.entities);
        }
        QueryAction::Dependencies { entity_id, project } => {
            let result = runtime.engine.find_dependencies(&entity_id, &project).await?;
            print_entities(&result.entities);
        }
        QueryAction::Impact { entity_id, project, depth } => {
            let result = runtime.engine.impact_analysis(&entity_id, &project, depth).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        QueryAction::Search { query, projects, top_k } => {
            let result = runtime.engine.semantic_search(&query, &projects, top_k).await?;
            for hit in result.results {
                println!("{}  ({:.3})  {}", hit.entity_id, hit.similarity, hit.snippet);
            }
        }
        QueryAction::Context { query, project, budget } => {
            let result = runtime
                .context_assembler
                .retrieve_context(&query, &project, budget, None)
                .await?;
            println!("{}", result.context);
            eprintln!(
                "\n[{} entities included, {} excluded, {}/{} tokens]",
                result.included_entity_ids.len(),
                result.excluded_entity_ids.len(),
                result.total_tokens,
                result.token_budget
            );
        }
    }
    Ok(())
}

fn print_entities(entities: &[codegraph_core::Entity]) {
    if entities.is_empty() {
        eprintln!("No results.");
        return;
    }
    for entity in entities {
        println!("{}  {} [{}:{}]", entity.id, entity.name, entity.file_path, entity.start_line);
    }
}

async fn cmd_graph(runtime: &Runtime, project_id: &str, view: &str, max_nodes: usize, max_edges: usize) -> Result<()> {
    let filters = GraphFilters {
        view_mode: if view == "file" { ViewMode::File } else { ViewMode::Symbol },
        max_nodes,
        max_edges,
        ..GraphFilters::default()
    };
    let result = runtime.engine.get_project_graph(project_id, &filters).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_analyze(
    runtime: &Runtime,
    file: &Path,
    trace: bool,
    allow_execution: bool,
    max_steps: Option<usize>,
    timeout_ms: Option<u64>,
) -> Result<()> {
    use codegraph_analyzer::types::{AnalyzeMode, AnalyzeRequest};
    use codegraph_analyzer::{AnalyzeOutcome, AnalyzerError};

    let code = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let request = AnalyzeRequest {
        mode: if trace { AnalyzeMode::Execution } else { AnalyzeMode::Graph },
        code,
        language: "python".to_string(),
        max_steps,
        timeout_ms,
        allow_execution,
    };

    match runtime.analyzer.analyze(request).await {
        Ok(AnalyzeOutcome::Graph(graph)) => println!("{}", serde_json::to_string_pretty(&graph)?),
        Ok(AnalyzeOutcome::Execution(trace)) => println!("{}", serde_json::to_string_pretty(&trace)?),
        Err(AnalyzerError::SandboxBlocked(reason)) => anyhow::bail!("sandbox blocked: {reason}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
