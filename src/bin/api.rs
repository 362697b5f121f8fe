use bank_rag_orchestrator::{
    agent::{AgentConfig, Orchestrator},
    api::start_server,
    etl::{CsvPaths, GraphLoader},
    faq::FaqAnswerer,
    graph::{GraphStore, InMemoryGraph},
    graph_qa::GraphAnswerer,
    llm::{ChatModel, Embedder, GeminiChat, GeminiEmbedder},
    routing::{KeywordRouter, LlmRouter, RoutePolicy},
    session::SessionStore,
    tools::{SimulatedWaitTimes, Toolbox},
    verification::VerificationGate,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    if gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; falling back to keyword routing, FAQ index stays empty");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Bank RAG Agent - API Server");
    info!("Port: {}", api_port);

    // LLM clients; both refuse calls at runtime when the key is empty.
    let chat: Arc<dyn ChatModel> = Arc::new(GeminiChat::new(gemini_api_key.clone())?);
    let embedder: Arc<dyn Embedder> = Arc::new(GeminiEmbedder::new(gemini_api_key.clone())?);

    // Graph store + optional CSV load at startup
    let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraph::new());

    match CsvPaths::from_env() {
        Ok(paths) => {
            let index_embedder = (!gemini_api_key.is_empty()).then(|| embedder.clone());
            let loader = GraphLoader::new(graph.clone(), index_embedder);
            let summary = loader.load(&paths).await?;
            info!(
                nodes = summary.nodes,
                relationships = summary.relationships,
                "Graph populated from CSV"
            );
        }
        Err(e) => warn!("Skipping CSV load: {}", e),
    }

    // Routing policy: model-backed when a key is present, keyword otherwise
    let policy: Arc<dyn RoutePolicy> = if gemini_api_key.is_empty() {
        Arc::new(KeywordRouter)
    } else {
        Arc::new(LlmRouter::new(chat.clone()))
    };

    // Tool wiring
    let faq = FaqAnswerer::new(graph.clone(), embedder, chat.clone());
    let graph_qa = GraphAnswerer::new(graph.clone(), chat);
    let gate = VerificationGate::new(graph.clone());
    let toolbox = Toolbox::new(graph, faq, graph_qa, gate, Arc::new(SimulatedWaitTimes));

    let sessions = Arc::new(SessionStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        policy,
        toolbox,
        sessions,
        AgentConfig::from_env(),
    ));

    info!("Orchestrator initialized");

    start_server(orchestrator, api_port).await?;

    Ok(())
}
