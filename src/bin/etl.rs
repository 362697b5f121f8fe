use bank_rag_orchestrator::{
    etl::{CsvPaths, GraphLoader},
    graph::{GraphStore, InMemoryGraph},
    llm::{Embedder, GeminiEmbedder},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    info!("Bank RAG Agent - CSV loader");

    let paths = CsvPaths::from_env()?;

    let embedder: Option<Arc<dyn Embedder>> = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => Some(Arc::new(GeminiEmbedder::new(key)?)),
        _ => {
            info!("GEMINI_API_KEY not set; loading without FAQ embeddings");
            None
        }
    };

    let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraph::new());
    let loader = GraphLoader::new(graph, embedder);

    let summary = loader.load(&paths).await?;

    println!("\n=== GRAPH LOAD SUMMARY ===");
    println!("Nodes: {}", summary.nodes);
    println!("Relationships: {}", summary.relationships);

    Ok(())
}
