//! FAQ retrieval and answer synthesis
//!
//! Embeds the question, pulls the top-k FAQ nodes by vector similarity and
//! synthesizes an answer constrained to the retrieved context only.

use crate::graph::{GraphStore, NodeLabel};
use crate::llm::{ChatModel, Embedder};
use crate::Result;
use std::sync::Arc;
use tracing::debug;

pub const FAQ_TOP_K: usize = 12;

pub const NO_ANSWER_MESSAGE: &str =
    "I am sorry, but I cannot find the answer to your question in the provided FAQs.";

const SYNTHESIS_TEMPLATE: &str = "Your job is to use the provided product FAQs to answer \
questions about general mortgage-related queries.\n\
Use ONLY the following context to answer questions.\n\
If the answer is not found within the provided context, clearly state: \
\"I am sorry, but I cannot find the answer to your question in the provided FAQs.\" \
Do NOT attempt to provide an answer based on external knowledge.\n\n";

pub struct FaqAnswerer {
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
}

impl FaqAnswerer {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            graph,
            embedder,
            chat,
            top_k: FAQ_TOP_K,
        }
    }

    pub async fn answer(&self, question: &str) -> Result<String> {
        let embedding = self.embedder.embed(question).await?;
        let hits = self
            .graph
            .vector_search(NodeLabel::Faqs, &embedding, self.top_k)
            .await?;

        debug!(hit_count = hits.len(), "FAQ retrieval complete");

        if hits.is_empty() {
            return Ok(NO_ANSWER_MESSAGE.to_string());
        }

        let mut context = String::new();
        for hit in &hits {
            let get = |name: &str| {
                hit.properties
                    .get(name)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            };
            context.push_str(&format!(
                "Q: {}\nA: {}\nTopics: {}\n\n",
                get("question"),
                get("answer"),
                get("topics"),
            ));
        }

        let system = format!("{}{}", SYNTHESIS_TEMPLATE, context);
        self.chat.complete(&system, question).await
    }
}
