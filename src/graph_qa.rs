//! Structured graph question answering
//!
//! Translates a natural-language question into a pattern query, executes it
//! against the graph store and synthesizes an answer from the raw rows.

use crate::error::AgentError;
use crate::graph::{GraphStore, NodeLabel, PatternQuery, Row};
use crate::llm::ChatModel;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, warn};

pub const NO_RECORDS_MESSAGE: &str = "There are no records matching that request.";

/// Rows handed to synthesis are capped so a broad query cannot flood the
/// prompt.
const MAX_ROWS_FOR_SYNTHESIS: usize = 10;

const GRAPH_SCHEMA: &str = r#"Node labels and properties:
- Branch {id, name, state}
- Customer {id, first_name, last_name, name, email, phone_number, address, city, state, zip_code, country}
- Mortgage {id, amount, interest, start, status, tenure}
- Payments {id, amount, date}
- PaymentsDue {id, amount, due_date, status}
- Fees {id, type, amount, date_incurred, status}

Relationships:
- Customer -HAS-> Mortgage
- Customer -MADE-> Payments
- Mortgage -SCHEDULE-> PaymentsDue
- Mortgage -HAS-> Fees
- PaymentsDue -MAY_INCUR-> Fees"#;

const TRANSLATION_INSTRUCTIONS: &str = r#"Task:
Translate the question into a single JSON pattern query for the bank graph.

The JSON object has these fields:
- "start_label": one of Branch, Customer, Mortgage, Payments, PaymentsDue, Fees
- "filters": list of {"property": ..., "equals": ...} applied to the start node (exact, case-insensitive)
- "hops": list of {"rel": ..., "target": ...} relationship traversals, in order
- "returns": property names to project from the final node ("id" is allowed)
- "aggregate": optional, {"op": "count"} or {"op": "avg"|"sum"|"min"|"max", "property": ...}

Note:
Do not include any explanations or apologies in your responses.
Only output the JSON query.
Do not produce anything that would add to or delete from the database.
When the question names a customer, filter Customer on the "name" property."#;

const SYNTHESIS_INSTRUCTIONS: &str = "You are an assistant that interprets the results of a \
bank graph query. Answer the user's question using ONLY the result rows provided. \
Be concise and state values plainly.";

pub struct GraphAnswerer {
    graph: Arc<dyn GraphStore>,
    chat: Arc<dyn ChatModel>,
}

impl GraphAnswerer {
    pub fn new(graph: Arc<dyn GraphStore>, chat: Arc<dyn ChatModel>) -> Self {
        Self { graph, chat }
    }

    pub async fn answer(&self, question: &str) -> Result<String> {
        let query = self.translate(question).await?;
        debug!(?query, "Graph query translated");

        let rows = self.graph.execute(&query).await?;
        if rows.is_empty() || rows.iter().all(Row::is_empty) {
            return Ok(NO_RECORDS_MESSAGE.to_string());
        }

        self.synthesize(question, &rows).await
    }

    /// NL -> pattern query. A malformed model reply is fed back once for
    /// correction before the translation is reported as failed.
    async fn translate(&self, question: &str) -> Result<PatternQuery> {
        let examples = self.load_examples().await?;
        let system = format!(
            "{}\n\nSchema:\n{}\n{}",
            TRANSLATION_INSTRUCTIONS, GRAPH_SCHEMA, examples
        );

        let first = self.chat.complete(&system, question).await?;
        match parse_query_response(&first) {
            Ok(query) => Ok(query),
            Err(parse_err) => {
                warn!(error = %parse_err, "Query translation was malformed, retrying");
                let correction = format!(
                    "Your previous reply could not be parsed ({}). \
                     Reply again with ONLY the JSON pattern query.\n\nQuestion: {}",
                    parse_err, question
                );
                let second = self.chat.complete(&system, &correction).await?;
                parse_query_response(&second)
            }
        }
    }

    /// Example question/query pairs loaded by the ETL, used as few-shot
    /// context for translation.
    async fn load_examples(&self) -> Result<String> {
        let rows = self
            .graph
            .execute(&PatternQuery::all(
                NodeLabel::Question,
                &["question", "query"],
            ))
            .await?;

        if rows.is_empty() {
            return Ok(String::new());
        }

        let mut out = String::from("\nExamples:\n");
        for row in rows {
            let get = |name: &str| row.get(name).map(|v| v.to_string()).unwrap_or_default();
            out.push_str(&format!("Question: {}\nQuery: {}\n", get("question"), get("query")));
        }
        Ok(out)
    }

    async fn synthesize(&self, question: &str, rows: &[Row]) -> Result<String> {
        let shown: Vec<&Row> = rows.iter().take(MAX_ROWS_FOR_SYNTHESIS).collect();
        let rows_json = serde_json::to_string_pretty(&shown)?;

        let user = format!(
            "Question: {}\n\nResult rows:\n{}\n\nHelpful Answer:",
            question, rows_json
        );
        self.chat.complete(SYNTHESIS_INSTRUCTIONS, &user).await
    }
}

/// Parse a pattern query out of a model reply, stripping markdown fences.
fn parse_query_response(response: &str) -> Result<PatternQuery> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(cleaned).map_err(|e| {
        AgentError::LlmError(format!(
            "failed to parse pattern query: {} | raw={}",
            e, response
        ))
    })
}
