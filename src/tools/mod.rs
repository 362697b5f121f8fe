//! Capability tools
//!
//! The agent's capability set is a closed enumeration: the router maps a
//! classification decision to exactly one `ToolCall` variant and the
//! `Toolbox` dispatches it. No tool mutates the graph.

use crate::faq::FaqAnswerer;
use crate::graph::{GraphStore, NodeLabel, PatternQuery, Scalar};
use crate::graph_qa::GraphAnswerer;
use crate::verification::{VerificationGate, VerificationOutcome, VerifyRequest};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub mod wait_times;

pub use wait_times::{format_wait_time, BranchRef, SimulatedWaitTimes, WaitTimeSource};

//
// ================= Tool Calls =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    VerifyCustomer(VerifyRequest),
    ExploreBankDatabase { question: String },
    ExploreProductFaqs { question: String },
    GetBranchWaitTime { branch: String },
    FindMostAvailableBranch,
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::VerifyCustomer(_) => "verify_customer",
            ToolCall::ExploreBankDatabase { .. } => "explore_bank_database",
            ToolCall::ExploreProductFaqs { .. } => "explore_product_faqs",
            ToolCall::GetBranchWaitTime { .. } => "get_branch_wait_time",
            ToolCall::FindMostAvailableBranch => "find_most_available_branch",
        }
    }

    /// The arguments as they appear in the audit trail.
    pub fn arguments(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .get("arguments")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
            _ => serde_json::Value::Null,
        }
    }
}

/// Tool descriptions shown to the routing policy.
pub const TOOL_DESCRIPTIONS: &[(&str, &str)] = &[
    (
        "verify_customer",
        "Verifies a customer's identity from first_name, last_name, zip_code and \
         phone_number. All four fields are required.",
    ),
    (
        "explore_bank_database",
        "Useful for answering questions about customers, their mortgage/loan, payment \
         schedule, fees and payments made by a customer. Requires a verified customer; \
         include the customer's identity in the question.",
    ),
    (
        "explore_product_faqs",
        "Useful for questions about product offerings, payment plans and interest rates. \
         Not useful for objective questions that involve counting, percentages, \
         aggregations, or listing facts.",
    ),
    (
        "get_branch_wait_time",
        "Use when asked about the current wait time at a specific branch. Pass only the \
         branch name itself, never the word 'branch'.",
    ),
    (
        "find_most_available_branch",
        "Use when you need to find out which branch has the shortest wait time. Takes no \
         arguments and returns the branch name with its wait time in minutes.",
    ),
];

//
// ================= Tool Replies =================
//

#[derive(Debug, Clone, PartialEq)]
pub enum ToolReply {
    Text(String),
    BranchAvailability {
        branch_name: String,
        wait_minutes: u64,
    },
    Verification(VerificationOutcome),
}

impl ToolReply {
    /// Structured view; availability renders as a single-key map, matching
    /// the tool's contract.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            ToolReply::Text(text) => json!(text),
            ToolReply::BranchAvailability {
                branch_name,
                wait_minutes,
            } => {
                let mut map = serde_json::Map::new();
                map.insert(branch_name.clone(), json!(wait_minutes));
                serde_json::Value::Object(map)
            }
            ToolReply::Verification(outcome) => json!(outcome.message),
        }
    }

    /// String view for the audit trail and the routing scratchpad.
    pub fn render(&self) -> String {
        match self {
            ToolReply::Text(text) => text.clone(),
            ToolReply::BranchAvailability { .. } => self.to_value().to_string(),
            ToolReply::Verification(outcome) => outcome.message.clone(),
        }
    }
}

//
// ================= Dispatcher =================
//

pub struct Toolbox {
    graph: Arc<dyn GraphStore>,
    faq: FaqAnswerer,
    graph_qa: GraphAnswerer,
    gate: VerificationGate,
    wait_times: Arc<dyn WaitTimeSource>,
}

impl Toolbox {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        faq: FaqAnswerer,
        graph_qa: GraphAnswerer,
        gate: VerificationGate,
        wait_times: Arc<dyn WaitTimeSource>,
    ) -> Self {
        Self {
            graph,
            faq,
            graph_qa,
            gate,
            wait_times,
        }
    }

    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolReply> {
        let start = Instant::now();

        let result = match call {
            ToolCall::VerifyCustomer(request) => self
                .gate
                .verify(request)
                .await
                .map(ToolReply::Verification),
            ToolCall::ExploreBankDatabase { question } => {
                self.graph_qa.answer(question).await.map(ToolReply::Text)
            }
            ToolCall::ExploreProductFaqs { question } => {
                self.faq.answer(question).await.map(ToolReply::Text)
            }
            ToolCall::GetBranchWaitTime { branch } => self.branch_wait_time(branch).await,
            ToolCall::FindMostAvailableBranch => self.most_available_branch().await,
        };

        match &result {
            Ok(_) => debug!(
                tool = call.name(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Tool dispatched"
            ),
            Err(e) => warn!(tool = call.name(), error = %e, "Tool execution failed"),
        }

        result
    }

    /// Known branches in stable ascending id order; this ordering is what
    /// makes the most-available tie-break deterministic.
    async fn list_branches(&self) -> Result<Vec<BranchRef>> {
        let rows = self
            .graph
            .execute(&PatternQuery::all(NodeLabel::Branch, &["id", "name"]))
            .await?;

        let mut branches: Vec<BranchRef> = rows
            .iter()
            .filter_map(|row| {
                let name = row.get("name")?.as_str()?.to_string();
                let id = row
                    .get("id")
                    .and_then(Scalar::as_str)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(i64::MAX);
                Some(BranchRef { id, name })
            })
            .collect();

        branches.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)));
        Ok(branches)
    }

    async fn branch_wait_time(&self, branch: &str) -> Result<ToolReply> {
        let branches = self.list_branches().await?;

        let Some(found) = branches
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(branch.trim()))
        else {
            return Ok(ToolReply::Text(format!(
                "Branch '{}' does not exist.",
                branch
            )));
        };

        let minutes = self.wait_times.current_wait_minutes(found).await?;
        Ok(ToolReply::Text(format_wait_time(minutes)))
    }

    async fn most_available_branch(&self) -> Result<ToolReply> {
        let branches = self.list_branches().await?;

        let mut best: Option<(String, u64)> = None;
        for branch in &branches {
            let minutes = self.wait_times.current_wait_minutes(branch).await?;
            // First minimum in id order wins ties.
            if best.as_ref().map(|(_, m)| minutes < *m).unwrap_or(true) {
                best = Some((branch.name.clone(), minutes));
            }
        }

        match best {
            Some((branch_name, wait_minutes)) => Ok(ToolReply::BranchAvailability {
                branch_name,
                wait_minutes,
            }),
            None => Ok(ToolReply::Text("There are no branches on record.".to_string())),
        }
    }
}
