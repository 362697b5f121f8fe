//! Model-backed routing policy
//!
//! Delegates the per-step tool-selection decision to a chat model. The
//! model replies with one JSON action; malformed replies are fed back for
//! correction before the step is reported as a routing failure.

use super::{RouteContext, RouteDecision, RoutePolicy};
use crate::error::AgentError;
use crate::models::VerificationStatus;
use crate::tools::{ToolCall, TOOL_DESCRIPTIONS};
use crate::llm::ChatModel;
use crate::Result;
use std::sync::Arc;
use tracing::warn;

/// Corrective re-prompts per routing step.
const MAX_PARSE_CORRECTIONS: u32 = 2;

const SYSTEM_HEADER: &str = "You are a helpful chatbot for a bank designed to answer any \
queries about customer mortgage/loan details, customer payment schedule, fee related \
queries and wait times and availability for appointment in a bank branch.\n\n\
At each step, either call exactly one tool or give the final answer.\n\
Account-specific questions require a verified customer; when the session is unverified, \
ask for first name, last name, zip code and phone number via the final answer, or call \
verify_customer when those details were provided.\n\n\
Reply with ONLY one JSON object, no prose:\n\
  {\"action\": \"<tool name>\", \"action_input\": { ... }}\n\
or\n\
  {\"action\": \"final_answer\", \"action_input\": \"<answer text>\"}";

pub struct LlmRouter {
    chat: Arc<dyn ChatModel>,
}

impl LlmRouter {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    fn system_prompt() -> String {
        let mut out = String::from(SYSTEM_HEADER);
        out.push_str("\n\nAvailable tools:\n");
        for (name, description) in TOOL_DESCRIPTIONS {
            out.push_str(&format!("- {}: {}\n", name, description));
        }
        out
    }

    fn user_prompt(ctx: &RouteContext<'_>) -> String {
        let mut out = String::new();

        match ctx.verification {
            VerificationStatus::Unverified => out.push_str("Session status: unverified\n"),
            VerificationStatus::Verified {
                customer_id,
                customer_name,
            } => out.push_str(&format!(
                "Session status: verified as {} (customer id {})\n",
                customer_name, customer_id
            )),
        }

        if !ctx.history.is_empty() {
            out.push_str("\nConversation so far:\n");
            for message in ctx.history {
                out.push_str(&format!("{}\n", message));
            }
        }

        out.push_str(&format!("\nUser input: {}\n", ctx.text));

        if !ctx.steps.is_empty() {
            out.push_str("\nTool results this turn:\n");
            for step in ctx.steps {
                out.push_str(&format!("{}\n", step));
            }
            out.push_str("\nUse these results to answer, or call another tool if needed.\n");
        }

        out
    }
}

#[async_trait::async_trait]
impl RoutePolicy for LlmRouter {
    async fn route(&self, ctx: &RouteContext<'_>) -> Result<RouteDecision> {
        let system = Self::system_prompt();
        let mut prompt = Self::user_prompt(ctx);

        let mut last_error = String::new();
        for attempt in 0..=MAX_PARSE_CORRECTIONS {
            let reply = self.chat.complete(&system, &prompt).await?;

            match parse_decision(&reply) {
                Ok(decision) => return Ok(decision),
                Err(e) => {
                    warn!(attempt, error = %e, "Routing reply was malformed");
                    last_error = e.to_string();
                    prompt = format!(
                        "{}\n\nYour previous reply could not be parsed ({}). \
                         Reply again with ONLY one valid JSON action object.",
                        Self::user_prompt(ctx),
                        last_error
                    );
                }
            }
        }

        Err(AgentError::RoutingError(format!(
            "routing reply stayed malformed after {} corrections: {}",
            MAX_PARSE_CORRECTIONS, last_error
        )))
    }
}

fn parse_decision(reply: &str) -> Result<RouteDecision> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|e| AgentError::RoutingError(format!("invalid JSON action: {}", e)))?;

    let action = value
        .get("action")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AgentError::RoutingError("missing \"action\" field".to_string()))?;

    if action == "final_answer" {
        let answer = value
            .get("action_input")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AgentError::RoutingError("final_answer requires string action_input".to_string())
            })?;
        return Ok(RouteDecision::Finish(answer.to_string()));
    }

    let call: ToolCall = serde_json::from_value(serde_json::json!({
        "tool": action,
        "arguments": value.get("action_input").cloned().unwrap_or(serde_json::Value::Null),
    }))
    .map_err(|e| AgentError::RoutingError(format!("unknown tool action {:?}: {}", action, e)))?;

    Ok(RouteDecision::Invoke(call))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedChat;
    use crate::models::VerificationStatus;

    fn ctx(text: &str) -> RouteContext<'_> {
        RouteContext {
            text,
            verification: &VerificationStatus::Unverified,
            history: &[],
            steps: &[],
        }
    }

    #[tokio::test]
    async fn test_parses_tool_action() {
        let chat = Arc::new(ScriptedChat::new(&[
            r#"{"action": "get_branch_wait_time", "action_input": {"branch": "Jordan Inc"}}"#,
        ]));
        let router = LlmRouter::new(chat);

        let decision = router
            .route(&ctx("What is the wait time at Jordan Inc?"))
            .await
            .unwrap();
        assert_eq!(
            decision,
            RouteDecision::Invoke(ToolCall::GetBranchWaitTime {
                branch: "Jordan Inc".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_parses_final_answer() {
        let chat = Arc::new(ScriptedChat::new(&[
            r#"{"action": "final_answer", "action_input": "The wait is 25 minutes."}"#,
        ]));
        let router = LlmRouter::new(chat);

        let decision = router.route(&ctx("thanks")).await.unwrap();
        assert_eq!(
            decision,
            RouteDecision::Finish("The wait is 25 minutes.".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_reply_is_fed_back_for_correction() {
        let chat = Arc::new(ScriptedChat::new(&[
            "let me think about which tool fits",
            r#"```json
{"action": "find_most_available_branch"}
```"#,
        ]));
        let router = LlmRouter::new(chat);

        let decision = router
            .route(&ctx("Which branch has the shortest wait time?"))
            .await
            .unwrap();
        assert_eq!(
            decision,
            RouteDecision::Invoke(ToolCall::FindMostAvailableBranch)
        );
    }

    #[tokio::test]
    async fn test_persistent_malformed_output_is_a_routing_error() {
        let chat = Arc::new(ScriptedChat::new(&["nope", "still nope", "never json"]));
        let router = LlmRouter::new(chat);

        let result = router.route(&ctx("anything")).await;
        assert!(matches!(result, Err(AgentError::RoutingError(_))));
    }
}
