//! Tool routing
//!
//! The orchestrator core depends only on the `RoutePolicy` seam: a routing
//! function from the accumulated turn context to either one tool call or a
//! terminal answer. `KeywordRouter` is the deterministic implementation the
//! test harness pins against; `routing::llm` delegates the same decision to
//! a chat model.

use crate::models::{Message, ToolInvocation, VerificationStatus};
use crate::tools::ToolCall;
use crate::verification::VerifyRequest;
use crate::Result;

pub mod llm;

pub use llm::LlmRouter;

/// Everything the policy may condition on at one step of the loop.
pub struct RouteContext<'a> {
    pub text: &'a str,
    pub verification: &'a VerificationStatus,
    pub history: &'a [Message],
    pub steps: &'a [ToolInvocation],
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Invoke(ToolCall),
    Finish(String),
}

#[async_trait::async_trait]
pub trait RoutePolicy: Send + Sync {
    async fn route(&self, ctx: &RouteContext<'_>) -> Result<RouteDecision>;
}

pub const CAPABILITIES_MESSAGE: &str = "I can help with questions about your mortgage and \
payments, our mortgage products, and branch wait times. Could you rephrase your question?";

/// Static keyword lists — zero allocation
const AVAILABILITY_KEYWORDS: &[&str] = &[
    "shortest wait",
    "most available",
    "least busy",
    "lowest wait",
    "best branch to visit",
];

const WAIT_KEYWORDS: &[&str] = &["wait time", "wait at", "how long is the wait", "waiting time"];

const DATABASE_KEYWORDS: &[&str] = &[
    // Aggregations never belong to the FAQ corpus
    "average", "count", "how many", "total", "percent", "aggregate",
    // Account-specific facts
    "my ", "customer", "owe", "outstanding", "balance", "paid",
    "payment", "due", "fee", "schedule", "loan amount",
];

const FAQ_KEYWORDS: &[&str] = &[
    // Product catalogue questions
    "product", "offer", "offered", "terms", "plan",
    // Process questions
    "eligib", "apply", "application", "document", "rates", "faq",
];

/// Deterministic routing over the fixed capability set.
pub struct KeywordRouter;

impl KeywordRouter {
    fn score(text: &str, keywords: &[&str]) -> usize {
        keywords.iter().filter(|kw| text.contains(**kw)).count()
    }

    fn classify(text: &str) -> RouteDecision {
        let lowered = text.to_lowercase();

        if let Some(request) = parse_identity_details(text) {
            return RouteDecision::Invoke(ToolCall::VerifyCustomer(request));
        }

        if Self::score(&lowered, AVAILABILITY_KEYWORDS) > 0 {
            return RouteDecision::Invoke(ToolCall::FindMostAvailableBranch);
        }

        if Self::score(&lowered, WAIT_KEYWORDS) > 0 {
            return RouteDecision::Invoke(ToolCall::GetBranchWaitTime {
                branch: extract_branch_name(text),
            });
        }

        let database_score = Self::score(&lowered, DATABASE_KEYWORDS);
        let faq_score = Self::score(&lowered, FAQ_KEYWORDS);

        // Ties favor the FAQ corpus: it needs no verified identity.
        if database_score > faq_score {
            return RouteDecision::Invoke(ToolCall::ExploreBankDatabase {
                question: text.to_string(),
            });
        }
        if faq_score > 0 {
            return RouteDecision::Invoke(ToolCall::ExploreProductFaqs {
                question: text.to_string(),
            });
        }

        RouteDecision::Finish(CAPABILITIES_MESSAGE.to_string())
    }
}

#[async_trait::async_trait]
impl RoutePolicy for KeywordRouter {
    async fn route(&self, ctx: &RouteContext<'_>) -> Result<RouteDecision> {
        // One tool per turn: once an observation exists, surface it.
        if let Some(last) = ctx.steps.last() {
            return Ok(RouteDecision::Finish(last.output.clone()));
        }

        Ok(Self::classify(ctx.text))
    }
}

/// Recognize an identity submission: four comma-separated fields where the
/// zip and phone parts carry digits, e.g. "Jon, Doe, 28461, 555-0100".
/// An optional leading "verify ...:" clause is stripped first.
fn parse_identity_details(text: &str) -> Option<VerifyRequest> {
    let payload = match text.to_lowercase().find("verify") {
        Some(_) => text.split_once(':').map(|(_, rest)| rest).unwrap_or(text),
        None => text,
    };

    let parts: Vec<&str> = payload.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return None;
    }

    let has_digit = |s: &str| s.chars().any(|c| c.is_ascii_digit());
    let name_like = |s: &str| !s.is_empty() && !has_digit(s);

    if name_like(parts[0]) && name_like(parts[1]) && has_digit(parts[2]) && has_digit(parts[3]) {
        Some(VerifyRequest {
            first_name: parts[0].to_string(),
            last_name: parts[1].to_string(),
            zip_code: parts[2].to_string(),
            phone_number: parts[3].to_string(),
        })
    } else {
        None
    }
}

/// Pull the branch name out of a wait-time question: the clause after the
/// last " at ", minus punctuation and a trailing "branch".
fn extract_branch_name(text: &str) -> String {
    let tail = text
        .rfind(" at ")
        .map(|idx| &text[idx + 4..])
        .unwrap_or(text);

    tail.trim()
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .trim_end_matches("Branch")
        .trim_end_matches("branch")
        .trim()
        .to_string()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerificationStatus;

    async fn first_route(text: &str) -> RouteDecision {
        let ctx = RouteContext {
            text,
            verification: &VerificationStatus::Unverified,
            history: &[],
            steps: &[],
        };
        KeywordRouter.route(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_structured_query_routes_to_bank_database() {
        let decision = first_route("What is the average loan amount?").await;
        match decision {
            RouteDecision::Invoke(call) => assert_eq!(call.name(), "explore_bank_database"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_product_question_routes_to_faqs() {
        let decision = first_route("What are the terms for a mortgage product?").await;
        match decision {
            RouteDecision::Invoke(call) => assert_eq!(call.name(), "explore_product_faqs"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shortest_wait_routes_to_most_available_branch() {
        let decision = first_route("Which branch has the shortest wait time right now?").await;
        match decision {
            RouteDecision::Invoke(call) => {
                assert_eq!(call.name(), "find_most_available_branch")
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wait_time_question_extracts_branch_name() {
        let decision = first_route("What is the current wait time at Jordan Inc?").await;
        assert_eq!(
            decision,
            RouteDecision::Invoke(ToolCall::GetBranchWaitTime {
                branch: "Jordan Inc".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_identity_details_route_to_verification() {
        let decision = first_route("Please verify me: Jon, Doe, 28461, 555-0100").await;
        match decision {
            RouteDecision::Invoke(ToolCall::VerifyCustomer(request)) => {
                assert_eq!(request.first_name, "Jon");
                assert_eq!(request.last_name, "Doe");
                assert_eq!(request.zip_code, "28461");
                assert_eq!(request.phone_number, "555-0100");
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_routing_is_deterministic() {
        let first = first_route("What is the average loan amount?").await;
        let second = first_route("What is the average loan amount?").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_after_one_step_the_router_finishes() {
        let steps = vec![crate::models::ToolInvocation {
            tool: "get_branch_wait_time".to_string(),
            input: serde_json::json!({"branch": "Jordan Inc"}),
            output: "25 minutes".to_string(),
            position: 0,
        }];
        let ctx = RouteContext {
            text: "What is the current wait time at Jordan Inc?",
            verification: &VerificationStatus::Unverified,
            history: &[],
            steps: &steps,
        };

        let decision = KeywordRouter.route(&ctx).await.unwrap();
        assert_eq!(decision, RouteDecision::Finish("25 minutes".to_string()));
    }

    #[tokio::test]
    async fn test_unmatched_utterance_finishes_with_capabilities() {
        let decision = first_route("hello there").await;
        assert_eq!(
            decision,
            RouteDecision::Finish(CAPABILITIES_MESSAGE.to_string())
        );
    }
}
