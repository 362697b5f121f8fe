//! Agent orchestrator - the tool-selection loop
//!
//! ROUTE -> GATE -> DISPATCH -> OBSERVE, repeated until the policy
//! terminates with a final answer or the iteration cap trips. History
//! commits only after the loop succeeds; the whole turn retries at the
//! request boundary on transient failure.

use crate::models::{Message, ToolInvocation, TurnResponse, VerificationStatus};
use crate::routing::{RouteContext, RouteDecision, RoutePolicy};
use crate::session::SessionStore;
use crate::tools::{ToolCall, ToolReply, Toolbox};
use crate::error::AgentError;
use crate::Result;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const VERIFY_FIRST_MESSAGE: &str = "I can only look up account details after verifying \
your identity. Please share your first name, last name, zip code and phone number.";

pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while answering your question. Please try again later.";

//
// ================= Configuration =================
//

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Routing steps per turn before the turn fails.
    pub max_iterations: u32,
    /// Whole-turn attempts at the request boundary.
    pub max_retries: u32,
    /// Fixed delay between turn attempts.
    pub retry_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 12,
            max_retries: 10,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let parse = |name: &str, fallback: u64| {
            env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };

        Self {
            max_iterations: parse("AGENT_MAX_ITERATIONS", defaults.max_iterations as u64) as u32,
            max_retries: parse("AGENT_MAX_RETRIES", defaults.max_retries as u64) as u32,
            retry_delay: Duration::from_millis(parse(
                "AGENT_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )),
        }
    }
}

//
// ================= Orchestrator =================

pub struct Orchestrator {
    policy: Arc<dyn RoutePolicy>,
    toolbox: Toolbox,
    sessions: Arc<SessionStore>,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        policy: Arc<dyn RoutePolicy>,
        toolbox: Toolbox,
        sessions: Arc<SessionStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            policy,
            toolbox,
            sessions,
            config,
        }
    }

    /// Answer one user utterance. Retries the entire turn on transient
    /// failure with a fixed inter-attempt delay; an iteration-cap trip is
    /// fatal for the turn and not retried.
    pub async fn answer(&self, text: &str, session_id: Option<Uuid>) -> Result<TurnResponse> {
        let session_id = session_id.unwrap_or_else(Uuid::new_v4);

        info!(%session_id, "Agent turn started");

        for attempt in 1..=self.config.max_retries {
            match self.run_turn(session_id, text).await {
                Ok(response) => {
                    if attempt > 1 {
                        info!(attempt, "Turn succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e @ AgentError::IterationCapExceeded(_)) => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "Turn attempt failed");
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        Err(AgentError::RetriesExhausted(self.config.max_retries))
    }

    /// One attempt at the turn. Holds the session lock for the whole
    /// read-modify-write sequence so concurrent turns on the same session
    /// serialize; history is appended only once a final answer exists.
    async fn run_turn(&self, session_id: Uuid, text: &str) -> Result<TurnResponse> {
        let handle = self.sessions.get_or_create(session_id).await;
        let mut session = handle.lock().await;

        let history = session.messages().to_vec();
        let mut steps: Vec<ToolInvocation> = Vec::new();
        let mut final_answer: Option<String> = None;

        for iteration in 0..self.config.max_iterations {
            let decision = {
                let ctx = RouteContext {
                    text,
                    verification: &session.verification,
                    history: &history,
                    steps: &steps,
                };
                self.policy.route(&ctx).await?
            };

            match decision {
                RouteDecision::Finish(answer) => {
                    debug!(iteration, "Policy terminated with final answer");
                    final_answer = Some(answer);
                    break;
                }
                RouteDecision::Invoke(call) => {
                    debug!(iteration, tool = call.name(), "Policy selected tool");

                    // Hard precondition: account queries need a verified
                    // session. The refusal rides the success path as a
                    // user-legible answer and still shows in the trail.
                    if matches!(call, ToolCall::ExploreBankDatabase { .. })
                        && !session.verification.is_verified()
                    {
                        warn!("Refusing account query for unverified session");
                        steps.push(ToolInvocation {
                            tool: call.name().to_string(),
                            input: call.arguments(),
                            output: VERIFY_FIRST_MESSAGE.to_string(),
                            position: steps.len(),
                        });
                        final_answer = Some(VERIFY_FIRST_MESSAGE.to_string());
                        break;
                    }

                    let call = qualify_identity(call, &session.verification);
                    let reply = self.toolbox.dispatch(&call).await?;

                    if let ToolReply::Verification(outcome) = &reply {
                        if let Some(customer) = &outcome.customer {
                            session.verification = VerificationStatus::Verified {
                                customer_id: customer.customer_id.clone(),
                                customer_name: customer.customer_name.clone(),
                            };
                        }
                    }

                    steps.push(ToolInvocation {
                        tool: call.name().to_string(),
                        input: call.arguments(),
                        output: reply.render(),
                        position: steps.len(),
                    });
                }
            }
        }

        let Some(output) = final_answer else {
            return Err(AgentError::IterationCapExceeded(self.config.max_iterations));
        };

        session.append(Message::user(text));
        session.append(Message::assistant(output.as_str()));

        info!(
            %session_id,
            step_count = steps.len(),
            "Agent turn complete"
        );

        Ok(TurnResponse {
            output,
            intermediate_steps: steps.iter().map(ToString::to_string).collect(),
            session_id,
        })
    }
}

/// Once verified, the structured-query tool's question carries the
/// customer's identity so the translation can scope to their records.
fn qualify_identity(call: ToolCall, verification: &VerificationStatus) -> ToolCall {
    match (call, verification) {
        (
            ToolCall::ExploreBankDatabase { question },
            VerificationStatus::Verified {
                customer_id,
                customer_name,
            },
        ) => ToolCall::ExploreBankDatabase {
            question: format!(
                "{} (customer: {}, customer id: {})",
                question, customer_name, customer_id
            ),
        },
        (call, _) => call,
    }
}
