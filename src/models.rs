//! Core data models for the bank RAG agent

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single turn message. Append-only and immutable once appended to a
/// session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        write!(f, "{}: {}", role, self.content)
    }
}

//
// ================= Verification =================
//

/// Identity status attached to a session. Transitions only through the
/// verification gate; never persisted beyond session lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum VerificationStatus {
    Unverified,
    Verified {
        customer_id: String,
        customer_name: String,
    },
}

impl VerificationStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationStatus::Verified { .. })
    }
}

impl Default for VerificationStatus {
    fn default() -> Self {
        VerificationStatus::Unverified
    }
}

//
// ================= Audit Trail =================
//

/// One logged tool invocation within a turn. The per-turn sequence is the
/// audit trail returned to the caller; it is never fed back into the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub input: serde_json::Value,
    pub output: String,
    pub position: usize,
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}({}) -> {}",
            self.position, self.tool, self.input, self.output
        )
    }
}

//
// ================= Turn Output =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub output: String,
    pub intermediate_steps: Vec<String>,
    pub session_id: Uuid,
}
