//! Chat-model and embedding clients
//!
//! The routing policy, the FAQ answerer and the graph QA answerer all speak
//! to a chat model through the `ChatModel` trait; FAQ retrieval embeds text
//! through `Embedder`. Both have Gemini-backed implementations using a
//! long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const GEMINI_CHAT_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";

/// Chat completion seam. Implementations must be deterministic in tests;
/// production routes through Gemini.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Text-embedding seam. The embedding model itself is out of scope; only
/// the vector interface matters here.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

fn build_client() -> Result<Client> {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(AgentError::from)
}

//
// ================= Gemini Chat =================
//

pub struct GeminiChat {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiChat {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            api_key,
            base_url: GEMINI_CHAT_URL.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ChatModel for GeminiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AgentError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: user.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system.to_string(),
                }],
            },
        };

        info!("Calling chat model");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat model request failed: {}", e);
                AgentError::LlmError(format!("chat request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Chat model error response: {}", error_text);
            return Err(AgentError::LlmError(format!(
                "chat model returned error: {}",
                error_text
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AgentError::LlmError(format!("chat response parse error: {}", e)))?;

        body.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| AgentError::LlmError("empty response from chat model".to_string()))
    }
}

//
// ================= Gemini Embeddings =================
//

pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiEmbedder {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            api_key,
            base_url: GEMINI_EMBED_URL.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.api_key.is_empty() {
            return Err(AgentError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = EmbedRequest {
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::LlmError(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::LlmError(format!(
                "embedding model returned error: {}",
                error_text
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AgentError::LlmError(format!("embedding response parse error: {}", e)))?;

        Ok(body.embedding.values)
    }
}

//
// ================= Wire Types =================
//

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[cfg(test)]
pub mod testing {
    //! Scripted fakes shared by the module tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses in order; panics when the script runs dry.
    pub struct ScriptedChat {
        responses: Mutex<VecDeque<String>>,
    }

    impl ScriptedChat {
        pub fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatModel for ScriptedChat {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::LlmError("scripted chat exhausted".to_string()))
        }
    }

    /// Deterministic letter-frequency embedding; similar texts correlate.
    pub struct LetterFrequencyEmbedder;

    #[async_trait::async_trait]
    impl Embedder for LetterFrequencyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut counts = [0f32; 26];
            for c in text.to_ascii_lowercase().bytes() {
                if c.is_ascii_lowercase() {
                    counts[(c - b'a') as usize] += 1.0;
                }
            }
            Ok(counts.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "What is the wait time at Jordan Inc?".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: "You are a bank assistant".to_string(),
                }],
            },
        };

        let json = serde_json::to_string(&request);
        assert!(json.is_ok());
        assert!(json.unwrap().contains("Jordan Inc"));
    }

    #[tokio::test]
    async fn test_scripted_chat_replays_in_order() {
        use super::testing::ScriptedChat;

        let chat = ScriptedChat::new(&["first", "second"]);
        assert_eq!(chat.complete("s", "u").await.unwrap(), "first");
        assert_eq!(chat.complete("s", "u").await.unwrap(), "second");
        assert!(chat.complete("s", "u").await.is_err());
    }
}
