//! Bank RAG Agent
//!
//! Backend for a retail-banking chatbot grounded in a labeled property
//! graph:
//! - A routing policy selects one capability per step (graph query, FAQ
//!   vector search, branch wait times, identity verification)
//! - A verification gate guards account-specific queries
//! - Per-session history is serialized and committed only on turn success
//! - CSV ETL loads branches, customers, mortgages, payments, fees and FAQs
//!
//! TURN LOOP:
//! ROUTE -> GATE -> DISPATCH -> OBSERVE -> ... -> FINAL ANSWER

pub mod agent;
pub mod api;
pub mod error;
pub mod etl;
pub mod faq;
pub mod graph;
pub mod graph_qa;
pub mod llm;
pub mod models;
pub mod routing;
pub mod session;
pub mod tools;
pub mod verification;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use routing::{RouteDecision, RoutePolicy};
pub use tools::{ToolCall, ToolReply};
