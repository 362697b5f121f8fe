//! Graph store interface
//!
//! The labeled property graph is an external collaborator. All reads the
//! tools need flow through the `GraphStore` trait; the in-memory backend in
//! `graph::memory` serves tests and local runs.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod memory;

pub use memory::InMemoryGraph;

//
// ================= Labels & Relationships =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeLabel {
    Branch,
    Customer,
    Mortgage,
    Payments,
    PaymentsDue,
    Fees,
    Faqs,
    Question,
}

impl NodeLabel {
    pub const ALL: &'static [NodeLabel] = &[
        NodeLabel::Branch,
        NodeLabel::Customer,
        NodeLabel::Mortgage,
        NodeLabel::Payments,
        NodeLabel::PaymentsDue,
        NodeLabel::Fees,
        NodeLabel::Faqs,
        NodeLabel::Question,
    ];
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeLabel::Branch => "Branch",
            NodeLabel::Customer => "Customer",
            NodeLabel::Mortgage => "Mortgage",
            NodeLabel::Payments => "Payments",
            NodeLabel::PaymentsDue => "PaymentsDue",
            NodeLabel::Fees => "Fees",
            NodeLabel::Faqs => "FAQs",
            NodeLabel::Question => "Question",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelType {
    Has,
    Made,
    Schedule,
    MayIncur,
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelType::Has => "HAS",
            RelType::Made => "MADE",
            RelType::Schedule => "SCHEDULE",
            RelType::MayIncur => "MAY_INCUR",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Scalar Values =================
//

/// Typed scalar property value, the only value shape the store returns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Str(s) => s.parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

/// Property map of a node. BTreeMap keeps serialization stable.
pub type Properties = BTreeMap<String, Scalar>;

/// One projected result row.
pub type Row = BTreeMap<String, Scalar>;

//
// ================= Pattern Queries =================
//

/// Case-insensitive equality filter on a start-node property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyFilter {
    pub property: String,
    pub equals: String,
}

/// One relationship traversal step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hop {
    pub rel: RelType,
    pub target: NodeLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "op", content = "property")]
pub enum Aggregate {
    Count,
    Avg(String),
    Sum(String),
    Min(String),
    Max(String),
}

/// A declarative pattern query: match nodes of `start_label` passing all
/// `filters`, walk `hops` in order, then project `returns` from the final
/// nodes (or reduce them with `aggregate`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternQuery {
    pub start_label: NodeLabel,
    #[serde(default)]
    pub filters: Vec<PropertyFilter>,
    #[serde(default)]
    pub hops: Vec<Hop>,
    #[serde(default)]
    pub returns: Vec<String>,
    #[serde(default)]
    pub aggregate: Option<Aggregate>,
}

impl PatternQuery {
    pub fn all(label: NodeLabel, returns: &[&str]) -> Self {
        Self {
            start_label: label,
            filters: Vec::new(),
            hops: Vec::new(),
            returns: returns.iter().map(|s| s.to_string()).collect(),
            aggregate: None,
        }
    }
}

//
// ================= Vector Search =================
//

/// A vector-search hit: node properties plus cosine similarity.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub id: String,
    pub properties: Properties,
    pub score: f32,
}

//
// ================= Store Interface =================
//

/// Reference to a node endpoint when merging relationships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub id: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, id: impl Into<String>) -> Self {
        Self {
            label,
            id: id.into(),
        }
    }
}

/// Query-by-pattern and vector-similarity interface consumed by the tools
/// and the ETL. No tool mutates the graph; the mutation surface exists for
/// the loader only.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Install per-label id-uniqueness constraints. Idempotent.
    async fn install_constraints(&self, labels: &[NodeLabel]) -> Result<()>;

    /// Remove all nodes, relationships and embeddings.
    async fn wipe(&self) -> Result<()>;

    /// Upsert a node keyed by (label, id).
    async fn merge_node(&self, label: NodeLabel, id: &str, props: Properties) -> Result<()>;

    /// Upsert a relationship. Both endpoints must already exist.
    async fn merge_relationship(&self, from: NodeRef, rel: RelType, to: NodeRef) -> Result<()>;

    /// Attach an embedding vector to a node.
    async fn set_embedding(&self, node: NodeRef, embedding: Vec<f32>) -> Result<()>;

    /// Execute a pattern query, returning projected rows in stable order.
    async fn execute(&self, query: &PatternQuery) -> Result<Vec<Row>>;

    /// Top-k nodes of `label` by cosine similarity to `embedding`.
    async fn vector_search(
        &self,
        label: NodeLabel,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredNode>>;

    async fn node_count(&self) -> Result<usize>;

    async fn relationship_count(&self) -> Result<usize>;
}
