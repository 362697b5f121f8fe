//! In-memory graph store
//!
//! Backs tests and local runs. MERGE semantics fall out of keying nodes by
//! (label, id) and relationships by their full endpoint tuple.

use super::{
    Aggregate, GraphStore, NodeLabel, NodeRef, PatternQuery, Properties, RelType, Row, Scalar,
    ScoredNode,
};
use crate::error::AgentError;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type NodeKey = (NodeLabel, String);
type RelKey = (NodeLabel, String, RelType, NodeLabel, String);

#[derive(Default)]
struct GraphData {
    nodes: BTreeMap<NodeLabel, BTreeMap<String, Properties>>,
    relationships: BTreeSet<RelKey>,
    embeddings: HashMap<NodeKey, Vec<f32>>,
    constraints: BTreeSet<NodeLabel>,
}

pub struct InMemoryGraph {
    data: Arc<RwLock<GraphData>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(GraphData::default())),
        }
    }
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(props: &Properties, property: &str, equals: &str) -> bool {
    props
        .get(property)
        .map(|v| v.to_string().eq_ignore_ascii_case(equals))
        .unwrap_or(false)
}

fn project(id: &str, props: &Properties, returns: &[String]) -> Row {
    let mut row = Row::new();
    for name in returns {
        if name == "id" {
            row.insert("id".to_string(), Scalar::Str(id.to_string()));
        } else if let Some(value) = props.get(name) {
            row.insert(name.clone(), value.clone());
        }
    }
    row
}

fn aggregate_rows(nodes: &[(String, Properties)], aggregate: &Aggregate) -> Row {
    let mut row = Row::new();
    match aggregate {
        Aggregate::Count => {
            row.insert("count".to_string(), Scalar::Int(nodes.len() as i64));
        }
        Aggregate::Avg(prop) | Aggregate::Sum(prop) | Aggregate::Min(prop)
        | Aggregate::Max(prop) => {
            let values: Vec<f64> = nodes
                .iter()
                .filter_map(|(_, props)| props.get(prop).and_then(Scalar::as_f64))
                .collect();

            let (name, value) = match aggregate {
                Aggregate::Avg(_) => (
                    format!("avg({})", prop),
                    if values.is_empty() {
                        None
                    } else {
                        Some(values.iter().sum::<f64>() / values.len() as f64)
                    },
                ),
                Aggregate::Sum(_) => (format!("sum({})", prop), Some(values.iter().sum())),
                Aggregate::Min(_) => (
                    format!("min({})", prop),
                    values.iter().cloned().reduce(f64::min),
                ),
                Aggregate::Max(_) => (
                    format!("max({})", prop),
                    values.iter().cloned().reduce(f64::max),
                ),
                Aggregate::Count => unreachable!(),
            };

            if let Some(value) = value {
                row.insert(name, Scalar::Float(value));
            }
        }
    }
    row
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait::async_trait]
impl GraphStore for InMemoryGraph {
    async fn install_constraints(&self, labels: &[NodeLabel]) -> Result<()> {
        let mut data = self.data.write().await;
        for label in labels {
            data.constraints.insert(*label);
        }
        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        let mut data = self.data.write().await;
        data.nodes.clear();
        data.relationships.clear();
        data.embeddings.clear();
        debug!("Graph wiped");
        Ok(())
    }

    async fn merge_node(&self, label: NodeLabel, id: &str, props: Properties) -> Result<()> {
        let mut data = self.data.write().await;
        data.nodes
            .entry(label)
            .or_default()
            .insert(id.to_string(), props);
        Ok(())
    }

    async fn merge_relationship(&self, from: NodeRef, rel: RelType, to: NodeRef) -> Result<()> {
        let mut data = self.data.write().await;

        let exists = |label: NodeLabel, id: &str, data: &GraphData| {
            data.nodes
                .get(&label)
                .map(|nodes| nodes.contains_key(id))
                .unwrap_or(false)
        };

        if !exists(from.label, &from.id, &*data) {
            return Err(AgentError::GraphError(format!(
                "relationship endpoint missing: {}#{}",
                from.label, from.id
            )));
        }
        if !exists(to.label, &to.id, &*data) {
            return Err(AgentError::GraphError(format!(
                "relationship endpoint missing: {}#{}",
                to.label, to.id
            )));
        }

        data.relationships
            .insert((from.label, from.id, rel, to.label, to.id));
        Ok(())
    }

    async fn set_embedding(&self, node: NodeRef, embedding: Vec<f32>) -> Result<()> {
        let mut data = self.data.write().await;
        if data
            .nodes
            .get(&node.label)
            .map(|nodes| !nodes.contains_key(&node.id))
            .unwrap_or(true)
        {
            return Err(AgentError::GraphError(format!(
                "cannot embed missing node {}#{}",
                node.label, node.id
            )));
        }
        data.embeddings.insert((node.label, node.id), embedding);
        Ok(())
    }

    async fn execute(&self, query: &PatternQuery) -> Result<Vec<Row>> {
        let data = self.data.read().await;

        // Start set: nodes of the start label passing every filter.
        let mut current: Vec<(String, Properties)> = data
            .nodes
            .get(&query.start_label)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|(_, props)| {
                        query
                            .filters
                            .iter()
                            .all(|f| matches_filter(props, &f.property, &f.equals))
                    })
                    .map(|(id, props)| (id.clone(), props.clone()))
                    .collect()
            })
            .unwrap_or_default();

        // Walk hops, collecting reachable targets in stable id order.
        let mut current_label = query.start_label;
        for hop in &query.hops {
            let mut next: BTreeMap<String, Properties> = BTreeMap::new();
            for (id, _) in &current {
                for (from_label, from_id, rel, to_label, to_id) in &data.relationships {
                    if *from_label == current_label
                        && from_id == id
                        && *rel == hop.rel
                        && *to_label == hop.target
                    {
                        if let Some(props) =
                            data.nodes.get(to_label).and_then(|nodes| nodes.get(to_id))
                        {
                            next.insert(to_id.clone(), props.clone());
                        }
                    }
                }
            }
            current = next.into_iter().collect();
            current_label = hop.target;
        }

        if let Some(aggregate) = &query.aggregate {
            return Ok(vec![aggregate_rows(&current, aggregate)]);
        }

        Ok(current
            .iter()
            .map(|(id, props)| project(id, props, &query.returns))
            .collect())
    }

    async fn vector_search(
        &self,
        label: NodeLabel,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredNode>> {
        let data = self.data.read().await;

        let mut scored: Vec<ScoredNode> = data
            .nodes
            .get(&label)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|(id, props)| {
                        data.embeddings
                            .get(&(label, id.clone()))
                            .map(|stored| ScoredNode {
                                id: id.clone(),
                                properties: props.clone(),
                                score: cosine(stored, embedding),
                            })
                    })
                    .collect()
            })
            .unwrap_or_default();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn node_count(&self) -> Result<usize> {
        let data = self.data.read().await;
        Ok(data.nodes.values().map(|nodes| nodes.len()).sum())
    }

    async fn relationship_count(&self) -> Result<usize> {
        let data = self.data.read().await;
        Ok(data.relationships.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Hop, PropertyFilter};

    fn props(entries: &[(&str, Scalar)]) -> Properties {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    async fn seed_customer_with_mortgages(graph: &InMemoryGraph) {
        graph
            .merge_node(
                NodeLabel::Customer,
                "C-1",
                props(&[("name", "Jon Doe".into())]),
            )
            .await
            .unwrap();
        graph
            .merge_node(
                NodeLabel::Mortgage,
                "M-1",
                props(&[("amount", 250_000.0.into())]),
            )
            .await
            .unwrap();
        graph
            .merge_node(
                NodeLabel::Mortgage,
                "M-2",
                props(&[("amount", 150_000.0.into())]),
            )
            .await
            .unwrap();
        graph
            .merge_relationship(
                NodeRef::new(NodeLabel::Customer, "C-1"),
                RelType::Has,
                NodeRef::new(NodeLabel::Mortgage, "M-1"),
            )
            .await
            .unwrap();
        graph
            .merge_relationship(
                NodeRef::new(NodeLabel::Customer, "C-1"),
                RelType::Has,
                NodeRef::new(NodeLabel::Mortgage, "M-2"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let graph = InMemoryGraph::new();
        seed_customer_with_mortgages(&graph).await;
        seed_customer_with_mortgages(&graph).await;

        assert_eq!(graph.node_count().await.unwrap(), 3);
        assert_eq!(graph.relationship_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_relationship_requires_endpoints() {
        let graph = InMemoryGraph::new();
        let result = graph
            .merge_relationship(
                NodeRef::new(NodeLabel::Customer, "missing"),
                RelType::Has,
                NodeRef::new(NodeLabel::Mortgage, "also-missing"),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_filtered_hop_query() {
        let graph = InMemoryGraph::new();
        seed_customer_with_mortgages(&graph).await;

        let query = PatternQuery {
            start_label: NodeLabel::Customer,
            filters: vec![PropertyFilter {
                property: "name".to_string(),
                equals: "jon doe".to_string(),
            }],
            hops: vec![Hop {
                rel: RelType::Has,
                target: NodeLabel::Mortgage,
            }],
            returns: vec!["id".to_string(), "amount".to_string()],
            aggregate: None,
        };

        let rows = graph.execute(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Scalar::Str("M-1".to_string())));
    }

    #[tokio::test]
    async fn test_average_aggregate() {
        let graph = InMemoryGraph::new();
        seed_customer_with_mortgages(&graph).await;

        let query = PatternQuery {
            start_label: NodeLabel::Mortgage,
            filters: vec![],
            hops: vec![],
            returns: vec![],
            aggregate: Some(Aggregate::Avg("amount".to_string())),
        };

        let rows = graph.execute(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("avg(amount)").and_then(Scalar::as_f64),
            Some(200_000.0)
        );
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_similarity() {
        let graph = InMemoryGraph::new();
        graph
            .merge_node(NodeLabel::Faqs, "F-1", props(&[("question", "a".into())]))
            .await
            .unwrap();
        graph
            .merge_node(NodeLabel::Faqs, "F-2", props(&[("question", "b".into())]))
            .await
            .unwrap();
        graph
            .set_embedding(NodeRef::new(NodeLabel::Faqs, "F-1"), vec![1.0, 0.0])
            .await
            .unwrap();
        graph
            .set_embedding(NodeRef::new(NodeLabel::Faqs, "F-2"), vec![0.0, 1.0])
            .await
            .unwrap();

        let hits = graph
            .vector_search(NodeLabel::Faqs, &[0.9, 0.1], 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "F-1");
        assert!(hits[0].score > hits[1].score);
    }
}
