//! CSV-to-graph bulk loader
//!
//! Destructive full reload: wipe the graph, install per-label uniqueness
//! constraints, MERGE nodes keyed by entity id, then MERGE relationships.
//! Nodes load before relationships so every endpoint exists. Loading the
//! same fixtures twice yields the same node and relationship counts.

use crate::graph::{GraphStore, NodeLabel, NodeRef, Properties, RelType, Scalar};
use crate::llm::Embedder;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

//
// ================= CSV Locations =================
//

#[derive(Debug, Clone)]
pub struct CsvPaths {
    pub branches: PathBuf,
    pub customers: PathBuf,
    pub mortgages: PathBuf,
    pub payments_made: PathBuf,
    pub payments_due: PathBuf,
    pub fees: PathBuf,
    pub faqs: PathBuf,
    pub example_queries: PathBuf,
}

impl CsvPaths {
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            env::var(name)
                .map(PathBuf::from)
                .map_err(|_| crate::error::AgentError::ConfigError(format!("{} is not set", name)))
        };

        Ok(Self {
            branches: var("BRANCHES_CSV_PATH")?,
            customers: var("CUSTOMERS_CSV_PATH")?,
            mortgages: var("MORTGAGE_CSV_PATH")?,
            payments_made: var("PAYMENTS_MADE_CSV_PATH")?,
            payments_due: var("PAYMENTS_DUE_CSV_PATH")?,
            fees: var("FEES_CSV_PATH")?,
            faqs: var("FAQS_CSV_PATH")?,
            example_queries: var("EXAMPLE_QUERIES_CSV_PATH")?,
        })
    }
}

//
// ================= CSV Row Shapes =================
//

#[derive(Debug, Deserialize)]
struct BranchRow {
    branch_id: i64,
    branch_name: String,
    branch_state: String,
}

#[derive(Debug, Deserialize)]
struct CustomerRow {
    customer_id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone_number: String,
    address: String,
    city: String,
    state: String,
    zip_code: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct MortgageRow {
    loan_number: String,
    customer_id: String,
    loan_amount: f64,
    interest_rate: f64,
    start_date: String,
    status: String,
    tenure: String,
}

#[derive(Debug, Deserialize)]
struct PaymentRow {
    payment_made_id: String,
    customer_id: String,
    amount: f64,
    payment_date: String,
}

#[derive(Debug, Deserialize)]
struct PaymentDueRow {
    payment_due_id: String,
    mortgage_id: String,
    amount: f64,
    due_date: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct FeeRow {
    fee_id: String,
    mortgage_id: String,
    #[serde(default)]
    payment_due_id: String,
    fee_type: String,
    amount: f64,
    date_incurred: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct FaqRow {
    faq_id: String,
    question: String,
    answer: String,
    related_topics: String,
}

#[derive(Debug, Deserialize)]
struct QuestionRow {
    question: String,
    query: String,
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn props(entries: Vec<(&str, Scalar)>) -> Properties {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

//
// ================= Loader =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub nodes: usize,
    pub relationships: usize,
}

pub struct GraphLoader {
    graph: Arc<dyn GraphStore>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl GraphLoader {
    /// `embedder` is optional; without one the FAQ vector index stays
    /// empty and only structured queries work.
    pub fn new(graph: Arc<dyn GraphStore>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { graph, embedder }
    }

    pub async fn load(&self, paths: &CsvPaths) -> Result<LoadSummary> {
        info!("Clearing existing graph data");
        self.graph.wipe().await?;

        info!("Setting uniqueness constraints on nodes");
        self.graph.install_constraints(NodeLabel::ALL).await?;

        self.load_nodes(paths).await?;
        self.load_relationships(paths).await?;

        let summary = LoadSummary {
            nodes: self.graph.node_count().await?,
            relationships: self.graph.relationship_count().await?,
        };
        info!(
            nodes = summary.nodes,
            relationships = summary.relationships,
            "Graph load complete"
        );
        Ok(summary)
    }

    async fn load_nodes(&self, paths: &CsvPaths) -> Result<()> {
        info!("Loading branch nodes");
        for row in read_rows::<BranchRow>(&paths.branches)? {
            self.graph
                .merge_node(
                    NodeLabel::Branch,
                    &row.branch_id.to_string(),
                    props(vec![
                        ("id", row.branch_id.to_string().into()),
                        ("name", row.branch_name.into()),
                        ("state", row.branch_state.into()),
                    ]),
                )
                .await?;
        }

        info!("Loading customer nodes");
        for row in read_rows::<CustomerRow>(&paths.customers)? {
            let name = format!("{} {}", row.first_name, row.last_name);
            self.graph
                .merge_node(
                    NodeLabel::Customer,
                    &row.customer_id,
                    props(vec![
                        ("id", row.customer_id.clone().into()),
                        ("first_name", row.first_name.into()),
                        ("last_name", row.last_name.into()),
                        ("name", name.into()),
                        ("email", row.email.into()),
                        ("phone_number", row.phone_number.into()),
                        ("address", row.address.into()),
                        ("city", row.city.into()),
                        ("state", row.state.into()),
                        ("zip_code", row.zip_code.into()),
                        ("country", row.country.into()),
                    ]),
                )
                .await?;
        }

        info!("Loading mortgage nodes");
        for row in read_rows::<MortgageRow>(&paths.mortgages)? {
            self.graph
                .merge_node(
                    NodeLabel::Mortgage,
                    &row.loan_number,
                    props(vec![
                        ("id", row.loan_number.clone().into()),
                        ("amount", row.loan_amount.into()),
                        ("interest", row.interest_rate.into()),
                        ("start", row.start_date.into()),
                        ("status", row.status.into()),
                        ("tenure", row.tenure.into()),
                    ]),
                )
                .await?;
        }

        info!("Loading payment nodes");
        for row in read_rows::<PaymentRow>(&paths.payments_made)? {
            self.graph
                .merge_node(
                    NodeLabel::Payments,
                    &row.payment_made_id,
                    props(vec![
                        ("id", row.payment_made_id.clone().into()),
                        ("amount", row.amount.into()),
                        ("date", row.payment_date.into()),
                    ]),
                )
                .await?;
        }

        info!("Loading payments-due nodes");
        for row in read_rows::<PaymentDueRow>(&paths.payments_due)? {
            self.graph
                .merge_node(
                    NodeLabel::PaymentsDue,
                    &row.payment_due_id,
                    props(vec![
                        ("id", row.payment_due_id.clone().into()),
                        ("amount", row.amount.into()),
                        ("due_date", row.due_date.into()),
                        ("status", row.status.into()),
                    ]),
                )
                .await?;
        }

        info!("Loading fee nodes");
        for row in read_rows::<FeeRow>(&paths.fees)? {
            self.graph
                .merge_node(
                    NodeLabel::Fees,
                    &row.fee_id,
                    props(vec![
                        ("id", row.fee_id.clone().into()),
                        ("type", row.fee_type.into()),
                        ("amount", row.amount.into()),
                        ("date_incurred", row.date_incurred.into()),
                        ("status", row.status.into()),
                    ]),
                )
                .await?;
        }

        info!("Loading FAQ nodes");
        for row in read_rows::<FaqRow>(&paths.faqs)? {
            let embed_text = format!(
                "{}\n{}\n{}",
                row.question, row.answer, row.related_topics
            );
            self.graph
                .merge_node(
                    NodeLabel::Faqs,
                    &row.faq_id,
                    props(vec![
                        ("id", row.faq_id.clone().into()),
                        ("question", row.question.into()),
                        ("answer", row.answer.into()),
                        ("topics", row.related_topics.into()),
                    ]),
                )
                .await?;

            if let Some(embedder) = &self.embedder {
                let embedding = embedder.embed(&embed_text).await?;
                self.graph
                    .set_embedding(NodeRef::new(NodeLabel::Faqs, row.faq_id), embedding)
                    .await?;
            }
        }

        info!("Loading example question nodes");
        for row in read_rows::<QuestionRow>(&paths.example_queries)? {
            // Question text doubles as the merge key; there is no id column.
            self.graph
                .merge_node(
                    NodeLabel::Question,
                    &row.question,
                    props(vec![
                        ("question", row.question.clone().into()),
                        ("query", row.query.into()),
                    ]),
                )
                .await?;
        }

        Ok(())
    }

    async fn load_relationships(&self, paths: &CsvPaths) -> Result<()> {
        info!("Creating HAS relationships between customers and mortgages");
        for row in read_rows::<MortgageRow>(&paths.mortgages)? {
            self.graph
                .merge_relationship(
                    NodeRef::new(NodeLabel::Customer, row.customer_id),
                    RelType::Has,
                    NodeRef::new(NodeLabel::Mortgage, row.loan_number),
                )
                .await?;
        }

        info!("Creating MADE relationships between customers and payments");
        for row in read_rows::<PaymentRow>(&paths.payments_made)? {
            self.graph
                .merge_relationship(
                    NodeRef::new(NodeLabel::Customer, row.customer_id),
                    RelType::Made,
                    NodeRef::new(NodeLabel::Payments, row.payment_made_id),
                )
                .await?;
        }

        info!("Creating SCHEDULE relationships between mortgages and payments due");
        for row in read_rows::<PaymentDueRow>(&paths.payments_due)? {
            self.graph
                .merge_relationship(
                    NodeRef::new(NodeLabel::Mortgage, row.mortgage_id),
                    RelType::Schedule,
                    NodeRef::new(NodeLabel::PaymentsDue, row.payment_due_id),
                )
                .await?;
        }

        info!("Creating HAS relationships between mortgages and fees");
        for row in read_rows::<FeeRow>(&paths.fees)? {
            self.graph
                .merge_relationship(
                    NodeRef::new(NodeLabel::Mortgage, row.mortgage_id),
                    RelType::Has,
                    NodeRef::new(NodeLabel::Fees, row.fee_id),
                )
                .await?;
        }

        info!("Creating MAY_INCUR relationships between payments due and fees");
        for row in read_rows::<FeeRow>(&paths.fees)? {
            // A fee threatens its payment-due only while it is still due.
            if row.status == "Due" && !row.payment_due_id.is_empty() {
                self.graph
                    .merge_relationship(
                        NodeRef::new(NodeLabel::PaymentsDue, row.payment_due_id),
                        RelType::MayIncur,
                        NodeRef::new(NodeLabel::Fees, row.fee_id),
                    )
                    .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraph;
    use crate::llm::testing::LetterFrequencyEmbedder;
    use std::fs;

    fn write_fixtures(dir: &Path) -> CsvPaths {
        let write = |name: &str, content: &str| {
            let path = dir.join(name);
            fs::write(&path, content).unwrap();
            path
        };

        CsvPaths {
            branches: write(
                "branches.csv",
                "branch_id,branch_name,branch_state\n\
                 1,Jordan Inc,NC\n\
                 2,Wallace Group,SC\n",
            ),
            customers: write(
                "customers.csv",
                "customer_id,first_name,last_name,email,phone_number,address,city,state,zip_code,country\n\
                 C-100,Jon,Doe,jon@example.com,555-0100,12 Oak St,Southport,NC,28461,USA\n",
            ),
            mortgages: write(
                "mortgages.csv",
                "loan_number,customer_id,loan_amount,interest_rate,start_date,status,tenure\n\
                 M-1,C-100,250000,6.2,2021-04-01,Active,30\n",
            ),
            payments_made: write(
                "payments_made.csv",
                "payment_made_id,customer_id,amount,payment_date\n\
                 P-1,C-100,1450.25,2024-01-05\n\
                 P-2,C-100,1450.25,2024-02-05\n",
            ),
            payments_due: write(
                "payments_due.csv",
                "payment_due_id,mortgage_id,amount,due_date,status\n\
                 PD-1,M-1,1450.25,2024-03-05,Pending\n",
            ),
            fees: write(
                "fees.csv",
                "fee_id,mortgage_id,payment_due_id,fee_type,amount,date_incurred,status\n\
                 F-1,M-1,PD-1,Late Fee,75,2024-02-10,Due\n\
                 F-2,M-1,,Processing,25,2021-04-01,Paid\n",
            ),
            faqs: write(
                "faqs.csv",
                "faq_id,question,answer,related_topics\n\
                 FAQ-1,What are the terms for a mortgage product?,Terms run 10 to 30 years.,mortgage terms\n",
            ),
            example_queries: write(
                "example_queries.csv",
                "question,query\n\
                 What is the average loan amount?,\"{\"\"start_label\"\":\"\"Mortgage\"\",\"\"aggregate\"\":{\"\"op\"\":\"\"avg\"\",\"\"property\"\":\"\"amount\"\"}}\"\n",
            ),
        }
    }

    #[tokio::test]
    async fn test_load_builds_expected_graph() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_fixtures(dir.path());

        let graph = Arc::new(InMemoryGraph::new());
        let loader = GraphLoader::new(graph.clone(), Some(Arc::new(LetterFrequencyEmbedder)));

        let summary = loader.load(&paths).await.unwrap();

        // 2 branches + 1 customer + 1 mortgage + 2 payments + 1 due +
        // 2 fees + 1 faq + 1 question
        assert_eq!(summary.nodes, 11);
        // HAS(customer) + 2 MADE + SCHEDULE + 2 HAS(fees) + 1 MAY_INCUR
        assert_eq!(summary.relationships, 7);
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_fixtures(dir.path());

        let graph = Arc::new(InMemoryGraph::new());
        let loader = GraphLoader::new(graph, None);

        let first = loader.load(&paths).await.unwrap();
        let second = loader.load(&paths).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_paid_fee_gets_no_may_incur_relationship() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_fixtures(dir.path());

        let graph = Arc::new(InMemoryGraph::new());
        let loader = GraphLoader::new(graph.clone(), None);
        loader.load(&paths).await.unwrap();

        use crate::graph::{Hop, PatternQuery};
        let rows = graph
            .execute(&PatternQuery {
                start_label: NodeLabel::PaymentsDue,
                filters: vec![],
                hops: vec![Hop {
                    rel: RelType::MayIncur,
                    target: NodeLabel::Fees,
                }],
                returns: vec!["id".to_string()],
                aggregate: None,
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Scalar::Str("F-1".to_string())));
    }
}
