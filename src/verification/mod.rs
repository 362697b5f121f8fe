//! Customer identity verification gate
//!
//! Two-state machine: a session stays `Unverified` until a verify_customer
//! call matches a Customer record on all four identity fields at once.
//! Each attempt is independent; retry policy belongs to the orchestrator.

use crate::graph::{GraphStore, NodeLabel, PatternQuery, PropertyFilter, Scalar};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const VERIFICATION_FAILED_MESSAGE: &str = "Verification Failed: No matching customer found \
with the provided details. Please ask the user to provide the information again.";

/// The four identity fields. All must be present and non-empty; a match on
/// three of four is not a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyRequest {
    pub first_name: String,
    pub last_name: String,
    pub zip_code: String,
    pub phone_number: String,
}

impl VerifyRequest {
    fn is_complete(&self) -> bool {
        !self.first_name.trim().is_empty()
            && !self.last_name.trim().is_empty()
            && !self.zip_code.trim().is_empty()
            && !self.phone_number.trim().is_empty()
    }
}

/// Result of one verification attempt. `customer` is set only on success;
/// the orchestrator applies it to the session's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub customer: Option<VerifiedCustomer>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifiedCustomer {
    pub customer_id: String,
    pub customer_name: String,
}

pub struct VerificationGate {
    graph: Arc<dyn GraphStore>,
}

impl VerificationGate {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Exact-match lookup on all four fields simultaneously. A no-match is
    /// a defined negative response, not an error.
    pub async fn verify(&self, request: &VerifyRequest) -> Result<VerificationOutcome> {
        if !request.is_complete() {
            return Ok(VerificationOutcome {
                customer: None,
                message: VERIFICATION_FAILED_MESSAGE.to_string(),
            });
        }

        let query = PatternQuery {
            start_label: NodeLabel::Customer,
            filters: vec![
                filter("first_name", &request.first_name),
                filter("last_name", &request.last_name),
                filter("zip_code", &request.zip_code),
                filter("phone_number", &request.phone_number),
            ],
            hops: vec![],
            returns: vec!["id".to_string(), "name".to_string()],
            aggregate: None,
        };

        let rows = self.graph.execute(&query).await?;

        let Some(row) = rows.first() else {
            info!("Customer verification failed: no matching record");
            return Ok(VerificationOutcome {
                customer: None,
                message: VERIFICATION_FAILED_MESSAGE.to_string(),
            });
        };

        let get = |name: &str| {
            row.get(name)
                .and_then(Scalar::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let customer = VerifiedCustomer {
            customer_id: get("id"),
            customer_name: get("name"),
        };

        info!(customer_id = %customer.customer_id, "Customer verified");

        let message = format!(
            "Verification Successful: Customer Name is {} and Customer ID is {}.",
            customer.customer_name, customer.customer_id
        );

        Ok(VerificationOutcome {
            customer: Some(customer),
            message,
        })
    }
}

fn filter(property: &str, equals: &str) -> PropertyFilter {
    PropertyFilter {
        property: property.to_string(),
        equals: equals.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InMemoryGraph, Properties};

    async fn seeded_gate() -> VerificationGate {
        let graph = Arc::new(InMemoryGraph::new());

        let mut props = Properties::new();
        for (k, v) in [
            ("first_name", "Jon"),
            ("last_name", "Doe"),
            ("name", "Jon Doe"),
            ("zip_code", "28461"),
            ("phone_number", "555-0100"),
        ] {
            props.insert(k.to_string(), Scalar::Str(v.to_string()));
        }
        graph
            .merge_node(NodeLabel::Customer, "C-100", props)
            .await
            .unwrap();

        VerificationGate::new(graph)
    }

    fn request(first: &str, last: &str, zip: &str, phone: &str) -> VerifyRequest {
        VerifyRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            zip_code: zip.to_string(),
            phone_number: phone.to_string(),
        }
    }

    #[tokio::test]
    async fn test_verification_is_idempotent() {
        let gate = seeded_gate().await;
        let req = request("Jon", "Doe", "28461", "555-0100");

        let first = gate.verify(&req).await.unwrap();
        let second = gate.verify(&req).await.unwrap();

        assert_eq!(first, second);
        let customer = first.customer.expect("should verify");
        assert_eq!(customer.customer_id, "C-100");
        assert!(first.message.contains("Verification Successful"));
    }

    #[tokio::test]
    async fn test_three_of_four_fields_is_not_a_match() {
        let gate = seeded_gate().await;
        let req = request("Jon", "Doe", "99999", "555-0100");

        let first = gate.verify(&req).await.unwrap();
        let second = gate.verify(&req).await.unwrap();

        assert!(first.customer.is_none());
        assert_eq!(first.message, VERIFICATION_FAILED_MESSAGE);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_blank_field_fails_without_lookup() {
        let gate = seeded_gate().await;
        let req = request("Jon", "Doe", "", "555-0100");

        let outcome = gate.verify(&req).await.unwrap();
        assert!(outcome.customer.is_none());
        assert_eq!(outcome.message, VERIFICATION_FAILED_MESSAGE);
    }
}
