//! Branch wait-time source
//!
//! Wait times are simulated (uniform in [0, 600) minutes). The source sits
//! behind a trait so a live telemetry feed can replace it without touching
//! the orchestrator or the tools.

use crate::Result;
use rand::Rng;

pub const MAX_WAIT_MINUTES: u64 = 600;

/// A branch as the wait-time tools see it: stable id plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub id: i64,
    pub name: String,
}

#[async_trait::async_trait]
pub trait WaitTimeSource: Send + Sync {
    async fn current_wait_minutes(&self, branch: &BranchRef) -> Result<u64>;
}

/// Uniformly sampled stand-in for live telemetry.
pub struct SimulatedWaitTimes;

#[async_trait::async_trait]
impl WaitTimeSource for SimulatedWaitTimes {
    async fn current_wait_minutes(&self, _branch: &BranchRef) -> Result<u64> {
        Ok(rand::thread_rng().gen_range(0..MAX_WAIT_MINUTES))
    }
}

/// Render minutes the way tellers quote them.
pub fn format_wait_time(minutes: u64) -> String {
    let hours = minutes / 60;
    let minutes = minutes % 60;

    if hours > 0 {
        format!("{} hours {} minutes", hours, minutes)
    } else {
        format!("{} minutes", minutes)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Fixed per-branch wait times keyed by branch name.
    pub struct FixedWaitTimes {
        minutes: HashMap<String, u64>,
    }

    impl FixedWaitTimes {
        pub fn new(entries: &[(&str, u64)]) -> Self {
            Self {
                minutes: entries
                    .iter()
                    .map(|(name, m)| (name.to_string(), *m))
                    .collect(),
            }
        }
    }

    #[async_trait::async_trait]
    impl WaitTimeSource for FixedWaitTimes {
        async fn current_wait_minutes(&self, branch: &BranchRef) -> Result<u64> {
            Ok(self.minutes.get(&branch.name).copied().unwrap_or(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_wait_is_in_range() {
        let branch = BranchRef {
            id: 1,
            name: "Jordan Inc".to_string(),
        };
        for _ in 0..50 {
            let minutes = SimulatedWaitTimes
                .current_wait_minutes(&branch)
                .await
                .unwrap();
            assert!(minutes < MAX_WAIT_MINUTES);
        }
    }

    #[test]
    fn test_format_wait_time() {
        assert_eq!(format_wait_time(45), "45 minutes");
        assert_eq!(format_wait_time(60), "1 hours 0 minutes");
        assert_eq!(format_wait_time(133), "2 hours 13 minutes");
    }
}
