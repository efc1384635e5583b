//! Bulk update outcome types

use serde::{Deserialize, Serialize};

/// Whether a row's person create/update went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// What happened to the row's person record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
    Failed,
}

impl UpsertAction {
    pub fn past_tense(self) -> &'static str {
        match self {
            UpsertAction::Created => "Created",
            UpsertAction::Updated => "Updated",
            UpsertAction::Failed => "Failed",
        }
    }
}

/// Result of processing one bulk update row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    /// Resolved person id; the supplied id (or "N/A") when the row failed
    pub pco_id: String,
    pub name: String,
    pub status: OutcomeStatus,
    pub message: String,
    pub action: UpsertAction,
}

impl BulkOutcome {
    pub fn failed(pco_id: Option<&str>, name: String, message: impl Into<String>) -> Self {
        Self {
            pco_id: pco_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or("N/A")
                .to_string(),
            name,
            status: OutcomeStatus::Error,
            message: message.into(),
            action: UpsertAction::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Counts over a batch of outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub errors: usize,
    pub created: usize,
    pub updated: usize,
}

impl BulkSummary {
    pub fn from_outcomes(outcomes: &[BulkOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            summary.total += 1;
            if outcome.is_success() {
                summary.successful += 1;
                match outcome.action {
                    UpsertAction::Created => summary.created += 1,
                    UpsertAction::Updated => summary.updated += 1,
                    UpsertAction::Failed => {}
                }
            } else {
                summary.errors += 1;
            }
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: OutcomeStatus, action: UpsertAction) -> BulkOutcome {
        BulkOutcome {
            pco_id: "1".into(),
            name: "A".into(),
            status,
            message: String::new(),
            action,
        }
    }

    #[test]
    fn test_summary_counts() {
        let outcomes = vec![
            outcome(OutcomeStatus::Success, UpsertAction::Created),
            outcome(OutcomeStatus::Success, UpsertAction::Updated),
            outcome(OutcomeStatus::Success, UpsertAction::Updated),
            outcome(OutcomeStatus::Error, UpsertAction::Failed),
        ];

        let summary = BulkSummary::from_outcomes(&outcomes);
        assert_eq!(
            summary,
            BulkSummary {
                total: 4,
                successful: 3,
                errors: 1,
                created: 1,
                updated: 2,
            }
        );
    }

    #[test]
    fn test_failed_outcome_defaults_id() {
        let outcome = BulkOutcome::failed(Some("  "), "Jane".into(), "boom");
        assert_eq!(outcome.pco_id, "N/A");
        assert_eq!(outcome.action, UpsertAction::Failed);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["pcoId"], "N/A");
        assert_eq!(json["status"], "error");
        assert_eq!(json["action"], "failed");
    }
}
