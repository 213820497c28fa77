//! The canonical push request published for downstream consumption

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Provider, PushEventPayload, branch_from_ref};

/// Normalized message emitted once per accepted push event.
///
/// The wire format is camelCase JSON; the message id equals the originating
/// webhook delivery id and doubles as the queue correlation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPushRequest {
    pub provider: Provider,
    pub repository_owner: String,
    pub repository_name: String,
    pub branch: String,
    pub commit: String,
    pub pushed_at: DateTime<Utc>,
    pub installation_id: String,
    pub message_id: String,
}

impl CanonicalPushRequest {
    /// Builds the canonical request from a verified, filtered push payload.
    /// Pure transformation, no I/O.
    pub fn from_push_event(
        payload: &PushEventPayload,
        provider: Provider,
        delivery_id: &str,
    ) -> Self {
        let branch = branch_from_ref(&payload.git_ref).unwrap_or_default().to_string();
        let pushed_at_secs = payload
            .repository
            .pushed_at
            .as_deref()
            .map(int_try_parse)
            .unwrap_or(0);

        Self {
            provider,
            repository_owner: payload.repository.owner.login.clone(),
            repository_name: payload.repository.name.clone(),
            branch,
            commit: payload
                .head_commit
                .as_ref()
                .map(|c| c.id.clone())
                .unwrap_or_default(),
            pushed_at: DateTime::from_timestamp_millis(pushed_at_secs.saturating_mul(1000))
                .unwrap_or(DateTime::UNIX_EPOCH),
            installation_id: payload
                .installation
                .as_ref()
                .map(|i| i.id.to_string())
                .unwrap_or_default(),
            message_id: delivery_id.to_string(),
        }
    }
}

/// Best-effort integer parse. An unparseable pushed-at timestamp degrades
/// to epoch zero rather than rejecting the whole delivery.
fn int_try_parse(value: &str) -> i64 {
    value.trim().parse::<i64>().unwrap_or(0)
}
