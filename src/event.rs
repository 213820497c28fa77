//! Inbound webhook event types and the push payload view

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Git hosting provider an event originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
}

impl Provider {
    /// Parses the provider segment of the webhook path.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "github" => Some(Provider::Github),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook event kinds the gateway acts on. Everything else is ignored;
/// ignored events are routine traffic, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Push,
    Ignored,
}

impl EventKind {
    /// Case-insensitive match against the provider's event name header.
    pub fn classify(event_name: &str) -> Self {
        match event_name.to_ascii_lowercase().as_str() {
            "push" => EventKind::Push,
            _ => EventKind::Ignored,
        }
    }
}

/// One inbound HTTP delivery, as handed over by the webhook endpoint.
/// Transient; discarded after dispatch or early rejection.
#[derive(Debug, Clone)]
pub struct InboundWebhookEvent {
    pub delivery_id: String,
    pub event_name: String,
    pub payload: Vec<u8>,
    pub signature: String,
    pub provider: Provider,
}

/// Parsed view of a push delivery payload. Field names follow the
/// provider's JSON document; unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEventPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: RepositoryDescriptor,
    pub head_commit: Option<HeadCommit>,
    pub installation: Option<InstallationIdentity>,
}

impl PushEventPayload {
    /// True when the pushed ref names the repository's default branch.
    /// A ref with fewer than three segments has no branch name and is
    /// treated as "not default", not as an error.
    pub fn is_default_branch(&self) -> bool {
        branch_from_ref(&self.git_ref) == Some(self.repository.master_branch.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub owner: RepositoryOwner,
    pub master_branch: String,
    #[serde(default, deserialize_with = "pushed_at_string")]
    pub pushed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadCommit {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationIdentity {
    pub id: i64,
}

/// Extracts the branch name from a fully-qualified ref.
///
/// Refs look like `refs/heads/<branch>`; the branch is segment index 2 of
/// the slash-split string. Shorter refs yield None.
pub fn branch_from_ref(git_ref: &str) -> Option<&str> {
    git_ref.split('/').nth(2)
}

/// GitHub serializes `pushed_at` as an epoch number on push events but as a
/// string elsewhere. Accept both and keep the string form.
fn pushed_at_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(EventKind::classify("push"), EventKind::Push);
        assert_eq!(EventKind::classify("Push"), EventKind::Push);
        assert_eq!(EventKind::classify("PUSH"), EventKind::Push);
    }

    #[test]
    fn classify_ignores_unknown_kinds() {
        assert_eq!(EventKind::classify("pull_request"), EventKind::Ignored);
        assert_eq!(EventKind::classify("issue_comment"), EventKind::Ignored);
        assert_eq!(EventKind::classify(""), EventKind::Ignored);
    }

    #[test]
    fn branch_is_third_ref_segment() {
        assert_eq!(branch_from_ref("refs/heads/main"), Some("main"));
        // Nested branch names keep only the third segment, matching the
        // upstream split-on-slash rule.
        assert_eq!(branch_from_ref("refs/heads/feature/login"), Some("feature"));
    }

    #[test]
    fn short_refs_have_no_branch() {
        assert_eq!(branch_from_ref("refs/heads"), None);
        assert_eq!(branch_from_ref("main"), None);
        assert_eq!(branch_from_ref(""), None);
    }

    #[test]
    fn provider_path_parsing() {
        assert_eq!(Provider::from_path("github"), Some(Provider::Github));
        assert_eq!(Provider::from_path("GitHub"), Some(Provider::Github));
        assert_eq!(Provider::from_path("gitlab"), None);
    }

    #[test]
    fn parses_push_payload_with_numeric_pushed_at() {
        let json = serde_json::json!({
            "ref": "refs/heads/main",
            "repository": {
                "name": "storefront",
                "owner": { "login": "acme" },
                "master_branch": "main",
                "pushed_at": 1700000000,
            },
            "head_commit": { "id": "a1b2c3" },
            "installation": { "id": 123 },
        });
        let payload: PushEventPayload = serde_json::from_value(json).unwrap();
        assert!(payload.is_default_branch());
        assert_eq!(payload.repository.pushed_at.as_deref(), Some("1700000000"));
        assert_eq!(payload.installation.unwrap().id, 123);
    }

    #[test]
    fn parses_push_payload_with_string_pushed_at() {
        let json = serde_json::json!({
            "ref": "refs/heads/develop",
            "repository": {
                "name": "storefront",
                "owner": { "login": "acme" },
                "master_branch": "main",
                "pushed_at": "1700000000",
            },
        });
        let payload: PushEventPayload = serde_json::from_value(json).unwrap();
        assert!(!payload.is_default_branch());
        assert_eq!(payload.repository.pushed_at.as_deref(), Some("1700000000"));
        assert!(payload.head_commit.is_none());
        assert!(payload.installation.is_none());
    }

    #[test]
    fn short_ref_is_not_default_branch() {
        let json = serde_json::json!({
            "ref": "refs/heads",
            "repository": {
                "name": "storefront",
                "owner": { "login": "acme" },
                "master_branch": "main",
            },
        });
        let payload: PushEventPayload = serde_json::from_value(json).unwrap();
        assert!(!payload.is_default_branch());
    }
}
