//! The per-delivery processing pipeline
//!
//! Verify → classify → branch filter → tenant resolve → build → dispatch.
//! Each stage is a short-circuiting guard; an early exit lands in a terminal
//! dropped state. Nothing here is fatal to the process, and retries belong
//! to the queue broker, not this layer.

use tracing::{error, info};

use crate::db::registry::OrganizationRegistry;
use crate::event::{EventKind, InboundWebhookEvent, Provider, PushEventPayload};
use crate::message::CanonicalPushRequest;
use crate::queue::{QueueProducer, SendPullRequestAck};
use crate::signature::verify_signature;

/// Why a delivery left the pipeline before dispatch.
/// All of these are expected traffic, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    InvalidSignature,
    IgnoredEvent,
    MalformedPayload,
    NonDefaultBranch,
    UnknownInstallation,
}

/// Terminal state of one delivery
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Published to the topic. None means the send outcome is unknown,
    /// not that it failed.
    Dispatched(Option<SendPullRequestAck>),
    Dropped(DropReason),
}

/// Runs one inbound delivery through the full pipeline.
///
/// Stateless per delivery; concurrent deliveries share only the registry
/// and the producer, both safe for concurrent use.
pub async fn process_delivery(
    secret: &str,
    registry: &dyn OrganizationRegistry,
    producer: &QueueProducer,
    event: &InboundWebhookEvent,
) -> DeliveryOutcome {
    // Trust boundary: nothing downstream runs on an unverified payload.
    if !verify_signature(secret, &event.payload, &event.signature) {
        error!(
            "Signature verification failed for delivery {}",
            event.delivery_id
        );
        return DeliveryOutcome::Dropped(DropReason::InvalidSignature);
    }

    // Unknown kinds are frequent, routine traffic; drop without log noise.
    match EventKind::classify(&event.event_name) {
        EventKind::Push => {}
        EventKind::Ignored => return DeliveryOutcome::Dropped(DropReason::IgnoredEvent),
    }

    let payload: PushEventPayload = match serde_json::from_slice(&event.payload) {
        Ok(payload) => payload,
        Err(e) => {
            info!(
                "Could not parse push payload for delivery {}: {}",
                event.delivery_id, e
            );
            return DeliveryOutcome::Dropped(DropReason::MalformedPayload);
        }
    };

    if !payload.is_default_branch() {
        info!(
            "Delivery {} not sent, not the default branch, ref: {}",
            event.delivery_id, payload.git_ref
        );
        return DeliveryOutcome::Dropped(DropReason::NonDefaultBranch);
    }

    let installation_id = payload
        .installation
        .as_ref()
        .map(|i| i.id.to_string())
        .unwrap_or_default();
    if !resolve_tenant(registry, &installation_id, event.provider, &event.delivery_id).await {
        return DeliveryOutcome::Dropped(DropReason::UnknownInstallation);
    }

    let request = CanonicalPushRequest::from_push_event(&payload, event.provider, &event.delivery_id);
    let ack = producer.send_push_request(&request).await;
    DeliveryOutcome::Dispatched(ack)
}

/// Accepts only installations the registry knows about: a binding must
/// exist and carry a non-empty installation id.
async fn resolve_tenant(
    registry: &dyn OrganizationRegistry,
    installation_id: &str,
    provider: Provider,
    delivery_id: &str,
) -> bool {
    match registry
        .get_organization_by_installation_id(installation_id, provider)
        .await
    {
        Ok(Some(org)) if !org.installation_id.is_empty() => true,
        Ok(_) => {
            info!(
                "Delivery {} not sent, installation id {} is not registered",
                delivery_id, installation_id
            );
            false
        }
        Err(e) => {
            error!("Registry lookup failed for delivery {}: {}", delivery_id, e);
            false
        }
    }
}
