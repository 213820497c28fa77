//! Webhook endpoint for provider push deliveries

use axum::{
    body::Bytes,
    extract::{Path, State as AxumState},
    http::{HeaderMap, StatusCode},
};
use tracing::{info, warn};

use crate::SharedState;
use crate::event::{InboundWebhookEvent, Provider};
use crate::pipeline::{DeliveryOutcome, DropReason, process_delivery};

const DELIVERY_HEADER: &str = "X-GitHub-Delivery";
const EVENT_HEADER: &str = "X-GitHub-Event";
const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Handles the provider webhook POST request.
///
/// The provider comes from the path, the delivery id, event name, and
/// signature from headers, and the raw body is passed through untouched so
/// signature verification sees exactly the bytes the provider signed.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(provider) = Provider::from_path(&provider) else {
        info!("Unknown provider '{}' on webhook path", provider);
        return StatusCode::NOT_FOUND;
    };

    let delivery_id = headers.get(DELIVERY_HEADER).and_then(|v| v.to_str().ok());
    let event_name = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());
    let (Some(delivery_id), Some(event_name)) = (delivery_id, event_name) else {
        info!("Webhook delivery missing the delivery id or event header");
        return StatusCode::BAD_REQUEST;
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = InboundWebhookEvent {
        delivery_id: delivery_id.to_string(),
        event_name: event_name.to_string(),
        payload: body.to_vec(),
        signature: signature.to_string(),
        provider,
    };

    match process_delivery(
        &state.webhook_secret,
        state.registry.as_ref(),
        &state.producer,
        &event,
    )
    .await
    {
        DeliveryOutcome::Dispatched(Some(ack)) => {
            info!(
                "Dispatched push request {} for delivery {}",
                ack.message_id, event.delivery_id
            );
            StatusCode::OK
        }
        DeliveryOutcome::Dispatched(None) => {
            // Outcome unknown: the publish may or may not have landed.
            warn!(
                "No acknowledgment for delivery {}; send outcome unknown",
                event.delivery_id
            );
            StatusCode::OK
        }
        DeliveryOutcome::Dropped(DropReason::MalformedPayload) => StatusCode::BAD_REQUEST,
        DeliveryOutcome::Dropped(_) => StatusCode::NO_CONTENT,
    }
}
