//! Queue producer for the pull-request generation topic

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::error::GatewayError;
use crate::message::CanonicalPushRequest;

/// Envelope the downstream worker replies with on the response topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage<T> {
    pub value: T,
}

/// Acknowledgment for a published push request, correlated by message id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendPullRequestAck {
    pub message_id: String,
}

/// Transport seam to the message broker.
///
/// The broker owns persistence and at-least-once delivery to the downstream
/// consumer. Implementations must be safe for concurrent use: one client is
/// shared across all in-flight deliveries, and publish ordering across
/// deliveries is not guaranteed or required.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Registers interest in the response topic. Called once at startup.
    async fn subscribe_to_response_of(&self, topic: &str) -> Result<(), GatewayError>;

    /// Publishes a payload under the given key and waits for the correlated
    /// response payload.
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<Vec<u8>, GatewayError>;
}

/// Producer for the generate-pull-request topic.
///
/// Constructed once at process start and passed by handle; `init` must run
/// before the first send and may not run again.
pub struct QueueProducer {
    client: Arc<dyn BrokerClient>,
    topic: String,
    initialized: AtomicBool,
}

impl QueueProducer {
    pub fn new(client: Arc<dyn BrokerClient>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// One-time response-topic subscription. Re-initialization mid-process
    /// is not supported.
    pub async fn init(&self) -> Result<(), GatewayError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::QueueError(
                "queue producer already initialized".to_string(),
            ));
        }
        self.client.subscribe_to_response_of(&self.topic).await
    }

    /// Publishes a canonical push request keyed by its message id.
    ///
    /// Returns None when the publish or the acknowledgment deserialization
    /// fails. None means the send outcome is unknown, not that it failed;
    /// any compensating action belongs to the caller.
    pub async fn send_push_request(
        &self,
        request: &CanonicalPushRequest,
    ) -> Option<SendPullRequestAck> {
        let payload = match serde_json::to_vec(request) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    "Failed to serialize push request {}: {}",
                    request.message_id, e
                );
                return None;
            }
        };

        match self
            .client
            .send(&self.topic, &request.message_id, payload)
            .await
        {
            Ok(raw_ack) => match decode_ack::<SendPullRequestAck>(&raw_ack) {
                Some(ack) => Some(ack),
                None => {
                    warn!(
                        "Unreadable acknowledgment for message {}",
                        request.message_id
                    );
                    None
                }
            },
            Err(e) => {
                error!(
                    "Failed to publish push request {}: {}",
                    request.message_id, e
                );
                None
            }
        }
    }
}

fn decode_ack<T: DeserializeOwned>(raw: &[u8]) -> Option<T> {
    serde_json::from_slice::<ResultMessage<T>>(raw)
        .ok()
        .map(|msg| msg.value)
}

/// A broker delivery in flight through the in-process channel transport
#[derive(Debug)]
pub struct BrokerDelivery {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub reply: oneshot::Sender<Vec<u8>>,
}

/// In-process broker backed by tokio channels.
///
/// Stands in for the real broker client in local runs and tests; a durable
/// broker client plugs in behind the same `BrokerClient` trait in
/// production deployments.
pub struct ChannelBroker {
    tx: mpsc::Sender<BrokerDelivery>,
}

impl ChannelBroker {
    /// Creates the broker and the receiving end a consumer task drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BrokerDelivery>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Spawns a consumer that acknowledges every delivery with its own key.
    /// Used by local runs where no downstream worker is attached.
    pub fn spawn_echo_consumer(rx: mpsc::Receiver<BrokerDelivery>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut deliveries = ReceiverStream::new(rx);
            while let Some(delivery) = deliveries.next().await {
                info!(
                    "Queued push request {} on topic '{}'",
                    delivery.key, delivery.topic
                );
                let ack = ResultMessage {
                    value: SendPullRequestAck {
                        message_id: delivery.key.clone(),
                    },
                };
                let raw = serde_json::to_vec(&ack).unwrap_or_default();
                let _ = delivery.reply.send(raw);
            }
        })
    }
}

#[async_trait]
impl BrokerClient for ChannelBroker {
    async fn subscribe_to_response_of(&self, topic: &str) -> Result<(), GatewayError> {
        info!("Subscribed to response topic of '{}'", topic);
        Ok(())
    }

    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<Vec<u8>, GatewayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BrokerDelivery {
                topic: topic.to_string(),
                key: key.to_string(),
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| GatewayError::QueueError("broker channel closed".to_string()))?;

        reply_rx
            .await
            .map_err(|_| GatewayError::QueueError("no acknowledgment from consumer".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Provider;
    use chrono::DateTime;

    fn request(message_id: &str) -> CanonicalPushRequest {
        CanonicalPushRequest {
            provider: Provider::Github,
            repository_owner: "acme".to_string(),
            repository_name: "storefront".to_string(),
            branch: "main".to_string(),
            commit: "a1b2c3d4".to_string(),
            pushed_at: DateTime::UNIX_EPOCH,
            installation_id: "123".to_string(),
            message_id: message_id.to_string(),
        }
    }

    #[tokio::test]
    async fn send_returns_correlated_ack() {
        let (broker, rx) = ChannelBroker::new(8);
        ChannelBroker::spawn_echo_consumer(rx);
        let producer = QueueProducer::new(Arc::new(broker), "git.pr.generate");
        producer.init().await.unwrap();

        let ack = producer.send_push_request(&request("d1")).await;
        assert_eq!(
            ack,
            Some(SendPullRequestAck {
                message_id: "d1".to_string()
            })
        );
    }

    #[tokio::test]
    async fn reinitialization_is_rejected() {
        let (broker, _rx) = ChannelBroker::new(8);
        let producer = QueueProducer::new(Arc::new(broker), "git.pr.generate");
        producer.init().await.unwrap();
        assert!(producer.init().await.is_err());
    }

    #[tokio::test]
    async fn unreadable_ack_yields_none() {
        let (broker, mut rx) = ChannelBroker::new(8);
        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                let _ = delivery.reply.send(b"not json".to_vec());
            }
        });
        let producer = QueueProducer::new(Arc::new(broker), "git.pr.generate");
        producer.init().await.unwrap();

        let ack = producer.send_push_request(&request("d1")).await;
        assert!(ack.is_none());
    }

    #[tokio::test]
    async fn closed_broker_yields_none() {
        let (broker, rx) = ChannelBroker::new(8);
        drop(rx);
        let producer = QueueProducer::new(Arc::new(broker), "git.pr.generate");
        producer.init().await.unwrap();

        let ack = producer.send_push_request(&request("d1")).await;
        assert!(ack.is_none());
    }
}
