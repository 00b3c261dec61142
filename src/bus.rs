//! Outbound event notifications over NATS.
//!
//! Publishing happens after a unit of work commits and is fire-and-forget:
//! a failed or skipped publish never affects the committed state.

use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventBus {
    client: Option<async_nats::Client>,
}

impl EventBus {
    /// Connects when a URL is configured; stays a no-op bus otherwise.
    pub async fn connect(url: Option<&str>) -> Self {
        let client = match url {
            Some(url) => match async_nats::connect(url).await {
                Ok(client) => Some(client),
                Err(err) => {
                    warn!(%err, "could not reach NATS, events disabled");
                    None
                }
            },
            None => None,
        };
        Self { client }
    }

    pub async fn publish(&self, event: &DomainEvent) {
        let Some(client) = &self.client else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "event did not serialize");
                return;
            }
        };
        match client.publish(event.subject(), payload.into()).await {
            Ok(()) => debug!(subject = event.subject(), "event published"),
            Err(err) => warn!(%err, subject = event.subject(), "event publish failed"),
        }
    }
}
