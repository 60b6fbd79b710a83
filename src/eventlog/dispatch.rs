//! Overlay dispatch port
//!
//! Replays and stops issued from the log go out through an
//! [`OverlayDispatcher`]. In production this is the REST layer in front of
//! the hub; the implementations here publish directly.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::client::ChannelConnection;
use crate::error::Result;
use crate::hub::ChannelHub;
use crate::protocol::{Channel, OverlayCommand};

/// Issues show/hide commands on behalf of the operator
pub trait OverlayDispatcher: Send + Sync {
    /// Show `payload` on `channel`
    fn show(&self, channel: &Channel, payload: &Value) -> impl Future<Output = Result<()>> + Send;

    /// Hide whatever `channel` is showing
    fn hide(&self, channel: &Channel) -> impl Future<Output = Result<()>> + Send;
}

/// Publishes straight into an in-process hub
#[derive(Clone)]
pub struct HubDispatcher {
    hub: Arc<ChannelHub>,
}

impl HubDispatcher {
    pub fn new(hub: Arc<ChannelHub>) -> Self {
        Self { hub }
    }
}

impl OverlayDispatcher for HubDispatcher {
    async fn show(&self, channel: &Channel, payload: &Value) -> Result<()> {
        let command = OverlayCommand::Show {
            payload: payload.clone(),
        };
        let delivered = self.hub.publish_command(channel, &command).await?;
        tracing::debug!(channel = %channel, delivered, "Dispatched show");
        Ok(())
    }

    async fn hide(&self, channel: &Channel) -> Result<()> {
        let delivered = self.hub.publish_command(channel, &OverlayCommand::Hide).await?;
        tracing::debug!(channel = %channel, delivered, "Dispatched hide");
        Ok(())
    }
}

/// Publishes over a client connection; fails while disconnected
impl OverlayDispatcher for ChannelConnection {
    async fn show(&self, channel: &Channel, payload: &Value) -> Result<()> {
        self.publish(
            channel,
            &OverlayCommand::Show {
                payload: payload.clone(),
            },
        )
    }

    async fn hide(&self, channel: &Channel) -> Result<()> {
        self.publish(channel, &OverlayCommand::Hide)
    }
}

impl<D: OverlayDispatcher> OverlayDispatcher for Arc<D> {
    fn show(&self, channel: &Channel, payload: &Value) -> impl Future<Output = Result<()>> + Send {
        (**self).show(channel, payload)
    }

    fn hide(&self, channel: &Channel) -> impl Future<Output = Result<()>> + Send {
        (**self).hide(channel)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::hub::HubFrame;

    #[tokio::test]
    async fn test_hub_dispatcher_publishes() {
        let hub = Arc::new(ChannelHub::new());
        let lower = Channel::new("lower").unwrap();
        let (id, mut rx) = hub.connect().await;
        hub.subscribe(id, &lower).await.unwrap();

        let dispatcher = HubDispatcher::new(hub.clone());
        dispatcher.show(&lower, &json!({"title": "Alice"})).await.unwrap();
        dispatcher.hide(&lower).await.unwrap();

        let frame: HubFrame = rx.recv().await.unwrap();
        let message = frame.decode().unwrap();
        assert_eq!(
            message.decode().unwrap(),
            OverlayCommand::Show {
                payload: json!({"title": "Alice"})
            }
        );
        let message = rx.recv().await.unwrap().decode().unwrap();
        assert_eq!(message.decode().unwrap(), OverlayCommand::Hide);
    }
}
