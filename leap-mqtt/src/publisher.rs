//! The message bus seam.
//!
//! The bridge only needs to publish and subscribe; [`BusPublisher`] covers
//! that and is implemented for the rumqttc client.

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};

use crate::error::Result;

/// Publish/subscribe access to the message bus.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<()>;

    async fn subscribe(&self, filter: &str) -> Result<()>;
}

#[async_trait]
impl BusPublisher for AsyncClient {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<()> {
        AsyncClient::publish(self, topic, QoS::AtLeastOnce, retain, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<()> {
        AsyncClient::subscribe(self, filter, QoS::AtLeastOnce).await?;
        Ok(())
    }
}
