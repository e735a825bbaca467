//! Redis pub/sub bus for multi-process deployments.
//!
//! Publishing goes through a shared `ConnectionManager`, created on first use
//! so that a broker can start while Redis is still unreachable; failed
//! publishes fall back to local delivery in the bridge. Every subscription gets
//! its own dedicated pub/sub connection. Redis pub/sub is fire-and-forget,
//! which matches the delivery contract: instances that are not subscribed at
//! the moment of publishing never see the message.

use super::{Bus, BusMessage, BusStream};
use crate::error::{BusErrorKind, Error};
use async_trait::async_trait;
use futures::StreamExt;
use log::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::OnceCell;

pub struct RedisBus {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisBus {
    /// Validate `url` and prepare the client. No connection is opened yet.
    pub fn new(url: &str) -> Result<Self, Error> {
        let client = Client::open(url).map_err(|e| Error::bus(BusErrorKind::InvalidUrl, e))?;
        info!("Redis bus configured for {}", client.get_connection_info().addr);

        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, Error> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                debug!("Opening Redis publish connection");
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| Error::bus(BusErrorKind::Connection, e))
            })
            .await?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), Error> {
        let mut connection = self.connection().await?;
        let receivers: i64 = connection
            .publish(channel, payload)
            .await
            .map_err(|e| Error::bus(BusErrorKind::Publish, e))?;
        trace!("Published to Redis channel '{channel}' ({receivers} receiver(s))");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BusStream, Error> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::bus(BusErrorKind::Connection, e))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| Error::bus(BusErrorKind::Subscribe, e))?;
        info!("Subscribed to Redis channel '{channel}'");

        let stream = pubsub
            .into_on_message()
            .map(|msg| BusMessage::Payload(msg.get_payload_bytes().to_vec()));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_invalid_url_is_rejected_up_front() {
        let err = RedisBus::new("not a redis url").err().unwrap();
        assert_eq!(err.error_kind, ErrorKind::Bus(BusErrorKind::InvalidUrl));
    }

    #[test]
    fn test_valid_url_does_not_connect_eagerly() {
        // Nothing listens on port 1; construction must still succeed.
        assert!(RedisBus::new("redis://127.0.0.1:1/").is_ok());
    }
}
