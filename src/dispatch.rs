//! The subscriber registry: a concurrency-safe pub/sub table routing
//! messages to interested listeners by command, with wildcard support.
//!
//! Independent consumers (explicit subscribers, the correlation helper,
//! keepalive tasks, loggers) register a delivery channel under a
//! `(command, name)` identity; dispatch fans a received message out to
//! every channel under the message's command and under the wildcard.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use tern_proto::{Message, WILDCARD};

use crate::error::RegistryError;

/// Delivery channel capacity for subscriptions created by the session.
pub(crate) const SUBSCRIBER_BUFFER: usize = 16;

type CommandBucket = HashMap<String, mpsc::Sender<Arc<Message>>>;

/// A two-level table: command (or wildcard) -> subscriber name -> channel.
///
/// Registration and removal take the write lock; dispatch holds the read
/// lock for the full duration of delivery, so registration changes never
/// interleave with an in-flight fan-out.
#[derive(Debug, Default)]
pub(crate) struct SubscriberRegistry {
    table: RwLock<HashMap<String, CommandBucket>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a subscription. At most one live subscription may exist per
    /// `(command, name)` pair; a closed leftover channel does not count.
    pub(crate) async fn register(
        &self,
        command: &str,
        name: &str,
        tx: mpsc::Sender<Arc<Message>>,
    ) -> Result<(), RegistryError> {
        let mut table = self.table.write().await;
        let bucket = table.entry(command.to_owned()).or_default();
        if let Some(existing) = bucket.get(name) {
            if !existing.is_closed() {
                return Err(RegistryError::AlreadyRegistered {
                    command: command.to_owned(),
                    name: name.to_owned(),
                });
            }
        }
        bucket.insert(name.to_owned(), tx);
        Ok(())
    }

    /// Remove a subscription, closing its channel, and prune the command
    /// bucket once empty.
    pub(crate) async fn unregister(&self, command: &str, name: &str) -> Result<(), RegistryError> {
        let mut table = self.table.write().await;
        let bucket = table.get_mut(command).ok_or_else(|| RegistryError::NotFound {
            command: command.to_owned(),
            name: name.to_owned(),
        })?;
        // Dropping the sender closes the subscriber's receiving end.
        bucket.remove(name).ok_or_else(|| RegistryError::NotFound {
            command: command.to_owned(),
            name: name.to_owned(),
        })?;
        if bucket.is_empty() {
            table.remove(command);
        }
        Ok(())
    }

    /// Deliver a message to every subscriber of its command and of the
    /// wildcard. Sends await channel capacity: a slow subscriber stalls
    /// this dispatch call, which is why each received message runs its
    /// fan-out on its own task.
    pub(crate) async fn dispatch(&self, msg: Arc<Message>) {
        let table = self.table.read().await;
        for key in [msg.command.as_str(), WILDCARD] {
            if let Some(bucket) = table.get(key) {
                for (name, tx) in bucket {
                    if tx.send(Arc::clone(&msg)).await.is_err() {
                        debug!(command = %msg.command, subscriber = %name,
                               "dropping message for closed subscriber");
                    }
                }
            }
        }
    }

    /// True when no subscriptions exist at all.
    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}
