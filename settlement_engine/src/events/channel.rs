//! Bounded fan-in channels that carry settlement events to async listeners.
//!
//! Each [`EventHandler`] owns one queue and one listener callback. The settlement flow only ever sees the
//! [`EventProducer`] side, which queues an event and returns at once; a full or closed queue becomes an
//! [`EventBusError`] that the caller is free to log and ignore. Listeners get a copy of the event and nothing else, so
//! they cannot reach into the invoice store.
//!
//! A handler runs until every producer it handed out has been dropped, then waits for in-flight callbacks to finish.
use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI64, Arc},
};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::traits::EventBusError;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    name: &'static str,
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { name, listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.name, self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting {} event handler", self.name);
        // Only the producers keep the queue open from here on
        drop(self.sender);
        let in_flight = Arc::new(AtomicI64::new(0));
        while let Some(event) = self.listener.recv().await {
            trace!("📬️ Dispatching {} event", self.name);
            let handler = Arc::clone(&self.handler);
            in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let counter = Arc::clone(&in_flight);
            tokio::spawn(async move {
                (handler)(event).await;
                counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            });
        }
        while in_flight.load(std::sync::atomic::Ordering::SeqCst) > 0 {
            debug!("📬️ {} listener still has events in flight", self.name);
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        debug!("📬️ {} event handler has shut down", self.name);
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    name: &'static str,
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(name: &'static str, sender: mpsc::Sender<E>) -> Self {
        Self { name, sender }
    }

    /// Queues the event without waiting. A full or closed channel is reported as an error.
    pub fn publish_event(&self, event: E) -> Result<(), EventBusError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => EventBusError::ChannelFull(self.name.to_string()),
            TrySendError::Closed(_) => EventBusError::ChannelClosed(self.name.to_string()),
        })
    }
}
