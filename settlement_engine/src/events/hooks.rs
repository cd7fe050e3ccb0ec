use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::{
    events::{EventHandler, EventProducer, Handler, SettlementEvent, SettlementEventType},
    traits::{EventBus, EventBusError},
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub invoice_created_producer: Vec<EventProducer<SettlementEvent>>,
    pub status_changed_producer: Vec<EventProducer<SettlementEvent>>,
    pub invoice_cancelled_producer: Vec<EventProducer<SettlementEvent>>,
    pub invoice_expired_producer: Vec<EventProducer<SettlementEvent>>,
}

impl EventProducers {
    fn producers_for(&self, event_type: SettlementEventType) -> &[EventProducer<SettlementEvent>] {
        match event_type {
            SettlementEventType::InvoiceCreated => &self.invoice_created_producer,
            SettlementEventType::InvoiceStatusChanged => &self.status_changed_producer,
            SettlementEventType::InvoiceCancelled => &self.invoice_cancelled_producer,
            SettlementEventType::InvoiceExpired => &self.invoice_expired_producer,
        }
    }
}

impl EventBus for EventProducers {
    /// Hands the event to every subscriber of its type. Every subscriber is tried; the first failure is returned.
    fn publish(&self, event: SettlementEvent) -> Result<(), EventBusError> {
        let mut result = Ok(());
        for producer in self.producers_for(event.event_type) {
            if let Err(e) = producer.publish_event(event.clone()) {
                debug!("📬️ Could not deliver {event}: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

pub struct EventHandlers {
    pub on_invoice_created: Option<EventHandler<SettlementEvent>>,
    pub on_status_changed: Option<EventHandler<SettlementEvent>>,
    pub on_invoice_cancelled: Option<EventHandler<SettlementEvent>>,
    pub on_invoice_expired: Option<EventHandler<SettlementEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_invoice_created = hooks.on_invoice_created.map(|f| EventHandler::new("InvoiceCreated", buffer_size, f));
        let on_status_changed =
            hooks.on_status_changed.map(|f| EventHandler::new("InvoiceStatusChanged", buffer_size, f));
        let on_invoice_cancelled =
            hooks.on_invoice_cancelled.map(|f| EventHandler::new("InvoiceCancelled", buffer_size, f));
        let on_invoice_expired = hooks.on_invoice_expired.map(|f| EventHandler::new("InvoiceExpired", buffer_size, f));
        Self { on_invoice_created, on_status_changed, on_invoice_cancelled, on_invoice_expired }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_invoice_created {
            result.invoice_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_invoice_cancelled {
            result.invoice_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_invoice_expired {
            result.invoice_expired_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        let handlers = [self.on_invoice_created, self.on_status_changed, self.on_invoice_cancelled, self.on_invoice_expired];
        for handler in handlers.into_iter().flatten() {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_invoice_created: Option<Handler<SettlementEvent>>,
    pub on_status_changed: Option<Handler<SettlementEvent>>,
    pub on_invoice_cancelled: Option<Handler<SettlementEvent>>,
    pub on_invoice_expired: Option<Handler<SettlementEvent>>,
}

impl EventHooks {
    pub fn on_invoice_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SettlementEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_created = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SettlementEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_invoice_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SettlementEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_invoice_expired<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SettlementEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_expired = Some(Arc::new(f));
        self
    }
}
