use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    channel::publish_to_all,
    EventHandler,
    EventProducer,
    Handler,
    OrderAnnulledEvent,
    OrderConfirmedEvent,
    OrderCreatedEvent,
    ReviewFlaggedEvent,
    SignatureRejectedEvent,
};

/// The publishing side of the hook system. APIs hold a clone and publish after their changes have been committed.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub order_confirmed_producer: Vec<EventProducer<OrderConfirmedEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub review_flagged_producer: Vec<EventProducer<ReviewFlaggedEvent>>,
    pub signature_rejected_producer: Vec<EventProducer<SignatureRejectedEvent>>,
}

impl EventProducers {
    pub async fn publish_order_created(&self, event: OrderCreatedEvent) {
        publish_to_all(&self.order_created_producer, event).await;
    }

    pub async fn publish_order_confirmed(&self, event: OrderConfirmedEvent) {
        publish_to_all(&self.order_confirmed_producer, event).await;
    }

    pub async fn publish_order_annulled(&self, event: OrderAnnulledEvent) {
        publish_to_all(&self.order_annulled_producer, event).await;
    }

    pub async fn publish_review_flagged(&self, event: ReviewFlaggedEvent) {
        publish_to_all(&self.review_flagged_producer, event).await;
    }

    pub async fn publish_signature_rejected(&self, event: SignatureRejectedEvent) {
        publish_to_all(&self.signature_rejected_producer, event).await;
    }
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_confirmed: Option<EventHandler<OrderConfirmedEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_review_flagged: Option<EventHandler<ReviewFlaggedEvent>>,
    pub on_signature_rejected: Option<EventHandler<SignatureRejectedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_created: hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f)),
            on_order_confirmed: hooks.on_order_confirmed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_annulled: hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f)),
            on_review_flagged: hooks.on_review_flagged.map(|f| EventHandler::new(buffer_size, f)),
            on_signature_rejected: hooks.on_signature_rejected.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_confirmed {
            result.order_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_review_flagged {
            result.review_flagged_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_signature_rejected {
            result.signature_rejected_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for every registered handler. Each task ends once all of its producers have been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_confirmed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_review_flagged {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_signature_rejected {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_confirmed: Option<Handler<OrderConfirmedEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_review_flagged: Option<Handler<ReviewFlaggedEvent>>,
    pub on_signature_rejected: Option<Handler<SignatureRejectedEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_review_flagged<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReviewFlaggedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_review_flagged = Some(Arc::new(f));
        self
    }

    pub fn on_signature_rejected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SignatureRejectedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_signature_rejected = Some(Arc::new(f));
        self
    }
}
