/*
[INPUT]:  Forwarded InboundEvents from the session
[OUTPUT]: Ordered, unbounded hand-off to the consumer
[POS]:    WebSocket layer - output queue between session and consumer
[UPDATE]: When changing delivery guarantees or queue backing
*/

use tokio::sync::mpsc;

use crate::http::{DeribitError, Result};
use crate::ws::message::InboundEvent;

/// Create a connected sender/receiver pair
pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer half. Pushing never blocks.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

impl EventSender {
    pub fn push(&self, event: InboundEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| DeribitError::QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half. Events arrive in the order they were pushed; duplicates are kept.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<InboundEvent>,
}

impl EventReceiver {
    /// Wait for the next event; `None` once every sender is gone and the queue is drained
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
