//! Message envelopes exchanged with the broker adapter

use tokio::sync::oneshot;

/// Message ready to be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// Settlement of an inbound delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Local state committed
    Ack,
    /// Processing failed; the broker dead-letters the message
    Reject { reason: String },
}

/// Inbound message awaiting settlement
#[derive(Debug)]
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
    acker: oneshot::Sender<Ack>,
}

impl Delivery {
    /// Create a delivery and the receiver the broker adapter settles with
    pub fn new(routing_key: impl Into<String>, body: Vec<u8>) -> (Self, oneshot::Receiver<Ack>) {
        let (acker, settled) = oneshot::channel();
        let delivery = Self {
            routing_key: routing_key.into(),
            body,
            acker,
        };
        (delivery, settled)
    }

    pub fn settle(self, ack: Ack) {
        // The adapter may have gone away; the broker then redelivers.
        let _ = self.acker.send(ack);
    }
}
