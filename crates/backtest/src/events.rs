//! Simulation events and the FIFO queue that orders them.

use crate::strategy::{OpenPositionRequest, StoplossRequest, TakeProfitRequest};
use kate_core::{DataPoint, Error, Result};
use std::collections::VecDeque;

/// Events that flow through the backtester.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// New candle from the price feed.
    PriceTick(DataPoint),
    /// Strategy wants to open a position.
    OpenPosition(OpenPositionRequest),
    /// Strategy wants to set the stoploss.
    SetStoploss(StoplossRequest),
    /// Strategy wants to set the takeprofit.
    SetTakeProfit(TakeProfitRequest),
}

impl From<OpenPositionRequest> for Event {
    fn from(request: OpenPositionRequest) -> Self {
        Event::OpenPosition(request)
    }
}

impl From<StoplossRequest> for Event {
    fn from(request: StoplossRequest) -> Self {
        Event::SetStoploss(request)
    }
}

impl From<TakeProfitRequest> for Event {
    fn from(request: TakeProfitRequest) -> Self {
        Event::SetTakeProfit(request)
    }
}

/// Strict arrival-order queue of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is at least one event waiting?
    pub fn has_pending(&self) -> bool {
        !self.events.is_empty()
    }

    /// Append an event to the tail.
    pub fn enqueue(&mut self, event: impl Into<Event>) {
        self.events.push_back(event.into());
    }

    /// Remove the event at the head.
    ///
    /// Callers are expected to check `has_pending` first.
    pub fn dequeue(&mut self) -> Result<Event> {
        self.events.pop_front().ok_or(Error::EmptyQueue)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop every pending event.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
