// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Cognition Events
//
// In-memory event streaming over tokio broadcast channels. Observers
// (audit sinks, streaming endpoints, tests) subscribe; publishers never
// block and never fail when nobody is listening.

use crate::domain::events::{BeliefEvent, SchedulerEvent, SessionEvent, ToolCallEvent};
use crate::domain::session::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CognitionEvent {
    Session(SessionEvent),
    ToolCall(ToolCallEvent),
    Scheduler(SchedulerEvent),
    Belief(BeliefEvent),
}

impl CognitionEvent {
    /// Session the event belongs to, if any
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            CognitionEvent::Session(event) => Some(match event {
                SessionEvent::SessionStarted { session_id, .. }
                | SessionEvent::IterationCompleted { session_id, .. }
                | SessionEvent::SessionFinished { session_id, .. }
                | SessionEvent::ReportGenerated { session_id, .. } => *session_id,
            }),
            CognitionEvent::ToolCall(event) => Some(match event {
                ToolCallEvent::ToolCallDenied { session_id, .. }
                | ToolCallEvent::ToolCallFailed { session_id, .. } => *session_id,
            }),
            CognitionEvent::Scheduler(_) | CognitionEvent::Belief(_) => None,
        }
    }
}

/// Event bus for publishing and subscribing to cognition events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<CognitionEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_session_event(&self, event: SessionEvent) {
        self.publish(CognitionEvent::Session(event));
    }

    pub fn publish_tool_call_event(&self, event: ToolCallEvent) {
        self.publish(CognitionEvent::ToolCall(event));
    }

    pub fn publish_scheduler_event(&self, event: SchedulerEvent) {
        self.publish(CognitionEvent::Scheduler(event));
    }

    pub fn publish_belief_event(&self, event: BeliefEvent) {
        self.publish(CognitionEvent::Belief(event));
    }

    fn publish(&self, event: CognitionEvent) {
        debug!("Publishing event: {:?}", event);

        // send() errors only when there are no receivers
        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all cognition events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events of a single session
    pub fn subscribe_session(&self, session_id: SessionId) -> SessionEventReceiver {
        SessionEventReceiver {
            receiver: self.sender.subscribe(),
            session_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all cognition events
pub struct EventReceiver {
    receiver: broadcast::Receiver<CognitionEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<CognitionEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<CognitionEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one session
pub struct SessionEventReceiver {
    receiver: broadcast::Receiver<CognitionEvent>,
    session_id: SessionId,
}

impl SessionEventReceiver {
    pub async fn recv(&mut self) -> Result<CognitionEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.session_id() == Some(self.session_id) {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
