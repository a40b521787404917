//! Event emission.
//!
//! State-changing commands push typed events onto a broadcast channel. The
//! bus also keeps a bounded backlog so clients that poll with
//! `get_recent_events` can catch up from a sequence number.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use parla_types::events::{Event, EventType};

/// Filter for `get_recent_events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "account", "request", "network", "payout".
    pub categories: Option<Vec<String>>,
    /// Only events with a greater sequence number.
    pub since: Option<u64>,
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(since) = self.since {
            if event.sequence <= since {
                return false;
            }
        }
        if let Some(ref categories) = self.categories {
            let category = event.event_type.category();
            if !categories.iter().any(|c| c == category) {
                return false;
            }
        }
        true
    }
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
    backlog: Arc<Mutex<VecDeque<Event>>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
            backlog: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Stamp and emit an event to all subscribers.
    pub fn emit(&self, event_type: EventType, payload: serde_json::Value) -> Event {
        let event = Event {
            event_type,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            timestamp: crate::unix_now(),
            payload,
        };
        {
            let mut backlog = self.backlog.lock().unwrap_or_else(|e| e.into_inner());
            if backlog.len() == self.capacity {
                backlog.pop_front();
            }
            backlog.push_back(event.clone());
        }
        tracing::debug!(event = %event_type, sequence = event.sequence, "event emitted");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event.clone());
        event
    }

    /// Subscribe to events. Returns a receiver.
    #[allow(dead_code)]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Buffered events matching `filter`, oldest first, at most `limit`.
    pub fn recent(&self, filter: &EventFilter, limit: usize) -> Vec<Event> {
        let backlog = self.backlog.lock().unwrap_or_else(|e| e.into_inner());
        let matching: Vec<Event> = backlog.iter().filter(|e| filter.matches(e)).cloned().collect();
        let skip = matching.len().saturating_sub(limit);
        matching.into_iter().skip(skip).collect()
    }
}
