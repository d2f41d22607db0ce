//! Deferred-send queue.
//!
//! Outbound requests attempted while the connection is not ready are
//! queued here as tagged actions and re-attempted, in insertion order,
//! exactly once per readiness flush. There is no timer-driven retry: only
//! a "connection became ready" event triggers a flush.

use crate::models::{ClientMessage, Selector};
use std::collections::VecDeque;
use std::fmt;

/// What a deferred action will send when the connection is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionKind {
    Get,
    Subscribe,
    Unsubscribe,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Get => write!(f, "get"),
            ActionKind::Subscribe => write!(f, "subscribe"),
            ActionKind::Unsubscribe => write!(f, "unsubscribe"),
        }
    }
}

/// A retryable outbound send: what to send, for which selector. One
/// generic sender executes these; the queue only owns the "what".
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingAction {
    pub kind: ActionKind,
    pub selector: Selector,
}

impl PendingAction {
    pub fn new(kind: ActionKind, selector: Selector) -> Self {
        Self { kind, selector }
    }

    /// The wire message this action sends.
    pub fn to_message(&self) -> ClientMessage {
        let selectors = vec![self.selector.clone()];
        match self.kind {
            ActionKind::Get => ClientMessage::Get(selectors),
            ActionKind::Subscribe => ClientMessage::Subscribe(selectors),
            ActionKind::Unsubscribe => ClientMessage::Unsubscribe(selectors),
        }
    }
}

impl fmt::Display for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.selector)
    }
}

/// FIFO queue of deferred actions, capped at a configurable length.
pub(crate) struct DeferredQueue {
    actions: VecDeque<PendingAction>,
    capacity: usize,
}

impl DeferredQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            actions: VecDeque::new(),
            capacity,
        }
    }

    /// Append an action. Returns `false` when the queue is full; the
    /// action is rejected (the oldest entries keep their place and their
    /// relative order).
    #[must_use]
    pub fn push(&mut self, action: PendingAction) -> bool {
        if self.actions.len() >= self.capacity {
            return false;
        }
        self.actions.push_back(action);
        true
    }

    /// One flush pass: attempt every action currently queued, in insertion
    /// order, exactly once. Actions for which `try_send` reports success
    /// are removed and returned; the rest stay queued in their original
    /// relative order for the next readiness event.
    pub fn flush<F>(&mut self, mut try_send: F) -> Vec<PendingAction>
    where
        F: FnMut(&PendingAction) -> bool,
    {
        let mut sent = Vec::new();
        let mut remaining = VecDeque::new();
        for action in self.actions.drain(..) {
            if try_send(&action) {
                sent.push(action);
            } else {
                remaining.push_back(action);
            }
        }
        self.actions = remaining;
        sent
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Descriptions of queued actions, in send order (debug dump).
    pub fn describe(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.to_string()).collect()
    }
}
