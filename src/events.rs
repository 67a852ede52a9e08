//! Event Channels
//!
//! Each observable moment of the simulation has its own typed channel with a
//! subscriber list invoked synchronously in subscription order. Listeners
//! receive shared payloads (ids and timestamps); world mutation driven by an
//! event belongs between steps, where the caller holds the engine mutably.
//!
//! Sleep transitions are additionally collected into per-step queues while
//! the solvers run, then dispatched at the end of the step.

use crate::body::BodyId;

/// A typed event channel. Subscribers fire in subscription order.
pub struct Channel<E> {
    subscribers: Vec<Box<dyn FnMut(&E)>>,
}

impl<E> Channel<E> {
    /// Subscribe a listener.
    pub fn on(&mut self, listener: impl FnMut(&E) + 'static) {
        self.subscribers.push(Box::new(listener));
    }

    /// Number of subscribers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether the channel has no subscribers.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub(crate) fn emit(&mut self, event: &E) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }
}

impl<E> Default for Channel<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<E> std::fmt::Debug for Channel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Payload of `before_update` / `after_update`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepEvent {
    /// Simulation timestamp in milliseconds.
    pub timestamp: f64,
}

/// Payload of the collision lifecycle channels.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionEvent {
    /// Simulation timestamp in milliseconds.
    pub timestamp: f64,
    /// Ids of the pairs that started, stayed active, or ended.
    pub pairs: Vec<u64>,
}

/// Payload of `sleep_start` / `sleep_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SleepEvent {
    /// The body that fell asleep or woke.
    pub body: BodyId,
}

/// Engine-level channels, dispatched during [`crate::engine::Engine::step`].
#[derive(Debug, Default)]
pub struct EngineEvents {
    /// Start of a step, after the timestamp advance.
    pub before_update: Channel<StepEvent>,
    /// End of a step, after force clearing.
    pub after_update: Channel<StepEvent>,
    /// Pairs that began colliding this step.
    pub collision_start: Channel<CollisionEvent>,
    /// Pairs that continued colliding this step.
    pub collision_active: Channel<CollisionEvent>,
    /// Pairs that stopped colliding this step.
    pub collision_end: Channel<CollisionEvent>,
    /// A body fell asleep.
    pub sleep_start: Channel<SleepEvent>,
    /// A body woke up.
    pub sleep_end: Channel<SleepEvent>,
}

/// Per-step queues filled while the solvers run and drained into the
/// channels at defined points of the step.
#[derive(Clone, Debug, Default)]
pub(crate) struct SleepQueues {
    pub sleep_start: Vec<BodyId>,
    pub sleep_end: Vec<BodyId>,
}

impl SleepQueues {
    pub fn clear(&mut self) {
        self.sleep_start.clear();
        self.sleep_end.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribers_fire_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut channel: Channel<StepEvent> = Channel::default();

        let o1 = Rc::clone(&order);
        channel.on(move |_| o1.borrow_mut().push(1));
        let o2 = Rc::clone(&order);
        channel.on(move |_| o2.borrow_mut().push(2));

        channel.emit(&StepEvent { timestamp: 0.0 });
        assert_eq!(*order.borrow(), vec![1, 2]);
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn test_payload_passed_through() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut channel: Channel<CollisionEvent> = Channel::default();
        let s = Rc::clone(&seen);
        channel.on(move |e| s.borrow_mut().extend(e.pairs.iter().copied()));

        channel.emit(&CollisionEvent {
            timestamp: 16.0,
            pairs: vec![7, 9],
        });
        assert_eq!(*seen.borrow(), vec![7, 9]);
    }

    #[test]
    fn test_empty_channel_emits_nothing() {
        let mut channel: Channel<SleepEvent> = Channel::default();
        assert!(channel.is_empty());
        channel.emit(&SleepEvent { body: 1 });
    }
}
