use std::collections::HashSet;
use std::mem;

use engine::Vec2;
use tracing::debug;

use super::vehicles::VehicleId;

/// Fire-and-forget feedback for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackEvent {
    Toast { message: String, duration_ms: u32 },
    MoneyDelta { amount: i64, screen_position: Vec2 },
}

/// Conditions that would otherwise repeat a toast every tick while they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusLatch {
    OutOfFuel(VehicleId),
    SeederEmpty,
    CombineStorageFull,
}

/// Queue of events waiting for the host. At most `limit` are kept; once full,
/// each new event evicts the oldest one.
#[derive(Debug)]
pub struct StatusFeed {
    events: Vec<FeedbackEvent>,
    limit: usize,
    evicted: u64,
    default_duration_ms: u32,
    latched: HashSet<StatusLatch>,
    asserted_this_tick: HashSet<StatusLatch>,
}

impl StatusFeed {
    pub fn new(default_duration_ms: u32, limit: usize) -> Self {
        Self {
            events: Vec::new(),
            limit: limit.max(1),
            evicted: 0,
            default_duration_ms,
            latched: HashSet::new(),
            asserted_this_tick: HashSet::new(),
        }
    }

    pub fn toast(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(message = %message, "status_toast");
        self.push(FeedbackEvent::Toast {
            message,
            duration_ms: self.default_duration_ms,
        });
    }

    pub fn money(&mut self, amount: i64, screen_position: Vec2) {
        debug!(amount, "status_money");
        self.push(FeedbackEvent::MoneyDelta {
            amount,
            screen_position,
        });
    }

    /// Emits the toast only on the first tick of an unbroken run in which
    /// `latch` is asserted.
    pub fn toast_latched(&mut self, latch: StatusLatch, message: impl Into<String>) {
        self.asserted_this_tick.insert(latch);
        if self.latched.insert(latch) {
            self.toast(message);
        }
    }

    /// Forgets latches that were not asserted during the tick that just ended.
    pub(crate) fn end_tick(&mut self) {
        self.latched = mem::take(&mut self.asserted_this_tick);
    }

    pub fn pending(&self) -> &[FeedbackEvent] {
        &self.events
    }

    /// Events evicted unread because the queue was full.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Hands over everything queued since the last drain, oldest first.
    pub fn drain(&mut self) -> Vec<FeedbackEvent> {
        mem::take(&mut self.events)
    }

    fn push(&mut self, event: FeedbackEvent) {
        if self.events.len() >= self.limit {
            let excess = self.events.len() + 1 - self.limit;
            self.events.drain(..excess);
            self.evicted = self.evicted.saturating_add(excess as u64);
            debug!(limit = self.limit, evicted = self.evicted, "status_event_evicted");
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toast_messages(events: &[FeedbackEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                FeedbackEvent::Toast { message, .. } => Some(message.as_str()),
                FeedbackEvent::MoneyDelta { .. } => None,
            })
            .collect()
    }

    #[test]
    fn toasts_carry_default_duration() {
        let mut feed = StatusFeed::new(1_500, 8);
        feed.toast("Saved");
        assert_eq!(
            feed.drain(),
            vec![FeedbackEvent::Toast {
                message: "Saved".to_string(),
                duration_ms: 1_500
            }]
        );
        assert!(feed.pending().is_empty());
    }

    #[test]
    fn latched_toast_repeats_only_after_condition_clears() {
        let mut feed = StatusFeed::new(1_000, 8);
        let latch = StatusLatch::OutOfFuel(VehicleId(0));
        for _ in 0..3 {
            feed.toast_latched(latch, "Out of fuel");
            feed.end_tick();
        }
        assert_eq!(toast_messages(&feed.drain()), vec!["Out of fuel"]);

        // One tick without the condition re-arms it.
        feed.end_tick();
        feed.toast_latched(latch, "Out of fuel");
        assert_eq!(toast_messages(&feed.drain()), vec!["Out of fuel"]);
    }

    #[test]
    fn undrained_feed_keeps_only_the_newest_events() {
        let mut feed = StatusFeed::new(1_000, 3);
        for n in 0..10 {
            feed.toast(format!("toast {n}"));
        }
        assert_eq!(feed.pending().len(), 3);
        assert_eq!(feed.evicted(), 7);
        assert_eq!(
            toast_messages(&feed.drain()),
            vec!["toast 7", "toast 8", "toast 9"]
        );

        feed.money(5, Vec2::new(0.0, 0.0));
        assert_eq!(feed.pending().len(), 1);
        assert_eq!(feed.evicted(), 7);
    }

    #[test]
    fn money_events_keep_position() {
        let mut feed = StatusFeed::new(1_000, 8);
        feed.money(-40, Vec2::new(3.0, 4.0));
        assert_eq!(
            feed.pending(),
            &[FeedbackEvent::MoneyDelta {
                amount: -40,
                screen_position: Vec2::new(3.0, 4.0)
            }]
        );
    }
}
