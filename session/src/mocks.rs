//! Deterministic stand-ins for time, timers and delivery, used by this crate's
//! tests and by downstream crates through the `mocks` feature.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::player::PlayerId;
use crate::protocol::{Outbox, ServerEvent};
use crate::scheduler::{RevealHandle, RevealScheduler, RevealTicket};

/// Clock that only moves when told to.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    scheduled: Vec<(RevealTicket, Duration)>,
    cancelled: HashSet<RevealTicket>,
    fired: HashSet<RevealTicket>,
}

/// Records reveal requests instead of running timers. Tests fire them
/// explicitly with [`ManualScheduler::take_pending`].
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl ManualScheduler {
    /// Every ticket ever scheduled, in order.
    pub fn scheduled(&self) -> Vec<(RevealTicket, Duration)> {
        self.state.lock().unwrap().scheduled.clone()
    }

    pub fn is_cancelled(&self, ticket: RevealTicket) -> bool {
        self.state.lock().unwrap().cancelled.contains(&ticket)
    }

    /// Tickets that are neither cancelled nor already taken, marking them taken.
    pub fn take_pending(&self) -> Vec<RevealTicket> {
        let mut state = self.state.lock().unwrap();
        let pending: Vec<RevealTicket> = state
            .scheduled
            .iter()
            .map(|(ticket, _)| *ticket)
            .filter(|ticket| !state.cancelled.contains(ticket) && !state.fired.contains(ticket))
            .collect();
        state.fired.extend(pending.iter().copied());
        pending
    }
}

impl RevealScheduler for ManualScheduler {
    fn schedule(&self, ticket: RevealTicket, delay: Duration) -> RevealHandle {
        self.state.lock().unwrap().scheduled.push((ticket, delay));
        let state = self.state.clone();
        RevealHandle::new(move || {
            state.lock().unwrap().cancelled.insert(ticket);
        })
    }
}

/// Where a recorded event was sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    To(PlayerId),
    All { except: Option<PlayerId> },
}

impl Delivery {
    /// Whether `player` would have received an event sent this way.
    pub fn reaches(&self, player: &PlayerId) -> bool {
        match self {
            Delivery::To(to) => to == player,
            Delivery::All { except } => except.as_ref() != Some(player),
        }
    }
}

/// Outbox that keeps every event in send order.
#[derive(Debug, Default)]
pub struct RecordingOutbox {
    pub sent: Vec<(Delivery, ServerEvent)>,
}

impl RecordingOutbox {
    /// Events `player` would have received, in order.
    pub fn received_by(&self, player: &PlayerId) -> Vec<&ServerEvent> {
        self.sent
            .iter()
            .filter(|(delivery, _)| delivery.reaches(player))
            .map(|(_, event)| event)
            .collect()
    }

    pub fn unicasts_to(&self, player: &PlayerId) -> Vec<&ServerEvent> {
        self.sent
            .iter()
            .filter(|(delivery, _)| *delivery == Delivery::To(player.clone()))
            .map(|(_, event)| event)
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<&(Delivery, ServerEvent)> {
        self.sent
            .iter()
            .filter(|(delivery, _)| matches!(delivery, Delivery::All { .. }))
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Outbox for RecordingOutbox {
    fn unicast(&mut self, to: &PlayerId, event: ServerEvent) {
        self.sent.push((Delivery::To(to.clone()), event));
    }

    fn broadcast(&mut self, event: ServerEvent, except: Option<&PlayerId>) {
        self.sent.push((
            Delivery::All {
                except: except.cloned(),
            },
            event,
        ));
    }
}
