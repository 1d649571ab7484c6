//! Slot machine state machine.
//!
//! ```text
//!            set_in_use(true)
//!   Available <--------------> InUse
//!       |     set_in_use(false)
//!       | start_spin
//!       v
//!   Spinning --(reveal delivered or delay elapsed)--> ShowingResult
//!                                                          |
//!   Available <-------------- claim_result ----------------+
//! ```
//!
//! The outcome is computed when the spin starts, so a late or lost reveal only
//! changes when the result becomes visible, never what it is.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FloorError;
use crate::payout::{generate_spin_result, PayoutTable, SpinResult, Tier};
use crate::player::PlayerId;
use crate::scheduler::{RevealHandle, RevealScheduler, RevealTicket};

pub type DeviceId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceState {
    Available,
    InUse,
    Spinning,
    ShowingResult,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Available => "available",
            DeviceState::InUse => "inUse",
            DeviceState::Spinning => "spinning",
            DeviceState::ShowingResult => "showingResult",
        }
    }
}

/// A reveal that has just happened, ready to be broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinCompletion {
    pub device_id: DeviceId,
    pub spinner: PlayerId,
    pub result: SpinResult,
}

/// Wire form of a device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    pub id: DeviceId,
    pub x: f64,
    pub y: f64,
    pub tier: Tier,
    pub cost: i64,
    pub state: DeviceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_spinner: Option<PlayerId>,
    /// Only populated once the result has been revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SpinResult>,
}

pub struct Device {
    pub id: DeviceId,
    pub x: f64,
    pub y: f64,
    tier: Tier,
    payout_table: PayoutTable,
    state: DeviceState,
    current_spinner: Option<PlayerId>,
    pending_result: Option<SpinResult>,
    spin_started_at: Option<u64>,
    reveal: Option<RevealHandle>,
    cycle: u64,
    reveal_delay: Duration,
    scheduler: Arc<dyn RevealScheduler>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("tier", &self.tier)
            .field("state", &self.state)
            .field("current_spinner", &self.current_spinner)
            .field("spin_started_at", &self.spin_started_at)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl Device {
    pub fn new(
        id: DeviceId,
        x: f64,
        y: f64,
        tier: Tier,
        reveal_delay: Duration,
        scheduler: Arc<dyn RevealScheduler>,
    ) -> Self {
        Self {
            id,
            x,
            y,
            tier,
            payout_table: PayoutTable::for_tier(tier),
            state: DeviceState::Available,
            current_spinner: None,
            pending_result: None,
            spin_started_at: None,
            reveal: None,
            cycle: 0,
            reveal_delay,
            scheduler,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn cost(&self) -> i64 {
        self.tier.cost()
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn current_spinner(&self) -> Option<&PlayerId> {
        self.current_spinner.as_ref()
    }

    pub fn pending_result(&self) -> Option<&SpinResult> {
        self.pending_result.as_ref()
    }

    pub fn spin_started_at(&self) -> Option<u64> {
        self.spin_started_at
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn has_pending_reveal(&self) -> bool {
        self.reveal.is_some()
    }

    pub fn can_interact(&self) -> bool {
        matches!(self.state, DeviceState::Available | DeviceState::ShowingResult)
    }

    pub fn is_near(&self, x: f64, y: f64, distance: f64) -> bool {
        (self.x - x).hypot(self.y - y) < distance
    }

    pub fn generate_spin_result<R: Rng + ?Sized>(&self, rng: &mut R) -> SpinResult {
        generate_spin_result(rng, self.tier, &self.payout_table)
    }

    /// Begin a spin for `player`. The outcome is drawn now and the reveal is
    /// scheduled `reveal_delay` later.
    pub fn start_spin<R: Rng + ?Sized>(
        &mut self,
        player: &PlayerId,
        now_ms: u64,
        rng: &mut R,
    ) -> Result<RevealTicket, FloorError> {
        self.ensure_available()?;
        let result = self.generate_spin_result(rng);
        Ok(self.begin_spin(player, now_ms, result))
    }

    /// Start a spin whose outcome is already decided.
    pub fn start_spin_with_result(
        &mut self,
        player: &PlayerId,
        now_ms: u64,
        result: SpinResult,
    ) -> Result<RevealTicket, FloorError> {
        self.ensure_available()?;
        Ok(self.begin_spin(player, now_ms, result))
    }

    /// Draw an outcome without touching the state machine or scheduling.
    #[cfg(any(test, feature = "mocks"))]
    pub fn spin_immediate<R: Rng + ?Sized>(&self, rng: &mut R) -> SpinResult {
        self.generate_spin_result(rng)
    }

    fn ensure_available(&self) -> Result<(), FloorError> {
        if self.state != DeviceState::Available {
            return Err(FloorError::DeviceUnavailable {
                device: self.id,
                state: self.state.as_str(),
            });
        }
        Ok(())
    }

    fn begin_spin(&mut self, player: &PlayerId, now_ms: u64, result: SpinResult) -> RevealTicket {
        self.cycle = self.cycle.wrapping_add(1);
        let ticket = RevealTicket {
            device_id: self.id,
            cycle: self.cycle,
        };
        self.state = DeviceState::Spinning;
        self.current_spinner = Some(player.clone());
        self.pending_result = Some(result);
        self.spin_started_at = Some(now_ms);
        self.cancel_reveal();
        self.reveal = Some(self.scheduler.schedule(ticket, self.reveal_delay));
        debug!(device = self.id, player = %player, cycle = self.cycle, "spin started");
        ticket
    }

    /// True if the device is spinning and its reveal deadline has passed.
    pub fn reveal_overdue(&self, now_ms: u64) -> bool {
        match (self.state, self.spin_started_at) {
            (DeviceState::Spinning, Some(started)) => {
                Duration::from_millis(now_ms.saturating_sub(started)) >= self.reveal_delay
            }
            _ => false,
        }
    }

    /// Catch up on a reveal whose timer has not (yet) been delivered.
    pub fn refresh(&mut self, now_ms: u64) -> Option<SpinCompletion> {
        if !self.reveal_overdue(now_ms) {
            return None;
        }
        debug!(device = self.id, cycle = self.cycle, "reveal caught up on read");
        self.finish_spin()
    }

    /// Apply a delivered reveal. Stale tickets (wrong cycle or the device has
    /// already moved on) are ignored.
    pub fn complete_reveal(&mut self, ticket: RevealTicket) -> Option<SpinCompletion> {
        if self.state != DeviceState::Spinning || ticket.cycle != self.cycle {
            debug!(
                device = self.id,
                ticket_cycle = ticket.cycle,
                cycle = self.cycle,
                state = self.state.as_str(),
                "ignoring stale reveal"
            );
            return None;
        }
        self.finish_spin()
    }

    fn finish_spin(&mut self) -> Option<SpinCompletion> {
        let spinner = self.current_spinner.clone()?;
        let result = self.pending_result.clone()?;
        self.state = DeviceState::ShowingResult;
        self.cancel_reveal();
        Some(SpinCompletion {
            device_id: self.id,
            spinner,
            result,
        })
    }

    /// Hand the revealed outcome to `claimant` and free the device. Whoever
    /// claims collects, spinner or not.
    ///
    /// Returns `None` without changing anything unless a result is showing.
    pub fn claim_result(&mut self, claimant: &PlayerId) -> Option<SpinResult> {
        if self.state != DeviceState::ShowingResult {
            return None;
        }
        let result = self.pending_result.take();
        debug!(
            device = self.id,
            claimant = %claimant,
            spinner = ?self.current_spinner,
            "result claimed"
        );
        self.clear_spin();
        result
    }

    /// Force the device back to Available, discarding any spin in flight.
    /// Returns the discarded result.
    pub fn reset(&mut self) -> Option<SpinResult> {
        let discarded = self.pending_result.take();
        self.clear_spin();
        discarded
    }

    fn clear_spin(&mut self) {
        self.state = DeviceState::Available;
        self.current_spinner = None;
        self.pending_result = None;
        self.spin_started_at = None;
        self.cancel_reveal();
    }

    fn cancel_reveal(&mut self) {
        if let Some(handle) = self.reveal.take() {
            handle.cancel();
        }
    }

    /// Toggle the loose in-use marker. Has no effect while a spin is in
    /// flight or a result is waiting. Returns whether the state changed.
    pub fn set_in_use(&mut self, in_use: bool) -> bool {
        let next = match (self.state, in_use) {
            (DeviceState::Available, true) => DeviceState::InUse,
            (DeviceState::InUse, false) => DeviceState::Available,
            _ => return false,
        };
        self.state = next;
        true
    }

    pub fn view(&self) -> DeviceView {
        DeviceView {
            id: self.id,
            x: self.x,
            y: self.y,
            tier: self.tier,
            cost: self.cost(),
            state: self.state,
            current_spinner: self.current_spinner.clone(),
            result: match self.state {
                DeviceState::ShowingResult => self.pending_result.clone(),
                _ => None,
            },
        }
    }
}
