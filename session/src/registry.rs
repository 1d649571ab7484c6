//! Owner of every player and device on the floor.
//!
//! The registry is the only mutator of session state. Callers serialize access
//! to it (the server runs it inside a single actor task), so nothing in here
//! locks. Every fallible operation validates before it mutates.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::FloorConfig;
use crate::device::{Device, DeviceId, DeviceState, DeviceView, SpinCompletion};
use crate::error::FloorError;
use crate::payout::{SpinResult, Tier};
use crate::player::{Customization, Player, PlayerId, PlayerView};
use crate::protocol::Vector;
use crate::scheduler::{RevealScheduler, RevealTicket};
use crate::world::{clamp_to_bounds, device_positions, SPAWN_X, SPAWN_Y};

/// What `spin_or_claim` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpinOutcome {
    /// A wager was charged and a new spin is in flight.
    Started {
        device_id: DeviceId,
        new_balance: i64,
        reveal_in_ms: u64,
    },
    /// A revealed result was collected and its payout credited.
    Claimed {
        device_id: DeviceId,
        result: SpinResult,
        credited: i64,
        new_balance: i64,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShoveOutcome {
    pub shover: PlayerView,
    pub target: PlayerView,
    pub direction: Vector,
    /// Devices the target was loosely occupying and has been pushed away from.
    pub released: Vec<DeviceId>,
}

/// How a `spin_or_claim` request will be served, decided before any mutation.
enum SpinPlan {
    Claim,
    Spin { release_marker: bool },
}

pub struct SessionRegistry {
    config: FloorConfig,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    players: HashMap<PlayerId, Player>,
    devices: Vec<Device>,
    device_occupants: HashMap<DeviceId, PlayerId>,
    completions: Vec<SpinCompletion>,
}

impl SessionRegistry {
    /// Build the floor. Device tiers are drawn once here and never change.
    pub fn new(
        config: FloorConfig,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn RevealScheduler>,
    ) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let reveal_delay = config.reveal_delay();
        let devices: Vec<Device> = device_positions()
            .into_iter()
            .enumerate()
            .map(|(idx, (x, y))| {
                let tier = Tier::draw(&mut rng);
                Device::new(idx as DeviceId, x, y, tier, reveal_delay, scheduler.clone())
            })
            .collect();
        info!(devices = devices.len(), "floor initialized");

        Self {
            config,
            clock,
            rng,
            players: HashMap::new(),
            devices,
            device_occupants: HashMap::new(),
            completions: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Players
    // ---------------------------------------------------------------------

    pub fn add_player(&mut self, id: PlayerId, customization: Customization) -> PlayerView {
        let player = Player::new(
            id.clone(),
            SPAWN_X,
            SPAWN_Y,
            customization,
            self.config.starting_balance,
        );
        let view = player.view();
        info!(player = %id, name = %view.name, "player joined");
        self.players.insert(id, player);
        view
    }

    /// Delete a player. Loose device markers are not touched; call
    /// [`release_player_devices`](Self::release_player_devices) first.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let removed = self.players.remove(id);
        if removed.is_some() {
            info!(player = %id, "player left");
        }
        removed
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Move a player, clamped to the walkable area. `Ok(None)` if the player
    /// is unknown.
    pub fn update_player_position(
        &mut self,
        id: &PlayerId,
        x: f64,
        y: f64,
    ) -> Result<Option<(f64, f64)>, FloorError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(FloorError::InvalidIntent("position must be finite"));
        }
        let Some(player) = self.players.get_mut(id) else {
            return Ok(None);
        };
        let (x, y) = clamp_to_bounds(x, y);
        player.update_position(x, y);
        Ok(Some((x, y)))
    }

    pub fn update_player_profile(
        &mut self,
        id: &PlayerId,
        customization: Customization,
    ) -> Option<PlayerView> {
        let player = self.players.get_mut(id)?;
        player.update_profile(customization);
        Some(player.view())
    }

    /// Every player, ordered by id.
    pub fn players_snapshot(&self) -> Vec<PlayerView> {
        let mut players: Vec<PlayerView> = self.players.values().map(Player::view).collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        players
    }

    // ---------------------------------------------------------------------
    // Devices
    // ---------------------------------------------------------------------

    /// Every device, after catching up on overdue reveals.
    pub fn devices(&mut self) -> &[Device] {
        self.refresh_all();
        &self.devices
    }

    /// One device, after catching up on its reveal.
    pub fn device(&mut self, id: DeviceId) -> Option<&Device> {
        let idx = self.device_index(id).ok()?;
        let now = self.clock.now_ms();
        self.refresh_device(idx, now);
        self.devices.get(idx)
    }

    pub fn device_occupant(&self, id: DeviceId) -> Option<&PlayerId> {
        self.device_occupants.get(&id)
    }

    fn device_index(&self, id: DeviceId) -> Result<usize, FloorError> {
        let idx = id as usize;
        if idx < self.devices.len() {
            Ok(idx)
        } else {
            Err(FloorError::DeviceNotFound(id))
        }
    }

    /// Complete an overdue reveal on one device, queueing its broadcast.
    fn refresh_device(&mut self, idx: usize, now_ms: u64) {
        if let Some(completion) = self.devices[idx].refresh(now_ms) {
            self.completions.push(completion);
        }
    }

    /// Snapshot of a single device, after catching up on its reveal.
    pub fn device_state(&mut self, id: DeviceId) -> Result<DeviceView, FloorError> {
        let idx = self.device_index(id)?;
        let now = self.clock.now_ms();
        self.refresh_device(idx, now);
        Ok(self.devices[idx].view())
    }

    fn refresh_all(&mut self) {
        let now = self.clock.now_ms();
        for idx in 0..self.devices.len() {
            self.refresh_device(idx, now);
        }
    }

    /// Snapshot of every device, after catching up on overdue reveals.
    pub fn device_states(&mut self) -> Vec<DeviceView> {
        self.refresh_all();
        self.devices.iter().map(Device::view).collect()
    }

    /// Reveals completed since the last call, whether delivered by the
    /// scheduler or caught up on read.
    pub fn take_completions(&mut self) -> Vec<SpinCompletion> {
        std::mem::take(&mut self.completions)
    }

    /// Apply a reveal delivered by the scheduler.
    pub fn complete_reveal(&mut self, ticket: RevealTicket) -> Option<SpinCompletion> {
        let idx = self.device_index(ticket.device_id).ok()?;
        let completion = self.devices[idx].complete_reveal(ticket)?;
        debug!(device = ticket.device_id, cycle = ticket.cycle, "reveal delivered");
        self.completions.push(completion.clone());
        Some(completion)
    }

    /// Single entry point for starting a spin and for collecting a revealed
    /// result, disambiguated by the device's state.
    pub fn spin_or_claim(
        &mut self,
        player_id: &PlayerId,
        device_id: DeviceId,
    ) -> Result<SpinOutcome, FloorError> {
        self.spin_or_claim_inner(player_id, device_id, None)
    }

    /// Like [`spin_or_claim`](Self::spin_or_claim), but a new spin lands on
    /// `result` instead of a random draw.
    #[cfg(any(test, feature = "mocks"))]
    pub fn spin_or_claim_with_result(
        &mut self,
        player_id: &PlayerId,
        device_id: DeviceId,
        result: SpinResult,
    ) -> Result<SpinOutcome, FloorError> {
        self.spin_or_claim_inner(player_id, device_id, Some(result))
    }

    fn spin_or_claim_inner(
        &mut self,
        player_id: &PlayerId,
        device_id: DeviceId,
        decided: Option<SpinResult>,
    ) -> Result<SpinOutcome, FloorError> {
        let now = self.clock.now_ms();
        if !self.players.contains_key(player_id) {
            return Err(FloorError::PlayerNotFound(player_id.clone()));
        }
        let idx = self.device_index(device_id)?;
        self.refresh_device(idx, now);

        let device = &self.devices[idx];
        let unavailable = || FloorError::DeviceUnavailable {
            device: device_id,
            state: device.state().as_str(),
        };
        let plan = match device.state() {
            // Whoever asks collects, whether or not they spun.
            DeviceState::ShowingResult => SpinPlan::Claim,
            DeviceState::InUse => match self.device_occupants.get(&device_id) {
                Some(occupant) if occupant == player_id => SpinPlan::Spin {
                    release_marker: true,
                },
                _ => return Err(unavailable()),
            },
            DeviceState::Spinning => return Err(unavailable()),
            DeviceState::Available => SpinPlan::Spin {
                release_marker: false,
            },
        };

        match plan {
            SpinPlan::Claim => {
                let result = self.devices[idx].claim_result(player_id).ok_or(
                    FloorError::DeviceUnavailable {
                        device: device_id,
                        state: DeviceState::ShowingResult.as_str(),
                    },
                )?;
                let credited = result.win_amount;
                let player = self
                    .players
                    .get_mut(player_id)
                    .ok_or_else(|| FloorError::PlayerNotFound(player_id.clone()))?;
                player.add_balance(credited);
                info!(
                    player = %player_id,
                    device = device_id,
                    credited,
                    balance = player.balance(),
                    "result claimed"
                );
                Ok(SpinOutcome::Claimed {
                    device_id,
                    result,
                    credited,
                    new_balance: player.balance(),
                })
            }
            SpinPlan::Spin { release_marker } => {
                let cost = device.cost();
                let player = self
                    .players
                    .get(player_id)
                    .ok_or_else(|| FloorError::PlayerNotFound(player_id.clone()))?;
                if !player.can_afford(cost) {
                    return Err(FloorError::InsufficientFunds {
                        balance: player.balance(),
                        required: cost,
                    });
                }

                let device = &mut self.devices[idx];
                if release_marker {
                    device.set_in_use(false);
                    self.device_occupants.remove(&device_id);
                }
                match decided {
                    Some(result) => device.start_spin_with_result(player_id, now, result)?,
                    None => device.start_spin(player_id, now, &mut self.rng)?,
                };

                let player = self
                    .players
                    .get_mut(player_id)
                    .ok_or_else(|| FloorError::PlayerNotFound(player_id.clone()))?;
                if !player.deduct_balance(cost) {
                    self.devices[idx].reset();
                    return Err(FloorError::InsufficientFunds {
                        balance: player.balance(),
                        required: cost,
                    });
                }
                info!(
                    player = %player_id,
                    device = device_id,
                    cost,
                    balance = player.balance(),
                    "spin started"
                );
                Ok(SpinOutcome::Started {
                    device_id,
                    new_balance: player.balance(),
                    reveal_in_ms: self.config.reveal_delay_ms,
                })
            }
        }
    }

    // ---------------------------------------------------------------------
    // Loose occupancy
    // ---------------------------------------------------------------------

    /// Update the advisory occupancy map and the device's in-use marker.
    ///
    /// The marker itself is only toggled between Available and InUse; during a
    /// spin only the map changes. Returns whether the device state changed.
    pub fn set_device_in_use(
        &mut self,
        device_id: DeviceId,
        in_use: bool,
        player_id: Option<&PlayerId>,
    ) -> Result<bool, FloorError> {
        let idx = self.device_index(device_id)?;
        let changed = self.devices[idx].set_in_use(in_use);
        match (in_use, player_id) {
            (true, Some(player_id)) => {
                self.device_occupants.insert(device_id, player_id.clone());
            }
            _ => {
                self.device_occupants.remove(&device_id);
            }
        }
        Ok(changed)
    }

    /// Mark a device as loosely occupied by a player standing next to it.
    pub fn approach_device(
        &mut self,
        player_id: &PlayerId,
        device_id: DeviceId,
    ) -> Result<bool, FloorError> {
        if !self.players.contains_key(player_id) {
            return Err(FloorError::PlayerNotFound(player_id.clone()));
        }
        let idx = self.device_index(device_id)?;
        let now = self.clock.now_ms();
        self.refresh_device(idx, now);

        let player = self
            .players
            .get(player_id)
            .ok_or_else(|| FloorError::PlayerNotFound(player_id.clone()))?;
        let device = &self.devices[idx];

        let distance = player.distance_to(device.x, device.y);
        if !device.is_near(player.x, player.y, self.config.device_proximity) {
            return Err(FloorError::OutOfRange {
                distance,
                max: self.config.device_proximity,
            });
        }
        let held_by_other = self
            .device_occupants
            .get(&device_id)
            .is_some_and(|occupant| occupant != player_id);
        let free = match device.state() {
            DeviceState::Available => true,
            DeviceState::InUse => !held_by_other,
            DeviceState::Spinning | DeviceState::ShowingResult => false,
        };
        if !free {
            return Err(FloorError::DeviceUnavailable {
                device: device_id,
                state: device.state().as_str(),
            });
        }

        self.set_device_in_use(device_id, true, Some(player_id))
    }

    /// Drop a player's loose marker on a device. Markers held by someone else
    /// are left alone. Returns whether a marker was cleared.
    pub fn leave_device(
        &mut self,
        player_id: &PlayerId,
        device_id: DeviceId,
    ) -> Result<bool, FloorError> {
        let idx = self.device_index(device_id)?;
        match self.device_occupants.get(&device_id) {
            Some(occupant) if occupant == player_id => {
                self.devices[idx].set_in_use(false);
                self.device_occupants.remove(&device_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Clear every loose marker held by a player. In-flight spins and waiting
    /// results are left to resolve on their own.
    pub fn release_player_devices(&mut self, player_id: &PlayerId) -> Vec<DeviceId> {
        let mut released: Vec<DeviceId> = self
            .device_occupants
            .iter()
            .filter(|(_, occupant)| *occupant == player_id)
            .map(|(device_id, _)| *device_id)
            .collect();
        released.sort_unstable();
        for device_id in &released {
            self.device_occupants.remove(device_id);
            if let Some(device) = self.devices.get_mut(*device_id as usize) {
                device.set_in_use(false);
            }
        }
        if !released.is_empty() {
            debug!(player = %player_id, devices = ?released, "released loose occupancy");
        }
        released
    }

    // ---------------------------------------------------------------------
    // Shove
    // ---------------------------------------------------------------------

    pub fn shove(
        &mut self,
        shover_id: &PlayerId,
        target_id: &PlayerId,
        direction: Vector,
    ) -> Result<ShoveOutcome, FloorError> {
        let now = self.clock.now_ms();
        let shover = self
            .players
            .get(shover_id)
            .ok_or_else(|| FloorError::PlayerNotFound(shover_id.clone()))?;
        let target = self
            .players
            .get(target_id)
            .ok_or_else(|| FloorError::PlayerNotFound(target_id.clone()))?;
        if shover_id == target_id {
            return Err(FloorError::InvalidIntent("cannot shove yourself"));
        }
        if !direction.is_finite() {
            return Err(FloorError::InvalidIntent("direction must be finite"));
        }
        let cost = self.config.shove_cost;
        if !shover.can_afford(cost) {
            return Err(FloorError::InsufficientFunds {
                balance: shover.balance(),
                required: cost,
            });
        }
        let cooldown = self.config.shove_cooldown_ms;
        if !shover.can_shove(now, cooldown) {
            return Err(FloorError::OnCooldown {
                remaining_ms: shover.shove_cooldown_remaining(now, cooldown),
            });
        }
        let distance = shover.distance_to(target.x, target.y);
        if distance > self.config.shove_range {
            return Err(FloorError::OutOfRange {
                distance,
                max: self.config.shove_range,
            });
        }
        let (new_x, new_y) = clamp_to_bounds(
            target.x + direction.x * self.config.shove_force,
            target.y + direction.y * self.config.shove_force,
        );

        let shover = self
            .players
            .get_mut(shover_id)
            .ok_or_else(|| FloorError::PlayerNotFound(shover_id.clone()))?;
        shover.deduct_balance(cost);
        shover.mark_shove(now);
        let shover = shover.view();

        let target = self
            .players
            .get_mut(target_id)
            .ok_or_else(|| FloorError::PlayerNotFound(target_id.clone()))?;
        target.update_position(new_x, new_y);
        let target = target.view();

        let mut released: Vec<DeviceId> = self
            .device_occupants
            .iter()
            .filter(|(device_id, occupant)| {
                *occupant == target_id
                    && self
                        .devices
                        .get(**device_id as usize)
                        .is_some_and(|device| device.state() == DeviceState::InUse)
            })
            .map(|(device_id, _)| *device_id)
            .collect();
        released.sort_unstable();
        for device_id in &released {
            self.device_occupants.remove(device_id);
            self.devices[*device_id as usize].set_in_use(false);
        }

        info!(
            shover = %shover_id,
            target = %target_id,
            x = new_x,
            y = new_y,
            "player shoved"
        );
        Ok(ShoveOutcome {
            shover,
            target,
            direction,
            released,
        })
    }
}
