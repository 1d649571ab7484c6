//! Turns intents, disconnects and reveal deliveries into registry calls and
//! the events they fan out to.
//!
//! Failures are reported to the originating connection only. The returned
//! `Result` mirrors what was reported so transports can log it.

use tracing::{debug, warn};

use crate::device::DeviceId;
use crate::error::FloorError;
use crate::player::{Customization, PlayerId};
use crate::protocol::{Intent, Outbox, ServerEvent, Vector};
use crate::registry::{SessionRegistry, SpinOutcome};
use crate::scheduler::RevealTicket;

impl SessionRegistry {
    pub fn handle_intent(
        &mut self,
        from: &PlayerId,
        intent: Intent,
        out: &mut impl Outbox,
    ) -> Result<(), FloorError> {
        let handled = match intent {
            Intent::Customize { name, color } => {
                self.on_customize(from, Customization { name, color }, out);
                Ok(())
            }
            Intent::Move { x, y } => self.on_move(from, x, y, out),
            Intent::SpinOrClaim { device_id } => self.on_spin_or_claim(from, device_id, out),
            Intent::ApproachDevice { device_id } => self.on_approach(from, device_id, out),
            Intent::LeaveDevice { device_id } => self.on_leave(from, device_id, out),
            Intent::Shove {
                target_id,
                direction,
            } => self.on_shove(from, &target_id, direction, out),
        };
        if let Err(err) = &handled {
            debug!(player = %from, code = err.code(), %err, "intent rejected");
        }
        self.flush_completions(out);
        handled
    }

    /// Tear down a connection's player. Spins in flight keep running and their
    /// results stay on the device for whoever claims them next.
    pub fn handle_disconnect(&mut self, id: &PlayerId, out: &mut impl Outbox) {
        let released = self.release_player_devices(id);
        if self.remove_player(id).is_none() {
            // Connected but never customized.
            return;
        }
        if !released.is_empty() {
            debug!(player = %id, devices = ?released, "released devices on disconnect");
        }
        out.broadcast(
            ServerEvent::PlayerLeft {
                player_id: id.clone(),
            },
            Some(id),
        );
        let devices = self.device_states();
        out.broadcast(ServerEvent::DevicesUpdate { devices }, Some(id));
        self.flush_completions(out);
    }

    /// Apply a reveal delivered by the scheduler. Returns whether it revealed
    /// anything.
    pub fn handle_reveal(&mut self, ticket: RevealTicket, out: &mut impl Outbox) -> bool {
        let revealed = self.complete_reveal(ticket).is_some();
        self.flush_completions(out);
        revealed
    }

    fn flush_completions(&mut self, out: &mut impl Outbox) {
        for completion in self.take_completions() {
            out.broadcast(
                ServerEvent::DeviceSpinComplete {
                    device_id: completion.device_id,
                    player_id: completion.spinner,
                    result: completion.result,
                },
                None,
            );
        }
    }

    fn on_customize(
        &mut self,
        from: &PlayerId,
        customization: Customization,
        out: &mut impl Outbox,
    ) {
        let (player, joined) = match self.update_player_profile(from, customization.clone()) {
            Some(player) => (player, false),
            None => (self.add_player(from.clone(), customization), true),
        };
        let players = self.players_snapshot();
        let devices = self.device_states();
        out.unicast(
            from,
            ServerEvent::Init {
                player_id: from.clone(),
                player: player.clone(),
                players,
                devices,
            },
        );
        let event = if joined {
            ServerEvent::PlayerJoined { player }
        } else {
            ServerEvent::PlayerUpdated { player }
        };
        out.broadcast(event, Some(from));
    }

    fn on_move(
        &mut self,
        from: &PlayerId,
        x: f64,
        y: f64,
        out: &mut impl Outbox,
    ) -> Result<(), FloorError> {
        match self.update_player_position(from, x, y) {
            Ok(Some((x, y))) => {
                out.broadcast(
                    ServerEvent::PlayerMoved {
                        player_id: from.clone(),
                        x,
                        y,
                    },
                    Some(from),
                );
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                report(out, from, None, &err);
                Err(err)
            }
        }
    }

    fn on_spin_or_claim(
        &mut self,
        from: &PlayerId,
        device_id: DeviceId,
        out: &mut impl Outbox,
    ) -> Result<(), FloorError> {
        let outcome = match self.spin_or_claim(from, device_id) {
            Ok(outcome) => outcome,
            Err(err) => {
                report(out, from, Some(device_id), &err);
                return Err(err);
            }
        };
        let new_balance = match outcome {
            SpinOutcome::Started {
                device_id,
                new_balance,
                reveal_in_ms,
            } => {
                out.unicast(
                    from,
                    ServerEvent::SpinStarted {
                        device_id,
                        new_balance,
                        reveal_in_ms,
                    },
                );
                new_balance
            }
            SpinOutcome::Claimed {
                device_id,
                result,
                credited,
                new_balance,
            } => {
                out.unicast(
                    from,
                    ServerEvent::Result {
                        device_id,
                        result,
                        credited,
                        new_balance,
                        claimed: true,
                    },
                );
                new_balance
            }
        };
        let device = self.device_state(device_id)?;
        out.broadcast(ServerEvent::DeviceStateChanged { device }, None);
        out.broadcast(
            ServerEvent::BalanceUpdate {
                player_id: from.clone(),
                balance: new_balance,
            },
            Some(from),
        );
        Ok(())
    }

    fn on_approach(
        &mut self,
        from: &PlayerId,
        device_id: DeviceId,
        out: &mut impl Outbox,
    ) -> Result<(), FloorError> {
        match self.approach_device(from, device_id) {
            Ok(changed) => {
                if changed {
                    out.broadcast(
                        ServerEvent::DeviceInUse {
                            device_id,
                            in_use: true,
                            player_id: Some(from.clone()),
                        },
                        None,
                    );
                }
                Ok(())
            }
            Err(err) => {
                report(out, from, Some(device_id), &err);
                Err(err)
            }
        }
    }

    fn on_leave(
        &mut self,
        from: &PlayerId,
        device_id: DeviceId,
        out: &mut impl Outbox,
    ) -> Result<(), FloorError> {
        match self.leave_device(from, device_id) {
            Ok(true) => {
                out.broadcast(
                    ServerEvent::DeviceInUse {
                        device_id,
                        in_use: false,
                        player_id: None,
                    },
                    None,
                );
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => {
                report(out, from, Some(device_id), &err);
                Err(err)
            }
        }
    }

    fn on_shove(
        &mut self,
        from: &PlayerId,
        target_id: &PlayerId,
        direction: Vector,
        out: &mut impl Outbox,
    ) -> Result<(), FloorError> {
        let outcome = match self.shove(from, target_id, direction) {
            Ok(outcome) => outcome,
            Err(err) => {
                out.unicast(
                    from,
                    ServerEvent::ShoveError {
                        target_id: target_id.clone(),
                        code: err.code().to_string(),
                        reason: err.to_string(),
                    },
                );
                return Err(err);
            }
        };
        out.broadcast(
            ServerEvent::PlayerShoved {
                shover_id: outcome.shover.id,
                shoved_id: outcome.target.id,
                direction: outcome.direction,
                new_shover_balance: outcome.shover.balance,
                target_new_x: outcome.target.x,
                target_new_y: outcome.target.y,
            },
            None,
        );
        for device_id in outcome.released {
            out.broadcast(
                ServerEvent::DeviceInUse {
                    device_id,
                    in_use: false,
                    player_id: None,
                },
                None,
            );
        }
        Ok(())
    }
}

fn report(out: &mut impl Outbox, to: &PlayerId, device_id: Option<DeviceId>, err: &FloorError) {
    if matches!(err, FloorError::InvalidIntent(_)) {
        warn!(player = %to, %err, "invalid intent");
    }
    out.unicast(
        to,
        ServerEvent::Error {
            device_id,
            code: err.code().to_string(),
            reason: err.to_string(),
        },
    );
}
