//! Slot floor session model.
//!
//! This crate holds the authoritative, in-memory state of a shared casino floor:
//! players walking around with a coin balance, and a fixed set of slot machines
//! that each run a small spin/reveal/claim state machine.
//!
//! ## Ownership
//! [`SessionRegistry`] owns every [`Player`] and [`Device`] and is the only thing
//! that mutates them. It is not thread-safe on purpose; the server drives it from
//! a single task and feeds it intents, disconnects and reveal deliveries in one
//! order.
//!
//! ## Time
//! Reveals are scheduled through a [`RevealScheduler`] and delivered back as
//! [`RevealTicket`]s. Reads also catch up on any reveal whose deadline has
//! passed, so a lost or late timer only delays the broadcast.
//!
//! ## Transport
//! Inbound messages are [`Intent`]s attributed to a [`PlayerId`]; outbound
//! messages are [`ServerEvent`]s pushed through an [`Outbox`]. The crate never
//! touches sockets.

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
mod intents;
pub mod payout;
pub mod player;
pub mod protocol;
pub mod registry;
pub mod scheduler;
pub mod world;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;


pub use clock::{Clock, MonotonicClock};
pub use config::{ConfigError, FloorConfig};
pub use device::{Device, DeviceId, DeviceState, DeviceView, SpinCompletion};
pub use error::FloorError;
pub use payout::{evaluate, generate_spin_result, PayoutTable, SpinResult, Symbol, Tier};
pub use player::{Customization, Player, PlayerId, PlayerView};
pub use protocol::{Intent, Outbox, ServerEvent, Vector};
pub use registry::{SessionRegistry, ShoveOutcome, SpinOutcome};
pub use scheduler::{RevealHandle, RevealScheduler, RevealTicket, TokioScheduler};
