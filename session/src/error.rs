use thiserror::Error;

use crate::device::DeviceId;
use crate::player::PlayerId;

/// Reasons an intent is rejected.
///
/// Every variant is recoverable from the caller's side: nothing here is fatal to
/// the process, and a rejected intent never leaves partial state behind.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FloorError {
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("device {0} not found")]
    DeviceNotFound(DeviceId),
    #[error("device {device} is not available ({state})")]
    DeviceUnavailable { device: DeviceId, state: &'static str },
    #[error("insufficient balance (balance={balance}, required={required})")]
    InsufficientFunds { balance: i64, required: i64 },
    #[error("shove on cooldown ({remaining_ms}ms remaining)")]
    OnCooldown { remaining_ms: u64 },
    #[error("target too far away (distance={distance:.1}, max={max:.1})")]
    OutOfRange { distance: f64, max: f64 },
    #[error("invalid intent: {0}")]
    InvalidIntent(&'static str),
}

impl FloorError {
    /// Stable machine-readable code sent alongside the reason string.
    pub fn code(&self) -> &'static str {
        match self {
            FloorError::PlayerNotFound(_) | FloorError::DeviceNotFound(_) => "NOT_FOUND",
            FloorError::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            FloorError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            FloorError::OnCooldown { .. } => "ON_COOLDOWN",
            FloorError::OutOfRange { .. } => "OUT_OF_RANGE",
            FloorError::InvalidIntent(_) => "INVALID_INTENT",
        }
    }
}
