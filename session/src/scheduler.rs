//! Delayed reveal delivery.
//!
//! A device hands the scheduler a [`RevealTicket`] when a spin starts. After the
//! delay the ticket is delivered back to whoever owns the registry, which then
//! calls [`SessionRegistry::complete_reveal`](crate::SessionRegistry::complete_reveal).
//! The returned [`RevealHandle`] cancels delivery; tickets also carry the spin
//! cycle so a delivery that races a cancel is recognised as stale.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::device::DeviceId;

/// Identifies one spin of one device.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct RevealTicket {
    pub device_id: DeviceId,
    pub cycle: u64,
}

/// Cancels a scheduled reveal. Dropping the handle does not cancel.
pub struct RevealHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl RevealHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for RevealHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

pub trait RevealScheduler: Send + Sync {
    fn schedule(&self, ticket: RevealTicket, delay: Duration) -> RevealHandle;
}

/// Schedules each reveal as a tokio task that posts the ticket into a channel.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    sender: mpsc::UnboundedSender<RevealTicket>,
}

impl TokioScheduler {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RevealTicket>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl RevealScheduler for TokioScheduler {
    fn schedule(&self, ticket: RevealTicket, delay: Duration) -> RevealHandle {
        let sender = self.sender.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(ticket).is_err() {
                tracing::debug!(device = ticket.device_id, "reveal receiver dropped");
            }
        });
        RevealHandle::new(move || task.abort())
    }
}
