//! Single task that owns the session registry.
//!
//! Connections never touch the registry directly. They post [`Command`]s through
//! a [`Mailbox`]; reveal timers post [`RevealTicket`]s through the scheduler's
//! channel. The actor applies both in arrival order, one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use slotfloor_session::{
    FloorConfig, Intent, MonotonicClock, Outbox, PlayerId, RevealTicket, ServerEvent,
    SessionRegistry, TokioScheduler,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;

pub enum Command {
    Connect {
        id: PlayerId,
        sender: mpsc::Sender<ServerEvent>,
    },
    Intent {
        id: PlayerId,
        intent: Intent,
    },
    Disconnect {
        id: PlayerId,
    },
}

/// Handle for posting commands to the actor.
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::UnboundedSender<Command>,
}

impl Mailbox {
    pub fn connect(&self, id: PlayerId, sender: mpsc::Sender<ServerEvent>) {
        if self.sender.send(Command::Connect { id, sender }).is_err() {
            warn!("floor mailbox closed; connect dropped");
        }
    }

    pub fn intent(&self, id: PlayerId, intent: Intent) {
        if self.sender.send(Command::Intent { id, intent }).is_err() {
            warn!("floor mailbox closed; intent dropped");
        }
    }

    pub fn disconnect(&self, id: PlayerId) {
        if self.sender.send(Command::Disconnect { id }).is_err() {
            warn!("floor mailbox closed; disconnect dropped");
        }
    }
}

/// Per-connection outbound queues. Slow readers lose events rather than stall
/// the floor.
struct Connections {
    senders: HashMap<PlayerId, mpsc::Sender<ServerEvent>>,
    metrics: Arc<Metrics>,
}

impl Connections {
    fn deliver(&self, to: &PlayerId, sender: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(player = %to, "outbound queue full; event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(player = %to, "outbound queue closed");
            }
        }
    }
}

impl Outbox for Connections {
    fn unicast(&mut self, to: &PlayerId, event: ServerEvent) {
        self.metrics.observe(&event);
        if let Some(sender) = self.senders.get(to) {
            self.deliver(to, sender, event);
        }
    }

    fn broadcast(&mut self, event: ServerEvent, except: Option<&PlayerId>) {
        self.metrics.observe(&event);
        for (id, sender) in &self.senders {
            if except == Some(id) {
                continue;
            }
            self.deliver(id, sender, event.clone());
        }
    }
}

pub struct Actor {
    registry: SessionRegistry,
    connections: Connections,
    commands: mpsc::UnboundedReceiver<Command>,
    reveals: mpsc::UnboundedReceiver<RevealTicket>,
}

impl Actor {
    /// Build the floor. Must be called within a tokio runtime.
    pub fn new(config: FloorConfig, metrics: Arc<Metrics>) -> (Self, Mailbox) {
        let (scheduler, reveals) = TokioScheduler::channel();
        let registry = SessionRegistry::new(
            config,
            Arc::new(MonotonicClock::new()),
            Arc::new(scheduler),
        );
        let (sender, commands) = mpsc::unbounded_channel();
        let actor = Self {
            registry,
            connections: Connections {
                senders: HashMap::new(),
                metrics,
            },
            commands,
            reveals,
        };
        (actor, Mailbox { sender })
    }

    /// Run until every [`Mailbox`] has been dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!("floor mailbox closed; stopping");
                        return;
                    };
                    self.handle_command(command);
                }
                Some(ticket) = self.reveals.recv() => {
                    self.registry.handle_reveal(ticket, &mut self.connections);
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { id, sender } => {
                debug!(player = %id, "connection opened");
                self.connections.senders.insert(id, sender);
                self.update_gauge();
            }
            Command::Intent { id, intent } => {
                if !self.connections.senders.contains_key(&id) {
                    debug!(player = %id, "intent from closed connection ignored");
                    return;
                }
                // Rejections are already reported to the sender.
                let _ = self
                    .registry
                    .handle_intent(&id, intent, &mut self.connections);
            }
            Command::Disconnect { id } => {
                self.connections.senders.remove(&id);
                self.update_gauge();
                self.registry.handle_disconnect(&id, &mut self.connections);
                debug!(player = %id, "connection closed");
            }
        }
    }

    fn update_gauge(&self) {
        self.connections
            .metrics
            .connected_players
            .set(self.connections.senders.len() as i64);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn next(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event should arrive")
            .expect("queue open")
    }

    fn spawn(config: FloorConfig) -> (Mailbox, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let (actor, mailbox) = Actor::new(config, metrics.clone());
        tokio::spawn(actor.run());
        (mailbox, metrics)
    }

    #[tokio::test]
    async fn test_spin_reveal_and_claim() {
        let (mailbox, metrics) = spawn(FloorConfig {
            reveal_delay_ms: 20,
            seed: Some(1),
            ..FloorConfig::default()
        });
        let id = PlayerId::from("alice");
        let (tx, mut rx) = mpsc::channel(64);
        mailbox.connect(id.clone(), tx);
        mailbox.intent(
            id.clone(),
            Intent::Customize {
                name: None,
                color: None,
            },
        );
        assert!(matches!(next(&mut rx).await, ServerEvent::Init { .. }));

        mailbox.intent(id.clone(), Intent::SpinOrClaim { device_id: 0 });
        assert!(matches!(next(&mut rx).await, ServerEvent::SpinStarted { device_id: 0, .. }));
        assert!(matches!(next(&mut rx).await, ServerEvent::DeviceStateChanged { .. }));
        assert!(matches!(
            next(&mut rx).await,
            ServerEvent::DeviceSpinComplete { device_id: 0, .. }
        ));

        mailbox.intent(id.clone(), Intent::SpinOrClaim { device_id: 0 });
        assert!(matches!(
            next(&mut rx).await,
            ServerEvent::Result { claimed: true, .. }
        ));
        assert_eq!(metrics.spins_started.get(), 1);
        assert_eq!(metrics.reveals_completed.get(), 1);
        assert_eq!(metrics.results_claimed.get(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_is_broadcast() {
        let (mailbox, metrics) = spawn(FloorConfig::default());
        let alice = PlayerId::from("alice");
        let bob = PlayerId::from("bob");
        let (alice_tx, mut alice_rx) = mpsc::channel(64);
        let (bob_tx, mut bob_rx) = mpsc::channel(64);
        mailbox.connect(alice.clone(), alice_tx);
        mailbox.connect(bob.clone(), bob_tx);
        for id in [&alice, &bob] {
            mailbox.intent(
                id.clone(),
                Intent::Customize {
                    name: None,
                    color: None,
                },
            );
        }
        assert!(matches!(next(&mut alice_rx).await, ServerEvent::Init { .. }));
        assert!(matches!(next(&mut alice_rx).await, ServerEvent::PlayerJoined { .. }));
        assert!(matches!(next(&mut bob_rx).await, ServerEvent::Init { .. }));

        mailbox.disconnect(bob.clone());
        assert_eq!(
            next(&mut alice_rx).await,
            ServerEvent::PlayerLeft { player_id: bob }
        );
        assert!(matches!(next(&mut alice_rx).await, ServerEvent::DevicesUpdate { .. }));
        assert_eq!(metrics.connected_players.get(), 1);
    }
}
