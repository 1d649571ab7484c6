use std::fmt;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use slotfloor_session::ServerEvent;

/// Floor activity counters, exported in the Prometheus text format.
pub struct Metrics {
    registry: Registry,
    pub spins_started: Counter,
    pub results_claimed: Counter,
    pub reveals_completed: Counter,
    pub shoves: Counter,
    pub rejected_intents: Counter,
    pub connected_players: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("floor");
        let spins_started = Counter::default();
        let results_claimed = Counter::default();
        let reveals_completed = Counter::default();
        let shoves = Counter::default();
        let rejected_intents = Counter::default();
        let connected_players = Gauge::default();

        registry.register(
            "spins_started",
            "Spins charged and started.",
            spins_started.clone(),
        );
        registry.register(
            "results_claimed",
            "Revealed results collected by their spinner.",
            results_claimed.clone(),
        );
        registry.register(
            "reveals_completed",
            "Spins whose result was revealed.",
            reveals_completed.clone(),
        );
        registry.register("shoves", "Successful shoves.", shoves.clone());
        registry.register(
            "rejected_intents",
            "Intents answered with an error.",
            rejected_intents.clone(),
        );
        registry.register(
            "connected_players",
            "Open WebSocket connections.",
            connected_players.clone(),
        );

        Self {
            registry,
            spins_started,
            results_claimed,
            reveals_completed,
            shoves,
            rejected_intents,
            connected_players,
        }
    }

    /// Count an outbound event. Call once per event, not once per recipient.
    pub fn observe(&self, event: &ServerEvent) {
        match event {
            ServerEvent::SpinStarted { .. } => {
                self.spins_started.inc();
            }
            ServerEvent::Result { claimed: true, .. } => {
                self.results_claimed.inc();
            }
            ServerEvent::DeviceSpinComplete { .. } => {
                self.reveals_completed.inc();
            }
            ServerEvent::PlayerShoved { .. } => {
                self.shoves.inc();
            }
            ServerEvent::Error { .. } | ServerEvent::ShoveError { .. } => {
                self.rejected_intents.inc();
            }
            _ => {}
        }
    }

    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotfloor_session::PlayerId;

    #[test]
    fn test_observe_counts_by_kind() {
        let metrics = Metrics::new();
        metrics.observe(&ServerEvent::SpinStarted {
            device_id: 1,
            new_balance: 990,
            reveal_in_ms: 5_000,
        });
        metrics.observe(&ServerEvent::ShoveError {
            target_id: PlayerId::from("b"),
            code: "ON_COOLDOWN".to_string(),
            reason: "shove on cooldown".to_string(),
        });
        metrics.observe(&ServerEvent::PlayerLeft {
            player_id: PlayerId::from("b"),
        });
        assert_eq!(metrics.spins_started.get(), 1);
        assert_eq!(metrics.rejected_intents.get(), 1);
        assert_eq!(metrics.shoves.get(), 0);
    }

    #[test]
    fn test_encode_exposes_prefixed_names() {
        let metrics = Metrics::new();
        metrics.connected_players.set(3);
        let text = metrics.encode().unwrap();
        assert!(text.contains("floor_spins_started_total 0"));
        assert!(text.contains("floor_connected_players 3"));
        assert!(text.ends_with("# EOF\n"));
    }
}
