//! Messages exchanged with connected participants.
//!
//! Both directions are JSON objects tagged by `type`, with camelCase fields.

use serde::{Deserialize, Serialize};

use crate::device::{DeviceId, DeviceView};
use crate::payout::SpinResult;
use crate::player::{PlayerId, PlayerView};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Intents arriving from one connection, already attributed to it by the
/// transport.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Intent {
    Customize {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        color: Option<u32>,
    },
    Move {
        x: f64,
        y: f64,
    },
    SpinOrClaim {
        device_id: DeviceId,
    },
    ApproachDevice {
        device_id: DeviceId,
    },
    LeaveDevice {
        device_id: DeviceId,
    },
    Shove {
        target_id: PlayerId,
        direction: Vector,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full world snapshot for a newly customized participant.
    Init {
        player_id: PlayerId,
        player: PlayerView,
        players: Vec<PlayerView>,
        devices: Vec<DeviceView>,
    },
    PlayerJoined {
        player: PlayerView,
    },
    PlayerUpdated {
        player: PlayerView,
    },
    PlayerMoved {
        player_id: PlayerId,
        x: f64,
        y: f64,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    SpinStarted {
        device_id: DeviceId,
        new_balance: i64,
        reveal_in_ms: u64,
    },
    Result {
        device_id: DeviceId,
        result: SpinResult,
        credited: i64,
        new_balance: i64,
        claimed: bool,
    },
    Error {
        device_id: Option<DeviceId>,
        code: String,
        reason: String,
    },
    DeviceStateChanged {
        device: DeviceView,
    },
    BalanceUpdate {
        player_id: PlayerId,
        balance: i64,
    },
    DeviceInUse {
        device_id: DeviceId,
        in_use: bool,
        player_id: Option<PlayerId>,
    },
    PlayerShoved {
        shover_id: PlayerId,
        shoved_id: PlayerId,
        direction: Vector,
        new_shover_balance: i64,
        target_new_x: f64,
        target_new_y: f64,
    },
    ShoveError {
        target_id: PlayerId,
        code: String,
        reason: String,
    },
    DevicesUpdate {
        devices: Vec<DeviceView>,
    },
    DeviceSpinComplete {
        device_id: DeviceId,
        player_id: PlayerId,
        result: SpinResult,
    },
}

/// Delivery primitives provided by the transport.
pub trait Outbox {
    fn unicast(&mut self, to: &PlayerId, event: ServerEvent);

    /// Deliver to every connection, optionally skipping one.
    fn broadcast(&mut self, event: ServerEvent, except: Option<&PlayerId>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_intents() {
        let intent: Intent =
            serde_json::from_str(r#"{"type":"spinOrClaim","deviceId":7}"#).unwrap();
        assert_eq!(intent, Intent::SpinOrClaim { device_id: 7 });

        let intent: Intent = serde_json::from_str(
            r#"{"type":"shove","targetId":"b","direction":{"x":300.0,"y":-10.5}}"#,
        )
        .unwrap();
        assert_eq!(
            intent,
            Intent::Shove {
                target_id: PlayerId::from("b"),
                direction: Vector::new(300.0, -10.5),
            }
        );

        let intent: Intent = serde_json::from_str(r#"{"type":"customize"}"#).unwrap();
        assert_eq!(
            intent,
            Intent::Customize {
                name: None,
                color: None
            }
        );
    }

    #[test]
    fn test_unknown_intent_rejected() {
        assert!(serde_json::from_str::<Intent>(r#"{"type":"teleport","x":1}"#).is_err());
        assert!(serde_json::from_str::<Intent>(r#"{"type":"move","x":1}"#).is_err());
    }

    #[test]
    fn test_encode_events() {
        let event = ServerEvent::PlayerShoved {
            shover_id: PlayerId::from("a"),
            shoved_id: PlayerId::from("b"),
            direction: Vector::new(10.0, 0.0),
            new_shover_balance: 995,
            target_new_x: 103.0,
            target_new_y: 100.0,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "playerShoved");
        assert_eq!(value["shoverId"], "a");
        assert_eq!(value["newShoverBalance"], 995);
        assert_eq!(value["targetNewX"], 103.0);

        let event = ServerEvent::DeviceInUse {
            device_id: 3,
            in_use: false,
            player_id: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "deviceInUse");
        assert_eq!(value["inUse"], false);
    }
}
