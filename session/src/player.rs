use std::fmt;

use serde::{Deserialize, Serialize};

/// Color used when a participant does not pick one.
pub const DEFAULT_COLOR: u32 = 0x3498db;

/// Opaque connection identifier, stable for the lifetime of a connection.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display attributes chosen on the customization screen. Absent fields keep
/// their current (or default) value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
}

/// Wire form of a player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub name: String,
    pub color: u32,
    pub balance: i64,
}

/// Economic and spatial state of one participant.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub name: String,
    pub color: u32,
    balance: i64,
    last_shove_at: Option<u64>,
}

impl Player {
    pub fn new(id: PlayerId, x: f64, y: f64, customization: Customization, balance: i64) -> Self {
        let name = customization
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_name(&id));
        Self {
            id,
            x,
            y,
            name,
            color: customization.color.unwrap_or(DEFAULT_COLOR),
            balance,
            last_shove_at: None,
        }
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn update_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn update_profile(&mut self, customization: Customization) {
        if let Some(name) = customization.name.filter(|name| !name.is_empty()) {
            self.name = name;
        }
        if let Some(color) = customization.color {
            self.color = color;
        }
    }

    pub fn add_balance(&mut self, amount: i64) {
        self.balance = self.balance.saturating_add(amount);
    }

    /// Debit `amount`, refusing (and leaving the balance untouched) if that
    /// would take the balance below zero.
    pub fn deduct_balance(&mut self, amount: i64) -> bool {
        if !self.can_afford(amount) {
            return false;
        }
        self.balance -= amount;
        true
    }

    pub fn can_afford(&self, amount: i64) -> bool {
        self.balance >= amount
    }

    pub fn can_shove(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        self.shove_cooldown_remaining(now_ms, cooldown_ms) == 0
    }

    /// Milliseconds until the next shove is allowed (zero if allowed now).
    pub fn shove_cooldown_remaining(&self, now_ms: u64, cooldown_ms: u64) -> u64 {
        match self.last_shove_at {
            None => 0,
            Some(at) => cooldown_ms.saturating_sub(now_ms.saturating_sub(at)),
        }
    }

    pub fn mark_shove(&mut self, now_ms: u64) {
        self.last_shove_at = Some(now_ms);
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            name: self.name.clone(),
            color: self.color,
            balance: self.balance,
        }
    }
}

fn default_name(id: &PlayerId) -> String {
    let prefix: String = id.as_str().chars().take(6).collect();
    format!("Player_{prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(PlayerId::from("abcdef123"), 10.0, 20.0, Customization::default(), 1_000)
    }

    #[test]
    fn test_defaults_applied() {
        let player = player();
        assert_eq!(player.name, "Player_abcdef");
        assert_eq!(player.color, DEFAULT_COLOR);
        assert_eq!(player.balance(), 1_000);
    }

    #[test]
    fn test_update_profile_is_partial() {
        let mut player = player();
        player.update_profile(Customization {
            name: Some("Lucky".to_string()),
            color: None,
        });
        assert_eq!(player.name, "Lucky");
        assert_eq!(player.color, DEFAULT_COLOR);

        player.update_profile(Customization {
            name: None,
            color: Some(0xff0000),
        });
        assert_eq!(player.name, "Lucky");
        assert_eq!(player.color, 0xff0000);
    }

    #[test]
    fn test_deduct_respects_floor() {
        let mut player = player();
        assert!(player.deduct_balance(999));
        assert_eq!(player.balance(), 1);
        assert!(!player.deduct_balance(2));
        assert_eq!(player.balance(), 1);
        assert!(player.deduct_balance(1));
        assert_eq!(player.balance(), 0);
        assert!(!player.can_afford(1));
        assert!(player.can_afford(0));
    }

    #[test]
    fn test_shove_cooldown() {
        let mut player = player();
        assert!(player.can_shove(0, 3_000));

        player.mark_shove(10_000);
        assert!(!player.can_shove(10_000, 3_000));
        assert!(!player.can_shove(12_999, 3_000));
        assert_eq!(player.shove_cooldown_remaining(12_000, 3_000), 1_000);
        assert!(player.can_shove(13_000, 3_000));
    }

    #[test]
    fn test_view_serializes_like_wire() {
        let value = serde_json::to_value(player().view()).unwrap();
        assert_eq!(value["id"], "abcdef123");
        assert_eq!(value["balance"], 1_000);
        assert_eq!(value["color"], DEFAULT_COLOR);
    }
}
