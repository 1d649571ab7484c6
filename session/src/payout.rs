//! Symbols, device tiers and spin outcome evaluation.
//!
//! A spin draws three symbols independently and uniformly. Payouts are taken
//! from a base table scaled by the device tier:
//!
//! | outcome         | payout                                              |
//! |-----------------|-----------------------------------------------------|
//! | three of a kind | scaled value of the symbol, doubled on a rare bonus |
//! | exactly a pair  | a quarter of the paired symbol's scaled value       |
//! | no match        | nothing                                             |
//!
//! The rare bonus is an independent roll against the tier's bonus chance and
//! only applies to three of a kind.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Divisor applied to the full-match value of the paired symbol.
pub const PARTIAL_MATCH_DIVISOR: f64 = 4.0;
/// Multiplier applied when the rare bonus hits.
pub const RARE_BONUS_MULTIPLIER: i64 = 2;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbol {
    #[serde(rename = "🍒")]
    Cherry,
    #[serde(rename = "🍋")]
    Lemon,
    #[serde(rename = "🔔")]
    Bell,
    #[serde(rename = "⭐")]
    Star,
    #[serde(rename = "💎")]
    Diamond,
    #[serde(rename = "7️⃣")]
    Seven,
}

impl Symbol {
    pub const ALL: [Symbol; 6] = [
        Symbol::Cherry,
        Symbol::Lemon,
        Symbol::Bell,
        Symbol::Star,
        Symbol::Diamond,
        Symbol::Seven,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Cherry => "🍒",
            Symbol::Lemon => "🍋",
            Symbol::Bell => "🔔",
            Symbol::Star => "⭐",
            Symbol::Diamond => "💎",
            Symbol::Seven => "7️⃣",
        }
    }

    /// Unscaled three-of-a-kind payout.
    pub fn base_payout(&self) -> i64 {
        match self {
            Symbol::Cherry => 20,
            Symbol::Lemon => 30,
            Symbol::Bell => 50,
            Symbol::Star => 100,
            Symbol::Diamond => 200,
            Symbol::Seven => 500,
        }
    }

    fn index(&self) -> usize {
        match self {
            Symbol::Cherry => 0,
            Symbol::Lemon => 1,
            Symbol::Bell => 2,
            Symbol::Star => 3,
            Symbol::Diamond => 4,
            Symbol::Seven => 5,
        }
    }

    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Rarity class of a device, fixed at construction.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Basic,
    Premium,
    Gold,
    Diamond,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Basic, Tier::Premium, Tier::Gold, Tier::Diamond];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "Basic",
            Tier::Premium => "Premium",
            Tier::Gold => "Gold",
            Tier::Diamond => "Diamond",
        }
    }

    /// Wager charged per spin.
    pub fn cost(&self) -> i64 {
        match self {
            Tier::Basic => 10,
            Tier::Premium => 25,
            Tier::Gold => 50,
            Tier::Diamond => 100,
        }
    }

    pub fn payout_multiplier(&self) -> f64 {
        match self {
            Tier::Basic => 1.0,
            Tier::Premium => 2.5,
            Tier::Gold => 5.0,
            Tier::Diamond => 10.0,
        }
    }

    pub fn rare_bonus_chance(&self) -> f64 {
        match self {
            Tier::Basic => 0.01,
            Tier::Premium => 0.02,
            Tier::Gold => 0.05,
            Tier::Diamond => 0.10,
        }
    }

    /// Relative draw weight out of 100.
    pub fn weight(&self) -> u32 {
        match self {
            Tier::Basic => 50,
            Tier::Premium => 30,
            Tier::Gold => 15,
            Tier::Diamond => 5,
        }
    }

    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let total: u32 = Self::ALL.iter().map(Tier::weight).sum();
        let mut roll = rng.gen_range(0..total);
        for tier in Self::ALL {
            if roll < tier.weight() {
                return tier;
            }
            roll -= tier.weight();
        }
        Tier::Basic
    }
}

/// Per-device payout table: base table scaled by the tier multiplier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutTable {
    values: [i64; 6],
}

impl PayoutTable {
    pub fn for_tier(tier: Tier) -> Self {
        let mut values = [0; 6];
        for symbol in Symbol::ALL {
            values[symbol.index()] =
                (symbol.base_payout() as f64 * tier.payout_multiplier()).round() as i64;
        }
        Self { values }
    }

    pub fn full_match(&self, symbol: Symbol) -> i64 {
        self.values[symbol.index()]
    }

    pub fn partial_match(&self, symbol: Symbol) -> i64 {
        (self.full_match(symbol) as f64 / PARTIAL_MATCH_DIVISOR).round() as i64
    }
}

/// Outcome of one spin. Fixed when the spin starts; disclosed at reveal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResult {
    pub symbols: [Symbol; 3],
    pub win: bool,
    pub win_amount: i64,
    pub partial: bool,
    pub bonus: bool,
    pub tier: Tier,
    pub cost: i64,
}

/// Score a symbol triple. `bonus_hit` is the outcome of the rare-bonus roll
/// and is ignored unless all three symbols match.
pub fn evaluate(
    symbols: [Symbol; 3],
    tier: Tier,
    table: &PayoutTable,
    bonus_hit: bool,
) -> SpinResult {
    let [a, b, c] = symbols;
    let (win_amount, partial, bonus) = if a == b && b == c {
        let full = table.full_match(a);
        if bonus_hit {
            (full * RARE_BONUS_MULTIPLIER, false, true)
        } else {
            (full, false, false)
        }
    } else if let Some(paired) = paired_symbol(symbols) {
        (table.partial_match(paired), true, false)
    } else {
        (0, false, false)
    };

    SpinResult {
        symbols,
        win: win_amount > 0,
        win_amount,
        partial,
        bonus,
        tier,
        cost: tier.cost(),
    }
}

/// Draw and score a fresh outcome.
pub fn generate_spin_result<R: Rng + ?Sized>(
    rng: &mut R,
    tier: Tier,
    table: &PayoutTable,
) -> SpinResult {
    let symbols = [Symbol::draw(rng), Symbol::draw(rng), Symbol::draw(rng)];
    let full_match = symbols[0] == symbols[1] && symbols[1] == symbols[2];
    let bonus_hit = full_match && rng.gen_bool(tier.rare_bonus_chance());
    evaluate(symbols, tier, table, bonus_hit)
}

fn paired_symbol([a, b, c]: [Symbol; 3]) -> Option<Symbol> {
    if a == b || a == c {
        Some(a)
    } else if b == c {
        Some(b)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_payout_table_scaling() {
        let basic = PayoutTable::for_tier(Tier::Basic);
        assert_eq!(basic.full_match(Symbol::Cherry), 20);
        assert_eq!(basic.full_match(Symbol::Seven), 500);

        let premium = PayoutTable::for_tier(Tier::Premium);
        assert_eq!(premium.full_match(Symbol::Lemon), 75);
        assert_eq!(premium.full_match(Symbol::Bell), 125);

        let diamond = PayoutTable::for_tier(Tier::Diamond);
        assert_eq!(diamond.full_match(Symbol::Seven), 5_000);
    }

    #[test]
    fn test_three_of_a_kind() {
        let table = PayoutTable::for_tier(Tier::Basic);
        let result = evaluate([Symbol::Cherry; 3], Tier::Basic, &table, false);
        assert!(result.win);
        assert!(!result.partial);
        assert_eq!(result.win_amount, 20);
        assert_eq!(result.cost, 10);

        let result = evaluate([Symbol::Cherry; 3], Tier::Basic, &table, true);
        assert!(result.bonus);
        assert_eq!(result.win_amount, 40);
    }

    #[test]
    fn test_partial_match_uses_paired_symbol() {
        let table = PayoutTable::for_tier(Tier::Basic);

        let symbols = [Symbol::Lemon, Symbol::Seven, Symbol::Seven];
        let result = evaluate(symbols, Tier::Basic, &table, true);
        assert!(result.win);
        assert!(result.partial);
        assert!(!result.bonus);
        assert_eq!(result.win_amount, 125);

        let symbols = [Symbol::Bell, Symbol::Star, Symbol::Bell];
        let result = evaluate(symbols, Tier::Basic, &table, false);
        assert_eq!(result.win_amount, 13);
    }

    #[test]
    fn test_no_match_pays_nothing() {
        let table = PayoutTable::for_tier(Tier::Gold);
        let symbols = [Symbol::Cherry, Symbol::Lemon, Symbol::Bell];
        let result = evaluate(symbols, Tier::Gold, &table, true);
        assert!(!result.win);
        assert!(!result.bonus);
        assert_eq!(result.win_amount, 0);
        assert_eq!(result.cost, 50);
    }

    #[test]
    fn test_generated_symbols_come_from_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        let table = PayoutTable::for_tier(Tier::Basic);
        for _ in 0..500 {
            let result = generate_spin_result(&mut rng, Tier::Basic, &table);
            assert_eq!(result.symbols.len(), 3);
            assert!(result.symbols.iter().all(|symbol| Symbol::ALL.contains(symbol)));
            assert_eq!(result.win, result.win_amount > 0);
        }
    }

    #[test]
    fn test_tier_draw_roughly_follows_weights() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0u32; 4];
        for _ in 0..10_000 {
            let idx = Tier::ALL.iter().position(|t| *t == Tier::draw(&mut rng)).unwrap();
            counts[idx] += 1;
        }
        assert!((4_500..5_500).contains(&counts[0]), "basic={}", counts[0]);
        assert!((2_600..3_400).contains(&counts[1]), "premium={}", counts[1]);
        assert!((1_200..1_800).contains(&counts[2]), "gold={}", counts[2]);
        assert!((300..700).contains(&counts[3]), "diamond={}", counts[3]);
    }

    #[test]
    fn test_result_wire_shape() {
        let table = PayoutTable::for_tier(Tier::Basic);
        let result = evaluate([Symbol::Cherry; 3], Tier::Basic, &table, false);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["symbols"][0], "🍒");
        assert_eq!(value["winAmount"], 20);
        assert_eq!(value["tier"], "Basic");
    }
}
