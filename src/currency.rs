// ===============================
// src/currency.rs
// ===============================
//
// Currency model: keys + metal. Metal selalu disimpan sebagai scrap (integer),
// jadi konversi metal exact. Konversi key <-> metal pakai KeyRate yang dibangun
// ulang setiap evaluasi (rate pasar bisa berubah antar offer).
//
//   1 refined = 3 reclaimed = 9 scrap
//
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

pub const SCRAP_PER_RECLAIMED: i64 = 3;
pub const SCRAP_PER_REFINED: i64 = 9;

/// Arah pembulatan saat metal float (refined) dikonversi ke scrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    #[default]
    Down,
    Up,
    Nearest,
}

impl Rounding {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "down" | "floor" => Some(Rounding::Down),
            "up" | "ceil" => Some(Rounding::Up),
            "nearest" | "round" => Some(Rounding::Nearest),
            _ => None,
        }
    }
}

/// Refined (mis. 1.33) -> scrap. Noise float dibuang dulu agar 56.77 * 9
/// tidak jadi 510.92999.
pub fn refined_to_scrap(refined: f64, rounding: Rounding) -> i64 {
    let raw = refined * SCRAP_PER_REFINED as f64;
    let cleaned = (raw * 1_000_000.0).round() / 1_000_000.0;
    match rounding {
        Rounding::Down => cleaned.floor() as i64,
        Rounding::Up => cleaned.ceil() as i64,
        Rounding::Nearest => cleaned.round() as i64,
    }
}

/// Scrap -> refined, truncated to two decimals (4 scrap = 0.44 ref).
pub fn scrap_to_refined(scrap: i64) -> f64 {
    let refined = scrap as f64 / SCRAP_PER_REFINED as f64;
    (refined * 100.0 + 1e-9 * refined.signum()).trunc() / 100.0
}

/// Harga key dalam scrap, snapshot untuk satu evaluasi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRate {
    scrap_per_key: i64,
}

impl KeyRate {
    pub fn from_scrap(scrap_per_key: i64) -> Self {
        Self { scrap_per_key }
    }

    /// Key price as quoted by the pricelist (metal part only is meaningful).
    pub fn from_price(price: &Currency) -> Self {
        Self { scrap_per_key: price.scrap }
    }

    pub fn scrap(&self) -> i64 {
        self.scrap_per_key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Currency {
    pub keys: i64,
    /// Metal portion in scrap.
    pub scrap: i64,
}

impl Currency {
    pub const ZERO: Currency = Currency { keys: 0, scrap: 0 };

    pub fn new(keys: i64, scrap: i64) -> Self {
        Self { keys, scrap }
    }

    pub fn from_metal(keys: i64, refined: f64, rounding: Rounding) -> Self {
        Self { keys, scrap: refined_to_scrap(refined, rounding) }
    }

    pub fn to_scrap_units(&self) -> i64 {
        self.scrap
    }

    /// Total value in scrap at the given key rate.
    pub fn to_value(&self, rate: KeyRate) -> i64 {
        self.keys * rate.scrap() + self.scrap
    }

    /// Greedy: keys sebanyak mungkin, sisanya metal.
    pub fn from_value(value: i64, rate: KeyRate) -> Self {
        if rate.scrap() <= 0 {
            return Self { keys: 0, scrap: value };
        }
        let keys = value.div_euclid(rate.scrap());
        Self { keys, scrap: value - keys * rate.scrap() }
    }
}

impl Add for Currency {
    type Output = Currency;
    fn add(self, rhs: Currency) -> Currency {
        Currency { keys: self.keys + rhs.keys, scrap: self.scrap + rhs.scrap }
    }
}

impl Sub for Currency {
    type Output = Currency;
    fn sub(self, rhs: Currency) -> Currency {
        Currency { keys: self.keys - rhs.keys, scrap: self.scrap - rhs.scrap }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = match self.keys {
            1 => "1 key".to_string(),
            n => format!("{n} keys"),
        };
        let metal = format!("{} ref", scrap_to_refined(self.scrap));
        match (self.keys != 0, self.scrap != 0) {
            (true, true) => write!(f, "{keys}, {metal}"),
            (true, false) => write!(f, "{keys}"),
            _ => write!(f, "{metal}"),
        }
    }
}
