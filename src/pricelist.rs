// ===============================
// src/pricelist.rs
// ===============================
//
// Pricelist in-memory, dimuat dari file JSON:
//
// [
//   { "sku": "5021;6", "enabled": true, "intent": "bank",
//     "buy":  { "keys": 0, "metal": 56.66 },
//     "sell": { "keys": 0, "metal": 56.77 }, "min": 0, "max": 50 },
//   ...
// ]
//
use std::path::Path;

use ahash::AHashMap as HashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::collaborators::Pricelist;
use crate::currency::{Currency, Rounding};
use crate::domain::{Intent, PriceEntry, Sku};

#[derive(Debug, Error)]
pub enum PricelistError {
    #[error("read pricelist {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("parse pricelist {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriceJson {
    #[serde(default)]
    pub keys: i64,
    #[serde(default)]
    pub metal: f64,
}

impl PriceJson {
    fn to_currency(self) -> Currency {
        // harga metal di file selalu kelipatan scrap, nearest buang noise float
        Currency::from_metal(self.keys, self.metal, Rounding::Nearest)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryJson {
    pub sku: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub intent: Intent,
    pub buy: PriceJson,
    pub sell: PriceJson,
    #[serde(default)]
    pub min: i64,
    #[serde(default = "default_max")]
    pub max: i64,
}

fn default_true() -> bool { true }
fn default_max() -> i64 { 1 }

#[derive(Debug, Clone)]
pub struct Entry {
    pub price: PriceEntry,
    pub enabled: bool,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Default)]
pub struct MemoryPricelist {
    entries: HashMap<Sku, Entry>,
    key_price: Currency,
}

impl MemoryPricelist {
    /// `key_rounding` hanya untuk harga jual key (key rate), bukan item lain.
    pub fn from_entries(entries: Vec<EntryJson>, key_rounding: Rounding) -> Self {
        let key_price = entries
            .iter()
            .find(|e| e.sku == Sku::KEY)
            .map(|e| Currency::from_metal(e.sell.keys, e.sell.metal, key_rounding))
            .unwrap_or(Currency::ZERO);
        let entries = entries
            .into_iter()
            .map(|e| {
                let sku = Sku::new(e.sku);
                let price = PriceEntry {
                    sku: sku.clone(),
                    buy: e.buy.to_currency(),
                    sell: e.sell.to_currency(),
                    intent: e.intent,
                };
                (sku, Entry { price, enabled: e.enabled, min: e.min, max: e.max })
            })
            .collect();
        Self { entries, key_price }
    }

    pub fn from_json(json: &str, key_rounding: Rounding) -> Result<Self, serde_json::Error> {
        Ok(Self::from_entries(serde_json::from_str(json)?, key_rounding))
    }

    pub async fn load(path: &Path, key_rounding: Rounding) -> Result<Self, PricelistError> {
        let path_str = path.display().to_string();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PricelistError::Io { path: path_str.clone(), source })?;
        let list = Self::from_json(&json, key_rounding).map_err(|source| PricelistError::Parse { path: path_str.clone(), source })?;
        info!(path = %path_str, items = list.len(), "pricelist loaded");
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Stock limits (min, max) per sku, dipakai inventory.
    pub fn limits(&self) -> impl Iterator<Item = (&Sku, i64, i64)> {
        self.entries.iter().map(|(sku, e)| (sku, e.min, e.max))
    }
}

impl Pricelist for MemoryPricelist {
    fn get_price(&self, sku: &Sku, enforce_price_exists: bool) -> Option<PriceEntry> {
        let entry = self.entries.get(sku)?;
        if enforce_price_exists && !entry.enabled {
            return None;
        }
        Some(entry.price.clone())
    }

    fn get_key_price(&self) -> Currency {
        self.key_price
    }
}
