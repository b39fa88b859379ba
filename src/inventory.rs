// ===============================
// src/inventory.rs (stock book & trade limits)
// ===============================
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use ahash::AHashMap as HashMap;
use tracing::{info, warn};

use crate::collaborators::StockLimits;
use crate::domain::{DenominationCounts, Offer, Sku};
use crate::metrics::INV_QTY;
use crate::pricelist::MemoryPricelist;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Default)]
struct StockState {
    held: HashMap<Sku, i64>,
    limits: HashMap<Sku, Limit>,
}

/// Inventory yang dilihat engine. Satu writer (posttrade), dibaca per evaluasi.
#[derive(Debug, Default)]
pub struct Inventory {
    state: RwLock<StockState>,
}

impl Inventory {
    pub fn new(held: HashMap<Sku, i64>, limits: HashMap<Sku, Limit>) -> Self {
        Self { state: RwLock::new(StockState { held, limits }) }
    }

    pub fn with_pricelist(held: HashMap<Sku, i64>, pricelist: &MemoryPricelist) -> Self {
        let limits = pricelist
            .limits()
            .map(|(sku, min, max)| (sku.clone(), Limit { min, max }))
            .collect();
        Self::new(held, limits)
    }

    /// JSON map sku -> jumlah. File tidak ada / rusak -> inventory kosong.
    pub async fn read_counts(path: &Path) -> HashMap<Sku, i64> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(s) => s,
            Err(e) => {
                warn!(?e, path = %path.display(), "inventory file not readable, starting empty");
                return HashMap::new();
            }
        };
        match serde_json::from_str::<std::collections::HashMap<String, i64>>(&raw) {
            Ok(map) => {
                info!(path = %path.display(), skus = map.len(), "inventory loaded");
                map.into_iter().map(|(k, v)| (Sku::new(k), v)).collect()
            }
            Err(e) => {
                warn!(?e, path = %path.display(), "inventory file invalid, starting empty");
                HashMap::new()
            }
        }
    }

    pub fn amount(&self, sku: &Sku) -> i64 {
        let st = self.state.read().unwrap_or_else(PoisonError::into_inner);
        st.held.get(sku).copied().unwrap_or(0)
    }

    pub fn denominations(&self) -> DenominationCounts {
        DenominationCounts {
            scrap: self.amount(&Sku::new(Sku::SCRAP)),
            reclaimed: self.amount(&Sku::new(Sku::RECLAIMED)),
            refined: self.amount(&Sku::new(Sku::REFINED)),
        }
    }

    /// Terima barang mereka, lepas barang kita.
    pub fn apply_offer(&self, offer: &Offer) {
        let mut st = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for it in &offer.items_to_receive {
            *st.held.entry(it.sku.clone()).or_insert(0) += 1;
        }
        for it in &offer.items_to_give {
            let e = st.held.entry(it.sku.clone()).or_insert(0);
            *e = (*e - 1).max(0);
        }
        for it in offer.items_to_receive.iter().chain(offer.items_to_give.iter()) {
            let qty = st.held.get(&it.sku).copied().unwrap_or(0);
            INV_QTY.with_label_values(&[it.sku.as_str()]).set(qty);
        }
    }

    /// Hasil craft metal yang sukses.
    pub fn apply_counts(&self, counts: DenominationCounts) {
        let mut st = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for (sku, qty) in [
            (Sku::SCRAP, counts.scrap),
            (Sku::RECLAIMED, counts.reclaimed),
            (Sku::REFINED, counts.refined),
        ] {
            let qty = qty.max(0);
            st.held.insert(Sku::new(sku), qty);
            INV_QTY.with_label_values(&[sku]).set(qty);
        }
    }
}

impl StockLimits for Inventory {
    fn amount_can_trade(&self, sku: &Sku, buying: bool) -> i64 {
        let st = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(limit) = st.limits.get(sku) else {
            return 0;
        };
        let held = st.held.get(sku).copied().unwrap_or(0);
        let room = if buying { limit.max - held } else { held - limit.min };
        room.max(0)
    }
}
