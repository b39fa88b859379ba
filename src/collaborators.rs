// ===============================
// src/collaborators.rs
// ===============================
//
// Port ke layanan luar. Pricing & stock dibaca sinkron (snapshot in-memory);
// escrow/ban/dupe-check bisa suspend, jadi async.
//
use async_trait::async_trait;
use thiserror::Error;

use crate::currency::Currency;
use crate::domain::{Offer, PriceEntry, Sku};

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },
    #[error("{service} request failed: {reason}")]
    Failed { service: &'static str, reason: String },
}

pub trait Pricelist: Send + Sync {
    /// `enforce_price_exists`: disabled entries count as unpriced.
    fn get_price(&self, sku: &Sku, enforce_price_exists: bool) -> Option<PriceEntry>;

    fn get_key_price(&self) -> Currency;
}

pub trait StockLimits: Send + Sync {
    /// Remaining quantity we can still buy (`buying`) or sell. Never negative.
    fn amount_can_trade(&self, sku: &Sku, buying: bool) -> i64;
}

#[async_trait]
pub trait DupeChecker: Send + Sync {
    /// `Ok(None)` = indeterminate, distinct from `Ok(Some(false))`.
    async fn is_duped(&self, asset_id: &str) -> Result<Option<bool>, CollaboratorError>;
}

#[async_trait]
pub trait RiskCheck: Send + Sync {
    async fn check_escrow(&self, offer: &Offer) -> Result<bool, CollaboratorError>;

    async fn check_banned(&self, partner: &str) -> Result<bool, CollaboratorError>;
}

/// Executes metal crafting in the game client.
#[async_trait]
pub trait MetalCrafter: Send + Sync {
    async fn combine(&self, sku: &Sku, times: u32) -> Result<(), CollaboratorError>;

    async fn smelt(&self, sku: &Sku, times: u32) -> Result<(), CollaboratorError>;
}
