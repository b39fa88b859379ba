// ===============================
// src/gateway.rs (mock collaborators)
// ===============================
//
// Pengganti layanan luar untuk dry-run: dupe-check, escrow/ban lookup,
// dan crafting metal. Tiap call di-delay `latency` agar mirip network.
//
use async_trait::async_trait;
use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::collaborators::{CollaboratorError, DupeChecker, MetalCrafter, RiskCheck};
use crate::domain::{Offer, Sku};

#[derive(Debug, Clone)]
pub struct MockGateway {
    latency: Duration,
    /// Peluang dupe-check tidak bisa memastikan (0.0..=1.0).
    indeterminate_rate: f64,
    banned: Vec<String>,
}

impl MockGateway {
    pub fn new(latency: Duration) -> Self {
        Self { latency, indeterminate_rate: 0.05, banned: Vec::new() }
    }

    pub fn with_banned(mut self, partners: Vec<String>) -> Self {
        self.banned = partners;
        self
    }

    pub fn with_indeterminate_rate(mut self, rate: f64) -> Self {
        self.indeterminate_rate = rate.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl DupeChecker for MockGateway {
    async fn is_duped(&self, asset_id: &str) -> Result<Option<bool>, CollaboratorError> {
        sleep(self.latency).await;
        // jangan simpan ThreadRng melewati .await
        let roll: f64 = rand::thread_rng().gen();
        let res = if roll < self.indeterminate_rate { None } else { Some(false) };
        debug!(%asset_id, ?res, "mock dupe check");
        Ok(res)
    }
}

#[async_trait]
impl RiskCheck for MockGateway {
    async fn check_escrow(&self, _offer: &Offer) -> Result<bool, CollaboratorError> {
        sleep(self.latency).await;
        Ok(false)
    }

    async fn check_banned(&self, partner: &str) -> Result<bool, CollaboratorError> {
        sleep(self.latency).await;
        Ok(self.banned.iter().any(|p| p == partner))
    }
}

#[async_trait]
impl MetalCrafter for MockGateway {
    async fn combine(&self, sku: &Sku, times: u32) -> Result<(), CollaboratorError> {
        sleep(self.latency * times).await;
        info!(%sku, times, "combined metal");
        Ok(())
    }

    async fn smelt(&self, sku: &Sku, times: u32) -> Result<(), CollaboratorError> {
        sleep(self.latency * times).await;
        info!(%sku, times, "smelted metal");
        Ok(())
    }
}
