// ===============================
// src/posttrade.rs
// ===============================
//
// Setelah keputusan: catat event, update inventory untuk offer yang
// di-accept lalu rebalance metal; untuk review, log catatan per reason.
//
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::collaborators::MetalCrafter;
use crate::config::ReviewNotes;
use crate::domain::{Action, Decision, Event, Offer, ReasonKind};
use crate::inventory::Inventory;
use crate::rebalance::{self, MetalBands};

pub struct PostTrade {
    pub inventory: Arc<Inventory>,
    pub bands: MetalBands,
    pub crafter: Arc<dyn MetalCrafter>,
    pub notes: ReviewNotes,
    pub rec_tx: mpsc::Sender<Event>,
}

impl PostTrade {
    fn note(&self, kind: ReasonKind) -> &str {
        match kind {
            ReasonKind::InvalidItems => &self.notes.invalid_items,
            ReasonKind::Overstocked => &self.notes.overstocked,
            ReasonKind::InvalidValue => &self.notes.invalid_value,
            ReasonKind::DupedItems => &self.notes.duped_items,
            ReasonKind::DupeCheckFailed => &self.notes.dupe_check_failed,
        }
    }

    /// Rebalance metal sekali; dipanggil saat startup dan setelah tiap accept.
    pub async fn keep_metal_supply(&self) {
        let counts = self.inventory.denominations();
        let plan = rebalance::plan(counts, &self.bands);
        if plan.is_empty() {
            return;
        }
        info!(?counts, ?plan, "rebalancing metal");
        let _ = self.rec_tx.try_send(Event::Rebalance(plan));
        // hanya craft yang sukses; sisanya dicoba lagi di panggilan berikutnya
        let done = rebalance::execute(&plan, self.crafter.as_ref()).await;
        if done != plan {
            warn!(?plan, ?done, "metal rebalance incomplete");
        }
        if !done.is_empty() {
            self.inventory.apply_counts(done.apply(counts));
        }
    }

    pub async fn handle(&self, offer: &Offer, decision: &Decision) {
        let _ = self.rec_tx.try_send(Event::Decision {
            offer_id: offer.id.clone(),
            partner: offer.partner.clone(),
            decision: decision.clone(),
        });

        match decision.action {
            Action::Accept => {
                info!(offer_id = %offer.id, reason = %decision.reason, "ACCEPT");
                self.inventory.apply_offer(offer);
                self.keep_metal_supply().await;
            }
            Action::Decline => {
                info!(offer_id = %offer.id, reason = %decision.reason, "DECLINE");
            }
            Action::Skip => {
                let kinds = decision.meta.as_ref().map(|m| m.unique_reasons.as_slice()).unwrap_or_default();
                if kinds.is_empty() {
                    warn!(offer_id = %offer.id, "SKIP without reasons");
                }
                for kind in kinds {
                    info!(offer_id = %offer.id, partner = %offer.partner, reason = %kind, note = %self.note(*kind), "REVIEW");
                }
            }
        }
    }
}

pub async fn run(mut rx: mpsc::Receiver<(Offer, Decision)>, post: PostTrade) {
    while let Some((offer, decision)) = rx.recv().await {
        post.handle(&offer, &decision).await;
    }
    info!("posttrade stopped");
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap as HashMap;

    use super::*;
    use crate::collaborators::fakes::FakeCrafter;
    use crate::config::MetalConfig;
    use crate::domain::{ItemInstance, ReasonCode, Sku, WrongReason};
    use crate::inventory::Limit;

    fn post(crafter: Arc<dyn MetalCrafter>, held: HashMap<Sku, i64>) -> (PostTrade, mpsc::Receiver<Event>) {
        let mut limits = HashMap::new();
        limits.insert(Sku::new("200;6"), Limit { min: 0, max: 2 });
        let (rec_tx, rec_rx) = mpsc::channel(16);
        let post = PostTrade {
            inventory: Arc::new(Inventory::new(held, limits)),
            bands: MetalBands::from(&MetalConfig::default()),
            crafter,
            notes: ReviewNotes::default(),
            rec_tx,
        };
        (post, rec_rx)
    }

    fn held(scrap: i64, reclaimed: i64, refined: i64) -> HashMap<Sku, i64> {
        let mut m = HashMap::new();
        m.insert(Sku::new(Sku::SCRAP), scrap);
        m.insert(Sku::new(Sku::RECLAIMED), reclaimed);
        m.insert(Sku::new(Sku::REFINED), refined);
        m
    }

    #[tokio::test]
    async fn accepted_offer_updates_stock_and_rebalances() {
        let crafter = Arc::new(FakeCrafter::default());
        let (post, mut rec_rx) = post(crafter.clone(), held(12, 12, 5));
        let scrap: Vec<ItemInstance> = (0..9).map(|i| ItemInstance::new(format!("s{i}"), Sku::SCRAP)).collect();
        let offer = Offer {
            id: "1".into(),
            partner: "p".into(),
            items_to_give: vec![ItemInstance::new("h", "200;6")],
            items_to_receive: scrap,
            ..Offer::default()
        };

        post.handle(&offer, &Decision::accept(ReasonCode::Valid)).await;

        // 21 scrap > 18 -> one combine
        assert_eq!(*crafter.ops.lock().unwrap(), vec![("combine".to_string(), Sku::SCRAP.to_string(), 1)]);
        let inv = &post.inventory;
        assert_eq!(inv.amount(&Sku::new(Sku::SCRAP)), 18);
        assert_eq!(inv.amount(&Sku::new(Sku::RECLAIMED)), 13);
        assert_eq!(inv.amount(&Sku::new(Sku::REFINED)), 5);

        assert!(matches!(rec_rx.recv().await, Some(Event::Decision { .. })));
        assert!(matches!(rec_rx.recv().await, Some(Event::Rebalance(_))));
    }

    #[tokio::test]
    async fn declines_and_reviews_leave_inventory_alone() {
        let crafter = Arc::new(FakeCrafter::default());
        let (post, _rec_rx) = post(crafter.clone(), held(0, 0, 0));
        let offer = Offer {
            id: "2".into(),
            partner: "p".into(),
            items_to_receive: vec![ItemInstance::new("h", "200;6")],
            ..Offer::default()
        };

        post.handle(&offer, &Decision::decline(ReasonCode::Gift)).await;
        let review = Decision::with_reasons(
            Action::Skip,
            ReasonCode::Review,
            vec![WrongReason::InvalidValue { our: 10, their: 8 }],
        );
        post.handle(&offer, &review).await;

        assert_eq!(post.inventory.amount(&Sku::new("200;6")), 0);
        assert!(crafter.ops.lock().unwrap().is_empty());
        assert_eq!(post.note(ReasonKind::InvalidValue), ReviewNotes::default().invalid_value);
    }

    #[tokio::test]
    async fn startup_rebalance_smelts_refined_when_short() {
        let crafter = Arc::new(FakeCrafter::default());
        let (post, _rec_rx) = post(crafter.clone(), held(9, 0, 10));
        post.keep_metal_supply().await;
        assert_eq!(*crafter.ops.lock().unwrap(), vec![("smelt".to_string(), Sku::REFINED.to_string(), 3)]);
        assert_eq!(post.inventory.amount(&Sku::new(Sku::RECLAIMED)), 9);
        assert_eq!(post.inventory.amount(&Sku::new(Sku::REFINED)), 7);
    }

    #[tokio::test]
    async fn failed_crafts_leave_metal_untouched_and_retry() {
        let crafter = Arc::new(FakeCrafter::failing("combine"));
        let (post, _rec_rx) = post(crafter.clone(), held(30, 12, 0));

        post.keep_metal_supply().await;
        assert_eq!(post.inventory.amount(&Sku::new(Sku::SCRAP)), 30);
        assert_eq!(post.inventory.amount(&Sku::new(Sku::RECLAIMED)), 12);

        // nothing committed, so the next call plans the same combine again
        post.keep_metal_supply().await;
        let ops = crafter.ops.lock().unwrap().clone();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], ops[1]);
        assert_eq!(post.inventory.amount(&Sku::new(Sku::SCRAP)), 30);
    }

    #[tokio::test]
    async fn empty_inventory_creates_no_metal() {
        let crafter = Arc::new(FakeCrafter::default());
        let (post, mut rec_rx) = post(crafter.clone(), held(0, 0, 0));
        post.keep_metal_supply().await;

        assert!(crafter.ops.lock().unwrap().is_empty());
        assert!(rec_rx.try_recv().is_err());
        for sku in [Sku::SCRAP, Sku::RECLAIMED, Sku::REFINED] {
            assert_eq!(post.inventory.amount(&Sku::new(sku)), 0);
        }
    }

    #[tokio::test]
    async fn short_refined_supply_smelts_only_what_is_held() {
        let crafter = Arc::new(FakeCrafter::default());
        let (post, _rec_rx) = post(crafter.clone(), held(9, 0, 1));
        post.keep_metal_supply().await;
        assert_eq!(*crafter.ops.lock().unwrap(), vec![("smelt".to_string(), Sku::REFINED.to_string(), 1)]);
        assert_eq!(post.inventory.amount(&Sku::new(Sku::RECLAIMED)), 3);
        assert_eq!(post.inventory.amount(&Sku::new(Sku::REFINED)), 0);
    }
}
