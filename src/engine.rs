// ===============================
// src/engine.rs (offer decision engine)
// ===============================
//
// Urutan cek (berhenti di klasifikasi terminal pertama):
//  1) klasifikasi item kedua sisi      8) bandingkan value
//  2) admin -> accept                  9) decline cepat (manual review off)
//  3) item non-TF2 -> decline         10) overpay policy
//  4) gift                            11) escrow & ban (error = abort)
//  5) valuation (+ invalid items)     12) dupe check
//  6) stock limit                     13) review / accept
//  7) metal-only / key-only
//
// Kondisi non-fatal (invalid items, overstock, invalid value, dupe) hanya
// dikumpulkan ke daftar reasons; klasifikasi selalu jalan untuk semua item.
//
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use crate::collaborators::{CollaboratorError, DupeChecker, Pricelist, RiskCheck, StockLimits};
use crate::config::EngineConfig;
use crate::currency::{Currency, KeyRate};
use crate::domain::{Action, Decision, Offer, ReasonCode, Sku, WrongReason};
use crate::dupe::{self, DupeOutcome};
use crate::metrics::{COLLAB_ERRORS, EVAL_LATENCY, OFFERS};
use crate::summary::{summarize, ItemsDict, OfferValue};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to check escrow: {0}")]
    Escrow(#[source] CollaboratorError),
    #[error("failed to check banned: {0}")]
    Banned(#[source] CollaboratorError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contains {
    pub items: bool,
    pub metal: bool,
    pub keys: bool,
}

impl Contains {
    fn mark(&mut self, sku: &Sku) {
        if sku.metal_scrap().is_some() {
            self.metal = true;
        } else if sku.is_key() {
            self.keys = true;
        } else {
            self.items = true;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeSide {
    /// Total value in scrap.
    pub value: i64,
    pub keys: i64,
    pub scrap: i64,
    pub contains: Contains,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exchange {
    pub our: ExchangeSide,
    pub their: ExchangeSide,
}

impl Exchange {
    fn side_mut(&mut self, buying: bool) -> &mut ExchangeSide {
        if buying { &mut self.their } else { &mut self.our }
    }

    pub fn contains(&self) -> Contains {
        let (o, t) = (self.our.contains, self.their.contains);
        Contains { items: o.items || t.items, metal: o.metal || t.metal, keys: o.keys || t.keys }
    }
}

/// Asset ids grouped by sku, per side.
#[derive(Debug, Clone, Default)]
pub struct OfferItems {
    pub our: BTreeMap<Sku, Vec<String>>,
    pub their: BTreeMap<Sku, Vec<String>>,
}

impl OfferItems {
    pub fn from_offer(offer: &Offer) -> Self {
        let mut items = OfferItems::default();
        for it in &offer.items_to_give {
            items.our.entry(it.sku.clone()).or_default().push(it.asset_id.clone());
        }
        for it in &offer.items_to_receive {
            items.their.entry(it.sku.clone()).or_default().push(it.asset_id.clone());
        }
        items
    }

    pub fn side(&self, buying: bool) -> &BTreeMap<Sku, Vec<String>> {
        if buying { &self.their } else { &self.our }
    }

    /// received - given per sku (positive = we acquire).
    pub fn diff(&self) -> BTreeMap<Sku, i64> {
        let mut diff = BTreeMap::new();
        for (sku, ids) in &self.their {
            *diff.entry(sku.clone()).or_insert(0) += ids.len() as i64;
        }
        for (sku, ids) in &self.our {
            *diff.entry(sku.clone()).or_insert(0) -= ids.len() as i64;
        }
        diff
    }

    pub fn dict(&self) -> ItemsDict {
        ItemsDict {
            our: self.our.iter().map(|(s, ids)| (s.clone(), ids.len())).collect(),
            their: self.their.iter().map(|(s, ids)| (s.clone(), ids.len())).collect(),
        }
    }
}

pub struct Engine {
    cfg: EngineConfig,
    pricelist: Arc<dyn Pricelist>,
    stock: Arc<dyn StockLimits>,
    risk: Arc<dyn RiskCheck>,
    dupes: Arc<dyn DupeChecker>,
}

impl Engine {
    pub fn new(
        cfg: EngineConfig,
        pricelist: Arc<dyn Pricelist>,
        stock: Arc<dyn StockLimits>,
        risk: Arc<dyn RiskCheck>,
        dupes: Arc<dyn DupeChecker>,
    ) -> Self {
        Self { cfg, pricelist, stock, risk, dupes }
    }

    fn is_gift_message(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.cfg.gift_keywords.iter().any(|k| message.contains(k.as_str()))
    }

    /// `Err` hanya untuk escrow/ban yang gagal dijawab; offer harus dicoba lagi.
    pub async fn evaluate(&self, offer: &Offer) -> Result<Decision, EngineError> {
        let started = Instant::now();
        let res = self.decide(offer).await;
        EVAL_LATENCY.observe(started.elapsed().as_secs_f64() * 1_000.0);
        if let Ok(d) = &res {
            OFFERS.with_label_values(&[d.action.as_str(), d.reason.as_str()]).inc();
        }
        res
    }

    async fn decide(&self, offer: &Offer) -> Result<Decision, EngineError> {
        let (id, partner) = (offer.id.as_str(), offer.partner.as_str());
        info!(offer_id = %id, %partner, "is being processed...");

        // ---- 1) classification ----
        let items = OfferItems::from_offer(offer);
        let dict = items.dict();
        let mut exchange = Exchange::default();
        let mut has_invalid_items = false;
        for buying in [false, true] {
            for sku in items.side(buying).keys() {
                if !sku.is_supported() {
                    has_invalid_items = true;
                }
                exchange.side_mut(buying).contains.mark(sku);
            }
        }

        // ---- 2) admin ----
        if self.cfg.is_admin(partner) {
            info!(offer_id = %id, "is from an admin, accepting. Summary:\n{}", summarize(&dict, None));
            return Ok(Decision::accept(ReasonCode::Admin));
        }

        // ---- 3) non-member items ----
        if has_invalid_items {
            info!(offer_id = %id, "contains items not from TF2, declining...");
            return Ok(Decision::decline(ReasonCode::InvalidItemsNonMember));
        }

        // ---- 4) gift ----
        if offer.items_to_give.is_empty() && self.is_gift_message(&offer.message) {
            info!(offer_id = %id, "is a gift offer, accepting. Summary:\n{}", summarize(&dict, None));
            return Ok(Decision::accept(ReasonCode::Gift));
        } else if offer.items_to_give.is_empty() || offer.items_to_receive.is_empty() {
            info!(offer_id = %id, "is a gift offer, declining...");
            return Ok(Decision::decline(ReasonCode::Gift));
        }

        // ---- 5) + 6) valuation & stock limits ----
        let rate = KeyRate::from_price(&self.pricelist.get_key_price());
        let diff = items.diff();
        let has_items = exchange.contains().items;
        let dupe_floor = self.cfg.minimum_keys_dupe_check * rate.scrap() as f64;

        let mut reasons: Vec<WrongReason> = Vec::new();
        let mut has_overstock = false;
        let mut stock_checked: BTreeSet<Sku> = BTreeSet::new();
        let mut assets_to_check: Vec<String> = Vec::new();

        for buying in [false, true] {
            for (sku, asset_ids) in items.side(buying) {
                let amount = asset_ids.len() as i64;

                if let Some(unit) = sku.metal_scrap() {
                    let side = exchange.side_mut(buying);
                    side.value += unit * amount;
                    side.scrap += unit * amount;
                    continue;
                }

                // key dihitung sebagai mata uang kalau offer juga berisi item lain
                let key_as_currency = sku.is_key() && has_items;
                let entry = self
                    .pricelist
                    .get_price(sku, true)
                    .filter(|e| !key_as_currency && e.intent.allows(buying));

                if let Some(entry) = entry {
                    let price = entry.price(buying);
                    let side = exchange.side_mut(buying);
                    side.value += price.to_value(rate) * amount;
                    side.keys += price.keys * amount;
                    side.scrap += price.to_scrap_units() * amount;

                    if stock_checked.insert(sku.clone()) {
                        let d = diff.get(sku).copied().unwrap_or(0);
                        if d != 0 {
                            let buying_check = d > 0;
                            let can_trade = self.stock.amount_can_trade(sku, buying_check);
                            if d.abs() > can_trade {
                                has_overstock = true;
                                reasons.push(WrongReason::Overstocked {
                                    sku: sku.clone(),
                                    buying: buying_check,
                                    diff: d,
                                    amount_can_trade: can_trade,
                                });
                            }
                        }
                    }

                    let unusual = sku.item().is_some_and(|i| i.has_effect());
                    if buying && unusual && entry.buy.to_value(rate) as f64 > dupe_floor {
                        assets_to_check.extend(asset_ids.iter().cloned());
                    }
                } else if key_as_currency {
                    let side = exchange.side_mut(buying);
                    side.value += rate.scrap() * amount;
                    side.keys += amount;
                } else {
                    reasons.push(WrongReason::InvalidItems { sku: sku.clone(), buying, amount });
                }
            }
        }

        let value = self.offer_value(&exchange, rate);

        // ---- 7) metal-only / key-only ----
        let contains = exchange.contains();
        if contains.metal && !contains.keys && !contains.items {
            info!(offer_id = %id, "only contains metal, declining...");
            return Ok(Decision::decline(ReasonCode::OnlyMetal));
        } else if contains.keys && !contains.items {
            match self.pricelist.get_price(&Sku::key(), true) {
                None => {
                    info!(offer_id = %id, "we are not trading keys, declining...");
                    return Ok(Decision::decline(ReasonCode::NotTradingKeys));
                }
                Some(e) if exchange.our.contains.keys && !e.intent.allows_selling() => {
                    info!(offer_id = %id, "we are not selling keys, declining...");
                    return Ok(Decision::decline(ReasonCode::NotTradingKeys));
                }
                Some(e) if exchange.their.contains.keys && !e.intent.allows_buying() => {
                    info!(offer_id = %id, "we are not buying keys, declining...");
                    return Ok(Decision::decline(ReasonCode::NotTradingKeys));
                }
                Some(_) => {}
            }
        }

        // ---- 8) value ----
        let mut has_invalid_value = false;
        if exchange.our.value > exchange.their.value {
            has_invalid_value = true;
            reasons.push(WrongReason::InvalidValue { our: exchange.our.value, their: exchange.their.value });
        }

        // ---- 9) fail fast ----
        if !self.cfg.manual_review {
            if has_overstock {
                info!(offer_id = %id, "is taking / offering too many, declining...");
                return Ok(Decision::with_reasons(Action::Decline, ReasonCode::Overstocked, reasons));
            }
            if has_invalid_value {
                info!(offer_id = %id, "is not offering enough, declining...");
                return Ok(Decision::with_reasons(Action::Decline, ReasonCode::InvalidValue, reasons));
            }
        }

        // ---- 10) overpay ----
        if exchange.our.value < exchange.their.value && !self.cfg.allow_overpay {
            info!(offer_id = %id, "is offering more than needed, declining...");
            return Ok(Decision::decline(ReasonCode::Overpay));
        }

        // ---- 11) escrow & bans ----
        info!(offer_id = %id, "checking escrow...");
        let has_escrow = self.risk.check_escrow(offer).await.map_err(|e| {
            warn!(offer_id = %id, ?e, "failed to check escrow");
            COLLAB_ERRORS.with_label_values(&["escrow"]).inc();
            EngineError::Escrow(e)
        })?;
        if has_escrow {
            info!(offer_id = %id, "would be held if accepted, declining...");
            return Ok(Decision::decline(ReasonCode::Escrow));
        }

        info!(offer_id = %id, "checking bans...");
        let banned = self.risk.check_banned(partner).await.map_err(|e| {
            warn!(offer_id = %id, ?e, "failed to check banned");
            COLLAB_ERRORS.with_label_values(&["bans"]).inc();
            EngineError::Banned(e)
        })?;
        if banned {
            info!(offer_id = %id, "partner is banned in one or more communities, declining...");
            return Ok(Decision::decline(ReasonCode::Banned));
        }

        // ---- 12) dupes ----
        if self.cfg.dupe_check_enabled && !assets_to_check.is_empty() {
            info!(offer_id = %id, items = assets_to_check.len(), "checking items for dupes...");
            match dupe::check_batch(self.dupes.as_ref(), &assets_to_check, self.cfg.decline_dupes).await {
                DupeOutcome::Decline(duped) => {
                    info!(offer_id = %id, "contains duped items, declining...");
                    return Ok(Decision::with_reasons(Action::Decline, ReasonCode::DupedItems, duped));
                }
                DupeOutcome::Reasons(r) => reasons.extend(r),
            }
        }

        // ---- 13) synthesis ----
        if !reasons.is_empty() {
            let decision = Decision::with_reasons(Action::Skip, ReasonCode::Review, reasons);
            if let Some(meta) = &decision.meta {
                let kinds: Vec<&str> = meta.unique_reasons.iter().map(|k| k.as_str()).collect();
                info!(
                    offer_id = %id,
                    "offer needs review ({}), skipping. Summary:\n{}",
                    kinds.join(", "),
                    summarize(&dict, Some(&value))
                );
            }
            return Ok(decision);
        }

        info!(offer_id = %id, "accepting. Summary:\n{}", summarize(&dict, Some(&value)));
        Ok(Decision::accept(ReasonCode::Valid))
    }

    fn offer_value(&self, exchange: &Exchange, rate: KeyRate) -> OfferValue {
        let display = |side: &ExchangeSide| {
            if self.cfg.show_only_metal {
                Currency::new(0, side.scrap + side.keys * rate.scrap())
            } else {
                Currency::new(side.keys, side.scrap)
            }
        };
        OfferValue {
            our_total: exchange.our.value,
            their_total: exchange.their.value,
            our: display(&exchange.our),
            their: display(&exchange.their),
            rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::fakes::{FakeDupes, FakePricelist, FakeRisk, FakeStock};
    use crate::domain::{Intent, ItemInstance, ReasonKind};

    const KEY_SCRAP: i64 = 450;
    const HAT: &str = "200;6";
    const UNUSUAL: &str = "378;5;u13";

    fn pricelist() -> FakePricelist {
        FakePricelist::with_key_price(KEY_SCRAP)
            .price(HAT, Currency::new(0, 8), Currency::new(0, 10), Intent::Bank)
            .price(UNUSUAL, Currency::new(30, 0), Currency::new(35, 0), Intent::Bank)
            .price(Sku::KEY, Currency::new(0, 445), Currency::new(0, 450), Intent::Bank)
    }

    struct Setup {
        cfg: EngineConfig,
        pricelist: FakePricelist,
        stock: FakeStock,
        risk: FakeRisk,
        dupes: FakeDupes,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                cfg: EngineConfig::default(),
                pricelist: pricelist(),
                stock: FakeStock::unlimited(),
                risk: FakeRisk::default(),
                dupes: FakeDupes::default(),
            }
        }

        fn engine(self) -> Engine {
            Engine::new(
                self.cfg,
                Arc::new(self.pricelist),
                Arc::new(self.stock),
                Arc::new(self.risk),
                Arc::new(self.dupes),
            )
        }
    }

    fn items(skus: &[&str], prefix: &str) -> Vec<ItemInstance> {
        skus.iter().enumerate().map(|(i, s)| ItemInstance::new(format!("{prefix}{i}"), *s)).collect()
    }

    fn offer(give: &[&str], receive: &[&str]) -> Offer {
        Offer {
            id: "4242".into(),
            partner: "76561198000000009".into(),
            message: String::new(),
            items_to_give: items(give, "o"),
            items_to_receive: items(receive, "t"),
        }
    }

    fn kinds(d: &Decision) -> Vec<ReasonKind> {
        d.meta.as_ref().map(|m| m.unique_reasons.clone()).unwrap_or_default()
    }

    #[tokio::test]
    async fn gift_message_with_nothing_given_is_accepted() {
        let mut o = offer(&[], &[HAT]);
        o.message = "Happy birthday GIFT!".into();
        let d = Setup::new().engine().evaluate(&o).await.unwrap();
        assert_eq!(d, Decision::accept(ReasonCode::Gift));
    }

    #[tokio::test]
    async fn one_sided_offer_without_gift_intent_is_declined() {
        let d = Setup::new().engine().evaluate(&offer(&[], &[HAT])).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::Gift));
        let d = Setup::new().engine().evaluate(&offer(&[HAT], &[])).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::Gift));
    }

    #[tokio::test]
    async fn non_member_items_always_decline_even_with_gift_words() {
        let mut o = offer(&[], &["unknown", HAT]);
        o.message = "a gift for you".into();
        let d = Setup::new().engine().evaluate(&o).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::InvalidItemsNonMember));
    }

    #[tokio::test]
    async fn admin_bypass_dominates() {
        let mut s = Setup::new();
        s.cfg.admins = vec!["76561198000000009".into()];
        s.stock = FakeStock::unlimited().limit(HAT, false, 0);
        // would be overstocked and underpaid otherwise; even invalid items are ignored
        let d = s.engine().evaluate(&offer(&[HAT, HAT], &["unknown"])).await.unwrap();
        assert_eq!(d, Decision::accept(ReasonCode::Admin));
    }

    #[tokio::test]
    async fn metal_only_offer_is_declined() {
        let o = offer(&[Sku::SCRAP, Sku::SCRAP, Sku::SCRAP], &[Sku::RECLAIMED]);
        let d = Setup::new().engine().evaluate(&o).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::OnlyMetal));
    }

    #[tokio::test]
    async fn underpaying_declines_without_manual_review() {
        // our hat sells for 10 scrap, they give 8 scrap
        let mut s = Setup::new();
        s.cfg.manual_review = false;
        let theirs = [Sku::SCRAP; 8];
        let d = s.engine().evaluate(&offer(&[HAT], &theirs)).await.unwrap();
        assert_eq!(d.action, Action::Decline);
        assert_eq!(d.reason, ReasonCode::InvalidValue);
        let meta = d.meta.unwrap();
        assert_eq!(meta.reasons, vec![WrongReason::InvalidValue { our: 10, their: 8 }]);
    }

    #[tokio::test]
    async fn underpaying_goes_to_review_with_manual_review() {
        let theirs = [Sku::SCRAP; 8];
        let d = Setup::new().engine().evaluate(&offer(&[HAT], &theirs)).await.unwrap();
        assert_eq!(d.action, Action::Skip);
        assert_eq!(d.reason, ReasonCode::Review);
        assert_eq!(kinds(&d), vec![ReasonKind::InvalidValue]);
    }

    #[tokio::test]
    async fn fair_trade_is_accepted() {
        let d = Setup::new().engine().evaluate(&offer(&[HAT], &[Sku::RECLAIMED; 4])).await.unwrap();
        // 12 scrap for a 10 scrap hat, overpay allowed by default
        assert_eq!(d, Decision::accept(ReasonCode::Valid));
    }

    #[tokio::test]
    async fn overpay_declined_when_disallowed() {
        let mut s = Setup::new();
        s.cfg.allow_overpay = false;
        let d = s.engine().evaluate(&offer(&[HAT], &[Sku::RECLAIMED; 4])).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::Overpay));
    }

    #[tokio::test]
    async fn overstock_is_recorded_and_classification_continues() {
        let mut s = Setup::new();
        s.stock = FakeStock::unlimited().limit(HAT, true, 1);
        // they give 2 hats (buying, capacity 1) plus an unpriced item
        let o = offer(&[Sku::REFINED], &[HAT, HAT, "999;6"]);
        let d = s.engine().evaluate(&o).await.unwrap();
        assert_eq!(d.action, Action::Skip);
        let meta = d.meta.unwrap();
        assert_eq!(meta.unique_reasons, vec![ReasonKind::Overstocked, ReasonKind::InvalidItems]);
        assert!(meta.reasons.contains(&WrongReason::Overstocked {
            sku: Sku::new(HAT),
            buying: true,
            diff: 2,
            amount_can_trade: 1
        }));
    }

    #[tokio::test]
    async fn selling_past_minimum_is_overstock() {
        let mut s = Setup::new();
        s.cfg.manual_review = false;
        s.stock = FakeStock::unlimited().limit(HAT, false, 1);
        let d = s.engine().evaluate(&offer(&[HAT, HAT], &[Sku::REFINED; 3])).await.unwrap();
        assert_eq!(d.reason, ReasonCode::Overstocked);
        let meta = d.meta.unwrap();
        assert_eq!(
            meta.reasons[0],
            WrongReason::Overstocked { sku: Sku::new(HAT), buying: false, diff: -2, amount_can_trade: 1 }
        );
    }

    #[tokio::test]
    async fn intent_mismatch_is_invalid_item() {
        let mut s = Setup::new();
        s.pricelist = pricelist().price(HAT, Currency::new(0, 8), Currency::new(0, 10), Intent::Sell);
        let d = s.engine().evaluate(&offer(&[Sku::REFINED], &[HAT])).await.unwrap();
        assert_eq!(d.action, Action::Skip);
        assert_eq!(kinds(&d), vec![ReasonKind::InvalidItems, ReasonKind::InvalidValue]);
    }

    #[tokio::test]
    async fn keys_priced_as_currency_alongside_items() {
        let mut s = Setup::new();
        // hat worth 1 key + 2 scrap when we sell it
        s.pricelist = pricelist().price(HAT, Currency::new(1, 0), Currency::new(1, 2), Intent::Bank);
        let d = s.engine().evaluate(&offer(&[HAT], &[Sku::KEY, Sku::SCRAP, Sku::SCRAP])).await.unwrap();
        assert_eq!(d, Decision::accept(ReasonCode::Valid));
    }

    #[tokio::test]
    async fn key_only_offer_requires_key_trading() {
        let mut s = Setup::new();
        s.pricelist = FakePricelist::with_key_price(KEY_SCRAP);
        let o = offer(&[Sku::KEY], &[Sku::REFINED; 50]);
        let d = s.engine().evaluate(&o).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::NotTradingKeys));

        let mut s = Setup::new();
        s.pricelist = FakePricelist::with_key_price(KEY_SCRAP).price(
            Sku::KEY,
            Currency::new(0, 445),
            Currency::new(0, 450),
            Intent::Buy,
        );
        let d = s.engine().evaluate(&o).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::NotTradingKeys));
    }

    #[tokio::test]
    async fn key_sale_checks_key_stock() {
        let mut s = Setup::new();
        s.stock = FakeStock::unlimited().limit(Sku::KEY, false, 0);
        let d = s.engine().evaluate(&offer(&[Sku::KEY], &[Sku::REFINED; 50])).await.unwrap();
        assert_eq!(d.action, Action::Skip);
        assert_eq!(kinds(&d), vec![ReasonKind::Overstocked]);
        assert_eq!(d.meta.unwrap().reasons.len(), 1);
    }

    #[tokio::test]
    async fn key_purchase_declined_when_keys_only_sold() {
        let mut s = Setup::new();
        s.pricelist = FakePricelist::with_key_price(KEY_SCRAP).price(
            Sku::KEY,
            Currency::new(0, 445),
            Currency::new(0, 450),
            Intent::Sell,
        );
        let d = s.engine().evaluate(&offer(&[Sku::REFINED; 50], &[Sku::KEY])).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::NotTradingKeys));
    }

    #[tokio::test]
    async fn escrow_and_bans_decline() {
        let mut s = Setup::new();
        s.risk.escrow = true;
        let d = s.engine().evaluate(&offer(&[HAT], &[Sku::REFINED])).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::Escrow));

        let mut s = Setup::new();
        s.risk.banned = true;
        let d = s.engine().evaluate(&offer(&[HAT], &[Sku::REFINED])).await.unwrap();
        assert_eq!(d, Decision::decline(ReasonCode::Banned));
    }

    #[tokio::test]
    async fn risk_collaborator_failure_aborts_evaluation() {
        let mut s = Setup::new();
        s.risk.escrow_fails = true;
        let err = s.engine().evaluate(&offer(&[HAT], &[Sku::REFINED])).await.unwrap_err();
        assert!(matches!(err, EngineError::Escrow(_)));

        let mut s = Setup::new();
        s.risk.ban_fails = true;
        let err = s.engine().evaluate(&offer(&[HAT], &[Sku::REFINED])).await.unwrap_err();
        assert!(matches!(err, EngineError::Banned(_)));
    }

    fn unusual_offer() -> Offer {
        let mut keys = vec![Sku::KEY; 35];
        keys.push(UNUSUAL);
        // they give the unusual + filler, we give keys; key counts as currency here
        offer(&[Sku::REFINED], &keys)
    }

    #[tokio::test]
    async fn indeterminate_dupe_check_forces_review() {
        let mut s = Setup::new();
        s.cfg.dupe_check_enabled = true;
        s.dupes = FakeDupes::default().result("t35", None);
        let d = s.engine().evaluate(&unusual_offer()).await.unwrap();
        assert_eq!(d.action, Action::Skip);
        assert_eq!(d.reason, ReasonCode::Review);
        assert_eq!(kinds(&d), vec![ReasonKind::DupeCheckFailed]);
    }

    #[tokio::test]
    async fn failed_dupe_batch_forces_review() {
        let mut s = Setup::new();
        s.cfg.dupe_check_enabled = true;
        s.dupes = FakeDupes { fail_on: Some("t35".into()), ..FakeDupes::default() };
        let d = s.engine().evaluate(&unusual_offer()).await.unwrap();
        assert_eq!(d.action, Action::Skip);
        assert_eq!(d.reason, ReasonCode::Review);
        assert_eq!(kinds(&d), vec![ReasonKind::DupeCheckFailed]);
        let reasons = d.meta.unwrap().reasons;
        assert!(matches!(&reasons[..], [WrongReason::DupeCheckFailed { asset_id: None, error: Some(_) }]));
    }

    #[tokio::test]
    async fn duped_item_declines_batch() {
        let mut s = Setup::new();
        s.cfg.dupe_check_enabled = true;
        s.dupes = FakeDupes::default().result("t35", Some(true));
        let d = s.engine().evaluate(&unusual_offer()).await.unwrap();
        assert_eq!(d.action, Action::Decline);
        assert_eq!(d.reason, ReasonCode::DupedItems);
    }

    #[tokio::test]
    async fn dupe_check_skipped_below_threshold_or_disabled() {
        let mut s = Setup::new();
        s.cfg.dupe_check_enabled = true;
        s.cfg.minimum_keys_dupe_check = 100.0;
        s.dupes = FakeDupes::default().result("t35", Some(true));
        let d = s.engine().evaluate(&unusual_offer()).await.unwrap();
        assert_eq!(d, Decision::accept(ReasonCode::Valid));

        let mut s = Setup::new();
        s.dupes = FakeDupes::default().result("t35", Some(true));
        let d = s.engine().evaluate(&unusual_offer()).await.unwrap();
        assert_eq!(d, Decision::accept(ReasonCode::Valid));
    }

    #[test]
    fn diff_counts_received_minus_given() {
        let o = offer(&[HAT, Sku::KEY], &[HAT, HAT, Sku::SCRAP]);
        let diff = OfferItems::from_offer(&o).diff();
        assert_eq!(diff[&Sku::new(HAT)], 1);
        assert_eq!(diff[&Sku::key()], -1);
        assert_eq!(diff[&Sku::new(Sku::SCRAP)], 1);
    }
}
