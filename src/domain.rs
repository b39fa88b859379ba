// ===============================
// src/domain.rs
// ===============================
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::currency::{Currency, SCRAP_PER_RECLAIMED, SCRAP_PER_REFINED};
use crate::item::Item;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(pub String);

impl Sku {
    pub const SCRAP: &'static str = "5000;6";
    pub const RECLAIMED: &'static str = "5001;6";
    pub const REFINED: &'static str = "5002;6";
    pub const KEY: &'static str = "5021;6";

    pub fn new(s: impl Into<String>) -> Self { Sku(s.into()) }
    pub fn key() -> Self { Sku::new(Self::KEY) }
    pub fn as_str(&self) -> &str { &self.0 }

    /// Scrap value of one unit if this is a metal denomination.
    pub fn metal_scrap(&self) -> Option<i64> {
        match self.0.as_str() {
            Self::SCRAP => Some(1),
            Self::RECLAIMED => Some(SCRAP_PER_RECLAIMED),
            Self::REFINED => Some(SCRAP_PER_REFINED),
            _ => None,
        }
    }

    pub fn is_key(&self) -> bool { self.0 == Self::KEY }

    /// Masuk item universe (SKU TF2 yang bisa di-parse).
    pub fn is_supported(&self) -> bool { Item::from_sku(&self.0).is_some() }

    pub fn item(&self) -> Option<Item> { Item::from_sku(&self.0) }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInstance { pub asset_id: String, pub sku: Sku }

impl ItemInstance {
    pub fn new(asset_id: impl Into<String>, sku: impl Into<String>) -> Self {
        Self { asset_id: asset_id.into(), sku: Sku::new(sku) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub partner: String,
    #[serde(default)]
    pub message: String,
    /// Our side.
    #[serde(default)]
    pub items_to_give: Vec<ItemInstance>,
    /// Their side.
    #[serde(default)]
    pub items_to_receive: Vec<ItemInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent { Buy, Sell, Bank }

impl Intent {
    pub fn allows_buying(&self) -> bool { matches!(self, Intent::Buy | Intent::Bank) }
    pub fn allows_selling(&self) -> bool { matches!(self, Intent::Sell | Intent::Bank) }
    pub fn allows(&self, buying: bool) -> bool {
        if buying { self.allows_buying() } else { self.allows_selling() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub sku: Sku,
    pub buy: Currency,
    pub sell: Currency,
    pub intent: Intent,
}

impl PriceEntry {
    /// Buy price when they give it to us, sell price when we give it away.
    pub fn price(&self, buying: bool) -> Currency {
        if buying { self.buy } else { self.sell }
    }
}

// ---------------- Reasons & decisions ----------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WrongReason {
    Overstocked { sku: Sku, buying: bool, diff: i64, amount_can_trade: i64 },
    InvalidItems { sku: Sku, buying: bool, amount: i64 },
    InvalidValue { our: i64, their: i64 },
    DupeCheckFailed {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        asset_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
    DupedItems { asset_id: String },
}

impl WrongReason {
    pub fn kind(&self) -> ReasonKind {
        match self {
            WrongReason::Overstocked { .. } => ReasonKind::Overstocked,
            WrongReason::InvalidItems { .. } => ReasonKind::InvalidItems,
            WrongReason::InvalidValue { .. } => ReasonKind::InvalidValue,
            WrongReason::DupeCheckFailed { .. } => ReasonKind::DupeCheckFailed,
            WrongReason::DupedItems { .. } => ReasonKind::DupedItems,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonKind { Overstocked, InvalidItems, InvalidValue, DupeCheckFailed, DupedItems }

impl ReasonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonKind::Overstocked => "OVERSTOCKED",
            ReasonKind::InvalidItems => "INVALID_ITEMS",
            ReasonKind::InvalidValue => "INVALID_VALUE",
            ReasonKind::DupeCheckFailed => "DUPE_CHECK_FAILED",
            ReasonKind::DupedItems => "DUPED_ITEMS",
        }
    }
}

impl fmt::Display for ReasonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Unique kinds in first-appearance order.
pub fn unique_kinds(reasons: &[WrongReason]) -> Vec<ReasonKind> {
    let mut out: Vec<ReasonKind> = Vec::new();
    for kind in reasons.iter().map(WrongReason::kind) {
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action { Accept, Decline, Skip }

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self { Action::Accept => "accept", Action::Decline => "decline", Action::Skip => "skip" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Admin,
    InvalidItemsNonMember,
    Gift,
    OnlyMetal,
    NotTradingKeys,
    Overstocked,
    InvalidValue,
    Overpay,
    Escrow,
    Banned,
    DupedItems,
    Review,
    Valid,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Admin => "ADMIN",
            ReasonCode::InvalidItemsNonMember => "INVALID_ITEMS_NON_MEMBER",
            ReasonCode::Gift => "GIFT",
            ReasonCode::OnlyMetal => "ONLY_METAL",
            ReasonCode::NotTradingKeys => "NOT_TRADING_KEYS",
            ReasonCode::Overstocked => "OVERSTOCKED",
            ReasonCode::InvalidValue => "INVALID_VALUE",
            ReasonCode::Overpay => "OVERPAY",
            ReasonCode::Escrow => "ESCROW",
            ReasonCode::Banned => "BANNED",
            ReasonCode::DupedItems => "DUPED_ITEMS",
            ReasonCode::Review => "REVIEW",
            ReasonCode::Valid => "VALID",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionMeta {
    #[serde(rename = "uniqueReasonKinds")]
    pub unique_reasons: Vec<ReasonKind>,
    pub reasons: Vec<WrongReason>,
}

impl DecisionMeta {
    pub fn from_reasons(reasons: Vec<WrongReason>) -> Self {
        Self { unique_reasons: unique_kinds(&reasons), reasons }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    #[serde(rename = "reasonCode")]
    pub reason: ReasonCode,
    #[serde(rename = "metadata", skip_serializing_if = "Option::is_none", default)]
    pub meta: Option<DecisionMeta>,
}

impl Decision {
    pub fn accept(reason: ReasonCode) -> Self { Self { action: Action::Accept, reason, meta: None } }
    pub fn decline(reason: ReasonCode) -> Self { Self { action: Action::Decline, reason, meta: None } }
    pub fn with_reasons(action: Action, reason: ReasonCode, reasons: Vec<WrongReason>) -> Self {
        Self { action, reason, meta: Some(DecisionMeta::from_reasons(reasons)) }
    }
}

// ---------------- Queue ----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus { Queued, Received }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetails {
    pub name: String,
    pub amount: u32,
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub partner: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    pub status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<RequestDetails>,
    /// Epoch seconds.
    pub time: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenominationCounts { pub scrap: i64, pub reclaimed: i64, pub refined: i64 }

// ---------------- Intake ----------------

/// Satu baris dari feed: offer masuk atau permintaan offer dari partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Incoming {
    Offer(Offer),
    Request { partner: String, details: RequestDetails },
}

// ---------------- Recorder events ----------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Offer(Offer),
    Decision { offer_id: String, partner: String, decision: Decision },
    Rebalance(crate::rebalance::RebalancePlan),
    Note(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_kinds_collapses_by_tag() {
        let reasons = vec![
            WrongReason::Overstocked { sku: Sku::new("1;6"), buying: true, diff: 2, amount_can_trade: 1 },
            WrongReason::InvalidValue { our: 10, their: 8 },
            WrongReason::Overstocked { sku: Sku::new("2;6"), buying: false, diff: -3, amount_can_trade: 0 },
        ];
        assert_eq!(unique_kinds(&reasons), vec![ReasonKind::Overstocked, ReasonKind::InvalidValue]);
    }

    #[test]
    fn decision_serializes_reason_codes() {
        let d = Decision::with_reasons(
            Action::Skip,
            ReasonCode::Review,
            vec![WrongReason::DupeCheckFailed { asset_id: Some("77".into()), error: None }],
        );
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["action"], "skip");
        assert_eq!(json["reasonCode"], "REVIEW");
        assert_eq!(json["metadata"]["uniqueReasonKinds"][0], "DUPE_CHECK_FAILED");
        assert_eq!(json["metadata"]["reasons"][0]["reason"], "DUPE_CHECK_FAILED");
        assert_eq!(json["metadata"]["reasons"][0]["asset_id"], "77");

        let plain = serde_json::to_value(Decision::accept(ReasonCode::Valid)).unwrap();
        assert_eq!(plain, serde_json::json!({ "action": "accept", "reasonCode": "VALID" }));
    }

    #[test]
    fn incoming_lines_are_tagged() {
        let line = r#"{"type":"offer","id":"9","partner":"p","items_to_receive":[{"asset_id":"1","sku":"5002;6"}]}"#;
        let Incoming::Offer(o) = serde_json::from_str(line).unwrap() else { panic!("expected offer") };
        assert_eq!(o.items_to_receive[0].sku, Sku::new(Sku::REFINED));
        assert!(o.items_to_give.is_empty());

        let line = r#"{"type":"request","partner":"p","details":{"name":"Earbuds","amount":1,"intent":"buy"}}"#;
        assert!(matches!(serde_json::from_str(line).unwrap(), Incoming::Request { .. }));
    }

    #[test]
    fn intent_directions() {
        assert!(Intent::Bank.allows(true) && Intent::Bank.allows(false));
        assert!(Intent::Buy.allows(true) && !Intent::Buy.allows(false));
        assert!(!Intent::Sell.allows(true) && Intent::Sell.allows(false));
    }

    #[test]
    fn metal_denominations() {
        assert_eq!(Sku::new(Sku::REFINED).metal_scrap(), Some(9));
        assert_eq!(Sku::key().metal_scrap(), None);
        assert!(!Sku::new("unknown").is_supported());
    }
}
