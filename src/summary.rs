// ===============================
// src/summary.rs
// ===============================
//
// Ringkasan offer untuk log accept/review:
//   Asked: 1 key, 2.11 ref (5021;6, 5002;6 x2)
//   Offered: ...
//   Profit from overpay: 0.11 ref
//
use std::collections::BTreeMap;

use serde::Serialize;

use crate::currency::{Currency, KeyRate};
use crate::domain::Sku;

/// sku -> count per side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemsDict {
    pub our: BTreeMap<Sku, usize>,
    pub their: BTreeMap<Sku, usize>,
}

/// Value snapshot of one evaluation (scrap totals + display currencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OfferValue {
    pub our_total: i64,
    pub their_total: i64,
    pub our: Currency,
    pub their: Currency,
    pub rate: KeyRate,
}

fn summarize_items(dict: &BTreeMap<Sku, usize>) -> String {
    if dict.is_empty() {
        return "nothing".to_string();
    }
    dict.iter()
        .map(|(sku, n)| if *n > 1 { format!("{sku} x{n}") } else { sku.to_string() })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn summarize(dict: &ItemsDict, value: Option<&OfferValue>) -> String {
    let Some(v) = value else {
        return format!("Asked: {}\nOffered: {}", summarize_items(&dict.our), summarize_items(&dict.their));
    };
    let mut out = format!(
        "Asked: {} ({})\nOffered: {} ({})",
        v.our,
        summarize_items(&dict.our),
        v.their,
        summarize_items(&dict.their)
    );
    let diff = v.their_total - v.our_total;
    let amount = Currency::from_value(diff.abs(), v.rate);
    if diff > 0 {
        out.push_str(&format!("\nProfit from overpay: {amount}"));
    } else if diff < 0 {
        out.push_str(&format!("\nLoss from underpay: {amount}"));
    }
    out
}
