// ===============================
// src/feed.rs
// ===============================
//
// Sumber offer masuk:
// - run_mock  : generator offer acak (dry-run tanpa Steam)
// - run_jsonl : replay file JSONL, satu `Incoming` per baris;
//               file belum ada -> retry dengan backoff
//
use rand::{seq::SliceRandom, Rng};
use std::path::PathBuf;
use std::time::Duration;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    time::sleep,
};
use tracing::{error, info, warn};

use crate::domain::{Incoming, ItemInstance, Offer, RequestDetails, Sku, Intent};

const MOCK_PARTNERS: &[&str] = &["76561198000000001", "76561198000000002", "76561198000000003"];
const MOCK_ITEMS: &[&str] = &["200;6", "378;5;u13", "5021;6", "30469;6", "unknown"];
const MOCK_MESSAGES: &[&str] = &["", "", "thanks!", "here is a gift"];

/// Exponential backoff + jitter: 0.5s, 1s, 2s, ... max 32s (+0..250ms).
pub fn backoff_delay(attempt: u32) -> Duration {
    let shift = attempt.min(6);                  // 0..=6
    let factor = 1u64 << shift;                  // 1,2,4,...,64
    let base_ms = 500u64.saturating_mul(factor); // 0.5s..32s
    let jitter = rand::thread_rng().gen_range(0..=250);
    Duration::from_millis(base_ms + jitter)
}

fn random_side(rng: &mut impl Rng, max_items: usize, with_metal: bool) -> Vec<Sku> {
    let mut skus = Vec::new();
    for _ in 0..rng.gen_range(0..=max_items) {
        if let Some(s) = MOCK_ITEMS.choose(rng) {
            skus.push(Sku::new(*s));
        }
    }
    if with_metal {
        for _ in 0..rng.gen_range(0..=6) {
            let metal = [Sku::SCRAP, Sku::RECLAIMED, Sku::REFINED];
            if let Some(s) = metal.choose(rng) {
                skus.push(Sku::new(*s));
            }
        }
    }
    skus
}

pub fn mock_offer(seq: u64) -> Offer {
    let mut rng = rand::thread_rng();
    let ours = random_side(&mut rng, 1, false);
    let theirs = random_side(&mut rng, 2, true);
    let instances = |side: &str, skus: Vec<Sku>| -> Vec<ItemInstance> {
        skus.into_iter()
            .enumerate()
            .map(|(i, sku)| ItemInstance { asset_id: format!("{seq}-{side}-{i}"), sku })
            .collect()
    };
    Offer {
        id: format!("mock-{seq}"),
        partner: MOCK_PARTNERS.choose(&mut rng).copied().unwrap_or_default().to_string(),
        message: MOCK_MESSAGES.choose(&mut rng).copied().unwrap_or_default().to_string(),
        items_to_give: instances("0", ours),
        items_to_receive: instances("1", theirs),
    }
}

/// Generator offer mock; sesekali juga request dari partner.
pub async fn run_mock(tx: mpsc::Sender<Incoming>, every: Duration) {
    let mut seq: u64 = 0;
    loop {
        seq += 1;
        // jangan simpan ThreadRng melewati .await
        let request = rand::thread_rng().gen_bool(0.1);
        let incoming = if request {
            Incoming::Request {
                partner: MOCK_PARTNERS[seq as usize % MOCK_PARTNERS.len()].to_string(),
                details: RequestDetails { name: "Mann Co. Supply Crate Key".into(), amount: 1, intent: Intent::Buy },
            }
        } else {
            Incoming::Offer(mock_offer(seq))
        };
        if tx.send(incoming).await.is_err() {
            info!("intake closed, mock feed stopped");
            return;
        }
        sleep(every).await;
    }
}

/// Replay JSONL. Baris rusak di-skip (warn), EOF = selesai.
pub async fn run_jsonl(tx: mpsc::Sender<Incoming>, path: PathBuf) {
    let mut attempt: u32 = 0;
    let file = loop {
        match tokio::fs::File::open(&path).await {
            Ok(f) => break f,
            Err(e) => {
                error!(?e, path = %path.display(), "open offers file failed");
                attempt = attempt.saturating_add(1);
                sleep(backoff_delay(attempt)).await;
            }
        }
    };
    info!(path = %path.display(), "replaying offers");

    let mut lines = BufReader::new(file).lines();
    let mut n: u64 = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                error!(?e, "read offers file failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Incoming>(&line) {
            Ok(incoming) => {
                if tx.send(incoming).await.is_err() {
                    return;
                }
                n += 1;
            }
            Err(e) => warn!(?e, %line, "skip invalid offer line"),
        }
    }
    info!(lines = n, "offers file replayed");
}
