// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/offer_bot_rust

 # replay offer dari file, bukan mock feed
 cargo run -- --offers files/offers.jsonl

 # konfigurasi yang aktif & keputusan per reason
curl -s localhost:9898/metrics | grep '^config_flag'
curl -s localhost:9898/metrics | grep '^offers_total'

*/
/*
=============================================================================
Project : offer_bot_rust — autonomous trade-offer handling bot in Rust
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Queues incoming trade offers, classifies & values both sides,
          enforces stock limits, runs escrow/ban/dupe checks, emits
          accept/decline/review decisions, keeps the metal supply balanced,
          exposes Prometheus metrics, and records JSONL events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod collaborators;
mod config;
mod currency;
mod domain;
mod dupe;
mod engine;
mod feed;
mod gateway;          // mock escrow/ban/dupe/crafting (simulated latency)
mod inventory;
mod item;
mod metrics;
mod posttrade;
mod pricelist;
mod queue;
mod rebalance;
mod recorder;
mod summary;
mod worker;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::{select, sync::mpsc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::domain::{Event, Incoming};

#[tokio::main]
async fn main() -> ExitCode {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Load config ----
    let cli = config::Cli::parse();
    let settings = match config::load(&cli) {
        Ok(s) => s,
        Err(e) => {
            error!(%e, "config error");
            return ExitCode::FAILURE;
        }
    };
    let args = settings.args.clone();

    // ---- Metrics ----
    metrics::init();
    tokio::spawn(metrics::serve_metrics(args.metrics_port));

    // ---- Human-friendly startup info + export config to metrics ----
    let feed_mode_str = match &args.feed_mode {
        config::FeedMode::Mock => "mock",
        config::FeedMode::Jsonl(_) => "jsonl",
    };
    let eng = &settings.engine;
    info!(
        feed_mode = %feed_mode_str,
        admins = eng.admins.len(),
        manual_review = eng.manual_review,
        allow_overpay = eng.allow_overpay,
        dupe_check = eng.dupe_check_enabled,
        minimum_keys_dupe_check = eng.minimum_keys_dupe_check,
        key_rate_rounding = ?eng.key_rate_rounding,
        metal = ?settings.metal,
        queue_file = %args.queue_file.display(),
        "startup config"
    );
    for (flag, on) in [
        ("manual_review", eng.manual_review),
        ("allow_overpay", eng.allow_overpay),
        ("dupe_check", eng.dupe_check_enabled),
        ("decline_dupes", eng.decline_dupes),
        ("show_only_metal", eng.show_only_metal),
    ] {
        metrics::CONFIG_FLAG.with_label_values(&[flag]).set(on as i64);
    }

    // ---- Pricelist & inventory ----
    let pricelist = match pricelist::MemoryPricelist::load(&args.pricelist_file, eng.key_rate_rounding).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, "pricelist error");
            return ExitCode::FAILURE;
        }
    };
    let held = match &args.inventory_file {
        Some(path) => inventory::Inventory::read_counts(path).await,
        None => Default::default(),
    };
    let inventory = Arc::new(inventory::Inventory::with_pricelist(held, &pricelist));
    let pricelist = Arc::new(pricelist);

    // ---- Recorder (optional) ----
    let (rec_tx, rec_rx) = mpsc::channel::<Event>(8192);
    if let Some(path) = args.record_file.clone() {
        tokio::spawn(recorder::run(rec_rx, path));
    }
    let _ = rec_tx.try_send(Event::Note(format!("startup feed_mode={feed_mode_str}")));

    // ---- Collaborators (mock) ----
    let gateway = Arc::new(
        gateway::MockGateway::new(args.mock_latency)
            .with_banned(args.mock_banned.clone())
            .with_indeterminate_rate(args.mock_dupe_indeterminate_rate),
    );

    // ---- Post-trade + startup metal rebalance ----
    let post = posttrade::PostTrade {
        inventory: inventory.clone(),
        bands: rebalance::MetalBands::from(&settings.metal),
        crafter: gateway.clone(),
        notes: settings.notes.clone(),
        rec_tx: rec_tx.clone(),
    };
    post.keep_metal_supply().await;

    // ---- Queue ----
    let store = Arc::new(queue::FileQueueStore::new(args.queue_file.clone()));
    let queue = Arc::new(queue::PendingQueue::load(store, args.queue_debounce).await);
    let book = Arc::new(worker::OfferBook::default());

    // ---- Buses ----
    let (in_tx, in_rx) = mpsc::channel::<Incoming>(1024);
    let (dec_tx, dec_rx) = mpsc::channel::<(domain::Offer, domain::Decision)>(1024);

    // ---- FEED ----
    match args.feed_mode.clone() {
        config::FeedMode::Mock => {
            tokio::spawn(feed::run_mock(in_tx, args.mock_offer_interval));
        }
        config::FeedMode::Jsonl(path) => {
            tokio::spawn(feed::run_jsonl(in_tx, path));
        }
    };

    // ---- Engine + worker ----
    let engine = Arc::new(engine::Engine::new(
        settings.engine.clone(),
        pricelist,
        inventory,
        gateway.clone(),
        gateway,
    ));
    tokio::spawn(worker::run_intake(in_rx, queue.clone(), book.clone(), rec_tx.clone()));
    tokio::spawn(worker::run(queue.clone(), book, engine, dec_tx));

    // ---- Post-Trade ----
    tokio::spawn(posttrade::run(dec_rx, post));

    // ---- Heartbeat ----
    loop {
        select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested, saving queue");
                if let Err(e) = queue.flush().await {
                    error!(?e, "error writing queue data");
                }
                return ExitCode::SUCCESS;
            },
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                info!(queue = queue.len(), "heartbeat");
            }
        }
    }
}
