// ===============================
// src/worker.rs (intake + serial offer worker)
// ===============================
//
// intake : Incoming dari feed -> offer book + pending queue
// run    : ambil head queue satu per satu, evaluate, kirim ke posttrade.
//          Evaluasi gagal (escrow/ban error) -> entry tetap di head,
//          retry dengan exponential backoff.
//
use std::sync::{Arc, Mutex, PoisonError};

use ahash::AHashMap as HashMap;
use tokio::{
    select,
    sync::mpsc,
    time::{sleep, Duration},
};
use tracing::{debug, info, warn};

use crate::domain::{Decision, Event, Incoming, Offer, QueueStatus};
use crate::engine::Engine;
use crate::feed::backoff_delay;
use crate::queue::PendingQueue;

/// Offer lengkap yang sedang antri; queue hanya simpan id.
#[derive(Debug, Default)]
pub struct OfferBook {
    offers: Mutex<HashMap<String, Offer>>,
}

impl OfferBook {
    pub fn insert(&self, offer: Offer) {
        let mut m = self.offers.lock().unwrap_or_else(PoisonError::into_inner);
        m.insert(offer.id.clone(), offer);
    }

    pub fn get(&self, id: &str) -> Option<Offer> {
        let m = self.offers.lock().unwrap_or_else(PoisonError::into_inner);
        m.get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Offer> {
        let mut m = self.offers.lock().unwrap_or_else(PoisonError::into_inner);
        m.remove(id)
    }
}

pub async fn run_intake(
    mut rx: mpsc::Receiver<Incoming>,
    queue: Arc<PendingQueue>,
    book: Arc<OfferBook>,
    rec_tx: mpsc::Sender<Event>,
) {
    while let Some(incoming) = rx.recv().await {
        match incoming {
            Incoming::Offer(offer) => {
                let _ = rec_tx.try_send(Event::Offer(offer.clone()));
                let id = offer.id.clone();
                book.insert(offer.clone());
                if !queue.enqueue_received(&offer) {
                    debug!(offer_id = %id, "offer already queued");
                }
            }
            Incoming::Request { partner, details } => {
                let name = details.name.clone();
                queue.enqueue_requested(&partner, details);
                if let Some(pos) = queue.find_queue_position(&partner) {
                    info!(%partner, item = %name, position = pos, "offer request queued");
                }
            }
        }
    }
    info!("intake closed");
}

pub async fn run(
    queue: Arc<PendingQueue>,
    book: Arc<OfferBook>,
    engine: Arc<Engine>,
    out_tx: mpsc::Sender<(Offer, Decision)>,
) {
    let mut attempt: u32 = 0;
    loop {
        let Some(entry) = queue.peek_first() else {
            // notify bisa terlewat kalau entry dipulihkan dari file; cek ulang tiap detik
            select! {
                _ = queue.notified() => {},
                _ = sleep(Duration::from_secs(1)) => {},
            }
            continue;
        };

        match (entry.status, entry.id.as_deref()) {
            (QueueStatus::Queued, _) | (QueueStatus::Received, None) => {
                if let Some(d) = &entry.details {
                    info!(partner = %entry.partner, item = %d.name, amount = d.amount, intent = ?d.intent,
                        "requested offer handled, removing from queue");
                }
                queue.remove_first();
            }
            (QueueStatus::Received, Some(id)) => {
                let Some(offer) = book.get(id) else {
                    warn!(offer_id = %id, "offer no longer available, removing from queue");
                    queue.remove_by_id(id);
                    continue;
                };

                match engine.evaluate(&offer).await {
                    Ok(decision) => {
                        attempt = 0;
                        queue.remove_by_id(id);
                        book.remove(id);
                        if out_tx.send((offer, decision)).await.is_err() {
                            warn!("posttrade closed, worker stopped");
                            return;
                        }
                    }
                    Err(e) => {
                        attempt = attempt.saturating_add(1);
                        let delay = backoff_delay(attempt);
                        warn!(offer_id = %id, error = %e, attempt, ?delay, "evaluation failed, will retry");
                        sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::collaborators::fakes::{FakeDupes, FakePricelist, FakeStock};
    use crate::collaborators::{CollaboratorError, RiskCheck};
    use crate::config::EngineConfig;
    use crate::domain::{Action, Intent, ItemInstance, ReasonCode, RequestDetails};
    use crate::queue::QueueStore;

    struct NullStore;

    #[async_trait]
    impl QueueStore for NullStore {
        async fn read(&self) -> std::io::Result<Option<String>> {
            Ok(None)
        }
        async fn write(&self, _contents: &str) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Escrow lookup gagal `failures` kali dulu.
    struct FlakyRisk {
        failures: AtomicU32,
    }

    #[async_trait]
    impl RiskCheck for FlakyRisk {
        async fn check_escrow(&self, _offer: &Offer) -> Result<bool, CollaboratorError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(CollaboratorError::Unavailable { service: "escrow", reason: "timeout".into() });
            }
            Ok(false)
        }
        async fn check_banned(&self, _partner: &str) -> Result<bool, CollaboratorError> {
            Ok(false)
        }
    }

    fn engine(failures: u32) -> Arc<Engine> {
        let pricelist = FakePricelist::with_key_price(450).price(
            "200;6",
            crate::currency::Currency::new(0, 8),
            crate::currency::Currency::new(0, 10),
            Intent::Bank,
        );
        Arc::new(Engine::new(
            EngineConfig::default(),
            Arc::new(pricelist),
            Arc::new(FakeStock::unlimited()),
            Arc::new(FlakyRisk { failures: AtomicU32::new(failures) }),
            Arc::new(FakeDupes::default()),
        ))
    }

    fn offer(id: &str) -> Offer {
        Offer {
            id: id.into(),
            partner: "p".into(),
            items_to_give: vec![ItemInstance::new(format!("{id}a"), "200;6")],
            items_to_receive: vec![ItemInstance::new(format!("{id}b"), "5002;6")],
            ..Offer::default()
        }
    }

    async fn setup(failures: u32) -> (mpsc::Sender<Incoming>, mpsc::Receiver<(Offer, Decision)>, Arc<PendingQueue>) {
        let queue = Arc::new(PendingQueue::load(Arc::new(NullStore), Duration::from_secs(1)).await);
        let book = Arc::new(OfferBook::default());
        let (in_tx, in_rx) = mpsc::channel(16);
        let (rec_tx, _rec_rx) = mpsc::channel(16);
        let (out_tx, out_rx) = mpsc::channel(16);
        tokio::spawn(run_intake(in_rx, queue.clone(), book.clone(), rec_tx));
        tokio::spawn(run(queue.clone(), book, engine(failures), out_tx));
        (in_tx, out_rx, queue)
    }

    #[tokio::test]
    async fn offers_are_decided_in_arrival_order() {
        let (in_tx, mut out_rx, queue) = setup(0).await;
        in_tx.send(Incoming::Offer(offer("1"))).await.unwrap();
        in_tx
            .send(Incoming::Request {
                partner: "q".into(),
                details: RequestDetails { name: "Earbuds".into(), amount: 1, intent: Intent::Buy },
            })
            .await
            .unwrap();
        in_tx.send(Incoming::Offer(offer("2"))).await.unwrap();

        let (o1, d1) = out_rx.recv().await.unwrap();
        let (o2, _) = out_rx.recv().await.unwrap();
        assert_eq!((o1.id.as_str(), o2.id.as_str()), ("1", "2"));
        // 9 scrap for a 10 scrap hat -> review
        assert_eq!(d1.action, Action::Skip);
        assert_eq!(d1.reason, ReasonCode::Review);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_evaluation_is_retried() {
        let (in_tx, mut out_rx, queue) = setup(2).await;
        in_tx.send(Incoming::Offer(offer("7"))).await.unwrap();
        let (o, _) = out_rx.recv().await.unwrap();
        assert_eq!(o.id, "7");
        assert!(queue.is_empty());
    }
}
