// ===============================
// src/queue.rs (pending offer queue)
// ===============================
//
// FIFO antrian offer yang menunggu diproses, persist ke file JSON.
// - Received: offer masuk dari partner, dedup by offer id.
// - Queued  : offer yang di-request partner (belum dikirim), tanpa id.
// - Simpan di-debounce: banyak mutasi beruntun = satu tulis file,
//   `debounce` setelah mutasi terakhir.
//
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{
    sync::{watch, Notify},
    time::{sleep, Duration},
};
use tracing::{debug, info, warn};

use crate::domain::{Offer, QueueEntry, QueueStatus, RequestDetails};
use crate::metrics::{ENQUEUED, QUEUE_FLUSHES, QUEUE_LEN};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// `Ok(None)` kalau belum pernah disimpan.
    async fn read(&self) -> io::Result<Option<String>>;

    async fn write(&self, contents: &str) -> io::Result<()>;
}

/// File JSON, ditulis atomik (temp file + rename).
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn read(&self) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, contents: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

pub struct PendingQueue {
    entries: Mutex<Vec<QueueEntry>>,
    changed: watch::Sender<Vec<QueueEntry>>,
    store: Arc<dyn QueueStore>,
    notify: Notify,
}

impl PendingQueue {
    /// Rehydrate dari store lalu jalankan flusher. Isi rusak -> antrian kosong.
    pub async fn load(store: Arc<dyn QueueStore>, debounce: Duration) -> Self {
        let entries = match store.read().await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<QueueEntry>>(&raw) {
                Ok(entries) => {
                    info!(entries = entries.len(), "queue restored");
                    entries
                }
                Err(e) => {
                    warn!(?e, "queue file invalid, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => {
                info!("no queue file found, starting fresh");
                Vec::new()
            }
            Err(e) => {
                warn!(?e, "queue file not readable, starting empty");
                Vec::new()
            }
        };
        QUEUE_LEN.set(entries.len() as i64);

        let (changed, rx) = watch::channel(entries.clone());
        tokio::spawn(run_flusher(rx, store.clone(), debounce));

        Self { entries: Mutex::new(entries), changed, store, notify: Notify::new() }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<QueueEntry>) -> (R, bool)) -> R {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let (out, dirty) = f(&mut entries);
        if dirty {
            QUEUE_LEN.set(entries.len() as i64);
            // flusher bisa sudah berhenti saat shutdown; abaikan
            let _ = self.changed.send(entries.clone());
        }
        out
    }

    /// `false` kalau offer id sudah ada di antrian.
    pub fn enqueue_received(&self, offer: &Offer) -> bool {
        debug!(offer_id = %offer.id, "adding offer to queue");
        let added = self.mutate(|entries| {
            if entries.iter().any(|e| e.id.as_deref() == Some(offer.id.as_str())) {
                return (false, false);
            }
            entries.push(QueueEntry {
                partner: offer.partner.clone(),
                id: Some(offer.id.clone()),
                status: QueueStatus::Received,
                details: None,
                time: Utc::now().timestamp(),
            });
            (true, true)
        });
        if added {
            ENQUEUED.with_label_values(&["received"]).inc();
            self.notify.notify_one();
        } else {
            warn!(offer_id = %offer.id, "caught an offer that was getting queued, but was already added");
        }
        added
    }

    pub fn enqueue_requested(&self, partner: &str, details: RequestDetails) {
        debug!(%partner, "adding requested offer to queue");
        self.mutate(|entries| {
            entries.push(QueueEntry {
                partner: partner.to_string(),
                id: None,
                status: QueueStatus::Queued,
                details: Some(details),
                time: Utc::now().timestamp(),
            });
            ((), true)
        });
        ENQUEUED.with_label_values(&["queued"]).inc();
        self.notify.notify_one();
    }

    pub fn peek_first(&self) -> Option<QueueEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.first().cloned()
    }

    pub fn remove_first(&self) {
        self.mutate(|entries| {
            if entries.is_empty() {
                return ((), false);
            }
            entries.remove(0);
            ((), true)
        });
    }

    /// Hapus semua entry dengan id ini. Return jumlah yang terhapus.
    pub fn remove_by_id(&self, id: &str) -> usize {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id.as_deref() != Some(id));
            let removed = before - entries.len();
            (removed, removed > 0)
        })
    }

    /// Posisi 1-based dari request (status Queued) pertama milik partner.
    pub fn find_queue_position(&self, partner: &str) -> Option<usize> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .position(|e| e.status == QueueStatus::Queued && e.partner == partner)
            .map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tunggu sampai ada entry baru.
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    /// Tulis sekarang juga, tanpa debounce (dipakai saat shutdown).
    pub async fn flush(&self) -> io::Result<()> {
        let snapshot = self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone();
        write_snapshot(self.store.as_ref(), &snapshot).await
    }
}

async fn write_snapshot(store: &dyn QueueStore, entries: &[QueueEntry]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(entries).map_err(io::Error::other)?;
    match store.write(&json).await {
        Ok(()) => {
            QUEUE_FLUSHES.with_label_values(&["ok"]).inc();
            debug!(entries = entries.len(), "queue saved");
            Ok(())
        }
        Err(e) => {
            QUEUE_FLUSHES.with_label_values(&["error"]).inc();
            Err(e)
        }
    }
}

// Trailing debounce: tiap mutasi me-reset timer; tulis snapshot terakhir.
async fn run_flusher(mut rx: watch::Receiver<Vec<QueueEntry>>, store: Arc<dyn QueueStore>, debounce: Duration) {
    while rx.changed().await.is_ok() {
        let mut closed = false;
        loop {
            tokio::select! {
                _ = sleep(debounce) => break,
                res = rx.changed() => {
                    if res.is_err() {
                        closed = true;
                        break;
                    }
                }
            }
        }
        let snapshot = rx.borrow_and_update().clone();
        if let Err(e) = write_snapshot(store.as_ref(), &snapshot).await {
            warn!(?e, "error writing queue data");
        }
        if closed {
            break;
        }
    }
    debug!("queue flusher stopped");
}
