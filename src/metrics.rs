// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Offer handling --------
pub static OFFERS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("offers_total", "offer decisions (labels: action, reason)"),
        &["action", "reason"],
    )
    .unwrap()
});

pub static ENQUEUED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("offers_enqueued_total", "queue entries added (label: status)"),
        &["status"],
    )
    .unwrap()
});

pub static QUEUE_LEN: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("queue_length", "pending offers in queue").unwrap());

pub static QUEUE_FLUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queue_flushes_total", "queue persistence writes (label: result)"),
        &["result"],
    )
    .unwrap()
});

// Latency evaluate() per offer (milliseconds)
pub static EVAL_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "evaluation_latency_ms",
        "Latency of one offer evaluation (ms)",
    ))
    .unwrap()
});

// -------- Collaborators --------
pub static DUPE_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dupe_checks_total", "dupe check results (label: result)"),
        &["result"],
    )
    .unwrap()
});

pub static COLLAB_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("collaborator_errors_total", "failed collaborator calls (label: service)"),
        &["service"],
    )
    .unwrap()
});

// -------- Inventory & metal --------
pub static METAL_OPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("metal_ops_total", "metal combine/smelt operations (labels: op, sku)"),
        &["op", "sku"],
    )
    .unwrap()
});

pub static INV_QTY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("inventory_qty", "held qty per sku"), &["sku"]).unwrap()
});

// ---- Config visibility ----
pub static CONFIG_FLAG: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_flag", "engine toggles (label: flag), value 1 = on"),
        &["flag"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(OFFERS.clone())),
        REGISTRY.register(Box::new(ENQUEUED.clone())),
        REGISTRY.register(Box::new(QUEUE_LEN.clone())),
        REGISTRY.register(Box::new(QUEUE_FLUSHES.clone())),
        REGISTRY.register(Box::new(EVAL_LATENCY.clone())),
        REGISTRY.register(Box::new(DUPE_CHECKS.clone())),
        REGISTRY.register(Box::new(COLLAB_ERRORS.clone())),
        REGISTRY.register(Box::new(METAL_OPS.clone())),
        REGISTRY.register(Box::new(INV_QTY.clone())),
        REGISTRY.register(Box::new(CONFIG_FLAG.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics), tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub async fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(%addr, ?e, "metrics bind failed");
                return;
            }
        };
        tracing::info!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => tracing::warn!(?e, "metrics accept error"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_families() {
        init();
        OFFERS.with_label_values(&["accept", "VALID"]).inc();
        let text = String::from_utf8(encode_metrics()).unwrap();
        assert!(text.contains("offers_total"));
    }
}
