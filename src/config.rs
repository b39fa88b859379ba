// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : offer_bot_rust — autonomous trade-offer handling bot in Rust
Module  : config.rs
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
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;

use crate::currency::Rounding;

/// Command line; everything else comes from the environment / `.env`.
#[derive(Debug, Clone, Parser)]
#[command(name = "offer_bot_rust", version, about = "Trade offer decision bot")]
pub struct Cli {
    /// Load this env file instead of ./.env
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Replay offers from a JSONL file (one Offer per line) instead of the mock feed
    #[arg(long)]
    pub offers: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid { key: &'static str, value: String, reason: &'static str },
}

/// Sumber offer masuk
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedMode {
    Mock,
    Jsonl(PathBuf),
}

#[derive(Clone, Debug)]
pub struct Args {
    pub pricelist_file: PathBuf,
    pub inventory_file: Option<PathBuf>,
    pub queue_file: PathBuf,
    pub queue_debounce: Duration,
    pub record_file: Option<String>,
    pub metrics_port: u16,
    pub feed_mode: FeedMode,
    pub mock_offer_interval: Duration,
    /// Delay simulasi tiap call ke mock gateway.
    pub mock_latency: Duration,
    /// Partner yang dianggap banned oleh mock gateway.
    pub mock_banned: Vec<String>,
    pub mock_dupe_indeterminate_rate: f64,
}

pub const DEFAULT_GIFT_KEYWORDS: &[&str] = &[
    "gift", "donat", "tip", "tribute", "souvenir", "favor", "giveaway", "bonus", "grant",
    "bounty", "present", "contribution", "award", "nice", "happy", "thank", "goo", "awesome",
    "rep", "joy", "cute",
];

/// Semua opsi yang dibaca decision engine, validated sekali di startup.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub admins: Vec<String>,
    pub manual_review: bool,
    pub allow_overpay: bool,
    pub dupe_check_enabled: bool,
    pub minimum_keys_dupe_check: f64,
    pub decline_dupes: bool,
    pub show_only_metal: bool,
    /// Lower-cased; matched as substrings.
    pub gift_keywords: Vec<String>,
    pub key_rate_rounding: Rounding,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            manual_review: true,
            allow_overpay: true,
            dupe_check_enabled: false,
            minimum_keys_dupe_check: 0.0,
            decline_dupes: true,
            show_only_metal: false,
            gift_keywords: DEFAULT_GIFT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            key_rate_rounding: Rounding::Down,
        }
    }
}

impl EngineConfig {
    pub fn is_admin(&self, partner: &str) -> bool {
        self.admins.iter().any(|a| a == partner)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetalConfig {
    pub minimum_scrap: i64,
    pub minimum_reclaimed: i64,
    pub threshold: i64,
}

impl Default for MetalConfig {
    fn default() -> Self {
        Self { minimum_scrap: 9, minimum_reclaimed: 9, threshold: 9 }
    }
}

/// Catatan yang ditempel ke log review per reason kind.
#[derive(Clone, Debug)]
pub struct ReviewNotes {
    pub invalid_items: String,
    pub overstocked: String,
    pub invalid_value: String,
    pub duped_items: String,
    pub dupe_check_failed: String,
}

impl Default for ReviewNotes {
    fn default() -> Self {
        Self {
            invalid_items: "Some item(s) you offered might not be in my pricelist. Please wait for the owner to verify it.".into(),
            overstocked: "Some item(s) you offered might already have reached the max amount I can have. Please wait.".into(),
            invalid_value: "Your offer will be ignored. Please cancel it and make another offer with the correct value.".into(),
            duped_items: "The item(s) you offered appear to be duped. Please wait for my owner to review it.".into(),
            dupe_check_failed: "The item history of your item(s) could not be verified yet. You can try again later.".into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub args: Args,
    pub engine: EngineConfig,
    pub metal: MetalConfig,
    pub notes: ReviewNotes,
}

// ---- env helpers ----

fn env_bool(key: &str, default: bool) -> bool {
    // hanya "true"/"false" literal yang mengubah default; typo tetap default
    match env::var(key).ok().as_deref().map(str::trim) {
        Some("true") => true,
        Some("false") => false,
        _ => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key)
        .ok()
        .map(|s| {
            s.split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
}

fn env_note(key: &str, default: String) -> String {
    env::var(key).ok().filter(|s| !s.trim().is_empty()).unwrap_or(default)
}

pub fn engine_from_env() -> Result<EngineConfig, ConfigError> {
    let defaults = EngineConfig::default();

    let key_rate_rounding = match env::var("KEY_RATE_ROUNDING") {
        Ok(v) => Rounding::parse(&v).ok_or(ConfigError::Invalid {
            key: "KEY_RATE_ROUNDING",
            value: v.clone(),
            reason: "expected down|up|nearest",
        })?,
        Err(_) => defaults.key_rate_rounding,
    };

    let minimum_keys_dupe_check = env_parse("MINIMUM_KEYS_DUPE_CHECK", defaults.minimum_keys_dupe_check);
    if minimum_keys_dupe_check < 0.0 {
        return Err(ConfigError::Invalid {
            key: "MINIMUM_KEYS_DUPE_CHECK",
            value: minimum_keys_dupe_check.to_string(),
            reason: "must not be negative",
        });
    }

    Ok(EngineConfig {
        admins: env_list("ADMINS").unwrap_or_default(),
        manual_review: env_bool("ENABLE_MANUAL_REVIEW", defaults.manual_review),
        allow_overpay: env_bool("ALLOW_OVERPAY", defaults.allow_overpay),
        dupe_check_enabled: env_bool("ENABLE_DUPE_CHECK", defaults.dupe_check_enabled),
        minimum_keys_dupe_check,
        decline_dupes: env_bool("DECLINE_DUPES", defaults.decline_dupes),
        show_only_metal: env_bool("ENABLE_SHOW_ONLY_METAL", defaults.show_only_metal),
        gift_keywords: env_list("GIFT_KEYWORDS")
            .map(|v| v.into_iter().map(|k| k.to_lowercase()).collect())
            .unwrap_or(defaults.gift_keywords),
        key_rate_rounding,
    })
}

pub fn metal_from_env() -> Result<MetalConfig, ConfigError> {
    let d = MetalConfig::default();
    let metal = MetalConfig {
        minimum_scrap: env_parse("MINIMUM_SCRAP", d.minimum_scrap),
        minimum_reclaimed: env_parse("MINIMUM_RECLAIMED", d.minimum_reclaimed),
        threshold: env_parse("METAL_THRESHOLD", d.threshold),
    };
    metal.validate()?;
    Ok(metal)
}

impl MetalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_scrap < 0 || self.minimum_reclaimed < 0 {
            return Err(ConfigError::Invalid {
                key: "MINIMUM_SCRAP/MINIMUM_RECLAIMED",
                value: format!("{}/{}", self.minimum_scrap, self.minimum_reclaimed),
                reason: "must not be negative",
            });
        }
        // band < 2 bisa overshoot keluar band karena pembulatan ceil per 3 unit
        if self.threshold < 2 {
            return Err(ConfigError::Invalid {
                key: "METAL_THRESHOLD",
                value: self.threshold.to_string(),
                reason: "must be at least 2",
            });
        }
        Ok(())
    }
}

pub fn notes_from_env() -> ReviewNotes {
    let d = ReviewNotes::default();
    ReviewNotes {
        invalid_items: env_note("INVALID_ITEMS_NOTE", d.invalid_items),
        overstocked: env_note("OVERSTOCKED_NOTE", d.overstocked),
        invalid_value: env_note("INVALID_VALUE_NOTE", d.invalid_value),
        duped_items: env_note("DUPE_ITEMS_NOTE", d.duped_items),
        dupe_check_failed: env_note("DUPE_CHECK_FAILED_NOTE", d.dupe_check_failed),
    }
}

pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    // Pastikan .env dibaca (agar ADMINS, QUEUE_FILE, dll ter-load)
    let _ = match &cli.env_file {
        Some(path) => dotenvy::from_path(path).map(|_| path.clone()),
        None => dotenv(),
    };

    let feed_mode = match &cli.offers {
        Some(path) => FeedMode::Jsonl(path.clone()),
        None => match env::var("FEED_MODE").unwrap_or_default().to_ascii_lowercase().as_str() {
            "jsonl" => match env::var("OFFERS_FILE") {
                Ok(p) => FeedMode::Jsonl(PathBuf::from(p)),
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        key: "OFFERS_FILE",
                        value: String::new(),
                        reason: "required when FEED_MODE=jsonl",
                    })
                }
            },
            _ => FeedMode::Mock,
        },
    };

    let args = Args {
        pricelist_file: PathBuf::from(
            env::var("PRICELIST_FILE").unwrap_or_else(|_| "files/pricelist.json".to_string()),
        ),
        inventory_file: env::var("INVENTORY_FILE").ok().map(PathBuf::from),
        queue_file: PathBuf::from(env::var("QUEUE_FILE").unwrap_or_else(|_| "temp/queue.json".to_string())),
        queue_debounce: Duration::from_millis(env_parse("QUEUE_DEBOUNCE_MS", 1000)),
        record_file: env::var("RECORD_FILE").ok(),
        metrics_port: env_parse("METRICS_PORT", 9898),
        feed_mode,
        mock_offer_interval: Duration::from_millis(env_parse("MOCK_OFFER_INTERVAL_MS", 2000)),
        mock_latency: Duration::from_millis(env_parse("MOCK_LATENCY_MS", 150)),
        mock_banned: env_list("MOCK_BANNED").unwrap_or_default(),
        mock_dupe_indeterminate_rate: env_parse("MOCK_DUPE_INDETERMINATE_RATE", 0.05),
    };

    Ok(Settings {
        args,
        engine: engine_from_env()?,
        metal: metal_from_env()?,
        notes: notes_from_env(),
    })
}
