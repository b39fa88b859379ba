// ===============================
// src/rebalance.rs
// ===============================
//
// Jaga supply metal: hitung berapa kali combine / smelt supaya scrap dan
// reclaimed kembali ke band [min, min + threshold]. Pure function, eksekusi
// craft didelegasikan ke MetalCrafter.
//
// Urutan: scrap dulu (hasil combine/smelt scrap menggeser jumlah reclaimed),
// lalu reclaimed (yang hanya menggeser refined, tidak dibatasi band).
//
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::MetalCrafter;
use crate::config::MetalConfig;
use crate::domain::{DenominationCounts, Sku};
use crate::metrics::METAL_OPS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetalBands {
    pub scrap: Band,
    pub reclaimed: Band,
}

impl From<&MetalConfig> for MetalBands {
    fn from(cfg: &MetalConfig) -> Self {
        Self {
            scrap: Band { min: cfg.minimum_scrap, max: cfg.minimum_scrap + cfg.threshold },
            reclaimed: Band { min: cfg.minimum_reclaimed, max: cfg.minimum_reclaimed + cfg.threshold },
        }
    }
}

/// Operation counts; execution order is the field order (combine before smelt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub combine_scrap: u32,
    pub combine_reclaimed: u32,
    pub smelt_refined: u32,
    pub smelt_reclaimed: u32,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        *self == RebalancePlan::default()
    }

    /// Counts after performing every operation in the plan.
    pub fn apply(&self, counts: DenominationCounts) -> DenominationCounts {
        let (cs, cr) = (self.combine_scrap as i64, self.combine_reclaimed as i64);
        let (sf, sr) = (self.smelt_refined as i64, self.smelt_reclaimed as i64);
        DenominationCounts {
            scrap: counts.scrap - 3 * cs + 3 * sr,
            reclaimed: counts.reclaimed + cs - 3 * cr + 3 * sf - sr,
            refined: counts.refined + cr - sf,
        }
    }
}

fn ceil_div3(n: i64) -> u32 {
    ((n + 2) / 3) as u32
}

pub fn plan(counts: DenominationCounts, bands: &MetalBands) -> RebalancePlan {
    let mut p = RebalancePlan::default();
    let scrap = counts.scrap;
    let mut reclaimed = counts.reclaimed;

    if scrap > bands.scrap.max {
        p.combine_scrap = ceil_div3(scrap - bands.scrap.max);
        reclaimed += p.combine_scrap as i64;
    } else if scrap < bands.scrap.min {
        p.smelt_reclaimed = ceil_div3(bands.scrap.min - scrap);
        reclaimed -= p.smelt_reclaimed as i64;
    }

    if reclaimed > bands.reclaimed.max {
        p.combine_reclaimed = ceil_div3(reclaimed - bands.reclaimed.max);
    } else if reclaimed < bands.reclaimed.min {
        // hanya refined yang benar-benar ada
        p.smelt_refined = ceil_div3(bands.reclaimed.min - reclaimed).min(counts.refined.max(0) as u32);
        reclaimed += 3 * p.smelt_refined as i64;
    }

    // reclaimed tidak boleh minus: kurangi smelt reclaimed sebesar kekurangannya
    if reclaimed < 0 {
        p.smelt_reclaimed -= (-reclaimed) as u32;
    }
    p
}

/// Jalankan plan lewat crafter, urut field. Craft gagal menghentikan sisa
/// plan (langkah berikutnya bisa butuh hasilnya). Return bagian yang sukses.
pub async fn execute(plan: &RebalancePlan, crafter: &dyn MetalCrafter) -> RebalancePlan {
    let mut done = RebalancePlan::default();
    let steps: [(&str, &str, u32, &mut u32); 4] = [
        ("combine", Sku::SCRAP, plan.combine_scrap, &mut done.combine_scrap),
        ("combine", Sku::RECLAIMED, plan.combine_reclaimed, &mut done.combine_reclaimed),
        ("smelt", Sku::REFINED, plan.smelt_refined, &mut done.smelt_refined),
        ("smelt", Sku::RECLAIMED, plan.smelt_reclaimed, &mut done.smelt_reclaimed),
    ];
    for (op, sku, times, done_times) in steps {
        if times == 0 {
            continue;
        }
        let sku = Sku::new(sku);
        let res = if op == "combine" {
            crafter.combine(&sku, times).await
        } else {
            crafter.smelt(&sku, times).await
        };
        match res {
            Ok(()) => {
                METAL_OPS.with_label_values(&[op, sku.as_str()]).inc_by(times as u64);
                info!(op, sku = %sku, times, "metal craft");
                *done_times = times;
            }
            Err(e) => {
                warn!(?e, op, sku = %sku, times, "metal craft failed, dropping rest of plan");
                break;
            }
        }
    }
    done
}
