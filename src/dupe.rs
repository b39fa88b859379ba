// ===============================
// src/dupe.rs
// ===============================
//
// Dupe-check fan-out: satu request per asset id, jalan bersamaan, tunggu
// semuanya baru agregasi. Gagal satu request = batch gagal -> satu
// DupeCheckFailed{error}; tidak pernah membatalkan evaluasi.
//
use futures_util::future::try_join_all;
use tracing::{debug, warn};

use crate::collaborators::DupeChecker;
use crate::domain::WrongReason;
use crate::metrics::DUPE_CHECKS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DupeOutcome {
    /// Reasons to fold into the review list (may be empty).
    Reasons(Vec<WrongReason>),
    /// Duped items found and policy says decline.
    Decline(Vec<WrongReason>),
}

pub async fn check_batch(checker: &dyn DupeChecker, asset_ids: &[String], decline_dupes: bool) -> DupeOutcome {
    let requests = asset_ids.iter().map(|asset_id| async move {
        debug!(%asset_id, "dupe checking");
        let res = checker.is_duped(asset_id).await;
        debug!(%asset_id, ?res, "dupe check done");
        res
    });

    let results = match try_join_all(requests).await {
        Ok(r) => r,
        Err(e) => {
            warn!(?e, "failed dupe check");
            DUPE_CHECKS.with_label_values(&["error"]).inc();
            return DupeOutcome::Reasons(vec![WrongReason::DupeCheckFailed {
                asset_id: None,
                error: Some(e.to_string()),
            }]);
        }
    };
    debug!(?results, "got result from dupe checks");

    // urut per asset
    let mut reasons = Vec::new();
    for (asset_id, result) in asset_ids.iter().zip(results) {
        match result {
            Some(true) => {
                DUPE_CHECKS.with_label_values(&["duped"]).inc();
                reasons.push(WrongReason::DupedItems { asset_id: asset_id.clone() });
            }
            Some(false) => DUPE_CHECKS.with_label_values(&["clean"]).inc(),
            None => {
                DUPE_CHECKS.with_label_values(&["indeterminate"]).inc();
                reasons.push(WrongReason::DupeCheckFailed { asset_id: Some(asset_id.clone()), error: None });
            }
        }
    }

    if decline_dupes && reasons.iter().any(|r| matches!(r, WrongReason::DupedItems { .. })) {
        reasons.retain(|r| matches!(r, WrongReason::DupedItems { .. }));
        return DupeOutcome::Decline(reasons);
    }
    DupeOutcome::Reasons(reasons)
}
