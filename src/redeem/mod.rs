//! Redemption reconciler
//!
//! Scans wallet positions for settled conditions and redeems the funder's
//! holdings through the execution venue. Also keeps the observer's account
//! snapshot fresh.

mod data_api;
mod reconciler;

pub use data_api::{ClosedPosition, DataApiClient, WalletPosition, CLOSED_POSITIONS_LIMIT};
pub use reconciler::{
    collect_candidates, normalize_condition_id, RedeemCandidate, RedemptionReconciler, ScanReport,
};

use crate::observer::{AccountSnapshot, Observer};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Source of wallet positions per owner address
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn positions(&self, owner: &str) -> anyhow::Result<Vec<WalletPosition>>;

    /// Closed positions, newest first
    async fn closed_positions(&self, _owner: &str) -> anyhow::Result<Vec<ClosedPosition>> {
        Ok(Vec::new())
    }
}

/// Rebuild the observer's account snapshot for `owner`
///
/// A failed open-positions fetch keeps the previous snapshot. A failed
/// closed-positions fetch keeps the previous closed list.
pub async fn refresh_account(source: &dyn PositionSource, owner: &str, observer: &Observer) {
    let open = match source.positions(owner).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::debug!(owner, error = %e, "Account refresh failed");
            return;
        }
    };
    let closed = match source.closed_positions(owner).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::debug!(owner, error = %e, "Closed positions refresh failed");
            observer
                .account()
                .filter(|a| a.owner == owner)
                .map(|a| a.closed)
                .unwrap_or_default()
        }
    };
    observer.set_account(AccountSnapshot::build(owner, open, closed, Utc::now()));
}

/// Periodic account refresh, independent of redemption
pub async fn run_account_sync(
    source: Arc<dyn PositionSource>,
    owner: String,
    observer: Arc<Observer>,
    interval: Duration,
    token: CancellationToken,
) {
    while !token.is_cancelled() {
        refresh_account(source.as_ref(), &owner, &observer).await;

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
