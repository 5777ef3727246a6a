//! Settlement redemption loop

use super::{refresh_account, PositionSource, WalletPosition};
use crate::config::RedeemConfig;
use crate::execution::{ExecutionVenue, RedeemReceipt, VenueError};
use crate::observer::Observer;
use crate::state::{EventStatus, RedeemEvent, RedeemOutcome, StateStore, TradeEvent};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric, TRADE_TARGET};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A settled condition held by `owner`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemCandidate {
    pub owner: String,
    pub condition_id: String,
}

/// `0x` + 64 lowercase hex digits, or `None`
pub fn normalize_condition_id(raw: &str) -> Option<String> {
    let s = raw.trim().to_ascii_lowercase();
    let hex = s.strip_prefix("0x").unwrap_or(&s);
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{hex}"))
}

/// Pending candidates across all owners, and the condition ids the funder can claim
pub fn collect_candidates(
    scans: &[(String, Vec<WalletPosition>)],
    funder: &str,
) -> (Vec<RedeemCandidate>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut pending = Vec::new();
    let mut claimable: Vec<String> = Vec::new();

    for (owner, rows) in scans {
        let owner_key = owner.to_ascii_lowercase();
        for row in rows {
            if row.size <= rust_decimal::Decimal::ZERO || !row.is_settled() {
                continue;
            }
            let Some(cid) = row.condition_id.as_deref().and_then(normalize_condition_id) else {
                continue;
            };
            if !seen.insert(format!("{owner_key}|{cid}")) {
                continue;
            }
            if owner_key == funder.to_ascii_lowercase() && !claimable.contains(&cid) {
                claimable.push(cid.clone());
            }
            pending.push(RedeemCandidate {
                owner: owner.clone(),
                condition_id: cid,
            });
        }
    }

    (pending, claimable)
}

/// What one scan saw and did
#[derive(Debug, Default)]
pub struct ScanReport {
    pub pending: usize,
    pub claimable: usize,
    pub attempts: Vec<RedeemOutcome>,
}

/// Finds settled positions and redeems the funder's through the venue
pub struct RedemptionReconciler {
    source: Arc<dyn PositionSource>,
    venue: Arc<dyn ExecutionVenue>,
    store: Arc<StateStore>,
    observer: Arc<Observer>,
    config: RedeemConfig,
    funder: String,
    scan_addresses: Vec<String>,
    last_attempt: HashMap<String, DateTime<Utc>>,
    pending_signature: String,
    pending_logged_at: Option<DateTime<Utc>>,
}

impl RedemptionReconciler {
    pub fn new(
        source: Arc<dyn PositionSource>,
        venue: Arc<dyn ExecutionVenue>,
        store: Arc<StateStore>,
        observer: Arc<Observer>,
        config: RedeemConfig,
        funder: impl Into<String>,
    ) -> Self {
        let funder = funder.into();
        Self {
            source,
            venue,
            store,
            observer,
            config,
            scan_addresses: vec![funder.clone()],
            funder,
            last_attempt: HashMap::new(),
            pending_signature: String::new(),
            pending_logged_at: None,
        }
    }

    /// Also report settled positions of `address` (never redeemed)
    pub fn watch(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        if !self.scan_addresses.iter().any(|a| a.eq_ignore_ascii_case(&address)) {
            self.scan_addresses.push(address);
        }
        self
    }

    /// Run until cancelled
    pub async fn run(mut self, token: CancellationToken) {
        let claims = self.venue.redeems_on_chain();
        self.store.update(|s| s.redeem.enabled = claims);
        tracing::info!(
            funder = %self.funder,
            interval_secs = self.config.scan_interval().as_secs(),
            "Redemption reconciler started"
        );
        if !claims {
            tracing::warn!(
                venue = self.venue.name(),
                "Venue cannot redeem on-chain, settled positions are only reported"
            );
        }

        while !token.is_cancelled() {
            self.scan_once(Utc::now()).await;

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.scan_interval()) => {}
            }
        }

        tracing::info!("Redemption reconciler stopped");
    }

    /// One scan: collect, report, redeem up to the per-scan cap
    ///
    /// Against a venue that cannot redeem on-chain the scan only reports.
    pub async fn scan_once(&mut self, now: DateTime<Utc>) -> ScanReport {
        let retry = chrono::Duration::from_std(self.config.retry_interval())
            .unwrap_or_else(|_| chrono::Duration::seconds(120));
        self.last_attempt.retain(|_, last| now - *last < retry);

        let mut scans = Vec::with_capacity(self.scan_addresses.len());
        for owner in &self.scan_addresses {
            match self.source.positions(owner).await {
                Ok(rows) => scans.push((owner.clone(), rows)),
                Err(e) => tracing::warn!(owner = %owner, error = %e, "Position scan failed"),
            }
        }

        let (pending, claimable) = collect_candidates(&scans, &self.funder);
        let mut report = ScanReport {
            pending: pending.len(),
            claimable: claimable.len(),
            attempts: Vec::new(),
        };

        let claims = self.venue.redeems_on_chain();
        self.store.update(|s| {
            s.redeem.enabled = claims;
            s.redeem.last_scan = Some(now);
            s.redeem.pending = report.pending;
            s.redeem.claimable = report.claimable;
        });
        set_gauge(GaugeMetric::RedeemPending, report.pending as f64);
        self.report_pending(&pending, claimable.len(), now);
        if !claims {
            return report;
        }

        for cid in claimable {
            if report.attempts.len() >= self.config.max_per_scan() {
                break;
            }
            if let Some(last) = self.last_attempt.get(&cid) {
                if now - *last < retry {
                    continue;
                }
            }
            // Stamp before the attempt so a slow or failing redeem is not retried within the cooldown
            self.last_attempt.insert(cid.clone(), now);

            let outcome = self.redeem_condition(&cid, now).await;
            self.record(&outcome);
            refresh_account(self.source.as_ref(), &self.funder, &self.observer).await;
            report.attempts.push(outcome);
        }

        report
    }

    async fn redeem_condition(&self, cid: &str, now: DateTime<Utc>) -> RedeemOutcome {
        let result = match self.venue.redeem(cid, &self.funder).await {
            Err(VenueError::NotProvisioned(reason)) => {
                tracing::warn!(condition_id = cid, reason = %reason, "Funder account not provisioned, deploying");
                match self.venue.provision_account().await {
                    Ok(()) => self.venue.redeem(cid, &self.funder).await,
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        let (ok, tx_hash, message) = match result {
            Ok(RedeemReceipt {
                tx_hash,
                confirmed: true,
                ..
            }) => (true, tx_hash, "ok".to_string()),
            Ok(RedeemReceipt { tx_hash, state, .. }) => {
                let message = if state.is_empty() {
                    "relayer_not_confirmed".to_string()
                } else {
                    format!("state={state}")
                };
                (false, tx_hash, message)
            }
            Err(e) => (false, None, e.to_string()),
        };

        RedeemOutcome {
            time: now,
            ok,
            condition_id: cid.to_string(),
            tx_hash,
            message,
        }
    }

    fn record(&self, outcome: &RedeemOutcome) {
        if outcome.ok {
            increment(CounterMetric::RedeemSucceeded);
            tracing::info!(
                target: TRADE_TARGET,
                condition_id = %outcome.condition_id,
                tx_hash = outcome.tx_hash.as_deref().unwrap_or(""),
                "Redeemed settled position"
            );
        } else {
            increment(CounterMetric::RedeemFailed);
            tracing::error!(
                condition_id = %outcome.condition_id,
                reason = %outcome.message,
                "Redemption failed"
            );
        }

        self.store.update(|s| {
            s.redeem.last_result = Some(outcome.clone());
            s.push_event(TradeEvent::Redeem(RedeemEvent {
                time: outcome.time,
                condition_id: outcome.condition_id.clone(),
                owner: self.funder.clone(),
                tx_hash: outcome.tx_hash.clone(),
                status: if outcome.ok {
                    EventStatus::Confirmed
                } else {
                    EventStatus::Failed
                },
                message: outcome.message.clone(),
            }));
        });
    }

    fn report_pending(&mut self, pending: &[RedeemCandidate], claimable: usize, now: DateTime<Utc>) {
        if pending.is_empty() {
            self.pending_signature.clear();
            return;
        }

        let signature = pending
            .iter()
            .map(|c| format!("{}:{}", c.owner, c.condition_id))
            .collect::<Vec<_>>()
            .join("|");
        let interval = chrono::Duration::from_std(self.config.pending_log_interval())
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let due = self.pending_logged_at.map_or(true, |t| now - t >= interval);
        if signature == self.pending_signature && !due {
            return;
        }
        self.pending_signature = signature;
        self.pending_logged_at = Some(now);

        let mut owners: Vec<&str> = pending.iter().map(|c| c.owner.as_str()).collect();
        owners.sort_unstable();
        owners.dedup();
        tracing::warn!(
            pending = pending.len(),
            claimable,
            owners = %owners.join(", "),
            "Settled positions awaiting redemption"
        );
    }
}
