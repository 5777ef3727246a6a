use crate::redeem::{ClosedPosition, WalletPosition};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Closed rows kept on the snapshot
pub const CLOSED_HISTORY_LIMIT: usize = 200;

/// Funder wallet view for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub owner: String,
    /// Open holdings, settled ones excluded
    pub positions: Vec<WalletPosition>,
    pub position_count: usize,
    /// Newest first
    pub closed: Vec<ClosedPosition>,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn build(
        owner: &str,
        open: Vec<WalletPosition>,
        mut closed: Vec<ClosedPosition>,
        now: DateTime<Utc>,
    ) -> Self {
        let positions: Vec<WalletPosition> = open
            .into_iter()
            .filter(|p| p.size > Decimal::ZERO && !p.is_settled())
            .collect();

        let unrealized_pnl: Decimal = positions
            .iter()
            .filter_map(|p| Some((p.cur_price? - p.avg_price?) * p.size))
            .sum();
        let realized_pnl: Decimal = closed.iter().filter_map(|c| c.realized_pnl).sum();
        closed.truncate(CLOSED_HISTORY_LIMIT);

        Self {
            owner: owner.to_string(),
            position_count: positions.len(),
            positions,
            closed,
            realized_pnl,
            unrealized_pnl,
            total_pnl: realized_pnl + unrealized_pnl,
            updated_at: now,
        }
    }
}
