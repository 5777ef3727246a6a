//! Observer interface
//!
//! Read-only view of the running bot for dashboards and the `status`
//! command. Writers are the decision loop (market, prices) and the account
//! sync; trading fields are read straight from the state store.

mod account;
mod activity;

pub use account::AccountSnapshot;
pub use activity::{ActivityEntry, ActivityLog};

use crate::market::MarketSession;
use crate::state::{LastOrder, PendingOrder, Position, PriceMirror, RedeemStatus, StateStore, TradeEvent};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Active session as seen by the last tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketView {
    pub session: MarketSession,
    pub remaining_secs: i64,
    pub divergence: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverSnapshot {
    pub market: Option<MarketView>,
    pub prices: PriceMirror,
    pub position: Option<Position>,
    pub pending_order: Option<PendingOrder>,
    pub last_order: Option<LastOrder>,
    pub trade_history: Vec<TradeEvent>,
    pub redeem: RedeemStatus,
    pub account: Option<AccountSnapshot>,
}

#[derive(Default)]
struct LiveView {
    market: Option<MarketView>,
    prices: PriceMirror,
    account: Option<AccountSnapshot>,
}

pub struct Observer {
    store: Arc<StateStore>,
    activity: ActivityLog,
    live: RwLock<LiveView>,
}

impl Observer {
    pub fn new(store: Arc<StateStore>, activity: ActivityLog) -> Self {
        Self {
            store,
            activity,
            live: RwLock::new(LiveView::default()),
        }
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn set_market(&self, market: Option<MarketView>) {
        self.live.write().market = market;
    }

    pub fn set_prices(&self, prices: PriceMirror) {
        self.live.write().prices = prices;
    }

    pub fn set_account(&self, account: AccountSnapshot) {
        self.live.write().account = Some(account);
    }

    pub fn account(&self) -> Option<AccountSnapshot> {
        self.live.read().account.clone()
    }

    pub fn snapshot(&self) -> ObserverSnapshot {
        let state = self.store.snapshot();
        let live = self.live.read();
        ObserverSnapshot {
            market: live.market.clone(),
            prices: live.prices.clone(),
            position: state.position,
            pending_order: state.pending_order,
            last_order: state.last_order,
            trade_history: state.history,
            redeem: state.redeem,
            account: live.account.clone(),
        }
    }
}
