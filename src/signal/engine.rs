//! Tiered divergence trigger

use super::{dedup_key, Decision, HoldReason, Side, Tier};
use crate::config::TiersConfig;
use crate::market::MarketSession;
use crate::orderbook::TokenQuote;
use crate::state::{PendingOrder, Position};
use rust_decimal::Decimal;

/// Everything one tick needs to decide
#[derive(Debug, Clone, Copy)]
pub struct TriggerInput<'a> {
    pub session: &'a MarketSession,
    pub remaining_secs: i64,
    /// Reference price, `None` when unavailable or stale
    pub reference: Option<Decimal>,
    pub up_quote: Option<TokenQuote>,
    pub down_quote: Option<TokenQuote>,
    pub position: Option<&'a Position>,
    pub pending: Option<&'a PendingOrder>,
    pub last_order_key: Option<&'a str>,
}

impl TriggerInput<'_> {
    fn quote(&self, side: Side) -> Option<TokenQuote> {
        match side {
            Side::Up => self.up_quote,
            Side::Down => self.down_quote,
        }
    }

    fn entry_price(&self, side: Side) -> Option<Decimal> {
        self.quote(side)
            .and_then(|q| q.entry_price())
            .or_else(|| self.session.fallback_price(side))
    }

    fn exit_price(&self, side: Side) -> Option<Decimal> {
        self.quote(side)
            .and_then(|q| q.exit_price())
            .or_else(|| self.session.fallback_price(side))
    }
}

/// Pure three-tier trigger with an independent stop-loss
#[derive(Debug, Clone)]
pub struct TriggerEngine {
    tiers: [Tier; 3],
    stop_loss: Decimal,
}

impl TriggerEngine {
    pub fn new(tiers: [Tier; 3], stop_loss: Decimal) -> Self {
        Self { tiers, stop_loss }
    }

    pub fn from_config(config: &TiersConfig, stop_loss: Decimal) -> Self {
        let [t1, t2, t3] = config.as_array();
        let tier = |index: u8, c: crate::config::TierConfig| Tier {
            index,
            max_remaining_secs: c.max_remaining_secs,
            min_divergence: c.min_divergence,
        };
        Self::new([tier(1, t1), tier(2, t2), tier(3, t3)], stop_loss)
    }

    pub fn tiers(&self) -> &[Tier; 3] {
        &self.tiers
    }

    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    /// Reference minus benchmark, or `None` unless both are positive
    pub fn divergence(reference: Option<Decimal>, benchmark: Option<Decimal>) -> Option<Decimal> {
        match (reference, benchmark) {
            (Some(r), Some(b)) if r > Decimal::ZERO && b > Decimal::ZERO => Some(r - b),
            _ => None,
        }
    }

    /// First tier (tightest window first) satisfied by the inputs
    pub fn matching_tier(&self, remaining_secs: i64, abs_divergence: Decimal) -> Option<Tier> {
        self.tiers
            .iter()
            .find(|t| t.matches(remaining_secs, abs_divergence))
            .copied()
    }

    /// Decide what to do on this tick
    ///
    /// A held position exits once |divergence| drops under the stop-loss. A
    /// missing or stale price counts as zero divergence there, so losing the
    /// reference while holding also exits. Entries need both prices.
    pub fn evaluate(&self, input: &TriggerInput<'_>) -> Decision {
        let divergence = Self::divergence(input.reference, input.session.benchmark);

        if let Some(position) = input.position {
            let divergence = divergence.unwrap_or(Decimal::ZERO);
            if position.session == input.session.slug && divergence.abs() < self.stop_loss {
                return Decision::StopLoss {
                    side: position.side,
                    price: input.exit_price(position.side),
                    divergence,
                };
            }
            return Decision::Hold(HoldReason::Holding);
        }

        let Some(divergence) = divergence else {
            return Decision::Hold(HoldReason::Waiting);
        };
        let abs_divergence = divergence.abs();

        if input.pending.is_some() {
            return Decision::Hold(HoldReason::OrderPending);
        }

        let Some(tier) = self.matching_tier(input.remaining_secs, abs_divergence) else {
            return Decision::Hold(HoldReason::NoTrigger);
        };

        let side = Side::from_divergence(divergence);
        if input.last_order_key == Some(dedup_key(&input.session.slug, side).as_str()) {
            return Decision::Suppressed { tier, side };
        }

        match input.entry_price(side) {
            Some(price) => Decision::Enter {
                tier,
                side,
                price,
                divergence,
            },
            None => Decision::Hold(HoldReason::NoQuote),
        }
    }
}
