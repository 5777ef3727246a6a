//! Price feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Latest value seen on one feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub value: Decimal,
    /// Local time the value was applied
    pub observed_at: DateTime<Utc>,
}

/// Point-in-time copy of every feed's latest price
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSnapshot {
    points: HashMap<String, PricePoint>,
}

impl PriceSnapshot {
    pub fn new(points: HashMap<String, PricePoint>) -> Self {
        Self { points }
    }

    /// Raw point for a feed, regardless of age
    pub fn get(&self, feed: &str) -> Option<&PricePoint> {
        self.points.get(feed)
    }

    /// Price for a feed if it was observed within `max_age` of `now`
    ///
    /// Absent, stale and non-positive values all read as unavailable.
    pub fn price(&self, feed: &str, now: DateTime<Utc>, max_age: Duration) -> Option<Decimal> {
        let point = self.points.get(feed)?;
        let age = now.signed_duration_since(point.observed_at);
        let max_age = chrono::Duration::from_std(max_age).ok()?;
        if age > max_age || point.value <= Decimal::ZERO {
            return None;
        }
        Some(point.value)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Read a decimal out of a JSON number or numeric string
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .or_else(|_| Decimal::from_scientific(&repr))
                .ok()
        }
        _ => None,
    }
}
