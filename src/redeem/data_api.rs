//! Data API client for wallet positions

use super::PositionSource;
use crate::feed::decimal_from_json;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page size for `GET /closed-positions`
pub const CLOSED_POSITIONS_LIMIT: usize = 200;

/// One holding reported by `GET /positions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPosition {
    pub condition_id: Option<String>,
    pub asset: Option<String>,
    pub title: Option<String>,
    pub outcome: Option<String>,
    pub size: Decimal,
    pub avg_price: Option<Decimal>,
    pub cur_price: Option<Decimal>,
    pub redeemable: bool,
    pub mergeable: bool,
}

impl WalletPosition {
    /// Lenient conversion of one response row
    ///
    /// Numbers may arrive as strings and keys in either camelCase or
    /// snake_case. Rows that are not objects are skipped.
    pub fn from_row(row: &Value) -> Option<Self> {
        let row = Row::new(row)?;
        Some(Self {
            condition_id: row.text("conditionId", "condition_id"),
            asset: row.text("asset", "asset"),
            title: row.text("title", "title"),
            outcome: row.text("outcome", "outcome"),
            size: row.number("size", "size").unwrap_or_default(),
            avg_price: row.number("avgPrice", "avg_price"),
            cur_price: row.number("curPrice", "cur_price"),
            redeemable: row.flag("redeemable"),
            mergeable: row.flag("mergeable"),
        })
    }

    /// Settled and waiting to be converted back to collateral
    pub fn is_settled(&self) -> bool {
        self.redeemable || self.mergeable
    }
}

/// One row of `GET /closed-positions`, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPosition {
    pub condition_id: Option<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub outcome: Option<String>,
    pub size: Decimal,
    pub avg_price: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    /// As reported; the API mixes ISO dates and unix seconds
    pub closed_at: Option<String>,
    pub tx_hash: Option<String>,
}

impl ClosedPosition {
    pub fn from_row(row: &Value) -> Option<Self> {
        let row = Row::new(row)?;
        Some(Self {
            condition_id: row.text("conditionId", "condition_id"),
            slug: row.text("slug", "marketSlug"),
            title: row.text("title", "question"),
            outcome: row.text("outcome", "side"),
            size: row.number("size", "size").unwrap_or_default(),
            avg_price: row.number("avgPrice", "avg_price"),
            realized_pnl: row.number("realizedPnl", "realized_pnl"),
            closed_at: row
                .text("endDate", "timestamp")
                .or_else(|| row.text("updatedAt", "updated_at")),
            tx_hash: row.text("transactionHash", "id"),
        })
    }
}

/// Field access over one JSON object, tolerant of key style and value type
struct Row<'a>(&'a serde_json::Map<String, Value>);

impl<'a> Row<'a> {
    fn new(value: &'a Value) -> Option<Self> {
        value.as_object().map(Row)
    }

    fn field(&self, primary: &str, alternate: &str) -> Option<&'a Value> {
        self.0
            .get(primary)
            .filter(|v| !v.is_null())
            .or_else(|| self.0.get(alternate).filter(|v| !v.is_null()))
    }

    fn text(&self, primary: &str, alternate: &str) -> Option<String> {
        self.field(primary, alternate).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    fn number(&self, primary: &str, alternate: &str) -> Option<Decimal> {
        self.field(primary, alternate).and_then(decimal_from_json)
    }

    fn flag(&self, key: &str) -> bool {
        self.field(key, key).is_some_and(truthy)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"),
        _ => false,
    }
}

/// Client for Polymarket's Data API
#[derive(Clone)]
pub struct DataApiClient {
    base_url: String,
    client: Client,
}

impl DataApiClient {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn fetch_positions(&self, owner: &str) -> anyhow::Result<Vec<WalletPosition>> {
        let rows = self
            .get_rows("positions", &[("user", owner), ("sizeThreshold", "0")])
            .await?;
        Ok(rows.iter().filter_map(WalletPosition::from_row).collect())
    }

    /// Most recent closed positions, up to [`CLOSED_POSITIONS_LIMIT`]
    pub async fn fetch_closed_positions(&self, owner: &str) -> anyhow::Result<Vec<ClosedPosition>> {
        let limit = CLOSED_POSITIONS_LIMIT.to_string();
        let rows = self
            .get_rows(
                "closed-positions",
                &[
                    ("user", owner),
                    ("limit", limit.as_str()),
                    ("offset", "0"),
                    ("sortBy", "TIMESTAMP"),
                    ("sortDirection", "DESC"),
                ],
            )
            .await?;
        Ok(rows.iter().filter_map(ClosedPosition::from_row).collect())
    }

    async fn get_rows(&self, path: &str, query: &[(&str, &str)]) -> anyhow::Result<Vec<Value>> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Data API error: {} - {}", status, body);
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PositionSource for DataApiClient {
    async fn positions(&self, owner: &str) -> anyhow::Result<Vec<WalletPosition>> {
        self.fetch_positions(owner).await
    }

    async fn closed_positions(&self, owner: &str) -> anyhow::Result<Vec<ClosedPosition>> {
        self.fetch_closed_positions(owner).await
    }
}
