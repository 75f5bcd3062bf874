use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::broker::CandleSource;
use crate::model::candle::Candle;

/// Exchange kline limit per request.
const MAX_KLINES: usize = 1000;

/// Public kline endpoint (`/api/v3/klines`) as a candle source. No credentials needed.
pub struct RestCandleSource {
    http: reqwest::Client,
    base_url: String,
}

impl RestCandleSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build market data HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Exchange interval label for a timeframe in seconds.
pub fn interval_label(timeframe_secs: u64) -> Result<&'static str> {
    let label = match timeframe_secs {
        1 => "1s",
        60 => "1m",
        180 => "3m",
        300 => "5m",
        900 => "15m",
        1_800 => "30m",
        3_600 => "1h",
        7_200 => "2h",
        14_400 => "4h",
        21_600 => "6h",
        28_800 => "8h",
        43_200 => "12h",
        86_400 => "1d",
        259_200 => "3d",
        604_800 => "1w",
        _ => bail!("unsupported candle timeframe: {}s", timeframe_secs),
    };
    Ok(label)
}

/// Parse the kline array-of-arrays payload into ascending candles.
pub fn parse_klines(root: &Value) -> Result<Vec<Candle>> {
    let rows = root
        .as_array()
        .context("klines payload is not an array")?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = row.as_array().context("kline row is not an array")?;
        if fields.len() < 6 {
            bail!("kline row has {} fields, expected at least 6", fields.len());
        }
        let open_time_ms = fields[0].as_i64().context("kline open time is not an integer")?;
        candles.push(Candle {
            timestamp: open_time_ms.div_euclid(1000),
            open: number_field(&fields[1], "open")?,
            high: number_field(&fields[2], "high")?,
            low: number_field(&fields[3], "low")?,
            close: number_field(&fields[4], "close")?,
            volume: number_field(&fields[5], "volume")?,
        });
    }
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    Ok(candles)
}

/// Prices arrive as decimal strings; accept plain numbers too.
fn number_field(v: &Value, name: &str) -> Result<f64> {
    match v {
        Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("kline {} '{}' is not a number", name, s)),
        Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("kline {} is out of range", name)),
        _ => bail!("kline {} has unexpected type", name),
    }
}

#[async_trait]
impl CandleSource for RestCandleSource {
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe_secs: u64,
        count: usize,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let interval = interval_label(timeframe_secs)?;
        let limit = count.clamp(1, MAX_KLINES).to_string();
        let end_time = as_of.timestamp_millis().to_string();
        let url = format!("{}/api/v3/klines", self.base_url);

        let root: Value = self
            .http
            .get(&url)
            .query(&[
                ("symbol", instrument),
                ("interval", interval),
                ("limit", limit.as_str()),
                ("endTime", end_time.as_str()),
            ])
            .send()
            .await
            .context("get_klines HTTP failed")?
            .error_for_status()
            .context("get_klines returned error status")?
            .json()
            .await
            .context("get_klines JSON parse failed")?;

        let candles = parse_klines(&root)?;
        tracing::debug!(instrument, interval, count = candles.len(), "Fetched klines");
        Ok(candles)
    }
}
