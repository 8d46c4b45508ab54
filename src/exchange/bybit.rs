// =============================================================================
// Bybit adapter — v5 market endpoints (linear USDT perpetuals)
// =============================================================================
//
// Bybit wraps every payload in `{ retCode, retMsg, result }` and returns
// kline rows newest-first as arrays of strings:
//   [0] startTime, [1] open, [2] high, [3] low, [4] close, [5] volume, [6] turnover
// Rows are reversed into chronological order and start times are shifted to
// close times so the series store sees one timestamp convention everywhere.
// =============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::types::{Candle, ExchangeId, SampleInterval};

use super::{parse_str_f64, retry_after_header, ExchangeClient, FetchError};

/// Largest kline page Bybit serves in one request.
const PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct BybitEnvelope {
    #[serde(rename = "retCode")]
    ret_code: i32,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    result: Option<serde_json::Value>,
}

pub struct BybitClient {
    client: reqwest::Client,
    base_url: String,
}

impl BybitClient {
    pub fn new() -> Self {
        Self::with_base_url("https://api.bybit.com")
    }

    /// Override the base URL (tests point this at a local stub).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: super::http_client(),
            base_url: base_url.into(),
        }
    }

    /// Issue a GET, unwrap the Bybit envelope, and return `result`.
    async fn get_result(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_header(resp.headers());
            return Err(FetchError::from_status(status, retry_after));
        }

        let envelope: BybitEnvelope = resp
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        if envelope.ret_code != 0 {
            return Err(FetchError::InvalidResponse(format!(
                "retCode {}: {}",
                envelope.ret_code, envelope.ret_msg
            )));
        }

        envelope
            .result
            .ok_or_else(|| FetchError::InvalidResponse("envelope missing result".into()))
    }
}

impl Default for BybitClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for BybitClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    async fn fetch_candles(
        &self,
        pair: &str,
        interval: SampleInterval,
        since: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        let mut url = format!(
            "{}/v5/market/kline?category=linear&symbol={}&interval={}&limit={}",
            self.base_url,
            pair,
            interval.bybit_code(),
            limit.min(PAGE_LIMIT)
        );
        if let Some(since) = since {
            url.push_str(&format!("&start={since}"));
        }

        let result = self.get_result(&url).await?;
        let list = result["list"]
            .as_array()
            .ok_or_else(|| FetchError::InvalidResponse("kline result missing list".into()))?;

        let interval_ms = interval.as_millis();
        let mut candles = Vec::with_capacity(list.len());
        // Newest-first on the wire; walk backwards for chronological order.
        for row in list.iter().rev() {
            let arr = row
                .as_array()
                .ok_or_else(|| FetchError::InvalidResponse("kline row is not an array".into()))?;
            if arr.len() < 6 {
                return Err(FetchError::InvalidResponse(format!(
                    "kline row has {} elements",
                    arr.len()
                )));
            }

            let start_time = parse_str_f64(&arr[0], "kline.startTime")? as i64;
            let open = parse_str_f64(&arr[1], "kline.open")?;
            let high = parse_str_f64(&arr[2], "kline.high")?;
            let low = parse_str_f64(&arr[3], "kline.low")?;
            let close = parse_str_f64(&arr[4], "kline.close")?;
            let volume = parse_str_f64(&arr[5], "kline.volume")?;

            // Bybit stamps the open; the pipeline convention is close time.
            let close_time = start_time + interval_ms - 1;
            candles.push(Candle::new(close_time, open, high, low, close, volume));
        }

        debug!(pair, interval = %interval, count = candles.len(), "bybit klines fetched");
        Ok(candles)
    }

    async fn fetch_open_interest(&self, pair: &str) -> Result<f64, FetchError> {
        let url = format!(
            "{}/v5/market/open-interest?category=linear&symbol={}&intervalTime=5min&limit=1",
            self.base_url, pair
        );
        let result = self.get_result(&url).await?;

        let entry = result["list"]
            .as_array()
            .and_then(|arr| arr.first())
            .ok_or_else(|| FetchError::InvalidResponse("open-interest list is empty".into()))?;

        let oi = parse_str_f64(&entry["openInterest"], "openInterest")?;
        debug!(pair, open_interest = oi, "bybit open interest fetched");
        Ok(oi)
    }

    async fn fetch_funding_rate(&self, pair: &str) -> Result<f64, FetchError> {
        let url = format!(
            "{}/v5/market/tickers?category=linear&symbol={}",
            self.base_url, pair
        );
        let result = self.get_result(&url).await?;

        let entry = result["list"]
            .as_array()
            .and_then(|arr| arr.first())
            .ok_or_else(|| FetchError::InvalidResponse("tickers list is empty".into()))?;

        let rate = parse_str_f64(&entry["fundingRate"], "fundingRate")?;
        debug!(pair, rate, "bybit funding rate fetched");
        Ok(rate)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_error_code_is_invalid_response() {
        let raw = r#"{"retCode":10001,"retMsg":"params error","result":null}"#;
        let envelope: BybitEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.ret_code, 10001);
        assert!(envelope.result.is_none());
    }

    #[test]
    fn kline_rows_reverse_to_chronological_close_times() {
        // Two rows, newest first, 1m interval.
        let list = serde_json::json!([
            ["1700000060000", "101", "102", "100", "101.5", "10", "1000"],
            ["1700000000000", "100", "101", "99", "100.5", "12", "1200"]
        ]);
        let interval = SampleInterval::OneMinute;
        let interval_ms = interval.as_millis();

        let mut candles = Vec::new();
        for row in list.as_array().unwrap().iter().rev() {
            let arr = row.as_array().unwrap();
            let start: i64 = arr[0].as_str().unwrap().parse().unwrap();
            candles.push(Candle::new(
                start + interval_ms - 1,
                arr[1].as_str().unwrap().parse().unwrap(),
                arr[2].as_str().unwrap().parse().unwrap(),
                arr[3].as_str().unwrap().parse().unwrap(),
                arr[4].as_str().unwrap().parse().unwrap(),
                arr[5].as_str().unwrap().parse().unwrap(),
            ));
        }

        assert_eq!(candles.len(), 2);
        assert!(candles[0].ts < candles[1].ts);
        assert_eq!(candles[0].ts, 1700000000000 + 59_999);
        assert!((candles[1].close - 101.5).abs() < f64::EPSILON);
    }

    #[test]
    fn client_id_is_bybit() {
        let client = BybitClient::new();
        assert_eq!(client.id(), ExchangeId::Bybit);
    }
}
